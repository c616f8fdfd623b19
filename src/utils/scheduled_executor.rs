// Scheduled executor for periodic background tasks (drift tick, scheduled
// recommendation poller). Adapted for the async/tokio runtime.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::sleep;

/// A trait for tasks that run periodically
pub trait ScheduledTask: Send + Sync + 'static {
    /// Execute the task.
    /// Returns Ok(()) on success, Err on failure.
    fn run(&self) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send + '_>>;

    /// Check if the task should terminate.
    /// Default: never terminate (run forever).
    fn should_terminate(&self) -> bool {
        false
    }
}

/// Blanket implementation for Arc<T> so Arc-wrapped tasks can be passed
/// directly to the executor.
impl<T: ScheduledTask> ScheduledTask for Arc<T> {
    fn run(&self) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send + '_>> {
        (**self).run()
    }

    fn should_terminate(&self) -> bool {
        (**self).should_terminate()
    }
}

/// Runs a task on a fixed interval until shut down or the task asks to stop.
pub struct ScheduledExecutor {
    interval: Duration,
    task_name: String,
    shutdown: Arc<AtomicBool>,
}

impl ScheduledExecutor {
    pub fn new(task_name: impl Into<String>, interval: Duration) -> Self {
        Self { task_name: task_name.into(), interval, shutdown: Arc::new(AtomicBool::new(false)) }
    }

    /// Handle that stops the executor from another task
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run the task loop. Failures are logged and the loop continues; the
    /// interval is measured from the end of each execution.
    pub async fn start<T>(self, task: T)
    where
        T: ScheduledTask,
    {
        let task_name = self.task_name;
        let shutdown = self.shutdown;

        tracing::info!(
            "Starting scheduled task '{}' with interval: {:?}",
            task_name,
            self.interval
        );

        loop {
            sleep(self.interval).await;

            if shutdown.load(Ordering::Relaxed) || task.should_terminate() {
                tracing::info!("Scheduled task '{}' is shutting down", task_name);
                break;
            }

            tracing::debug!("Executing scheduled task '{}'", task_name);
            match task.run().await {
                Ok(()) => {
                    tracing::debug!("Scheduled task '{}' completed successfully", task_name);
                },
                Err(e) => {
                    tracing::error!("Scheduled task '{}' failed: {}", task_name, e);
                },
            }
        }

        tracing::info!("Scheduled task '{}' stopped", task_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct TestTask {
        counter: Arc<AtomicU32>,
        max_runs: u32,
    }

    impl ScheduledTask for TestTask {
        fn run(&self) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send + '_>> {
            Box::pin(async move {
                self.counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
        }

        fn should_terminate(&self) -> bool {
            self.counter.load(Ordering::Relaxed) >= self.max_runs
        }
    }

    #[tokio::test]
    async fn test_scheduled_executor_terminates() {
        let counter = Arc::new(AtomicU32::new(0));
        let task = TestTask { counter: counter.clone(), max_runs: 2 };

        let executor = ScheduledExecutor::new("test", Duration::from_millis(10));
        executor.start(task).await;

        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_shutdown_handle_stops_loop() {
        let counter = Arc::new(AtomicU32::new(0));
        let task = TestTask { counter: counter.clone(), max_runs: u32::MAX };

        let executor = ScheduledExecutor::new("test-shutdown", Duration::from_millis(10));
        let handle = executor.shutdown_handle();
        handle.store(true, Ordering::Relaxed);

        executor.start(task).await;
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }
}
