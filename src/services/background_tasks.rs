//! Background tasks: the periodic drift tick and the scheduled-execution
//! poller, both driven by the ScheduledExecutor framework.

use crate::models::RecommendationActionRequest;
use crate::services::drift_service::DriftService;
use crate::services::recommendation_service::RecommendationService;
use crate::utils::scheduled_executor::{ScheduledExecutor, ScheduledTask};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Advances the simulated world on a timer. Auto-execution is governed by
/// the persisted execution mode, never forced from here.
pub struct DriftTickTask {
    drift_service: Arc<DriftService>,
    shutdown: Arc<AtomicBool>,
}

impl DriftTickTask {
    pub fn new(drift_service: Arc<DriftService>) -> Self {
        Self { drift_service, shutdown: Arc::new(AtomicBool::new(false)) }
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    async fn execute(&self) -> Result<(), anyhow::Error> {
        let result = self
            .drift_service
            .tick(None)
            .await
            .map_err(|e| anyhow::anyhow!("drift tick failed: {}", e))?;

        info!(
            "Drift tick: {} account(s) advanced, {} failed, {} detections, {} auto-executed",
            result.drift.accounts_processed,
            result.drift.accounts_failed,
            result.detection.total_detections,
            result.execution.executed
        );
        Ok(())
    }
}

impl ScheduledTask for DriftTickTask {
    fn run(&self) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send + '_>> {
        Box::pin(async move { self.execute().await })
    }

    fn should_terminate(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// Start the periodic drift tick. Returns the shutdown handle.
pub fn start_drift_tick_task(
    drift_service: Arc<DriftService>,
    interval_secs: u64,
) -> Arc<AtomicBool> {
    let task = DriftTickTask::new(drift_service);
    let handle = task.shutdown_handle();

    let executor = ScheduledExecutor::new("drift-tick", Duration::from_secs(interval_secs));
    tokio::spawn(async move {
        executor.start(task).await;
    });

    info!("Drift tick task started with interval: {}s", interval_secs);
    handle
}

/// Drives scheduled recommendations whose time has come through the execute
/// transition.
pub struct ScheduledExecutionTask {
    recommendation_service: Arc<RecommendationService>,
    shutdown: Arc<AtomicBool>,
}

impl ScheduledExecutionTask {
    pub fn new(recommendation_service: Arc<RecommendationService>) -> Self {
        Self { recommendation_service, shutdown: Arc::new(AtomicBool::new(false)) }
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    async fn execute(&self) -> Result<(), anyhow::Error> {
        let due = self
            .recommendation_service
            .list_due_scheduled()
            .await
            .map_err(|e| anyhow::anyhow!("listing due recommendations failed: {}", e))?;

        if due.is_empty() {
            return Ok(());
        }
        info!("{} scheduled recommendation(s) due for execution", due.len());

        for rec in due {
            let req = RecommendationActionRequest {
                id: rec.id.clone(),
                action: "execute".to_string(),
                days: None,
                date: None,
                reason: None,
                actioned_by: Some("scheduler".to_string()),
            };
            match self.recommendation_service.transition(&req).await {
                Ok((_, Some(result))) if !result.success => {
                    warn!("Scheduled execution of {} failed: {}", rec.id, result.message);
                },
                Ok(_) => {},
                Err(e) => {
                    warn!("Scheduled execution of {} errored: {}", rec.id, e);
                },
            }
        }
        Ok(())
    }
}

impl ScheduledTask for ScheduledExecutionTask {
    fn run(&self) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send + '_>> {
        Box::pin(async move { self.execute().await })
    }

    fn should_terminate(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// Start the scheduled-execution poller. Returns the shutdown handle.
pub fn start_scheduled_execution_task(
    recommendation_service: Arc<RecommendationService>,
    interval_secs: u64,
) -> Arc<AtomicBool> {
    let task = ScheduledExecutionTask::new(recommendation_service);
    let handle = task.shutdown_handle();

    let executor =
        ScheduledExecutor::new("scheduled-execution", Duration::from_secs(interval_secs));
    tokio::spawn(async move {
        executor.start(task).await;
    });

    info!("Scheduled-execution poller started with interval: {}s", interval_secs);
    handle
}
