// Execution Mode Service
// One small record per account: manual (default) or automated. Only the
// drift tick consults it.

use crate::models::ExecutionMode;
use crate::utils::ApiResult;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct ExecutionModeService {
    pool: SqlitePool,
}

impl ExecutionModeService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Defaults to manual when no record exists
    pub async fn get_mode(&self, account_id: &str) -> ApiResult<ExecutionMode> {
        let mode: Option<ExecutionMode> =
            sqlx::query_scalar("SELECT mode FROM execution_modes WHERE account_id = ?")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(mode.unwrap_or_default())
    }

    pub async fn set_mode(&self, account_id: &str, mode: ExecutionMode) -> ApiResult<ExecutionMode> {
        sqlx::query(
            "INSERT INTO execution_modes (account_id, mode) VALUES (?, ?)
             ON CONFLICT(account_id) DO UPDATE SET mode = excluded.mode, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(account_id)
        .bind(mode)
        .execute(&self.pool)
        .await?;

        tracing::info!("Execution mode for account '{}' set to {}", account_id, mode.as_str());
        Ok(mode)
    }
}
