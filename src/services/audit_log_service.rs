// Audit Log Service
// Purpose: append-only trail of executor invocations plus the drift-engine
// resource-change event stream. Rows are never modified.

use crate::models::{AuditEntry, ResourceChangeEvent};
use crate::utils::ApiResult;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AuditLogService {
    pool: SqlitePool,
}

impl AuditLogService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one audit row. Callers treat failures as non-fatal; an audit
    /// write error must never mask the outcome of the action it records.
    pub async fn append(&self, entry: &AuditEntry) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO audit_log (id, action, resource_type, resource_id, resource_name, scenario_id, detection_id, success, message, previous_state, new_state, executed_at, duration_ms, executed_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(&entry.resource_id)
        .bind(&entry.resource_name)
        .bind(&entry.scenario_id)
        .bind(&entry.detection_id)
        .bind(entry.success)
        .bind(&entry.message)
        .bind(&entry.previous_state)
        .bind(&entry.new_state)
        .bind(entry.executed_at)
        .bind(entry.duration_ms)
        .bind(&entry.executed_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent entries, reverse chronological
    pub async fn list_recent(&self, limit: i64) -> ApiResult<Vec<AuditEntry>> {
        let limit = limit.clamp(1, 1000);
        let entries = sqlx::query_as(
            "SELECT * FROM audit_log ORDER BY executed_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    pub async fn count(&self) -> ApiResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM audit_log")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Append a drift-engine change event
    pub async fn append_change_event(&self, event: &ResourceChangeEvent) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO resource_change_events (id, account_id, change_type, resource_type, resource_id, resource_name, change_source, details, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.account_id)
        .bind(&event.change_type)
        .bind(&event.resource_type)
        .bind(&event.resource_id)
        .bind(&event.resource_name)
        .bind(&event.change_source)
        .bind(&event.details)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
