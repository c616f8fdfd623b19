//! Recommendation lifecycle: idempotent ingestion from the detection stream
//! and the state machine pending -> approved/rejected/snoozed/scheduled ->
//! executed.

use crate::models::{
    ActionResult, Detection, ExecuteActionParams, Recommendation, RecommendationActionRequest,
    RecommendationFilter, RecommendationStatus, RecommendationSummary, SavingsRollup,
};
use crate::services::execution_service::ExecutionService;
use crate::utils::{ApiError, ApiResult};
use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Outcome of one ingest call
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct IngestOutcome {
    pub created: i64,
    pub skipped: i64,
}

pub struct RecommendationService {
    pool: SqlitePool,
    executor: Arc<ExecutionService>,
}

impl RecommendationService {
    pub fn new(pool: SqlitePool, executor: Arc<ExecutionService>) -> Self {
        Self { pool, executor }
    }

    /// Insert a pending recommendation for each detection not seen before.
    /// The detection_id uniqueness constraint makes re-ingestion a no-op;
    /// this is the only path that creates recommendations.
    pub async fn ingest(&self, detections: &[Detection]) -> ApiResult<IngestOutcome> {
        let mut outcome = IngestOutcome::default();

        for d in detections {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO recommendations
                 (id, detection_id, scenario_id, resource_type, resource_id, resource_name,
                  account_id, region, env, confidence, mode, monthly_cost, potential_savings,
                  impact_level, status, recommended_action, can_auto_optimize, title, description, details)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&d.detection_id)
            .bind(&d.scenario_id)
            .bind(&d.resource_type)
            .bind(&d.resource_id)
            .bind(&d.resource_name)
            .bind(&d.account_id)
            .bind(&d.region)
            .bind(&d.env)
            .bind(d.confidence)
            .bind(d.mode)
            .bind(d.monthly_cost)
            .bind(d.potential_savings)
            .bind(d.impact_level)
            .bind(&d.recommended_action)
            .bind(d.can_auto_optimize)
            .bind(&d.title)
            .bind(&d.description)
            .bind(sqlx::types::Json(&d.details))
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                outcome.created += 1;
            } else {
                outcome.skipped += 1;
            }
        }

        tracing::info!(
            "Ingested detections: {} created, {} skipped",
            outcome.created,
            outcome.skipped
        );
        Ok(outcome)
    }

    pub async fn get(&self, id: &str) -> ApiResult<Recommendation> {
        let rec: Option<Recommendation> =
            sqlx::query_as("SELECT * FROM recommendations WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        rec.ok_or_else(|| ApiError::not_found(format!("Recommendation not found: {}", id)))
    }

    /// List with conjunctive filters. A pending-only listing is ordered by
    /// impact level (critical first), then most recent.
    pub async fn list(&self, filter: &RecommendationFilter) -> ApiResult<Vec<Recommendation>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(statuses) = &filter.status
            && !statuses.is_empty()
        {
            let placeholders = vec!["?"; statuses.len()].join(", ");
            clauses.push(format!("status IN ({})", placeholders));
            binds.extend(statuses.iter().map(|s| s.as_str().to_string()));
        }
        if let Some(scenario) = &filter.scenario_id {
            clauses.push("scenario_id = ?".to_string());
            binds.push(scenario.clone());
        }
        if let Some(resource_type) = &filter.resource_type {
            clauses.push("resource_type = ?".to_string());
            binds.push(resource_type.clone());
        }
        if let Some(impact) = &filter.impact_level {
            clauses.push("impact_level = ?".to_string());
            binds.push(impact.as_str().to_string());
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let pending_only = filter
            .status
            .as_ref()
            .is_some_and(|s| s.iter().all(|st| *st == RecommendationStatus::Pending));
        let order_sql = if pending_only {
            "ORDER BY CASE impact_level
                 WHEN 'critical' THEN 3
                 WHEN 'high' THEN 2
                 WHEN 'medium' THEN 1
                 ELSE 0
             END DESC, created_at DESC"
        } else {
            "ORDER BY created_at DESC"
        };

        let limit = filter.limit.unwrap_or(100).clamp(1, 1000);
        let offset = filter.offset.unwrap_or(0).max(0);
        let sql = format!(
            "SELECT * FROM recommendations {} {} LIMIT {} OFFSET {}",
            where_sql, order_sql, limit, offset
        );

        let mut query = sqlx::query_as(&sql);
        for b in binds {
            query = query.bind(b);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn summary(&self) -> ApiResult<RecommendationSummary> {
        let rows: Vec<(String, String, String, f64)> = sqlx::query_as(
            "SELECT status, resource_type, scenario_id, potential_savings FROM recommendations",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut summary = RecommendationSummary::default();
        for (status, resource_type, scenario_id, savings) in rows {
            summary.total += 1;
            *summary.by_status.entry(status.clone()).or_insert(0) += 1;

            if status != "rejected" && status != "executed" {
                summary.total_potential_savings += savings;
            }
            if status == "pending" {
                summary.pending_savings += savings;
            }

            let by_type = summary
                .by_resource_type
                .entry(resource_type)
                .or_insert_with(SavingsRollup::default);
            by_type.count += 1;
            by_type.potential_savings += savings;

            let by_scenario = summary
                .by_scenario
                .entry(scenario_id)
                .or_insert_with(SavingsRollup::default);
            by_scenario.count += 1;
            by_scenario.potential_savings += savings;
        }
        Ok(summary)
    }

    /// Atomic state transition. Returns the updated recommendation and, for
    /// execute, the executor's result. A failed execution leaves the record
    /// in its prior state.
    pub async fn transition(
        &self,
        req: &RecommendationActionRequest,
    ) -> ApiResult<(Recommendation, Option<ActionResult>)> {
        let rec = self.get(&req.id).await?;
        let actor = req.actioned_by.clone().unwrap_or_else(|| "manual".to_string());

        match req.action.as_str() {
            // "approve" doubles as un-snooze: a snoozed record returns to
            // pending rather than jumping straight to approved.
            "approve" => match rec.status {
                RecommendationStatus::Snoozed => {
                    self.set_status_fields(
                        &rec.id,
                        RecommendationStatus::Pending,
                        "snoozed_until = NULL",
                    )
                    .await?;
                    Ok((self.get(&rec.id).await?, None))
                },
                RecommendationStatus::Pending => {
                    self.mark_actioned(&rec.id, RecommendationStatus::Approved, &actor).await?;
                    Ok((self.get(&rec.id).await?, None))
                },
                _ => Err(ApiError::invalid_transition(rec.status.as_str(), "approve")),
            },

            "reject" => match rec.status {
                RecommendationStatus::Pending => {
                    sqlx::query(
                        "UPDATE recommendations
                         SET status = 'rejected', rejection_reason = ?, actioned_by = ?,
                             actioned_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
                         WHERE id = ?",
                    )
                    .bind(&req.reason)
                    .bind(&actor)
                    .bind(&rec.id)
                    .execute(&self.pool)
                    .await?;
                    Ok((self.get(&rec.id).await?, None))
                },
                _ => Err(ApiError::invalid_transition(rec.status.as_str(), "reject")),
            },

            "snooze" => match rec.status {
                RecommendationStatus::Pending => {
                    let days = req.days.unwrap_or(0);
                    if days <= 0 {
                        return Err(ApiError::bad_request("Snooze requires days > 0"));
                    }
                    let until = Utc::now() + Duration::days(days);
                    sqlx::query(
                        "UPDATE recommendations
                         SET status = 'snoozed', snoozed_until = ?, updated_at = CURRENT_TIMESTAMP
                         WHERE id = ?",
                    )
                    .bind(until)
                    .bind(&rec.id)
                    .execute(&self.pool)
                    .await?;
                    Ok((self.get(&rec.id).await?, None))
                },
                _ => Err(ApiError::invalid_transition(rec.status.as_str(), "snooze")),
            },

            "schedule" => match rec.status {
                RecommendationStatus::Pending => {
                    let date = req
                        .date
                        .ok_or_else(|| ApiError::bad_request("Schedule requires a date"))?;
                    if date <= Utc::now() {
                        return Err(ApiError::bad_request("Scheduled date must be in the future"));
                    }
                    sqlx::query(
                        "UPDATE recommendations
                         SET status = 'scheduled', scheduled_for = ?, updated_at = CURRENT_TIMESTAMP
                         WHERE id = ?",
                    )
                    .bind(date)
                    .bind(&rec.id)
                    .execute(&self.pool)
                    .await?;
                    Ok((self.get(&rec.id).await?, None))
                },
                _ => Err(ApiError::invalid_transition(rec.status.as_str(), "schedule")),
            },

            "execute" => match rec.status {
                RecommendationStatus::Pending
                | RecommendationStatus::Approved
                | RecommendationStatus::Scheduled => {
                    let result = self.execute_recommendation(&rec, &actor).await?;
                    Ok((self.get(&rec.id).await?, Some(result)))
                },
                _ => Err(ApiError::invalid_transition(rec.status.as_str(), "execute")),
            },

            other => Err(ApiError::bad_request(format!(
                "Unknown recommendation action: {}",
                other
            ))),
        }
    }

    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM recommendations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(format!("Recommendation not found: {}", id)));
        }
        Ok(())
    }

    /// Scheduled records whose time has come (background poller input)
    pub async fn list_due_scheduled(&self) -> ApiResult<Vec<Recommendation>> {
        Ok(sqlx::query_as(
            "SELECT * FROM recommendations
             WHERE status = 'scheduled' AND scheduled_for <= CURRENT_TIMESTAMP
             ORDER BY scheduled_for",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn execute_recommendation(
        &self,
        rec: &Recommendation,
        actor: &str,
    ) -> ApiResult<ActionResult> {
        let params = ExecuteActionParams {
            action: rec.recommended_action.clone(),
            resource_type: rec.resource_type.clone(),
            resource_id: rec.resource_id.clone(),
            resource_name: Some(rec.resource_name.clone()),
            detection_id: Some(rec.detection_id.clone()),
            scenario_id: Some(rec.scenario_id.clone()),
            details: Some(rec.details.0.clone()),
            executed_by: Some(actor.to_string()),
        };

        let result = self.executor.execute_action(&params).await?;

        if result.success {
            self.mark_actioned(&rec.id, RecommendationStatus::Executed, actor).await?;
        } else {
            tracing::warn!(
                "Execution of recommendation {} failed; record stays {}: {}",
                rec.id,
                rec.status.as_str(),
                result.message
            );
        }

        Ok(result)
    }

    async fn mark_actioned(
        &self,
        id: &str,
        status: RecommendationStatus,
        actor: &str,
    ) -> ApiResult<()> {
        sqlx::query(
            "UPDATE recommendations
             SET status = ?, actioned_by = ?, actioned_at = CURRENT_TIMESTAMP,
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
        )
        .bind(status)
        .bind(actor)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_status_fields(
        &self,
        id: &str,
        status: RecommendationStatus,
        extra_set: &str,
    ) -> ApiResult<()> {
        let sql = format!(
            "UPDATE recommendations SET status = ?, {}, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            extra_set
        );
        sqlx::query(&sql).bind(status).bind(id).execute(&self.pool).await?;
        Ok(())
    }
}
