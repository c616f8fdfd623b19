use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;
use crate::models::AuditEntry;
use crate::utils::ApiResult;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AuditLogQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    pub success: bool,
    pub data: Vec<AuditEntry>,
}

// Most recent audit entries, reverse chronological
#[utoipa::path(
    get,
    path = "/api/audit-log",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum entries to return (default 50)")
    ),
    responses(
        (status = 200, description = "Audit entries", body = AuditLogResponse)
    ),
    tag = "Audit"
)]
pub async fn list_audit_log(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<AuditLogResponse>> {
    let entries = state.audit_log_service.list_recent(query.limit.unwrap_or(50)).await?;
    Ok(Json(AuditLogResponse { success: true, data: entries }))
}
