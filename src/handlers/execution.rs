use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;
use crate::models::{ActionResult, ExecuteActionParams, ExecutionMode};
use crate::services::scan_cache::DEFAULT_SCOPE;
use crate::utils::ApiResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct ExecuteActionResponse {
    pub success: bool,
    pub data: ActionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// Execute an action directly (used for alternative actions from the UI)
#[utoipa::path(
    post,
    path = "/api/execute-action",
    request_body = ExecuteActionParams,
    responses(
        (status = 200, description = "Action result (success=false on handler failure)", body = ExecuteActionResponse)
    ),
    tag = "Execution"
)]
pub async fn execute_action(
    State(state): State<Arc<AppState>>,
    Json(params): Json<ExecuteActionParams>,
) -> ApiResult<Json<ExecuteActionResponse>> {
    tracing::info!(
        "Direct action '{}' on {} '{}'",
        params.action,
        params.resource_type,
        params.resource_id
    );

    let result = state.execution_service.execute_action(&params).await?;
    let error = (!result.success).then(|| result.message.clone());
    Ok(Json(ExecuteActionResponse { success: result.success, data: result, error }))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ExecutionModeQuery {
    pub account_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetExecutionModeRequest {
    pub mode: ExecutionMode,
    pub account_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExecutionModeResponse {
    pub success: bool,
    pub data: ExecutionMode,
}

// Read the execution mode (manual unless explicitly automated)
#[utoipa::path(
    get,
    path = "/api/execution-mode",
    params(
        ("account_id" = Option<String>, Query, description = "Account; defaults to the process scope")
    ),
    responses(
        (status = 200, description = "Current mode", body = ExecutionModeResponse)
    ),
    tag = "Execution"
)]
pub async fn get_execution_mode(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExecutionModeQuery>,
) -> ApiResult<Json<ExecutionModeResponse>> {
    let account = query.account_id.as_deref().unwrap_or(DEFAULT_SCOPE);
    let mode = state.execution_mode_service.get_mode(account).await?;
    Ok(Json(ExecutionModeResponse { success: true, data: mode }))
}

// Switch between manual and automated execution
#[utoipa::path(
    put,
    path = "/api/execution-mode",
    request_body = SetExecutionModeRequest,
    responses(
        (status = 200, description = "Mode updated", body = ExecutionModeResponse)
    ),
    tag = "Execution"
)]
pub async fn set_execution_mode(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetExecutionModeRequest>,
) -> ApiResult<Json<ExecutionModeResponse>> {
    let account = req.account_id.as_deref().unwrap_or(DEFAULT_SCOPE);
    let mode = state.execution_mode_service.set_mode(account, req.mode).await?;
    Ok(Json(ExecutionModeResponse { success: true, data: mode }))
}
