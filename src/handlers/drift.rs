use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;
use crate::models::{DriftTickRequest, DriftTickResult};
use crate::utils::ApiResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct DriftTickResponse {
    pub success: bool,
    pub data: DriftTickResult,
}

// Advance the simulated world one virtual day
#[utoipa::path(
    post,
    path = "/api/drift-tick",
    request_body = DriftTickRequest,
    responses(
        (status = 200, description = "Drift tick result", body = DriftTickResponse)
    ),
    tag = "Drift"
)]
pub async fn drift_tick(
    State(state): State<Arc<AppState>>,
    body: Option<Json<DriftTickRequest>>,
) -> ApiResult<Json<DriftTickResponse>> {
    let auto_execute = body.and_then(|b| b.auto_execute);
    tracing::info!("Drift tick requested (autoExecute={:?})", auto_execute);

    let result = state.drift_service.tick(auto_execute).await?;
    Ok(Json(DriftTickResponse { success: true, data: result }))
}
