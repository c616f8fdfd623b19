use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;
use crate::models::DetectionResult;
use crate::utils::ApiResult;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DetectWasteRequest {
    /// Bypass the scan cache and force a fresh scan
    #[serde(default)]
    pub refresh: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DetectWasteResponse {
    pub success: bool,
    pub data: DetectionResult,
}

// Run or refresh the waste detection scan
#[utoipa::path(
    post,
    path = "/api/detect-waste",
    request_body = DetectWasteRequest,
    responses(
        (status = 200, description = "Detection scan result", body = DetectWasteResponse)
    ),
    tag = "Detection"
)]
pub async fn detect_waste(
    State(state): State<Arc<AppState>>,
    body: Option<Json<DetectWasteRequest>>,
) -> ApiResult<Json<DetectWasteResponse>> {
    let refresh = body.and_then(|b| b.refresh).unwrap_or(false);
    tracing::debug!("Detection scan requested (refresh={})", refresh);

    let result = state.detection_service.detect_all(refresh).await?;
    Ok(Json(DetectWasteResponse { success: true, data: result }))
}
