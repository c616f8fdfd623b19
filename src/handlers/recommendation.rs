use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;
use crate::models::{
    ActionResult, ImpactLevel, Recommendation, RecommendationActionRequest, RecommendationFilter,
    RecommendationStatus, RecommendationSummary,
};
use crate::utils::{ApiError, ApiResult};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RecommendationQuery {
    /// Single status or comma-separated set
    pub status: Option<String>,
    pub scenario_id: Option<String>,
    pub resource_type: Option<String>,
    pub impact_level: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// With summary=true the aggregate rollup is returned instead of a list
    pub summary: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum RecommendationListData {
    List(Vec<Recommendation>),
    Summary(RecommendationSummary),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecommendationListResponse {
    pub success: bool,
    pub data: RecommendationListData,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateRecommendationsRequest {
    /// Must be true; reserved for future ingestion sources
    #[serde(default)]
    pub generate: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateRecommendationsResponse {
    pub success: bool,
    pub created: i64,
    pub skipped: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecommendationActionResponse {
    pub success: bool,
    pub data: Recommendation,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "executionResult")]
    pub execution_result: Option<ActionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteRecommendationQuery {
    pub id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteRecommendationResponse {
    pub success: bool,
    pub message: String,
}

fn parse_filter(query: &RecommendationQuery) -> ApiResult<RecommendationFilter> {
    let status = match &query.status {
        None => None,
        Some(raw) => {
            let mut parsed = Vec::new();
            for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                parsed.push(
                    RecommendationStatus::from_str(part).map_err(ApiError::bad_request)?,
                );
            }
            if parsed.is_empty() { None } else { Some(parsed) }
        },
    };

    let impact_level = query
        .impact_level
        .as_deref()
        .map(ImpactLevel::from_str)
        .transpose()
        .map_err(ApiError::bad_request)?;

    Ok(RecommendationFilter {
        status,
        scenario_id: query.scenario_id.clone(),
        resource_type: query.resource_type.clone(),
        impact_level,
        limit: query.limit,
        offset: query.offset,
    })
}

// List recommendations or return the summary rollup
#[utoipa::path(
    get,
    path = "/api/recommendations",
    params(
        ("status" = Option<String>, Query, description = "Status filter (single or comma-separated)"),
        ("scenario_id" = Option<String>, Query, description = "Scenario filter"),
        ("resource_type" = Option<String>, Query, description = "Resource type filter"),
        ("impact_level" = Option<String>, Query, description = "Impact level filter"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("offset" = Option<i64>, Query, description = "Page offset"),
        ("summary" = Option<bool>, Query, description = "Return the summary rollup instead")
    ),
    responses(
        (status = 200, description = "Recommendations or summary", body = RecommendationListResponse)
    ),
    tag = "Recommendations"
)]
pub async fn list_recommendations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecommendationQuery>,
) -> ApiResult<Json<RecommendationListResponse>> {
    if query.summary.unwrap_or(false) {
        let summary = state.recommendation_service.summary().await?;
        return Ok(Json(RecommendationListResponse {
            success: true,
            data: RecommendationListData::Summary(summary),
        }));
    }

    let filter = parse_filter(&query)?;
    let recommendations = state.recommendation_service.list(&filter).await?;
    Ok(Json(RecommendationListResponse {
        success: true,
        data: RecommendationListData::List(recommendations),
    }))
}

// Generate recommendations from a fresh detection scan
#[utoipa::path(
    post,
    path = "/api/recommendations",
    request_body = GenerateRecommendationsRequest,
    responses(
        (status = 200, description = "Ingestion outcome", body = GenerateRecommendationsResponse)
    ),
    tag = "Recommendations"
)]
pub async fn generate_recommendations(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRecommendationsRequest>,
) -> ApiResult<Json<GenerateRecommendationsResponse>> {
    if !req.generate {
        return Err(ApiError::bad_request("Set generate=true to ingest from detection"));
    }

    let scan = state.detection_service.detect_all(true).await?;
    let outcome = state.recommendation_service.ingest(&scan.detections).await?;

    Ok(Json(GenerateRecommendationsResponse {
        success: true,
        created: outcome.created,
        skipped: outcome.skipped,
    }))
}

// Drive a recommendation through a state transition
#[utoipa::path(
    patch,
    path = "/api/recommendations",
    request_body = RecommendationActionRequest,
    responses(
        (status = 200, description = "Updated recommendation", body = RecommendationActionResponse),
        (status = 400, description = "Invalid state transition"),
        (status = 404, description = "Recommendation not found")
    ),
    tag = "Recommendations"
)]
pub async fn action_recommendation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecommendationActionRequest>,
) -> ApiResult<Json<RecommendationActionResponse>> {
    tracing::info!("Recommendation {}: action '{}' requested", req.id, req.action);

    let (rec, execution_result) = state.recommendation_service.transition(&req).await?;

    // A failed execution leaves the record in its prior state; surface the
    // executor's message verbatim.
    let (success, error) = match &execution_result {
        Some(result) if !result.success => (false, Some(result.message.clone())),
        _ => (true, None),
    };

    Ok(Json(RecommendationActionResponse { success, data: rec, execution_result, error }))
}

// Delete a recommendation
#[utoipa::path(
    delete,
    path = "/api/recommendations",
    params(
        ("id" = String, Query, description = "Recommendation ID")
    ),
    responses(
        (status = 200, description = "Deleted", body = DeleteRecommendationResponse),
        (status = 404, description = "Recommendation not found")
    ),
    tag = "Recommendations"
)]
pub async fn delete_recommendation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeleteRecommendationQuery>,
) -> ApiResult<Json<DeleteRecommendationResponse>> {
    state.recommendation_service.delete(&query.id).await?;
    Ok(Json(DeleteRecommendationResponse {
        success: true,
        message: "Recommendation deleted".to_string(),
    }))
}
