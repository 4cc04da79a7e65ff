//! Conflict analysis endpoint

use axum::{extract::State, routing::post, Json, Router};

use crate::analysis::{AnalysisRequest, AnalysisResponse};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /analyze
///
/// Scores every candidate date in the request against aggregated
/// competing events and returns the partitioned assessment. Invalid
/// input is the only client-visible failure; provider and cache trouble
/// surface in the diagnostics array instead.
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> ApiResult<Json<AnalysisResponse>> {
    if request.city.trim().is_empty() {
        return Err(ApiError::BadRequest("city is required".to_string()));
    }
    if request.category.trim().is_empty() {
        return Err(ApiError::BadRequest("category is required".to_string()));
    }

    tracing::info!(
        city = %request.city,
        category = %request.category,
        candidates = request.candidate_dates.len(),
        "Analysis requested"
    );

    match state.analyzer.analyze(request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            *state.last_error.write().await = Some(e.to_string());
            Err(e.into())
        }
    }
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new().route("/analyze", post(analyze))
}
