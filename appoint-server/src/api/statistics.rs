use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use appoint_core::PrStatistics;

use crate::error::ApiResult;
use crate::AppState;

/// `GET /api/statistics/reviewer-assignments`: username to assignment count.
pub async fn reviewer_assignments(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<BTreeMap<String, usize>>> {
    Ok(Json(state.service.reviewer_assignment_counts().await?))
}

/// `GET /api/statistics/pr-statistics`
pub async fn pr_statistics(State(state): State<Arc<AppState>>) -> ApiResult<Json<PrStatistics>> {
    Ok(Json(state.service.pr_statistics().await?))
}
