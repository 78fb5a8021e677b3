use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;

use appoint_core::UserId;

use super::types::{
    GetReviewResponse, PullRequestShortDto, SetIsActiveRequest, UserDto, UserQuery, UserResponse,
    MAX_ID_CHARS,
};
use crate::error::{validate_field, ApiResult};
use crate::AppState;

/// `POST /users/setIsActive`
pub async fn set_is_active(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SetIsActiveRequest>, JsonRejection>,
) -> ApiResult<Json<UserResponse>> {
    let Json(request) = payload?;
    validate_field("user_id", &request.user_id, MAX_ID_CHARS)?;

    let profile = state
        .service
        .set_user_active(&UserId(request.user_id), request.is_active)
        .await?;

    Ok(Json(UserResponse {
        user: UserDto::from(profile),
    }))
}

/// `GET /users/getReview?user_id=`
pub async fn get_review(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<Json<GetReviewResponse>> {
    let Query(query) = query?;
    validate_field("user_id", &query.user_id, MAX_ID_CHARS)?;
    let user_id = UserId(query.user_id);

    let prs = state.service.reviews_of_user(&user_id).await?;

    Ok(Json(GetReviewResponse {
        user_id,
        pull_requests: prs.into_iter().map(PullRequestShortDto::from).collect(),
    }))
}
