use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use appoint_core::{PullRequestId, ReassignOutcome, UserId};

use super::types::{
    CreatePullRequestRequest, MergePullRequestRequest, PullRequestDto, PullRequestResponse,
    ReassignReviewerRequest, ReassignReviewerResponse, MAX_ID_CHARS,
};
use crate::error::{validate_field, ApiError, ApiResult};
use crate::AppState;

/// `POST /pullRequest/create`
pub async fn create(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreatePullRequestRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PullRequestResponse>)> {
    let Json(request) = payload?;
    request.validate()?;

    let pr = state
        .service
        .create_pull_request(
            PullRequestId(request.pull_request_id),
            request.pull_request_name,
            UserId(request.author_id),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PullRequestResponse {
            pr: PullRequestDto::from(pr),
        }),
    ))
}

/// `POST /pullRequest/merge`
pub async fn merge(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MergePullRequestRequest>, JsonRejection>,
) -> ApiResult<Json<PullRequestResponse>> {
    let Json(request) = payload?;
    validate_field("pull_request_id", &request.pull_request_id, MAX_ID_CHARS)?;

    let pr = state
        .service
        .merge_pull_request(&PullRequestId(request.pull_request_id))
        .await?;

    Ok(Json(PullRequestResponse {
        pr: PullRequestDto::from(pr),
    }))
}

/// `POST /pullRequest/reassign`
pub async fn reassign(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReassignReviewerRequest>, JsonRejection>,
) -> ApiResult<Json<ReassignReviewerResponse>> {
    let Json(request) = payload?;
    validate_field("pull_request_id", &request.pull_request_id, MAX_ID_CHARS)?;
    validate_field("old_user_id", &request.old_user_id, MAX_ID_CHARS)?;

    let result = state
        .service
        .reassign_reviewer(
            &PullRequestId(request.pull_request_id),
            &UserId(request.old_user_id),
        )
        .await?;

    match result.outcome {
        ReassignOutcome::Replaced { new_reviewer } => Ok(Json(ReassignReviewerResponse {
            pr: PullRequestDto::from(result.pull_request),
            replaced_by: new_reviewer,
        })),
        ReassignOutcome::NoCandidate => Err(ApiError::NoCandidate),
    }
}
