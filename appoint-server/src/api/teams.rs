use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;

use appoint_core::TeamName;

use super::types::{TeamDto, TeamQuery, TeamResponse, MAX_NAME_CHARS};
use crate::error::{validate_field, ApiResult};
use crate::AppState;

/// `POST /team/add`
pub async fn add_team(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TeamDto>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TeamResponse>)> {
    let Json(dto) = payload?;
    dto.validate()?;

    let team = state
        .service
        .add_team(TeamName(dto.team_name.clone()), dto.members_as_users())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TeamResponse {
            team: TeamDto::from(team),
        }),
    ))
}

/// `GET /team/get?team_name=`
pub async fn get_team(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TeamQuery>, QueryRejection>,
) -> ApiResult<Json<TeamDto>> {
    let Query(query) = query?;
    validate_field("team_name", &query.team_name, MAX_NAME_CHARS)?;

    let team = state.service.get_team(&TeamName(query.team_name)).await?;
    Ok(Json(TeamDto::from(team)))
}
