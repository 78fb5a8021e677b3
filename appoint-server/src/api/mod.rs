pub mod health;
pub mod pull_requests;
pub mod statistics;
pub mod teams;
pub mod types;
pub mod users;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/team/add", post(teams::add_team))
        .route("/team/get", get(teams::get_team))
        .route("/users/setIsActive", post(users::set_is_active))
        .route("/users/getReview", get(users::get_review))
        .route("/pullRequest/create", post(pull_requests::create))
        .route("/pullRequest/merge", post(pull_requests::merge))
        .route("/pullRequest/reassign", post(pull_requests::reassign))
        .route(
            "/api/statistics/reviewer-assignments",
            get(statistics::reviewer_assignments),
        )
        .route(
            "/api/statistics/pr-statistics",
            get(statistics::pr_statistics),
        )
        .route("/health", get(health::health_check))
        .route("/help", get(health::help_handler))
}
