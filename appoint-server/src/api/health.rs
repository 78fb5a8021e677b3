use axum::http::StatusCode;
use axum::response::Json;
use serde_json::json;

pub async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "appoint",
        "version": crate::get_service_version()
    })))
}

pub async fn help_handler() -> Json<serde_json::Value> {
    let version = crate::get_service_version();
    Json(json!({
        "service": "appoint",
        "version": version,
        "description": "Appoints pull request reviewers at random from the author's teams",
        "endpoints": [
            {
                "path": "/team/add",
                "method": "POST",
                "description": "Create a team and create or update its members"
            },
            {
                "path": "/team/get",
                "method": "GET",
                "description": "Get a team with its members (query: team_name)"
            },
            {
                "path": "/users/setIsActive",
                "method": "POST",
                "description": "Activate or deactivate a user"
            },
            {
                "path": "/users/getReview",
                "method": "GET",
                "description": "Pull requests a user is reviewing (query: user_id)"
            },
            {
                "path": "/pullRequest/create",
                "method": "POST",
                "description": "Create a pull request and assign up to two reviewers"
            },
            {
                "path": "/pullRequest/merge",
                "method": "POST",
                "description": "Mark a pull request as merged (idempotent)"
            },
            {
                "path": "/pullRequest/reassign",
                "method": "POST",
                "description": "Replace one reviewer with another member of their team"
            },
            {
                "path": "/api/statistics/reviewer-assignments",
                "method": "GET",
                "description": "Number of current review assignments per username"
            },
            {
                "path": "/api/statistics/pr-statistics",
                "method": "GET",
                "description": "Pull request counts by status and reviewer coverage"
            },
            {
                "path": "/health",
                "method": "GET",
                "description": "Health check endpoint"
            },
            {
                "path": "/help",
                "method": "GET",
                "description": "API documentation and service information"
            }
        ],
        "configuration": {
            "optional_env_vars": [
                "PORT (default: 8080)",
                "STORAGE_BACKEND (sqlite or memory, default: sqlite)",
                "STATE_DIR (default: current directory)",
                "RNG_SEED (default: seeded from the OS)"
            ]
        }
    }))
}
