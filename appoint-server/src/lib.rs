pub mod api;
pub mod config;
pub mod error;
pub mod repository;

use std::sync::Arc;

use axum::Router;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use appoint_core::AppointService;

pub use repository::{SqliteRepository, Stores};

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub fn get_service_version() -> String {
    // Explicit override from the packaging environment
    if let Some(git_hash) = option_env!("APPOINT_GIT_HASH") {
        short_hash(git_hash)
    } else if let Some(git_hash) = built_info::GIT_COMMIT_HASH {
        // Fall back to built crate's git detection (for cargo builds)
        short_hash(git_hash)
    } else {
        "unknown".to_string()
    }
}

fn short_hash(hash: &str) -> String {
    hash.chars().take(8).collect()
}

pub struct AppState {
    pub service: AppointService,
}

impl AppState {
    /// Build the service over `stores`, seeding reviewer selection if asked.
    pub fn new(stores: Stores, rng_seed: Option<u64>) -> Self {
        let service = match rng_seed {
            Some(seed) => {
                info!("Reviewer selection seeded with {}", seed);
                AppointService::with_rng(
                    stores.membership,
                    stores.pull_requests,
                    Box::new(StdRng::seed_from_u64(seed)),
                )
            }
            None => AppointService::new(stores.membership, stores.pull_requests),
        };
        Self { service }
    }
}

pub fn app_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
