pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod repository;
pub mod service;
pub mod statistics;

pub use engine::{ReassignOutcome, ReviewerEngine, MAX_REVIEWERS};
pub use error::{AppointError, ErrorKind, RepositoryError};
pub use lifecycle::{MergeTransition, PrLifecycle, PrStatus};
pub use model::*;
pub use repository::{
    InMemoryRepository, InsertOutcome, MembershipRepository, PullRequestRepository,
};
pub use service::{AppointService, ReassignResult, UserProfile};
pub use statistics::PrStatistics;
