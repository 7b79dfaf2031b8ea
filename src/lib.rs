//! Adaptive control core for the language-learning backend.
//!
//! Four independent decision engines, none of which performs I/O:
//!
//! - [`services::review_scheduler`] - SM-2 and fixed-ladder review scheduling
//! - [`services::rate_limit`] - fixed-window request admission per caller
//! - [`services::provider_health`] - rolling-window circuit breaking for
//!   interchangeable speech providers
//! - [`services::learning_position`] - heuristic composite ability score and
//!   difficulty recommendation
//!
//! The stateful engines are plain owned values. Create one per process (or
//! per test) and share it behind an `Arc`.

pub mod config;
pub mod error;
pub mod logging;
pub mod services;

pub use config::Config;
pub use error::CoreError;
pub use services::learning_position::{
    estimate, AbilityBand, DifficultyPreference, LearningPosition, LearningSnapshot, LevelDetails,
};
pub use services::provider_health::{
    CircuitBreakerConfig, ProviderHealthMonitor, ProviderMetricsSnapshot,
};
pub use services::rate_limit::{
    client_identifier, RateLimitConfig, RateLimitDecision, RateLimitProfile, RateLimiter,
};
pub use services::review_scheduler::{
    review_status, ReviewRecord, ReviewState, ReviewStatus, SchedulerKind,
};
