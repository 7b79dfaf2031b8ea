pub mod learning_position;
pub mod provider_health;
pub mod rate_limit;
pub mod review_scheduler;
