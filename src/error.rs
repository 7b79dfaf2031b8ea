use thiserror::Error;

/// Failures at the edges of the core. The engines themselves are total and
/// never return these.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown rate limit profile: {0}")]
    UnknownProfile(String),
    #[error("invalid value for {key}: {value:?}")]
    InvalidConfig { key: &'static str, value: String },
}
