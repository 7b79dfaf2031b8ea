//! Fixed-window request admission keyed by caller identity.
//!
//! The store lives in process memory only. Two server instances behind a
//! load balancer each admit `limit` requests per window; a shared store is
//! required before this can be used for multi-instance deployments.

use std::collections::HashMap;
use std::str::FromStr;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const CLEANUP_INTERVAL_MS: i64 = 60_000;
const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    pub limit: u32,
    pub window_seconds: u32,
}

impl RateLimitConfig {
    pub const fn new(limit: u32, window_seconds: u32) -> Self {
        Self {
            limit,
            window_seconds,
        }
    }

    fn window_ms(&self) -> i64 {
        self.window_seconds as i64 * 1000
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitProfile {
    /// Chat completion and other LLM calls.
    Ai,
    /// Speech-to-text and text-to-speech.
    Audio,
    Light,
}

impl RateLimitProfile {
    pub const ALL: [RateLimitProfile; 3] = [Self::Ai, Self::Audio, Self::Light];

    pub const fn config(&self) -> RateLimitConfig {
        match self {
            Self::Ai => RateLimitConfig::new(30, 60),
            Self::Audio => RateLimitConfig::new(40, 60),
            Self::Light => RateLimitConfig::new(60, 60),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Audio => "audio",
            Self::Light => "light",
        }
    }
}

impl FromStr for RateLimitProfile {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ai" => Ok(Self::Ai),
            "audio" => Ok(Self::Audio),
            "light" => Ok(Self::Light),
            other => Err(CoreError::UnknownProfile(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

/// `user:<email>` for signed-in callers, otherwise `ip:` plus the first
/// hop of the forwarded-for header.
pub fn client_identifier(user_email: Option<&str>, forwarded_for: Option<&str>) -> String {
    if let Some(email) = user_email.map(str::trim).filter(|e| !e.is_empty()) {
        return format!("user:{email}");
    }

    let ip = forwarded_for
        .and_then(|raw| raw.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_CLIENT);
    format!("ip:{ip}")
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u32,
    reset_at_ms: i64,
}

#[derive(Debug)]
struct RateLimiterState {
    entries: HashMap<String, Entry>,
    last_cleanup_ms: i64,
}

#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<RateLimiterState>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_start(now_ms())
    }

    fn with_start(now_ms: i64) -> Self {
        Self {
            state: Mutex::new(RateLimiterState {
                entries: HashMap::new(),
                last_cleanup_ms: now_ms,
            }),
        }
    }

    pub fn check(&self, identifier: &str, config: RateLimitConfig) -> RateLimitDecision {
        self.check_at(identifier, config, now_ms())
    }

    pub fn check_profile(&self, identifier: &str, profile: RateLimitProfile) -> RateLimitDecision {
        self.check(identifier, profile.config())
    }

    pub fn check_at(
        &self,
        identifier: &str,
        config: RateLimitConfig,
        now_ms: i64,
    ) -> RateLimitDecision {
        let mut state = self.state.lock();

        if now_ms.saturating_sub(state.last_cleanup_ms) >= CLEANUP_INTERVAL_MS {
            let before = state.entries.len();
            state.entries.retain(|_, entry| now_ms <= entry.reset_at_ms);
            state.last_cleanup_ms = now_ms;
            let purged = before - state.entries.len();
            if purged > 0 {
                tracing::debug!(purged, remaining = state.entries.len(), "rate limit entries purged");
            }
        }

        let fresh = Entry {
            count: 1,
            reset_at_ms: now_ms.saturating_add(config.window_ms()),
        };
        let entry = state
            .entries
            .entry(identifier.to_string())
            .and_modify(|entry| {
                if now_ms > entry.reset_at_ms {
                    *entry = fresh;
                } else {
                    entry.count = entry.count.saturating_add(1);
                }
            })
            .or_insert(fresh);
        let entry = *entry;

        if entry.count > config.limit && entry.count > 1 {
            let wait_ms = entry.reset_at_ms.saturating_sub(now_ms).max(0) as u64;
            let retry_after = wait_ms.div_ceil(1000);
            tracing::warn!(
                identifier = %identifier,
                limit = config.limit,
                retry_after_seconds = retry_after,
                "rate limit exceeded"
            );
            return RateLimitDecision {
                allowed: false,
                limit: config.limit,
                remaining: 0,
                retry_after_seconds: Some(retry_after),
            };
        }

        RateLimitDecision {
            allowed: true,
            limit: config.limit,
            remaining: config.limit.saturating_sub(entry.count),
            retry_after_seconds: None,
        }
    }

    pub fn reset(&self, identifier: &str) -> bool {
        self.state.lock().entries.remove(identifier).is_some()
    }

    /// Tracked keys, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
