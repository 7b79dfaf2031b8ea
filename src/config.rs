use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::services::provider_health::{CircuitBreakerConfig, ProviderHealthMonitor};
use crate::services::rate_limit::{RateLimitConfig, RateLimitProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitProfiles {
    pub ai: RateLimitConfig,
    pub audio: RateLimitConfig,
    pub light: RateLimitConfig,
}

impl Default for RateLimitProfiles {
    fn default() -> Self {
        Self {
            ai: RateLimitProfile::Ai.config(),
            audio: RateLimitProfile::Audio.config(),
            light: RateLimitProfile::Light.config(),
        }
    }
}

impl RateLimitProfiles {
    pub fn get(&self, profile: RateLimitProfile) -> RateLimitConfig {
        match profile {
            RateLimitProfile::Ai => self.ai,
            RateLimitProfile::Audio => self.audio,
            RateLimitProfile::Light => self.light,
        }
    }

    fn get_mut(&mut self, profile: RateLimitProfile) -> &mut RateLimitConfig {
        match profile {
            RateLimitProfile::Ai => &mut self.ai,
            RateLimitProfile::Audio => &mut self.audio,
            RateLimitProfile::Light => &mut self.light,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub log_level: String,
    pub rate_limits: RateLimitProfiles,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            rate_limits: RateLimitProfiles::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl Config {
    /// Reads `.env` if present, then the process environment. Invalid values
    /// are logged and replaced with defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup_or_default(|key| std::env::var(key).ok())
    }

    pub fn from_lookup_or_default<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Logging is configured from this value, so no subscriber exists yet.
        Self::from_lookup(lookup).unwrap_or_else(|err| {
            eprintln!("invalid core configuration, using defaults: {err}");
            Self::default()
        })
    }

    pub fn try_from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(level) = non_empty(lookup("RUST_LOG")) {
            config.log_level = level;
        }

        for profile in RateLimitProfile::ALL {
            let (limit_key, window_key) = profile_env_keys(profile);
            let target = config.rate_limits.get_mut(profile);
            if let Some(limit) = parse_checked(&lookup, limit_key, |v: &u32| *v > 0)? {
                target.limit = limit;
            }
            if let Some(window) = parse_checked(&lookup, window_key, |v: &u32| *v > 0)? {
                target.window_seconds = window;
            }
        }

        if let Some(cooldown) =
            parse_checked(&lookup, "CIRCUIT_BREAKER_COOLDOWN_MS", |v: &i64| *v >= 0)?
        {
            config.circuit_breaker.cooldown_ms = cooldown;
        }

        Ok(config)
    }

    pub fn rate_limit(&self, profile: RateLimitProfile) -> RateLimitConfig {
        self.rate_limits.get(profile)
    }

    pub fn provider_health_monitor(&self) -> ProviderHealthMonitor {
        ProviderHealthMonitor::new(self.circuit_breaker)
    }
}

fn profile_env_keys(profile: RateLimitProfile) -> (&'static str, &'static str) {
    match profile {
        RateLimitProfile::Ai => ("RATE_LIMIT_AI_LIMIT", "RATE_LIMIT_AI_WINDOW_SECONDS"),
        RateLimitProfile::Audio => ("RATE_LIMIT_AUDIO_LIMIT", "RATE_LIMIT_AUDIO_WINDOW_SECONDS"),
        RateLimitProfile::Light => ("RATE_LIMIT_LIGHT_LIMIT", "RATE_LIMIT_LIGHT_WINDOW_SECONDS"),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses `key` and rejects values outside the range `valid` accepts. A
/// zero window or limit, or a negative cooldown, would switch the guard off.
fn parse_checked<F, T, V>(lookup: &F, key: &'static str, valid: V) -> Result<Option<T>, CoreError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    V: Fn(&T) -> bool,
{
    let Some(raw) = non_empty(lookup(key)) else {
        return Ok(None);
    };
    match raw.parse::<T>() {
        Ok(value) if valid(&value) => Ok(Some(value)),
        _ => Err(CoreError::InvalidConfig { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_contract() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.rate_limit(RateLimitProfile::Ai), RateLimitConfig::new(30, 60));
        assert_eq!(config.rate_limit(RateLimitProfile::Audio), RateLimitConfig::new(40, 60));
        assert_eq!(config.rate_limit(RateLimitProfile::Light), RateLimitConfig::new(60, 60));
        assert_eq!(config.circuit_breaker.cooldown_ms, 60_000);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("RUST_LOG", "debug"),
            ("RATE_LIMIT_AUDIO_LIMIT", "5"),
            ("RATE_LIMIT_LIGHT_WINDOW_SECONDS", " 120 "),
            ("CIRCUIT_BREAKER_COOLDOWN_MS", "15000"),
        ]))
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.rate_limits.audio, RateLimitConfig::new(5, 60));
        assert_eq!(config.rate_limits.light, RateLimitConfig::new(60, 120));
        assert_eq!(config.rate_limits.ai, RateLimitConfig::new(30, 60));
        assert_eq!(config.provider_health_monitor().config().cooldown_ms, 15_000);
    }

    #[test]
    fn test_invalid_value_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("RATE_LIMIT_AI_LIMIT", "lots")])).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidConfig {
                key: "RATE_LIMIT_AI_LIMIT",
                value: "lots".to_string()
            }
        );
    }

    #[test]
    fn test_values_that_disable_guards_are_rejected() {
        let cases = [
            ("CIRCUIT_BREAKER_COOLDOWN_MS", "-1"),
            ("RATE_LIMIT_AI_WINDOW_SECONDS", "0"),
            ("RATE_LIMIT_AUDIO_LIMIT", "0"),
            ("RATE_LIMIT_LIGHT_LIMIT", "-5"),
        ];
        for (key, value) in cases {
            let err = Config::from_lookup(lookup_from(&[(key, value)])).unwrap_err();
            assert_eq!(
                err,
                CoreError::InvalidConfig {
                    key,
                    value: value.to_string()
                }
            );
        }
    }

    #[test]
    fn test_invalid_value_falls_back_to_defaults() {
        let config = Config::from_lookup_or_default(lookup_from(&[
            ("RUST_LOG", "trace"),
            ("RATE_LIMIT_AI_WINDOW_SECONDS", "0"),
        ]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_zero_cooldown_is_allowed() {
        let config =
            Config::from_lookup(lookup_from(&[("CIRCUIT_BREAKER_COOLDOWN_MS", "0")])).unwrap();
        assert_eq!(config.circuit_breaker.cooldown_ms, 0);
    }
}
