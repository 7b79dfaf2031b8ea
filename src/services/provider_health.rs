//! Rolling-window health tracking for interchangeable speech providers.
//!
//! There is no stored closed/open/half-open flag. Every decision is derived
//! from the last few outcomes and the age of the last failure, so a restart
//! only loses history.
//!
//! Providers that have seen no traffic for an hour are dropped by an
//! opportunistic sweep on the record paths. A dropped provider starts over
//! with the optimistic defaults.

use std::collections::{BTreeMap, HashMap, VecDeque};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub const RESULT_WINDOW_SIZE: usize = 10;
pub const LATENCY_WINDOW_SIZE: usize = 20;
pub const MIN_SAMPLES: usize = 3;
pub const FAILURE_RATE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_COOLDOWN_MS: i64 = 60_000;
pub const IDLE_EVICT_MS: i64 = 3_600_000;
const CLEANUP_INTERVAL_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerConfig {
    pub min_samples: usize,
    pub failure_rate_threshold: f64,
    pub cooldown_ms: i64,
    pub result_window: usize,
    pub latency_window: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            min_samples: MIN_SAMPLES,
            failure_rate_threshold: FAILURE_RATE_THRESHOLD,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            result_window: RESULT_WINDOW_SIZE,
            latency_window: LATENCY_WINDOW_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ProviderMetrics {
    total_requests: u64,
    successes: u64,
    failures: u64,
    recent_latencies: VecDeque<u64>,
    recent_results: VecDeque<bool>,
    last_success_ms: Option<i64>,
    last_failure_ms: Option<i64>,
}

impl ProviderMetrics {
    fn push_result(&mut self, ok: bool, cap: usize) {
        self.recent_results.push_back(ok);
        while self.recent_results.len() > cap {
            self.recent_results.pop_front();
        }
    }

    fn push_latency(&mut self, latency_ms: u64, cap: usize) {
        self.recent_latencies.push_back(latency_ms);
        while self.recent_latencies.len() > cap {
            self.recent_latencies.pop_front();
        }
    }

    fn last_activity_ms(&self) -> Option<i64> {
        self.last_success_ms.max(self.last_failure_ms)
    }

    fn is_tripped(&self, config: &CircuitBreakerConfig) -> bool {
        self.recent_results.len() >= config.min_samples
            && self.failure_rate() > config.failure_rate_threshold
    }

    fn failure_rate(&self) -> f64 {
        if self.recent_results.is_empty() {
            return 0.0;
        }
        let failed = self.recent_results.iter().filter(|ok| !**ok).count();
        failed as f64 / self.recent_results.len() as f64
    }

    fn snapshot(&self) -> ProviderMetricsSnapshot {
        let success_rate = if self.total_requests > 0 {
            self.successes as f64 / self.total_requests as f64
        } else {
            1.0
        };
        ProviderMetricsSnapshot {
            total_requests: self.total_requests,
            successes: self.successes,
            failures: self.failures,
            recent_latencies: self.recent_latencies.iter().copied().collect(),
            recent_results: self.recent_results.iter().copied().collect(),
            last_success: self.last_success_ms,
            last_failure: self.last_failure_ms,
            p95_latency: p95(&self.recent_latencies),
            success_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetricsSnapshot {
    pub total_requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub recent_latencies: Vec<u64>,
    pub recent_results: Vec<bool>,
    pub last_success: Option<i64>,
    pub last_failure: Option<i64>,
    pub p95_latency: u64,
    pub success_rate: f64,
}

/// Nearest-rank p95 over the latency window; 0 when empty.
pub fn p95(latencies: &VecDeque<u64>) -> u64 {
    if latencies.is_empty() {
        return 0;
    }
    let mut sorted: Vec<u64> = latencies.iter().copied().collect();
    sorted.sort_unstable();
    let rank = (0.95 * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1)]
}

#[derive(Debug, Default)]
struct ProviderStore {
    entries: HashMap<String, ProviderMetrics>,
    last_cleanup_ms: i64,
}

impl ProviderStore {
    fn sweep_idle(&mut self, now_ms: i64) {
        if now_ms.saturating_sub(self.last_cleanup_ms) < CLEANUP_INTERVAL_MS {
            return;
        }
        let before = self.entries.len();
        self.entries.retain(|_, metrics| {
            metrics
                .last_activity_ms()
                .is_some_and(|last| now_ms.saturating_sub(last) < IDLE_EVICT_MS)
        });
        self.last_cleanup_ms = now_ms;
        let purged = before - self.entries.len();
        if purged > 0 {
            tracing::debug!(purged, remaining = self.entries.len(), "idle provider metrics purged");
        }
    }

    fn metrics_mut(&mut self, provider: &str, now_ms: i64) -> &mut ProviderMetrics {
        self.sweep_idle(now_ms);
        self.entries.entry(provider.to_string()).or_default()
    }
}

#[derive(Debug, Default)]
pub struct ProviderHealthMonitor {
    config: CircuitBreakerConfig,
    providers: Mutex<ProviderStore>,
}

impl ProviderHealthMonitor {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            providers: Mutex::new(ProviderStore::default()),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn record_success(&self, provider: &str, latency_ms: u64) {
        self.record_success_at(provider, latency_ms, now_ms());
    }

    pub fn record_success_at(&self, provider: &str, latency_ms: u64, now_ms: i64) {
        let mut providers = self.providers.lock();
        let metrics = providers.metrics_mut(provider, now_ms);
        metrics.total_requests += 1;
        metrics.successes += 1;
        metrics.push_latency(latency_ms, self.config.latency_window);
        metrics.push_result(true, self.config.result_window);
        metrics.last_success_ms = Some(now_ms);
    }

    pub fn record_failure(&self, provider: &str) {
        self.record_failure_at(provider, now_ms());
    }

    pub fn record_failure_at(&self, provider: &str, now_ms: i64) {
        let mut providers = self.providers.lock();
        let metrics = providers.metrics_mut(provider, now_ms);
        let was_tripped = metrics.is_tripped(&self.config);
        metrics.total_requests += 1;
        metrics.failures += 1;
        metrics.push_result(false, self.config.result_window);
        metrics.last_failure_ms = Some(now_ms);

        if !was_tripped && metrics.is_tripped(&self.config) {
            tracing::warn!(
                provider = %provider,
                failure_rate = metrics.failure_rate(),
                "provider failure rate over threshold, circuit open"
            );
        }
    }

    pub fn should_circuit_break(&self, provider: &str) -> bool {
        self.should_circuit_break_at(provider, now_ms())
    }

    pub fn should_circuit_break_at(&self, provider: &str, now_ms: i64) -> bool {
        let providers = self.providers.lock();
        let Some(metrics) = providers.entries.get(provider) else {
            return false;
        };

        if !metrics.is_tripped(&self.config) {
            return false;
        }
        let failure_rate = metrics.failure_rate();

        // Half-open: let one trial request through once the last failure has aged out.
        if let Some(last_failure) = metrics.last_failure_ms {
            if now_ms.saturating_sub(last_failure) >= self.config.cooldown_ms {
                tracing::debug!(provider = %provider, failure_rate, "circuit half-open, allowing a trial request");
                return false;
            }
        }

        tracing::debug!(provider = %provider, failure_rate, "circuit open, skipping provider");
        true
    }

    pub fn should_skip(&self, provider: &str) -> bool {
        self.should_circuit_break(provider)
    }

    pub fn select_provider<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        self.select_provider_at(candidates, now_ms())
    }

    /// First healthy candidate in caller order. When all are broken the
    /// first candidate is returned anyway.
    pub fn select_provider_at<'a>(&self, candidates: &[&'a str], now_ms: i64) -> Option<&'a str> {
        candidates
            .iter()
            .copied()
            .find(|name| !self.should_circuit_break_at(name, now_ms))
            .or_else(|| candidates.first().copied())
    }

    pub fn provider_metrics(&self, provider: &str) -> Option<ProviderMetricsSnapshot> {
        self.providers
            .lock()
            .entries
            .get(provider)
            .map(ProviderMetrics::snapshot)
    }

    pub fn metrics(&self) -> BTreeMap<String, ProviderMetricsSnapshot> {
        self.providers
            .lock()
            .entries
            .iter()
            .map(|(name, metrics)| (name.clone(), metrics.snapshot()))
            .collect()
    }

    pub fn reset(&self, provider: &str) -> bool {
        self.providers.lock().entries.remove(provider).is_some()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
