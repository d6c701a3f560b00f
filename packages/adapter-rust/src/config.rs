//! Adapter configuration.

use serde::Deserialize;

/// Knobs for one adapter instance. Defaults are production values; override
/// per deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdapterConfig {
    /// Backend name carried in failures and logs; normally copied from the
    /// mapping document's `backendName`.
    pub backend_name: String,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First backoff delay; also bounds the jitter added to every delay (ms).
    pub base_delay_ms: u64,
    /// Ceiling for the deterministic backoff component (ms).
    pub max_delay_ms: u64,
    /// In-flight operations allowed per operation name.
    pub max_concurrent_per_operation: u32,
    /// When false, the pipeline runs with the no-op limiter.
    pub throttling_enabled: bool,
    /// Row cap applied when callers pass no explicit limit.
    pub default_page_limit: u32,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            backend_name: String::new(),
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 10_000,
            max_concurrent_per_operation: 32,
            throttling_enabled: true,
            default_page_limit: 200,
        }
    }
}
