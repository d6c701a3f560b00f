//! Crossmap Adapter — resilient execution over injected backend drivers.
//!
//! The crate composes one pipeline from five concerns:
//!
//! 1. **Classification** (`classify`): raw driver failure -> transient or fatal
//! 2. **Retry** (`retry`): exponential backoff with bounded jitter
//! 3. **Limiting** (`limiter`): per-operation concurrency and rate leases
//! 4. **Correlation** (`correlation`): ambient ids for log correlation
//! 5. **Pipeline** (`pipeline`): connection lifecycle plus all of the above

pub mod classify;
pub mod config;
pub mod connection;
pub mod correlation;
pub mod error;
pub mod limiter;
pub mod pipeline;
pub mod retry;
pub mod telemetry;

pub use classify::{NeverTransient, SqlStateClassifier, TransientErrorClassifier};
pub use config::AdapterConfig;
pub use connection::DriverConnection;
pub use correlation::{CorrelationScope, ScopeHandle};
pub use error::{AdapterError, BackendError, ConfigError};
pub use limiter::{
    ConcurrencyLimiter, KeyedSemaphoreLimiter, Lease, NoopLimiter, SlidingWindowLimiter,
};
pub use pipeline::{enforce_limit, ExecutionPipeline};
pub use retry::{RetryExecutor, RetryPolicy};
