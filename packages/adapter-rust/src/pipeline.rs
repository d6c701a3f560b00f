//! The adapter execution pipeline.
//!
//! Every backend call an adapter makes goes through [`ExecutionPipeline::execute`],
//! which applies the cross-cutting concerns uniformly: serialized connection
//! open, correlation scope, per-operation concurrency lease, retry with
//! backoff, and translation of raw driver failures into the adapter
//! taxonomy. Concrete entity adapters hold one pipeline each and stay free
//! of resilience logic.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::classify::TransientErrorClassifier;
use crate::config::AdapterConfig;
use crate::connection::DriverConnection;
use crate::correlation::CorrelationScope;
use crate::error::{AdapterError, BackendError, ConfigError};
use crate::limiter::{ConcurrencyLimiter, KeyedSemaphoreLimiter, NoopLimiter};
use crate::retry::{RetryExecutor, RetryPolicy};

// ---------------------------------------------------------------------------
// ExecutionPipeline
// ---------------------------------------------------------------------------

/// Composition of connection lifecycle, correlation, throttling, and retry
/// for one adapter instance. Safe to share across concurrent callers.
pub struct ExecutionPipeline {
    backend_name: String,
    /// The open path is serialized behind this lock; command execution is
    /// not, so an already-open connection serves concurrent bodies up to
    /// the limiter's ceiling.
    connection: Mutex<Box<dyn DriverConnection>>,
    retry: RetryExecutor,
    limiter: Arc<dyn ConcurrencyLimiter>,
}

impl ExecutionPipeline {
    #[must_use]
    pub fn new(
        backend_name: impl Into<String>,
        connection: Box<dyn DriverConnection>,
        retry: RetryExecutor,
        limiter: Arc<dyn ConcurrencyLimiter>,
    ) -> Self {
        Self {
            backend_name: backend_name.into(),
            connection: Mutex::new(connection),
            retry,
            limiter,
        }
    }

    /// Assemble a pipeline from one config: retry policy from the delay
    /// knobs, keyed-semaphore or no-op limiter per `throttling_enabled`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the retry or concurrency settings violate
    /// their invariants.
    pub fn from_config(
        config: &AdapterConfig,
        connection: Box<dyn DriverConnection>,
        classifier: Arc<dyn TransientErrorClassifier>,
    ) -> Result<Self, ConfigError> {
        let policy = RetryPolicy::new(
            config.max_retries,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )?;
        let limiter: Arc<dyn ConcurrencyLimiter> = if config.throttling_enabled {
            Arc::new(KeyedSemaphoreLimiter::new(
                config.max_concurrent_per_operation as usize,
            )?)
        } else {
            Arc::new(NoopLimiter)
        };
        Ok(Self::new(
            config.backend_name.clone(),
            connection,
            RetryExecutor::new(policy, classifier),
            limiter,
        ))
    }

    #[must_use]
    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// Run `body` with every cross-cutting concern applied.
    ///
    /// `body` receives a clone of the cancellation token and is re-invoked
    /// on each retry attempt, so it must be safe to run more than once;
    /// adapters only submit reads and idempotent parameterized writes.
    ///
    /// # Errors
    ///
    /// `AdapterError::Canceled` on cancellation at any suspension point;
    /// `AdapterError::DataAccess` for any raw driver failure, wrapped
    /// exactly once where it surfaces; configuration and validation errors
    /// pass through unchanged.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        body: F,
        cancel: &CancellationToken,
    ) -> Result<T, AdapterError>
    where
        F: Fn(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        CorrelationScope::with_chain(self.execute_in_scope(operation, body, cancel)).await
    }

    async fn execute_in_scope<T, F, Fut>(
        &self,
        operation: &str,
        body: F,
        cancel: &CancellationToken,
    ) -> Result<T, AdapterError>
    where
        F: Fn(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let _scope = CorrelationScope::begin(None);
        let correlation_id = CorrelationScope::current().unwrap_or_default();
        let span = tracing::info_span!(
            "adapter_operation",
            operation,
            backend = %self.backend_name,
            correlation_id = %correlation_id,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        async {
            let started = Instant::now();
            tracing::debug!("operation starting");

            let result = self.run_attempts(operation, &body, cancel).await;

            #[allow(clippy::cast_possible_truncation)]
            let duration_ms = started.elapsed().as_millis() as u64;
            tracing::Span::current().record("duration_ms", duration_ms);
            tracing::Span::current()
                .record("outcome", if result.is_ok() { "ok" } else { "error" });
            match &result {
                Ok(_) => tracing::info!(duration_ms, "operation complete"),
                Err(AdapterError::Canceled) => tracing::info!(duration_ms, "operation canceled"),
                Err(error) => tracing::warn!(duration_ms, error = ?error, "operation failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_attempts<T, F, Fut>(
        &self,
        operation: &str,
        body: &F,
        cancel: &CancellationToken,
    ) -> Result<T, AdapterError>
    where
        F: Fn(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        self.ensure_open(cancel).await?;
        self.retry
            .execute(
                operation,
                |_attempt| {
                    let cancel = cancel.clone();
                    async move {
                        let mut lease = self.limiter.acquire(operation, &cancel).await?;
                        let outcome = body(cancel.clone()).await;
                        lease.release();
                        // The one place raw driver errors enter the taxonomy;
                        // retries re-wrap fresh errors, never wrapped ones.
                        outcome.map_err(|cause| {
                            AdapterError::data_access(
                                operation,
                                self.backend_name.as_str(),
                                cause,
                            )
                        })
                    }
                },
                cancel,
            )
            .await
    }

    /// Open the connection if it is not already open. Concurrent callers
    /// serialize on the lock, so at most one physical open ever runs.
    async fn ensure_open(&self, cancel: &CancellationToken) -> Result<(), AdapterError> {
        let mut connection = tokio::select! {
            guard = self.connection.lock() => guard,
            () = cancel.cancelled() => return Err(AdapterError::Canceled),
        };
        if connection.is_open() {
            return Ok(());
        }
        tracing::debug!(backend = %self.backend_name, "opening backend connection");
        tokio::select! {
            opened = connection.open() => opened.map_err(|cause| {
                AdapterError::data_access("open_connection", self.backend_name.as_str(), cause)
            }),
            () = cancel.cancelled() => Err(AdapterError::Canceled),
        }
    }

    /// Close the backend connection. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::DataAccess` if the driver's close fails.
    pub async fn shutdown(&self) -> Result<(), AdapterError> {
        let mut connection = self.connection.lock().await;
        if !connection.is_open() {
            return Ok(());
        }
        connection.close().await.map_err(|cause| {
            AdapterError::data_access("close_connection", self.backend_name.as_str(), cause)
        })?;
        tracing::debug!(backend = %self.backend_name, "backend connection closed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// enforce_limit
// ---------------------------------------------------------------------------

/// Validate a caller-requested row cap against the configured default.
/// Zero or negative means "use the default". A request above the default is
/// a caller bug and fails rather than being silently clamped, so the caller
/// learns about it instead of quietly receiving fewer rows.
///
/// # Errors
///
/// Returns `AdapterError::Validation` naming `parameter` when `requested`
/// exceeds `default_limit`.
pub fn enforce_limit(
    requested: i64,
    default_limit: u32,
    parameter: &str,
) -> Result<u32, AdapterError> {
    if requested <= 0 {
        return Ok(default_limit);
    }
    if requested > i64::from(default_limit) {
        return Err(AdapterError::validation(
            parameter,
            format!("requested {requested} exceeds the maximum of {default_limit}"),
        ));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(requested as u32)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
