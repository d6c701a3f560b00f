//! Adapter failure taxonomy.
//!
//! Callers of the execution pipeline see exactly four kinds of failure:
//! configuration defects, invalid arguments, wrapped backend failures, and
//! cancellation. Raw driver errors never cross the crate boundary unwrapped.

use crossmap_core::MappingError;
use thiserror::Error;

// ---------------------------------------------------------------------------
// BackendError
// ---------------------------------------------------------------------------

/// Raw failure surfaced by a backend driver, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// A round trip or connect exceeded the driver's deadline.
    #[error("backend call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// A driver-reported error with the backend's native code and, where the
    /// driver supplies one, a five-character SQLSTATE.
    #[error("driver error {code} (state {state:?}): {message}")]
    Driver {
        code: i32,
        state: Option<String>,
        message: String,
    },
}

impl BackendError {
    /// Convenience constructor for driver errors without a SQLSTATE.
    pub fn driver(code: i32, message: impl Into<String>) -> Self {
        Self::Driver {
            code,
            state: None,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Construction-time defects: a bad mapping document or invalid pipeline
/// settings. Fatal at startup, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("invalid retry policy: {reason}")]
    RetryPolicy { reason: String },

    #[error("invalid concurrency limit: {reason}")]
    Concurrency { reason: String },
}

// ---------------------------------------------------------------------------
// AdapterError
// ---------------------------------------------------------------------------

/// The single failure taxonomy surfaced by every adapter operation.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The caller supplied an invalid argument. Surfaces immediately, never
    /// retried.
    #[error("invalid argument `{parameter}`: {reason}")]
    Validation { parameter: String, reason: String },

    /// A backend failure after retries were exhausted or ruled out. Display
    /// names the operation and backend but not the driver message, so
    /// infrastructure details never leak to callers; the cause remains
    /// reachable through `source()` for logging.
    #[error("data access failure in `{operation}` against backend `{backend}`")]
    DataAccess {
        operation: String,
        backend: String,
        #[source]
        cause: BackendError,
    },

    /// The caller's cancellation token fired. Propagated verbatim.
    #[error("operation canceled")]
    Canceled,
}

impl AdapterError {
    pub fn validation(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    pub fn data_access(
        operation: impl Into<String>,
        backend: impl Into<String>,
        cause: BackendError,
    ) -> Self {
        Self::DataAccess {
            operation: operation.into(),
            backend: backend.into(),
            cause,
        }
    }
}

impl From<MappingError> for AdapterError {
    fn from(err: MappingError) -> Self {
        Self::Config(ConfigError::Mapping(err))
    }
}
