//! Transient-error classification.
//!
//! Decides which raw backend failures are worth retrying. Deliberately
//! narrow: under-retrying surfaces an error the caller can act on, while
//! over-retrying can double-apply a write the backend does not guarantee
//! idempotence for. Business and validation failures never pass through
//! here; only [`BackendError`] values reach a classifier.

use crate::error::BackendError;

/// Pure predicate over raw backend failures. Implemented once per driver.
pub trait TransientErrorClassifier: Send + Sync {
    fn is_transient(&self, error: &BackendError) -> bool;
}

// ---------------------------------------------------------------------------
// SqlStateClassifier
// ---------------------------------------------------------------------------

/// Driver error codes expected to clear on their own: database unavailable,
/// resource-governance rejections, throttling, and service reconfiguration.
const TRANSIENT_DRIVER_CODES: &[i32] = &[
    4060, 10928, 10929, 40197, 40501, 40613, 49918, 49919, 49920,
];

/// SQLSTATE class for connection exceptions.
const CONNECTION_STATE_CLASS: &str = "08";

/// Classifier for ANSI-ish SQL backends: any timeout is transient, as is any
/// error on the code allow-list or whose SQLSTATE is in the connection class.
#[derive(Debug, Clone)]
pub struct SqlStateClassifier {
    transient_codes: Vec<i32>,
    connection_state_class: String,
}

impl SqlStateClassifier {
    #[must_use]
    pub fn new(transient_codes: Vec<i32>, connection_state_class: impl Into<String>) -> Self {
        Self {
            transient_codes,
            connection_state_class: connection_state_class.into(),
        }
    }
}

impl Default for SqlStateClassifier {
    fn default() -> Self {
        Self::new(TRANSIENT_DRIVER_CODES.to_vec(), CONNECTION_STATE_CLASS)
    }
}

impl TransientErrorClassifier for SqlStateClassifier {
    fn is_transient(&self, error: &BackendError) -> bool {
        match error {
            BackendError::Timeout { .. } => true,
            BackendError::Driver { code, state, .. } => {
                self.transient_codes.contains(code)
                    || state
                        .as_deref()
                        .is_some_and(|state| state.starts_with(&self.connection_state_class))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// NeverTransient
// ---------------------------------------------------------------------------

/// Null classifier for backends whose writes are not retry-safe: nothing is
/// retried, every failure surfaces on the first attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverTransient;

impl TransientErrorClassifier for NeverTransient {
    fn is_transient(&self, _error: &BackendError) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_are_always_transient() {
        let classifier = SqlStateClassifier::default();
        assert!(classifier.is_transient(&BackendError::Timeout { elapsed_ms: 30_000 }));
    }

    #[test]
    fn allow_listed_codes_are_transient() {
        let classifier = SqlStateClassifier::default();
        for code in [4060, 40197, 40501, 40613, 49920] {
            assert!(
                classifier.is_transient(&BackendError::driver(code, "throttled")),
                "code {code} not classified transient"
            );
        }
    }

    #[test]
    fn connection_class_states_are_transient() {
        let classifier = SqlStateClassifier::default();
        let err = BackendError::Driver {
            code: -1,
            state: Some("08S01".to_string()),
            message: "connection reset".to_string(),
        };
        assert!(classifier.is_transient(&err));
    }

    #[test]
    fn everything_else_is_fatal() {
        let classifier = SqlStateClassifier::default();
        // Constraint violation: retrying would re-apply the same bad write.
        let err = BackendError::Driver {
            code: 2627,
            state: Some("23000".to_string()),
            message: "unique constraint violated".to_string(),
        };
        assert!(!classifier.is_transient(&err));
        assert!(!classifier.is_transient(&BackendError::driver(18456, "login failed")));
    }

    #[test]
    fn never_transient_rejects_even_timeouts() {
        assert!(!NeverTransient.is_transient(&BackendError::Timeout { elapsed_ms: 1 }));
    }
}
