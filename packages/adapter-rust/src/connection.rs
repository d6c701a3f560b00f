//! The injected backend-connection collaborator.

use async_trait::async_trait;

use crate::error::BackendError;

/// One not-yet-open driver connection, constructed by the deployment's
/// connection factory and injected per adapter instance. The pipeline owns
/// the open/close lifecycle; authentication and pooling are the driver's
/// concern.
///
/// Implementations are usually thin wrappers over an `Arc`'d driver client:
/// the same client the adapter's command closures use for round trips, so
/// an open connection serves concurrent commands while this trait keeps the
/// lifecycle in one place.
#[async_trait]
pub trait DriverConnection: Send {
    /// True once `open` has completed and the connection is usable.
    fn is_open(&self) -> bool;

    /// Establish the physical connection. Called at most once at a time;
    /// the pipeline serializes callers behind a lock.
    async fn open(&mut self) -> Result<(), BackendError>;

    /// Tear the connection down. Not called when already closed.
    async fn close(&mut self) -> Result<(), BackendError>;
}
