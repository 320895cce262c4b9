use thiserror::Error;

/// Errors raised by capture graph operations.
///
/// Configuration-changing operations only propagate one of these after the
/// graph has been returned to a consistent, previously-valid state. Teardown
/// paths (`stop`, `destroy`, `dispose`) never propagate; failures there are
/// logged as `Cleanup` and swallowed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// An operation that requires the graph to be stopped (or not cued) was
    /// called at the wrong time. Never retried internally.
    #[error("`{operation}` is not allowed in the current graph state; stop the current capture first")]
    InvalidState { operation: &'static str },

    /// The device could not be connected because another session holds it.
    /// Distinguished from a generic connection failure so callers can show
    /// a specific message. Not retried automatically.
    #[error("{device} is in use by another session or cannot be rendered")]
    DeviceInUse { device: String },

    /// A requested field, format block, or routing configuration is not
    /// supported by the selected device.
    #[error("unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// Any other failure while wiring a branch. Partially made connections
    /// are rolled back before this propagates.
    #[error("connection failed: {0}")]
    ConnectionFailure(String),

    /// A failure on a best-effort teardown path. Produced by drivers during
    /// disconnect/removal; the controller logs and swallows it so teardown
    /// is unconditionally completable.
    #[error("cleanup failed: {0}")]
    Cleanup(String),
}
