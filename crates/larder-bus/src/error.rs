use std::time::Duration;

use larder_store::StoreError;

/// Errors produced by the event bus.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BusError {
    /// No sentinel came back before the bootstrap deadline.
    #[error("subscription not confirmed within {0:?}")]
    BootstrapTimeout(Duration),

    /// The subscription is gone and will not be re-established.
    #[error("event bus disconnected")]
    Disconnected,

    /// The store rejected a subscribe or publish.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias used throughout the bus crate.
pub type Result<T> = std::result::Result<T, BusError>;
