/// Errors from key-value store operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The key holds a value of a different type than the command expects.
    #[error("WRONGTYPE operation against key {key} holding the wrong kind of value")]
    WrongType { key: String },

    /// A batch guard did not hold; no command of the batch was applied.
    #[error("batch precondition failed for key {key}")]
    PreconditionFailed { key: String },

    /// The connection (or subscription stream) to the server was lost.
    #[error("store connection lost")]
    Disconnected,

    /// Any other failure reported by the backend or its client library.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
