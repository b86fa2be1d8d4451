use larder_bus::BusError;
use larder_model::CodecError;
use larder_store::StoreError;

/// Errors surfaced by [`Larder`](crate::Larder) operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LarderError {
    /// The call cannot target an entity, e.g. an empty ID.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// A create found a record already stored under `key`.
    #[error("{key} already exists")]
    Conflict { key: String },

    /// No record is stored under `key`.
    #[error("{key} does not exist")]
    NotFound { key: String },

    /// Stored text could not be parsed into the field's type.
    #[error("cannot parse field '{field}' from {value:?}: {reason}")]
    Parse {
        field: String,
        value: String,
        reason: String,
    },

    /// A field's shape has no encode or decode rule.
    #[error("field '{field}' has no supported encoding")]
    UnsupportedFieldKind { field: String },

    /// Any other schema or codec failure.
    #[error("codec error: {0}")]
    Codec(CodecError),

    /// Passthrough from the store.
    #[error("store error: {0}")]
    Transport(#[from] StoreError),

    #[error("event bus error: {0}")]
    Bus(#[from] BusError),

    #[error("config error: {0}")]
    Config(String),
}

impl From<CodecError> for LarderError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::EmptyRecord { key } | CodecError::MissingReference { key } => {
                LarderError::NotFound { key }
            }
            CodecError::Parse {
                field,
                value,
                reason,
            } => LarderError::Parse {
                field,
                value,
                reason,
            },
            CodecError::UnsupportedFieldKind { field } => {
                LarderError::UnsupportedFieldKind { field }
            }
            CodecError::Transport(err) => LarderError::Transport(err),
            other => LarderError::Codec(other),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LarderError>;
