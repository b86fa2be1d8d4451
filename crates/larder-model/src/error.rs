use larder_store::StoreError;

/// Errors produced while describing, encoding, or decoding entities.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// The record to bind was empty: no entity is stored under `key`.
    #[error("no record stored at {key}")]
    EmptyRecord { key: String },

    /// A referenced entity was not found while strict reference resolution
    /// was enabled.
    #[error("referenced record {key} does not exist")]
    MissingReference { key: String },

    /// Stored text could not be parsed into the field's type.
    #[error("cannot parse field '{field}' from {value:?}: {reason}")]
    Parse {
        field: String,
        value: String,
        reason: String,
    },

    /// A reference leads back to a record already being decoded, while
    /// strict reference resolution was enabled.
    #[error("reference to {key} forms a cycle")]
    ReferenceCycle { key: String },

    /// The field's shape has no encode or decode rule.
    #[error("field '{field}' has no supported encoding")]
    UnsupportedFieldKind { field: String },

    /// A reference points at an entity that has never been stored.
    #[error("field '{field}' references an entity without an ID")]
    UnsavedReference { field: String },

    /// A field annotation does not follow `name`, `name,immutable`, or `-`.
    #[error("invalid field annotation {annotation:?}")]
    InvalidAnnotation { annotation: String },

    /// Two fields of one schema map to the same store name.
    #[error("duplicate store field name '{name}'")]
    DuplicateField { name: String },

    /// The store failed while fetching nested data.
    #[error("store error: {0}")]
    Transport(#[from] StoreError),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
