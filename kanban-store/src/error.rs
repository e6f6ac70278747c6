use crate::storage::StorageError;
use crate::validate::{RecordKind, SchemaViolation};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Hard integrity failure: nothing was persisted.
    #[error("Invalid record: {0}")]
    Validation(#[from] SchemaViolation),

    #[error("No migration path from schema version {stored} to {target}")]
    MigrationExhausted { stored: String, target: String },

    #[error("Unrecognized stored shape: {0}")]
    UnsupportedShape(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Save queue is closed")]
    QueueClosed,
}

impl StoreError {
    pub(crate) fn not_found(kind: RecordKind, id: &str) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
