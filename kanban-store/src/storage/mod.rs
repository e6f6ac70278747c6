pub mod local;
pub mod memory;

use serde_json::Value;

use crate::types::Snapshot;

/// Slot names in the persisted key-value layout.
pub const BOARDS_SLOT: &str = "boards";
pub const COLUMNS_SLOT: &str = "columns";
pub const CARDS_SLOT: &str = "cards";
pub const VERSION_SLOT: &str = "version";

/// Flat key-value substrate holding JSON values.
/// Implementations: FileKv (single JSON document on disk), MemoryKv.
pub trait KvStore: Send + Sync {
    /// Read one slot. Absent slots are `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Write several slots. Either every entry lands or none does.
    fn set_many(&self, entries: &[(&str, Value)]) -> Result<(), StorageError>;

    /// Names of every slot currently present.
    fn keys(&self) -> Result<Vec<String>, StorageError>;

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.set_many(&[(key, value)])
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt store: {0}")]
    Corrupt(String),
}

/// Serialize the three collections as plain record lists, one per slot.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<(&'static str, Value)>, StorageError> {
    let boards = serde_json::to_value(snapshot.boards.values().collect::<Vec<_>>())?;
    let columns = serde_json::to_value(snapshot.columns.values().collect::<Vec<_>>())?;
    let cards = serde_json::to_value(snapshot.cards.values().collect::<Vec<_>>())?;
    Ok(vec![
        (BOARDS_SLOT, boards),
        (COLUMNS_SLOT, columns),
        (CARDS_SLOT, cards),
    ])
}

/// Persist all three collections in a single substrate call.
pub fn write_snapshot(kv: &dyn KvStore, snapshot: &Snapshot) -> Result<(), StorageError> {
    let entries = encode_snapshot(snapshot)?;
    kv.set_many(&entries)
}
