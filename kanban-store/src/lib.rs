/// Kanban Store: normalized board/column/card persistence with integrity
/// checking, schema migration and a serialized write path.
pub mod assemble;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod integrity;
pub mod migrate;
pub mod queue;
pub mod storage;
pub mod store;
pub mod types;
pub mod validate;

pub use config::{load_config, StoreConfig};
pub use error::StoreError;
pub use events::StoreEvent;
pub use integrity::{Diagnostic, IntegrityReport};
pub use migrate::{MigrationOutcome, CURRENT_VERSION};
pub use queue::QueueState;
pub use storage::local::FileKv;
pub use storage::memory::MemoryKv;
pub use storage::{KvStore, StorageError};
pub use store::BoardStore;
pub use types::{Board, BoardMetadata, Card, CardData, Column, ColumnData, NewCard, Snapshot};
pub use validate::{Limits, RecordKind, SchemaViolation};
