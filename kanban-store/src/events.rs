/// Events emitted after a commit becomes durable.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StoreEvent {
    /// A board or anything in its subtree changed.
    BoardChanged { board_id: String },
    BoardDeleted { board_id: String },
    /// Every collection was reset.
    Cleared,
    /// The integrity checker repaired cross-references during a commit.
    Healed { diagnostics: Vec<String> },
}
