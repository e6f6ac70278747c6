/// Schema migration pipeline.
///
/// The persisted `version` slot names the shape of the stored collections.
/// On open, the stored data is walked through the migration chain until it
/// reaches `CURRENT_VERSION`, then decoded through the validators, healed by
/// the integrity checker, and written back together with the new version.
///
/// Chain:
///   1.0.0  legacy nested boards object, or lists without order/timestamps
///   1.1.0  normalized lists, cards may still carry `labels`
///   2.0.0  current: `tags`, explicit `order`, timestamps on every record
pub mod legacy;

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::StoreError;
use crate::identity;
use crate::integrity;
use crate::storage::{self, KvStore, StorageError};
use crate::types::{BoardMetadata, CardData, ColumnData, Snapshot};
use crate::validate::{self, Limits};

pub const CURRENT_VERSION: &str = "2.0.0";

/// Assumed for data found without a version marker.
pub const OLDEST_VERSION: &str = "1.0.0";

/// Slot contents as found in the substrate, before any trust is applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSnapshot {
    pub boards: Value,
    pub columns: Value,
    pub cards: Value,
}

impl RawSnapshot {
    pub fn read(kv: &dyn KvStore) -> Result<Self, StorageError> {
        Ok(Self {
            boards: kv.get(storage::BOARDS_SLOT)?.unwrap_or(Value::Null),
            columns: kv.get(storage::COLUMNS_SLOT)?.unwrap_or(Value::Null),
            cards: kv.get(storage::CARDS_SLOT)?.unwrap_or(Value::Null),
        })
    }

    /// True when no slot holds any record.
    pub fn is_empty(&self) -> bool {
        [&self.boards, &self.columns, &self.cards]
            .iter()
            .all(|slot| match slot {
                Value::Null => true,
                Value::Array(items) => items.is_empty(),
                Value::Object(map) => map.is_empty(),
                _ => false,
            })
    }
}

/// Inputs a migration may need besides the data itself.
#[derive(Debug, Clone)]
pub struct MigrationContext {
    /// Timestamp used for any defaulted `createdAt`/`updatedAt`.
    pub now: String,
}

impl MigrationContext {
    pub fn new() -> Self {
        Self {
            now: identity::now_timestamp(),
        }
    }
}

impl Default for MigrationContext {
    fn default() -> Self {
        Self::new()
    }
}

pub type MigrationFn = fn(RawSnapshot, &MigrationContext) -> Result<RawSnapshot, StoreError>;

pub struct Migration {
    pub from: &'static str,
    pub to: &'static str,
    pub name: &'static str,
    pub apply: MigrationFn,
}

pub static MIGRATIONS: &[Migration] = &[
    Migration {
        from: "1.0.0",
        to: "1.1.0",
        name: "normalize_collections",
        apply: normalize_collections,
    },
    Migration {
        from: "1.1.0",
        to: "2.0.0",
        name: "fill_order_and_tags",
        apply: fill_order_and_tags,
    },
];

/// What `initialize` did to the substrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Nothing was stored; empty collections and the version were written.
    Fresh,
    UpToDate,
    Migrated {
        from: String,
        steps: Vec<&'static str>,
    },
}

/// Shapes the `boards` slot may take. Decoding tries the current
/// normalized list first and falls back to the legacy nested object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BoardsShape {
    Normalized(Vec<Value>),
    LegacyNested(Map<String, Value>),
}

impl BoardsShape {
    fn decode(value: Value) -> Result<Self, StoreError> {
        if value.is_null() {
            return Ok(BoardsShape::Normalized(Vec::new()));
        }
        serde_json::from_value(value).map_err(|_| {
            StoreError::UnsupportedShape(
                "boards slot is neither a record list nor a nested board object".to_string(),
            )
        })
    }
}

/// Bring the substrate up to `CURRENT_VERSION`. Must run before any other
/// operation touches the store.
pub fn initialize(kv: &dyn KvStore, limits: &Limits) -> Result<MigrationOutcome, StoreError> {
    let stored = match kv.get(storage::VERSION_SLOT)? {
        None | Some(Value::Null) => None,
        Some(Value::String(version)) => Some(version),
        Some(other) => {
            return Err(StoreError::UnsupportedShape(format!(
                "version slot holds {}",
                other
            )))
        }
    };
    let raw = RawSnapshot::read(kv)?;

    let stored = match stored {
        Some(version) => version,
        None if raw.is_empty() => {
            let mut entries = storage::encode_snapshot(&Snapshot::default())?;
            entries.push((storage::VERSION_SLOT, json!(CURRENT_VERSION)));
            kv.set_many(&entries)?;
            log::info!(
                "[kanban.store.migrate] Initialized empty store at version {}",
                CURRENT_VERSION
            );
            return Ok(MigrationOutcome::Fresh);
        }
        None => {
            log::warn!(
                "[kanban.store.migrate] Data found without a version marker, assuming {}",
                OLDEST_VERSION
            );
            OLDEST_VERSION.to_string()
        }
    };

    if stored == CURRENT_VERSION {
        return Ok(MigrationOutcome::UpToDate);
    }

    let (migrated, steps) = run_chain(raw, &stored, &MigrationContext::new())?;
    let mut snapshot = decode_snapshot(&migrated, limits)?;
    integrity::check(&mut snapshot, limits)?;

    let mut entries = storage::encode_snapshot(&snapshot)?;
    entries.push((storage::VERSION_SLOT, json!(CURRENT_VERSION)));
    kv.set_many(&entries)?;

    log::info!(
        "[kanban.store.migrate] Migrated store {} -> {} via {:?}",
        stored,
        CURRENT_VERSION,
        steps
    );
    Ok(MigrationOutcome::Migrated {
        from: stored,
        steps,
    })
}

/// Walk the chain from `stored` to `CURRENT_VERSION`. Fails if the walk
/// stops anywhere else.
pub fn run_chain(
    raw: RawSnapshot,
    stored: &str,
    ctx: &MigrationContext,
) -> Result<(RawSnapshot, Vec<&'static str>), StoreError> {
    let mut raw = raw;
    let mut version = stored;
    let mut steps = Vec::new();

    while version != CURRENT_VERSION {
        let Some(migration) = MIGRATIONS.iter().find(|m| m.from == version) else {
            break;
        };
        log::info!(
            "[kanban.store.migrate] Applying {} ({} -> {})",
            migration.name,
            migration.from,
            migration.to
        );
        raw = (migration.apply)(raw, ctx)?;
        steps.push(migration.name);
        version = migration.to;
    }

    if version != CURRENT_VERSION {
        log::error!(
            "[kanban.store.migrate] No migration path from {} to {}",
            stored,
            CURRENT_VERSION
        );
        return Err(StoreError::MigrationExhausted {
            stored: stored.to_string(),
            target: CURRENT_VERSION.to_string(),
        });
    }
    Ok((raw, steps))
}

fn slot_rows(slot: &Value, name: &str) -> Result<Vec<Value>, StoreError> {
    match slot {
        Value::Null => Ok(Vec::new()),
        Value::Array(rows) => Ok(rows.clone()),
        _ => Err(StoreError::UnsupportedShape(format!(
            "{} slot is not a record list",
            name
        ))),
    }
}

fn row_label(row: &Value) -> String {
    row.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "<no id>".to_string())
}

/// `labels` is the old name of `tags`. When a row carries both, `tags` wins
/// and `labels` is dropped so the row still decodes.
fn strip_shadowed_labels(row: &mut Value) {
    let Some(obj) = row.as_object_mut() else {
        return;
    };
    if obj.contains_key("tags") && obj.remove("labels").is_some() {
        log::debug!(
            "[kanban.store.load] Card {} carries both tags and labels, keeping tags",
            obj.get("id").and_then(Value::as_str).unwrap_or("<no id>")
        );
    }
}

/// Decode current-version slots into trusted collections. Rows failing
/// their validator are dropped with a warning, not defaulted.
pub fn decode_snapshot(raw: &RawSnapshot, limits: &Limits) -> Result<Snapshot, StoreError> {
    let mut boards = Vec::new();
    for row in slot_rows(&raw.boards, storage::BOARDS_SLOT)? {
        match validate::is_board_metadata(&row)
            .then(|| serde_json::from_value::<BoardMetadata>(row.clone()).ok())
            .flatten()
        {
            Some(board) => boards.push(board),
            None => log::warn!(
                "[kanban.store.load] Skipping malformed board {}",
                row_label(&row)
            ),
        }
    }

    let mut columns = Vec::new();
    for row in slot_rows(&raw.columns, storage::COLUMNS_SLOT)? {
        match validate::is_column_data(&row)
            .then(|| serde_json::from_value::<ColumnData>(row.clone()).ok())
            .flatten()
        {
            Some(column) => columns.push(column),
            None => log::warn!(
                "[kanban.store.load] Skipping malformed column {}",
                row_label(&row)
            ),
        }
    }

    let mut cards = Vec::new();
    for mut row in slot_rows(&raw.cards, storage::CARDS_SLOT)? {
        strip_shadowed_labels(&mut row);
        match validate::is_card_data(&row, limits)
            .then(|| serde_json::from_value::<CardData>(row.clone()).ok())
            .flatten()
        {
            Some(card) => cards.push(card),
            None => log::warn!(
                "[kanban.store.load] Skipping malformed card {}",
                row_label(&row)
            ),
        }
    }

    Ok(Snapshot::from_records(boards, columns, cards))
}

// ── 1.0.0 -> 1.1.0 ───────────────────────────────────────────────────────────

fn normalize_collections(raw: RawSnapshot, ctx: &MigrationContext) -> Result<RawSnapshot, StoreError> {
    let RawSnapshot {
        boards,
        columns,
        cards,
    } = raw;
    match BoardsShape::decode(boards)? {
        BoardsShape::Normalized(boards) => Ok(RawSnapshot {
            boards: Value::Array(boards),
            columns: Value::Array(slot_rows(&columns, storage::COLUMNS_SLOT)?),
            cards: Value::Array(slot_rows(&cards, storage::CARDS_SLOT)?),
        }),
        BoardsShape::LegacyNested(nested) => {
            let leftovers = RawSnapshot {
                boards: Value::Null,
                columns,
                cards,
            };
            if !leftovers.is_empty() {
                log::warn!(
                    "[kanban.store.migrate] Ignoring columns/cards slots alongside nested boards"
                );
            }
            Ok(legacy::flatten(nested, ctx))
        }
    }
}

// ── 1.1.0 -> 2.0.0 ───────────────────────────────────────────────────────────

type Row = Map<String, Value>;

fn str_field<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

fn default_string(row: &mut Row, key: &str, value: &str) {
    if !row.get(key).is_some_and(Value::is_string) {
        row.insert(key.to_string(), json!(value));
    }
}

fn default_timestamps(row: &mut Row, now: &str) {
    default_string(row, "createdAt", now);
    let created = str_field(row, "createdAt").unwrap_or(now).to_string();
    default_string(row, "updatedAt", &created);
}

/// Ids of `children` whose `owner_key` equals `parent_id`, in row order.
fn owned_ids(children: &[Value], owner_key: &str, parent_id: &str) -> Vec<Value> {
    children
        .iter()
        .filter_map(Value::as_object)
        .filter(|c| str_field(c, owner_key) == Some(parent_id))
        .filter_map(|c| c.get("id").cloned())
        .collect()
}

/// Position of every id within its parent's sequence.
fn sequence_positions(parents: &[Value], sequence_key: &str) -> HashMap<String, i64> {
    let mut positions = HashMap::new();
    for parent in parents.iter().filter_map(Value::as_object) {
        if let Some(ids) = parent.get(sequence_key).and_then(Value::as_array) {
            for (index, id) in ids.iter().enumerate() {
                if let Some(id) = id.as_str() {
                    positions.entry(id.to_string()).or_insert(index as i64);
                }
            }
        }
    }
    positions
}

fn fill_order_and_tags(raw: RawSnapshot, ctx: &MigrationContext) -> Result<RawSnapshot, StoreError> {
    let now = ctx.now.as_str();
    // Past 1.0.0 every slot must already be a record list.
    let mut boards = slot_rows(&raw.boards, storage::BOARDS_SLOT)?;
    let mut columns = slot_rows(&raw.columns, storage::COLUMNS_SLOT)?;
    let mut cards = slot_rows(&raw.cards, storage::CARDS_SLOT)?;

    for card in cards.iter_mut().filter_map(Value::as_object_mut) {
        let labels = card.remove("labels");
        if !card.get("tags").is_some_and(Value::is_array) {
            let tags = labels.filter(Value::is_array).unwrap_or_else(|| json!([]));
            card.insert("tags".to_string(), tags);
        }
        default_string(card, "description", "");
        default_timestamps(card, now);
    }

    let snapshot_cards = cards.clone();
    for column in columns.iter_mut().filter_map(Value::as_object_mut) {
        if !column.get("cardIds").is_some_and(Value::is_array) {
            let id = str_field(column, "id").unwrap_or_default().to_string();
            let ids = owned_ids(&snapshot_cards, "columnId", &id);
            column.insert("cardIds".to_string(), Value::Array(ids));
        }
        default_timestamps(column, now);
    }

    let snapshot_columns = columns.clone();
    for board in boards.iter_mut().filter_map(Value::as_object_mut) {
        if !board.get("columnIds").is_some_and(Value::is_array) {
            let id = str_field(board, "id").unwrap_or_default().to_string();
            let ids = owned_ids(&snapshot_columns, "boardId", &id);
            board.insert("columnIds".to_string(), Value::Array(ids));
        }
        default_string(board, "description", "");
        default_timestamps(board, now);
    }

    let column_positions = sequence_positions(&boards, "columnIds");
    for column in columns.iter_mut().filter_map(Value::as_object_mut) {
        if column.get("order").and_then(Value::as_i64).is_none() {
            let id = str_field(column, "id").unwrap_or_default();
            let order = column_positions.get(id).copied().unwrap_or(0);
            column.insert("order".to_string(), json!(order));
        }
    }

    let card_positions = sequence_positions(&columns, "cardIds");
    let column_boards: HashMap<String, String> = columns
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|c| Some((str_field(c, "id")?.to_string(), str_field(c, "boardId")?.to_string())))
        .collect();
    for card in cards.iter_mut().filter_map(Value::as_object_mut) {
        if card.get("order").and_then(Value::as_i64).is_none() {
            let id = str_field(card, "id").unwrap_or_default();
            let order = card_positions.get(id).copied().unwrap_or(0);
            card.insert("order".to_string(), json!(order));
        }
        if str_field(card, "boardId").is_none() {
            let board_id = str_field(card, "columnId")
                .and_then(|column_id| column_boards.get(column_id))
                .cloned();
            if let Some(board_id) = board_id {
                card.insert("boardId".to_string(), json!(board_id));
            }
        }
    }

    Ok(RawSnapshot {
        boards: Value::Array(boards),
        columns: Value::Array(columns),
        cards: Value::Array(cards),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryKv;

    fn ctx() -> MigrationContext {
        MigrationContext {
            now: "2024-05-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_fresh_store_writes_version() {
        let kv = MemoryKv::new();
        let outcome = initialize(&kv, &Limits::default()).unwrap();
        assert_eq!(outcome, MigrationOutcome::Fresh);
        assert_eq!(kv.get(storage::VERSION_SLOT).unwrap(), Some(json!(CURRENT_VERSION)));
        assert_eq!(kv.get(storage::BOARDS_SLOT).unwrap(), Some(json!([])));
    }

    #[test]
    fn test_current_version_is_untouched() {
        let kv = MemoryKv::with_slots([
            (storage::VERSION_SLOT, json!(CURRENT_VERSION)),
            (storage::BOARDS_SLOT, json!([{"id": "junk"}])),
        ]);
        assert_eq!(
            initialize(&kv, &Limits::default()).unwrap(),
            MigrationOutcome::UpToDate
        );
        assert_eq!(
            kv.get(storage::BOARDS_SLOT).unwrap(),
            Some(json!([{"id": "junk"}]))
        );
    }

    #[test]
    fn test_unknown_version_is_fatal() {
        let kv = MemoryKv::with_slots([(storage::VERSION_SLOT, json!("9.9.9"))]);
        let err = initialize(&kv, &Limits::default()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::MigrationExhausted { ref stored, .. } if stored == "9.9.9"
        ));
        // Nothing rewritten.
        assert_eq!(kv.get(storage::VERSION_SLOT).unwrap(), Some(json!("9.9.9")));
    }

    #[test]
    fn test_non_string_version_is_rejected() {
        let kv = MemoryKv::with_slots([(storage::VERSION_SLOT, json!(2))]);
        assert!(matches!(
            initialize(&kv, &Limits::default()),
            Err(StoreError::UnsupportedShape(_))
        ));
    }

    #[test]
    fn test_chain_from_oldest() {
        let (_, steps) = run_chain(RawSnapshot::default(), OLDEST_VERSION, &ctx()).unwrap();
        assert_eq!(steps, vec!["normalize_collections", "fill_order_and_tags"]);
    }

    #[test]
    fn test_scalar_boards_slot_fails_closed() {
        let raw = RawSnapshot {
            boards: json!(42),
            ..RawSnapshot::default()
        };
        assert!(matches!(
            run_chain(raw, OLDEST_VERSION, &ctx()),
            Err(StoreError::UnsupportedShape(_))
        ));
    }

    #[test]
    fn test_nested_boards_after_oldest_version_fail_closed() {
        let nested = json!({"b1": {"title": "Home", "columns": [{"title": "Todo", "cards": []}]}});
        let kv = MemoryKv::with_slots([
            (storage::VERSION_SLOT, json!("1.1.0")),
            (storage::BOARDS_SLOT, nested.clone()),
        ]);
        let err = initialize(&kv, &Limits::default()).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedShape(_)));
        assert_eq!(kv.get(storage::BOARDS_SLOT).unwrap(), Some(nested));
        assert_eq!(kv.get(storage::VERSION_SLOT).unwrap(), Some(json!("1.1.0")));
    }

    #[test]
    fn test_fill_order_and_tags() {
        let raw = RawSnapshot {
            boards: json!([{"id": "b1", "title": "B", "columnIds": ["c2", "c1"]}]),
            columns: json!([
                {"id": "c1", "title": "One", "boardId": "b1"},
                {"id": "c2", "title": "Two", "boardId": "b1", "cardIds": ["k2", "k1"]}
            ]),
            cards: json!([
                {"id": "k1", "title": "A", "columnId": "c2", "labels": ["x"]},
                {"id": "k2", "title": "B", "columnId": "c2", "boardId": "b1", "order": 7}
            ]),
        };
        let (migrated, _) = run_chain(raw, "1.1.0", &ctx()).unwrap();
        let snapshot = decode_snapshot(&migrated, &Limits::default()).unwrap();

        assert_eq!(snapshot.columns["c2"].order, 0);
        assert_eq!(snapshot.columns["c1"].order, 1);
        assert!(snapshot.columns["c1"].card_ids.is_empty());
        assert_eq!(snapshot.cards["k1"].order, 1);
        assert_eq!(snapshot.cards["k2"].order, 7);
        assert_eq!(snapshot.cards["k1"].tags, vec!["x".to_string()]);
        assert_eq!(snapshot.cards["k1"].board_id, "b1");
        assert_eq!(snapshot.boards["b1"].created_at, "2024-05-01T00:00:00.000Z");
        assert_eq!(snapshot.boards["b1"].description, "");
    }

    #[test]
    fn test_decode_drops_malformed_rows() {
        let raw = RawSnapshot {
            boards: json!([
                {"id": "b1", "title": "B", "description": "", "columnIds": [],
                 "createdAt": "t", "updatedAt": "t"},
                {"id": "b2", "title": 5}
            ]),
            columns: json!([]),
            cards: Value::Null,
        };
        let snapshot = decode_snapshot(&raw, &Limits::default()).unwrap();
        assert_eq!(snapshot.boards.len(), 1);
        assert!(snapshot.boards.contains_key("b1"));
    }

    #[test]
    fn test_decode_prefers_tags_over_labels() {
        let raw = RawSnapshot {
            boards: json!([]),
            columns: json!([]),
            cards: json!([{
                "id": "k1", "title": "A", "description": "",
                "tags": ["keep"], "labels": ["old"],
                "columnId": "c1", "boardId": "b1", "order": 0,
                "createdAt": "t", "updatedAt": "t"
            }]),
        };
        let snapshot = decode_snapshot(&raw, &Limits::default()).unwrap();
        assert_eq!(snapshot.cards["k1"].tags, vec!["keep".to_string()]);
    }

    #[test]
    fn test_unversioned_lists_are_migrated() {
        let kv = MemoryKv::with_slots([
            (storage::BOARDS_SLOT, json!([{"id": "b1", "title": "B"}])),
            (
                storage::COLUMNS_SLOT,
                json!([{"id": "c1", "title": "C", "boardId": "b1"}]),
            ),
        ]);
        let outcome = initialize(&kv, &Limits::default()).unwrap();
        assert!(matches!(outcome, MigrationOutcome::Migrated { ref from, .. } if from == "1.0.0"));

        let raw = RawSnapshot::read(&kv).unwrap();
        let snapshot = decode_snapshot(&raw, &Limits::default()).unwrap();
        assert_eq!(snapshot.boards["b1"].column_ids, vec!["c1".to_string()]);
        assert_eq!(kv.get(storage::VERSION_SLOT).unwrap(), Some(json!(CURRENT_VERSION)));
    }
}
