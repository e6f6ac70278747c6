/// Board store: the operation surface external collaborators call.
///
/// Every mutation loads the last durable snapshot, applies the change in
/// memory, stamps timestamps, and hands the full snapshot to the save queue.
/// Reads are not queued: they reflect only what has already been flushed.
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::assemble;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::events::StoreEvent;
use crate::identity;
use crate::integrity::IntegrityReport;
use crate::migrate::{self, MigrationOutcome, RawSnapshot};
use crate::queue::{QueueState, SaveQueue};
use crate::storage::local::FileKv;
use crate::storage::KvStore;
use crate::types::*;
use crate::validate::{self, Limits, RecordKind};

const EVENT_CAPACITY: usize = 256;

pub struct BoardStore {
    kv: Arc<dyn KvStore>,
    queue: SaveQueue,
    limits: Limits,
    events: broadcast::Sender<StoreEvent>,
    migration: MigrationOutcome,
}

impl BoardStore {
    /// Open a store over `kv`, running the migration pipeline first.
    /// Must be called from within a tokio runtime.
    pub async fn open(kv: Arc<dyn KvStore>, config: &StoreConfig) -> Result<Self, StoreError> {
        let limits = config.limits();
        let migration = migrate::initialize(kv.as_ref(), &limits)?;
        let queue = SaveQueue::start(kv.clone(), limits, config.queue_capacity);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            kv,
            queue,
            limits,
            events,
            migration,
        })
    }

    /// Open the JSON file store at `config.store_path()`.
    pub async fn open_file(config: &StoreConfig) -> Result<Self, StoreError> {
        let kv = FileKv::open(config.store_path())?;
        log::info!(
            "[kanban.store] Opening store at {}",
            kv.path().display()
        );
        Self::open(Arc::new(kv), config).await
    }

    /// What the migration pipeline did when this store was opened.
    pub fn migration(&self) -> &MigrationOutcome {
        &self.migration
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn queue_state(&self) -> QueueState {
        self.queue.state()
    }

    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await
    }

    /// Flush everything still queued and stop the writer.
    pub async fn close(self) {
        self.queue.shutdown().await
    }

    /// Last durably written state, decoded through the validators.
    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let raw = RawSnapshot::read(self.kv.as_ref())?;
        migrate::decode_snapshot(&raw, &self.limits)
    }

    /// Enqueue a caller-built snapshot as-is. Used for imports.
    pub async fn commit(&self, snapshot: Snapshot) -> Result<IntegrityReport, StoreError> {
        let board_ids: Vec<String> = snapshot.boards.keys().cloned().collect();
        let report = self.queue.save(snapshot).await?;
        self.announce_heals(&report);
        for board_id in board_ids {
            self.emit(StoreEvent::BoardChanged { board_id });
        }
        Ok(report)
    }

    fn load_or_empty(&self) -> Snapshot {
        self.snapshot().unwrap_or_else(|e| {
            log::error!("[kanban.store] Failed to load snapshot: {}", e);
            Snapshot::default()
        })
    }

    // ── Boards ───────────────────────────────────────────────────────────────

    pub fn get_boards(&self) -> Vec<Board> {
        assemble::assemble_boards(&self.load_or_empty())
    }

    pub fn get_board(&self, board_id: &str) -> Option<Board> {
        assemble::assemble_board(&self.load_or_empty(), board_id)
    }

    /// Upsert a board and replace its whole subtree with the given view.
    /// Columns and cards missing from the view are deleted.
    pub async fn save_board(&self, board: &Board) -> Result<IntegrityReport, StoreError> {
        let previous = self.snapshot()?;
        let mut next = previous.clone();

        let keep: HashSet<&str> = board.columns.iter().map(|c| c.id.as_str()).collect();
        let stale: Vec<String> = next
            .columns
            .values()
            .filter(|c| c.board_id == board.id && !keep.contains(c.id.as_str()))
            .map(|c| c.id.clone())
            .collect();
        for column_id in stale {
            next.remove_column_cascade(&column_id);
        }

        next.boards.insert(board.id.clone(), board.metadata());
        for column in &board.columns {
            next.unlist_column_except(&column.id, &board.id);
            place_column(&mut next, column);
        }

        self.apply(&previous, next).await
    }

    /// Cascading delete. No-op if the board does not exist.
    pub async fn delete_board(&self, board_id: &str) -> Result<(), StoreError> {
        let previous = self.snapshot()?;
        let mut next = previous.clone();
        if !next.remove_board_cascade(board_id) {
            return Ok(());
        }
        self.apply(&previous, next).await.map(|_| ())
    }

    pub async fn create_board(&self, title: &str, description: &str) -> Result<Board, StoreError> {
        let previous = self.snapshot()?;
        let mut next = previous.clone();
        let now = identity::now_timestamp();
        let id = identity::generate_id(RecordKind::Board);
        next.boards.insert(
            id.clone(),
            BoardMetadata {
                id: id.clone(),
                title: title.to_string(),
                description: description.to_string(),
                column_ids: Vec::new(),
                created_at: now.clone(),
                updated_at: now,
            },
        );
        self.apply(&previous, next).await?;
        self.get_board(&id)
            .ok_or_else(|| StoreError::not_found(RecordKind::Board, &id))
    }

    // ── Columns ──────────────────────────────────────────────────────────────

    pub fn get_column(&self, column_id: &str) -> Option<Column> {
        assemble::assemble_column(&self.load_or_empty(), column_id)
    }

    /// Columns of a board, with their cards, in display order.
    pub fn get_columns(&self, board_id: &str) -> Vec<Column> {
        assemble::columns_of(&self.load_or_empty(), board_id)
    }

    /// Upsert a column and replace its cards with the given ones. A new
    /// column is appended to its board's sequence.
    pub async fn save_column(&self, column: &Column) -> Result<IntegrityReport, StoreError> {
        validate::check_column(&column.data())?;
        let previous = self.snapshot()?;
        if !previous.boards.contains_key(&column.board_id) {
            return Err(StoreError::not_found(RecordKind::Board, &column.board_id));
        }
        let mut next = previous.clone();

        next.unlist_column_except(&column.id, &column.board_id);
        if let Some(board) = next.boards.get_mut(&column.board_id) {
            if !board.column_ids.contains(&column.id) {
                board.column_ids.push(column.id.clone());
            }
        }
        place_column(&mut next, column);

        self.apply(&previous, next).await
    }

    /// Delete a column and its cards. No-op if the column does not exist.
    pub async fn delete_column(&self, column_id: &str) -> Result<(), StoreError> {
        let previous = self.snapshot()?;
        let mut next = previous.clone();
        if !next.remove_column_cascade(column_id) {
            return Ok(());
        }
        self.apply(&previous, next).await.map(|_| ())
    }

    pub async fn create_column(&self, board_id: &str, title: &str) -> Result<Column, StoreError> {
        let previous = self.snapshot()?;
        let Some(board) = previous.boards.get(board_id) else {
            return Err(StoreError::not_found(RecordKind::Board, board_id));
        };
        let order = next_order(board.column_ids.iter().filter_map(|id| previous.columns.get(id)).map(|c| c.order));

        let mut next = previous.clone();
        let now = identity::now_timestamp();
        let id = identity::generate_id(RecordKind::Column);
        next.columns.insert(
            id.clone(),
            ColumnData {
                id: id.clone(),
                title: title.to_string(),
                board_id: board_id.to_string(),
                card_ids: Vec::new(),
                order,
                created_at: now.clone(),
                updated_at: now,
            },
        );
        if let Some(board) = next.boards.get_mut(board_id) {
            board.column_ids.push(id.clone());
        }
        self.apply(&previous, next).await?;
        self.get_column(&id)
            .ok_or_else(|| StoreError::not_found(RecordKind::Column, &id))
    }

    /// Move a column to `position` among its board's columns. Sibling
    /// `order` values are rewritten to match the new display order.
    pub async fn move_column(&self, column_id: &str, position: usize) -> Result<IntegrityReport, StoreError> {
        let previous = self.snapshot()?;
        let Some(column) = previous.columns.get(column_id) else {
            return Err(StoreError::not_found(RecordKind::Column, column_id));
        };
        let board_id = column.board_id.clone();
        let mut next = previous.clone();

        let mut ordered: Vec<String> = assemble::columns_of(&next, &board_id)
            .into_iter()
            .map(|c| c.id)
            .filter(|id| id != column_id)
            .collect();
        ordered.insert(position.min(ordered.len()), column_id.to_string());

        for (index, id) in ordered.iter().enumerate() {
            if let Some(column) = next.columns.get_mut(id) {
                column.order = index as i64;
            }
        }
        if let Some(board) = next.boards.get_mut(&board_id) {
            board.column_ids = ordered;
        }
        self.apply(&previous, next).await
    }

    // ── Cards ────────────────────────────────────────────────────────────────

    pub fn get_card(&self, card_id: &str) -> Option<Card> {
        self.load_or_empty().cards.remove(card_id)
    }

    /// Cards of a column in display order.
    pub fn get_cards(&self, column_id: &str) -> Vec<Card> {
        assemble::cards_of(&self.load_or_empty(), column_id)
    }

    /// Upsert a card into the column it names. A new card is appended to
    /// the column's sequence; a card naming a different column than before
    /// is moved there.
    pub async fn save_card(&self, card: &Card) -> Result<IntegrityReport, StoreError> {
        let mut card = card.clone();
        card.tags = validate::normalize_tags(&card.tags);
        validate::check_card(&card, &self.limits)?;

        let previous = self.snapshot()?;
        if !previous.columns.contains_key(&card.column_id) {
            return Err(StoreError::not_found(RecordKind::Column, &card.column_id));
        }
        let mut next = previous.clone();

        next.unlist_card_except(&card.id, &card.column_id);
        if let Some(column) = next.columns.get_mut(&card.column_id) {
            if !column.card_ids.contains(&card.id) {
                column.card_ids.push(card.id.clone());
            }
        }
        next.cards.insert(card.id.clone(), card);

        self.apply(&previous, next).await
    }

    /// Delete a card. No-op if the card does not exist.
    pub async fn delete_card(&self, card_id: &str) -> Result<(), StoreError> {
        let previous = self.snapshot()?;
        let mut next = previous.clone();
        if !next.remove_card(card_id) {
            return Ok(());
        }
        self.apply(&previous, next).await.map(|_| ())
    }

    pub async fn create_card(&self, column_id: &str, new_card: NewCard) -> Result<Card, StoreError> {
        let previous = self.snapshot()?;
        let Some(column) = previous.columns.get(column_id) else {
            return Err(StoreError::not_found(RecordKind::Column, column_id));
        };
        let order = next_order(column.card_ids.iter().filter_map(|id| previous.cards.get(id)).map(|c| c.order));

        let now = identity::now_timestamp();
        let card = CardData {
            id: identity::generate_id(RecordKind::Card),
            title: new_card.title,
            description: new_card.description,
            tags: validate::normalize_tags(&new_card.tags),
            assignee: new_card.assignee,
            column_id: column_id.to_string(),
            board_id: column.board_id.clone(),
            order,
            created_at: now.clone(),
            updated_at: now,
        };
        validate::check_card(&card, &self.limits)?;

        let mut next = previous.clone();
        let id = card.id.clone();
        if let Some(column) = next.columns.get_mut(column_id) {
            column.card_ids.push(id.clone());
        }
        next.cards.insert(id.clone(), card);
        self.apply(&previous, next).await?;
        self.get_card(&id)
            .ok_or_else(|| StoreError::not_found(RecordKind::Card, &id))
    }

    /// Move a card out of `from_column_id` and insert it at `position` in
    /// `to_column_id` (clamped to the end). Both columns get contiguous
    /// `order` values matching their new display order.
    pub async fn move_card(
        &self,
        card_id: &str,
        from_column_id: &str,
        to_column_id: &str,
        position: usize,
    ) -> Result<IntegrityReport, StoreError> {
        let previous = self.snapshot()?;
        let Some(card) = previous.cards.get(card_id) else {
            return Err(StoreError::not_found(RecordKind::Card, card_id));
        };
        for column_id in [from_column_id, to_column_id] {
            if !previous.columns.contains_key(column_id) {
                return Err(StoreError::not_found(RecordKind::Column, column_id));
            }
        }
        if card.column_id != from_column_id {
            log::debug!(
                "[kanban.store] Card {} lives in {}, not {}; moving it anyway",
                card_id,
                card.column_id,
                from_column_id
            );
        }

        let mut next = previous.clone();
        for column in next.columns.values_mut() {
            column.card_ids.retain(|id| id != card_id);
        }
        renumber_cards(&mut next, from_column_id, None);
        renumber_cards(&mut next, to_column_id, Some((card_id, position)));

        let target_board = next
            .columns
            .get(to_column_id)
            .map(|c| c.board_id.clone())
            .unwrap_or_default();
        if let Some(card) = next.cards.get_mut(card_id) {
            card.column_id = to_column_id.to_string();
            card.board_id = target_board;
        }

        self.apply(&previous, next).await
    }

    /// Reset all three collections to empty and persist.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.queue.save(Snapshot::default()).await?;
        log::info!("[kanban.store] Cleared all boards");
        self.emit(StoreEvent::Cleared);
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────────

    async fn apply(&self, previous: &Snapshot, mut next: Snapshot) -> Result<IntegrityReport, StoreError> {
        let now = identity::now_timestamp();
        let dirty = restamp(previous, &mut next, &now);

        let mut events = Vec::new();
        for board_id in dirty {
            if next.boards.contains_key(&board_id) {
                events.push(StoreEvent::BoardChanged { board_id });
            } else if previous.boards.contains_key(&board_id) {
                events.push(StoreEvent::BoardDeleted { board_id });
            }
        }

        let report = self.queue.save(next).await?;
        self.announce_heals(&report);
        for event in events {
            self.emit(event);
        }
        Ok(report)
    }

    fn announce_heals(&self, report: &IntegrityReport) {
        if !report.is_clean() {
            self.emit(StoreEvent::Healed {
                diagnostics: report.diagnostics.iter().map(|d| d.to_string()).collect(),
            });
        }
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Write a column view and its cards into `snapshot`, deleting cards the
/// column previously held that the view no longer has.
fn place_column(snapshot: &mut Snapshot, column: &Column) {
    let keep: HashSet<&str> = column.cards.iter().map(|c| c.id.as_str()).collect();
    let stale: Vec<String> = snapshot
        .cards
        .values()
        .filter(|c| c.column_id == column.id && !keep.contains(c.id.as_str()))
        .map(|c| c.id.clone())
        .collect();
    for card_id in stale {
        snapshot.remove_card(&card_id);
    }

    snapshot.columns.insert(column.id.clone(), column.data());
    for card in &column.cards {
        snapshot.unlist_card_except(&card.id, &column.id);
        let mut card = card.clone();
        card.tags = validate::normalize_tags(&card.tags);
        snapshot.cards.insert(card.id.clone(), card);
    }
}

fn next_order(orders: impl Iterator<Item = i64>) -> i64 {
    orders.max().map_or(0, |max| max + 1)
}

/// Rewrite a column's sequence to its display order, optionally inserting
/// `card_id` at `position`, and renumber `order` from zero.
fn renumber_cards(snapshot: &mut Snapshot, column_id: &str, insert: Option<(&str, usize)>) {
    let mut ordered: Vec<String> = assemble::cards_of(snapshot, column_id)
        .into_iter()
        .map(|c| c.id)
        .collect();
    if let Some((card_id, position)) = insert {
        ordered.insert(position.min(ordered.len()), card_id.to_string());
    }
    for (index, id) in ordered.iter().enumerate() {
        if let Some(card) = snapshot.cards.get_mut(id) {
            card.order = index as i64;
        }
    }
    if let Some(column) = snapshot.columns.get_mut(column_id) {
        column.card_ids = ordered;
    }
}

trait Stamped: Clone + PartialEq {
    fn timestamps_mut(&mut self) -> (&mut String, &mut String);
}

impl Stamped for BoardMetadata {
    fn timestamps_mut(&mut self) -> (&mut String, &mut String) {
        (&mut self.created_at, &mut self.updated_at)
    }
}

impl Stamped for ColumnData {
    fn timestamps_mut(&mut self) -> (&mut String, &mut String) {
        (&mut self.created_at, &mut self.updated_at)
    }
}

impl Stamped for CardData {
    fn timestamps_mut(&mut self) -> (&mut String, &mut String) {
        (&mut self.created_at, &mut self.updated_at)
    }
}

/// Carry timestamps over from `old`. `createdAt` is kept; `updatedAt` moves
/// to `now` only if the record differs in anything but its timestamps.
/// Returns whether the record is new or changed.
fn stamp<T: Stamped>(old: Option<&T>, record: &mut T, now: &str) -> bool {
    let Some(old) = old else {
        let (created, updated) = record.timestamps_mut();
        if created.is_empty() {
            *created = now.to_string();
        }
        *updated = now.to_string();
        return true;
    };

    let mut old = old.clone();
    let (old_created, old_updated) = {
        let (c, u) = old.timestamps_mut();
        (c.clone(), u.clone())
    };
    let mut probe = record.clone();
    {
        let (c, u) = probe.timestamps_mut();
        *c = old_created.clone();
        *u = old_updated.clone();
    }
    let changed = probe != old;

    let (created, updated) = record.timestamps_mut();
    *created = old_created;
    *updated = if changed { now.to_string() } else { old_updated };
    changed
}

/// Stamp every record in `next` against `previous` and bump `updatedAt` on
/// each board whose subtree changed. Returns the ids of those boards,
/// including boards that were removed.
fn restamp(previous: &Snapshot, next: &mut Snapshot, now: &str) -> BTreeSet<String> {
    let mut dirty = BTreeSet::new();

    for card in next.cards.values_mut() {
        let old = previous.cards.get(&card.id);
        if stamp(old, card, now) {
            dirty.insert(card.board_id.clone());
            if let Some(old) = old {
                dirty.insert(old.board_id.clone());
            }
        }
    }
    for card in previous.cards.values().filter(|c| !next.cards.contains_key(&c.id)) {
        dirty.insert(card.board_id.clone());
    }

    for column in next.columns.values_mut() {
        let old = previous.columns.get(&column.id);
        if stamp(old, column, now) {
            dirty.insert(column.board_id.clone());
            if let Some(old) = old {
                dirty.insert(old.board_id.clone());
            }
        }
    }
    for column in previous.columns.values().filter(|c| !next.columns.contains_key(&c.id)) {
        dirty.insert(column.board_id.clone());
    }

    for board in next.boards.values_mut() {
        let changed = stamp(previous.boards.get(&board.id), board, now);
        if changed {
            dirty.insert(board.id.clone());
        } else if dirty.contains(&board.id) {
            board.updated_at = now.to_string();
        }
    }
    for board in previous.boards.values().filter(|b| !next.boards.contains_key(&b.id)) {
        dirty.insert(board.id.clone());
    }

    dirty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryKv;

    async fn open_store() -> BoardStore {
        BoardStore::open(Arc::new(MemoryKv::new()), &StoreConfig::default())
            .await
            .unwrap()
    }

    #[test]
    fn test_stamp_keeps_timestamps_when_unchanged() {
        let old = BoardMetadata {
            id: "b1".to_string(),
            title: "T".to_string(),
            description: String::new(),
            column_ids: Vec::new(),
            created_at: "c".to_string(),
            updated_at: "u".to_string(),
        };
        let mut same = old.clone();
        same.updated_at = "other".to_string();
        assert!(!stamp(Some(&old), &mut same, "now"));
        assert_eq!(same.updated_at, "u");

        let mut renamed = old.clone();
        renamed.title = "New".to_string();
        assert!(stamp(Some(&old), &mut renamed, "now"));
        assert_eq!(renamed.created_at, "c");
        assert_eq!(renamed.updated_at, "now");
    }

    #[tokio::test]
    async fn test_card_change_touches_board() {
        let store = open_store().await;
        let board = store.create_board("Board", "").await.unwrap();
        let column = store.create_column(&board.id, "Todo").await.unwrap();
        let before = store.get_board(&board.id).unwrap().updated_at;

        // Timestamps have millisecond resolution.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store
            .create_card(
                &column.id,
                NewCard {
                    title: "Task".to_string(),
                    ..NewCard::default()
                },
            )
            .await
            .unwrap();

        let after = store.get_board(&board.id).unwrap().updated_at;
        assert!(after > before);
    }

    #[tokio::test]
    async fn test_create_helpers_append_in_order() {
        let store = open_store().await;
        let board = store.create_board("Board", "desc").await.unwrap();
        let todo = store.create_column(&board.id, "Todo").await.unwrap();
        let done = store.create_column(&board.id, "Done").await.unwrap();
        assert_eq!(todo.order, 0);
        assert_eq!(done.order, 1);

        let a = store
            .create_card(&todo.id, NewCard { title: "A".into(), ..NewCard::default() })
            .await
            .unwrap();
        let b = store
            .create_card(&todo.id, NewCard { title: "B".into(), tags: vec![" x ".into(), "".into()], ..NewCard::default() })
            .await
            .unwrap();
        assert_eq!(b.tags, vec!["x".to_string()]);
        assert_eq!(b.board_id, board.id);

        let cards: Vec<String> = store.get_cards(&todo.id).into_iter().map(|c| c.id).collect();
        assert_eq!(cards, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn test_create_in_missing_parent_is_not_found() {
        let store = open_store().await;
        assert!(matches!(
            store.create_column("nope", "x").await,
            Err(StoreError::NotFound { kind: RecordKind::Board, .. })
        ));
        assert!(matches!(
            store.create_card("nope", NewCard::default()).await,
            Err(StoreError::NotFound { kind: RecordKind::Column, .. })
        ));
    }

    #[tokio::test]
    async fn test_events_follow_commits() {
        let store = open_store().await;
        let mut events = store.subscribe();
        let board = store.create_board("Board", "").await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            StoreEvent::BoardChanged { board_id: board.id.clone() }
        );

        store.delete_board(&board.id).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            StoreEvent::BoardDeleted { board_id: board.id.clone() }
        );

        store.clear().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), StoreEvent::Cleared);
    }

    #[tokio::test]
    async fn test_move_column() {
        let store = open_store().await;
        let board = store.create_board("Board", "").await.unwrap();
        let a = store.create_column(&board.id, "A").await.unwrap();
        let b = store.create_column(&board.id, "B").await.unwrap();
        let c = store.create_column(&board.id, "C").await.unwrap();

        store.move_column(&c.id, 0).await.unwrap();
        let ids: Vec<String> = store.get_columns(&board.id).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![c.id.clone(), a.id.clone(), b.id.clone()]);

        store.move_column(&c.id, 99).await.unwrap();
        let ids: Vec<String> = store.get_columns(&board.id).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn test_save_card_moves_between_columns() {
        let store = open_store().await;
        let board = store.create_board("Board", "").await.unwrap();
        let todo = store.create_column(&board.id, "Todo").await.unwrap();
        let done = store.create_column(&board.id, "Done").await.unwrap();
        let mut card = store
            .create_card(&todo.id, NewCard { title: "A".into(), ..NewCard::default() })
            .await
            .unwrap();

        card.column_id = done.id.clone();
        let report = store.save_card(&card).await.unwrap();
        assert!(report.is_clean());
        assert!(store.get_cards(&todo.id).is_empty());
        assert_eq!(store.get_cards(&done.id).len(), 1);
    }

    #[tokio::test]
    async fn test_save_card_into_missing_column() {
        let store = open_store().await;
        let card = CardData {
            id: "k1".to_string(),
            title: "A".to_string(),
            description: String::new(),
            tags: Vec::new(),
            assignee: None,
            column_id: "missing".to_string(),
            board_id: "b1".to_string(),
            order: 0,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert!(matches!(
            store.save_card(&card).await,
            Err(StoreError::NotFound { kind: RecordKind::Column, .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_absent_ids_are_noops() {
        let store = open_store().await;
        store.delete_board("nope").await.unwrap();
        store.delete_column("nope").await.unwrap();
        store.delete_card("nope").await.unwrap();
        assert!(store.get_boards().is_empty());
    }
}
