/// Decoder for the legacy nested board format.
///
/// Older stores kept a single `boards` object keyed by board id, with
/// columns and cards embedded inline:
///
/// ```text
/// { "b1": { "title": "...", "columns": [ { "title": "...", "cards": [ {...} ] } ] } }
/// ```
///
/// Flattening synthesizes the `columnIds`/`cardIds` sequences and fills any
/// missing `order`, `tags`, `createdAt` and `updatedAt`. Missing ids are
/// derived from the parent id and position, so re-running the migration on
/// the same input yields the same ids.
use serde_json::{json, Map, Value};

use super::{MigrationContext, RawSnapshot};

const UNTITLED: &str = "Untitled";

fn text<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn non_empty<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    text(obj, key).filter(|s| !s.is_empty())
}

fn items<'a>(obj: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    obj.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn order_or(obj: &Map<String, Value>, index: usize) -> i64 {
    obj.get("order")
        .and_then(Value::as_i64)
        .unwrap_or(index as i64)
}

/// Tags from `tags` or `labels`, keeping only string entries.
fn tags(obj: &Map<String, Value>) -> Vec<Value> {
    obj.get("tags")
        .or_else(|| obj.get("labels"))
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter(|t| t.is_string()).cloned().collect())
        .unwrap_or_default()
}

struct Stamps {
    created: String,
    updated: String,
}

impl Stamps {
    fn resolve(obj: &Map<String, Value>, fallback: &str) -> Self {
        let created = text(obj, "createdAt").unwrap_or(fallback).to_string();
        let updated = text(obj, "updatedAt").unwrap_or(&created).to_string();
        Self { created, updated }
    }
}

/// Flatten the nested boards object into the normalized record lists.
pub fn flatten(nested: Map<String, Value>, ctx: &MigrationContext) -> RawSnapshot {
    let mut boards = Vec::new();
    let mut columns = Vec::new();
    let mut cards = Vec::new();

    for (key, value) in &nested {
        let Some(board) = value.as_object() else {
            log::warn!(
                "[kanban.store.migrate.legacy] Skipping board {}: not an object",
                key
            );
            continue;
        };
        let board_id = non_empty(board, "id").unwrap_or(key).to_string();
        let board_stamps = Stamps::resolve(board, &ctx.now);
        let mut column_ids = Vec::new();

        for (column_index, column_value) in items(board, "columns").iter().enumerate() {
            let Some(column) = column_value.as_object() else {
                continue;
            };
            let column_id = non_empty(column, "id")
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}-col-{}", board_id, column_index));
            let column_stamps = Stamps::resolve(column, &board_stamps.created);
            let mut card_ids = Vec::new();

            for (card_index, card_value) in items(column, "cards").iter().enumerate() {
                let Some(card) = card_value.as_object() else {
                    continue;
                };
                let card_id = non_empty(card, "id")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}-card-{}", column_id, card_index));
                let card_stamps = Stamps::resolve(card, &column_stamps.created);

                let mut record = json!({
                    "id": card_id,
                    "title": text(card, "title").unwrap_or(UNTITLED),
                    "description": text(card, "description").unwrap_or(""),
                    "tags": tags(card),
                    "columnId": column_id,
                    "boardId": board_id,
                    "order": order_or(card, card_index),
                    "createdAt": card_stamps.created,
                    "updatedAt": card_stamps.updated,
                });
                if let Some(assignee) = text(card, "assignee") {
                    record["assignee"] = json!(assignee);
                }
                card_ids.push(card_id);
                cards.push(record);
            }

            columns.push(json!({
                "id": column_id,
                "title": text(column, "title").unwrap_or(UNTITLED),
                "boardId": board_id,
                "cardIds": card_ids,
                "order": order_or(column, column_index),
                "createdAt": column_stamps.created,
                "updatedAt": column_stamps.updated,
            }));
            column_ids.push(column_id);
        }

        boards.push(json!({
            "id": board_id,
            "title": text(board, "title").unwrap_or(UNTITLED),
            "description": text(board, "description").unwrap_or(""),
            "columnIds": column_ids,
            "createdAt": board_stamps.created,
            "updatedAt": board_stamps.updated,
        }));
    }

    log::info!(
        "[kanban.store.migrate.legacy] Flattened {} board(s), {} column(s), {} card(s)",
        boards.len(),
        columns.len(),
        cards.len()
    );
    RawSnapshot {
        boards: Value::Array(boards),
        columns: Value::Array(columns),
        cards: Value::Array(cards),
    }
}
