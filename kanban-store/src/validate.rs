/// Schema validators.
///
/// The `is_*` predicates gate raw decoded values before they enter a trusted
/// collection: they never mutate and never fail, a `false` simply means the
/// row is skipped. The `check_*` functions run the same rules over typed
/// records on the write path and name the first violated field.
use std::fmt;

use serde_json::{Map, Value};

use crate::types::{BoardMetadata, CardData, ColumnData};

/// Tag caps applied to every card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_tags: usize,
    pub max_tag_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_tags: 32,
            max_tag_length: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Board,
    Column,
    Card,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Board => "board",
            RecordKind::Column => "column",
            RecordKind::Card => "card",
        })
    }
}

/// A record that does not match its expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} {id:?}: {problem}")]
pub struct SchemaViolation {
    pub kind: RecordKind,
    pub id: String,
    pub problem: String,
}

impl SchemaViolation {
    pub fn new(kind: RecordKind, id: &str, problem: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.to_string(),
            problem: problem.into(),
        }
    }
}

// ── Raw value predicates ─────────────────────────────────────────────────────

fn has_string(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).is_some_and(Value::is_string)
}

fn has_id(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty())
}

fn has_string_list(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key)
        .and_then(Value::as_array)
        .is_some_and(|items| items.iter().all(Value::is_string))
}

fn has_integer(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).is_some_and(|v| v.as_i64().is_some())
}

fn has_optional_string(obj: &Map<String, Value>, key: &str) -> bool {
    matches!(obj.get(key), None | Some(Value::Null) | Some(Value::String(_)))
}

fn has_timestamps(obj: &Map<String, Value>) -> bool {
    has_string(obj, "createdAt") && has_string(obj, "updatedAt")
}

fn tags_within(tags: &[Value], limits: &Limits) -> bool {
    tags.len() <= limits.max_tags
        && tags.iter().all(|t| {
            t.as_str()
                .is_some_and(|s| s.chars().count() <= limits.max_tag_length)
        })
}

pub fn is_board_metadata(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    has_id(obj, "id")
        && has_string(obj, "title")
        && has_string(obj, "description")
        && has_string_list(obj, "columnIds")
        && has_timestamps(obj)
}

pub fn is_column_data(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    has_id(obj, "id")
        && has_string(obj, "title")
        && has_id(obj, "boardId")
        && has_string_list(obj, "cardIds")
        && has_integer(obj, "order")
        && has_timestamps(obj)
}

/// Cards may carry their tags under `tags` or the older `labels` key.
pub fn is_card_data(value: &Value, limits: &Limits) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let tags = obj
        .get("tags")
        .or_else(|| obj.get("labels"))
        .and_then(Value::as_array);
    has_id(obj, "id")
        && has_string(obj, "title")
        && has_string(obj, "description")
        && tags.is_some_and(|t| tags_within(t, limits))
        && has_optional_string(obj, "assignee")
        && has_id(obj, "columnId")
        && has_id(obj, "boardId")
        && has_integer(obj, "order")
        && has_timestamps(obj)
}

// ── Typed checks (write path) ────────────────────────────────────────────────

fn require_id(kind: RecordKind, id: &str, field: &str, value: &str) -> Result<(), SchemaViolation> {
    if value.is_empty() {
        return Err(SchemaViolation::new(kind, id, format!("missing {}", field)));
    }
    Ok(())
}

pub fn check_board(board: &BoardMetadata) -> Result<(), SchemaViolation> {
    require_id(RecordKind::Board, &board.id, "id", &board.id)?;
    if board.column_ids.iter().any(String::is_empty) {
        return Err(SchemaViolation::new(
            RecordKind::Board,
            &board.id,
            "empty entry in columnIds",
        ));
    }
    Ok(())
}

pub fn check_column(column: &ColumnData) -> Result<(), SchemaViolation> {
    require_id(RecordKind::Column, &column.id, "id", &column.id)?;
    require_id(RecordKind::Column, &column.id, "boardId", &column.board_id)?;
    if column.card_ids.iter().any(String::is_empty) {
        return Err(SchemaViolation::new(
            RecordKind::Column,
            &column.id,
            "empty entry in cardIds",
        ));
    }
    Ok(())
}

pub fn check_card(card: &CardData, limits: &Limits) -> Result<(), SchemaViolation> {
    require_id(RecordKind::Card, &card.id, "id", &card.id)?;
    require_id(RecordKind::Card, &card.id, "columnId", &card.column_id)?;
    require_id(RecordKind::Card, &card.id, "boardId", &card.board_id)?;
    if card.tags.len() > limits.max_tags {
        return Err(SchemaViolation::new(
            RecordKind::Card,
            &card.id,
            format!("{} tags exceeds cap of {}", card.tags.len(), limits.max_tags),
        ));
    }
    if let Some(tag) = card
        .tags
        .iter()
        .find(|t| t.chars().count() > limits.max_tag_length)
    {
        return Err(SchemaViolation::new(
            RecordKind::Card,
            &card.id,
            format!("tag {:?} longer than {} chars", tag, limits.max_tag_length),
        ));
    }
    Ok(())
}

/// Trim tags and drop the empty ones.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
