use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Normalized board record. `column_ids` defines the display order of columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub column_ids: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnData {
    pub id: String,
    pub title: String,
    pub board_id: String,
    pub card_ids: Vec<String>,
    pub order: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Normalized card record. Also used directly as the card view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardData {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(alias = "labels")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub column_id: String,
    pub board_id: String,
    pub order: i64,
    pub created_at: String,
    pub updated_at: String,
}

pub type Card = CardData;

/// The three normalized collections, keyed by record id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub boards: BTreeMap<String, BoardMetadata>,
    pub columns: BTreeMap<String, ColumnData>,
    pub cards: BTreeMap<String, CardData>,
}

impl Snapshot {
    pub fn from_records(
        boards: Vec<BoardMetadata>,
        columns: Vec<ColumnData>,
        cards: Vec<CardData>,
    ) -> Self {
        Self {
            boards: boards.into_iter().map(|b| (b.id.clone(), b)).collect(),
            columns: columns.into_iter().map(|c| (c.id.clone(), c)).collect(),
            cards: cards.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty() && self.columns.is_empty() && self.cards.is_empty()
    }

    /// Remove a board together with every column and card it owns.
    /// Returns false if the board did not exist.
    pub fn remove_board_cascade(&mut self, board_id: &str) -> bool {
        if self.boards.remove(board_id).is_none() {
            return false;
        }
        let column_ids: Vec<String> = self
            .columns
            .values()
            .filter(|c| c.board_id == board_id)
            .map(|c| c.id.clone())
            .collect();
        for column_id in column_ids {
            self.remove_column_cascade(&column_id);
        }
        // Cards whose column was already gone but still point at the board.
        self.cards.retain(|_, card| card.board_id != board_id);
        true
    }

    /// Remove a column, its cards, and its id from the owning board's sequence.
    pub fn remove_column_cascade(&mut self, column_id: &str) -> bool {
        let Some(column) = self.columns.remove(column_id) else {
            return false;
        };
        if let Some(board) = self.boards.get_mut(&column.board_id) {
            board.column_ids.retain(|id| id != column_id);
        }
        for card_id in &column.card_ids {
            self.cards.remove(card_id);
        }
        self.cards.retain(|_, card| card.column_id != column_id);
        true
    }

    /// Remove a card and its id from the owning column's sequence.
    pub fn remove_card(&mut self, card_id: &str) -> bool {
        let Some(card) = self.cards.remove(card_id) else {
            return false;
        };
        if let Some(column) = self.columns.get_mut(&card.column_id) {
            column.card_ids.retain(|id| id != card_id);
        }
        true
    }

    /// Drop `column_id` from every board sequence except `keep_board`.
    pub fn unlist_column_except(&mut self, column_id: &str, keep_board: &str) {
        for board in self.boards.values_mut() {
            if board.id != keep_board {
                board.column_ids.retain(|id| id != column_id);
            }
        }
    }

    /// Drop `card_id` from every column sequence except `keep_column`.
    pub fn unlist_card_except(&mut self, card_id: &str, keep_column: &str) {
        for column in self.columns.values_mut() {
            if column.id != keep_column {
                column.card_ids.retain(|id| id != card_id);
            }
        }
    }
}

/// Hierarchical board view produced by the read assembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub title: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub title: String,
    pub board_id: String,
    pub order: i64,
    pub created_at: String,
    pub updated_at: String,
    pub cards: Vec<Card>,
}

impl Board {
    /// Normalized projection; the column sequence follows the view order.
    pub fn metadata(&self) -> BoardMetadata {
        BoardMetadata {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            column_ids: self.columns.iter().map(|c| c.id.clone()).collect(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

impl Column {
    pub fn data(&self) -> ColumnData {
        ColumnData {
            id: self.id.clone(),
            title: self.title.clone(),
            board_id: self.board_id.clone(),
            card_ids: self.cards.iter().map(|c| c.id.clone()).collect(),
            order: self.order,
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

/// Caller-supplied fields for a card created through `BoardStore::create_card`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCard {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assignee: Option<String>,
}
