/// Read assembler: rebuilds the Board -> Column -> Card hierarchy from the
/// normalized collections.
///
/// Children are resolved in sequence order and then stably sorted by their
/// `order` field, so `order` decides and the sequence only breaks ties.
/// Sequence entries naming a missing record are skipped.
use crate::types::{Board, Card, Column, ColumnData, Snapshot};

pub fn assemble_boards(snapshot: &Snapshot) -> Vec<Board> {
    let mut boards: Vec<Board> = snapshot
        .boards
        .keys()
        .filter_map(|id| assemble_board(snapshot, id))
        .collect();
    boards.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    boards
}

pub fn assemble_board(snapshot: &Snapshot, board_id: &str) -> Option<Board> {
    let board = snapshot.boards.get(board_id)?;
    Some(Board {
        id: board.id.clone(),
        title: board.title.clone(),
        description: board.description.clone(),
        created_at: board.created_at.clone(),
        updated_at: board.updated_at.clone(),
        columns: columns_of(snapshot, board_id),
    })
}

/// Columns of a board, with their cards, in display order.
pub fn columns_of(snapshot: &Snapshot, board_id: &str) -> Vec<Column> {
    let Some(board) = snapshot.boards.get(board_id) else {
        return Vec::new();
    };
    let mut columns: Vec<Column> = board
        .column_ids
        .iter()
        .filter_map(|id| {
            let column = snapshot.columns.get(id);
            if column.is_none() {
                log::debug!(
                    "[kanban.store.assemble] Board {} references missing column {}",
                    board_id,
                    id
                );
            }
            column
        })
        .map(|column| build_column(snapshot, column))
        .collect();
    columns.sort_by_key(|c| c.order);
    columns
}

pub fn assemble_column(snapshot: &Snapshot, column_id: &str) -> Option<Column> {
    snapshot
        .columns
        .get(column_id)
        .map(|column| build_column(snapshot, column))
}

/// Cards of a column in display order.
pub fn cards_of(snapshot: &Snapshot, column_id: &str) -> Vec<Card> {
    snapshot
        .columns
        .get(column_id)
        .map(|column| sorted_cards(snapshot, column))
        .unwrap_or_default()
}

fn build_column(snapshot: &Snapshot, column: &ColumnData) -> Column {
    Column {
        id: column.id.clone(),
        title: column.title.clone(),
        board_id: column.board_id.clone(),
        order: column.order,
        created_at: column.created_at.clone(),
        updated_at: column.updated_at.clone(),
        cards: sorted_cards(snapshot, column),
    }
}

fn sorted_cards(snapshot: &Snapshot, column: &ColumnData) -> Vec<Card> {
    let mut cards: Vec<Card> = column
        .card_ids
        .iter()
        .filter_map(|id| snapshot.cards.get(id))
        .cloned()
        .collect();
    cards.sort_by_key(|c| c.order);
    cards
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoardMetadata, CardData};

    fn card(id: &str, order: i64) -> CardData {
        CardData {
            id: id.to_string(),
            title: id.to_uppercase(),
            description: String::new(),
            tags: Vec::new(),
            assignee: None,
            column_id: "c1".to_string(),
            board_id: "b1".to_string(),
            order,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn column(id: &str, order: i64, cards: &[&str]) -> ColumnData {
        ColumnData {
            id: id.to_string(),
            title: id.to_string(),
            board_id: "b1".to_string(),
            card_ids: cards.iter().map(|s| s.to_string()).collect(),
            order,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot::from_records(
            vec![BoardMetadata {
                id: "b1".to_string(),
                title: "Board".to_string(),
                description: String::new(),
                column_ids: vec!["c1".to_string(), "c2".to_string(), "ghost".to_string()],
                created_at: "2024-01-01T00:00:00.000Z".to_string(),
                updated_at: String::new(),
            }],
            vec![column("c1", 5, &["k1", "k2", "k3", "missing"]), column("c2", 1, &[])],
            // k3 and k1 tie on order: the sequence keeps k1 first.
            vec![card("k1", 2), card("k2", 0), card("k3", 2)],
        )
    }

    #[test]
    fn test_columns_sorted_by_order() {
        let board = assemble_board(&snapshot(), "b1").unwrap();
        let ids: Vec<&str> = board.columns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);
    }

    #[test]
    fn test_cards_sorted_by_order_ties_by_sequence() {
        let cards = cards_of(&snapshot(), "c1");
        let ids: Vec<&str> = cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["k2", "k1", "k3"]);
    }

    #[test]
    fn test_missing_references_skipped() {
        let board = assemble_board(&snapshot(), "b1").unwrap();
        assert_eq!(board.columns.len(), 2);
        assert_eq!(board.columns[1].cards.len(), 3);
    }

    #[test]
    fn test_absent_ids() {
        let snap = snapshot();
        assert!(assemble_board(&snap, "nope").is_none());
        assert!(assemble_column(&snap, "nope").is_none());
        assert!(cards_of(&snap, "nope").is_empty());
        assert!(columns_of(&snap, "nope").is_empty());
        assert!(assemble_boards(&Snapshot::default()).is_empty());
    }
}
