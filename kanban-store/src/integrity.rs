/// Referential integrity checker.
///
/// Runs over a complete proposed snapshot before it is persisted.
///
/// Hard tier: any record that fails its schema check (or is stored under a
/// key other than its own id) aborts the commit with a `SchemaViolation`.
///
/// Soft tier: cross-reference drift between the three collections is healed
/// in place and reported as `Diagnostic`s. A parent's id sequence is
/// authoritative for ownership when it lists a child; a child's owner field
/// is authoritative only when no parent lists it. Children whose owner does
/// not exist at all are removed.
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::types::Snapshot;
use crate::validate::{self, Limits, RecordKind, SchemaViolation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A sequence referenced a record that does not exist.
    DanglingRef {
        kind: RecordKind,
        parent_id: String,
        child_id: String,
    },
    /// A child was listed more than once, or by more than one parent.
    DuplicateRef {
        kind: RecordKind,
        parent_id: String,
        child_id: String,
    },
    /// The child's owner field disagreed with the parent listing it.
    OwnerRewritten {
        kind: RecordKind,
        child_id: String,
        from: String,
        to: String,
    },
    /// A card's board did not match its column's board.
    CardBoardRewritten {
        card_id: String,
        from: String,
        to: String,
    },
    /// A child was missing from its owner's sequence and was appended.
    BackRefAdded {
        kind: RecordKind,
        parent_id: String,
        child_id: String,
    },
    /// A child pointed at an owner that does not exist.
    OrphanRemoved {
        kind: RecordKind,
        child_id: String,
        parent_id: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::DanglingRef {
                kind,
                parent_id,
                child_id,
            } => write!(f, "dropped dangling {} {} from {}", kind, child_id, parent_id),
            Diagnostic::DuplicateRef {
                kind,
                parent_id,
                child_id,
            } => write!(f, "dropped duplicate {} {} from {}", kind, child_id, parent_id),
            Diagnostic::OwnerRewritten {
                kind,
                child_id,
                from,
                to,
            } => write!(f, "{} {} owner rewritten {} -> {}", kind, child_id, from, to),
            Diagnostic::CardBoardRewritten { card_id, from, to } => {
                write!(f, "card {} board rewritten {} -> {}", card_id, from, to)
            }
            Diagnostic::BackRefAdded {
                kind,
                parent_id,
                child_id,
            } => write!(f, "appended {} {} to {}", kind, child_id, parent_id),
            Diagnostic::OrphanRemoved {
                kind,
                child_id,
                parent_id,
            } => write!(f, "removed orphan {} {} (owner {} missing)", kind, child_id, parent_id),
        }
    }
}

/// Outcome of a successful check: the heals applied to the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Validate and heal `snapshot` in place.
pub fn check(snapshot: &mut Snapshot, limits: &Limits) -> Result<IntegrityReport, SchemaViolation> {
    check_records(snapshot, limits)?;

    let mut report = IntegrityReport::default();
    reconcile_columns(snapshot, &mut report.diagnostics);
    reconcile_cards(snapshot, &mut report.diagnostics);

    for diagnostic in &report.diagnostics {
        log::warn!("[kanban.store.integrity] {}", diagnostic);
    }
    Ok(report)
}

fn key_mismatch(kind: RecordKind, key: &str, id: &str) -> SchemaViolation {
    SchemaViolation::new(kind, id, format!("stored under key {:?}", key))
}

fn check_records(snapshot: &Snapshot, limits: &Limits) -> Result<(), SchemaViolation> {
    for (key, board) in &snapshot.boards {
        validate::check_board(board)?;
        if key != &board.id {
            return Err(key_mismatch(RecordKind::Board, key, &board.id));
        }
    }
    for (key, column) in &snapshot.columns {
        validate::check_column(column)?;
        if key != &column.id {
            return Err(key_mismatch(RecordKind::Column, key, &column.id));
        }
    }
    for (key, card) in &snapshot.cards {
        validate::check_card(card, limits)?;
        if key != &card.id {
            return Err(key_mismatch(RecordKind::Card, key, &card.id));
        }
    }
    Ok(())
}

/// Strip dangling and repeated entries from one sequence, recording each
/// surviving entry as listed by `parent_id`.
fn prune_sequence(
    kind: RecordKind,
    parent_id: &str,
    sequence: &mut Vec<String>,
    exists: impl Fn(&str) -> bool,
    listed_by: &mut BTreeMap<String, Vec<String>>,
    out: &mut Vec<Diagnostic>,
) {
    let mut seen = HashSet::new();
    sequence.retain(|child_id| {
        if !exists(child_id.as_str()) {
            out.push(Diagnostic::DanglingRef {
                kind,
                parent_id: parent_id.to_string(),
                child_id: child_id.clone(),
            });
            return false;
        }
        if !seen.insert(child_id.clone()) {
            out.push(Diagnostic::DuplicateRef {
                kind,
                parent_id: parent_id.to_string(),
                child_id: child_id.clone(),
            });
            return false;
        }
        listed_by
            .entry(child_id.clone())
            .or_default()
            .push(parent_id.to_string());
        true
    });
}

/// Pick the owner among the parents listing a child: the one the child
/// already names if present, otherwise the first lister.
fn choose_owner<'a>(listers: &'a [String], current: &str) -> &'a str {
    listers
        .iter()
        .find(|p| p.as_str() == current)
        .unwrap_or(&listers[0])
}

fn reconcile_columns(snapshot: &mut Snapshot, out: &mut Vec<Diagnostic>) {
    let mut listed_by: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let columns = &snapshot.columns;
    for board in snapshot.boards.values_mut() {
        prune_sequence(
            RecordKind::Column,
            &board.id,
            &mut board.column_ids,
            |id| columns.contains_key(id),
            &mut listed_by,
            out,
        );
    }

    let mut orphans = Vec::new();
    let column_ids: Vec<String> = snapshot.columns.keys().cloned().collect();
    for column_id in column_ids {
        let current = snapshot.columns[&column_id].board_id.clone();
        match listed_by.get(&column_id) {
            Some(listers) => {
                let owner = choose_owner(listers, &current).to_string();
                for other in listers.iter().filter(|p| **p != owner) {
                    out.push(Diagnostic::DuplicateRef {
                        kind: RecordKind::Column,
                        parent_id: other.clone(),
                        child_id: column_id.clone(),
                    });
                }
                if listers.len() > 1 {
                    snapshot.unlist_column_except(&column_id, &owner);
                }
                if owner != current {
                    out.push(Diagnostic::OwnerRewritten {
                        kind: RecordKind::Column,
                        child_id: column_id.clone(),
                        from: current,
                        to: owner.clone(),
                    });
                    if let Some(column) = snapshot.columns.get_mut(&column_id) {
                        column.board_id = owner;
                    }
                }
            }
            None => match snapshot.boards.get_mut(&current) {
                Some(board) => {
                    board.column_ids.push(column_id.clone());
                    out.push(Diagnostic::BackRefAdded {
                        kind: RecordKind::Column,
                        parent_id: current,
                        child_id: column_id,
                    });
                }
                None => {
                    out.push(Diagnostic::OrphanRemoved {
                        kind: RecordKind::Column,
                        child_id: column_id.clone(),
                        parent_id: current,
                    });
                    orphans.push(column_id);
                }
            },
        }
    }

    // Removing the column leaves its cards pointing nowhere; the card pass
    // then reports and removes them as orphans.
    for column_id in orphans {
        snapshot.columns.remove(&column_id);
    }
}

fn reconcile_cards(snapshot: &mut Snapshot, out: &mut Vec<Diagnostic>) {
    let mut listed_by: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let cards = &snapshot.cards;
    for column in snapshot.columns.values_mut() {
        prune_sequence(
            RecordKind::Card,
            &column.id,
            &mut column.card_ids,
            |id| cards.contains_key(id),
            &mut listed_by,
            out,
        );
    }

    let mut orphans = Vec::new();
    let card_ids: Vec<String> = snapshot.cards.keys().cloned().collect();
    for card_id in card_ids {
        let current = snapshot.cards[&card_id].column_id.clone();
        let owner = match listed_by.get(&card_id) {
            Some(listers) => {
                let owner = choose_owner(listers, &current).to_string();
                for other in listers.iter().filter(|p| **p != owner) {
                    out.push(Diagnostic::DuplicateRef {
                        kind: RecordKind::Card,
                        parent_id: other.clone(),
                        child_id: card_id.clone(),
                    });
                }
                if listers.len() > 1 {
                    snapshot.unlist_card_except(&card_id, &owner);
                }
                if owner != current {
                    out.push(Diagnostic::OwnerRewritten {
                        kind: RecordKind::Card,
                        child_id: card_id.clone(),
                        from: current,
                        to: owner.clone(),
                    });
                }
                owner
            }
            None => match snapshot.columns.get_mut(&current) {
                Some(column) => {
                    column.card_ids.push(card_id.clone());
                    out.push(Diagnostic::BackRefAdded {
                        kind: RecordKind::Card,
                        parent_id: current.clone(),
                        child_id: card_id.clone(),
                    });
                    current
                }
                None => {
                    out.push(Diagnostic::OrphanRemoved {
                        kind: RecordKind::Card,
                        child_id: card_id.clone(),
                        parent_id: current,
                    });
                    orphans.push(card_id);
                    continue;
                }
            },
        };

        let Some(board_id) = snapshot.columns.get(&owner).map(|c| c.board_id.clone()) else {
            continue;
        };
        if let Some(card) = snapshot.cards.get_mut(&card_id) {
            card.column_id = owner;
            if card.board_id != board_id {
                out.push(Diagnostic::CardBoardRewritten {
                    card_id: card_id.clone(),
                    from: std::mem::replace(&mut card.board_id, board_id.clone()),
                    to: board_id,
                });
            }
        }
    }

    for card_id in orphans {
        snapshot.cards.remove(&card_id);
    }
}
