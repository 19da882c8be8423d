//! Applying a server snapshot to the local graph.
//!
//! The snapshot is authoritative for the columns it lists and for the
//! tickets inside them. Columns it does not list are left alone, except that
//! a ticket it reports elsewhere is moved out of them. Ticket objects are
//! reused by id so local identity, fidelity and unrelated dirty fields
//! survive.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::Board;
use super::dialog::DialogBuffer;
use super::events::{BoardEvent, MergeReport};
use crate::model::column::{Column, TicketPool};
use crate::model::ids::{ColumnId, TicketId};
use crate::sync::wire::{BoardSnapshot, ColumnSnapshot};

impl Board {
    /// Merge `snapshot` and upgrade the tickets in `detailed` it carries.
    pub(super) fn merge_snapshot(
        &mut self,
        snapshot: &BoardSnapshot,
        detailed: &[TicketId],
    ) -> MergeReport {
        let columns = dedup_snapshot(snapshot);
        let listed: HashSet<TicketId> = columns
            .iter()
            .flat_map(|c| c.tickets.iter().map(|t| t.id))
            .collect();
        let reported: HashSet<&ColumnId> = columns.iter().map(|c| &c.id).collect();

        let mut pool = TicketPool::new();
        for column in &mut self.columns {
            if reported.contains(column.id()) {
                column.drain_into(&mut pool);
                continue;
            }
            let moving: Vec<TicketId> = column
                .ticket_ids()
                .filter(|id| listed.contains(id))
                .collect();
            for id in moving {
                if let Some(ticket) = column.take(id) {
                    pool.insert(id, (ticket, column.id().clone()));
                }
            }
        }

        let mut events = Vec::new();
        for data in &columns {
            if let Some(column) = self.columns.iter_mut().find(|c| c.id() == &data.id) {
                column.merge_from_server(data, &mut pool, &mut events);
            } else {
                let mut column =
                    Column::new(data.id.clone(), &data.name, data.wip, data.states.clone());
                events.push(BoardEvent::ColumnCreated(data.id.clone()));
                column.merge_from_server(data, &mut pool, &mut events);
                self.columns.push(column);
            }
        }

        let mut removed: Vec<TicketId> = pool.into_keys().collect();
        removed.sort_unstable();
        events.extend(removed.into_iter().map(BoardEvent::TicketRemoved));

        for id in detailed.iter().filter(|id| listed.contains(id)) {
            if let Some(ticket) = self.ticket_mut(*id) {
                ticket.mark_detailed();
            }
        }

        self.reconcile_selection(&mut events);

        debug!(
            columns = columns.len(),
            tickets = listed.len(),
            events = events.len(),
            "merged snapshot"
        );
        MergeReport { events }
    }

    /// Keep the selection and the dialog buffer consistent with what the
    /// merge just did to the selected ticket.
    fn reconcile_selection(&mut self, events: &mut Vec<BoardEvent>) {
        let Some(id) = self.selected else {
            return;
        };
        let Some(ticket) = self.ticket(id) else {
            self.selected = None;
            events.push(BoardEvent::SelectionCleared(id));
            return;
        };

        let changed = events.iter().any(|e| match e {
            BoardEvent::TicketUpdated(t) | BoardEvent::TicketMoved { id: t, .. } => *t == id,
            _ => false,
        });
        if !changed {
            return;
        }

        let Some(dialog) = self.dialog.as_ref().filter(|d| d.origin() == Some(id)) else {
            return;
        };
        if dialog.is_pristine() {
            let fresh = DialogBuffer::for_ticket(ticket);
            self.dialog = Some(fresh);
            events.push(BoardEvent::SelectionRefreshed(id));
        } else {
            events.push(BoardEvent::DialogStale(id));
        }
    }
}

/// Drop repeated columns and tickets a second column claims again.
fn dedup_snapshot(snapshot: &BoardSnapshot) -> Vec<ColumnSnapshot> {
    let mut seen_columns = HashSet::new();
    let mut seen_tickets = HashSet::new();
    let mut out = Vec::with_capacity(snapshot.columns.len());

    for column in &snapshot.columns {
        if !seen_columns.insert(column.id.clone()) {
            warn!(column = %column.id, "snapshot repeats a column; ignoring the repeat");
            continue;
        }
        let mut column = column.clone();
        column.tickets.retain(|t| {
            let first = seen_tickets.insert(t.id);
            if !first {
                warn!(
                    ticket = %t.id,
                    column = %column.id,
                    "snapshot lists a ticket twice; keeping the first"
                );
            }
            first
        });
        out.push(column);
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::board::{Board, BoardEvent, BoardSettings};
    use crate::model::catalog::{FieldCatalog, FieldDef, FieldKind, FieldRoles};
    use crate::model::ids::{ColumnId, TicketId};
    use crate::model::ticket::Fidelity;
    use crate::model::value::FieldValue;
    use crate::sync::wire::{BoardSnapshot, ColumnSnapshot, TicketSnapshot};

    fn catalog() -> FieldCatalog {
        FieldCatalog::new(
            vec![
                FieldDef::new("summary", "Summary", FieldKind::Text),
                FieldDef::new("status", "Status", FieldKind::Radio)
                    .with_options(&["new", "accepted", "closed"]),
                FieldDef::new("priority", "Priority", FieldKind::Select)
                    .with_options(&["major", "minor"]),
            ],
            FieldRoles::default(),
        )
    }

    fn ticket(id: u64, status: &str) -> TicketSnapshot {
        TicketSnapshot {
            id: TicketId::new(id),
            fields: [
                ("summary".to_string(), FieldValue::text(format!("ticket {id}"))),
                ("status".to_string(), FieldValue::text(status)),
            ]
            .into_iter()
            .collect(),
        }
    }

    fn column(id: &str, state: &str, ids: &[u64]) -> ColumnSnapshot {
        ColumnSnapshot {
            id: ColumnId::from(id),
            name: id.to_string(),
            wip: None,
            states: vec![state.to_string()],
            tickets: ids.iter().map(|&i| ticket(i, state)).collect(),
        }
    }

    fn board() -> Board {
        let snap = BoardSnapshot {
            columns: vec![column("A", "new", &[1, 2]), column("B", "accepted", &[3])],
        };
        Board::new(catalog(), &snap, BoardSettings::for_user("alice"))
    }

    fn ids(board: &Board, col: &str) -> Vec<u64> {
        board
            .column(&ColumnId::from(col))
            .expect("column")
            .ticket_ids()
            .map(TicketId::get)
            .collect()
    }

    #[test]
    fn initial_snapshot_builds_columns() {
        let b = board();
        assert_eq!(b.columns().count(), 2);
        assert_eq!(ids(&b, "A"), vec![1, 2]);
        assert_eq!(ids(&b, "B"), vec![3]);
    }

    #[test]
    fn ticket_moved_on_server_keeps_identity() {
        let mut b = board();
        b.set_ticket_field(TicketId::new(1), "priority", "minor")
            .expect("edit");

        let report = b.merge_snapshot(
            &BoardSnapshot {
                columns: vec![column("A", "new", &[2]), column("B", "accepted", &[1, 3])],
            },
            &[],
        );

        assert!(report.contains(&BoardEvent::TicketMoved {
            id: TicketId::new(1),
            from: ColumnId::from("A"),
            to: ColumnId::from("B"),
        }));
        assert_eq!(ids(&b, "B"), vec![1, 3]);
        let one = b.ticket(TicketId::new(1)).expect("ticket 1");
        assert_eq!(one.text("status"), "accepted");
        assert!(one.dirty_fields().contains("priority"));
    }

    #[test]
    fn partial_snapshot_leaves_other_columns_alone() {
        let mut b = board();
        let report = b.merge_snapshot(
            &BoardSnapshot {
                columns: vec![column("B", "accepted", &[3, 2])],
            },
            &[],
        );
        assert_eq!(ids(&b, "A"), vec![1]);
        assert_eq!(ids(&b, "B"), vec![3, 2]);
        assert!(!report.contains(&BoardEvent::TicketRemoved(TicketId::new(1))));
    }

    #[test]
    fn missing_tickets_are_removed_and_new_columns_created() {
        let mut b = board();
        let report = b.merge_snapshot(
            &BoardSnapshot {
                columns: vec![column("A", "new", &[1]), column("C", "closed", &[9])],
            },
            &[],
        );
        assert_eq!(
            report.events,
            vec![
                BoardEvent::ColumnCreated(ColumnId::from("C")),
                BoardEvent::TicketCreated(TicketId::new(9)),
                BoardEvent::TicketRemoved(TicketId::new(2)),
            ]
        );
        assert!(b.ticket(TicketId::new(2)).is_none());
        assert_eq!(ids(&b, "B"), vec![3]);
    }

    #[test]
    fn merging_twice_is_quiet_the_second_time() {
        let mut b = board();
        let snap = BoardSnapshot {
            columns: vec![column("A", "new", &[2]), column("B", "accepted", &[1, 3])],
        };
        assert!(!b.merge_snapshot(&snap, &[]).is_noop());
        assert!(b.merge_snapshot(&snap, &[]).is_noop());
    }

    #[test]
    fn duplicate_tickets_keep_first_column() {
        let mut b = board();
        b.merge_snapshot(
            &BoardSnapshot {
                columns: vec![column("A", "new", &[1, 2]), column("B", "accepted", &[3, 1])],
            },
            &[],
        );
        assert_eq!(ids(&b, "A"), vec![1, 2]);
        assert_eq!(ids(&b, "B"), vec![3]);
    }

    #[test]
    fn detailed_flag_only_for_listed_tickets() {
        let mut b = board();
        b.merge_snapshot(
            &BoardSnapshot {
                columns: vec![column("A", "new", &[1, 2])],
            },
            &[TicketId::new(1), TicketId::new(3)],
        );
        assert_eq!(
            b.ticket(TicketId::new(1)).expect("1").fidelity(),
            Fidelity::Detailed
        );
        assert_eq!(
            b.ticket(TicketId::new(3)).expect("3").fidelity(),
            Fidelity::Summary
        );
    }
}
