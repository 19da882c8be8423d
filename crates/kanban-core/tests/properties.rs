use proptest::prelude::*;

use kanban_core::sync::{ColumnSnapshot, TicketSnapshot};
use kanban_core::{BoardSnapshot, Call, ColumnId, Fidelity, FieldValue, TicketId};

#[path = "support.rs"]
mod support;
use support::*;

const STATES: [&str; 4] = ["new", "accepted", "assigned", "closed"];

/// Up to four columns with one state each and tickets 1..=n spread across
/// them.
fn arb_snapshot() -> impl Strategy<Value = BoardSnapshot> {
    (1usize..=4, prop::collection::vec((0usize..4, "[a-z]{1,8}"), 1..16)).prop_map(
        |(ncols, placements)| {
            let mut columns: Vec<ColumnSnapshot> = (0..ncols)
                .map(|i| ColumnSnapshot {
                    id: ColumnId::from(i64::try_from(i).unwrap_or_default()),
                    name: format!("col {i}"),
                    wip: None,
                    states: vec![STATES[i].to_string()],
                    tickets: Vec::new(),
                })
                .collect();
            for (n, (col, title)) in placements.into_iter().enumerate() {
                let col = col % ncols;
                let state = STATES[col];
                columns[col].tickets.push(TicketSnapshot {
                    id: TicketId::new(n as u64 + 1),
                    fields: [
                        ("summary".to_string(), FieldValue::text(title)),
                        ("status".to_string(), FieldValue::text(state)),
                    ]
                    .into_iter()
                    .collect(),
                });
            }
            BoardSnapshot { columns }
        },
    )
}

fn arb_field_edit() -> impl Strategy<Value = (&'static str, String)> {
    (
        prop::sample::select(vec!["summary", "priority", "milestone", "owner", "status"]),
        "[a-z ]{0,12}",
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn set_field_is_readable_and_dirty(snap in arb_snapshot(), (name, value) in arb_field_edit()) {
        let mut board = board_from(&snap);
        let id = TicketId::new(1);
        board.set_ticket_field(id, name, value.as_str()).expect("known field");

        let t = board.ticket(id).expect("ticket 1");
        prop_assert_eq!(t.get(name), Some(&FieldValue::text(value.clone())));
        prop_assert!(t.dirty_fields().contains(name));
        prop_assert!(!t.dirty_fields().contains("id"));
    }

    #[test]
    fn diff_always_carries_id(snap in arb_snapshot(), edits in prop::collection::vec(arb_field_edit(), 0..4)) {
        let mut board = board_from(&snap);
        let id = TicketId::new(1);
        for (name, value) in &edits {
            board.set_ticket_field(id, name, value.as_str()).expect("known field");
        }
        let diff = board.ticket(id).expect("ticket").to_diff();
        let json = serde_json::to_value(diff).expect("serialize");
        prop_assert_eq!(json.get("id"), Some(&serde_json::json!(1)));
        if edits.is_empty() {
            prop_assert_eq!(json, serde_json::json!({ "id": 1 }));
        }
    }

    #[test]
    fn cross_column_drop_sets_canonical_state(snap in arb_snapshot(), target in 0usize..4) {
        let mut board = board_from(&snap);
        let id = TicketId::new(1);
        let source = board.column_of(id).expect("placed").id().clone();
        let ncols = board.columns().count();
        let target = ColumnId::from(i64::try_from(target % ncols).unwrap_or_default());
        let before = board.ticket(id).expect("ticket").fields().clone();

        board.handle_drop(&source, &target, id).expect("drop");

        let after = board.ticket(id).expect("ticket");
        if source == target {
            prop_assert_eq!(after.fields(), &before);
        } else {
            let expected = board.column(&target).expect("target").states()[0].clone();
            prop_assert_eq!(after.text("status"), expected.as_str());
        }
        prop_assert_eq!(board.column_of(id).map(|c| c.id().clone()), Some(target));
    }

    #[test]
    fn domain_contains_current_value(snap in arb_snapshot(), value in "[a-z]{1,10}") {
        let mut board = board_from(&snap);
        let id = TicketId::new(1);
        board.set_ticket_field(id, "priority", value.as_str()).expect("edit");
        board.select_ticket(id).expect("select");

        let domain = board.field_domain("priority").expect("domain");
        prop_assert!(domain.contains(&value));
        let domain = board.field_domain_for(id, "priority").expect("domain");
        prop_assert!(domain.contains(&value));
    }

    #[test]
    fn dialog_edits_leave_selection_alone(snap in arb_snapshot(), edits in prop::collection::vec(arb_field_edit(), 1..5)) {
        let mut board = board_from(&snap);
        let id = TicketId::new(1);
        board.select_ticket(id).expect("select");
        let before = board.selected().expect("selected").clone();

        for (name, value) in &edits {
            board.edit_dialog(name, value.as_str()).expect("edit");
        }
        prop_assert_eq!(board.selected().expect("selected"), &before);
    }

    #[test]
    fn unchanged_save_issues_no_request(snap in arb_snapshot()) {
        let mut board = board_from(&snap);
        board.select_ticket(TicketId::new(1)).expect("select");
        prop_assert_eq!(board.save_dialog_ticket().expect("save"), None);
    }

    #[test]
    fn merge_is_idempotent(first in arb_snapshot(), second in arb_snapshot()) {
        let mut board = board_from(&first);
        let req = board.refresh();
        board.complete(req.id, Ok::<_, String>(second.clone())).expect("merge");
        let req = board.refresh();
        let report = board.complete(req.id, Ok::<_, String>(second)).expect("merge again");
        prop_assert!(report.is_noop(), "second merge reported {:?}", report.events);
    }

    #[test]
    fn partial_merge_keeps_other_columns(snap in arb_snapshot(), edit in "[a-z]{1,6}") {
        let mut board = board_from(&snap);
        let Some(last) = snap.columns.last() else {
            return Ok(());
        };
        prop_assume!(snap.columns.len() > 1);
        let untouched: Vec<ColumnSnapshot> = snap.columns[..snap.columns.len() - 1].to_vec();
        let untouched_ids: Vec<TicketId> = untouched
            .iter()
            .flat_map(|c| c.tickets.iter().map(|t| t.id))
            .collect();
        for id in &untouched_ids {
            board.set_ticket_field(*id, "owner", edit.as_str()).expect("edit");
        }

        let mut renamed = last.clone();
        for t in &mut renamed.tickets {
            t.fields.insert("summary".to_string(), FieldValue::text("server"));
        }
        let req = board.refresh();
        board
            .complete(req.id, Ok::<_, String>(BoardSnapshot { columns: vec![renamed] }))
            .expect("merge");

        for id in &untouched_ids {
            let t = board.ticket(*id).expect("still there");
            prop_assert_eq!(t.text("owner"), edit.as_str());
            prop_assert!(t.dirty_fields().contains("owner"));
        }
    }

    #[test]
    fn fidelity_never_downgrades(snap in arb_snapshot()) {
        let mut board = board_from(&snap);
        let id = TicketId::new(1);
        let req = board.select_ticket(id).expect("select");
        prop_assert_eq!(&req.call, &Call::FetchBoard { detailed: vec![id] });
        board.complete(req.id, Ok::<_, String>(snap.clone())).expect("detail");
        prop_assert_eq!(board.ticket(id).expect("ticket").fidelity(), Fidelity::Detailed);

        board.close_dialog();
        let req = board.refresh();
        board.complete(req.id, Ok::<_, String>(snap)).expect("refresh");
        prop_assert_eq!(board.ticket(id).expect("ticket").fidelity(), Fidelity::Detailed);
    }
}
