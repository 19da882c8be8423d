use std::collections::BTreeMap;

use kanban_core::error::FetchStage;
use kanban_core::{
    Board, BoardError, BoardEvent, BoardSettings, BoardSnapshot, Call, ColumnId, Fidelity,
    FieldCatalog, FieldDef, FieldKind, FieldRoles, FieldValue, SyncError, TicketId,
};
use serde_json::json;

#[path = "support.rs"]
mod support;
use support::*;

fn id(n: u64) -> TicketId {
    TicketId::new(n)
}

#[test]
fn drag_to_other_column_sends_both_columns() {
    let snap = BoardSnapshot {
        columns: vec![
            column("A", &["new"], vec![summary(5, "new")]),
            column("B", &["accepted", "assigned"], vec![]),
        ],
    };
    let mut board = board_from(&snap);

    let req = board
        .handle_drop(&ColumnId::from("A"), &ColumnId::from("B"), id(5))
        .expect("drop")
        .expect("request");

    let Call::SendColumnDiffs(diffs) = &req.call else {
        panic!("expected column diffs, got {:?}", req.call);
    };
    assert_eq!(
        serde_json::to_value(diffs).expect("serialize"),
        json!([
            { "id": "A", "tickets": [] },
            { "id": "B", "tickets": [ { "id": 5, "status": "accepted" } ] }
        ])
    );

    // Local state moved optimistically and nothing is left dirty.
    let moved = board.ticket(id(5)).expect("ticket 5");
    assert_eq!(moved.text("status"), "accepted");
    assert!(!moved.is_dirty());
    assert_eq!(board.column_of(id(5)).map(|c| c.id().clone()), Some(ColumnId::from("B")));
    assert!(board.columns().all(|c| c.dirty_fields().is_empty()));
}

#[test]
fn domain_keeps_unlisted_current_value() {
    let snap = BoardSnapshot {
        columns: vec![column(
            "A",
            &["new"],
            vec![ticket(5, &[("status", "new"), ("priority", "critical")])],
        )],
    };
    let mut board = board_from(&snap);
    board.select_ticket(id(5)).expect("select");

    assert_eq!(
        board.field_domain("priority").expect("domain"),
        vec!["critical", "major", "minor"]
    );
    assert_eq!(board.field_domain("milestone").expect("domain"), vec!["", "m1", "m2"]);
    assert_eq!(board.field_label("priority"), Some("Priority"));
    assert_eq!(
        board.field_domain("bogus"),
        Err(BoardError::UnknownField("bogus".into()))
    );
}

#[test]
fn draft_takes_catalog_defaults_and_overrides() {
    let catalog = FieldCatalog::new(
        vec![
            FieldDef::new("status", "Status", FieldKind::Radio).with_options(&["new", "closed"]),
            FieldDef::new("owner", "Owner", FieldKind::Text),
            FieldDef::new("reporter", "Reporter", FieldKind::Text),
            FieldDef::new("resolution", "Resolution", FieldKind::Radio)
                .with_options(&["fixed", "invalid"]),
            FieldDef::new("time", "Created", FieldKind::Time),
        ],
        FieldRoles::default(),
    );
    let mut board = Board::new(
        catalog,
        &BoardSnapshot::default(),
        BoardSettings::for_user("alice"),
    );

    let draft = board.create_ticket();
    let expected: BTreeMap<String, FieldValue> = [
        ("status", "new"),
        ("owner", "somebody"),
        ("reporter", "alice"),
        ("resolution", ""),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), FieldValue::text(v)))
    .collect();
    assert_eq!(draft.ticket().fields(), &expected);
    assert!(draft.is_draft());
    assert_eq!(board.selected_id(), None);

    let req = board.create_dialog_ticket().expect("create");
    let Call::SendTicketDiff(diff) = &req.call else {
        panic!("expected ticket diff");
    };
    assert_eq!(
        serde_json::to_value(diff).expect("serialize"),
        json!({ "status": "new", "owner": "somebody", "reporter": "alice", "resolution": "" })
    );
}

#[test]
fn draft_uses_declared_default_for_enumerated_fields() {
    let mut board = board_from(&two_columns());
    let draft = board.create_ticket();
    assert_eq!(draft.ticket().text("priority"), "major");
    assert_eq!(draft.ticket().text("summary"), "");
    assert!(draft.ticket().get("changetime").is_none());
}

#[test]
fn save_sends_only_changed_fields() {
    let mut board = board_from(&two_columns());
    board.select_ticket(id(5)).expect("select");
    board.edit_dialog("summary", "new title").expect("edit");

    let req = board.save_dialog_ticket().expect("save").expect("request");
    let Call::SendTicketDiff(diff) = &req.call else {
        panic!("expected ticket diff");
    };
    assert_eq!(
        serde_json::to_value(diff).expect("serialize"),
        json!({ "id": 5, "summary": "new title" })
    );
    assert!(board.dialog().is_none());
    assert_eq!(board.ticket(id(5)).expect("5").text("summary"), "new title");
}

#[test]
fn save_without_changes_sends_nothing() {
    let mut board = board_from(&two_columns());
    board.select_ticket(id(5)).expect("select");
    board.edit_dialog("summary", "ticket 5").expect("same value");

    assert_eq!(board.save_dialog_ticket().expect("save"), None);
    assert_eq!(board.pending_requests(), 1, "only the detail fetch is pending");
}

#[test]
fn dialog_edits_do_not_touch_the_board_until_saved() {
    let mut board = board_from(&two_columns());
    board.select_ticket(id(6)).expect("select");
    board.edit_dialog("priority", "minor").expect("edit");

    let selected = board.selected().expect("selected");
    assert!(selected.get("priority").is_none());
    assert!(!selected.is_dirty());
    assert_eq!(board.dialog().expect("dialog").ticket().text("priority"), "minor");
}

#[test]
fn detail_fetch_upgrades_only_the_requested_ticket() {
    let mut board = board_from(&two_columns());
    let mut client = ScriptedClient::answering(BoardSnapshot {
        columns: vec![
            column(
                "A",
                &["new"],
                vec![
                    ticket(6, &[("summary", "ticket 6"), ("status", "new"), ("priority", "minor")]),
                    summary(5, "new"),
                ],
            ),
            column("B", &["accepted", "assigned"], vec![summary(7, "accepted")]),
        ],
    });
    let req = board.select_ticket(id(6)).expect("select");
    assert_eq!(req.call, Call::FetchBoard { detailed: vec![id(6)] });
    board.dispatch(&mut client, req).expect("detail fetch");

    let six = board.ticket(id(6)).expect("6");
    assert_eq!(six.fidelity(), Fidelity::Detailed);
    assert_eq!(six.text("priority"), "minor");

    // A later summary-only refresh keeps the detailed fields.
    client.reply = Some(two_columns());
    let req = board.refresh();
    board.dispatch(&mut client, req).expect("refresh");
    let six = board.ticket(id(6)).expect("6");
    assert_eq!(six.text("priority"), "minor");
    assert_eq!(six.fidelity(), Fidelity::Detailed);
    assert_eq!(board.ticket(id(5)).expect("5").fidelity(), Fidelity::Summary);
    assert_eq!(client.calls, vec!["fetch_board [#6]", "fetch_board [#6]"]);
}

#[test]
fn transport_failure_keeps_optimistic_change() {
    let mut board = board_from(&two_columns());
    let req = board
        .handle_drop(&ColumnId::from("A"), &ColumnId::from("B"), id(5))
        .expect("drop")
        .expect("request");

    let err = board
        .complete(req.id, Err::<BoardSnapshot, _>("502 Bad Gateway"))
        .expect_err("failure is reported");
    assert!(matches!(
        err,
        SyncError::Transport {
            call: "send_column_diffs",
            ..
        }
    ));
    let five = board.ticket(id(5)).expect("5");
    assert_eq!(five.text("status"), "accepted");
    assert!(!five.is_dirty(), "cleared marks are not restored");
    assert_eq!(board.pending_requests(), 0);
}

#[test]
fn responses_merge_in_completion_order() {
    let mut board = board_from(&two_columns());
    let first = board.refresh();
    let second = board.refresh();

    let newer = BoardSnapshot {
        columns: vec![column("A", &["new"], vec![ticket(5, &[("summary", "newer")])])],
    };
    let older = BoardSnapshot {
        columns: vec![column("A", &["new"], vec![ticket(5, &[("summary", "older")])])],
    };
    board.complete(second.id, Ok::<_, String>(newer)).expect("second");
    board.complete(first.id, Ok::<_, String>(older)).expect("first");

    // Last applied wins, whatever its age.
    assert_eq!(board.ticket(id(5)).expect("5").text("summary"), "older");
}

#[test]
fn duplicate_completion_is_harmless() {
    let mut board = board_from(&two_columns());
    let req = board.refresh();
    board.complete(req.id, Ok::<_, String>(two_columns())).expect("first");
    let report = board
        .complete(req.id, Ok::<_, String>(two_columns()))
        .expect("again");
    assert!(report.is_noop());
}

#[test]
fn note_is_sent_and_dropped_after_success() {
    let mut board = board_from(&two_columns());
    let mut client = ScriptedClient::answering(two_columns());
    board.select_ticket(id(5)).expect("select");
    board.set_dialog_note("looked into it").expect("note");

    let req = board.save_dialog_ticket().expect("save").expect("request");
    let Call::SendTicketDiff(diff) = &req.call else {
        panic!("expected ticket diff");
    };
    assert_eq!(
        serde_json::to_value(diff).expect("serialize"),
        json!({ "id": 5, "comment": "looked into it" })
    );
    board.dispatch(&mut client, req).expect("save");
    assert!(board.ticket(id(5)).expect("5").get("comment").is_none());
}

#[test]
fn create_closes_draft_only_on_success() {
    let mut board = board_from(&two_columns());
    board.create_ticket();
    board.edit_dialog("summary", "brand new").expect("edit");

    let req = board.create_dialog_ticket().expect("create");
    board
        .complete(req.id, Err::<BoardSnapshot, _>("timeout"))
        .expect_err("failed");
    assert!(board.dialog().is_some_and(|d| d.is_draft()));

    let mut created = two_columns();
    created.columns[0]
        .tickets
        .push(ticket(8, &[("summary", "brand new"), ("status", "new")]));
    let req = board.create_dialog_ticket().expect("retry");
    let report = board.complete(req.id, Ok::<_, String>(created)).expect("created");
    assert!(report.contains(&BoardEvent::TicketCreated(id(8))));
    assert!(board.dialog().is_none());
}

#[test]
fn note_stays_out_of_the_ticket_when_save_fails() {
    let mut board = board_from(&two_columns());
    board.select_ticket(id(5)).expect("select");
    board.edit_dialog("priority", "minor").expect("edit");
    board.set_dialog_note("hello").expect("note");

    let req = board.save_dialog_ticket().expect("save").expect("request");
    let Call::SendTicketDiff(diff) = &req.call else {
        panic!("expected ticket diff");
    };
    assert_eq!(diff.fields.get("comment"), Some(&FieldValue::text("hello")));
    board
        .complete(req.id, Err::<BoardSnapshot, _>("connection reset"))
        .expect_err("failed");
    assert!(board.ticket(id(5)).expect("5").get("comment").is_none());

    let req = board.refresh();
    board.complete(req.id, Ok::<_, String>(two_columns())).expect("refresh");
    assert!(board.ticket(id(5)).expect("5").get("comment").is_none());

    board.select_ticket(id(5)).expect("select again");
    board.edit_dialog("summary", "retitled").expect("edit");
    let req = board.save_dialog_ticket().expect("save").expect("request");
    let Call::SendTicketDiff(diff) = &req.call else {
        panic!("expected ticket diff");
    };
    assert!(!diff.fields.contains_key("comment"));
}

#[test]
fn late_create_confirmation_keeps_a_newer_draft_open() {
    let mut board = board_from(&two_columns());
    board.create_ticket();
    board.edit_dialog("summary", "first draft").expect("edit");
    let first = board.create_dialog_ticket().expect("create");

    board.create_ticket();
    board.edit_dialog("summary", "second draft").expect("edit");

    let mut created = two_columns();
    created.columns[0]
        .tickets
        .push(ticket(8, &[("summary", "first draft"), ("status", "new")]));
    board.complete(first.id, Ok::<_, String>(created)).expect("created");

    let dialog = board.dialog().expect("second draft still open");
    assert!(dialog.is_draft());
    assert_eq!(
        dialog.ticket().get("summary"),
        Some(&FieldValue::text("second draft"))
    );
}

#[test]
fn create_requires_a_draft() {
    let mut board = board_from(&two_columns());
    assert_eq!(board.create_dialog_ticket(), Err(BoardError::NoDialog));
    board.select_ticket(id(5)).expect("select");
    assert_eq!(board.create_dialog_ticket(), Err(BoardError::NotADraft));
}

#[test]
fn pristine_dialog_follows_server_updates() {
    let mut board = board_from(&two_columns());
    board.select_ticket(id(5)).expect("select");

    let mut snap = two_columns();
    snap.columns[0].tickets[0] = ticket(5, &[("summary", "renamed"), ("status", "new")]);
    let req = board.refresh();
    let report = board.complete(req.id, Ok::<_, String>(snap)).expect("merge");

    assert!(report.contains(&BoardEvent::SelectionRefreshed(id(5))));
    assert_eq!(board.dialog().expect("dialog").ticket().text("summary"), "renamed");
}

#[test]
fn edited_dialog_is_reported_stale() {
    let mut board = board_from(&two_columns());
    board.select_ticket(id(5)).expect("select");
    board.edit_dialog("priority", "minor").expect("edit");

    let mut snap = two_columns();
    snap.columns[0].tickets[0] = ticket(5, &[("summary", "renamed"), ("status", "new")]);
    let req = board.refresh();
    let report = board.complete(req.id, Ok::<_, String>(snap)).expect("merge");

    assert!(report.contains(&BoardEvent::DialogStale(id(5))));
    let dialog = board.dialog().expect("dialog");
    assert_eq!(dialog.ticket().text("summary"), "ticket 5");
    assert_eq!(dialog.ticket().text("priority"), "minor");
}

#[test]
fn removed_selection_is_cleared() {
    let mut board = board_from(&two_columns());
    board.select_ticket(id(5)).expect("select");

    let mut client = ScriptedClient::answering(BoardSnapshot {
        columns: vec![
            column("A", &["new"], vec![summary(6, "new")]),
            column("B", &["accepted", "assigned"], vec![summary(7, "accepted")]),
        ],
    });
    let req = board.unlink_ticket(id(5));
    let report = board.dispatch(&mut client, req).expect("unlink");

    assert!(report.contains(&BoardEvent::TicketRemoved(id(5))));
    assert!(report.contains(&BoardEvent::SelectionCleared(id(5))));
    assert_eq!(board.selected_id(), None);
    assert!(board.dialog().is_some(), "dialog stays until closed");
    assert_eq!(board.save_dialog_ticket(), Ok(None));
    assert_eq!(client.calls, vec!["unlink #5"]);
}

#[test]
fn link_merges_the_new_ticket() {
    let mut board = board_from(&two_columns());
    let mut snap = two_columns();
    snap.columns[0].tickets.insert(0, summary(42, "new"));
    let mut client = ScriptedClient::answering(snap);

    let req = board.link_ticket(id(42));
    assert_eq!(req.call, Call::Link(id(42)));
    board.dispatch(&mut client, req).expect("link");
    assert_eq!(board.column_of(id(42)).map(|c| c.id().clone()), Some(ColumnId::from("A")));
}

#[test]
fn load_fetches_catalog_then_board() {
    let mut client = ScriptedClient::answering(two_columns());
    let board = Board::load(&mut client, FieldRoles::default(), BoardSettings::for_user("bob"))
        .expect("load");
    assert_eq!(board.ticket_count(), 3);
    assert_eq!(client.calls, vec!["fetch_catalog", "fetch_board []"]);
}

#[test]
fn load_without_catalog_builds_nothing() {
    let mut client = ScriptedClient::default();
    let err = Board::load(&mut client, FieldRoles::default(), BoardSettings::for_user("bob"))
        .expect_err("no catalog");
    assert!(matches!(
        err,
        SyncError::InitialFetch {
            stage: FetchStage::Catalog,
            ..
        }
    ));
    assert_eq!(client.calls, vec!["fetch_catalog"]);
}

#[test]
fn load_without_board_builds_nothing() {
    let mut client = ScriptedClient::answering(two_columns());
    client.reply = None;
    let err = Board::load(&mut client, FieldRoles::default(), BoardSettings::for_user("bob"))
        .expect_err("no board");
    assert!(matches!(
        err,
        SyncError::InitialFetch {
            stage: FetchStage::Board,
            ..
        }
    ));
}

#[test]
fn local_edit_travels_with_next_drop() {
    let mut board = board_from(&two_columns());
    board.set_ticket_field(id(6), "priority", "minor").expect("edit");
    assert_eq!(
        board.set_ticket_field(id(99), "priority", "minor"),
        Err(BoardError::UnknownTicket(id(99)))
    );

    let req = board
        .handle_drop_at(&ColumnId::from("A"), &ColumnId::from("A"), id(5), Some(1))
        .expect("drop")
        .expect("request");
    let Call::SendColumnDiffs(diffs) = &req.call else {
        panic!("expected column diffs");
    };
    assert_eq!(
        serde_json::to_value(diffs).expect("serialize"),
        json!([{ "id": "A", "tickets": [ { "id": 6, "priority": "minor" } ] }])
    );
    assert_eq!(fields_of(&board, 6).get("priority"), Some(&FieldValue::text("minor")));
}
