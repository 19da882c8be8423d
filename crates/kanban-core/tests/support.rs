#![allow(dead_code)]

use std::collections::BTreeMap;

use kanban_core::model::catalog::CatalogPayload;
use kanban_core::sync::{ColumnDiff, ColumnSnapshot, TicketDiff, TicketSnapshot};
use kanban_core::{
    Board, BoardSettings, BoardSnapshot, ColumnId, FieldCatalog, FieldDef, FieldKind, FieldRoles,
    FieldValue, SyncClient, TicketId,
};

pub fn catalog_fields() -> Vec<FieldDef> {
    vec![
        FieldDef::new("summary", "Summary", FieldKind::Text),
        FieldDef::new("status", "Status", FieldKind::Radio)
            .with_options(&["new", "accepted", "assigned", "closed"]),
        FieldDef::new("priority", "Priority", FieldKind::Select)
            .with_options(&["major", "minor"])
            .with_default("major"),
        FieldDef::new("milestone", "Milestone", FieldKind::Select)
            .with_options(&["m1", "m2"])
            .with_optional(true),
        FieldDef::new("owner", "Owner", FieldKind::Text),
        FieldDef::new("reporter", "Reporter", FieldKind::Text),
        FieldDef::new("changetime", "Modified", FieldKind::Time),
    ]
}

pub fn catalog() -> FieldCatalog {
    FieldCatalog::new(catalog_fields(), FieldRoles::default())
}

pub fn ticket(id: u64, fields: &[(&str, &str)]) -> TicketSnapshot {
    TicketSnapshot {
        id: TicketId::new(id),
        fields: fields
            .iter()
            .map(|(k, v)| ((*k).to_string(), FieldValue::text(*v)))
            .collect(),
    }
}

pub fn summary(id: u64, status: &str) -> TicketSnapshot {
    ticket(id, &[("summary", &format!("ticket {id}")), ("status", status)])
}

pub fn column(id: &str, states: &[&str], tickets: Vec<TicketSnapshot>) -> ColumnSnapshot {
    ColumnSnapshot {
        id: ColumnId::from(id),
        name: id.to_string(),
        wip: None,
        states: states.iter().map(ToString::to_string).collect(),
        tickets,
    }
}

/// `A` (new) holding 5 and 6, `B` (accepted, assigned) holding 7.
pub fn two_columns() -> BoardSnapshot {
    BoardSnapshot {
        columns: vec![
            column("A", &["new"], vec![summary(5, "new"), summary(6, "new")]),
            column("B", &["accepted", "assigned"], vec![summary(7, "accepted")]),
        ],
    }
}

pub fn board_from(snapshot: &BoardSnapshot) -> Board {
    Board::new(catalog(), snapshot, BoardSettings::for_user("alice"))
}

/// Canned transport: answers every call with `reply` and records the calls.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    pub catalog: Option<CatalogPayload>,
    pub reply: Option<BoardSnapshot>,
    pub calls: Vec<String>,
    pub ticket_diffs: Vec<TicketDiff>,
    pub column_diffs: Vec<Vec<ColumnDiff>>,
}

impl ScriptedClient {
    pub fn answering(reply: BoardSnapshot) -> Self {
        Self {
            catalog: Some(CatalogPayload {
                ticket_fields: catalog_fields(),
            }),
            reply: Some(reply),
            ..Self::default()
        }
    }

    fn answer(&self) -> Result<BoardSnapshot, String> {
        self.reply.clone().ok_or_else(|| "connection refused".to_string())
    }
}

impl SyncClient for ScriptedClient {
    type Error = String;

    fn fetch_catalog(&mut self) -> Result<CatalogPayload, String> {
        self.calls.push("fetch_catalog".into());
        self.catalog.clone().ok_or_else(|| "connection refused".to_string())
    }

    fn fetch_board(&mut self, detailed: &[TicketId]) -> Result<BoardSnapshot, String> {
        let ids: Vec<String> = detailed.iter().map(ToString::to_string).collect();
        self.calls.push(format!("fetch_board [{}]", ids.join(",")));
        self.answer()
    }

    fn send_column_diffs(&mut self, diffs: &[ColumnDiff]) -> Result<BoardSnapshot, String> {
        self.calls.push("send_column_diffs".into());
        self.column_diffs.push(diffs.to_vec());
        self.answer()
    }

    fn send_ticket_diff(&mut self, diff: &TicketDiff) -> Result<BoardSnapshot, String> {
        self.calls.push("send_ticket_diff".into());
        self.ticket_diffs.push(diff.clone());
        self.answer()
    }

    fn link_ticket(&mut self, id: TicketId) -> Result<BoardSnapshot, String> {
        self.calls.push(format!("link {id}"));
        self.answer()
    }

    fn unlink_ticket(&mut self, id: TicketId) -> Result<BoardSnapshot, String> {
        self.calls.push(format!("unlink {id}"));
        self.answer()
    }
}

pub fn fields_of(board: &Board, id: u64) -> BTreeMap<String, FieldValue> {
    board
        .ticket(TicketId::new(id))
        .map(|t| t.fields().clone())
        .unwrap_or_default()
}
