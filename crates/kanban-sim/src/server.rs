//! In-memory authoritative board server.
//!
//! Behaves like the Trac plugin the client was written against: the board
//! is a list of columns holding ticket ids, tickets live in a separate
//! store, and every response re-files tickets whose status belongs to
//! another column before reporting the board.

use std::collections::{BTreeMap, HashMap};

use kanban_core::model::catalog::CatalogPayload;
use kanban_core::model::value::ChangelogEntry;
use kanban_core::sync::{ColumnDiff, ColumnSnapshot, TicketDiff, TicketSnapshot};
use kanban_core::{
    BoardSnapshot, ColumnId, FieldDef, FieldKind, FieldRoles, FieldValue, SyncClient, TicketId,
};
use tracing::{debug, error};

/// Fields the board lets users leave unset.
const KANBAN_OPTIONAL: [&str; 2] = ["milestone", "version"];

/// Start of the server's logical clock, ms since the epoch.
const EPOCH_MS: i64 = 1_356_998_400_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    #[error("ticket {0} does not exist")]
    UnknownTicket(TicketId),
    #[error("service unavailable")]
    Unavailable,
    #[error("request lost in transit")]
    Dropped,
}

/// Column as stored in the board definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardColumn {
    pub id: ColumnId,
    pub name: String,
    pub wip: Option<u32>,
    pub states: Vec<String>,
    pub tickets: Vec<TicketId>,
}

impl BoardColumn {
    #[must_use]
    pub fn new(id: i64, name: &str, states: &[&str]) -> Self {
        Self {
            id: ColumnId::Number(id),
            name: name.to_string(),
            wip: None,
            states: states.iter().map(ToString::to_string).collect(),
            tickets: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_wip(mut self, wip: u32) -> Self {
        self.wip = Some(wip);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredTicket {
    fields: BTreeMap<String, FieldValue>,
    time: i64,
    changetime: i64,
    changelog: Vec<ChangelogEntry>,
}

#[derive(Debug, Clone)]
pub struct MemoryServer {
    fields: Vec<FieldDef>,
    roles: FieldRoles,
    columns: Vec<BoardColumn>,
    tickets: BTreeMap<TicketId, StoredTicket>,
    next_id: u64,
    clock_ms: i64,
    author: String,
    requests: u64,
}

impl MemoryServer {
    #[must_use]
    pub fn new(fields: Vec<FieldDef>, columns: Vec<BoardColumn>) -> Self {
        Self {
            fields,
            roles: FieldRoles::default(),
            columns,
            tickets: BTreeMap::new(),
            next_id: 1,
            clock_ms: EPOCH_MS,
            author: "sim".to_string(),
            requests: 0,
        }
    }

    /// The three-column board from the plugin's usage example with a
    /// typical Trac field set.
    #[must_use]
    pub fn demo() -> Self {
        let mut server = Self::new(
            trac_fields(),
            vec![
                BoardColumn::new(1, "New", &["new"]).with_wip(5),
                BoardColumn::new(2, "Ongoing", &["assigned", "accepted", "reopened"]).with_wip(3),
                BoardColumn::new(3, "Done", &["closed"]).with_wip(5),
            ],
        );
        server.next_id = 100;
        for (summary, status) in [
            ("Crash on save", "new"),
            ("Slow board load", "accepted"),
            ("Typo in footer", "closed"),
        ] {
            let id = server.create_ticket(&[("summary", summary), ("status", status)]);
            server.place(id);
        }
        server
    }

    /// Identity recorded on changes.
    pub fn set_author(&mut self, author: &str) {
        self.author = author.to_string();
    }

    /// Add a ticket to the store without putting it on the board.
    pub fn create_ticket(&mut self, values: &[(&str, &str)]) -> TicketId {
        let fields = values
            .iter()
            .map(|(k, v)| ((*k).to_string(), FieldValue::text(*v)))
            .collect();
        self.insert_ticket(fields)
    }

    /// Put a stored ticket on the board, first column, then re-file.
    pub fn place(&mut self, id: TicketId) {
        if let Some(first) = self.columns.first_mut() {
            first.tickets.push(id);
        }
        self.fix_ticket_columns();
    }

    #[must_use]
    pub fn columns(&self) -> &[BoardColumn] {
        &self.columns
    }

    /// Current value of a stored ticket field.
    #[must_use]
    pub fn field(&self, id: TicketId, name: &str) -> Option<&FieldValue> {
        self.tickets.get(&id).and_then(|t| t.fields.get(name))
    }

    #[must_use]
    pub fn changelog(&self, id: TicketId) -> &[ChangelogEntry] {
        self.tickets.get(&id).map_or(&[], |t| t.changelog.as_slice())
    }

    /// Every ticket id in the store, on the board or not.
    pub fn ticket_ids(&self) -> impl Iterator<Item = TicketId> + '_ {
        self.tickets.keys().copied()
    }

    #[must_use]
    pub fn on_board(&self, id: TicketId) -> bool {
        self.columns.iter().any(|c| c.tickets.contains(&id))
    }

    /// Requests served so far.
    #[must_use]
    pub const fn requests(&self) -> u64 {
        self.requests
    }

    fn tick(&mut self) -> i64 {
        self.clock_ms += 1000;
        self.clock_ms
    }

    fn insert_ticket(&mut self, fields: BTreeMap<String, FieldValue>) -> TicketId {
        let id = TicketId::new(self.next_id);
        self.next_id += 1;
        let now = self.tick();
        self.tickets.insert(
            id,
            StoredTicket {
                fields,
                time: now,
                changetime: now,
                changelog: Vec::new(),
            },
        );
        id
    }

    /// Timestamp fields; the server stamps these itself.
    fn managed_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|d| d.is_timestamp())
            .map(|d| d.name.clone())
            .collect()
    }

    fn status_map(&self) -> HashMap<&str, usize> {
        let mut map = HashMap::new();
        for (idx, column) in self.columns.iter().enumerate() {
            for state in &column.states {
                map.insert(state.as_str(), idx);
            }
        }
        map
    }

    /// Move tickets whose status maps to another column to the front of
    /// that column. Ids missing from the store are dropped.
    fn fix_ticket_columns(&mut self) {
        let state_field = self.roles.state.as_str();
        let map = self.status_map();
        let mut lists: Vec<Vec<TicketId>> = vec![Vec::new(); self.columns.len()];
        let mut moved = 0_usize;

        for (idx, column) in self.columns.iter().enumerate() {
            for id in &column.tickets {
                let Some(ticket) = self.tickets.get(id) else {
                    continue;
                };
                let status = ticket
                    .fields
                    .get(state_field)
                    .and_then(FieldValue::as_text)
                    .unwrap_or_default();
                let target = map.get(status).copied().unwrap_or(idx);
                if target == idx {
                    lists[target].push(*id);
                } else {
                    lists[target].insert(0, *id);
                    moved += 1;
                }
            }
        }

        for (column, list) in self.columns.iter_mut().zip(lists) {
            column.tickets = list;
        }
        if moved > 0 {
            debug!(moved, "re-filed tickets by status");
        }
    }

    /// Apply `diff` to the stored ticket, recording each change.
    fn save_ticket(&mut self, diff: &TicketDiff) -> Result<(), ServerError> {
        let Some(id) = diff.id else {
            return Ok(());
        };
        if !self.tickets.contains_key(&id) {
            error!(ticket = %id, "failed to fetch ticket");
            return Err(ServerError::UnknownTicket(id));
        }
        let now = self.tick();
        let author = self.author.clone();
        let note = self.roles.note.clone();
        let managed = self.managed_fields();
        let Some(ticket) = self.tickets.get_mut(&id) else {
            return Err(ServerError::UnknownTicket(id));
        };

        for (name, value) in &diff.fields {
            if managed.contains(name) {
                continue;
            }
            if *name == note {
                ticket.changelog.push(ChangelogEntry {
                    time: now,
                    author: author.clone(),
                    field: name.clone(),
                    old_value: String::new(),
                    new_value: value.to_string(),
                    permanent: true,
                });
                continue;
            }
            let old = ticket.fields.get(name).map(ToString::to_string).unwrap_or_default();
            let new = value.to_string();
            if old != new {
                ticket.changelog.push(ChangelogEntry {
                    time: now,
                    author: author.clone(),
                    field: name.clone(),
                    old_value: old,
                    new_value: new,
                    permanent: true,
                });
            }
            ticket.fields.insert(name.clone(), value.clone());
        }
        ticket.changetime = now;
        debug!(ticket = %id, fields = diff.fields.len(), "ticket saved");
        Ok(())
    }

    fn ticket_snapshot(&self, id: TicketId, detailed: bool) -> Option<TicketSnapshot> {
        let stored = self.tickets.get(&id)?;
        let mut fields = BTreeMap::new();
        if detailed {
            for def in self.fields.iter().filter(|d| !d.is_timestamp()) {
                let value = stored
                    .fields
                    .get(&def.name)
                    .cloned()
                    .or_else(|| def.default.clone())
                    .unwrap_or_else(|| FieldValue::text(""));
                fields.insert(def.name.clone(), value);
            }
            fields.insert("time".to_string(), FieldValue::Timestamp(stored.time));
            fields.insert("changetime".to_string(), FieldValue::Timestamp(stored.changetime));
            let log = serde_json::to_value(&stored.changelog).unwrap_or_default();
            fields.insert("changelog".to_string(), FieldValue::Other(log));
        } else {
            for name in ["summary", self.roles.state.as_str()] {
                let value = stored
                    .fields
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| FieldValue::text(""));
                fields.insert(name.to_string(), value);
            }
        }
        Some(TicketSnapshot { id, fields })
    }

    /// The board with ticket data, full for ids in `detailed`.
    #[must_use]
    pub fn snapshot(&self, detailed: &[TicketId]) -> BoardSnapshot {
        let columns = self
            .columns
            .iter()
            .map(|column| ColumnSnapshot {
                id: column.id.clone(),
                name: column.name.clone(),
                wip: column.wip,
                states: column.states.clone(),
                tickets: column
                    .tickets
                    .iter()
                    .filter_map(|id| self.ticket_snapshot(*id, detailed.contains(id)))
                    .collect(),
            })
            .collect();
        BoardSnapshot { columns }
    }

    fn respond(&mut self, detailed: &[TicketId]) -> BoardSnapshot {
        self.fix_ticket_columns();
        self.snapshot(detailed)
    }
}

impl SyncClient for MemoryServer {
    type Error = ServerError;

    fn fetch_catalog(&mut self) -> Result<CatalogPayload, ServerError> {
        self.requests += 1;
        let ticket_fields = self
            .fields
            .iter()
            .cloned()
            .map(|mut def| {
                if KANBAN_OPTIONAL.contains(&def.name.as_str()) {
                    def.kanban_optional = true;
                }
                def
            })
            .collect();
        Ok(CatalogPayload { ticket_fields })
    }

    fn fetch_board(&mut self, detailed: &[TicketId]) -> Result<BoardSnapshot, ServerError> {
        self.requests += 1;
        Ok(self.respond(detailed))
    }

    fn send_column_diffs(&mut self, diffs: &[ColumnDiff]) -> Result<BoardSnapshot, ServerError> {
        self.requests += 1;
        for diff in diffs {
            let Some(target) = self.columns.iter().position(|c| c.id == diff.id) else {
                debug!(column = %diff.id, "diff for unknown column ignored");
                continue;
            };
            for ticket in diff.tickets.iter().flatten() {
                if !ticket.is_trivial() {
                    self.save_ticket(ticket)?;
                }
                let Some(id) = ticket.id else {
                    continue;
                };
                if !self.columns[target].tickets.contains(&id) {
                    for column in &mut self.columns {
                        column.tickets.retain(|t| *t != id);
                    }
                    self.columns[target].tickets.push(id);
                }
            }
        }
        Ok(self.respond(&[]))
    }

    fn send_ticket_diff(&mut self, diff: &TicketDiff) -> Result<BoardSnapshot, ServerError> {
        self.requests += 1;
        if diff.id.is_some() {
            self.save_ticket(diff)?;
        } else {
            let note = self.roles.note.as_str();
            let managed = self.managed_fields();
            let fields = diff
                .fields
                .iter()
                .filter(|(name, _)| name.as_str() != note && !managed.contains(name))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let id = self.insert_ticket(fields);
            debug!(ticket = %id, "ticket created");
            if let Some(first) = self.columns.first_mut() {
                first.tickets.push(id);
            }
        }
        Ok(self.respond(&[]))
    }

    fn link_ticket(&mut self, id: TicketId) -> Result<BoardSnapshot, ServerError> {
        self.requests += 1;
        if self.on_board(id) {
            error!(ticket = %id, "ticket is already on the board");
        } else if !self.tickets.contains_key(&id) {
            error!(ticket = %id, "failed to fetch ticket");
        } else if let Some(first) = self.columns.first_mut() {
            first.tickets.push(id);
        }
        Ok(self.respond(&[]))
    }

    fn unlink_ticket(&mut self, id: TicketId) -> Result<BoardSnapshot, ServerError> {
        self.requests += 1;
        for column in &mut self.columns {
            column.tickets.retain(|t| *t != id);
        }
        Ok(self.respond(&[]))
    }
}

/// Field catalog shaped like Trac's default ticket fields.
#[must_use]
pub fn trac_fields() -> Vec<FieldDef> {
    vec![
        FieldDef::new("summary", "Summary", FieldKind::Text),
        FieldDef::new("reporter", "Reporter", FieldKind::Text),
        FieldDef::new("owner", "Owner", FieldKind::Text),
        FieldDef::new("description", "Description", FieldKind::Textarea),
        FieldDef::new("type", "Type", FieldKind::Select)
            .with_options(&["defect", "enhancement", "task"])
            .with_default("defect"),
        FieldDef::new("status", "Status", FieldKind::Radio)
            .with_options(&["new", "assigned", "accepted", "reopened", "closed"]),
        FieldDef::new("priority", "Priority", FieldKind::Select)
            .with_options(&["blocker", "critical", "major", "minor", "trivial"])
            .with_default("major"),
        FieldDef::new("milestone", "Milestone", FieldKind::Select)
            .with_options(&["milestone1", "milestone2"])
            .with_optional(true),
        FieldDef::new("version", "Version", FieldKind::Select).with_options(&["1.0", "2.0"]),
        FieldDef::new("resolution", "Resolution", FieldKind::Radio)
            .with_options(&["fixed", "invalid", "wontfix", "duplicate", "worksforme"]),
        FieldDef::new("keywords", "Keywords", FieldKind::Text),
        FieldDef::new("cc", "Cc", FieldKind::Text),
        FieldDef::new("time", "Created", FieldKind::Time),
        FieldDef::new("changetime", "Modified", FieldKind::Time),
    ]
}
