//! The board: columns of tickets plus selection, dialog and drag state.
//!
//! A `Board` is built once from the field catalog and an initial snapshot
//! and from then on only merged into. Operations that need the server apply
//! their local change immediately and return a [`Request`]; the outcome is
//! fed back through [`Board::complete`]. See [`crate::sync::client`].
//!
//! # Limitations
//!
//! - Dirty marks are cleared when a request is built, and again for the
//!   columns and tickets it carried when it succeeds. A failed send leaves
//!   the optimistic change applied locally and nothing marked for resend.
//! - Responses are merged in the order they are completed. An older response
//!   completed last overwrites newer local state; there is no version check.

pub mod dialog;
pub mod drag;
pub mod events;
mod merge;

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, error, info, warn};

use crate::config::DraftConfig;
use crate::error::{BoardError, FetchStage, SyncError};
use crate::model::catalog::{FieldCatalog, FieldRoles};
use crate::model::column::Column;
use crate::model::ids::{ColumnId, TicketId};
use crate::model::ticket::Ticket;
use crate::model::value::FieldValue;
use crate::sync::client::{Call, Request, RequestId, SyncClient};
use crate::sync::wire::BoardSnapshot;

pub use dialog::DialogBuffer;
pub use drag::DragState;
pub use events::{BoardEvent, MergeReport};

/// Per-session settings the board needs besides the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSettings {
    pub draft: DraftConfig,
    /// Current user, recorded as reporter of new tickets.
    pub user: String,
}

impl BoardSettings {
    #[must_use]
    pub fn for_user(user: &str) -> Self {
        Self {
            draft: DraftConfig::default(),
            user: user.to_string(),
        }
    }
}

/// Bookkeeping for a request that has not been completed yet.
#[derive(Debug, Clone, Default)]
struct Pending {
    call: &'static str,
    /// Tickets the server was asked to send in full.
    detailed: Vec<TicketId>,
    /// Columns and tickets carried by the payload.
    columns: Vec<ColumnId>,
    tickets: Vec<TicketId>,
    /// Draft sent for creation; its dialog closes once the server confirms.
    closes_draft: Option<u64>,
}

#[derive(Debug)]
pub struct Board {
    catalog: FieldCatalog,
    settings: BoardSettings,
    columns: Vec<Column>,
    selected: Option<TicketId>,
    dialog: Option<DialogBuffer>,
    drag: DragState,
    pending: HashMap<RequestId, Pending>,
    next_request: u64,
    drafts_opened: u64,
}

impl Board {
    /// Build a board from the catalog and an initial snapshot.
    #[must_use]
    pub fn new(catalog: FieldCatalog, snapshot: &BoardSnapshot, settings: BoardSettings) -> Self {
        let mut board = Self {
            catalog,
            settings,
            columns: Vec::new(),
            selected: None,
            dialog: None,
            drag: DragState::Idle,
            pending: HashMap::new(),
            next_request: 0,
            drafts_opened: 0,
        };
        board.merge_snapshot(snapshot, &[]);
        board
    }

    /// Fetch the catalog, then the board, and build the mirror.
    ///
    /// # Errors
    ///
    /// `SyncError::InitialFetch` if either fetch fails; no board is built.
    pub fn load<C: SyncClient + ?Sized>(
        client: &mut C,
        roles: FieldRoles,
        settings: BoardSettings,
    ) -> Result<Self, SyncError> {
        let payload = client.fetch_catalog().map_err(|err| {
            error!(error = %err, "failed to fetch field catalog");
            SyncError::InitialFetch {
                stage: FetchStage::Catalog,
                message: err.to_string(),
            }
        })?;
        let catalog = FieldCatalog::from_payload(payload, roles);

        let snapshot = client.fetch_board(&[]).map_err(|err| {
            error!(error = %err, "failed to fetch board");
            SyncError::InitialFetch {
                stage: FetchStage::Board,
                message: err.to_string(),
            }
        })?;

        let board = Self::new(catalog, &snapshot, settings);
        info!(
            columns = board.columns.len(),
            tickets = board.ticket_count(),
            "board loaded"
        );
        Ok(board)
    }

    #[must_use]
    pub const fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    #[must_use]
    pub const fn settings(&self) -> &BoardSettings {
        &self.settings
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    #[must_use]
    pub fn column(&self, id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id() == id)
    }

    fn column_index(&self, id: &ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.id() == id)
    }

    /// Column currently holding `ticket`.
    #[must_use]
    pub fn column_of(&self, ticket: TicketId) -> Option<&Column> {
        self.columns.iter().find(|c| c.contains(ticket))
    }

    #[must_use]
    pub fn ticket(&self, id: TicketId) -> Option<&Ticket> {
        self.columns.iter().find_map(|c| c.ticket(id))
    }

    fn ticket_mut(&mut self, id: TicketId) -> Option<&mut Ticket> {
        self.columns.iter_mut().find_map(|c| c.ticket_mut(id))
    }

    #[must_use]
    pub fn ticket_count(&self) -> usize {
        self.columns.iter().map(Column::len).sum()
    }

    #[must_use]
    pub const fn selected_id(&self) -> Option<TicketId> {
        self.selected
    }

    #[must_use]
    pub fn selected(&self) -> Option<&Ticket> {
        self.selected.and_then(|id| self.ticket(id))
    }

    #[must_use]
    pub const fn dialog(&self) -> Option<&DialogBuffer> {
        self.dialog.as_ref()
    }

    #[must_use]
    pub const fn drag_state(&self) -> &DragState {
        &self.drag
    }

    /// Requests handed out and not completed yet.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// User-facing label of a catalog field.
    #[must_use]
    pub fn field_label(&self, name: &str) -> Option<&str> {
        self.catalog.label(name)
    }

    /// Choices for `name` in the dialog (or, with no dialog open, for the
    /// selected ticket), always including the current value.
    ///
    /// # Errors
    ///
    /// `UnknownField` if `name` is not a catalog field.
    pub fn field_domain(&self, name: &str) -> Result<Vec<String>, BoardError> {
        let current = match &self.dialog {
            Some(dialog) => dialog.ticket().get(name),
            None => self.selected().and_then(|t| t.get(name)),
        };
        self.catalog.domain(name, current)
    }

    /// Choices for `name` as seen from a specific ticket.
    ///
    /// # Errors
    ///
    /// `UnknownTicket` or `UnknownField`.
    pub fn field_domain_for(
        &self,
        ticket: TicketId,
        name: &str,
    ) -> Result<Vec<String>, BoardError> {
        let t = self
            .ticket(ticket)
            .ok_or(BoardError::UnknownTicket(ticket))?;
        self.catalog.domain(name, t.get(name))
    }

    /// Edit a ticket in place. The change travels with the next request
    /// that includes the ticket.
    ///
    /// # Errors
    ///
    /// `UnknownTicket`, `UnknownField` or `ReservedField`.
    pub fn set_ticket_field(
        &mut self,
        ticket: TicketId,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), BoardError> {
        let Self {
            catalog, columns, ..
        } = self;
        let t = columns
            .iter_mut()
            .find_map(|c| c.ticket_mut(ticket))
            .ok_or(BoardError::UnknownTicket(ticket))
            .map_err(lookup_fault)?;
        t.set_field(catalog, name, value)
    }

    /// Re-fetch the board, keeping the selected ticket detailed.
    pub fn refresh(&mut self) -> Request {
        let detailed: Vec<TicketId> = self.selected.into_iter().collect();
        self.issue(
            Call::FetchBoard {
                detailed: detailed.clone(),
            },
            Pending {
                detailed,
                ..Pending::default()
            },
        )
    }

    fn issue(&mut self, call: Call, mut pending: Pending) -> Request {
        self.next_request += 1;
        let id = RequestId(self.next_request);
        pending.call = call.name();
        debug!(request = %id, call = call.name(), "request issued");
        self.pending.insert(id, pending);
        Request { id, call }
    }

    /// Continuation of a request: merge the response or report the failure.
    ///
    /// Completions are applied in the order they arrive. Completing an
    /// unknown or already completed request still merges its snapshot, which
    /// is harmless because merges are idempotent.
    ///
    /// # Errors
    ///
    /// `SyncError::Transport` when `outcome` is an error. Nothing is rolled
    /// back.
    pub fn complete<E: fmt::Display>(
        &mut self,
        request: RequestId,
        outcome: Result<BoardSnapshot, E>,
    ) -> Result<MergeReport, SyncError> {
        let pending = self.pending.remove(&request);
        let call = pending.as_ref().map_or("unknown", |p| p.call);

        let snapshot = match outcome {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(
                    request = %request,
                    call,
                    error = %err,
                    "request failed; local changes stay applied"
                );
                return Err(SyncError::Transport {
                    call,
                    message: err.to_string(),
                });
            }
        };

        let pending = pending.unwrap_or_default();
        let report = self.merge_snapshot(&snapshot, &pending.detailed);

        for column in &pending.columns {
            if let Some(idx) = self.column_index(column) {
                self.columns[idx].clear_dirty();
            }
        }
        for id in &pending.tickets {
            if let Some(t) = self.ticket_mut(*id) {
                t.clear_dirty();
            }
        }
        let open_draft = self.dialog.as_ref().and_then(DialogBuffer::draft_generation);
        if pending.closes_draft.is_some() && open_draft == pending.closes_draft {
            self.dialog = None;
        }

        debug!(
            request = %request,
            call,
            events = report.events.len(),
            "request completed"
        );
        Ok(report)
    }

    /// Execute a request right away and complete it.
    ///
    /// # Errors
    ///
    /// As [`Board::complete`].
    pub fn dispatch<C: SyncClient + ?Sized>(
        &mut self,
        client: &mut C,
        request: Request,
    ) -> Result<MergeReport, SyncError> {
        let Request { id, call } = request;
        let outcome = call.execute(client);
        self.complete(id, outcome)
    }
}

/// Log a lookup failure. These mean the caller and the board disagree about
/// what exists.
fn lookup_fault(err: BoardError) -> BoardError {
    error!(code = %err.code(), "{err}");
    err
}
