//! Drag-and-drop moves between and within columns.
//!
//! A gesture runs `Idle -> Dragging -> Dropped`; starting a new one from
//! `Dropped` is fine. Dropping into another column sets the ticket's
//! workflow state to the target's canonical state, which is how a drag
//! becomes a state transition on the server.

use tracing::{debug, warn};

use super::{Board, Pending, lookup_fault};
use crate::error::BoardError;
use crate::model::ids::{ColumnId, TicketId};
use crate::sync::client::{Call, Request};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        source: ColumnId,
        ticket: TicketId,
    },
    Dropped {
        source: ColumnId,
        target: ColumnId,
        ticket: TicketId,
    },
}

impl DragState {
    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        matches!(self, Self::Dragging { .. })
    }
}

impl Board {
    /// Pick up `ticket` from `source`.
    ///
    /// # Errors
    ///
    /// `DragInProgress` while another gesture is running, `UnknownColumn`
    /// or `UnknownTicket` if the ticket is not in that column.
    pub fn begin_drag(&mut self, source: &ColumnId, ticket: TicketId) -> Result<(), BoardError> {
        if self.drag.is_dragging() {
            return Err(BoardError::DragInProgress);
        }
        let column = self
            .column(source)
            .ok_or_else(|| BoardError::UnknownColumn(source.clone()))
            .map_err(lookup_fault)?;
        if !column.contains(ticket) {
            return Err(lookup_fault(BoardError::UnknownTicket(ticket)));
        }
        self.drag = DragState::Dragging {
            source: source.clone(),
            ticket,
        };
        Ok(())
    }

    /// Abandon the running gesture.
    ///
    /// # Errors
    ///
    /// `NoDragInProgress` if nothing is being dragged.
    pub fn cancel_drag(&mut self) -> Result<(), BoardError> {
        if !self.drag.is_dragging() {
            return Err(BoardError::NoDragInProgress);
        }
        self.drag = DragState::Idle;
        Ok(())
    }

    /// Finish the running gesture over `target`, at `index` or the end.
    ///
    /// # Errors
    ///
    /// `NoDragInProgress`, or any error of [`Board::handle_drop_at`]. The
    /// gesture is over either way.
    pub fn drop_on(
        &mut self,
        target: &ColumnId,
        index: Option<usize>,
    ) -> Result<Option<Request>, BoardError> {
        let DragState::Dragging { source, ticket } = std::mem::take(&mut self.drag) else {
            return Err(BoardError::NoDragInProgress);
        };
        let request = self.handle_drop_at(&source, target, ticket, index)?;
        self.drag = DragState::Dropped {
            source,
            target: target.clone(),
            ticket,
        };
        Ok(request)
    }

    /// Move `ticket` from `source` to the end of `target`.
    ///
    /// # Errors
    ///
    /// See [`Board::handle_drop_at`].
    pub fn handle_drop(
        &mut self,
        source: &ColumnId,
        target: &ColumnId,
        ticket: TicketId,
    ) -> Result<Option<Request>, BoardError> {
        self.handle_drop_at(source, target, ticket, None)
    }

    /// Move `ticket` from `source` into `target` at `index`.
    ///
    /// Returns the column-diff request, or `None` when the ticket already
    /// left `source` (a merge got there first).
    ///
    /// # Errors
    ///
    /// `UnknownColumn` for either column id. Errors from setting the state
    /// field leave the board unchanged.
    pub fn handle_drop_at(
        &mut self,
        source: &ColumnId,
        target: &ColumnId,
        ticket: TicketId,
        index: Option<usize>,
    ) -> Result<Option<Request>, BoardError> {
        let src = self
            .column_index(source)
            .ok_or_else(|| BoardError::UnknownColumn(source.clone()))
            .map_err(lookup_fault)?;
        let dst = self
            .column_index(target)
            .ok_or_else(|| BoardError::UnknownColumn(target.clone()))
            .map_err(lookup_fault)?;

        if !self.columns[src].contains(ticket) {
            warn!(%ticket, column = %source, "dropped ticket is no longer in its column; ignoring");
            return Ok(None);
        }

        if src != dst {
            if let Some(state) = self.columns[dst].canonical_state().map(ToString::to_string) {
                let Self {
                    catalog, columns, ..
                } = self;
                let state_field = catalog.roles().state.clone();
                if let Some(t) = columns[src].ticket_mut(ticket) {
                    t.set_field(catalog, &state_field, state)?;
                }
            }
        }

        self.columns[src].mark_membership_changed();
        if let Some(moved) = self.columns[src].take(ticket) {
            self.columns[dst].insert(moved, index);
        }
        if src != dst {
            self.columns[dst].mark_membership_changed();
        }

        let affected = if src == dst { vec![src] } else { vec![src, dst] };
        let mut diffs = Vec::with_capacity(affected.len());
        let mut pending = Pending::default();
        for idx in affected {
            let column = &mut self.columns[idx];
            if let Some(diff) = column.to_diff() {
                pending
                    .tickets
                    .extend(diff.tickets.iter().flatten().filter_map(|t| t.id));
                diffs.push(diff);
            }
            pending.columns.push(column.id().clone());
            column.clear_dirty();
        }
        for id in &pending.tickets {
            if let Some(t) = self.ticket_mut(*id) {
                t.clear_dirty();
            }
        }

        debug!(%ticket, from = %source, to = %target, "ticket dropped");
        Ok(Some(self.issue(Call::SendColumnDiffs(diffs), pending)))
    }
}
