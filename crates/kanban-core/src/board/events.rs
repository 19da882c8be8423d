//! Change notifications produced by merges.
//!
//! A merge reports what it did instead of calling back into the UI; the
//! caller decides what to redraw.

use crate::model::ids::{ColumnId, TicketId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    ColumnCreated(ColumnId),
    /// Name, WIP limit or states changed.
    ColumnUpdated(ColumnId),
    TicketCreated(TicketId),
    /// At least one field value changed.
    TicketUpdated(TicketId),
    TicketMoved {
        id: TicketId,
        from: ColumnId,
        to: ColumnId,
    },
    /// No longer reported in any column the server sent.
    TicketRemoved(TicketId),
    /// The selected ticket changed and the untouched dialog buffer was
    /// re-copied from it.
    SelectionRefreshed(TicketId),
    /// The selected ticket changed while the dialog buffer held edits; the
    /// edits were kept.
    DialogStale(TicketId),
    /// The selected ticket left the board.
    SelectionCleared(TicketId),
}

/// Everything one merge changed, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub events: Vec<BoardEvent>,
}

impl MergeReport {
    /// Returns `true` if the merge changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn contains(&self, event: &BoardEvent) -> bool {
        self.events.contains(event)
    }
}
