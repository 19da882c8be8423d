//! Transport abstraction and outbound request values.
//!
//! Board operations never talk to the network themselves. They apply their
//! local change and hand back a [`Request`]; whoever owns the transport runs
//! it against a [`SyncClient`] and reports the outcome through
//! [`Board::complete`](crate::board::Board::complete). Requests may be
//! completed in any order, or never.

use std::fmt;

use crate::model::catalog::CatalogPayload;
use crate::model::ids::TicketId;
use crate::sync::wire::{BoardSnapshot, ColumnDiff, TicketDiff};

/// Request/response exchange with the board server.
///
/// Every mutating call answers with the merged board snapshot.
pub trait SyncClient {
    /// Error type for transport operations.
    type Error: fmt::Display;

    fn fetch_catalog(&mut self) -> Result<CatalogPayload, Self::Error>;

    /// Board snapshot; tickets in `detailed` carry every field.
    fn fetch_board(&mut self, detailed: &[TicketId]) -> Result<BoardSnapshot, Self::Error>;

    fn send_column_diffs(&mut self, diffs: &[ColumnDiff]) -> Result<BoardSnapshot, Self::Error>;

    /// Single-ticket save, or creation when `diff.id` is `None`.
    fn send_ticket_diff(&mut self, diff: &TicketDiff) -> Result<BoardSnapshot, Self::Error>;

    fn link_ticket(&mut self, id: TicketId) -> Result<BoardSnapshot, Self::Error>;

    fn unlink_ticket(&mut self, id: TicketId) -> Result<BoardSnapshot, Self::Error>;
}

impl<C: SyncClient + ?Sized> SyncClient for &mut C {
    type Error = C::Error;

    fn fetch_catalog(&mut self) -> Result<CatalogPayload, Self::Error> {
        (**self).fetch_catalog()
    }

    fn fetch_board(&mut self, detailed: &[TicketId]) -> Result<BoardSnapshot, Self::Error> {
        (**self).fetch_board(detailed)
    }

    fn send_column_diffs(&mut self, diffs: &[ColumnDiff]) -> Result<BoardSnapshot, Self::Error> {
        (**self).send_column_diffs(diffs)
    }

    fn send_ticket_diff(&mut self, diff: &TicketDiff) -> Result<BoardSnapshot, Self::Error> {
        (**self).send_ticket_diff(diff)
    }

    fn link_ticket(&mut self, id: TicketId) -> Result<BoardSnapshot, Self::Error> {
        (**self).link_ticket(id)
    }

    fn unlink_ticket(&mut self, id: TicketId) -> Result<BoardSnapshot, Self::Error> {
        (**self).unlink_ticket(id)
    }
}

/// Identifies an outstanding request on one board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// The server call a request performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchBoard { detailed: Vec<TicketId> },
    SendColumnDiffs(Vec<ColumnDiff>),
    SendTicketDiff(TicketDiff),
    Link(TicketId),
    Unlink(TicketId),
}

impl Call {
    /// Short name for logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FetchBoard { .. } => "fetch_board",
            Self::SendColumnDiffs(_) => "send_column_diffs",
            Self::SendTicketDiff(_) => "send_ticket_diff",
            Self::Link(_) => "link_ticket",
            Self::Unlink(_) => "unlink_ticket",
        }
    }

    /// Perform the call.
    ///
    /// # Errors
    ///
    /// Whatever the transport reports.
    pub fn execute<C: SyncClient + ?Sized>(
        &self,
        client: &mut C,
    ) -> Result<BoardSnapshot, C::Error> {
        match self {
            Self::FetchBoard { detailed } => client.fetch_board(detailed),
            Self::SendColumnDiffs(diffs) => client.send_column_diffs(diffs),
            Self::SendTicketDiff(diff) => client.send_ticket_diff(diff),
            Self::Link(id) => client.link_ticket(*id),
            Self::Unlink(id) => client.unlink_ticket(*id),
        }
    }
}

/// An outbound call produced by a board operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: RequestId,
    pub call: Call,
}
