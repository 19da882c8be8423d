use std::fmt;

use crate::model::ids::{ColumnId, TicketId};

/// Machine-readable error codes for logs and CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    CatalogFetchFailed,
    BoardFetchFailed,
    ColumnNotFound,
    TicketNotFound,
    UnknownField,
    ReservedField,
    NoDialogOpen,
    InvalidDragState,
    NotADraft,
    TransportFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::CatalogFetchFailed => "E1002",
            Self::BoardFetchFailed => "E1003",
            Self::ColumnNotFound => "E2001",
            Self::TicketNotFound => "E2002",
            Self::UnknownField => "E2003",
            Self::ReservedField => "E2004",
            Self::NoDialogOpen => "E2005",
            Self::InvalidDragState => "E2006",
            Self::NotADraft => "E2007",
            Self::TransportFailed => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::CatalogFetchFailed => "Failed to fetch ticket field catalog",
            Self::BoardFetchFailed => "Failed to fetch board data",
            Self::ColumnNotFound => "Column not found",
            Self::TicketNotFound => "Ticket not found",
            Self::UnknownField => "Unknown ticket field",
            Self::ReservedField => "Field cannot be edited",
            Self::NoDialogOpen => "No ticket dialog is open",
            Self::InvalidDragState => "Invalid drag state",
            Self::NotADraft => "Dialog does not hold a new ticket",
            Self::TransportFailed => "Request to the board server failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::CatalogFetchFailed | Self::BoardFetchFailed => {
                Some("Check [server] base_url and board in the config and that the server is up.")
            }
            Self::ColumnNotFound | Self::TicketNotFound => {
                Some("Refresh the board; it may have changed on the server.")
            }
            Self::UnknownField => {
                Some("Run `kb fields` to list the ticket fields of this project.")
            }
            Self::ReservedField => Some("The ticket id is assigned by the server."),
            Self::NoDialogOpen => Some("Select a ticket or start a new one first."),
            Self::InvalidDragState => None,
            Self::NotADraft => Some("Save the open ticket instead, or start a new one."),
            Self::TransportFailed => Some(
                "Local changes were applied but not confirmed. Refresh to see the server state.",
            ),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failures of board operations that never reached the transport.
///
/// These are logic faults from the caller's point of view: a correctly wired
/// UI only offers ids and fields that exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("column {0} is not on the board")]
    UnknownColumn(ColumnId),
    #[error("ticket {0} is not on the board")]
    UnknownTicket(TicketId),
    #[error("unknown ticket field '{0}'")]
    UnknownField(String),
    #[error("ticket field '{0}' cannot be set")]
    ReservedField(String),
    #[error("no ticket dialog is open")]
    NoDialog,
    #[error("the open dialog shows an existing ticket")]
    NotADraft,
    #[error("no drag gesture is in progress")]
    NoDragInProgress,
    #[error("a drag gesture is already in progress")]
    DragInProgress,
}

impl BoardError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownColumn(_) => ErrorCode::ColumnNotFound,
            Self::UnknownTicket(_) => ErrorCode::TicketNotFound,
            Self::UnknownField(_) => ErrorCode::UnknownField,
            Self::ReservedField(_) => ErrorCode::ReservedField,
            Self::NoDialog => ErrorCode::NoDialogOpen,
            Self::NotADraft => ErrorCode::NotADraft,
            Self::NoDragInProgress | Self::DragInProgress => ErrorCode::InvalidDragState,
        }
    }
}

/// Which initial load step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    Catalog,
    Board,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Catalog => "catalog",
            Self::Board => "board",
        })
    }
}

/// Failures of operations that involve the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The request was sent (or attempted) and failed. Local optimistic
    /// changes stay applied and cleared dirty marks are not restored.
    #[error("{call} request failed: {message}")]
    Transport { call: &'static str, message: String },
    /// Fetching the catalog or the initial board failed; no board exists.
    #[error("initial {stage} fetch failed: {message}")]
    InitialFetch { stage: FetchStage, message: String },
    #[error(transparent)]
    Board(#[from] BoardError),
}

impl SyncError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Transport { .. } => ErrorCode::TransportFailed,
            Self::InitialFetch {
                stage: FetchStage::Catalog,
                ..
            } => ErrorCode::CatalogFetchFailed,
            Self::InitialFetch {
                stage: FetchStage::Board,
                ..
            } => ErrorCode::BoardFetchFailed,
            Self::Board(err) => err.code(),
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
