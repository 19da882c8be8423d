use std::collections::BTreeSet;
use std::fmt;

use kanban_core::{Board, ColumnId, TicketId};

use crate::server::MemoryServer;

/// Fields a summary snapshot carries; the board must agree on them.
const SUMMARY_FIELDS: [&str; 2] = ["summary", "status"];

/// Oracle result for an invariant check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    #[must_use]
    fn merge(mut self, other: Self) -> Self {
        if !other.passed {
            self.passed = false;
            self.violations.extend(other.violations);
        }
        self
    }
}

/// Diagnostic information for a single failed invariant check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// The board's columns differ from the server's.
    ColumnLayout {
        client: usize,
        expected: Vec<ColumnId>,
        actual: Vec<ColumnId>,
    },
    /// A column holds different tickets, or the same ones in another order.
    Membership {
        client: usize,
        column: ColumnId,
        expected: Vec<TicketId>,
        actual: Vec<TicketId>,
    },
    /// A ticket field disagrees with the server after the final refresh.
    FieldMismatch {
        client: usize,
        ticket: TicketId,
        field: String,
        server: String,
        board: String,
    },
    /// The same ticket sits in two columns.
    DuplicateTicket { client: usize, ticket: TicketId },
    /// Requests were issued and never completed.
    PendingRequests { client: usize, count: usize },
    /// A merge turned a detailed ticket back into summary data.
    DetailLost { client: usize, ticket: TicketId },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnLayout {
                client,
                expected,
                actual,
            } => write!(
                f,
                "ColumnLayout: client {client} has columns {actual:?}, server has {expected:?}"
            ),
            Self::Membership {
                client,
                column,
                expected,
                actual,
            } => write!(
                f,
                "Membership: client {client} column {column} holds {actual:?}, server holds {expected:?}"
            ),
            Self::FieldMismatch {
                client,
                ticket,
                field,
                server,
                board,
            } => write!(
                f,
                "FieldMismatch: client {client} ticket {ticket} {field}={board:?}, server has {server:?}"
            ),
            Self::DuplicateTicket { client, ticket } => {
                write!(f, "DuplicateTicket: client {client} shows {ticket} in two columns")
            }
            Self::PendingRequests { client, count } => {
                write!(f, "PendingRequests: client {client} still waits on {count} requests")
            }
            Self::DetailLost { client, ticket } => {
                write!(f, "DetailLost: client {client} downgraded {ticket} to summary data")
            }
        }
    }
}

/// Checks a quiesced simulation: every client has completed all of its
/// requests and merged one final refresh.
pub struct ConvergenceOracle;

impl ConvergenceOracle {
    /// Run every check. `detail_lost` lists downgrades observed while the
    /// simulation ran.
    #[must_use]
    pub fn check_all(
        server: &MemoryServer,
        boards: &[Board],
        detail_lost: &[(usize, TicketId)],
    ) -> OracleResult {
        let mut result = OracleResult::pass();
        for (client, board) in boards.iter().enumerate() {
            result = result
                .merge(Self::check_layout(client, server, board))
                .merge(Self::check_fields(client, server, board))
                .merge(Self::check_unique(client, board))
                .merge(Self::check_quiesced(client, board));
        }
        let lost = detail_lost
            .iter()
            .map(|&(client, ticket)| InvariantViolation::DetailLost { client, ticket })
            .collect();
        result.merge(OracleResult::from_violations(lost))
    }

    /// Same columns in the same order, each holding the server's tickets in
    /// the server's order.
    #[must_use]
    pub fn check_layout(client: usize, server: &MemoryServer, board: &Board) -> OracleResult {
        let expected: Vec<ColumnId> = server.columns().iter().map(|c| c.id.clone()).collect();
        let actual: Vec<ColumnId> = board.columns().map(|c| c.id().clone()).collect();
        if expected != actual {
            return OracleResult::from_violations(vec![InvariantViolation::ColumnLayout {
                client,
                expected,
                actual,
            }]);
        }

        let violations = server
            .columns()
            .iter()
            .zip(board.columns())
            .filter_map(|(theirs, ours)| {
                let actual: Vec<TicketId> = ours.ticket_ids().collect();
                (theirs.tickets != actual).then(|| InvariantViolation::Membership {
                    client,
                    column: theirs.id.clone(),
                    expected: theirs.tickets.clone(),
                    actual,
                })
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_fields(client: usize, server: &MemoryServer, board: &Board) -> OracleResult {
        let mut violations = Vec::new();
        for column in server.columns() {
            for id in &column.tickets {
                let Some(ticket) = board.ticket(*id) else {
                    continue;
                };
                for field in SUMMARY_FIELDS {
                    let theirs = server
                        .field(*id, field)
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    let ours = ticket.text(field);
                    if theirs != ours {
                        violations.push(InvariantViolation::FieldMismatch {
                            client,
                            ticket: *id,
                            field: field.to_string(),
                            server: theirs,
                            board: ours.to_string(),
                        });
                    }
                }
            }
        }
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_unique(client: usize, board: &Board) -> OracleResult {
        let mut seen = BTreeSet::new();
        let violations = board
            .columns()
            .flat_map(kanban_core::Column::ticket_ids)
            .filter(|id| !seen.insert(*id))
            .map(|ticket| InvariantViolation::DuplicateTicket { client, ticket })
            .collect();
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_quiesced(client: usize, board: &Board) -> OracleResult {
        let count = board.pending_requests();
        if count == 0 {
            OracleResult::pass()
        } else {
            OracleResult::from_violations(vec![InvariantViolation::PendingRequests {
                client,
                count,
            }])
        }
    }
}
