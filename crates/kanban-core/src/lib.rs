//! kanban-core library.
//!
//! Client-side mirror of a kanban board: columns of tickets kept in step
//! with a remote server through field-granular diffs and snapshot merges.

pub mod board;
pub mod config;
pub mod error;
pub mod model;
pub mod sync;

/// # Conventions
///
/// - **Errors**: typed `thiserror` enums ([`error::BoardError`],
///   [`error::SyncError`]) in the library; `anyhow::Result` for config I/O.
/// - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
/// - **I/O**: board operations return [`sync::Request`] values and never
///   touch the network.
pub use board::{Board, BoardEvent, BoardSettings, DialogBuffer, DragState, MergeReport};
pub use error::{BoardError, ErrorCode, SyncError};
pub use model::catalog::{FieldCatalog, FieldDef, FieldKind, FieldRoles};
pub use model::column::Column;
pub use model::ids::{ColumnId, TicketId, parse_ticket_link};
pub use model::ticket::{Fidelity, Ticket};
pub use model::value::FieldValue;
pub use sync::{BoardSnapshot, Call, Request, RequestId, SyncClient};
