//! Command handlers and the board session they share.

pub mod board;
pub mod edit;
pub mod link;
pub mod move_cmd;
pub mod sim;

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, bail};
use kanban_core::config::{EffectiveConfig, resolve_config};
use kanban_core::model::catalog::CatalogPayload;
use kanban_core::sync::{ColumnDiff, TicketDiff};
use kanban_core::{
    Board, BoardEvent, BoardSettings, BoardSnapshot, MergeReport, Request, SyncClient, TicketId,
};
use kanban_sim::MemoryServer;
use serde::Serialize;

use crate::http::HttpClient;
use crate::output::OutputMode;
use crate::user;

/// Flags every command sees.
#[derive(Debug, Clone, Default)]
pub struct GlobalOpts {
    pub json: bool,
    pub user: Option<String>,
    pub demo: bool,
}

/// Where requests go.
#[derive(Debug)]
pub enum Backend {
    Http(HttpClient),
    /// Built-in in-memory board, nothing leaves the process.
    Demo(Box<MemoryServer>),
}

/// Transport failure from either backend.
#[derive(Debug)]
pub struct BackendError(String);

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn lift<T, E: fmt::Display>(result: Result<T, E>) -> Result<T, BackendError> {
    result.map_err(|err| BackendError(err.to_string()))
}

impl SyncClient for Backend {
    type Error = BackendError;

    fn fetch_catalog(&mut self) -> Result<CatalogPayload, BackendError> {
        match self {
            Self::Http(c) => lift(c.fetch_catalog()),
            Self::Demo(s) => lift(s.fetch_catalog()),
        }
    }

    fn fetch_board(&mut self, detailed: &[TicketId]) -> Result<BoardSnapshot, BackendError> {
        match self {
            Self::Http(c) => lift(c.fetch_board(detailed)),
            Self::Demo(s) => lift(s.fetch_board(detailed)),
        }
    }

    fn send_column_diffs(&mut self, diffs: &[ColumnDiff]) -> Result<BoardSnapshot, BackendError> {
        match self {
            Self::Http(c) => lift(c.send_column_diffs(diffs)),
            Self::Demo(s) => lift(s.send_column_diffs(diffs)),
        }
    }

    fn send_ticket_diff(&mut self, diff: &TicketDiff) -> Result<BoardSnapshot, BackendError> {
        match self {
            Self::Http(c) => lift(c.send_ticket_diff(diff)),
            Self::Demo(s) => lift(s.send_ticket_diff(diff)),
        }
    }

    fn link_ticket(&mut self, id: TicketId) -> Result<BoardSnapshot, BackendError> {
        match self {
            Self::Http(c) => lift(c.link_ticket(id)),
            Self::Demo(s) => lift(s.link_ticket(id)),
        }
    }

    fn unlink_ticket(&mut self, id: TicketId) -> Result<BoardSnapshot, BackendError> {
        match self {
            Self::Http(c) => lift(c.unlink_ticket(id)),
            Self::Demo(s) => lift(s.unlink_ticket(id)),
        }
    }
}

/// A loaded board plus the transport it came from.
pub struct Session {
    pub board: Board,
    pub backend: Backend,
    pub config: EffectiveConfig,
    pub output: OutputMode,
    pub user: String,
}

impl Session {
    /// Resolve config and identity, then load the board.
    ///
    /// # Errors
    ///
    /// Config errors, a missing server setting, a missing identity when
    /// `need_user` is set, or a failed initial fetch.
    pub fn open(opts: &GlobalOpts, project_root: &Path, need_user: bool) -> Result<Self> {
        let config = resolve_config(project_root, opts.json)?;
        let output = OutputMode::from_resolved(&config.resolved_output);
        let configured = config.user.user.as_deref();
        let user = if need_user {
            user::require_user(opts.user.as_deref(), configured)?
        } else {
            user::resolve_user(opts.user.as_deref(), configured)
                .unwrap_or_else(|| user::ANONYMOUS.to_string())
        };

        let mut backend = if opts.demo {
            let mut server = MemoryServer::demo();
            server.set_author(&user);
            Backend::Demo(Box::new(server))
        } else {
            let server = &config.project.server;
            let Some(base_url) = server.base_url.as_deref() else {
                bail!("no server configured: set [server] base_url in .kanban/config.toml, or pass --demo");
            };
            let Some(board) = server.board.as_deref() else {
                bail!("no board configured: set [server] board in .kanban/config.toml");
            };
            Backend::Http(HttpClient::new(base_url, board))
        };

        let settings = BoardSettings {
            draft: config.project.draft.clone(),
            user: user.clone(),
        };
        let board = Board::load(&mut backend, config.project.fields.clone(), settings)
            .context("could not load the board")?;

        Ok(Self {
            board,
            backend,
            config,
            output,
            user,
        })
    }

    /// Run a request and merge its response.
    ///
    /// # Errors
    ///
    /// The transport failed; the local change stays applied.
    pub fn send(&mut self, request: Request) -> Result<MergeReport> {
        Ok(self.board.dispatch(&mut self.backend, request)?)
    }

    /// Project name used to recognise ticket links.
    pub fn project_name(&self) -> Option<String> {
        match self.backend {
            Backend::Demo(_) => Some("demo".to_string()),
            Backend::Http(_) => self.config.project.server.project_name(),
        }
    }
}

/// One line per merge event, for command output.
pub fn describe_event(event: &BoardEvent) -> String {
    match event {
        BoardEvent::ColumnCreated(id) => format!("column {id} created"),
        BoardEvent::ColumnUpdated(id) => format!("column {id} updated"),
        BoardEvent::TicketCreated(id) => format!("{id} created"),
        BoardEvent::TicketUpdated(id) => format!("{id} updated"),
        BoardEvent::TicketMoved { id, from, to } => format!("{id} moved {from} -> {to}"),
        BoardEvent::TicketRemoved(id) => format!("{id} left the board"),
        BoardEvent::SelectionRefreshed(id) => format!("{id} reloaded"),
        BoardEvent::DialogStale(id) => format!("{id} changed on the server while editing"),
        BoardEvent::SelectionCleared(id) => format!("{id} no longer selected"),
    }
}

/// Serializable outcome of a mutating command.
#[derive(Debug, Serialize)]
pub struct ChangeSummary {
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<u64>,
    pub changes: Vec<String>,
}

impl ChangeSummary {
    pub fn new(action: &'static str, ticket: Option<TicketId>, report: &MergeReport) -> Self {
        Self {
            action,
            ticket: ticket.map(TicketId::get),
            changes: report.events.iter().map(describe_event).collect(),
        }
    }

    /// Print in the session's output mode.
    pub fn print(&self, output: OutputMode) -> Result<()> {
        crate::output::render(output, self, |s, w| {
            match s.ticket {
                Some(id) => writeln!(w, "{}: #{id}", s.action)?,
                None => writeln!(w, "{}", s.action)?,
            }
            for change in &s.changes {
                writeln!(w, "  {change}")?;
            }
            Ok(())
        })
    }
}
