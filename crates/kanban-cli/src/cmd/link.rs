use std::path::Path;

use anyhow::{Result, anyhow};
use clap::Args;
use kanban_core::{TicketId, parse_ticket_link};

use super::{ChangeSummary, GlobalOpts, Session};

#[derive(Args, Debug)]
#[command(after_help = "EXAMPLES:\n    kb link 42\n    kb link https://trac.example.com/myproject/ticket/42")]
pub struct LinkArgs {
    /// Ticket number or a ticket link from this project.
    pub ticket: String,
}

#[derive(Args, Debug)]
pub struct UnlinkArgs {
    pub id: TicketId,
}

/// Accept `42`, `#42`, or a ticket URL into `project`.
pub fn resolve_ticket_ref(input: &str, project: Option<&str>) -> Result<TicketId> {
    if let Ok(id) = input.parse::<TicketId>() {
        return Ok(id);
    }
    let project = project.ok_or_else(|| {
        anyhow!("`{input}` is not a ticket number, and no project is configured to match links against")
    })?;
    parse_ticket_link(input, project)
        .ok_or_else(|| anyhow!("`{input}` is not a ticket of project `{project}`"))
}

pub fn run_link(args: &LinkArgs, opts: &GlobalOpts, project_root: &Path) -> Result<()> {
    let mut session = Session::open(opts, project_root, false)?;
    let id = resolve_ticket_ref(&args.ticket, session.project_name().as_deref())?;
    let request = session.board.link_ticket(id);
    let report = session.send(request)?;
    ChangeSummary::new("linked", Some(id), &report).print(session.output)
}

pub fn run_unlink(args: &UnlinkArgs, opts: &GlobalOpts, project_root: &Path) -> Result<()> {
    let mut session = Session::open(opts, project_root, false)?;
    let request = session.board.unlink_ticket(args.id);
    let report = session.send(request)?;
    ChangeSummary::new("unlinked", Some(args.id), &report).print(session.output)
}
