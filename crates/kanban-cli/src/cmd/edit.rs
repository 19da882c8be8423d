//! `kb edit` and `kb create`: field changes through the ticket dialog.

use std::path::Path;

use anyhow::{Result, bail};
use clap::Args;
use kanban_core::{BoardEvent, MergeReport, TicketId};
use tracing::info;

use super::{ChangeSummary, GlobalOpts, Session};

/// Parse a `field=value` assignment.
pub fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got `{raw}`"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in `{raw}`"));
    }
    Ok((field.to_string(), value.to_string()))
}

#[derive(Args, Debug)]
#[command(after_help = "EXAMPLES:\n    # Raise the priority and leave a comment\n    \
    kb edit 42 --set priority=critical --note 'customer is blocked'\n\n    \
    # Clear an optional field\n    kb edit 42 --set milestone=")]
pub struct EditArgs {
    pub id: TicketId,

    /// Field assignment, repeatable.
    #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,

    /// Comment recorded with the change.
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Args, Debug)]
#[command(after_help = "EXAMPLES:\n    kb create --summary 'Login page times out' --set priority=major")]
pub struct CreateArgs {
    #[arg(long)]
    pub summary: String,

    /// Field assignment, repeatable.
    #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,

    /// Comment recorded with the new ticket.
    #[arg(long)]
    pub note: Option<String>,
}

pub fn run_edit(args: &EditArgs, opts: &GlobalOpts, project_root: &Path) -> Result<()> {
    if args.set.is_empty() && args.note.is_none() {
        bail!("nothing to change: pass --set FIELD=VALUE or --note");
    }
    let mut session = Session::open(opts, project_root, false)?;

    // Load the full ticket so the dialog copy carries every field.
    let request = session.board.select_ticket(args.id)?;
    let mut report = session.send(request)?;

    for (field, value) in &args.set {
        session.board.edit_dialog(field, value.as_str())?;
    }
    if let Some(note) = &args.note {
        session.board.set_dialog_note(note)?;
    }
    match session.board.save_dialog_ticket()? {
        Some(request) => report.events.extend(session.send(request)?.events),
        None => info!(ticket = %args.id, "no field differs; nothing sent"),
    }

    ChangeSummary::new("saved", Some(args.id), &report).print(session.output)
}

pub fn run_create(args: &CreateArgs, opts: &GlobalOpts, project_root: &Path) -> Result<()> {
    let mut session = Session::open(opts, project_root, true)?;

    session.board.create_ticket();
    session.board.edit_dialog("summary", args.summary.as_str())?;
    for (field, value) in &args.set {
        session.board.edit_dialog(field, value.as_str())?;
    }
    if let Some(note) = &args.note {
        session.board.set_dialog_note(note)?;
    }
    let request = session.board.create_dialog_ticket()?;
    let report = session.send(request)?;

    let created = created_ticket(&report);
    if let Some(id) = created {
        info!(ticket = %id, reporter = %session.user, "ticket created");
    }
    ChangeSummary::new("created", created, &report).print(session.output)
}

fn created_ticket(report: &MergeReport) -> Option<TicketId> {
    report.events.iter().find_map(|event| match event {
        BoardEvent::TicketCreated(id) => Some(*id),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_split_on_first_equals() {
        assert_eq!(
            parse_assignment("summary=a=b"),
            Ok(("summary".to_string(), "a=b".to_string()))
        );
        assert_eq!(
            parse_assignment(" milestone ="),
            Ok(("milestone".to_string(), String::new()))
        );
    }

    #[test]
    fn malformed_assignments_are_rejected() {
        assert!(parse_assignment("priority").is_err());
        assert!(parse_assignment("=major").is_err());
    }

    #[test]
    fn created_ticket_comes_from_the_report() {
        let report = MergeReport {
            events: vec![
                BoardEvent::TicketUpdated(TicketId::new(1)),
                BoardEvent::TicketCreated(TicketId::new(9)),
            ],
        };
        assert_eq!(created_ticket(&report), Some(TicketId::new(9)));
        assert_eq!(created_ticket(&MergeReport::default()), None);
    }
}
