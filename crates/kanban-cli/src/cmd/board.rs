//! Read-only views: `kb board`, `kb show`, `kb fields`, `kb domain`.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use clap::Args;
use kanban_core::{Board, Column, Ticket, TicketId};
use serde::Serialize;

use super::{GlobalOpts, Session};
use crate::output::{pretty_kv, pretty_rule, pretty_section, render, render_mode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Ticket number, with or without `#`.
    pub id: TicketId,
}

#[derive(Args, Debug)]
pub struct DomainArgs {
    /// Field name, e.g. `priority`.
    pub field: String,

    /// Widen the choices with this ticket's current value.
    #[arg(long)]
    pub ticket: Option<TicketId>,
}

#[derive(Debug, Serialize)]
pub struct TicketRow {
    pub id: u64,
    pub summary: String,
    pub status: String,
}

impl TicketRow {
    fn of(ticket: &Ticket, state_field: &str) -> Self {
        Self {
            id: ticket.id().map_or(0, TicketId::get),
            summary: ticket.text("summary").to_string(),
            status: ticket.text(state_field).to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ColumnView {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wip: Option<u32>,
    pub over_wip: bool,
    pub states: Vec<String>,
    pub tickets: Vec<TicketRow>,
}

impl ColumnView {
    fn of(column: &Column, state_field: &str) -> Self {
        Self {
            id: column.id().to_string(),
            name: column.name().to_string(),
            wip: column.wip(),
            over_wip: column.over_wip(),
            states: column.states().to_vec(),
            tickets: column.tickets().map(|t| TicketRow::of(t, state_field)).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BoardView {
    pub columns: Vec<ColumnView>,
}

impl BoardView {
    pub fn of(board: &Board) -> Self {
        let state_field = board.catalog().roles().state.as_str();
        Self {
            columns: board.columns().map(|c| ColumnView::of(c, state_field)).collect(),
        }
    }
}

fn board_text(view: &BoardView, w: &mut dyn Write) -> std::io::Result<()> {
    for column in &view.columns {
        for t in &column.tickets {
            writeln!(w, "{}\t#{}\t{}\t{}", column.id, t.id, t.status, t.summary)?;
        }
    }
    Ok(())
}

fn board_pretty(view: &BoardView, w: &mut dyn Write) -> std::io::Result<()> {
    for column in &view.columns {
        let wip = match column.wip {
            Some(limit) if column.over_wip => {
                format!(" [{}/{limit} over WIP]", column.tickets.len())
            }
            Some(limit) => format!(" [{}/{limit}]", column.tickets.len()),
            None => String::new(),
        };
        pretty_section(w, &format!("{} ({}){wip}", column.name, column.id))?;
        if column.tickets.is_empty() {
            writeln!(w, "  (empty)")?;
        }
        for t in &column.tickets {
            writeln!(w, "  #{:<6} {:<10} {}", t.id, t.status, t.summary)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Print every column with its tickets.
pub fn run_board(opts: &GlobalOpts, project_root: &Path) -> Result<()> {
    let session = Session::open(opts, project_root, false)?;
    print_board(&session)
}

pub fn print_board(session: &Session) -> Result<()> {
    let view = BoardView::of(&session.board);
    render_mode(session.output, &view, board_text, board_pretty)
}

#[derive(Debug, Serialize)]
struct TicketDetail {
    id: u64,
    column: Option<String>,
    fields: Vec<FieldLine>,
    changelog: Vec<kanban_core::model::value::ChangelogEntry>,
}

#[derive(Debug, Serialize)]
struct FieldLine {
    name: String,
    label: String,
    value: String,
}

/// Fetch one ticket in full and print it.
pub fn run_show(args: &ShowArgs, opts: &GlobalOpts, project_root: &Path) -> Result<()> {
    let mut session = Session::open(opts, project_root, false)?;
    let request = session.board.select_ticket(args.id)?;
    session.send(request)?;

    let board = &session.board;
    let ticket = board
        .ticket(args.id)
        .ok_or(kanban_core::BoardError::UnknownTicket(args.id))?;
    let detail = TicketDetail {
        id: args.id.get(),
        column: board.column_of(args.id).map(|c| c.name().to_string()),
        fields: board
            .catalog()
            .fields()
            .filter_map(|def| {
                ticket.get(&def.name).map(|value| FieldLine {
                    name: def.name.clone(),
                    label: def.label.clone(),
                    value: value.to_string(),
                })
            })
            .collect(),
        changelog: ticket.changelog(),
    };

    render(session.output, &detail, |d, w| {
        pretty_section(w, &format!("Ticket #{}", d.id))?;
        if let Some(column) = &d.column {
            pretty_kv(w, "Column", column)?;
        }
        for line in &d.fields {
            pretty_kv(w, &line.label, &line.value)?;
        }
        if !d.changelog.is_empty() {
            writeln!(w)?;
            pretty_section(w, "History")?;
            for entry in &d.changelog {
                let when = kanban_core::FieldValue::Timestamp(entry.time);
                writeln!(
                    w,
                    "{when}  {}  {}: {:?} -> {:?}",
                    entry.author, entry.field, entry.old_value, entry.new_value
                )?;
            }
        }
        Ok(())
    })
}

#[derive(Debug, Serialize)]
struct FieldInfo {
    name: String,
    label: String,
    kind: kanban_core::FieldKind,
    optional: bool,
    choices: Vec<String>,
}

/// List the field catalog.
pub fn run_fields(opts: &GlobalOpts, project_root: &Path) -> Result<()> {
    let session = Session::open(opts, project_root, false)?;
    let catalog = session.board.catalog();
    let fields: Vec<FieldInfo> = catalog
        .fields()
        .map(|def| FieldInfo {
            name: def.name.clone(),
            label: def.label.clone(),
            kind: def.kind,
            optional: def.is_optional(),
            choices: catalog.base_domain(def),
        })
        .collect();

    render(session.output, &fields, |fields, w| {
        for f in fields {
            let choices = if f.choices.is_empty() {
                String::new()
            } else {
                format!("  [{}]", f.choices.join("|"))
            };
            writeln!(w, "{:<14} {:<14} {:?}{choices}", f.name, f.label, f.kind)?;
        }
        pretty_rule(w)?;
        writeln!(w, "{} fields", fields.len())
    })
}

#[derive(Debug, Serialize)]
struct DomainView {
    field: String,
    label: Option<String>,
    ticket: Option<u64>,
    choices: Vec<String>,
}

/// Print the choices offered for a field.
pub fn run_domain(args: &DomainArgs, opts: &GlobalOpts, project_root: &Path) -> Result<()> {
    let session = Session::open(opts, project_root, false)?;
    let board = &session.board;
    let choices = match args.ticket {
        Some(id) => board.field_domain_for(id, &args.field)?,
        None => board.field_domain(&args.field)?,
    };
    let view = DomainView {
        field: args.field.clone(),
        label: board.field_label(&args.field).map(ToString::to_string),
        ticket: args.ticket.map(TicketId::get),
        choices,
    };
    render(session.output, &view, |v, w| {
        for choice in &v.choices {
            if choice.is_empty() {
                writeln!(w, "(none)")?;
            } else {
                writeln!(w, "{choice}")?;
            }
        }
        Ok(())
    })
}
