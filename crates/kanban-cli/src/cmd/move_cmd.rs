use std::path::Path;

use anyhow::{Result, anyhow};
use clap::Args;
use kanban_core::{Board, BoardError, ColumnId, MergeReport, TicketId};
use tracing::info;

use super::{ChangeSummary, GlobalOpts, Session};

#[derive(Args, Debug)]
#[command(after_help = "EXAMPLES:\n    # Move ticket 42 into column 2\n    kb move 42 2\n\n    \
    # Move by column name, to the top of the column\n    kb move '#42' Done --index 0")]
pub struct MoveArgs {
    /// Ticket to move.
    pub id: TicketId,

    /// Target column id or name.
    pub column: String,

    /// Position in the target column (0 = top). Defaults to the end.
    #[arg(long)]
    pub index: Option<usize>,
}

/// Resolve user input to a column on the board: id first, then name
/// (case-insensitive).
pub fn find_column(board: &Board, input: &str) -> Result<ColumnId, BoardError> {
    let parsed = ColumnId::parse(input);
    if board.column(&parsed).is_some() {
        return Ok(parsed);
    }
    board
        .columns()
        .find(|c| c.name().eq_ignore_ascii_case(input.trim()))
        .map(|c| c.id().clone())
        .ok_or(BoardError::UnknownColumn(parsed))
}

pub fn run_move(args: &MoveArgs, opts: &GlobalOpts, project_root: &Path) -> Result<()> {
    let mut session = Session::open(opts, project_root, false)?;
    let target = find_column(&session.board, &args.column)?;
    let source = session
        .board
        .column_of(args.id)
        .map(|c| c.id().clone())
        .ok_or(BoardError::UnknownTicket(args.id))?;

    let report = match session
        .board
        .handle_drop_at(&source, &target, args.id, args.index)?
    {
        Some(request) => session.send(request)?,
        None => MergeReport::default(),
    };
    let landed = session
        .board
        .column_of(args.id)
        .map(|c| c.id().clone())
        .ok_or_else(|| anyhow!("ticket {} left the board while moving", args.id))?;
    info!(ticket = %args.id, from = %source, to = %landed, "ticket moved");

    ChangeSummary::new("moved", Some(args.id), &report).print(session.output)
}
