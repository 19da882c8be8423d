#![forbid(unsafe_code)]

mod cmd;
mod http;
mod output;
mod user;

use std::env;
use std::io::IsTerminal;
use std::process;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "kb: drive a Trac kanban board from the terminal",
    long_about = None
)]
struct Cli {
    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Override user identity (skips env resolution).
    #[arg(long, global = true)]
    user: Option<String>,

    /// Use the built-in in-memory demo board instead of a server.
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn global_opts(&self) -> cmd::GlobalOpts {
        cmd::GlobalOpts {
            json: self.json,
            user: self.user.clone(),
            demo: self.demo,
        }
    }

    /// Mode for error output, decided before config is known to load.
    fn error_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if std::io::stderr().is_terminal() {
            OutputMode::Pretty
        } else {
            OutputMode::Text
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "Show every column and its tickets",
        after_help = "EXAMPLES:\n    kb board\n    kb --demo board --json"
    )]
    Board,

    #[command(next_help_heading = "Read", about = "Show one ticket with its history")]
    Show(cmd::board::ShowArgs),

    #[command(next_help_heading = "Read", about = "List the ticket field catalog")]
    Fields,

    #[command(
        next_help_heading = "Read",
        about = "List the choices for a field",
        after_help = "EXAMPLES:\n    kb domain priority\n    kb domain milestone --ticket 42"
    )]
    Domain(cmd::board::DomainArgs),

    #[command(next_help_heading = "Change", about = "Move a ticket to another column")]
    Move(cmd::move_cmd::MoveArgs),

    #[command(next_help_heading = "Change", about = "Change fields of a ticket")]
    Edit(cmd::edit::EditArgs),

    #[command(next_help_heading = "Change", about = "Create a ticket on the board")]
    Create(cmd::edit::CreateArgs),

    #[command(next_help_heading = "Change", about = "Put an existing ticket on the board")]
    Link(cmd::link::LinkArgs),

    #[command(next_help_heading = "Change", about = "Take a ticket off the board")]
    Unlink(cmd::link::UnlinkArgs),

    #[command(next_help_heading = "Development", about = "Deterministic simulation campaigns")]
    Sim(cmd::sim::SimArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("KANBAN_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "kanban=debug,info"
        } else {
            "kanban=info,warn"
        })
    });

    let format = env::var("KANBAN_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays parseable.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let opts = cli.global_opts();
    let error_mode = cli.error_mode();

    let result = env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|project_root| {
            debug!(root = %project_root.display(), command = ?cli.command, "running");
            match &cli.command {
                Commands::Board => cmd::board::run_board(&opts, &project_root),
                Commands::Show(args) => cmd::board::run_show(args, &opts, &project_root),
                Commands::Fields => cmd::board::run_fields(&opts, &project_root),
                Commands::Domain(args) => cmd::board::run_domain(args, &opts, &project_root),
                Commands::Move(args) => cmd::move_cmd::run_move(args, &opts, &project_root),
                Commands::Edit(args) => cmd::edit::run_edit(args, &opts, &project_root),
                Commands::Create(args) => cmd::edit::run_create(args, &opts, &project_root),
                Commands::Link(args) => cmd::link::run_link(args, &opts, &project_root),
                Commands::Unlink(args) => cmd::link::run_unlink(args, &opts, &project_root),
                Commands::Sim(args) => cmd::sim::run_sim(args, &opts, &project_root),
            }
        });

    if let Err(err) = result {
        // Nothing more useful to do if stderr itself is gone.
        let _ = render_error(error_mode, &CliError::from_anyhow(&err));
        process::exit(1);
    }
}
