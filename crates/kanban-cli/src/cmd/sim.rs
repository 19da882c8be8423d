//! `kb sim` - deterministic simulation campaigns against the in-memory
//! server.
//!
//! `kb sim run` executes a campaign across many seeds.
//! `kb sim replay` replays one seed with its trace.

use std::path::Path;
use std::process;

use anyhow::Result;
use clap::{Args, Subcommand};
use kanban_core::config::resolve_config;
use kanban_sim::campaign::{CampaignConfig, replay_seed, run_campaign};
use kanban_sim::simulator::TraceEventKind;
use kanban_sim::FaultConfig;
use serde::Serialize;

use super::GlobalOpts;
use crate::output::{OutputMode, pretty_kv, pretty_section};

#[derive(Args, Debug)]
pub struct SimArgs {
    #[command(subcommand)]
    pub command: SimCommand,
}

#[derive(Subcommand, Debug)]
pub enum SimCommand {
    #[command(
        about = "Run a simulation campaign across multiple seeds",
        long_about = "Drive several simulated boards against one in-memory server through a\n\
                      lossy network, then check every board matches the server once the\n\
                      network is quiet. Reports pass/fail per seed.",
        after_help = "EXAMPLES:\n    # Run 100 seeds with defaults\n    kb sim run --seeds 100\n\n\
                      # Harsher network\n    kb sim run --seeds 200 --clients 5 --faults 0.3\n\n\
                      # Machine-readable output\n    kb --json sim run --seeds 50"
    )]
    Run(SimRunArgs),

    #[command(
        about = "Replay a single seed with detailed trace output",
        after_help = "EXAMPLES:\n    kb sim replay --seed 42\n    kb sim replay --seed 42 --clients 5 --trace"
    )]
    Replay(SimReplayArgs),
}

/// Knobs shared by run and replay.
#[derive(Args, Debug, Clone, Copy)]
pub struct SimShape {
    /// Number of simulated boards.
    #[arg(long, default_value = "3")]
    pub clients: usize,

    /// Rounds per seed.
    #[arg(long, default_value = "24")]
    pub rounds: u64,

    /// User actions per round.
    #[arg(long, default_value = "3")]
    pub actions: usize,

    /// Overall fault probability between 0.0 and 1.0; scales drop,
    /// duplicate, reorder and server failure rates.
    #[arg(long, default_value = "0.1")]
    pub faults: f64,

    /// Maximum delivery delay in rounds.
    #[arg(long, default_value = "3")]
    pub max_delay: u8,
}

#[derive(Args, Debug)]
pub struct SimRunArgs {
    /// Number of seeds to run.
    #[arg(long, default_value = "100")]
    pub seeds: u64,

    /// First seed.
    #[arg(long, default_value = "0")]
    pub seed_start: u64,

    #[command(flatten)]
    pub shape: SimShape,
}

#[derive(Args, Debug)]
pub struct SimReplayArgs {
    #[arg(long)]
    pub seed: u64,

    /// Print every trace event.
    #[arg(long)]
    pub trace: bool,

    #[command(flatten)]
    pub shape: SimShape,
}

#[derive(Debug, Serialize)]
struct RunOutput {
    seeds_run: usize,
    seeds_passed: usize,
    seeds_failed: usize,
    first_failure: Option<u64>,
    requests_sent: usize,
    requests_dropped: usize,
    all_passed: bool,
    failures: Vec<FailureOutput>,
}

#[derive(Debug, Serialize)]
struct FailureOutput {
    seed: u64,
    violations: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ReplayOutput {
    seed: u64,
    clients: usize,
    trace_events: usize,
    requests_sent: usize,
    dropped: usize,
    duplicated: usize,
    failed_completions: usize,
    merges: usize,
    server_tickets: usize,
    oracle_passed: bool,
    violations: Vec<String>,
}

/// Percent of `weight` at fault probability `base`.
fn scale_fault(base: f64, weight_pct: u8) -> u8 {
    let raw = (base * f64::from(weight_pct)).clamp(0.0, 100.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = raw as u8;
    pct
}

fn build_campaign_config(seed_start: u64, seeds: u64, shape: SimShape) -> CampaignConfig {
    CampaignConfig {
        seed_range: seed_start..seed_start.saturating_add(seeds),
        clients: shape.clients,
        rounds: shape.rounds,
        actions_per_round: shape.actions,
        fault: FaultConfig {
            max_delay_rounds: shape.max_delay,
            drop_rate_percent: scale_fault(shape.faults, 50),
            duplicate_rate_percent: scale_fault(shape.faults, 25),
            reorder_rate_percent: scale_fault(shape.faults, 50),
            fail_rate_percent: scale_fault(shape.faults, 25),
        },
    }
}

fn output_mode(opts: &GlobalOpts, project_root: &Path) -> Result<OutputMode> {
    let config = resolve_config(project_root, opts.json)?;
    Ok(OutputMode::from_resolved(&config.resolved_output))
}

pub fn run_sim_run(args: &SimRunArgs, output: OutputMode) -> Result<()> {
    let config = build_campaign_config(args.seed_start, args.seeds, args.shape);
    let report = run_campaign(&config)?;

    let out = RunOutput {
        seeds_run: report.seeds_run,
        seeds_passed: report.seeds_passed,
        seeds_failed: report.failures.len(),
        first_failure: report.first_failure,
        requests_sent: report.requests_sent,
        requests_dropped: report.requests_dropped,
        all_passed: report.all_passed(),
        failures: report
            .failures
            .iter()
            .map(|f| FailureOutput {
                seed: f.seed,
                violations: f.violations.clone(),
            })
            .collect(),
    };
    let shape = args.shape;

    match output {
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(&out)?),
        OutputMode::Text => {
            println!(
                "campaign seeds_run={} clients={} rounds={} faults_pct={:.0}",
                out.seeds_run,
                shape.clients,
                shape.rounds,
                shape.faults * 100.0
            );
            println!(
                "results passed={} failed={} sent={} dropped={} all_passed={}",
                out.seeds_passed,
                out.seeds_failed,
                out.requests_sent,
                out.requests_dropped,
                out.all_passed
            );
            for failure in out.failures.iter().take(5) {
                println!("failure seed={} violations={}", failure.seed, failure.violations.len());
            }
            if let Some(seed) = out.first_failure {
                println!(
                    "hint replay_seed={seed} clients={} rounds={}",
                    shape.clients, shape.rounds
                );
            }
        }
        OutputMode::Pretty => {
            let stdout = std::io::stdout();
            let mut w = stdout.lock();
            pretty_section(&mut w, "Simulation Campaign")?;
            pretty_kv(&mut w, "Seeds", out.seeds_run.to_string())?;
            pretty_kv(&mut w, "Clients", shape.clients.to_string())?;
            pretty_kv(&mut w, "Rounds", shape.rounds.to_string())?;
            pretty_kv(&mut w, "Fault rate", format!("{:.0}%", shape.faults * 100.0))?;
            pretty_kv(
                &mut w,
                "Requests",
                format!("{} sent, {} lost", out.requests_sent, out.requests_dropped),
            )?;
            pretty_kv(
                &mut w,
                "Results",
                format!("{} passed / {} failed", out.seeds_passed, out.seeds_failed),
            )?;
            if let Some(seed) = out.first_failure {
                println!();
                pretty_section(&mut w, "Failure Samples")?;
                for failure in out.failures.iter().take(5) {
                    println!("seed {:<8} violations={}", failure.seed, failure.violations.len());
                    for violation in &failure.violations {
                        println!("  - {violation}");
                    }
                }
                if out.failures.len() > 5 {
                    println!("... and {} more failures", out.failures.len() - 5);
                }
                println!();
                pretty_kv(
                    &mut w,
                    "Replay",
                    format!(
                        "kb sim replay --seed {seed} --clients {} --rounds {}",
                        shape.clients, shape.rounds
                    ),
                )?;
            } else {
                pretty_kv(&mut w, "Status", "all seeds passed")?;
            }
        }
    }

    // Non-zero exit for CI.
    if !report.all_passed() {
        process::exit(1);
    }
    Ok(())
}

fn describe_trace(kind: &TraceEventKind) -> String {
    match kind {
        TraceEventKind::Act {
            client,
            action,
            request,
        } => match request {
            Some(id) => format!("client {client} {action:?} -> {id}"),
            None => format!("client {client} {action:?} (local only)"),
        },
        TraceEventKind::Rejected {
            client,
            action,
            code,
        } => format!("client {client} {action:?} rejected [{code}]"),
        other => format!("{other:?}"),
    }
}

pub fn run_sim_replay(args: &SimReplayArgs, output: OutputMode) -> Result<()> {
    let config = build_campaign_config(args.seed, 1, args.shape);
    let trace = replay_seed(args.seed, &config)?;
    let stats = trace.result.stats;

    let out = ReplayOutput {
        seed: args.seed,
        clients: trace.result.boards.len(),
        trace_events: trace.result.trace.len(),
        requests_sent: stats.requests_sent,
        dropped: stats.dropped,
        duplicated: stats.duplicated,
        failed_completions: stats.failed_completions,
        merges: stats.merges,
        server_tickets: trace.result.server.ticket_ids().count(),
        oracle_passed: trace.oracle.passed,
        violations: trace.oracle.violations.iter().map(ToString::to_string).collect(),
    };

    match output {
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(&out)?),
        OutputMode::Text => {
            println!(
                "replay seed={} clients={} rounds={}",
                out.seed, out.clients, args.shape.rounds
            );
            println!(
                "result oracle_passed={} trace_events={} sent={} dropped={} duplicated={} failed={} merges={}",
                out.oracle_passed,
                out.trace_events,
                out.requests_sent,
                out.dropped,
                out.duplicated,
                out.failed_completions,
                out.merges
            );
            for violation in &out.violations {
                println!("violation={violation}");
            }
        }
        OutputMode::Pretty => {
            let stdout = std::io::stdout();
            let mut w = stdout.lock();
            pretty_section(&mut w, &format!("Replay Seed {}", out.seed))?;
            pretty_kv(&mut w, "Clients", out.clients.to_string())?;
            pretty_kv(&mut w, "Rounds", args.shape.rounds.to_string())?;
            pretty_kv(&mut w, "Trace", format!("{} events", out.trace_events))?;
            pretty_kv(
                &mut w,
                "Requests",
                format!(
                    "{} sent, {} lost, {} duplicated, {} failed",
                    out.requests_sent, out.dropped, out.duplicated, out.failed_completions
                ),
            )?;
            pretty_kv(&mut w, "Merges", out.merges.to_string())?;
            pretty_kv(&mut w, "Tickets", out.server_tickets.to_string())?;
            pretty_kv(&mut w, "Oracle", out.oracle_passed.to_string())?;
            if !out.violations.is_empty() {
                println!();
                pretty_section(&mut w, "Invariant Violations")?;
                for violation in &out.violations {
                    println!("- {violation}");
                }
            }
        }
    }
    if args.trace && !output.is_json() {
        println!();
        for event in &trace.result.trace {
            println!("r{:<4} {}", event.round, describe_trace(&event.kind));
        }
    }

    if !trace.oracle.passed {
        process::exit(1);
    }
    Ok(())
}

pub fn run_sim(args: &SimArgs, opts: &GlobalOpts, project_root: &Path) -> Result<()> {
    let output = output_mode(opts, project_root)?;
    match &args.command {
        SimCommand::Run(run_args) => run_sim_run(run_args, output),
        SimCommand::Replay(replay_args) => run_sim_replay(replay_args, output),
    }
}
