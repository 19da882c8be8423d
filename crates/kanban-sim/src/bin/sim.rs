#![forbid(unsafe_code)]

use anyhow::{Result, bail};
use kanban_sim::{CampaignConfig, run_campaign};

fn main() -> Result<()> {
    let config = CampaignConfig::default();
    let report = run_campaign(&config)?;

    println!(
        "campaign complete: seeds={} passed={} requests={} dropped={}",
        report.seeds_run, report.seeds_passed, report.requests_sent, report.requests_dropped
    );

    if let Some(seed) = report.first_failure {
        for failure in &report.failures {
            for violation in &failure.violations {
                println!("seed {}: {violation}", failure.seed);
            }
        }
        bail!("seed {seed} failed; replay it with kanban_sim::replay_seed");
    }
    Ok(())
}
