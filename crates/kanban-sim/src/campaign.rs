//! Campaign runner for deterministic simulation campaigns.
//!
//! Executes many seeds with the same parameters, collecting pass/fail
//! results and identifying the first failing seed for replay.

use std::ops::Range;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::network::FaultConfig;
use crate::oracle::{ConvergenceOracle, OracleResult};
use crate::simulator::{SimulationConfig, SimulationResult, Simulator};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Range of seeds to execute, e.g., `0..100`.
    pub seed_range: Range<u64>,
    pub clients: usize,
    pub rounds: u64,
    pub actions_per_round: usize,
    pub fault: FaultConfig,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            seed_range: 0..100,
            clients: 3,
            rounds: 24,
            actions_per_round: 3,
            fault: FaultConfig {
                max_delay_rounds: 3,
                drop_rate_percent: 10,
                duplicate_rate_percent: 5,
                reorder_rate_percent: 10,
                fail_rate_percent: 5,
            },
        }
    }
}

impl CampaignConfig {
    #[must_use]
    pub const fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            clients: self.clients,
            rounds: self.rounds,
            actions_per_round: self.actions_per_round,
            fault: self.fault,
        }
    }

    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        if self.clients == 0 {
            bail!("clients must be > 0");
        }
        if self.rounds == 0 {
            bail!("rounds must be > 0");
        }
        let f = &self.fault;
        for (name, pct) in [
            ("drop", f.drop_rate_percent),
            ("duplicate", f.duplicate_rate_percent),
            ("reorder", f.reorder_rate_percent),
            ("fail", f.fail_rate_percent),
        ] {
            if pct > 100 {
                bail!("{name} rate must be a percentage, got {pct}");
            }
        }
        Ok(())
    }
}

/// Failure details for a single seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// First seed that failed (for prioritized replay).
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Requests sent across all seeds.
    pub requests_sent: usize,
    /// Requests lost across all seeds.
    pub requests_dropped: usize,
}

impl CampaignReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Everything one seed produced, for debugging.
#[derive(Debug)]
pub struct DetailedTrace {
    pub result: SimulationResult,
    pub oracle: OracleResult,
}

/// Run a full campaign across all seeds in the config.
///
/// # Errors
///
/// Returns an error if config validation fails or a simulation encounters
/// an internal error.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut report = CampaignReport {
        seeds_run: 0,
        seeds_passed: 0,
        first_failure: None,
        failures: Vec::new(),
        requests_sent: 0,
        requests_dropped: 0,
    };

    for seed in config.seed_range.clone() {
        let trace = run_seed(seed, config)?;
        report.seeds_run += 1;
        report.requests_sent += trace.result.stats.requests_sent;
        report.requests_dropped += trace.result.stats.dropped;

        if trace.oracle.passed {
            report.seeds_passed += 1;
        } else {
            report.first_failure.get_or_insert(seed);
            report.failures.push(SeedFailure {
                seed,
                violations: trace.oracle.violations.iter().map(ToString::to_string).collect(),
            });
        }
    }

    Ok(report)
}

/// Replay a single seed with full trace details for debugging.
///
/// # Errors
///
/// Returns an error when config validation or simulation fails.
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    config.validate()?;
    run_seed(seed, config)
}

fn run_seed(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    let result = Simulator::new(config.sim_config_for_seed(seed))?.run()?;
    let oracle = ConvergenceOracle::check_all(&result.server, &result.boards, &result.detail_lost);
    Ok(DetailedTrace { result, oracle })
}
