//! Deterministic simulation for kanban-core.
//!
//! An in-memory board server, a fault-injecting network between it and any
//! number of boards, and an oracle that checks the boards converge on the
//! server's state once the network is quiet.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod campaign;
pub mod network;
pub mod oracle;
pub mod rng;
pub mod server;
pub mod simulator;

pub use campaign::{CampaignConfig, CampaignReport, replay_seed, run_campaign};
pub use network::{FaultConfig, SimulatedNetwork};
pub use server::{BoardColumn, MemoryServer, ServerError};
pub use simulator::{SimulationConfig, SimulationResult, Simulator};
