use serde::{Deserialize, Serialize};

use kanban_core::{BoardSnapshot, Request, RequestId};

use crate::rng::DeterministicRng;
use crate::server::{MemoryServer, ServerError};

/// Fault injection configuration for simulated request delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Maximum delivery delay in rounds.
    pub max_delay_rounds: u8,
    /// Percentage of requests lost; the client sees a failure.
    pub drop_rate_percent: u8,
    /// Percentage of requests delivered twice.
    pub duplicate_rate_percent: u8,
    /// Percentage chance of reversing the ready batch at each tick.
    pub reorder_rate_percent: u8,
    /// Percentage of delivered requests the server refuses.
    pub fail_rate_percent: u8,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            max_delay_rounds: 2,
            drop_rate_percent: 5,
            duplicate_rate_percent: 3,
            reorder_rate_percent: 10,
            fail_rate_percent: 3,
        }
    }
}

impl FaultConfig {
    /// Immediate, lossless, in-order delivery.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_delay_rounds: 0,
            drop_rate_percent: 0,
            duplicate_rate_percent: 0,
            reorder_rate_percent: 0,
            fail_rate_percent: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    deliver_at_round: u64,
    client: usize,
    request: Request,
    lost: bool,
}

/// Result of a send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    pub dropped: bool,
    pub duplicated: bool,
    /// Delay assigned to the primary copy.
    pub delay_rounds: u8,
}

/// A response on its way back to the client that sent the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub client: usize,
    pub request: RequestId,
    pub outcome: Result<BoardSnapshot, ServerError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverOutcome {
    pub delivered: Vec<Delivery>,
    /// Whether the ready batch was reversed.
    pub reordered: bool,
}

/// Deterministic fault-injecting transport between board clients and one
/// [`MemoryServer`]. Requests reach the server when they are delivered, so
/// the server sees them in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedNetwork {
    pending: Vec<InFlight>,
    fault: FaultConfig,
}

impl SimulatedNetwork {
    #[must_use]
    pub const fn new(fault: FaultConfig) -> Self {
        Self {
            pending: Vec::new(),
            fault,
        }
    }

    #[must_use]
    pub const fn fault_config(&self) -> FaultConfig {
        self.fault
    }

    /// Number of requests still in flight.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Queue `request` from `client` with fault injection.
    ///
    /// A dropped request still produces a delivery, a failed one, so the
    /// client learns about the loss the way a timeout would tell it.
    pub fn send(
        &mut self,
        client: usize,
        request: Request,
        round: u64,
        rng: &mut DeterministicRng,
    ) -> SendOutcome {
        let delay_bound = u64::from(self.fault.max_delay_rounds).saturating_add(1);
        let delay =
            u8::try_from(rng.next_bounded(delay_bound)).unwrap_or(self.fault.max_delay_rounds);
        let deliver_at_round = round.saturating_add(u64::from(delay));

        if rng.hit_rate_percent(self.fault.drop_rate_percent) {
            self.pending.push(InFlight {
                deliver_at_round,
                client,
                request,
                lost: true,
            });
            return SendOutcome {
                dropped: true,
                duplicated: false,
                delay_rounds: delay,
            };
        }

        let duplicated = rng.hit_rate_percent(self.fault.duplicate_rate_percent);
        if duplicated {
            self.pending.push(InFlight {
                deliver_at_round,
                client,
                request: request.clone(),
                lost: false,
            });
        }
        self.pending.push(InFlight {
            deliver_at_round,
            client,
            request,
            lost: false,
        });

        SendOutcome {
            dropped: false,
            duplicated,
            delay_rounds: delay,
        }
    }

    /// Run every request due by `round` against `server`.
    pub fn deliver_ready(
        &mut self,
        round: u64,
        server: &mut MemoryServer,
        rng: &mut DeterministicRng,
    ) -> DeliverOutcome {
        let (mut ready, future): (Vec<InFlight>, Vec<InFlight>) = self
            .pending
            .drain(..)
            .partition(|m| m.deliver_at_round <= round);
        self.pending = future;

        let reordered = ready.len() > 1 && rng.hit_rate_percent(self.fault.reorder_rate_percent);
        if reordered {
            ready.reverse();
        }

        let delivered = ready
            .into_iter()
            .map(|message| self.execute(message, server, rng))
            .collect();
        DeliverOutcome {
            delivered,
            reordered,
        }
    }

    /// Deliver everything still in flight, regardless of its due round.
    pub fn flush(
        &mut self,
        server: &mut MemoryServer,
        rng: &mut DeterministicRng,
    ) -> Vec<Delivery> {
        self.deliver_ready(u64::MAX, server, rng).delivered
    }

    fn execute(
        &self,
        message: InFlight,
        server: &mut MemoryServer,
        rng: &mut DeterministicRng,
    ) -> Delivery {
        let outcome = if message.lost {
            Err(ServerError::Dropped)
        } else if rng.hit_rate_percent(self.fault.fail_rate_percent) {
            Err(ServerError::Unavailable)
        } else {
            message.request.call.execute(server)
        };
        Delivery {
            client: message.client,
            request: message.request.id,
            outcome,
        }
    }
}
