//! Deterministic multi-client simulation.
//!
//! Several boards share one [`MemoryServer`] through a [`SimulatedNetwork`].
//! Each round a few random user actions run on random clients, then every
//! response due that round is delivered. After the last round the network
//! is flushed and each client merges one final refresh sent without faults,
//! which is the state the oracle checks.

use std::collections::BTreeSet;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use kanban_core::{Board, BoardSettings, Fidelity, FieldRoles, Request, RequestId, TicketId};

use crate::network::{Delivery, FaultConfig, SimulatedNetwork};
use crate::rng::DeterministicRng;
use crate::server::MemoryServer;

const PRIORITIES: [&str; 5] = ["blocker", "critical", "major", "minor", "trivial"];

/// Id the server never hands out.
const MISSING_TICKET: TicketId = TicketId::new(9_999);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    /// Number of boards sharing the server.
    pub clients: usize,
    pub rounds: u64,
    /// User actions per round, spread over random clients.
    pub actions_per_round: usize,
    pub fault: FaultConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            clients: 2,
            rounds: 24,
            actions_per_round: 3,
            fault: FaultConfig::default(),
        }
    }
}

/// User action picked by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Drag,
    Select,
    EditAndSave,
    Create,
    Link,
    Unlink,
    Refresh,
}

impl Action {
    const ALL: [Self; 7] = [
        Self::Drag,
        Self::Select,
        Self::EditAndSave,
        Self::Create,
        Self::Link,
        Self::Unlink,
        Self::Refresh,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEventKind {
    /// An action ran; `request` is what it sent, if anything.
    Act {
        client: usize,
        action: Action,
        request: Option<RequestId>,
    },
    /// The board refused the action.
    Rejected {
        client: usize,
        action: Action,
        code: &'static str,
    },
    Send {
        client: usize,
        request: RequestId,
        dropped: bool,
        duplicated: bool,
        delay_rounds: u8,
    },
    Deliver {
        client: usize,
        request: RequestId,
        ok: bool,
        events: usize,
    },
    Reorder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub round: u64,
    pub kind: TraceEventKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub requests_sent: usize,
    pub dropped: usize,
    pub duplicated: usize,
    pub failed_completions: usize,
    pub merges: usize,
}

#[derive(Debug)]
pub struct SimulationResult {
    pub trace: Vec<TraceEvent>,
    pub boards: Vec<Board>,
    pub server: MemoryServer,
    /// `(client, ticket)` for every merge that downgraded a detailed ticket.
    pub detail_lost: Vec<(usize, TicketId)>,
    pub stats: SimulationStats,
}

#[derive(Debug)]
pub struct Simulator {
    config: SimulationConfig,
    rng: DeterministicRng,
    server: MemoryServer,
    network: SimulatedNetwork,
    boards: Vec<Board>,
    round: u64,
    trace: Vec<TraceEvent>,
    detail_lost: Vec<(usize, TicketId)>,
    stats: SimulationStats,
}

impl Simulator {
    /// Start from the demo board with every client loaded over a clean
    /// connection.
    ///
    /// # Errors
    ///
    /// Invalid config, or a client failed its initial load.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        if config.clients == 0 {
            bail!("clients must be > 0");
        }
        let mut server = MemoryServer::demo();
        let mut boards = Vec::with_capacity(config.clients);
        for client in 0..config.clients {
            let settings = BoardSettings::for_user(&format!("user{client}"));
            boards.push(Board::load(&mut server, FieldRoles::default(), settings)?);
        }
        Ok(Self {
            config,
            rng: DeterministicRng::new(config.seed),
            server,
            network: SimulatedNetwork::new(config.fault),
            boards,
            round: 0,
            trace: Vec::new(),
            detail_lost: Vec::new(),
            stats: SimulationStats::default(),
        })
    }

    /// Run every round, quiesce, and hand back the final state.
    ///
    /// # Errors
    ///
    /// A final refresh failed. Faults are never injected there, so this
    /// means the server itself broke.
    pub fn run(mut self) -> Result<SimulationResult> {
        info!(seed = self.config.seed, clients = self.config.clients, "simulation started");
        for round in 0..self.config.rounds {
            self.round = round;
            for _ in 0..self.config.actions_per_round {
                let client = self.rng.index(self.boards.len());
                let Some(&action) = self.rng.pick(&Action::ALL) else {
                    continue;
                };
                self.act(client, action);
            }
            let outcome = self.network.deliver_ready(round, &mut self.server, &mut self.rng);
            if outcome.reordered {
                self.record(TraceEventKind::Reorder);
            }
            self.deliver(outcome.delivered);
        }

        self.round = self.config.rounds;
        let rest = self.network.flush(&mut self.server, &mut self.rng);
        self.deliver(rest);

        for client in 0..self.boards.len() {
            let request = self.boards[client].refresh();
            let outcome = request.call.execute(&mut self.server);
            self.complete(client, request.id, outcome)?;
        }

        info!(
            seed = self.config.seed,
            sent = self.stats.requests_sent,
            dropped = self.stats.dropped,
            "simulation finished"
        );
        Ok(SimulationResult {
            trace: self.trace,
            boards: self.boards,
            server: self.server,
            detail_lost: self.detail_lost,
            stats: self.stats,
        })
    }

    fn record(&mut self, kind: TraceEventKind) {
        self.trace.push(TraceEvent {
            round: self.round,
            kind,
        });
    }

    fn act(&mut self, client: usize, action: Action) {
        match self.try_act(client, action) {
            Ok(requests) => {
                let first = requests.first().map(|r| r.id);
                self.record(TraceEventKind::Act {
                    client,
                    action,
                    request: first,
                });
                for request in requests {
                    self.send(client, request);
                }
            }
            Err(err) => {
                debug!(client, ?action, error = %err, "action rejected");
                self.record(TraceEventKind::Rejected {
                    client,
                    action,
                    code: err.code().code(),
                });
            }
        }
    }

    fn try_act(
        &mut self,
        client: usize,
        action: Action,
    ) -> Result<Vec<Request>, kanban_core::BoardError> {
        let round = self.round;
        let rng = &mut self.rng;
        let board = &mut self.boards[client];
        let on_board: Vec<TicketId> = board
            .columns()
            .flat_map(kanban_core::Column::ticket_ids)
            .collect();

        let request = match action {
            Action::Drag => {
                let Some(&ticket) = rng.pick(&on_board) else {
                    return Ok(Vec::new());
                };
                let Some(source) = board.column_of(ticket).map(|c| c.id().clone()) else {
                    return Ok(Vec::new());
                };
                let targets: Vec<_> = board.columns().map(|c| (c.id().clone(), c.len())).collect();
                let Some((target, len)) = rng.pick(&targets).cloned() else {
                    return Ok(Vec::new());
                };
                let index = rng.hit_rate_percent(50).then(|| rng.index(len + 1));
                if rng.hit_rate_percent(50) {
                    board.begin_drag(&source, ticket)?;
                    if rng.hit_rate_percent(10) {
                        board.cancel_drag()?;
                        return Ok(Vec::new());
                    }
                    board.drop_on(&target, index)?
                } else {
                    board.handle_drop_at(&source, &target, ticket, index)?
                }
            }
            Action::Select => {
                let Some(&ticket) = rng.pick(&on_board) else {
                    return Ok(Vec::new());
                };
                Some(board.select_ticket(ticket)?)
            }
            Action::EditAndSave => {
                let mut sent = Vec::new();
                if board.dialog().is_none_or(|d| d.is_draft()) {
                    let Some(&ticket) = rng.pick(&on_board) else {
                        return Ok(Vec::new());
                    };
                    sent.push(board.select_ticket(ticket)?);
                }
                if rng.hit_rate_percent(50) {
                    board.edit_dialog("summary", format!("edited by {client} in round {round}"))?;
                } else if let Some(&priority) = rng.pick(&PRIORITIES) {
                    board.edit_dialog("priority", priority)?;
                }
                if rng.hit_rate_percent(30) {
                    board.set_dialog_note(&format!("note from {client}"))?;
                }
                sent.extend(board.save_dialog_ticket()?);
                return Ok(sent);
            }
            Action::Create => {
                board.create_ticket();
                board.edit_dialog("summary", format!("created by {client} in round {round}"))?;
                Some(board.create_dialog_ticket()?)
            }
            Action::Link => {
                let known: Vec<TicketId> = self.server.ticket_ids().collect();
                let id = if rng.hit_rate_percent(10) {
                    MISSING_TICKET
                } else {
                    rng.pick(&known).copied().unwrap_or(MISSING_TICKET)
                };
                Some(board.link_ticket(id))
            }
            Action::Unlink => rng.pick(&on_board).map(|&id| board.unlink_ticket(id)),
            Action::Refresh => Some(board.refresh()),
        };
        Ok(request.into_iter().collect())
    }

    fn send(&mut self, client: usize, request: Request) {
        let id = request.id;
        let outcome = self.network.send(client, request, self.round, &mut self.rng);
        self.stats.requests_sent += 1;
        if outcome.dropped {
            self.stats.dropped += 1;
        }
        if outcome.duplicated {
            self.stats.duplicated += 1;
        }
        self.record(TraceEventKind::Send {
            client,
            request: id,
            dropped: outcome.dropped,
            duplicated: outcome.duplicated,
            delay_rounds: outcome.delay_rounds,
        });
    }

    fn deliver(&mut self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            // Transport failures are expected under faults and already logged.
            let _ = self.complete(delivery.client, delivery.request, delivery.outcome);
        }
    }

    /// Complete a request on one client, noting any detailed ticket the
    /// merge downgraded.
    fn complete(
        &mut self,
        client: usize,
        request: RequestId,
        outcome: Result<kanban_core::BoardSnapshot, crate::server::ServerError>,
    ) -> Result<()> {
        let board = &mut self.boards[client];
        let detailed: BTreeSet<TicketId> = board
            .columns()
            .flat_map(kanban_core::Column::tickets)
            .filter(|t| t.fidelity() == Fidelity::Detailed)
            .filter_map(kanban_core::Ticket::id)
            .collect();

        let result = board.complete(request, outcome);
        for id in detailed {
            if board.ticket(id).is_some_and(|t| t.fidelity() != Fidelity::Detailed) {
                self.detail_lost.push((client, id));
            }
        }

        let (ok, events) = match &result {
            Ok(report) => {
                self.stats.merges += 1;
                (true, report.events.len())
            }
            Err(_) => {
                self.stats.failed_completions += 1;
                (false, 0)
            }
        };
        self.record(TraceEventKind::Deliver {
            client,
            request,
            ok,
            events,
        });
        result.map(|_| ()).map_err(Into::into)
    }
}
