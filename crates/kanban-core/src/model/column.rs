//! Column: an ordered, id-indexed set of tickets mapped to workflow states.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;

use crate::board::events::BoardEvent;
use crate::model::ids::{ColumnId, TicketId};
use crate::model::ticket::Ticket;
use crate::sync::wire::{ColumnDiff, ColumnSnapshot};

/// Dirty marker for a column whose ticket membership changed.
pub const MEMBERSHIP: &str = "tickets";

/// Tickets detached from their columns during a merge, with the column they
/// came from.
pub type TicketPool = HashMap<TicketId, (Ticket, ColumnId)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    id: ColumnId,
    name: String,
    wip: Option<u32>,
    states: Vec<String>,
    tickets: IndexMap<TicketId, Ticket>,
    dirty: BTreeSet<String>,
}

impl Column {
    /// Empty column with the given header.
    #[must_use]
    pub fn new(id: ColumnId, name: &str, wip: Option<u32>, states: Vec<String>) -> Self {
        Self {
            id,
            name: name.to_string(),
            wip,
            states,
            tickets: IndexMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Column as first seen in a server snapshot, tickets included.
    #[must_use]
    pub fn from_snapshot(data: &ColumnSnapshot) -> Self {
        let tickets = data
            .tickets
            .iter()
            .map(|t| (t.id, Ticket::from_snapshot(t)))
            .collect();
        Self {
            id: data.id.clone(),
            name: data.name.clone(),
            wip: data.wip,
            states: data.states.clone(),
            tickets,
            dirty: BTreeSet::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> &ColumnId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn wip(&self) -> Option<u32> {
        self.wip
    }

    #[must_use]
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// State given to tickets dropped here from another column.
    #[must_use]
    pub fn canonical_state(&self) -> Option<&str> {
        self.states.first().map(String::as_str)
    }

    /// `true` when the column holds more tickets than its WIP limit.
    #[must_use]
    pub fn over_wip(&self) -> bool {
        self.wip.is_some_and(|limit| {
            u32::try_from(self.tickets.len()).map_or(true, |count| count > limit)
        })
    }

    pub fn tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets.values()
    }

    pub fn ticket_ids(&self) -> impl Iterator<Item = TicketId> + '_ {
        self.tickets.keys().copied()
    }

    #[must_use]
    pub fn ticket(&self, id: TicketId) -> Option<&Ticket> {
        self.tickets.get(&id)
    }

    pub fn ticket_mut(&mut self, id: TicketId) -> Option<&mut Ticket> {
        self.tickets.get_mut(&id)
    }

    #[must_use]
    pub fn contains(&self, id: TicketId) -> bool {
        self.tickets.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Detach a ticket, keeping the order of the others.
    pub fn take(&mut self, id: TicketId) -> Option<Ticket> {
        self.tickets.shift_remove(&id)
    }

    /// Insert a ticket at `index` (clamped), or at the end.
    ///
    /// Tickets without an id (drafts) are ignored.
    pub fn insert(&mut self, ticket: Ticket, index: Option<usize>) {
        let Some(id) = ticket.id() else {
            return;
        };
        let at = index.map_or(self.tickets.len(), |i| i.min(self.tickets.len()));
        self.tickets.shift_insert(at, id, ticket);
    }

    pub fn mark_membership_changed(&mut self) {
        self.dirty.insert(MEMBERSHIP.to_string());
    }

    #[must_use]
    pub const fn dirty_fields(&self) -> &BTreeSet<String> {
        &self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// `{ id, tickets }` when membership changed, `None` otherwise.
    ///
    /// `tickets` lists only tickets with a non-trivial diff.
    #[must_use]
    pub fn to_diff(&self) -> Option<ColumnDiff> {
        if !self.dirty.contains(MEMBERSHIP) {
            return None;
        }
        let tickets = self
            .tickets
            .values()
            .map(Ticket::to_diff)
            .filter(|d| !d.is_trivial())
            .collect();
        Some(ColumnDiff {
            id: self.id.clone(),
            tickets: Some(tickets),
        })
    }

    /// Detach every ticket into `pool`, remembering this column as origin.
    pub fn drain_into(&mut self, pool: &mut TicketPool) {
        for (id, ticket) in self.tickets.drain(..) {
            pool.insert(id, (ticket, self.id.clone()));
        }
    }

    /// Rebuild membership from `data`, reusing pooled tickets by id.
    ///
    /// Existing tickets are updated in place (identity, fidelity and
    /// unrelated dirty fields survive); unknown ids are created. Name, WIP
    /// limit and states are overwritten.
    pub fn merge_from_server(
        &mut self,
        data: &ColumnSnapshot,
        pool: &mut TicketPool,
        events: &mut Vec<BoardEvent>,
    ) {
        if self.name != data.name || self.wip != data.wip || self.states != data.states {
            self.name.clone_from(&data.name);
            self.wip = data.wip;
            self.states.clone_from(&data.states);
            events.push(BoardEvent::ColumnUpdated(self.id.clone()));
        }

        let mut rebuilt = IndexMap::with_capacity(data.tickets.len());
        for snap in &data.tickets {
            if rebuilt.contains_key(&snap.id) {
                continue;
            }
            let ticket = match self.tickets.shift_remove(&snap.id) {
                Some(mut ticket) => {
                    if ticket.merge_from_server(snap) {
                        events.push(BoardEvent::TicketUpdated(snap.id));
                    }
                    ticket
                }
                None => match pool.remove(&snap.id) {
                    Some((mut ticket, from)) => {
                        let changed = ticket.merge_from_server(snap);
                        if from == self.id {
                            if changed {
                                events.push(BoardEvent::TicketUpdated(snap.id));
                            }
                        } else {
                            events.push(BoardEvent::TicketMoved {
                                id: snap.id,
                                from,
                                to: self.id.clone(),
                            });
                        }
                        ticket
                    }
                    None => {
                        events.push(BoardEvent::TicketCreated(snap.id));
                        Ticket::from_snapshot(snap)
                    }
                },
            };
            rebuilt.insert(snap.id, ticket);
        }

        // Whatever is left was not reported for this column.
        for (id, ticket) in self.tickets.drain(..) {
            pool.insert(id, (ticket, self.id.clone()));
        }
        self.tickets = rebuilt;
    }
}
