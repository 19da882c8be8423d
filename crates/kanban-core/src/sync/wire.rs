//! Payload shapes exchanged with the board server.
//!
//! Snapshots flow server → client and carry whatever fields the server chose
//! to include (summary or detailed). Diffs flow client → server and carry
//! only the id plus dirty fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::ids::{ColumnId, TicketId};
use crate::model::value::FieldValue;

/// A ticket as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSnapshot {
    pub id: TicketId,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

/// A column as reported by the server, with its tickets in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSnapshot {
    pub id: ColumnId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wip: Option<u32>,
    pub states: Vec<String>,
    #[serde(default)]
    pub tickets: Vec<TicketSnapshot>,
}

/// Full or partial board state. Every server response has this shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub columns: Vec<ColumnSnapshot>,
}

/// `{ id, ...dirty fields }`. `id` is omitted only for tickets being created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDiff {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TicketId>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl TicketDiff {
    /// A diff with nothing but the id.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.fields.is_empty()
    }
}

/// `{ id, tickets? }` for a column whose membership changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDiff {
    pub id: ColumnId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickets: Option<Vec<TicketDiff>>,
}
