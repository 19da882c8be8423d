//! Synchronisation contract with the board server.
//!
//! [`wire`] defines payload shapes; [`client`] defines the transport trait
//! and the request values board operations emit.

pub mod client;
pub mod wire;

pub use client::{Call, Request, RequestId, SyncClient};
pub use wire::{BoardSnapshot, ColumnDiff, ColumnSnapshot, TicketDiff, TicketSnapshot};
