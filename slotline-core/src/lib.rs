//! # slotline-core
//!
//! The appointment coordination kernel for clinic scheduling.
//! Provides the open/booked lifecycle state machine, race-safe slot claims
//! expressed as single conditional writes, and pluggable storage.

pub mod client;
pub mod coordinator;
pub mod error;
pub mod infrastructure;
#[path = "infrastructure_in_memory.rs"]
pub mod infrastructure_in_memory;
#[cfg(feature = "sqlite")]
#[path = "infrastructure_sqlite.rs"]
pub mod infrastructure_sqlite;
pub mod lifecycle;
pub mod network;
pub mod seed;
pub mod types;

pub use error::SlotError;

#[cfg(test)]
mod client_test;
