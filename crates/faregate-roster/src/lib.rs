//! faregate-roster — Rider roster, fee status and gate audit history.
//!
//! Backs the fare check behind [`faregate_core::FeeStatusSource`] and keeps
//! the append-only record of what the gate decided.

pub mod audit;
pub mod store;

pub use audit::{AccessLogEntry, CaptureRecord};
pub use store::{RiderRecord, RosterError, RosterStore};
