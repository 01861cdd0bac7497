//! Shared event types and serialization for the colony simulation.
//!
//! This crate contains pure data structures with no simulation logic.

pub mod event;
pub mod timestamp;

pub use timestamp::{ParseDateError, SimDate, SimTimestamp, MINUTES_PER_DAY, MINUTES_PER_HOUR};

pub use event::*;
