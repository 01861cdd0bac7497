//! Notifications
//!
//! Fire-and-forget sink the simulation reports through, and the JSONL
//! event log that backs it.

mod log;

pub use log::EventLog;

use colony_events::{ActorSnapshot, EventKind, SimTimestamp};

/// Receiver of simulation notifications. Implementations must not fail the
/// caller; delivery problems are theirs to report.
pub trait NotificationSink {
    fn notify(&mut self, at: SimTimestamp, actor: Option<ActorSnapshot>, kind: EventKind);
}

/// Sink that keeps every payload, for assertions.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub(crate) struct RecordingSink {
    pub kinds: Vec<EventKind>,
}

#[cfg(test)]
impl NotificationSink for RecordingSink {
    fn notify(&mut self, _at: SimTimestamp, _actor: Option<ActorSnapshot>, kind: EventKind) {
        self.kinds.push(kind);
    }
}
