//! Event Log
//!
//! Append-only event history with an optional JSONL file behind it.

use bevy_ecs::prelude::*;
use colony_events::{ActorSnapshot, Event, EventKind, SimTimestamp};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::warn;

use super::NotificationSink;

/// Resource collecting events and writing them to a JSONL file
#[derive(Resource)]
pub struct EventLog {
    writer: Option<BufWriter<File>>,
    retained: Vec<Event>,
    retain: bool,
    event_count: u64,
    next_event_id: u64,
}

impl EventLog {
    /// Create a log writing to the specified path
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            retained: Vec::new(),
            retain: false,
            event_count: 0,
            next_event_id: 1,
        })
    }

    /// Create a log that keeps nothing
    pub fn null() -> Self {
        Self {
            writer: None,
            retained: Vec::new(),
            retain: false,
            event_count: 0,
            next_event_id: 1,
        }
    }

    /// Create a log that keeps events in memory
    pub fn in_memory() -> Self {
        let mut log = Self::null();
        log.retain = true;
        log
    }

    /// Generate the next event ID
    pub fn next_id(&mut self) -> String {
        let id = format!("evt_{:08}", self.next_event_id);
        self.next_event_id += 1;
        id
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Events kept in memory, oldest first
    pub fn events(&self) -> &[Event] {
        &self.retained
    }

    pub fn log(&mut self, event: Event) -> std::io::Result<()> {
        self.event_count += 1;
        if let Some(ref mut writer) = self.writer {
            let json = serde_json::to_string(&event)?;
            writeln!(writer, "{}", json)?;
        }
        if self.retain {
            self.retained.push(event);
        }
        Ok(())
    }

    /// Flush the buffer to disk
    pub fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

impl NotificationSink for EventLog {
    fn notify(&mut self, at: SimTimestamp, actor: Option<ActorSnapshot>, kind: EventKind) {
        let mut event = Event::new(self.next_id(), at, kind);
        event.actor = actor;
        if let Err(err) = self.log(event) {
            warn!(%err, "failed to write event");
        }
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            warn!(%err, "failed to flush event log");
        }
    }
}
