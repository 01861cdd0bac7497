//! Simulation clock: tick counter, in-game minutes and pause state.

use bevy_ecs::prelude::*;
use colony_events::{SimTimestamp, MINUTES_PER_HOUR};

/// A point on the clock's minute axis.
pub type Deadline = u64;

#[derive(Resource, Debug, Clone)]
pub struct SimClock {
    tick: u64,
    elapsed_minutes: u64,
    minutes_per_tick: u64,
    paused: bool,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SimClock {
    pub fn new(minutes_per_tick: u64) -> Self {
        Self {
            tick: 0,
            elapsed_minutes: 0,
            minutes_per_tick: minutes_per_tick.max(1),
            paused: false,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn elapsed_minutes(&self) -> u64 {
        self.elapsed_minutes
    }

    pub fn elapsed_hours(&self) -> u64 {
        self.elapsed_minutes / MINUTES_PER_HOUR
    }

    pub fn minutes_per_tick(&self) -> u64 {
        self.minutes_per_tick
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Advances one tick unless paused.
    pub fn advance(&mut self) {
        if self.paused {
            return;
        }
        self.tick += 1;
        self.elapsed_minutes += self.minutes_per_tick;
    }

    pub fn now(&self) -> SimTimestamp {
        SimTimestamp::from_minutes(self.tick, self.elapsed_minutes)
    }

    pub fn deadline_after(&self, minutes: u64) -> Deadline {
        self.elapsed_minutes + minutes
    }

    pub fn has_passed(&self, deadline: Deadline) -> bool {
        self.elapsed_minutes >= deadline
    }

    /// True on ticks that are a multiple of `interval`.
    pub fn every(&self, interval: u64) -> bool {
        interval > 0 && self.tick % interval == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_accumulates_minutes() {
        let mut clock = SimClock::new(5);
        for _ in 0..13 {
            clock.advance();
        }
        assert_eq!(clock.tick(), 13);
        assert_eq!(clock.elapsed_minutes(), 65);
        assert_eq!(clock.elapsed_hours(), 1);
        assert_eq!(clock.now().date.to_string(), "day_1.01:05");
    }

    #[test]
    fn test_paused_clock_does_not_move() {
        let mut clock = SimClock::new(1);
        clock.set_paused(true);
        clock.advance();
        assert_eq!(clock.tick(), 0);
        clock.set_paused(false);
        clock.advance();
        assert_eq!(clock.tick(), 1);
    }

    #[test]
    fn test_deadlines() {
        let mut clock = SimClock::new(10);
        let deadline = clock.deadline_after(25);
        clock.advance();
        clock.advance();
        assert!(!clock.has_passed(deadline));
        clock.advance();
        assert!(clock.has_passed(deadline));
    }

    #[test]
    fn test_every() {
        let mut clock = SimClock::new(1);
        clock.advance();
        assert!(!clock.every(2));
        clock.advance();
        assert!(clock.every(2));
        assert!(!clock.every(0));
    }
}
