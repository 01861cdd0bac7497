//! Simulation Timestamp Types
//!
//! Simulation time as a tick counter plus a human-readable clock reading.
//!
//! # Example
//!
//! ```
//! use colony_events::{SimDate, SimTimestamp};
//!
//! let ts = SimTimestamp::from_minutes(12, 90);
//! assert_eq!(ts.tick, 12);
//! assert_eq!(ts.date.to_string(), "day_1.01:30");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Minutes in one simulated hour.
pub const MINUTES_PER_HOUR: u64 = 60;

/// Minutes in one simulated day.
pub const MINUTES_PER_DAY: u64 = 24 * MINUTES_PER_HOUR;

/// Human-readable simulation clock reading.
///
/// Serializes to strings like "day_3.14:05". Days start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimDate {
    pub day: u32,
    pub hour: u8,
    pub minute: u8,
}

impl SimDate {
    pub fn new(day: u32, hour: u8, minute: u8) -> Self {
        Self { day, hour, minute }
    }

    /// The first minute of the simulation.
    pub fn start() -> Self {
        Self::new(1, 0, 0)
    }

    /// Converts elapsed simulation minutes into a clock reading.
    pub fn from_minutes(elapsed: u64) -> Self {
        let day = (elapsed / MINUTES_PER_DAY) as u32 + 1;
        let in_day = elapsed % MINUTES_PER_DAY;
        Self {
            day,
            hour: (in_day / MINUTES_PER_HOUR) as u8,
            minute: (in_day % MINUTES_PER_HOUR) as u8,
        }
    }

    /// Total minutes elapsed since `SimDate::start()`.
    pub fn to_minutes(self) -> u64 {
        (self.day.saturating_sub(1) as u64) * MINUTES_PER_DAY
            + self.hour as u64 * MINUTES_PER_HOUR
            + self.minute as u64
    }
}

impl fmt::Display for SimDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day_{}.{:02}:{:02}", self.day, self.hour, self.minute)
    }
}

/// Error type for parsing SimDate from strings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseDateError {
    #[error("invalid date format: '{0}', expected 'day_N.HH:MM'")]
    InvalidFormat(String),
    #[error("invalid day: '{0}'")]
    InvalidDay(String),
    #[error("invalid time of day: '{0}'")]
    InvalidTime(String),
}

impl FromStr for SimDate {
    type Err = ParseDateError;

    /// Parses a SimDate from a string like "day_3.14:05".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (day_part, time_part) = s
            .split_once('.')
            .ok_or_else(|| ParseDateError::InvalidFormat(s.to_string()))?;

        let day = day_part
            .strip_prefix("day_")
            .ok_or_else(|| ParseDateError::InvalidFormat(s.to_string()))?
            .parse::<u32>()
            .map_err(|_| ParseDateError::InvalidDay(day_part.to_string()))?;
        if day == 0 {
            return Err(ParseDateError::InvalidDay(day_part.to_string()));
        }

        let (hour, minute) = time_part
            .split_once(':')
            .ok_or_else(|| ParseDateError::InvalidTime(time_part.to_string()))?;
        let hour = hour
            .parse::<u8>()
            .ok()
            .filter(|h| *h < 24)
            .ok_or_else(|| ParseDateError::InvalidTime(time_part.to_string()))?;
        let minute = minute
            .parse::<u8>()
            .ok()
            .filter(|m| *m < 60)
            .ok_or_else(|| ParseDateError::InvalidTime(time_part.to_string()))?;

        Ok(SimDate { day, hour, minute })
    }
}

// Serialized as a plain string
impl Serialize for SimDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SimDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A point in simulation time.
///
/// Contains both the monotonic tick counter and the clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimTimestamp {
    /// Monotonically increasing simulation tick.
    pub tick: u64,
    /// Human-readable clock reading.
    pub date: SimDate,
}

impl SimTimestamp {
    pub fn new(tick: u64, date: SimDate) -> Self {
        Self { tick, date }
    }

    /// Creates a timestamp for the start of the simulation.
    pub fn start() -> Self {
        Self::new(0, SimDate::start())
    }

    /// Creates a timestamp from a tick and the minutes elapsed at that tick.
    pub fn from_minutes(tick: u64, elapsed_minutes: u64) -> Self {
        Self::new(tick, SimDate::from_minutes(elapsed_minutes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_date_display() {
        assert_eq!(SimDate::new(3, 14, 5).to_string(), "day_3.14:05");
        assert_eq!(SimDate::start().to_string(), "day_1.00:00");
    }

    #[test]
    fn test_sim_date_parse() {
        let date: SimDate = "day_3.14:05".parse().unwrap();
        assert_eq!(date, SimDate::new(3, 14, 5));
    }

    #[test]
    fn test_sim_date_from_minutes_rolls_over_days() {
        assert_eq!(SimDate::from_minutes(0), SimDate::start());
        assert_eq!(SimDate::from_minutes(61), SimDate::new(1, 1, 1));
        assert_eq!(SimDate::from_minutes(MINUTES_PER_DAY), SimDate::new(2, 0, 0));
        assert_eq!(SimDate::from_minutes(MINUTES_PER_DAY * 2 + 75).to_minutes(), MINUTES_PER_DAY * 2 + 75);
    }

    #[test]
    fn test_parse_date_error() {
        assert!("invalid".parse::<SimDate>().is_err());
        assert!("day_0.10:00".parse::<SimDate>().is_err());
        assert!("day_one.10:00".parse::<SimDate>().is_err());
        assert!("day_1.24:00".parse::<SimDate>().is_err());
        assert!("day_1.10:60".parse::<SimDate>().is_err());
        assert!("day_1.1000".parse::<SimDate>().is_err());
    }

    #[test]
    fn test_sim_timestamp_serialization() {
        let ts = SimTimestamp::new(4200, SimDate::new(3, 6, 0));
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, r#"{"tick":4200,"date":"day_3.06:00"}"#);

        let parsed: SimTimestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_sim_timestamp_start() {
        let ts = SimTimestamp::start();
        assert_eq!(ts.tick, 0);
        assert_eq!(ts.date, SimDate::start());
    }
}
