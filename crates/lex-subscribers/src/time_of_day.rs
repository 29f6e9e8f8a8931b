use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Timelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::RegistryError;

fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // ASCII digits only; `\d` would also accept other Unicode digits.
    RE.get_or_init(|| Regex::new(r"^([0-9]{2}):([0-9]{2})$").expect("valid regex"))
}

/// A validated `HH:MM` time of day (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn parse(s: &str) -> Result<Self, RegistryError> {
        let invalid = || RegistryError::InvalidTimeFormat(s.to_string());
        let caps = pattern().captures(s).ok_or_else(invalid)?;
        let hour: u8 = caps[1].parse().map_err(|_| invalid())?;
        let minute: u8 = caps[2].parse().map_err(|_| invalid())?;
        if hour >= 24 || minute >= 60 {
            return Err(invalid());
        }
        Ok(Self { hour, minute })
    }

    /// The minute `at` falls in.
    pub fn of(at: &DateTime<Utc>) -> Self {
        Self {
            hour: at.hour() as u8,
            minute: at.minute() as u8,
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = RegistryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}
