//! Polling interval strings such as `"30s"`, `"2m"` or `"1h"`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
}

impl IntervalUnit {
    fn suffix(self) -> char {
        match self {
            Self::Seconds => 's',
            Self::Minutes => 'm',
            Self::Hours => 'h',
        }
    }

    fn secs(self) -> u64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 3_600,
        }
    }
}

/// A `(value, unit)` polling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntervalSpec {
    pub value: u32,
    pub unit: IntervalUnit,
}

/// Used whenever a trigger carries no interval or an unusable one.
pub const DEFAULT_INTERVAL: IntervalSpec = IntervalSpec {
    value: 2,
    unit: IntervalUnit::Minutes,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    #[error("interval is empty")]
    Empty,

    #[error("interval {0:?} has no unit suffix")]
    MissingUnit(String),

    #[error("interval {0:?} does not start with a number")]
    InvalidValue(String),

    #[error("interval {0:?} must be greater than zero")]
    Zero(String),
}

impl IntervalSpec {
    pub const fn new(value: u32, unit: IntervalUnit) -> Self {
        Self { value, unit }
    }

    pub const fn seconds(value: u32) -> Self {
        Self::new(value, IntervalUnit::Seconds)
    }

    /// Parse `<digits><unit>` strictly.
    ///
    /// The unit is the last character: `s`, `m` or `h` (case-insensitive).
    /// Any other trailing letter is read as minutes.
    pub fn try_parse(raw: &str) -> Result<Self, IntervalError> {
        let raw = raw.trim();
        let Some(last) = raw.chars().last() else {
            return Err(IntervalError::Empty);
        };
        if last.is_ascii_digit() {
            return Err(IntervalError::MissingUnit(raw.to_string()));
        }

        let digits = &raw[..raw.len() - last.len_utf8()];
        let value: u32 = digits
            .trim()
            .parse()
            .map_err(|_| IntervalError::InvalidValue(raw.to_string()))?;
        if value == 0 {
            return Err(IntervalError::Zero(raw.to_string()));
        }

        let unit = match last.to_ascii_lowercase() {
            's' => IntervalUnit::Seconds,
            'h' => IntervalUnit::Hours,
            _ => IntervalUnit::Minutes,
        };
        Ok(Self { value, unit })
    }

    /// Parse an optional interval, falling back to [`DEFAULT_INTERVAL`].
    pub fn parse(raw: Option<&str>) -> Self {
        Self::parse_or(raw, DEFAULT_INTERVAL)
    }

    /// Parse an optional interval, falling back to `fallback` when it is
    /// missing or unusable. Unusable input is logged.
    pub fn parse_or(raw: Option<&str>, fallback: IntervalSpec) -> Self {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => fallback,
            Some(s) => Self::try_parse(s).unwrap_or_else(|e| {
                warn!(interval = %s, error = %e, fallback = %fallback, "invalid interval, using fallback");
                fallback
            }),
        }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.value) * self.unit.secs())
    }
}

impl Default for IntervalSpec {
    fn default() -> Self {
        DEFAULT_INTERVAL
    }
}

impl FromStr for IntervalSpec {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse(s)
    }
}

impl fmt::Display for IntervalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}
