use std::fmt;

use chrono::{DateTime, FixedOffset, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ValidationError;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Minutes since local midnight, written as `HH:MM`. `24:00` is accepted as a
/// closing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        (minutes <= MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn hm(hour: u32, minute: u32) -> Option<Self> {
        if minute > 59 {
            return None;
        }
        Self::from_minutes(hour * 60 + minute)
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let (hour, minute) = s
            .split_once(':')
            .ok_or_else(|| ValidationError::new("time", format!("invalid time format: {s}")))?;
        let hour: u32 = hour
            .parse()
            .map_err(|_| ValidationError::new("time", format!("invalid hour in: {s}")))?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| ValidationError::new("time", format!("invalid minute in: {s}")))?;
        if hour > 24 || minute > 59 || (hour == 24 && minute != 0) {
            return Err(ValidationError::new("time", format!("time out of range: {s}")));
        }
        Ok(Self(hour * 60 + minute))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TimeOfDay::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Half-open range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange<T = TimeOfDay> {
    pub start: T,
    pub end: T,
}

impl<T: Ord + Copy> TimeRange<T> {
    pub fn new(start: T, end: T) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// The overlap predicate used throughout scheduling.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl TimeRange<TimeOfDay> {
    pub fn to_minutes(self) -> TimeRange<u32> {
        TimeRange {
            start: self.start.minutes(),
            end: self.end.minutes(),
        }
    }
}

/// Opening hours and breaks for one weekday. `open`/`close` absent means closed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkingDay {
    pub open: Option<TimeOfDay>,
    pub close: Option<TimeOfDay>,
    #[serde(default)]
    pub breaks: Vec<TimeRange>,
}

impl WorkingDay {
    pub fn closed() -> Self {
        Self::default()
    }

    pub fn hours(&self) -> Option<TimeRange> {
        match (self.open, self.close) {
            (Some(open), Some(close)) => TimeRange::new(open, close),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.hours().is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let hours = match (self.open, self.close) {
            (None, None) => {
                if !self.breaks.is_empty() {
                    return Err(ValidationError::new("breaks", "a closed day cannot have breaks"));
                }
                return Ok(());
            }
            (Some(open), Some(close)) => TimeRange::new(open, close).ok_or_else(|| {
                ValidationError::new("close", format!("close {close} must be after open {open}"))
            })?,
            _ => {
                return Err(ValidationError::new(
                    "open",
                    "open and close must both be set or both be empty",
                ))
            }
        };

        let mut previous_end: Option<TimeOfDay> = None;
        for b in &self.breaks {
            if b.start >= b.end {
                return Err(ValidationError::new(
                    "breaks",
                    format!("break {}-{} is empty", b.start, b.end),
                ));
            }
            if !hours.contains(b) {
                return Err(ValidationError::new(
                    "breaks",
                    format!("break {}-{} lies outside {}-{}", b.start, b.end, hours.start, hours.end),
                ));
            }
            if let Some(end) = previous_end {
                if b.start < end {
                    return Err(ValidationError::new(
                        "breaks",
                        format!("break starting {} overlaps or precedes the previous break", b.start),
                    ));
                }
            }
            previous_end = Some(b.end);
        }
        Ok(())
    }
}

/// A bookable window handed back to clients, in the organization's local offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub duration_min: u32,
}

pub fn parse_weekday(s: &str) -> Result<Weekday, ValidationError> {
    match s.to_lowercase().as_str() {
        "mon" => Ok(Weekday::Mon),
        "tue" => Ok(Weekday::Tue),
        "wed" => Ok(Weekday::Wed),
        "thu" => Ok(Weekday::Thu),
        "fri" => Ok(Weekday::Fri),
        "sat" => Ok(Weekday::Sat),
        "sun" => Ok(Weekday::Sun),
        _ => Err(ValidationError::new("day", format!("invalid weekday: {s}"))),
    }
}
