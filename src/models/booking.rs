use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{OptionsPayload, TimeRange};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub org_id: String,
    pub service_id: String,
    pub customer: Customer,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_min: u32,
    pub status: BookingStatus,
    pub visit_mode: VisitMode,
    pub options: Option<OptionsPayload>,
    pub claims: Vec<ResourceClaim>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn range(&self) -> TimeRange<DateTime<Utc>> {
        TimeRange {
            start: self.start,
            end: self.end,
        }
    }

    /// Time the booking keeps the shop busy: its own range widened by the
    /// buffers recorded on its claims.
    pub fn held_range(&self) -> TimeRange<DateTime<Utc>> {
        self.claims.iter().fold(self.range(), |acc, c| TimeRange {
            start: acc.start.min(c.range.start),
            end: acc.end.max(c.range.end),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// A booking's hold on one resource instance, buffers included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceClaim {
    pub resource_id: String,
    pub range: TimeRange<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    InService,
    Done,
    NoShow,
    Cancelled,
}

impl BookingStatus {
    pub const BLOCKING: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::InService];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::InService => "in_service",
            BookingStatus::Done => "done",
            BookingStatus::NoShow => "no_show",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Stored `confirmed` rows from older data count as pending.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" | "confirmed" => Some(BookingStatus::Pending),
            "in_service" => Some(BookingStatus::InService),
            "done" => Some(BookingStatus::Done),
            "no_show" => Some(BookingStatus::NoShow),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Still occupies time and resources.
    pub fn is_blocking(&self) -> bool {
        Self::BLOCKING.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_blocking()
    }

    pub fn can_transition_to(&self, target: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, target),
            (Pending, InService)
                | (InService, Done)
                | (Pending, NoShow)
                | (InService, NoShow)
                | (Pending, Cancelled)
                | (InService, Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitMode {
    #[default]
    Wait,
    Dropoff,
}

impl VisitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitMode::Wait => "wait",
            VisitMode::Dropoff => "dropoff",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "dropoff" => VisitMode::Dropoff,
            _ => VisitMode::Wait,
        }
    }
}
