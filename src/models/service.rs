use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Vehicle class. Picks the option schema and the duration rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "car")]
    Car,
    #[serde(rename = "4x4")]
    FourByFour,
    #[serde(rename = "truck")]
    Truck,
    #[serde(rename = "tractor")]
    Tractor,
    #[serde(rename = "industrial")]
    Industrial,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Car,
        Category::FourByFour,
        Category::Truck,
        Category::Tractor,
        Category::Industrial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Car => "car",
            Category::FourByFour => "4x4",
            Category::Truck => "truck",
            Category::Tractor => "tractor",
            Category::Industrial => "industrial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    pub fn wheel_range(&self) -> RangeInclusive<u32> {
        match self {
            Category::Car | Category::FourByFour | Category::Industrial => 1..=4,
            Category::Truck => 1..=12,
            Category::Tractor => 1..=2,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub category: Category,
    pub price_cents: i64,
    #[serde(default)]
    pub buffer_before_min: u32,
    #[serde(default)]
    pub buffer_after_min: u32,
    /// Used when no rule table exists for the category.
    pub default_minutes: Option<u32>,
}

impl Service {
    pub fn buffers(&self) -> Buffers {
        Buffers {
            before_min: self.buffer_before_min,
            after_min: self.buffer_after_min,
        }
    }
}

/// Preparation and cleanup minutes a job holds its resources around the
/// booked time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Buffers {
    pub before_min: u32,
    pub after_min: u32,
}

impl Buffers {
    pub const NONE: Buffers = Buffers {
        before_min: 0,
        after_min: 0,
    };
}
