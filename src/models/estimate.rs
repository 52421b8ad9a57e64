use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    Rules,
    Learned,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub minutes: u32,
    /// Applied contributions, in the order they were added.
    pub breakdown: Vec<String>,
    pub source: EstimateSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl Estimate {
    pub fn is_degraded(&self) -> bool {
        self.source == EstimateSource::Fallback
    }
}
