use std::env;
use std::str::FromStr;

use crate::services::arrival::ArrivalSettings;
use crate::services::estimator::{LearnedSettings, DEFAULT_SESSION_CAPACITY};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    /// Unset means the rule tables compiled into the binary.
    pub rules_path: Option<String>,
    pub slot_granularity_min: u32,
    pub claim_timeout_ms: u64,
    pub business_name: String,
    /// Most estimate sessions kept in memory at once.
    pub estimate_sessions_max: usize,
    pub estimator: LearnedSettings,
    pub arrival: ArrivalSettings,
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        let learned = LearnedSettings::default();
        let arrival = ArrivalSettings::default();
        Self {
            port: parsed("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "tirebay.db".to_string()),
            rules_path: env::var("RULES_PATH").ok().filter(|p| !p.is_empty()),
            slot_granularity_min: parsed("SLOT_GRANULARITY_MIN", 15),
            claim_timeout_ms: parsed("CLAIM_TIMEOUT_MS", 2000),
            business_name: env::var("BUSINESS_NAME").unwrap_or_else(|_| "Tire shop".to_string()),
            estimate_sessions_max: parsed("EST_SESSIONS_MAX", DEFAULT_SESSION_CAPACITY),
            estimator: LearnedSettings {
                min_samples: parsed("EST_MIN_SAMPLES", learned.min_samples),
                hist_weight: parsed("EST_HIST_WEIGHT", learned.hist_weight),
                outlier_sigma: parsed("EST_OUTLIER_SIGMA", learned.outlier_sigma),
                margin_pct: parsed("EST_MARGIN_PCT", learned.margin_pct),
            },
            arrival: ArrivalSettings {
                wait_lead_min: parsed("ARRIVAL_WAIT_LEAD_MIN", arrival.wait_lead_min),
                dropoff_lead_min: parsed("ARRIVAL_DROPOFF_LEAD_MIN", arrival.dropoff_lead_min),
                dropoff_margin_min: parsed("ARRIVAL_DROPOFF_MARGIN_MIN", arrival.dropoff_margin_min),
            },
        }
    }

    /// Rejects values that parse but make no sense.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.slot_granularity_min > 0, "SLOT_GRANULARITY_MIN must be positive");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.estimator.hist_weight),
            "EST_HIST_WEIGHT must be between 0 and 1"
        );
        anyhow::ensure!(self.estimator.outlier_sigma > 0.0, "EST_OUTLIER_SIGMA must be positive");
        anyhow::ensure!(self.estimate_sessions_max > 0, "EST_SESSIONS_MAX must be positive");
        Ok(())
    }
}
