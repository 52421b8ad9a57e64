use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use crate::db::{self, queries};

/// Most recent samples considered per service and signature.
const SAMPLE_WINDOW: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnedSettings {
    pub min_samples: usize,
    /// Share of the blended figure taken from history, in `[0, 1]`.
    pub hist_weight: f64,
    pub outlier_sigma: f64,
    pub margin_pct: f64,
}

impl Default for LearnedSettings {
    fn default() -> Self {
        Self {
            min_samples: 5,
            hist_weight: 0.40,
            outlier_sigma: 2.5,
            margin_pct: 7.5,
        }
    }
}

/// Source of recorded service durations for a job signature.
#[async_trait]
pub trait DurationHistory: Send + Sync {
    async fn samples(&self, service_id: &str, signature: &str) -> anyhow::Result<Vec<u32>>;
}

pub struct SqliteHistory {
    db: Arc<Mutex<Connection>>,
}

impl SqliteHistory {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DurationHistory for SqliteHistory {
    async fn samples(&self, service_id: &str, signature: &str) -> anyhow::Result<Vec<u32>> {
        let conn = db::lock(&self.db);
        queries::get_duration_samples(&conn, service_id, signature, SAMPLE_WINDOW)
    }
}

/// Blends the rule figure with the historical mean. `None` when there are not
/// enough samples left after outlier rejection.
pub fn blend(rules_minutes: u32, samples: &[u32], settings: &LearnedSettings) -> Option<u32> {
    if samples.is_empty() || samples.len() < settings.min_samples {
        return None;
    }

    let (mean, std_dev) = mean_and_std_dev(samples);
    let kept: Vec<f64> = samples
        .iter()
        .map(|&s| f64::from(s))
        .filter(|s| std_dev == 0.0 || (s - mean).abs() <= settings.outlier_sigma * std_dev)
        .collect();
    if kept.is_empty() || kept.len() < settings.min_samples {
        return None;
    }

    let kept_mean = kept.iter().sum::<f64>() / kept.len() as f64;
    let weight = settings.hist_weight.clamp(0.0, 1.0);
    let blended = (1.0 - weight) * f64::from(rules_minutes) + weight * kept_mean;
    let with_margin = blended * (1.0 + settings.margin_pct.max(0.0) / 100.0);
    Some(with_margin.round() as u32)
}

fn mean_and_std_dev(samples: &[u32]) -> (f64, f64) {
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| f64::from(s)).sum::<f64>() / n;
    let variance = samples
        .iter()
        .map(|&s| (f64::from(s) - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}
