pub mod learned;
pub mod rules;
pub mod sessions;

pub use learned::{blend, DurationHistory, LearnedSettings, SqliteHistory};
pub use rules::RuleBook;
pub use sessions::{EstimateSessions, DEFAULT_SESSION_CAPACITY};

use crate::errors::ValidationError;
use crate::models::{Category, Estimate, EstimateSource, OptionsPayload};

pub struct EstimateRequest<'a> {
    pub service_id: &'a str,
    pub category: Category,
    pub options: &'a OptionsPayload,
    /// Service-level default used when the category has no rule table.
    pub default_minutes: Option<u32>,
}

/// Estimates a job's duration. Only validation fails; missing rules or an
/// unavailable history degrade the estimate instead.
pub async fn estimate_duration(
    rules: &RuleBook,
    history: &dyn DurationHistory,
    settings: &LearnedSettings,
    req: EstimateRequest<'_>,
) -> Result<Estimate, ValidationError> {
    let payload_category = req.options.category();
    if payload_category != req.category {
        return Err(ValidationError::new(
            "category",
            format!(
                "options are for {payload_category} but the service is {}",
                req.category
            ),
        ));
    }
    req.options.validate()?;

    let Some(table) = rules.for_category(req.category) else {
        let minutes = req.default_minutes.unwrap_or(rules.fallback_minutes);
        tracing::warn!(
            service_id = req.service_id,
            category = %req.category,
            minutes,
            "no duration rules for category, using default"
        );
        return Ok(Estimate {
            minutes,
            breakdown: vec![format!("default: {minutes}")],
            source: EstimateSource::Fallback,
            notes: vec![format!("no duration rules for {}", req.category)],
        });
    };

    let mut estimate = table.estimate(req.options)?;

    match history.samples(req.service_id, &req.options.signature()).await {
        Ok(samples) => {
            if let Some(minutes) = blend(estimate.minutes, &samples, settings) {
                estimate
                    .breakdown
                    .push(format!("learned from {} samples: {minutes}", samples.len()));
                estimate.minutes = minutes;
                estimate.source = EstimateSource::Learned;
            }
        }
        Err(e) => {
            tracing::warn!(service_id = req.service_id, error = %e, "duration history unavailable");
            estimate
                .notes
                .push("history unavailable, using rule estimate".to_string());
        }
    }

    Ok(estimate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedHistory(Vec<u32>);

    #[async_trait]
    impl DurationHistory for FixedHistory {
        async fn samples(&self, _service_id: &str, _signature: &str) -> anyhow::Result<Vec<u32>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenHistory;

    #[async_trait]
    impl DurationHistory for BrokenHistory {
        async fn samples(&self, _service_id: &str, _signature: &str) -> anyhow::Result<Vec<u32>> {
            anyhow::bail!("connection refused")
        }
    }

    fn options(json: &str) -> OptionsPayload {
        serde_json::from_str(json).unwrap()
    }

    fn request<'a>(category: Category, options: &'a OptionsPayload) -> EstimateRequest<'a> {
        EstimateRequest {
            service_id: "svc-1",
            category,
            options,
            default_minutes: None,
        }
    }

    #[tokio::test]
    async fn test_rule_estimate_without_history() {
        let rules = RuleBook::embedded().unwrap();
        let opts = options(r#"{"category":"car","wheels":2,"balancing_count":2,"alignment":true}"#);
        let est = estimate_duration(
            &rules,
            &FixedHistory(vec![]),
            &LearnedSettings::default(),
            request(Category::Car, &opts),
        )
        .await
        .unwrap();
        assert_eq!(est.minutes, 75);
        assert_eq!(est.source, EstimateSource::Rules);
    }

    #[tokio::test]
    async fn test_learned_blend_applies() {
        let rules = RuleBook::embedded().unwrap();
        let opts = options(r#"{"category":"car","wheels":4}"#);
        let settings = LearnedSettings {
            margin_pct: 0.0,
            ..LearnedSettings::default()
        };
        let est = estimate_duration(
            &rules,
            &FixedHistory(vec![40; 6]),
            &settings,
            request(Category::Car, &opts),
        )
        .await
        .unwrap();
        // 0.6 * 50 + 0.4 * 40
        assert_eq!(est.minutes, 46);
        assert_eq!(est.source, EstimateSource::Learned);
    }

    #[tokio::test]
    async fn test_history_failure_keeps_rule_estimate() {
        let rules = RuleBook::embedded().unwrap();
        let opts = options(r#"{"category":"truck","wheels":4}"#);
        let est = estimate_duration(
            &rules,
            &BrokenHistory,
            &LearnedSettings::default(),
            request(Category::Truck, &opts),
        )
        .await
        .unwrap();
        assert_eq!(est.minutes, 115);
        assert_eq!(est.notes.len(), 1);
    }

    #[tokio::test]
    async fn test_category_mismatch_is_rejected() {
        let rules = RuleBook::embedded().unwrap();
        let opts = options(r#"{"category":"car","wheels":2}"#);
        let err = estimate_duration(
            &rules,
            &FixedHistory(vec![]),
            &LearnedSettings::default(),
            request(Category::Truck, &opts),
        )
        .await
        .unwrap_err();
        assert_eq!(err.field, "category");
    }

    #[tokio::test]
    async fn test_balancing_over_wheels_is_rejected_not_clamped() {
        let rules = RuleBook::embedded().unwrap();
        let opts = options(r#"{"category":"car","wheels":2,"balancing_count":3}"#);
        let err = estimate_duration(
            &rules,
            &FixedHistory(vec![]),
            &LearnedSettings::default(),
            request(Category::Car, &opts),
        )
        .await
        .unwrap_err();
        assert_eq!(err.field, "balancing_count");
    }

    #[tokio::test]
    async fn test_missing_table_falls_back() {
        let rules = RuleBook::from_json(
            r#"{"fallback_minutes":45,"categories":{"car":{"puncture":20,"change":{"1":20}}}}"#,
        )
        .unwrap();
        let opts = options(r#"{"category":"tractor","wheels":1}"#);

        let est = estimate_duration(
            &rules,
            &FixedHistory(vec![]),
            &LearnedSettings::default(),
            request(Category::Tractor, &opts),
        )
        .await
        .unwrap();
        assert_eq!(est.minutes, 45);
        assert!(est.is_degraded());
        assert!(!est.notes.is_empty());

        let with_default = estimate_duration(
            &rules,
            &FixedHistory(vec![]),
            &LearnedSettings::default(),
            EstimateRequest {
                default_minutes: Some(90),
                ..request(Category::Tractor, &opts)
            },
        )
        .await
        .unwrap();
        assert_eq!(with_default.minutes, 90);
    }
}
