use std::collections::{BTreeMap, HashMap};

use anyhow::Context;
use serde::Deserialize;

use crate::errors::ValidationError;
use crate::models::{Axle, Category, Estimate, EstimateSource, OptionsPayload, TruckBalancing};

static DEFAULT_RULES: &str = include_str!("../../../rules/default.json");

/// Per-category duration tables, loaded once and shared read-only.
#[derive(Debug, Clone)]
pub struct RuleBook {
    categories: HashMap<Category, CategoryRules>,
    /// Minutes used when a category has no table and the service sets no default.
    pub fallback_minutes: u32,
}

#[derive(Deserialize)]
struct RawRuleBook {
    fallback_minutes: u32,
    categories: HashMap<String, CategoryRules>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRules {
    pub puncture: u32,
    /// Minutes keyed by wheel count.
    pub change: BTreeMap<u32, u32>,
    #[serde(default)]
    pub balancing: BTreeMap<u32, u32>,
    #[serde(default)]
    pub truck_balancing: Option<TruckBalancingRules>,
    #[serde(default)]
    pub alignment: Option<u32>,
    #[serde(default)]
    pub axle: Option<AxleRules>,
    #[serde(default)]
    pub tube: Option<u32>,
    #[serde(default)]
    pub water_fill: Option<WaterFillRules>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TruckBalancingRules {
    pub one: u32,
    pub two_front: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AxleRules {
    pub front: u32,
    pub rear: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WaterFillRules {
    pub base: u32,
    /// Charged per started 100 liters.
    pub per_100_liters: u32,
}

impl RuleBook {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let raw: RawRuleBook = serde_json::from_str(json).context("invalid rules document")?;
        let mut categories = HashMap::new();
        for (name, rules) in raw.categories {
            let category = Category::parse(&name)
                .with_context(|| format!("unknown category in rules: {name}"))?;
            anyhow::ensure!(!rules.change.is_empty(), "empty change table for {name}");
            categories.insert(category, rules);
        }
        Ok(Self {
            categories,
            fallback_minutes: raw.fallback_minutes,
        })
    }

    pub fn embedded() -> anyhow::Result<Self> {
        Self::from_json(DEFAULT_RULES)
    }

    /// Reads the rules file at `path`, or the embedded defaults when unset.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read rules file: {path}"))?;
                Self::from_json(&json)
            }
            None => Self::embedded(),
        }
    }

    pub fn for_category(&self, category: Category) -> Option<&CategoryRules> {
        self.categories.get(&category)
    }
}

impl CategoryRules {
    /// Rule-table estimate for an already validated payload.
    pub fn estimate(&self, options: &OptionsPayload) -> Result<Estimate, ValidationError> {
        let mut breakdown = Vec::new();

        if options.puncture() {
            breakdown.push(format!("puncture repair: {}", self.puncture));
            return Ok(Estimate {
                minutes: self.puncture,
                breakdown,
                source: EstimateSource::Rules,
                notes: vec![],
            });
        }

        let wheels = options.wheels();
        let change = *self.change.get(&wheels).ok_or_else(|| {
            ValidationError::new(
                "wheels",
                format!("no change time defined for {wheels} wheels"),
            )
        })?;
        let mut minutes = change;
        breakdown.push(format!("change {wheels} wheels: {change}"));

        match options {
            OptionsPayload::Car(o) | OptionsPayload::FourByFour(o) => {
                minutes += self.balancing_for(o.balancing_count, &mut breakdown)?;
                if o.alignment {
                    let add = self.alignment.unwrap_or(0);
                    breakdown.push(format!("alignment: {add}"));
                    minutes += add;
                }
            }
            OptionsPayload::Truck(o) => {
                let rules = self.truck_balancing;
                let add = match (o.balancing_mode, rules) {
                    (TruckBalancing::None, _) | (_, None) => None,
                    (TruckBalancing::One, Some(r)) => Some(("one", r.one)),
                    (TruckBalancing::TwoFront, Some(r)) => Some(("two_front", r.two_front)),
                };
                if let Some((mode, add)) = add {
                    breakdown.push(format!("balancing {mode}: {add}"));
                    minutes += add;
                }
            }
            OptionsPayload::Tractor(o) => {
                minutes += self.axle_for(o.axle, &mut breakdown);
                if o.tube {
                    let add = self.tube.unwrap_or(0);
                    breakdown.push(format!("tube: {add}"));
                    minutes += add;
                }
                if o.water_fill.enabled {
                    let liters = o.water_fill.liters.unwrap_or(0);
                    if let Some(rules) = self.water_fill {
                        let add = rules.base + rules.per_100_liters * liters.div_ceil(100);
                        breakdown.push(format!("water fill {liters} l: {add}"));
                        minutes += add;
                    }
                }
            }
            OptionsPayload::Industrial(o) => {
                minutes += self.axle_for(o.axle, &mut breakdown);
                minutes += self.balancing_for(o.balancing_count, &mut breakdown)?;
            }
        }

        Ok(Estimate {
            minutes,
            breakdown,
            source: EstimateSource::Rules,
            notes: vec![],
        })
    }

    fn balancing_for(&self, count: u32, breakdown: &mut Vec<String>) -> Result<u32, ValidationError> {
        if count == 0 {
            return Ok(0);
        }
        let add = *self.balancing.get(&count).ok_or_else(|| {
            ValidationError::new(
                "balancing_count",
                format!("no balancing time defined for {count} wheels"),
            )
        })?;
        breakdown.push(format!("balancing {count}: {add}"));
        Ok(add)
    }

    fn axle_for(&self, axle: Axle, breakdown: &mut Vec<String>) -> u32 {
        let Some(rules) = self.axle else {
            return 0;
        };
        let (name, add) = match axle {
            Axle::Front => ("front", rules.front),
            Axle::Rear => ("rear", rules.rear),
        };
        if add > 0 {
            breakdown.push(format!("axle {name}: {add}"));
        }
        add
    }
}
