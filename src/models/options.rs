use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::models::Category;

/// Job configuration, one case per category carrying only the fields that
/// category accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category")]
pub enum OptionsPayload {
    #[serde(rename = "car")]
    Car(PassengerOptions),
    #[serde(rename = "4x4")]
    FourByFour(PassengerOptions),
    #[serde(rename = "truck")]
    Truck(TruckOptions),
    #[serde(rename = "tractor")]
    Tractor(TractorOptions),
    #[serde(rename = "industrial")]
    Industrial(IndustrialOptions),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerOptions {
    #[serde(default)]
    pub puncture: bool,
    pub wheels: u32,
    #[serde(default)]
    pub balancing_count: u32,
    #[serde(default)]
    pub alignment: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruckBalancing {
    #[default]
    None,
    One,
    TwoFront,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruckOptions {
    #[serde(default)]
    pub puncture: bool,
    pub wheels: u32,
    #[serde(default)]
    pub balancing_mode: TruckBalancing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axle {
    #[default]
    Front,
    Rear,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaterFill {
    #[serde(default)]
    pub enabled: bool,
    pub liters: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TractorOptions {
    #[serde(default)]
    pub puncture: bool,
    #[serde(default = "one_wheel")]
    pub wheels: u32,
    #[serde(default)]
    pub axle: Axle,
    #[serde(default)]
    pub tube: bool,
    #[serde(default)]
    pub water_fill: WaterFill,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustrialOptions {
    #[serde(default)]
    pub puncture: bool,
    pub wheels: u32,
    #[serde(default)]
    pub axle: Axle,
    #[serde(default)]
    pub balancing_count: u32,
}

fn one_wheel() -> u32 {
    1
}

impl OptionsPayload {
    pub fn category(&self) -> Category {
        match self {
            OptionsPayload::Car(_) => Category::Car,
            OptionsPayload::FourByFour(_) => Category::FourByFour,
            OptionsPayload::Truck(_) => Category::Truck,
            OptionsPayload::Tractor(_) => Category::Tractor,
            OptionsPayload::Industrial(_) => Category::Industrial,
        }
    }

    pub fn puncture(&self) -> bool {
        match self {
            OptionsPayload::Car(o) | OptionsPayload::FourByFour(o) => o.puncture,
            OptionsPayload::Truck(o) => o.puncture,
            OptionsPayload::Tractor(o) => o.puncture,
            OptionsPayload::Industrial(o) => o.puncture,
        }
    }

    pub fn wheels(&self) -> u32 {
        match self {
            OptionsPayload::Car(o) | OptionsPayload::FourByFour(o) => o.wheels,
            OptionsPayload::Truck(o) => o.wheels,
            OptionsPayload::Tractor(o) => o.wheels,
            OptionsPayload::Industrial(o) => o.wheels,
        }
    }

    /// True when the job includes wheel balancing of any kind.
    pub fn wants_balancing(&self) -> bool {
        if self.puncture() {
            return false;
        }
        match self {
            OptionsPayload::Car(o) | OptionsPayload::FourByFour(o) => o.balancing_count > 0,
            OptionsPayload::Truck(o) => o.balancing_mode != TruckBalancing::None,
            OptionsPayload::Industrial(o) => o.balancing_count > 0,
            OptionsPayload::Tractor(_) => false,
        }
    }

    pub fn wants_alignment(&self) -> bool {
        match self {
            OptionsPayload::Car(o) | OptionsPayload::FourByFour(o) => !o.puncture && o.alignment,
            _ => false,
        }
    }

    pub fn wants_water_fill(&self) -> bool {
        match self {
            OptionsPayload::Tractor(o) => !o.puncture && o.water_fill.enabled,
            _ => false,
        }
    }

    /// Checks every bound and cross-field rule of the category.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let category = self.category();
        let range = category.wheel_range();
        let wheels = self.wheels();
        if !range.contains(&wheels) {
            return Err(ValidationError::new(
                "wheels",
                format!(
                    "{category} accepts {}..={} wheels, got {wheels}",
                    range.start(),
                    range.end()
                ),
            ));
        }

        match self {
            OptionsPayload::Car(o) | OptionsPayload::FourByFour(o) => {
                check_balancing_count(o.balancing_count, o.wheels)
            }
            OptionsPayload::Industrial(o) => check_balancing_count(o.balancing_count, o.wheels),
            OptionsPayload::Truck(o) => {
                if o.balancing_mode == TruckBalancing::TwoFront && o.wheels < 2 {
                    return Err(ValidationError::new(
                        "balancing_mode",
                        "two_front balancing needs at least 2 wheels",
                    ));
                }
                Ok(())
            }
            OptionsPayload::Tractor(o) => {
                if o.water_fill.enabled && o.water_fill.liters.unwrap_or(0) == 0 {
                    return Err(ValidationError::new(
                        "water_fill.liters",
                        "water fill needs a positive number of liters",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Canonical form used to match historical samples of the same job.
    pub fn signature(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn check_balancing_count(balancing_count: u32, wheels: u32) -> Result<(), ValidationError> {
    if balancing_count > wheels {
        return Err(ValidationError::new(
            "balancing_count",
            format!("cannot balance {balancing_count} wheels when changing {wheels}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> OptionsPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_tagged_payloads() {
        let car = parse(r#"{"category":"car","wheels":2,"balancing_count":1,"alignment":true}"#);
        assert_eq!(car.category(), Category::Car);
        assert!(car.wants_alignment());

        let offroad = parse(r#"{"category":"4x4","wheels":4}"#);
        assert_eq!(offroad.category(), Category::FourByFour);

        let truck = parse(r#"{"category":"truck","wheels":6,"balancing_mode":"two_front"}"#);
        assert!(truck.wants_balancing());

        let tractor = parse(
            r#"{"category":"tractor","axle":"rear","tube":true,"water_fill":{"enabled":true,"liters":250}}"#,
        );
        assert_eq!(tractor.wheels(), 1);
        assert!(tractor.wants_water_fill());
    }

    #[test]
    fn test_unknown_category_fails_to_parse() {
        assert!(serde_json::from_str::<OptionsPayload>(r#"{"category":"boat","wheels":1}"#).is_err());
    }

    #[test]
    fn test_truck_rejects_car_only_enum_value() {
        let res = serde_json::from_str::<OptionsPayload>(
            r#"{"category":"truck","wheels":4,"balancing_mode":"three"}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_balancing_over_wheels_rejected() {
        let car = parse(r#"{"category":"car","wheels":2,"balancing_count":3}"#);
        let err = car.validate().unwrap_err();
        assert_eq!(err.field, "balancing_count");

        let industrial = parse(r#"{"category":"industrial","wheels":1,"balancing_count":2}"#);
        assert!(industrial.validate().is_err());
    }

    #[test]
    fn test_wheel_bounds_per_category() {
        assert!(parse(r#"{"category":"car","wheels":5}"#).validate().is_err());
        assert!(parse(r#"{"category":"car","wheels":0}"#).validate().is_err());
        assert!(parse(r#"{"category":"truck","wheels":12}"#).validate().is_ok());
        assert!(parse(r#"{"category":"truck","wheels":13}"#).validate().is_err());
        assert!(parse(r#"{"category":"tractor","wheels":3}"#).validate().is_err());
    }

    #[test]
    fn test_water_fill_requires_liters() {
        let missing = parse(r#"{"category":"tractor","water_fill":{"enabled":true}}"#);
        assert_eq!(missing.validate().unwrap_err().field, "water_fill.liters");
        let zero = parse(r#"{"category":"tractor","water_fill":{"enabled":true,"liters":0}}"#);
        assert!(zero.validate().is_err());
        let disabled = parse(r#"{"category":"tractor","water_fill":{"enabled":false}}"#);
        assert!(disabled.validate().is_ok());
    }

    #[test]
    fn test_two_front_needs_two_wheels() {
        let truck = parse(r#"{"category":"truck","wheels":1,"balancing_mode":"two_front"}"#);
        assert!(truck.validate().is_err());
    }

    #[test]
    fn test_puncture_turns_extras_off() {
        let car = parse(r#"{"category":"car","puncture":true,"wheels":2,"balancing_count":2,"alignment":true}"#);
        assert!(!car.wants_balancing());
        assert!(!car.wants_alignment());
    }

    #[test]
    fn test_signature_is_stable() {
        let a = parse(r#"{"category":"car","wheels":2,"alignment":true}"#);
        let b = parse(r#"{"alignment":true,"wheels":2,"category":"car","balancing_count":0}"#);
        assert_eq!(a.signature(), b.signature());
    }
}
