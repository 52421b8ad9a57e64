use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Lift,
    Balancer,
    TireMachine,
    AlignmentBay,
    WaterStation,
    Jack,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Lift => "lift",
            ResourceType::Balancer => "balancer",
            ResourceType::TireMachine => "tire_machine",
            ResourceType::AlignmentBay => "alignment_bay",
            ResourceType::WaterStation => "water_station",
            ResourceType::Jack => "jack",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lift" => Some(ResourceType::Lift),
            "balancer" => Some(ResourceType::Balancer),
            "tire_machine" => Some(ResourceType::TireMachine),
            "alignment_bay" => Some(ResourceType::AlignmentBay),
            "water_station" => Some(ResourceType::WaterStation),
            "jack" => Some(ResourceType::Jack),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub resource_type: ResourceType,
    /// Concurrent overlapping claims this instance can hold.
    pub capacity: u32,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirement {
    pub resource_type: ResourceType,
    #[serde(default = "one")]
    pub count: u32,
}

impl ResourceRequirement {
    pub fn one(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            count: 1,
        }
    }
}

fn one() -> u32 {
    1
}
