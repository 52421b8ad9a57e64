pub mod availability;
pub mod booking;
pub mod estimate;
pub mod options;
pub mod resource;
pub mod service;

pub use availability::{parse_weekday, Slot, TimeOfDay, TimeRange, WorkingDay, MINUTES_PER_DAY};
pub use booking::{Booking, BookingStatus, Customer, ResourceClaim, VisitMode};
pub use estimate::{Estimate, EstimateSource};
pub use options::{
    Axle, IndustrialOptions, OptionsPayload, PassengerOptions, TractorOptions, TruckBalancing,
    TruckOptions, WaterFill,
};
pub use resource::{Resource, ResourceRequirement, ResourceType};
pub use service::{Buffers, Category, Service};
