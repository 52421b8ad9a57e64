pub mod arrival;
pub mod availability;
pub mod calendar;
pub mod clock;
pub mod estimator;
pub mod lifecycle;
pub mod reservation;
pub mod scheduling;
pub mod working_hours;
