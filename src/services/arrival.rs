use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{Booking, VisitMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalSettings {
    pub wait_lead_min: u32,
    pub dropoff_lead_min: u32,
    pub dropoff_margin_min: u32,
}

impl Default for ArrivalSettings {
    fn default() -> Self {
        Self {
            wait_lead_min: 10,
            dropoff_lead_min: 60,
            dropoff_margin_min: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrivalWindow {
    pub mode: VisitMode,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

/// When the customer should show up. `None` once the booking no longer
/// expects the vehicle.
pub fn recommend_arrival(
    booking: &Booking,
    mode: Option<VisitMode>,
    settings: &ArrivalSettings,
) -> Option<ArrivalWindow> {
    if !booking.status.is_blocking() || booking.started_at.is_some() {
        return None;
    }

    let mode = mode.unwrap_or(booking.visit_mode);
    let minutes = |m: u32| Duration::minutes(i64::from(m));
    let (earliest, latest) = match mode {
        VisitMode::Wait => (booking.start - minutes(settings.wait_lead_min), booking.start),
        VisitMode::Dropoff => {
            let latest = booking.start - minutes(settings.dropoff_margin_min);
            let earliest = (booking.start - minutes(settings.dropoff_lead_min)).min(latest);
            (earliest, latest)
        }
    };

    Some(ArrivalWindow {
        mode,
        earliest,
        latest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::models::{BookingStatus, Customer};

    fn booking(mode: VisitMode, status: BookingStatus) -> Booking {
        let start = Utc.with_ymd_and_hms(2030, 6, 17, 10, 0, 0).unwrap();
        Booking {
            id: "b-1".to_string(),
            org_id: "org-1".to_string(),
            service_id: "svc-1".to_string(),
            customer: Customer {
                name: "Ana".to_string(),
                phone: None,
                email: None,
            },
            start,
            end: start + Duration::minutes(45),
            duration_min: 45,
            status,
            visit_mode: mode,
            options: None,
            claims: vec![],
            cancel_reason: None,
            created_at: start,
            updated_at: start,
            cancelled_at: None,
            started_at: None,
            finished_at: None,
        }
    }

    fn hm(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 17, h, m, 0).unwrap()
    }

    #[test]
    fn test_wait_mode_window() {
        let b = booking(VisitMode::Wait, BookingStatus::Pending);
        let w = recommend_arrival(&b, None, &ArrivalSettings::default()).unwrap();
        assert_eq!(w.mode, VisitMode::Wait);
        assert_eq!((w.earliest, w.latest), (hm(9, 50), hm(10, 0)));
    }

    #[test]
    fn test_dropoff_mode_window() {
        let b = booking(VisitMode::Dropoff, BookingStatus::Pending);
        let w = recommend_arrival(&b, None, &ArrivalSettings::default()).unwrap();
        assert_eq!((w.earliest, w.latest), (hm(9, 0), hm(9, 45)));
    }

    #[test]
    fn test_mode_override() {
        let b = booking(VisitMode::Dropoff, BookingStatus::Pending);
        let w = recommend_arrival(&b, Some(VisitMode::Wait), &ArrivalSettings::default()).unwrap();
        assert_eq!(w.latest, hm(10, 0));
    }

    #[test]
    fn test_no_window_for_finished_or_cancelled() {
        for status in [BookingStatus::Cancelled, BookingStatus::Done, BookingStatus::NoShow] {
            let b = booking(VisitMode::Wait, status);
            assert!(recommend_arrival(&b, None, &ArrivalSettings::default()).is_none());
        }
    }
}
