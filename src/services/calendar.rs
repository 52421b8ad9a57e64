use chrono::{DateTime, Utc};

use crate::models::{Booking, BookingStatus};

const ICS_TS: &str = "%Y%m%dT%H%M%SZ";

fn ics_ts(ts: &DateTime<Utc>) -> String {
    ts.format(ICS_TS).to_string()
}

/// Commas, semicolons and backslashes are reserved in iCalendar text values.
fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

pub fn generate_ics(booking: &Booking, service_name: &str, business_name: &str) -> String {
    let uid = format!("{}@tirebay", booking.id);
    let summary = escape_text(&format!("{service_name} at {business_name}"));

    let mut description = format!("Customer: {}", booking.customer.name);
    if let Some(phone) = &booking.customer.phone {
        description.push_str(&format!("\nPhone: {phone}"));
    }
    description.push_str(&format!("\nEstimated duration: {} min", booking.duration_min));
    let description = escape_text(&description);

    let status = match booking.status {
        BookingStatus::Cancelled => "CANCELLED",
        _ => "CONFIRMED",
    };

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Tirebay//Scheduling//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         STATUS:{status}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n",
        dtstamp = ics_ts(&booking.updated_at),
        dtstart = ics_ts(&booking.start),
        dtend = ics_ts(&booking.end),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    use crate::models::{Customer, VisitMode};

    fn booking(status: BookingStatus) -> Booking {
        let start = Utc.with_ymd_and_hms(2025, 3, 15, 14, 0, 0).unwrap();
        Booking {
            id: "test-123".to_string(),
            org_id: "org-1".to_string(),
            service_id: "svc-1".to_string(),
            customer: Customer {
                name: "Alice".to_string(),
                phone: Some("+34600111222".to_string()),
                email: None,
            },
            start,
            end: start + Duration::minutes(60),
            duration_min: 60,
            status,
            visit_mode: VisitMode::Wait,
            options: None,
            claims: vec![],
            cancel_reason: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap(),
            cancelled_at: None,
            started_at: None,
            finished_at: None,
        }
    }

    #[test]
    fn test_generate_ics() {
        let ics = generate_ics(&booking(BookingStatus::Pending), "Tire change", "Talleres Sur");
        assert!(ics.contains("BEGIN:VCALENDAR"));
        assert!(ics.contains("BEGIN:VEVENT"));
        assert!(ics.contains("DTSTART:20250315T140000Z"));
        assert!(ics.contains("DTEND:20250315T150000Z"));
        assert!(ics.contains("DTSTAMP:20250310T100000Z"));
        assert!(ics.contains("SUMMARY:Tire change at Talleres Sur"));
        assert!(ics.contains("DESCRIPTION:Customer: Alice\\nPhone: +34600111222"));
        assert!(ics.contains("UID:test-123@tirebay"));
        assert!(ics.contains("STATUS:CONFIRMED"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn test_cancelled_booking() {
        let ics = generate_ics(&booking(BookingStatus::Cancelled), "Tire change", "Shop");
        assert!(ics.contains("STATUS:CANCELLED"));
    }

    #[test]
    fn test_text_is_escaped() {
        let ics = generate_ics(&booking(BookingStatus::Pending), "Change, balance", "A;B");
        assert!(ics.contains("SUMMARY:Change\\, balance at A\\;B"));
    }
}
