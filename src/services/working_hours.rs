use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::queries::{self, WorkingHoursLayer};
use crate::errors::{BookingError, ValidationError};
use crate::models::{parse_weekday, WorkingDay};

/// Hours in effect for `date`, or `None` when the shop is closed that day.
pub fn resolve_working_day(
    conn: &Connection,
    org_id: &str,
    date: NaiveDate,
) -> anyhow::Result<Option<WorkingDay>> {
    let weekday = date.weekday().num_days_from_monday();
    let day = queries::find_working_hours(conn, org_id, weekday, &date)?;
    Ok(day.filter(|d| !d.is_closed()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetWorkingHours {
    pub effective_from: NaiveDate,
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
    pub items: Vec<WorkingHoursItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkingHoursItem {
    /// `mon`..`sun`
    pub day: String,
    #[serde(flatten)]
    pub hours: WorkingDay,
}

/// Layers a new dated set of hours over the existing calendar. Returns the
/// number of weekdays written.
pub fn set_working_hours(
    conn: &Connection,
    org_id: &str,
    req: &SetWorkingHours,
) -> Result<usize, BookingError> {
    if let Some(to) = req.effective_to {
        if to < req.effective_from {
            return Err(ValidationError::new(
                "effective_to",
                format!("{to} is before effective_from {}", req.effective_from),
            )
            .into());
        }
    }
    if req.items.is_empty() {
        return Err(ValidationError::new("items", "at least one weekday is required").into());
    }

    let mut seen = HashSet::new();
    let mut layers = Vec::with_capacity(req.items.len());
    for item in &req.items {
        let weekday = parse_weekday(&item.day)?;
        if !seen.insert(weekday) {
            return Err(ValidationError::new("day", format!("{} listed twice", item.day)).into());
        }
        item.hours.validate()?;
        layers.push(WorkingHoursLayer {
            weekday: weekday.num_days_from_monday(),
            day: &item.hours,
            effective_from: req.effective_from,
            effective_to: req.effective_to,
        });
    }

    if queries::get_org_timezone(conn, org_id)?.is_none() {
        return Err(BookingError::NotFound(format!("organization {org_id}")));
    }

    let tx = conn.unchecked_transaction()?;
    for layer in &layers {
        queries::insert_working_hours(&tx, org_id, layer)?;
    }
    tx.commit()?;

    tracing::info!(
        org_id,
        effective_from = %req.effective_from,
        days = layers.len(),
        "working hours updated"
    );
    Ok(layers.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::TimeOfDay;

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::save_org(&conn, "org-1", "Talleres Sur", "Europe/Madrid").unwrap();
        conn
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn request(json: &str) -> SetWorkingHours {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_resolve_without_entries_is_closed() {
        let conn = setup_db();
        assert!(resolve_working_day(&conn, "org-1", date("2025-06-16")).unwrap().is_none());
    }

    #[test]
    fn test_set_and_resolve() {
        let conn = setup_db();
        let req = request(
            r#"{"effective_from":"2025-01-01","items":[
                {"day":"mon","open":"09:00","close":"18:00","breaks":[{"start":"13:00","end":"14:00"}]},
                {"day":"sun"}
            ]}"#,
        );
        assert_eq!(set_working_hours(&conn, "org-1", &req).unwrap(), 2);

        // 2025-06-16 is a Monday.
        let monday = resolve_working_day(&conn, "org-1", date("2025-06-16")).unwrap().unwrap();
        assert_eq!(monday.open, Some(TimeOfDay::hm(9, 0).unwrap()));
        assert_eq!(monday.breaks.len(), 1);

        let sunday = resolve_working_day(&conn, "org-1", date("2025-06-15")).unwrap();
        assert!(sunday.is_none());
    }

    #[test]
    fn test_dated_override_expires() {
        let conn = setup_db();
        set_working_hours(
            &conn,
            "org-1",
            &request(r#"{"effective_from":"2025-01-01","items":[{"day":"mon","open":"09:00","close":"18:00"}]}"#),
        )
        .unwrap();
        set_working_hours(
            &conn,
            "org-1",
            &request(
                r#"{"effective_from":"2025-08-01","effective_to":"2025-08-31","items":[{"day":"mon"}]}"#,
            ),
        )
        .unwrap();

        assert!(resolve_working_day(&conn, "org-1", date("2025-08-04")).unwrap().is_none());
        assert!(resolve_working_day(&conn, "org-1", date("2025-09-01")).unwrap().is_some());
    }

    #[test]
    fn test_rejects_invalid_items() {
        let conn = setup_db();
        let inverted = request(
            r#"{"effective_from":"2025-01-01","items":[{"day":"mon","open":"18:00","close":"09:00"}]}"#,
        );
        assert!(matches!(
            set_working_hours(&conn, "org-1", &inverted),
            Err(BookingError::Validation(_))
        ));

        let twice = request(
            r#"{"effective_from":"2025-01-01","items":[
                {"day":"mon","open":"09:00","close":"18:00"},
                {"day":"Mon","open":"10:00","close":"18:00"}
            ]}"#,
        );
        assert!(set_working_hours(&conn, "org-1", &twice).is_err());

        let backwards = request(
            r#"{"effective_from":"2025-02-01","effective_to":"2025-01-01","items":[{"day":"mon"}]}"#,
        );
        let err = set_working_hours(&conn, "org-1", &backwards).unwrap_err();
        assert!(matches!(err, BookingError::Validation(e) if e.field == "effective_to"));
    }

    #[test]
    fn test_unknown_org() {
        let conn = setup_db();
        let req = request(r#"{"effective_from":"2025-01-01","items":[{"day":"mon"}]}"#);
        assert!(matches!(
            set_working_hours(&conn, "nope", &req),
            Err(BookingError::NotFound(_))
        ));
    }
}
