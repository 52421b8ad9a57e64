use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::ValidationError;
use crate::models::{Resource, TimeRange, WorkingDay, MINUTES_PER_DAY};

type Span = TimeRange<DateTime<Utc>>;

/// Spans where at least `capacity` claims overlap, built with a sweep over
/// start/end events. Ends sort before starts so touching claims never stack.
pub fn saturated_spans(claims: &[Span], capacity: u32) -> Vec<Span> {
    if claims.is_empty() || capacity == 0 {
        return Vec::new();
    }

    let mut events: Vec<(DateTime<Utc>, i32)> = Vec::with_capacity(claims.len() * 2);
    for c in claims {
        events.push((c.start, 1));
        events.push((c.end, -1));
    }
    events.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut result = Vec::new();
    let mut count: u32 = 0;
    let mut saturated_start: Option<DateTime<Utc>> = None;

    for (time, delta) in &events {
        if *delta > 0 {
            count += 1;
        } else {
            count = count.saturating_sub(1);
        }

        if count >= capacity && saturated_start.is_none() {
            saturated_start = Some(*time);
        } else if count < capacity {
            if let Some(start) = saturated_start.take() {
                if *time > start {
                    result.push(TimeRange { start, end: *time });
                }
            }
        }
    }

    result
}

/// True when `candidate` can be added without any instant exceeding capacity.
pub fn fits_capacity(existing: &[Span], candidate: &Span, capacity: u32) -> bool {
    saturated_spans(existing, capacity)
        .iter()
        .all(|s| !s.overlaps(candidate))
}

/// Checks a resource instance against the claims of blocking bookings.
/// `except_booking` is a booking being moved, whose own claims don't count.
pub fn resource_is_free(
    conn: &Connection,
    resource: &Resource,
    range: &Span,
    except_booking: Option<&str>,
) -> anyhow::Result<bool> {
    if !resource.active {
        return Ok(false);
    }
    let existing = queries::get_active_claims(conn, &resource.id, range, except_booking)?;
    Ok(fits_capacity(&existing, range, resource.capacity))
}

/// Rejects a booking that is not fully inside the day's opening hours or
/// that touches a break.
pub fn validate_booking_time(
    day: Option<&WorkingDay>,
    date: NaiveDate,
    tz: Tz,
    range: &Span,
) -> Result<(), ValidationError> {
    let hours = day.and_then(WorkingDay::hours).ok_or_else(|| {
        ValidationError::new("start", format!("the shop is closed on {date}"))
    })?;

    let start = range.start.with_timezone(&tz).naive_local();
    let end = range.end.with_timezone(&tz).naive_local();
    if start.date() != date {
        return Err(ValidationError::new("start", format!("start is not on {date}")));
    }
    let start_min = start.hour() * 60 + start.minute();
    let end_min = if end.date() == date {
        end.hour() * 60 + end.minute() + u32::from(end.second() > 0)
    } else if end.date() == date.succ_opt().unwrap_or(date) && end.time() == chrono::NaiveTime::MIN {
        MINUTES_PER_DAY
    } else {
        return Err(ValidationError::new("duration_min", "a booking cannot span several days"));
    };

    let minutes = TimeRange {
        start: start_min,
        end: end_min,
    };
    if !hours.to_minutes().contains(&minutes) {
        return Err(ValidationError::new(
            "start",
            format!("outside opening hours {}-{}", hours.start, hours.end),
        ));
    }
    if let Some(b) = day
        .into_iter()
        .flat_map(|d| d.breaks.iter())
        .find(|b| b.to_minutes().overlaps(&minutes))
    {
        return Err(ValidationError::new(
            "start",
            format!("overlaps the break {}-{}", b.start, b.end),
        ));
    }
    Ok(())
}
