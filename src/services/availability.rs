use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::errors::ValidationError;
use crate::models::{Booking, Buffers, Slot, TimeRange, WorkingDay, MINUTES_PER_DAY};
use crate::services::clock::{localize, SlotClock};

/// Bookable slots for `date`. Returns an empty list when the day is closed,
/// already over, or fully booked.
///
/// Bookings block their held range, buffers included. `buffers` are those of
/// the job being placed: a slot is only offered when its own buffers also
/// clear every booking, so each slot can actually be reserved.
pub fn compute_free_slots(
    date: NaiveDate,
    day: Option<&WorkingDay>,
    blocking: &[Booking],
    granularity_min: u32,
    buffers: Buffers,
    clock: &SlotClock,
) -> Result<Vec<Slot>, ValidationError> {
    if granularity_min == 0 {
        return Err(ValidationError::new(
            "granularity",
            "granularity must be a positive number of minutes",
        ));
    }

    let Some(hours) = day.and_then(WorkingDay::hours) else {
        return Ok(vec![]);
    };

    let local_now = clock.local_now();
    let not_before = match date.cmp(&local_now.date()) {
        std::cmp::Ordering::Less => return Ok(vec![]),
        std::cmp::Ordering::Equal => Some(ceil_minute_of_day(local_now)),
        std::cmp::Ordering::Greater => None,
    };

    let mut busy: Vec<TimeRange<u32>> = day
        .map(|d| d.breaks.iter().map(|b| b.to_minutes()).collect())
        .unwrap_or_default();
    busy.extend(
        blocking
            .iter()
            .filter(|b| b.status.is_blocking())
            .filter_map(|b| booking_minutes(b, date, clock))
            .map(|m| TimeRange {
                start: m.start.saturating_sub(buffers.after_min),
                end: m.end + buffers.before_min,
            }),
    );

    let slots = free_minute_slots(hours.to_minutes(), busy, granularity_min, not_before)
        .into_iter()
        .map(|r| Slot {
            start: localize(clock.tz, wall_clock(date, r.start)).fixed_offset(),
            end: localize(clock.tz, wall_clock(date, r.end)).fixed_offset(),
            duration_min: granularity_min,
        })
        .collect();
    Ok(slots)
}

/// Sweeps the busy intervals across the open hours and cuts every free gap
/// into `granularity`-sized slots aligned to multiples of the granularity.
pub fn free_minute_slots(
    hours: TimeRange<u32>,
    mut busy: Vec<TimeRange<u32>>,
    granularity: u32,
    not_before: Option<u32>,
) -> Vec<TimeRange<u32>> {
    busy.sort_by_key(|b| b.start);

    let mut cursor = hours.start.max(not_before.unwrap_or(0));
    let mut gaps = Vec::new();
    for b in &busy {
        if cursor >= hours.end {
            break;
        }
        if b.start > cursor {
            gaps.push(TimeRange {
                start: cursor,
                end: b.start.min(hours.end),
            });
        }
        cursor = cursor.max(b.end);
    }
    if hours.end > cursor {
        gaps.push(TimeRange {
            start: cursor,
            end: hours.end,
        });
    }

    let mut slots = Vec::new();
    for gap in gaps {
        let mut start = gap.start.div_ceil(granularity) * granularity;
        while start + granularity <= gap.end {
            slots.push(TimeRange {
                start,
                end: start + granularity,
            });
            start += granularity;
        }
    }
    slots
}

/// Local minutes held by a booking on `date`, clipped to the day.
fn booking_minutes(booking: &Booking, date: NaiveDate, clock: &SlotClock) -> Option<TimeRange<u32>> {
    let held = booking.held_range();
    let start = held.start.with_timezone(&clock.tz).naive_local();
    let end = held.end.with_timezone(&clock.tz).naive_local();
    if start.date() > date || end.date() < date {
        return None;
    }

    let start = if start.date() < date {
        0
    } else {
        start.hour() * 60 + start.minute()
    };
    let end = if end.date() > date {
        MINUTES_PER_DAY
    } else {
        ceil_minute_of_day(end)
    };
    TimeRange::new(start, end)
}

fn ceil_minute_of_day(t: NaiveDateTime) -> u32 {
    let minutes = t.hour() * 60 + t.minute();
    if t.second() > 0 || t.nanosecond() > 0 {
        minutes + 1
    } else {
        minutes
    }
}

fn wall_clock(date: NaiveDate, minutes: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(minutes))
}
