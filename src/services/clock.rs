use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::errors::ValidationError;
use crate::models::TimeRange;

pub fn parse_timezone(name: &str) -> Result<Tz, ValidationError> {
    name.parse::<Tz>()
        .map_err(|_| ValidationError::new("timezone", format!("unknown timezone: {name}")))
}

/// Resolves a wall-clock time in `tz`. Ambiguous times take the earlier
/// instant; times inside a DST gap are pushed forward past it.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let before = tz
                .offset_from_utc_datetime(&(naive - Duration::days(1)))
                .fix()
                .local_minus_utc();
            tz.from_utc_datetime(&(naive - Duration::seconds(i64::from(before))))
        }
    }
}

/// UTC bounds of the local calendar day `date` in `tz`.
pub fn day_range_utc(tz: Tz, date: NaiveDate) -> TimeRange<DateTime<Utc>> {
    let midnight = date.and_time(NaiveTime::MIN);
    TimeRange {
        start: localize(tz, midnight).with_timezone(&Utc),
        end: localize(tz, midnight + Duration::days(1)).with_timezone(&Utc),
    }
}

/// Time source for slot computation, passed in so results are reproducible.
#[derive(Debug, Clone, Copy)]
pub struct SlotClock {
    pub tz: Tz,
    pub now: DateTime<Utc>,
}

impl SlotClock {
    pub fn new(tz: Tz, now: DateTime<Utc>) -> Self {
        Self { tz, now }
    }

    pub fn local_now(&self) -> NaiveDateTime {
        self.now.with_timezone(&self.tz).naive_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("Europe/Madrid").unwrap(), chrono_tz::Europe::Madrid);
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_localize_regular_time() {
        let dt = localize(chrono_tz::Europe::Madrid, naive("2025-06-16 10:00"));
        assert_eq!(dt.with_timezone(&Utc).hour(), 8);
    }

    #[test]
    fn test_localize_dst_gap_moves_forward() {
        // Clocks jump from 02:00 to 03:00 on 2025-03-30 in Madrid.
        let dt = localize(chrono_tz::Europe::Madrid, naive("2025-03-30 02:30"));
        assert_eq!(dt.naive_local(), naive("2025-03-30 03:30"));
    }

    #[test]
    fn test_day_range_on_short_day() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 30).unwrap();
        let range = day_range_utc(chrono_tz::Europe::Madrid, date);
        assert_eq!((range.end - range.start).num_hours(), 23);
        assert_eq!(range.start.hour(), 23);
    }

    #[test]
    fn test_localize_ambiguous_takes_earlier() {
        let dt = localize(chrono_tz::Europe::Madrid, naive("2025-10-26 02:30"));
        assert_eq!(dt.with_timezone(&Utc).hour(), 0);
    }
}
