//! 5-field cron expression parsing and forward-occurrence search.
//!
//! Fields are `minute hour day-of-month month day-of-week`, evaluated in
//! UTC. Day-of-month and day-of-week are ANDed, not ORed as classic Unix
//! cron does when both are restricted — both must hold for a candidate
//! minute to match.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use gosuto_core::CronError;

/// The maximum number of candidate minutes `next` will search before giving
/// up. A little over a year at one-minute resolution.
const SEARCH_HORIZON_MINUTES: i64 = 366 * 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expr.trim().split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::WrongFieldCount(fields.len()));
        }

        Ok(CronSchedule {
            minutes: parse_field(fields[0], 0, 59)?,
            hours: parse_field(fields[1], 0, 23)?,
            days_of_month: parse_field(fields[2], 1, 31)?,
            months: parse_field(fields[3], 1, 12)?,
            days_of_week: parse_field(fields[4], 0, 6)?,
        })
    }

    fn matches(&self, dt: &DateTime<Utc>) -> bool {
        self.minutes.contains(&dt.minute())
            && self.hours.contains(&dt.hour())
            && self.days_of_month.contains(&dt.day())
            && self.months.contains(&dt.month())
            && self.days_of_week.contains(&dt.weekday().num_days_from_sunday())
    }

    /// The next instant strictly after `now` that matches this schedule.
    /// Always advances at least one minute; returns `None` if nothing
    /// matches within the search horizon (only possible for a schedule
    /// built from an impossible combination, e.g. Feb 30).
    pub fn next(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, CronError> {
        let mut candidate = now
            .with_second(0)
            .and_then(|d| d.with_nanosecond(0))
            .unwrap_or(now)
            + Duration::minutes(1);

        for _ in 0..SEARCH_HORIZON_MINUTES {
            if self.matches(&candidate) {
                return Ok(candidate);
            }
            candidate += Duration::minutes(1);
        }

        Err(CronError::NoMatch)
    }
}

fn parse_field(field: &str, min: u32, max: u32) -> Result<Vec<u32>, CronError> {
    let mut values = Vec::new();

    for part in field.split(',') {
        let part = part.trim();

        if part.contains('/') {
            let pieces: Vec<&str> = part.splitn(2, '/').collect();
            let step: u32 = pieces[1].parse().map_err(|_| CronError::InvalidNumber {
                field: "step".into(),
                value: pieces[1].to_string(),
            })?;
            if step == 0 {
                return Err(CronError::ZeroStep);
            }
            let (start, end) = if pieces[0] == "*" {
                (min, max)
            } else if pieces[0].contains('-') {
                parse_range(pieces[0], min, max)?
            } else {
                let s: u32 = pieces[0].parse().map_err(|_| CronError::InvalidNumber {
                    field: "step-start".into(),
                    value: pieces[0].to_string(),
                })?;
                if s < min || s > max {
                    return Err(CronError::OutOfRange { value: s, min, max });
                }
                (s, max)
            };
            // A step spanning the whole field's width or more yields at most
            // one usable value and is rejected rather than silently collapsed.
            if step > end.saturating_sub(start) {
                return Err(CronError::StepTooLarge { step, start, end });
            }
            let mut v = start;
            while v <= end {
                values.push(v);
                v += step;
            }
        } else if part.contains('-') {
            let (start, end) = parse_range(part, min, max)?;
            values.extend(start..=end);
        } else if part == "*" {
            values.extend(min..=max);
        } else {
            let v: u32 = part.parse().map_err(|_| CronError::InvalidNumber {
                field: "value".into(),
                value: part.to_string(),
            })?;
            if v < min || v > max {
                return Err(CronError::OutOfRange { value: v, min, max });
            }
            values.push(v);
        }
    }

    values.sort_unstable();
    values.dedup();
    if values.is_empty() {
        return Err(CronError::EmptyField);
    }
    Ok(values)
}

fn parse_range(s: &str, min: u32, max: u32) -> Result<(u32, u32), CronError> {
    let pieces: Vec<&str> = s.splitn(2, '-').collect();
    let start: u32 = pieces[0].parse().map_err(|_| CronError::InvalidNumber {
        field: "range-start".into(),
        value: pieces[0].to_string(),
    })?;
    let end: u32 = pieces[1].parse().map_err(|_| CronError::InvalidNumber {
        field: "range-end".into(),
        value: pieces[1].to_string(),
    })?;
    if start < min || end > max || start > end {
        return Err(CronError::InvalidRange { start, end, min, max });
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn every_minute() {
        let schedule = CronSchedule::parse("* * * * *").unwrap();
        assert_eq!(schedule.minutes.len(), 60);
        assert_eq!(schedule.hours.len(), 24);
    }

    #[test]
    fn weekday_at_specific_time() {
        let schedule = CronSchedule::parse("30 9 * * 1-5").unwrap();
        assert_eq!(schedule.minutes, vec![30]);
        assert_eq!(schedule.hours, vec![9]);
        assert_eq!(schedule.days_of_week, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn step_syntax() {
        let schedule = CronSchedule::parse("*/15 * * * *").unwrap();
        assert_eq!(schedule.minutes, vec![0, 15, 30, 45]);
    }

    #[test]
    fn list_syntax() {
        let schedule = CronSchedule::parse("0,30 * * * *").unwrap();
        assert_eq!(schedule.minutes, vec![0, 30]);
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(matches!(
            CronSchedule::parse("* * *"),
            Err(CronError::WrongFieldCount(3))
        ));
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(matches!(
            CronSchedule::parse("70 * * * *"),
            Err(CronError::OutOfRange { value: 70, .. })
        ));
    }

    #[test]
    fn rejects_zero_step() {
        assert!(matches!(
            CronSchedule::parse("*/0 * * * *"),
            Err(CronError::ZeroStep)
        ));
    }

    #[test]
    fn day_of_month_and_day_of_week_are_anded() {
        // 13th AND Friday — should only match when both hold.
        let schedule = CronSchedule::parse("0 0 13 * 5").unwrap();
        let friday_13th = NaiveDate::from_ymd_opt(2026, 2, 13).unwrap().and_hms_opt(0, 0, 0).unwrap().and_utc();
        assert_eq!(friday_13th.weekday().num_days_from_sunday(), 5);
        assert!(schedule.matches(&friday_13th));

        let friday_not_13th = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap().and_hms_opt(0, 0, 0).unwrap().and_utc();
        assert!(!schedule.matches(&friday_not_13th));
    }

    #[test]
    fn next_never_returns_the_same_instant() {
        let schedule = CronSchedule::parse("* * * * *").unwrap();
        let now = Utc::now();
        let next = schedule.next(now).unwrap();
        assert!(next > now);
    }

    #[test]
    fn next_finds_quarter_hour_boundary() {
        let schedule = CronSchedule::parse("*/15 * * * *").unwrap();
        let start = NaiveDate::from_ymd_opt(2026, 1, 15)
            .unwrap()
            .and_hms_opt(10, 7, 0)
            .unwrap()
            .and_utc();
        let next = schedule.next(start).unwrap();
        let expected = NaiveDate::from_ymd_opt(2026, 1, 15)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap()
            .and_utc();
        assert_eq!(next, expected);
    }

    #[test]
    fn next_crosses_day_boundary() {
        let schedule = CronSchedule::parse("0 9 * * *").unwrap();
        let start = NaiveDate::from_ymd_opt(2026, 1, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            .and_utc();
        let next = schedule.next(start).unwrap();
        let expected = NaiveDate::from_ymd_opt(2026, 1, 16)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            .and_utc();
        assert_eq!(next, expected);
    }

    #[test]
    fn boundary_fields_accepted() {
        assert!(CronSchedule::parse("0 0 1 1 0").is_ok());
        assert!(CronSchedule::parse("59 23 31 12 6").is_ok());
    }

    #[test]
    fn step_sixty_minutes_is_rejected() {
        assert!(matches!(
            CronSchedule::parse("*/60 * * * *"),
            Err(CronError::StepTooLarge { step: 60, .. })
        ));
    }

    #[test]
    fn step_start_out_of_range_is_rejected() {
        assert!(matches!(
            CronSchedule::parse("70/5 * * * *"),
            Err(CronError::OutOfRange { value: 70, .. })
        ));
    }
}
