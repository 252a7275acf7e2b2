use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};

use super::domain::{Frequency, Schedule};

// Stored schedules may predate a field; computation falls back to Monday,
// the 1st, 09:00 rather than refusing to schedule.
const DEFAULT_DAY_OF_WEEK: u8 = 1;
const DEFAULT_DAY_OF_MONTH: u8 = 1;
const DEFAULT_HOUR: u8 = 9;

/// Next due instant strictly after `from`, or `None` for an inactive
/// schedule. Weekly cadences land on `day_of_week` (0 = Sunday) at
/// `hour:00:00`; monthly cadences on `day_of_month`, which the 28-day cap
/// keeps valid in every month.
pub fn next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let hour = schedule.hour.unwrap_or(DEFAULT_HOUR);
    match schedule.frequency {
        Frequency::None => None,
        Frequency::Weekly => Some(next_weekly(
            from,
            schedule.day_of_week.unwrap_or(DEFAULT_DAY_OF_WEEK),
            hour,
            1,
        )),
        Frequency::Biweekly => Some(next_weekly(
            from,
            schedule.day_of_week.unwrap_or(DEFAULT_DAY_OF_WEEK),
            hour,
            2,
        )),
        Frequency::Monthly => Some(next_monthly(
            from,
            schedule.day_of_month.unwrap_or(DEFAULT_DAY_OF_MONTH),
            hour,
        )),
    }
}

/// Whether a run is currently due. Inactive schedules are never due; an
/// active schedule with no recorded next run always is (first-time
/// scheduling); otherwise due once the recorded instant has arrived.
pub fn is_due(schedule: &Schedule, next_run_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    if !schedule.is_active() {
        return false;
    }
    match next_run_at {
        None => true,
        Some(at) => at <= now,
    }
}

fn at_hour(date: NaiveDate, hour: u8) -> DateTime<Utc> {
    date.and_hms_opt(u32::from(hour.min(23)), 0, 0)
        .expect("hour clamped to 0..=23")
        .and_utc()
}

fn next_weekly(from: DateTime<Utc>, day_of_week: u8, hour: u8, interval_weeks: i64) -> DateTime<Utc> {
    let mut next = at_hour(from.date_naive(), hour);
    let offset = (i64::from(day_of_week % 7)
        - i64::from(next.weekday().num_days_from_sunday())
        + 7)
        % 7;
    if offset == 0 && next <= from {
        return next + Duration::days(7 * interval_weeks);
    }
    next += Duration::days(offset);
    if next <= from {
        next += Duration::days(7 * interval_weeks);
    }
    next
}

fn next_monthly(from: DateTime<Utc>, day_of_month: u8, hour: u8) -> DateTime<Utc> {
    let day = u32::from(day_of_month.clamp(1, 28));
    let this_month = from
        .date_naive()
        .with_day(day)
        .expect("day capped to 28 exists in every month");
    let candidate = at_hour(this_month, hour);
    if candidate > from {
        return candidate;
    }
    let next_month = this_month
        .checked_add_months(Months::new(1))
        .expect("adding one month to an in-range date");
    at_hour(next_month, hour)
}
