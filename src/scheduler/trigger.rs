//! Structured recurrence rules for reminders.
//!
//! A [`Trigger`] describes when a reminder fires in civil time. It is always
//! evaluated against an explicit [`FixedOffset`], never the host time zone.

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Days scanned ahead when looking for the next firing. Long enough for a
/// day-of-month rule of 31 to find a matching month.
const SEARCH_HORIZON_DAYS: u64 = 400;

/// Wall-clock time of day (minute precision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeOfDay {
    /// Hour (0-23).
    pub hour: u8,
    /// Minute (0-59).
    pub min: u8,
}

impl TimeOfDay {
    #[must_use]
    pub const fn new(hour: u8, min: u8) -> Self {
        Self { hour, min }
    }

    fn naive(self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.min), 0)
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.min)
    }
}

/// When a reminder fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Every listed time on every listed weekday.
    FixedDailyTimes {
        weekdays: Vec<Weekday>,
        times: Vec<TimeOfDay>,
    },
    /// Once a week.
    Weekly { weekday: Weekday, time: TimeOfDay },
    /// Once a month on a fixed day. Months shorter than `day` are skipped.
    Monthly { day: u8, time: TimeOfDay },
}

impl Trigger {
    /// Check field ranges.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        let check_time = |t: &TimeOfDay| {
            if t.naive().is_none() {
                Err(format!("invalid time {t}"))
            } else {
                Ok(())
            }
        };
        match self {
            Self::FixedDailyTimes { weekdays, times } => {
                if weekdays.is_empty() {
                    return Err("no weekdays".to_owned());
                }
                if times.is_empty() {
                    return Err("no times".to_owned());
                }
                times.iter().try_for_each(check_time)
            }
            Self::Weekly { time, .. } => check_time(time),
            Self::Monthly { day, time } => {
                if !(1..=31).contains(day) {
                    return Err(format!("day of month {day} out of range"));
                }
                check_time(time)
            }
        }
    }

    fn matches(&self, date: NaiveDate) -> bool {
        match self {
            Self::FixedDailyTimes { weekdays, .. } => weekdays.contains(&date.weekday()),
            Self::Weekly { weekday, .. } => date.weekday() == *weekday,
            Self::Monthly { day, .. } => date.day() == u32::from(*day),
        }
    }

    fn times(&self) -> Vec<TimeOfDay> {
        let mut times = match self {
            Self::FixedDailyTimes { times, .. } => times.clone(),
            Self::Weekly { time, .. } | Self::Monthly { time, .. } => vec![*time],
        };
        times.sort();
        times
    }

    /// First firing strictly after `after`, in UTC.
    ///
    /// Returns `None` for a trigger that fails [`Self::validate`].
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
        if self.validate().is_err() {
            return None;
        }
        let times = self.times();
        let start = after.with_timezone(&offset).date_naive();

        for ahead in 0..SEARCH_HORIZON_DAYS {
            let date = start.checked_add_days(Days::new(ahead))?;
            if !self.matches(date) {
                continue;
            }
            for time in &times {
                let local = date.and_time(time.naive()?);
                let Some(candidate) = offset.from_local_datetime(&local).single() else {
                    continue;
                };
                let candidate = candidate.with_timezone(&Utc);
                if candidate > after {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let join = |times: &[TimeOfDay]| {
            times
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            Self::FixedDailyTimes { weekdays, times } => {
                let days = weekdays
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{days} at {}", join(times))
            }
            Self::Weekly { weekday, time } => write!(f, "every {weekday} at {time}"),
            Self::Monthly { day, time } => write!(f, "day {day} of each month at {time}"),
        }
    }
}
