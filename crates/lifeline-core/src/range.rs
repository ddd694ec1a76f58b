//! Named date-range filters and their resolution to concrete instants.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::datetime::{local_date, local_midnight};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFilter {
    #[default]
    All,
    Today,
    ThisWeek,
    Last7Days,
    Last30Days,
    ThisMonth,
    ThisQuarter,
    LastMonth,
}

impl DateFilter {
    pub const ALL: [DateFilter; 8] = [
        DateFilter::All,
        DateFilter::Today,
        DateFilter::ThisWeek,
        DateFilter::Last7Days,
        DateFilter::Last30Days,
        DateFilter::ThisMonth,
        DateFilter::ThisQuarter,
        DateFilter::LastMonth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DateFilter::All => "all",
            DateFilter::Today => "today",
            DateFilter::ThisWeek => "thisWeek",
            DateFilter::Last7Days => "last7days",
            DateFilter::Last30Days => "last30days",
            DateFilter::ThisMonth => "thisMonth",
            DateFilter::ThisQuarter => "thisQuarter",
            DateFilter::LastMonth => "lastMonth",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DateFilter::All => "All time",
            DateFilter::Today => "Today",
            DateFilter::ThisWeek => "This week",
            DateFilter::Last7Days => "Last 7 days",
            DateFilter::Last30Days => "Last 30 days",
            DateFilter::ThisMonth => "This month",
            DateFilter::ThisQuarter => "This quarter",
            DateFilter::LastMonth => "Last month",
        }
    }
}

impl fmt::Display for DateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        DateFilter::ALL
            .into_iter()
            .find(|filter| filter.as_str().to_ascii_lowercase() == normalized)
            .ok_or_else(|| {
                anyhow!(
                    "unknown date range: {s} (expected one of: {})",
                    DateFilter::ALL.map(DateFilter::as_str).join(", ")
                )
            })
    }
}

/// Closed interval of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Covers whole local days `[first, last]`.
    fn days(first: NaiveDate, last: NaiveDate, tz: &Tz) -> Self {
        let after = last.checked_add_days(Days::new(1)).unwrap_or(last);
        Self {
            start: local_midnight(first, tz),
            end: end_before(after, tz),
        }
    }

    /// Covers local days from `first` up to, not including, `next`.
    fn until(first: NaiveDate, next: NaiveDate, tz: &Tz) -> Self {
        Self {
            start: local_midnight(first, tz),
            end: end_before(next, tz),
        }
    }
}

/// `None` means unconstrained.
pub type ResolvedRange = Option<DateRange>;

pub fn is_in_range(instant: DateTime<Utc>, range: &ResolvedRange) -> bool {
    range.as_ref().is_none_or(|r| r.contains(instant))
}

fn end_before(next_start: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    local_midnight(next_start, tz) - Duration::milliseconds(1)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months)).unwrap_or(date)
}

fn sub_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days)).unwrap_or(date)
}

#[tracing::instrument(level = "trace", skip_all, fields(filter = %filter))]
pub fn resolve(filter: DateFilter, now: DateTime<Utc>, tz: &Tz) -> ResolvedRange {
    let today = local_date(now, tz);

    let range = match filter {
        DateFilter::All => return None,
        DateFilter::Today => DateRange::days(today, today, tz),
        DateFilter::ThisWeek => {
            let monday = sub_days(today, u64::from(today.weekday().num_days_from_monday()));
            let sunday = monday.checked_add_days(Days::new(6)).unwrap_or(monday);
            DateRange::days(monday, sunday, tz)
        }
        DateFilter::Last7Days => DateRange::days(sub_days(today, 6), today, tz),
        DateFilter::Last30Days => DateRange::days(sub_days(today, 29), today, tz),
        DateFilter::ThisMonth => {
            let first = first_of_month(today);
            DateRange::until(first, add_months(first, 1), tz)
        }
        DateFilter::ThisQuarter => {
            let quarter_month = (today.month0() / 3) * 3 + 1;
            let first = NaiveDate::from_ymd_opt(today.year(), quarter_month, 1)
                .unwrap_or_else(|| first_of_month(today));
            DateRange::until(first, add_months(first, 3), tz)
        }
        DateFilter::LastMonth => {
            let this_first = first_of_month(today);
            let prev_first = this_first
                .checked_sub_months(Months::new(1))
                .unwrap_or(this_first);
            DateRange::until(prev_first, this_first, tz)
        }
    };

    tracing::trace!(start = %range.start, end = %range.end, "resolved date range");
    Some(range)
}
