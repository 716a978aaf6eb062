//! Cron expression parsing and evaluation
//!
//! Expressions have six whitespace-separated fields:
//!
//! ```text
//! second minute hour day-of-month month day-of-week
//!  0-59   0-59  0-23     1-31     1-12     0-6
//! ```
//!
//! Each field accepts `*`, `N`, `N-M`, `N/S`, `*/S`, `N-M/S` and
//! comma-separated lists of those. Day-of-week counts from Monday
//! (`0` = Monday, `6` = Sunday). All times are UTC.
//!
//! Day-of-month and day-of-week are both required to match. Classic cron
//! fires when *either* matches if both are restricted; this does not.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use std::fmt;
use std::str::FromStr;

use super::types::{Result, SchedulerError};

/// Longest stretch searched for a match. A full Gregorian cycle, so any
/// satisfiable month/day/weekday combination is found within it.
const SEARCH_HORIZON_YEARS: i32 = 400;

/// The six positions of a cron expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronFieldKind {
    /// 0-59
    Second,
    /// 0-59
    Minute,
    /// 0-23
    Hour,
    /// 1-31
    DayOfMonth,
    /// 1-12
    Month,
    /// 0-6, Monday = 0
    DayOfWeek,
}

impl CronFieldKind {
    /// Fields in expression order
    pub const ALL: [CronFieldKind; 6] = [
        Self::Second,
        Self::Minute,
        Self::Hour,
        Self::DayOfMonth,
        Self::Month,
        Self::DayOfWeek,
    ];

    /// Field name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::DayOfMonth => "day-of-month",
            Self::Month => "month",
            Self::DayOfWeek => "day-of-week",
        }
    }

    /// Inclusive value bounds
    pub fn bounds(self) -> (u32, u32) {
        match self {
            Self::Second | Self::Minute => (0, 59),
            Self::Hour => (0, 23),
            Self::DayOfMonth => (1, 31),
            Self::Month => (1, 12),
            Self::DayOfWeek => (0, 6),
        }
    }
}

/// The set of values one cron field allows, sorted and deduplicated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronFieldSet {
    allowed: Vec<u32>,
    min: u32,
    max: u32,
}

impl CronFieldSet {
    /// Parse a field string against `[min, max]`
    pub fn parse(field: &str, min: u32, max: u32) -> Result<Self> {
        Self::parse_named(field, min, max, "field")
    }

    fn parse_named(field: &str, min: u32, max: u32, name: &'static str) -> Result<Self> {
        let mut allowed = Vec::new();
        for term in field.split(',') {
            parse_term(term, min, max, &mut allowed)
                .map_err(|message| SchedulerError::cron_syntax(name, field, message))?;
        }
        allowed.sort_unstable();
        allowed.dedup();
        Ok(Self { allowed, min, max })
    }

    /// Allowed values in ascending order
    pub fn values(&self) -> &[u32] {
        &self.allowed
    }

    /// Lower bound
    pub fn min(&self) -> u32 {
        self.min
    }

    /// Upper bound
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Whether `value` is allowed
    pub fn contains(&self, value: u32) -> bool {
        self.allowed.binary_search(&value).is_ok()
    }

    /// Whether every value in the bounds is allowed
    pub fn is_wildcard(&self) -> bool {
        self.allowed.len() as u64 == u64::from(self.max - self.min) + 1
    }

    /// Smallest allowed value `>= floor`
    pub fn first_at_or_after(&self, floor: u32) -> Option<u32> {
        self.iter_from(floor).next()
    }

    /// Allowed values `>= floor`, ascending. Exhausting the iterator is the
    /// caller's cue to carry into the next larger unit.
    pub fn iter_from(&self, floor: u32) -> impl Iterator<Item = u32> + '_ {
        let start = self.allowed.partition_point(|&v| v < floor);
        self.allowed[start..].iter().copied()
    }
}

fn parse_term(
    term: &str,
    min: u32,
    max: u32,
    out: &mut Vec<u32>,
) -> std::result::Result<(), String> {
    if term.is_empty() {
        return Err("empty list element".to_string());
    }

    let (range, step) = match term.split_once('/') {
        Some((range, step)) => {
            let step = parse_number(step)?;
            if step == 0 {
                return Err(format!("step must be positive in '{}'", term));
            }
            (range, Some(step))
        }
        None => (term, None),
    };

    let (start, end) = if range == "*" {
        (min, max)
    } else if let Some((a, b)) = range.split_once('-') {
        let (a, b) = (parse_number(a)?, parse_number(b)?);
        if a > b {
            return Err(format!("range start {} is after end {}", a, b));
        }
        (a, b)
    } else {
        let a = parse_number(range)?;
        match step {
            Some(_) => (a, max),
            None => (a, a),
        }
    };

    if start < min || end > max || start > end {
        return Err(format!("'{}' is outside {}-{}", term, min, max));
    }

    let step = step.unwrap_or(1) as usize;
    out.extend((start..=end).step_by(step));
    Ok(())
}

fn parse_number(text: &str) -> std::result::Result<u32, String> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{}' is not a number", text));
    }
    text.parse()
        .map_err(|_| format!("'{}' is out of range", text))
}

/// A parsed six-field cron expression bounded by a validity window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    second: CronFieldSet,
    minute: CronFieldSet,
    hour: CronFieldSet,
    day: CronFieldSet,
    month: CronFieldSet,
    weekday: CronFieldSet,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
}

impl CronSchedule {
    /// Parse `expression`, producing matches only inside
    /// `[valid_from, valid_until]`
    ///
    /// # Examples
    ///
    /// - `0 * * * * *` - every minute on the minute
    /// - `0 30 9 * * 0-4` - 09:30 Monday to Friday
    /// - `*/10 * * * * *` - every ten seconds
    pub fn parse(
        expression: &str,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Result<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != CronFieldKind::ALL.len() {
            return Err(SchedulerError::cron_syntax(
                "expression",
                expression,
                format!(
                    "expected 6 fields (second minute hour day month weekday), found {}",
                    parts.len()
                ),
            ));
        }
        if valid_from > valid_until {
            return Err(SchedulerError::InvalidWindow {
                start: valid_from,
                end: valid_until,
            });
        }

        let field = |idx: usize| {
            let kind = CronFieldKind::ALL[idx];
            let (min, max) = kind.bounds();
            CronFieldSet::parse_named(parts[idx], min, max, kind.name())
        };

        Ok(Self {
            expression: parts.join(" "),
            second: field(0)?,
            minute: field(1)?,
            hour: field(2)?,
            day: field(3)?,
            month: field(4)?,
            weekday: field(5)?,
            valid_from,
            valid_until,
        })
    }

    /// Replace the validity window
    pub fn with_window(
        mut self,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Result<Self> {
        if valid_from > valid_until {
            return Err(SchedulerError::InvalidWindow {
                start: valid_from,
                end: valid_until,
            });
        }
        self.valid_from = valid_from;
        self.valid_until = valid_until;
        Ok(self)
    }

    /// The normalized expression text
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Start of the validity window
    pub fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    /// End of the validity window
    pub fn valid_until(&self) -> DateTime<Utc> {
        self.valid_until
    }

    /// Allowed values of one field
    pub fn field(&self, kind: CronFieldKind) -> &CronFieldSet {
        match kind {
            CronFieldKind::Second => &self.second,
            CronFieldKind::Minute => &self.minute,
            CronFieldKind::Hour => &self.hour,
            CronFieldKind::DayOfMonth => &self.day,
            CronFieldKind::Month => &self.month,
            CronFieldKind::DayOfWeek => &self.weekday,
        }
    }

    /// Whether `time` satisfies every field (sub-second part ignored)
    pub fn matches(&self, time: &DateTime<Utc>) -> bool {
        self.second.contains(time.second())
            && self.minute.contains(time.minute())
            && self.hour.contains(time.hour())
            && self.day.contains(time.day())
            && self.month.contains(time.month())
            && self.weekday.contains(time.weekday().num_days_from_monday())
    }

    /// First match strictly after `after`
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        let next = after
            .with_nanosecond(0)?
            .checked_add_signed(Duration::seconds(1))?;
        self.next_at_or_after(&next)
    }

    /// First match at or after `from`, or `None` once the window or the
    /// search horizon is exhausted
    pub fn next_at_or_after(&self, from: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut reference = ceil_to_second(*from)?;
        if reference < self.valid_from {
            reference = ceil_to_second(self.valid_from)?;
        }
        if reference > self.valid_until {
            return None;
        }

        let ref_date = reference.date_naive();
        let first_year = ref_date.year();
        let last_year = first_year
            .saturating_add(SEARCH_HORIZON_YEARS)
            .min(self.valid_until.year());

        for year in first_year..=last_year {
            let month_floor = if year == first_year { ref_date.month() } else { 1 };
            for month in self.month.iter_from(month_floor) {
                let day_floor = if year == first_year && month == ref_date.month() {
                    ref_date.day()
                } else {
                    1
                };
                for day in self.day.iter_from(day_floor) {
                    // Feb 30 and friends
                    let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
                        continue;
                    };
                    if !self.weekday.contains(date.weekday().num_days_from_monday()) {
                        continue;
                    }
                    let time_floor = if date == ref_date {
                        reference.time()
                    } else {
                        NaiveTime::MIN
                    };
                    if let Some(time) = self.first_time_at_or_after(time_floor) {
                        let candidate = date.and_time(time).and_utc();
                        return (candidate <= self.valid_until).then_some(candidate);
                    }
                }
            }
        }
        None
    }

    /// Lazy sequence of matches starting at `from` (inclusive)
    pub fn iter_from(&self, from: DateTime<Utc>) -> CronIter<'_> {
        CronIter {
            schedule: self,
            next: self.next_at_or_after(&from),
        }
    }

    /// Earliest time of day `>= floor` that satisfies the hour, minute and
    /// second fields. Smaller units restart from their minimum whenever a
    /// larger unit moves past its floor.
    fn first_time_at_or_after(&self, floor: NaiveTime) -> Option<NaiveTime> {
        let (h0, m0, s0) = (floor.hour(), floor.minute(), floor.second());
        for hour in self.hour.iter_from(h0) {
            let minute_floor = if hour == h0 { m0 } else { 0 };
            for minute in self.minute.iter_from(minute_floor) {
                let second_floor = if hour == h0 && minute == m0 { s0 } else { 0 };
                if let Some(second) = self.second.first_at_or_after(second_floor) {
                    return NaiveTime::from_hms_opt(hour, minute, second);
                }
            }
        }
        None
    }
}

fn ceil_to_second(time: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let truncated = time.with_nanosecond(0)?;
    if truncated == time {
        Some(time)
    } else {
        truncated.checked_add_signed(Duration::seconds(1))
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl FromStr for CronSchedule {
    type Err = SchedulerError;

    /// Parse with an unbounded validity window
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
    }
}

/// Iterator over successive matches of a [`CronSchedule`]
#[derive(Debug, Clone)]
pub struct CronIter<'a> {
    schedule: &'a CronSchedule,
    next: Option<DateTime<Utc>>,
}

impl Iterator for CronIter<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.schedule.next_after(&current);
        Some(current)
    }
}
