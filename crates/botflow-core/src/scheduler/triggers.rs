//! Scheduler triggers - firing policies for scheduled tasks
//!
//! Supports three trigger kinds:
//! - Once: single execution at a specific time
//! - Interval: repeating at a fixed period
//! - Cron: time-based scheduling using six-field cron expressions
//!   (daily and weekly triggers are cron triggers built from typed times)
//!
//! Every trigger walks the same lifecycle:
//!
//! ```text
//! Ready --first_fire_time--> Running --next_fire_time--> Running
//!   |                           |
//!   +------(nothing left)-------+----------------------> Completed
//! ```

use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::cron::CronSchedule;
use super::types::{Result, SchedulerError};

/// Shortest accepted interval period, in microseconds
const MIN_INTERVAL_MICROS: i64 = 1_000;

/// Trigger lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    /// No fire time computed yet
    Ready,
    /// Holds a valid current fire time
    Running,
    /// No further fire times
    Completed,
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Running => write!(f, "Running"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

/// Firing policy of a trigger
#[derive(Debug, Clone)]
pub enum TriggerKind {
    /// Fires exactly once
    Once {
        /// Fire time
        at: DateTime<Utc>,
    },
    /// Fires every `period`, starting at the window start
    Interval {
        /// Period, whole microseconds
        period: Duration,
    },
    /// Fires on every match of a cron schedule
    Cron(Box<CronSchedule>),
}

/// A firing policy plus its lifecycle state
#[derive(Debug, Clone)]
pub struct Trigger {
    kind: TriggerKind,
    state: TriggerState,
    current_fire_time: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    skip_overdue: bool,
}

impl Trigger {
    fn with_kind(kind: TriggerKind, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> Self {
        Self {
            kind,
            state: TriggerState::Ready,
            current_fire_time: window_start,
            window_start,
            window_end,
            skip_overdue: false,
        }
    }

    /// Fire once at `at`
    pub fn once(at: DateTime<Utc>) -> Self {
        Self::with_kind(TriggerKind::Once { at }, at, DateTime::<Utc>::MAX_UTC)
    }

    /// Fire every `period`, first at `start`
    pub fn interval(period: std::time::Duration, start: DateTime<Utc>) -> Result<Self> {
        let micros = i64::try_from(period.as_micros())
            .map_err(|_| SchedulerError::InvalidInterval(format!("{:?} is too long", period)))?;
        if micros < MIN_INTERVAL_MICROS {
            return Err(SchedulerError::InvalidInterval(format!(
                "period must be at least 1ms, got {:?}",
                period
            )));
        }
        let period = Duration::microseconds(micros);
        Ok(Self::with_kind(
            TriggerKind::Interval { period },
            start,
            DateTime::<Utc>::MAX_UTC,
        ))
    }

    /// Fire every `seconds` (fractional allowed), first at `start`
    pub fn interval_secs(seconds: f64, start: DateTime<Utc>) -> Result<Self> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(SchedulerError::InvalidInterval(format!(
                "period must be a positive number of seconds, got {}",
                seconds
            )));
        }
        let period = std::time::Duration::try_from_secs_f64(seconds)
            .map_err(|e| SchedulerError::InvalidInterval(e.to_string()))?;
        Self::interval(period, start)
    }

    /// Fire every `period`, starting now
    pub fn every(period: std::time::Duration) -> Result<Self> {
        Self::interval(period, Utc::now())
    }

    /// Fire on a cron expression, searching from `start`
    pub fn cron(expression: &str, start: DateTime<Utc>) -> Result<Self> {
        let schedule = CronSchedule::parse(expression, start, DateTime::<Utc>::MAX_UTC)?;
        Ok(Self::from_schedule(schedule, start))
    }

    /// Fire on a parsed schedule, searching from `start`.
    ///
    /// The trigger window is the schedule's validity window clamped to begin
    /// no earlier than `start`, so an unbounded schedule does not replay the
    /// distant past.
    pub fn from_schedule(schedule: CronSchedule, start: DateTime<Utc>) -> Self {
        let end = schedule.valid_until();
        let start = schedule.valid_from().max(start);
        Self::with_kind(TriggerKind::Cron(Box::new(schedule)), start, end)
    }

    /// Fire every day at `at` (UTC, whole seconds)
    pub fn daily(at: NaiveTime, start: DateTime<Utc>) -> Result<Self> {
        let expression = format!("{} {} {} * * *", at.second(), at.minute(), at.hour());
        Self::cron(&expression, start)
    }

    /// Fire every week on `weekday` at `at` (UTC, whole seconds)
    pub fn weekly(weekday: Weekday, at: NaiveTime, start: DateTime<Utc>) -> Result<Self> {
        let expression = format!(
            "{} {} {} * * {}",
            at.second(),
            at.minute(),
            at.hour(),
            weekday.num_days_from_monday()
        );
        Self::cron(&expression, start)
    }

    /// Stop producing fire times after `end` (inclusive)
    pub fn until(mut self, end: DateTime<Utc>) -> Result<Self> {
        if end < self.window_start {
            return Err(SchedulerError::InvalidWindow {
                start: self.window_start,
                end,
            });
        }
        if let TriggerKind::Cron(schedule) = &mut self.kind {
            let windowed = schedule.as_ref().clone().with_window(self.window_start, end)?;
            *schedule = Box::new(windowed);
        }
        self.window_end = end;
        Ok(self)
    }

    /// Skip fire times that are already in the past instead of catching up
    pub fn skip_overdue(mut self, skip: bool) -> Self {
        self.skip_overdue = skip;
        self
    }

    /// Firing policy
    pub fn kind(&self) -> &TriggerKind {
        &self.kind
    }

    /// Lifecycle state
    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Current fire time; far future once completed
    pub fn current_fire_time(&self) -> DateTime<Utc> {
        self.current_fire_time
    }

    /// Window start
    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    /// Window end (inclusive)
    pub fn window_end(&self) -> DateTime<Utc> {
        self.window_end
    }

    /// Whether past fire times are skipped
    pub fn skips_overdue(&self) -> bool {
        self.skip_overdue
    }

    /// Whether the trigger can fire more than once
    pub fn is_recurring(&self) -> bool {
        !matches!(self.kind, TriggerKind::Once { .. })
    }

    /// Whether the trigger is exhausted
    pub fn is_completed(&self) -> bool {
        self.state == TriggerState::Completed
    }

    /// Order by current fire time
    pub fn fire_order(&self, other: &Trigger) -> Ordering {
        self.current_fire_time.cmp(&other.current_fire_time)
    }

    /// Compute the first fire time and leave `Ready`.
    ///
    /// Once running this returns the current fire time unchanged; once
    /// completed it returns `None`.
    pub fn first_fire_time(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.state {
            TriggerState::Ready => {}
            TriggerState::Running => return Some(self.current_fire_time),
            TriggerState::Completed => return None,
        }

        let candidate = match &self.kind {
            TriggerKind::Once { at } => (!(self.skip_overdue && *at < now)).then_some(*at),
            TriggerKind::Interval { period } => {
                if self.skip_overdue {
                    align_forward(self.window_start, *period, now)
                } else {
                    Some(self.window_start)
                }
            }
            TriggerKind::Cron(schedule) => {
                let from = if self.skip_overdue {
                    self.window_start.max(now)
                } else {
                    self.window_start
                };
                schedule.next_at_or_after(&from)
            }
        };
        self.settle(candidate)
    }

    /// Advance to the next fire time. Calling this while `Ready` computes
    /// the first one.
    pub fn next_fire_time(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.state {
            TriggerState::Ready => return self.first_fire_time(now),
            TriggerState::Running => {}
            TriggerState::Completed => return None,
        }

        let current = self.current_fire_time;
        let candidate = match &self.kind {
            TriggerKind::Once { .. } => None,
            TriggerKind::Interval { period } => {
                let next = current.checked_add_signed(*period);
                match next {
                    Some(next) if self.skip_overdue && next < now => {
                        align_forward(next, *period, now)
                    }
                    other => other,
                }
            }
            TriggerKind::Cron(schedule) => match schedule.next_after(&current) {
                Some(next) if self.skip_overdue && next < now => schedule.next_at_or_after(&now),
                other => other,
            },
        };
        self.settle(candidate)
    }

    fn settle(&mut self, candidate: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        match candidate {
            Some(at) if at >= self.window_start && at <= self.window_end => {
                self.state = TriggerState::Running;
                self.current_fire_time = at;
                Some(at)
            }
            _ => {
                self.state = TriggerState::Completed;
                self.current_fire_time = DateTime::<Utc>::MAX_UTC;
                None
            }
        }
    }
}

/// Smallest `start + k * period` (k >= 0) that is not before `now`
fn align_forward(
    start: DateTime<Utc>,
    period: Duration,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if now <= start {
        return Some(start);
    }
    let elapsed = (now - start).num_microseconds()?;
    let step = period.num_microseconds()?;
    let periods = elapsed.checked_add(step - 1)? / step;
    start.checked_add_signed(Duration::microseconds(periods.checked_mul(step)?))
}

/// Serializable description of a trigger, as written in configuration
///
/// ```toml
/// trigger = { type = "cron", expression = "0 */5 * * * *", skip_overdue = true }
/// trigger = { type = "interval", seconds = 30, end = "2030-01-01T00:00:00Z" }
/// trigger = { type = "weekly", weekday = "Mon", at = "09:00:00" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Firing policy
    #[serde(flatten)]
    pub kind: TriggerSpecKind,
    /// Window start (default: build time). Ignored by `once`, which fires
    /// at its own `at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    /// Window end (default: unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    /// Skip fire times already in the past
    #[serde(default)]
    pub skip_overdue: bool,
}

/// Firing policy part of a [`TriggerSpec`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSpecKind {
    /// Single execution
    Once {
        /// Execution time (UTC)
        at: DateTime<Utc>,
    },
    /// Fixed period
    Interval {
        /// Period in seconds
        seconds: f64,
    },
    /// Cron expression (6 fields, seconds first)
    Cron {
        /// Expression text
        expression: String,
    },
    /// Every day at a time of day
    Daily {
        /// Time of day (UTC)
        at: NaiveTime,
    },
    /// Every week on a weekday at a time of day
    Weekly {
        /// Day of week
        weekday: Weekday,
        /// Time of day (UTC)
        at: NaiveTime,
    },
}

impl TriggerSpec {
    fn new(kind: TriggerSpecKind) -> Self {
        Self {
            kind,
            start: None,
            end: None,
            skip_overdue: false,
        }
    }

    /// Create a cron trigger spec
    pub fn cron(expression: impl Into<String>) -> Self {
        Self::new(TriggerSpecKind::Cron {
            expression: expression.into(),
        })
    }

    /// Create an interval trigger spec
    pub fn interval(seconds: f64) -> Self {
        Self::new(TriggerSpecKind::Interval { seconds })
    }

    /// Create a one-time trigger spec
    pub fn once(at: DateTime<Utc>) -> Self {
        Self::new(TriggerSpecKind::Once { at })
    }

    /// Create a daily trigger spec
    pub fn daily(at: NaiveTime) -> Self {
        Self::new(TriggerSpecKind::Daily { at })
    }

    /// Create a weekly trigger spec
    pub fn weekly(weekday: Weekday, at: NaiveTime) -> Self {
        Self::new(TriggerSpecKind::Weekly { weekday, at })
    }

    /// Build the trigger; syntax and window errors surface here
    pub fn build(&self, now: DateTime<Utc>) -> Result<Trigger> {
        let start = self.start.unwrap_or(now);
        let trigger = match &self.kind {
            // a once trigger's window starts at its fire time
            TriggerSpecKind::Once { at } => Trigger::once(*at),
            TriggerSpecKind::Interval { seconds } => Trigger::interval_secs(*seconds, start)?,
            TriggerSpecKind::Cron { expression } => Trigger::cron(expression, start)?,
            TriggerSpecKind::Daily { at } => Trigger::daily(*at, start)?,
            TriggerSpecKind::Weekly { weekday, at } => Trigger::weekly(*weekday, *at, start)?,
        };
        let trigger = match self.end {
            Some(end) => trigger.until(end)?,
            None => trigger,
        };
        Ok(trigger.skip_overdue(self.skip_overdue))
    }
}

#[cfg(test)]
mod tests;
