//! Botflow Core - Trigger and Task Scheduling
//!
//! This crate provides the scheduling engine behind botflow jobs,
//! including:
//! - Cron: six-field expressions with validity windows
//! - Triggers: once, interval and cron firing policies
//! - Scheduler: time-ordered dispatch with failure isolation
//! - Registry: named job handlers built from configuration
//! - Clock: swappable time source for deterministic tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use scheduler::{
    job_fn, CronSchedule, Job, JobRegistry, ScheduledTask, SchedulerConfig, SchedulerError,
    SchedulerResult, Submission, TaskScheduler, Trigger, TriggerSpec, TriggerState,
};
