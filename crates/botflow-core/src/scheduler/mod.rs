//! Scheduler - triggers and time-ordered task dispatch
//!
//! Runs bot jobs when their triggers say so:
//!
//! - **Once triggers**: Single execution at a specific time
//! - **Interval triggers**: Fixed-period repeating tasks
//! - **Cron triggers**: Six-field cron expressions (seconds first), plus
//!   daily and weekly shorthands
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  TaskScheduler  │  Min-heap queue + dispatch loop
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Trigger     │  Ready -> Running -> Completed
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  CronSchedule   │  Field sets + next-match search
//! └─────────────────┘
//!
//! ┌─────────────────┐
//! │   JobRegistry   │  Handler name + params -> Job
//! └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use botflow_core::scheduler::{ScheduledTask, SchedulerConfig, TaskScheduler, Trigger};
//!
//! let scheduler = Arc::new(TaskScheduler::new(SchedulerConfig::new().with_max_concurrent(4)));
//!
//! let task = ScheduledTask::from_fn("morning_digest", || async {
//!     send_digest().await
//! })
//! .with_trigger(Trigger::cron("0 0 8 * * 0-4", Utc::now())?);
//! scheduler.submit(task).await?;
//!
//! // Dispatch until stopped
//! scheduler.run_forever().await?;
//! ```

mod cron;
mod engine;
mod registry;
mod triggers;
mod types;

pub use cron::{CronFieldKind, CronFieldSet, CronIter, CronSchedule};
pub use engine::{SchedulerConfig, TaskScheduler};
pub use registry::{JobFactory, JobParams, JobRegistry};
pub use triggers::{Trigger, TriggerKind, TriggerSpec, TriggerSpecKind, TriggerState};
pub use types::{
    job_fn, DueTask, FailureHook, Job, JobFuture, Result as SchedulerResult, ScheduledTask,
    SchedulerError, Submission, TaskFailure, TaskSummary,
};
