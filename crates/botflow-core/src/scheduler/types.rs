//! Scheduler task types and error definitions
//!
//! Contains the core types used by the scheduler system.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

use super::triggers::{Trigger, TriggerState};

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Scheduler error types
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Malformed cron field or wrong field count
    #[error("invalid cron syntax in {field} field of '{expression}': {message}")]
    InvalidCronSyntax {
        /// Field name (second, minute, ..., or "expression" for field count errors)
        field: &'static str,
        /// Offending expression or field text
        expression: String,
        /// What was wrong
        message: String,
    },
    /// Time window with its start after its end
    #[error("invalid time window: start {start} is after end {end}")]
    InvalidWindow {
        /// Window start
        start: DateTime<Utc>,
        /// Window end
        end: DateTime<Utc>,
    },
    /// Non-positive or non-finite interval period
    #[error("invalid interval: {0}")]
    InvalidInterval(String),
    /// Task not found
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),
    /// No job handler registered under this name
    #[error("unknown job handler: {0}")]
    UnknownHandler(String),
    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Task execution error
    #[error("execution error: {0}")]
    Execution(String),
    /// Scheduler has been stopped
    #[error("scheduler stopped")]
    Stopped,
}

impl SchedulerError {
    pub(crate) fn cron_syntax(
        field: &'static str,
        expression: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidCronSyntax {
            field,
            expression: expression.into(),
            message: message.into(),
        }
    }
}

/// Future returned by a job invocation
pub type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// The work a scheduled task performs. Opaque to the scheduler.
pub type Job = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Wrap an async closure as a [`Job`]
pub fn job_fn<F, Fut>(f: F) -> Job
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()) as JobFuture)
}

/// Scheduled task definition
#[derive(Clone)]
pub struct ScheduledTask {
    /// Unique task ID
    pub id: Uuid,
    /// Human-readable task name
    pub name: String,
    /// Firing policy; `None` fires once, immediately
    pub trigger: Option<Trigger>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Work to run when due
    pub job: Job,
}

impl ScheduledTask {
    /// Create a new one-shot task that fires as soon as it is submitted
    pub fn new(name: impl Into<String>, job: Job) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            trigger: None,
            created_at: Utc::now(),
            job,
        }
    }

    /// Create a task from an async closure
    pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::new(name, job_fn(f))
    }

    /// Attach a trigger
    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Outcome of submitting a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    /// Task ID
    pub task_id: Uuid,
    /// First fire time, or `None` if the trigger never fires
    pub fire_at: Option<DateTime<Utc>>,
}

impl Submission {
    /// Whether the task was queued
    pub fn is_scheduled(&self) -> bool {
        self.fire_at.is_some()
    }
}

/// A task handed out by the dispatcher for execution
#[derive(Clone)]
pub struct DueTask {
    /// Task ID
    pub task_id: Uuid,
    /// Task name
    pub name: String,
    /// The fire time that became due
    pub fire_at: DateTime<Utc>,
    /// Work to run
    pub job: Job,
}

impl DueTask {
    /// Run the job once
    pub async fn execute(&self) -> anyhow::Result<()> {
        (self.job)().await
    }
}

impl fmt::Debug for DueTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DueTask")
            .field("task_id", &self.task_id)
            .field("name", &self.name)
            .field("fire_at", &self.fire_at)
            .finish_non_exhaustive()
    }
}

/// Snapshot of a queued task
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    /// Task ID
    pub id: Uuid,
    /// Task name
    pub name: String,
    /// Next fire time
    pub next_fire_at: DateTime<Utc>,
    /// Trigger state, `None` for one-shot immediate tasks
    pub trigger_state: Option<TriggerState>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// A failed task execution, reported to the failure hook
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    /// Task ID
    pub task_id: Uuid,
    /// Task name
    pub name: String,
    /// Fire time of the failed run
    pub fire_at: DateTime<Utc>,
    /// Error or panic message
    pub error: String,
}

/// Callback invoked for every failed execution
pub type FailureHook = Arc<dyn Fn(TaskFailure) + Send + Sync>;
