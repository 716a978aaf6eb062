//! Scheduler execution engine
//!
//! Owns the pending-task queue and dispatches tasks when they become due:
//! - Min-heap ordered by fire time, FIFO among equal fire times
//! - Timed sleep until the earliest fire time, woken early by `submit`
//! - Recurring triggers reinserted with their next fire time
//! - Bounded concurrent execution with failure isolation
//! - Graceful shutdown with a drain timeout

use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, OwnedSemaphorePermit, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::types::{
    DueTask, FailureHook, Result, ScheduledTask, SchedulerError, Submission, TaskFailure,
    TaskSummary,
};
use crate::clock::{SharedClock, SystemClock};

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum concurrent task executions
    pub max_concurrent: usize,
    /// How long `run_forever` waits for in-flight executions after stop
    pub drain_timeout_secs: u64,
    /// Upper bound on a single dispatcher sleep, in milliseconds
    pub max_sleep_ms: u64,
    /// Enable execution logging
    pub logging_enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            drain_timeout_secs: 30,
            max_sleep_ms: 60_000,
            logging_enabled: true,
        }
    }
}

impl SchedulerConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max concurrent executions
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Set drain timeout
    pub fn with_drain_timeout(mut self, secs: u64) -> Self {
        self.drain_timeout_secs = secs;
        self
    }

    /// Set the longest the dispatcher sleeps before re-reading the clock
    pub fn with_max_sleep(mut self, max_sleep: Duration) -> Self {
        self.max_sleep_ms = u64::try_from(max_sleep.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enable or disable execution logging
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }
}

/// Queued task keyed by fire time and submission sequence
struct QueueEntry {
    fire_at: DateTime<Utc>,
    seq: u64,
    task: ScheduledTask,
}

impl QueueEntry {
    fn key(&self) -> (DateTime<Utc>, u64) {
        (self.fire_at, self.seq)
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // reversed: BinaryHeap is a max-heap
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// Internal state for running executions
#[derive(Debug, Clone)]
struct RunningTask {
    task_id: Uuid,
    started_at: DateTime<Utc>,
}

type RunningTasks = Arc<RwLock<HashMap<Uuid, RunningTask>>>;

/// Time-ordered task scheduler
pub struct TaskScheduler {
    config: SchedulerConfig,
    clock: SharedClock,
    queue: Mutex<BinaryHeap<QueueEntry>>,
    wake: Notify,
    shutdown: CancellationToken,
    seq: AtomicU64,
    permits: Arc<Semaphore>,
    running_tasks: RunningTasks,
    failure_hook: Option<FailureHook>,
}

impl TaskScheduler {
    /// Create a new scheduler on the system clock
    pub fn new(config: SchedulerConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            config,
            clock: Arc::new(SystemClock),
            queue: Mutex::new(BinaryHeap::new()),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
            seq: AtomicU64::new(0),
            permits,
            running_tasks: Arc::new(RwLock::new(HashMap::new())),
            failure_hook: None,
        }
    }

    /// Use a different time source
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Receive every failed execution
    pub fn with_failure_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(TaskFailure) + Send + Sync + 'static,
    {
        self.failure_hook = Some(Arc::new(hook));
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Queue a task at its first fire time and wake the dispatcher.
    ///
    /// Tasks without a trigger fire immediately. A trigger that yields no
    /// fire time is reported through [`Submission::fire_at`] and not queued.
    pub async fn submit(&self, mut task: ScheduledTask) -> Result<Submission> {
        if self.is_stopped() {
            return Err(SchedulerError::Stopped);
        }

        let now = self.clock.now();
        let fire_at = match task.trigger.as_mut() {
            Some(trigger) => trigger.first_fire_time(now),
            None => Some(now),
        };
        let task_id = task.id;

        let Some(fire_at) = fire_at else {
            warn!(
                task_id = %task_id,
                name = %task.name,
                "Trigger has no fire time, task not scheduled"
            );
            return Ok(Submission {
                task_id,
                fire_at: None,
            });
        };

        debug!(task_id = %task_id, name = %task.name, fire_at = %fire_at, "Task submitted");
        let mut queue = self.queue.lock().await;
        let before = queue.len();
        // one entry per task id; a resubmission replaces the queued one
        queue.retain(|entry| entry.task.id != task_id);
        if queue.len() != before {
            debug!(task_id = %task_id, "Replaced queued entry for resubmitted task");
        }
        queue.push(QueueEntry {
            fire_at,
            seq: self.next_seq(),
            task,
        });
        drop(queue);
        self.wake.notify_one();

        Ok(Submission {
            task_id,
            fire_at: Some(fire_at),
        })
    }

    /// Wait for the earliest task to become due and hand it out.
    ///
    /// Recurring tasks are reinserted at their next fire time before this
    /// returns. Fails with [`SchedulerError::Stopped`] once stopped.
    pub async fn next_due_task(&self) -> Result<DueTask> {
        loop {
            if self.is_stopped() {
                return Err(SchedulerError::Stopped);
            }

            let wait = {
                let mut queue = self.queue.lock().await;
                let now = self.clock.now();
                match queue.peek().map(|entry| entry.fire_at) {
                    Some(fire_at) if fire_at <= now => {
                        if let Some(entry) = queue.pop() {
                            return Ok(self.reschedule(&mut queue, entry, now));
                        }
                        continue;
                    }
                    Some(fire_at) => Some(
                        (fire_at - now)
                            .to_std()
                            .unwrap_or(Duration::ZERO)
                            .min(self.max_sleep()),
                    ),
                    None => None,
                }
            };

            match wait {
                Some(wait) => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return Err(SchedulerError::Stopped),
                        _ = tokio::time::sleep(wait) => {}
                        _ = self.wake.notified() => {}
                    }
                }
                None => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return Err(SchedulerError::Stopped),
                        _ = self.wake.notified() => {}
                    }
                }
            }
        }
    }

    fn reschedule(
        &self,
        queue: &mut BinaryHeap<QueueEntry>,
        mut entry: QueueEntry,
        now: DateTime<Utc>,
    ) -> DueTask {
        let due = DueTask {
            task_id: entry.task.id,
            name: entry.task.name.clone(),
            fire_at: entry.fire_at,
            job: Arc::clone(&entry.task.job),
        };

        if let Some(trigger) = entry.task.trigger.as_mut() {
            match trigger.next_fire_time(now) {
                Some(next) => {
                    entry.fire_at = next;
                    entry.seq = self.next_seq();
                    queue.push(entry);
                }
                None => debug!(task_id = %due.task_id, "Trigger completed"),
            }
        }

        due
    }

    /// Dispatch due tasks until stopped, then drain in-flight executions.
    ///
    /// Each job runs on its own tokio task. Errors and panics are logged,
    /// reported to the failure hook, and never end the loop.
    pub async fn run_forever(&self) -> Result<()> {
        info!("Task scheduler starting");

        loop {
            let due = match self.next_due_task().await {
                Ok(due) => due,
                Err(SchedulerError::Stopped) => break,
                Err(e) => return Err(e),
            };

            let permit = tokio::select! {
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = self.shutdown.cancelled() => break,
            };

            self.spawn_execution(due, permit).await;
        }

        self.wait_for_running_tasks().await;

        info!("Task scheduler stopped");
        Ok(())
    }

    async fn spawn_execution(&self, due: DueTask, permit: OwnedSemaphorePermit) {
        let execution_id = Uuid::new_v4();
        self.running_tasks.write().await.insert(
            execution_id,
            RunningTask {
                task_id: due.task_id,
                started_at: self.clock.now(),
            },
        );

        let running_tasks = Arc::clone(&self.running_tasks);
        let failure_hook = self.failure_hook.clone();
        let logging_enabled = self.config.logging_enabled;

        tokio::spawn(async move {
            let _permit = permit;

            if logging_enabled {
                info!(
                    task_id = %due.task_id,
                    fire_at = %due.fire_at,
                    "Executing scheduled task: {}",
                    due.name
                );
            }

            let failure = match AssertUnwindSafe(due.execute()).catch_unwind().await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(SchedulerError::Execution(format!("{:#}", e))),
                Err(payload) => Some(SchedulerError::Execution(panic_message(payload))),
            };

            match failure {
                None => {
                    if logging_enabled {
                        info!(task_id = %due.task_id, "Task {} completed", due.name);
                    }
                }
                Some(err) => {
                    error!(task_id = %due.task_id, error = %err, "Task {} failed", due.name);
                    if let Some(hook) = &failure_hook {
                        let report = TaskFailure {
                            task_id: due.task_id,
                            name: due.name.clone(),
                            fire_at: due.fire_at,
                            error: err.to_string(),
                        };
                        if let Err(payload) =
                            std::panic::catch_unwind(AssertUnwindSafe(|| hook(report)))
                        {
                            error!(
                                task_id = %due.task_id,
                                "Failure hook panicked: {}",
                                panic_message(payload)
                            );
                        }
                    }
                }
            }

            running_tasks.write().await.remove(&execution_id);
        });
    }

    /// Wait for all running executions to complete
    async fn wait_for_running_tasks(&self) {
        let timeout = Duration::from_secs(self.config.drain_timeout_secs);
        let start = tokio::time::Instant::now();

        loop {
            let running = self.running_tasks.read().await;
            if running.is_empty() {
                break;
            }

            let count = running.len();
            let oldest = running.values().map(|r| r.started_at).min();
            drop(running);

            if start.elapsed() > timeout {
                warn!(
                    oldest_started_at = ?oldest,
                    "Timeout waiting for {} running tasks",
                    count
                );
                break;
            }

            debug!("Waiting for {} running tasks to complete...", count);
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Request cooperative shutdown; wakes any waiting dispatcher
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Task scheduler stopping");
        }
        self.shutdown.cancel();
    }

    /// Stop and drop every pending task. Returns how many were dropped.
    pub async fn close(&self) -> usize {
        self.stop();
        let mut queue = self.queue.lock().await;
        let dropped = queue.len();
        queue.clear();
        dropped
    }

    /// Remove a pending task
    pub async fn remove(&self, task_id: Uuid) -> Result<()> {
        let mut queue = self.queue.lock().await;
        let before = queue.len();
        queue.retain(|entry| entry.task.id != task_id);
        if queue.len() == before {
            return Err(SchedulerError::TaskNotFound(task_id));
        }
        debug!(task_id = %task_id, "Task removed");
        Ok(())
    }

    /// Pending tasks in dispatch order
    pub async fn list_tasks(&self) -> Vec<TaskSummary> {
        let queue = self.queue.lock().await;
        let mut entries: Vec<&QueueEntry> = queue.iter().collect();
        entries.sort_by_key(|entry| entry.key());
        entries
            .into_iter()
            .map(|entry| TaskSummary {
                id: entry.task.id,
                name: entry.task.name.clone(),
                next_fire_at: entry.fire_at,
                trigger_state: entry.task.trigger.as_ref().map(|t| t.state()),
                created_at: entry.task.created_at,
            })
            .collect()
    }

    /// Number of queued tasks
    pub async fn pending_count(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Number of executions in flight
    pub async fn running_count(&self) -> usize {
        self.running_tasks.read().await.len()
    }

    /// Whether any execution of `task_id` is in flight
    pub async fn is_running(&self, task_id: Uuid) -> bool {
        self.running_tasks
            .read()
            .await
            .values()
            .any(|r| r.task_id == task_id)
    }

    /// Whether [`stop`](Self::stop) has been called
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, AtomicOrdering::Relaxed)
    }

    fn max_sleep(&self) -> Duration {
        Duration::from_millis(self.config.max_sleep_ms.max(1))
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
