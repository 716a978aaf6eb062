//! Scheduler startup
//!
//! Builds tasks from configured jobs and starts the dispatch loop.

use super::config::{AppConfig, JobConfig};
use botflow_core::{JobRegistry, ScheduledTask, SchedulerResult, TaskScheduler};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A running scheduler and its dispatch loop
pub struct SchedulerHandle {
    pub scheduler: Arc<TaskScheduler>,
    pub task: JoinHandle<()>,
}

/// Build the task for one configured job
pub fn build_task(
    job: &JobConfig,
    registry: &JobRegistry,
    now: DateTime<Utc>,
) -> SchedulerResult<ScheduledTask> {
    let handler = registry.build(&job.handler, &job.params)?;
    let task = ScheduledTask::new(job.name.clone(), handler);
    match &job.trigger {
        Some(spec) => Ok(task.with_trigger(spec.build(now)?)),
        None => Ok(task),
    }
}

/// Submit every enabled job. Invalid jobs are logged and skipped.
///
/// Returns how many jobs were queued.
pub async fn submit_jobs(
    config: &AppConfig,
    registry: &JobRegistry,
    scheduler: &TaskScheduler,
) -> SchedulerResult<usize> {
    let now = Utc::now();
    let mut queued = 0;

    for job in config.jobs.iter().filter(|job| job.enabled) {
        let task = match build_task(job, registry, now) {
            Ok(task) => task,
            Err(e) => {
                error!(job = %job.name, "Skipping invalid job: {}", e);
                continue;
            }
        };

        let submission = scheduler.submit(task).await?;
        match submission.fire_at {
            Some(fire_at) => {
                info!(job = %job.name, task_id = %submission.task_id, "Job scheduled, first run at {}", fire_at);
                queued += 1;
            }
            None => warn!(job = %job.name, "Job trigger never fires, not scheduled"),
        }
    }

    Ok(queued)
}

/// Start the task scheduler
pub async fn start_scheduler(
    config: &AppConfig,
    registry: &JobRegistry,
    shutdown: CancellationToken,
) -> SchedulerResult<Option<SchedulerHandle>> {
    if !config.scheduler.enabled {
        info!("Scheduler disabled by configuration");
        return Ok(None);
    }

    let scheduler = Arc::new(
        TaskScheduler::new(config.scheduler.engine_config()).with_failure_hook(|failure| {
            warn!(
                task_id = %failure.task_id,
                fire_at = %failure.fire_at,
                "Job {} failed: {}",
                failure.name,
                failure.error
            );
        }),
    );

    let queued = submit_jobs(config, registry, &scheduler).await?;
    if queued == 0 {
        warn!("No jobs scheduled");
    }

    // Stop the scheduler when the application shuts down
    let scheduler_for_stop = scheduler.clone();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        scheduler_for_stop.stop();
    });

    // Clone for the background run loop
    let scheduler_for_run = scheduler.clone();
    let task = tokio::spawn(async move {
        if let Err(e) = scheduler_for_run.run_forever().await {
            error!("Scheduler error: {}", e);
        }
    });

    info!(
        "Scheduler started ({} jobs, max concurrent: {})",
        queued,
        scheduler.config().max_concurrent
    );

    Ok(Some(SchedulerHandle { scheduler, task }))
}
