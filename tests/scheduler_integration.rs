//! Integration tests for botflow-core
//!
//! These tests drive the public API end to end:
//! - Triggers built from configuration specs
//! - Jobs built from the registry
//! - The scheduler dispatch loop running real jobs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use botflow_core::scheduler::{JobParams, TaskFailure, TriggerSpecKind};
use botflow_core::{
    job_fn, CronSchedule, JobRegistry, ManualClock, ScheduledTask, SchedulerConfig, TaskScheduler,
    Trigger, TriggerSpec, TriggerState,
};
use chrono::{TimeZone, Utc};

async fn wait_for(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "timed out");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ============================================================================
// Trigger Specs
// ============================================================================

#[test]
fn test_trigger_spec_from_toml() {
    #[derive(serde::Deserialize)]
    struct Job {
        trigger: TriggerSpec,
    }

    let job: Job = toml::from_str(
        r#"trigger = { type = "daily", at = "07:30:00", start = "2024-03-01T00:00:00Z" }"#,
    )
    .unwrap();
    assert!(matches!(job.trigger.kind, TriggerSpecKind::Daily { .. }));

    let mut trigger = job.trigger.build(Utc::now()).unwrap();
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    assert_eq!(
        trigger.first_fire_time(start),
        Some(Utc.with_ymd_and_hms(2024, 3, 1, 7, 30, 0).unwrap())
    );
}

#[test]
fn test_cron_schedule_public_api() {
    let schedule = CronSchedule::parse(
        "0 0 12 * * 5,6",
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap(),
    )
    .unwrap();
    // Saturdays and Sundays at noon in January 2024
    let fires: Vec<_> = schedule
        .iter_from(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .collect();
    assert_eq!(fires.len(), 8);
    assert_eq!(fires[0], Utc.with_ymd_and_hms(2024, 1, 6, 12, 0, 0).unwrap());
    assert_eq!(fires[7], Utc.with_ymd_and_hms(2024, 1, 28, 12, 0, 0).unwrap());
}

// ============================================================================
// Scheduler
// ============================================================================

#[tokio::test]
async fn test_manual_clock_drives_cron_task() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    let scheduler = TaskScheduler::new(
        SchedulerConfig::new()
            .with_max_sleep(Duration::from_millis(10))
            .with_logging(false),
    )
    .with_clock(Arc::new(clock.clone()));

    let trigger = Trigger::cron("0 */15 * * * *", start)
        .unwrap()
        .until(start + chrono::Duration::hours(1))
        .unwrap();
    let task = ScheduledTask::from_fn("quarter_hour", || async { Ok(()) }).with_trigger(trigger);
    scheduler.submit(task).await.unwrap();

    let mut fires = Vec::new();
    for _ in 0..5 {
        fires.push(scheduler.next_due_task().await.unwrap().fire_at);
        clock.advance(chrono::Duration::minutes(15));
    }

    let expected: Vec<_> = (0..5)
        .map(|i| start + chrono::Duration::minutes(15 * i))
        .collect();
    assert_eq!(fires, expected);
    assert_eq!(scheduler.pending_count().await, 0);
}

#[tokio::test]
async fn test_registry_jobs_run_through_scheduler() {
    let runs = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(Mutex::new(Vec::<TaskFailure>::new()));

    let mut registry = JobRegistry::with_builtins();
    {
        let runs = Arc::clone(&runs);
        registry.register("count", move |_params: &JobParams| {
            let runs = Arc::clone(&runs);
            Ok(job_fn(move || {
                let runs = Arc::clone(&runs);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }))
        });
    }

    let scheduler = {
        let failures = Arc::clone(&failures);
        Arc::new(
            TaskScheduler::new(SchedulerConfig::new().with_logging(false))
                .with_failure_hook(move |f| failures.lock().unwrap().push(f)),
        )
    };

    let counter = registry.build("count", &JobParams::new()).unwrap();
    let trigger = TriggerSpec::interval(0.02).build(Utc::now()).unwrap();
    scheduler
        .submit(ScheduledTask::new("counter", counter).with_trigger(trigger))
        .await
        .unwrap();

    let params = JobParams::from([("command".to_string(), "exit 7".to_string())]);
    let failing = registry.build("shell", &params).unwrap();
    let failing = scheduler
        .submit(ScheduledTask::new("failing_shell", failing))
        .await
        .unwrap();

    let handle = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run_forever().await })
    };

    wait_for(|| runs.load(Ordering::SeqCst) >= 3 && !failures.lock().unwrap().is_empty()).await;
    scheduler.stop();
    handle.await.unwrap().unwrap();

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].task_id, failing.task_id);

    let pending = scheduler.list_tasks().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name, "counter");
    assert_eq!(pending[0].trigger_state, Some(TriggerState::Running));
}
