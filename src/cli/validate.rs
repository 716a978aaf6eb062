//! `botflow validate`: check configured jobs without running them

use crate::app::config::AppConfig;
use crate::app::{build_task, load_config};
use anyhow::{Context, Result};
use botflow_core::JobRegistry;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Outcome of validating one job
#[derive(Debug)]
pub struct JobReport {
    pub name: String,
    pub enabled: bool,
    /// First fire time, `None` if the trigger never fires
    pub first_fire: Result<Option<DateTime<Utc>>, String>,
}

/// Validate every configured job
pub fn check_jobs(config: &AppConfig, registry: &JobRegistry, now: DateTime<Utc>) -> Vec<JobReport> {
    config
        .jobs
        .iter()
        .map(|job| {
            let first_fire = build_task(job, registry, now)
                .map(|task| match task.trigger {
                    Some(mut trigger) => trigger.first_fire_time(now),
                    None => Some(now),
                })
                .map_err(|e| e.to_string());
            JobReport {
                name: job.name.clone(),
                enabled: job.enabled,
                first_fire,
            }
        })
        .collect()
}

pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path).context("Failed to load configuration")?;
    let registry = JobRegistry::with_builtins();
    let reports = check_jobs(&config, &registry, Utc::now());

    if reports.is_empty() {
        println!("No jobs configured.");
        return Ok(());
    }

    let mut invalid = 0;
    for report in &reports {
        let note = if report.enabled { "" } else { " (disabled)" };
        match &report.first_fire {
            Ok(Some(at)) => println!("✅ {}{}: first run {}", report.name, note, at.to_rfc3339()),
            Ok(None) => println!("⚠️  {}{}: trigger never fires", report.name, note),
            Err(e) => {
                invalid += 1;
                println!("❌ {}{}: {}", report.name, note, e);
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!("{} of {} jobs are invalid", invalid, reports.len());
    }
    println!("\nAll {} jobs are valid.", reports.len());
    Ok(())
}
