//! `botflow preview`: upcoming fire times of a cron expression

use anyhow::{Context, Result};
use botflow_core::CronSchedule;
use chrono::{DateTime, Utc};

/// Next `count` fire times at or after `from`
pub fn upcoming(expression: &str, from: DateTime<Utc>, count: usize) -> Result<Vec<DateTime<Utc>>> {
    let schedule: CronSchedule = expression.parse()?;
    Ok(schedule.iter_from(from).take(count).collect())
}

fn parse_from(from: Option<&str>) -> Result<DateTime<Utc>> {
    match from {
        Some(text) => Ok(DateTime::parse_from_rfc3339(text)
            .with_context(|| format!("Invalid --from time '{}', expected RFC 3339", text))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

pub fn run(expression: &str, count: usize, from: Option<&str>) -> Result<()> {
    let from = parse_from(from)?;
    let fires = upcoming(expression, from, count)?;

    if fires.is_empty() {
        println!("'{}' never fires after {}", expression, from.to_rfc3339());
        return Ok(());
    }

    for (i, fire) in fires.iter().enumerate() {
        println!("{:>3}. {}  ({})", i + 1, fire.to_rfc3339(), fire.format("%a"));
    }
    if fires.len() < count {
        println!("(no further fire times)");
    }
    Ok(())
}
