//! Registry - named job handlers
//!
//! Configuration refers to jobs by handler name plus string parameters.
//! The registry maps each name to a factory that turns those parameters
//! into a [`Job`]. It is passed by reference to whoever builds tasks; there
//! is no process-wide instance.

use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{job_fn, Job, Result, SchedulerError};

/// Parameters handed to a job factory
pub type JobParams = HashMap<String, String>;

/// Builds a job from its parameters
pub type JobFactory = Arc<dyn Fn(&JobParams) -> anyhow::Result<Job> + Send + Sync>;

/// Named job factories
#[derive(Clone, Default)]
pub struct JobRegistry {
    factories: HashMap<String, JobFactory>,
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

impl JobRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the `log` and `shell` handlers
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("log", log_job);
        registry.register("shell", shell_job);
        registry
    }

    /// Register a factory, replacing any previous one with the same name
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&JobParams) -> anyhow::Result<Job> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(handler = %name, "Registering job handler");
        if self.factories.insert(name.clone(), Arc::new(factory)).is_some() {
            warn!(handler = %name, "Job handler replaced");
        }
    }

    /// Check if a handler exists
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered handler names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build a job from a handler name and its parameters
    pub fn build(&self, name: &str, params: &JobParams) -> Result<Job> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownHandler(name.to_string()))?;
        factory(params)
            .map_err(|e| SchedulerError::InvalidConfig(format!("handler '{}': {:#}", name, e)))
    }
}

fn required<'a>(params: &'a JobParams, key: &str) -> anyhow::Result<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .with_context(|| format!("missing '{}' parameter", key))
}

/// `log`: emit `message` at info level
fn log_job(params: &JobParams) -> anyhow::Result<Job> {
    let message = required(params, "message")?.to_string();
    Ok(job_fn(move || {
        let message = message.clone();
        async move {
            info!(target: "botflow::job", "{}", message);
            Ok(())
        }
    }))
}

/// `shell`: run `command` through `sh -c`, optionally in `cwd`
fn shell_job(params: &JobParams) -> anyhow::Result<Job> {
    let command = required(params, "command")?.to_string();
    if command.trim().is_empty() {
        anyhow::bail!("'command' parameter is empty");
    }
    let cwd = params.get("cwd").cloned();

    Ok(job_fn(move || {
        let command = command.clone();
        let cwd = cwd.clone();
        async move {
            let mut cmd = tokio::process::Command::new("sh");
            cmd.arg("-c").arg(&command).kill_on_drop(true);
            if let Some(cwd) = &cwd {
                cmd.current_dir(cwd);
            }

            let output = cmd
                .output()
                .await
                .with_context(|| format!("failed to spawn '{}'", command))?;

            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.trim().is_empty() {
                debug!(command = %command, "stdout: {}", stdout.trim_end());
            }

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                anyhow::bail!(
                    "'{}' exited with {}: {}",
                    command,
                    output.status,
                    stderr.trim()
                );
            }
            Ok(())
        }
    }))
}
