//! Application module for botflow
//!
//! Contains configuration handling and the scheduler runtime.
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment
//! - `background_tasks`: Building tasks from jobs and starting the scheduler
//! - `init`: Main run loop

mod background_tasks;
pub mod config;
mod init;
mod loader;

// Re-export public API
pub use background_tasks::build_task;
pub use init::run;
pub use loader::{load_config, render_config};
