//! `botflow config`: print the effective configuration

use crate::app::{load_config, render_config};
use anyhow::{Context, Result};
use std::path::Path;

pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path).context("Failed to load configuration")?;
    print!("{}", render_config(&config)?);
    Ok(())
}
