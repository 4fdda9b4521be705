//! `capkit config`: print the effective configuration.

use anyhow::{Context, Result};

use capkit_sync::paths::config_path;

use crate::CliEnv;

pub fn run(env: &CliEnv) -> Result<()> {
    let yaml = env
        .config
        .to_yaml()
        .context("failed to serialize configuration")?;
    println!("# {}", config_path(&env.home).display());
    print!("{yaml}");
    Ok(())
}
