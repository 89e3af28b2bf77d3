//! `rotate` command: one rotation against running daemons

use crate::config;
use crate::rotation;
use anyhow::Result;
use std::path::Path;

pub async fn run_rotate(config_path: &Path) -> Result<()> {
    let config = config::load_from_path(config_path)?;

    let ip = rotation::rotate(&config.rotation_config()).await?;
    println!("{}", ip);
    Ok(())
}
