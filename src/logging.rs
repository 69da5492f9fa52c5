use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;

use crate::config::LogConfig;

/// Installs the process logger. Called once from the binary; library code
/// only talks to the `log` facade.
pub fn init(cfg: &LogConfig) -> Result<()> {
    let offset = FixedOffset::east_opt(cfg.timezone_offset_secs)
        .with_context(|| format!("invalid timezone offset {}", cfg.timezone_offset_secs))?;
    let pid = std::process::id();

    let mut builder = Builder::from_default_env();
    builder
        .format(move |buf, record| {
            let utc_now: DateTime<Utc> = Utc::now();
            let local_now = utc_now.with_timezone(&offset);
            writeln!(
                buf,
                "{}-{}-{}-{}",
                local_now.format("%Y-%m-%dT%H:%M:%S%z"),
                pid,
                record.level(),
                record.args()
            )
        })
        .filter(
            None,
            LevelFilter::from_str(&env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
                .unwrap_or(LevelFilter::Debug),
        );

    if let Some(path) = &cfg.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path))?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder
        .try_init()
        .context("logger already initialized")?;
    Ok(())
}
