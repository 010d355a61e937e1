use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{LevelFilter, Record};

/// Optional override of the filter, same syntax as `RUST_LOG`.
const LOG_ENV: &str = "VK_BACKUP_LOG";

/// Sends every record to `log_file`, appending one line per record. Our own
/// modules log at `level`; dependencies only at warn and above.
pub fn init(log_file: &Path, level: LevelFilter) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    env_logger::Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_CRATE_NAME"), level)
        .parse_env(LOG_ENV)
        .format(|buf, record| write_record(buf, Local::now(), record))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .context("Failed to install logger")?;

    log::info!("logger initialised, writing to {}", log_file.display());
    Ok(())
}

pub fn flush() {
    log::logger().flush();
}

fn write_record(out: &mut dyn Write, timestamp: DateTime<Local>, record: &Record) -> io::Result<()> {
    writeln!(
        out,
        "{}: {} - {} - {}",
        timestamp.format("%Y-%m-%d %H:%M:%S,%3f"),
        record.target(),
        record.level(),
        record.args()
    )
}
