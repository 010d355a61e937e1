mod backup;
mod credentials;
mod error;
mod http;
mod ledger;
mod logging;
mod model;
#[cfg(test)]
mod test_support;
mod vk_client;
mod yandex_disk_client;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use git_version::git_version;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;

use crate::backup::{Backup, BackupSettings};
use crate::credentials::Credentials;
use crate::vk_client::VkClient;
use crate::yandex_disk_client::YandexDiskClient;

pub const GIT_VERSION: &str = git_version!(fallback = "unknown");

/// Backs up VK profile photos to a Yandex Disk folder
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// VK account whose profile album is backed up
    #[clap(long, default_value_t = 552934290, value_parser = clap::value_parser!(i64).range(1..))]
    account_id: i64,

    /// Number of photos to request
    #[clap(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..=1000))]
    count: u32,

    /// Destination folder on the disk
    #[clap(long, default_value = "vk_profile_photos")]
    folder: String,

    #[clap(long, default_value = "vk_token.txt")]
    vk_token_file: PathBuf,

    #[clap(long, default_value = "ya_token.txt")]
    disk_token_file: PathBuf,

    /// JSON record of every uploaded photo
    #[clap(long, default_value = "uploaded_photos.json")]
    ledger_file: PathBuf,

    #[clap(long, default_value = "backup_profile_photos.log")]
    log_file: PathBuf,

    #[clap(long, value_enum, default_value = "info")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    println!("VK Profile Backup");
    println!("{GIT_VERSION}");

    logging::init(&args.log_file, args.log_level.into())?;
    let result = run(args).await;
    logging::flush();

    result
}

async fn run(args: Args) -> Result<()> {
    let credentials = Credentials::load(&args.vk_token_file, &args.disk_token_file)
        .context("Failed to read tokens")?;

    let vk_client = VkClient::new(&credentials.vk_token)?;
    let disk_client = YandexDiskClient::new(&credentials.disk_token)?;

    let settings = BackupSettings {
        account_id: args.account_id,
        count: args.count,
        folder: args.folder,
        ledger_path: args.ledger_file,
    };

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} photos")
            .context("Invalid progress template")?,
    );

    println!("Backing up profile photos of account {}...", settings.account_id);
    let summary = Backup::new(&vk_client, &disk_client, &settings, Local::now().date_naive())
        .with_progress(progress)
        .run()
        .await
        .with_context(|| {
            format!(
                "Failed to back up profile photos for account id {}",
                settings.account_id
            )
        })?;

    println!(
        "Finished. {} of {} photos uploaded, {} failed.",
        summary.uploaded, summary.listed, summary.failed
    );

    Ok(())
}
