use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use indicatif::ProgressBar;
use log::{error, info, warn};

use crate::error::BackupError;
use crate::ledger;
use crate::model::{LedgerEntry, PhotoRecord};

/// Status the storage API answers with when a new object was written.
pub const CREATED: u16 = 201;

/// Read side of the backup: where profile photos come from.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn list_profile_photos(
        &self,
        owner_id: i64,
        count: u32,
    ) -> Result<Vec<PhotoRecord>, BackupError>;

    async fn download(&self, url: &str) -> Result<Vec<u8>, BackupError>;
}

/// Write side of the backup: where photos and sidecars end up.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn create_folder(&self, path: &str) -> Result<u16, BackupError>;

    async fn upload(&self, content: Vec<u8>, path: &str) -> Result<u16, BackupError>;
}

pub struct BackupSettings {
    pub account_id: i64,
    pub count: u32,
    pub folder: String,
    pub ledger_path: PathBuf,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BackupSummary {
    pub listed: usize,
    pub uploaded: usize,
    pub failed: usize,
    pub metadata_failed: usize,
}

/// Upload target for one photo within the destination folder.
#[derive(Debug, PartialEq, Eq)]
pub struct UploadTarget {
    pub folder: String,
    pub file_name: String,
}

impl UploadTarget {
    pub fn photo_path(&self) -> String {
        format!("{}/{}.jpg", self.folder, self.file_name)
    }

    pub fn metadata_path(&self) -> String {
        format!("{}/{}.json", self.folder, self.file_name)
    }
}

/// Names already taken during this run. Keyed by like count: the first photo
/// with a given count is named after it, every later one gets the date
/// suffix. The ledger on disk is never consulted here.
#[derive(Default)]
pub struct UsedNames {
    like_counts: HashSet<String>,
}

impl UsedNames {
    pub fn resolve(&self, like_count: i64, today: NaiveDate) -> String {
        let candidate = like_count.to_string();
        if self.like_counts.contains(&candidate) {
            format!("{like_count}_{today}")
        } else {
            candidate
        }
    }

    pub fn mark(&mut self, like_count: i64) {
        self.like_counts.insert(like_count.to_string());
    }
}

pub struct Backup<'a> {
    source: &'a dyn PhotoSource,
    storage: &'a dyn ObjectStorage,
    settings: &'a BackupSettings,
    today: NaiveDate,
    progress: ProgressBar,
}

impl<'a> Backup<'a> {
    pub fn new(
        source: &'a dyn PhotoSource,
        storage: &'a dyn ObjectStorage,
        settings: &'a BackupSettings,
        today: NaiveDate,
    ) -> Backup<'a> {
        Backup {
            source,
            storage,
            settings,
            today,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Backup<'a> {
        self.progress = progress;
        self
    }

    /// Runs the whole backup. Only a missing photo list ends the run early;
    /// per-photo failures are logged, counted and skipped.
    pub async fn run(&self) -> Result<BackupSummary, BackupError> {
        let account_id = self.settings.account_id;
        let photos = match self
            .source
            .list_profile_photos(account_id, self.settings.count)
            .await
        {
            Ok(photos) => photos,
            Err(e) => {
                error!("failed to get profile photos for account id {account_id}: {e}");
                return Err(e);
            }
        };
        info!(
            "account {account_id}: {count} profile photos to back up",
            count = photos.len()
        );

        let previous = ledger::ensure_exists(&self.settings.ledger_path)
            .and_then(|_| ledger::load(&self.settings.ledger_path))
            .inspect_err(|e| error!("{e}"))?;
        info!(
            "ledger {} holds {} entries from earlier runs",
            self.settings.ledger_path.display(),
            previous.len()
        );

        if let Err(e) = self.storage.create_folder(&self.settings.folder).await {
            warn!("continuing without confirmed folder {}: {e}", self.settings.folder);
        }

        let mut summary = BackupSummary {
            listed: photos.len(),
            ..Default::default()
        };
        let mut used_names = UsedNames::default();

        self.progress.set_length(photos.len() as u64);
        for photo in &photos {
            self.backup_photo(photo, &mut used_names, &mut summary).await?;
            self.progress.inc(1);
        }
        self.progress.finish();

        info!(
            "backup finished: {uploaded} of {listed} photos uploaded, {failed} failed, {metadata_failed} sidecars failed",
            uploaded = summary.uploaded,
            listed = summary.listed,
            failed = summary.failed,
            metadata_failed = summary.metadata_failed,
        );

        Ok(summary)
    }

    async fn backup_photo(
        &self,
        photo: &PhotoRecord,
        used_names: &mut UsedNames,
        summary: &mut BackupSummary,
    ) -> Result<(), BackupError> {
        let Some(variant) = photo.largest_variant() else {
            error!("{}", BackupError::NoSizeVariants { photo_id: photo.id });
            summary.failed += 1;
            return Ok(());
        };

        let target = UploadTarget {
            folder: self.settings.folder.clone(),
            file_name: used_names.resolve(photo.like_count, self.today),
        };
        let photo_path = target.photo_path();

        let content = match self.source.download(&variant.url).await {
            Ok(content) => content,
            Err(e) => {
                error!("file {photo_path} has not uploaded: {e}");
                summary.failed += 1;
                return Ok(());
            }
        };

        match photo.taken_at {
            Some(taken_at) => info!("uploading file {photo_path} (photo {} taken {taken_at})", photo.id),
            None => info!("uploading file {photo_path} (photo {})", photo.id),
        }
        match self.storage.upload(content, &photo_path).await {
            Ok(CREATED) => info!("file {photo_path} has uploaded successfully"),
            Ok(status) => {
                error!("file {photo_path} has not uploaded: storage answered {status}");
                summary.failed += 1;
                return Ok(());
            }
            Err(e) => {
                error!("file {photo_path} has not uploaded: {e}");
                summary.failed += 1;
                return Ok(());
            }
        }
        used_names.mark(photo.like_count);
        summary.uploaded += 1;

        let entry = LedgerEntry {
            file_name: format!("{}.jpg", target.file_name),
            size_tag: variant.tag.clone(),
        };

        let metadata_path = target.metadata_path();
        info!("uploading file {metadata_path}");
        let metadata_status = match ledger::sidecar(&entry) {
            Ok(sidecar) => self.storage.upload(sidecar, &metadata_path).await,
            Err(e) => Err(e),
        };
        match metadata_status {
            Ok(CREATED) => info!("file {metadata_path} has uploaded successfully"),
            Ok(status) => {
                error!("file {metadata_path} has not uploaded: storage answered {status}");
                summary.metadata_failed += 1;
            }
            Err(e) => {
                error!("file {metadata_path} has not uploaded: {e}");
                summary.metadata_failed += 1;
            }
        }

        ledger::append(&entry, &self.settings.ledger_path).inspect_err(|e| error!("{e}"))
    }
}
