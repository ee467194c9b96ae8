//! Pre-write backups of the bookmark store
//!
//! A [`Snapshot`] can only be obtained from [`BackupManager::snapshot`], and
//! the writer refuses to commit without one, so no destructive write can
//! happen without a verified backup next to the original.
//!
//! ```text
//! ~/Library/Safari/
//!   Bookmarks.plist
//!   Bookmarks.backup.20261017-093012.plist     <- byte-identical copy
//!   Bookmarks.backup.20261017-093012-1.plist   <- second backup in the same second
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{info, instrument, warn};

use crate::application::services::store::{sha256_hex, StoreHandle};
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::infrastructure::traits::FileSystem;

/// Timestamp format of the backup suffix; sorts chronologically.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

const MAX_SAME_SECOND_BACKUPS: u32 = 100;

/// Proof that the store was backed up during this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    path: PathBuf,
    source: PathBuf,
    created_at: DateTime<Local>,
}

impl Snapshot {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }
}

/// Backup path for `source` at `at`: `<stem>.backup.<YYYYMMDD-HHMMSS>.<ext>`.
pub fn backup_path_for(source: &Path, at: DateTime<Local>) -> PathBuf {
    backup_candidate(source, &at.format(BACKUP_TIMESTAMP_FORMAT).to_string())
}

fn backup_candidate(source: &Path, stamp: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Bookmarks".to_string());
    let name = match source.extension() {
        Some(ext) => format!("{}.backup.{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}.backup.{}", stem, stamp),
    };
    source.with_file_name(name)
}

/// Creates verified sibling copies of the store.
pub struct BackupManager {
    fs: Arc<dyn FileSystem>,
}

impl BackupManager {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Copy the store next to itself and verify the copy.
    ///
    /// The copy must hash to the bytes that were loaded; a mismatch means the
    /// file changed since loading and the run must not continue.
    #[instrument(level = "debug", skip(self, handle), fields(source = %handle.path().display()))]
    pub fn snapshot(&self, handle: &StoreHandle) -> ApplicationResult<Snapshot> {
        let source = handle.path();
        let created_at = Local::now();
        let target = self.free_backup_path(source, created_at)?;

        self.fs.copy(source, &target).or_backup_error(&target)?;

        let copied = self.fs.read(&target).or_backup_error(&target)?;
        if sha256_hex(&copied) != handle.sha256() {
            if let Err(e) = self.fs.remove_file(&target) {
                warn!("cannot remove unverified backup {}: {}", target.display(), e);
            }
            return Err(ApplicationError::Backup {
                path: target,
                message: "backup differs from the loaded store (modified since load?)".to_string(),
            });
        }

        info!(backup = %target.display(), "backup created");
        Ok(Snapshot {
            path: target,
            source: source.to_path_buf(),
            created_at,
        })
    }

    fn free_backup_path(&self, source: &Path, at: DateTime<Local>) -> ApplicationResult<PathBuf> {
        let stamp = at.format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let first = backup_candidate(source, &stamp);
        if !self.fs.exists(&first) {
            return Ok(first);
        }
        (1..MAX_SAME_SECOND_BACKUPS)
            .map(|n| backup_candidate(source, &format!("{}-{}", stamp, n)))
            .find(|candidate| !self.fs.exists(candidate))
            .ok_or_else(|| ApplicationError::Backup {
                path: first,
                message: "too many backups within the same second".to_string(),
            })
    }
}
