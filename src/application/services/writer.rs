//! Applying a removal plan and persisting the result.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::application::services::backup::Snapshot;
use crate::application::services::store::StoreHandle;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::codec;
use crate::domain::{BookmarkTree, MutationPlan, StoreFormat};
use crate::infrastructure::traits::FileSystem;

pub struct TreeWriter {
    fs: Arc<dyn FileSystem>,
}

impl TreeWriter {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Detach every planned bookmark from `tree`. Returns the number removed.
    ///
    /// Ids no longer present (e.g. inside an already removed folder) are skipped.
    pub fn apply(&self, tree: &mut BookmarkTree, plan: &MutationPlan) -> usize {
        let mut removed = 0;
        for id in plan.ids() {
            match tree.remove(id) {
                Ok(()) => removed += 1,
                Err(e) => debug!(%id, "skip planned removal: {}", e),
            }
        }
        removed
    }

    pub fn serialize(&self, tree: &BookmarkTree, format: StoreFormat) -> ApplicationResult<Vec<u8>> {
        Ok(codec::encode_bytes(tree, format)?)
    }

    /// Atomically replace the store with `tree`.
    ///
    /// Requires the [`Snapshot`] taken from this same store; the original file
    /// is left untouched on any failure.
    #[instrument(level = "debug", skip_all, fields(path = %handle.path().display()))]
    pub fn commit(
        &self,
        handle: &StoreHandle,
        snapshot: &Snapshot,
        tree: &BookmarkTree,
    ) -> ApplicationResult<()> {
        let path = handle.path();
        if snapshot.source() != path {
            return Err(write_error(
                path,
                snapshot.path(),
                format!("backup belongs to {}", snapshot.source().display()),
            ));
        }

        let bytes = self
            .serialize(tree, handle.format())
            .map_err(|e| write_error(path, snapshot.path(), e.to_string()))?;

        self.fs.write_atomic(path, &bytes).map_err(|e| {
            warn!("atomic replace of {} failed: {}", path.display(), e);
            write_error(path, snapshot.path(), e.to_string())
        })?;

        info!(bytes = bytes.len(), format = %handle.format(), "bookmark store written");
        Ok(())
    }
}

fn write_error(path: &Path, backup: &Path, message: String) -> ApplicationError {
    ApplicationError::Write {
        path: path.to_path_buf(),
        backup: backup.to_path_buf(),
        message,
    }
}
