//! Bookmark store loading
//!
//! Reads the persisted plist once per run and hands back the tree together
//! with a [`StoreHandle`], the only way later stages refer to the file.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::codec;
use crate::domain::{BookmarkTree, StoreFormat};
use crate::infrastructure::traits::FileSystem;

/// Handle to the persisted store as it was when loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHandle {
    path: PathBuf,
    format: StoreFormat,
    sha256: String,
}

impl StoreHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> StoreFormat {
        self.format
    }

    /// Hex SHA-256 of the bytes that were parsed.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}

/// A loaded tree plus the handle of the file it came from.
#[derive(Debug)]
pub struct LoadedStore {
    pub handle: StoreHandle,
    pub tree: BookmarkTree,
}

/// Loads bookmark trees from the filesystem.
pub struct TreeStore {
    fs: Arc<dyn FileSystem>,
}

impl TreeStore {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Read and parse the store at `path`.
    ///
    /// # Errors
    /// - [`ApplicationError::Permission`] when the OS denies access
    /// - [`ApplicationError::Load`] when the file is absent or unreadable
    /// - [`ApplicationError::Malformed`] when the content is not a bookmark plist
    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, path: &Path) -> ApplicationResult<LoadedStore> {
        let bytes = self.fs.read(path).map_err(|e| load_error(path, e))?;
        let (tree, format) =
            codec::decode_bytes(&bytes).map_err(|source| ApplicationError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        let handle = StoreHandle {
            path: path.to_path_buf(),
            format,
            sha256: sha256_hex(&bytes),
        };
        debug!(
            %format,
            nodes = tree.len(),
            bookmarks = tree.bookmark_count(),
            "bookmark store loaded"
        );
        Ok(LoadedStore { handle, tree })
    }
}

fn load_error(path: &Path, err: io::Error) -> ApplicationError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => ApplicationError::Permission(path.to_path_buf()),
        io::ErrorKind::NotFound => ApplicationError::Load {
            path: path.to_path_buf(),
            message: "file not found".to_string(),
        },
        _ => ApplicationError::Load {
            path: path.to_path_buf(),
            message: err.to_string(),
        },
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_permission_denied_when_mapping_then_permission_error() {
        let path = Path::new("/Users/me/Library/Safari/Bookmarks.plist");

        let err = load_error(path, io::Error::from(io::ErrorKind::PermissionDenied));

        assert!(matches!(err, ApplicationError::Permission(p) if p == path));
    }

    #[test]
    fn given_not_found_when_mapping_then_load_error() {
        let path = Path::new("Bookmarks.plist");

        let err = load_error(path, io::Error::from(io::ErrorKind::NotFound));

        assert!(matches!(err, ApplicationError::Load { message, .. } if message == "file not found"));
    }
}
