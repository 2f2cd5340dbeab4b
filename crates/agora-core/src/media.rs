//! # Media Blob Store
//!
//! The contract for binary media storage and a directory-backed
//! implementation.
//!
//! Blob stores never return errors. A failed upload or delete yields `None`
//! and is logged; each caller decides whether missing media is fatal
//! (profile picture update) or degrades to "no media" (post creation).
//!
//! [`UploadRoot`] confines the local files callers may hand to a store.

use crate::AgoraError;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Kind of an uploaded blob, inferred by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    /// Anything the store could not classify.
    Raw,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    /// Public URL of the blob.
    pub url: String,
    pub kind: MediaKind,
}

/// An opaque blob store.
pub trait BlobStore {
    /// Upload a local file. `None` on failure.
    fn upload(&self, local: &Path) -> Option<StoredMedia>;

    /// Delete a blob by its public id and URL. `None` on failure.
    fn delete(&self, public_id: &str, url: &str) -> Option<()>;
}

/// Public id of a blob: the last URL path segment without its extension.
#[must_use]
pub fn public_id_from_url(url: &str) -> Option<&str> {
    let segment = url.rsplit('/').next()?;
    let id = segment.split('.').next()?;
    if id.is_empty() { None } else { Some(id) }
}

/// Delete a blob, logging instead of failing.
pub(crate) fn discard(blobs: &dyn BlobStore, url: &str) {
    let Some(public_id) = public_id_from_url(url) else {
        warn!(url, "Cannot derive public id from media URL, leaving blob in place");
        return;
    };
    if blobs.delete(public_id, url).is_none() {
        warn!(url, "Failed to delete media blob");
    }
}

// =============================================================================
// UPLOAD ROOT
// =============================================================================

/// The only directory callers may name local media files from.
///
/// Paths are canonicalized before the containment check, so `..` segments
/// and symlinks that leave the root are refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRoot {
    root: PathBuf,
}

impl UploadRoot {
    /// Use `root` (created if missing).
    pub fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: fs::canonicalize(root)?,
        })
    }

    /// Canonical path of the root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied file inside the root.
    ///
    /// Relative paths are taken from the root. Missing files and anything
    /// outside the root are `InvalidInput`.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, AgoraError> {
        let outside = || {
            AgoraError::InvalidInput(format!(
                "Media file '{}' is not inside the upload directory",
                path.display()
            ))
        };
        let resolved = fs::canonicalize(self.root.join(path)).map_err(|_| outside())?;
        if resolved == self.root || !resolved.starts_with(&self.root) || !resolved.is_file() {
            warn!(path = %path.display(), "Rejected media path outside the upload directory");
            return Err(outside());
        }
        Ok(resolved)
    }
}

// =============================================================================
// DISABLED STORE
// =============================================================================

/// A blob store that accepts nothing. Used when no media directory is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBlobStore;

impl BlobStore for DisabledBlobStore {
    fn upload(&self, local: &Path) -> Option<StoredMedia> {
        warn!(path = %local.display(), "Media upload requested but no blob store is configured");
        None
    }

    fn delete(&self, _public_id: &str, _url: &str) -> Option<()> {
        None
    }
}

// =============================================================================
// DIRECTORY STORE
// =============================================================================

/// Stores blobs as files in a directory and serves them under a base URL.
#[derive(Debug)]
pub struct DirectoryBlobStore {
    root: PathBuf,
    base_url: String,
    next: AtomicU64,
}

impl DirectoryBlobStore {
    /// Use `root` (created if missing) and publish files under `base_url`.
    pub fn open(root: impl Into<PathBuf>, base_url: impl Into<String>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let existing = fs::read_dir(&root)?.count() as u64;
        Ok(Self {
            root,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            next: AtomicU64::new(existing),
        })
    }

    /// Directory the blobs are written to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn classify(extension: &str) -> MediaKind {
        match extension.to_ascii_lowercase().as_str() {
            "mp4" | "mov" | "webm" | "mkv" | "avi" | "m4v" => MediaKind::Video,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "svg" | "avif" => MediaKind::Image,
            _ => MediaKind::Raw,
        }
    }

    /// Create a fresh destination file, never overwriting an existing blob.
    fn create_destination(&self, extension: &str) -> io::Result<(String, File)> {
        loop {
            let n = self.next.fetch_add(1, Ordering::Relaxed);
            let name = if extension.is_empty() {
                format!("media-{}", n)
            } else {
                format!("media-{}.{}", n, extension)
            };
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&name))
            {
                Ok(file) => return Ok((name, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn store(&self, local: &Path) -> io::Result<StoredMedia> {
        let extension = local
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut source = File::open(local)?;
        let (name, mut destination) = self.create_destination(&extension)?;
        io::copy(&mut source, &mut destination)?;
        Ok(StoredMedia {
            url: format!("{}/{}", self.base_url, name),
            kind: Self::classify(&extension),
        })
    }
}

impl BlobStore for DirectoryBlobStore {
    fn upload(&self, local: &Path) -> Option<StoredMedia> {
        match self.store(local) {
            Ok(media) => {
                debug!(url = %media.url, "Stored media blob");
                Some(media)
            }
            Err(e) => {
                warn!(path = %local.display(), error = %e, "Media upload failed");
                None
            }
        }
    }

    fn delete(&self, public_id: &str, url: &str) -> Option<()> {
        let name = url.rsplit('/').next()?;
        // Only files this store issued, and only if the id agrees with the URL.
        if !url.starts_with(&self.base_url) || public_id_from_url(url) != Some(public_id) {
            return None;
        }
        match fs::remove_file(self.root.join(name)) {
            Ok(()) => Some(()),
            Err(e) => {
                warn!(url, error = %e, "Media delete failed");
                None
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
