//! Transient storage for uploaded images
//!
//! Uploads are staged as uniquely named files so an external OCR engine can
//! read them by path. A [`TempFileHandle`] deletes its file when released or
//! dropped, so every exit path of a request cleans up.

use crate::error::RelayError;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempPath;

const PREFIX: &str = "upload_";
const MAX_SUFFIX_LEN: usize = 64;

#[derive(Debug, Default)]
struct Counters {
    created: AtomicU64,
    released: AtomicU64,
}

/// Snapshot of how many staged files were created and released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub created: u64,
    pub released: u64,
}

/// Creates and deletes staged upload files
#[derive(Debug, Clone)]
pub struct TempFileStore {
    dir: Option<PathBuf>,
    counters: Arc<Counters>,
}

/// A staged upload on disk, deleted on release or drop
#[derive(Debug)]
pub struct TempFileHandle {
    path: Option<TempPath>,
    counters: Arc<Counters>,
}

impl TempFileStore {
    /// Stage files in `dir`, or in the system temp directory when `None`
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Write `bytes` to a new uniquely named file
    ///
    /// The name is `upload_<random>_<filename>`, with the filename reduced to
    /// a safe final component.
    pub fn save(&self, bytes: &[u8], original_filename: &str) -> Result<TempFileHandle, RelayError> {
        let suffix = match sanitize_filename(original_filename) {
            Some(name) => format!("_{}", name),
            None => String::new(),
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX).suffix(&suffix);

        let created = match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        let mut file = created
            .map_err(|e| RelayError::Storage(format!("Failed to create temp file: {}", e)))?;

        // A failed write drops `file`, which removes it before we ever hand out a handle
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| RelayError::Storage(format!("Failed to write temp file: {}", e)))?;

        tracing::debug!(path = %file.path().display(), bytes = bytes.len(), "Staged upload");

        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(TempFileHandle {
            path: Some(file.into_temp_path()),
            counters: self.counters.clone(),
        })
    }

    /// Delete a staged file; a file that is already gone is not an error
    pub fn release(&self, handle: TempFileHandle) {
        handle.release();
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            created: self.counters.created.load(Ordering::SeqCst),
            released: self.counters.released.load(Ordering::SeqCst),
        }
    }
}

impl TempFileHandle {
    pub fn path(&self) -> &Path {
        match &self.path {
            Some(path) => &**path,
            None => Path::new(""),
        }
    }

    /// Delete the file now
    pub fn release(mut self) {
        self.delete();
    }

    fn delete(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        let shown = path.display().to_string();
        match path.close() {
            Ok(()) => tracing::debug!(path = %shown, "Released staged upload"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %shown, "Staged upload already removed")
            }
            Err(e) => tracing::warn!(path = %shown, "Failed to remove staged upload: {}", e),
        }
    }
}

impl Drop for TempFileHandle {
    fn drop(&mut self) {
        self.delete();
    }
}

/// Keep the final path component and only `[A-Za-z0-9._-]`
fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');

    if trimmed.is_empty() {
        return None;
    }

    // Keep the tail so the extension survives truncation
    let start = trimmed.len().saturating_sub(MAX_SUFFIX_LEN);
    Some(trimmed[start..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_save_writes_bytes_with_prefix_and_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let store = TempFileStore::new(Some(dir.path().to_path_buf()));

        let handle = store.save(b"image bytes", "test.png").unwrap();
        let name = handle.path().file_name().unwrap().to_string_lossy().to_string();

        assert!(name.starts_with("upload_"));
        assert!(name.ends_with("_test.png"));
        assert_eq!(std::fs::read(handle.path()).unwrap(), b"image bytes");
    }

    #[test]
    fn test_release_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TempFileStore::new(Some(dir.path().to_path_buf()));

        let handle = store.save(b"x", "a.jpg").unwrap();
        let path = handle.path().to_path_buf();
        store.release(handle);

        assert!(!path.exists());
        assert_eq!(entries(dir.path()), 0);
        assert_eq!(store.stats(), StoreStats { created: 1, released: 1 });
    }

    #[test]
    fn test_release_logs_without_panicking_under_subscriber() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();
        let dir = tempfile::tempdir().unwrap();
        let store = TempFileStore::new(Some(dir.path().to_path_buf()));

        tracing::subscriber::with_default(subscriber, || {
            let handle = store.save(b"x", "a.jpg").unwrap();
            store.release(handle);
        });

        assert_eq!(entries(dir.path()), 0);
    }

    #[test]
    fn test_release_of_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = TempFileStore::new(Some(dir.path().to_path_buf()));

        let handle = store.save(b"x", "a.jpg").unwrap();
        std::fs::remove_file(handle.path()).unwrap();
        store.release(handle);

        assert_eq!(store.stats(), StoreStats { created: 1, released: 1 });
    }

    #[test]
    fn test_drop_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TempFileStore::new(Some(dir.path().to_path_buf()));

        {
            let _handle = store.save(b"x", "a.jpg").unwrap();
            assert_eq!(entries(dir.path()), 1);
        }

        assert_eq!(entries(dir.path()), 0);
        assert_eq!(store.stats().released, 1);
    }

    #[test]
    fn test_empty_payload_is_staged() {
        let dir = tempfile::tempdir().unwrap();
        let store = TempFileStore::new(Some(dir.path().to_path_buf()));

        let handle = store.save(&[], "empty.png").unwrap();
        assert_eq!(std::fs::metadata(handle.path()).unwrap().len(), 0);
    }

    #[test]
    fn test_same_filename_gets_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = TempFileStore::new(Some(dir.path().to_path_buf()));

        let a = store.save(b"a", "same.png").unwrap();
        let b = store.save(b"b", "same.png").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_unwritable_dir_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = TempFileStore::new(Some(dir.path().join("does-not-exist")));

        let err = store.save(b"x", "a.png").unwrap_err();
        assert!(matches!(err, RelayError::Storage(_)));
        assert_eq!(store.stats().created, 0);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("test.png").as_deref(), Some("test.png"));
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("C:\\scans\\id card.jpg").as_deref(), Some("id_card.jpg"));
        assert_eq!(sanitize_filename("身份证.png").as_deref(), Some("___.png"));
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename(".."), None);
    }

    #[test]
    fn test_sanitize_keeps_extension_when_truncating() {
        let long = format!("{}.png", "a".repeat(200));
        let cleaned = sanitize_filename(&long).unwrap();
        assert_eq!(cleaned.len(), MAX_SUFFIX_LEN);
        assert!(cleaned.ends_with(".png"));
    }
}
