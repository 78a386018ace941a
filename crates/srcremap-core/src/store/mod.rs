//! Source unit stores.
//!
//! A store is a collection of named units (files) addressed by a stable unit
//! id: the forward-slash relative path inside the collection. The extractor
//! and the applier only ever see the [`SourceStore`] trait; which container
//! backs it is decided once, by [`open_for_read`], [`open_for_write`] or
//! [`open_in_place`].
//!
//! | Backing | Reads | Writes |
//! |---------|-------|--------|
//! | [`DirectoryStore`] | straight from disk | atomic replace per unit |
//! | [`ArchiveStore`] | buffered on open | buffered, flushed on `close` |
//! | [`MemoryStore`] | in memory | in memory |
//!
//! ## In-place mode
//!
//! Using one collection for input and output is an explicit
//! [`StoreMode::InPlace`] flag, not an identity comparison. An in-place store
//! snapshots a unit's original bytes before overwriting it, so reads made
//! during the same run keep returning the pristine text.

mod archive;
mod directory;
mod memory;

pub use archive::ArchiveStore;
pub use directory::DirectoryStore;
pub use memory::MemoryStore;

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by source stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The locator does not exist.
    #[error("store location not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The unit is not present in the store.
    #[error("unknown unit: {unit}")]
    UnknownUnit { unit: String },

    /// The unit id is not a clean relative path.
    #[error("invalid unit id '{unit}'")]
    InvalidUnitId { unit: String },

    /// The unit content is not valid UTF-8 text.
    #[error("unit is not UTF-8 text: {unit}")]
    NotText { unit: String },

    /// The archive is corrupt or could not be written.
    #[error("archive error at {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    /// Write attempted on a store opened for reading.
    #[error("store is read-only: {}", path.display())]
    ReadOnly { path: PathBuf },

    /// Store used after `close`.
    #[error("store already closed: {}", path.display())]
    Closed { path: PathBuf },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Store Trait
// ============================================================================

/// Whether a store may be written, and whether it doubles as its own input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Read,
    Write,
    InPlace,
}

impl StoreMode {
    pub fn is_writable(&self) -> bool {
        !matches!(self, StoreMode::Read)
    }
}

/// Uniform access to a collection of named source units.
pub trait SourceStore: Send {
    /// Where the store lives (directory or archive path).
    fn locator(&self) -> &Path;

    /// How the store was opened.
    fn mode(&self) -> StoreMode;

    /// All unit ids, sorted. Calling it again restarts the enumeration.
    fn enumerate(&self) -> StoreResult<Vec<String>>;

    /// Raw bytes of a unit.
    fn read_bytes(&self, unit_id: &str) -> StoreResult<Vec<u8>>;

    /// Replace (or create) a unit.
    fn write_bytes(&mut self, unit_id: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Release underlying handles. Idempotent: only the first call does work.
    fn close(&mut self) -> StoreResult<()>;

    /// Full text of a unit.
    fn read(&self, unit_id: &str) -> StoreResult<String> {
        let bytes = self.read_bytes(unit_id)?;
        String::from_utf8(bytes).map_err(|_| StoreError::NotText {
            unit: unit_id.to_string(),
        })
    }

    /// Replace (or create) a unit with text.
    fn write(&mut self, unit_id: &str, text: &str) -> StoreResult<()> {
        self.write_bytes(unit_id, text.as_bytes())
    }
}

// ============================================================================
// Opening Stores
// ============================================================================

/// Whether a locator names an archive rather than a directory.
pub fn is_archive_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip") || ext.eq_ignore_ascii_case("jar"))
}

/// Open an existing directory or archive for reading.
pub fn open_for_read(locator: &Path) -> StoreResult<Box<dyn SourceStore>> {
    if is_archive_path(locator) {
        Ok(Box::new(ArchiveStore::open(locator)?))
    } else {
        Ok(Box::new(DirectoryStore::open(locator)?))
    }
}

/// Open a fresh output store. Archives start empty; directories are created.
pub fn open_for_write(locator: &Path) -> StoreResult<Box<dyn SourceStore>> {
    if is_archive_path(locator) {
        Ok(Box::new(ArchiveStore::create(locator)))
    } else {
        Ok(Box::new(DirectoryStore::create(locator)?))
    }
}

/// Open an existing store that is both input and output.
pub fn open_in_place(locator: &Path) -> StoreResult<Box<dyn SourceStore>> {
    if is_archive_path(locator) {
        Ok(Box::new(ArchiveStore::open_in_place(locator)?))
    } else {
        Ok(Box::new(DirectoryStore::open_in_place(locator)?))
    }
}

/// Reject unit ids that could escape the store root.
pub(crate) fn validate_unit_id(unit_id: &str) -> StoreResult<()> {
    let path = Path::new(unit_id);
    let clean = !unit_id.is_empty()
        && !unit_id.contains('\\')
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if clean {
        Ok(())
    } else {
        Err(StoreError::InvalidUnitId {
            unit: unit_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_detection() {
        assert!(is_archive_path(Path::new("src.zip")));
        assert!(is_archive_path(Path::new("build/out.JAR")));
        assert!(!is_archive_path(Path::new("src/main/java")));
        assert!(!is_archive_path(Path::new("notes.txt")));
    }

    #[test]
    fn unit_id_validation() {
        assert!(validate_unit_id("a/b/C.java").is_ok());
        assert!(validate_unit_id("C.java").is_ok());
        assert!(validate_unit_id("").is_err());
        assert!(validate_unit_id("../C.java").is_err());
        assert!(validate_unit_id("/abs/C.java").is_err());
        assert!(validate_unit_id("./C.java").is_err());
        assert!(validate_unit_id("a\\C.java").is_err());
    }
}
