//! Archive-backed store (zip / jar).
//!
//! Every entry is buffered in memory when the archive is opened, and writes
//! accumulate in memory until [`SourceStore::close`] writes one archive. The
//! archive is assembled in a temporary file beside the target and renamed over
//! it, so a failed flush leaves the previous archive intact.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{validate_unit_id, SourceStore, StoreError, StoreMode, StoreResult};

/// Units are the file entries of one zip archive.
#[derive(Debug)]
pub struct ArchiveStore {
    path: PathBuf,
    mode: StoreMode,
    entries: BTreeMap<String, Vec<u8>>,
    pristine: HashMap<String, Vec<u8>>,
    dirty: bool,
    closed: bool,
}

impl ArchiveStore {
    /// Open an existing archive for reading.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::load(path, StoreMode::Read)
    }

    /// Open an existing archive for rewriting. Entries that are never written
    /// are carried through unchanged when the archive is flushed.
    pub fn open_in_place(path: &Path) -> StoreResult<Self> {
        Self::load(path, StoreMode::InPlace)
    }

    /// Start a new, empty output archive. Nothing touches disk until `close`.
    pub fn create(path: &Path) -> Self {
        ArchiveStore {
            path: path.to_path_buf(),
            mode: StoreMode::Write,
            entries: BTreeMap::new(),
            pristine: HashMap::new(),
            dirty: true,
            closed: false,
        }
    }

    fn load(path: &Path, mode: StoreMode) -> StoreResult<Self> {
        if !path.is_file() {
            return Err(StoreError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file).map_err(|e| archive_error(path, e))?;

        let mut entries = BTreeMap::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| archive_error(path, e))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| archive_error(path, e))?;
            entries.insert(name, bytes);
        }

        tracing::debug!(path = %path.display(), entries = entries.len(), "archive buffered");

        Ok(ArchiveStore {
            path: path.to_path_buf(),
            mode,
            entries,
            pristine: HashMap::new(),
            dirty: false,
            closed: false,
        })
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            Err(StoreError::Closed {
                path: self.path.clone(),
            })
        } else {
            Ok(())
        }
    }

    fn flush(&self) -> StoreResult<()> {
        let parent = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(parent)?;
        let mut writer = ZipWriter::new(tmp);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, bytes) in &self.entries {
            writer
                .start_file(name.as_str(), options)
                .map_err(|e| archive_error(&self.path, e))?;
            writer.write_all(bytes)?;
        }
        let mut tmp = writer.finish().map_err(|e| archive_error(&self.path, e))?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        tracing::debug!(path = %self.path.display(), entries = self.entries.len(), "archive written");
        Ok(())
    }
}

fn archive_error(path: &Path, err: impl std::fmt::Display) -> StoreError {
    StoreError::Archive {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

impl SourceStore for ArchiveStore {
    fn locator(&self) -> &Path {
        &self.path
    }

    fn mode(&self) -> StoreMode {
        self.mode
    }

    fn enumerate(&self) -> StoreResult<Vec<String>> {
        self.ensure_open()?;
        Ok(self.entries.keys().cloned().collect())
    }

    fn read_bytes(&self, unit_id: &str) -> StoreResult<Vec<u8>> {
        self.ensure_open()?;
        if let Some(original) = self.pristine.get(unit_id) {
            return Ok(original.clone());
        }
        self.entries
            .get(unit_id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownUnit {
                unit: unit_id.to_string(),
            })
    }

    fn write_bytes(&mut self, unit_id: &str, bytes: &[u8]) -> StoreResult<()> {
        self.ensure_open()?;
        if !self.mode.is_writable() {
            return Err(StoreError::ReadOnly {
                path: self.path.clone(),
            });
        }
        validate_unit_id(unit_id)?;

        let previous = self.entries.insert(unit_id.to_string(), bytes.to_vec());
        if self.mode == StoreMode::InPlace {
            if let Some(original) = previous {
                self.pristine.entry(unit_id.to_string()).or_insert(original);
            }
        }
        self.dirty = true;
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = if self.mode.is_writable() && self.dirty {
            self.flush()
        } else {
            Ok(())
        };
        self.entries.clear();
        self.pristine.clear();
        result
    }
}

impl Drop for ArchiveStore {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.close() {
                tracing::warn!(path = %self.path.display(), error = %err, "archive flush on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        for (name, content) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn reads_buffered_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src.zip");
        write_zip(&path, &[("b/B.java", "class B {}"), ("A.java", "class A {}")]);

        let store = ArchiveStore::open(&path).unwrap();
        assert_eq!(store.enumerate().unwrap(), vec!["A.java", "b/B.java"]);
        assert_eq!(store.read("b/B.java").unwrap(), "class B {}");
        assert!(matches!(
            store.read("C.java").unwrap_err(),
            StoreError::UnknownUnit { .. }
        ));
    }

    #[test]
    fn corrupt_archive_is_archive_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.jar");
        fs::write(&path, b"definitely not a zip").unwrap();
        assert!(matches!(
            ArchiveStore::open(&path).unwrap_err(),
            StoreError::Archive { .. }
        ));
    }

    #[test]
    fn writes_flush_on_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/result.zip");

        let mut store = ArchiveStore::create(&path);
        store.write("A.java", "class A {}").unwrap();
        assert!(!path.exists());
        store.close().unwrap();
        store.close().unwrap();

        let reread = ArchiveStore::open(&path).unwrap();
        assert_eq!(reread.read("A.java").unwrap(), "class A {}");
    }

    #[test]
    fn in_place_keeps_untouched_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src.jar");
        write_zip(
            &path,
            &[("A.java", "class A {}"), ("META-INF/MANIFEST.MF", "x")],
        );

        let mut store = ArchiveStore::open_in_place(&path).unwrap();
        store.write("A.java", "class Z {}").unwrap();
        assert_eq!(store.read("A.java").unwrap(), "class A {}");
        store.close().unwrap();

        let reread = ArchiveStore::open(&path).unwrap();
        assert_eq!(reread.read("A.java").unwrap(), "class Z {}");
        assert_eq!(reread.read("META-INF/MANIFEST.MF").unwrap(), "x");
    }

    #[test]
    fn in_place_flush_replaces_the_archive_whole() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src.jar");
        write_zip(&path, &[("A.java", "class A {}"), ("B.java", "class B {}")]);

        let mut store = ArchiveStore::open_in_place(&path).unwrap();
        store.write("B.java", "class Y {}").unwrap();
        store.close().unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, ["src.jar"]);
        let reread = ArchiveStore::open(&path).unwrap();
        assert_eq!(reread.enumerate().unwrap(), ["A.java", "B.java"]);
        assert_eq!(reread.read("B.java").unwrap(), "class Y {}");
    }

    #[test]
    fn failed_flush_leaves_no_partial_output() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.jar");
        fs::create_dir_all(target.join("inner")).unwrap();

        // A directory in the way makes the final rename fail.
        let mut store = ArchiveStore::create(&target);
        store.write("A.java", "class A {}").unwrap();
        assert!(store.close().is_err());

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, ["out.jar"]);
        assert!(target.join("inner").is_dir());
    }
}
