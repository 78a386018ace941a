//! Directory-backed store.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use super::{validate_unit_id, SourceStore, StoreError, StoreMode, StoreResult};

/// Units map 1:1 to files under a root directory.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    mode: StoreMode,
    /// Original bytes of units overwritten in in-place mode.
    pristine: HashMap<String, Vec<u8>>,
    closed: bool,
}

impl DirectoryStore {
    /// Open an existing directory for reading.
    pub fn open(root: &Path) -> StoreResult<Self> {
        Self::existing(root, StoreMode::Read)
    }

    /// Open an existing directory as both input and output.
    pub fn open_in_place(root: &Path) -> StoreResult<Self> {
        Self::existing(root, StoreMode::InPlace)
    }

    /// Create (if needed) a directory for output.
    pub fn create(root: &Path) -> StoreResult<Self> {
        fs::create_dir_all(root)?;
        Ok(DirectoryStore {
            root: root.to_path_buf(),
            mode: StoreMode::Write,
            pristine: HashMap::new(),
            closed: false,
        })
    }

    fn existing(root: &Path, mode: StoreMode) -> StoreResult<Self> {
        if !root.is_dir() {
            return Err(StoreError::NotFound {
                path: root.to_path_buf(),
            });
        }
        Ok(DirectoryStore {
            root: root.to_path_buf(),
            mode,
            pristine: HashMap::new(),
            closed: false,
        })
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            Err(StoreError::Closed {
                path: self.root.clone(),
            })
        } else {
            Ok(())
        }
    }
}

impl SourceStore for DirectoryStore {
    fn locator(&self) -> &Path {
        &self.root
    }

    fn mode(&self) -> StoreMode {
        self.mode
    }

    fn enumerate(&self) -> StoreResult<Vec<String>> {
        self.ensure_open()?;
        let mut units = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| {
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed"))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let id = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            units.push(id);
        }
        units.sort();
        Ok(units)
    }

    fn read_bytes(&self, unit_id: &str) -> StoreResult<Vec<u8>> {
        self.ensure_open()?;
        validate_unit_id(unit_id)?;
        if let Some(original) = self.pristine.get(unit_id) {
            return Ok(original.clone());
        }
        let path = self.root.join(unit_id);
        if !path.is_file() {
            return Err(StoreError::UnknownUnit {
                unit: unit_id.to_string(),
            });
        }
        Ok(fs::read(path)?)
    }

    fn write_bytes(&mut self, unit_id: &str, bytes: &[u8]) -> StoreResult<()> {
        self.ensure_open()?;
        if !self.mode.is_writable() {
            return Err(StoreError::ReadOnly {
                path: self.root.clone(),
            });
        }
        validate_unit_id(unit_id)?;
        let path = self.root.join(unit_id);

        if self.mode == StoreMode::InPlace && !self.pristine.contains_key(unit_id) && path.is_file()
        {
            let original = fs::read(&path)?;
            self.pristine.insert(unit_id.to_string(), original);
        }

        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        if !self.closed {
            self.closed = true;
            self.pristine.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/C.java"), "class C {}").unwrap();
        fs::write(dir.path().join("D.java"), "class D {}").unwrap();
        dir
    }

    #[test]
    fn enumerates_sorted_relative_ids() {
        let dir = seeded();
        let store = DirectoryStore::open(dir.path()).unwrap();
        assert_eq!(store.enumerate().unwrap(), vec!["D.java", "a/b/C.java"]);
        // Restartable.
        assert_eq!(store.enumerate().unwrap().len(), 2);
    }

    #[test]
    fn missing_root_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = DirectoryStore::open(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn read_only_rejects_writes() {
        let dir = seeded();
        let mut store = DirectoryStore::open(dir.path()).unwrap();
        let err = store.write("D.java", "x").unwrap_err();
        assert!(matches!(err, StoreError::ReadOnly { .. }));
    }

    #[test]
    fn in_place_reads_stay_pristine() {
        let dir = seeded();
        let mut store = DirectoryStore::open_in_place(dir.path()).unwrap();
        store.write("D.java", "class E {}").unwrap();

        assert_eq!(store.read("D.java").unwrap(), "class D {}");
        assert_eq!(
            fs::read_to_string(dir.path().join("D.java")).unwrap(),
            "class E {}"
        );
    }

    #[test]
    fn write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let mut store = DirectoryStore::create(&out).unwrap();
        store.write("x/y/Z.java", "class Z {}").unwrap();
        assert_eq!(
            fs::read_to_string(out.join("x/y/Z.java")).unwrap(),
            "class Z {}"
        );
    }

    #[test]
    fn close_is_idempotent_and_final() {
        let dir = seeded();
        let mut store = DirectoryStore::open(dir.path()).unwrap();
        store.close().unwrap();
        store.close().unwrap();
        assert!(matches!(
            store.read("D.java").unwrap_err(),
            StoreError::Closed { .. }
        ));
    }
}
