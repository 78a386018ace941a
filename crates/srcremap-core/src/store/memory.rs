//! In-memory store, for pipelining and tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{validate_unit_id, SourceStore, StoreError, StoreMode, StoreResult};

/// Units held in a sorted map. Always writable; never touches disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    locator: PathBuf,
    units: BTreeMap<String, Vec<u8>>,
    closed: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            locator: PathBuf::from("<memory>"),
            ..Default::default()
        }
    }

    /// Build a store from `(unit_id, text)` pairs.
    pub fn with_units<'a>(units: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut store = MemoryStore::new();
        for (id, text) in units {
            store.units.insert(id.to_string(), text.as_bytes().to_vec());
        }
        store
    }

    /// Text of a unit, if present and UTF-8.
    pub fn text(&self, unit_id: &str) -> Option<&str> {
        self.units
            .get(unit_id)
            .and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl SourceStore for MemoryStore {
    fn locator(&self) -> &Path {
        &self.locator
    }

    fn mode(&self) -> StoreMode {
        StoreMode::Write
    }

    fn enumerate(&self) -> StoreResult<Vec<String>> {
        if self.closed {
            return Err(StoreError::Closed {
                path: self.locator.clone(),
            });
        }
        Ok(self.units.keys().cloned().collect())
    }

    fn read_bytes(&self, unit_id: &str) -> StoreResult<Vec<u8>> {
        self.units
            .get(unit_id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownUnit {
                unit: unit_id.to_string(),
            })
    }

    fn write_bytes(&mut self, unit_id: &str, bytes: &[u8]) -> StoreResult<()> {
        validate_unit_id(unit_id)?;
        self.units.insert(unit_id.to_string(), bytes.to_vec());
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        self.closed = true;
        Ok(())
    }
}
