//! Rename log: every substitution the applier actually made.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

/// One substitution. `offset` is the char offset in the pristine unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameEntry {
    pub old: String,
    pub new: String,
    pub unit_id: String,
    pub offset: usize,
}

/// Append-only, ordered by unit then offset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenameLog {
    entries: Vec<RenameEntry>,
}

impl RenameLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: RenameEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn append(&mut self, entries: Vec<RenameEntry>) {
        self.entries.extend(entries);
    }

    pub fn entries(&self) -> &[RenameEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `old<TAB>new<TAB>unit<TAB>offset`, one line per entry.
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        for e in &self.entries {
            writeln!(out, "{}\t{}\t{}\t{}", e.old, e.new, e.unit_id, e.offset)?;
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write_to(&mut out)?;
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_format() {
        let mut log = RenameLog::new();
        log.push(RenameEntry {
            old: "foo".into(),
            new: "baz".into(),
            unit_id: "A.java".into(),
            offset: 14,
        });
        let mut buf = Vec::new();
        log.write_to(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "foo\tbaz\tA.java\t14\n");
    }
}
