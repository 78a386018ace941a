//! Range map: the hand-off artifact between extraction and application.
//!
//! A [`RangeMap`] holds, per source unit, the ordered occurrences of every
//! identifier the resolver bound to a declaration. Units are kept sorted by
//! id and each unit's spans are strictly increasing and non-overlapping; the
//! map refuses groups that break this, so every consumer can rely on it.
//!
//! ## Line format
//!
//! ```text
//! # comment
//! <unit>\t<start>\t<end>\t<signature>\t<kind>[\t<fallback>,<fallback>...]
//! ```
//!
//! Offsets are char offsets into the pristine unit text.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signature::{OccurrenceKind, SymbolSignature};

// ============================================================================
// Error Types
// ============================================================================

/// Errors building, reading or writing a range map.
#[derive(Debug, Error)]
pub enum RangeMapError {
    /// A unit group violates the span ordering invariant.
    #[error("unit {unit}: span {span} is out of order or overlaps the previous span")]
    Unordered { unit: String, span: Span },

    /// A unit group was inserted twice.
    #[error("unit {unit} already present in range map")]
    DuplicateUnit { unit: String },

    /// A persisted line could not be parsed.
    #[error("malformed range map line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// Core Types
// ============================================================================

/// Half-open char range `[start, end)` within one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(
            start <= end,
            "Span start ({}) must be <= end ({})",
            start,
            end
        );
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Adjacent spans (one ends where the other starts) do NOT overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// One identifier token bound to a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub span: Span,
    pub signature: SymbolSignature,
    pub kind: OccurrenceKind,
    /// Signatures consulted, in order, when `signature` has no mapping.
    /// For methods these are the overridden methods, nearest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<SymbolSignature>,
}

impl Occurrence {
    pub fn new(span: Span, signature: SymbolSignature, kind: OccurrenceKind) -> Self {
        Occurrence {
            span,
            signature,
            kind,
            fallbacks: Vec::new(),
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: Vec<SymbolSignature>) -> Self {
        self.fallbacks = fallbacks;
        self
    }
}

/// Flat, persisted form of an occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRecord {
    pub unit_id: String,
    pub occurrence: Occurrence,
}

/// Ordered occurrences of every unit, grouped by unit id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeMap {
    units: BTreeMap<String, Vec<Occurrence>>,
}

impl RangeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one unit's occurrences.
    ///
    /// The group must be strictly increasing by start and non-overlapping; a
    /// violating group is rejected as a whole so the map never holds a
    /// partially-valid unit.
    pub fn insert_unit(
        &mut self,
        unit_id: impl Into<String>,
        occurrences: Vec<Occurrence>,
    ) -> Result<(), RangeMapError> {
        let unit = unit_id.into();
        if self.units.contains_key(&unit) {
            return Err(RangeMapError::DuplicateUnit { unit });
        }
        let mut prev: Option<Span> = None;
        for occ in &occurrences {
            if let Some(p) = prev {
                if occ.span.start <= p.start || occ.span.overlaps(&p) || occ.span.start < p.end {
                    return Err(RangeMapError::Unordered {
                        unit,
                        span: occ.span,
                    });
                }
            }
            prev = Some(occ.span);
        }
        self.units.insert(unit, occurrences);
        Ok(())
    }

    /// Occurrences of a unit, empty if the unit has none.
    pub fn occurrences(&self, unit_id: &str) -> &[Occurrence] {
        self.units.get(unit_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Unit ids present in the map, sorted.
    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    pub fn contains_unit(&self, unit_id: &str) -> bool {
        self.units.contains_key(unit_id)
    }

    /// Number of units.
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Total number of occurrences.
    pub fn len(&self) -> usize {
        self.units.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every distinct signature referenced, including fallbacks.
    pub fn signatures(&self) -> BTreeSet<&str> {
        self.units
            .values()
            .flatten()
            .flat_map(|o| std::iter::once(&o.signature).chain(o.fallbacks.iter()))
            .map(SymbolSignature::as_str)
            .collect()
    }

    /// Flat records in unit order, then span order.
    pub fn records(&self) -> impl Iterator<Item = RangeRecord> + '_ {
        self.units.iter().flat_map(|(unit, occs)| {
            occs.iter().map(move |o| RangeRecord {
                unit_id: unit.clone(),
                occurrence: o.clone(),
            })
        })
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Write the line format.
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "# srcremap range map: unit\tstart\tend\tsignature\tkind\tfallbacks")?;
        for (unit, occs) in &self.units {
            for o in occs {
                write!(
                    out,
                    "{}\t{}\t{}\t{}\t{}",
                    unit, o.span.start, o.span.end, o.signature, o.kind
                )?;
                if !o.fallbacks.is_empty() {
                    let joined: Vec<&str> = o.fallbacks.iter().map(|s| s.as_str()).collect();
                    write!(out, "\t{}", joined.join(","))?;
                }
                writeln!(out)?;
            }
        }
        Ok(())
    }

    /// Read the line format. Any malformed line fails the whole read.
    pub fn read_from(input: impl BufRead) -> Result<Self, RangeMapError> {
        let mut groups: BTreeMap<String, Vec<Occurrence>> = BTreeMap::new();
        for (i, line) in input.lines().enumerate() {
            let line = line?;
            let line_no = i + 1;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let (unit, occ) = parse_record(&line).map_err(|reason| RangeMapError::Malformed {
                line: line_no,
                reason,
            })?;
            groups.entry(unit).or_default().push(occ);
        }

        let mut map = RangeMap::new();
        for (unit, occs) in groups {
            map.insert_unit(unit, occs)?;
        }
        Ok(map)
    }

    /// Persist to a file.
    pub fn save(&self, path: &Path) -> Result<(), RangeMapError> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write_to(&mut out)?;
        out.flush()?;
        Ok(())
    }

    /// Load from a file.
    pub fn load(path: &Path) -> Result<Self, RangeMapError> {
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file))
    }
}

fn parse_record(line: &str) -> Result<(String, Occurrence), String> {
    let fields: Vec<&str> = line.split('\t').collect();
    if !(5..=6).contains(&fields.len()) {
        return Err(format!("expected 5 or 6 tab-separated fields, found {}", fields.len()));
    }
    let start: usize = fields[1]
        .parse()
        .map_err(|_| format!("bad start offset '{}'", fields[1]))?;
    let end: usize = fields[2]
        .parse()
        .map_err(|_| format!("bad end offset '{}'", fields[2]))?;
    if start > end {
        return Err(format!("start {} after end {}", start, end));
    }
    if fields[3].is_empty() {
        return Err("empty signature".to_string());
    }
    let kind: OccurrenceKind = fields[4].parse()?;
    let fallbacks = match fields.get(5) {
        Some(list) if !list.is_empty() => list.split(',').map(SymbolSignature::from).collect(),
        _ => Vec::new(),
    };
    let occ = Occurrence::new(Span::new(start, end), SymbolSignature::from(fields[3]), kind)
        .with_fallbacks(fallbacks);
    Ok((fields[0].to_string(), occ))
}

// ============================================================================
// Tests
// ============================================================================
