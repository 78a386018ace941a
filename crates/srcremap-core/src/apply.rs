//! Range application.
//!
//! Rewrites every unit of an input store by splicing new names into the
//! spans recorded in a [`RangeMap`]. A unit is rewritten in one left-to-right
//! pass: text between spans is copied verbatim, each span is replaced by its
//! mapped name (or kept), and the tail is copied. All offsets refer to the
//! pristine text; output goes into a fresh buffer.
//!
//! # Phases
//!
//! 1. Read every unit from the input store, sequentially.
//! 2. Rewrite units independently (in parallel with `parallel = true`).
//! 3. Write results and append log entries, in unit order.
//!
//! Because every read happens before the first write, an in-place run can
//! never observe its own output.

use std::collections::BTreeSet;

use rayon::prelude::*;
use thiserror::Error;

use crate::log::{RenameEntry, RenameLog};
use crate::rangemap::{Occurrence, RangeMap, Span};
use crate::signature::{package_of, simple_name, source_name, OccurrenceKind};
use crate::store::{SourceStore, StoreError};
use crate::table::RenameTable;
use crate::text::CharIndex;

// ============================================================================
// Configuration
// ============================================================================

/// Options controlling application.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Write units whose text did not change even when rewriting in place.
    pub overwrite_if_unmapped: bool,
    /// Rewrite units on the rayon pool.
    pub parallel: bool,
    /// Unit id suffixes that are source text. Other units are copied
    /// through byte for byte when the output store is separate.
    pub extensions: Vec<String>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        ApplyOptions {
            overwrite_if_unmapped: false,
            parallel: true,
            extensions: vec![".java".to_string()],
        }
    }
}

/// Where units are read from and written to.
pub enum Stores<'a> {
    Separate {
        input: &'a dyn SourceStore,
        output: &'a mut dyn SourceStore,
    },
    /// One store is both input and output.
    InPlace(&'a mut dyn SourceStore),
}

impl Stores<'_> {
    fn input(&self) -> &dyn SourceStore {
        match self {
            Stores::Separate { input, .. } => *input,
            Stores::InPlace(store) => &**store,
        }
    }

    fn is_in_place(&self) -> bool {
        matches!(self, Stores::InPlace(_))
    }
}

// ============================================================================
// Errors and Report
// ============================================================================

/// A per-unit failure. The unit is left unchanged; other units proceed.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("unit {unit} is in the range map but not in the input store")]
    MissingUnit { unit: String },

    #[error("unit {unit}: span {span} is beyond the unit length {len}")]
    SpanOutOfBounds { unit: String, span: Span, len: usize },

    #[error("unit {unit}: read failed: {source}")]
    Read {
        unit: String,
        #[source]
        source: StoreError,
    },

    #[error("unit {unit}: write failed: {source}")]
    Write {
        unit: String,
        #[source]
        source: StoreError,
    },
}

impl ApplyError {
    pub fn unit(&self) -> &str {
        match self {
            ApplyError::MissingUnit { unit }
            | ApplyError::SpanOutOfBounds { unit, .. }
            | ApplyError::Read { unit, .. }
            | ApplyError::Write { unit, .. } => unit,
        }
    }
}

/// Outcome of [`remap_sources`].
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub log: RenameLog,
    /// Units written to the output store, in order.
    pub written: Vec<String>,
    /// Text units left unchanged and not written.
    pub unchanged: usize,
    /// Non-source units copied through.
    pub copied: usize,
    pub errors: Vec<ApplyError>,
}

impl ApplyReport {
    pub fn units_written(&self) -> usize {
        self.written.len()
    }

    /// Distinct units with at least one error.
    pub fn units_failed(&self) -> usize {
        self.errors
            .iter()
            .map(ApplyError::unit)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

// ============================================================================
// Single Unit
// ============================================================================

/// Result of rewriting one unit's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRewrite {
    pub text: String,
    /// Substitutions that changed the text, in offset order.
    pub entries: Vec<RenameEntry>,
}

impl UnitRewrite {
    pub fn changed(&self) -> bool {
        !self.entries.is_empty()
    }
}

/// Rewrite one unit.
///
/// `occurrences` must be ordered and non-overlapping, as a [`RangeMap`]
/// guarantees.
pub fn rewrite_unit(
    unit_id: &str,
    text: &str,
    occurrences: &[Occurrence],
    table: &RenameTable,
) -> Result<UnitRewrite, ApplyError> {
    let index = CharIndex::new(text);
    let out_of_bounds = |span: Span| ApplyError::SpanOutOfBounds {
        unit: unit_id.to_string(),
        span,
        len: index.char_len(),
    };

    let mut out = String::with_capacity(text.len());
    let mut entries = Vec::new();
    let mut cursor = 0;

    for occ in occurrences {
        let start = index
            .byte_of(occ.span.start)
            .ok_or_else(|| out_of_bounds(occ.span))?;
        let end = index
            .byte_of(occ.span.end)
            .ok_or_else(|| out_of_bounds(occ.span))?;

        out.push_str(&text[cursor..start]);
        let original = &text[start..end];
        match replacement(occ, original, table) {
            Some(new) if new != original => {
                tracing::debug!(unit = unit_id, offset = occ.span.start, old = original, new = %new, "substitute");
                out.push_str(&new);
                entries.push(RenameEntry {
                    old: original.to_string(),
                    new,
                    unit_id: unit_id.to_string(),
                    offset: occ.span.start,
                });
            }
            _ => out.push_str(original),
        }
        cursor = end;
    }
    out.push_str(&text[cursor..]);

    Ok(UnitRewrite { text: out, entries })
}

/// The text an occurrence should become, if the table maps it.
///
/// Parameter-specific entries win over general entries. Otherwise the
/// primary signature is tried, then each fallback in order.
pub fn replacement(occ: &Occurrence, original: &str, table: &RenameTable) -> Option<String> {
    if occ.kind == OccurrenceKind::Parameter {
        if let Some((method, index)) = occ.signature.split_parameter() {
            if let Some(name) = table.lookup_param(method, index) {
                return Some(name.to_string());
            }
        }
    }

    let mapped = std::iter::once(&occ.signature)
        .chain(&occ.fallbacks)
        .find_map(|sig| table.lookup(sig.as_str()));

    match occ.kind {
        OccurrenceKind::Type => type_replacement(occ.signature.as_str(), mapped, original, table),
        _ => mapped.map(|name| member_name(name).to_string()),
    }
}

/// Qualified source text gets the full new name; simple text the simple name.
fn type_replacement(
    binary: &str,
    mapped: Option<&str>,
    original: &str,
    table: &RenameTable,
) -> Option<String> {
    let qualified = original.contains('.');
    match mapped {
        Some(new) if qualified => Some(source_name(new)),
        Some(new) => Some(simple_name(new).to_string()),
        None if qualified => {
            let package = package_of(binary);
            let new_package = table.lookup_package(package)?;
            let rest = binary[package.len()..].trim_start_matches('.');
            let renamed = if new_package.is_empty() {
                rest.to_string()
            } else {
                format!("{}.{}", new_package, rest)
            };
            Some(source_name(&renamed))
        }
        None => None,
    }
}

/// Members keep `$` (legal in identifiers); only a dotted owner is dropped.
fn member_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

// ============================================================================
// Whole Store
// ============================================================================

enum Content {
    Text(String),
    Raw(Vec<u8>),
}

struct Job {
    unit: String,
    content: Content,
}

enum Outcome {
    Rewritten(UnitRewrite),
    Copy(Vec<u8>),
    /// Unit left as its pristine text.
    Failed(ApplyError, String),
}

/// Apply `table` to every unit of the input store.
///
/// Only an input store that cannot be enumerated is an error; per-unit
/// failures land in [`ApplyReport::errors`].
pub fn remap_sources(
    stores: Stores<'_>,
    range_map: &RangeMap,
    table: &RenameTable,
    options: &ApplyOptions,
) -> Result<ApplyReport, StoreError> {
    let in_place = stores.is_in_place();
    let mut report = ApplyReport::default();

    let jobs = read_jobs(stores.input(), range_map, options, in_place, &mut report)?;
    tracing::info!(units = jobs.len(), in_place, "applying rename table");

    let run = |job: &Job| -> Outcome {
        match &job.content {
            Content::Raw(bytes) => Outcome::Copy(bytes.clone()),
            Content::Text(text) => {
                match rewrite_unit(&job.unit, text, range_map.occurrences(&job.unit), table) {
                    Ok(rewrite) => Outcome::Rewritten(rewrite),
                    Err(err) => Outcome::Failed(err, text.clone()),
                }
            }
        }
    };
    let outcomes: Vec<Outcome> = if options.parallel {
        jobs.par_iter().map(run).collect()
    } else {
        jobs.iter().map(run).collect()
    };

    let output: &mut dyn SourceStore = match stores {
        Stores::Separate { output, .. } => output,
        Stores::InPlace(store) => store,
    };

    for (job, outcome) in jobs.iter().zip(outcomes) {
        let unit = job.unit.as_str();
        let bytes = match outcome {
            Outcome::Copy(bytes) => {
                report.copied += 1;
                bytes
            }
            Outcome::Rewritten(rewrite) => {
                let changed = rewrite.changed();
                report.log.append(rewrite.entries);
                if !changed && in_place && !options.overwrite_if_unmapped {
                    report.unchanged += 1;
                    continue;
                }
                rewrite.text.into_bytes()
            }
            Outcome::Failed(err, original) => {
                tracing::warn!(error = %err, "unit left unchanged");
                report.errors.push(err);
                if in_place {
                    continue;
                }
                original.into_bytes()
            }
        };

        match output.write_bytes(unit, &bytes) {
            Ok(()) => report.written.push(unit.to_string()),
            Err(source) => {
                let err = ApplyError::Write {
                    unit: unit.to_string(),
                    source,
                };
                tracing::warn!(error = %err, "write rejected");
                report.errors.push(err);
            }
        }
    }

    tracing::info!(
        written = report.units_written(),
        unchanged = report.unchanged,
        copied = report.copied,
        substitutions = report.log.len(),
        failed = report.units_failed(),
        "apply finished"
    );
    Ok(report)
}

fn read_jobs(
    input: &dyn SourceStore,
    range_map: &RangeMap,
    options: &ApplyOptions,
    in_place: bool,
    report: &mut ApplyReport,
) -> Result<Vec<Job>, StoreError> {
    let unit_ids = input.enumerate()?;

    let present: BTreeSet<&str> = unit_ids.iter().map(String::as_str).collect();
    for unit in range_map.units() {
        if !present.contains(unit) {
            let err = ApplyError::MissingUnit {
                unit: unit.to_string(),
            };
            tracing::warn!(error = %err, "range map unit skipped");
            report.errors.push(err);
        }
    }

    let mut jobs = Vec::with_capacity(unit_ids.len());
    for unit in unit_ids {
        let is_source = options
            .extensions
            .iter()
            .any(|ext| unit.ends_with(ext.as_str()));

        let content = if is_source {
            match input.read(&unit) {
                Ok(text) => Some(Content::Text(text)),
                Err(source) => {
                    tracing::warn!(unit = %unit, error = %source, "unit unreadable, left unchanged");
                    report.errors.push(ApplyError::Read {
                        unit: unit.clone(),
                        source,
                    });
                    // Still carried through to a separate output.
                    if in_place {
                        None
                    } else {
                        input.read_bytes(&unit).ok().map(Content::Raw)
                    }
                }
            }
        } else if in_place {
            None
        } else {
            match input.read_bytes(&unit) {
                Ok(bytes) => Some(Content::Raw(bytes)),
                Err(source) => {
                    report.errors.push(ApplyError::Read {
                        unit: unit.clone(),
                        source,
                    });
                    None
                }
            }
        };

        if let Some(content) = content {
            jobs.push(Job { unit, content });
        }
    }
    Ok(jobs)
}

// ============================================================================
// Tests
// ============================================================================
