//! Range extraction.
//!
//! Drives a [`SymbolResolver`] over every unit of a store and assembles the
//! [`RangeMap`]. The program index is built once; units are then resolved
//! independently and re-assembled by unit id, so the map is identical no
//! matter how the work was scheduled.
//!
//! ## Failure threshold
//!
//! Extraction "works" unless the resolver could not initialize, more than
//! [`ExtractOptions::max_parse_failure_ratio`] of the units failed to parse,
//! or more than [`ExtractOptions::max_unresolved`] references stayed
//! unresolved. A failed extraction returns an empty range map.

use std::fmt;
use std::path::PathBuf;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::rangemap::{Occurrence, RangeMap, RangeMapError};
use crate::resolver::{
    Diagnostic, DiagnosticKind, ResolvedProgram, SourceUnit, SymbolResolver, UnitResolution,
};
use crate::store::{SourceStore, StoreError};

// ============================================================================
// Configuration
// ============================================================================

/// Tolerances and scheduling for extraction.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Abort when the fraction of units that fail to parse exceeds this.
    pub max_parse_failure_ratio: f64,
    /// Abort when unresolved plus ambiguous references exceed this.
    pub max_unresolved: Option<usize>,
    /// Resolve units on the rayon pool.
    pub parallel: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            max_parse_failure_ratio: 0.5,
            max_unresolved: None,
            parallel: true,
        }
    }
}

// ============================================================================
// Diagnostics Sink
// ============================================================================

/// Receives one call per diagnostic, in unit order then offset order.
pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: &Diagnostic);
}

/// Forwards diagnostics to `tracing` at debug level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&mut self, d: &Diagnostic) {
        tracing::debug!(unit = %d.unit_id, offset = d.offset, kind = %d.kind, "{}", d.message);
    }
}

/// Collects diagnostics in memory.
#[derive(Debug, Default)]
pub struct VecSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl VecSink {
    /// One formatted line per diagnostic.
    pub fn lines(&self) -> Vec<String> {
        self.diagnostics.iter().map(ToString::to_string).collect()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }
}

impl DiagnosticSink for VecSink {
    fn emit(&mut self, d: &Diagnostic) {
        self.diagnostics.push(d.clone());
    }
}

// ============================================================================
// Results
// ============================================================================

/// Fatal errors: the source store itself could not be read.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    RangeMap(#[from] RangeMapError),
}

/// Why an extraction did not work.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExtractFailure {
    ResolverInit { message: String },
    ParseFailures { failed: usize, units: usize, max_ratio: f64 },
    TooManyUnresolved { unresolved: usize, limit: usize },
}

impl fmt::Display for ExtractFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractFailure::ResolverInit { message } => {
                write!(f, "resolver could not initialize: {}", message)
            }
            ExtractFailure::ParseFailures {
                failed,
                units,
                max_ratio,
            } => write!(
                f,
                "{} of {} units failed to parse (tolerance {})",
                failed, units, max_ratio
            ),
            ExtractFailure::TooManyUnresolved { unresolved, limit } => write!(
                f,
                "{} unresolved references exceed the limit of {}",
                unresolved, limit
            ),
        }
    }
}

/// Counters gathered during extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub units: usize,
    pub parse_failures: usize,
    pub occurrences: usize,
    pub unresolved: usize,
    pub ambiguous: usize,
    pub dropped_overlaps: usize,
}

/// Outcome of [`generate_range_map`].
#[derive(Debug)]
pub struct Extraction {
    /// Empty unless `worked`.
    pub range_map: RangeMap,
    pub worked: bool,
    pub failure: Option<ExtractFailure>,
    pub stats: ExtractStats,
}

impl Extraction {
    fn failed(failure: ExtractFailure, stats: ExtractStats) -> Self {
        tracing::warn!(%failure, "extraction did not work");
        Extraction {
            range_map: RangeMap::new(),
            worked: false,
            failure: Some(failure),
            stats,
        }
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Build the range map for every unit in `store` the resolver handles.
pub fn generate_range_map<R: SymbolResolver>(
    store: &dyn SourceStore,
    resolver: &R,
    classpath: &[PathBuf],
    options: &ExtractOptions,
    sink: &mut dyn DiagnosticSink,
) -> Result<Extraction, ExtractError> {
    let mut units = Vec::new();
    for id in store.enumerate()? {
        if resolver.can_handle(&id) {
            let text = store.read(&id)?;
            units.push(SourceUnit::new(id, text));
        }
    }

    let mut stats = ExtractStats {
        units: units.len(),
        ..ExtractStats::default()
    };
    tracing::info!(
        resolver = resolver.name(),
        units = units.len(),
        classpath = classpath.len(),
        "indexing program"
    );

    let program = match resolver.index(classpath, units) {
        Ok(program) => program,
        Err(err) => {
            return Ok(Extraction::failed(
                ExtractFailure::ResolverInit {
                    message: err.to_string(),
                },
                stats,
            ))
        }
    };

    let count = program.unit_count();
    let resolutions: Vec<UnitResolution> = if options.parallel {
        (0..count)
            .into_par_iter()
            .map(|i| program.resolve_unit(i))
            .collect()
    } else {
        (0..count).map(|i| program.resolve_unit(i)).collect()
    };

    let mut grouped: Vec<(String, UnitResolution)> = resolutions
        .into_iter()
        .enumerate()
        .map(|(i, r)| (program.unit_id(i).to_string(), r))
        .collect();
    grouped.sort_by(|a, b| a.0.cmp(&b.0));

    let mut range_map = RangeMap::new();
    for (unit_id, resolution) in grouped {
        let UnitResolution {
            occurrences,
            mut diagnostics,
            parse_failed,
        } = resolution;

        if parse_failed {
            stats.parse_failures += 1;
        }
        let (kept, dropped) = order_occurrences(occurrences);
        for occ in &dropped {
            diagnostics.push(Diagnostic::new(
                unit_id.as_str(),
                occ.span.start,
                DiagnosticKind::Overlap,
                format!("occurrence of {} overlaps the previous one", occ.signature),
            ));
        }
        stats.dropped_overlaps += dropped.len();
        stats.occurrences += kept.len();

        diagnostics.sort_by_key(|d| d.offset);
        for d in &diagnostics {
            match d.kind {
                DiagnosticKind::Unresolved => stats.unresolved += 1,
                DiagnosticKind::Ambiguous => stats.ambiguous += 1,
                DiagnosticKind::Parse | DiagnosticKind::Overlap => {}
            }
            sink.emit(d);
        }

        range_map.insert_unit(unit_id, kept)?;
    }

    tracing::info!(
        units = stats.units,
        occurrences = stats.occurrences,
        unresolved = stats.unresolved,
        ambiguous = stats.ambiguous,
        parse_failures = stats.parse_failures,
        "extraction finished"
    );

    if let Some(failure) = check_threshold(&stats, options) {
        return Ok(Extraction::failed(failure, stats));
    }

    Ok(Extraction {
        range_map,
        worked: true,
        failure: None,
        stats,
    })
}

/// Sort by start and drop every occurrence that overlaps the last kept one.
fn order_occurrences(mut occurrences: Vec<Occurrence>) -> (Vec<Occurrence>, Vec<Occurrence>) {
    occurrences.sort_by_key(|o| (o.span.start, o.span.end));
    let mut kept: Vec<Occurrence> = Vec::with_capacity(occurrences.len());
    let mut dropped = Vec::new();
    for occ in occurrences {
        match kept.last() {
            Some(prev) if occ.span.start < prev.span.end || occ.span.start == prev.span.start => {
                dropped.push(occ)
            }
            _ => kept.push(occ),
        }
    }
    (kept, dropped)
}

fn check_threshold(stats: &ExtractStats, options: &ExtractOptions) -> Option<ExtractFailure> {
    if stats.units > 0 {
        let ratio = stats.parse_failures as f64 / stats.units as f64;
        if ratio > options.max_parse_failure_ratio {
            return Some(ExtractFailure::ParseFailures {
                failed: stats.parse_failures,
                units: stats.units,
                max_ratio: options.max_parse_failure_ratio,
            });
        }
    }
    if let Some(limit) = options.max_unresolved {
        let unresolved = stats.unresolved + stats.ambiguous;
        if unresolved > limit {
            return Some(ExtractFailure::TooManyUnresolved { unresolved, limit });
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
