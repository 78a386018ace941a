//! The remap pipeline: range extraction, then range application.
//!
//! The two phases run strictly one after the other and meet only through the
//! range map file. Stores are chosen by locator: `.zip`/`.jar` paths are
//! archives, anything else a directory. Whether the input is rewritten in
//! place is an explicit [`OutputMode`]; an output locator that names the input
//! itself is rejected rather than silently treated as in-place.

use std::path::{Path, PathBuf};

use srcremap_core::apply::{remap_sources, ApplyOptions, Stores};
use srcremap_core::error::RemapError;
use srcremap_core::extract::{generate_range_map, ExtractOptions, TracingSink};
use srcremap_core::output::{ApplySummary, ExtractionSummary, MappingSummary, RunSummary};
use srcremap_core::rangemap::RangeMap;
use srcremap_core::store::{open_for_read, open_for_write, open_in_place};
use srcremap_core::table::{LoadReport, RenameTable};
use srcremap_java::JavaResolver;
use tracing::{info, warn};

/// Where application writes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Rewrite the input collection.
    #[default]
    InPlace,
    /// Write a separate collection; every input unit lands in it.
    Separate(PathBuf),
}

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct RemapConfig {
    /// Input source collection.
    pub input: PathBuf,
    pub output: OutputMode,
    /// Classpath entries, in lookup order.
    pub classpath: Vec<PathBuf>,
    /// Primary mapping files (symbols, types, packages).
    pub primary: Vec<PathBuf>,
    /// Secondary mapping files (parameter names).
    pub secondary: Vec<PathBuf>,
    /// Where to keep the range map; a temporary file when `None`.
    pub range_map: Option<PathBuf>,
    /// Where to write the rename log; a temporary file when `None`.
    pub rename_log: Option<PathBuf>,
    pub extract: ExtractOptions,
    pub apply: ApplyOptions,
}

impl RemapConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        RemapConfig {
            input: input.into(),
            output: OutputMode::InPlace,
            classpath: Vec::new(),
            primary: Vec::new(),
            secondary: Vec::new(),
            range_map: None,
            rename_log: None,
            extract: ExtractOptions::default(),
            apply: ApplyOptions::default(),
        }
    }

    pub fn is_in_place(&self) -> bool {
        self.output == OutputMode::InPlace
    }

    /// Reject a separate output that resolves to the input collection.
    pub fn check_output(&self) -> Result<(), RemapError> {
        match &self.output {
            OutputMode::Separate(out) if same_path(out, &self.input) => {
                Err(RemapError::invalid_args(format!(
                    "output {} is the input collection; use in-place mode instead",
                    out.display()
                )))
            }
            _ => Ok(()),
        }
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

// ============================================================================
// Phases
// ============================================================================

/// Extract, hand the range map off through a file, then apply.
pub fn run_remap(config: &RemapConfig, summary: &mut RunSummary) -> Result<(), RemapError> {
    config.check_output()?;
    let table = load_table(config, summary)?;
    let range_map_path = extract_to_file(config, summary)?;
    let range_map = RangeMap::load(&range_map_path)?;
    apply(config, &range_map, &table, summary)
}

/// Extraction only: write the range map and stop.
pub fn run_extract(config: &RemapConfig, summary: &mut RunSummary) -> Result<(), RemapError> {
    extract_to_file(config, summary).map(|_| ())
}

/// Application only, from an existing range map file.
pub fn run_apply(
    config: &RemapConfig,
    range_map_path: &Path,
    summary: &mut RunSummary,
) -> Result<(), RemapError> {
    config.check_output()?;
    let table = load_table(config, summary)?;
    let range_map = RangeMap::load(range_map_path)?;
    summary.range_map = Some(range_map_path.display().to_string());
    apply(config, &range_map, &table, summary)
}

/// Range map of the input collection, in memory.
///
/// Fails with [`RemapError::ExtractionFailed`] when extraction did not work;
/// nothing is written in that case.
pub fn extract(config: &RemapConfig, summary: &mut RunSummary) -> Result<RangeMap, RemapError> {
    let mut store = open_for_read(&config.input)?;
    let extraction = generate_range_map(
        store.as_ref(),
        &JavaResolver::new(),
        &config.classpath,
        &config.extract,
        &mut TracingSink,
    )?;
    store.close()?;

    summary.extraction = Some(ExtractionSummary::from(&extraction));
    match extraction.failure {
        Some(failure) => Err(RemapError::ExtractionFailed { failure }),
        None => Ok(extraction.range_map),
    }
}

fn extract_to_file(config: &RemapConfig, summary: &mut RunSummary) -> Result<PathBuf, RemapError> {
    let range_map = extract(config, summary)?;
    let path = match &config.range_map {
        Some(path) => path.clone(),
        None => temporary_file(".rangemap")?,
    };
    range_map.save(&path)?;
    info!(path = %path.display(), occurrences = range_map.len(), "range map written");
    summary.range_map = Some(path.display().to_string());
    Ok(path)
}

fn load_table(config: &RemapConfig, summary: &mut RunSummary) -> Result<RenameTable, RemapError> {
    let (mut table, mut report) = RenameTable::load(&config.primary)?;
    merge_secondary(&mut table, &config.secondary, &mut report)?;
    table.dump();
    for err in &report.errors {
        warn!(%err, "mapping line skipped");
    }
    summary.mapping = Some(MappingSummary::new(table.len(), &report));
    Ok(table)
}

fn merge_secondary(
    table: &mut RenameTable,
    paths: &[PathBuf],
    report: &mut LoadReport,
) -> Result<(), RemapError> {
    for path in paths {
        table.merge(path, report)?;
    }
    Ok(())
}

fn apply(
    config: &RemapConfig,
    range_map: &RangeMap,
    table: &RenameTable,
    summary: &mut RunSummary,
) -> Result<(), RemapError> {
    let report = match &config.output {
        OutputMode::InPlace => {
            let mut store = open_in_place(&config.input)?;
            let report = remap_sources(
                Stores::InPlace(store.as_mut()),
                range_map,
                table,
                &config.apply,
            )?;
            store.close()?;
            report
        }
        OutputMode::Separate(output) => {
            let mut input = open_for_read(&config.input)?;
            let mut out = open_for_write(output)?;
            let report = remap_sources(
                Stores::Separate {
                    input: input.as_ref(),
                    output: out.as_mut(),
                },
                range_map,
                table,
                &config.apply,
            )?;
            out.close()?;
            input.close()?;
            report
        }
    };

    let log_path = match &config.rename_log {
        Some(path) => path.clone(),
        None => temporary_file(".rangelog")?,
    };
    report.log.save(&log_path)?;
    summary.rename_log = Some(log_path.display().to_string());
    summary.apply = Some(ApplySummary::from(&report));

    info!(
        written = report.units_written(),
        failed = report.units_failed(),
        substitutions = report.log.len(),
        "remap finished"
    );
    match report.units_failed() {
        0 => Ok(()),
        failed => Err(RemapError::UnitsFailed { failed }),
    }
}

/// A persisted temporary file for a hand-off artifact.
fn temporary_file(suffix: &str) -> Result<PathBuf, RemapError> {
    let file = tempfile::Builder::new()
        .prefix("srcremap-")
        .suffix(suffix)
        .tempfile()?;
    let (_, path) = file.keep().map_err(|e| RemapError::Io(e.error))?;
    Ok(path)
}
