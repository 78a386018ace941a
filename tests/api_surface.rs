//! Compile-only test to verify public API surface.
//!
//! This file serves as a compile-time contract for the public API.
//! If this file fails to compile, the public API has regressed.
//!
//! Run with: cargo test -- api_surface

// Allow unused imports - this test is about compile-time verification, not runtime usage
#![allow(unused_imports)]

// ============================================================================
// Core Infrastructure Types
// ============================================================================

// store module - source unit collections
use srcremap::store::{
    open_for_read, open_for_write, open_in_place, ArchiveStore, DirectoryStore, MemoryStore,
    SourceStore, StoreError, StoreMode,
};

// signature and descriptor modules - symbol identity
use srcremap::descriptor::{FieldType, MethodDescriptor};
use srcremap::signature::{OccurrenceKind, SymbolSignature};

// rangemap module - the hand-off artifact
use srcremap::rangemap::{Occurrence, RangeMap, RangeMapError, RangeRecord, Span};

// resolver module - the engine seam
use srcremap::resolver::{
    Diagnostic, DiagnosticKind, ResolvedProgram, SourceUnit, SymbolResolver, UnitResolution,
};

// extract module - range extraction
use srcremap::extract::{
    generate_range_map, DiagnosticSink, ExtractError, ExtractFailure, ExtractOptions,
    ExtractStats, Extraction, TracingSink, VecSink,
};

// table and log modules - rename table and rename log
use srcremap::log::{RenameEntry, RenameLog};
use srcremap::table::{FormatError, LoadReport, RenameTable, TableError};

// apply module - range application
use srcremap::apply::{remap_sources, rewrite_unit, ApplyError, ApplyOptions, ApplyReport, Stores};

// error and output modules - exit codes and the JSON summary
use srcremap::error::{OutputErrorCode, RemapError};
use srcremap::output::{emit_response, ApplySummary, ExtractionSummary, RunSummary};

// ============================================================================
// Java Engine and Driver
// ============================================================================

use srcremap::java::{JavaProgram, JavaResolver, JavaResolverError};
use srcremap::remap::{run_apply, run_extract, run_remap, RemapConfig};

#[test]
fn api_surface_compiles() {
    // The imports above are the test.
    fn assert_resolver<R: SymbolResolver>(_: &R) {}
    assert_resolver(&JavaResolver::new());
}
