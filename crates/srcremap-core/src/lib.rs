//! Core infrastructure for srcremap.
//!
//! This crate provides the language-agnostic half of the remapping pipeline:
//! - Source unit stores (directory, archive, in-memory)
//! - Symbol signatures and JVM descriptors
//! - The range map hand-off artifact and its line format
//! - The [`resolver::SymbolResolver`] seam that language engines implement
//! - Range extraction driver with failure thresholds
//! - Rename table loading (symbol and parameter mappings)
//! - Range application and the rename log
//! - Error types, exit codes and the JSON run summary

pub mod apply;
pub mod descriptor;
pub mod error;
pub mod extract;
pub mod log;
pub mod output;
pub mod rangemap;
pub mod resolver;
pub mod signature;
pub mod store;
pub mod table;
pub mod text;
