//! srcremap: source-accurate symbol remapping for Java sources.
//!
//! A two-phase pipeline: a range extractor records, for every identifier in
//! every unit, the span it occupies and the symbol it denotes; a range
//! applier then substitutes new names from a rename table into exactly
//! those spans, leaving every other byte untouched.

// Core infrastructure - re-exported from srcremap-core
pub use srcremap_core::apply;
pub use srcremap_core::descriptor;
pub use srcremap_core::error;
pub use srcremap_core::extract;
pub use srcremap_core::log;
pub use srcremap_core::output;
pub use srcremap_core::rangemap;
pub use srcremap_core::resolver;
pub use srcremap_core::signature;
pub use srcremap_core::store;
pub use srcremap_core::table;
pub use srcremap_core::text;

// Language engines
pub use srcremap_java as java;

// Driver
pub mod remap;
