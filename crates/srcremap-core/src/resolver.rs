//! The resolver seam.
//!
//! Language engines implement [`SymbolResolver`]: given a classpath and every
//! source unit, build a [`ResolvedProgram`] that can answer, per unit, which
//! declaration each identifier token refers to. The extractor only talks to
//! these traits, so engines are swappable.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::rangemap::Occurrence;

/// One source unit handed to a resolver.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub id: String,
    pub text: String,
}

impl SourceUnit {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        SourceUnit {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Category of a resolver diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// A reference that could not be bound to any declaration.
    Unresolved,
    /// A reference with several equally applicable declarations.
    Ambiguous,
    /// A syntax error in the unit.
    Parse,
    /// An occurrence dropped because it overlapped the previous one.
    Overlap,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiagnosticKind::Unresolved => "unresolved",
            DiagnosticKind::Ambiguous => "ambiguous",
            DiagnosticKind::Parse => "parse",
            DiagnosticKind::Overlap => "overlap",
        })
    }
}

/// A per-occurrence warning. Never fatal on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub unit_id: String,
    /// Char offset into the unit.
    pub offset: usize,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        unit_id: impl Into<String>,
        offset: usize,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            unit_id: unit_id.into(),
            offset,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.unit_id, self.offset, self.kind, self.message
        )
    }
}

/// Everything a resolver learned about one unit.
#[derive(Debug, Clone, Default)]
pub struct UnitResolution {
    /// Bound occurrences. Any order; the extractor sorts them.
    pub occurrences: Vec<Occurrence>,
    pub diagnostics: Vec<Diagnostic>,
    /// The unit's syntax tree contained errors.
    pub parse_failed: bool,
}

/// Builds a semantic index over a whole program.
pub trait SymbolResolver {
    type Program: ResolvedProgram;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Engine name, for logs.
    fn name(&self) -> &'static str;

    /// Whether units with this id are source for this engine.
    fn can_handle(&self, unit_id: &str) -> bool;

    /// Index every unit against the classpath.
    ///
    /// An error here means the resolver could not initialize at all (for
    /// example, a classpath entry is missing).
    fn index(&self, classpath: &[PathBuf], units: Vec<SourceUnit>)
        -> Result<Self::Program, Self::Error>;
}

/// An indexed program. Units are resolved independently and may be resolved
/// from several threads at once.
pub trait ResolvedProgram: Sync {
    /// Number of indexed units.
    fn unit_count(&self) -> usize;

    /// Id of the `index`-th unit, in the order they were given to `index`.
    fn unit_id(&self, index: usize) -> &str;

    /// Resolve every occurrence in the `index`-th unit.
    fn resolve_unit(&self, index: usize) -> UnitResolution;
}
