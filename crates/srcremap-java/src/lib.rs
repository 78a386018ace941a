//! Java symbol resolver for srcremap.
//!
//! This crate implements [`srcremap_core::resolver::SymbolResolver`] for Java
//! sources:
//! - Class file decoding and classpath loading (jars, zips, directories)
//! - Built-in `java.lang`/`java.util` knowledge for programs without a JDK on the classpath
//! - A declaration pass indexing every source type and member
//! - Type and name resolution with Java's scoping rules
//! - Generic types: type arguments substituted through member access
//! - Overload selection and override chains
//! - A per-unit walker binding every identifier to a symbol signature

pub mod builtins;
pub mod classfile;
pub mod classpath;
pub mod declare;
pub mod generic;
pub mod lookup;
pub mod model;
pub mod names;
pub mod syntax;
pub mod walk;

use std::path::PathBuf;

use srcremap_core::resolver::{
    Diagnostic, DiagnosticKind, ResolvedProgram, SourceUnit, SymbolResolver, UnitResolution,
};
use srcremap_core::text::CharIndex;
use thiserror::Error;
use tracing::{debug, info};
use tree_sitter::Node;

use crate::classpath::ClasspathError;
use crate::declare::{declare_units, DeclaredUnit, ParsedUnit};
use crate::model::TypeIndex;

/// Errors that keep the Java resolver from initializing.
#[derive(Debug, Error)]
pub enum JavaResolverError {
    #[error(transparent)]
    Classpath(#[from] ClasspathError),

    #[error("cannot load the Java grammar: {message}")]
    Grammar { message: String },
}

/// Resolver for `.java` units.
#[derive(Debug, Clone, Default)]
pub struct JavaResolver;

impl JavaResolver {
    pub fn new() -> Self {
        JavaResolver
    }
}

impl SymbolResolver for JavaResolver {
    type Program = JavaProgram;
    type Error = JavaResolverError;

    fn name(&self) -> &'static str {
        "java"
    }

    fn can_handle(&self, unit_id: &str) -> bool {
        unit_id.ends_with(".java")
    }

    fn index(
        &self,
        classpath: &[PathBuf],
        units: Vec<SourceUnit>,
    ) -> Result<JavaProgram, JavaResolverError> {
        let mut index = TypeIndex::new();
        builtins::install(&mut index);
        let loaded = classpath::install(&mut index, classpath)?;
        info!(classes = loaded, entries = classpath.len(), "classpath loaded");

        let mut parser = syntax::java_parser().map_err(|e| JavaResolverError::Grammar {
            message: e.to_string(),
        })?;
        let parsed: Vec<ParsedUnit> = units
            .into_iter()
            .map(|unit| {
                let tree = syntax::parse(&mut parser, &unit.text);
                ParsedUnit {
                    id: unit.id,
                    text: unit.text,
                    tree,
                }
            })
            .collect();

        let declared = declare_units(&mut index, &parsed);
        info!(types = index.len(), units = parsed.len(), "declarations indexed");

        // Trees are rebuilt per unit on resolution; only the text is kept.
        let units = parsed
            .into_iter()
            .zip(declared)
            .map(|(unit, declared)| ProgramUnit {
                id: unit.id,
                text: unit.text,
                declared,
            })
            .collect();
        Ok(JavaProgram { index, units })
    }
}

struct ProgramUnit {
    id: String,
    text: String,
    declared: DeclaredUnit,
}

/// A fully indexed Java program.
pub struct JavaProgram {
    index: TypeIndex,
    units: Vec<ProgramUnit>,
}

impl JavaProgram {
    pub fn index(&self) -> &TypeIndex {
        &self.index
    }
}

impl ResolvedProgram for JavaProgram {
    fn unit_count(&self) -> usize {
        self.units.len()
    }

    fn unit_id(&self, index: usize) -> &str {
        &self.units[index].id
    }

    fn resolve_unit(&self, index: usize) -> UnitResolution {
        let unit = &self.units[index];
        let tree = syntax::java_parser()
            .ok()
            .and_then(|mut parser| syntax::parse(&mut parser, &unit.text));
        let Some(tree) = tree else {
            return UnitResolution {
                occurrences: Vec::new(),
                diagnostics: vec![Diagnostic::new(
                    unit.id.as_str(),
                    0,
                    DiagnosticKind::Parse,
                    "parser gave up on this unit",
                )],
                parse_failed: true,
            };
        };

        let root = tree.root_node();
        let walked = walk::walk_unit(&self.index, &unit.id, &unit.text, root, &unit.declared);
        let mut diagnostics = walked.diagnostics;
        let parse_failed = root.has_error();
        if parse_failed {
            let byte = first_error(root).map(|n| n.start_byte()).unwrap_or(0);
            let offset = CharIndex::new(&unit.text).char_of(byte);
            diagnostics.push(Diagnostic::new(
                unit.id.as_str(),
                offset,
                DiagnosticKind::Parse,
                "syntax error",
            ));
        }
        debug!(
            unit = %unit.id,
            occurrences = walked.occurrences.len(),
            diagnostics = diagnostics.len(),
            parse_failed,
            "unit resolved"
        );
        UnitResolution {
            occurrences: walked.occurrences,
            diagnostics,
            parse_failed,
        }
    }
}

/// First error or missing node in document order.
fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    syntax::children(node).into_iter().find_map(first_error)
}
