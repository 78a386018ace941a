//! Rename table: which signatures get which new names.
//!
//! Loaded from primary mapping sources (symbols, types, packages) and merged
//! with secondary sources (parameter names). Later lines override earlier
//! ones. A malformed line never aborts loading; it becomes a [`FormatError`]
//! in the [`LoadReport`] and the line is skipped.
//!
//! ## Primary lines
//!
//! ```text
//! class   com.x.Old        com.x.New
//! field   com.x.A.count    total
//! method  A.foo            baz        (I)I
//! method  A.foo(I)I        baz
//! param   A.foo(I)I#0      qux
//! local   A.foo(I)I@tmp:0  scratch
//! package com.x            com.y
//! PK: com/x com/y
//! CL: com/x/Old com/x/New
//! FD: com/x/A/count com/x/A/total
//! MD: com/x/A/foo (I)I com/x/A/baz (I)I
//! ```
//!
//! ## Secondary lines
//!
//! ```text
//! A.foo(I)I 0 qux
//! A.foo(I)I#0 qux
//! com/x/A.foo(I)I=java/io/IOException|qux
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::descriptor::parse_method_descriptor;
use crate::signature::split_parameter_key;

// ============================================================================
// Error Types
// ============================================================================

/// A mapping source could not be read at all.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("cannot read mapping file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One skipped mapping line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatError {
    /// Name of the source the line came from.
    pub source: String,
    /// 1-based line number.
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.source, self.line, self.reason)
    }
}

/// Outcome of loading one or more mapping sources.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub errors: Vec<FormatError>,
    /// Lines that produced at least one entry.
    pub accepted: usize,
    /// Lines that are well-formed but carry nothing for source remapping.
    pub ignored: usize,
}

impl LoadReport {
    /// Number of malformed lines that were skipped.
    pub fn skipped(&self) -> usize {
        self.errors.len()
    }

    fn reject(&mut self, source: &str, line: usize, reason: impl Into<String>) {
        let err = FormatError {
            source: source.to_string(),
            line,
            reason: reason.into(),
        };
        tracing::warn!(%err, "skipping mapping line");
        self.errors.push(err);
    }
}

// ============================================================================
// Rename Table
// ============================================================================

/// Signature-keyed new names plus parameter-specific overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameTable {
    symbols: BTreeMap<String, String>,
    params: BTreeMap<(String, usize), String>,
    packages: BTreeMap<String, String>,
}

impl RenameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load primary mapping files, in order.
    pub fn load(paths: &[PathBuf]) -> Result<(Self, LoadReport), TableError> {
        let mut table = RenameTable::new();
        let mut report = LoadReport::default();
        for path in paths {
            let text = read_source(path)?;
            table.parse_primary(&path.display().to_string(), &text, &mut report);
        }
        tracing::info!(
            sources = paths.len(),
            entries = table.len(),
            skipped = report.skipped(),
            "rename table loaded"
        );
        Ok((table, report))
    }

    /// Merge one secondary (parameter) mapping file.
    pub fn merge(&mut self, path: &Path, report: &mut LoadReport) -> Result<(), TableError> {
        let text = read_source(path)?;
        self.parse_secondary(&path.display().to_string(), &text, report);
        Ok(())
    }

    /// Parse primary lines from `text`. `source` names it in errors.
    pub fn parse_primary(&mut self, source: &str, text: &str, report: &mut LoadReport) {
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match self.primary_line(line) {
                Ok(()) => report.accepted += 1,
                Err(reason) => report.reject(source, i + 1, reason),
            }
        }
    }

    /// Parse secondary lines from `text`. `source` names it in errors.
    pub fn parse_secondary(&mut self, source: &str, text: &str, report: &mut LoadReport) {
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match self.secondary_line(line) {
                Ok(true) => report.accepted += 1,
                Ok(false) => report.ignored += 1,
                Err(reason) => report.reject(source, i + 1, reason),
            }
        }
    }

    fn primary_line(&mut self, line: &str) -> Result<(), String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let (head, args) = tokens
            .split_first()
            .ok_or_else(|| "empty line".to_string())?;

        if head.ends_with(':') {
            return self.srg_line(head, args);
        }

        match *head {
            "class" | "type" => {
                let [old, new] = exact::<2>(head, args)?;
                self.insert(old, new);
            }
            "field" => {
                let [old, new] = exact::<2>(head, args)?;
                if !old.contains('.') {
                    return Err(format!("field '{}' has no owner", old));
                }
                self.insert(old, new);
            }
            "method" => {
                let key = match args {
                    [old, _] if old.contains('(') => {
                        check_method_key(old)?;
                        old.to_string()
                    }
                    [old, _] => return Err(format!("method '{}' needs a descriptor", old)),
                    [old, _, desc] if !old.contains('(') => {
                        parse_method_descriptor(desc).map_err(|e| e.to_string())?;
                        format!("{}{}", old, desc)
                    }
                    _ => return Err(arity_message(head, args.len())),
                };
                self.insert(&key, args[1]);
            }
            "param" | "parameter" => {
                let [old, new] = exact::<2>(head, args)?;
                if split_parameter_key(old).is_none() {
                    return Err(format!("parameter '{}' is not Method#index", old));
                }
                self.insert(old, new);
            }
            "local" => {
                let [old, new] = exact::<2>(head, args)?;
                if !old.contains('@') {
                    return Err(format!("local '{}' is not Method@name:ordinal", old));
                }
                self.insert(old, new);
            }
            "package" => {
                let [old, new] = exact::<2>(head, args)?;
                self.insert_package(old, new);
            }
            other => return Err(format!("unknown mapping kind '{}'", other)),
        }
        Ok(())
    }

    fn srg_line(&mut self, head: &str, args: &[&str]) -> Result<(), String> {
        match head {
            "PK:" => {
                let [old, new] = exact::<2>(head, args)?;
                self.insert_package(&srg_package(old), &srg_package(new));
            }
            "CL:" => {
                let [old, new] = exact::<2>(head, args)?;
                self.insert(&dotted(old), &dotted(new));
            }
            "FD:" => {
                let [old, new] = exact::<2>(head, args)?;
                let (owner, name) = split_member(old)?;
                let (_, new_name) = split_member(new)?;
                self.insert(&format!("{}.{}", dotted(owner), name), new_name);
            }
            "MD:" => {
                let [old, old_desc, new, _new_desc] = exact::<4>(head, args)?;
                parse_method_descriptor(old_desc).map_err(|e| e.to_string())?;
                let (owner, name) = split_member(old)?;
                let (_, new_name) = split_member(new)?;
                self.insert(&format!("{}.{}{}", dotted(owner), name, old_desc), new_name);
            }
            other => return Err(format!("unknown mapping prefix '{}'", other)),
        }
        Ok(())
    }

    /// Returns `Ok(false)` for well-formed lines with no parameter names.
    fn secondary_line(&mut self, line: &str) -> Result<bool, String> {
        if let Some((key, rest)) = line.split_once('=') {
            return self.exc_line(key.trim(), rest.trim());
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [method, index, name] => {
                check_method_key(method)?;
                let index = index
                    .parse::<usize>()
                    .map_err(|_| format!("bad parameter index '{}'", index))?;
                self.insert_param(method, index, name);
            }
            [key, name] => {
                let (method, index) = split_parameter_key(key)
                    .ok_or_else(|| format!("'{}' is not Method#index", key))?;
                self.insert_param(method, index, name);
            }
            _ => return Err(format!("expected 2 or 3 fields, found {}", tokens.len())),
        }
        Ok(true)
    }

    fn exc_line(&mut self, key: &str, rest: &str) -> Result<bool, String> {
        // Class-level entries (`Owner.access=...`) carry no parameters.
        let Some(paren) = key.find('(') else {
            return Ok(false);
        };
        let (path, desc) = key.split_at(paren);
        parse_method_descriptor(desc).map_err(|e| e.to_string())?;
        let method = format!("{}{}", path.replace('/', "."), desc);

        let Some((_, params)) = rest.split_once('|') else {
            return Ok(false);
        };
        let names: Vec<&str> = params.split(',').map(str::trim).collect();
        if names.iter().all(|n| n.is_empty()) {
            return Ok(false);
        }
        for (index, name) in names.iter().enumerate() {
            if !name.is_empty() {
                self.insert_param(&method, index, name);
            }
        }
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------------

    /// Map a signature to a new name. Later calls override earlier ones.
    pub fn insert(&mut self, signature: &str, new_name: &str) {
        self.symbols
            .insert(signature.to_string(), new_name.to_string());
    }

    /// Map a method's `index`-th parameter to a new name.
    pub fn insert_param(&mut self, method: &str, index: usize, new_name: &str) {
        self.params
            .insert((method.to_string(), index), new_name.to_string());
    }

    /// Map a package (dotted, `""` for the default package) to a new one.
    pub fn insert_package(&mut self, old: &str, new: &str) {
        self.packages.insert(old.to_string(), new.to_string());
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn lookup(&self, signature: &str) -> Option<&str> {
        self.symbols.get(signature).map(String::as_str)
    }

    pub fn lookup_param(&self, method: &str, index: usize) -> Option<&str> {
        self.params
            .get(&(method.to_string(), index))
            .map(String::as_str)
    }

    pub fn lookup_package(&self, package: &str) -> Option<&str> {
        self.packages.get(package).map(String::as_str)
    }

    /// Total entries across all three maps.
    pub fn len(&self) -> usize {
        self.symbols.len() + self.params.len() + self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Log every entry at debug level, sorted.
    pub fn dump(&self) {
        for (old, new) in &self.packages {
            tracing::debug!(kind = "package", old = %old, new = %new, "mapping");
        }
        for (old, new) in &self.symbols {
            tracing::debug!(kind = "symbol", old = %old, new = %new, "mapping");
        }
        for ((method, index), new) in &self.params {
            tracing::debug!(kind = "param", method = %method, index, new = %new, "mapping");
        }
    }
}

fn read_source(path: &Path) -> Result<String, TableError> {
    fs::read_to_string(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn exact<'a, const N: usize>(head: &str, args: &[&'a str]) -> Result<[&'a str; N], String> {
    <[&str; N]>::try_from(args).map_err(|_| arity_message(head, args.len()))
}

fn arity_message(head: &str, found: usize) -> String {
    format!("'{}' line has {} argument(s)", head, found)
}

fn check_method_key(key: &str) -> Result<(), String> {
    let paren = key
        .find('(')
        .ok_or_else(|| format!("'{}' has no method descriptor", key))?;
    if !key[..paren].contains('.') {
        return Err(format!("method '{}' has no owner", key));
    }
    parse_method_descriptor(&key[paren..])
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn dotted(internal: &str) -> String {
    internal.replace('/', ".")
}

fn srg_package(name: &str) -> String {
    if name == "." || name == "./" {
        String::new()
    } else {
        dotted(name.trim_end_matches('/'))
    }
}

fn split_member(path: &str) -> Result<(&str, &str), String> {
    path.rsplit_once('/')
        .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
        .ok_or_else(|| format!("'{}' is not owner/member", path))
}

// ============================================================================
// Tests
// ============================================================================
