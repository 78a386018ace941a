//! Symbol signatures and occurrence kinds.
//!
//! A [`SymbolSignature`] is the canonical textual identity of a declaration and
//! the join key between range map occurrences and rename table entries. It
//! depends only on the declaration, never on resolver state, so a range map
//! produced in one process can be applied in another.
//!
//! | Declaration | Form | Example |
//! |-------------|------|---------|
//! | type | binary name | `com.x.Outer$Inner` |
//! | field | `Owner.name` | `com.x.A.count` |
//! | method | `Owner.name(desc)ret` | `A.foo(I)I` |
//! | parameter | `Method#index` | `A.foo(I)I#0` |
//! | local | `Method@name:ordinal` | `A.foo(I)I@tmp:0` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::descriptor::MethodDescriptor;

// ============================================================================
// Occurrence Kind
// ============================================================================

/// What kind of declaration an occurrence resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceKind {
    Type,
    Field,
    Method,
    Parameter,
    Local,
}

impl OccurrenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OccurrenceKind::Type => "type",
            OccurrenceKind::Field => "field",
            OccurrenceKind::Method => "method",
            OccurrenceKind::Parameter => "parameter",
            OccurrenceKind::Local => "local",
        }
    }
}

impl fmt::Display for OccurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OccurrenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "type" => Ok(OccurrenceKind::Type),
            "field" => Ok(OccurrenceKind::Field),
            "method" => Ok(OccurrenceKind::Method),
            "parameter" => Ok(OccurrenceKind::Parameter),
            "local" => Ok(OccurrenceKind::Local),
            other => Err(format!("unknown occurrence kind '{}'", other)),
        }
    }
}

// ============================================================================
// Symbol Signature
// ============================================================================

/// Canonical identity of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct SymbolSignature(pub String);

impl SymbolSignature {
    /// Signature of a type, from its binary name (`a.b.Outer$Inner`).
    pub fn of_type(binary_name: impl Into<String>) -> Self {
        SymbolSignature(binary_name.into())
    }

    /// Signature of a field declared in `owner`.
    pub fn of_field(owner: &str, name: &str) -> Self {
        SymbolSignature(format!("{}.{}", owner, name))
    }

    /// Signature of a method declared in `owner`.
    pub fn of_method(owner: &str, name: &str, desc: &MethodDescriptor) -> Self {
        SymbolSignature(format!("{}.{}{}", owner, name, desc))
    }

    /// Signature of the `index`-th declared parameter of `method`.
    pub fn of_parameter(method: &SymbolSignature, index: usize) -> Self {
        SymbolSignature(format!("{}#{}", method.0, index))
    }

    /// Signature of a local variable of `method`.
    ///
    /// `ordinal` counts earlier locals with the same name in the same method.
    pub fn of_local(method: &SymbolSignature, name: &str, ordinal: usize) -> Self {
        SymbolSignature(format!("{}@{}:{}", method.0, name, ordinal))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split a parameter signature into its method signature and index.
    ///
    /// Returns `None` for anything that is not `Method#index` with a method
    /// descriptor before the `#`.
    pub fn split_parameter(&self) -> Option<(&str, usize)> {
        split_parameter_key(&self.0)
    }
}

impl fmt::Display for SymbolSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SymbolSignature {
    fn from(s: &str) -> Self {
        SymbolSignature(s.to_string())
    }
}

/// Split `Owner.m(desc)ret#index` into `("Owner.m(desc)ret", index)`.
pub fn split_parameter_key(key: &str) -> Option<(&str, usize)> {
    let (method, index) = key.rsplit_once('#')?;
    if !method.contains('(') || method.contains('@') {
        return None;
    }
    let index = index.parse().ok()?;
    Some((method, index))
}

/// The simple name carried by a (possibly qualified) new name.
///
/// `com.x.New` -> `New`, `com.x.Outer$Inner` -> `Inner`, `baz` -> `baz`.
pub fn simple_name(name: &str) -> &str {
    match name.rfind(['.', '$']) {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// The source spelling of a binary name: nesting separators become dots.
pub fn source_name(binary: &str) -> String {
    binary.replace('$', ".")
}

/// Package part of a binary name (`""` for the default package).
pub fn package_of(binary: &str) -> &str {
    match binary.rfind('.') {
        Some(pos) => &binary[..pos],
        None => "",
    }
}

// ============================================================================
// Tests
// ============================================================================
