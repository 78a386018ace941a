//! Program-wide type model.
//!
//! Every type the resolver knows about, whether declared in source, loaded
//! from the classpath or taken from the built-in `java.lang` table, is a
//! [`TypeDecl`] keyed by binary name in one [`TypeIndex`]. Member types are
//! linked through `outer` / `members`; supertypes are binary names.
//! Declarations that mention type variables or type arguments also keep
//! their generic form next to the erased one.

use std::collections::{BTreeMap, HashMap, HashSet};

use srcremap_core::descriptor::{FieldType, MethodDescriptor};
use srcremap_core::signature::{package_of, SymbolSignature};

use crate::generic::{GenericMethod, JType, TypeParam};

pub const OBJECT: &str = "java.lang.Object";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
}

impl TypeKind {
    pub fn is_interface(&self) -> bool {
        matches!(self, TypeKind::Interface | TypeKind::Annotation)
    }
}

/// Where a type came from. Later origins override earlier ones by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    Builtin,
    Library,
    Source,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: FieldType,
    pub is_static: bool,
    /// Unerased type, when it differs from `ty`.
    pub generic: Option<JType>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: FieldType, is_static: bool) -> Self {
        FieldDecl {
            name: name.into(),
            ty,
            is_static,
            generic: None,
        }
    }

    /// Keep `ty` as the generic form if erasing it loses anything.
    pub fn with_generic(mut self, ty: JType) -> Self {
        self.generic = ty.is_generic().then_some(ty);
        self
    }

    pub fn generic_type(&self) -> JType {
        self.generic.clone().unwrap_or_else(|| JType::from(&self.ty))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    /// `<init>` for constructors.
    pub name: String,
    pub desc: MethodDescriptor,
    pub is_static: bool,
    pub is_varargs: bool,
    pub is_private: bool,
    pub is_abstract: bool,
    /// Generic form, when it differs from `desc`.
    pub generic: Option<GenericMethod>,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>, desc: MethodDescriptor) -> Self {
        MethodDecl {
            name: name.into(),
            desc,
            is_static: false,
            is_varargs: false,
            is_private: false,
            is_abstract: false,
            generic: None,
        }
    }

    /// Keep `sig` if it says more than the descriptor. A signature whose
    /// erasure disagrees with the descriptor (synthetic parameters) is dropped.
    pub fn with_generic(mut self, sig: GenericMethod) -> Self {
        self.generic = (sig.is_generic() && sig.params.len() == self.desc.params.len()).then_some(sig);
        self
    }

    pub fn type_params(&self) -> &[TypeParam] {
        self.generic.as_ref().map(|g| g.type_params.as_slice()).unwrap_or(&[])
    }

    pub fn generic_params(&self) -> Vec<JType> {
        match &self.generic {
            Some(g) => g.params.clone(),
            None => self.desc.params.iter().map(JType::from).collect(),
        }
    }

    pub fn generic_ret(&self) -> Option<JType> {
        match &self.generic {
            Some(g) => g.ret.clone(),
            None => self.desc.ret.as_ref().map(JType::from),
        }
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn signature(&self, owner: &str) -> SymbolSignature {
        SymbolSignature::of_method(owner, &self.name, &self.desc)
    }
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    /// Binary name with dots, e.g. `com.x.Outer$Inner`.
    pub binary: String,
    pub simple: String,
    pub kind: TypeKind,
    pub origin: Origin,
    /// Lexically enclosing type, for member, local and anonymous classes.
    pub outer: Option<String>,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub type_params: Vec<TypeParam>,
    /// Parameterized supertypes, superclass first; empty when none are.
    pub generic_supers: Vec<JType>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    /// Member types by simple name.
    pub members: BTreeMap<String, String>,
    /// Local or anonymous: not reachable by qualified name.
    pub is_local: bool,
}

impl TypeDecl {
    pub fn new(binary: impl Into<String>, kind: TypeKind, origin: Origin) -> Self {
        let binary = binary.into();
        let simple = binary
            .rsplit(['.', '$'])
            .next()
            .unwrap_or(binary.as_str())
            .to_string();
        TypeDecl {
            binary,
            simple,
            kind,
            origin,
            outer: None,
            superclass: None,
            interfaces: Vec::new(),
            type_params: Vec::new(),
            generic_supers: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            members: BTreeMap::new(),
            is_local: false,
        }
    }

    /// Direct supertypes: superclass first, then interfaces.
    pub fn direct_supertypes(&self) -> impl Iterator<Item = &str> {
        self.superclass
            .as_deref()
            .into_iter()
            .chain(self.interfaces.iter().map(String::as_str))
    }

    /// Direct supertypes with their type arguments.
    pub fn generic_supertypes(&self) -> Vec<JType> {
        if !self.generic_supers.is_empty() {
            return self.generic_supers.clone();
        }
        self.direct_supertypes().map(JType::object).collect()
    }
}

/// All known types.
#[derive(Debug, Default)]
pub struct TypeIndex {
    types: HashMap<String, TypeDecl>,
    /// Top-level types by package, then simple name.
    by_package: HashMap<String, BTreeMap<String, String>>,
    /// Every package and package prefix that contains a type.
    packages: HashSet<String>,
}

impl TypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type. A type of equal or higher origin replaces an existing one.
    pub fn insert(&mut self, decl: TypeDecl) {
        if let Some(existing) = self.types.get(&decl.binary) {
            if existing.origin > decl.origin {
                return;
            }
        }
        if decl.outer.is_none() && !decl.is_local {
            let package = package_of(&decl.binary).to_string();
            let mut prefix = package.as_str();
            loop {
                self.packages.insert(prefix.to_string());
                match prefix.rfind('.') {
                    Some(pos) => prefix = &prefix[..pos],
                    None => break,
                }
            }
            self.by_package
                .entry(package)
                .or_default()
                .insert(decl.simple.clone(), decl.binary.clone());
        }
        self.types.insert(decl.binary.clone(), decl);
    }

    pub fn get(&self, binary: &str) -> Option<&TypeDecl> {
        self.types.get(binary)
    }

    pub fn get_mut(&mut self, binary: &str) -> Option<&mut TypeDecl> {
        self.types.get_mut(binary)
    }

    pub fn contains(&self, binary: &str) -> bool {
        self.types.contains_key(binary)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Top-level type `simple` in `package`.
    pub fn top_level(&self, package: &str, simple: &str) -> Option<&str> {
        self.by_package
            .get(package)
            .and_then(|types| types.get(simple))
            .map(String::as_str)
    }

    pub fn is_package(&self, name: &str) -> bool {
        self.packages.contains(name)
    }

    /// Link `inner` as a member type of `outer` under `simple`.
    pub fn add_member(&mut self, outer: &str, simple: &str, inner: &str) {
        if let Some(decl) = self.types.get_mut(outer) {
            decl.members
                .entry(simple.to_string())
                .or_insert_with(|| inner.to_string());
        }
        if let Some(decl) = self.types.get_mut(inner) {
            if decl.outer.is_none() {
                decl.outer = Some(outer.to_string());
            }
            decl.simple = simple.to_string();
        }
    }

    /// Resolve a fully qualified dotted name (`com.x.Outer.Inner`).
    ///
    /// The longest package prefix that leads to a top-level type wins; the
    /// remaining segments are member types.
    pub fn resolve_qualified(&self, segments: &[&str]) -> Option<String> {
        (0..segments.len()).rev().find_map(|k| {
            let package = segments[..k].join(".");
            let top = self.top_level(&package, segments[k])?;
            segments[k + 1..]
                .iter()
                .try_fold(top.to_string(), |owner, seg| {
                    self.get(&owner)?.members.get(*seg).cloned()
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> TypeIndex {
        let mut index = TypeIndex::new();
        index.insert(TypeDecl::new("com.x.Outer", TypeKind::Class, Origin::Source));
        let mut inner = TypeDecl::new("com.x.Outer$Inner", TypeKind::Class, Origin::Source);
        inner.outer = Some("com.x.Outer".into());
        index.insert(inner);
        index.add_member("com.x.Outer", "Inner", "com.x.Outer$Inner");
        index.insert(TypeDecl::new("Top", TypeKind::Class, Origin::Source));
        index
    }

    #[test]
    fn packages_include_prefixes() {
        let index = index();
        assert!(index.is_package("com.x"));
        assert!(index.is_package("com"));
        assert!(index.is_package(""));
        assert!(!index.is_package("com.x.Outer"));
    }

    #[test]
    fn qualified_names_reach_member_types() {
        let index = index();
        assert_eq!(
            index.resolve_qualified(&["com", "x", "Outer", "Inner"]).as_deref(),
            Some("com.x.Outer$Inner")
        );
        assert_eq!(index.resolve_qualified(&["Top"]).as_deref(), Some("Top"));
        assert_eq!(index.resolve_qualified(&["com", "x", "Nope"]), None);
    }

    #[test]
    fn source_overrides_library() {
        let mut index = TypeIndex::new();
        let mut lib = TypeDecl::new("a.B", TypeKind::Class, Origin::Library);
        lib.fields.push(FieldDecl::new("lib", FieldType::Int, false));
        index.insert(lib);
        index.insert(TypeDecl::new("a.B", TypeKind::Interface, Origin::Source));
        index.insert(TypeDecl::new("a.B", TypeKind::Class, Origin::Builtin));
        let decl = index.get("a.B").unwrap();
        assert_eq!(decl.kind, TypeKind::Interface);
        assert!(decl.fields.is_empty());
    }

    #[test]
    fn generic_forms_are_kept_only_when_they_differ() {
        let plain = FieldDecl::new("n", FieldType::Int, false).with_generic(JType::Prim(FieldType::Int));
        assert_eq!(plain.generic, None);
        let var = TypeParam::new("T", JType::object(OBJECT)).var();
        let field = FieldDecl::new("val", FieldType::object(), false).with_generic(var.clone());
        assert_eq!(field.generic_type(), var);

        let desc = MethodDescriptor::new(vec![FieldType::object()], Some(FieldType::object()));
        let sig = GenericMethod {
            type_params: vec![TypeParam::new("X", JType::object(OBJECT))],
            params: vec![var.clone()],
            ret: Some(var.clone()),
        };
        let method = MethodDecl::new("id", desc.clone()).with_generic(sig.clone());
        assert_eq!(method.type_params().len(), 1);
        assert_eq!(method.generic_ret(), Some(var));

        let mismatched = MethodDecl::new("id", MethodDescriptor::new(Vec::new(), None)).with_generic(sig);
        assert_eq!(mismatched.generic, None);
        assert_eq!(mismatched.generic_params(), Vec::<JType>::new());
    }
}
