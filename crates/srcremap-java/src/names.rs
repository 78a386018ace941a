//! Type name resolution.
//!
//! A [`TypeEnv`] answers "which type does this name mean here". Simple names
//! are looked up in this order: type variables, local classes, member types
//! of the current and enclosing classes (inherited ones included),
//! single-type imports, the unit's own package, on-demand imports, then
//! `java.lang`. Qualified names start from a type if their first segment is
//! one, otherwise from the longest matching package.
//!
//! Types resolve to their generic form ([`JType`]); callers that need a
//! descriptor erase it.

use std::collections::BTreeMap;

use srcremap_core::descriptor::FieldType;
use tree_sitter::Node;

use crate::generic::{JType, TypeArg, TypeParam};
use crate::lookup;
use crate::model::TypeIndex;
use crate::syntax::{dimension_count, named_children, text};

// ============================================================================
// Imports
// ============================================================================

/// An import declaration as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImport {
    pub segments: Vec<String>,
    pub is_static: bool,
    pub on_demand: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnDemand {
    Package(String),
    /// `import a.Outer.*;` imports member types of a type.
    Type(String),
}

/// A unit's imports, resolved against the program.
#[derive(Debug, Clone, Default)]
pub struct Imports {
    /// Simple name to binary name.
    pub single: BTreeMap<String, String>,
    /// Single-type imports naming no known type: simple name to the binary
    /// name the import spells.
    pub unknown: BTreeMap<String, String>,
    pub on_demand: Vec<OnDemand>,
    /// `(type, member)` pairs of `import static a.T.member;`.
    pub static_single: Vec<(String, String)>,
    pub static_on_demand: Vec<String>,
}

impl Imports {
    pub fn resolve(raw: &[RawImport], index: &TypeIndex) -> Self {
        let mut imports = Imports::default();
        for import in raw {
            let segments: Vec<&str> = import.segments.iter().map(String::as_str).collect();
            match (import.is_static, import.on_demand) {
                (false, false) => {
                    let Some(last) = segments.last() else { continue };
                    match index.resolve_qualified(&segments) {
                        Some(binary) => {
                            imports.single.insert(last.to_string(), binary);
                        }
                        None => {
                            imports.unknown.insert(last.to_string(), spelled_binary(&segments));
                        }
                    }
                }
                (false, true) => {
                    let joined = segments.join(".");
                    if let Some(binary) = index.resolve_qualified(&segments) {
                        imports.on_demand.push(OnDemand::Type(binary));
                    } else {
                        imports.on_demand.push(OnDemand::Package(joined));
                    }
                }
                (true, false) => {
                    if let Some((member, owner)) = segments.split_last() {
                        if let Some(binary) = index.resolve_qualified(owner) {
                            imports.static_single.push((binary, member.to_string()));
                        }
                    }
                }
                (true, true) => {
                    if let Some(binary) = index.resolve_qualified(&segments) {
                        imports.static_on_demand.push(binary);
                    }
                }
            }
        }
        imports
    }
}

/// Binary name of an unknown qualified type name: segments after the first
/// capitalized one are taken as member types.
pub fn spelled_binary(segments: &[&str]) -> String {
    let last = segments.len().saturating_sub(1);
    let split = segments
        .iter()
        .position(|s| s.starts_with(|c: char| c.is_uppercase()))
        .unwrap_or(last);
    let mut binary = segments.iter().take(split + 1).copied().collect::<Vec<_>>().join(".");
    for member in segments.iter().skip(split + 1) {
        binary.push('$');
        binary.push_str(member);
    }
    binary
}

/// Per-unit naming context shared by every scope in the unit.
#[derive(Debug, Clone, Default)]
pub struct UnitHeader {
    pub package: String,
    pub imports: Imports,
}

// ============================================================================
// Scopes
// ============================================================================

/// What a simple type name denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeBinding {
    Type(String),
    Var(TypeParam),
}

#[derive(Debug, Clone)]
enum Frame {
    Class(String),
    TypeVars(Vec<TypeParam>),
    LocalTypes(Vec<(String, String)>),
}

/// Lexical type scope.
#[derive(Debug, Clone)]
pub struct TypeEnv<'a> {
    pub index: &'a TypeIndex,
    pub header: &'a UnitHeader,
    frames: Vec<Frame>,
}

impl<'a> TypeEnv<'a> {
    pub fn new(index: &'a TypeIndex, header: &'a UnitHeader) -> Self {
        TypeEnv {
            index,
            header,
            frames: Vec::new(),
        }
    }

    pub fn push_class(&mut self, binary: impl Into<String>) {
        self.frames.push(Frame::Class(binary.into()));
    }

    pub fn push_type_vars(&mut self, vars: Vec<TypeParam>) {
        self.frames.push(Frame::TypeVars(vars));
    }

    pub fn push_block(&mut self) {
        self.frames.push(Frame::LocalTypes(Vec::new()));
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Declare a local class in the innermost block.
    pub fn add_local_type(&mut self, simple: &str, binary: &str) {
        if let Some(Frame::LocalTypes(types)) = self
            .frames
            .iter_mut()
            .rev()
            .find(|f| matches!(f, Frame::LocalTypes(_)))
        {
            types.push((simple.to_string(), binary.to_string()));
        }
    }

    /// Innermost enclosing class.
    pub fn current_class(&self) -> Option<&str> {
        self.enclosing_classes().next()
    }

    /// Enclosing classes, innermost first.
    pub fn enclosing_classes(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().rev().filter_map(|f| match f {
            Frame::Class(binary) => Some(binary.as_str()),
            _ => None,
        })
    }

    pub fn resolve_simple(&self, name: &str) -> Option<TypeBinding> {
        for frame in self.frames.iter().rev() {
            match frame {
                Frame::TypeVars(vars) => {
                    if let Some(var) = vars.iter().find(|v| v.name == name) {
                        return Some(TypeBinding::Var(var.clone()));
                    }
                }
                Frame::LocalTypes(types) => {
                    if let Some((_, binary)) = types.iter().rev().find(|(n, _)| n == name) {
                        return Some(TypeBinding::Type(binary.clone()));
                    }
                }
                Frame::Class(binary) => {
                    if let Some(member) = lookup::member_type(self.index, binary, name) {
                        return Some(TypeBinding::Type(member));
                    }
                }
            }
        }
        self.resolve_global(name).map(TypeBinding::Type)
    }

    /// Resolution that ignores lexical scopes: imports and packages.
    fn resolve_global(&self, name: &str) -> Option<String> {
        if let Some(binary) = self.header.imports.single.get(name) {
            return Some(binary.clone());
        }
        if let Some(binary) = self.index.top_level(&self.header.package, name) {
            return Some(binary.to_string());
        }
        for on_demand in &self.header.imports.on_demand {
            let found = match on_demand {
                OnDemand::Package(package) => {
                    self.index.top_level(package, name).map(str::to_string)
                }
                OnDemand::Type(owner) => lookup::member_type(self.index, owner, name),
            };
            if found.is_some() {
                return found;
            }
        }
        self.index
            .top_level("java.lang", name)
            .map(str::to_string)
    }

    /// Resolve a type node to its erasure. See [`TypeEnv::resolve_generic`].
    pub fn resolve_type(&self, node: Node<'_>, source: &str, uses: &mut TypeUses) -> Option<FieldType> {
        self.resolve_generic(node, source, uses).map(|t| t.erasure())
    }

    /// Resolve a type node, recording every type name it mentions.
    ///
    /// Returns `None` when the type (or a part of it) cannot be resolved;
    /// the failing name is recorded in `uses.unresolved`. A name only known
    /// from a single-type import is recorded too but still resolves, to the
    /// name the import spells. `void` is `None` without a diagnostic;
    /// callers check for it first.
    pub fn resolve_generic(&self, node: Node<'_>, source: &str, uses: &mut TypeUses) -> Option<JType> {
        match node.kind() {
            "integral_type" | "floating_point_type" | "boolean_type" => {
                FieldType::from_keyword(text(node, source)).map(JType::Prim)
            }
            "void_type" => None,
            "type_identifier" => {
                let name = text(node, source);
                match self.resolve_simple(name) {
                    Some(TypeBinding::Type(binary)) => {
                        uses.refs.push(TypeRef::new(node.start_byte(), node.end_byte(), &binary));
                        Some(JType::object(binary))
                    }
                    Some(TypeBinding::Var(var)) => Some(var.var()),
                    None => {
                        uses.unresolved.push((node.start_byte(), name.to_string()));
                        self.header.imports.unknown.get(name).map(JType::object)
                    }
                }
            }
            "scoped_type_identifier" => self.resolve_scoped(node, source, uses).map(JType::object),
            "generic_type" => {
                let mut ty = None;
                let mut args = Vec::new();
                for part in named_children(node) {
                    match part.kind() {
                        "type_arguments" => args = self.type_arguments(part, source, uses),
                        "type_identifier" | "scoped_type_identifier" => {
                            ty = self.resolve_generic(part, source, uses);
                        }
                        _ => {}
                    }
                }
                match ty? {
                    JType::Class { binary, .. } => Some(JType::Class { binary, args }),
                    other => Some(other),
                }
            }
            "array_type" => {
                let element = node
                    .child_by_field_name("element")
                    .and_then(|e| self.resolve_generic(e, source, uses))?;
                let dims = dimension_count(node.child_by_field_name("dimensions"), source);
                Some(element.with_dims(dims.max(1)))
            }
            "annotated_type" => {
                let inner = named_children(node)
                    .into_iter()
                    .rev()
                    .find(|c| !c.kind().ends_with("annotation"))?;
                self.resolve_generic(inner, source, uses)
            }
            "wildcard" => Some(
                self.wildcard(node, source, uses)
                    .bound()
                    .cloned()
                    .unwrap_or_else(|| JType::object(crate::model::OBJECT)),
            ),
            _ => {
                uses.unresolved
                    .push((node.start_byte(), text(node, source).to_string()));
                None
            }
        }
    }

    fn wildcard(&self, node: Node<'_>, source: &str, uses: &mut TypeUses) -> TypeArg {
        let is_super = crate::syntax::children(node).iter().any(|c| c.kind() == "super");
        let bound = named_children(node)
            .into_iter()
            .find(|c| crate::syntax::is_type_node(c.kind()))
            .and_then(|c| self.resolve_generic(c, source, uses));
        match bound {
            Some(t) if is_super => TypeArg::Super(t),
            Some(t) => TypeArg::Extends(t),
            None => TypeArg::Any,
        }
    }

    /// Arguments of a `type_arguments` node. One that does not resolve reads
    /// as `?`.
    pub fn type_arguments(&self, node: Node<'_>, source: &str, uses: &mut TypeUses) -> Vec<TypeArg> {
        named_children(node)
            .into_iter()
            .filter_map(|arg| {
                if arg.kind() == "wildcard" {
                    Some(self.wildcard(arg, source, uses))
                } else if crate::syntax::is_type_node(arg.kind()) {
                    Some(
                        self.resolve_generic(arg, source, uses)
                            .map(|t| TypeArg::Exact(t.boxed()))
                            .unwrap_or(TypeArg::Any),
                    )
                } else {
                    None
                }
            })
            .collect()
    }

    /// Type variables declared by a `type_parameters` node with their first
    /// bound (or `Object`). Bounds may mention the variables.
    pub fn type_parameters(&mut self, node: Node<'_>, source: &str, uses: &mut TypeUses) -> Vec<TypeParam> {
        let params: Vec<(String, Option<Node<'_>>)> = named_children(node)
            .into_iter()
            .filter(|p| p.kind() == "type_parameter")
            .filter_map(|p| {
                let parts = named_children(p);
                let name = parts.iter().find(|c| c.kind() == "type_identifier")?;
                let bound = parts.iter().find(|c| c.kind() == "type_bound").copied();
                Some((text(*name, source).to_string(), bound))
            })
            .collect();
        self.push_type_vars(
            params
                .iter()
                .map(|(name, _)| TypeParam::new(name.as_str(), JType::object(crate::model::OBJECT)))
                .collect(),
        );
        let vars = params
            .iter()
            .map(|(name, bound)| {
                let mut first = None;
                if let Some(bound) = bound {
                    for (i, ty) in named_children(*bound).into_iter().enumerate() {
                        let resolved = self.resolve_generic(ty, source, uses);
                        if i == 0 {
                            first = resolved;
                        }
                    }
                }
                TypeParam::new(
                    name.as_str(),
                    first.unwrap_or_else(|| JType::object(crate::model::OBJECT)),
                )
            })
            .collect();
        self.pop();
        vars
    }

    /// Record the names in a `type_arguments` node.
    pub fn resolve_type_arguments(&self, node: Node<'_>, source: &str, uses: &mut TypeUses) {
        self.type_arguments(node, source, uses);
    }

    fn resolve_scoped(&self, node: Node<'_>, source: &str, uses: &mut TypeUses) -> Option<String> {
        let mut segments = Vec::new();
        let mut type_args = Vec::new();
        flatten_scoped(node, &mut segments, &mut type_args);
        for args in type_args {
            self.resolve_type_arguments(args, source, uses);
        }
        let names: Vec<&str> = segments.iter().map(|s| text(*s, source)).collect();
        let resolved = self.resolve_segments(&segments, &names, uses);
        if resolved.is_none() {
            uses.unresolved
                .push((node.start_byte(), names.join(".")));
        }
        resolved
    }

    /// Resolve `a.b.C.D` given its identifier nodes.
    fn resolve_segments(
        &self,
        segments: &[Node<'_>],
        names: &[&str],
        uses: &mut TypeUses,
    ) -> Option<String> {
        let first = segments.first()?;
        let mut refs = Vec::new();
        let (mut owner, rest) = match self.resolve_simple(names[0]) {
            Some(TypeBinding::Type(binary)) => {
                refs.push(TypeRef::new(first.start_byte(), first.end_byte(), &binary));
                (binary, 1)
            }
            Some(TypeBinding::Var(_)) => return None,
            None => {
                let (binary, k) = (1..names.len()).rev().find_map(|k| {
                    let package = names[..k].join(".");
                    self.index
                        .top_level(&package, names[k])
                        .map(|b| (b.to_string(), k))
                })?;
                refs.push(TypeRef::new(first.start_byte(), segments[k].end_byte(), &binary));
                (binary, k + 1)
            }
        };
        for (segment, name) in segments.iter().zip(names).skip(rest) {
            owner = lookup::member_type(self.index, &owner, name)?;
            refs.push(TypeRef::new(segment.start_byte(), segment.end_byte(), &owner));
        }
        uses.refs.extend(refs);
        Some(owner)
    }
}

fn flatten_scoped<'t>(node: Node<'t>, segments: &mut Vec<Node<'t>>, type_args: &mut Vec<Node<'t>>) {
    for child in named_children(node) {
        match child.kind() {
            "type_identifier" => segments.push(child),
            "scoped_type_identifier" | "generic_type" => flatten_scoped(child, segments, type_args),
            "type_arguments" => type_args.push(child),
            _ => {}
        }
    }
}

// ============================================================================
// Type References
// ============================================================================

/// A type name in source, by byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub start: usize,
    pub end: usize,
    pub binary: String,
}

impl TypeRef {
    pub fn new(start: usize, end: usize, binary: &str) -> Self {
        TypeRef {
            start,
            end,
            binary: binary.to_string(),
        }
    }
}

/// Type names seen while resolving a type node.
#[derive(Debug, Clone, Default)]
pub struct TypeUses {
    pub refs: Vec<TypeRef>,
    /// `(byte offset, name)` of names that did not resolve.
    pub unresolved: Vec<(usize, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::model::{Origin, TypeDecl, TypeKind};
    use crate::syntax::{java_parser, parse};

    fn index() -> TypeIndex {
        let mut index = TypeIndex::new();
        builtins::install(&mut index);
        for name in ["com.x.Old", "com.x.Outer", "com.y.Other", "p.Here"] {
            index.insert(TypeDecl::new(name, TypeKind::Class, Origin::Source));
        }
        let mut inner = TypeDecl::new("com.x.Outer$Inner", TypeKind::Class, Origin::Source);
        inner.outer = Some("com.x.Outer".into());
        index.insert(inner);
        index.add_member("com.x.Outer", "Inner", "com.x.Outer$Inner");
        index
    }

    fn header(index: &TypeIndex, imports: &[(&str, bool, bool)]) -> UnitHeader {
        let raw: Vec<RawImport> = imports
            .iter()
            .map(|(path, is_static, on_demand)| RawImport {
                segments: path.split('.').map(str::to_string).collect(),
                is_static: *is_static,
                on_demand: *on_demand,
            })
            .collect();
        UnitHeader {
            package: "p".to_string(),
            imports: Imports::resolve(&raw, index),
        }
    }

    /// Resolve the declared type of the field in `class T { <ty> f; }`.
    fn field_type(env: &TypeEnv<'_>, ty: &str) -> (Option<FieldType>, TypeUses, String) {
        let src = format!("class T {{ {} f; }}", ty);
        let mut parser = java_parser().unwrap();
        let tree = parse(&mut parser, &src).unwrap();
        let class = named_children(tree.root_node())[0];
        let body = class.child_by_field_name("body").unwrap();
        let field = named_children(body)[0];
        let type_node = field.child_by_field_name("type").unwrap();
        let mut uses = TypeUses::default();
        let resolved = env.resolve_type(type_node, &src, &mut uses);
        (resolved, uses, src)
    }

    #[test]
    fn lookup_order() {
        let index = index();
        let header = header(&index, &[("com.x.Old", false, false), ("com.y", false, true)]);
        let env = TypeEnv::new(&index, &header);
        assert_eq!(env.resolve_simple("Old"), Some(TypeBinding::Type("com.x.Old".into())));
        assert_eq!(env.resolve_simple("Here"), Some(TypeBinding::Type("p.Here".into())));
        assert_eq!(env.resolve_simple("Other"), Some(TypeBinding::Type("com.y.Other".into())));
        assert_eq!(
            env.resolve_simple("String"),
            Some(TypeBinding::Type("java.lang.String".into()))
        );
        assert_eq!(env.resolve_simple("Outer"), None);
    }

    #[test]
    fn scopes_shadow_imports() {
        let index = index();
        let header = header(&index, &[("com.x.Old", false, false)]);
        let mut env = TypeEnv::new(&index, &header);
        env.push_class("com.x.Outer");
        assert_eq!(
            env.resolve_simple("Inner"),
            Some(TypeBinding::Type("com.x.Outer$Inner".into()))
        );
        let var = TypeParam::new("Old", JType::object("java.lang.Number"));
        env.push_type_vars(vec![var.clone()]);
        assert_eq!(env.resolve_simple("Old"), Some(TypeBinding::Var(var)));
        env.pop();
        env.push_block();
        env.add_local_type("Local", "p.Here$1Local");
        assert_eq!(
            env.resolve_simple("Local"),
            Some(TypeBinding::Type("p.Here$1Local".into()))
        );
        env.pop();
        assert_eq!(env.resolve_simple("Local"), None);
    }

    #[test]
    fn package_qualified_type_is_one_reference() {
        let index = index();
        let header = header(&index, &[]);
        let env = TypeEnv::new(&index, &header);
        let (ty, uses, src) = field_type(&env, "com.x.Outer.Inner[]");
        assert_eq!(ty.unwrap().to_string(), "[Lcom/x/Outer$Inner;");
        let spans: Vec<&str> = uses.refs.iter().map(|r| &src[r.start..r.end]).collect();
        assert_eq!(spans, vec!["com.x.Outer", "Inner"]);
        assert!(uses.unresolved.is_empty());
    }

    #[test]
    fn generic_arguments_are_references_too() {
        let index = index();
        let header = header(&index, &[("com.x.Old", false, false)]);
        let env = TypeEnv::new(&index, &header);
        let (ty, uses, _) = field_type(&env, "Comparable<? extends Old>");
        assert_eq!(ty, Some(FieldType::Object("java.lang.Comparable".into())));
        let bins: Vec<&str> = uses.refs.iter().map(|r| r.binary.as_str()).collect();
        assert_eq!(bins, vec!["java.lang.Comparable", "com.x.Old"]);
    }

    #[test]
    fn type_arguments_survive_resolution() {
        let index = index();
        let header = header(&index, &[("com.x.Old", false, false)]);
        let env = TypeEnv::new(&index, &header);
        let src = "class T { Comparable<? super Old>[] f; }";
        let mut parser = java_parser().unwrap();
        let tree = parse(&mut parser, src).unwrap();
        let body = named_children(tree.root_node())[0].child_by_field_name("body").unwrap();
        let type_node = named_children(body)[0].child_by_field_name("type").unwrap();
        let mut uses = TypeUses::default();
        let ty = env.resolve_generic(type_node, src, &mut uses).unwrap();
        assert_eq!(ty.to_string(), "java.lang.Comparable<? super com.x.Old>[]");
        assert_eq!(ty.erasure().to_string(), "[Ljava/lang/Comparable;");
    }

    #[test]
    fn unknown_imports_keep_their_spelling() {
        let index = index();
        let header = header(&index, &[("org.lib.Widget", false, false), ("org.lib.Outer.Part", false, false)]);
        assert_eq!(header.imports.unknown["Widget"], "org.lib.Widget");
        assert_eq!(header.imports.unknown["Part"], "org.lib.Outer$Part");
        let env = TypeEnv::new(&index, &header);
        let (ty, uses, _) = field_type(&env, "Widget");
        assert_eq!(ty, Some(FieldType::Object("org.lib.Widget".into())));
        assert!(uses.refs.is_empty());
        assert_eq!(uses.unresolved[0].1, "Widget");
    }

    #[test]
    fn unknown_names_are_reported() {
        let index = index();
        let header = header(&index, &[]);
        let env = TypeEnv::new(&index, &header);
        let (ty, uses, _) = field_type(&env, "Missing");
        assert_eq!(ty, None);
        assert_eq!(uses.unresolved[0].1, "Missing");
    }
}
