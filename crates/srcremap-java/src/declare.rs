//! Declaration pass: index every type declared in source.
//!
//! Runs over all parsed units before any reference is resolved, in three
//! steps so each can rely on the previous one program-wide:
//!
//! 1. register every type (top-level, member, local, anonymous) by binary
//!    name and link member types to their outer types;
//! 2. resolve supertypes, twice, so that a supertype named through an
//!    inherited member type resolves on the second round;
//! 3. compute fields and methods with erased descriptors, keeping generic
//!    forms alongside. A method whose signature names an unknown type is
//!    left out: its key cannot be known.
//!
//! The walker later re-derives the same scopes, and finds the binary names
//! and method descriptors chosen here by declaration node start byte.

use std::collections::HashMap;

use srcremap_core::descriptor::{FieldType, MethodDescriptor};
use tree_sitter::{Node, Tree};

use crate::generic::{GenericMethod, JType, TypeArg, TypeParam};
use crate::model::{FieldDecl, MethodDecl, Origin, TypeDecl, TypeIndex, TypeKind, OBJECT};
use crate::names::{Imports, RawImport, TypeEnv, TypeUses, UnitHeader};
use crate::syntax::{
    child_of_kind, dimension_count, field_children, has_modifier, is_type_declaration,
    is_type_node, named_children, text,
};

/// A unit with its syntax tree. `tree` is `None` if the parser gave up.
pub struct ParsedUnit {
    pub id: String,
    pub text: String,
    pub tree: Option<Tree>,
}

/// What the declaration pass learned about one unit.
#[derive(Debug, Default)]
pub struct DeclaredUnit {
    pub header: UnitHeader,
    /// Binary name by start byte of the declaring node (the `class_body` of
    /// an anonymous class).
    pub types: HashMap<usize, String>,
    /// Declaring type and method by start byte of the method, constructor or
    /// compact constructor node.
    pub methods: HashMap<usize, (String, MethodDecl)>,
}

/// Run the declaration pass over every unit, adding source types to `index`.
pub fn declare_units(index: &mut TypeIndex, units: &[ParsedUnit]) -> Vec<DeclaredUnit> {
    let mut raw_imports = Vec::with_capacity(units.len());
    let mut declared = Vec::with_capacity(units.len());
    let mut links = Vec::new();

    for unit in units {
        let mut out = DeclaredUnit::default();
        let mut imports = Vec::new();
        if let Some(tree) = &unit.tree {
            let mut register = Register::new(&unit.text);
            register.header(tree.root_node(), &mut imports);
            register.visit(tree.root_node());
            for decl in register.decls {
                index.insert(decl);
            }
            links.extend(register.links);
            out.header.package = register.package;
            out.types = register.types;
        }
        raw_imports.push(imports);
        declared.push(out);
    }
    for (outer, simple, inner) in &links {
        index.add_member(outer, simple, inner);
    }
    for (out, raw) in declared.iter_mut().zip(&raw_imports) {
        out.header.imports = Imports::resolve(raw, index);
    }

    for _round in 0..2 {
        let mut supers = Vec::new();
        for (unit, out) in units.iter().zip(&declared) {
            if let Some(tree) = &unit.tree {
                let mut pass = Resolve::new(index, &unit.text, out, Pass::Supertypes);
                pass.visit(tree.root_node());
                supers.extend(pass.supers);
            }
        }
        for record in supers {
            if let Some(decl) = index.get_mut(&record.binary) {
                record.apply(decl);
            }
        }
    }

    let mut members = Vec::new();
    for (unit, out) in units.iter().zip(declared.iter_mut()) {
        if let Some(tree) = &unit.tree {
            let (found, methods) = {
                let mut pass = Resolve::new(index, &unit.text, out, Pass::Members);
                pass.visit(tree.root_node());
                (pass.members, pass.methods)
            };
            members.extend(found);
            out.methods = methods;
        }
    }
    for (binary, fields, methods) in members {
        if let Some(decl) = index.get_mut(&binary) {
            decl.fields = fields;
            decl.methods = methods;
        }
    }

    tracing::debug!(units = units.len(), types = index.len(), "declared source types");
    declared
}

fn kind_of(node_kind: &str) -> TypeKind {
    match node_kind {
        "interface_declaration" => TypeKind::Interface,
        "enum_declaration" => TypeKind::Enum,
        "record_declaration" => TypeKind::Record,
        "annotation_type_declaration" => TypeKind::Annotation,
        _ => TypeKind::Class,
    }
}

/// Whether a type declared directly under `parent_kind` is a member type.
fn is_member_container(parent_kind: &str) -> bool {
    matches!(
        parent_kind,
        "class_body" | "interface_body" | "enum_body_declarations" | "annotation_type_body"
    )
}

/// Dotted name written in a `scoped_identifier` / `identifier` node.
pub fn dotted_name(node: Node<'_>, source: &str) -> Vec<String> {
    text(node, source)
        .split('.')
        .map(|s| s.split_whitespace().collect::<String>())
        .filter(|s| !s.is_empty())
        .collect()
}

// ============================================================================
// Step 1: Registration
// ============================================================================

struct Register<'s> {
    source: &'s str,
    package: String,
    /// Enclosing type binaries, innermost last.
    outer: Vec<String>,
    anonymous: HashMap<String, usize>,
    local: HashMap<(String, String), usize>,
    types: HashMap<usize, String>,
    decls: Vec<TypeDecl>,
    links: Vec<(String, String, String)>,
}

impl<'s> Register<'s> {
    fn new(source: &'s str) -> Self {
        Register {
            source,
            package: String::new(),
            outer: Vec::new(),
            anonymous: HashMap::new(),
            local: HashMap::new(),
            types: HashMap::new(),
            decls: Vec::new(),
            links: Vec::new(),
        }
    }

    fn header(&mut self, root: Node<'_>, imports: &mut Vec<RawImport>) {
        for child in named_children(root) {
            match child.kind() {
                "package_declaration" => {
                    if let Some(name) = named_children(child)
                        .into_iter()
                        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
                    {
                        self.package = dotted_name(name, self.source).join(".");
                    }
                }
                "import_declaration" => {
                    if let Some(import) = raw_import(child, self.source) {
                        imports.push(import);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit(&mut self, node: Node<'_>) {
        let kind = node.kind();
        if is_type_declaration(kind) {
            self.named_type(node);
            return;
        }
        let body = match kind {
            "object_creation_expression" => child_of_kind(node, "class_body"),
            "enum_constant" => node.child_by_field_name("body"),
            _ => None,
        };
        for child in named_children(node) {
            if Some(child) == body {
                self.anonymous_type(child);
            } else {
                self.visit(child);
            }
        }
    }

    fn named_type(&mut self, node: Node<'_>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = text(name_node, self.source).to_string();
        let parent_kind = node.parent().map(|p| p.kind()).unwrap_or("program");

        let (binary, outer, is_local) = match self.outer.last() {
            None if self.package.is_empty() => (name.clone(), None, false),
            None => (format!("{}.{}", self.package, name), None, false),
            Some(outer) if is_member_container(parent_kind) => {
                (format!("{}${}", outer, name), Some(outer.clone()), false)
            }
            Some(outer) => {
                let n = self
                    .local
                    .entry((outer.clone(), name.clone()))
                    .or_insert(0);
                *n += 1;
                (format!("{}${}{}", outer, n, name), Some(outer.clone()), true)
            }
        };

        let mut decl = TypeDecl::new(binary.as_str(), kind_of(node.kind()), Origin::Source);
        decl.simple = name.clone();
        decl.outer = outer.clone();
        decl.is_local = is_local;
        if let (Some(outer), false) = (outer, is_local) {
            self.links.push((outer, name, binary.clone()));
        }
        self.types.insert(node.start_byte(), binary.clone());
        self.decls.push(decl);

        self.outer.push(binary);
        for child in named_children(node) {
            self.visit(child);
        }
        self.outer.pop();
    }

    fn anonymous_type(&mut self, body: Node<'_>) {
        let Some(outer) = self.outer.last().cloned() else {
            return;
        };
        let n = self.anonymous.entry(outer.clone()).or_insert(0);
        *n += 1;
        let binary = format!("{}${}", outer, n);

        let mut decl = TypeDecl::new(binary.as_str(), TypeKind::Class, Origin::Source);
        decl.outer = Some(outer);
        decl.is_local = true;
        self.types.insert(body.start_byte(), binary.clone());
        self.decls.push(decl);

        self.outer.push(binary);
        for child in named_children(body) {
            self.visit(child);
        }
        self.outer.pop();
    }
}

fn raw_import(node: Node<'_>, source: &str) -> Option<RawImport> {
    let mut segments = None;
    let mut is_static = false;
    let mut on_demand = false;
    for child in crate::syntax::children(node) {
        match child.kind() {
            "static" => is_static = true,
            "asterisk" => on_demand = true,
            "scoped_identifier" | "identifier" => segments = Some(dotted_name(child, source)),
            _ => {}
        }
    }
    Some(RawImport {
        segments: segments?,
        is_static,
        on_demand,
    })
}

// ============================================================================
// Steps 2 and 3: Supertypes and Members
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pass {
    Supertypes,
    Members,
}

struct Supertypes {
    binary: String,
    superclass: Option<String>,
    interfaces: Vec<String>,
    type_params: Vec<TypeParam>,
    /// Superclass then interfaces, with type arguments.
    generic: Vec<JType>,
}

impl Supertypes {
    fn apply(self, decl: &mut TypeDecl) {
        decl.superclass = self.superclass;
        decl.interfaces = self.interfaces;
        decl.type_params = self.type_params;
        decl.generic_supers = if self.generic.iter().any(JType::is_generic) {
            self.generic
        } else {
            Vec::new()
        };
    }
}

type Members = (String, Vec<FieldDecl>, Vec<MethodDecl>);

struct Resolve<'a> {
    env: TypeEnv<'a>,
    source: &'a str,
    types: &'a HashMap<usize, String>,
    pass: Pass,
    supers: Vec<Supertypes>,
    members: Vec<Members>,
    methods: HashMap<usize, (String, MethodDecl)>,
}

impl<'a> Resolve<'a> {
    fn new(index: &'a TypeIndex, source: &'a str, unit: &'a DeclaredUnit, pass: Pass) -> Self {
        Resolve {
            env: TypeEnv::new(index, &unit.header),
            source,
            types: &unit.types,
            pass,
            supers: Vec::new(),
            members: Vec::new(),
            methods: HashMap::new(),
        }
    }

    fn visit(&mut self, node: Node<'_>) {
        match node.kind() {
            kind if is_type_declaration(kind) => self.type_declaration(node),
            "object_creation_expression" => {
                let body = child_of_kind(node, "class_body");
                for child in named_children(node) {
                    if Some(child) == body {
                        let base = node
                            .child_by_field_name("type")
                            .and_then(|t| self.declared_type(t));
                        self.anonymous_type(child, base);
                    } else {
                        self.visit(child);
                    }
                }
            }
            "enum_constant" => {
                let body = node.child_by_field_name("body");
                for child in named_children(node) {
                    if Some(child) == body {
                        let base = self.env.current_class().map(JType::object);
                        self.anonymous_type(child, base);
                    } else {
                        self.visit(child);
                    }
                }
            }
            "method_declaration" | "constructor_declaration" => {
                let vars = self.type_parameters(node);
                self.env.push_type_vars(vars);
                self.visit_children(node);
                self.env.pop();
            }
            "block" | "constructor_body" | "switch_block_statement_group" | "switch_rule" => {
                self.env.push_block();
                self.visit_children(node);
                self.env.pop();
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node<'_>) {
        for child in named_children(node) {
            self.visit(child);
        }
    }

    fn type_parameters(&mut self, node: Node<'_>) -> Vec<TypeParam> {
        match node.child_by_field_name("type_parameters") {
            Some(tp) => self
                .env
                .type_parameters(tp, self.source, &mut TypeUses::default()),
            None => Vec::new(),
        }
    }

    /// A declared type, or `None` if any name in it is unknown.
    fn declared_type(&self, node: Node<'_>) -> Option<JType> {
        self.env
            .resolve_generic(node, self.source, &mut TypeUses::default())
    }

    /// A field's type for expression typing only: unknown names keep their
    /// written spelling.
    fn field_type(&self, node: Node<'_>) -> JType {
        self.declared_type(node).unwrap_or_else(|| {
            let written = text(node, self.source);
            let base = written.split(['<', '[']).next().unwrap_or(written).trim();
            JType::object(base).with_dims(written.matches('[').count())
        })
    }

    fn type_declaration(&mut self, node: Node<'_>) {
        let Some(binary) = self.types.get(&node.start_byte()).cloned() else {
            return;
        };
        let is_local = !node
            .parent()
            .is_some_and(|p| is_member_container(p.kind()) || p.kind() == "program");
        if is_local {
            if let Some(name) = node.child_by_field_name("name") {
                let name = text(name, self.source).to_string();
                self.env.add_local_type(&name, &binary);
            }
        }

        let vars = self.type_parameters(node);
        self.env.push_type_vars(vars.clone());
        if self.pass == Pass::Supertypes {
            let record = self.supertypes(node, &binary, vars);
            self.supers.push(record);
        }
        self.env.push_class(binary.as_str());
        if self.pass == Pass::Members {
            self.type_members(node, &binary, false);
        }
        self.visit_children(node);
        self.env.pop();
        self.env.pop();
    }

    fn anonymous_type(&mut self, body: Node<'_>, base: Option<JType>) {
        let Some(binary) = self.types.get(&body.start_byte()).cloned() else {
            return;
        };
        if self.pass == Pass::Supertypes {
            let base = match base {
                Some(ty @ JType::Class { .. }) => ty,
                _ => JType::object(OBJECT),
            };
            let name = base.class_name().unwrap_or(OBJECT).to_string();
            let is_interface = self
                .env
                .index
                .get(&name)
                .is_some_and(|d| d.kind.is_interface());
            self.supers.push(if is_interface {
                Supertypes {
                    binary: binary.clone(),
                    superclass: Some(OBJECT.to_string()),
                    interfaces: vec![name],
                    type_params: Vec::new(),
                    generic: vec![JType::object(OBJECT), base],
                }
            } else {
                Supertypes {
                    binary: binary.clone(),
                    superclass: Some(name),
                    interfaces: Vec::new(),
                    type_params: Vec::new(),
                    generic: vec![base],
                }
            });
        }
        self.env.push_class(binary.as_str());
        if self.pass == Pass::Members {
            self.type_members(body, &binary, true);
        }
        self.visit_children(body);
        self.env.pop();
    }

    fn supertypes(&self, node: Node<'_>, binary: &str, type_params: Vec<TypeParam>) -> Supertypes {
        let mut superclass = None;
        let mut interfaces = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "superclass" => {
                    superclass = named_children(child)
                        .into_iter()
                        .find(|c| is_type_node(c.kind()))
                        .and_then(|t| self.declared_type(t));
                }
                "super_interfaces" | "extends_interfaces" => {
                    let list = child_of_kind(child, "type_list").unwrap_or(child);
                    for ty in named_children(list) {
                        if let Some(ty @ JType::Class { .. }) = self.declared_type(ty) {
                            interfaces.push(ty);
                        }
                    }
                }
                _ => {}
            }
        }
        let superclass = match node.kind() {
            "interface_declaration" => None,
            "annotation_type_declaration" => {
                interfaces.push(JType::object("java.lang.annotation.Annotation"));
                None
            }
            "enum_declaration" => Some(JType::Class {
                binary: "java.lang.Enum".to_string(),
                args: vec![TypeArg::Exact(JType::object(binary))],
            }),
            "record_declaration" => Some(JType::object("java.lang.Record")),
            _ => match superclass {
                Some(ty @ JType::Class { .. }) => Some(ty),
                _ if binary == OBJECT => None,
                _ => Some(JType::object(OBJECT)),
            },
        };
        Supertypes {
            binary: binary.to_string(),
            superclass: superclass.as_ref().and_then(|t| t.class_name()).map(str::to_string),
            interfaces: interfaces
                .iter()
                .filter_map(|t| t.class_name())
                .map(str::to_string)
                .collect(),
            type_params,
            generic: superclass.into_iter().chain(interfaces).collect(),
        }
    }

    fn type_members(&mut self, node: Node<'_>, binary: &str, anonymous: bool) {
        let kind = if anonymous {
            TypeKind::Class
        } else {
            kind_of(node.kind())
        };
        let mut fields = Vec::new();
        let mut methods = Vec::new();

        let mut components = Vec::new();
        if kind == TypeKind::Record {
            if let Some(params) = node.child_by_field_name("parameters") {
                for param in named_children(params) {
                    let (Some(ty), Some(name)) = (
                        param.child_by_field_name("type"),
                        param.child_by_field_name("name"),
                    ) else {
                        continue;
                    };
                    let resolved = self.declared_type(ty);
                    let name = text(name, self.source).to_string();
                    let field_ty = resolved.clone().unwrap_or_else(|| self.field_type(ty));
                    fields.push(FieldDecl::new(name.as_str(), field_ty.erasure(), false).with_generic(field_ty));
                    components.push((name, resolved));
                }
            }
        }
        // Without every component type there is no canonical signature.
        let canonical: Option<Vec<JType>> = components.iter().map(|(_, ty)| ty.clone()).collect();

        let body = if anonymous {
            Some(node)
        } else {
            node.child_by_field_name("body")
        };
        if let Some(body) = body {
            self.body_members(body, binary, kind, canonical.as_deref(), &mut fields, &mut methods);
        }

        let has_ctor = methods.iter().any(MethodDecl::is_constructor);
        match kind {
            TypeKind::Class | TypeKind::Enum if !anonymous && !has_ctor => {
                let mut ctor = MethodDecl::new("<init>", MethodDescriptor::new(Vec::new(), None));
                ctor.is_private = kind == TypeKind::Enum;
                methods.push(ctor);
            }
            _ => {}
        }
        if kind == TypeKind::Enum {
            let this = FieldType::Object(binary.to_string());
            let mut values = MethodDecl::new(
                "values",
                MethodDescriptor::new(Vec::new(), Some(this.clone().with_dims(1))),
            );
            values.is_static = true;
            let mut value_of = MethodDecl::new(
                "valueOf",
                MethodDescriptor::new(vec![FieldType::string()], Some(this)),
            );
            value_of.is_static = true;
            methods.push(values);
            methods.push(value_of);
        }
        if kind == TypeKind::Record {
            if let Some(canonical) = &canonical {
                let ctor = generic_method("<init>", Vec::new(), canonical.clone(), None);
                if !methods.iter().any(|m| m.is_constructor() && m.desc == ctor.desc) {
                    methods.push(ctor);
                }
            }
            for (name, ty) in &components {
                let Some(ty) = ty else { continue };
                if !methods
                    .iter()
                    .any(|m| &m.name == name && m.desc.params.is_empty())
                {
                    methods.push(generic_method(name, Vec::new(), Vec::new(), Some(ty.clone())));
                }
            }
        }

        self.members.push((binary.to_string(), fields, methods));
    }

    fn body_members(
        &mut self,
        body: Node<'_>,
        binary: &str,
        kind: TypeKind,
        canonical: Option<&[JType]>,
        fields: &mut Vec<FieldDecl>,
        methods: &mut Vec<MethodDecl>,
    ) {
        let interface = kind.is_interface();
        for member in named_children(body) {
            match member.kind() {
                "field_declaration" | "constant_declaration" => {
                    let Some(ty) = member.child_by_field_name("type") else {
                        continue;
                    };
                    let ty = self.field_type(ty);
                    let is_static = interface || has_modifier(member, "static");
                    for declarator in field_children(member, "declarator") {
                        let Some(name) = declarator.child_by_field_name("name") else {
                            continue;
                        };
                        let dims = dimension_count(declarator.child_by_field_name("dimensions"), self.source);
                        let ty = ty.clone().with_dims(dims);
                        fields.push(
                            FieldDecl::new(text(name, self.source), ty.erasure(), is_static).with_generic(ty),
                        );
                    }
                }
                "enum_constant" => {
                    if let Some(name) = member.child_by_field_name("name") {
                        fields.push(FieldDecl::new(
                            text(name, self.source),
                            FieldType::Object(binary.to_string()),
                            true,
                        ));
                    }
                }
                "method_declaration" | "constructor_declaration" => match self.method(member, interface) {
                    Some(method) => {
                        self.methods
                            .insert(member.start_byte(), (binary.to_string(), method.clone()));
                        methods.push(method);
                    }
                    None => tracing::debug!(
                        owner = binary,
                        offset = member.start_byte(),
                        "method signature names an unknown type; not declared"
                    ),
                },
                "compact_constructor_declaration" => {
                    if let Some(canonical) = canonical {
                        let method = generic_method("<init>", Vec::new(), canonical.to_vec(), None);
                        self.methods
                            .insert(member.start_byte(), (binary.to_string(), method.clone()));
                        methods.push(method);
                    }
                }
                "annotation_type_element_declaration" => {
                    let (Some(name), Some(ty)) = (
                        member.child_by_field_name("name"),
                        member.child_by_field_name("type"),
                    ) else {
                        continue;
                    };
                    let dims = dimension_count(member.child_by_field_name("dimensions"), self.source);
                    if let Some(ret) = self.declared_type(ty) {
                        let mut element =
                            generic_method(text(name, self.source), Vec::new(), Vec::new(), Some(ret.with_dims(dims)));
                        element.is_abstract = true;
                        methods.push(element);
                    }
                }
                "enum_body_declarations" => {
                    self.body_members(member, binary, kind, canonical, fields, methods)
                }
                _ => {}
            }
        }
    }

    /// `None` if a parameter or return type names an unknown type.
    fn method(&mut self, node: Node<'_>, interface: bool) -> Option<MethodDecl> {
        let vars = self.type_parameters(node);
        self.env.push_type_vars(vars.clone());

        let is_constructor = node.kind() == "constructor_declaration";
        let params = match node.child_by_field_name("parameters") {
            Some(p) => self.parameter_types(p),
            None => Some((Vec::new(), false)),
        };
        let ret = if is_constructor {
            Some(None)
        } else {
            match node.child_by_field_name("type").filter(|t| t.kind() != "void_type") {
                Some(t) => {
                    let dims = dimension_count(node.child_by_field_name("dimensions"), self.source);
                    self.declared_type(t).map(|ty| Some(ty.with_dims(dims)))
                }
                None => Some(None),
            }
        };
        self.env.pop();
        let ((params, is_varargs), ret) = (params?, ret?);

        let name = if is_constructor {
            "<init>".to_string()
        } else {
            node.child_by_field_name("name")
                .map(|n| text(n, self.source).to_string())
                .unwrap_or_default()
        };
        let mut method = generic_method(name, vars, params, ret);
        method.is_static = has_modifier(node, "static");
        method.is_private = has_modifier(node, "private") && !interface;
        method.is_varargs = is_varargs;
        method.is_abstract = if interface {
            !method.is_static && node.child_by_field_name("body").is_none()
        } else {
            has_modifier(node, "abstract")
        };
        Some(method)
    }

    /// Parameter types of a `formal_parameters` node, and whether the last
    /// one is variable arity. `None` if any names an unknown type.
    fn parameter_types(&self, params: Node<'_>) -> Option<(Vec<JType>, bool)> {
        let mut types = Vec::new();
        let mut varargs = false;
        for param in named_children(params) {
            match param.kind() {
                "formal_parameter" => {
                    let Some(ty) = param.child_by_field_name("type") else {
                        continue;
                    };
                    let dims = dimension_count(param.child_by_field_name("dimensions"), self.source);
                    types.push(self.declared_type(ty)?.with_dims(dims));
                }
                "spread_parameter" => {
                    if let Some(ty) = named_children(param)
                        .into_iter()
                        .find(|c| is_type_node(c.kind()))
                    {
                        types.push(self.declared_type(ty)?.with_dims(1));
                        varargs = true;
                    }
                }
                _ => {}
            }
        }
        Some((types, varargs))
    }
}

/// A method with an erased descriptor and, if it differs, its generic form.
fn generic_method(
    name: impl Into<String>,
    type_params: Vec<TypeParam>,
    params: Vec<JType>,
    ret: Option<JType>,
) -> MethodDecl {
    let sig = GenericMethod {
        type_params,
        params,
        ret,
    };
    MethodDecl::new(name, sig.erasure()).with_generic(sig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::syntax::{java_parser, parse};

    fn declare(sources: &[(&str, &str)]) -> (TypeIndex, Vec<DeclaredUnit>) {
        let mut parser = java_parser().unwrap();
        let units: Vec<ParsedUnit> = sources
            .iter()
            .map(|(id, text)| ParsedUnit {
                id: id.to_string(),
                text: text.to_string(),
                tree: parse(&mut parser, text),
            })
            .collect();
        let mut index = TypeIndex::new();
        builtins::install(&mut index);
        let declared = declare_units(&mut index, &units);
        (index, declared)
    }

    fn method_sigs(index: &TypeIndex, binary: &str) -> Vec<String> {
        let mut sigs: Vec<String> = index
            .get(binary)
            .unwrap()
            .methods
            .iter()
            .map(|m| m.signature(binary).0)
            .collect();
        sigs.sort();
        sigs
    }

    #[test]
    fn nested_local_and_anonymous_names() {
        let src = r#"
package com.x;
public class Outer {
    static class Inner {}
    void run() {
        class Local {}
        Runnable r = new Runnable() { public void run() {} };
        Object o = new Object() {};
    }
}
"#;
        let (index, declared) = declare(&[("com/x/Outer.java", src)]);
        for name in ["com.x.Outer", "com.x.Outer$Inner", "com.x.Outer$1Local", "com.x.Outer$1", "com.x.Outer$2"] {
            assert!(index.contains(name), "{name}");
        }
        assert_eq!(declared[0].header.package, "com.x");
        assert_eq!(index.top_level("com.x", "Outer"), Some("com.x.Outer"));
        assert_eq!(index.top_level("com.x", "Local"), None);
        assert_eq!(
            index.get("com.x.Outer").unwrap().members.get("Inner").map(String::as_str),
            Some("com.x.Outer$Inner")
        );
        let anon = index.get("com.x.Outer$1").unwrap();
        assert_eq!(anon.superclass.as_deref(), Some(OBJECT));
        assert_eq!(anon.interfaces, vec!["java.lang.Runnable"]);
        assert_eq!(
            index.get("com.x.Outer$2").unwrap().superclass.as_deref(),
            Some(OBJECT)
        );
    }

    #[test]
    fn descriptors_are_erased_and_qualified() {
        let a = r#"
package com.x;
import com.y.Dep;
public class A<T extends Number> extends Base implements Comparable<A<T>> {
    int count;
    static String[] names, more[];
    A() {}
    int foo(int bar) { return bar; }
    <U> U pick(T t, U u, Dep... deps) { return u; }
    public int compareTo(A<T> other) { return 0; }
}
class Base {}
"#;
        let dep = "package com.y; public class Dep {}";
        let (index, _) = declare(&[("com/x/A.java", a), ("com/y/Dep.java", dep)]);
        let decl = index.get("com.x.A").unwrap();
        assert_eq!(decl.superclass.as_deref(), Some("com.x.Base"));
        assert_eq!(decl.interfaces, vec!["java.lang.Comparable"]);
        assert_eq!(
            method_sigs(&index, "com.x.A"),
            vec![
                "com.x.A.<init>()V",
                "com.x.A.compareTo(Lcom/x/A;)I",
                "com.x.A.foo(I)I",
                "com.x.A.pick(Ljava/lang/Number;Ljava/lang/Object;[Lcom/y/Dep;)Ljava/lang/Object;",
            ]
        );
        let pick = decl.methods.iter().find(|m| m.name == "pick").unwrap();
        assert!(pick.is_varargs);
        let fields: Vec<String> = decl
            .fields
            .iter()
            .map(|f| format!("{}:{}:{}", f.name, f.ty, f.is_static))
            .collect();
        assert_eq!(
            fields,
            vec![
                "count:I:false",
                "names:[Ljava/lang/String;:true",
                "more:[[Ljava/lang/String;:true"
            ]
        );
        assert_eq!(method_sigs(&index, "com.x.Base"), vec!["com.x.Base.<init>()V"]);
    }

    #[test]
    fn enums_records_and_annotations_get_implicit_members() {
        let src = r#"
enum Color { RED, GREEN { void f() {} }; Color() {} }
record Point(int x, int y) { Point { } public int x() { return x; } }
@interface Tag { String value(); int[] codes() default {}; }
interface Shape { double area(); int SIDES = 0; }
"#;
        let (index, _) = declare(&[("Shapes.java", src)]);
        assert_eq!(
            method_sigs(&index, "Color"),
            vec!["Color.<init>()V", "Color.valueOf(Ljava/lang/String;)LColor;", "Color.values()[LColor;"]
        );
        assert_eq!(index.get("Color").unwrap().superclass.as_deref(), Some("java.lang.Enum"));
        assert_eq!(index.get("Color$1").unwrap().superclass.as_deref(), Some("Color"));
        assert_eq!(
            method_sigs(&index, "Point"),
            vec!["Point.<init>(II)V", "Point.x()I", "Point.y()I"]
        );
        assert_eq!(
            method_sigs(&index, "Tag"),
            vec!["Tag.codes()[I", "Tag.value()Ljava/lang/String;"]
        );
        let shape = index.get("Shape").unwrap();
        assert!(shape.fields[0].is_static);
        assert_eq!(shape.superclass, None);
    }

    #[test]
    fn supertype_through_inherited_member_type() {
        let src = r#"
class Base { static class Node {} }
class Derived extends Base { static class Leaf extends Node {} }
"#;
        let (index, _) = declare(&[("T.java", src)]);
        assert_eq!(
            index.get("Derived$Leaf").unwrap().superclass.as_deref(),
            Some("Base$Node")
        );
    }

    #[test]
    fn unknown_types_leave_methods_out() {
        let src = r#"
import org.lib.Widget;
class A {
    Missing m;
    void take(Widget w) {}
    void drop(Missing m) {}
    Missing make() { return null; }
    void keep(int n) {}
}
record R(Missing a, int b) {}
"#;
        let (index, declared) = declare(&[("A.java", src)]);
        assert_eq!(
            method_sigs(&index, "A"),
            vec!["A.<init>()V", "A.keep(I)V", "A.take(Lorg/lib/Widget;)V"]
        );
        assert_eq!(declared[0].methods.len(), 2);
        assert_eq!(index.get("A").unwrap().fields[0].ty, FieldType::Object("Missing".into()));
        assert_eq!(method_sigs(&index, "R"), vec!["R.b()I"]);
    }

    #[test]
    fn generic_forms_sit_next_to_erasures() {
        let src = r#"
class Box<T> { T val; java.util.List<T> all; static <X> X id(X x) { return x; } }
class IntBox extends Box<Integer> {}
interface Fn<A, R> { R apply(A a); default void noop() {} }
"#;
        let (index, _) = declare(&[("Box.java", src)]);
        let boxed = index.get("Box").unwrap();
        assert_eq!(boxed.type_params[0].name, "T");
        assert_eq!(boxed.fields[0].generic_type().to_string(), "T");
        assert_eq!(boxed.fields[1].generic_type().to_string(), "java.util.List<T>");
        assert_eq!(boxed.fields[1].ty, FieldType::Object("java.util.List".into()));
        let id = boxed.methods.iter().find(|m| m.name == "id").unwrap();
        assert_eq!(id.type_params()[0].name, "X");
        assert_eq!(id.signature("Box").0, "Box.id(Ljava/lang/Object;)Ljava/lang/Object;");

        let int_box = index.get("IntBox").unwrap();
        assert_eq!(int_box.superclass.as_deref(), Some("Box"));
        assert_eq!(int_box.generic_supertypes()[0].to_string(), "Box<java.lang.Integer>");

        let abstracts: Vec<&str> = index
            .get("Fn")
            .unwrap()
            .methods
            .iter()
            .filter(|m| m.is_abstract)
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(abstracts, vec!["apply"]);
    }

    #[test]
    fn method_nodes_are_keyed_by_start_byte() {
        let src = "class A { int foo(int bar) { return bar; } }";
        let (_, declared) = declare(&[("A.java", src)]);
        let start = src.find("int foo").unwrap();
        let (owner, method) = &declared[0].methods[&start];
        assert_eq!(owner, "A");
        assert_eq!(method.signature(owner).0, "A.foo(I)I");
    }
}
