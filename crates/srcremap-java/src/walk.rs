//! Reference walker: binds every identifier in one unit.
//!
//! Walks the unit's syntax tree in document order with the same scopes the
//! declaration pass used, plus variable scopes, and emits one occurrence per
//! identifier that names a type, field, method, parameter or local. Names it
//! cannot bind become diagnostics and are left out.

use std::collections::HashMap;

use srcremap_core::descriptor::FieldType;
use srcremap_core::rangemap::{Occurrence, Span};
use srcremap_core::resolver::{Diagnostic, DiagnosticKind};
use srcremap_core::signature::{OccurrenceKind, SymbolSignature};
use srcremap_core::text::CharIndex;
use tree_sitter::Node;

use crate::declare::DeclaredUnit;
use crate::generic::{Bindings, JType, TypeParam};
use crate::lookup::{self, Selection, Ty};
use crate::model::{FieldDecl, MethodDecl, TypeIndex, OBJECT};
use crate::names::{TypeBinding, TypeEnv, TypeUses};
use crate::syntax::{
    child_of_kind, dimension_count, field_children, has_modifier, is_type_declaration,
    is_type_node, named_children, text,
};

/// Occurrences and diagnostics of one unit.
pub struct Walked {
    pub occurrences: Vec<Occurrence>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Bind every identifier in `root`.
pub fn walk_unit(
    index: &TypeIndex,
    unit_id: &str,
    source: &str,
    root: Node<'_>,
    declared: &DeclaredUnit,
) -> Walked {
    let mut walker = Walker {
        index,
        unit_id,
        source,
        chars: CharIndex::new(source),
        declared,
        env: TypeEnv::new(index, &declared.header),
        vars: Vec::new(),
        methods: Vec::new(),
        ordinals: HashMap::new(),
        occurrences: Vec::new(),
        diagnostics: Vec::new(),
    };
    walker.program(root);
    Walked {
        occurrences: walker.occurrences,
        diagnostics: walker.diagnostics,
    }
}

/// A parameter or local in scope. Those of a method whose signature could
/// not be built have no signature and emit nothing.
#[derive(Debug, Clone)]
struct Local {
    name: String,
    signature: Option<SymbolSignature>,
    kind: OccurrenceKind,
    ty: Ty,
}

enum VarFrame {
    Block(Vec<Local>),
    Class(String),
}

enum VarRef {
    Local(Local),
    Field { owner: String, ty: JType },
}

/// An ambiguous name, classified.
enum Res {
    Value(Ty),
    Type(String),
    /// A package name and the byte where its first segment starts.
    Package(String, usize),
    Unknown,
}

struct Walker<'a> {
    index: &'a TypeIndex,
    unit_id: &'a str,
    source: &'a str,
    chars: CharIndex,
    declared: &'a DeclaredUnit,
    env: TypeEnv<'a>,
    vars: Vec<VarFrame>,
    /// Signatures of the enclosing methods, innermost last. `None` for a
    /// method left out of the index.
    methods: Vec<Option<SymbolSignature>>,
    /// Locals declared so far per (method signature, name).
    ordinals: HashMap<(String, String), usize>,
    occurrences: Vec<Occurrence>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Walker<'a> {
    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.chars.char_of(start), self.chars.char_of(end))
    }

    fn emit(&mut self, start: usize, end: usize, signature: SymbolSignature, kind: OccurrenceKind) {
        let span = self.span(start, end);
        self.occurrences.push(Occurrence::new(span, signature, kind));
    }

    fn emit_node(&mut self, node: Node<'_>, signature: SymbolSignature, kind: OccurrenceKind) {
        self.emit(node.start_byte(), node.end_byte(), signature, kind);
    }

    fn emit_method(&mut self, node: Node<'_>, owner: &str, method: &MethodDecl) {
        let fallbacks = lookup::overridden(self.index, owner, method);
        let span = self.span(node.start_byte(), node.end_byte());
        self.occurrences.push(
            Occurrence::new(span, method.signature(owner), OccurrenceKind::Method)
                .with_fallbacks(fallbacks),
        );
    }

    fn diagnose(&mut self, byte: usize, kind: DiagnosticKind, message: String) {
        let offset = self.chars.char_of(byte);
        self.diagnostics
            .push(Diagnostic::new(self.unit_id, offset, kind, message));
    }

    fn node_text(&self, node: Node<'_>) -> &'a str {
        text(node, self.source)
    }

    // ------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------

    fn push_scope(&mut self) {
        self.vars.push(VarFrame::Block(Vec::new()));
        self.env.push_block();
    }

    fn pop_scope(&mut self) {
        self.vars.pop();
        self.env.pop();
    }

    fn push_class(&mut self, binary: &str) {
        self.vars.push(VarFrame::Class(binary.to_string()));
        self.env.push_class(binary);
    }

    fn pop_class(&mut self) {
        self.vars.pop();
        self.env.pop();
    }

    /// Declare a local variable named by `name_node` and emit its occurrence.
    fn declare_local(&mut self, name_node: Node<'_>, ty: Ty) {
        let Some(method) = self.methods.last().cloned() else {
            return;
        };
        let name = self.node_text(name_node).to_string();
        let signature = method.map(|method| {
            let ordinal = self
                .ordinals
                .entry((method.0.clone(), name.clone()))
                .or_insert(0);
            let signature = SymbolSignature::of_local(&method, &name, *ordinal);
            *ordinal += 1;
            signature
        });
        if let Some(signature) = &signature {
            self.emit_node(name_node, signature.clone(), OccurrenceKind::Local);
        }
        self.bind(Local {
            name,
            signature,
            kind: OccurrenceKind::Local,
            ty,
        });
    }

    fn bind(&mut self, local: Local) {
        if let Some(VarFrame::Block(locals)) = self
            .vars
            .iter_mut()
            .rev()
            .find(|f| matches!(f, VarFrame::Block(_)))
        {
            locals.push(local);
        }
    }

    fn lookup_var(&self, name: &str) -> Option<VarRef> {
        for frame in self.vars.iter().rev() {
            match frame {
                VarFrame::Block(locals) => {
                    if let Some(local) = locals.iter().rev().find(|l| l.name == name) {
                        return Some(VarRef::Local(local.clone()));
                    }
                }
                VarFrame::Class(binary) => {
                    if let Some((owner, field)) = lookup::find_field(self.index, binary, name) {
                        let this = lookup::this_type(self.index, binary);
                        let ty = self.field_type(Some(&this), &owner, field);
                        return Some(VarRef::Field { owner, ty });
                    }
                }
            }
        }
        let imports = &self.env.header.imports;
        let single = imports
            .static_single
            .iter()
            .filter(|(_, member)| member == name)
            .map(|(owner, _)| owner);
        for owner in single.chain(imports.static_on_demand.iter()) {
            if let Some((owner, field)) = lookup::find_field(self.index, owner, name) {
                if field.is_static {
                    let ty = field.generic_type();
                    return Some(VarRef::Field { owner, ty });
                }
            }
        }
        None
    }

    /// Emit the occurrence for a variable reference and return its type.
    fn use_var(&mut self, node: Node<'_>, var: VarRef) -> Ty {
        let name = self.node_text(node);
        match var {
            VarRef::Local(local) => {
                if let Some(signature) = local.signature {
                    self.emit_node(node, signature, local.kind);
                }
                local.ty
            }
            VarRef::Field { owner, ty } => {
                self.emit_node(node, SymbolSignature::of_field(&owner, name), OccurrenceKind::Field);
                Ty::Value(ty)
            }
        }
    }

    /// Type of `field` (declared in `owner`) read through `receiver`, or
    /// statically when there is none.
    fn field_type(&self, receiver: Option<&JType>, owner: &str, field: &FieldDecl) -> JType {
        let ty = field.generic_type();
        match receiver {
            Some(receiver) if !field.is_static => {
                ty.subst(&lookup::member_bindings(self.index, receiver, owner))
            }
            _ => ty,
        }
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    /// Resolve a type node, emitting an occurrence per type name in it.
    fn type_node(&mut self, node: Node<'_>) -> Option<JType> {
        let mut uses = TypeUses::default();
        let ty = self.env.resolve_generic(node, self.source, &mut uses);
        self.flush_uses(uses);
        ty
    }

    fn flush_uses(&mut self, uses: TypeUses) {
        for r in uses.refs {
            self.emit(r.start, r.end, SymbolSignature::of_type(r.binary), OccurrenceKind::Type);
        }
        for (byte, name) in uses.unresolved {
            self.diagnose(byte, DiagnosticKind::Unresolved, format!("cannot resolve type {}", name));
        }
    }

    fn type_parameters(&mut self, owner: Node<'_>) -> Vec<TypeParam> {
        let Some(tp) = owner.child_by_field_name("type_parameters") else {
            return Vec::new();
        };
        let mut uses = TypeUses::default();
        let vars = self.env.type_parameters(tp, self.source, &mut uses);
        self.flush_uses(uses);
        for param in named_children(tp) {
            self.annotations_in(param);
        }
        vars
    }

    /// `var` in a local declaration, unless a type called `var` is in scope.
    fn is_var_keyword(&self, node: Node<'_>) -> bool {
        node.kind() == "type_identifier"
            && self.node_text(node) == "var"
            && self.env.resolve_simple("var").is_none()
    }

    fn superclass_of(&self, binary: &str) -> Option<String> {
        self.index.get(binary)?.superclass.clone()
    }

    /// The superclass of `binary` with the type arguments it is extended with.
    fn super_type(&self, binary: &str) -> Option<JType> {
        let decl = self.index.get(binary)?;
        let superclass = decl.superclass.as_deref()?;
        let generic = decl
            .generic_supertypes()
            .into_iter()
            .find(|t| t.class_name() == Some(superclass));
        Some(generic.unwrap_or_else(|| JType::object(superclass)))
    }

    /// A dotted name used as a type without a lexical scope (imports):
    /// the longest package prefix, then member types.
    fn qualified_type_path(&mut self, segments: &[Node<'_>]) -> Option<String> {
        let names: Vec<&str> = segments.iter().map(|s| self.node_text(*s)).collect();
        let (top, k) = (0..names.len()).rev().find_map(|k| {
            let package = names[..k].join(".");
            self.index
                .top_level(&package, names[k])
                .map(|b| (b.to_string(), k))
        })?;
        let mut refs = vec![(segments[0].start_byte(), segments[k].end_byte(), top.clone())];
        let mut owner = top;
        for (segment, name) in segments.iter().zip(&names).skip(k + 1) {
            owner = lookup::member_type(self.index, &owner, name)?;
            refs.push((segment.start_byte(), segment.end_byte(), owner.clone()));
        }
        for (start, end, binary) in refs {
            self.emit(start, end, SymbolSignature::of_type(binary), OccurrenceKind::Type);
        }
        Some(owner)
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn program(&mut self, root: Node<'_>) {
        for child in named_children(root) {
            match child.kind() {
                "import_declaration" => self.import(child),
                kind if is_type_declaration(kind) => self.type_declaration(child),
                _ => {}
            }
        }
    }

    fn import(&mut self, node: Node<'_>) {
        let mut path = None;
        let mut is_static = false;
        let mut on_demand = false;
        for child in crate::syntax::children(node) {
            match child.kind() {
                "static" => is_static = true,
                "asterisk" => on_demand = true,
                "scoped_identifier" | "identifier" => path = Some(child),
                _ => {}
            }
        }
        let Some(path) = path else {
            return;
        };
        let mut segments = Vec::new();
        flatten_identifiers(path, &mut segments);
        let written = self.node_text(path).to_string();

        if is_static && !on_demand {
            let Some((member, owner)) = segments.split_last() else {
                return;
            };
            let Some(owner) = self.qualified_type_path(owner) else {
                self.diagnose(path.start_byte(), DiagnosticKind::Unresolved, format!("cannot resolve import {}", written));
                return;
            };
            self.static_member(*member, &owner);
        } else if on_demand && !is_static && self.index.is_package(&dotted(&segments, self.source)) {
            // package import: nothing to bind
        } else if self.qualified_type_path(&segments).is_none() {
            self.diagnose(path.start_byte(), DiagnosticKind::Unresolved, format!("cannot resolve import {}", written));
        }
    }

    /// `import static T.member;`: a field, or every method of that name.
    fn static_member(&mut self, member: Node<'_>, owner: &str) {
        let name = self.node_text(member);
        if let Some((declaring, _)) = lookup::find_field(self.index, owner, name) {
            self.emit_node(member, SymbolSignature::of_field(&declaring, name), OccurrenceKind::Field);
            return;
        }
        let methods = lookup::find_methods(self.index, owner, name);
        let mut sigs = methods.iter().filter(|(_, m)| m.is_static).map(|(o, m)| m.signature(o));
        match sigs.next() {
            Some(primary) => {
                let rest: Vec<SymbolSignature> = sigs.collect();
                let span = self.span(member.start_byte(), member.end_byte());
                self.occurrences
                    .push(Occurrence::new(span, primary, OccurrenceKind::Method).with_fallbacks(rest));
            }
            None => self.diagnose(
                member.start_byte(),
                DiagnosticKind::Unresolved,
                format!("cannot resolve static member {} of {}", name, owner),
            ),
        }
    }

    fn type_declaration(&mut self, node: Node<'_>) {
        let Some(binary) = self.declared.types.get(&node.start_byte()).cloned() else {
            return;
        };
        self.annotations_in(node);
        let is_local = !node.parent().is_some_and(|p| {
            matches!(
                p.kind(),
                "program" | "class_body" | "interface_body" | "enum_body_declarations" | "annotation_type_body"
            )
        });
        if let Some(name) = node.child_by_field_name("name") {
            if is_local {
                let simple = self.node_text(name).to_string();
                self.env.add_local_type(&simple, &binary);
            }
            self.emit_node(name, SymbolSignature::of_type(binary.as_str()), OccurrenceKind::Type);
        }

        let vars = self.type_parameters(node);
        self.env.push_type_vars(vars);
        for child in named_children(node) {
            if matches!(child.kind(), "superclass" | "super_interfaces" | "extends_interfaces" | "permits") {
                let list = child_of_kind(child, "type_list").unwrap_or(child);
                for ty in named_children(list) {
                    if is_type_node(ty.kind()) {
                        self.type_node(ty);
                    }
                }
            }
        }

        self.push_class(&binary);
        if node.kind() == "record_declaration" {
            if let Some(params) = node.child_by_field_name("parameters") {
                self.record_components(params, &binary);
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.class_body(body, &binary);
        }
        self.pop_class();
        self.env.pop();
    }

    fn record_components(&mut self, params: Node<'_>, binary: &str) {
        for param in named_children(params) {
            self.annotations_in(param);
            let ty = param.child_by_field_name("type").and_then(|t| self.type_node(t));
            if let Some(name) = param.child_by_field_name("name") {
                let field = self.node_text(name);
                let mut fallbacks = Vec::new();
                if let Some(ty) = ty {
                    fallbacks.push(SymbolSignature::of_method(
                        binary,
                        field,
                        &srcremap_core::descriptor::MethodDescriptor::new(Vec::new(), Some(ty.erasure())),
                    ));
                }
                let span = self.span(name.start_byte(), name.end_byte());
                self.occurrences.push(
                    Occurrence::new(span, SymbolSignature::of_field(binary, field), OccurrenceKind::Field)
                        .with_fallbacks(fallbacks),
                );
            }
        }
    }

    fn initializer_signature(binary: &str, is_static: bool) -> SymbolSignature {
        let name = if is_static { "<clinit>" } else { "<instinit>" };
        SymbolSignature(format!("{}.{}()V", binary, name))
    }

    fn class_body(&mut self, body: Node<'_>, binary: &str) {
        let interface = self
            .index
            .get(binary)
            .is_some_and(|d| d.kind.is_interface());
        for member in named_children(body) {
            match member.kind() {
                "field_declaration" | "constant_declaration" => {
                    self.annotations_in(member);
                    let ty = member.child_by_field_name("type").and_then(|t| self.type_node(t));
                    let is_static = interface || has_modifier(member, "static");
                    self.methods.push(Some(Self::initializer_signature(binary, is_static)));
                    for declarator in field_children(member, "declarator") {
                        if let Some(name) = declarator.child_by_field_name("name") {
                            let field = self.node_text(name);
                            self.emit_node(name, SymbolSignature::of_field(binary, field), OccurrenceKind::Field);
                        }
                        if let Some(value) = declarator.child_by_field_name("value") {
                            let dims = dimension_count(declarator.child_by_field_name("dimensions"), self.source);
                            let expected = ty.clone().map(|t| t.with_dims(dims));
                            self.initializer(value, expected);
                        }
                    }
                    self.methods.pop();
                }
                "method_declaration"
                | "constructor_declaration"
                | "compact_constructor_declaration" => self.method(member),
                "static_initializer" | "block" => {
                    let is_static = member.kind() == "static_initializer";
                    self.methods.push(Some(Self::initializer_signature(binary, is_static)));
                    let block = if is_static {
                        child_of_kind(member, "block")
                    } else {
                        Some(member)
                    };
                    if let Some(block) = block {
                        self.stmt(block);
                    }
                    self.methods.pop();
                }
                "enum_constant" => self.enum_constant(member, binary),
                "enum_body_declarations" => self.class_body(member, binary),
                "annotation_type_element_declaration" => self.annotation_element(member, binary),
                kind if is_type_declaration(kind) => self.type_declaration(member),
                _ => {}
            }
        }
    }

    fn enum_constant(&mut self, node: Node<'_>, binary: &str) {
        self.annotations_in(node);
        if let Some(name) = node.child_by_field_name("name") {
            let field = self.node_text(name);
            self.emit_node(name, SymbolSignature::of_field(binary, field), OccurrenceKind::Field);
        }
        self.methods.push(Some(Self::initializer_signature(binary, true)));
        if let Some(args) = node.child_by_field_name("arguments") {
            self.arguments(args);
        }
        self.methods.pop();
        if let Some(body) = node.child_by_field_name("body") {
            self.anonymous_body(body);
        }
    }

    fn annotation_element(&mut self, node: Node<'_>, binary: &str) {
        self.annotations_in(node);
        let ty = node.child_by_field_name("type").and_then(|t| self.type_node(t));
        if let Some(name) = node.child_by_field_name("name") {
            let element = self.node_text(name).to_string();
            let method = self
                .index
                .get(binary)
                .and_then(|d| d.methods.iter().find(|m| m.name == element).cloned());
            match method {
                Some(method) => self.emit_method(name, binary, &method),
                None if ty.is_none() => {}
                None => self.diagnose(
                    name.start_byte(),
                    DiagnosticKind::Unresolved,
                    format!("cannot resolve element {}", element),
                ),
            }
        }
        if let Some(value) = node.child_by_field_name("value") {
            self.element_value(value);
        }
    }

    fn method(&mut self, node: Node<'_>) {
        let declared = self.declared.methods.get(&node.start_byte()).cloned();
        self.annotations_in(node);

        let vars = self.type_parameters(node);
        self.env.push_type_vars(vars);
        if let Some(ret) = node.child_by_field_name("type") {
            if ret.kind() != "void_type" {
                self.type_node(ret);
            }
        }
        if let Some(name) = node.child_by_field_name("name") {
            match &declared {
                Some((owner, decl)) if decl.is_constructor() => {
                    self.emit_node(name, SymbolSignature::of_type(owner.as_str()), OccurrenceKind::Type);
                }
                Some((owner, decl)) => self.emit_method(name, owner, decl),
                None => {
                    if node.kind() != "method_declaration" {
                        self.name_as_type(name);
                    }
                    let method = self.node_text(name);
                    let owner = self.env.current_class().unwrap_or_default().to_string();
                    self.diagnose(
                        name.start_byte(),
                        DiagnosticKind::Unresolved,
                        format!("cannot resolve signature of method {} in {}", method, owner),
                    );
                }
            }
        }
        if let Some(throws) = child_of_kind(node, "throws") {
            for ty in named_children(throws) {
                if is_type_node(ty.kind()) {
                    self.type_node(ty);
                }
            }
        }

        let signature = declared.as_ref().map(|(owner, decl)| decl.signature(owner));
        let decl = declared.map(|(_, decl)| decl);
        self.methods.push(signature.clone());
        self.push_scope();
        if let Some(params) = node.child_by_field_name("parameters") {
            self.parameters(params, signature.as_ref(), decl.as_ref());
        }
        if node.kind() == "compact_constructor_declaration" {
            self.implicit_components(node, signature.as_ref(), decl.as_ref());
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.stmt(body);
        }
        self.pop_scope();
        self.methods.pop();
        self.env.pop();
    }

    /// Bind the formal parameters. Without a declaration they are typed from
    /// the written types and emit nothing.
    fn parameters(&mut self, params: Node<'_>, method: Option<&SymbolSignature>, decl: Option<&MethodDecl>) {
        let declared = decl.map(MethodDecl::generic_params).unwrap_or_default();
        let mut index = 0;
        for param in named_children(params) {
            let (ty_node, name) = match param.kind() {
                "formal_parameter" => (
                    param.child_by_field_name("type"),
                    param.child_by_field_name("name"),
                ),
                "spread_parameter" => (
                    named_children(param).into_iter().find(|c| is_type_node(c.kind())),
                    child_of_kind(param, "variable_declarator")
                        .and_then(|d| d.child_by_field_name("name")),
                ),
                _ => continue,
            };
            self.annotations_in(param);
            let written = ty_node.and_then(|t| self.type_node(t)).map(|t| {
                if param.kind() == "spread_parameter" {
                    t.with_dims(1)
                } else {
                    t
                }
            });
            if let Some(name) = name {
                let signature = method.map(|m| SymbolSignature::of_parameter(m, index));
                if let Some(signature) = &signature {
                    self.emit_node(name, signature.clone(), OccurrenceKind::Parameter);
                }
                let ty = declared.get(index).cloned().or(written);
                self.bind(Local {
                    name: self.node_text(name).to_string(),
                    signature,
                    kind: OccurrenceKind::Parameter,
                    ty: ty.map(Ty::Value).unwrap_or(Ty::Unknown),
                });
            }
            index += 1;
        }
    }

    /// A compact constructor's parameters are the record components.
    fn implicit_components(&mut self, node: Node<'_>, method: Option<&SymbolSignature>, decl: Option<&MethodDecl>) {
        let Some(params) = node
            .parent()
            .and_then(|body| body.parent())
            .and_then(|record| record.child_by_field_name("parameters"))
        else {
            return;
        };
        let types = decl.map(MethodDecl::generic_params).unwrap_or_default();
        let names = named_children(params)
            .into_iter()
            .filter_map(|p| p.child_by_field_name("name"));
        for (index, name) in names.enumerate() {
            let ty = types.get(index).cloned().map(Ty::Value).unwrap_or(Ty::Unknown);
            self.bind(Local {
                name: self.node_text(name).to_string(),
                signature: method.map(|m| SymbolSignature::of_parameter(m, index)),
                kind: OccurrenceKind::Parameter,
                ty,
            });
        }
    }

    fn anonymous_body(&mut self, body: Node<'_>) -> Option<String> {
        let binary = self.declared.types.get(&body.start_byte()).cloned()?;
        self.push_class(&binary);
        self.class_body(body, &binary);
        self.pop_class();
        Some(binary)
    }

    // ------------------------------------------------------------------
    // Annotations
    // ------------------------------------------------------------------

    /// Annotations among the modifiers of a declaration.
    fn annotations_in(&mut self, node: Node<'_>) {
        for child in named_children(node) {
            match child.kind() {
                "modifiers" => {
                    for m in named_children(child) {
                        if m.kind().ends_with("annotation") {
                            self.annotation(m);
                        }
                    }
                }
                "annotation" | "marker_annotation" => self.annotation(child),
                _ => {}
            }
        }
    }

    fn annotation(&mut self, node: Node<'_>) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let binary = match self.name_as_type(name) {
            Some(binary) => binary,
            None => {
                let written = self.node_text(name).to_string();
                self.diagnose(name.start_byte(), DiagnosticKind::Unresolved, format!("cannot resolve annotation {}", written));
                if let Some(args) = node.child_by_field_name("arguments") {
                    for arg in named_children(args) {
                        let value = arg.child_by_field_name("value").unwrap_or(arg);
                        self.element_value(value);
                    }
                }
                return;
            }
        };
        let Some(args) = node.child_by_field_name("arguments") else {
            return;
        };
        for arg in named_children(args) {
            if arg.kind() == "element_value_pair" {
                if let Some(key) = arg.child_by_field_name("key") {
                    let element = self.node_text(key);
                    let found = lookup::find_methods(self.index, &binary, element)
                        .into_iter()
                        .find(|(_, m)| m.desc.params.is_empty())
                        .map(|(owner, m)| (owner, m.clone()));
                    match found {
                        Some((owner, method)) => self.emit_method(key, &owner, &method),
                        None => self.diagnose(key.start_byte(), DiagnosticKind::Unresolved, format!("cannot resolve element {} of {}", element, binary)),
                    }
                }
                if let Some(value) = arg.child_by_field_name("value") {
                    self.element_value(value);
                }
            } else {
                self.element_value(arg);
            }
        }
    }

    fn element_value(&mut self, node: Node<'_>) {
        match node.kind() {
            "annotation" | "marker_annotation" => self.annotation(node),
            "element_value_array_initializer" => {
                for child in named_children(node) {
                    self.element_value(child);
                }
            }
            _ => {
                self.expr(node);
            }
        }
    }

    /// An `identifier` / `scoped_identifier` naming a type (annotation names).
    fn name_as_type(&mut self, node: Node<'_>) -> Option<String> {
        match node.kind() {
            "identifier" => match self.env.resolve_simple(self.node_text(node)) {
                Some(TypeBinding::Type(binary)) => {
                    self.emit_node(node, SymbolSignature::of_type(binary.as_str()), OccurrenceKind::Type);
                    Some(binary)
                }
                _ => None,
            },
            _ => {
                let mut segments = Vec::new();
                flatten_identifiers(node, &mut segments);
                let first = *segments.first()?;
                match self.env.resolve_simple(self.node_text(first)) {
                    Some(TypeBinding::Type(mut owner)) => {
                        let mut refs = vec![(first, owner.clone())];
                        for segment in &segments[1..] {
                            owner = lookup::member_type(self.index, &owner, self.node_text(*segment))?;
                            refs.push((*segment, owner.clone()));
                        }
                        for (node, binary) in refs {
                            self.emit_node(node, SymbolSignature::of_type(binary), OccurrenceKind::Type);
                        }
                        Some(owner)
                    }
                    _ => self.qualified_type_path(&segments),
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn stmt(&mut self, node: Node<'_>) {
        match node.kind() {
            "block" | "constructor_body" => {
                self.push_scope();
                for child in named_children(node) {
                    self.stmt(child);
                }
                self.pop_scope();
            }
            "local_variable_declaration" => self.local_declaration(node),
            kind if is_type_declaration(kind) => self.type_declaration(node),
            "expression_statement" | "parenthesized_expression" => {
                for child in named_children(node) {
                    self.expr(child);
                }
            }
            "if_statement" => {
                if let Some(c) = node.child_by_field_name("condition") {
                    self.expr(c);
                }
                for field in ["consequence", "alternative"] {
                    if let Some(s) = node.child_by_field_name(field) {
                        self.stmt(s);
                    }
                }
            }
            "for_statement" => {
                self.push_scope();
                for init in field_children(node, "init") {
                    self.stmt(init);
                }
                if let Some(c) = node.child_by_field_name("condition") {
                    self.expr(c);
                }
                for update in field_children(node, "update") {
                    self.expr(update);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.stmt(body);
                }
                self.pop_scope();
            }
            "enhanced_for_statement" => self.enhanced_for(node),
            "catch_clause" => self.catch_clause(node),
            "try_with_resources_statement" => {
                self.push_scope();
                for child in named_children(node) {
                    if child.kind() == "resource_specification" {
                        for resource in named_children(child) {
                            self.resource(resource);
                        }
                    } else {
                        self.stmt(child);
                    }
                }
                self.pop_scope();
            }
            "labeled_statement" => {
                for child in named_children(node) {
                    if child.kind() != "identifier" {
                        self.stmt(child);
                    }
                }
            }
            "break_statement" | "continue_statement" | "empty_statement" => {}
            "explicit_constructor_invocation" => {
                if let Some(object) = node.child_by_field_name("object") {
                    self.expr(object);
                }
                if let Some(args) = node.child_by_field_name("arguments") {
                    self.arguments(args);
                }
            }
            "try_statement" | "finally_clause" | "while_statement" | "do_statement"
            | "return_statement" | "throw_statement" | "yield_statement"
            | "synchronized_statement" | "assert_statement" => {
                for child in named_children(node) {
                    if is_statement_like(child.kind()) {
                        self.stmt(child);
                    } else {
                        self.expr(child);
                    }
                }
            }
            _ => {
                self.expr(node);
            }
        }
    }

    fn local_declaration(&mut self, node: Node<'_>) {
        self.annotations_in(node);
        let ty_node = node.child_by_field_name("type");
        let inferred = ty_node.is_some_and(|t| self.is_var_keyword(t));
        let declared = match ty_node {
            Some(t) if !inferred => self.type_node(t),
            _ => None,
        };
        for declarator in field_children(node, "declarator") {
            let dims = dimension_count(declarator.child_by_field_name("dimensions"), self.source);
            let expected = declared.clone().map(|t| t.with_dims(dims));
            let value_ty = declarator
                .child_by_field_name("value")
                .map(|v| self.initializer(v, expected.clone()));
            let ty = match (expected, value_ty) {
                (Some(t), _) => Ty::Value(t),
                (None, Some(v)) if inferred => v,
                _ => Ty::Unknown,
            };
            if let Some(name) = declarator.child_by_field_name("name") {
                self.declare_local(name, ty);
            }
        }
    }

    /// A variable initializer; array initializers take the declared type.
    fn initializer(&mut self, value: Node<'_>, expected: Option<JType>) -> Ty {
        if value.kind() == "lambda_expression" {
            let params = expected
                .as_ref()
                .and_then(|t| lookup::function_type(self.index, t))
                .map(|(params, _)| params)
                .unwrap_or_default();
            self.lambda(value, &params);
            return expected.map(Ty::Value).unwrap_or(Ty::Unknown);
        }
        if value.kind() == "array_initializer" {
            for element in named_children(value) {
                let inner = match &expected {
                    Some(JType::Array(inner)) => Some((**inner).clone()),
                    _ => None,
                };
                self.initializer(element, inner);
            }
            return expected.map(Ty::Value).unwrap_or(Ty::Unknown);
        }
        self.expr(value)
    }

    fn enhanced_for(&mut self, node: Node<'_>) {
        self.push_scope();
        let iterable = node.child_by_field_name("value").map(|v| self.expr(v));
        self.annotations_in(node);
        let ty_node = node.child_by_field_name("type");
        let ty = match ty_node {
            Some(t) if self.is_var_keyword(t) => iterable
                .as_ref()
                .and_then(Ty::value)
                .and_then(|t| self.element_type(t))
                .map(Ty::Value)
                .unwrap_or(Ty::Unknown),
            Some(t) => self.type_node(t).map(Ty::Value).unwrap_or(Ty::Unknown),
            None => Ty::Unknown,
        };
        if let Some(name) = node.child_by_field_name("name") {
            self.declare_local(name, ty);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.stmt(body);
        }
        self.pop_scope();
    }

    /// Element type of an enhanced `for` over `iterable`.
    fn element_type(&self, iterable: &JType) -> Option<JType> {
        if let JType::Array(inner) = iterable {
            return Some((**inner).clone());
        }
        let args = lookup::as_super(self.index, iterable, "java.lang.Iterable")?;
        let element = args.first().and_then(|a| a.bound()).cloned();
        Some(element.unwrap_or_else(|| JType::object(OBJECT)))
    }

    fn catch_clause(&mut self, node: Node<'_>) {
        self.push_scope();
        if let Some(param) = child_of_kind(node, "catch_formal_parameter") {
            self.annotations_in(param);
            let mut first = None;
            if let Some(types) = child_of_kind(param, "catch_type") {
                for ty in named_children(types) {
                    let resolved = self.type_node(ty);
                    if first.is_none() {
                        first = resolved;
                    }
                }
            }
            if let Some(name) = param.child_by_field_name("name") {
                self.declare_local(name, first.map(Ty::Value).unwrap_or(Ty::Unknown));
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.stmt(body);
        }
        self.pop_scope();
    }

    fn resource(&mut self, node: Node<'_>) {
        if node.kind() != "resource" {
            self.expr(node);
            return;
        }
        let Some(name) = node.child_by_field_name("name") else {
            for child in named_children(node) {
                self.expr(child);
            }
            return;
        };
        self.annotations_in(node);
        let ty_node = node.child_by_field_name("type");
        let inferred = ty_node.is_some_and(|t| self.is_var_keyword(t));
        let declared = match ty_node {
            Some(t) if !inferred => self.type_node(t),
            _ => None,
        };
        let value = node.child_by_field_name("value").map(|v| self.expr(v));
        let ty = match (declared, value) {
            (Some(t), _) => Ty::Value(t),
            (None, Some(v)) => v,
            _ => Ty::Unknown,
        };
        self.declare_local(name, ty);
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr(&mut self, node: Node<'_>) -> Ty {
        match node.kind() {
            "identifier" => {
                let name = self.node_text(node);
                match self.lookup_var(name) {
                    Some(var) => self.use_var(node, var),
                    None => {
                        self.diagnose(node.start_byte(), DiagnosticKind::Unresolved, format!("cannot resolve name {}", name));
                        Ty::Unknown
                    }
                }
            }
            "this" => self
                .env
                .current_class()
                .map(|c| Ty::Value(lookup::this_type(self.index, c)))
                .unwrap_or(Ty::Unknown),
            "super" => self
                .env
                .current_class()
                .and_then(|c| self.super_type(c))
                .map(Ty::Value)
                .unwrap_or(Ty::Unknown),
            "field_access" => match self.resolve_name(node) {
                Res::Value(ty) => ty,
                _ => Ty::Unknown,
            },
            "method_invocation" => self.method_invocation(node),
            "object_creation_expression" => self.object_creation(node),
            "decimal_integer_literal" | "hex_integer_literal" | "octal_integer_literal"
            | "binary_integer_literal" => {
                if self.node_text(node).ends_with(['l', 'L']) {
                    Ty::erased(FieldType::Long)
                } else {
                    Ty::erased(FieldType::Int)
                }
            }
            "decimal_floating_point_literal" | "hex_floating_point_literal" => {
                if self.node_text(node).ends_with(['f', 'F']) {
                    Ty::erased(FieldType::Float)
                } else {
                    Ty::erased(FieldType::Double)
                }
            }
            "true" | "false" => Ty::erased(FieldType::Boolean),
            "character_literal" => Ty::erased(FieldType::Char),
            "string_literal" | "text_block" => Ty::erased(FieldType::string()),
            "null_literal" => Ty::Null,
            "parenthesized_expression" => named_children(node)
                .into_iter()
                .map(|c| self.expr(c))
                .last()
                .unwrap_or(Ty::Unknown),
            "binary_expression" => self.binary(node),
            "unary_expression" => {
                let operand = node
                    .child_by_field_name("operand")
                    .map(|o| self.expr(o))
                    .unwrap_or(Ty::Unknown);
                let operator = node
                    .child_by_field_name("operator")
                    .map(|o| self.node_text(o))
                    .unwrap_or("");
                if operator == "!" {
                    Ty::erased(FieldType::Boolean)
                } else {
                    promote(&operand, &Ty::erased(FieldType::Int))
                }
            }
            "update_expression" => named_children(node)
                .into_iter()
                .map(|c| self.expr(c))
                .last()
                .unwrap_or(Ty::Unknown),
            "assignment_expression" => {
                let left = node
                    .child_by_field_name("left")
                    .map(|l| self.expr(l))
                    .unwrap_or(Ty::Unknown);
                if let Some(right) = node.child_by_field_name("right") {
                    self.expr(right);
                }
                left
            }
            "cast_expression" => {
                let mut ty = None;
                for t in field_children(node, "type") {
                    let resolved = self.type_node(t);
                    if ty.is_none() {
                        ty = resolved;
                    }
                }
                if let Some(value) = node.child_by_field_name("value") {
                    self.expr(value);
                }
                ty.map(Ty::Value).unwrap_or(Ty::Unknown)
            }
            "instanceof_expression" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.expr(left);
                }
                let ty = node.child_by_field_name("right").and_then(|r| self.type_node(r));
                if let Some(name) = node.child_by_field_name("name") {
                    self.declare_local(name, ty.map(Ty::Value).unwrap_or(Ty::Unknown));
                }
                if let Some(pattern) = node.child_by_field_name("pattern") {
                    self.pattern(pattern);
                }
                Ty::erased(FieldType::Boolean)
            }
            "ternary_expression" => {
                if let Some(c) = node.child_by_field_name("condition") {
                    self.expr(c);
                }
                let a = node
                    .child_by_field_name("consequence")
                    .map(|n| self.expr(n))
                    .unwrap_or(Ty::Unknown);
                let b = node
                    .child_by_field_name("alternative")
                    .map(|n| self.expr(n))
                    .unwrap_or(Ty::Unknown);
                conditional(a, b)
            }
            "array_access" => {
                let array = node
                    .child_by_field_name("array")
                    .map(|a| self.expr(a))
                    .unwrap_or(Ty::Unknown);
                if let Some(i) = node.child_by_field_name("index") {
                    self.expr(i);
                }
                match array {
                    Ty::Value(JType::Array(inner)) => Ty::Value(*inner),
                    _ => Ty::Unknown,
                }
            }
            "array_creation_expression" => {
                let element = node.child_by_field_name("type").and_then(|t| self.type_node(t));
                let mut dims = 0;
                for d in field_children(node, "dimensions") {
                    if d.kind() == "dimensions_expr" {
                        dims += 1;
                        for e in named_children(d) {
                            self.expr(e);
                        }
                    } else {
                        dims += dimension_count(Some(d), self.source);
                    }
                }
                let ty = element.map(|e| e.with_dims(dims.max(1)));
                if let Some(value) = node.child_by_field_name("value") {
                    self.initializer(value, ty.clone());
                }
                ty.map(Ty::Value).unwrap_or(Ty::Unknown)
            }
            "array_initializer" => self.initializer(node, None),
            "class_literal" => {
                if let Some(t) = named_children(node).into_iter().find(|c| is_type_node(c.kind())) {
                    self.type_node(t);
                }
                Ty::object("java.lang.Class")
            }
            "lambda_expression" => {
                self.lambda(node, &[]);
                Ty::Unknown
            }
            "method_reference" => {
                self.method_reference(node);
                Ty::Unknown
            }
            "switch_expression" => {
                self.switch(node);
                Ty::Unknown
            }
            kind if is_type_node(kind) => {
                self.type_node(node);
                Ty::Unknown
            }
            _ => {
                for child in named_children(node) {
                    self.stmt(child);
                }
                Ty::Unknown
            }
        }
    }

    fn binary(&mut self, node: Node<'_>) -> Ty {
        let left = node
            .child_by_field_name("left")
            .map(|l| self.expr(l))
            .unwrap_or(Ty::Unknown);
        let right = node
            .child_by_field_name("right")
            .map(|r| self.expr(r))
            .unwrap_or(Ty::Unknown);
        let operator = node
            .child_by_field_name("operator")
            .map(|o| self.node_text(o))
            .unwrap_or("");
        let string = Ty::erased(FieldType::string());
        match operator {
            "==" | "!=" | "<" | ">" | "<=" | ">=" | "&&" | "||" => Ty::erased(FieldType::Boolean),
            "+" if left == string || right == string => string,
            "<<" | ">>" | ">>>" => promote(&left, &Ty::erased(FieldType::Int)),
            "&" | "|" | "^"
                if unbox(&left) == Some(FieldType::Boolean)
                    && unbox(&right) == Some(FieldType::Boolean) =>
            {
                Ty::erased(FieldType::Boolean)
            }
            _ => promote(&left, &right),
        }
    }

    fn arguments(&mut self, args: Node<'_>) -> Vec<Ty> {
        named_children(args)
            .into_iter()
            .map(|a| self.expr(a))
            .collect()
    }

    /// Classify a name used as the qualifier of a member access.
    fn resolve_name(&mut self, node: Node<'_>) -> Res {
        match node.kind() {
            "identifier" => {
                let name = self.node_text(node);
                if let Some(var) = self.lookup_var(name) {
                    return Res::Value(self.use_var(node, var));
                }
                if let Some(TypeBinding::Type(binary)) = self.env.resolve_simple(name) {
                    self.emit_node(node, SymbolSignature::of_type(binary.as_str()), OccurrenceKind::Type);
                    return Res::Type(binary);
                }
                if self.index.is_package(name) {
                    return Res::Package(name.to_string(), node.start_byte());
                }
                self.diagnose(node.start_byte(), DiagnosticKind::Unresolved, format!("cannot resolve name {}", name));
                Res::Unknown
            }
            "field_access" => self.field_access(node),
            _ => Res::Value(self.expr(node)),
        }
    }

    fn field_access(&mut self, node: Node<'_>) -> Res {
        let (Some(object), Some(field)) = (
            node.child_by_field_name("object"),
            node.child_by_field_name("field"),
        ) else {
            return Res::Unknown;
        };
        // Outer.this / Outer.super
        if matches!(field.kind(), "this" | "super") {
            let Res::Type(outer) = self.resolve_name(object) else {
                return Res::Unknown;
            };
            let ty = if field.kind() == "this" {
                Some(lookup::this_type(self.index, &outer))
            } else {
                self.super_type(&outer)
            };
            return ty.map(|t| Res::Value(Ty::Value(t))).unwrap_or(Res::Unknown);
        }

        let qualifier = match object.kind() {
            "identifier" | "field_access" => self.resolve_name(object),
            _ => Res::Value(self.expr(object)),
        };
        let name = self.node_text(field);
        match qualifier {
            Res::Value(ty) => {
                if matches!(ty, Ty::Value(JType::Array(_))) && name == "length" {
                    return Res::Value(Ty::erased(FieldType::Int));
                }
                let Some(receiver) = ty.value() else {
                    return Res::Unknown;
                };
                let Some(class) = receiver.class_name() else {
                    return Res::Unknown;
                };
                match lookup::find_field(self.index, class, name) {
                    Some((owner, decl)) => {
                        let ty = self.field_type(Some(receiver), &owner, decl);
                        self.emit_node(field, SymbolSignature::of_field(&owner, name), OccurrenceKind::Field);
                        Res::Value(Ty::Value(ty))
                    }
                    None => {
                        let class = class.to_string();
                        self.diagnose(field.start_byte(), DiagnosticKind::Unresolved, format!("cannot resolve field {} of {}", name, class));
                        Res::Unknown
                    }
                }
            }
            Res::Type(owner) => {
                if let Some((declaring, decl)) = lookup::find_field(self.index, &owner, name) {
                    let ty = self.field_type(None, &declaring, decl);
                    self.emit_node(field, SymbolSignature::of_field(&declaring, name), OccurrenceKind::Field);
                    return Res::Value(Ty::Value(ty));
                }
                if let Some(member) = lookup::member_type(self.index, &owner, name) {
                    self.emit_node(field, SymbolSignature::of_type(member.as_str()), OccurrenceKind::Type);
                    return Res::Type(member);
                }
                self.diagnose(field.start_byte(), DiagnosticKind::Unresolved, format!("cannot resolve {} in {}", name, owner));
                Res::Unknown
            }
            Res::Package(package, start) => {
                if let Some(binary) = self.index.top_level(&package, name).map(str::to_string) {
                    self.emit(start, field.end_byte(), SymbolSignature::of_type(binary.as_str()), OccurrenceKind::Type);
                    return Res::Type(binary);
                }
                let nested = format!("{}.{}", package, name);
                if self.index.is_package(&nested) {
                    return Res::Package(nested, start);
                }
                self.diagnose(start, DiagnosticKind::Unresolved, format!("cannot resolve name {}", nested));
                Res::Unknown
            }
            Res::Unknown => Res::Unknown,
        }
    }

    fn method_invocation(&mut self, node: Node<'_>) -> Ty {
        let Some(name) = node.child_by_field_name("name") else {
            return Ty::Unknown;
        };
        let method = self.node_text(name);
        let object = node.child_by_field_name("object");

        // Candidates come from the qualifier, evaluated before the arguments,
        // along with the type members are read through.
        let target: Option<(Vec<String>, Option<JType>)> = match object {
            None => {
                let enclosing: Vec<String> = self.env.enclosing_classes().map(str::to_string).collect();
                let found = enclosing
                    .into_iter()
                    .find(|c| !lookup::find_methods(self.index, c, method).is_empty());
                match found {
                    Some(class) => {
                        let this = lookup::this_type(self.index, &class);
                        Some((vec![class], Some(this)))
                    }
                    None => Some((self.static_import_owners(method), None)),
                }
            }
            Some(object) if object.kind() == "super" => self
                .env
                .current_class()
                .and_then(|c| self.super_type(c))
                .and_then(|t| Some((vec![t.class_name()?.to_string()], Some(t)))),
            Some(object) => {
                let qualifier = match object.kind() {
                    "identifier" | "field_access" => self.resolve_name(object),
                    _ => Res::Value(self.expr(object)),
                };
                match qualifier {
                    Res::Value(ty) => ty
                        .value()
                        .and_then(|t| Some((vec![t.class_name()?.to_string()], Some(t.clone())))),
                    Res::Type(owner) => Some((vec![owner], None)),
                    Res::Package(package, _) => {
                        self.diagnose(object.start_byte(), DiagnosticKind::Unresolved, format!("cannot resolve name {}", package));
                        None
                    }
                    Res::Unknown => None,
                }
            }
        };
        let explicit: Vec<JType> = match node.child_by_field_name("type_arguments") {
            Some(type_args) => {
                let mut uses = TypeUses::default();
                let args = self.env.type_arguments(type_args, self.source, &mut uses);
                self.flush_uses(uses);
                args.iter()
                    .map(|a| a.bound().cloned().unwrap_or_else(|| JType::object(OBJECT)))
                    .collect()
            }
            None => Vec::new(),
        };

        // Lambdas are typed by the method they are passed to, so they are
        // walked once it is chosen and match any parameter until then.
        let arg_nodes = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default();
        let mut lambdas = Vec::new();
        let mut args = Vec::with_capacity(arg_nodes.len());
        for (i, arg) in arg_nodes.iter().enumerate() {
            if arg.kind() == "lambda_expression" {
                lambdas.push((i, *arg));
                args.push(Ty::Unknown);
            } else {
                args.push(self.expr(*arg));
            }
        }

        let Some((owners, receiver)) = target else {
            self.untyped_lambdas(&lambdas);
            return Ty::Unknown;
        };
        let candidates: Vec<(String, MethodDecl)> = owners
            .iter()
            .flat_map(|owner| lookup::find_methods(self.index, owner, method))
            .map(|(owner, m)| (owner, m.clone()))
            .collect();
        let refs: Vec<(String, &MethodDecl)> = candidates.iter().map(|(o, m)| (o.clone(), m)).collect();
        match lookup::select_overload(self.index, &refs, &args) {
            Selection::Found(i) => {
                let (owner, decl) = &candidates[i];
                self.emit_method(name, owner, decl);
                let mut subst = self.call_bindings(receiver.as_ref(), owner, decl, &explicit, &args);
                let params = decl.generic_params();
                for (i, lambda) in lambdas {
                    let param = param_for(&params, i, decl.is_varargs, false).map(|p| p.subst(&subst));
                    let function = param.as_ref().and_then(|p| lookup::function_type(self.index, p));
                    let (inputs, output) = function.unwrap_or_default();
                    let body = self.lambda(lambda, &inputs);
                    // an expression body can settle the variables in the result
                    if let (Some(output), Ty::Value(body)) = (output, body) {
                        let mut inferred = Bindings::new();
                        lookup::infer(self.index, &output, &body, decl.type_params(), &mut inferred);
                        for (var, ty) in inferred {
                            subst.entry(var).or_insert(ty);
                        }
                    }
                }
                decl.generic_ret()
                    .map(|r| Ty::Value(r.subst(&subst)))
                    .unwrap_or(Ty::Unknown)
            }
            Selection::Ambiguous(all) => {
                self.untyped_lambdas(&lambdas);
                self.diagnose(
                    name.start_byte(),
                    DiagnosticKind::Ambiguous,
                    format!("ambiguous call to {} ({} candidates)", method, all.len()),
                );
                Ty::Unknown
            }
            Selection::NoMatch => {
                self.untyped_lambdas(&lambdas);
                let owner = owners.first().cloned().unwrap_or_default();
                self.diagnose(
                    name.start_byte(),
                    DiagnosticKind::Unresolved,
                    format!("cannot resolve method {} in {}", method, owner),
                );
                Ty::Unknown
            }
        }
    }

    fn untyped_lambdas(&mut self, lambdas: &[(usize, Node<'_>)]) {
        for (_, lambda) in lambdas {
            self.lambda(*lambda, &[]);
        }
    }

    /// Type variables of a call to `decl` (a member of `owner`): the
    /// receiver's arguments for the class's variables, then the method's own
    /// from explicit type arguments or from the argument types.
    fn call_bindings(
        &self,
        receiver: Option<&JType>,
        owner: &str,
        decl: &MethodDecl,
        explicit: &[JType],
        args: &[Ty],
    ) -> Bindings {
        let vars = decl.type_params();
        let mut subst = match receiver {
            Some(receiver) if !decl.is_static => lookup::member_bindings(self.index, receiver, owner),
            _ => Bindings::new(),
        };
        for var in vars {
            subst.remove(&var.name);
        }
        if vars.is_empty() {
            return subst;
        }
        if explicit.len() == vars.len() {
            subst.extend(vars.iter().map(|v| v.name.clone()).zip(explicit.iter().cloned()));
            return subst;
        }
        let params = decl.generic_params();
        let mut own = Bindings::new();
        for (i, arg) in args.iter().enumerate() {
            let Some(arg) = arg.value() else {
                continue;
            };
            let is_array = matches!(arg, JType::Array(_));
            if let Some(param) = param_for(&params, i, decl.is_varargs, is_array) {
                lookup::infer(self.index, &param.subst(&subst), arg, vars, &mut own);
            }
        }
        subst.extend(own);
        subst
    }

    fn static_import_owners(&self, method: &str) -> Vec<String> {
        let imports = &self.env.header.imports;
        let mut owners: Vec<String> = imports
            .static_single
            .iter()
            .filter(|(_, member)| member == method)
            .map(|(owner, _)| owner.clone())
            .collect();
        owners.extend(imports.static_on_demand.iter().cloned());
        owners.retain(|owner| {
            lookup::find_methods(self.index, owner, method)
                .iter()
                .any(|(_, m)| m.is_static)
        });
        owners.dedup();
        owners
    }

    fn object_creation(&mut self, node: Node<'_>) -> Ty {
        let type_node = node.child_by_field_name("type");
        let body = child_of_kind(node, "class_body");
        let mut qualifier = None;
        for child in named_children(node) {
            if Some(child) == type_node {
                break;
            }
            if child.kind() != "type_arguments" {
                qualifier = Some(self.expr(child));
            }
        }

        let created = match (type_node, qualifier) {
            (Some(t), Some(q)) if t.kind() == "type_identifier" => {
                let inner = q
                    .class_name()
                    .and_then(|c| lookup::member_type(self.index, c, self.node_text(t)));
                match inner {
                    Some(binary) => {
                        self.emit_node(t, SymbolSignature::of_type(binary.as_str()), OccurrenceKind::Type);
                        Some(JType::object(binary))
                    }
                    None => self.type_node(t),
                }
            }
            (Some(t), _) => self.type_node(t),
            (None, _) => None,
        };
        if let Some(args) = node.child_by_field_name("arguments") {
            self.arguments(args);
        }
        if let Some(body) = body {
            if let Some(anonymous) = self.anonymous_body(body) {
                return Ty::object(anonymous);
            }
        }
        created.map(Ty::Value).unwrap_or(Ty::Unknown)
    }

    /// Walk a lambda whose parameters have types `params` (empty when the
    /// target type is unknown). Returns the type of an expression body.
    fn lambda(&mut self, node: Node<'_>, params: &[JType]) -> Ty {
        let param = |i: usize| params.get(i).cloned().map(Ty::Value).unwrap_or(Ty::Unknown);
        self.push_scope();
        if let Some(list) = node.child_by_field_name("parameters") {
            match list.kind() {
                "identifier" => self.declare_local(list, param(0)),
                "inferred_parameters" => {
                    let names = named_children(list).into_iter().filter(|p| p.kind() == "identifier");
                    for (i, p) in names.enumerate() {
                        self.declare_local(p, param(i));
                    }
                }
                _ => {
                    let formals = named_children(list).into_iter().filter(|p| p.kind() == "formal_parameter");
                    for (i, p) in formals.enumerate() {
                        self.annotations_in(p);
                        let ty = match p.child_by_field_name("type") {
                            Some(t) if self.is_var_keyword(t) => param(i),
                            Some(t) => self.type_node(t).map(Ty::Value).unwrap_or(Ty::Unknown),
                            None => param(i),
                        };
                        if let Some(name) = p.child_by_field_name("name") {
                            self.declare_local(name, ty);
                        }
                    }
                }
            }
        }
        let mut result = Ty::Unknown;
        if let Some(body) = node.child_by_field_name("body") {
            if body.kind() == "block" {
                self.stmt(body);
            } else {
                result = self.expr(body);
            }
        }
        self.pop_scope();
        result
    }

    fn method_reference(&mut self, node: Node<'_>) {
        let parts = named_children(node);
        let Some((target, rest)) = parts.split_first() else {
            return;
        };
        let owner = match target.kind() {
            "identifier" | "field_access" => match self.resolve_name(*target) {
                Res::Value(ty) => ty.class_name().map(str::to_string),
                Res::Type(binary) => Some(binary),
                _ => None,
            },
            "super" => self
                .env
                .current_class()
                .and_then(|c| self.superclass_of(c)),
            kind if is_type_node(kind) => match self.type_node(*target) {
                Some(JType::Class { binary, .. }) => Some(binary),
                _ => None,
            },
            _ => self.expr(*target).class_name().map(str::to_string),
        };
        let Some(name) = rest.iter().rev().find(|c| c.kind() == "identifier").copied() else {
            return;
        };
        let Some(owner) = owner else {
            return;
        };
        let method = self.node_text(name);
        let found: Vec<(String, MethodDecl)> = lookup::find_methods(self.index, &owner, method)
            .into_iter()
            .map(|(o, m)| (o, m.clone()))
            .collect();
        match found.as_slice() {
            [(declaring, decl)] => self.emit_method(name, declaring, decl),
            [] => self.diagnose(name.start_byte(), DiagnosticKind::Unresolved, format!("cannot resolve method {} in {}", method, owner)),
            many => self.diagnose(
                name.start_byte(),
                DiagnosticKind::Ambiguous,
                format!("ambiguous method reference {} ({} candidates)", method, many.len()),
            ),
        }
    }

    fn switch(&mut self, node: Node<'_>) {
        let selector = node
            .child_by_field_name("condition")
            .map(|c| self.expr(c))
            .unwrap_or(Ty::Unknown);
        let enum_type = selector
            .class_name()
            .filter(|c| {
                self.index
                    .get(c)
                    .is_some_and(|d| d.kind == crate::model::TypeKind::Enum)
            })
            .map(str::to_string);
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        for group in named_children(body) {
            self.push_scope();
            for child in named_children(group) {
                if child.kind() == "switch_label" {
                    self.switch_label(child, enum_type.as_deref());
                } else if is_statement_like(child.kind()) {
                    self.stmt(child);
                } else {
                    self.expr(child);
                }
            }
            self.pop_scope();
        }
    }

    fn switch_label(&mut self, label: Node<'_>, enum_type: Option<&str>) {
        for child in named_children(label) {
            match child.kind() {
                "identifier" if enum_type.is_some() => {
                    let name = self.node_text(child);
                    let owner = enum_type.unwrap_or_default();
                    match lookup::find_field(self.index, owner, name) {
                        Some((declaring, _)) => self.emit_node(child, SymbolSignature::of_field(&declaring, name), OccurrenceKind::Field),
                        None => {
                            self.expr(child);
                        }
                    }
                }
                "pattern" | "type_pattern" | "record_pattern" => self.pattern(child),
                "guard" => {
                    for e in named_children(child) {
                        self.expr(e);
                    }
                }
                _ => {
                    self.expr(child);
                }
            }
        }
    }

    fn pattern(&mut self, node: Node<'_>) {
        match node.kind() {
            "pattern" => {
                for child in named_children(node) {
                    self.pattern(child);
                }
            }
            "record_pattern_component" if child_of_kind(node, "record_pattern").is_some() => {
                for child in named_children(node) {
                    self.pattern(child);
                }
            }
            "type_pattern" | "record_pattern_component" => {
                let parts = named_children(node);
                let ty = parts
                    .iter()
                    .find(|c| is_type_node(c.kind()))
                    .and_then(|t| self.type_node(*t));
                if let Some(name) = parts.iter().rev().find(|c| c.kind() == "identifier") {
                    self.declare_local(*name, ty.map(Ty::Value).unwrap_or(Ty::Unknown));
                }
            }
            "record_pattern" => {
                for child in named_children(node) {
                    if child.kind() == "identifier" {
                        if self.name_as_type(child).is_none() {
                            let written = self.node_text(child).to_string();
                            self.diagnose(child.start_byte(), DiagnosticKind::Unresolved, format!("cannot resolve type {}", written));
                        }
                    } else if is_type_node(child.kind()) {
                        self.type_node(child);
                    } else {
                        self.pattern(child);
                    }
                }
            }
            "record_pattern_body" => {
                for child in named_children(node) {
                    self.pattern(child);
                }
            }
            kind if is_type_node(kind) => {
                self.type_node(node);
            }
            _ => {}
        }
    }
}

fn is_statement_like(kind: &str) -> bool {
    kind.ends_with("_statement")
        || matches!(
            kind,
            "block" | "local_variable_declaration" | "catch_clause" | "finally_clause"
        )
        || is_type_declaration(kind)
}

fn dotted(segments: &[Node<'_>], source: &str) -> String {
    segments
        .iter()
        .map(|s| text(*s, source))
        .collect::<Vec<_>>()
        .join(".")
}

/// Identifier segments of a `scoped_identifier`, outermost first.
fn flatten_identifiers<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    match node.kind() {
        "identifier" => out.push(node),
        "scoped_identifier" => {
            if let Some(scope) = node.child_by_field_name("scope") {
                flatten_identifiers(scope, out);
            }
            if let Some(name) = node.child_by_field_name("name") {
                out.push(name);
            }
        }
        _ => {}
    }
}

/// Declared type of the parameter receiving argument `i`. At a varargs
/// position an argument that is not an array goes to the element type.
fn param_for(params: &[JType], i: usize, varargs: bool, arg_is_array: bool) -> Option<&JType> {
    if varargs && i + 1 >= params.len() {
        let last = params.last()?;
        return match last {
            JType::Array(inner) if !arg_is_array || i + 1 > params.len() => Some(inner),
            _ => Some(last),
        };
    }
    params.get(i)
}

fn unbox(ty: &Ty) -> Option<FieldType> {
    match ty {
        Ty::Value(t) if t.is_primitive() => Some(t.erasure()),
        Ty::Value(t) => t.erasure().unboxed(),
        _ => None,
    }
}

/// Binary numeric promotion.
fn promote(a: &Ty, b: &Ty) -> Ty {
    let (Some(a), Some(b)) = (unbox(a), unbox(b)) else {
        return Ty::Unknown;
    };
    let ty = if a == FieldType::Double || b == FieldType::Double {
        FieldType::Double
    } else if a == FieldType::Float || b == FieldType::Float {
        FieldType::Float
    } else if a == FieldType::Long || b == FieldType::Long {
        FieldType::Long
    } else if a == FieldType::Boolean {
        FieldType::Boolean
    } else {
        FieldType::Int
    };
    Ty::erased(ty)
}

/// Type of `c ? a : b`.
fn conditional(a: Ty, b: Ty) -> Ty {
    match (a, b) {
        (a, b) if a == b => a,
        (Ty::Null, b) => b,
        (a, Ty::Null) => a,
        (a, b) => {
            let both_numeric = [&a, &b]
                .iter()
                .all(|t| unbox(t).is_some_and(|p| p.is_numeric()));
            if both_numeric {
                promote(&a, &b)
            } else if matches!(a, Ty::Value(_)) {
                a
            } else {
                b
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::declare::{declare_units, ParsedUnit};
    use crate::syntax::{java_parser, parse};

    /// `(text, signature, kind)` of every occurrence in each unit.
    fn walk(sources: &[(&str, &str)]) -> Vec<(Vec<(String, String, String)>, Vec<Diagnostic>)> {
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
        units
            .iter()
            .zip(&declared)
            .map(|(unit, declared)| {
                let tree = unit.tree.as_ref().unwrap();
                let mut walked = walk_unit(&index, &unit.id, &unit.text, tree.root_node(), declared);
                walked.occurrences.sort_by_key(|o| o.span.start);
                let chars: Vec<char> = unit.text.chars().collect();
                let occs = walked
                    .occurrences
                    .iter()
                    .map(|o| {
                        (
                            chars[o.span.start..o.span.end].iter().collect(),
                            o.signature.0.clone(),
                            o.kind.to_string(),
                        )
                    })
                    .collect();
                (occs, walked.diagnostics)
            })
            .collect()
    }

    fn occ(text: &str, sig: &str, kind: &str) -> (String, String, String) {
        (text.to_string(), sig.to_string(), kind.to_string())
    }

    #[test]
    fn method_and_parameter() {
        let result = walk(&[("A.java", "class A { int foo(int bar) { return bar; } }")]);
        let (occs, diags) = &result[0];
        assert_eq!(
            occs,
            &vec![
                occ("A", "A", "type"),
                occ("foo", "A.foo(I)I", "method"),
                occ("bar", "A.foo(I)I#0", "parameter"),
                occ("bar", "A.foo(I)I#0", "parameter"),
            ]
        );
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn locals_fields_and_calls() {
        let src = r#"
class Counter {
    int count;
    static final int LIMIT = 10;
    void add(int n) {
        int total = count + n;
        if (total > LIMIT) { total = LIMIT; }
        this.count = total;
        for (int i = 0; i < n; i++) { int total2 = i; }
        reset();
    }
    void reset() { count = 0; }
}
"#;
        let result = walk(&[("Counter.java", src)]);
        let (occs, diags) = &result[0];
        assert!(diags.is_empty(), "{:?}", diags);
        let sigs: Vec<&str> = occs.iter().map(|(_, s, _)| s.as_str()).collect();
        assert!(sigs.contains(&"Counter.add(I)V@total:0"));
        assert!(sigs.contains(&"Counter.add(I)V@i:0"));
        assert_eq!(sigs.iter().filter(|s| **s == "Counter.count").count(), 4);
        assert_eq!(sigs.iter().filter(|s| **s == "Counter.LIMIT").count(), 3);
        assert_eq!(sigs.iter().filter(|s| **s == "Counter.reset()V").count(), 2);
    }

    #[test]
    fn override_fallbacks_and_inherited_fields() {
        let src = r#"
class Base { int size; int area() { return size; } }
class Sub extends Base { int area() { return size * 2; } int twice() { return area() + super.area(); } }
"#;
        let mut parser = java_parser().unwrap();
        let units = vec![ParsedUnit {
            id: "S.java".into(),
            text: src.into(),
            tree: parse(&mut parser, src),
        }];
        let mut index = TypeIndex::new();
        builtins::install(&mut index);
        let declared = declare_units(&mut index, &units);
        let walked = walk_unit(&index, "S.java", src, units[0].tree.as_ref().unwrap().root_node(), &declared[0]);

        let sub_area = walked
            .occurrences
            .iter()
            .find(|o| o.signature.0 == "Sub.area()I" && o.kind == OccurrenceKind::Method)
            .unwrap();
        assert_eq!(sub_area.fallbacks, vec![SymbolSignature::from("Base.area()I")]);
        let base_calls = walked
            .occurrences
            .iter()
            .filter(|o| o.signature.0 == "Base.area()I")
            .count();
        // declaration plus super.area()
        assert_eq!(base_calls, 2);
        let size = walked
            .occurrences
            .iter()
            .filter(|o| o.signature.0 == "Base.size")
            .count();
        assert_eq!(size, 3);
    }

    #[test]
    fn package_qualified_types_and_imports() {
        let old = "package com.x;\npublic class Old { public static int VALUE; }\n";
        let user = r#"package app;
import com.x.Old;
class User {
    Old a;
    com.x.Old b = new com.x.Old();
    int v = Old.VALUE + com.x.Old.VALUE;
}
"#;
        let result = walk(&[("com/x/Old.java", old), ("app/User.java", user)]);
        let (occs, diags) = &result[1];
        assert!(diags.is_empty(), "{:?}", diags);
        let types: Vec<&str> = occs
            .iter()
            .filter(|(_, s, _)| s == "com.x.Old")
            .map(|(t, _, _)| t.as_str())
            .collect();
        assert_eq!(types, vec!["com.x.Old", "Old", "com.x.Old", "com.x.Old", "Old", "com.x.Old"]);
        let values = occs.iter().filter(|(_, s, _)| s == "com.x.Old.VALUE").count();
        assert_eq!(values, 2);
    }

    #[test]
    fn overloads_pick_by_argument_type() {
        let src = r#"
class P {
    void put(int i) {}
    void put(String s) {}
    void put(Object o) {}
    void run() { put(1); put("s"); put(new P()); put(null); }
}
"#;
        let result = walk(&[("P.java", src)]);
        let (occs, diags) = &result[0];
        let calls: Vec<&str> = occs
            .iter()
            .filter(|(t, _, k)| t == "put" && k == "method")
            .map(|(_, s, _)| s.as_str())
            .collect();
        assert_eq!(
            calls,
            vec![
                "P.put(I)V",
                "P.put(Ljava/lang/String;)V",
                "P.put(Ljava/lang/Object;)V",
                "P.put(I)V",
                "P.put(Ljava/lang/String;)V",
                "P.put(Ljava/lang/Object;)V",
                "P.put(Ljava/lang/String;)V",
            ]
        );
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn lambdas_anonymous_classes_and_unresolved_names() {
        let src = r#"
class L {
    Runnable r = () -> { int x = 1; };
    Runnable q = new Runnable() { public void run() { helper(); } };
    void helper() { missing(); Unknown.call(); }
}
"#;
        let result = walk(&[("L.java", src)]);
        let (occs, diags) = &result[0];
        let sigs: Vec<&str> = occs.iter().map(|(_, s, _)| s.as_str()).collect();
        assert!(sigs.contains(&"L.<instinit>()V@x:0"));
        assert!(sigs.contains(&"L$1.run()V"));
        assert_eq!(sigs.iter().filter(|s| **s == "L.helper()V").count(), 2);
        let run = occs.iter().position(|(_, s, _)| s == "L$1.run()V").unwrap();
        assert_eq!(occs[run].0, "run");
        let kinds: Vec<DiagnosticKind> = diags.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DiagnosticKind::Unresolved, DiagnosticKind::Unresolved]);
    }

    #[test]
    fn enum_switch_labels_bind_constants() {
        let src = r#"
enum Mode { ON, OFF }
class S {
    int f(Mode m) {
        switch (m) { case ON: return 1; default: return 0; }
    }
}
"#;
        let result = walk(&[("S.java", src)]);
        let (occs, diags) = &result[0];
        assert!(diags.is_empty(), "{:?}", diags);
        let on = occs.iter().filter(|(_, s, _)| s == "Mode.ON").count();
        assert_eq!(on, 2);
    }

    fn count(occs: &[(String, String, String)], sig: &str) -> usize {
        occs.iter().filter(|(_, s, _)| s == sig).count()
    }

    #[test]
    fn generic_members_take_receiver_arguments() {
        let src = r#"
class Box<T> { T val; T get() { return val; } }
class A {
    int n;
    void f(Box<A> b) { b.val.n = 1; b.get().n = 2; }
    static <X> X id(X x) { return x; }
    void g() { id(this).n = 3; this.<A>id(null).n = 4; }
}
"#;
        let result = walk(&[("A.java", src)]);
        let (occs, diags) = &result[0];
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(count(occs, "A.n"), 5);
        assert_eq!(count(occs, "Box.val"), 3);
        assert_eq!(count(occs, "A.id(Ljava/lang/Object;)Ljava/lang/Object;"), 3);
    }

    #[test]
    fn iteration_and_lambdas_follow_type_arguments() {
        let src = r#"
import java.util.Iterator;
import java.util.List;
class A { int n; }
class Bag implements Iterable<A> { public Iterator<A> iterator() { return null; } }
class U {
    void f(Bag bag, List<A> xs) {
        for (var a : bag) { a.n++; }
        for (var b : xs) { b.n++; }
        xs.get(0).n = 1;
        xs.forEach(c -> c.n++);
    }
}
"#;
        let result = walk(&[("U.java", src)]);
        let (occs, diags) = &result[0];
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(count(occs, "A.n"), 5);
        assert_eq!(count(occs, "U.f(LBag;Ljava/util/List;)V@c:0"), 2);
        assert_eq!(count(occs, "java.lang.Iterable.forEach(Ljava/util/function/Consumer;)V"), 1);
    }

    #[test]
    fn lambda_results_settle_method_variables() {
        let src = r#"
import java.util.Optional;
class A { int n; }
class B { A a; }
class U {
    void f(Optional<B> b) { b.map(x -> x.a).get().n = 1; }
}
"#;
        let result = walk(&[("U.java", src)]);
        let (occs, diags) = &result[0];
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(count(occs, "B.a"), 2);
        assert_eq!(count(occs, "A.n"), 2);
    }

    #[test]
    fn methods_without_signatures_emit_nothing() {
        let src = r#"
import org.lib.Widget;
class A {
    void take(Widget w) { w.size(); }
    void lost(Missing m) { int z = 1; z++; m.hashCode(); }
}
"#;
        let result = walk(&[("A.java", src)]);
        let (occs, diags) = &result[0];
        assert_eq!(count(occs, "A.take(Lorg/lib/Widget;)V"), 1);
        assert_eq!(count(occs, "A.take(Lorg/lib/Widget;)V#0"), 2);
        assert!(occs.iter().all(|(text, _, _)| text != "lost" && text != "z" && text != "m"));
        let messages: Vec<&str> = diags.iter().map(|d| d.message.as_str()).collect();
        assert!(messages.contains(&"cannot resolve signature of method lost in A"), "{:?}", messages);
        assert!(!messages.iter().any(|m| m.starts_with("cannot resolve name")), "{:?}", messages);
    }
}
