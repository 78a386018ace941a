//! Small helpers over the tree-sitter Java syntax tree.

use tree_sitter::{Node, Parser, Tree};

/// A parser configured for Java.
pub fn java_parser() -> Result<Parser, tree_sitter::LanguageError> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_java::LANGUAGE.into())?;
    Ok(parser)
}

/// Parse `text`, or `None` if the parser gave up.
pub fn parse(parser: &mut Parser, text: &str) -> Option<Tree> {
    parser.parse(text, None)
}

pub fn text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or("")
}

pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

pub fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// First named child of the given kind.
pub fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    named_children(node).into_iter().find(|c| c.kind() == kind)
}

/// All children (named or not) bound to a field.
pub fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// Whether a declaration's `modifiers` contain `keyword`.
pub fn has_modifier(node: Node<'_>, keyword: &str) -> bool {
    child_of_kind(node, "modifiers")
        .map(|m| children(m).iter().any(|c| c.kind() == keyword))
        .unwrap_or(false)
}

/// Node kinds that spell a type.
pub fn is_type_node(kind: &str) -> bool {
    matches!(
        kind,
        "type_identifier"
            | "scoped_type_identifier"
            | "generic_type"
            | "array_type"
            | "integral_type"
            | "floating_point_type"
            | "boolean_type"
            | "void_type"
            | "annotated_type"
    )
}

/// Node kinds that declare a named type.
pub fn is_type_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "annotation_type_declaration"
    )
}

/// Array dimensions written in a `dimensions` node (`[][]` -> 2).
pub fn dimension_count(node: Option<Node<'_>>, source: &str) -> usize {
    node.map(|n| text(n, source).matches('[').count())
        .unwrap_or(0)
}
