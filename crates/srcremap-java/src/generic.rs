//! Generic types.
//!
//! Descriptors, and therefore signatures, are always erased. Expression
//! typing is not: a value of type `Box<A>` exposes `Box`'s members with `T`
//! replaced by `A`. [`JType`] is that unerased form. Declarations carry it
//! next to their erased descriptors when they mention type arguments or type
//! variables.
//!
//! Library classes and the built-in table spell generic types in the JVM
//! `Signature` attribute grammar:
//!
//! ```text
//! <class>   := <params>? <classtype> <classtype>*
//! <method>  := <params>? "(" <type>* ")" (<type> | "V") ("^" <ref>)*
//! <params>  := "<" (<ident> ":" <ref>? (":" <ref>)*)+ ">"
//! <ref>     := <classtype> | "T" <ident> ";" | "[" <type>
//! <classtype> := "L" <name> <args>? ("." <ident> <args>?)* ";"
//! <args>    := "<" ("*" | "+" <ref> | "-" <ref> | <ref>)+ ">"
//! ```

use std::collections::HashMap;
use std::fmt;

use srcremap_core::descriptor::{FieldType, MethodDescriptor};
use thiserror::Error;
use winnow::combinator::{delimited, preceded, repeat};
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::token::{any, take_till};
use winnow::ModalResult;

use crate::model::OBJECT;

/// Error type for signature parsing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid generic signature '{input}'")]
pub struct SignatureError {
    pub input: String,
}

/// A type with its type arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JType {
    Prim(FieldType),
    /// A class or interface type; raw when `args` is empty.
    Class { binary: String, args: Vec<TypeArg> },
    Array(Box<JType>),
    /// A type variable and its (first) bound.
    Var { name: String, bound: Box<JType> },
}

/// One type argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeArg {
    Exact(JType),
    /// `? extends T`
    Extends(JType),
    /// `? super T`
    Super(JType),
    /// `?`
    Any,
}

impl TypeArg {
    /// The type a wildcard is read as: its bound. `?` has none.
    pub fn bound(&self) -> Option<&JType> {
        match self {
            TypeArg::Exact(t) | TypeArg::Extends(t) | TypeArg::Super(t) => Some(t),
            TypeArg::Any => None,
        }
    }

    fn subst(&self, bindings: &Bindings) -> TypeArg {
        match self {
            TypeArg::Exact(t) => TypeArg::Exact(t.subst(bindings)),
            TypeArg::Extends(t) => TypeArg::Extends(t.subst(bindings)),
            TypeArg::Super(t) => TypeArg::Super(t.subst(bindings)),
            TypeArg::Any => TypeArg::Any,
        }
    }
}

/// A declared type variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParam {
    pub name: String,
    pub bound: JType,
}

impl TypeParam {
    pub fn new(name: impl Into<String>, bound: JType) -> Self {
        TypeParam {
            name: name.into(),
            bound,
        }
    }

    /// The variable as a type.
    pub fn var(&self) -> JType {
        JType::Var {
            name: self.name.clone(),
            bound: Box::new(self.bound.clone()),
        }
    }
}

/// Type variable name to the type standing for it.
pub type Bindings = HashMap<String, JType>;

impl JType {
    /// Raw class type.
    pub fn object(binary: impl Into<String>) -> Self {
        JType::Class {
            binary: binary.into(),
            args: Vec::new(),
        }
    }

    pub fn erasure(&self) -> FieldType {
        match self {
            JType::Prim(t) => t.clone(),
            JType::Class { binary, .. } => FieldType::Object(binary.clone()),
            JType::Array(inner) => FieldType::Array(Box::new(inner.erasure())),
            JType::Var { bound, .. } => bound.erasure(),
        }
    }

    /// Binary name of the class whose members this type exposes. Arrays
    /// expose `Object`'s; a type variable its bound's.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            JType::Class { binary, .. } => Some(binary),
            JType::Array(_) => Some(OBJECT),
            JType::Var { bound, .. } => bound.class_name(),
            JType::Prim(_) => None,
        }
    }

    /// Type arguments of a class type.
    pub fn args(&self) -> &[TypeArg] {
        match self {
            JType::Class { args, .. } => args,
            _ => &[],
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, JType::Prim(_))
    }

    /// Whether erasing this type loses anything.
    pub fn is_generic(&self) -> bool {
        match self {
            JType::Prim(_) => false,
            JType::Class { args, .. } => !args.is_empty(),
            JType::Array(inner) => inner.is_generic(),
            JType::Var { .. } => true,
        }
    }

    pub fn with_dims(self, dims: usize) -> JType {
        (0..dims).fold(self, |t, _| JType::Array(Box::new(t)))
    }

    /// Replace bound type variables.
    pub fn subst(&self, bindings: &Bindings) -> JType {
        if bindings.is_empty() {
            return self.clone();
        }
        match self {
            JType::Prim(_) => self.clone(),
            JType::Class { binary, args } => JType::Class {
                binary: binary.clone(),
                args: args.iter().map(|a| a.subst(bindings)).collect(),
            },
            JType::Array(inner) => JType::Array(Box::new(inner.subst(bindings))),
            JType::Var { name, .. } => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
        }
    }

    /// Give each type variable named in `scope` its declared bound.
    /// Signature parsing leaves every variable bounded by `Object`.
    pub fn with_var_bounds(&self, scope: &[TypeParam]) -> JType {
        match self {
            JType::Prim(_) => self.clone(),
            JType::Class { binary, args } => JType::Class {
                binary: binary.clone(),
                args: args
                    .iter()
                    .map(|a| match a {
                        TypeArg::Exact(t) => TypeArg::Exact(t.with_var_bounds(scope)),
                        TypeArg::Extends(t) => TypeArg::Extends(t.with_var_bounds(scope)),
                        TypeArg::Super(t) => TypeArg::Super(t.with_var_bounds(scope)),
                        TypeArg::Any => TypeArg::Any,
                    })
                    .collect(),
            },
            JType::Array(inner) => JType::Array(Box::new(inner.with_var_bounds(scope))),
            JType::Var { name, .. } => match scope.iter().find(|p| &p.name == name) {
                Some(param) => param.var(),
                None => self.clone(),
            },
        }
    }

    /// A primitive boxed; anything else unchanged.
    pub fn boxed(&self) -> JType {
        match self {
            JType::Prim(t) => t.boxed().map(JType::object).unwrap_or_else(|| self.clone()),
            _ => self.clone(),
        }
    }
}

impl From<FieldType> for JType {
    fn from(ty: FieldType) -> Self {
        match ty {
            FieldType::Object(binary) => JType::object(binary),
            FieldType::Array(inner) => JType::Array(Box::new(JType::from(*inner))),
            prim => JType::Prim(prim),
        }
    }
}

impl From<&FieldType> for JType {
    fn from(ty: &FieldType) -> Self {
        JType::from(ty.clone())
    }
}

impl fmt::Display for JType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JType::Prim(t) => write!(f, "{}", t),
            JType::Class { binary, args } => {
                write!(f, "{}", binary)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ",")?;
                        }
                        match arg {
                            TypeArg::Exact(t) => write!(f, "{}", t)?,
                            TypeArg::Extends(t) => write!(f, "? extends {}", t)?,
                            TypeArg::Super(t) => write!(f, "? super {}", t)?,
                            TypeArg::Any => write!(f, "?")?,
                        }
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            JType::Array(inner) => write!(f, "{}[]", inner),
            JType::Var { name, .. } => write!(f, "{}", name),
        }
    }
}

/// Bindings of `params` for a use with `args`.
///
/// A raw use (or one with the wrong number of arguments) binds every variable
/// to its erasure. Wildcards stand for their bound; `?` for the variable's.
pub fn bindings(params: &[TypeParam], args: &[TypeArg]) -> Bindings {
    if args.len() != params.len() {
        return params
            .iter()
            .map(|p| (p.name.clone(), JType::from(p.bound.erasure())))
            .collect();
    }
    params
        .iter()
        .zip(args)
        .map(|(p, a)| {
            let ty = match a.bound() {
                Some(t) => t.clone(),
                None => JType::from(p.bound.erasure()),
            };
            (p.name.clone(), ty)
        })
        .collect()
}

/// Generic form of a method declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericMethod {
    pub type_params: Vec<TypeParam>,
    pub params: Vec<JType>,
    pub ret: Option<JType>,
}

impl GenericMethod {
    pub fn erasure(&self) -> MethodDescriptor {
        MethodDescriptor::new(
            self.params.iter().map(JType::erasure).collect(),
            self.ret.as_ref().map(JType::erasure),
        )
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
            || self.params.iter().any(JType::is_generic)
            || self.ret.as_ref().is_some_and(JType::is_generic)
    }

    /// Resolve variable bounds: the method's own variables, then `outer`.
    pub fn with_var_bounds(mut self, outer: &[TypeParam]) -> Self {
        let mut scope = self.type_params.clone();
        scope.extend(outer.iter().cloned());
        let own: Vec<TypeParam> = self
            .type_params
            .iter()
            .map(|p| TypeParam::new(p.name.as_str(), p.bound.with_var_bounds(&scope)))
            .collect();
        let mut scope = own.clone();
        scope.extend(outer.iter().cloned());
        self.params = self.params.iter().map(|p| p.with_var_bounds(&scope)).collect();
        self.ret = self.ret.map(|r| r.with_var_bounds(&scope));
        self.type_params = own;
        self
    }
}

/// Generic form of a class header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSignature {
    pub type_params: Vec<TypeParam>,
    pub superclass: JType,
    pub interfaces: Vec<JType>,
}

/// Parse a class `Signature` such as `<T:Ljava/lang/Object;>Ljava/lang/Object;`.
pub fn parse_class_signature(input: &str) -> Result<ClassSignature, SignatureError> {
    let sig = class_signature.parse(input).map_err(|_| SignatureError {
        input: input.to_string(),
    })?;
    let params: Vec<TypeParam> = sig
        .type_params
        .iter()
        .map(|p| TypeParam::new(p.name.as_str(), p.bound.with_var_bounds(&sig.type_params)))
        .collect();
    Ok(ClassSignature {
        superclass: sig.superclass.with_var_bounds(&params),
        interfaces: sig
            .interfaces
            .iter()
            .map(|i| i.with_var_bounds(&params))
            .collect(),
        type_params: params,
    })
}

/// Parse a field `Signature` (a reference type such as `Ljava/util/List<TT;>;`).
pub fn parse_field_signature(input: &str) -> Result<JType, SignatureError> {
    java_type.parse(input).map_err(|_| SignatureError {
        input: input.to_string(),
    })
}

/// Parse a method `Signature` such as `<X:Ljava/lang/Object;>(TX;)TX;`.
/// Descriptors are accepted too. Variable bounds are not resolved; see
/// [`GenericMethod::with_var_bounds`].
pub fn parse_method_signature(input: &str) -> Result<GenericMethod, SignatureError> {
    method_signature.parse(input).map_err(|_| SignatureError {
        input: input.to_string(),
    })
}

// ============================================================================
// Parser implementation using winnow
// ============================================================================

fn java_type(input: &mut &str) -> ModalResult<JType> {
    match input.chars().next() {
        Some('L' | 'T' | '[') => reference(input),
        _ => base_type(input),
    }
}

fn base_type(input: &mut &str) -> ModalResult<JType> {
    let ty = match any.parse_next(input)? {
        'B' => FieldType::Byte,
        'C' => FieldType::Char,
        'D' => FieldType::Double,
        'F' => FieldType::Float,
        'I' => FieldType::Int,
        'J' => FieldType::Long,
        'S' => FieldType::Short,
        'Z' => FieldType::Boolean,
        _ => return Err(ErrMode::from_input(input)),
    };
    Ok(JType::Prim(ty))
}

fn reference(input: &mut &str) -> ModalResult<JType> {
    match any.parse_next(input)? {
        'L' => class_type(input),
        'T' => {
            let name: &str = take_till(1.., |c| c == ';').parse_next(input)?;
            ';'.parse_next(input)?;
            Ok(JType::Var {
                name: name.to_string(),
                bound: Box::new(JType::object(OBJECT)),
            })
        }
        '[' => Ok(JType::Array(Box::new(java_type(input)?))),
        _ => Err(ErrMode::from_input(input)),
    }
}

/// After the leading `L`. Arguments of outer segments are dropped.
fn class_type(input: &mut &str) -> ModalResult<JType> {
    let mut binary = segment(input)?.replace('/', ".");
    let mut args = type_args(input)?;
    while input.starts_with('.') {
        '.'.parse_next(input)?;
        let inner = segment(input)?;
        binary = format!("{}${}", binary, inner);
        args = type_args(input)?;
    }
    ';'.parse_next(input)?;
    Ok(JType::Class { binary, args })
}

fn segment<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_till(1.., |c| matches!(c, ';' | '<' | '.')).parse_next(input)
}

fn type_args(input: &mut &str) -> ModalResult<Vec<TypeArg>> {
    if !input.starts_with('<') {
        return Ok(Vec::new());
    }
    delimited('<', repeat(1.., type_arg), '>').parse_next(input)
}

fn type_arg(input: &mut &str) -> ModalResult<TypeArg> {
    match input.chars().next() {
        Some('*') => {
            any.parse_next(input)?;
            Ok(TypeArg::Any)
        }
        Some('+') => Ok(TypeArg::Extends(preceded('+', reference).parse_next(input)?)),
        Some('-') => Ok(TypeArg::Super(preceded('-', reference).parse_next(input)?)),
        _ => Ok(TypeArg::Exact(reference(input)?)),
    }
}

fn type_params(input: &mut &str) -> ModalResult<Vec<TypeParam>> {
    if !input.starts_with('<') {
        return Ok(Vec::new());
    }
    delimited('<', repeat(1.., type_param), '>').parse_next(input)
}

fn type_param(input: &mut &str) -> ModalResult<TypeParam> {
    let name: &str = take_till(1.., |c| c == ':').parse_next(input)?;
    ':'.parse_next(input)?;
    let mut bounds = Vec::new();
    if input.starts_with(['L', 'T', '[']) {
        bounds.push(reference(input)?);
    }
    while input.starts_with(':') {
        bounds.push(preceded(':', reference).parse_next(input)?);
    }
    let bound = bounds
        .into_iter()
        .next()
        .unwrap_or_else(|| JType::object(OBJECT));
    Ok(TypeParam::new(name, bound))
}

fn class_signature(input: &mut &str) -> ModalResult<ClassSignature> {
    let type_params = type_params(input)?;
    let superclass = reference(input)?;
    let interfaces: Vec<JType> = repeat(0.., reference).parse_next(input)?;
    Ok(ClassSignature {
        type_params,
        superclass,
        interfaces,
    })
}

fn method_signature(input: &mut &str) -> ModalResult<GenericMethod> {
    let type_params = type_params(input)?;
    let params: Vec<JType> = delimited('(', repeat(0.., java_type), ')').parse_next(input)?;
    let ret = if input.starts_with('V') {
        'V'.parse_next(input)?;
        None
    } else {
        Some(java_type(input)?)
    };
    let _throws: Vec<JType> = repeat(0.., preceded('^', reference)).parse_next(input)?;
    Ok(GenericMethod {
        type_params,
        params,
        ret,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod parsing {
        use super::*;

        #[test]
        fn class_signature_with_bounded_variable() {
            let sig = parse_class_signature(
                "<T::Ljava/lang/Comparable<TT;>;>Ljava/lang/Object;Ljava/lang/Iterable<TT;>;",
            )
            .unwrap();
            assert_eq!(sig.type_params.len(), 1);
            assert_eq!(sig.type_params[0].bound.to_string(), "java.lang.Comparable<T>");
            assert_eq!(sig.superclass, JType::object(OBJECT));
            assert_eq!(sig.interfaces[0].to_string(), "java.lang.Iterable<T>");
            // the variable in the interface now carries its bound
            let JType::Class { args, .. } = &sig.interfaces[0] else {
                panic!("not a class type");
            };
            assert_eq!(
                args[0].bound().unwrap().erasure(),
                FieldType::Object("java.lang.Comparable".into())
            );
        }

        #[test]
        fn method_signatures_and_plain_descriptors() {
            let sig = parse_method_signature("<X:Ljava/lang/Object;>(TX;[I)TX;^Ljava/io/IOException;")
                .unwrap()
                .with_var_bounds(&[]);
            assert_eq!(sig.erasure().to_string(), "(Ljava/lang/Object;[I)Ljava/lang/Object;");
            assert!(sig.is_generic());

            let plain = parse_method_signature("(ILjava/lang/String;)V").unwrap();
            assert_eq!(plain.erasure().to_string(), "(ILjava/lang/String;)V");
            assert!(!plain.is_generic());
        }

        #[test]
        fn wildcards_and_inner_classes() {
            let ty = parse_field_signature(
                "Ljava/util/Map<+Ljava/lang/Number;-Ljava/lang/String;>.Entry<*>;",
            )
            .unwrap();
            assert_eq!(ty.to_string(), "java.util.Map$Entry<?>");

            let ty = parse_field_signature("Lcom/x/Outer<TT;>.Inner<+Lcom/x/A;>;").unwrap();
            assert_eq!(ty.to_string(), "com.x.Outer$Inner<? extends com.x.A>");
            assert!(parse_field_signature("Ljava/util/List<>;").is_err());
        }
    }

    mod substitution {
        use super::*;

        fn list_of(arg: TypeArg) -> JType {
            JType::Class {
                binary: "java.util.List".into(),
                args: vec![arg],
            }
        }

        #[test]
        fn raw_uses_bind_erasures() {
            let param = TypeParam::new("T", JType::object("java.lang.Number"));
            let raw = bindings(std::slice::from_ref(&param), &[]);
            assert_eq!(raw["T"], JType::object("java.lang.Number"));

            let exact = bindings(
                std::slice::from_ref(&param),
                &[TypeArg::Exact(JType::object("com.x.A"))],
            );
            assert_eq!(param.var().subst(&exact), JType::object("com.x.A"));
            assert_eq!(
                list_of(TypeArg::Exact(param.var())).subst(&exact).to_string(),
                "java.util.List<com.x.A>"
            );
        }

        #[test]
        fn wildcards_read_as_bounds() {
            let param = TypeParam::new("E", JType::object(OBJECT));
            let params = std::slice::from_ref(&param);
            let sub = bindings(params, &[TypeArg::Extends(JType::object("com.x.A"))]);
            assert_eq!(sub["E"], JType::object("com.x.A"));
            let any = bindings(params, &[TypeArg::Any]);
            assert_eq!(any["E"], JType::object(OBJECT));
        }

        #[test]
        fn erasure_and_generic_flags() {
            let var = TypeParam::new("T", JType::object("java.lang.Number")).var();
            assert_eq!(var.clone().with_dims(1).erasure().to_string(), "[Ljava/lang/Number;");
            assert!(var.is_generic());
            assert!(!JType::from(FieldType::Int.with_dims(2)).is_generic());
            assert_eq!(var.class_name(), Some("java.lang.Number"));
            assert_eq!(JType::Prim(FieldType::Int).boxed(), JType::object("java.lang.Integer"));
        }
    }
}
