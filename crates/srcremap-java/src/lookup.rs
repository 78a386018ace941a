//! Member lookup over the type hierarchy.
//!
//! Supertypes are visited breadth first, superclass before interfaces, with
//! `java.lang.Object` always last. Overload selection works on erased
//! parameter types; the generic helpers below carry type arguments from a
//! receiver to the members it exposes.

use std::collections::{HashSet, VecDeque};

use srcremap_core::descriptor::FieldType;
use srcremap_core::signature::SymbolSignature;

use crate::generic::{bindings, Bindings, JType, TypeArg, TypeParam};
use crate::model::{FieldDecl, MethodDecl, TypeIndex, OBJECT};

/// Static type of an expression, as far as the walker can tell.
#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Value(JType),
    /// The `null` literal.
    Null,
    /// Could not be determined; compatible with anything.
    Unknown,
}

impl Ty {
    pub fn object(binary: impl Into<String>) -> Self {
        Ty::Value(JType::object(binary))
    }

    pub fn erased(ty: FieldType) -> Self {
        Ty::Value(JType::from(ty))
    }

    /// Binary name of the class whose members this type exposes.
    ///
    /// Arrays expose `Object` members (and `length`, handled by the walker).
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Ty::Value(ty) => ty.class_name(),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&JType> {
        match self {
            Ty::Value(ty) => Some(ty),
            _ => None,
        }
    }
}

/// All supertypes of `binary`, nearest first, excluding `binary` itself.
pub fn supertypes(index: &TypeIndex, binary: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(binary.to_string());
    let mut queue: VecDeque<String> = VecDeque::new();
    queue.push_back(binary.to_string());
    while let Some(current) = queue.pop_front() {
        let Some(decl) = index.get(&current) else {
            continue;
        };
        for sup in decl.direct_supertypes() {
            if sup != OBJECT && seen.insert(sup.to_string()) {
                out.push(sup.to_string());
                queue.push_back(sup.to_string());
            }
        }
    }
    if binary != OBJECT {
        out.push(OBJECT.to_string());
    }
    out
}

/// `binary` followed by its supertypes.
fn self_and_supertypes(index: &TypeIndex, binary: &str) -> Vec<String> {
    let mut all = vec![binary.to_string()];
    all.extend(supertypes(index, binary));
    all
}

pub fn is_subtype(index: &TypeIndex, sub: &str, sup: &str) -> bool {
    sub == sup || sup == OBJECT || supertypes(index, sub).iter().any(|s| s == sup)
}

/// Nearest field called `name` visible from `owner`, with its declaring type.
pub fn find_field<'a>(
    index: &'a TypeIndex,
    owner: &str,
    name: &str,
) -> Option<(String, &'a FieldDecl)> {
    self_and_supertypes(index, owner).into_iter().find_map(|ty| {
        let field = index.get(&ty)?.fields.iter().find(|f| f.name == name)?;
        Some((ty, field))
    })
}

/// Methods called `name` that are members of `owner`, with declaring types.
///
/// An inherited method is hidden by a nearer one with the same parameter
/// types. Constructors are never inherited.
pub fn find_methods<'a>(
    index: &'a TypeIndex,
    owner: &str,
    name: &str,
) -> Vec<(String, &'a MethodDecl)> {
    let scope = if name == "<init>" {
        vec![owner.to_string()]
    } else {
        self_and_supertypes(index, owner)
    };
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for ty in scope {
        let Some(decl) = index.get(&ty) else {
            continue;
        };
        for method in decl.methods.iter().filter(|m| m.name == name) {
            if seen.insert(method.desc.params_descriptor()) {
                out.push((ty.clone(), method));
            }
        }
    }
    out
}

/// Signatures of the methods `method` (declared in `owner`) overrides,
/// nearest first.
pub fn overridden(index: &TypeIndex, owner: &str, method: &MethodDecl) -> Vec<SymbolSignature> {
    if method.is_static || method.is_private || method.is_constructor() {
        return Vec::new();
    }
    let params = method.desc.params_descriptor();
    supertypes(index, owner)
        .into_iter()
        .filter_map(|ty| {
            let decl = index.get(&ty)?;
            let sup = decl.methods.iter().find(|m| {
                m.name == method.name
                    && !m.is_static
                    && !m.is_private
                    && m.desc.params_descriptor() == params
            })?;
            Some(sup.signature(&ty))
        })
        .collect()
}

/// Member type `simple` of `owner`, including inherited member types.
pub fn member_type(index: &TypeIndex, owner: &str, simple: &str) -> Option<String> {
    self_and_supertypes(index, owner)
        .into_iter()
        .find_map(|ty| index.get(&ty)?.members.get(simple).cloned())
}

// ============================================================================
// Overload Selection
// ============================================================================

/// Outcome of choosing among overloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Index into the candidate list.
    Found(usize),
    /// Several candidates are applicable and none is most specific.
    Ambiguous(Vec<usize>),
    NoMatch,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Strict,
    Loose,
    Varargs,
}

/// Choose the method invoked with `args` among `candidates`.
///
/// Follows the three applicability phases of Java overload resolution
/// (subtyping, then boxing, then varargs) and picks the most specific
/// applicable method of the first phase that has any.
pub fn select_overload(
    index: &TypeIndex,
    candidates: &[(String, &MethodDecl)],
    args: &[Ty],
) -> Selection {
    if candidates.is_empty() {
        return Selection::NoMatch;
    }
    for phase in [Phase::Strict, Phase::Loose, Phase::Varargs] {
        let applicable: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, (_, m))| applicable(index, m, args, phase))
            .map(|(i, _)| i)
            .collect();
        match applicable.len() {
            0 => continue,
            1 => return Selection::Found(applicable[0]),
            _ => {}
        }
        let maximal: Vec<usize> = applicable
            .iter()
            .copied()
            .filter(|&i| {
                applicable.iter().all(|&j| {
                    i == j
                        || more_specific(index, candidates[i].1, candidates[j].1, args.len(), phase)
                })
            })
            .collect();
        return match maximal.as_slice() {
            [one] => Selection::Found(*one),
            _ => Selection::Ambiguous(applicable),
        };
    }
    Selection::NoMatch
}

/// Declared type of the parameter receiving argument `i`.
fn param_type(method: &MethodDecl, i: usize, phase: Phase) -> Option<FieldType> {
    let params = &method.desc.params;
    if phase == Phase::Varargs && method.is_varargs && i + 1 >= params.len() {
        return match params.last()? {
            FieldType::Array(inner) => Some((**inner).clone()),
            last => Some(last.clone()),
        };
    }
    params.get(i).cloned()
}

fn applicable(index: &TypeIndex, method: &MethodDecl, args: &[Ty], phase: Phase) -> bool {
    let arity = method.desc.params.len();
    match phase {
        Phase::Strict | Phase::Loose => {
            if args.len() != arity {
                return false;
            }
        }
        Phase::Varargs => {
            if !method.is_varargs || args.len() + 1 < arity {
                return false;
            }
        }
    }
    args.iter().enumerate().all(|(i, arg)| {
        param_type(method, i, phase)
            .is_some_and(|param| assignable(index, arg, &param, phase != Phase::Strict))
    })
}

fn more_specific(
    index: &TypeIndex,
    m1: &MethodDecl,
    m2: &MethodDecl,
    n: usize,
    phase: Phase,
) -> bool {
    let count = if phase == Phase::Varargs {
        n.max(m1.desc.params.len()).max(m2.desc.params.len())
    } else {
        n
    };
    (0..count).all(|i| {
        match (param_type(m1, i, phase), param_type(m2, i, phase)) {
            (Some(p1), Some(p2)) => assignable(index, &Ty::erased(p1), &p2, false),
            _ => true,
        }
    })
}

/// Whether a value of type `from` can be passed where `to` is expected.
pub fn assignable(index: &TypeIndex, from: &Ty, to: &FieldType, boxing: bool) -> bool {
    let from = match from {
        Ty::Unknown => return true,
        Ty::Null => return !to.is_primitive(),
        Ty::Value(from) => from.erasure(),
    };
    let from = &from;
    if from == to {
        return true;
    }
    match (from.is_primitive(), to.is_primitive()) {
        (true, true) => from.widens_to(to),
        (false, false) => reference_assignable(index, from, to),
        (true, false) => {
            boxing
                && from
                    .boxed()
                    .is_some_and(|b| reference_assignable(index, &FieldType::Object(b.into()), to))
        }
        (false, true) => boxing && from.unboxed().is_some_and(|p| p.widens_to(to)),
    }
}

fn reference_assignable(index: &TypeIndex, from: &FieldType, to: &FieldType) -> bool {
    match (from, to) {
        (_, FieldType::Object(to)) if to == OBJECT => true,
        (FieldType::Object(from), FieldType::Object(to)) => {
            // Types we know nothing about are not excluded.
            !index.contains(from) || is_subtype(index, from, to)
        }
        (FieldType::Array(_), FieldType::Object(to)) => {
            to == "java.lang.Cloneable" || to == "java.io.Serializable"
        }
        (FieldType::Array(a), FieldType::Array(b)) => {
            if a.is_primitive() || b.is_primitive() {
                a == b
            } else {
                reference_assignable(index, a, b)
            }
        }
        _ => false,
    }
}

// ============================================================================
// Generic Members
// ============================================================================

/// Supertype chains deeper than this are cyclic.
const MAX_DEPTH: usize = 64;

/// `binary` as seen from its own body: its type parameters as arguments.
pub fn this_type(index: &TypeIndex, binary: &str) -> JType {
    let args = index
        .get(binary)
        .map(|d| d.type_params.iter().map(|p| TypeArg::Exact(p.var())).collect())
        .unwrap_or_default();
    JType::Class {
        binary: binary.to_string(),
        args,
    }
}

/// Type arguments of `ty` viewed as its supertype `target`; `None` if `ty`
/// is not a subtype of `target`. Empty for a raw view.
pub fn as_super(index: &TypeIndex, ty: &JType, target: &str) -> Option<Vec<TypeArg>> {
    as_super_from(index, ty, target, 0)
}

fn as_super_from(index: &TypeIndex, ty: &JType, target: &str, depth: usize) -> Option<Vec<TypeArg>> {
    if depth > MAX_DEPTH {
        return None;
    }
    match ty {
        JType::Var { bound, .. } => as_super_from(index, bound, target, depth + 1),
        JType::Class { binary, args } => {
            if binary == target {
                return Some(args.clone());
            }
            if target == OBJECT {
                return Some(Vec::new());
            }
            let decl = index.get(binary)?;
            let subst = bindings(&decl.type_params, args);
            decl.generic_supertypes()
                .iter()
                .find_map(|sup| as_super_from(index, &sup.subst(&subst), target, depth + 1))
        }
        _ => None,
    }
}

/// Bindings for the type parameters of `owner` when one of its members is
/// reached through a value of type `receiver`.
pub fn member_bindings(index: &TypeIndex, receiver: &JType, owner: &str) -> Bindings {
    let Some(decl) = index.get(owner) else {
        return Bindings::new();
    };
    if decl.type_params.is_empty() {
        return Bindings::new();
    }
    let args = as_super(index, receiver, owner).unwrap_or_default();
    bindings(&decl.type_params, &args)
}

/// Infer `vars` from passing `arg` where `param` is expected.
/// The first binding of a variable wins.
pub fn infer(index: &TypeIndex, param: &JType, arg: &JType, vars: &[TypeParam], out: &mut Bindings) {
    match param {
        JType::Var { name, .. } => {
            if vars.iter().any(|v| &v.name == name) && !out.contains_key(name) {
                out.insert(name.clone(), arg.boxed());
            }
        }
        JType::Array(p) => {
            if let JType::Array(a) = arg {
                infer(index, p, a, vars, out);
            }
        }
        JType::Class { binary, args: pargs } if !pargs.is_empty() => {
            let Some(aargs) = as_super(index, arg, binary) else {
                return;
            };
            for (p, a) in pargs.iter().zip(&aargs) {
                if let (Some(p), Some(a)) = (p.bound(), a.bound()) {
                    infer(index, p, a, vars, out);
                }
            }
        }
        _ => {}
    }
}

fn is_object_method(method: &MethodDecl) -> bool {
    let params = method.desc.params_descriptor();
    matches!(
        (method.name.as_str(), params.as_str()),
        ("equals", "(Ljava/lang/Object;)") | ("hashCode", "()") | ("toString", "()")
    )
}

/// Parameter and return types of the single abstract method of functional
/// interface `target`, for typing a lambda passed where `target` is expected.
pub fn function_type(index: &TypeIndex, target: &JType) -> Option<(Vec<JType>, Option<JType>)> {
    let class = target.class_name()?;
    if !index.get(class)?.kind.is_interface() {
        return None;
    }
    let mut seen: HashSet<String> = HashSet::new();
    let mut abstracts = Vec::new();
    for ty in self_and_supertypes(index, class) {
        if ty == OBJECT {
            continue;
        }
        let Some(decl) = index.get(&ty) else {
            continue;
        };
        for method in decl.methods.iter().filter(|m| !m.is_static) {
            // nearer declarations settle whether a method is abstract
            if !seen.insert(format!("{}{}", method.name, method.desc.params_descriptor())) {
                continue;
            }
            if method.is_abstract && !is_object_method(method) {
                abstracts.push((ty.clone(), method));
            }
        }
    }
    let [(owner, method)] = abstracts.as_slice() else {
        return None;
    };
    let subst = member_bindings(index, target, owner);
    let params = method.generic_params().iter().map(|p| p.subst(&subst)).collect();
    let ret = method.generic_ret().map(|r| r.subst(&subst));
    Some((params, ret))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::model::{FieldDecl, Origin, TypeDecl, TypeKind};
    use srcremap_core::descriptor::parse_method_descriptor;

    fn method(name: &str, desc: &str) -> MethodDecl {
        MethodDecl::new(name, parse_method_descriptor(desc).unwrap())
    }

    fn index() -> TypeIndex {
        let mut index = TypeIndex::new();
        builtins::install(&mut index);

        let mut iface = TypeDecl::new("p.Shape", TypeKind::Interface, Origin::Source);
        iface.methods.push(method("area", "()D"));
        index.insert(iface);

        let mut base = TypeDecl::new("p.Base", TypeKind::Class, Origin::Source);
        base.superclass = Some(OBJECT.into());
        base.interfaces.push("p.Shape".into());
        base.fields.push(FieldDecl::new("size", FieldType::Int, false));
        base.methods.push(method("area", "()D"));
        base.methods.push(method("scale", "(I)V"));
        base.methods
            .push(method("pair", "(Ljava/lang/String;Ljava/lang/Object;)V"));
        base.methods
            .push(method("pair", "(Ljava/lang/Object;Ljava/lang/String;)V"));
        index.insert(base);

        let mut sub = TypeDecl::new("p.Sub", TypeKind::Class, Origin::Source);
        sub.superclass = Some("p.Base".into());
        sub.methods.push(method("area", "()D"));
        sub.methods.push(method("scale", "(D)V"));
        index.insert(sub);
        index
    }

    #[test]
    fn supertypes_are_breadth_first_with_object_last() {
        let index = index();
        assert_eq!(
            supertypes(&index, "p.Sub"),
            vec!["p.Base", "p.Shape", OBJECT]
        );
        assert!(is_subtype(&index, "p.Sub", "p.Shape"));
        assert!(!is_subtype(&index, "p.Base", "p.Sub"));
    }

    #[test]
    fn inherited_fields_report_declaring_type() {
        let index = index();
        let (owner, field) = find_field(&index, "p.Sub", "size").unwrap();
        assert_eq!(owner, "p.Base");
        assert_eq!(field.ty, FieldType::Int);
        assert!(find_field(&index, "p.Sub", "nope").is_none());
    }

    #[test]
    fn overrides_are_listed_nearest_first() {
        let index = index();
        let area = method("area", "()D");
        let chain: Vec<String> = overridden(&index, "p.Sub", &area)
            .into_iter()
            .map(|s| s.0)
            .collect();
        assert_eq!(chain, vec!["p.Base.area()D", "p.Shape.area()D"]);
    }

    #[test]
    fn overloads_prefer_exact_primitive_match() {
        let index = index();
        let candidates = find_methods(&index, "p.Sub", "scale");
        assert_eq!(candidates.len(), 2);

        let pick = |arg: FieldType| match select_overload(&index, &candidates, &[Ty::erased(arg)]) {
            Selection::Found(i) => format!("{}.{}", candidates[i].0, candidates[i].1.desc),
            other => format!("{:?}", other),
        };
        assert_eq!(pick(FieldType::Int), "p.Base.(I)V");
        assert_eq!(pick(FieldType::Double), "p.Sub.(D)V");
        // long widens only to double
        assert_eq!(pick(FieldType::Long), "p.Sub.(D)V");
    }

    #[test]
    fn boxing_and_varargs_phases() {
        let index = index();
        let candidates = find_methods(&index, "java.lang.String", "valueOf");
        let integer = Ty::object("java.lang.Integer");
        match select_overload(&index, &candidates, &[integer]) {
            Selection::Found(i) => assert_eq!(candidates[i].1.desc.to_string(), "(Ljava/lang/Object;)Ljava/lang/String;"),
            other => panic!("{:?}", other),
        }

        let format = find_methods(&index, "java.lang.String", "format");
        let args = [Ty::erased(FieldType::string()), Ty::erased(FieldType::Int), Ty::Null];
        assert_eq!(select_overload(&index, &format, &args), Selection::Found(0));
    }

    #[test]
    fn unknown_arguments_match_and_ties_go_to_most_specific() {
        let index = index();
        let candidates = find_methods(&index, "p.Sub", "scale");
        match select_overload(&index, &candidates, &[Ty::Unknown]) {
            Selection::Found(i) => assert_eq!(candidates[i].1.desc.to_string(), "(I)V"),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn crossed_parameters_are_ambiguous() {
        let index = index();
        let candidates = find_methods(&index, "p.Base", "pair");
        let s = Ty::erased(FieldType::string());
        assert!(matches!(
            select_overload(&index, &candidates, &[s.clone(), s]),
            Selection::Ambiguous(ref all) if all.len() == 2
        ));
    }

    #[test]
    fn null_and_arrays() {
        let index = index();
        assert!(assignable(&index, &Ty::Null, &FieldType::string(), false));
        assert!(!assignable(&index, &Ty::Null, &FieldType::Int, true));
        let strings = FieldType::string().with_dims(1);
        assert!(assignable(&index, &Ty::erased(strings.clone()), &FieldType::object().with_dims(1), false));
        assert!(assignable(&index, &Ty::erased(strings), &FieldType::object(), false));
        assert!(!assignable(&index, &Ty::erased(FieldType::Int.with_dims(1)), &FieldType::Long.with_dims(1), false));
    }

    mod generics {
        use super::*;
        use crate::generic::{parse_class_signature, parse_method_signature};

        /// `class p.Box<T> { T get(); }`, `class p.IntBox extends Box<Integer>`
        /// and `interface p.Fn<A, R> extends Function<A, R>`.
        fn index() -> TypeIndex {
            let mut index = super::index();
            let mut boxed = TypeDecl::new("p.Box", TypeKind::Class, Origin::Source);
            boxed.superclass = Some(OBJECT.into());
            boxed.type_params = parse_class_signature("<T:Ljava/lang/Object;>Ljava/lang/Object;")
                .unwrap()
                .type_params;
            let get = parse_method_signature("()TT;").unwrap().with_var_bounds(&boxed.type_params);
            boxed.methods.push(MethodDecl::new("get", get.erasure()).with_generic(get));
            index.insert(boxed);

            let mut int_box = TypeDecl::new("p.IntBox", TypeKind::Class, Origin::Source);
            let sig = parse_class_signature("Lp/Box<Ljava/lang/Integer;>;").unwrap();
            int_box.superclass = Some("p.Box".into());
            int_box.generic_supers = vec![sig.superclass];
            index.insert(int_box);

            let mut func = TypeDecl::new("p.Fn", TypeKind::Interface, Origin::Source);
            let sig = parse_class_signature(
                "<A:Ljava/lang/Object;R:Ljava/lang/Object;>Ljava/lang/Object;Ljava/util/function/Function<TA;TR;>;",
            )
            .unwrap();
            func.interfaces = vec!["java.util.function.Function".into()];
            func.type_params = sig.type_params;
            func.generic_supers = sig.interfaces;
            index.insert(func);
            index
        }

        fn class(binary: &str, args: &[&str]) -> JType {
            JType::Class {
                binary: binary.into(),
                args: args.iter().map(|a| TypeArg::Exact(JType::object(*a))).collect(),
            }
        }

        #[test]
        fn arguments_follow_supertypes() {
            let index = index();
            let int_box = JType::object("p.IntBox");
            let args = as_super(&index, &int_box, "p.Box").unwrap();
            assert_eq!(args, vec![TypeArg::Exact(JType::object("java.lang.Integer"))]);
            let subst = member_bindings(&index, &int_box, "p.Box");
            assert_eq!(subst["T"], JType::object("java.lang.Integer"));
            assert_eq!(as_super(&index, &int_box, "p.Shape"), None);

            let list = class("java.util.ArrayList", &["p.Base"]);
            let iterable = as_super(&index, &list, "java.lang.Iterable").unwrap();
            assert_eq!(iterable, vec![TypeArg::Exact(JType::object("p.Base"))]);
        }

        #[test]
        fn raw_receivers_erase_members() {
            let index = index();
            let subst = member_bindings(&index, &JType::object("p.Box"), "p.Box");
            assert_eq!(subst["T"], JType::object(OBJECT));
            assert_eq!(this_type(&index, "p.Box").to_string(), "p.Box<T>");
        }

        #[test]
        fn method_variables_bind_from_arguments() {
            let index = index();
            let sig = parse_method_signature("<X:Ljava/lang/Object;>(Ljava/util/List<TX;>;)TX;")
                .unwrap()
                .with_var_bounds(&[]);
            let mut out = Bindings::new();
            let arg = class("java.util.ArrayList", &["p.Base"]);
            infer(&index, &sig.params[0], &arg, &sig.type_params, &mut out);
            assert_eq!(sig.ret.unwrap().subst(&out), JType::object("p.Base"));

            let mut boxed = Bindings::new();
            let x = sig.type_params[0].var();
            infer(&index, &x, &JType::Prim(FieldType::Int), &sig.type_params, &mut boxed);
            assert_eq!(boxed["X"], JType::object("java.lang.Integer"));
        }

        #[test]
        fn lambda_targets_expose_their_abstract_method() {
            let index = index();
            let target = class("p.Fn", &["p.Base", "java.lang.String"]);
            let (params, ret) = function_type(&index, &target).unwrap();
            assert_eq!(params, vec![JType::object("p.Base")]);
            assert_eq!(ret, Some(JType::object("java.lang.String")));
            assert_eq!(function_type(&index, &JType::object("p.Base")), None);
            let (params, ret) = function_type(&index, &JType::object("java.lang.Runnable")).unwrap();
            assert!(params.is_empty());
            assert_eq!(ret, None);
        }
    }
}
