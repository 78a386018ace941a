//! Classpath loading.
//!
//! Each entry is either a directory tree of `.class` files or a jar/zip
//! archive. Classes are decoded with [`crate::classfile`] and turned into
//! library [`TypeDecl`]s. The first entry that defines a class wins.
//! `Signature` attributes give the generic forms; an unreadable one leaves
//! the erased declaration alone.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use srcremap_core::descriptor::{parse_field_descriptor, parse_method_descriptor, FieldType};
use thiserror::Error;
use walkdir::WalkDir;

use crate::classfile::{
    parse_class, ClassInfo, ACC_ABSTRACT, ACC_ANNOTATION, ACC_BRIDGE, ACC_ENUM, ACC_INTERFACE, ACC_PRIVATE,
    ACC_STATIC, ACC_SYNTHETIC, ACC_VARARGS,
};
use crate::generic::{parse_class_signature, parse_field_signature, parse_method_signature};
use crate::model::{FieldDecl, MethodDecl, Origin, TypeDecl, TypeIndex, TypeKind};

/// Errors opening a classpath entry. Individual bad class files are not
/// errors; they are logged and skipped.
#[derive(Debug, Error)]
pub enum ClasspathError {
    #[error("classpath entry not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("cannot read classpath entry {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt classpath archive {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Load every entry and add its classes to `index`. Returns the number of
/// classes added.
pub fn install(index: &mut TypeIndex, entries: &[PathBuf]) -> Result<usize, ClasspathError> {
    let mut classes: Vec<ClassInfo> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for entry in entries {
        let before = classes.len();
        for info in read_entry(entry)? {
            if seen.insert(info.name.clone()) {
                classes.push(info);
            }
        }
        tracing::debug!(
            entry = %entry.display(),
            classes = classes.len() - before,
            "loaded classpath entry"
        );
    }

    let count = classes.len();
    let mut links = Vec::new();
    for decl in lower(&classes) {
        links.extend(member_link(&decl));
        index.insert(decl);
    }
    for (outer, simple, inner) in links {
        index.add_member(&outer, &simple, &inner);
    }
    Ok(count)
}

fn read_entry(path: &Path) -> Result<Vec<ClassInfo>, ClasspathError> {
    if !path.exists() {
        return Err(ClasspathError::Missing {
            path: path.to_path_buf(),
        });
    }
    if path.is_dir() {
        read_directory(path)
    } else {
        read_archive(path)
    }
}

fn read_directory(root: &Path) -> Result<Vec<ClassInfo>, ClasspathError> {
    let mut classes = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| ClasspathError::Io {
            path: root.to_path_buf(),
            source: e.into(),
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_class_file(&path.to_string_lossy()) {
            continue;
        }
        let bytes = std::fs::read(path).map_err(|source| ClasspathError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        decode(&bytes, &path.to_string_lossy(), &mut classes);
    }
    Ok(classes)
}

fn read_archive(path: &Path) -> Result<Vec<ClassInfo>, ClasspathError> {
    let file = File::open(path).map_err(|source| ClasspathError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let corrupt = |source| ClasspathError::Corrupt {
        path: path.to_path_buf(),
        source,
    };
    let mut archive = zip::ZipArchive::new(file).map_err(corrupt)?;
    let mut classes = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(corrupt)?;
        let name = entry.name().to_string();
        if !is_class_file(&name) || name.starts_with("META-INF/") {
            continue;
        }
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|source| ClasspathError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        decode(&bytes, &name, &mut classes);
    }
    Ok(classes)
}

fn is_class_file(name: &str) -> bool {
    name.ends_with(".class") && !name.ends_with("module-info.class")
}

fn decode(bytes: &[u8], origin: &str, out: &mut Vec<ClassInfo>) {
    match parse_class(bytes) {
        Ok(info) => out.push(info),
        Err(err) => tracing::warn!(class = origin, error = %err, "skipping unreadable class file"),
    }
}

/// Lower decoded classes to library declarations.
fn lower(classes: &[ClassInfo]) -> Vec<TypeDecl> {
    let names: HashSet<&str> = classes.iter().map(|c| c.name.as_str()).collect();
    // Nesting as recorded by each class about itself or its members.
    let mut nesting: HashMap<&str, (Option<&str>, Option<&str>, u16)> = HashMap::new();
    for class in classes {
        for entry in &class.inner_classes {
            nesting.entry(entry.inner.as_str()).or_insert((
                entry.outer.as_deref(),
                entry.simple_name.as_deref(),
                entry.access,
            ));
        }
    }

    classes
        .iter()
        .filter(|class| !class.is(ACC_SYNTHETIC))
        .map(|class| {
            let mut decl = TypeDecl::new(class.name.as_str(), kind_of(class), Origin::Library);
            decl.superclass = class.super_name.clone();
            decl.interfaces = class.interfaces.clone();
            if let Some(signature) = &class.signature {
                match parse_class_signature(signature) {
                    Ok(sig) => {
                        decl.type_params = sig.type_params;
                        decl.generic_supers = std::iter::once(sig.superclass).chain(sig.interfaces).collect();
                    }
                    Err(err) => tracing::debug!(class = %class.name, error = %err, "ignoring class signature"),
                }
            }

            let mut inner_access = None;
            match nesting.get(class.name.as_str()) {
                Some((Some(outer), simple, access)) => {
                    decl.outer = Some(outer.to_string());
                    if let Some(simple) = simple {
                        decl.simple = simple.to_string();
                    }
                    inner_access = Some(*access);
                }
                Some((None, _, _)) => decl.is_local = true,
                None => {
                    if let Some((outer, simple)) = class.name.rsplit_once('$') {
                        if names.contains(outer) {
                            if simple.starts_with(|c: char| c.is_ascii_digit()) {
                                decl.is_local = true;
                            } else {
                                decl.outer = Some(outer.to_string());
                            }
                        }
                    }
                }
            }

            // Inner (non-static) classes take the enclosing instance as a
            // leading constructor parameter in bytecode but not in source.
            let implicit_outer = match (&decl.outer, inner_access) {
                (Some(outer), Some(access))
                    if access & ACC_STATIC == 0 && !decl.kind.is_interface() =>
                {
                    Some(FieldType::Object(outer.clone()))
                }
                _ => None,
            };

            lower_members(class, &mut decl, implicit_outer.as_ref());
            decl
        })
        .collect()
}

fn kind_of(class: &ClassInfo) -> TypeKind {
    if class.is(ACC_ANNOTATION) {
        TypeKind::Annotation
    } else if class.is(ACC_INTERFACE) {
        TypeKind::Interface
    } else if class.is(ACC_ENUM) {
        TypeKind::Enum
    } else if class.super_name.as_deref() == Some("java.lang.Record") {
        TypeKind::Record
    } else {
        TypeKind::Class
    }
}

fn lower_members(class: &ClassInfo, decl: &mut TypeDecl, implicit_outer: Option<&FieldType>) {
    for field in &class.fields {
        if field.is(ACC_SYNTHETIC) || field.is(ACC_PRIVATE) {
            continue;
        }
        match parse_field_descriptor(&field.descriptor) {
            Ok(ty) => {
                let mut lowered = FieldDecl::new(field.name.as_str(), ty, field.is(ACC_STATIC));
                if let Some(generic) = field.signature.as_deref().and_then(|s| parse_field_signature(s).ok()) {
                    lowered = lowered.with_generic(generic.with_var_bounds(&decl.type_params));
                }
                decl.fields.push(lowered);
            }
            Err(err) => tracing::debug!(class = %class.name, error = %err, "skipping field"),
        }
    }
    for method in &class.methods {
        if method.is(ACC_SYNTHETIC)
            || method.is(ACC_BRIDGE)
            || method.is(ACC_PRIVATE)
            || method.name == "<clinit>"
        {
            continue;
        }
        let mut desc = match parse_method_descriptor(&method.descriptor) {
            Ok(desc) => desc,
            Err(err) => {
                tracing::debug!(class = %class.name, error = %err, "skipping method");
                continue;
            }
        };
        if method.name == "<init>" {
            if let Some(outer) = implicit_outer {
                if desc.params.first() == Some(outer) {
                    desc.params.remove(0);
                }
            }
        }
        let mut lowered = MethodDecl::new(method.name.as_str(), desc);
        if let Some(sig) = method.signature.as_deref().and_then(|s| parse_method_signature(s).ok()) {
            lowered = lowered.with_generic(sig.with_var_bounds(&decl.type_params));
        }
        lowered.is_static = method.is(ACC_STATIC);
        lowered.is_varargs = method.is(ACC_VARARGS);
        lowered.is_abstract = method.is(ACC_ABSTRACT);
        decl.methods.push(lowered);
    }
}

fn member_link(decl: &TypeDecl) -> Option<(String, String, String)> {
    if decl.is_local {
        return None;
    }
    let outer = decl.outer.as_ref()?;
    Some((outer.clone(), decl.simple.clone(), decl.binary.clone()))
}
