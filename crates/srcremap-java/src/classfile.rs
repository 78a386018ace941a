//! Minimal JVM class file reader.
//!
//! Only what member lookup needs is decoded: the constant pool (to reach
//! names), access flags, this/super class, interfaces, fields and methods
//! with their descriptors, the `InnerClasses` attribute for nesting and the
//! `Signature` attributes holding generic types. Code and every other
//! attribute are skipped.

use thiserror::Error;

pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_BRIDGE: u16 = 0x0040;
pub const ACC_VARARGS: u16 = 0x0080;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;

const MAGIC: u32 = 0xCAFE_BABE;

/// Errors decoding a class file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassFileError {
    #[error("not a class file (bad magic)")]
    BadMagic,

    #[error("class file truncated at byte {offset}")]
    Truncated { offset: usize },

    #[error("unknown constant pool tag {tag} at entry {index}")]
    BadTag { tag: u8, index: usize },

    #[error("constant pool entry {index} is missing or has the wrong type")]
    BadConstant { index: usize },
}

/// A field or method as stored in the class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
}

impl MemberInfo {
    pub fn is(&self, flag: u16) -> bool {
        self.access & flag != 0
    }
}

/// One `InnerClasses` entry. Names are binary names with dots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassEntry {
    pub inner: String,
    pub outer: Option<String>,
    pub simple_name: Option<String>,
    pub access: u16,
}

/// Decoded class. Names are binary names with dots (`a.b.Outer$Inner`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    pub access: u16,
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub inner_classes: Vec<InnerClassEntry>,
    pub signature: Option<String>,
}

impl ClassInfo {
    pub fn is(&self, flag: u16) -> bool {
        self.access & flag != 0
    }
}

#[derive(Debug, Clone)]
enum Constant {
    Unused,
    Utf8(String),
    Class(u16),
    Other,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ClassFileError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(ClassFileError::Truncated { offset: self.pos })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u1(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.take(1)?[0])
    }

    fn u2(&mut self) -> Result<u16, ClassFileError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u4(&mut self) -> Result<u32, ClassFileError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

struct ConstantPool(Vec<Constant>);

impl ConstantPool {
    fn read(cursor: &mut Cursor<'_>) -> Result<Self, ClassFileError> {
        let count = cursor.u2()? as usize;
        let mut entries = vec![Constant::Unused; count.max(1)];
        let mut index = 1;
        while index < count {
            let tag = cursor.u1()?;
            let mut width = 1;
            entries[index] = match tag {
                1 => {
                    let len = cursor.u2()? as usize;
                    Constant::Utf8(String::from_utf8_lossy(cursor.take(len)?).into_owned())
                }
                7 => Constant::Class(cursor.u2()?),
                3 | 4 => {
                    cursor.take(4)?;
                    Constant::Other
                }
                5 | 6 => {
                    cursor.take(8)?;
                    width = 2;
                    Constant::Other
                }
                8 | 16 | 19 | 20 => {
                    cursor.take(2)?;
                    Constant::Other
                }
                9..=12 | 17 | 18 => {
                    cursor.take(4)?;
                    Constant::Other
                }
                15 => {
                    cursor.take(3)?;
                    Constant::Other
                }
                tag => return Err(ClassFileError::BadTag { tag, index }),
            };
            index += width;
        }
        Ok(ConstantPool(entries))
    }

    fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.0.get(index as usize) {
            Some(Constant::Utf8(s)) => Ok(s),
            _ => Err(ClassFileError::BadConstant {
                index: index as usize,
            }),
        }
    }

    /// Class name at `index`, converted to dotted binary form.
    fn class_name(&self, index: u16) -> Result<String, ClassFileError> {
        match self.0.get(index as usize) {
            Some(Constant::Class(name)) => Ok(self.utf8(*name)?.replace('/', ".")),
            _ => Err(ClassFileError::BadConstant {
                index: index as usize,
            }),
        }
    }

    fn optional_class(&self, index: u16) -> Result<Option<String>, ClassFileError> {
        if index == 0 {
            Ok(None)
        } else {
            self.class_name(index).map(Some)
        }
    }
}

/// Decode a class file.
pub fn parse_class(bytes: &[u8]) -> Result<ClassInfo, ClassFileError> {
    let mut cursor = Cursor { bytes, pos: 0 };
    if cursor.u4()? != MAGIC {
        return Err(ClassFileError::BadMagic);
    }
    cursor.u2()?; // minor
    cursor.u2()?; // major

    let pool = ConstantPool::read(&mut cursor)?;
    let access = cursor.u2()?;
    let name = pool.class_name(cursor.u2()?)?;
    let super_name = pool.optional_class(cursor.u2()?)?;

    let interface_count = cursor.u2()?;
    let mut interfaces = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        interfaces.push(pool.class_name(cursor.u2()?)?);
    }

    let fields = read_members(&mut cursor, &pool)?;
    let methods = read_members(&mut cursor, &pool)?;

    let mut inner_classes = Vec::new();
    let mut signature = None;
    let attribute_count = cursor.u2()?;
    for _ in 0..attribute_count {
        let attr_name = pool.utf8(cursor.u2()?)?.to_string();
        let len = cursor.u4()? as usize;
        if attr_name == "Signature" {
            signature = Some(pool.utf8(cursor.u2()?)?.to_string());
            continue;
        }
        if attr_name != "InnerClasses" {
            cursor.take(len)?;
            continue;
        }
        let count = cursor.u2()?;
        for _ in 0..count {
            let inner = pool.class_name(cursor.u2()?)?;
            let outer = pool.optional_class(cursor.u2()?)?;
            let simple_index = cursor.u2()?;
            let simple_name = if simple_index == 0 {
                None
            } else {
                Some(pool.utf8(simple_index)?.to_string())
            };
            let access = cursor.u2()?;
            inner_classes.push(InnerClassEntry {
                inner,
                outer,
                simple_name,
                access,
            });
        }
    }

    Ok(ClassInfo {
        access,
        name,
        super_name,
        interfaces,
        fields,
        methods,
        inner_classes,
        signature,
    })
}

fn read_members(
    cursor: &mut Cursor<'_>,
    pool: &ConstantPool,
) -> Result<Vec<MemberInfo>, ClassFileError> {
    let count = cursor.u2()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access = cursor.u2()?;
        let name = pool.utf8(cursor.u2()?)?.to_string();
        let descriptor = pool.utf8(cursor.u2()?)?.to_string();
        let mut signature = None;
        let attributes = cursor.u2()?;
        for _ in 0..attributes {
            let attr_name = pool.utf8(cursor.u2()?)?;
            let len = cursor.u4()? as usize;
            if attr_name == "Signature" {
                signature = Some(pool.utf8(cursor.u2()?)?.to_string());
            } else {
                cursor.take(len)?;
            }
        }
        members.push(MemberInfo {
            access,
            name,
            descriptor,
            signature,
        });
    }
    Ok(members)
}

// ============================================================================
// Test Support
// ============================================================================

/// Writes minimal class files. Used by tests in this crate and its `tests/`.
#[doc(hidden)]
pub mod testing {
    use super::*;

    /// A class to encode: names use slashes, as in the class file.
    #[derive(Debug, Clone, Default)]
    pub struct ClassSpec<'a> {
        pub access: u16,
        pub name: &'a str,
        pub super_name: Option<&'a str>,
        pub interfaces: Vec<&'a str>,
        pub fields: Vec<(u16, &'a str, &'a str)>,
        pub methods: Vec<(u16, &'a str, &'a str)>,
        /// `(inner, outer, simple name, flags)`
        pub inner_classes: Vec<(&'a str, &'a str, &'a str, u16)>,
        /// `(member name, signature)`; an empty name is the class itself.
        pub signatures: Vec<(&'a str, &'a str)>,
    }

    #[derive(Default)]
    struct PoolBuilder {
        bytes: Vec<u8>,
        count: u16,
        utf8: Vec<(String, u16)>,
        classes: Vec<(String, u16)>,
    }

    impl PoolBuilder {
        fn utf8(&mut self, s: &str) -> u16 {
            if let Some((_, i)) = self.utf8.iter().find(|(v, _)| v == s) {
                return *i;
            }
            self.count += 1;
            let index = self.count;
            self.bytes.push(1);
            self.bytes.extend((s.len() as u16).to_be_bytes());
            self.bytes.extend(s.as_bytes());
            self.utf8.push((s.to_string(), index));
            index
        }

        fn class(&mut self, name: &str) -> u16 {
            if let Some((_, i)) = self.classes.iter().find(|(v, _)| v == name) {
                return *i;
            }
            let name_index = self.utf8(name);
            self.count += 1;
            let index = self.count;
            self.bytes.push(7);
            self.bytes.extend(name_index.to_be_bytes());
            self.classes.push((name.to_string(), index));
            index
        }
    }

    fn signature_attribute(pool: &mut PoolBuilder, body: &mut Vec<u8>, signature: &str) {
        body.extend(pool.utf8("Signature").to_be_bytes());
        body.extend(2u32.to_be_bytes());
        body.extend(pool.utf8(signature).to_be_bytes());
    }

    /// Encode `class` as class file bytes.
    pub fn build_class(class: &ClassSpec<'_>) -> Vec<u8> {
        let signature_of = |member: &str| {
            class
                .signatures
                .iter()
                .find(|(name, _)| *name == member)
                .map(|(_, sig)| *sig)
        };
        let mut pool = PoolBuilder::default();
        let mut body = Vec::new();

        body.extend(class.access.to_be_bytes());
        body.extend(pool.class(class.name).to_be_bytes());
        let super_index = class.super_name.map(|s| pool.class(s)).unwrap_or(0);
        body.extend(super_index.to_be_bytes());

        body.extend((class.interfaces.len() as u16).to_be_bytes());
        for iface in &class.interfaces {
            body.extend(pool.class(iface).to_be_bytes());
        }

        for members in [&class.fields, &class.methods] {
            body.extend((members.len() as u16).to_be_bytes());
            for (access, name, desc) in members.iter() {
                body.extend(access.to_be_bytes());
                body.extend(pool.utf8(name).to_be_bytes());
                body.extend(pool.utf8(desc).to_be_bytes());
                match signature_of(name) {
                    Some(sig) => {
                        body.extend(1u16.to_be_bytes());
                        signature_attribute(&mut pool, &mut body, sig);
                    }
                    None => body.extend(0u16.to_be_bytes()),
                }
            }
        }

        let class_signature = signature_of("");
        let attributes = u16::from(class_signature.is_some()) + u16::from(!class.inner_classes.is_empty());
        body.extend(attributes.to_be_bytes());
        if let Some(sig) = class_signature {
            signature_attribute(&mut pool, &mut body, sig);
        }
        if !class.inner_classes.is_empty() {
            body.extend(pool.utf8("InnerClasses").to_be_bytes());
            let mut attr = Vec::new();
            attr.extend((class.inner_classes.len() as u16).to_be_bytes());
            for (inner, outer, simple, flags) in &class.inner_classes {
                attr.extend(pool.class(inner).to_be_bytes());
                attr.extend(pool.class(outer).to_be_bytes());
                attr.extend(pool.utf8(simple).to_be_bytes());
                attr.extend(flags.to_be_bytes());
            }
            body.extend((attr.len() as u32).to_be_bytes());
            body.extend(attr);
        }

        let mut out = Vec::new();
        out.extend(MAGIC.to_be_bytes());
        out.extend(0u16.to_be_bytes());
        out.extend(52u16.to_be_bytes());
        out.extend((pool.count + 1).to_be_bytes());
        out.extend(pool.bytes);
        out.extend(body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{build_class, ClassSpec};
    use super::*;

    #[test]
    fn decodes_members_and_nesting() {
        let bytes = build_class(&ClassSpec {
            access: 0x0021,
            name: "com/lib/Base",
            super_name: Some("java/lang/Object"),
            interfaces: vec!["java/lang/Runnable"],
            fields: vec![(0x0004, "count", "I")],
            methods: vec![
                (0x0001, "<init>", "()V"),
                (0x0001, "run", "()V"),
                (ACC_STATIC | 0x0001, "of", "(Ljava/lang/String;)Lcom/lib/Base;"),
            ],
            inner_classes: vec![("com/lib/Base$Node", "com/lib/Base", "Node", ACC_STATIC)],
            ..ClassSpec::default()
        });

        let class = parse_class(&bytes).unwrap();
        assert_eq!(class.name, "com.lib.Base");
        assert_eq!(class.super_name.as_deref(), Some("java.lang.Object"));
        assert_eq!(class.interfaces, vec!["java.lang.Runnable"]);
        assert_eq!(class.fields[0].name, "count");
        assert_eq!(class.methods.len(), 3);
        assert!(class.methods[2].is(ACC_STATIC));
        assert_eq!(class.inner_classes[0].inner, "com.lib.Base$Node");
        assert_eq!(class.inner_classes[0].simple_name.as_deref(), Some("Node"));
    }

    #[test]
    fn reads_signature_attributes() {
        let bytes = build_class(&ClassSpec {
            access: 0x0021,
            name: "com/lib/Holder",
            super_name: Some("java/lang/Object"),
            interfaces: vec![],
            fields: vec![(0x0001, "item", "Ljava/lang/Object;"), (0x0001, "count", "I")],
            methods: vec![(0x0001, "get", "()Ljava/lang/Object;")],
            inner_classes: vec![("com/lib/Holder$Part", "com/lib/Holder", "Part", ACC_STATIC)],
            signatures: vec![
                ("", "<T:Ljava/lang/Object;>Ljava/lang/Object;"),
                ("item", "TT;"),
                ("get", "()TT;"),
            ],
        });
        let class = parse_class(&bytes).unwrap();
        assert_eq!(class.signature.as_deref(), Some("<T:Ljava/lang/Object;>Ljava/lang/Object;"));
        assert_eq!(class.fields[0].signature.as_deref(), Some("TT;"));
        assert_eq!(class.fields[1].signature, None);
        assert_eq!(class.methods[0].signature.as_deref(), Some("()TT;"));
        assert_eq!(class.inner_classes.len(), 1);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_class(b"\x00\x01\x02\x03"), Err(ClassFileError::BadMagic));
        assert!(matches!(
            parse_class(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0]),
            Err(ClassFileError::Truncated { .. })
        ));
    }

    #[test]
    fn long_constants_take_two_slots() {
        // Pool: #1 Long (occupies #1 and #2), #3 Utf8 "A", #4 Class #3.
        let mut bytes = Vec::new();
        bytes.extend(MAGIC.to_be_bytes());
        bytes.extend([0, 0, 0, 52]);
        bytes.extend(5u16.to_be_bytes());
        bytes.push(5);
        bytes.extend(7u64.to_be_bytes());
        bytes.push(1);
        bytes.extend(1u16.to_be_bytes());
        bytes.push(b'A');
        bytes.push(7);
        bytes.extend(3u16.to_be_bytes());
        bytes.extend(0x0021u16.to_be_bytes());
        bytes.extend(4u16.to_be_bytes());
        bytes.extend([0u8; 10]);

        let class = parse_class(&bytes).unwrap();
        assert_eq!(class.name, "A");
        assert_eq!(class.super_name, None);
    }
}
