//! JVM field and method descriptors.
//!
//! Signatures join the range map with the rename table, so member identity is
//! expressed the way compiled classes express it: `(I[Ljava/lang/String;)V`.
//! Class names inside [`FieldType::Object`] are kept as binary names with dots
//! (`java.lang.String`, `a.b.Outer$Inner`) and converted to the slash form only
//! when a descriptor is rendered.
//!
//! ## Grammar
//!
//! ```text
//! <field>  := "B" | "C" | "D" | "F" | "I" | "J" | "S" | "Z"
//!           | "L" <internal-name> ";" | "[" <field>
//! <method> := "(" <field>* ")" (<field> | "V")
//! ```

use std::fmt;

use thiserror::Error;
use winnow::combinator::{alt, delimited, repeat};
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::token::{any, take_till};
use winnow::ModalResult;

/// Error type for descriptor parsing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid descriptor '{input}'")]
pub struct DescriptorError {
    pub input: String,
}

/// An erased JVM value type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    /// Reference to a class, by binary name with dots.
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    /// `java.lang.Object`, the erasure of unbounded type variables.
    pub fn object() -> Self {
        FieldType::Object("java.lang.Object".to_string())
    }

    /// `java.lang.String`, the type of string literals.
    pub fn string() -> Self {
        FieldType::Object("java.lang.String".to_string())
    }

    /// Wrap `self` in `dims` array dimensions.
    pub fn with_dims(self, dims: usize) -> Self {
        (0..dims).fold(self, |ty, _| FieldType::Array(Box::new(ty)))
    }

    /// Parse a primitive keyword as written in source (`int`, `boolean`, ...).
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "byte" => FieldType::Byte,
            "char" => FieldType::Char,
            "double" => FieldType::Double,
            "float" => FieldType::Float,
            "int" => FieldType::Int,
            "long" => FieldType::Long,
            "short" => FieldType::Short,
            "boolean" => FieldType::Boolean,
            _ => return None,
        })
    }

    /// True for the eight primitive types.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, FieldType::Object(_) | FieldType::Array(_))
    }

    /// True for primitive numeric types (everything but `boolean`).
    pub fn is_numeric(&self) -> bool {
        self.is_primitive() && *self != FieldType::Boolean
    }

    /// Binary name of the wrapper class for a primitive.
    pub fn boxed(&self) -> Option<&'static str> {
        Some(match self {
            FieldType::Byte => "java.lang.Byte",
            FieldType::Char => "java.lang.Character",
            FieldType::Double => "java.lang.Double",
            FieldType::Float => "java.lang.Float",
            FieldType::Int => "java.lang.Integer",
            FieldType::Long => "java.lang.Long",
            FieldType::Short => "java.lang.Short",
            FieldType::Boolean => "java.lang.Boolean",
            _ => return None,
        })
    }

    /// Primitive type wrapped by a boxed class.
    pub fn unboxed(&self) -> Option<FieldType> {
        let FieldType::Object(name) = self else {
            return None;
        };
        Some(match name.as_str() {
            "java.lang.Byte" => FieldType::Byte,
            "java.lang.Character" => FieldType::Char,
            "java.lang.Double" => FieldType::Double,
            "java.lang.Float" => FieldType::Float,
            "java.lang.Integer" => FieldType::Int,
            "java.lang.Long" => FieldType::Long,
            "java.lang.Short" => FieldType::Short,
            "java.lang.Boolean" => FieldType::Boolean,
            _ => return None,
        })
    }

    /// Whether a primitive widening conversion exists from `self` to `to`.
    pub fn widens_to(&self, to: &FieldType) -> bool {
        use FieldType::*;
        if self == to {
            return true;
        }
        matches!(
            (self, to),
            (Byte, Short | Int | Long | Float | Double)
                | (Short, Int | Long | Float | Double)
                | (Char, Int | Long | Float | Double)
                | (Int, Long | Float | Double)
                | (Long, Float | Double)
                | (Float, Double)
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Byte => f.write_str("B"),
            FieldType::Char => f.write_str("C"),
            FieldType::Double => f.write_str("D"),
            FieldType::Float => f.write_str("F"),
            FieldType::Int => f.write_str("I"),
            FieldType::Long => f.write_str("J"),
            FieldType::Short => f.write_str("S"),
            FieldType::Boolean => f.write_str("Z"),
            FieldType::Object(name) => write!(f, "L{};", name.replace('.', "/")),
            FieldType::Array(inner) => write!(f, "[{}", inner),
        }
    }
}

/// A method descriptor: parameter types and return type (`None` for void).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub params: Vec<FieldType>,
    pub ret: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn new(params: Vec<FieldType>, ret: Option<FieldType>) -> Self {
        MethodDescriptor { params, ret }
    }

    /// Descriptor of the parameter list only, e.g. `(ILjava/lang/String;)`.
    ///
    /// Two methods with equal parameter descriptors override each other
    /// regardless of (covariant) return types.
    pub fn params_descriptor(&self) -> String {
        let mut out = String::from("(");
        for p in &self.params {
            out.push_str(&p.to_string());
        }
        out.push(')');
        out
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.params_descriptor())?;
        match &self.ret {
            Some(ret) => write!(f, "{}", ret),
            None => f.write_str("V"),
        }
    }
}

/// Parse a field descriptor such as `[Ljava/lang/String;`.
pub fn parse_field_descriptor(input: &str) -> Result<FieldType, DescriptorError> {
    field_type.parse(input).map_err(|_| DescriptorError {
        input: input.to_string(),
    })
}

/// Parse a method descriptor such as `(IJ)Ljava/lang/Object;`.
pub fn parse_method_descriptor(input: &str) -> Result<MethodDescriptor, DescriptorError> {
    method_descriptor.parse(input).map_err(|_| DescriptorError {
        input: input.to_string(),
    })
}

// ============================================================================
// Parser implementation using winnow
// ============================================================================

fn field_type(input: &mut &str) -> ModalResult<FieldType> {
    let tag = any.parse_next(input)?;
    match tag {
        'B' => Ok(FieldType::Byte),
        'C' => Ok(FieldType::Char),
        'D' => Ok(FieldType::Double),
        'F' => Ok(FieldType::Float),
        'I' => Ok(FieldType::Int),
        'J' => Ok(FieldType::Long),
        'S' => Ok(FieldType::Short),
        'Z' => Ok(FieldType::Boolean),
        'L' => {
            let name: &str = take_till(1.., |c| c == ';').parse_next(input)?;
            ';'.parse_next(input)?;
            Ok(FieldType::Object(name.replace('/', ".")))
        }
        '[' => Ok(FieldType::Array(Box::new(field_type(input)?))),
        _ => Err(ErrMode::from_input(input)),
    }
}

fn return_type(input: &mut &str) -> ModalResult<Option<FieldType>> {
    alt(('V'.value(None), field_type.map(Some))).parse_next(input)
}

fn method_descriptor(input: &mut &str) -> ModalResult<MethodDescriptor> {
    let params: Vec<FieldType> = delimited('(', repeat(0.., field_type), ')').parse_next(input)?;
    let ret = return_type(input)?;
    Ok(MethodDescriptor { params, ret })
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
        fn parses_primitive_method() {
            let desc = parse_method_descriptor("(I)I").unwrap();
            assert_eq!(desc.params, vec![FieldType::Int]);
            assert_eq!(desc.ret, Some(FieldType::Int));
        }

        #[test]
        fn parses_objects_and_arrays() {
            let err = parse_method_descriptor("(Ja/b/C;)V").unwrap_err();
            assert_eq!(err.input, "(Ja/b/C;)V");

            let desc = parse_method_descriptor("([Ljava/lang/String;JLa/b/C$D;)V").unwrap();
            assert_eq!(
                desc.params,
                vec![
                    FieldType::Array(Box::new(FieldType::string())),
                    FieldType::Long,
                    FieldType::Object("a.b.C$D".to_string()),
                ]
            );
            assert_eq!(desc.ret, None);
        }

        #[test]
        fn rejects_trailing_garbage() {
            assert!(parse_method_descriptor("(I)Ix").is_err());
            assert!(parse_field_descriptor("Q").is_err());
            assert!(parse_field_descriptor("Ljava/lang/String").is_err());
        }
    }

    mod rendering {
        use super::*;

        #[test]
        fn renders_slash_form() {
            let desc = MethodDescriptor::new(
                vec![FieldType::Object("a.b.C$D".to_string()).with_dims(2)],
                Some(FieldType::Boolean),
            );
            assert_eq!(desc.to_string(), "([[La/b/C$D;)Z");
            assert_eq!(desc.params_descriptor(), "([[La/b/C$D;)");
        }

        #[test]
        fn widening_rules() {
            assert!(FieldType::Int.widens_to(&FieldType::Long));
            assert!(FieldType::Char.widens_to(&FieldType::Int));
            assert!(!FieldType::Long.widens_to(&FieldType::Int));
            assert!(!FieldType::Boolean.widens_to(&FieldType::Int));
        }

        #[test]
        fn boxing_round_trip() {
            assert_eq!(FieldType::Int.boxed(), Some("java.lang.Integer"));
            assert_eq!(
                FieldType::Object("java.lang.Integer".to_string()).unboxed(),
                Some(FieldType::Int)
            );
            assert_eq!(FieldType::string().unboxed(), None);
        }
    }
}
