//! Types of IR values.

use std::fmt;

/// Type of an IR value. Pointers are opaque; struct and union types are
/// referenced by name and defined per module.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// No value (result type of stores, void calls).
    Void,
    /// Integer of the given bit width.
    Int(u32),
    /// Floating point of the given bit width (32 or 64).
    Float(u32),
    /// Opaque pointer.
    Ptr,
    /// Fixed-length array.
    Array { elem: Box<Type>, len: u64 },
    /// Named struct or union defined in the owning module.
    Struct(String),
}

impl Type {
    /// Create an array type.
    pub fn array(elem: Type, len: u64) -> Self {
        Self::Array {
            elem: Box::new(elem),
            len,
        }
    }

    /// Create a named struct reference.
    pub fn named(name: &str) -> Self {
        Self::Struct(name.to_string())
    }

    /// Check if this is an integer type.
    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// Get the integer bit width, if any.
    pub const fn int_bits(&self) -> Option<u32> {
        match self {
            Self::Int(bits) => Some(*bits),
            _ => None,
        }
    }

    /// Get the struct name, if this is a named struct reference.
    pub fn struct_name(&self) -> Option<&str> {
        match self {
            Self::Struct(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Int(bits) => write!(f, "i{bits}"),
            Self::Float(bits) => write!(f, "f{bits}"),
            Self::Ptr => write!(f, "ptr"),
            Self::Array { elem, len } => write!(f, "[{len} x {elem}]"),
            Self::Struct(name) => write!(f, "%{name}"),
        }
    }
}

/// Definition of a named struct or union type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<Type>,
    /// Unions overlay all fields at offset zero.
    pub is_union: bool,
    /// Packed structs have no inter-field padding.
    pub is_packed: bool,
}

impl StructDef {
    /// Create a struct definition.
    pub fn new(name: &str, fields: Vec<Type>) -> Self {
        Self {
            name: name.to_string(),
            fields,
            is_union: false,
            is_packed: false,
        }
    }

    /// Create a union definition.
    pub fn union(name: &str, fields: Vec<Type>) -> Self {
        Self {
            name: name.to_string(),
            fields,
            is_union: true,
            is_packed: false,
        }
    }

    /// Check whether `ty` is one of the member field types.
    pub fn has_member(&self, ty: &Type) -> bool {
        self.fields.iter().any(|f| f == ty)
    }
}
