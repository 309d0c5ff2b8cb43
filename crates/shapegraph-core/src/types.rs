use serde::{Deserialize, Serialize};
use std::fmt;

/// Source-level type observed at a field of a memory object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Type {
    Void,
    Int(u16),
    Float,
    Double,
    Pointer,
    Array(Box<Type>, u64),
    Vector(Box<Type>, u32),
    Struct(Vec<Type>),
    Function,
}

impl Type {
    pub fn array(elem: Type, len: u64) -> Self {
        Type::Array(Box::new(elem), len)
    }

    pub fn vector(elem: Type, lanes: u32) -> Self {
        Type::Vector(Box::new(elem), lanes)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer)
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Array(..) | Type::Struct(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Pointer => write!(f, "ptr"),
            Type::Array(elem, len) => write!(f, "[{} x {}]", len, elem),
            Type::Vector(elem, lanes) => write!(f, "<{} x {}>", lanes, elem),
            Type::Struct(fields) => {
                write!(f, "{{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, " }}")
            }
            Type::Function => write!(f, "fn"),
        }
    }
}

/// Byte sizes used when a field's type grows a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLayout {
    pub pointer_size: u32,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self { pointer_size: 8 }
    }
}

impl DataLayout {
    /// Number of bytes a store of `ty` may overwrite.
    pub fn store_size(&self, ty: &Type) -> u32 {
        match ty {
            Type::Void | Type::Function => 0,
            Type::Int(bits) => (*bits as u32 + 7) / 8,
            Type::Float => 4,
            Type::Double => 8,
            Type::Pointer => self.pointer_size,
            Type::Array(elem, len) => {
                let total = self.store_size(elem) as u64 * *len;
                u32::try_from(total).unwrap_or(u32::MAX)
            }
            Type::Vector(elem, lanes) => self.store_size(elem).saturating_mul(*lanes),
            Type::Struct(fields) => fields
                .iter()
                .fold(0u32, |acc, field| acc.saturating_add(self.store_size(field))),
        }
    }
}
