//! Runtime value representation for the stackvm interpreter.
//!
//! Values are what live on operand stacks and in local slots. A value is
//! either a 32-bit integer or a reference; references carry no element
//! type, only the heap object they point into and a byte offset.

use std::fmt;
use std::num::NonZeroU32;

/// Handle of a heap object. Handles start at 1 so that an all-zero
/// encoding can stand for null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(NonZeroU32);

impl ObjectId {
    /// Build a handle from its raw encoding. Returns `None` for 0.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// Raw (non-zero) encoding of this handle.
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// A location inside a heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    /// The object this address points into.
    pub object: ObjectId,
    /// Byte offset from the start of the object's storage.
    pub offset: u32,
}

impl Address {
    /// Address of the first byte of `object`.
    pub fn start(object: ObjectId) -> Self {
        Self { object, offset: 0 }
    }
}

/// Runtime value.
///
/// Equality is identity: two integers are equal when numerically equal,
/// two references when they name the same object and offset, or are both
/// null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    /// Signed 32-bit integer.
    Int(i32),
    /// Reference; `None` is null.
    Ref(Option<Address>),
}

impl Value {
    /// The null reference.
    pub const NULL: Value = Value::Ref(None);

    /// Shorthand for `Value::Ref(Some(addr))`.
    pub fn address(addr: Address) -> Self {
        Value::Ref(Some(addr))
    }

    /// Returns the integer, or `None` if this is a reference.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Ref(_) => None,
        }
    }

    /// Returns the reference (possibly null), or `None` if this is an integer.
    pub fn as_reference(&self) -> Option<Option<Address>> {
        match self {
            Value::Ref(r) => Some(*r),
            Value::Int(_) => None,
        }
    }

    /// Returns true for the null reference.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Ref(None))
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(0)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Ref(None) => write!(f, "null"),
            Value::Ref(Some(addr)) => write!(f, "#{}+{}", addr.object.get(), addr.offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(object: u32, offset: u32) -> Address {
        Address {
            object: ObjectId::new(object).unwrap(),
            offset,
        }
    }

    #[test]
    fn object_id_rejects_zero() {
        assert!(ObjectId::new(0).is_none());
        assert_eq!(ObjectId::new(7).unwrap().get(), 7);
    }

    #[test]
    fn equality_int() {
        assert_eq!(Value::Int(42), Value::Int(42));
        assert_ne!(Value::Int(42), Value::Int(43));
    }

    #[test]
    fn equality_ref_is_identity() {
        assert_eq!(Value::address(addr(1, 4)), Value::address(addr(1, 4)));
        assert_ne!(Value::address(addr(1, 4)), Value::address(addr(1, 8)));
        assert_ne!(Value::address(addr(1, 0)), Value::address(addr(2, 0)));
        assert_eq!(Value::NULL, Value::Ref(None));
        assert_ne!(Value::NULL, Value::address(addr(1, 0)));
    }

    #[test]
    fn default_is_zero() {
        assert_eq!(Value::default(), Value::Int(0));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Int(5).as_int(), Some(5));
        assert_eq!(Value::NULL.as_int(), None);
        assert_eq!(Value::NULL.as_reference(), Some(None));
        assert_eq!(Value::Int(0).as_reference(), None);
        assert!(Value::NULL.is_null());
        assert!(!Value::Int(0).is_null());
    }

    #[test]
    fn display() {
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::NULL.to_string(), "null");
        assert_eq!(Value::address(addr(3, 16)).to_string(), "#3+16");
    }
}
