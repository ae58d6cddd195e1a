//! Per-frame operand stack.

use stackvm_common::{Address, Value};
use thiserror::Error;

/// Errors from typed stack access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("stack underflow")]
    Underflow,
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: Value,
    },
}

/// Growable LIFO of values belonging to one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperandStack {
    values: Vec<Value>,
}

impl OperandStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn pop(&mut self) -> Result<Value, StackError> {
        self.values.pop().ok_or(StackError::Underflow)
    }

    /// Pop a value that must be an integer.
    ///
    /// On a type mismatch the offending value stays popped; the interpreter
    /// stops anyway.
    pub fn pop_int(&mut self) -> Result<i32, StackError> {
        match self.pop()? {
            Value::Int(n) => Ok(n),
            found => Err(StackError::TypeMismatch {
                expected: "int",
                found,
            }),
        }
    }

    /// Pop a value that must be a reference (possibly null).
    pub fn pop_ref(&mut self) -> Result<Option<Address>, StackError> {
        match self.pop()? {
            Value::Ref(r) => Ok(r),
            found => Err(StackError::TypeMismatch {
                expected: "reference",
                found,
            }),
        }
    }

    pub fn peek(&self) -> Option<&Value> {
        self.values.last()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values bottom to top.
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_is_lifo() {
        let mut stack = OperandStack::new();
        stack.push(Value::Int(1));
        stack.push(Value::Int(2));
        assert_eq!(stack.peek(), Some(&Value::Int(2)));
        assert_eq!(stack.pop(), Ok(Value::Int(2)));
        assert_eq!(stack.pop(), Ok(Value::Int(1)));
        assert!(stack.is_empty());
    }

    #[test]
    fn pop_empty_underflows() {
        let mut stack = OperandStack::new();
        assert_eq!(stack.pop(), Err(StackError::Underflow));
        assert_eq!(stack.pop_int(), Err(StackError::Underflow));
        assert_eq!(stack.pop_ref(), Err(StackError::Underflow));
    }

    #[test]
    fn typed_pops_reject_wrong_kind() {
        let mut stack = OperandStack::new();
        stack.push(Value::NULL);
        assert_eq!(
            stack.pop_int(),
            Err(StackError::TypeMismatch {
                expected: "int",
                found: Value::NULL
            })
        );

        stack.push(Value::Int(7));
        assert!(matches!(
            stack.pop_ref(),
            Err(StackError::TypeMismatch { expected: "reference", .. })
        ));
    }

    #[test]
    fn pop_ref_accepts_null() {
        let mut stack = OperandStack::new();
        stack.push(Value::NULL);
        assert_eq!(stack.pop_ref(), Ok(None));
    }
}
