//! Activation frames.

use stackvm_common::Value;

use crate::stack::OperandStack;

/// One function activation.
///
/// The active frame is held by the VM directly; suspended callers sit on
/// the call stack with `pc` already pointing past their INVOKESTATIC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Operand stack private to this activation.
    pub stack: OperandStack,
    /// Index of the function in the function pool.
    pub function: usize,
    /// Offset of the next instruction to execute.
    pub pc: usize,
    /// Local slots, arguments first.
    pub locals: Vec<Value>,
}

impl Frame {
    /// A fresh activation of `function` with `num_vars` zeroed locals.
    pub fn new(function: usize, num_vars: usize) -> Self {
        Self {
            stack: OperandStack::new(),
            function,
            pc: 0,
            locals: vec![Value::Int(0); num_vars],
        }
    }
}
