//! Runtime errors for the stackvm interpreter.
//!
//! Every error is fatal: the interpreter stops at the instruction that
//! detected it. Each variant records where that instruction is, and
//! [`RuntimeError::kind`] sorts variants into the classes a driver reports.

use std::fmt;

use stackvm_common::{DecodeError, Value};
use thiserror::Error;

use crate::heap::HeapError;
use crate::stack::StackError;

/// Position of the faulting instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// Index of the executing function in the function pool.
    pub function: usize,
    /// Offset of the instruction's opcode byte in that function's code.
    pub pc: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function {} pc {}", self.function, self.pc)
    }
}

/// Failure classes, used for diagnostics and process exit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Division by zero, division overflow, shift out of range.
    Arithmetic,
    /// Null dereference or access outside a heap object.
    Memory,
    /// ATHROW, a failing native, or an array index out of bounds.
    User,
    /// ASSERT on a zero condition.
    Assertion,
    /// Opcode byte outside the supported set.
    InvalidOpcode,
    /// Bytecode that breaks an invariant a verifier would have checked.
    Malformed,
    /// A configured limit was hit.
    Resource,
}

impl ErrorKind {
    /// Process exit status for this class of failure.
    ///
    /// Arithmetic, memory, assertion and opcode failures use the
    /// conventional `128 + signal` statuses of SIGFPE, SIGSEGV, SIGABRT and
    /// SIGILL.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Arithmetic => 136,
            ErrorKind::Memory => 139,
            ErrorKind::Assertion => 134,
            ErrorKind::InvalidOpcode => 132,
            ErrorKind::User => 1,
            ErrorKind::Malformed | ErrorKind::Resource => 70,
        }
    }
}

/// Errors that stop execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// IDIV or IREM with a zero divisor.
    #[error("division by zero at {at}")]
    DivisionByZero { at: Location },

    /// IDIV or IREM of the minimum integer by -1.
    #[error("division overflow at {at}")]
    DivisionOverflow { at: Location },

    /// ISHL or ISHR with a shift amount outside [0, 32).
    #[error("shift by {amount} out of range at {at}")]
    InvalidShift { at: Location, amount: i32 },

    /// A heap access failed (null reference, out of bounds, ...).
    #[error("memory error at {at}: {source}")]
    Memory {
        at: Location,
        #[source]
        source: HeapError,
    },

    /// AADDS with an index outside the array.
    #[error("index {index} not valid for array of length {length} at {at}")]
    IndexOutOfBounds {
        at: Location,
        index: i32,
        length: u32,
    },

    /// ATHROW.
    #[error("user error at {at}: {message}")]
    UserError { at: Location, message: String },

    /// ASSERT observed a zero condition.
    #[error("assertion failed at {at}: {message}")]
    AssertionFailed { at: Location, message: String },

    /// A native function reported failure.
    #[error("native '{name}' failed at {at}: {message}")]
    Native {
        at: Location,
        name: String,
        message: String,
    },

    /// The instruction at `at` could not be decoded.
    #[error("{source} at {at}")]
    Decode {
        at: Location,
        #[source]
        source: DecodeError,
    },

    /// Pop from an empty operand stack.
    #[error("stack underflow at {at}")]
    StackUnderflow { at: Location },

    /// An integer was found where a reference was required, or vice versa.
    #[error("expected {expected} on the stack, found {found} at {at}")]
    TypeMismatch {
        at: Location,
        expected: &'static str,
        found: Value,
    },

    /// RETURN left values beneath the return value.
    #[error("RETURN with {remaining} extra value(s) on the stack at {at}")]
    ReturnWithNonEmptyStack { at: Location, remaining: usize },

    /// VLOAD or VSTORE outside the frame's locals.
    #[error("local {index} out of range ({count} locals) at {at}")]
    LocalOutOfRange {
        at: Location,
        index: usize,
        count: usize,
    },

    /// A pool index outside its pool.
    #[error("{pool} index {index} out of range ({len} entries) at {at}")]
    PoolIndex {
        at: Location,
        pool: &'static str,
        index: u16,
        len: usize,
    },

    /// A branch whose target lies outside the function's code.
    #[error("branch offset {offset} leaves the function at {at}")]
    BadBranchTarget { at: Location, offset: i16 },

    /// INVOKENATIVE named a table index the host did not register.
    #[error("no native function registered at table index {table_index} (at {at})")]
    UnknownNative { at: Location, table_index: u16 },

    /// The program has no entry function.
    #[error("program has no functions")]
    NoEntryFunction,

    /// Call depth reached the configured limit.
    #[error("call depth limit {limit} exceeded at {at}")]
    CallDepthExceeded { at: Location, limit: usize },

    /// An allocation would exceed the configured heap budget.
    #[error("out of memory at {at}: {requested} byte(s) requested, {available} available")]
    OutOfMemory {
        at: Location,
        requested: usize,
        available: usize,
    },
}

impl RuntimeError {
    /// Wrap a heap failure observed at `at`.
    ///
    /// Out-of-range array indices are user errors and exhausted budgets are
    /// resource errors; everything else is a memory error.
    pub fn from_heap(at: Location, err: HeapError) -> Self {
        match err {
            HeapError::IndexOutOfRange { index, count } => RuntimeError::IndexOutOfBounds {
                at,
                index,
                length: count,
            },
            HeapError::OutOfMemory {
                requested,
                available,
            } => RuntimeError::OutOfMemory {
                at,
                requested,
                available,
            },
            source => RuntimeError::Memory { at, source },
        }
    }

    /// Wrap a typed-stack failure observed at `at`.
    pub fn from_stack(at: Location, err: StackError) -> Self {
        match err {
            StackError::Underflow => RuntimeError::StackUnderflow { at },
            StackError::TypeMismatch { expected, found } => RuntimeError::TypeMismatch {
                at,
                expected,
                found,
            },
        }
    }

    /// Failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::DivisionByZero { .. }
            | RuntimeError::DivisionOverflow { .. }
            | RuntimeError::InvalidShift { .. } => ErrorKind::Arithmetic,

            RuntimeError::Memory { .. } => ErrorKind::Memory,

            RuntimeError::IndexOutOfBounds { .. }
            | RuntimeError::UserError { .. }
            | RuntimeError::Native { .. } => ErrorKind::User,

            RuntimeError::AssertionFailed { .. } => ErrorKind::Assertion,

            RuntimeError::Decode { source, .. } => match source {
                DecodeError::InvalidOpcode(_) | DecodeError::UnsupportedOpcode { .. } => {
                    ErrorKind::InvalidOpcode
                }
                DecodeError::Truncated { .. } | DecodeError::EndOfCode { .. } => {
                    ErrorKind::Malformed
                }
            },

            RuntimeError::StackUnderflow { .. }
            | RuntimeError::TypeMismatch { .. }
            | RuntimeError::ReturnWithNonEmptyStack { .. }
            | RuntimeError::LocalOutOfRange { .. }
            | RuntimeError::PoolIndex { .. }
            | RuntimeError::BadBranchTarget { .. }
            | RuntimeError::UnknownNative { .. }
            | RuntimeError::NoEntryFunction => ErrorKind::Malformed,

            RuntimeError::CallDepthExceeded { .. } | RuntimeError::OutOfMemory { .. } => {
                ErrorKind::Resource
            }
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}
