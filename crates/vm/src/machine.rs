//! VM state management: active frame, call stack, heap, natives.

use stackvm_common::{Address, ObjectId, Program, Value};

use crate::error::{Location, RuntimeError};
use crate::frame::Frame;
use crate::heap::{Heap, DEFAULT_MAX_HEAP_BYTES};
use crate::native::NativeTable;

/// Execution limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum number of suspended frames. `None` means unbounded.
    pub max_call_depth: Option<usize>,
    /// Allocation budget for NEW and NEWARRAY, in bytes.
    pub max_heap_bytes: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: None,
            max_heap_bytes: DEFAULT_MAX_HEAP_BYTES,
        }
    }
}

/// Outcome of a single [`Vm::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More instructions remain.
    Continue,
    /// The entry function returned this value.
    Halted(i32),
}

/// The stackvm virtual machine.
pub struct Vm<'a> {
    /// The program being executed.
    pub(crate) program: &'a Program,
    /// Host-supplied natives.
    pub(crate) natives: NativeTable,
    pub(crate) config: VmConfig,
    pub(crate) heap: Heap,
    /// Heap object holding the string pool.
    pub(crate) strings: Option<ObjectId>,
    /// The active frame.
    pub(crate) frame: Frame,
    /// Suspended callers, innermost last.
    pub(crate) call_stack: Vec<Frame>,
    /// Offset of the instruction being executed in the active frame.
    pub(crate) at: usize,
    /// Set once the entry function has returned.
    pub(crate) halted: Option<i32>,
}

impl<'a> Vm<'a> {
    /// Create a VM positioned at the start of the entry function.
    pub fn new(program: &'a Program, natives: NativeTable, config: VmConfig) -> Self {
        let mut heap = Heap::new(config.max_heap_bytes);
        let strings = if program.string_pool.is_empty() {
            None
        } else {
            heap.install_strings(program.string_pool.clone()).ok()
        };
        let num_vars = program.entry().map_or(0, |f| f.num_vars as usize);

        Self {
            program,
            natives,
            config,
            heap,
            strings,
            frame: Frame::new(0, num_vars),
            call_stack: Vec::new(),
            at: 0,
            halted: None,
        }
    }

    /// Where the current instruction is.
    pub fn location(&self) -> Location {
        Location {
            function: self.frame.function,
            pc: self.at,
        }
    }

    /// Operand stack of the active frame, bottom to top.
    pub fn stack(&self) -> &[Value] {
        self.frame.stack.as_slice()
    }

    /// Locals of the active frame.
    pub fn locals(&self) -> &[Value] {
        &self.frame.locals
    }

    /// Number of suspended callers.
    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Give back the native table, e.g. to inspect state captured by natives.
    pub fn into_natives(self) -> NativeTable {
        self.natives
    }

    /// Code of the active function.
    pub(crate) fn code(&self) -> Result<&'a [u8], RuntimeError> {
        self.program
            .functions
            .get(self.frame.function)
            .map(|f| f.code.as_slice())
            .ok_or(RuntimeError::NoEntryFunction)
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.frame.stack.push(value);
    }

    pub(crate) fn pop(&mut self) -> Result<Value, RuntimeError> {
        let at = self.location();
        self.frame
            .stack
            .pop()
            .map_err(|e| RuntimeError::from_stack(at, e))
    }

    pub(crate) fn pop_int(&mut self) -> Result<i32, RuntimeError> {
        let at = self.location();
        self.frame
            .stack
            .pop_int()
            .map_err(|e| RuntimeError::from_stack(at, e))
    }

    pub(crate) fn pop_ref(&mut self) -> Result<Option<Address>, RuntimeError> {
        let at = self.location();
        self.frame
            .stack
            .pop_ref()
            .map_err(|e| RuntimeError::from_stack(at, e))
    }

    /// Resolve a message reference for ATHROW and ASSERT.
    pub(crate) fn message(&self, r: Option<Address>) -> String {
        match self.heap.c_str(r) {
            Ok(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Err(err) => format!("<{err}>"),
        }
    }
}
