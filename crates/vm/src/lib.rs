//! stackvm virtual machine: executes C0-style bytecode programs.
//!
//! The VM is a stack-based machine with:
//! - One operand stack and one set of local slots per function activation
//! - An explicit call stack of suspended frames
//! - A bounds-checked heap of blocks and arrays that is never collected
//! - Host-supplied native functions
//!
//! # Usage
//!
//! ```
//! use stackvm_common::{Instruction, Opcode, Program};
//! use stackvm_vm::{run, NativeTable};
//!
//! let mut code = Vec::new();
//! Instruction::new(Opcode::Bipush, 20).encode(&mut code);
//! Instruction::new(Opcode::Bipush, 22).encode(&mut code);
//! Instruction::bare(Opcode::Iadd).encode(&mut code);
//! Instruction::bare(Opcode::Return).encode(&mut code);
//!
//! let program = Program::from_code(0, code);
//! assert_eq!(run(&program, NativeTable::new()), Ok(42));
//! ```

pub mod error;
pub mod execute;
pub mod frame;
pub mod heap;
pub mod machine;
pub mod native;
pub mod stack;

pub use error::{ErrorKind, Location, RuntimeError};
pub use heap::{Heap, HeapError};
pub use machine::{Step, Vm, VmConfig};
pub use native::{NativeError, NativeFn, NativeTable};

use stackvm_common::Program;

/// Execute a program with the default limits and return the entry
/// function's result.
///
/// # Errors
///
/// Returns [`RuntimeError`] if execution fails (division by zero, null
/// dereference, failed assertion, etc.).
pub fn run(program: &Program, natives: NativeTable) -> Result<i32, RuntimeError> {
    run_with_config(program, natives, VmConfig::default())
}

/// Execute a program with explicit limits.
pub fn run_with_config(
    program: &Program,
    natives: NativeTable,
    config: VmConfig,
) -> Result<i32, RuntimeError> {
    let mut vm = Vm::new(program, natives, config);
    vm.execute()
}
