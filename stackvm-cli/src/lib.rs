//! stackvm command-line driver: run, assemble and disassemble programs.
//!
//! Exit codes:
//! - the program's result, when it runs to completion
//! - 2: unreadable input, `.bc0` load error, or assembly error
//! - otherwise the runtime error's status (see [`stackvm_vm::ErrorKind`])

pub mod commands;
pub mod natives;

pub use commands::CliError;
pub use natives::default_natives;
