//! CLI command implementations.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use stackvm_assembler::AsmError;
use stackvm_common::{bc0, LoadError, Program};
use stackvm_vm::{NativeTable, RuntimeError, VmConfig};
use thiserror::Error;
use tracing::{debug, info};

/// Exit status for unreadable, malformed or unassemblable input.
pub const INPUT_ERROR: i32 = 2;

/// Errors reported by the command-line driver.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot write '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("{}: {source}", path.display())]
    Load { path: PathBuf, source: LoadError },

    #[error("{}: {source}", path.display())]
    Assemble { path: PathBuf, source: AsmError },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl CliError {
    /// Process exit status: the runtime error's kind status, or
    /// [`INPUT_ERROR`] for everything that fails before execution.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Runtime(err) => err.exit_code(),
            _ => INPUT_ERROR,
        }
    }
}

/// Load and execute a `.bc0` file, returning the entry function's result.
pub fn run(path: &Path, natives: NativeTable, config: VmConfig) -> Result<i32, CliError> {
    let program = read_program(path)?;
    debug!(
        functions = program.functions.len(),
        natives = program.natives.len(),
        max_call_depth = ?config.max_call_depth,
        max_heap_bytes = config.max_heap_bytes,
        "loaded program"
    );
    let result = stackvm_vm::run_with_config(&program, natives, config);
    let _ = io::stdout().flush();
    Ok(result?)
}

/// Assemble a text file to `.bc0`, returning the output path.
///
/// Without `output`, the input path with its extension replaced by
/// `.bc0` is used.
pub fn assemble(input: &Path, output: Option<&Path>) -> Result<PathBuf, CliError> {
    let text = read_text(input)?;
    let program = stackvm_assembler::assemble(&text).map_err(|source| CliError::Assemble {
        path: input.to_path_buf(),
        source,
    })?;

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("bc0"));
    let encoded = bc0::write(&program).map_err(|source| CliError::Load {
        path: output.clone(),
        source,
    })?;
    fs::write(&output, encoded).map_err(|source| CliError::Write {
        path: output.clone(),
        source,
    })?;

    info!(
        functions = program.functions.len(),
        output = %output.display(),
        "assembled"
    );
    Ok(output)
}

/// Disassemble a `.bc0` file to assembly text.
pub fn disassemble(input: &Path) -> Result<String, CliError> {
    let program = read_program(input)?;
    Ok(stackvm_assembler::disassemble(&program))
}

// --- Helpers ---

/// Read and parse a `.bc0` file.
pub fn read_program(path: &Path) -> Result<Program, CliError> {
    let text = read_text(path)?;
    bc0::parse(&text).map_err(|source| CliError::Load {
        path: path.to_path_buf(),
        source,
    })
}

fn read_text(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}
