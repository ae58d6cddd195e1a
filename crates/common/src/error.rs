//! Decode and load errors for stackvm programs.

use thiserror::Error;

/// Errors that occur while decoding a single instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Byte is not an opcode of the instruction set.
    #[error("invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),

    /// Byte is a known extended opcode that this interpreter does not execute.
    #[error("unsupported opcode {name} ({byte:#04x})")]
    UnsupportedOpcode { byte: u8, name: &'static str },

    /// The code buffer ends inside an instruction's immediate operands.
    #[error("instruction at pc {pc} is truncated")]
    Truncated { pc: usize },

    /// The program counter is past the end of the code buffer.
    #[error("pc {pc} is past the end of code (length {len})")]
    EndOfCode { pc: usize, len: usize },
}

/// Errors that occur while loading a `.bc0` program file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// A token is not a two-digit hexadecimal byte.
    #[error("line {line}: invalid byte '{token}'")]
    InvalidByte { line: usize, token: String },

    /// The file does not start with the magic number C0 C0 FF EE.
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    /// Input ended while reading the named section.
    #[error("unexpected end of input while reading {section}")]
    UnexpectedEnd { section: &'static str },

    /// Bytes remain after the native pool.
    #[error("{0} trailing byte(s) after native pool")]
    TrailingBytes(usize),

    /// The function pool has no entry function.
    #[error("function pool is empty")]
    NoFunctions,

    /// A count field does not fit the interpreter's limits.
    #[error("function {function}: {field} = {value} exceeds 255")]
    CountTooLarge {
        function: usize,
        field: &'static str,
        value: u16,
    },

    /// A function declares more arguments than local slots.
    #[error("function {function}: {num_args} arguments but only {num_vars} locals")]
    ArgsExceedLocals {
        function: usize,
        num_args: u8,
        num_vars: u8,
    },

    /// A section is too large for its 16-bit length field.
    #[error("{section} has {len} entries, more than a .bc0 file can hold")]
    SectionTooLarge { section: &'static str, len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_opcode() {
        assert_eq!(
            DecodeError::InvalidOpcode(0xFF).to_string(),
            "invalid opcode: 0xff"
        );
    }

    #[test]
    fn display_unsupported_opcode() {
        assert_eq!(
            DecodeError::UnsupportedOpcode {
                byte: 0xC0,
                name: "CHECKTAG"
            }
            .to_string(),
            "unsupported opcode CHECKTAG (0xc0)"
        );
    }

    #[test]
    fn display_bad_magic() {
        assert_eq!(
            LoadError::BadMagic(0xDEADBEEF).to_string(),
            "bad magic number 0xdeadbeef"
        );
    }

    #[test]
    fn display_args_exceed_locals() {
        assert_eq!(
            LoadError::ArgsExceedLocals {
                function: 2,
                num_args: 3,
                num_vars: 1
            }
            .to_string(),
            "function 2: 3 arguments but only 1 locals"
        );
    }
}
