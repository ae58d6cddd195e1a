//! Error types for the stackvm assembler.

use thiserror::Error;

/// Errors produced during assembly of text to a program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    /// An unrecognized opcode mnemonic was encountered.
    #[error("line {line}: unknown opcode '{token}'")]
    UnknownOpcode { line: usize, token: String },

    /// An unrecognized directive was encountered.
    #[error("line {line}: unknown directive '.{token}'")]
    UnknownDirective { line: usize, token: String },

    /// An opcode or directive did not have enough operands.
    #[error("line {line}: {name} expects {expected} operand(s)")]
    MissingOperand {
        line: usize,
        name: String,
        expected: usize,
    },

    /// A numeric literal could not be parsed.
    #[error("line {line}: invalid number '{token}'")]
    InvalidNumber { line: usize, token: String },

    /// A number does not fit the operand it is used for.
    #[error("line {line}: {value} is out of range [{min}, {max}]")]
    OutOfRange {
        line: usize,
        value: i64,
        min: i64,
        max: i64,
    },

    /// A token appeared where it was not expected.
    #[error("line {line}: unexpected token '{token}'")]
    UnexpectedToken { line: usize, token: String },

    /// A string literal has no closing quote.
    #[error("line {line}: unterminated string literal")]
    UnterminatedString { line: usize },

    /// A string literal contains an unknown escape sequence.
    #[error("line {line}: invalid escape '{escape}'")]
    InvalidEscape { line: usize, escape: String },

    /// A branch names a label not defined in its function.
    #[error("line {line}: undefined label '{label}'")]
    UndefinedLabel { line: usize, label: String },

    /// A label is defined twice in one function.
    #[error("line {line}: duplicate label '{label}'")]
    DuplicateLabel { line: usize, label: String },

    /// INVOKESTATIC names a function that is never declared.
    #[error("line {line}: unknown function '{name}'")]
    UnknownFunction { line: usize, name: String },

    /// Two functions share a name.
    #[error("line {line}: duplicate function '{name}'")]
    DuplicateFunction { line: usize, name: String },

    /// Code or a label appears before the first `.function`.
    #[error("line {line}: instruction outside a function")]
    OutsideFunction { line: usize },

    /// A label is too far away for a 16-bit branch offset.
    #[error("line {line}: label '{label}' is {offset} bytes away, too far for a branch")]
    BranchTooFar {
        line: usize,
        label: String,
        offset: i64,
    },

    /// A function declares more arguments than locals.
    #[error("line {line}: function '{name}' has {num_args} arguments but only {num_vars} locals")]
    ArgsExceedLocals {
        line: usize,
        name: String,
        num_args: u8,
        num_vars: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_unknown_opcode() {
        let e = AsmError::UnknownOpcode {
            line: 3,
            token: "FOO".to_string(),
        };
        assert_eq!(e.to_string(), "line 3: unknown opcode 'FOO'");
    }

    #[test]
    fn error_display_missing_operand() {
        let e = AsmError::MissingOperand {
            line: 7,
            name: "VLOAD".to_string(),
            expected: 1,
        };
        assert_eq!(e.to_string(), "line 7: VLOAD expects 1 operand(s)");
    }

    #[test]
    fn error_display_out_of_range() {
        let e = AsmError::OutOfRange {
            line: 2,
            value: 300,
            min: -128,
            max: 127,
        };
        assert_eq!(e.to_string(), "line 2: 300 is out of range [-128, 127]");
    }

    #[test]
    fn error_display_undefined_label() {
        let e = AsmError::UndefinedLabel {
            line: 9,
            label: "done".to_string(),
        };
        assert_eq!(e.to_string(), "line 9: undefined label 'done'");
    }
}
