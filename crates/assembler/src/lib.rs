//! stackvm assembler: text ↔ program translation.
//!
//! Assembly text is line oriented. Pools are declared with directives,
//! functions with `.function`, and instructions use their mnemonic with an
//! optional operand:
//!
//! ```text
//! .string "done"
//! .function main 0 1
//!         BIPUSH 3
//!         VSTORE 0
//! loop:   VLOAD 0
//!         BIPUSH 0
//!         IF_ICMPLE end     ; branch targets may be labels
//!         ...
//! ```
//!
//! # Usage
//!
//! ```
//! use stackvm_assembler::{assemble, disassemble};
//!
//! let program = assemble(".function main 0 0\nBIPUSH 42\nRETURN\n").unwrap();
//! assert_eq!(program.functions[0].code, vec![0x10, 42, 0xB0]);
//! assert_eq!(assemble(&disassemble(&program)).unwrap(), program);
//! ```
//!
//! # Roundtrip Guarantee
//!
//! `assemble(disassemble(program)) == program` holds for every program
//! whose string pool is empty or ends in a NUL byte. The disassembler
//! outputs canonical text; the assembler also accepts labels, function
//! names, inline ALDC strings, and hex or decimal numbers.

pub mod error;

mod disassembler;
mod layout;
mod lexer;
mod parser;

pub use error::AsmError;

use lexer::tokenize_line;
use parser::parse_line;
use stackvm_common::Program;

/// Assemble text into a program.
///
/// Returns the first error encountered. Fix one error at a time.
pub fn assemble(text: &str) -> Result<Program, AsmError> {
    let mut items = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_num = idx + 1;
        let tokens = tokenize_line(line, line_num)?;
        items.extend(
            parse_line(&tokens, line_num)?
                .into_iter()
                .map(|item| (line_num, item)),
        );
    }

    layout::layout(&items)
}

/// Disassemble a program into canonical assembly text.
pub fn disassemble(program: &Program) -> String {
    disassembler::disassemble(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackvm_common::{FunctionInfo, Instruction, NativeInfo, Opcode};

    fn encode(instrs: &[Instruction]) -> Vec<u8> {
        let mut code = Vec::new();
        for instr in instrs {
            instr.encode(&mut code);
        }
        code
    }

    #[test]
    fn assemble_minimal() {
        let program = assemble(".function main 0 0\nBIPUSH 5\nRETURN\n").unwrap();
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].code, vec![0x10, 0x05, 0xB0]);
        assert!(program.int_pool.is_empty());
    }

    #[test]
    fn disassemble_minimal() {
        let program = Program::from_code(
            1,
            encode(&[
                Instruction::new(Opcode::Bipush, 0xFF),
                Instruction::bare(Opcode::Return),
            ]),
        );
        let expected = format!(
            ".function f0 0 1\n    {:<20}; 0\n    {:<20}; 2\n",
            "BIPUSH -1", "RETURN"
        );
        assert_eq!(disassemble(&program), expected);
    }

    #[test]
    fn pools_are_collected() {
        let text = "\
.int 7
.int -1
.string \"hi\"
.string \"there\"
.native 1 4
.function main 0 0
    ILDC 1
    RETURN
";
        let program = assemble(text).unwrap();
        assert_eq!(program.int_pool, vec![7, -1]);
        assert_eq!(program.string_pool, b"hi\0there\0");
        assert_eq!(
            program.natives,
            vec![NativeInfo {
                num_args: 1,
                table_index: 4
            }]
        );
    }

    #[test]
    fn labels_resolve_to_relative_offsets() {
        let text = "\
.function main 0 1
top:
    VLOAD 0         ; 0
    BIPUSH 10       ; 2
    IF_ICMPGE done  ; 4
    GOTO top        ; 7
done:
    VLOAD 0         ; 10
    RETURN
";
        let program = assemble(text).unwrap();
        let code = &program.functions[0].code;
        assert_eq!(&code[4..7], &[0xA2, 0x00, 0x06]);
        assert_eq!(&code[7..10], &[0xA7, 0xFF, 0xF9]);
    }

    #[test]
    fn labels_are_local_to_functions() {
        let text = "\
.function main 0 0
    GOTO end
.function other 0 0
end:
    RETURN
";
        let err = assemble(text).unwrap_err();
        assert_eq!(
            err,
            AsmError::UndefinedLabel {
                line: 2,
                label: "end".to_string()
            }
        );
    }

    #[test]
    fn invokestatic_resolves_forward_names() {
        let text = "\
.function main 0 0
    BIPUSH 4
    INVOKESTATIC square
    RETURN
.function square 1 1
    VLOAD 0
    VLOAD 0
    IMUL
    RETURN
";
        let program = assemble(text).unwrap();
        assert_eq!(&program.functions[0].code[2..5], &[0xB8, 0x00, 0x01]);
        assert_eq!(
            program.functions[1],
            FunctionInfo {
                num_args: 1,
                num_vars: 1,
                code: vec![0x15, 0x00, 0x15, 0x00, 0x68, 0xB0],
            }
        );
    }

    #[test]
    fn aldc_literal_is_interned() {
        let text = "\
.string \"first\"
.function main 0 0
    ALDC \"second\"
    ALDC \"first\"
    ALDC \"second\"
    BIPUSH 0
    RETURN
";
        let program = assemble(text).unwrap();
        assert_eq!(program.string_pool, b"first\0second\0");
        let code = &program.functions[0].code;
        assert_eq!(&code[0..3], &[0x14, 0x00, 0x06]);
        assert_eq!(&code[3..6], &[0x14, 0x00, 0x00]);
        assert_eq!(&code[6..9], &[0x14, 0x00, 0x06]);
    }

    #[test]
    fn roundtrip_disassemble_then_assemble() {
        let text = "\
.int 100000
.string \"a \\\"quoted\\\" line\\n\"
.native 2 3
.function main 0 2
    ILDC 0
    ALDC 0
    INVOKENATIVE 0
    RETURN
.function helper 1 1
    NOP
    .byte 0xFF
    .byte 0x10
";
        let first = assemble(text).unwrap();
        let canonical = disassemble(&first);
        let second = assemble(&canonical).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn assemble_with_comments_and_blanks() {
        let text = "\
; This is a comment
.function main 0 0   ; entry

    BIPUSH 42  ; push 42
    RETURN
";
        let program = assemble(text).unwrap();
        assert_eq!(program.functions[0].code.len(), 3);
    }

    #[test]
    fn assemble_decimal_and_hex_produce_same_result() {
        let hex = assemble(".function main 0 0\nBIPUSH 0x2a\nRETURN\n").unwrap();
        let dec = assemble(".function main 0 0\nBIPUSH 42\nRETURN\n").unwrap();
        assert_eq!(hex, dec);
    }

    #[test]
    fn error_reports_correct_line() {
        let text = ".function main 0 0\nRETURN\nFOOBAR\n";
        let err = assemble(text).unwrap_err();
        assert!(matches!(err, AsmError::UnknownOpcode { line: 3, .. }));
    }

    #[test]
    fn error_instruction_outside_function() {
        let err = assemble("BIPUSH 1\n").unwrap_err();
        assert_eq!(err, AsmError::OutsideFunction { line: 1 });
        let err = assemble("start:\n").unwrap_err();
        assert_eq!(err, AsmError::OutsideFunction { line: 1 });
    }

    #[test]
    fn error_duplicate_label_and_function() {
        let err = assemble(".function f 0 0\na:\na:\n").unwrap_err();
        assert!(matches!(err, AsmError::DuplicateLabel { line: 3, .. }));
        let err = assemble(".function f 0 0\n.function f 0 0\n").unwrap_err();
        assert!(matches!(err, AsmError::DuplicateFunction { line: 2, .. }));
    }

    #[test]
    fn error_unknown_function() {
        let err = assemble(".function main 0 0\nINVOKESTATIC nowhere\n").unwrap_err();
        assert!(matches!(err, AsmError::UnknownFunction { line: 2, .. }));
    }

    #[test]
    fn error_args_exceed_locals() {
        let err = assemble(".function f 2 1\n").unwrap_err();
        assert!(matches!(
            err,
            AsmError::ArgsExceedLocals {
                num_args: 2,
                num_vars: 1,
                ..
            }
        ));
    }

    #[test]
    fn error_branch_too_far() {
        let mut text = String::from(".function main 0 0\nGOTO far\n");
        for _ in 0..33_000 {
            text.push_str("NOP\n");
        }
        text.push_str("far: RETURN\n");
        let err = assemble(&text).unwrap_err();
        assert!(matches!(err, AsmError::BranchTooFar { line: 2, .. }));
    }

    #[test]
    fn every_opcode_roundtrips() {
        let mut text = String::from(".function main 0 0\n");
        for opcode in stackvm_common::opcode::ALL_OPCODES {
            let line = match opcode.operand_len() {
                0 => opcode.mnemonic().to_string(),
                _ if opcode.is_branch() => format!("{} 0", opcode.mnemonic()),
                _ => format!("{} 1", opcode.mnemonic()),
            };
            text.push_str(&line);
            text.push('\n');
        }
        let first = assemble(&text).unwrap();
        let second = assemble(&disassemble(&first)).unwrap();
        assert_eq!(first, second);
    }
}
