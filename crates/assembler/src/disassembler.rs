//! Disassembler: program → canonical assembly text.

use std::fmt::Write;

use stackvm_common::instruction::instructions;
use stackvm_common::{Opcode, Program};

/// Disassemble a program into canonical assembly text.
///
/// Pools come first, then each function as `.function f<index>`. Branch
/// and call operands are numeric; comments show branch targets and the
/// strings ALDC refers to. Code that does not decode is emitted as
/// `.byte` lines, so any program whose string pool ends in a NUL
/// reassembles to itself.
pub(crate) fn disassemble(program: &Program) -> String {
    let mut out = String::new();

    for n in &program.int_pool {
        let _ = writeln!(out, ".int {n}");
    }

    let mut offset = 0;
    while offset < program.string_pool.len() {
        let bytes = program.string_at(offset).unwrap_or_default();
        let _ = writeln!(out, ".string \"{}\" ; {offset}", escape(bytes));
        offset += bytes.len() + 1;
    }

    for native in &program.natives {
        let _ = writeln!(out, ".native {} {}", native.num_args, native.table_index);
    }

    for (index, function) in program.functions.iter().enumerate() {
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(
            out,
            ".function f{index} {} {}",
            function.num_args, function.num_vars
        );

        let code = &function.code;
        let mut next = 0;
        for decoded in instructions(code) {
            let Ok((pc, instr)) = decoded else { break };
            next = pc + instr.len();

            let text = instr.to_string();
            let comment = match instr.opcode {
                _ if instr.opcode.is_branch() => instr
                    .branch_target(pc)
                    .map(|target| format!("-> {target}")),
                Opcode::Aldc => program
                    .string_at(instr.arg as usize)
                    .map(|s| format!("\"{}\"", escape(s))),
                _ => None,
            };
            match comment {
                Some(comment) => {
                    let _ = writeln!(out, "    {text:<20}; {pc}: {comment}");
                }
                None => {
                    let _ = writeln!(out, "    {text:<20}; {pc}");
                }
            }
        }
        for byte in &code[next..] {
            let _ = writeln!(out, "    .byte {byte:#04x}");
        }
    }

    out
}

/// Escape bytes for a string literal.
fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7E => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }
    out
}
