//! stackvm common types and program encoding.
//!
//! This crate provides the data structures shared by the interpreter,
//! assembler and command-line driver:
//!
//! - [`Opcode`]: the supported opcodes and their byte values
//! - [`Instruction`]: a decoded opcode with its immediate operand
//! - [`Value`]: the tagged int/reference datum of stacks and locals
//! - [`Program`]: constant pools plus per-function code
//! - [`bc0`]: the `.bc0` hex-text program loader and writer
//! - [`DecodeError`], [`LoadError`]: decoding and loading failures

pub mod bc0;
pub mod error;
pub mod instruction;
pub mod opcode;
pub mod program;
pub mod value;

// Re-export commonly used types at the crate root.
pub use error::{DecodeError, LoadError};
pub use instruction::Instruction;
pub use opcode::Opcode;
pub use program::{FunctionInfo, NativeInfo, Program};
pub use value::{Address, ObjectId, Value};

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy that generates a random supported Opcode.
    fn arb_opcode() -> impl Strategy<Value = Opcode> {
        prop::sample::select(&opcode::ALL_OPCODES[..])
    }

    /// Strategy that generates a random Instruction with an in-range immediate.
    fn arb_instruction() -> impl Strategy<Value = Instruction> {
        (arb_opcode(), any::<u16>()).prop_map(|(op, arg)| {
            let arg = match op.operand_len() {
                0 => 0,
                1 => arg & 0xFF,
                _ => arg,
            };
            Instruction::new(op, arg)
        })
    }

    proptest! {
        /// For all instructions, encode then decode produces the original.
        #[test]
        fn encode_decode_roundtrip(instr in arb_instruction()) {
            let mut code = Vec::new();
            instr.encode(&mut code);
            prop_assert_eq!(code.len(), instr.len());
            prop_assert_eq!(Instruction::decode(&code, 0).unwrap(), instr);
        }

        /// Decoding arbitrary bytes never panics; it yields an instruction
        /// or a specific error.
        #[test]
        fn random_bytes_decode(code in prop::collection::vec(any::<u8>(), 0..8), pc in 0usize..8) {
            match Instruction::decode(&code, pc) {
                Ok(instr) => prop_assert!(pc + instr.len() <= code.len()),
                Err(e) => match e {
                    DecodeError::InvalidOpcode(_)
                    | DecodeError::UnsupportedOpcode { .. }
                    | DecodeError::Truncated { .. }
                    | DecodeError::EndOfCode { .. } => {}
                },
            }
        }

        /// Programs survive a trip through the .bc0 writer and loader.
        #[test]
        fn bc0_roundtrip(
            ints in prop::collection::vec(any::<i32>(), 0..8),
            strings in prop::collection::vec("[a-z ]{0,12}", 0..4),
            body in prop::collection::vec(arb_instruction(), 0..20),
            natives in prop::collection::vec((any::<u8>(), any::<u16>()), 0..4),
        ) {
            let mut code = Vec::new();
            for instr in &body {
                instr.encode(&mut code);
            }
            let mut program = Program::from_code(4, code);
            program.int_pool = ints;
            for s in &strings {
                program.add_string(s);
            }
            program.natives = natives
                .into_iter()
                .map(|(num_args, table_index)| NativeInfo { num_args, table_index })
                .collect();

            let text = bc0::write(&program).unwrap();
            prop_assert_eq!(bc0::parse(&text).unwrap(), program);
        }
    }
}
