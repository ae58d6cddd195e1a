//! Instruction decoding and encoding for the stackvm instruction set.
//!
//! Instructions are variable length:
//! ```text
//! Byte 0:      opcode (u8)
//! Byte 1:      8-bit immediate      (BIPUSH, VLOAD, VSTORE, NEW, AADDF, NEWARRAY)
//! Bytes 1-2:   16-bit immediate, big-endian
//!              (ILDC, ALDC, branches, INVOKESTATIC, INVOKENATIVE)
//! ```

use std::fmt;

use crate::error::DecodeError;
use crate::opcode::Opcode;

/// A single decoded instruction.
///
/// `arg` holds the raw immediate zero-extended to 16 bits; the accessors
/// reinterpret it with the signedness each opcode expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// The operation to perform.
    pub opcode: Opcode,
    /// Raw immediate operand. Zero for opcodes without one.
    pub arg: u16,
}

impl Instruction {
    /// Create a new instruction.
    pub fn new(opcode: Opcode, arg: u16) -> Self {
        Self { opcode, arg }
    }

    /// Create an instruction with no immediate.
    pub fn bare(opcode: Opcode) -> Self {
        Self { opcode, arg: 0 }
    }

    /// Encoded length in bytes, opcode included.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        1 + self.opcode.operand_len()
    }

    /// Decode the instruction starting at `code[pc]`.
    pub fn decode(code: &[u8], pc: usize) -> Result<Self, DecodeError> {
        let byte = *code.get(pc).ok_or(DecodeError::EndOfCode {
            pc,
            len: code.len(),
        })?;
        let opcode = Opcode::try_from(byte)?;

        let arg = match opcode.operand_len() {
            0 => 0,
            1 => *code.get(pc + 1).ok_or(DecodeError::Truncated { pc })? as u16,
            _ => {
                let hi = *code.get(pc + 1).ok_or(DecodeError::Truncated { pc })?;
                let lo = *code.get(pc + 2).ok_or(DecodeError::Truncated { pc })?;
                u16::from_be_bytes([hi, lo])
            }
        };

        Ok(Self { opcode, arg })
    }

    /// Append the encoded bytes of this instruction to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode as u8);
        match self.opcode.operand_len() {
            0 => {}
            1 => out.push(self.arg as u8),
            _ => out.extend_from_slice(&self.arg.to_be_bytes()),
        }
    }

    /// The immediate as an unsigned byte.
    pub fn arg_u8(&self) -> u8 {
        self.arg as u8
    }

    /// The immediate as a signed byte (BIPUSH).
    pub fn arg_i8(&self) -> i8 {
        self.arg as u8 as i8
    }

    /// The immediate as a signed 16-bit branch offset.
    pub fn arg_i16(&self) -> i16 {
        self.arg as i16
    }

    /// Branch target for a jump at `pc`, or `None` if the opcode does not
    /// branch or the target would be negative.
    ///
    /// Offsets are measured from the address of the branch opcode itself.
    pub fn branch_target(&self, pc: usize) -> Option<usize> {
        if !self.opcode.is_branch() {
            return None;
        }
        let target = pc as i64 + self.arg_i16() as i64;
        usize::try_from(target).ok()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.opcode.mnemonic();
        match self.opcode {
            Opcode::Bipush => write!(f, "{mnemonic} {}", self.arg_i8()),
            op if op.is_branch() => write!(f, "{mnemonic} {}", self.arg_i16()),
            op if op.operand_len() == 0 => f.write_str(mnemonic),
            _ => write!(f, "{mnemonic} {}", self.arg),
        }
    }
}

/// Iterate over the instructions of a code buffer as `(pc, instruction)`.
///
/// Stops at the first decode error, yielding it as the last item.
pub fn instructions(code: &[u8]) -> impl Iterator<Item = Result<(usize, Instruction), DecodeError>> + '_ {
    let mut pc = 0;
    let mut failed = false;
    std::iter::from_fn(move || {
        if failed || pc >= code.len() {
            return None;
        }
        match Instruction::decode(code, pc) {
            Ok(instr) => {
                let at = pc;
                pc += instr.len();
                Some(Ok((at, instr)))
            }
            Err(e) => {
                failed = true;
                Some(Err(e))
            }
        }
    })
}
