//! Opcode definitions for the stackvm instruction set.
//!
//! Every instruction is one opcode byte followed by zero, one or two
//! immediate bytes. Multi-byte immediates are big-endian.

use crate::error::DecodeError;

/// Identifies the operation to perform.
///
/// The `#[repr(u8)]` attribute pins each variant to its byte value in the
/// instruction stream.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Stack manipulation
    /// Pop and discard the top value.
    Pop = 0x57,
    /// Duplicate the top value.
    Dup = 0x59,
    /// Swap the top two values.
    Swap = 0x5F,

    // Arithmetic
    /// Pop y, x; push x + y (wrapping).
    Iadd = 0x60,
    /// Pop y, x; push x - y (wrapping).
    Isub = 0x64,
    /// Pop y, x; push x * y (wrapping).
    Imul = 0x68,
    /// Pop y, x; push x / y truncated toward zero.
    Idiv = 0x6C,
    /// Pop y, x; push x % y with the sign of x.
    Irem = 0x70,
    /// Pop y, x; push x & y.
    Iand = 0x7E,
    /// Pop y, x; push x | y.
    Ior = 0x80,
    /// Pop y, x; push x ^ y.
    Ixor = 0x82,
    /// Pop y, x; push x << y. Requires 0 <= y < 32.
    Ishl = 0x78,
    /// Pop y, x; push x >> y (arithmetic). Requires 0 <= y < 32.
    Ishr = 0x7A,

    // Constants
    /// Push the sign-extended 8-bit immediate.
    Bipush = 0x10,
    /// Push int_pool[u16 immediate].
    Ildc = 0x13,
    /// Push a reference to string_pool[u16 immediate].
    Aldc = 0x14,
    /// Push the null reference.
    AconstNull = 0x01,

    // Locals
    /// Push locals[u8 immediate].
    Vload = 0x15,
    /// Pop into locals[u8 immediate].
    Vstore = 0x36,

    // Errors
    /// Pop a message reference and raise a user error.
    Athrow = 0xBF,
    /// Pop message, pop condition; fail if the condition is zero.
    Assert = 0xCF,

    // Control flow
    /// No operation.
    Nop = 0x00,
    /// Branch if the top two values are identical.
    IfCmpeq = 0x9F,
    /// Branch if the top two values differ.
    IfCmpne = 0xA0,
    /// Branch if x < y.
    IfIcmplt = 0xA1,
    /// Branch if x >= y.
    IfIcmpge = 0xA2,
    /// Branch if x > y.
    IfIcmpgt = 0xA3,
    /// Branch if x <= y.
    IfIcmple = 0xA4,
    /// Unconditional branch.
    Goto = 0xA7,

    // Calls
    /// Return the top value from the current function.
    Return = 0xB0,
    /// Call function_pool[u16 immediate].
    Invokestatic = 0xB8,
    /// Call native_pool[u16 immediate].
    Invokenative = 0xB7,

    // Memory
    /// Allocate a zeroed block of u8 immediate bytes.
    New = 0xBB,
    /// Pop address; push the 32-bit int stored there.
    Imload = 0x2E,
    /// Pop value, pop address; store a 32-bit int.
    Imstore = 0x4E,
    /// Pop address; push the reference stored there.
    Amload = 0x2F,
    /// Pop reference, pop address; store the reference.
    Amstore = 0x4F,
    /// Pop address; push the byte stored there, sign-extended.
    Cmload = 0x34,
    /// Pop value, pop address; store its low byte.
    Cmstore = 0x55,
    /// Pop address; push address + u8 immediate.
    Aaddf = 0x62,

    // Arrays
    /// Pop count; push a new array of u8-immediate-sized elements.
    Newarray = 0xBC,
    /// Pop array; push its element count.
    Arraylength = 0xBE,
    /// Pop index, pop array; push the address of that element.
    Aadds = 0x63,
}

/// All supported opcodes, in definition order. Useful for exhaustive testing.
pub const ALL_OPCODES: [Opcode; 43] = [
    Opcode::Pop,
    Opcode::Dup,
    Opcode::Swap,
    Opcode::Iadd,
    Opcode::Isub,
    Opcode::Imul,
    Opcode::Idiv,
    Opcode::Irem,
    Opcode::Iand,
    Opcode::Ior,
    Opcode::Ixor,
    Opcode::Ishl,
    Opcode::Ishr,
    Opcode::Bipush,
    Opcode::Ildc,
    Opcode::Aldc,
    Opcode::AconstNull,
    Opcode::Vload,
    Opcode::Vstore,
    Opcode::Athrow,
    Opcode::Assert,
    Opcode::Nop,
    Opcode::IfCmpeq,
    Opcode::IfCmpne,
    Opcode::IfIcmplt,
    Opcode::IfIcmpge,
    Opcode::IfIcmpgt,
    Opcode::IfIcmple,
    Opcode::Goto,
    Opcode::Return,
    Opcode::Invokestatic,
    Opcode::Invokenative,
    Opcode::New,
    Opcode::Imload,
    Opcode::Imstore,
    Opcode::Amload,
    Opcode::Amstore,
    Opcode::Cmload,
    Opcode::Cmstore,
    Opcode::Aaddf,
    Opcode::Newarray,
    Opcode::Arraylength,
    Opcode::Aadds,
];

/// Extended opcodes that are part of the encoding but not executed.
///
/// Decoding one of these reports it by name rather than as an unknown byte.
pub const UNSUPPORTED_OPCODES: [(u8, &str); 6] = [
    (0x16, "ADDROF_STATIC"),
    (0x17, "ADDROF_NATIVE"),
    (0xB6, "INVOKEDYNAMIC"),
    (0xC0, "CHECKTAG"),
    (0xC1, "HASTAG"),
    (0xC2, "ADDTAG"),
];

impl TryFrom<u8> for Opcode {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x57 => Ok(Opcode::Pop),
            0x59 => Ok(Opcode::Dup),
            0x5F => Ok(Opcode::Swap),

            0x60 => Ok(Opcode::Iadd),
            0x64 => Ok(Opcode::Isub),
            0x68 => Ok(Opcode::Imul),
            0x6C => Ok(Opcode::Idiv),
            0x70 => Ok(Opcode::Irem),
            0x7E => Ok(Opcode::Iand),
            0x80 => Ok(Opcode::Ior),
            0x82 => Ok(Opcode::Ixor),
            0x78 => Ok(Opcode::Ishl),
            0x7A => Ok(Opcode::Ishr),

            0x10 => Ok(Opcode::Bipush),
            0x13 => Ok(Opcode::Ildc),
            0x14 => Ok(Opcode::Aldc),
            0x01 => Ok(Opcode::AconstNull),

            0x15 => Ok(Opcode::Vload),
            0x36 => Ok(Opcode::Vstore),

            0xBF => Ok(Opcode::Athrow),
            0xCF => Ok(Opcode::Assert),

            0x00 => Ok(Opcode::Nop),
            0x9F => Ok(Opcode::IfCmpeq),
            0xA0 => Ok(Opcode::IfCmpne),
            0xA1 => Ok(Opcode::IfIcmplt),
            0xA2 => Ok(Opcode::IfIcmpge),
            0xA3 => Ok(Opcode::IfIcmpgt),
            0xA4 => Ok(Opcode::IfIcmple),
            0xA7 => Ok(Opcode::Goto),

            0xB0 => Ok(Opcode::Return),
            0xB8 => Ok(Opcode::Invokestatic),
            0xB7 => Ok(Opcode::Invokenative),

            0xBB => Ok(Opcode::New),
            0x2E => Ok(Opcode::Imload),
            0x4E => Ok(Opcode::Imstore),
            0x2F => Ok(Opcode::Amload),
            0x4F => Ok(Opcode::Amstore),
            0x34 => Ok(Opcode::Cmload),
            0x55 => Ok(Opcode::Cmstore),
            0x62 => Ok(Opcode::Aaddf),

            0xBC => Ok(Opcode::Newarray),
            0xBE => Ok(Opcode::Arraylength),
            0x63 => Ok(Opcode::Aadds),

            _ => match UNSUPPORTED_OPCODES.iter().find(|(byte, _)| *byte == value) {
                Some(&(byte, name)) => Err(DecodeError::UnsupportedOpcode { byte, name }),
                None => Err(DecodeError::InvalidOpcode(value)),
            },
        }
    }
}

impl Opcode {
    /// Returns the assembly mnemonic for this opcode.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Pop => "POP",
            Opcode::Dup => "DUP",
            Opcode::Swap => "SWAP",
            Opcode::Iadd => "IADD",
            Opcode::Isub => "ISUB",
            Opcode::Imul => "IMUL",
            Opcode::Idiv => "IDIV",
            Opcode::Irem => "IREM",
            Opcode::Iand => "IAND",
            Opcode::Ior => "IOR",
            Opcode::Ixor => "IXOR",
            Opcode::Ishl => "ISHL",
            Opcode::Ishr => "ISHR",
            Opcode::Bipush => "BIPUSH",
            Opcode::Ildc => "ILDC",
            Opcode::Aldc => "ALDC",
            Opcode::AconstNull => "ACONST_NULL",
            Opcode::Vload => "VLOAD",
            Opcode::Vstore => "VSTORE",
            Opcode::Athrow => "ATHROW",
            Opcode::Assert => "ASSERT",
            Opcode::Nop => "NOP",
            Opcode::IfCmpeq => "IF_CMPEQ",
            Opcode::IfCmpne => "IF_CMPNE",
            Opcode::IfIcmplt => "IF_ICMPLT",
            Opcode::IfIcmpge => "IF_ICMPGE",
            Opcode::IfIcmpgt => "IF_ICMPGT",
            Opcode::IfIcmple => "IF_ICMPLE",
            Opcode::Goto => "GOTO",
            Opcode::Return => "RETURN",
            Opcode::Invokestatic => "INVOKESTATIC",
            Opcode::Invokenative => "INVOKENATIVE",
            Opcode::New => "NEW",
            Opcode::Imload => "IMLOAD",
            Opcode::Imstore => "IMSTORE",
            Opcode::Amload => "AMLOAD",
            Opcode::Amstore => "AMSTORE",
            Opcode::Cmload => "CMLOAD",
            Opcode::Cmstore => "CMSTORE",
            Opcode::Aaddf => "AADDF",
            Opcode::Newarray => "NEWARRAY",
            Opcode::Arraylength => "ARRAYLENGTH",
            Opcode::Aadds => "AADDS",
        }
    }

    /// Look up an opcode by its mnemonic (case-sensitive, upper-case).
    pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        ALL_OPCODES
            .iter()
            .find(|op| op.mnemonic() == mnemonic)
            .copied()
    }

    /// Number of immediate operand bytes following the opcode byte.
    pub fn operand_len(&self) -> usize {
        match self {
            Opcode::Bipush
            | Opcode::Vload
            | Opcode::Vstore
            | Opcode::New
            | Opcode::Aaddf
            | Opcode::Newarray => 1,

            Opcode::Ildc
            | Opcode::Aldc
            | Opcode::IfCmpeq
            | Opcode::IfCmpne
            | Opcode::IfIcmplt
            | Opcode::IfIcmpge
            | Opcode::IfIcmpgt
            | Opcode::IfIcmple
            | Opcode::Goto
            | Opcode::Invokestatic
            | Opcode::Invokenative => 2,

            _ => 0,
        }
    }

    /// Returns true for GOTO and the conditional branches.
    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            Opcode::Goto
                | Opcode::IfCmpeq
                | Opcode::IfCmpne
                | Opcode::IfIcmplt
                | Opcode::IfIcmpge
                | Opcode::IfIcmpgt
                | Opcode::IfIcmple
        )
    }
}
