//! Parser for stackvm assembly tokens → items.
//!
//! A line holds any number of label definitions followed by at most one
//! directive or instruction. Operand ranges are checked here; symbol
//! resolution happens when the program is laid out.

use crate::error::AsmError;
use crate::lexer::Token;
use stackvm_common::Opcode;

/// One parsed element of an assembly line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Item {
    /// `.int <value>`
    Int(i32),
    /// `.string "<text>"`
    Str(Vec<u8>),
    /// `.native <num_args> <table_index>`
    Native { num_args: u8, table_index: u16 },
    /// `.function <name> <num_args> <num_vars>`
    Function {
        name: String,
        num_args: u8,
        num_vars: u8,
    },
    /// `.byte <value>`: a raw code byte.
    Byte(u8),
    /// `<name>:`
    Label(String),
    /// `<MNEMONIC> [operand]`
    Instr { opcode: Opcode, operand: Operand },
}

/// The operand of an instruction, before symbol resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Operand {
    None,
    /// An immediate already encoded to its 8- or 16-bit form.
    Imm(u16),
    /// Branch target label.
    Label(String),
    /// INVOKESTATIC target function.
    Function(String),
    /// ALDC of an inline string literal.
    Str(Vec<u8>),
}

/// Parse a sequence of tokens from a single line.
///
/// Returns an empty Vec for blank lines.
pub(crate) fn parse_line(tokens: &[Token], line_num: usize) -> Result<Vec<Item>, AsmError> {
    let mut items = Vec::new();
    let mut rest = tokens;
    while let [Token::Label(name), tail @ ..] = rest {
        items.push(Item::Label(name.clone()));
        rest = tail;
    }

    match rest {
        [] => {}
        [Token::Directive(name), args @ ..] => items.push(parse_directive(name, args, line_num)?),
        [Token::Ident(mnemonic), args @ ..] => {
            items.push(parse_instruction(mnemonic, args, line_num)?)
        }
        [other, ..] => {
            return Err(AsmError::UnexpectedToken {
                line: line_num,
                token: other.to_string(),
            })
        }
    }
    Ok(items)
}

fn parse_directive(name: &str, args: &[Token], line_num: usize) -> Result<Item, AsmError> {
    let shape = Shape {
        name,
        args,
        line: line_num,
    };
    let item = match name {
        "int" => {
            shape.arity(1)?;
            Item::Int(shape.number(0, i32::MIN as i64, i32::MAX as i64)? as i32)
        }
        "string" => {
            shape.arity(1)?;
            match &args[0] {
                Token::Str(bytes) => Item::Str(bytes.clone()),
                other => return Err(shape.unexpected(other)),
            }
        }
        "native" => {
            shape.arity(2)?;
            Item::Native {
                num_args: shape.number(0, 0, u8::MAX as i64)? as u8,
                table_index: shape.number(1, 0, u16::MAX as i64)? as u16,
            }
        }
        "function" => {
            shape.arity(3)?;
            let name = match &args[0] {
                Token::Ident(name) => name.clone(),
                other => return Err(shape.unexpected(other)),
            };
            Item::Function {
                name,
                num_args: shape.number(1, 0, u8::MAX as i64)? as u8,
                num_vars: shape.number(2, 0, u8::MAX as i64)? as u8,
            }
        }
        "byte" => {
            shape.arity(1)?;
            Item::Byte(shape.number(0, 0, u8::MAX as i64)? as u8)
        }
        _ => {
            return Err(AsmError::UnknownDirective {
                line: line_num,
                token: name.to_string(),
            })
        }
    };
    Ok(item)
}

fn parse_instruction(mnemonic: &str, args: &[Token], line_num: usize) -> Result<Item, AsmError> {
    let opcode =
        Opcode::from_mnemonic(&mnemonic.to_uppercase()).ok_or_else(|| AsmError::UnknownOpcode {
            line: line_num,
            token: mnemonic.to_string(),
        })?;
    let shape = Shape {
        name: opcode.mnemonic(),
        args,
        line: line_num,
    };

    if opcode.operand_len() == 0 {
        shape.arity(0)?;
        return Ok(Item::Instr {
            opcode,
            operand: Operand::None,
        });
    }
    shape.arity(1)?;

    let operand = match (opcode, &args[0]) {
        (op, Token::Ident(label)) if op.is_branch() => Operand::Label(label.clone()),
        (op, Token::Number(_)) if op.is_branch() => {
            Operand::Imm(shape.number(0, i16::MIN as i64, i16::MAX as i64)? as i16 as u16)
        }
        (Opcode::Invokestatic, Token::Ident(name)) => Operand::Function(name.clone()),
        (Opcode::Aldc, Token::Str(bytes)) => Operand::Str(bytes.clone()),
        (Opcode::Bipush, Token::Number(_)) => {
            Operand::Imm(shape.number(0, i8::MIN as i64, i8::MAX as i64)? as i8 as u8 as u16)
        }
        (op, Token::Number(_)) if op.operand_len() == 1 => {
            Operand::Imm(shape.number(0, 0, u8::MAX as i64)? as u16)
        }
        (_, Token::Number(_)) => Operand::Imm(shape.number(0, 0, u16::MAX as i64)? as u16),
        (_, other) => return Err(shape.unexpected(other)),
    };
    Ok(Item::Instr { opcode, operand })
}

/// Operand list of one directive or instruction, for arity and range checks.
struct Shape<'a> {
    name: &'a str,
    args: &'a [Token],
    line: usize,
}

impl Shape<'_> {
    fn arity(&self, expected: usize) -> Result<(), AsmError> {
        if self.args.len() < expected {
            return Err(AsmError::MissingOperand {
                line: self.line,
                name: self.name.to_string(),
                expected,
            });
        }
        match self.args.get(expected) {
            Some(extra) => Err(self.unexpected(extra)),
            None => Ok(()),
        }
    }

    fn unexpected(&self, token: &Token) -> AsmError {
        AsmError::UnexpectedToken {
            line: self.line,
            token: token.to_string(),
        }
    }

    /// The operand at `index` as a number within `[min, max]`.
    fn number(&self, index: usize, min: i64, max: i64) -> Result<i64, AsmError> {
        match &self.args[index] {
            Token::Number(n) if (min..=max).contains(n) => Ok(*n),
            Token::Number(n) => Err(AsmError::OutOfRange {
                line: self.line,
                value: *n,
                min,
                max,
            }),
            other => Err(self.unexpected(other)),
        }
    }
}
