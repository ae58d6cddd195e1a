//! Two-pass layout: collect pools, functions and labels, then encode code.

use std::collections::HashMap;

use crate::error::AsmError;
use crate::parser::{Item, Operand};
use stackvm_common::{FunctionInfo, Instruction, NativeInfo, Program};

/// Label offsets of one function.
type Labels<'a> = HashMap<&'a str, usize>;

/// Build a program from parsed items tagged with their line numbers.
pub(crate) fn layout(items: &[(usize, Item)]) -> Result<Program, AsmError> {
    let mut program = Program::default();
    let mut function_index: HashMap<&str, usize> = HashMap::new();
    let mut labels: Vec<Labels<'_>> = Vec::new();

    // Pass 1: pools, function table, label offsets.
    let mut offset = 0;
    for (line, item) in items {
        let line = *line;
        match item {
            Item::Int(n) => program.int_pool.push(*n),
            Item::Str(bytes) => {
                program.string_pool.extend_from_slice(bytes);
                program.string_pool.push(0);
            }
            Item::Native {
                num_args,
                table_index,
            } => program.natives.push(NativeInfo {
                num_args: *num_args,
                table_index: *table_index,
            }),
            Item::Function {
                name,
                num_args,
                num_vars,
            } => {
                if num_args > num_vars {
                    return Err(AsmError::ArgsExceedLocals {
                        line,
                        name: name.clone(),
                        num_args: *num_args,
                        num_vars: *num_vars,
                    });
                }
                if function_index
                    .insert(name.as_str(), program.functions.len())
                    .is_some()
                {
                    return Err(AsmError::DuplicateFunction {
                        line,
                        name: name.clone(),
                    });
                }
                program.functions.push(FunctionInfo {
                    num_args: *num_args,
                    num_vars: *num_vars,
                    code: Vec::new(),
                });
                labels.push(Labels::new());
                offset = 0;
            }
            Item::Label(name) => {
                let current = labels.last_mut().ok_or(AsmError::OutsideFunction { line })?;
                if current.insert(name.as_str(), offset).is_some() {
                    return Err(AsmError::DuplicateLabel {
                        line,
                        label: name.clone(),
                    });
                }
            }
            Item::Byte(_) | Item::Instr { .. } => {
                if labels.is_empty() {
                    return Err(AsmError::OutsideFunction { line });
                }
                offset += match item {
                    Item::Instr { opcode, .. } => 1 + opcode.operand_len(),
                    _ => 1,
                };
            }
        }
    }

    // Pass 2: encode instructions with symbols resolved. Functions are
    // numbered in declaration order.
    let mut current: Option<usize> = None;
    for (line, item) in items {
        let line = *line;
        match item {
            Item::Function { .. } => current = Some(current.map_or(0, |f| f + 1)),
            Item::Byte(b) => {
                let f = current.ok_or(AsmError::OutsideFunction { line })?;
                program.functions[f].code.push(*b);
            }
            Item::Instr { opcode, operand } => {
                let f = current.ok_or(AsmError::OutsideFunction { line })?;
                let pc = program.functions[f].code.len();
                let arg = match operand {
                    Operand::None => 0,
                    Operand::Imm(arg) => *arg,
                    Operand::Label(label) => {
                        let target = labels[f].get(label.as_str()).ok_or_else(|| {
                            AsmError::UndefinedLabel {
                                line,
                                label: label.clone(),
                            }
                        })?;
                        let offset = *target as i64 - pc as i64;
                        i16::try_from(offset).map_err(|_| AsmError::BranchTooFar {
                            line,
                            label: label.clone(),
                            offset,
                        })? as u16
                    }
                    Operand::Function(name) => {
                        let index = *function_index.get(name.as_str()).ok_or_else(|| {
                            AsmError::UnknownFunction {
                                line,
                                name: name.clone(),
                            }
                        })?;
                        fit_u16(index, line)?
                    }
                    Operand::Str(bytes) => {
                        let offset = intern(&mut program.string_pool, bytes);
                        fit_u16(offset, line)?
                    }
                };
                Instruction::new(*opcode, arg).encode(&mut program.functions[f].code);
            }
            Item::Int(_) | Item::Str(_) | Item::Native { .. } | Item::Label(_) => {}
        }
    }

    Ok(program)
}

fn fit_u16(value: usize, line: usize) -> Result<u16, AsmError> {
    u16::try_from(value).map_err(|_| AsmError::OutOfRange {
        line,
        value: value as i64,
        min: 0,
        max: u16::MAX as i64,
    })
}

/// Offset of `bytes` as a NUL-terminated string in `pool`, appending it if
/// no existing string ends with the same bytes.
fn intern(pool: &mut Vec<u8>, bytes: &[u8]) -> usize {
    let mut needle = bytes.to_vec();
    needle.push(0);
    if let Some(offset) = pool.windows(needle.len()).position(|w| w == needle) {
        return offset;
    }
    let offset = pool.len();
    pool.extend_from_slice(&needle);
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_reuses_suffixes() {
        let mut pool = b"hello\0".to_vec();
        assert_eq!(intern(&mut pool, b"hello"), 0);
        assert_eq!(intern(&mut pool, b"llo"), 2);
        assert_eq!(intern(&mut pool, b""), 5);
        assert_eq!(intern(&mut pool, b"bye"), 6);
        assert_eq!(pool, b"hello\0bye\0");
    }
}
