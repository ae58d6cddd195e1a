//! Loader and writer for the `.bc0` program format.
//!
//! A `.bc0` file is text: whitespace-separated two-digit hex bytes, with
//! `#` starting a comment that runs to end of line. The byte layout, all
//! multi-byte fields big-endian:
//!
//! ```text
//! magic          u32 = C0 C0 FF EE
//! version        u16   (low bit = arch, version = value >> 1)
//! int_count      u16,  int_count × i32
//! string_size    u16,  string_size bytes
//! function_count u16,  per function: num_args u16, num_vars u16,
//!                                    code_length u16, code bytes
//! native_count   u16,  per native: num_args u16, table_index u16
//! ```
//!
//! Loading checks structure only. It does not verify bytecode.

use std::fmt::Write as _;

use crate::error::LoadError;
use crate::instruction::instructions;
use crate::program::{FunctionInfo, NativeInfo, Program};

/// File magic number.
pub const MAGIC: u32 = 0xC0C0_FFEE;

/// Format version written by [`write`]. The loader accepts any version.
pub const VERSION: u16 = 11;

/// Parse `.bc0` text into a program.
pub fn parse(text: &str) -> Result<Program, LoadError> {
    let bytes = tokenize(text)?;
    let mut r = Reader { bytes: &bytes, pos: 0 };

    let magic = r.u32("magic number")?;
    if magic != MAGIC {
        return Err(LoadError::BadMagic(magic));
    }
    r.u16("version")?;

    let int_count = r.u16("int pool")?;
    let mut int_pool = Vec::with_capacity(int_count as usize);
    for _ in 0..int_count {
        int_pool.push(r.u32("int pool")? as i32);
    }

    let string_size = r.u16("string pool")? as usize;
    let string_pool = r.take(string_size, "string pool")?.to_vec();

    let function_count = r.u16("function pool")?;
    let mut functions = Vec::with_capacity(function_count as usize);
    for index in 0..function_count as usize {
        let num_args = narrow(r.u16("function pool")?, index, "num_args")?;
        let num_vars = narrow(r.u16("function pool")?, index, "num_vars")?;
        if num_args > num_vars {
            return Err(LoadError::ArgsExceedLocals {
                function: index,
                num_args,
                num_vars,
            });
        }
        let code_len = r.u16("function pool")? as usize;
        let code = r.take(code_len, "function code")?.to_vec();
        functions.push(FunctionInfo {
            num_args,
            num_vars,
            code,
        });
    }
    if functions.is_empty() {
        return Err(LoadError::NoFunctions);
    }

    let native_count = r.u16("native pool")?;
    let mut natives = Vec::with_capacity(native_count as usize);
    for index in 0..native_count as usize {
        let num_args = r.u16("native pool")?;
        let num_args = u8::try_from(num_args).map_err(|_| LoadError::CountTooLarge {
            function: index,
            field: "native num_args",
            value: num_args,
        })?;
        let table_index = r.u16("native pool")?;
        natives.push(NativeInfo {
            num_args,
            table_index,
        });
    }

    let trailing = bytes.len() - r.pos;
    if trailing != 0 {
        return Err(LoadError::TrailingBytes(trailing));
    }

    Ok(Program {
        int_pool,
        string_pool,
        functions,
        natives,
    })
}

/// Render a program as `.bc0` text, with comments naming each section
/// and each decoded instruction.
pub fn write(program: &Program) -> Result<String, LoadError> {
    let mut out = String::new();

    line(&mut out, &MAGIC.to_be_bytes(), "magic number");
    line(
        &mut out,
        &((VERSION << 1) | 1).to_be_bytes(),
        &format!("version {VERSION}, arch = 1 (64 bits)"),
    );

    out.push('\n');
    let int_count = fit(program.int_pool.len(), "int pool")?;
    line(&mut out, &int_count.to_be_bytes(), "int pool count");
    out.push_str("# int pool\n");
    for n in &program.int_pool {
        line(&mut out, &n.to_be_bytes(), &n.to_string());
    }

    out.push('\n');
    let string_size = fit(program.string_pool.len(), "string pool")?;
    line(&mut out, &string_size.to_be_bytes(), "string pool total size");
    out.push_str("# string pool\n");
    for chunk in program.string_pool.split_inclusive(|&b| b == 0) {
        let text = String::from_utf8_lossy(chunk.strip_suffix(&[0]).unwrap_or(chunk));
        line(&mut out, chunk, &format!("{text:?}"));
    }

    out.push('\n');
    let function_count = fit(program.functions.len(), "function pool")?;
    line(&mut out, &function_count.to_be_bytes(), "function count");
    out.push_str("# function_pool\n");
    for (index, func) in program.functions.iter().enumerate() {
        let _ = writeln!(out, "\n#<function {index}>");
        line(
            &mut out,
            &(func.num_args as u16).to_be_bytes(),
            &format!("number of arguments = {}", func.num_args),
        );
        line(
            &mut out,
            &(func.num_vars as u16).to_be_bytes(),
            &format!("number of local variables = {}", func.num_vars),
        );
        let code_len = fit(func.code.len(), "function code")?;
        line(
            &mut out,
            &code_len.to_be_bytes(),
            &format!("code length = {code_len} bytes"),
        );
        write_code(&mut out, &func.code);
    }

    out.push('\n');
    let native_count = fit(program.natives.len(), "native pool")?;
    line(&mut out, &native_count.to_be_bytes(), "native count");
    out.push_str("# native pool\n");
    for (index, native) in program.natives.iter().enumerate() {
        let mut bytes = Vec::with_capacity(4);
        bytes.extend_from_slice(&(native.num_args as u16).to_be_bytes());
        bytes.extend_from_slice(&native.table_index.to_be_bytes());
        line(&mut out, &bytes, &format!("native {index}"));
    }

    Ok(out)
}

fn write_code(out: &mut String, code: &[u8]) {
    let mut end = 0;
    for item in instructions(code) {
        match item {
            Ok((pc, instr)) => {
                end = pc + instr.len();
                line(out, &code[pc..end], &instr.to_string());
            }
            Err(_) => break,
        }
    }
    // Undecodable tail is kept verbatim so the file still round-trips.
    if end < code.len() {
        line(out, &code[end..], "undecodable");
    }
}

fn line(out: &mut String, bytes: &[u8], comment: &str) {
    let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02X}")).collect();
    let _ = writeln!(out, "{:<18}# {comment}", hex.join(" "));
}

fn fit(len: usize, section: &'static str) -> Result<u16, LoadError> {
    u16::try_from(len).map_err(|_| LoadError::SectionTooLarge { section, len })
}

fn narrow(value: u16, function: usize, field: &'static str) -> Result<u8, LoadError> {
    u8::try_from(value).map_err(|_| LoadError::CountTooLarge {
        function,
        field,
        value,
    })
}

/// Turn `.bc0` text into raw bytes.
fn tokenize(text: &str) -> Result<Vec<u8>, LoadError> {
    let mut bytes = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line_num = idx + 1;
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        for token in line.split_whitespace() {
            let byte = if token.len() == 2 {
                u8::from_str_radix(token, 16).ok()
            } else {
                None
            };
            bytes.push(byte.ok_or_else(|| LoadError::InvalidByte {
                line: line_num,
                token: token.to_string(),
            })?);
        }
    }
    Ok(bytes)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, section: &'static str) -> Result<&'a [u8], LoadError> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + n)
            .ok_or(LoadError::UnexpectedEnd { section })?;
        self.pos += n;
        Ok(slice)
    }

    fn u16(&mut self, section: &'static str) -> Result<u16, LoadError> {
        let b = self.take(2, section)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, section: &'static str) -> Result<u32, LoadError> {
        let b = self.take(4, section)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD_PROGRAM: &str = "\
C0 C0 FF EE       # magic number
00 17             # version 11, arch = 1 (64 bits)

00 01             # int pool count
# int pool
00 01 86 A0       # 100000

00 03             # string pool total size
# string pool
68 69 00          # \"hi\"

00 01             # function count
# function_pool

#<main>
00 00             # number of arguments = 0
00 01             # number of local variables = 1
00 06             # code length = 6 bytes
10 05    # bipush 5
10 03    # bipush 3
60       # iadd
B0       # return

00 01             # native count
# native pool
00 01 00 09       # printint
";

    #[test]
    fn parse_minimal_program() {
        let program = parse(ADD_PROGRAM).unwrap();
        assert_eq!(program.int_pool, vec![100000]);
        assert_eq!(program.string_at(0), Some(&b"hi"[..]));
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].num_vars, 1);
        assert_eq!(program.functions[0].code, vec![0x10, 5, 0x10, 3, 0x60, 0xB0]);
        assert_eq!(
            program.natives,
            vec![NativeInfo {
                num_args: 1,
                table_index: 9
            }]
        );
    }

    #[test]
    fn negative_int_constant() {
        let text = ADD_PROGRAM.replace("00 01 86 A0", "FF FF FF FE");
        assert_eq!(parse(&text).unwrap().int_pool, vec![-2]);
    }

    #[test]
    fn write_then_parse_is_identity() {
        let program = parse(ADD_PROGRAM).unwrap();
        let text = write(&program).unwrap();
        assert_eq!(parse(&text).unwrap(), program);
        assert!(text.contains("# BIPUSH 5"));
        assert!(text.contains("# \"hi\""));
    }

    #[test]
    fn write_keeps_undecodable_code() {
        let program = Program::from_code(0, vec![0x10, 0x01, 0xFF, 0xB0]);
        let text = write(&program).unwrap();
        assert!(text.contains("undecodable"));
        assert_eq!(parse(&text).unwrap(), program);
    }

    #[test]
    fn bad_magic() {
        let text = ADD_PROGRAM.replacen("C0 C0 FF EE", "C0 C0 FF EF", 1);
        assert_eq!(parse(&text), Err(LoadError::BadMagic(0xC0C0_FFEF)));
    }

    #[test]
    fn invalid_byte_reports_line() {
        let text = ADD_PROGRAM.replacen("00 17", "00 1", 1);
        assert_eq!(
            parse(&text),
            Err(LoadError::InvalidByte {
                line: 2,
                token: "1".to_string()
            })
        );
    }

    #[test]
    fn truncated_input() {
        let cut = ADD_PROGRAM.find("B0       # return").unwrap();
        assert_eq!(
            parse(&ADD_PROGRAM[..cut]),
            Err(LoadError::UnexpectedEnd {
                section: "function code"
            })
        );
    }

    #[test]
    fn trailing_bytes_rejected() {
        let text = format!("{ADD_PROGRAM}00 00\n");
        assert_eq!(parse(&text), Err(LoadError::TrailingBytes(2)));
    }

    #[test]
    fn empty_function_pool_rejected() {
        let text = "C0 C0 FF EE 00 17 00 00 00 00 00 00 00 00";
        assert_eq!(parse(text), Err(LoadError::NoFunctions));
    }

    #[test]
    fn args_exceeding_locals_rejected() {
        let text = "C0 C0 FF EE 00 17 00 00 00 00 00 01 00 02 00 01 00 00 00 00";
        assert_eq!(
            parse(text),
            Err(LoadError::ArgsExceedLocals {
                function: 0,
                num_args: 2,
                num_vars: 1
            })
        );
    }

    #[test]
    fn oversized_local_count_rejected() {
        let text = "C0 C0 FF EE 00 17 00 00 00 00 00 01 00 00 01 00 00 00 00 00";
        assert_eq!(
            parse(text),
            Err(LoadError::CountTooLarge {
                function: 0,
                field: "num_vars",
                value: 256
            })
        );
    }

    #[test]
    fn write_rejects_oversized_pool() {
        let program = Program {
            int_pool: vec![0; 70_000],
            ..Program::from_code(0, vec![0xB0])
        };
        assert_eq!(
            write(&program),
            Err(LoadError::SectionTooLarge {
                section: "int pool",
                len: 70_000
            })
        );
    }
}
