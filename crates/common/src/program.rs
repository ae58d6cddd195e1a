//! Program representation: constant pools and per-function code.
//!
//! A program is produced by a loader (see [`crate::bc0`]) or the
//! assembler and handed to the interpreter read-only.

/// One entry of the function pool.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionInfo {
    /// Number of arguments popped from the caller's stack into locals 0..num_args.
    pub num_args: u8,
    /// Number of local slots (arguments included).
    pub num_vars: u8,
    /// The function body.
    pub code: Vec<u8>,
}

/// One entry of the native pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeInfo {
    /// Number of arguments passed to the native function.
    pub num_args: u8,
    /// Index into the host's native function table.
    pub table_index: u16,
}

/// A loaded program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    /// Integer constants, indexed by ILDC.
    pub int_pool: Vec<i32>,
    /// NUL-terminated strings, addressed by byte offset from ALDC.
    pub string_pool: Vec<u8>,
    /// Functions, indexed by INVOKESTATIC. Entry 0 is the entry point.
    pub functions: Vec<FunctionInfo>,
    /// Native function descriptors, indexed by INVOKENATIVE.
    pub natives: Vec<NativeInfo>,
}

impl Program {
    /// Create a program with a single entry function and empty pools.
    pub fn from_code(num_vars: u8, code: Vec<u8>) -> Self {
        Self {
            functions: vec![FunctionInfo {
                num_args: 0,
                num_vars,
                code,
            }],
            ..Self::default()
        }
    }

    /// The entry function, if the function pool is non-empty.
    pub fn entry(&self) -> Option<&FunctionInfo> {
        self.functions.first()
    }

    /// Bytes of the NUL-terminated string at `offset` in the string pool,
    /// without the terminator. A missing terminator runs to the end of the pool.
    pub fn string_at(&self, offset: usize) -> Option<&[u8]> {
        let tail = self.string_pool.get(offset..)?;
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        Some(&tail[..end])
    }

    /// Append a string to the string pool, returning its offset.
    pub fn add_string(&mut self, s: &str) -> usize {
        let offset = self.string_pool.len();
        self.string_pool.extend_from_slice(s.as_bytes());
        self.string_pool.push(0);
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_code_builds_entry() {
        let program = Program::from_code(2, vec![0x10, 0x01, 0xB0]);
        let entry = program.entry().unwrap();
        assert_eq!(entry.num_args, 0);
        assert_eq!(entry.num_vars, 2);
        assert_eq!(entry.code.len(), 3);
    }

    #[test]
    fn empty_program_has_no_entry() {
        assert!(Program::default().entry().is_none());
    }

    #[test]
    fn strings_are_nul_terminated() {
        let mut program = Program::default();
        let hello = program.add_string("hello");
        let world = program.add_string("world");
        assert_eq!(hello, 0);
        assert_eq!(world, 6);
        assert_eq!(program.string_at(world), Some(&b"world"[..]));
        assert_eq!(program.string_at(2), Some(&b"llo"[..]));
        assert_eq!(program.string_at(100), None);
    }

    #[test]
    fn string_without_terminator_runs_to_end() {
        let program = Program {
            string_pool: b"abc".to_vec(),
            ..Program::default()
        };
        assert_eq!(program.string_at(0), Some(&b"abc"[..]));
    }
}
