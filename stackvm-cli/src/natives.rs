//! The default native function table.
//!
//! | index | name      | argument |
//! |-------|-----------|----------|
//! | 0     | print     | string   |
//! | 1     | println   | string   |
//! | 2     | printint  | int      |
//! | 3     | printchar | int      |
//! | 4     | printbool | int      |
//! | 5     | flush     |          |
//!
//! Every native returns `0`.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use stackvm_common::Value;
use stackvm_vm::{Heap, NativeError, NativeTable};

pub const PRINT: u16 = 0;
pub const PRINTLN: u16 = 1;
pub const PRINTINT: u16 = 2;
pub const PRINTCHAR: u16 = 3;
pub const PRINTBOOL: u16 = 4;
pub const FLUSH: u16 = 5;

/// The default natives, writing to standard output.
pub fn default_natives() -> NativeTable {
    natives_writing_to(io::stdout())
}

/// The default natives, writing to `out`.
pub fn natives_writing_to<W: Write + 'static>(out: W) -> NativeTable {
    let out = Rc::new(RefCell::new(out));
    let mut table = NativeTable::new();

    let w = Rc::clone(&out);
    table.register(PRINT, "print", move |heap, args| {
        let text = string_arg(heap, args)?;
        write(&w, text)
    });

    let w = Rc::clone(&out);
    table.register(PRINTLN, "println", move |heap, args| {
        let mut text = string_arg(heap, args)?.to_vec();
        text.push(b'\n');
        write(&w, &text)
    });

    let w = Rc::clone(&out);
    table.register(PRINTINT, "printint", move |_, args| {
        let n = int_arg(args)?;
        write(&w, n.to_string().as_bytes())
    });

    let w = Rc::clone(&out);
    table.register(PRINTCHAR, "printchar", move |_, args| {
        let c = int_arg(args)?;
        write(&w, &[c as u8])
    });

    let w = Rc::clone(&out);
    table.register(PRINTBOOL, "printbool", move |_, args| {
        let text: &[u8] = if int_arg(args)? != 0 { b"true" } else { b"false" };
        write(&w, text)
    });

    table.register(FLUSH, "flush", move |_, _| {
        out.borrow_mut().flush().map_err(io_error)?;
        Ok(Value::Int(0))
    });

    table
}

fn write<W: Write>(out: &RefCell<W>, bytes: &[u8]) -> Result<Value, NativeError> {
    out.borrow_mut().write_all(bytes).map_err(io_error)?;
    Ok(Value::Int(0))
}

fn io_error(err: io::Error) -> NativeError {
    NativeError(format!("write failed: {err}"))
}

fn int_arg(args: &[Value]) -> Result<i32, NativeError> {
    match args.first() {
        Some(Value::Int(n)) => Ok(*n),
        Some(other) => Err(NativeError(format!("expected an int, found {other}"))),
        None => Err(NativeError("missing argument".to_string())),
    }
}

fn string_arg<'h>(heap: &'h Heap, args: &[Value]) -> Result<&'h [u8], NativeError> {
    match args.first() {
        Some(Value::Ref(r)) => Ok(heap.c_str(*r)?),
        Some(other) => Err(NativeError(format!("expected a string, found {other}"))),
        None => Err(NativeError("missing argument".to_string())),
    }
}
