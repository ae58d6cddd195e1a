//! Host-supplied native functions.
//!
//! A program's native pool names natives by table index; the host decides
//! what lives at each index by registering closures in a [`NativeTable`]
//! before execution starts.

use std::collections::BTreeMap;
use std::fmt;

use stackvm_common::Value;
use thiserror::Error;

use crate::heap::{Heap, HeapError};

/// Failure reported by a native function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct NativeError(pub String);

impl From<HeapError> for NativeError {
    fn from(err: HeapError) -> Self {
        NativeError(err.to_string())
    }
}

/// Signature of a native function: it sees the heap and its arguments
/// (first argument first) and returns one value.
pub type NativeFn = Box<dyn FnMut(&mut Heap, &[Value]) -> Result<Value, NativeError>>;

struct Entry {
    name: String,
    func: NativeFn,
}

/// Table of native functions keyed by table index.
#[derive(Default)]
pub struct NativeTable {
    entries: BTreeMap<u16, Entry>,
}

impl NativeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` at `index`, replacing any previous entry.
    pub fn register<F>(&mut self, index: u16, name: impl Into<String>, func: F) -> &mut Self
    where
        F: FnMut(&mut Heap, &[Value]) -> Result<Value, NativeError> + 'static,
    {
        self.entries.insert(
            index,
            Entry {
                name: name.into(),
                func: Box::new(func),
            },
        );
        self
    }

    pub fn contains(&self, index: u16) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn name(&self, index: u16) -> Option<&str> {
        self.entries.get(&index).map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Invoke the native at `index`. Returns `None` if nothing is registered there.
    pub fn call(
        &mut self,
        index: u16,
        heap: &mut Heap,
        args: &[Value],
    ) -> Option<Result<Value, NativeError>> {
        let entry = self.entries.get_mut(&index)?;
        Some((entry.func)(heap, args))
    }
}

impl fmt::Debug for NativeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(i, e)| (i, &e.name)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_native_is_called() {
        let mut table = NativeTable::new();
        table.register(3, "add", |_, args| match args {
            [Value::Int(a), Value::Int(b)] => Ok(Value::Int(a + b)),
            _ => Err(NativeError("add expects two ints".to_string())),
        });
        let mut heap = Heap::default();

        assert!(table.contains(3));
        assert_eq!(table.name(3), Some("add"));
        assert_eq!(
            table.call(3, &mut heap, &[Value::Int(2), Value::Int(5)]),
            Some(Ok(Value::Int(7)))
        );
        assert!(matches!(
            table.call(3, &mut heap, &[Value::NULL]),
            Some(Err(NativeError(_)))
        ));
    }

    #[test]
    fn missing_native_is_none() {
        let mut table = NativeTable::new();
        let mut heap = Heap::default();
        assert!(table.call(0, &mut heap, &[]).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn natives_may_keep_state() {
        let mut calls = 0;
        let mut table = NativeTable::new();
        table.register(0, "count", move |_, _| {
            calls += 1;
            Ok(Value::Int(calls))
        });
        let mut heap = Heap::default();
        table.call(0, &mut heap, &[]);
        assert_eq!(table.call(0, &mut heap, &[]), Some(Ok(Value::Int(2))));
    }

    #[test]
    fn heap_errors_convert() {
        let err: NativeError = HeapError::NullReference.into();
        assert_eq!(err.to_string(), "null reference");
    }
}
