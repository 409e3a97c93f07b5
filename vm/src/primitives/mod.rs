use std::io::Write;

use heap::Heap;

use crate::error::ErrorKind;
use crate::interpreter::Why;
use crate::value::{NativeId, Value};

pub mod print;

/// Everything a native function may touch while it runs.
pub struct NativeContext<'a> {
    pub heap: &'a Heap,
    pub out: &'a mut dyn Write,
    error: Option<ErrorKind>,
}

impl<'a> NativeContext<'a> {
    pub fn new(heap: &'a Heap, out: &'a mut dyn Write) -> Self {
        Self {
            heap,
            out,
            error: None,
        }
    }

    /// Record why the call failed and produce the matching signal.
    pub fn raise(&mut self, kind: impl Into<ErrorKind>) -> Why {
        self.error = Some(kind.into());
        Why::Exception
    }

    pub fn take_error(&mut self) -> Option<ErrorKind> {
        self.error.take()
    }
}

/// A native receives its positional arguments in call order and appends
/// its results to `rets`. The returned signal is [`Why::Not`] on success.
pub type NativeFn = fn(&mut NativeContext<'_>, &[Value], &mut Vec<Value>) -> Why;

#[derive(Clone, Copy)]
pub struct NativeDesc {
    pub name: &'static str,
    pub arity: u8,
    pub func: NativeFn,
}

impl NativeDesc {
    pub const fn new(name: &'static str, arity: u8, func: NativeFn) -> Self {
        Self { name, arity, func }
    }
}

pub fn default_natives() -> Vec<NativeDesc> {
    vec![NativeDesc::new("print", 1, print::print)]
}

/// Natives reachable through `LOAD_NAME`, keyed by name.
#[derive(Clone)]
pub struct NativeRegistry {
    natives: Vec<NativeDesc>,
}

impl Default for NativeRegistry {
    fn default() -> Self {
        Self {
            natives: default_natives(),
        }
    }
}

impl NativeRegistry {
    pub fn empty() -> Self {
        Self {
            natives: Vec::new(),
        }
    }

    /// Add `desc`, or replace the native already registered under its name.
    /// Returns `None` when the id space is exhausted.
    pub fn register(&mut self, desc: NativeDesc) -> Option<NativeId> {
        if let Some(id) = self.lookup(desc.name.as_bytes()) {
            self.natives[id.index()] = desc;
            return Some(id);
        }
        let id = NativeId::from_index(self.natives.len())?;
        self.natives.push(desc);
        Some(id)
    }

    pub fn lookup(&self, name: &[u8]) -> Option<NativeId> {
        self.natives
            .iter()
            .position(|desc| desc.name.as_bytes() == name)
            .and_then(NativeId::from_index)
    }

    pub fn get(&self, id: NativeId) -> Option<&NativeDesc> {
        self.natives.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.natives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.natives.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NativeId, &NativeDesc)> {
        self.natives
            .iter()
            .enumerate()
            .filter_map(|(index, desc)| Some((NativeId::from_index(index)?, desc)))
    }
}
