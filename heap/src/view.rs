use std::fmt;

use object::{Handle, RawHandle, Tag};

use crate::heap::HANDLE_SIZE;
use crate::{Heap, HeapError};

/// A string cell, inline or slab-backed.
///
/// The length is authoritative: the bytes may contain NULs.
#[derive(Debug, Clone, Copy)]
pub struct StrView<'h> {
    handle: Handle,
    bytes: &'h [u8],
}

impl<'h> StrView<'h> {
    pub(crate) fn new(handle: Handle, bytes: &'h [u8]) -> Self {
        Self { handle, bytes }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &'h [u8] {
        self.bytes
    }

    /// The bytes up to the first NUL, as a C consumer would see them.
    pub fn as_c_bytes(&self) -> &'h [u8] {
        let end = self
            .bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.bytes.len());
        &self.bytes[..end]
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.bytes).into_owned()
    }
}

/// A tuple cell or a code object's field table: an array of wire handles.
#[derive(Debug, Clone, Copy)]
pub struct TupleView<'h> {
    handle: Handle,
    bytes: &'h [u8],
}

impl<'h> TupleView<'h> {
    pub(crate) fn new(handle: Handle, bytes: &'h [u8]) -> Self {
        Self { handle, bytes }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / HANDLE_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<RawHandle> {
        let start = index.checked_mul(HANDLE_SIZE)?;
        let b = self.bytes.get(start..start + HANDLE_SIZE)?;
        Some(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn iter(&self) -> impl Iterator<Item = RawHandle> + 'h {
        self.bytes
            .chunks_exact(HANDLE_SIZE)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Positions in a code object's field table.
///
/// Slot 0 is reserved and never read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum CodeField {
    ArgCount = 1,
    NLocals,
    StackSize,
    Flags,
    FirstLineNo,
    Name,
    Filename,
    Code,
    Names,
    VarNames,
    Consts,
}

impl CodeField {
    /// Number of handles in a code object's field table.
    pub const TABLE_LEN: usize = CodeField::Consts as usize + 1;

    pub const fn name(self) -> &'static str {
        match self {
            CodeField::ArgCount => "argcount",
            CodeField::NLocals => "nlocals",
            CodeField::StackSize => "stacksize",
            CodeField::Flags => "flags",
            CodeField::FirstLineNo => "firstlineno",
            CodeField::Name => "name",
            CodeField::Filename => "filename",
            CodeField::Code => "code",
            CodeField::Names => "names",
            CodeField::VarNames => "varnames",
            CodeField::Consts => "consts",
        }
    }
}

/// Read-only projection of a code object.
///
/// Each accessor dereferences one field handle and checks its tag.
#[derive(Debug, Clone, Copy)]
pub struct CodeView<'h> {
    heap: &'h Heap,
    handle: Handle,
    fields: TupleView<'h>,
}

impl<'h> CodeView<'h> {
    pub(crate) fn new(
        heap: &'h Heap,
        handle: Handle,
        fields: TupleView<'h>,
    ) -> Result<Self, HeapError> {
        if fields.len() < CodeField::TABLE_LEN {
            return Err(HeapError::Corrupt {
                handle,
                reason: "code object field table too short",
            });
        }
        Ok(Self {
            heap,
            handle,
            fields,
        })
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn heap(&self) -> &'h Heap {
        self.heap
    }

    /// Handle stored in a field slot.
    pub fn field(&self, field: CodeField) -> Result<Handle, HeapError> {
        let raw = self
            .fields
            .get(field as usize)
            .ok_or(HeapError::Corrupt {
                handle: self.handle,
                reason: "code object field table too short",
            })?;
        self.heap.handle(raw)
    }

    fn int_field(&self, field: CodeField) -> Result<i64, HeapError> {
        self.heap.int(self.field(field)?)
    }

    fn str_field(&self, field: CodeField) -> Result<StrView<'h>, HeapError> {
        self.heap.str(self.field(field)?)
    }

    fn tuple_field(&self, field: CodeField) -> Result<TupleView<'h>, HeapError> {
        self.heap.tuple(self.field(field)?)
    }

    pub fn argcount(&self) -> Result<i64, HeapError> {
        self.int_field(CodeField::ArgCount)
    }

    pub fn nlocals(&self) -> Result<i64, HeapError> {
        self.int_field(CodeField::NLocals)
    }

    pub fn stacksize(&self) -> Result<i64, HeapError> {
        self.int_field(CodeField::StackSize)
    }

    pub fn flags(&self) -> Result<i64, HeapError> {
        self.int_field(CodeField::Flags)
    }

    pub fn firstlineno(&self) -> Result<i64, HeapError> {
        self.int_field(CodeField::FirstLineNo)
    }

    pub fn name(&self) -> Result<StrView<'h>, HeapError> {
        self.str_field(CodeField::Name)
    }

    pub fn filename(&self) -> Result<StrView<'h>, HeapError> {
        self.str_field(CodeField::Filename)
    }

    /// The raw instruction stream.
    pub fn code(&self) -> Result<StrView<'h>, HeapError> {
        self.str_field(CodeField::Code)
    }

    pub fn names(&self) -> Result<TupleView<'h>, HeapError> {
        self.tuple_field(CodeField::Names)
    }

    pub fn varnames(&self) -> Result<TupleView<'h>, HeapError> {
        self.tuple_field(CodeField::VarNames)
    }

    pub fn consts(&self) -> Result<TupleView<'h>, HeapError> {
        self.tuple_field(CodeField::Consts)
    }
}

/// A cell decoded into its typed form.
#[derive(Debug, Clone, Copy)]
pub enum Object<'h> {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(StrView<'h>),
    Tuple(TupleView<'h>),
    Code(CodeView<'h>),
}

impl Object<'_> {
    pub fn tag(&self) -> Tag {
        match self {
            Object::None => Tag::None,
            Object::Bool(_) => Tag::Bool,
            Object::Int(_) => Tag::Int,
            Object::Float(_) => Tag::Float,
            Object::Str(_) => Tag::Str,
            Object::Tuple(_) => Tag::Tuple,
            Object::Code(_) => Tag::Code,
        }
    }
}

impl fmt::Display for Object<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::None => write!(f, "None"),
            Object::Bool(b) => write!(f, "Bool {b}"),
            Object::Int(i) => write!(f, "Int {i}"),
            Object::Float(x) => write!(f, "Float {x}"),
            Object::Str(s) => write!(f, "Str \"{}\"", s.as_bytes().escape_ascii()),
            Object::Tuple(t) => write!(f, "tuple({})", t.len()),
            Object::Code(c) => match c.name() {
                Ok(name) => write!(f, "code <{}>", name.as_bytes().escape_ascii()),
                Err(_) => write!(f, "code <?>"),
            },
        }
    }
}
