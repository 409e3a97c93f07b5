use std::collections::HashMap;

use heap::{CodeView, Heap, HeapError, TupleView};
use object::Handle;

use crate::config::UnboundNamePolicy;
use crate::error::{ErrorKind, StackKind};
use crate::primitives::NativeRegistry;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Loop,
    Except,
    Finally,
    /// Declared for `SETUP_WITH`, which is not executed yet.
    With,
}

/// A block-stack entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    /// Value-stack depth when the block was entered.
    pub level: usize,
    /// Absolute bytecode offset control moves to when the block catches.
    pub handler: usize,
}

/// Activation record for one code object.
pub struct Frame<'h> {
    code: CodeView<'h>,
    name: String,
    bytecode: &'h [u8],
    names: TupleView<'h>,
    varnames: TupleView<'h>,
    consts: TupleView<'h>,
    /// Offset of the next instruction.
    pub(crate) ip: usize,
    /// Offset of the instruction being executed.
    pub(crate) current: usize,
    value_stack: Vec<Value>,
    block_stack: Vec<Block>,
    locals: HashMap<Vec<u8>, Value>,
}

impl<'h> Frame<'h> {
    /// Resolve the code object's fields. Fails if any field is missing or
    /// has the wrong type.
    pub fn new(code: CodeView<'h>) -> Result<Self, HeapError> {
        let name = code.name()?.to_string_lossy();
        let bytecode = code.code()?.as_bytes();
        let names = code.names()?;
        let varnames = code.varnames()?;
        let consts = code.consts()?;
        let stacksize = usize::try_from(code.stacksize()?).unwrap_or(0);

        Ok(Self {
            code,
            name,
            bytecode,
            names,
            varnames,
            consts,
            ip: 0,
            current: 0,
            value_stack: Vec::with_capacity(stacksize),
            block_stack: Vec::new(),
            locals: HashMap::new(),
        })
    }

    pub fn code(&self) -> CodeView<'h> {
        self.code
    }

    pub fn heap(&self) -> &'h Heap {
        self.code.heap()
    }

    /// The code object's `name` field.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytecode(&self) -> &'h [u8] {
        self.bytecode
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn is_finished(&self) -> bool {
        self.ip >= self.bytecode.len()
    }

    // ── value stack ────────────────────────────────────────────────

    #[inline(always)]
    pub fn push(&mut self, value: Value) {
        self.value_stack.push(value);
    }

    #[inline(always)]
    pub fn pop(&mut self) -> Result<Value, ErrorKind> {
        self.value_stack
            .pop()
            .ok_or(ErrorKind::StackUnderflow(StackKind::Value))
    }

    /// Pop the top `n` values, returned in the order they were pushed.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, ErrorKind> {
        let depth = self.value_stack.len();
        if n > depth {
            return Err(ErrorKind::StackUnderflow(StackKind::Value));
        }
        Ok(self.value_stack.split_off(depth - n))
    }

    pub fn top(&self) -> Option<Value> {
        self.value_stack.last().copied()
    }

    pub fn stack(&self) -> &[Value] {
        &self.value_stack
    }

    pub fn depth(&self) -> usize {
        self.value_stack.len()
    }

    pub(crate) fn truncate(&mut self, level: usize) {
        self.value_stack.truncate(level);
    }

    // ── block stack ────────────────────────────────────────────────

    pub fn push_block(&mut self, kind: BlockKind, handler: usize) {
        let level = self.value_stack.len();
        self.block_stack.push(Block {
            kind,
            level,
            handler,
        });
    }

    pub fn pop_block(&mut self) -> Result<Block, ErrorKind> {
        self.block_stack
            .pop()
            .ok_or(ErrorKind::StackUnderflow(StackKind::Block))
    }

    pub fn blocks(&self) -> &[Block] {
        &self.block_stack
    }

    /// Pop blocks until one accepted by `catches` is found; that block is
    /// removed too. Returns `None` once the block stack is empty.
    pub(crate) fn unwind_blocks(
        &mut self,
        catches: impl Fn(BlockKind) -> bool,
    ) -> Option<Block> {
        while let Some(block) = self.block_stack.pop() {
            if catches(block.kind) {
                return Some(block);
            }
        }
        None
    }

    // ── tables ─────────────────────────────────────────────────────

    /// A constant; negative entries are native sentinels.
    pub fn const_at(&self, index: usize) -> Result<Value, ErrorKind> {
        let raw = self.consts.get(index).ok_or(ErrorKind::IndexOutOfRange {
            what: "consts",
            index,
            len: self.consts.len(),
        })?;
        Ok(Value::from_raw(self.heap(), raw)?)
    }

    pub fn name_at(&self, index: usize) -> Result<Handle, ErrorKind> {
        let raw = self.names.get(index).ok_or(ErrorKind::IndexOutOfRange {
            what: "names",
            index,
            len: self.names.len(),
        })?;
        Ok(self.heap().handle(raw)?)
    }

    pub fn varname_at(&self, index: usize) -> Result<Handle, ErrorKind> {
        let raw = self
            .varnames
            .get(index)
            .ok_or(ErrorKind::IndexOutOfRange {
                what: "varnames",
                index,
                len: self.varnames.len(),
            })?;
        Ok(self.heap().handle(raw)?)
    }

    // ── names ──────────────────────────────────────────────────────

    pub fn bind(&mut self, name: &[u8], value: Value) {
        self.locals.insert(name.to_vec(), value);
    }

    pub fn local(&self, name: &[u8]) -> Option<Value> {
        self.locals.get(name).copied()
    }

    pub fn locals(&self) -> impl Iterator<Item = (&[u8], Value)> {
        self.locals.iter().map(|(k, v)| (k.as_slice(), *v))
    }

    /// Resolve the string cell `name`: frame locals first, then natives.
    pub fn load_name(
        &self,
        name: Handle,
        natives: &NativeRegistry,
        policy: UnboundNamePolicy,
    ) -> Result<Value, ErrorKind> {
        let text = self.heap().str(name)?;
        let bytes = text.as_bytes();
        if let Some(value) = self.local(bytes) {
            return Ok(value);
        }
        if let Some(id) = natives.lookup(bytes) {
            return Ok(Value::Native(id));
        }
        match policy {
            UnboundNamePolicy::Raise => Err(ErrorKind::UnboundName(text.to_string_lossy())),
            UnboundNamePolicy::Fallback(handle) => {
                log::warn!(
                    "unbound name '{}', using {}",
                    text.to_string_lossy(),
                    handle
                );
                Ok(Value::Cell(handle))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use heap::{CodeSpec, ImageBuilder};

    use super::*;
    use crate::value::NativeId;

    fn frame_heap() -> (heap::Heap, Handle) {
        let mut b = ImageBuilder::new();
        let hello = b.str("hello");
        let code = b.code(&CodeSpec {
            stacksize: 2,
            name: "<module>",
            filename: "t.py",
            bytecode: &[100, 0, 0, 83],
            names: &["print", "greeting"],
            consts: &[hello],
            ..CodeSpec::default()
        });
        (b.into_heap().unwrap(), code)
    }

    #[test]
    fn stack_discipline() {
        let (heap, code) = frame_heap();
        let mut frame = Frame::new(heap.code(code).unwrap()).unwrap();
        assert_eq!(frame.name(), "<module>");
        assert_eq!(
            frame.pop(),
            Err(ErrorKind::StackUnderflow(StackKind::Value))
        );

        frame.push(Value::None);
        frame.push(Value::Exception);
        assert_eq!(frame.depth(), 2);
        assert_eq!(frame.top(), Some(Value::Exception));
        assert_eq!(frame.pop(), Ok(Value::Exception));
        assert_eq!(frame.pop(), Ok(Value::None));
        assert_eq!(frame.depth(), 0);
    }

    #[test]
    fn pop_n_keeps_push_order() {
        let (heap, code) = frame_heap();
        let mut frame = Frame::new(heap.code(code).unwrap()).unwrap();
        let a = Value::Cell(Handle::new(0));
        let b = Value::Cell(Handle::new(1));
        frame.push(Value::None);
        frame.push(a);
        frame.push(b);
        assert_eq!(frame.pop_n(2).unwrap(), vec![a, b]);
        assert_eq!(frame.stack(), &[Value::None]);
        assert!(frame.pop_n(2).is_err());
        assert_eq!(frame.depth(), 1);
    }

    #[test]
    fn block_stack() {
        let (heap, code) = frame_heap();
        let mut frame = Frame::new(heap.code(code).unwrap()).unwrap();
        assert_eq!(
            frame.pop_block(),
            Err(ErrorKind::StackUnderflow(StackKind::Block))
        );

        frame.push(Value::None);
        frame.push_block(BlockKind::Except, 10);
        frame.push_block(BlockKind::Loop, 20);
        assert_eq!(frame.blocks().len(), 2);

        let caught = frame
            .unwind_blocks(|k| matches!(k, BlockKind::Except))
            .unwrap();
        assert_eq!(caught.level, 1);
        assert_eq!(caught.handler, 10);
        assert!(frame.blocks().is_empty());
    }

    #[test]
    fn load_name_prefers_locals() {
        let (heap, code) = frame_heap();
        let mut frame = Frame::new(heap.code(code).unwrap()).unwrap();
        let natives = NativeRegistry::default();
        let print_name = frame.name_at(0).unwrap();

        let resolved = frame
            .load_name(print_name, &natives, UnboundNamePolicy::Raise)
            .unwrap();
        assert!(matches!(resolved, Value::Native(_)));

        let shadow = Value::Cell(Handle::new(0));
        frame.bind(b"print", shadow);
        let resolved = frame
            .load_name(print_name, &natives, UnboundNamePolicy::Raise)
            .unwrap();
        assert_eq!(resolved, shadow);
    }

    #[test]
    fn load_name_unbound() {
        let (heap, code) = frame_heap();
        let frame = Frame::new(heap.code(code).unwrap()).unwrap();
        let natives = NativeRegistry::default();
        let greeting = frame.name_at(1).unwrap();

        assert_eq!(
            frame.load_name(greeting, &natives, UnboundNamePolicy::Raise),
            Err(ErrorKind::UnboundName("greeting".to_string()))
        );

        let fallback = Handle::new(0);
        assert_eq!(
            frame.load_name(greeting, &natives, UnboundNamePolicy::Fallback(fallback)),
            Ok(Value::Cell(fallback))
        );
    }

    #[test]
    fn table_bounds() {
        let (heap, code) = frame_heap();
        let frame = Frame::new(heap.code(code).unwrap()).unwrap();
        assert!(matches!(frame.const_at(0), Ok(Value::Cell(_))));
        assert_eq!(
            frame.const_at(3),
            Err(ErrorKind::IndexOutOfRange {
                what: "consts",
                index: 3,
                len: 1
            })
        );
        assert!(matches!(
            frame.varname_at(0),
            Err(ErrorKind::IndexOutOfRange { what: "varnames", .. })
        ));
    }

    #[test]
    fn negative_consts_are_natives() {
        let mut b = ImageBuilder::new();
        let mut fields = vec![-1; heap::CodeField::TABLE_LEN];
        fields[1..6].copy_from_slice(&[0, 0, 0, 0, 0].map(|n| b.int(n).raw()));
        fields[6] = b.str("<module>").raw();
        fields[7] = b.str("t.py").raw();
        fields[8] = b.str("").raw();
        fields[9] = b.tuple(&[]).raw();
        fields[10] = b.tuple(&[]).raw();
        fields[11] = b.tuple_raw(&[-1, -7, i32::MIN]).raw();
        let code = b.code_raw(&fields);
        let heap = b.into_heap().unwrap();
        let frame = Frame::new(heap.code(code).unwrap()).unwrap();

        assert_eq!(frame.const_at(0), Ok(Value::Native(NativeId::new(0))));
        assert_eq!(frame.const_at(1), Ok(Value::Native(NativeId::new(6))));
        assert_eq!(
            frame.const_at(2),
            Err(ErrorKind::Heap(HeapError::InvalidHandle(i32::MIN)))
        );
    }

    #[test]
    fn with_blocks_are_recorded() {
        let (heap, code) = frame_heap();
        let mut frame = Frame::new(heap.code(code).unwrap()).unwrap();
        frame.push_block(BlockKind::With, 4);
        let block = frame.pop_block().unwrap();
        assert_eq!(block.kind, BlockKind::With);
        assert_eq!(block.handler, 4);
    }
}
