use crate::op::Op;

/// A block-setup instruction whose relative target is not yet known.
///
/// Created by [`BytecodeBuilder::setup_loop`],
/// [`BytecodeBuilder::setup_except`] and [`BytecodeBuilder::setup_finally`].
/// Resolve it with [`BytecodeBuilder::bind`].
#[derive(Debug)]
pub struct Label {
    /// Position of the u16 operand in the buffer.
    operand_pos: usize,
    /// Position right after the instruction (base for the relative target).
    base: usize,
}

/// Builds a bytecode byte sequence.
pub struct BytecodeBuilder {
    buf: Vec<u8>,
}

impl Default for BytecodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Current byte offset in the bytecode stream.
    pub fn current_offset(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    // ── raw emitters ───────────────────────────────────────────────

    /// Emit an argument-less opcode.
    pub fn emit(&mut self, op: Op) -> &mut Self {
        debug_assert!(!op.has_arg(), "{} needs an operand", op.name());
        self.buf.push(op as u8);
        self
    }

    /// Emit an opcode with its 16-bit operand.
    pub fn emit_arg(&mut self, op: Op, arg: u16) -> &mut Self {
        debug_assert!(op.has_arg(), "{} takes no operand", op.name());
        self.buf.push(op as u8);
        self.buf.extend_from_slice(&arg.to_le_bytes());
        self
    }

    /// Emit a raw byte, e.g. an unassigned opcode.
    pub fn emit_byte(&mut self, byte: u8) -> &mut Self {
        self.buf.push(byte);
        self
    }

    // ── instructions ───────────────────────────────────────────────

    pub fn pop_top(&mut self) -> &mut Self {
        self.emit(Op::PopTop)
    }

    pub fn return_value(&mut self) -> &mut Self {
        self.emit(Op::ReturnValue)
    }

    pub fn pop_block(&mut self) -> &mut Self {
        self.emit(Op::PopBlock)
    }

    pub fn break_loop(&mut self) -> &mut Self {
        self.emit(Op::BreakLoop)
    }

    pub fn load_const(&mut self, idx: u16) -> &mut Self {
        self.emit_arg(Op::LoadConst, idx)
    }

    pub fn load_name(&mut self, idx: u16) -> &mut Self {
        self.emit_arg(Op::LoadName, idx)
    }

    pub fn store_name(&mut self, idx: u16) -> &mut Self {
        self.emit_arg(Op::StoreName, idx)
    }

    pub fn load_fast(&mut self, idx: u16) -> &mut Self {
        self.emit_arg(Op::LoadFast, idx)
    }

    pub fn store_fast(&mut self, idx: u16) -> &mut Self {
        self.emit_arg(Op::StoreFast, idx)
    }

    /// `CALL_FUNCTION`: low byte positional count, high byte keyword count.
    pub fn call_function(&mut self, args: u8, kwargs: u8) -> &mut Self {
        self.emit_arg(Op::CallFunction, u16::from_le_bytes([args, kwargs]))
    }

    pub fn setup_loop(&mut self) -> Label {
        self.setup(Op::SetupLoop)
    }

    pub fn setup_except(&mut self) -> Label {
        self.setup(Op::SetupExcept)
    }

    pub fn setup_finally(&mut self) -> Label {
        self.setup(Op::SetupFinally)
    }

    fn setup(&mut self, op: Op) -> Label {
        self.emit_arg(op, 0);
        let base = self.buf.len();
        Label {
            operand_pos: base - 2,
            base,
        }
    }

    /// Point `label` at the current offset.
    pub fn bind(&mut self, label: Label) {
        let delta = self.buf.len() - label.base;
        let delta = u16::try_from(delta).unwrap_or(u16::MAX);
        self.buf[label.operand_pos..label.operand_pos + 2]
            .copy_from_slice(&delta.to_le_bytes());
    }
}
