use std::io::Write;

use bytecode::{Op, decode_at, opcode_name};
use heap::{CodeField, Heap, HeapError};
use object::{Handle, Tag};

use crate::config::VmConfig;
use crate::error::{Arity, ErrorKind, RuntimeError, StackKind};
use crate::frame::{BlockKind, Frame};
use crate::primitives::{NativeContext, NativeRegistry};
use crate::value::Value;

/// Control signal produced by each instruction.
///
/// `Not` keeps the loop going; anything else ends the current block or frame
/// until something catches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Why {
    Not,
    Exception,
    Reraise,
    Return,
    Break,
    Continue,
    Yield,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The entry frame executed `RETURN_VALUE`.
    Returned(Value),
    /// The entry frame ran off the end of its bytecode.
    Finished,
    /// An exception escaped every frame.
    Raised(RuntimeError),
}

impl Completion {
    pub fn why(&self) -> Why {
        match self {
            Completion::Returned(_) => Why::Return,
            Completion::Finished => Why::Not,
            Completion::Raised(_) => Why::Exception,
        }
    }
}

/// What one instruction asks the run loop to do next.
enum Flow<'h> {
    Next,
    Signal(Why),
    Return(Value),
    Call(Box<Frame<'h>>),
}

/// Bytecode interpreter over a loaded heap.
///
/// Calls between compiled code objects push onto `frames` instead of
/// recursing, so call depth is bounded only by [`VmConfig::max_frames`].
pub struct Vm<'h, W: Write> {
    heap: &'h Heap,
    config: VmConfig,
    natives: NativeRegistry,
    frames: Vec<Frame<'h>>,
    out: W,
    last_exception: Option<RuntimeError>,
    executed: u64,
}

impl<'h, W: Write> Vm<'h, W> {
    pub fn new(heap: &'h Heap, out: W) -> Self {
        Self::with_config(heap, out, VmConfig::default())
    }

    pub fn with_config(heap: &'h Heap, out: W, config: VmConfig) -> Self {
        Self {
            heap,
            config,
            natives: NativeRegistry::default(),
            frames: Vec::new(),
            out,
            last_exception: None,
            executed: 0,
        }
    }

    pub fn heap(&self) -> &'h Heap {
        self.heap
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    pub fn natives_mut(&mut self) -> &mut NativeRegistry {
        &mut self.natives
    }

    /// Live frames, innermost last.
    pub fn frames(&self) -> &[Frame<'h>] {
        &self.frames
    }

    /// The most recent error raised, whether or not a handler caught it.
    pub fn last_exception(&self) -> Option<&RuntimeError> {
        self.last_exception.as_ref()
    }

    /// Instructions dispatched so far.
    pub fn executed(&self) -> u64 {
        self.executed
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Push a frame for the code object at `code`.
    pub fn enter(&mut self, code: Handle) -> Result<(), RuntimeError> {
        let located = |kind: ErrorKind| RuntimeError {
            kind,
            code: code.to_string(),
            offset: 0,
        };
        if self.frames.len() >= self.config.max_frames {
            return Err(located(ErrorKind::RecursionLimit(self.config.max_frames)));
        }
        let view = self.heap.code(code).map_err(|err| located(err.into()))?;
        let frame = Frame::new(view).map_err(|err| located(err.into()))?;
        log_frame_entry(&frame);
        self.frames.push(frame);
        Ok(())
    }

    /// Run the heap's last cell, which must be a code object.
    pub fn run_main(&mut self) -> Completion {
        let entered = match self.heap.last() {
            Some(entry) => self.enter(entry),
            None => Err(RuntimeError {
                kind: ErrorKind::Heap(HeapError::InvalidHandle(0)),
                code: "<entry>".to_string(),
                offset: 0,
            }),
        };
        if let Err(err) = entered {
            log::debug!("cannot enter main code: {err}");
            self.last_exception = Some(err.clone());
            return Completion::Raised(err);
        }
        self.run()
    }

    /// Step until the frame stack is empty.
    pub fn run(&mut self) -> Completion {
        loop {
            if let Some(done) = self.step() {
                log::debug!(
                    "run ended with {:?} after {} instructions",
                    done.why(),
                    self.executed
                );
                return done;
            }
        }
    }

    /// Execute one instruction of the innermost frame. Returns `Some` on the
    /// step that empties the frame stack.
    pub fn step(&mut self) -> Option<Completion> {
        let frame = self.frames.last()?;
        if frame.is_finished() {
            return self.fall_off();
        }
        match self.execute() {
            Ok(Flow::Next) => None,
            Ok(Flow::Call(callee)) => {
                log_frame_entry(&callee);
                self.frames.push(*callee);
                None
            }
            Ok(Flow::Return(value)) => self.return_value(value),
            Ok(Flow::Signal(why)) => self.signal(why),
            Err(kind) => self.raise(kind),
        }
    }

    fn execute(&mut self) -> Result<Flow<'h>, ErrorKind> {
        let depth = self.frames.len();
        let Self {
            heap,
            config,
            natives,
            frames,
            out,
            executed,
            ..
        } = self;
        let heap: &'h Heap = *heap;
        let Some(frame) = frames.last_mut() else {
            return Ok(Flow::Next);
        };

        let instr = decode_at(frame.bytecode(), frame.ip)?;
        frame.current = instr.offset;
        frame.ip = instr.next_offset();
        *executed += 1;
        log::trace!("{}: {instr}", frame.name());

        let op = instr.op().map_err(unsupported)?;
        let arg = instr.arg() as usize;
        match op {
            Op::PopTop => {
                frame.pop()?;
            }
            Op::LoadConst => {
                let value = frame.const_at(arg)?;
                frame.push(value);
            }
            Op::LoadName => {
                let name = frame.name_at(arg)?;
                let value = frame.load_name(name, natives, config.unbound_names)?;
                frame.push(value);
            }
            Op::StoreName => {
                let name = heap.str(frame.name_at(arg)?)?;
                let value = frame.pop()?;
                frame.bind(name.as_bytes(), value);
            }
            Op::LoadFast => {
                let name = heap.str(frame.varname_at(arg)?)?;
                let value = frame
                    .local(name.as_bytes())
                    .ok_or_else(|| ErrorKind::UnboundName(name.to_string_lossy()))?;
                frame.push(value);
            }
            Op::StoreFast => {
                let name = heap.str(frame.varname_at(arg)?)?;
                let value = frame.pop()?;
                frame.bind(name.as_bytes(), value);
            }
            Op::CallFunction => {
                return call_function(heap, natives, out, config, depth, frame, instr.arg());
            }
            Op::ReturnValue => {
                let value = frame.pop()?;
                return Ok(Flow::Return(value));
            }
            Op::SetupLoop => frame.push_block(BlockKind::Loop, instr.next_offset() + arg),
            Op::SetupExcept => frame.push_block(BlockKind::Except, instr.next_offset() + arg),
            Op::SetupFinally => {
                frame.push_block(BlockKind::Finally, instr.next_offset() + arg)
            }
            Op::PopBlock => {
                frame.pop_block()?;
            }
            Op::BreakLoop => {
                if !frame.blocks().iter().any(|b| b.kind == BlockKind::Loop) {
                    return Err(ErrorKind::StackUnderflow(StackKind::Block));
                }
                return Ok(Flow::Signal(Why::Break));
            }
            other => return Err(unsupported(other as u8)),
        }
        Ok(Flow::Next)
    }

    fn return_value(&mut self, value: Value) -> Option<Completion> {
        if let Some(frame) = self.frames.pop() {
            log::debug!("{} returned {}", frame.name(), value.describe(self.heap));
        }
        match self.frames.last_mut() {
            Some(caller) => {
                caller.push(value);
                None
            }
            None => Some(Completion::Returned(value)),
        }
    }

    /// The innermost frame ran out of bytecode.
    fn fall_off(&mut self) -> Option<Completion> {
        let frame = self.frames.pop()?;
        log::debug!("{} finished without RETURN_VALUE", frame.name());
        if self.frames.is_empty() {
            return Some(Completion::Finished);
        }
        // The caller expected one value back and got none.
        self.raise(Arity::Returns(0).into())
    }

    fn signal(&mut self, why: Why) -> Option<Completion> {
        if why == Why::Break {
            if let Some(frame) = self.frames.last_mut() {
                if let Some(block) = frame.unwind_blocks(|kind| kind == BlockKind::Loop) {
                    frame.truncate(block.level);
                    frame.ip = block.handler;
                    return None;
                }
            }
        }
        self.raise(ErrorKind::UnhandledSignal(why))
    }

    /// Locate `kind` at the current instruction and unwind to the nearest
    /// handler block, discarding frames that have none.
    fn raise(&mut self, kind: ErrorKind) -> Option<Completion> {
        let err = match self.frames.last() {
            Some(frame) => RuntimeError {
                kind,
                code: frame.name().to_string(),
                offset: frame.current,
            },
            None => RuntimeError {
                kind,
                code: String::new(),
                offset: 0,
            },
        };
        log::debug!("raised {err}");
        self.last_exception = Some(err.clone());

        while let Some(frame) = self.frames.last_mut() {
            let caught = frame.unwind_blocks(|k| {
                matches!(k, BlockKind::Except | BlockKind::Finally | BlockKind::With)
            });
            if let Some(block) = caught {
                frame.truncate(block.level);
                frame.push(Value::Exception);
                frame.ip = block.handler;
                log::debug!("caught in {} at offset {}", frame.name(), block.handler);
                return None;
            }
            self.frames.pop();
        }
        Some(Completion::Raised(err))
    }
}

fn unsupported(opcode: u8) -> ErrorKind {
    ErrorKind::UnsupportedOpcode {
        opcode,
        name: opcode_name(opcode),
    }
}

/// `CALL_FUNCTION`: the operand's low byte counts positional arguments, the
/// high byte keyword pairs. The callee sits below the arguments.
fn call_function<'h, W: Write>(
    heap: &'h Heap,
    natives: &NativeRegistry,
    out: &mut W,
    config: &VmConfig,
    depth: usize,
    frame: &mut Frame<'h>,
    oparg: u16,
) -> Result<Flow<'h>, ErrorKind> {
    let [positional, keyword] = oparg.to_le_bytes();
    if keyword > 0 {
        return Err(Arity::KeywordArgs(keyword).into());
    }
    let positional = positional as usize;
    if frame.depth() <= positional {
        return Err(ErrorKind::StackUnderflow(StackKind::Value));
    }
    let args = frame.pop_n(positional)?;
    let callee = frame.pop()?;

    if log::log_enabled!(log::Level::Trace) {
        let rendered: Vec<String> = args.iter().map(|a| a.describe(heap)).collect();
        log::trace!("call {} ({})", callee.describe(heap), rendered.join(", "));
    }

    match callee {
        Value::Native(id) => {
            let desc = natives
                .get(id)
                .ok_or_else(|| ErrorKind::NotCallable(callee.to_string()))?;
            if args.len() != desc.arity as usize {
                return Err(Arity::Args {
                    name: desc.name.to_string(),
                    expected: i64::from(desc.arity),
                    given: args.len(),
                }
                .into());
            }

            let mut ctx = NativeContext::new(heap, out);
            let mut rets = Vec::with_capacity(1);
            match (desc.func)(&mut ctx, &args, &mut rets) {
                Why::Not => {}
                Why::Exception => {
                    return Err(ctx.take_error().unwrap_or_else(|| ErrorKind::NativeFailure {
                        name: desc.name,
                        reason: "raised without an error".to_string(),
                    }));
                }
                other => return Err(ErrorKind::UnhandledSignal(other)),
            }
            if rets.len() != 1 {
                return Err(Arity::Returns(rets.len()).into());
            }
            frame.push(rets[0]);
            Ok(Flow::Next)
        }
        Value::Cell(handle) if heap.tag(handle)? == Tag::Code.raw() => {
            if depth >= config.max_frames {
                return Err(ErrorKind::RecursionLimit(config.max_frames));
            }
            let mut callee = Frame::new(heap.code(handle)?)?;
            let expected = callee.code().argcount()?;
            if i64::try_from(args.len()) != Ok(expected) {
                return Err(Arity::Args {
                    name: callee.name().to_string(),
                    expected,
                    given: args.len(),
                }
                .into());
            }
            for (index, value) in args.into_iter().enumerate() {
                let name = heap.str(callee.varname_at(index)?)?;
                callee.bind(name.as_bytes(), value);
            }
            Ok(Flow::Call(Box::new(callee)))
        }
        other => Err(ErrorKind::NotCallable(other.describe(heap))),
    }
}

const HEADER_FIELDS: [CodeField; 7] = [
    CodeField::ArgCount,
    CodeField::NLocals,
    CodeField::StackSize,
    CodeField::Flags,
    CodeField::FirstLineNo,
    CodeField::Name,
    CodeField::Filename,
];

fn log_frame_entry(frame: &Frame<'_>) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let code = frame.code();
    let heap = frame.heap();
    log::debug!("entering {} ({})", frame.name(), code.handle());
    for field in HEADER_FIELDS {
        match code.field(field) {
            Ok(handle) => log::debug!("  {:<12} {}", field.name(), heap.debug_string(handle)),
            Err(err) => log::debug!("  {:<12} {err}", field.name()),
        }
    }
    log::debug!("  {:<12} {} bytes", "code", frame.bytecode().len());
    for (label, table) in [
        ("names", code.names()),
        ("varnames", code.varnames()),
        ("consts", code.consts()),
    ] {
        match table {
            Ok(table) => log::debug!("  {label:<12} {} entries", table.len()),
            Err(err) => log::debug!("  {label:<12} {err}"),
        }
    }
    if let Ok(consts) = code.consts() {
        for (index, raw) in consts.iter().enumerate() {
            let rendered = match Value::from_raw(heap, raw) {
                Ok(value) => value.describe(heap),
                Err(err) => err.to_string(),
            };
            log::debug!("  const {index:<6} {rendered}");
        }
    }
}
