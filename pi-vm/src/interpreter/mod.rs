//! The bytecode virtual machine: a single-threaded stack interpreter
//! with call frames, closures, an iterator stack, and garbage
//! collection at safe-points.

mod call;
mod ops;
mod slice;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use pi_asm::{BinaryOp, CompareOp, Opcode, PanicReason, UnaryOp};
use pi_cart::Cartridge;

use crate::audio::Mixer;
use crate::consts::{FRAMES_MAX, ITER_MAX, RUN_BUNDLE, STACK_MAX};
use crate::error::{RuntimeError, SimpleResult, Span};
use crate::heap::{Heap, ObjId};
use crate::object::{CodeObject, Object, PiSprite, PiSound, UpvalueRef};
use crate::parser::Chunk;
use crate::screen::Screen;
use crate::table::Table;
use crate::value::Value;

pub use call::NativeFn;

/// Cooperative cancellation handle shared with the host. Clearing it
/// makes the dispatch loop exit at the next safe-point.
#[derive(Debug, Clone)]
pub struct HaltHandle(Arc<AtomicBool>);

impl HaltHandle {
    /// Request that the interpreter stop.
    pub fn halt(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    /// Whether the interpreter is still allowed to run.
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One activation record of the caller, restored on return.
#[derive(Debug, Clone, Copy)]
struct Frame {
    ret_pc: usize,
    bp: usize,
    iter_top: usize,
    code: ObjId,
    function: Option<ObjId>,
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgramState {
    /// `HALT` was reached; the value is what the top of the stack held,
    /// when anything did (REPL compilations leave the last expression
    /// there).
    Completed(Value),
    /// The host cleared the running flag and the loop exited at a
    /// safe-point.
    Cancelled,
}

enum Flow {
    Continue,
    Halt,
}

/// The virtual machine. Generic over the [`Screen`] and [`Mixer`]
/// capabilities so hosts and tests can plug their own devices in.
pub struct Interpreter<S, M> {
    pub(crate) heap: Heap,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    iters: Vec<ObjId>,
    open_upvalues: Vec<(usize, UpvalueRef)>,

    code: Option<ObjId>,
    function: Option<ObjId>,
    pc: usize,
    bp: usize,

    pub(crate) constants: Vec<Value>,
    pub(crate) names: Vec<String>,
    pub(crate) globals: Table,

    natives: Vec<NativeFn<S, M>>,
    /// Values kept alive across re-entrant native calls; see
    /// [`Interpreter::push_root`].
    temp_roots: Vec<Value>,

    running: Arc<AtomicBool>,
    cancelled: bool,

    screen: S,
    mixer: M,
    pub(crate) rng: StdRng,
    /// Sprite sheet and SFX bank taken over from the loaded cartridge.
    pub(crate) sprites: Vec<ObjId>,
    pub(crate) sounds: Vec<ObjId>,
}

impl<S: Screen, M: Mixer> Interpreter<S, M> {
    /// A fresh machine owning the given devices. No globals are
    /// registered; hosts call [`crate::host::register_all`] (or their
    /// own registration) before running programs.
    pub fn new(screen: S, mixer: M) -> Self {
        Interpreter {
            heap: Heap::new(),
            stack: Vec::with_capacity(STACK_MAX),
            frames: Vec::with_capacity(FRAMES_MAX),
            iters: Vec::with_capacity(ITER_MAX),
            open_upvalues: Vec::new(),
            code: None,
            function: None,
            pc: 0,
            bp: 0,
            constants: Vec::new(),
            names: Vec::new(),
            globals: Table::new(),
            natives: Vec::new(),
            temp_roots: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            cancelled: false,
            screen,
            mixer,
            rng: StdRng::seed_from_u64(0x5eed),
            sprites: Vec::new(),
            sounds: Vec::new(),
        }
    }

    /// The object heap.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The object heap, mutably (host functions allocate through it).
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// The screen device.
    pub fn screen(&mut self) -> &mut S {
        &mut self.screen
    }

    /// The mixer device.
    pub fn mixer(&mut self) -> &mut M {
        &mut self.mixer
    }

    /// Handle the host uses to cancel execution from another thread.
    pub fn halt_handle(&self) -> HaltHandle {
        HaltHandle(self.running.clone())
    }

    /// Whether the last run exited because of cancellation.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Take over a cartridge's sprite sheet and SFX bank; the code blob
    /// is the caller's to feed through the compile pipeline.
    pub fn adopt_cartridge(&mut self, cart: &Cartridge) {
        self.sprites = cart
            .sprites
            .iter()
            .map(|s| {
                self.heap.alloc(Object::Sprite(PiSprite {
                    width: s.width,
                    height: s.height,
                    pixels: s.pixels.clone(),
                }))
            })
            .collect();
        self.sounds = cart
            .sfx
            .iter()
            .map(|s| {
                self.heap.alloc(Object::Sound(PiSound {
                    data: s.clone(),
                    from_cart: true,
                }))
            })
            .collect();
    }

    /// Execute a compiled chunk to completion (or cancellation) and
    /// return the final state. The stack, frames, and iterator stack
    /// are reset first; globals persist between runs.
    pub fn run(&mut self, chunk: Chunk) -> Result<ProgramState, RuntimeError> {
        self.stack.clear();
        self.frames.clear();
        self.iters.clear();
        self.open_upvalues.clear();
        self.temp_roots.clear();
        self.constants = chunk.constants;
        self.names = chunk.names;
        self.code = Some(chunk.code);
        self.function = None;
        self.pc = 0;
        self.bp = 0;
        self.cancelled = false;
        self.running.store(true, Ordering::Relaxed);

        self.dispatch(0)?;

        if self.cancelled {
            tracing::debug!("run cancelled at safe-point");
            return Ok(ProgramState::Cancelled);
        }
        Ok(ProgramState::Completed(
            self.stack.last().copied().unwrap_or(Value::Nil),
        ))
    }

    /// Drop all transient execution state while keeping globals and
    /// registered hosts; the next [`Interpreter::run`] starts clean.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.iters.clear();
        self.open_upvalues.clear();
        self.temp_roots.clear();
        self.code = None;
        self.function = None;
        self.pc = 0;
        self.bp = 0;
    }

    // ---- dispatch ----

    fn code_object(&self) -> &CodeObject {
        let id = self.code.expect("dispatch without a loaded code object");
        match self.heap.get(id) {
            Object::Code(c) => c,
            _ => panic!("code handle does not point at bytecode"),
        }
    }

    fn span_here(&self, offset: usize) -> Span {
        self.code_object()
            .span_at(offset)
            .map(|(line, column)| Span::new(line, column))
            .unwrap_or_default()
    }

    /// Run until the frame stack drops below `floor` (for re-entrant
    /// calls) or `HALT` is reached (floor 0).
    fn dispatch(&mut self, floor: usize) -> SimpleResult<()> {
        let mut budget = RUN_BUNDLE;
        loop {
            // Safe-point: cancellation and collection between
            // instruction bundles, never mid-instruction.
            if budget == 0 {
                budget = RUN_BUNDLE;
                if !self.running.load(Ordering::Relaxed) {
                    self.cancelled = true;
                    return Ok(());
                }
                if self.heap.wants_gc() {
                    self.collect_garbage();
                }
            }
            budget -= 1;

            let at = self.pc;
            match self.step() {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => return Ok(()),
                Err(e) => return Err(e.at(self.span_here(at))),
            }
            if self.frames.len() < floor {
                return Ok(());
            }
        }
    }

    fn read_byte(&mut self) -> SimpleResult<u8> {
        let code = self.code_object();
        let byte = *code
            .code
            .get(self.pc)
            .ok_or(PanicReason::InvalidInstruction)?;
        self.pc += 1;
        Ok(byte)
    }

    fn read_short(&mut self) -> SimpleResult<u16> {
        let high = self.read_byte()?;
        let low = self.read_byte()?;
        Ok(u16::from_be_bytes([high, low]))
    }

    pub(crate) fn push(&mut self, value: Value) -> SimpleResult<()> {
        if self.stack.len() >= STACK_MAX {
            return Err(PanicReason::StackOverflow.into());
        }
        self.stack.push(value);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> SimpleResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::from(PanicReason::StackUnderflow))
    }

    fn peek_stack(&self) -> SimpleResult<Value> {
        self.stack
            .last()
            .copied()
            .ok_or_else(|| RuntimeError::from(PanicReason::StackUnderflow))
    }

    fn step(&mut self) -> SimpleResult<Flow> {
        let instr_at = self.pc;
        let byte = self.read_byte()?;
        let op = Opcode::try_from(byte).map_err(|_| PanicReason::InvalidInstruction)?;

        match op {
            Opcode::LoadConst => {
                let index = self.read_short()? as usize;
                let value = *self
                    .constants
                    .get(index)
                    .ok_or(PanicReason::InvalidConstant)?;
                self.push(value)?;
            }
            Opcode::LoadGlobal => {
                let index = self.read_byte()? as usize;
                let name = self
                    .names
                    .get(index)
                    .ok_or(PanicReason::InvalidInstruction)?;
                let value = self.globals.get(name).ok_or_else(|| {
                    RuntimeError::msg(
                        PanicReason::UndefinedGlobal,
                        format!("undefined global '{name}'"),
                    )
                })?;
                self.push(value)?;
            }
            Opcode::StoreGlobal => {
                let index = self.read_byte()? as usize;
                let name = self
                    .names
                    .get(index)
                    .ok_or(PanicReason::InvalidInstruction)?
                    .clone();
                let value = self.pop()?;
                self.globals.insert(name, value);
            }
            Opcode::LoadLocal => {
                let slot = self.bp + self.read_byte()? as usize;
                let value = *self
                    .stack
                    .get(slot)
                    .ok_or(PanicReason::StackUnderflow)?;
                self.push(value)?;
            }
            Opcode::StoreLocal => {
                let slot = self.bp + self.read_byte()? as usize;
                let value = self.pop()?;
                *self
                    .stack
                    .get_mut(slot)
                    .ok_or(PanicReason::StackUnderflow)? = value;
            }
            Opcode::LoadUpvalue => {
                let index = self.read_byte()? as usize;
                let value = self.read_upvalue(index)?;
                self.push(value)?;
            }
            Opcode::StoreUpvalue => {
                let index = self.read_byte()? as usize;
                let value = self.pop()?;
                self.write_upvalue(index, value)?;
            }
            Opcode::PushNil => self.push(Value::Nil)?,
            Opcode::DupTop => {
                let value = self.peek_stack()?;
                self.push(value)?;
            }
            Opcode::Pop => {
                self.pop()?;
            }
            Opcode::PopN => {
                let count = self.read_byte()? as usize;
                if self.stack.len() < count {
                    return Err(PanicReason::StackUnderflow.into());
                }
                self.stack.truncate(self.stack.len() - count);
            }
            Opcode::Jump => {
                let offset = self.read_short()? as i16;
                self.branch(instr_at, offset)?;
            }
            Opcode::JumpIfFalse => {
                let offset = self.read_short()? as i16;
                let cond = self.pop()?;
                if !self.heap.truthy(cond) {
                    self.branch(instr_at, offset)?;
                }
            }
            Opcode::JumpIfTrue => {
                let offset = self.read_short()? as i16;
                let cond = self.pop()?;
                if self.heap.truthy(cond) {
                    self.branch(instr_at, offset)?;
                }
            }
            Opcode::Call => {
                let argc = self.read_byte()? as usize;
                self.enter_call(argc)?;
            }
            Opcode::Return => self.handle_return()?,
            Opcode::Halt => return Ok(Flow::Halt),
            Opcode::Binary => {
                let sub = BinaryOp::try_from(self.read_byte()?)?;
                self.binary(sub)?;
            }
            Opcode::Compare => {
                let sub = CompareOp::try_from(self.read_byte()?)?;
                self.compare(sub)?;
            }
            Opcode::Unary => {
                let sub = UnaryOp::try_from(self.read_byte()?)?;
                self.unary(sub)?;
            }
            Opcode::PushList => {
                let count = self.read_short()? as usize;
                if self.stack.len() < count {
                    return Err(PanicReason::StackUnderflow.into());
                }
                let items = self.stack.split_off(self.stack.len() - count);
                let list = self.heap.alloc_list(items);
                self.push(list)?;
            }
            Opcode::PushMap => {
                let pairs = self.read_short()? as usize;
                self.build_map(pairs)?;
            }
            Opcode::PushRange => {
                let inclusive = self.read_byte()? != 0;
                let step = self.pop()?;
                let end = self.pop()?;
                let start = self.pop()?;
                let start = self.heap.as_number(start)?;
                let end = self.heap.as_number(end)?;
                let step = match step {
                    // Default stride walks toward the end bound.
                    Value::Nil => {
                        if end >= start {
                            1.0
                        } else {
                            -1.0
                        }
                    }
                    other => self.heap.as_number(other)?,
                };
                let range = self.heap.alloc_range(start, end, step, inclusive)?;
                self.push(range)?;
            }
            Opcode::PushSlice => {
                let step = self.pop()?;
                let end = self.pop()?;
                let start = self.pop()?;
                let seq = self.pop()?;
                let step = self.heap.as_number(step)?;
                let end = self.heap.as_number(end)?;
                let start = self.heap.as_number(start)?;
                let sliced = self.get_slice(seq, start, end, step)?;
                self.push(sliced)?;
            }
            Opcode::GetItem => {
                let key = self.pop()?;
                let target = self.pop()?;
                let value = self.get_item(target, key)?;
                self.push(value)?;
            }
            Opcode::SetItem => {
                let key = self.pop()?;
                let target = self.pop()?;
                let value = self.pop()?;
                self.set_item(target, key, value)?;
            }
            Opcode::PushIter => {
                let value = self.pop()?;
                let id = value.as_obj().ok_or_else(|| {
                    RuntimeError::msg(
                        PanicReason::NotIterable,
                        format!("{} is not iterable", self.heap.type_name(value)),
                    )
                })?;
                if !self.heap.get(id).is_iterable() {
                    return Err(RuntimeError::msg(
                        PanicReason::NotIterable,
                        format!("{} is not iterable", self.heap.type_name(value)),
                    ));
                }
                if self.iters.len() >= ITER_MAX {
                    return Err(PanicReason::IterDepthExceeded.into());
                }
                self.heap.iter_reset(id)?;
                self.iters.push(id);
            }
            Opcode::PopIter => {
                self.iters.pop();
            }
            Opcode::Loop => {
                let offset = self.read_short()? as i16;
                let iter = *self
                    .iters
                    .last()
                    .ok_or(PanicReason::StackUnderflow)?;
                if self.heap.iter_has_next(iter)? {
                    let value = self.heap.iter_next(iter)?;
                    self.push(value)?;
                } else {
                    self.iters.pop();
                    self.branch(instr_at, offset)?;
                }
            }
            Opcode::PushFunction => {
                let operand = self.read_byte()?;
                self.build_function(operand, 0)?;
            }
            Opcode::PushClosure => {
                let operand = self.read_short()?;
                let params_byte = (operand >> 8) as u8;
                let upvalues = (operand & 0xff) as usize;
                self.build_function(params_byte, upvalues)?;
            }
            Opcode::CloseUpvalue => {
                let slot = self.read_byte()? as usize;
                self.close_upvalues(self.bp + slot);
            }
            Opcode::Nop => {}
            Opcode::Debug => {
                tracing::debug!(
                    pc = self.pc,
                    stack = self.stack.len(),
                    frames = self.frames.len(),
                    iterators = self.iters.len(),
                    objects = self.heap.len(),
                    "debug statement"
                );
            }
            Opcode::Print => {
                let value = self.pop()?;
                println!("{}", self.heap.display(value));
            }
        }
        Ok(Flow::Continue)
    }

    fn branch(&mut self, instr_at: usize, offset: i16) -> SimpleResult<()> {
        let target = instr_at as isize + offset as isize;
        if target < 0 || target as usize > self.code_object().code.len() {
            return Err(PanicReason::InvalidInstruction.into());
        }
        self.pc = target as usize;
        Ok(())
    }

    // ---- garbage collection ----

    /// Keep a value alive across re-entrant native calls (the operand
    /// stack no longer holds it once the native popped its arguments).
    pub fn push_root(&mut self, value: Value) {
        self.temp_roots.push(value);
    }

    /// Release values pinned with [`Interpreter::push_root`].
    pub fn pop_roots(&mut self, count: usize) {
        let keep = self.temp_roots.len().saturating_sub(count);
        self.temp_roots.truncate(keep);
    }

    fn collect_garbage(&mut self) {
        let mut values: Vec<Value> = Vec::with_capacity(
            self.stack.len() + self.constants.len() + self.globals.len() + 8,
        );
        values.extend(self.stack.iter().copied());
        values.extend(self.constants.iter().copied());
        values.extend(self.globals.values());
        values.extend(self.temp_roots.iter().copied());
        for (_, cell) in &self.open_upvalues {
            if let crate::object::UpvalueCell::Closed(v) = *cell.borrow() {
                values.push(v);
            }
        }

        let mut objects: Vec<ObjId> = Vec::new();
        objects.extend(self.iters.iter().copied());
        objects.extend(self.code);
        objects.extend(self.function);
        for frame in &self.frames {
            objects.push(frame.code);
            objects.extend(frame.function);
        }
        objects.extend(self.sprites.iter().copied());
        objects.extend(self.sounds.iter().copied());

        self.heap.collect(values, objects);
    }

    // ---- upvalues ----

    fn current_upvalue(&self, index: usize) -> SimpleResult<UpvalueRef> {
        let function = self.function.ok_or(PanicReason::InvalidInstruction)?;
        match self.heap.get(function) {
            Object::Function(f) => f
                .upvalues
                .get(index)
                .cloned()
                .ok_or_else(|| RuntimeError::from(PanicReason::InvalidInstruction)),
            _ => Err(PanicReason::InvalidInstruction.into()),
        }
    }

    fn read_upvalue(&self, index: usize) -> SimpleResult<Value> {
        let cell = self.current_upvalue(index)?;
        let value = match &*cell.borrow() {
            crate::object::UpvalueCell::Open(slot) => *self
                .stack
                .get(*slot)
                .ok_or(PanicReason::StackUnderflow)?,
            crate::object::UpvalueCell::Closed(v) => *v,
        };
        Ok(value)
    }

    fn write_upvalue(&mut self, index: usize, value: Value) -> SimpleResult<()> {
        let cell = self.current_upvalue(index)?;
        let slot = match &*cell.borrow() {
            crate::object::UpvalueCell::Open(slot) => Some(*slot),
            crate::object::UpvalueCell::Closed(_) => None,
        };
        match slot {
            Some(slot) => {
                *self
                    .stack
                    .get_mut(slot)
                    .ok_or(PanicReason::StackUnderflow)? = value;
            }
            None => *cell.borrow_mut() = crate::object::UpvalueCell::Closed(value),
        }
        Ok(())
    }

    /// Find or create the shared cell for a live stack slot. The open
    /// list stays ordered by descending index.
    pub(crate) fn capture_upvalue(&mut self, slot: usize) -> UpvalueRef {
        if let Some((_, cell)) = self.open_upvalues.iter().find(|(i, _)| *i == slot) {
            return cell.clone();
        }
        let cell = crate::object::open_upvalue(slot);
        let at = self
            .open_upvalues
            .iter()
            .position(|(i, _)| *i < slot)
            .unwrap_or(self.open_upvalues.len());
        self.open_upvalues.insert(at, (slot, cell.clone()));
        cell
    }

    /// Close every open upvalue at or above `from`: move the stack
    /// value into the cell and drop the cell from the open list.
    pub(crate) fn close_upvalues(&mut self, from: usize) {
        // Descending order puts everything >= `from` at the front.
        while let Some((slot, _)) = self.open_upvalues.first() {
            if *slot < from {
                break;
            }
            let (slot, cell) = self.open_upvalues.remove(0);
            let value = self.stack.get(slot).copied().unwrap_or(Value::Nil);
            *cell.borrow_mut() = crate::object::UpvalueCell::Closed(value);
        }
    }
}
