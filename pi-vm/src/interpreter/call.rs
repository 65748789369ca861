//! Calling convention: frames, argument layout, native dispatch, and
//! function/closure construction.
//!
//! `CALL(argc)` finds the callee under the arguments. Scripted calls
//! lay the frame out as `[params… (slot 0 is `this` for methods),
//! args-list, block locals…]` with `bp` at the first parameter slot;
//! missing arguments take their declared defaults and every actual
//! lands in the implicit `args` list. Natives are invoked directly
//! with the popped arguments.

use pi_asm::PanicReason;

use crate::audio::Mixer;
use crate::consts::{FRAMES_MAX, STACK_MAX};
use crate::error::{RuntimeError, SimpleResult};
use crate::heap::ObjId;
use crate::object::{Function, Object};
use crate::screen::Screen;
use crate::value::Value;

use super::{Frame, Interpreter};

/// Signature of a registered host function.
pub type NativeFn<S, M> = fn(&mut Interpreter<S, M>, &[Value]) -> SimpleResult<Value>;

impl<S: Screen, M: Mixer> Interpreter<S, M> {
    /// Register a host function under a global name. The global table
    /// ends up holding a `Function` whose native index dispatches to
    /// `func`.
    pub fn register_native(&mut self, name: &str, func: NativeFn<S, M>) {
        let native = self.natives.len();
        self.natives.push(func);
        let id = self.heap.alloc(Object::Function(Function {
            name: name.to_owned(),
            native: Some(native),
            ..Function::default()
        }));
        self.globals.insert(name, Value::Obj(id));
    }

    /// Register a host constant under a global name.
    pub fn register_const(&mut self, name: &str, value: Value) {
        self.globals.insert(name, value);
    }

    /// `CALL(argc)`: consume the callee and arguments from the stack
    /// and either invoke a native or push a frame for scripted code.
    pub(crate) fn enter_call(&mut self, argc: usize) -> SimpleResult<()> {
        if self.stack.len() < argc + 1 {
            return Err(PanicReason::StackUnderflow.into());
        }
        let base = self.stack.len() - argc;
        let callee = self.stack[base - 1];

        let id = callee.as_obj().ok_or_else(|| self.not_callable(callee))?;
        let function = match self.heap.get(id) {
            Object::Function(f) => f.clone(),
            _ => return Err(self.not_callable(callee)),
        };

        let args = self.stack.split_off(base);
        self.stack.pop(); // the callee

        if let Some(native) = function.native {
            // Native faults keep their own message; the dispatch loop
            // pins them to the call site's position.
            let func = self.natives[native];
            let result = func(self, &args)?;
            return self.push(result);
        }

        self.push_script_frame(id, &function, args)
    }

    fn not_callable(&self, callee: Value) -> RuntimeError {
        RuntimeError::msg(
            PanicReason::NotCallable,
            format!("cannot call a {}", self.heap.type_name(callee)),
        )
    }

    fn push_script_frame(
        &mut self,
        id: ObjId,
        function: &Function,
        mut args: Vec<Value>,
    ) -> SimpleResult<()> {
        if self.frames.len() >= FRAMES_MAX {
            return Err(PanicReason::CallDepthExceeded.into());
        }

        let params = function.params.len();
        if self.stack.len() + params + 1 >= STACK_MAX {
            return Err(PanicReason::StackOverflow.into());
        }

        if function.is_method {
            let this = function
                .instance
                .map(Value::Obj)
                .unwrap_or(Value::Nil);
            args.insert(0, this);
        }

        self.frames.push(Frame {
            ret_pc: self.pc,
            bp: self.bp,
            iter_top: self.iters.len(),
            code: self.code.ok_or(PanicReason::InvalidInstruction)?,
            function: self.function,
        });

        let bp = self.stack.len();
        for slot in 0..params {
            let value = args
                .get(slot)
                .copied()
                .unwrap_or_else(|| function.params[slot]);
            self.stack.push(value);
        }
        // Every actual, packed into the implicit trailing `args` list.
        let args_list = self.heap.alloc_list(args);
        self.stack.push(args_list);

        self.bp = bp;
        self.function = Some(id);
        self.code = Some(function.code.ok_or(PanicReason::InvalidInstruction)?);
        self.pc = 0;
        Ok(())
    }

    /// `RETURN`: restore the caller, dropping this frame's locals and
    /// abandoned iterators, closing its captured slots first.
    pub(crate) fn handle_return(&mut self) -> SimpleResult<()> {
        let value = self.pop()?;
        let frame = self
            .frames
            .pop()
            .ok_or(PanicReason::StackUnderflow)?;

        self.close_upvalues(self.bp);
        self.stack.truncate(self.bp);
        self.iters.truncate(frame.iter_top);

        self.pc = frame.ret_pc;
        self.bp = frame.bp;
        self.code = Some(frame.code);
        self.function = frame.function;

        self.push(value)
    }

    /// Invoke any callable from host code, re-entering the dispatch
    /// loop for scripted functions. The callee and arguments ride the
    /// operand stack for the duration, so they stay GC-rooted.
    pub fn call_value(&mut self, callee: Value, args: &[Value]) -> SimpleResult<Value> {
        self.push(callee)?;
        for arg in args {
            self.push(*arg)?;
        }

        let floor = self.frames.len() + 1;
        self.enter_call(args.len())?;
        if self.frames.len() >= floor {
            // A scripted callee: run its frame to completion.
            self.dispatch(floor)?;
            if self.cancelled {
                return Ok(Value::Nil);
            }
        }
        self.pop()
    }

    /// `PUSH_FUNCTION` / `PUSH_CLOSURE`: build a function value from
    /// the stacked name, code, capture descriptors, and defaults. The
    /// high bit of the parameter byte marks a method literal.
    pub(crate) fn build_function(
        &mut self,
        params_byte: u8,
        upvalue_count: usize,
    ) -> SimpleResult<()> {
        let is_method = params_byte & 0x80 != 0;
        let params = (params_byte & 0x7f) as usize;

        // Capture descriptors sit topmost, two values per upvalue.
        let mut upvalues = Vec::with_capacity(upvalue_count);
        if upvalue_count > 0 {
            if self.stack.len() < upvalue_count * 2 {
                return Err(PanicReason::StackUnderflow.into());
            }
            let descs = self.stack.split_off(self.stack.len() - upvalue_count * 2);
            for pair in descs.chunks_exact(2) {
                let index = self.heap.as_number(pair[0])? as usize;
                let is_local = self.heap.truthy(pair[1]);
                let cell = if is_local {
                    self.capture_upvalue(self.bp + index)
                } else {
                    self.current_upvalue(index)?
                };
                upvalues.push(cell);
            }
        }

        let code = self.pop()?;
        let name = self.pop()?;

        if self.stack.len() < params {
            return Err(PanicReason::StackUnderflow.into());
        }
        let defaults = self.stack.split_off(self.stack.len() - params);

        let code = code
            .as_obj()
            .filter(|id| matches!(self.heap.get(*id), Object::Code(_)))
            .ok_or(PanicReason::InvalidInstruction)?;
        let name = self.heap.display(name);

        let id = self.heap.alloc(Object::Function(Function {
            name,
            params: defaults,
            code: Some(code),
            upvalues,
            instance: None,
            is_method,
            native: None,
        }));
        self.push(Value::Obj(id))
    }

    /// `PUSH_MAP(pairs)`: collect stacked `value, key` pairs into an
    /// ordered map, binding method literals to the new map.
    pub(crate) fn build_map(&mut self, pairs: usize) -> SimpleResult<()> {
        if self.stack.len() < pairs * 2 {
            return Err(PanicReason::StackUnderflow.into());
        }
        let flat = self.stack.split_off(self.stack.len() - pairs * 2);

        let mut table = crate::table::Table::new();
        let mut methods: Vec<ObjId> = Vec::new();
        for chunk in flat.chunks_exact(2) {
            let (value, key) = (chunk[0], chunk[1]);
            let key = self.heap.display(key);
            if let Some(id) = value.as_obj() {
                if matches!(self.heap.get(id), Object::Function(f) if f.is_method && f.instance.is_none())
                {
                    methods.push(id);
                }
            }
            table.insert(key, value);
        }

        let map = self.heap.alloc_map(table);
        let map_id = map.as_obj().ok_or(PanicReason::InvalidInstruction)?;
        for method in methods {
            if let Object::Function(f) = self.heap.get_mut(method) {
                f.instance = Some(map_id);
            }
        }
        self.push(map)
    }
}
