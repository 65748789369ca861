//! Bytecode emission backend: compilation contexts, scope and upvalue
//! resolution, constant interning, and jump patching.

use pi_asm::Opcode;

use crate::error::{CompileError, CompileResult, Span};
use crate::heap::Heap;
use crate::object::{CodeObject, Object};
use crate::token::Token;
use crate::value::Value;

/// A named slot in the current scope.
#[derive(Debug, Clone)]
pub struct Local {
    pub name: String,
    pub depth: u32,
    /// Set when an inner function captures the slot; the scope exit
    /// then closes the upvalue.
    pub is_captured: bool,
}

/// One captured-variable descriptor recorded during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueDesc {
    /// Local slot in the enclosing context, or upvalue slot there.
    pub index: u8,
    /// Whether `index` addresses the enclosing context's locals.
    pub is_local: bool,
}

/// Per-function compilation context.
#[derive(Debug, Default)]
pub struct Context {
    pub is_function: bool,
    pub fun_name: Option<String>,
    pub code: Vec<u8>,
    pub spans: Vec<(u32, u32, u32)>,
    pub upvalues: Vec<UpvalueDesc>,
    pub locals: Vec<Local>,
    pub depth: u32,
}

/// Loop bookkeeping for `break`/`continue`.
#[derive(Debug)]
struct LoopCtx {
    continue_at: usize,
    depth: u32,
    breaks: Vec<usize>,
    is_for: bool,
}

/// The emission backend shared by every parse function.
pub struct Compiler<'h> {
    pub heap: &'h mut Heap,
    pub constants: Vec<Value>,
    pub names: Vec<String>,
    contexts: Vec<Context>,
    loops: Vec<LoopCtx>,
    /// Nesting of map/object literals (method bodies bind `this`).
    objects: Vec<String>,
    /// When set, parsing proceeds but nothing is emitted. Used for the
    /// parser's look-ahead passes.
    suppress: bool,
    pub is_repl: bool,
    line: u32,
    column: u32,
    anon_count: u32,
    /// Scratch set by variable resolution: the last lookup landed on
    /// an upvalue slot rather than a local one.
    is_upvalue: bool,
}

impl<'h> Compiler<'h> {
    /// Fresh compiler with the reserved constant-pool entries.
    pub fn new(heap: &'h mut Heap, is_repl: bool) -> Self {
        let constants = vec![
            Value::Num(f64::NAN),
            Value::Num(f64::INFINITY),
            Value::Bool(true),
            Value::Bool(false),
        ];
        Compiler {
            heap,
            constants,
            names: Vec::new(),
            contexts: vec![Context {
                is_function: false,
                ..Context::default()
            }],
            loops: Vec::new(),
            objects: Vec::new(),
            suppress: false,
            is_repl,
            line: 1,
            column: 1,
            anon_count: 0,
            is_upvalue: false,
        }
    }

    fn current(&self) -> &Context {
        self.contexts.last().expect("context stack is never empty")
    }

    fn current_mut(&mut self) -> &mut Context {
        self.contexts.last_mut().expect("context stack is never empty")
    }

    /// Sync the emission position to a token; every instruction emitted
    /// afterwards carries this source position.
    pub fn set_pos(&mut self, token: &Token) {
        self.line = token.line;
        self.column = token.column;
    }

    /// Current emission position, for error reporting.
    pub fn pos(&self) -> Span {
        Span::new(self.line, self.column)
    }

    /// Swap the suppression flag, returning the previous state.
    pub fn look_up(&mut self, value: bool) -> bool {
        std::mem::replace(&mut self.suppress, value)
    }

    /// Whether emission is currently suppressed.
    pub fn is_look_up(&self) -> bool {
        self.suppress
    }

    // ---- emission ----

    fn push_instr(&mut self, bytes: &[u8]) -> usize {
        let (line, column) = (self.line, self.column);
        let ctx = self.current_mut();
        let offset = ctx.code.len();
        ctx.spans.push((offset as u32, line, column));
        ctx.code.extend_from_slice(bytes);
        ctx.code.len() - 1
    }

    /// Emit a bare opcode. Returns the index of its last byte.
    pub fn emit(&mut self, op: Opcode) -> usize {
        if self.suppress {
            return 0;
        }
        self.push_instr(&[op as u8])
    }

    /// Emit an opcode with a one-byte operand.
    pub fn emit_8(&mut self, op: Opcode, operand: u8) -> usize {
        if self.suppress {
            return 0;
        }
        self.push_instr(&[op as u8, operand])
    }

    /// Emit an opcode with a big-endian two-byte operand. Returns the
    /// index of the low operand byte, which is what [`Self::patch_jump`]
    /// expects back.
    pub fn emit_16(&mut self, op: Opcode, operand: u16) -> usize {
        if self.suppress {
            return 0;
        }
        self.push_instr(&[op as u8, (operand >> 8) as u8, (operand & 0xff) as u8])
    }

    /// Current code size of the active context.
    pub fn code_size(&self) -> usize {
        self.current().code.len()
    }

    /// Patch a forward branch emitted with a zero offset so it lands on
    /// the current end of code. `address` is the low operand byte as
    /// returned by [`Self::emit_16`]; offsets are relative to the
    /// opcode byte.
    pub fn patch_jump(&mut self, address: usize) {
        if self.suppress {
            return;
        }
        let target = self.current().code.len();
        let offset = (target as isize - (address as isize - 2)) as i16;
        let code = &mut self.current_mut().code;
        code[address - 1] = (offset as u16 >> 8) as u8;
        code[address] = (offset as u16 & 0xff) as u8;
    }

    /// Emit an unconditional jump whose *target* is an absolute code
    /// index (used for back-edges). Returns the low operand byte index.
    pub fn emit_jump_to(&mut self, target: usize) -> usize {
        if self.suppress {
            return 0;
        }
        let offset = (target as isize - self.current().code.len() as isize) as i16;
        self.emit_16(Opcode::Jump, offset as u16)
    }

    /// Emit a forward jump to be patched later.
    pub fn emit_jump(&mut self) -> usize {
        self.emit_16(Opcode::Jump, 0)
    }

    // ---- constants and names ----

    /// Intern a constant by structural equality and return its index.
    /// `NaN` never equals itself structurally, so it is pinned to the
    /// reserved slot up front.
    pub fn store_const(&mut self, value: Value) -> CompileResult<u16> {
        if matches!(value, Value::Num(n) if n.is_nan()) {
            return Ok(pi_asm::CONST_NAN);
        }
        for (i, existing) in self.constants.iter().enumerate() {
            if self.heap.deep_equals(*existing, value) {
                return Ok(i as u16);
            }
        }
        if self.constants.len() > u16::MAX as usize {
            return Err(self.error_here("too many constants in one program"));
        }
        self.constants.push(value);
        Ok((self.constants.len() - 1) as u16)
    }

    /// Index of a name in the global name table, if present.
    pub fn name_index(&self, name: &str) -> Option<u8> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| i as u8)
    }

    /// Intern a global name.
    pub fn store_name(&mut self, name: &str) -> CompileResult<u8> {
        if let Some(index) = self.name_index(name) {
            return Ok(index);
        }
        if self.names.len() > u8::MAX as usize {
            return Err(self.error_here("too many global names in one program"));
        }
        self.names.push(name.to_owned());
        Ok((self.names.len() - 1) as u8)
    }

    fn error_here(&self, message: &str) -> CompileError {
        CompileError::expected(message, self.pos())
    }

    // ---- locals, scopes, upvalues ----

    /// Whether declarations land in a local slot rather than a global.
    pub fn is_local_scope(&self) -> bool {
        let ctx = self.current();
        ctx.depth > 0 || ctx.is_function
    }

    /// Register a local in the current scope.
    pub fn add_local(&mut self, name: &str) {
        if self.suppress {
            return;
        }
        let depth = self.current().depth;
        self.current_mut().locals.push(Local {
            name: name.to_owned(),
            depth,
            is_captured: false,
        });
    }

    fn resolve_local(&self, ctx_index: usize, name: &str) -> Option<u8> {
        let ctx = &self.contexts[ctx_index];
        ctx.locals
            .iter()
            .rposition(|l| l.name == name)
            .map(|i| i as u8)
    }

    fn add_upvalue(&mut self, ctx_index: usize, index: u8, is_local: bool) -> u8 {
        let desc = UpvalueDesc { index, is_local };
        let upvalues = &mut self.contexts[ctx_index].upvalues;
        if let Some(existing) = upvalues.iter().position(|u| *u == desc) {
            return existing as u8;
        }
        upvalues.push(desc);
        (upvalues.len() - 1) as u8
    }

    fn resolve_upvalue(&mut self, ctx_index: usize, name: &str) -> Option<u8> {
        if ctx_index == 0 {
            return None;
        }
        if let Some(local) = self.resolve_local(ctx_index - 1, name) {
            self.contexts[ctx_index - 1].locals[local as usize].is_captured = true;
            return Some(self.add_upvalue(ctx_index, local, true));
        }
        let outer = self.resolve_upvalue(ctx_index - 1, name)?;
        Some(self.add_upvalue(ctx_index, outer, false))
    }

    /// Resolve a name against locals, then enclosing contexts. On a
    /// hit, `was_upvalue` reports which instruction family to emit.
    pub fn get_local(&mut self, name: &str) -> Option<u8> {
        let top = self.contexts.len() - 1;
        self.is_upvalue = false;
        if let Some(index) = self.resolve_local(top, name) {
            return Some(index);
        }
        let index = self.resolve_upvalue(top, name)?;
        self.is_upvalue = true;
        Some(index)
    }

    /// Whether the last [`Self::get_local`] hit resolved to an upvalue.
    pub fn was_upvalue(&self) -> bool {
        self.is_upvalue
    }

    /// Number of locals at or above `depth` in the current context.
    pub fn local_size(&self, depth: u32) -> usize {
        self.current()
            .locals
            .iter()
            .rev()
            .take_while(|l| l.depth >= depth)
            .count()
    }

    /// Enter a block scope.
    pub fn push_scope(&mut self) {
        self.current_mut().depth += 1;
    }

    /// Leave a block scope: close captured locals, pop the rest, and
    /// drop their names.
    pub fn pop_scope(&mut self) {
        let depth = self.current().depth;
        let size = self.emit_scope_exit(depth);
        if !self.suppress {
            let locals = &mut self.current_mut().locals;
            locals.truncate(locals.len() - size);
        }
        self.current_mut().depth -= 1;
    }

    /// Emit the close/pop sequence for every local at or above `depth`
    /// without touching the compiler's local records (used by `break`
    /// and `continue`, which jump out without ending the scope).
    pub fn emit_scope_exit(&mut self, depth: u32) -> usize {
        if self.suppress {
            return 0;
        }
        let size = self.local_size(depth);
        let captured = {
            let locals = &self.current().locals;
            let first = locals.len() - size;
            (first..locals.len()).find(|i| locals[*i].is_captured)
        };
        if let Some(slot) = captured {
            self.emit_8(Opcode::CloseUpvalue, slot as u8);
        }
        match size {
            0 => {}
            1 => {
                self.emit(Opcode::Pop);
            }
            n => {
                self.emit_8(Opcode::PopN, n as u8);
            }
        }
        size
    }

    // ---- loops ----

    /// Track a loop whose `continue` target is `continue_at`.
    pub fn push_loop(&mut self, continue_at: usize, is_for: bool) {
        let depth = self.current().depth;
        self.loops.push(LoopCtx {
            continue_at,
            depth,
            breaks: Vec::new(),
            is_for,
        });
    }

    /// Finish a loop: emit the back-edge and patch every `break`.
    pub fn pop_loop(&mut self, continue_at: usize) {
        let breaks = match self.loops.pop() {
            Some(ctx) => ctx.breaks,
            None => return,
        };
        self.emit_jump_to(continue_at);
        for site in breaks {
            self.patch_jump(site);
        }
    }

    /// Record a pending `break` jump site.
    pub fn push_break(&mut self, address: usize) {
        if let Some(ctx) = self.loops.last_mut() {
            ctx.breaks.push(address);
        }
    }

    /// Whether any loop is open.
    pub fn in_loop(&self) -> bool {
        !self.loops.is_empty()
    }

    /// Whether the innermost loop is a `for`.
    pub fn is_for_loop(&self) -> bool {
        self.loops.last().map_or(false, |l| l.is_for)
    }

    /// Scope depth of the innermost loop.
    pub fn loop_depth(&self) -> u32 {
        self.loops.last().map_or(0, |l| l.depth)
    }

    /// `continue` target of the innermost loop.
    pub fn continue_target(&self) -> usize {
        self.loops.last().map_or(0, |l| l.continue_at)
    }

    // ---- object literals ----

    /// Enter a map/object literal.
    pub fn push_object(&mut self) {
        if !self.suppress {
            self.objects.push(String::new());
        }
    }

    /// Leave a map/object literal.
    pub fn pop_object(&mut self) {
        if !self.suppress {
            self.objects.pop();
        }
    }

    /// Whether parsing is inside a map/object literal.
    pub fn is_object(&self) -> bool {
        !self.objects.is_empty()
    }

    /// Whether the current function is an object's `constructor`.
    pub fn is_constructor(&self) -> bool {
        self.is_object()
            && self.current().is_function
            && self.current().fun_name.as_deref() == Some("constructor")
    }

    // ---- functions ----

    /// Open a function compilation context.
    pub fn push_function(&mut self, name: Option<&str>) {
        if self.suppress {
            return;
        }
        self.contexts.push(Context {
            is_function: true,
            fun_name: name.map(str::to_owned),
            ..Context::default()
        });
    }

    /// Close a function context and emit the instructions building the
    /// function value: name and code constants, then `(index,
    /// is_local)` pairs for each capture, then `PUSH_CLOSURE` (or
    /// `PUSH_FUNCTION` when nothing was captured). The high bit of the
    /// params byte marks method literals, whose slot 0 binds `this`.
    pub fn pop_function(&mut self, params: usize, is_method: bool) -> CompileResult<()> {
        if self.suppress {
            return Ok(());
        }
        let ctx = self
            .contexts
            .pop()
            .expect("pop_function without matching push");

        let name = ctx.fun_name.clone().unwrap_or_else(|| {
            self.anon_count += 1;
            format!("function: #{}", self.anon_count - 1)
        });

        let code = Value::Obj(
            self.heap
                .alloc(Object::Code(CodeObject::new(ctx.code, ctx.spans))),
        );
        let code_index = self.store_const(code)?;
        let name_value = self.heap.alloc_str(name);
        let name_index = self.store_const(name_value)?;

        self.emit_16(Opcode::LoadConst, name_index);
        self.emit_16(Opcode::LoadConst, code_index);

        for upvalue in &ctx.upvalues {
            let index = self.store_const(Value::Num(upvalue.index as f64))?;
            self.emit_16(Opcode::LoadConst, index);
            let is_local = self.store_const(Value::Bool(upvalue.is_local))?;
            self.emit_16(Opcode::LoadConst, is_local);
        }

        let params_byte = params as u8 | if is_method { 0x80 } else { 0 };
        if ctx.upvalues.is_empty() {
            self.emit_8(Opcode::PushFunction, params_byte);
        } else {
            self.emit_16(
                Opcode::PushClosure,
                ((params_byte as u16) << 8) | ctx.upvalues.len() as u16,
            );
        }
        Ok(())
    }

    /// Whether the current context compiles a function body.
    pub fn in_function(&self) -> bool {
        self.contexts.iter().any(|c| c.is_function)
    }

    /// Whether parsing sits at the top level of a function body (not
    /// inside a nested block or loop).
    pub fn in_function_body(&self) -> bool {
        let ctx = self.current();
        ctx.is_function && ctx.depth == 0
    }

    // ---- variables ----

    /// Declare a variable: a local slot in local scope (the value is
    /// already on the stack), a global store otherwise.
    pub fn add_variable(&mut self, name: &str) -> CompileResult<()> {
        if self.is_local_scope() {
            self.add_local(name);
            Ok(())
        } else {
            let index = self.store_name(name)?;
            self.emit_8(Opcode::StoreGlobal, index);
            Ok(())
        }
    }

    /// Emit the store matching how `name` resolves.
    pub fn store_variable(&mut self, name: &str) -> CompileResult<()> {
        if self.is_local_scope() {
            if let Some(index) = self.get_local(name) {
                let op = if self.was_upvalue() {
                    Opcode::StoreUpvalue
                } else {
                    Opcode::StoreLocal
                };
                self.emit_8(op, index);
                return Ok(());
            }
        }
        let index = self.store_name(name)?;
        self.emit_8(Opcode::StoreGlobal, index);
        Ok(())
    }

    /// Emit the load matching how `name` resolves. Unknown names are
    /// interned as globals on first use.
    pub fn load_variable(&mut self, name: &str) -> CompileResult<()> {
        if let Some(index) = self.get_local(name) {
            let op = if self.was_upvalue() {
                Opcode::LoadUpvalue
            } else {
                Opcode::LoadLocal
            };
            self.emit_8(op, index);
            return Ok(());
        }
        let index = self.store_name(name)?;
        self.emit_8(Opcode::LoadGlobal, index);
        Ok(())
    }

    /// Finish compilation: hand back the top-level context.
    pub fn finish(mut self) -> (Context, Vec<Value>, Vec<String>) {
        let top = self.contexts.pop().expect("top-level context");
        (top, self.constants, self.names)
    }
}
