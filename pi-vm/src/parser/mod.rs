//! Recursive-descent parser emitting bytecode in a single pass per
//! token walk. The top level runs twice: a hoisting pass that compiles
//! `fun`/`let` declarations and marks their tokens, then a statement
//! pass over whatever is left. Expression look-ahead (assignment
//! detection, lambda detection) re-walks tokens with emission
//! suppressed and then rewinds.

mod compiler;

use compiler::Compiler;

use pi_asm::{BinaryOp, CompareOp, Opcode, UnaryOp, MAX_PARAMS};

use crate::error::{CompileError, CompileErrorKind, CompileResult};
use crate::heap::{Heap, ObjId};
use crate::lexer::lex;
use crate::object::{CodeObject, Object};
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// How the pipeline is being driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Whole-file compilation; expression statements are popped.
    Program,
    /// Interactive compilation; expression statements keep their value
    /// on the stack so the driver can read the result.
    Repl,
}

/// Output of the compile pipeline: the top-level code object plus the
/// shared constant pool and global name table.
#[derive(Debug)]
pub struct Chunk {
    /// Top-level `CodeObject`.
    pub code: ObjId,
    /// Shared constant pool. Indices 0–3 are NaN, +∞, true, false.
    pub constants: Vec<Value>,
    /// Global name table addressed by `LOAD_GLOBAL`/`STORE_GLOBAL`.
    pub names: Vec<String>,
}

/// Compile source text into a chunk, allocating constants on `heap`.
pub fn compile(source: &str, heap: &mut Heap, mode: ParseMode) -> CompileResult<Chunk> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        source,
        tokens,
        current: 0,
        comp: Compiler::new(heap, mode == ParseMode::Repl),
        is_store: false,
        is_return: false,
        has_walrus: false,
        value_kept: false,
    };
    parser.parse()?;
    let (top, constants, names) = parser.comp.finish();
    let code = heap.alloc(Object::Code(CodeObject::new(top.code, top.spans)));
    Ok(Chunk {
        code,
        constants,
        names,
    })
}

struct Parser<'src, 'h> {
    source: &'src str,
    tokens: Vec<Token>,
    current: usize,
    comp: Compiler<'h>,
    /// The next resolved name is an assignment target.
    is_store: bool,
    /// The last statement ended the enclosing block (return, break,
    /// or continue); used for unreachable-code checks and implicit
    /// returns.
    is_return: bool,
    /// A walrus is being parsed; a second one is an error.
    has_walrus: bool,
    /// The last statement was an expression whose value stayed on the
    /// stack (interactive mode); the implicit return picks it up.
    value_kept: bool,
}

impl<'src, 'h> Parser<'src, 'h> {
    // ---- token plumbing ----

    fn peek(&self) -> Token {
        self.tokens[self.current]
    }

    fn peek_next(&self) -> Token {
        self.tokens[(self.current + 1).min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> Token {
        self.tokens[self.current.saturating_sub(1)]
    }

    fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) {
        if !self.at_end() {
            self.current += 1;
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            return true;
        }
        false
    }

    fn match_any(&mut self, kinds: &[TokenKind]) -> bool {
        if kinds.contains(&self.peek().kind) {
            self.advance();
            return true;
        }
        false
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> CompileResult<Token> {
        if self.check(kind) {
            let token = self.peek();
            self.advance();
            return Ok(token);
        }
        Err(CompileError::expected(message, self.peek().span()))
    }

    fn consume_if(&mut self, kind: TokenKind) -> bool {
        self.match_kind(kind)
    }

    /// Whether the statement just parsed ends the program or a
    /// function body (one trailing semicolon allowed). Only such tail
    /// expressions keep their value in interactive mode; keeping one
    /// inside a loop or block would unbalance the local slots.
    fn at_statement_tail(&self) -> bool {
        let ends = |kind: TokenKind| match kind {
            TokenKind::Eof => true,
            TokenKind::RBrace => self.comp.in_function_body(),
            _ => false,
        };
        match self.peek().kind {
            TokenKind::Semicolon => ends(self.peek_next().kind),
            kind => ends(kind),
        }
    }

    fn is_line_break(&self) -> bool {
        self.previous().line < self.peek().line || self.peek().kind == TokenKind::Eof
    }

    /// Statements separate on `;`, a line break, `}`, or EOF.
    fn need_delimiter(&mut self) -> CompileResult<()> {
        if !self.consume_if(TokenKind::Semicolon)
            && !self.is_line_break()
            && !self.check(TokenKind::RBrace)
        {
            return Err(CompileError::new(
                CompileErrorKind::MissingDelimiter,
                self.peek().span(),
            ));
        }
        Ok(())
    }

    fn text(&self, token: &Token) -> &'src str {
        token.text(self.source)
    }

    fn mark_tokens(&mut self, start: usize, end: usize) {
        for token in &mut self.tokens[start..end] {
            token.skip = true;
        }
    }

    /// Skip to the partner of the bracket at `open_index` (already
    /// consumed) and past it. Fails when the lexer left it unpaired.
    fn skip_balanced(&mut self, open_index: usize) -> CompileResult<()> {
        let open = self.tokens[open_index];
        if open.close_at < 0 {
            let ch = match open.kind {
                TokenKind::LParen => '(',
                TokenKind::LBracket => '[',
                _ => '{',
            };
            return Err(CompileError::new(
                CompileErrorKind::UnmatchedBracket(ch),
                open.span(),
            ));
        }
        self.current = open.close_at as usize + 1;
        Ok(())
    }

    // ---- literal payloads ----

    fn token_number(&self, token: &Token) -> CompileResult<f64> {
        let raw = self.text(token).replace('_', "");
        let parsed = if let Some(digits) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))
        {
            i64::from_str_radix(digits, 16).map(|n| n as f64).ok()
        } else if let Some(digits) = raw.strip_prefix("0o").or_else(|| raw.strip_prefix("0O")) {
            i64::from_str_radix(digits, 8).map(|n| n as f64).ok()
        } else if let Some(digits) = raw.strip_prefix("0b").or_else(|| raw.strip_prefix("0B")) {
            i64::from_str_radix(digits, 2).map(|n| n as f64).ok()
        } else {
            raw.parse::<f64>().ok()
        };
        let value = parsed.ok_or_else(|| {
            CompileError::new(CompileErrorKind::MalformedNumber(raw), token.span())
        })?;
        Ok(if token.is_negative { -value } else { value })
    }

    fn token_value(&mut self, token: &Token) -> CompileResult<Value> {
        Ok(match token.kind {
            TokenKind::Num => Value::Num(self.token_number(token)?),
            TokenKind::Str => {
                let unescaped = unescape(self.text(token));
                self.comp.heap.alloc_str(unescaped)
            }
            TokenKind::Id => {
                let text = self.text(token).to_owned();
                self.comp.heap.alloc_str(text)
            }
            TokenKind::True => Value::Bool(true),
            TokenKind::False => Value::Bool(false),
            TokenKind::Nil => Value::Nil,
            _ => {
                return Err(CompileError::expected(
                    "unexpected token in literal position",
                    token.span(),
                ))
            }
        })
    }

    /// Whether the upcoming token turns the just-parsed target into a
    /// store. Consumes the pending store state on a hit.
    fn is_assign(&mut self) -> bool {
        if self.is_store
            && (self.peek().kind.is_assign_op()
                || matches!(self.peek().kind, TokenKind::Incr | TokenKind::Decr))
        {
            self.is_store = false;
            return true;
        }
        false
    }

    // ---- program structure ----

    fn parse(&mut self) -> CompileResult<()> {
        self.declarations()?;
        self.comp.emit(Opcode::Halt);
        Ok(())
    }

    /// Two-pass top level: hoist `fun`/`let`, then the rest.
    fn declarations(&mut self) -> CompileResult<()> {
        let mut depth = 0i32;
        while !self.at_end() {
            if self.check(TokenKind::LBrace) {
                depth += 1;
            } else if self.check(TokenKind::RBrace) {
                depth -= 1;
            }
            if depth > 0 {
                self.advance();
                continue;
            }

            if self.check(TokenKind::Fun) && self.peek_next().kind != TokenKind::LParen {
                let start = self.current;
                self.advance();
                self.func_decl()?;
                self.mark_tokens(start, self.current);
            } else if self.check(TokenKind::Let) {
                let start = self.current;
                self.advance();
                self.var_decl()?;
                self.mark_tokens(start, self.current);
            } else {
                self.advance();
            }
        }

        self.current = 0;
        self.is_return = false;
        while !self.at_end() {
            if self.tokens[self.current].skip {
                self.advance();
            } else {
                self.statement()?;
            }
        }
        Ok(())
    }

    fn declaration(&mut self) -> CompileResult<()> {
        if self.check(TokenKind::Fun) && self.peek_next().kind == TokenKind::Id {
            self.value_kept = false;
            self.advance();
            self.func_decl()
        } else if self.match_kind(TokenKind::Let) {
            self.value_kept = false;
            self.var_decl()
        } else {
            self.statement()
        }
    }

    fn var_decl(&mut self) -> CompileResult<()> {
        loop {
            self.variable()?;
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        self.consume_if(TokenKind::Semicolon);
        Ok(())
    }

    fn variable(&mut self) -> CompileResult<()> {
        let token = self.consume(TokenKind::Id, "Expect variable name")?;
        let name = self.text(&token).to_owned();
        if self.match_kind(TokenKind::Assign) {
            self.assignment(true)?;
        } else {
            self.comp.emit(Opcode::PushNil);
        }
        self.comp.set_pos(&token);
        self.comp.add_variable(&name)
    }

    /// Parameter names, with defaults (or nil) emitted into the
    /// enclosing context. `bound` functions (method literals) get a
    /// leading nil default for their `this` slot.
    fn param_list(&mut self, bound: bool) -> CompileResult<Vec<String>> {
        let mut params = Vec::new();
        let prev = self.previous();
        self.comp.set_pos(&prev);

        if bound {
            self.comp.emit(Opcode::PushNil);
        }

        if !self.check(TokenKind::RParen) {
            loop {
                if params.len() >= MAX_PARAMS {
                    return Err(CompileError::new(
                        CompileErrorKind::TooManyParameters(MAX_PARAMS),
                        self.peek().span(),
                    ));
                }
                let name = self.consume(TokenKind::Id, "Expect parameter name.")?;
                params.push(self.text(&name).to_owned());
                if self.match_kind(TokenKind::Assign) {
                    self.expr()?;
                } else {
                    self.comp.emit(Opcode::PushNil);
                }
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        Ok(params)
    }

    fn func_decl(&mut self) -> CompileResult<()> {
        let id = self.consume(TokenKind::Id, "Expect function name")?;
        let name = self.text(&id).to_owned();

        if self.comp.is_local_scope() {
            self.comp.add_local(&name);
        }

        self.consume(TokenKind::LParen, "Expect '(' after function name.")?;
        // A named declaration is never a method literal, even when it
        // sits inside one's body.
        let params = self.param_list(false)?;
        self.consume(TokenKind::RParen, "Expect ')' before function body.")?;
        self.consume(TokenKind::LBrace, "Expect '{' before function body.")?;

        self.comp.push_function(Some(&name));
        for param in &params {
            self.comp.add_local(param);
        }
        self.comp.add_local("args");
        self.value_kept = false;

        let mut hit_final_return = false;
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            if hit_final_return {
                return Err(CompileError::new(
                    CompileErrorKind::UnreachableCode("return statement"),
                    self.peek().span(),
                ));
            }
            if self.check(TokenKind::Return) {
                self.declaration()?;
                hit_final_return = true;
                continue;
            }
            self.declaration()?;
        }

        if !self.is_return {
            let rbrace = self.peek();
            self.comp.set_pos(&rbrace);
            self.emit_implicit_return();
        }
        self.is_return = false;

        self.consume(TokenKind::RBrace, "Expect '}' after function body.")?;
        self.comp.pop_function(params.len(), false)?;

        if !self.comp.is_local_scope() {
            self.comp.set_pos(&id);
            let index = self.comp.store_name(&name)?;
            self.comp.emit_8(Opcode::StoreGlobal, index);
        }

        self.consume_if(TokenKind::Semicolon);
        Ok(())
    }

    // ---- statements ----

    fn statement(&mut self) -> CompileResult<()> {
        self.value_kept = false;
        if self.match_kind(TokenKind::LBrace) {
            // `{ key: …` opens a map literal, anything else a block.
            let mark = self.current;
            let keyish = [
                TokenKind::Str,
                TokenKind::Id,
                TokenKind::Num,
                TokenKind::False,
                TokenKind::True,
            ];
            if self.match_any(&keyish) && self.match_kind(TokenKind::Colon) {
                self.current = mark - 1;
                self.primary()?;
                if self.comp.is_repl && self.at_statement_tail() {
                    self.value_kept = true;
                } else {
                    self.comp.emit(Opcode::Pop);
                }
            } else {
                self.current = mark;
                self.block()?;
            }
            Ok(())
        } else if self.match_kind(TokenKind::If) {
            self.if_stmt()
        } else if self.match_kind(TokenKind::While) {
            self.while_stmt()
        } else if self.match_kind(TokenKind::For) {
            self.for_stmt()
        } else if self.match_kind(TokenKind::Break) {
            self.break_stmt()
        } else if self.match_kind(TokenKind::Continue) {
            self.continue_stmt()
        } else if self.match_kind(TokenKind::Return) {
            self.return_stmt()
        } else if self.match_kind(TokenKind::Debug) {
            self.comp.emit(Opcode::Debug);
            self.consume_if(TokenKind::Semicolon);
            Ok(())
        } else {
            self.expr_state()
        }
    }

    fn block(&mut self) -> CompileResult<()> {
        self.comp.push_scope();
        while !self.check(TokenKind::RBrace) && !self.at_end() && !self.is_return {
            self.declaration()?;
        }
        if self.is_return && !self.check(TokenKind::RBrace) {
            return Err(CompileError::new(
                CompileErrorKind::UnreachableCode("return statement"),
                self.peek().span(),
            ));
        }
        self.is_return = false;
        self.comp.pop_scope();
        self.consume(TokenKind::RBrace, "Expect '}' after block.")?;
        Ok(())
    }

    /// A condition with optional parentheses.
    fn condition(&mut self) -> CompileResult<()> {
        let has_parens = self.match_kind(TokenKind::LParen);
        self.cond_expr()?;
        if has_parens {
            self.consume(TokenKind::RParen, "Expect ')' after condition.")?;
        }
        Ok(())
    }

    /// A braced block or a single statement as a branch/loop body.
    fn branch_body(&mut self) -> CompileResult<()> {
        if self.match_kind(TokenKind::LBrace) {
            self.block()
        } else {
            self.statement()?;
            self.is_return = false;
            Ok(())
        }
    }

    fn if_stmt(&mut self) -> CompileResult<()> {
        let start = self.peek();
        self.condition()?;
        self.comp.set_pos(&start);
        let mut then_jump = self.comp.emit_16(Opcode::JumpIfFalse, 0);
        self.branch_body()?;

        let mut end_jumps = Vec::new();
        if self.check(TokenKind::Elif) || self.check(TokenKind::Else) {
            let next = self.peek();
            self.comp.set_pos(&next);
            end_jumps.push(self.comp.emit_jump());
        }
        self.comp.patch_jump(then_jump);

        while self.match_kind(TokenKind::Elif) {
            let elif_tok = self.previous();
            self.condition()?;
            self.comp.set_pos(&elif_tok);
            then_jump = self.comp.emit_16(Opcode::JumpIfFalse, 0);
            self.branch_body()?;

            if self.check(TokenKind::Elif) || self.check(TokenKind::Else) {
                let next = self.peek();
                self.comp.set_pos(&next);
                end_jumps.push(self.comp.emit_jump());
            }
            self.comp.patch_jump(then_jump);
        }

        if self.match_kind(TokenKind::Else) {
            self.branch_body()?;
        }

        for site in end_jumps {
            self.comp.patch_jump(site);
        }
        Ok(())
    }

    fn while_stmt(&mut self) -> CompileResult<()> {
        let header = self.comp.code_size();
        let cond_start = self.peek();
        self.condition()?;
        self.comp.set_pos(&cond_start);
        let exit = self.comp.emit_16(Opcode::JumpIfFalse, 0);

        self.comp.push_loop(header, false);
        self.branch_body()?;
        self.comp.pop_loop(header);
        self.comp.patch_jump(exit);
        Ok(())
    }

    fn for_stmt(&mut self) -> CompileResult<()> {
        let has_parens = self.match_kind(TokenKind::LParen);
        let init = self.consume(
            TokenKind::Id,
            "Invalid for-loop left-hand side. Expect identifier.",
        )?;
        self.consume(TokenKind::In, "Expect 'in' keyword after loop variable.")?;

        let iterable = self.peek();
        self.cond_expr()?;
        if has_parens {
            self.consume(TokenKind::RParen, "Expect ')' after iterable expression.")?;
        }

        self.comp.set_pos(&iterable);
        self.comp.emit(Opcode::PushIter);

        self.comp.set_pos(&init);
        let address = self.comp.emit_16(Opcode::Loop, 0);

        self.comp.push_scope();
        let name = self.text(&init).to_owned();
        self.comp.add_variable(&name)?;
        self.comp.push_loop(address.saturating_sub(2), true);

        if self.match_kind(TokenKind::LBrace) {
            while !self.check(TokenKind::RBrace) && !self.at_end() {
                self.declaration()?;
            }
            self.consume(TokenKind::RBrace, "Expect '}' after block.")?;
            self.is_return = false;
        } else {
            self.statement()?;
            self.is_return = false;
        }

        self.comp.pop_scope();
        self.comp.pop_loop(address.saturating_sub(2));
        self.comp.patch_jump(address);
        Ok(())
    }

    fn break_stmt(&mut self) -> CompileResult<()> {
        let tok = self.previous();
        self.comp.set_pos(&tok);

        if !self.comp.in_loop() {
            return Err(CompileError::new(
                CompileErrorKind::BreakOutsideLoop,
                tok.span(),
            ));
        }
        if self.comp.is_for_loop() {
            self.comp.emit(Opcode::PopIter);
        }
        self.comp.emit_scope_exit(self.comp.loop_depth());
        let site = self.comp.emit_jump();
        self.comp.push_break(site);

        self.is_return = true;
        self.need_delimiter()
    }

    fn continue_stmt(&mut self) -> CompileResult<()> {
        let tok = self.previous();
        self.comp.set_pos(&tok);

        if !self.comp.in_loop() {
            return Err(CompileError::new(
                CompileErrorKind::ContinueOutsideLoop,
                tok.span(),
            ));
        }
        let target = self.comp.continue_target();
        self.comp.emit_scope_exit(self.comp.loop_depth());
        self.comp.emit_jump_to(target);

        self.is_return = true;
        self.need_delimiter()
    }

    fn return_stmt(&mut self) -> CompileResult<()> {
        let tok = self.previous();
        self.comp.set_pos(&tok);

        if !self.comp.in_function() {
            return Err(CompileError::new(
                CompileErrorKind::ReturnOutsideFunction,
                tok.span(),
            ));
        }

        if self.comp.is_constructor() {
            self.comp.emit_8(Opcode::LoadLocal, 0);
        } else if self.match_kind(TokenKind::Semicolon) || self.is_line_break() {
            let index = self.comp.store_const(Value::Nil)?;
            self.comp.emit_16(Opcode::LoadConst, index);
        } else {
            self.expr()?;
        }

        self.comp.emit(Opcode::Return);
        self.is_return = true;
        self.need_delimiter()
    }

    fn expr_state(&mut self) -> CompileResult<()> {
        let start = self.current;

        // Dry run to learn whether this statement is an assignment;
        // assignments manage the stack themselves.
        let prev = self.comp.look_up(true);
        let probe = self.cond_expr();
        let is_assign_stmt =
            probe.is_ok() && self.peek().kind.is_assign_op();
        self.comp.look_up(prev);
        self.current = start;

        self.expr()?;

        if !is_assign_stmt {
            // Interactive mode keeps the value of a block- or
            // program-final expression; anything else is popped so
            // later local slots stay aligned.
            if self.comp.is_repl && self.at_statement_tail() {
                self.value_kept = true;
            } else {
                self.comp.emit(Opcode::Pop);
            }
        }
        self.need_delimiter()
    }

    // ---- expressions ----

    fn expr(&mut self) -> CompileResult<()> {
        self.assignment(false)
    }

    /// Assignment handling: a suppressed pass collects `target op`
    /// sites left to right, then the collected sites are replayed
    /// right to left as load/compute/store bytecode.
    fn assignment(&mut self, emit_load: bool) -> CompileResult<()> {
        let start = self.current;
        let mut assigns: Vec<(usize, usize, TokenKind)> = Vec::new();

        let prev = self.comp.look_up(true);
        self.cond_expr()?;
        let mut left = start;
        while self.peek().kind.is_assign_op() {
            let op = self.peek().kind;
            self.advance();
            let right = self.current;
            assigns.push((left, right, op));
            self.cond_expr()?;
            left = right;
        }
        self.comp.look_up(prev);

        if assigns.is_empty() {
            self.current = start;
            return self.cond_expr();
        }

        let end = self.current;
        while let Some((left, right, op)) = assigns.pop() {
            let lhs = self.tokens[left];
            if lhs.kind != TokenKind::Id {
                return Err(CompileError::new(
                    CompileErrorKind::InvalidAssignmentTarget,
                    lhs.span(),
                ));
            }
            self.comp.set_pos(&lhs);

            if op != TokenKind::Assign {
                // Compound form loads the target first.
                self.current = left;
                self.cond_expr()?;
            }

            self.current = right;
            self.cond_expr()?;

            if let Some(binop) = compound_op(op) {
                self.comp.emit_8(Opcode::Binary, binop as u8);
            }

            self.current = left;
            self.is_store = true;
            self.cond_expr()?;
            if self.is_store {
                // The target never reached a storable position.
                self.is_store = false;
                return Err(CompileError::new(
                    CompileErrorKind::InvalidAssignmentTarget,
                    lhs.span(),
                ));
            }
        }

        if emit_load {
            self.current = start;
            self.cond_expr()?;
        }
        self.current = end;
        Ok(())
    }

    fn cond_expr(&mut self) -> CompileResult<()> {
        self.or_expr()?;
        if self.match_kind(TokenKind::Question) {
            let then_jump = self.comp.emit_16(Opcode::JumpIfFalse, 0);
            let after = self.peek();
            self.comp.set_pos(&after);

            self.cond_expr()?;
            self.consume(TokenKind::Colon, "Expect ':' after '?'")?;
            let else_jump = self.comp.emit_jump();
            self.comp.patch_jump(then_jump);

            self.cond_expr()?;
            self.comp.patch_jump(else_jump);
        }
        Ok(())
    }

    fn or_expr(&mut self) -> CompileResult<()> {
        self.and_expr()?;
        while self.match_kind(TokenKind::Or) {
            let op = self.previous();
            self.and_expr()?;
            self.comp.set_pos(&op);
            self.comp.emit_8(Opcode::Binary, BinaryOp::Or as u8);
        }
        Ok(())
    }

    fn and_expr(&mut self) -> CompileResult<()> {
        self.in_expr()?;
        while self.match_kind(TokenKind::And) {
            let op = self.previous();
            self.in_expr()?;
            self.comp.set_pos(&op);
            self.comp.emit_8(Opcode::Binary, BinaryOp::And as u8);
        }
        Ok(())
    }

    fn in_expr(&mut self) -> CompileResult<()> {
        self.range_expr()?;
        while self.match_kind(TokenKind::In) {
            let op = self.previous();
            self.range_expr()?;
            self.comp.set_pos(&op);
            self.comp.emit_8(Opcode::Compare, CompareOp::In as u8);
        }
        Ok(())
    }

    fn range_expr(&mut self) -> CompileResult<()> {
        self.bit_or_expr()?;
        let inclusive = if self.match_kind(TokenKind::DbDotsEq) {
            true
        } else if self.match_kind(TokenKind::DbDots) {
            false
        } else {
            return Ok(());
        };

        let op = self.previous();
        self.bit_or_expr()?;
        if self.match_kind(TokenKind::Colon) {
            self.expr()?;
        } else {
            self.comp.emit(Opcode::PushNil);
        }
        self.comp.set_pos(&op);
        self.comp.emit_8(Opcode::PushRange, inclusive as u8);
        Ok(())
    }

    fn bit_or_expr(&mut self) -> CompileResult<()> {
        self.xor_expr()?;
        while self.match_kind(TokenKind::BitOr) {
            let op = self.previous();
            self.xor_expr()?;
            self.comp.set_pos(&op);
            self.comp.emit_8(Opcode::Binary, BinaryOp::BitOr as u8);
        }
        Ok(())
    }

    fn xor_expr(&mut self) -> CompileResult<()> {
        self.bit_and_expr()?;
        while self.match_kind(TokenKind::Xor) {
            let op = self.previous();
            self.bit_and_expr()?;
            self.comp.set_pos(&op);
            self.comp.emit_8(Opcode::Binary, BinaryOp::BitXor as u8);
        }
        Ok(())
    }

    fn bit_and_expr(&mut self) -> CompileResult<()> {
        self.shift_expr()?;
        while self.match_kind(TokenKind::BitAnd) {
            let op = self.previous();
            self.shift_expr()?;
            self.comp.set_pos(&op);
            self.comp.emit_8(Opcode::Binary, BinaryOp::BitAnd as u8);
        }
        Ok(())
    }

    fn shift_expr(&mut self) -> CompileResult<()> {
        self.equality_expr()?;
        loop {
            let binop = if self.match_kind(TokenKind::LShift) {
                BinaryOp::Shl
            } else if self.match_kind(TokenKind::RShift) {
                BinaryOp::Shr
            } else if self.match_kind(TokenKind::URShift) {
                BinaryOp::UShr
            } else {
                return Ok(());
            };
            let op = self.previous();
            self.equality_expr()?;
            self.comp.set_pos(&op);
            self.comp.emit_8(Opcode::Binary, binop as u8);
        }
    }

    fn equality_expr(&mut self) -> CompileResult<()> {
        self.compare_expr()?;
        loop {
            if self.match_kind(TokenKind::Equal) {
                let op = self.previous();
                self.compare_expr()?;
                self.comp.set_pos(&op);
                self.comp.emit_8(Opcode::Compare, CompareOp::Eq as u8);
            } else if self.match_kind(TokenKind::NotEqual) {
                let op = self.previous();
                self.compare_expr()?;
                self.comp.set_pos(&op);
                self.comp.emit_8(Opcode::Compare, CompareOp::Ne as u8);
            } else if self.match_kind(TokenKind::Is) {
                let op = self.previous();
                self.compare_expr()?;
                self.comp.set_pos(&op);
                self.comp.emit_8(Opcode::Binary, BinaryOp::Is as u8);
            } else {
                return Ok(());
            }
        }
    }

    /// Relational comparisons with chain support: `a < b <= c` becomes
    /// `(a < b) && (b <= c)`, re-emitting the shared operand once per
    /// link.
    fn compare_expr(&mut self) -> CompileResult<()> {
        self.add_expr()?;

        let mut last_value_pos: Option<usize> = None;
        let mut links = 0usize;
        loop {
            let cmp = match self.peek().kind {
                TokenKind::Greater => CompareOp::Gt,
                TokenKind::Less => CompareOp::Lt,
                TokenKind::GreaterEqual => CompareOp::Ge,
                TokenKind::LessEqual => CompareOp::Le,
                _ => return Ok(()),
            };
            let op_token = self.peek();
            self.advance();

            if let Some(pos) = last_value_pos {
                // Rewind and re-emit the shared middle operand, then
                // step past the comparator again.
                self.current = pos;
                self.add_expr()?;
                self.advance();
            }

            last_value_pos = Some(self.current);
            self.add_expr()?;
            self.comp.set_pos(&op_token);
            self.comp.emit_8(Opcode::Compare, cmp as u8);

            if links > 0 {
                self.comp.emit_8(Opcode::Binary, BinaryOp::And as u8);
            }
            links += 1;
        }
    }

    fn add_expr(&mut self) -> CompileResult<()> {
        self.dot_expr()?;
        loop {
            let binop = if self.match_kind(TokenKind::Plus) {
                BinaryOp::Add
            } else if self.match_kind(TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                return Ok(());
            };
            let op = self.previous();
            self.dot_expr()?;
            self.comp.set_pos(&op);
            self.comp.emit_8(Opcode::Binary, binop as u8);
        }
    }

    fn dot_expr(&mut self) -> CompileResult<()> {
        self.mult_expr()?;
        while self.match_kind(TokenKind::DotProd) {
            let op = self.previous();
            self.mult_expr()?;
            self.comp.set_pos(&op);
            self.comp.emit_8(Opcode::Binary, BinaryOp::Dot as u8);
        }
        Ok(())
    }

    fn mult_expr(&mut self) -> CompileResult<()> {
        self.exp_expr()?;
        loop {
            let binop = if self.match_kind(TokenKind::Mult) {
                BinaryOp::Mul
            } else if self.match_kind(TokenKind::Div) {
                BinaryOp::Div
            } else if self.match_kind(TokenKind::Mod) {
                BinaryOp::Mod
            } else {
                return Ok(());
            };
            let op = self.previous();
            self.exp_expr()?;
            self.comp.set_pos(&op);
            self.comp.emit_8(Opcode::Binary, binop as u8);
        }
    }

    fn exp_expr(&mut self) -> CompileResult<()> {
        self.unary_expr()?;
        while self.match_kind(TokenKind::Power) {
            let op = self.previous();
            // Right-associative: recurse on the exponent.
            self.exp_expr()?;
            self.comp.set_pos(&op);
            self.comp.emit_8(Opcode::Binary, BinaryOp::Pow as u8);
        }
        Ok(())
    }

    fn unary_expr(&mut self) -> CompileResult<()> {
        let prefix = [
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Not,
            TokenKind::BitNeg,
            TokenKind::Hash,
            TokenKind::Incr,
            TokenKind::Decr,
            TokenKind::TypeOf,
        ];

        if self.match_any(&prefix) {
            let op_token = self.previous();
            let op = op_token.kind;

            // Fold `-literal` into the literal itself.
            if op == TokenKind::Minus && self.check(TokenKind::Num) {
                self.tokens[self.current].is_negative = true;
                return self.member_expr();
            }

            let mark = self.current;
            self.member_expr()?;
            self.comp.set_pos(&op_token);

            if matches!(op, TokenKind::Incr | TokenKind::Decr) {
                let target = self.previous();
                self.check_mutable_target(&target)?;

                let unary = if op == TokenKind::Incr {
                    UnaryOp::Incr
                } else {
                    UnaryOp::Decr
                };
                self.comp.emit_8(Opcode::Unary, unary as u8);
                self.comp.emit(Opcode::DupTop);

                self.current = mark;
                self.is_store = true;
                self.member_expr()?;
            } else {
                let unary = match op {
                    TokenKind::Plus => UnaryOp::Plus,
                    TokenKind::Minus => UnaryOp::Neg,
                    TokenKind::Not => UnaryOp::Not,
                    TokenKind::BitNeg => UnaryOp::BitNot,
                    TokenKind::Hash => UnaryOp::Len,
                    _ => UnaryOp::TypeOf,
                };
                self.comp.emit_8(Opcode::Unary, unary as u8);
            }
            return Ok(());
        }

        let mark = self.current;
        self.member_expr()?;
        let operand = self.previous();

        if self.check(TokenKind::Incr) || self.check(TokenKind::Decr) {
            let op_token = self.peek();
            self.advance();
            self.check_mutable_target(&operand)?;

            self.comp.emit(Opcode::DupTop);
            self.comp.set_pos(&op_token);
            let unary = if op_token.kind == TokenKind::Incr {
                UnaryOp::Incr
            } else {
                UnaryOp::Decr
            };
            self.comp.emit_8(Opcode::Unary, unary as u8);

            self.current = mark;
            self.is_store = true;
            self.member_expr()?;
            self.advance(); // step past the ++/-- again
        }
        Ok(())
    }

    fn check_mutable_target(&self, target: &Token) -> CompileResult<()> {
        if matches!(
            target.kind,
            TokenKind::Num
                | TokenKind::Str
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Nil
        ) {
            return Err(CompileError::expected(
                "Increment/Decrement operations cannot be applied to literals.",
                target.span(),
            ));
        }
        Ok(())
    }

    // ---- member access, calls, slices ----

    fn member_expr(&mut self) -> CompileResult<()> {
        self.primary()?;
        loop {
            if self.match_kind(TokenKind::Dot) {
                let dot = self.previous();
                let name = self.consume(TokenKind::Id, "Expect property name after '.'")?;
                let key = self.token_value(&name)?;
                let index = self.comp.store_const(key)?;
                self.comp.set_pos(&dot);
                self.comp.emit_16(Opcode::LoadConst, index);

                if self.is_assign() {
                    self.comp.emit(Opcode::SetItem);
                } else {
                    self.comp.emit(Opcode::GetItem);
                }
            } else if self.match_kind(TokenKind::LBracket) {
                let bracket = self.previous();
                self.comp.set_pos(&bracket);
                let is_slice = self.slice_expr()?;
                self.consume(TokenKind::RBracket, "Expect ']' after list index expression")?;

                if is_slice && self.is_assign() {
                    return Err(CompileError::new(
                        CompileErrorKind::AssignToSlice,
                        self.peek().span(),
                    ));
                }
                if !is_slice {
                    if self.is_assign() {
                        self.comp.emit(Opcode::SetItem);
                    } else {
                        self.comp.emit(Opcode::GetItem);
                    }
                }
            } else if self.match_kind(TokenKind::LParen) {
                let mut args = 0u8;
                if !self.check(TokenKind::RParen) {
                    loop {
                        self.expr()?;
                        args = args.saturating_add(1);
                        if !self.match_kind(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let close = self.consume(TokenKind::RParen, "Expect ')' after function call")?;
                self.comp.set_pos(&close);
                self.comp.emit_8(Opcode::Call, args);
            } else {
                return Ok(());
            }
        }
    }

    /// `[start : end : step]` slice tail. Missing pieces default to 0,
    /// +∞, and 1. Returns whether a slice (vs a plain index) parsed.
    fn slice_expr(&mut self) -> CompileResult<bool> {
        let mut is_slice = false;

        if self.check(TokenKind::Colon) {
            let index = self.comp.store_const(Value::Num(0.0))?;
            self.comp.emit_16(Opcode::LoadConst, index);
            is_slice = true;
        } else {
            self.cond_expr()?;
        }

        if self.match_kind(TokenKind::Colon) {
            is_slice = true;
            let colon = self.previous();

            if !self.check(TokenKind::RBracket) && !self.check(TokenKind::Colon) {
                self.cond_expr()?;
            } else {
                self.comp.emit_16(Opcode::LoadConst, pi_asm::CONST_INF);
            }

            if self.match_kind(TokenKind::Colon) {
                if !self.check(TokenKind::RBracket) {
                    self.cond_expr()?;
                } else {
                    let index = self.comp.store_const(Value::Num(1.0))?;
                    self.comp.emit_16(Opcode::LoadConst, index);
                }
            } else {
                let index = self.comp.store_const(Value::Num(1.0))?;
                self.comp.emit_16(Opcode::LoadConst, index);
            }

            self.comp.set_pos(&colon);
            self.comp.emit(Opcode::PushSlice);
        }

        Ok(is_slice)
    }

    // ---- primaries ----

    fn primary(&mut self) -> CompileResult<()> {
        let literals = [
            TokenKind::Num,
            TokenKind::Str,
            TokenKind::True,
            TokenKind::False,
            TokenKind::Nil,
            TokenKind::Inf,
            TokenKind::Nan,
        ];
        if self.match_any(&literals) {
            let token = self.previous();
            self.comp.set_pos(&token);
            match token.kind {
                TokenKind::Nan => {
                    self.comp.emit_16(Opcode::LoadConst, pi_asm::CONST_NAN);
                }
                TokenKind::Inf => {
                    self.comp.emit_16(Opcode::LoadConst, pi_asm::CONST_INF);
                }
                _ => {
                    let value = self.token_value(&token)?;
                    let index = self.comp.store_const(value)?;
                    self.comp.emit_16(Opcode::LoadConst, index);
                }
            }
            Ok(())
        } else if self.match_kind(TokenKind::LParen) {
            self.paren_or_lambda()
        } else if self.match_kind(TokenKind::Id) {
            self.identifier_expr()
        } else if self.match_kind(TokenKind::LBracket) {
            self.list_literal()
        } else if self.match_kind(TokenKind::LBrace) {
            self.map_literal()
        } else if self.match_kind(TokenKind::Fun) {
            self.function_expr()
        } else {
            Err(CompileError::expected(
                "Expect expression.",
                self.previous().span(),
            ))
        }
    }

    fn paren_or_lambda(&mut self) -> CompileResult<()> {
        let open_index = self.current - 1;
        self.comp.set_pos(&self.tokens[open_index]);

        if self.comp.is_look_up() {
            // Suppressed pass: consume the same tokens, emit nothing.
            self.skip_balanced(open_index)?;
            if self.match_kind(TokenKind::RArrow) {
                self.skip_lambda_body()?;
            }
            return Ok(());
        }

        let mark = self.current;
        self.skip_balanced(open_index)?;

        if self.match_kind(TokenKind::RArrow) {
            // `(params) -> body` closure literal.
            self.current = mark;
            let bound = self.comp.is_object();
            let params = self.param_list(bound)?;
            self.consume(TokenKind::RParen, "Expect ')' after expression.")?;
            self.consume(TokenKind::RArrow, "Expect '->' after function parameters.")?;

            self.comp.push_function(None);
            if bound {
                self.comp.add_local("this");
            }
            for param in &params {
                self.comp.add_local(param);
            }
            self.comp.add_local("args");

            self.arrow_func()?;
            self.comp
                .pop_function(params.len() + usize::from(bound), bound)?;
        } else {
            self.current = mark;
            self.assignment(true)?;
            self.consume(TokenKind::RParen, "Expect ')' after expression.")?;
        }
        Ok(())
    }

    fn identifier_expr(&mut self) -> CompileResult<()> {
        let id = self.previous();
        let name = self.text(&id).to_owned();
        self.comp.set_pos(&id);

        if self.comp.is_look_up() && self.match_kind(TokenKind::RArrow) {
            return self.skip_lambda_body();
        }

        if self.match_kind(TokenKind::RArrow) {
            // `name -> body`: a one-parameter closure literal.
            self.comp.emit(Opcode::PushNil);
            let bound = self.comp.is_object();
            if bound {
                self.comp.emit(Opcode::PushNil);
            }

            self.comp.push_function(None);
            if bound {
                self.comp.add_local("this");
            }
            self.comp.add_local(&name);
            self.comp.add_local("args");

            self.arrow_func()?;
            self.comp.pop_function(1 + usize::from(bound), bound)?;
            return Ok(());
        }

        if self.match_kind(TokenKind::LArrow) {
            // Walrus: assign and keep the value.
            if self.has_walrus {
                return Err(CompileError::new(
                    CompileErrorKind::ChainedWalrus,
                    self.peek().span(),
                ));
            }
            self.has_walrus = true;
            self.cond_expr()?;
            self.has_walrus = false;

            self.comp.emit(Opcode::DupTop);
            self.comp.set_pos(&id);
            return self.comp.store_variable(&name);
        }

        if self.is_assign() {
            self.comp.store_variable(&name)
        } else {
            self.comp.load_variable(&name)
        }
    }

    fn skip_lambda_body(&mut self) -> CompileResult<()> {
        if self.match_kind(TokenKind::LBrace) {
            let open_index = self.current - 1;
            self.skip_balanced(open_index)?;
        } else {
            self.expr()?;
        }
        Ok(())
    }

    fn list_literal(&mut self) -> CompileResult<()> {
        let open = self.previous();
        self.comp.set_pos(&open);

        if self.match_kind(TokenKind::RBracket) {
            self.comp.emit_16(Opcode::PushList, 0);
            return Ok(());
        }

        let mut size = 0u16;
        loop {
            if self.check(TokenKind::RBracket) {
                break; // trailing comma
            }
            self.cond_expr()?;
            size += 1;
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RBracket, "Expect ']' at the end of list literal.")?;
        self.comp.emit_16(Opcode::PushList, size);
        Ok(())
    }

    fn map_literal(&mut self) -> CompileResult<()> {
        let open_index = self.current - 1;
        self.comp.set_pos(&self.tokens[open_index]);

        if self.comp.is_look_up() {
            return self.skip_balanced(open_index);
        }

        self.comp.push_object();
        if self.match_kind(TokenKind::RBrace) {
            self.comp.pop_object();
            self.comp.emit_16(Opcode::PushMap, 0);
            return Ok(());
        }

        let keyish = [
            TokenKind::Str,
            TokenKind::Id,
            TokenKind::Num,
            TokenKind::False,
            TokenKind::True,
        ];
        let mut size = 0u16;
        loop {
            if !self.match_any(&keyish) {
                return Err(CompileError::expected(
                    "Unexpected key expression.",
                    self.peek().span(),
                ));
            }
            let key_token = self.previous();
            let key = self.text(&key_token).to_owned();
            let key_value = self.comp.heap.alloc_str(key.clone());
            let index = self.comp.store_const(key_value)?;

            if self.match_kind(TokenKind::LParen) {
                self.method_entry(&key)?;
            } else {
                if key == "constructor" {
                    return Err(CompileError::new(
                        CompileErrorKind::ReservedConstructor,
                        key_token.span(),
                    ));
                }
                self.consume(TokenKind::Colon, "Expect ':' after object key expression.")?;
                self.cond_expr()?;
            }

            // The key rides above its value for PUSH_MAP.
            self.comp.emit_16(Opcode::LoadConst, index);
            size += 1;

            if !self.match_kind(TokenKind::Comma) || self.check(TokenKind::RBrace) {
                break;
            }
        }

        self.consume(TokenKind::RBrace, "Expect '}' at the end of map literal.")?;
        self.comp.pop_object();
        self.comp.emit_16(Opcode::PushMap, size);
        Ok(())
    }

    /// `key(params) { body }` inside a map literal: a method whose
    /// slot 0 binds the owning map at call time.
    fn method_entry(&mut self, key: &str) -> CompileResult<()> {
        let params = self.param_list(true)?;
        self.consume(TokenKind::RParen, "Expect ')' before function body.")?;
        self.consume(TokenKind::LBrace, "Expect '{' before function body.")?;

        self.comp.push_function(Some(key));
        self.comp.add_local("this");
        for param in &params {
            self.comp.add_local(param);
        }
        self.comp.add_local("args");
        self.value_kept = false;

        if self.match_kind(TokenKind::RBrace) {
            self.emit_implicit_return();
        } else {
            while !self.check(TokenKind::RBrace) && !self.at_end() {
                self.declaration()?;
            }
            if !self.is_return {
                self.emit_implicit_return();
            }
            self.is_return = false;
            self.consume(TokenKind::RBrace, "Expect '}' after function body.")?;
        }

        self.comp.pop_function(params.len() + 1, true)
    }

    fn function_expr(&mut self) -> CompileResult<()> {
        let fun = self.previous();
        self.comp.set_pos(&fun);

        self.consume(TokenKind::LParen, "Expect '(' after 'fun'.")?;
        let bound = self.comp.is_object();
        let params = self.param_list(bound)?;
        self.consume(TokenKind::RParen, "Expect ')' before function body.")?;
        self.consume(TokenKind::LBrace, "Expect '{' before function body.")?;

        self.comp.push_function(None);
        if bound {
            self.comp.add_local("this");
        }
        for param in &params {
            self.comp.add_local(param);
        }
        self.comp.add_local("args");
        self.value_kept = false;

        if self.match_kind(TokenKind::RBrace) {
            self.emit_implicit_return();
            self.is_return = true;
        } else {
            while !self.check(TokenKind::RBrace) && !self.at_end() {
                self.declaration()?;
            }
            if !self.is_return {
                self.emit_implicit_return();
            }
            self.consume(TokenKind::RBrace, "Expect '}' after function body.")?;
        }
        self.is_return = false;

        self.comp.pop_function(params.len() + usize::from(bound), bound)
    }

    fn arrow_func(&mut self) -> CompileResult<()> {
        if self.match_kind(TokenKind::LBrace) {
            let open = self.previous();
            self.value_kept = false;

            if self.check(TokenKind::RBrace) {
                self.comp.set_pos(&open);
                self.emit_implicit_return();
                self.is_return = true;
            } else {
                while !self.check(TokenKind::RBrace) && !self.at_end() {
                    self.declaration()?;
                }
            }

            if !self.is_return {
                let here = self.peek();
                self.comp.set_pos(&here);
                self.emit_implicit_return();
            }
            self.is_return = false;

            let rbrace = self.consume(TokenKind::RBrace, "Expect '}' after function body.")?;
            self.comp.set_pos(&rbrace);
        } else {
            // Single-expression body: the value is the return value.
            let start = self.peek();
            self.expr()?;
            self.comp.set_pos(&start);
            self.comp.emit(Opcode::Return);
        }
        Ok(())
    }

    fn emit_implicit_return(&mut self) {
        if self.comp.is_constructor() {
            self.comp.emit_8(Opcode::LoadLocal, 0);
        } else if self.value_kept {
            // A trailing expression statement kept its value on the
            // stack; it becomes the return value.
            self.value_kept = false;
            self.comp.emit(Opcode::Return);
            return;
        } else {
            self.comp.emit(Opcode::PushNil);
        }
        self.comp.emit(Opcode::Return);
    }
}

fn compound_op(op: TokenKind) -> Option<BinaryOp> {
    Some(match op {
        TokenKind::PlusAssign => BinaryOp::Add,
        TokenKind::MinusAssign => BinaryOp::Sub,
        TokenKind::MultAssign => BinaryOp::Mul,
        TokenKind::DivAssign => BinaryOp::Div,
        TokenKind::ModAssign => BinaryOp::Mod,
        TokenKind::BitOrAssign => BinaryOp::BitOr,
        TokenKind::XorAssign => BinaryOp::BitXor,
        TokenKind::BitAndAssign => BinaryOp::BitAnd,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pi_asm::{CONST_FALSE, CONST_INF, CONST_NAN, CONST_TRUE};

    fn chunk_of(source: &str) -> (Chunk, Heap) {
        let mut heap = Heap::new();
        let chunk = compile(source, &mut heap, ParseMode::Program)
            .unwrap_or_else(|e| panic!("compile failed: {e}\nsource: {source}"));
        (chunk, heap)
    }

    #[test]
    fn reserved_constants_sit_at_fixed_indices() {
        let (chunk, _heap) = chunk_of("1");
        assert!(matches!(chunk.constants[CONST_NAN as usize], Value::Num(n) if n.is_nan()));
        assert!(
            matches!(chunk.constants[CONST_INF as usize], Value::Num(n) if n.is_infinite())
        );
        assert_eq!(chunk.constants[CONST_TRUE as usize], Value::Bool(true));
        assert_eq!(chunk.constants[CONST_FALSE as usize], Value::Bool(false));
    }

    #[test]
    fn structurally_equal_constants_intern_to_one_slot() {
        let (chunk, heap) = chunk_of("let a = 42; let b = 42; let s = \"hi\"; let t = \"hi\"");
        let forty_twos = chunk
            .constants
            .iter()
            .filter(|v| matches!(v, Value::Num(n) if *n == 42.0))
            .count();
        assert_eq!(forty_twos, 1);

        let his = chunk
            .constants
            .iter()
            .filter(|v| heap.str_of(**v).map_or(false, |s| s.as_str() == "hi"))
            .count();
        assert_eq!(his, 1);
    }

    #[test]
    fn booleans_reuse_the_reserved_slots() {
        let (chunk, _heap) = chunk_of("let a = true; let b = true; let c = false");
        let trues = chunk
            .constants
            .iter()
            .filter(|v| matches!(v, Value::Bool(true)))
            .count();
        assert_eq!(trues, 1);
    }

    #[test]
    fn top_level_code_ends_with_halt() {
        let (chunk, heap) = chunk_of("1 + 1");
        let code = match heap.get(chunk.code) {
            Object::Code(c) => c,
            _ => panic!("chunk.code is not a code object"),
        };
        assert_eq!(*code.code.last().unwrap(), Opcode::Halt as u8);
        // Every instruction has a recorded source position.
        assert!(!code.spans.is_empty());
        assert_eq!(code.spans[0].0, 0);
    }

    #[test]
    fn global_names_intern_once() {
        let (chunk, _heap) = chunk_of("let x = 1; x = 2; x = x + 1");
        assert_eq!(chunk.names.iter().filter(|n| *n == "x").count(), 1);
    }

    #[test]
    fn functions_compile_to_code_constants() {
        let (chunk, heap) = chunk_of("fun f(a) { a }");
        let code_consts = chunk
            .constants
            .iter()
            .filter(|v| {
                v.as_obj()
                    .map_or(false, |id| matches!(heap.get(id), Object::Code(_)))
            })
            .count();
        assert_eq!(code_consts, 1);
        assert!(chunk.names.contains(&"f".to_owned()));
    }

    #[test]
    fn disassembly_round_trips_instruction_sizes() {
        let (chunk, heap) = chunk_of(
            "let x = 0; for i in 1..=3 { x += i } if (x > 2) { x = 0 } else { x = 1 }",
        );
        let code = match heap.get(chunk.code) {
            Object::Code(c) => c,
            _ => panic!("not code"),
        };
        // Walking the stream by declared operand widths must land
        // exactly on the end.
        let mut pc = 0usize;
        while pc < code.code.len() {
            let op = Opcode::try_from(code.code[pc]).expect("valid opcode");
            pc += 1 + op.operand_bytes();
        }
        assert_eq!(pc, code.code.len());

        let listing = crate::debug::disassemble(code, &chunk.constants, &heap);
        assert!(listing.contains("PushIter"));
        assert!(listing.contains("Loop"));
        assert!(listing.contains("Halt"));
    }

    #[test]
    fn parse_errors_surface_with_positions() {
        let mut heap = Heap::new();
        let err = compile("let x = (1 + ", &mut heap, ParseMode::Program).unwrap_err();
        assert!(err.span.line >= 1);
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
