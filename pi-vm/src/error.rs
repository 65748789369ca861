//! Compile-time and runtime error types.

use core::fmt;

use pi_asm::PanicReason;

/// Source position, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Line number.
    pub line: u32,
    /// Column number.
    pub column: u32,
}

impl Span {
    /// Build a span from line and column.
    pub const fn new(line: u32, column: u32) -> Self {
        Span { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// What went wrong while lexing or parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileErrorKind {
    /// A `/* … */` comment ran to end of input.
    #[error("unclosed comment")]
    UnclosedComment,
    /// A string literal ran to end of input.
    #[error("unterminated string")]
    UnterminatedString,
    /// A numeric literal broke the lexical rules.
    #[error("malformed number: {0}")]
    MalformedNumber(String),
    /// A character no rule accepts.
    #[error("unexpected character {0:?}")]
    StrayChar(char),
    /// A token other than the one the grammar requires; carries the
    /// parser's message verbatim.
    #[error("{0}")]
    Expected(String),
    /// A closing bracket with no matching opener, or vice versa.
    #[error("unmatched {0:?}")]
    UnmatchedBracket(char),
    /// The left-hand side of an assignment cannot be stored into.
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    /// Slices are read-only views.
    #[error("cannot assign to slice")]
    AssignToSlice,
    /// `break` outside a loop body.
    #[error("'break' used outside of a loop")]
    BreakOutsideLoop,
    /// `continue` outside a loop body.
    #[error("'continue' used outside of a loop")]
    ContinueOutsideLoop,
    /// `return` outside a function body.
    #[error("'return' used outside of a function")]
    ReturnOutsideFunction,
    /// Statements after a `return`/`break`/`continue` in one block.
    #[error("unreachable code after {0}")]
    UnreachableCode(&'static str),
    /// More parameters than the VM supports.
    #[error("can't have more than {0} parameters")]
    TooManyParameters(usize),
    /// `constructor` used as a plain map key.
    #[error("'constructor' is reserved for methods")]
    ReservedConstructor,
    /// A second `<-` in one expression.
    #[error("chained '<-' operators are not allowed")]
    ChainedWalrus,
    /// Statement boundary missing where one is required.
    #[error("expected delimiter between statements")]
    MissingDelimiter,
}

/// A lex or parse failure with its source position.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} at {span}")]
pub struct CompileError {
    /// What went wrong.
    pub kind: CompileErrorKind,
    /// Where it went wrong.
    pub span: Span,
}

impl CompileError {
    /// Build an error at the given position.
    pub fn new(kind: CompileErrorKind, span: Span) -> Self {
        CompileError { kind, span }
    }

    /// Shorthand for the pervasive `consume`-style messages.
    pub fn expected(message: impl Into<String>, span: Span) -> Self {
        CompileError::new(CompileErrorKind::Expected(message.into()), span)
    }
}

/// A fault raised during execution, positioned at the instruction that
/// raised it once it crosses the dispatch loop.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub struct RuntimeError {
    /// The fault category.
    pub reason: PanicReason,
    /// Human-oriented detail; defaults to the reason's description.
    pub message: String,
    /// Filled in by the dispatch loop from the instruction metadata.
    pub span: Option<Span>,
}

impl RuntimeError {
    /// A fault with a custom message.
    pub fn msg(reason: PanicReason, message: impl Into<String>) -> Self {
        RuntimeError {
            reason,
            message: message.into(),
            span: None,
        }
    }

    /// Attach a source position unless one is already present.
    pub fn at(mut self, span: Span) -> Self {
        self.span.get_or_insert(span);
        self
    }
}

impl From<PanicReason> for RuntimeError {
    fn from(reason: PanicReason) -> Self {
        RuntimeError {
            reason,
            message: reason.description().into(),
            span: None,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{} at {span}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Union of everything that can stop a program.
#[derive(Debug, thiserror::Error)]
pub enum InterpreterError {
    /// The source never compiled.
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),
    /// The program faulted mid-run.
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    /// The cartridge could not be read.
    #[error(transparent)]
    Cartridge(#[from] pi_cart::CartError),
    /// Host-side I/O failed outside the VM.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<PanicReason> for InterpreterError {
    fn from(reason: PanicReason) -> Self {
        InterpreterError::Runtime(reason.into())
    }
}

/// Result of an operation that can only fault.
pub type SimpleResult<T> = Result<T, RuntimeError>;

/// Result of the compile pipeline.
pub type CompileResult<T> = Result<T, CompileError>;
