//! The error model: lex and parse failures with positions, runtime
//! faults with reasons and positions.

use pi_vm::prelude::*;

fn compile_err(source: &str) -> CompileError {
    let mut console = MemoryConsole::new();
    match console.eval(source) {
        Err(InterpreterError::Compile(e)) => e,
        Ok(v) => panic!("expected a compile error, got value {v:?}"),
        Err(other) => panic!("expected a compile error, got {other}"),
    }
}

fn runtime_err(source: &str) -> RuntimeError {
    let mut console = MemoryConsole::new();
    match console.eval(source) {
        Err(InterpreterError::Runtime(e)) => e,
        Ok(v) => panic!("expected a runtime error, got value {v:?}"),
        Err(other) => panic!("expected a runtime error, got {other}"),
    }
}

#[test]
fn lex_errors() {
    assert_eq!(
        compile_err("/* never closed").kind,
        CompileErrorKind::UnclosedComment
    );
    assert_eq!(
        compile_err("\"runaway").kind,
        CompileErrorKind::UnterminatedString
    );
    assert!(matches!(
        compile_err("012").kind,
        CompileErrorKind::MalformedNumber(_)
    ));
    assert!(matches!(
        compile_err("let $ = 1").kind,
        CompileErrorKind::StrayChar('$')
    ));
}

#[test]
fn parse_errors() {
    assert_eq!(
        compile_err("break").kind,
        CompileErrorKind::BreakOutsideLoop
    );
    assert_eq!(
        compile_err("continue").kind,
        CompileErrorKind::ContinueOutsideLoop
    );
    assert_eq!(
        compile_err("return 1").kind,
        CompileErrorKind::ReturnOutsideFunction
    );
    assert_eq!(
        compile_err("5 = 1").kind,
        CompileErrorKind::InvalidAssignmentTarget
    );
    assert_eq!(
        compile_err("(a) = 1").kind,
        CompileErrorKind::InvalidAssignmentTarget
    );
    assert_eq!(
        compile_err("let xs = [1, 2]; xs[0:1] = 9").kind,
        CompileErrorKind::AssignToSlice
    );
    assert_eq!(
        compile_err("let a = 1; let b = 2; a <- b <- 3").kind,
        CompileErrorKind::ChainedWalrus
    );
    assert_eq!(
        compile_err("{constructor: 1}").kind,
        CompileErrorKind::ReservedConstructor
    );
}

#[test]
fn unreachable_code_after_return() {
    let source = r#"
        fun f() {
            return 1
            2
        }
    "#;
    assert!(matches!(
        compile_err(source).kind,
        CompileErrorKind::UnreachableCode(_)
    ));
}

#[test]
fn too_many_parameters() {
    let params: Vec<String> = (0..40).map(|i| format!("p{i}")).collect();
    let source = format!("fun f({}) {{ 0 }}", params.join(", "));
    assert!(matches!(
        compile_err(&source).kind,
        CompileErrorKind::TooManyParameters(_)
    ));
}

#[test]
fn compile_errors_carry_positions() {
    let err = compile_err("let ok = 1\nbreak");
    assert_eq!(err.span.line, 2);
    assert!(err.span.column >= 1);
    // And the rendered form names the position.
    assert!(err.to_string().contains("line 2"));
}

#[test]
fn runtime_fault_reasons() {
    assert_eq!(runtime_err("5()").reason, PanicReason::NotCallable);
    assert_eq!(runtime_err("[][0]").reason, PanicReason::IndexOutOfBounds);
    assert_eq!(runtime_err("sqrt(-1)").reason, PanicReason::DomainError);
    assert_eq!(runtime_err("logE(0)").reason, PanicReason::DomainError);
    assert_eq!(runtime_err("1..5:0").reason, PanicReason::ZeroStep);
    assert_eq!(
        runtime_err("let xs = [1]; xs[0:1:0]").reason,
        PanicReason::ZeroStep
    );
    assert_eq!(
        runtime_err("missing_name").reason,
        PanicReason::UndefinedGlobal
    );
    assert_eq!(runtime_err("1 < \"a\"").reason, PanicReason::Incomparable);
    assert_eq!(runtime_err("5[0]").reason, PanicReason::NotIndexable);
    assert_eq!(
        runtime_err("as_num(\"nope\")").reason,
        PanicReason::InvalidNumber
    );
    assert_eq!(
        runtime_err("as_num({})").reason,
        PanicReason::TypeMismatch
    );
}

#[test]
fn runtime_errors_carry_positions() {
    let err = runtime_err("let ok = 1\nsqrt(-1)");
    let span = err.span.expect("runtime errors are positioned");
    assert_eq!(span.line, 2);
}

#[test]
fn division_by_zero_is_not_an_error() {
    let mut console = MemoryConsole::new();
    assert_eq!(console.eval_to_string("1 / 0").unwrap(), "INF");
    assert_eq!(console.eval_to_string("0 / 0").unwrap(), "NAN");
    assert_eq!(console.eval_to_string("5 % 0").unwrap(), "NAN");
}

#[test]
fn strings_are_immutable() {
    assert_eq!(
        runtime_err("let s = \"abc\"; s[0] = \"x\"").reason,
        PanicReason::TypeMismatch
    );
}

#[test]
fn deep_recursion_overflows_cleanly() {
    let source = r#"
        fun dive(n) { dive(n + 1) }
        dive(0)
    "#;
    assert_eq!(
        runtime_err(source).reason,
        PanicReason::CallDepthExceeded
    );
}

#[test]
fn stack_stays_usable_after_an_error() {
    let mut console = MemoryConsole::new();
    assert!(console.eval("sqrt(-1)").is_err());
    // The REPL handler recovers at the boundary and keeps going.
    assert_eq!(console.eval_to_string("1 + 1").unwrap(), "2");
}

#[test]
fn batch_mode_reports_and_stops() {
    let mut console = MemoryConsole::new();
    let err = console.run_source("let x = nil\nx()").unwrap_err();
    let text = err.to_string();
    assert!(text.starts_with("Runtime error:"), "got: {text}");
    assert!(text.contains("line 2"), "got: {text}");
}
