//! Iteration: ranges, strings, maps, break/continue, and the range
//! cardinality law.

use pi_vm::prelude::*;

fn eval(source: &str) -> String {
    let mut console = MemoryConsole::new();
    console
        .eval_to_string(source)
        .unwrap_or_else(|e| panic!("program failed: {e}\nsource: {source}"))
}

#[test]
fn range_iteration_is_end_exclusive() {
    assert_eq!(eval("let out = []; for i in 0..3 { push(out, i) } out"), "[0, 1, 2]");
    assert_eq!(
        eval("let out = []; for i in 0..=3 { push(out, i) } out"),
        "[0, 1, 2, 3]"
    );
}

#[test]
fn range_steps_and_direction() {
    assert_eq!(
        eval("let out = []; for i in 0..10:3 { push(out, i) } out"),
        "[0, 3, 6, 9]"
    );
    assert_eq!(
        eval("let out = []; for i in 5..0 { push(out, i) } out"),
        "[5, 4, 3, 2, 1]"
    );
}

#[test]
fn range_cardinality_law() {
    // range(a, b, s) yields ceil((b-a)/s) values when walking toward
    // the bound, zero otherwise.
    let count = r#"
        fun count(r) {
            let n = 0
            for v in r { n += 1 }
            n
        }
    "#;
    assert_eq!(eval(&format!("{count} count(range(0, 10, 3))")), "4");
    assert_eq!(eval(&format!("{count} count(range(0, 9, 3))")), "3");
    assert_eq!(eval(&format!("{count} count(range(10, 0, -3))")), "4");
    assert_eq!(eval(&format!("{count} count(range(0, 10, -1))")), "0");
    assert_eq!(eval(&format!("{count} count(range(0, 0, 1))")), "0");
}

#[test]
fn list_and_string_iteration() {
    assert_eq!(
        eval("let total = 0; for x in [1, 2, 3] { total += x } total"),
        "6"
    );
    assert_eq!(eval("let s = \"\"; for ch in \"abc\" { s += ch } s"), "abc");
}

#[test]
fn map_iteration_yields_values_in_order() {
    assert_eq!(
        eval("let out = []; for v in {a: 1, b: 2, c: 3} { push(out, v) } out"),
        "[1, 2, 3]"
    );
}

#[test]
fn break_and_continue() {
    let source = r#"
        let total = 0
        for i in 1..10 {
            if (i == 3) { continue }
            if (i == 6) { break }
            total += i
        }
        total
    "#;
    assert_eq!(eval(source), "12"); // 1 + 2 + 4 + 5

    let while_break = r#"
        let n = 0
        while (true) {
            n += 1
            if (n >= 4) { break }
        }
        n
    "#;
    assert_eq!(eval(while_break), "4");
}

#[test]
fn nested_loops_use_their_own_iterators() {
    let source = r#"
        let pairs = []
        for i in 0..2 {
            for j in 0..2 {
                push(pairs, i * 10 + j)
            }
        }
        pairs
    "#;
    assert_eq!(eval(source), "[0, 1, 10, 11]");
}

#[test]
fn break_in_nested_loop_only_exits_inner() {
    let source = r#"
        let out = []
        for i in 0..3 {
            for j in 0..3 {
                if (j == 1) { break }
                push(out, i)
            }
        }
        out
    "#;
    assert_eq!(eval(source), "[0, 1, 2]");
}

#[test]
fn loop_variable_rebinding_per_iteration() {
    // Early return from inside a loop abandons the iterator cleanly.
    let source = r#"
        fun first_over(limit, xs) {
            for x in xs {
                if (x > limit) { return x }
            }
            return -1
        }
        first_over(2, [1, 2, 3, 4]) + first_over(9, [1])
    "#;
    assert_eq!(eval(source), "2"); // 3 + -1
}

#[test]
fn iterating_a_non_iterable_faults() {
    let mut console = MemoryConsole::new();
    let err = console.eval("for x in 5 { }").unwrap_err();
    match err {
        InterpreterError::Runtime(e) => {
            assert_eq!(e.reason, PanicReason::NotIterable);
            assert!(e.span.is_some());
        }
        other => panic!("expected a runtime fault, got {other}"),
    }
}
