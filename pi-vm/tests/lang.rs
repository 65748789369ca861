//! Whole-program language tests driven through the in-memory console.

use pi_vm::prelude::*;
use test_case::test_case;

fn eval(source: &str) -> String {
    let mut console = MemoryConsole::new();
    console
        .eval_to_string(source)
        .unwrap_or_else(|e| panic!("program failed: {e}\nsource: {source}"))
}

#[test_case("1 + 2 * 3", "7" ; "mul binds tighter")]
#[test_case("(1 + 2) * 3", "9" ; "grouping")]
#[test_case("7 % 3", "1" ; "remainder")]
#[test_case("2 ** 3 ** 2", "512" ; "power is right associative")]
#[test_case("10 - 2 - 3", "5" ; "sub is left associative")]
#[test_case("-5 + 2", "-3" ; "negative literal")]
#[test_case("1 / 0", "INF" ; "div by zero is infinity")]
#[test_case("-1 / 0", "-INF" ; "negative infinity")]
fn arithmetic_and_precedence(source: &str, expected: &str) {
    assert_eq!(eval(source), expected);
}

#[test_case("0xff", "255" ; "hex")]
#[test_case("0b101", "5" ; "binary")]
#[test_case("0o17", "15" ; "octal")]
#[test_case("2.5e2", "250" ; "exponent")]
#[test_case(".5 * 2", "1" ; "bare fraction")]
fn numeric_literals(source: &str, expected: &str) {
    assert_eq!(eval(source), expected);
}

#[test]
fn equality_uses_tolerance() {
    assert_eq!(eval("0.1 + 0.2 == 0.3"), "true");
    assert_eq!(eval("1 != 2"), "true");
}

#[test]
fn bitwise_and_shifts() {
    assert_eq!(eval("5 & 3"), "1");
    assert_eq!(eval("5 | 2"), "7");
    assert_eq!(eval("5 ^ 1"), "4");
    assert_eq!(eval("1 << 4"), "16");
    assert_eq!(eval("-8 >> 1"), "-4");
    assert_eq!(eval("255 >>> 4"), "15");
    assert_eq!(eval("~0"), "-1");
}

#[test]
fn logical_operators_and_truthiness() {
    assert_eq!(eval("1 && 2"), "true");
    assert_eq!(eval("0 || \"\""), "false");
    assert_eq!(eval("!nil"), "true");
    assert_eq!(eval("!\"text\""), "false");
}

#[test]
fn chained_comparisons() {
    assert_eq!(eval("1 < 2 < 3"), "true");
    assert_eq!(eval("3 > 2 > 1"), "true");
    assert_eq!(eval("1 < 2 > 5"), "false");
    assert_eq!(eval("1 <= 1 <= 1"), "true");
}

#[test]
fn ternary_expression() {
    assert_eq!(eval("1 > 2 ? 3 : 4"), "4");
    assert_eq!(eval("5 > 2 ? 3 : 4"), "3");
    assert_eq!(eval("1 ? 2 ? 3 : 4 : 5"), "3");
}

#[test]
fn assignment_forms() {
    assert_eq!(eval("let x = 1; x += 4; x"), "5");
    assert_eq!(eval("let x = 10; x -= 3; x *= 2; x"), "14");
    assert_eq!(eval("let x = 7; x %= 4; x"), "3");
    assert_eq!(eval("let x = 6; x &= 3; x"), "2");
    assert_eq!(eval("let x = 4; x |= 1; x"), "5");
    assert_eq!(eval("let x = 5; x ^= 1; x"), "4");
    assert_eq!(eval("let a = 0, b = 0; a = b = 9; a + b"), "18");
    // Assignment is a no-op on observable state.
    assert_eq!(eval("let x = 3; x = x; x"), "3");
}

#[test]
fn walrus_pushes_the_value() {
    assert_eq!(eval("let y = 0; (y <- 5) + 1"), "6");
    assert_eq!(eval("let y = 0; y <- 5; y"), "5");
}

#[test]
fn increment_and_decrement() {
    assert_eq!(eval("let i = 5; i++"), "5"); // postfix yields the old value
    assert_eq!(eval("let i = 5; i++; i"), "6");
    assert_eq!(eval("let i = 5; ++i"), "6"); // prefix yields the new one
    assert_eq!(eval("let i = 5; --i; i"), "4");
}

#[test]
fn if_elif_else() {
    let pick = r#"
        fun pick(n) {
            if (n < 0) { return "neg" }
            elif (n == 0) { return "zero" }
            else { return "pos" }
        }
    "#;
    assert_eq!(eval(&format!("{pick} pick(-3)")), "neg");
    assert_eq!(eval(&format!("{pick} pick(0)")), "zero");
    assert_eq!(eval(&format!("{pick} pick(2)")), "pos");
    // Parens and braces are optional for single statements.
    assert_eq!(eval("let x = 0; if 1 < 2 x = 7; x"), "7");
}

#[test]
fn while_loop() {
    assert_eq!(eval("let n = 0; while (n < 5) { n += 1 } n"), "5");
}

#[test]
fn spec_scenario_inclusive_range_sum() {
    assert_eq!(eval("let x = 0; for i in 1..=5 { x += i } x"), "15");
}

#[test]
fn spec_scenario_closure_counter() {
    let source = r#"
        fun mk(n) {
            fun inc() { n += 1; n }
            inc
        }
        let c = mk(10)
        c(); c(); c()
    "#;
    assert_eq!(eval(source), "13");
}

#[test]
fn spec_scenario_fib() {
    let source = r#"
        fun fib(n) {
            if (n < 2) return n
            fib(n - 1) + fib(n - 2)
        }
        fib(10)
    "#;
    assert_eq!(eval(source), "55");
}

#[test]
fn hoisting_makes_later_definitions_callable() {
    let source = r#"
        fun first() { second() + 1 }
        fun second() { 41 }
        first()
    "#;
    assert_eq!(eval(source), "42");
}

#[test]
fn default_parameters_and_args_list() {
    assert_eq!(eval("fun f(a, b = 10) { a + b } f(1)"), "11");
    assert_eq!(eval("fun f(a, b = 10) { a + b } f(1, 2)"), "3");
    assert_eq!(eval("fun f() { args } f(1, 2, 3)"), "[1, 2, 3]");
    assert_eq!(eval("fun f(a) { args } f(7, 8)"), "[7, 8]");
}

#[test]
fn arrow_functions() {
    assert_eq!(eval("let double = x -> x * 2; double(21)"), "42");
    assert_eq!(eval("let add = (a, b) -> a + b; add(20, 22)"), "42");
    assert_eq!(eval("let f = (n) -> { let m = n + 1; m * 2 }; f(2)"), "6");
}

#[test]
fn anonymous_function_expressions() {
    assert_eq!(eval("let f = fun(x) { x * x }; f(6)"), "36");
}

#[test]
fn upvalues_propagate_through_nesting() {
    let source = r#"
        fun outer() {
            let x = 1
            fun middle() {
                fun inner() { x }
                inner
            }
            middle
        }
        outer()()()
    "#;
    assert_eq!(eval(source), "1");
}

#[test]
fn sibling_closures_share_a_captured_slot() {
    let source = r#"
        fun pair() {
            let n = 0
            let bump = () -> { n += 10; n }
            let read = () -> n
            bump()
            read()
        }
        pair()
    "#;
    assert_eq!(eval(source), "10");
}

#[test]
fn typeof_and_identity() {
    assert_eq!(eval("typeof 5"), "number");
    assert_eq!(eval("typeof \"s\""), "string");
    assert_eq!(eval("typeof nil"), "nil");
    assert_eq!(eval("typeof [1]"), "list");
    assert_eq!(eval("let a = [1]; let b = a; a is b"), "true");
    assert_eq!(eval("[1] is [1]"), "false");
    assert_eq!(eval("[1] == [1]"), "true");
}

#[test]
fn length_operator() {
    assert_eq!(eval("#\"abc\""), "3");
    assert_eq!(eval("#[1, 2]"), "2");
    assert_eq!(eval("#{a: 1}"), "1");
}

#[test]
fn string_concatenation_coerces() {
    assert_eq!(eval("\"a\" + 1"), "a1");
    assert_eq!(eval("1 + \"a\""), "1a");
    assert_eq!(eval("\"x = \" + true"), "x = true");
}

#[test]
fn conversions() {
    assert_eq!(eval("as_num(\"42.5\")"), "42.5");
    assert_eq!(eval("as_num(true)"), "1");
    assert_eq!(eval("as_str(15)"), "15");
    assert_eq!(eval("as_bool(0)"), "false");
    assert_eq!(eval("as_bool(\"x\")"), "true");
}

#[test]
fn globals_persist_across_console_runs() {
    let mut console = MemoryConsole::new();
    console.eval("let counter = 41").unwrap();
    let value = console.eval_to_string("counter + 1").unwrap();
    assert_eq!(value, "42");
}

#[test]
fn dot_product_operator() {
    assert_eq!(eval("[1, 2, 3] @ [4, 5, 6]"), "32");
}

#[test]
fn statement_delimiters() {
    // Newlines separate; semicolons are optional.
    assert_eq!(eval("let a = 1\nlet b = 2\na + b"), "3");
    assert_eq!(eval("let a = 1; let b = 2; a + b"), "3");
}
