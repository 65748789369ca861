//! Lists, maps, strings, slices, and the collection builtins.

use pi_vm::prelude::*;

fn eval(source: &str) -> String {
    let mut console = MemoryConsole::new();
    console
        .eval_to_string(source)
        .unwrap_or_else(|e| panic!("program failed: {e}\nsource: {source}"))
}

#[test]
fn list_literals_and_indexing() {
    assert_eq!(eval("[1, 2, 3]"), "[1, 2, 3]");
    assert_eq!(eval("[1, 2, 3,]"), "[1, 2, 3]"); // trailing comma
    assert_eq!(eval("[]"), "[]");
    assert_eq!(eval("[10, 20, 30][1]"), "20");
    assert_eq!(eval("[10, 20, 30][-1]"), "30"); // negative wraps
    assert_eq!(eval("[10, 20, 30][4]"), "20"); // and so does overflow
    assert_eq!(eval("let xs = [1, 2]; xs[0] = 9; xs"), "[9, 2]");
}

#[test]
fn spec_scenario_sort() {
    assert_eq!(eval("let xs = [3, 1, 2]; sort(xs); xs"), "[1, 2, 3]");
}

#[test]
fn spec_scenario_map_access() {
    assert_eq!(eval("let m = {a: 1, b: 2}; keys(m)"), "[a, b]");
    assert_eq!(eval("let m = {a: 1, b: 2}; m.a + m[\"b\"]"), "3");
}

#[test]
fn map_literals_and_member_access() {
    assert_eq!(eval("{a: 1, b: 2}"), "{a: 1, b: 2}");
    assert_eq!(eval("{}"), "{}");
    assert_eq!(eval("let m = {x: 1}; m.x = 5; m.x"), "5");
    assert_eq!(eval("let m = {}; m.fresh = 1; m.fresh"), "1");
    // A miss is nil, not a fault.
    assert_eq!(eval("let m = {a: 1}; m.missing"), "nil");
    // Numeric and boolean keys canonicalize to their printed form.
    assert_eq!(eval("let m = {1: \"one\"}; m[1]"), "one");
    assert_eq!(eval("let m = {1: \"one\"}; m[\"1\"]"), "one");
}

#[test]
fn map_insertion_order_is_stable() {
    assert_eq!(
        eval("let m = {z: 1, a: 2}; m.q = 3; keys(m)"),
        "[z, a, q]"
    );
    assert_eq!(eval("let m = {z: 1, a: 2, q: 3}; values(m)"), "[1, 2, 3]");
}

#[test]
fn methods_bind_this() {
    let source = r#"
        let obj = {
            count: 0,
            bump() { this.count = this.count + 1; this.count }
        }
        obj.bump()
        obj.bump()
    "#;
    assert_eq!(eval(source), "2");
}

#[test]
fn constructor_returns_this() {
    let source = r#"
        let proto = {
            constructor(n) { this.n = n }
        }
        let made = proto.constructor(7)
        made.n
    "#;
    assert_eq!(eval(source), "7");
}

#[test]
fn clone_delegates_through_proto() {
    let source = r#"
        let base = {answer() { 42 }}
        let inst = clone(base)
        inst.answer()
    "#;
    assert_eq!(eval(source), "42");
    // Own entries shadow the prototype.
    let shadow = r#"
        let base = {kind: "base"}
        let inst = clone(base)
        inst.kind = "inst"
        inst.kind + "/" + base.kind
    "#;
    assert_eq!(eval(shadow), "inst/base");
}

#[test]
fn slices() {
    assert_eq!(eval("[1, 2, 3, 4][1:3]"), "[2, 3]");
    assert_eq!(eval("[1, 2, 3, 4][2:]"), "[3, 4]");
    assert_eq!(eval("[1, 2, 3, 4][:2]"), "[1, 2]");
    assert_eq!(eval("[1, 2, 3, 4, 5][::2]"), "[1, 3, 5]");
    assert_eq!(eval("\"hello\"[1:3]"), "el");
    // The whole-sequence identity from the slice laws.
    assert_eq!(eval("let xs = [1, 2, 3]; xs[0:len(xs):1] == xs"), "true");
    // Concatenating adjacent slices reproduces the containing slice.
    assert_eq!(
        eval("let xs = [5, 6, 7, 8]; xs[0:2:1] + xs[2:4:1] == xs[0:4:1]"),
        "true"
    );
}

#[test]
fn string_builtins() {
    assert_eq!(eval("upper(\"abc\")"), "ABC");
    assert_eq!(eval("lower(\"AbC\")"), "abc");
    assert_eq!(eval("trim(\"  x  \")"), "x");
    assert_eq!(eval("replace(\"a-b-c\", \"-\", \"+\")"), "a+b+c");
    assert_eq!(eval("split(\"a,b,c\", \",\")"), "[a, b, c]");
    assert_eq!(eval("char(65)"), "A");
    assert_eq!(eval("ord(\"A\")"), "65");
    assert_eq!(eval("\"abc\"[1]"), "b");
    assert_eq!(eval("is_digit(\"123\")"), "true");
    assert_eq!(eval("is_digit(\"12a\")"), "false");
    assert_eq!(eval("is_numeric(\"1.5\")"), "true");
}

#[test]
fn list_builtins() {
    assert_eq!(eval("len([1, 2, 3])"), "3");
    assert_eq!(eval("let xs = [1]; push(xs, 2, 3); xs"), "[1, 2, 3]");
    assert_eq!(eval("let xs = [1, 2]; pop(xs)"), "2");
    assert_eq!(eval("let xs = [1, 2]; pop(xs); xs"), "[1]");
    assert_eq!(eval("peek([7, 8])"), "8");
    assert_eq!(eval("empty([])"), "true");
    assert_eq!(eval("let xs = [1, 3]; insert(xs, 1, 2); xs"), "[1, 2, 3]");
    assert_eq!(eval("let xs = [1, 2, 3]; remove(xs, 1); xs"), "[1, 3]");
    assert_eq!(eval("let xs = [2]; unshift(xs, 1); xs"), "[1, 2]");
    assert_eq!(eval("let xs = [1]; append(xs, [2, 3]); xs"), "[1, 2, 3]");
    assert_eq!(eval("contains([1, 2], 2)"), "true");
    assert_eq!(eval("index_of([5, 6, 7], 7)"), "2");
    assert_eq!(eval("index_of([5, 6], 9)"), "-1");
    assert_eq!(eval("let xs = [1, 2, 3]; reverse(xs); xs"), "[3, 2, 1]");
}

#[test]
fn copy_is_deep() {
    let source = r#"
        let xs = [[1], [2]]
        let ys = copy(xs)
        ys[0][0] = 9
        xs[0][0]
    "#;
    assert_eq!(eval(source), "1");
}

#[test]
fn map_remove_by_key() {
    assert_eq!(
        eval("let m = {a: 1, b: 2}; remove(m, \"a\"); keys(m)"),
        "[b]"
    );
}

#[test]
fn functional_builtins() {
    assert_eq!(eval("map(x -> x * 2, [1, 2, 3])"), "[2, 4, 6]");
    assert_eq!(eval("filter(x -> x % 2 == 0, [1, 2, 3, 4])"), "[2, 4]");
    assert_eq!(eval("reduce((a, b) -> a + b, [1, 2, 3, 4])"), "10");
    assert_eq!(eval("reduce((a, b) -> a + b, [1, 2], 10)"), "13");
    assert_eq!(eval("find(x -> x > 2, [1, 2, 3, 4])"), "3");
    assert_eq!(eval("find(x -> x > 9, [1, 2])"), "nil");
    // Builtins compose with scripted closures.
    assert_eq!(
        eval("let base = 10; map(x -> x + base, [1, 2])"),
        "[11, 12]"
    );
}

#[test]
fn membership_operator() {
    assert_eq!(eval("2 in [1, 2]"), "true");
    assert_eq!(eval("5 in [1, 2]"), "false");
    assert_eq!(eval("\"ell\" in \"hello\""), "true");
    assert_eq!(eval("\"a\" in {a: 1}"), "true");
    assert_eq!(eval("3 in 1..5"), "true");
    assert_eq!(eval("5 in 1..5"), "false");
    assert_eq!(eval("5 in 1..=5"), "true");
}

#[test]
fn stats_builtins() {
    assert_eq!(eval("min([3, 1, 2])"), "1");
    assert_eq!(eval("max(3, 9, 2)"), "9");
    assert_eq!(eval("sum([1, 2, 3])"), "6");
    assert_eq!(eval("mean([2, 4])"), "3");
}

#[test]
fn seeded_random_is_reproducible() {
    let a = eval("seed(7); rand_n(1000)");
    let b = eval("seed(7); rand_n(1000)");
    assert_eq!(a, b);
}
