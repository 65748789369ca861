//! Collection behavior under real programs, plus cooperative
//! cancellation at safe-points.

use std::time::Duration;

use pi_vm::prelude::*;

#[test]
fn surviving_data_is_intact_after_collections() {
    let mut console = MemoryConsole::new();
    // Enough string churn to cross the collection threshold several
    // times; everything reachable must survive unscathed.
    let source = r#"
        let keep = []
        for i in 1..2000 {
            push(keep, "s" + i)
        }
        len(keep)
    "#;
    assert_eq!(console.eval_to_string(source).unwrap(), "1999");
    assert_eq!(console.eval_to_string("keep[0]").unwrap(), "s1");
    assert_eq!(console.eval_to_string("keep[-1]").unwrap(), "s1999");
}

#[test]
fn garbage_does_not_accumulate_without_bound() {
    let mut console = MemoryConsole::new();
    let source = r#"
        for i in 1..5000 {
            let dead = ["garbage", i, [i, i]]
        }
        1
    "#;
    assert_eq!(console.eval_to_string(source).unwrap(), "1");
    // Most of those ~20k allocations must be gone; the live set is the
    // globals plus whatever fits under the adaptive threshold.
    assert!(
        console.vm().heap().len() < 20_000,
        "heap kept {} objects",
        console.vm().heap().len()
    );
}

#[test]
fn cycles_are_collected() {
    let mut console = MemoryConsole::new();
    // A map holding a closure that captures the map through `this`,
    // and a self-referencing entry. Dropped each iteration.
    let source = r#"
        for i in 1..3000 {
            let m = {tag: i, describe() { this.tag }}
            m.myself = m
        }
        1
    "#;
    assert_eq!(console.eval_to_string(source).unwrap(), "1");
    assert!(
        console.vm().heap().len() < 20_000,
        "heap kept {} objects",
        console.vm().heap().len()
    );
}

#[test]
fn closed_upvalues_survive_collection() {
    let mut console = MemoryConsole::new();
    let source = r#"
        fun mk() {
            let secret = "kept alive by the closure"
            () -> secret
        }
        let f = mk()
        for i in 1..3000 {
            let churn = ["garbage", i]
        }
        f()
    "#;
    assert_eq!(
        console.eval_to_string(source).unwrap(),
        "kept alive by the closure"
    );
}

#[test]
fn cancellation_exits_at_a_safe_point() {
    let mut console = MemoryConsole::new();
    let handle = console.halt_handle();

    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        handle.halt();
    });

    let state = console.run_source("while (true) { }").unwrap();
    assert_eq!(state, ProgramState::Cancelled);
    assert!(console.vm().was_cancelled());
    stopper.join().expect("stopper thread");
}

#[test]
fn the_vm_can_run_again_after_cancellation() {
    let mut console = MemoryConsole::new();
    let handle = console.halt_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        handle.halt();
    });
    console.run_source("while (true) { }").unwrap();
    stopper.join().expect("stopper thread");

    // `run` re-arms the flag; the next program completes normally.
    assert_eq!(console.eval_to_string("2 + 2").unwrap(), "4");
}
