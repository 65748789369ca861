//! The builtin library surface, one module per family. Every function
//! here is a plain host function registered through the ABI in
//! [`crate::host`]; nothing in the VM special-cases them.

pub mod audio;
pub mod col;
pub mod gfx;
pub mod io;
pub mod math;
pub mod string;
pub mod sys;
pub mod types;

use pi_asm::PanicReason;

use crate::audio::Mixer;
use crate::error::{RuntimeError, SimpleResult};
use crate::heap::ObjId;
use crate::interpreter::Interpreter;
use crate::object::Object;
use crate::screen::Screen;
use crate::value::Value;

/// The `i`th argument, nil when missing.
pub(crate) fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).copied().unwrap_or(Value::Nil)
}

/// Require at least `n` arguments.
pub(crate) fn need(args: &[Value], n: usize, name: &str) -> SimpleResult<()> {
    if args.len() < n {
        return Err(RuntimeError::msg(
            PanicReason::ArityMismatch,
            format!("{name} expects at least {n} argument(s), got {}", args.len()),
        ));
    }
    Ok(())
}

/// Numeric projection of the `i`th argument.
pub(crate) fn num<S: Screen, M: Mixer>(
    vm: &Interpreter<S, M>,
    args: &[Value],
    i: usize,
) -> SimpleResult<f64> {
    vm.heap().as_number(arg(args, i))
}

/// Integer projection of the `i`th argument.
pub(crate) fn int<S: Screen, M: Mixer>(
    vm: &Interpreter<S, M>,
    args: &[Value],
    i: usize,
) -> SimpleResult<i64> {
    Ok(num(vm, args, i)?.trunc() as i64)
}

fn wrong_type<S: Screen, M: Mixer>(
    vm: &Interpreter<S, M>,
    value: Value,
    wanted: &str,
    name: &str,
) -> RuntimeError {
    RuntimeError::msg(
        PanicReason::TypeMismatch,
        format!(
            "{name} expects a {wanted}, got {}",
            vm.heap().type_name(value)
        ),
    )
}

/// The `i`th argument as a list handle.
pub(crate) fn list_id<S: Screen, M: Mixer>(
    vm: &Interpreter<S, M>,
    args: &[Value],
    i: usize,
    name: &str,
) -> SimpleResult<ObjId> {
    let value = arg(args, i);
    value
        .as_obj()
        .filter(|id| matches!(vm.heap().get(*id), Object::List(_)))
        .ok_or_else(|| wrong_type(vm, value, "list", name))
}

/// The `i`th argument as a map handle.
pub(crate) fn map_id<S: Screen, M: Mixer>(
    vm: &Interpreter<S, M>,
    args: &[Value],
    i: usize,
    name: &str,
) -> SimpleResult<ObjId> {
    let value = arg(args, i);
    value
        .as_obj()
        .filter(|id| matches!(vm.heap().get(*id), Object::Map(_)))
        .ok_or_else(|| wrong_type(vm, value, "map", name))
}

/// The `i`th argument as owned string content (not its display form;
/// non-strings are rejected).
pub(crate) fn str_arg<S: Screen, M: Mixer>(
    vm: &Interpreter<S, M>,
    args: &[Value],
    i: usize,
    name: &str,
) -> SimpleResult<String> {
    let value = arg(args, i);
    vm.heap()
        .str_of(value)
        .map(|s| s.as_str().to_owned())
        .ok_or_else(|| wrong_type(vm, value, "string", name))
}

/// The `i`th argument as a callable value.
pub(crate) fn callable<S: Screen, M: Mixer>(
    vm: &Interpreter<S, M>,
    args: &[Value],
    i: usize,
    name: &str,
) -> SimpleResult<Value> {
    let value = arg(args, i);
    if vm.heap().function_of(value).is_none() {
        return Err(wrong_type(vm, value, "function", name));
    }
    Ok(value)
}
