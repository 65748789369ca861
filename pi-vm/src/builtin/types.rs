//! Type predicates and conversions.

use crate::audio::Mixer;
use crate::error::SimpleResult;
use crate::interpreter::Interpreter;
use crate::object::Object;
use crate::screen::Screen;
use crate::value::Value;

use super::{arg, need};

/// `type(v)`: the type name as a string.
pub fn type_of<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "type")?;
    let name = vm.heap().type_name(arg(args, 0));
    Ok(vm.heap_mut().alloc_str(name))
}

macro_rules! predicate {
    ($($(#[$doc:meta])* $name:ident => $test:expr),+ $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name<S: Screen, M: Mixer>(
                vm: &mut Interpreter<S, M>,
                args: &[Value],
            ) -> SimpleResult<Value> {
                need(args, 1, stringify!($name))?;
                let value = arg(args, 0);
                let test: fn(&Interpreter<S, M>, Value) -> bool = $test;
                Ok(Value::Bool(test(vm, value)))
            }
        )+
    };
}

predicate! {
    /// `is_num(v)`.
    is_num => |_, v| matches!(v, Value::Num(_)),
    /// `is_bool(v)`.
    is_bool => |_, v| matches!(v, Value::Bool(_)),
    /// `is_str(v)`.
    is_str => |vm, v| vm.heap().str_of(v).is_some(),
    /// `is_list(v)`.
    is_list => |vm, v| vm.heap().list_of(v).is_some(),
    /// `is_map(v)`.
    is_map => |vm, v| vm.heap().map_of(v).is_some(),
    /// `is_fun(v)`.
    is_fun => |vm, v| vm.heap().function_of(v).is_some(),
    /// `is_nil(v)`.
    is_nil => |_, v| v.is_nil(),
    /// `is_range(v)`.
    is_range => |vm, v| {
        v.as_obj()
            .map_or(false, |id| matches!(vm.heap().get(id), Object::Range(_)))
    },
}

/// `as_num(v)`: numeric projection; faults when it does not exist.
pub fn as_num<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "as_num")?;
    Ok(Value::Num(vm.heap().as_number(arg(args, 0))?))
}

/// `as_str(v)`: canonical printed form.
pub fn as_str<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "as_str")?;
    let text = vm.heap().display(arg(args, 0));
    Ok(vm.heap_mut().alloc_str(text))
}

/// `as_bool(v)`: truthiness.
pub fn as_bool<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "as_bool")?;
    Ok(Value::Bool(vm.heap().truthy(arg(args, 0))))
}
