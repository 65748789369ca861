//! String builtins. Strings are immutable; every transformer
//! allocates a fresh string.

use pi_asm::PanicReason;

use crate::audio::Mixer;
use crate::error::{RuntimeError, SimpleResult};
use crate::interpreter::Interpreter;
use crate::screen::Screen;
use crate::value::Value;

use super::{arg, int, need, str_arg};

/// Character from a code point.
pub fn char_of<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "char")?;
    let code = int(vm, args, 0)?;
    let ch = u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| {
            RuntimeError::msg(
                PanicReason::DomainError,
                format!("{code} is not a valid character code"),
            )
        })?;
    Ok(vm.heap_mut().alloc_str(ch.to_string()))
}

/// Code point of the first character.
pub fn ord<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "ord")?;
    let s = str_arg(vm, args, 0, "ord")?;
    let ch = s.chars().next().ok_or_else(|| {
        RuntimeError::msg(PanicReason::DomainError, "ord of an empty string")
    })?;
    Ok(Value::Num(ch as u32 as f64))
}

/// Strip leading and trailing whitespace.
pub fn trim<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "trim")?;
    let s = str_arg(vm, args, 0, "trim")?;
    let trimmed = s.trim().to_owned();
    Ok(vm.heap_mut().alloc_str(trimmed))
}

/// Uppercase copy.
pub fn upper<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "upper")?;
    let s = str_arg(vm, args, 0, "upper")?;
    let upper = s.to_uppercase();
    Ok(vm.heap_mut().alloc_str(upper))
}

/// Lowercase copy.
pub fn lower<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "lower")?;
    let s = str_arg(vm, args, 0, "lower")?;
    let lower = s.to_lowercase();
    Ok(vm.heap_mut().alloc_str(lower))
}

/// Replace every occurrence of a pattern.
pub fn replace<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 3, "replace")?;
    let s = str_arg(vm, args, 0, "replace")?;
    let from = str_arg(vm, args, 1, "replace")?;
    let to = str_arg(vm, args, 2, "replace")?;
    let replaced = s.replace(&from, &to);
    Ok(vm.heap_mut().alloc_str(replaced))
}

/// Split on a separator; with none, split on whitespace.
pub fn split<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "split")?;
    let s = str_arg(vm, args, 0, "split")?;
    let pieces: Vec<String> = if args.len() > 1 {
        let sep = str_arg(vm, args, 1, "split")?;
        s.split(&sep).map(str::to_owned).collect()
    } else {
        s.split_whitespace().map(str::to_owned).collect()
    };
    let items: Vec<Value> = pieces
        .into_iter()
        .map(|p| vm.heap_mut().alloc_str(p))
        .collect();
    Ok(vm.heap_mut().alloc_list(items))
}

/// Non-empty and all decimal digits.
pub fn is_digit<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "is_digit")?;
    let s = str_arg(vm, args, 0, "is_digit")?;
    Ok(Value::Bool(
        !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()),
    ))
}

/// Non-empty and all alphabetic.
pub fn is_alpha<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "is_alpha")?;
    let s = str_arg(vm, args, 0, "is_alpha")?;
    Ok(Value::Bool(
        !s.is_empty() && s.chars().all(char::is_alphabetic),
    ))
}

/// Whether the value reads as a number: numbers, booleans, and nil do;
/// strings do when they parse.
pub fn is_numeric<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "is_numeric")?;
    let value = arg(args, 0);
    let numeric = match value {
        Value::Num(_) | Value::Bool(_) | Value::Nil => true,
        Value::Obj(_) => match vm.heap().str_of(value) {
            Some(s) => s.as_str().trim().parse::<f64>().is_ok(),
            None => false,
        },
    };
    Ok(Value::Bool(numeric))
}
