//! Collection builtins: list and map manipulation plus the functional
//! four (`map`, `filter`, `reduce`, `find`), which re-enter the VM.

use pi_asm::PanicReason;

use crate::audio::Mixer;
use crate::error::{RuntimeError, SimpleResult};
use crate::interpreter::Interpreter;
use crate::object::{get_index, Object, PiMap};
use crate::screen::Screen;
use crate::value::Value;

use super::{arg, callable, int, list_id, map_id, need, num};

/// Length of a list, map, or string.
pub fn len<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "len")?;
    let value = arg(args, 0);
    let length = match value.as_obj().map(|id| vm.heap().get(id)) {
        Some(Object::List(l)) => l.items.len(),
        Some(Object::Map(m)) => m.table.len(),
        Some(Object::Str(s)) => s.char_len(),
        _ => {
            return Err(RuntimeError::msg(
                PanicReason::TypeMismatch,
                format!("len expects a collection, got {}", vm.heap().type_name(value)),
            ))
        }
    };
    Ok(Value::Num(length as f64))
}

/// Append values to a list; returns the list.
pub fn push<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "push")?;
    let id = list_id(vm, args, 0, "push")?;
    if let Object::List(l) = vm.heap_mut().get_mut(id) {
        l.items.extend(args[1..].iter().copied());
        l.is_numeric = false;
    }
    Ok(arg(args, 0))
}

/// Remove and return the last element.
pub fn pop<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "pop")?;
    let id = list_id(vm, args, 0, "pop")?;
    match vm.heap_mut().get_mut(id) {
        Object::List(l) => l.items.pop().ok_or_else(|| {
            RuntimeError::msg(PanicReason::IndexOutOfBounds, "pop from an empty list")
        }),
        _ => Err(PanicReason::TypeMismatch.into()),
    }
}

/// Last element without removing it.
pub fn peek<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "peek")?;
    let id = list_id(vm, args, 0, "peek")?;
    match vm.heap().get(id) {
        Object::List(l) => Ok(l.items.last().copied().unwrap_or(Value::Nil)),
        _ => Err(PanicReason::TypeMismatch.into()),
    }
}

/// Whether a collection has no elements.
pub fn empty<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    let length = len(vm, args)?;
    Ok(Value::Bool(matches!(length, Value::Num(n) if n == 0.0)))
}

/// Insert at a (wrapping) position.
pub fn insert<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 3, "insert")?;
    let id = list_id(vm, args, 0, "insert")?;
    let index = int(vm, args, 1)?;
    let value = arg(args, 2);
    if let Object::List(l) = vm.heap_mut().get_mut(id) {
        let at = if l.items.is_empty() {
            0
        } else {
            get_index(index, l.items.len() + 1)
        };
        l.items.insert(at, value);
        l.is_numeric = false;
    }
    Ok(arg(args, 0))
}

/// Remove by position (lists) or key (maps); returns the removed value.
pub fn remove<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "remove")?;
    let target = arg(args, 0);
    if let Ok(id) = list_id(vm, args, 0, "remove") {
        let index = int(vm, args, 1)?;
        return match vm.heap_mut().get_mut(id) {
            Object::List(l) if !l.items.is_empty() => {
                let at = get_index(index, l.items.len());
                Ok(l.items.remove(at))
            }
            _ => Err(RuntimeError::msg(
                PanicReason::IndexOutOfBounds,
                "remove from an empty list",
            )),
        };
    }
    if let Ok(id) = map_id(vm, args, 0, "remove") {
        let key = vm.heap().display(arg(args, 1));
        return match vm.heap_mut().get_mut(id) {
            Object::Map(m) => Ok(m.table.remove(&key).unwrap_or(Value::Nil)),
            _ => Err(PanicReason::TypeMismatch.into()),
        };
    }
    Err(RuntimeError::msg(
        PanicReason::TypeMismatch,
        format!(
            "remove expects a list or map, got {}",
            vm.heap().type_name(target)
        ),
    ))
}

/// Prepend a value; returns the list.
pub fn unshift<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "unshift")?;
    let id = list_id(vm, args, 0, "unshift")?;
    let value = arg(args, 1);
    if let Object::List(l) = vm.heap_mut().get_mut(id) {
        l.items.insert(0, value);
        l.is_numeric = false;
    }
    Ok(arg(args, 0))
}

/// Append every element of the second list to the first.
pub fn append<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "append")?;
    let dst = list_id(vm, args, 0, "append")?;
    let src = list_id(vm, args, 1, "append")?;
    let extra = match vm.heap().get(src) {
        Object::List(l) => l.items.clone(),
        _ => Vec::new(),
    };
    if let Object::List(l) = vm.heap_mut().get_mut(dst) {
        l.items.extend(extra);
        l.is_numeric = false;
    }
    Ok(arg(args, 0))
}

/// Deep-equality membership test.
pub fn contains<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "contains")?;
    let id = list_id(vm, args, 0, "contains")?;
    let needle = arg(args, 1);
    let found = match vm.heap().get(id) {
        Object::List(l) => l
            .items
            .iter()
            .any(|item| vm.heap().deep_equals(needle, *item)),
        _ => false,
    };
    Ok(Value::Bool(found))
}

/// First index holding a deep-equal value, or -1.
pub fn index_of<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "index_of")?;
    let id = list_id(vm, args, 0, "index_of")?;
    let needle = arg(args, 1);
    let found = match vm.heap().get(id) {
        Object::List(l) => l
            .items
            .iter()
            .position(|item| vm.heap().deep_equals(needle, *item)),
        _ => None,
    };
    Ok(Value::Num(found.map(|i| i as f64).unwrap_or(-1.0)))
}

/// Reverse in place; returns the list.
pub fn reverse<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "reverse")?;
    let id = list_id(vm, args, 0, "reverse")?;
    if let Object::List(l) = vm.heap_mut().get_mut(id) {
        l.items.reverse();
    }
    Ok(arg(args, 0))
}

/// Sort in place by the value ordering; returns the list. Mixed
/// incomparable elements fault.
pub fn sort<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "sort")?;
    let id = list_id(vm, args, 0, "sort")?;
    let mut items = match vm.heap().get(id) {
        Object::List(l) => l.items.clone(),
        _ => Vec::new(),
    };

    let mut failed = false;
    items.sort_by(|a, b| match vm.heap().compare(*a, *b) {
        Some(ordering) => ordering,
        None => {
            failed = true;
            std::cmp::Ordering::Equal
        }
    });
    if failed {
        return Err(RuntimeError::msg(
            PanicReason::Incomparable,
            "sort needs mutually comparable elements",
        ));
    }

    if let Object::List(l) = vm.heap_mut().get_mut(id) {
        l.items = items;
    }
    Ok(arg(args, 0))
}

/// Deep copy of any value.
pub fn copy<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "copy")?;
    let value = arg(args, 0);
    Ok(vm.heap_mut().deep_copy(value))
}

/// `slice(seq, start, end, step = 1)` as a function.
pub fn slice<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 3, "slice")?;
    let seq = arg(args, 0);
    let start = num(vm, args, 1)?;
    let end = num(vm, args, 2)?;
    let step = if args.len() > 3 { num(vm, args, 3)? } else { 1.0 };
    vm.get_slice(seq, start, end, step)
}

/// `range(end)` or `range(start, end, step = ±1)`; end-exclusive.
pub fn range<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "range")?;
    let (start, end) = if args.len() == 1 {
        (0.0, num(vm, args, 0)?)
    } else {
        (num(vm, args, 0)?, num(vm, args, 1)?)
    };
    let step = if args.len() > 2 {
        num(vm, args, 2)?
    } else if end >= start {
        1.0
    } else {
        -1.0
    };
    vm.heap_mut().alloc_range(start, end, step, false)
}

/// Keys of a map as a list of strings, in insertion order.
pub fn keys<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "keys")?;
    let id = map_id(vm, args, 0, "keys")?;
    let names: Vec<String> = match vm.heap().get(id) {
        Object::Map(m) => m.table.keys().map(str::to_owned).collect(),
        _ => Vec::new(),
    };
    let items: Vec<Value> = names
        .into_iter()
        .map(|k| vm.heap_mut().alloc_str(k))
        .collect();
    Ok(vm.heap_mut().alloc_list(items))
}

/// Values of a map as a list, in insertion order.
pub fn values<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "values")?;
    let id = map_id(vm, args, 0, "values")?;
    let items: Vec<Value> = match vm.heap().get(id) {
        Object::Map(m) => m.table.values().collect(),
        _ => Vec::new(),
    };
    Ok(vm.heap_mut().alloc_list(items))
}

/// A fresh instance delegating to the argument through its prototype
/// link.
pub fn clone<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 1, "clone")?;
    let proto = map_id(vm, args, 0, "clone")?;
    let id = vm.heap_mut().alloc(Object::Map(PiMap {
        proto: Some(proto),
        is_instance: true,
        ..PiMap::default()
    }));
    Ok(Value::Obj(id))
}

/// Apply a function to every element, collecting the results.
pub fn map<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "map")?;
    let f = callable(vm, args, 0, "map")?;
    let id = list_id(vm, args, 1, "map")?;
    let items = match vm.heap().get(id) {
        Object::List(l) => l.items.clone(),
        _ => Vec::new(),
    };

    // The callee and source ride the root set across re-entry.
    vm.push_root(f);
    vm.push_root(arg(args, 1));
    let out = vm.heap_mut().alloc_list(Vec::new());
    vm.push_root(out);

    let result = (|| {
        for item in items {
            let mapped = vm.call_value(f, &[item])?;
            if let Some(out_id) = out.as_obj() {
                if let Object::List(l) = vm.heap_mut().get_mut(out_id) {
                    l.items.push(mapped);
                }
            }
        }
        Ok(out)
    })();
    vm.pop_roots(3);
    result
}

/// Keep the elements the predicate accepts.
pub fn filter<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "filter")?;
    let f = callable(vm, args, 0, "filter")?;
    let id = list_id(vm, args, 1, "filter")?;
    let items = match vm.heap().get(id) {
        Object::List(l) => l.items.clone(),
        _ => Vec::new(),
    };

    vm.push_root(f);
    vm.push_root(arg(args, 1));
    let out = vm.heap_mut().alloc_list(Vec::new());
    vm.push_root(out);

    let result = (|| {
        for item in items {
            let keep = vm.call_value(f, &[item])?;
            if vm.heap().truthy(keep) {
                if let Some(out_id) = out.as_obj() {
                    if let Object::List(l) = vm.heap_mut().get_mut(out_id) {
                        l.items.push(item);
                    }
                }
            }
        }
        Ok(out)
    })();
    vm.pop_roots(3);
    result
}

/// Fold the list left to right. With no initial value the first
/// element seeds the accumulator.
pub fn reduce<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "reduce")?;
    let f = callable(vm, args, 0, "reduce")?;
    let id = list_id(vm, args, 1, "reduce")?;
    let items = match vm.heap().get(id) {
        Object::List(l) => l.items.clone(),
        _ => Vec::new(),
    };

    let mut iter = items.into_iter();
    let mut acc = if args.len() > 2 {
        arg(args, 2)
    } else {
        match iter.next() {
            Some(first) => first,
            None => return Ok(Value::Nil),
        }
    };

    vm.push_root(f);
    vm.push_root(arg(args, 1));
    let result = (|| {
        for item in iter {
            // The accumulator is re-rooted around each re-entry.
            vm.push_root(acc);
            let next = vm.call_value(f, &[acc, item]);
            vm.pop_roots(1);
            acc = next?;
        }
        Ok(acc)
    })();
    vm.pop_roots(2);
    result
}

/// First element the predicate accepts, or nil.
pub fn find<S: Screen, M: Mixer>(
    vm: &mut Interpreter<S, M>,
    args: &[Value],
) -> SimpleResult<Value> {
    need(args, 2, "find")?;
    let f = callable(vm, args, 0, "find")?;
    let id = list_id(vm, args, 1, "find")?;
    let items = match vm.heap().get(id) {
        Object::List(l) => l.items.clone(),
        _ => Vec::new(),
    };

    vm.push_root(f);
    vm.push_root(arg(args, 1));
    let result = (|| {
        for item in items {
            let hit = vm.call_value(f, &[item])?;
            if vm.heap().truthy(hit) {
                return Ok(item);
            }
        }
        Ok(Value::Nil)
    })();
    vm.pop_roots(2);
    result
}
