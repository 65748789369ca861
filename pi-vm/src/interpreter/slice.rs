//! Indexing, member access with prototype delegation, and slicing.

use pi_asm::PanicReason;

use crate::audio::Mixer;
use crate::error::{RuntimeError, SimpleResult};
use crate::object::{get_index, Object};
use crate::screen::Screen;
use crate::value::Value;

use super::Interpreter;

impl<S: Screen, M: Mixer> Interpreter<S, M> {
    /// `GET_ITEM`: list/string indices wrap through [`get_index`]; map
    /// misses walk the prototype chain and finally yield nil.
    pub(crate) fn get_item(&mut self, target: Value, key: Value) -> SimpleResult<Value> {
        let id = target.as_obj().ok_or_else(|| self.not_indexable(target))?;
        match self.heap.get(id) {
            Object::List(l) => {
                if l.items.is_empty() {
                    return Err(RuntimeError::msg(
                        PanicReason::IndexOutOfBounds,
                        "cannot index an empty list",
                    ));
                }
                let len = l.items.len();
                let index = self.heap.as_number(key)? as i64;
                Ok(l.items[get_index(index, len)])
            }
            Object::Str(s) => {
                let chars: Vec<char> = s.as_str().chars().collect();
                if chars.is_empty() {
                    return Err(RuntimeError::msg(
                        PanicReason::IndexOutOfBounds,
                        "cannot index an empty string",
                    ));
                }
                let index = self.heap.as_number(key)? as i64;
                let ch = chars[get_index(index, chars.len())];
                Ok(self.heap.alloc_str(ch.to_string()))
            }
            Object::Map(_) => {
                let name = self.heap.display(key);
                // Walk the prototype chain on miss; a full miss is nil,
                // not a fault.
                let mut cursor = Some(id);
                while let Some(map_id) = cursor {
                    match self.heap.get(map_id) {
                        Object::Map(m) => {
                            if let Some(value) = m.table.get(&name) {
                                return Ok(value);
                            }
                            cursor = m.proto;
                        }
                        _ => break,
                    }
                }
                Ok(Value::Nil)
            }
            _ => Err(self.not_indexable(target)),
        }
    }

    /// `SET_ITEM`: stores into a list slot or a map entry. Strings are
    /// immutable.
    pub(crate) fn set_item(
        &mut self,
        target: Value,
        key: Value,
        value: Value,
    ) -> SimpleResult<()> {
        let id = target.as_obj().ok_or_else(|| self.not_indexable(target))?;
        match self.heap.get(id) {
            Object::List(l) => {
                if l.items.is_empty() {
                    return Err(RuntimeError::msg(
                        PanicReason::IndexOutOfBounds,
                        "cannot index an empty list",
                    ));
                }
                let len = l.items.len();
                let index = get_index(self.heap.as_number(key)? as i64, len);
                if let Object::List(l) = self.heap.get_mut(id) {
                    l.items[index] = value;
                }
                Ok(())
            }
            Object::Map(_) => {
                let name = self.heap.display(key);
                if let Object::Map(m) = self.heap.get_mut(id) {
                    m.table.insert(name, value);
                }
                Ok(())
            }
            Object::Str(_) => Err(RuntimeError::msg(
                PanicReason::TypeMismatch,
                "strings are immutable",
            )),
            _ => Err(self.not_indexable(target)),
        }
    }

    fn not_indexable(&self, target: Value) -> RuntimeError {
        RuntimeError::msg(
            PanicReason::NotIndexable,
            format!("cannot index a {}", self.heap.type_name(target)),
        )
    }

    /// `PUSH_SLICE`: build a fresh list or string from `[start : end :
    /// step]`. Negative bounds count from the back; ±∞ means
    /// open-ended; step 0 faults.
    pub(crate) fn get_slice(
        &mut self,
        seq: Value,
        start: f64,
        end: f64,
        step: f64,
    ) -> SimpleResult<Value> {
        if step == 0.0 {
            return Err(RuntimeError::msg(
                PanicReason::ZeroStep,
                "slice step cannot be zero",
            ));
        }
        let id = seq.as_obj().ok_or_else(|| self.not_indexable(seq))?;
        let step = step.trunc() as i64;

        match self.heap.get(id) {
            Object::List(l) => {
                let items = l.items.clone();
                let (mut at, stop) = resolve_bounds(start, end, step, items.len());
                let mut out = Vec::new();
                while step.signum() * (stop - at) > 0 {
                    if (0..items.len() as i64).contains(&at) {
                        out.push(items[at as usize]);
                    }
                    at += step;
                }
                Ok(self.heap.alloc_list(out))
            }
            Object::Str(s) => {
                let chars: Vec<char> = s.as_str().chars().collect();
                let (mut at, stop) = resolve_bounds(start, end, step, chars.len());
                let mut out = String::new();
                while step.signum() * (stop - at) > 0 {
                    if (0..chars.len() as i64).contains(&at) {
                        out.push(chars[at as usize]);
                    }
                    at += step;
                }
                Ok(self.heap.alloc_str(out))
            }
            _ => Err(self.not_indexable(seq)),
        }
    }
}

/// Resolve slice bounds against a length: negative values wrap via
/// [`get_index`], ±∞ opens the relevant end, and in-range positives
/// clamp to the length so `seq[0:len]` really means the whole
/// sequence.
fn resolve_bounds(start: f64, end: f64, step: i64, len: usize) -> (i64, i64) {
    let len_i = len as i64;
    let open = |positive: bool| if positive { len_i } else { -1 };

    let resolve = |bound: f64| -> i64 {
        if bound.is_infinite() {
            open(step > 0)
        } else {
            let bound = bound.trunc() as i64;
            if bound < 0 {
                get_index(bound, len) as i64
            } else if step > 0 {
                bound.min(len_i)
            } else {
                bound.min(len_i - 1)
            }
        }
    };

    (resolve(start), resolve(end))
}

#[cfg(test)]
mod tests {
    use super::resolve_bounds;

    #[test]
    fn full_slice_covers_everything() {
        assert_eq!(resolve_bounds(0.0, 5.0, 1, 5), (0, 5));
        assert_eq!(resolve_bounds(0.0, f64::INFINITY, 1, 5), (0, 5));
    }

    #[test]
    fn negative_bounds_wrap() {
        assert_eq!(resolve_bounds(-2.0, 5.0, 1, 5), (3, 5));
        assert_eq!(resolve_bounds(0.0, -1.0, 1, 5), (0, 4));
    }

    #[test]
    fn reverse_slices_clamp() {
        // start beyond the end clamps to the last element.
        assert_eq!(resolve_bounds(9.0, f64::INFINITY, -1, 5), (4, -1));
    }
}
