//! The dynamic value type and its heap-aware projections.

use std::cmp::Ordering;

use itertools::Itertools;
use pi_asm::PanicReason;

use crate::consts::NUM_EPSILON;
use crate::error::{RuntimeError, SimpleResult};
use crate::heap::{Heap, ObjId};
use crate::object::{Object, PiMap};

/// A script value: a number, boolean, nil, or heap handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// 64-bit float; the only numeric type.
    Num(f64),
    /// Boolean.
    Bool(bool),
    /// The absent value.
    Nil,
    /// Handle to a heap object.
    Obj(ObjId),
}

impl Value {
    /// Whether the value is nil.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// The number inside, when the value is one.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// The handle inside, when the value is an object.
    pub fn as_obj(&self) -> Option<ObjId> {
        match self {
            Value::Obj(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Printed form of a number: `%g`-flavored, with the console's
/// spellings for the specials.
pub fn format_num(n: f64) -> String {
    if n.is_nan() {
        "NAN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "INF".into() } else { "-INF".into() }
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl Heap {
    /// Script-visible type name of a value.
    pub fn type_name(&self, value: Value) -> &'static str {
        match value {
            Value::Num(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Nil => "nil",
            Value::Obj(id) => self.get(id).type_name(),
        }
    }

    /// Truthiness: nonzero numbers, `true`, non-empty collections, and
    /// every other live object are truthy.
    pub fn truthy(&self, value: Value) -> bool {
        match value {
            Value::Num(n) => n != 0.0,
            Value::Bool(b) => b,
            Value::Nil => false,
            Value::Obj(id) => match self.get(id) {
                Object::Str(s) => !s.as_str().is_empty(),
                Object::List(l) => !l.items.is_empty(),
                Object::Map(m) => !m.table.is_empty(),
                Object::Range(r) => r.start != r.end,
                _ => true,
            },
        }
    }

    /// Numeric projection: booleans map to 0/1, nil to 0, strings
    /// parse or fault; everything else is a type mismatch.
    pub fn as_number(&self, value: Value) -> SimpleResult<f64> {
        match value {
            Value::Num(n) => Ok(n),
            Value::Bool(b) => Ok(if b { 1.0 } else { 0.0 }),
            Value::Nil => Ok(0.0),
            Value::Obj(id) => match self.get(id) {
                Object::Str(s) => s.as_str().trim().parse::<f64>().map_err(|_| {
                    RuntimeError::msg(
                        PanicReason::InvalidNumber,
                        format!("string '{}' cannot be converted to a number", s.as_str()),
                    )
                }),
                other => Err(RuntimeError::msg(
                    PanicReason::TypeMismatch,
                    format!("cannot convert {} to a number", other.type_name()),
                )),
            },
        }
    }

    /// Canonical printed representation; also the map key form.
    pub fn display(&self, value: Value) -> String {
        match value {
            Value::Num(n) => format_num(n),
            Value::Bool(b) => if b { "true" } else { "false" }.into(),
            Value::Nil => "nil".into(),
            Value::Obj(id) => match self.get(id) {
                Object::Str(s) => s.as_str().into(),
                Object::List(l) => {
                    format!("[{}]", l.items.iter().map(|v| self.display(*v)).join(", "))
                }
                Object::Map(m) => {
                    if m.table.is_empty() {
                        return "{}".into();
                    }
                    let pairs = m
                        .table
                        .iter()
                        .map(|(k, v)| format!("{k}: {}", self.display(v)))
                        .join(", ");
                    format!("{{{pairs}}}")
                }
                Object::Range(r) => format!(
                    "{}{}{}",
                    format_num(r.start),
                    if r.inclusive { "..=" } else { ".." },
                    format_num(r.end)
                ),
                Object::Function(f) => format!("<{}: {:#x}>", f.name, id.index()),
                Object::Code(c) => format!("<code: {:#06x}>", c.hash),
                Object::File(f) => format!("<file {}>", f.path),
                Object::Image(i) => format!("<image {}x{}>", i.width, i.height),
                Object::Sprite(s) => format!("<sprite {}x{}>", s.width, s.height),
                Object::Model(m) => format!("<model {} tris>", m.triangles.len()),
                Object::Sound(_) => "<sound>".into(),
            },
        }
    }

    /// Deep equality: numeric tolerance, recursive over strings and
    /// lists, identity for every other object kind.
    pub fn deep_equals(&self, left: Value, right: Value) -> bool {
        match (left, right) {
            (Value::Num(a), Value::Num(b)) => (a - b).abs() < NUM_EPSILON,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Obj(a), Value::Obj(b)) => match (self.get(a), self.get(b)) {
                (Object::Str(x), Object::Str(y)) => x.as_str() == y.as_str(),
                (Object::List(x), Object::List(y)) => {
                    x.items.len() == y.items.len()
                        && x.items
                            .iter()
                            .zip(&y.items)
                            .all(|(l, r)| self.deep_equals(*l, *r))
                }
                _ => a == b,
            },
            _ => false,
        }
    }

    /// Identity: same heap slot, or equal primitive.
    pub fn identical(&self, left: Value, right: Value) -> bool {
        match (left, right) {
            (Value::Obj(a), Value::Obj(b)) => a == b,
            _ => self.deep_equals(left, right),
        }
    }

    /// Total ordering where defined: numbers (coercing booleans and
    /// nil), strings lexicographically, lists element-wise with length
    /// as tiebreak. Mixed or unsupported kinds yield `None`.
    pub fn compare(&self, left: Value, right: Value) -> Option<Ordering> {
        let numeric = |v: Value| match v {
            Value::Num(n) => Some(n),
            Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            Value::Nil => Some(0.0),
            Value::Obj(_) => None,
        };

        if let (Some(a), Some(b)) = (numeric(left), numeric(right)) {
            return if (a - b).abs() < NUM_EPSILON {
                Some(Ordering::Equal)
            } else {
                a.partial_cmp(&b)
            };
        }

        match (left, right) {
            (Value::Obj(a), Value::Obj(b)) => match (self.get(a), self.get(b)) {
                (Object::Str(x), Object::Str(y)) => Some(x.as_str().cmp(y.as_str())),
                (Object::List(x), Object::List(y)) => {
                    for (l, r) in x.items.iter().zip(&y.items) {
                        match self.compare(*l, *r)? {
                            Ordering::Equal => continue,
                            other => return Some(other),
                        }
                    }
                    Some(x.items.len().cmp(&y.items.len()))
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Deep copy: fresh strings and recursively fresh lists and maps;
    /// other object kinds share the handle.
    pub fn deep_copy(&mut self, value: Value) -> Value {
        match value {
            Value::Num(_) | Value::Bool(_) | Value::Nil => value,
            Value::Obj(id) => match self.get(id) {
                Object::Str(s) => {
                    let chars = s.as_str().to_owned();
                    self.alloc_str(chars)
                }
                Object::List(l) => {
                    let items = l.items.clone();
                    let copied: Vec<Value> =
                        items.into_iter().map(|v| self.deep_copy(v)).collect();
                    self.alloc_list(copied)
                }
                Object::Map(m) => {
                    let entries: Vec<(String, Value)> = m
                        .table
                        .iter()
                        .map(|(k, v)| (k.to_owned(), v))
                        .collect();
                    let proto = m.proto;
                    let mut table = crate::table::Table::new();
                    for (k, v) in entries {
                        let copied = self.deep_copy(v);
                        table.put(k, copied);
                    }
                    Value::Obj(self.alloc(Object::Map(PiMap {
                        table,
                        proto,
                        ..PiMap::default()
                    })))
                }
                _ => value,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_equality_uses_tolerance() {
        let heap = Heap::new();
        assert!(heap.deep_equals(Value::Num(0.1 + 0.2), Value::Num(0.3)));
        assert!(!heap.deep_equals(Value::Num(0.1), Value::Num(0.2)));
    }

    #[test]
    fn strings_compare_deeply() {
        let mut heap = Heap::new();
        let a = heap.alloc_str("hello");
        let b = heap.alloc_str("hello");
        let c = heap.alloc_str("world");
        assert!(heap.deep_equals(a, b));
        assert!(!heap.deep_equals(a, c));
        // Distinct allocations are not identical.
        assert!(!heap.identical(a, b));
        assert_eq!(heap.compare(a, c), Some(Ordering::Less));
    }

    #[test]
    fn lists_order_elementwise_with_length_tiebreak() {
        let mut heap = Heap::new();
        let short = heap.alloc_list(vec![Value::Num(1.0), Value::Num(2.0)]);
        let long = heap.alloc_list(vec![Value::Num(1.0), Value::Num(2.0), Value::Num(0.0)]);
        assert_eq!(heap.compare(short, long), Some(Ordering::Less));

        let bigger = heap.alloc_list(vec![Value::Num(1.0), Value::Num(9.0)]);
        assert_eq!(heap.compare(bigger, long), Some(Ordering::Greater));
    }

    #[test]
    fn mixed_types_are_incomparable() {
        let mut heap = Heap::new();
        let s = heap.alloc_str("1");
        assert_eq!(heap.compare(Value::Num(1.0), s), None);
        assert_eq!(
            heap.compare(Value::Bool(false), Value::Bool(true)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn display_forms() {
        let mut heap = Heap::new();
        let s = heap.alloc_str("hi");
        let list = heap.alloc_list(vec![Value::Num(1.0), s, Value::Nil]);
        assert_eq!(heap.display(list), "[1, hi, nil]");
        assert_eq!(heap.display(Value::Num(15.0)), "15");
        assert_eq!(heap.display(Value::Num(f64::INFINITY)), "INF");
        assert_eq!(heap.display(Value::Num(f64::NAN)), "NAN");
    }

    #[test]
    fn as_number_projections() {
        let mut heap = Heap::new();
        assert_eq!(heap.as_number(Value::Bool(true)).unwrap(), 1.0);
        assert_eq!(heap.as_number(Value::Nil).unwrap(), 0.0);
        let s = heap.alloc_str("42.5");
        assert_eq!(heap.as_number(s).unwrap(), 42.5);
        let bad = heap.alloc_str("nope");
        assert!(heap.as_number(bad).is_err());
    }

    #[test]
    fn deep_copy_detaches_lists() {
        let mut heap = Heap::new();
        let inner = heap.alloc_list(vec![Value::Num(1.0)]);
        let outer = heap.alloc_list(vec![inner]);
        let copy = heap.deep_copy(outer);

        let copy_inner = heap.list_of(copy).unwrap().items[0];
        assert_ne!(copy_inner.as_obj(), inner.as_obj());
        assert!(heap.deep_equals(copy, outer));
    }
}
