//! Evaluation of the `BINARY`, `COMPARE`, and `UNARY` instruction
//! families.

use std::cmp::Ordering;

use pi_asm::{BinaryOp, CompareOp, PanicReason, UnaryOp};

use crate::audio::Mixer;
use crate::error::{RuntimeError, SimpleResult};
use crate::object::Object;
use crate::screen::Screen;
use crate::value::Value;

use super::Interpreter;

impl<S: Screen, M: Mixer> Interpreter<S, M> {
    pub(crate) fn binary(&mut self, op: BinaryOp) -> SimpleResult<()> {
        let right = self.pop()?;
        let left = self.pop()?;

        let result = match op {
            BinaryOp::Add => self.eval_add(left, right)?,
            BinaryOp::Sub => self.arith(left, right, |a, b| a - b)?,
            BinaryOp::Mul => self.arith(left, right, |a, b| a * b)?,
            // IEEE division: x/0 is ±∞, 0/0 is NaN.
            BinaryOp::Div => self.arith(left, right, |a, b| a / b)?,
            BinaryOp::Mod => self.arith(left, right, |a, b| a % b)?,
            BinaryOp::Pow => self.arith(left, right, f64::powf)?,
            BinaryOp::And => {
                Value::Bool(self.heap.truthy(left) && self.heap.truthy(right))
            }
            BinaryOp::Or => {
                Value::Bool(self.heap.truthy(left) || self.heap.truthy(right))
            }
            BinaryOp::BitAnd => self.bitwise(left, right, |a, b| a & b)?,
            BinaryOp::BitOr => self.bitwise(left, right, |a, b| a | b)?,
            BinaryOp::BitXor => self.bitwise(left, right, |a, b| a ^ b)?,
            BinaryOp::Shl => self.bitwise(left, right, |a, b| a << (b & 63))?,
            BinaryOp::Shr => self.bitwise(left, right, |a, b| a >> (b & 63))?,
            BinaryOp::UShr => {
                // Logical shift over the unsigned bit pattern.
                let a = self.heap.as_number(left)? as i64 as u64;
                let b = self.heap.as_number(right)? as i64 as u64;
                Value::Num((a >> (b & 63)) as f64)
            }
            BinaryOp::Dot => self.eval_dot(left, right)?,
            BinaryOp::Is => Value::Bool(self.heap.identical(left, right)),
        };
        self.push(result)
    }

    fn arith(
        &mut self,
        left: Value,
        right: Value,
        f: impl FnOnce(f64, f64) -> f64,
    ) -> SimpleResult<Value> {
        let a = self.heap.as_number(left)?;
        let b = self.heap.as_number(right)?;
        Ok(Value::Num(f(a, b)))
    }

    fn bitwise(
        &mut self,
        left: Value,
        right: Value,
        f: impl FnOnce(i64, i64) -> i64,
    ) -> SimpleResult<Value> {
        let a = self.heap.as_number(left)? as i64;
        let b = self.heap.as_number(right)? as i64;
        Ok(Value::Num(f(a, b) as f64))
    }

    /// `+` adds numbers, concatenates when either side is a string,
    /// and appends lists.
    fn eval_add(&mut self, left: Value, right: Value) -> SimpleResult<Value> {
        if let (Value::Num(a), Value::Num(b)) = (left, right) {
            return Ok(Value::Num(a + b));
        }

        let left_str = self.heap.str_of(left).is_some();
        let right_str = self.heap.str_of(right).is_some();
        if left_str || right_str {
            let mut text = self.heap.display(left);
            text.push_str(&self.heap.display(right));
            return Ok(self.heap.alloc_str(text));
        }

        if let (Some(a), Some(b)) = (self.heap.list_of(left), self.heap.list_of(right)) {
            let mut items = a.items.clone();
            items.extend(b.items.iter().copied());
            return Ok(self.heap.alloc_list(items));
        }

        self.arith(left, right, |a, b| a + b)
    }

    /// `@`: scalar product of two equal-length numeric lists, matrix
    /// product when both operands carry matrix shape.
    fn eval_dot(&mut self, left: Value, right: Value) -> SimpleResult<Value> {
        let (a, a_shape) = match self.heap.list_of(left) {
            Some(l) => (
                l.numeric_items().ok_or_else(|| self.dot_error(left, right))?,
                l.is_matrix.then_some((l.rows, l.cols)),
            ),
            None => return Err(self.dot_error(left, right)),
        };
        let (b, b_shape) = match self.heap.list_of(right) {
            Some(l) => (
                l.numeric_items().ok_or_else(|| self.dot_error(left, right))?,
                l.is_matrix.then_some((l.rows, l.cols)),
            ),
            None => return Err(self.dot_error(left, right)),
        };

        if let (Some((ar, ac)), Some((br, bc))) = (a_shape, b_shape) {
            if ac != br || a.len() != ar * ac || b.len() != br * bc {
                return Err(RuntimeError::msg(
                    PanicReason::TypeMismatch,
                    format!("matrix shapes {ar}x{ac} and {br}x{bc} do not multiply"),
                ));
            }
            let mut out = vec![0.0; ar * bc];
            for i in 0..ar {
                for j in 0..bc {
                    let mut acc = 0.0;
                    for k in 0..ac {
                        acc += a[i * ac + k] * b[k * bc + j];
                    }
                    out[i * bc + j] = acc;
                }
            }
            let cells: Vec<Value> = out.into_iter().map(Value::Num).collect();
            let value = self.heap.alloc_list(cells);
            if let Some(id) = value.as_obj() {
                if let Object::List(l) = self.heap.get_mut(id) {
                    l.is_numeric = true;
                    l.is_matrix = true;
                    l.rows = ar;
                    l.cols = bc;
                }
            }
            return Ok(value);
        }

        if a.len() != b.len() {
            return Err(RuntimeError::msg(
                PanicReason::TypeMismatch,
                format!(
                    "dot product needs equal lengths, got {} and {}",
                    a.len(),
                    b.len()
                ),
            ));
        }
        Ok(Value::Num(
            a.iter().zip(&b).map(|(x, y)| x * y).sum(),
        ))
    }

    fn dot_error(&self, left: Value, right: Value) -> RuntimeError {
        RuntimeError::msg(
            PanicReason::TypeMismatch,
            format!(
                "dot product needs numeric lists, got {} and {}",
                self.heap.type_name(left),
                self.heap.type_name(right)
            ),
        )
    }

    pub(crate) fn compare(&mut self, op: CompareOp) -> SimpleResult<()> {
        let right = self.pop()?;
        let left = self.pop()?;

        let result = match op {
            CompareOp::Eq => self.heap.deep_equals(left, right),
            CompareOp::Ne => !self.heap.deep_equals(left, right),
            CompareOp::In => self.eval_in(left, right)?,
            ordered => {
                let ordering = self.heap.compare(left, right).ok_or_else(|| {
                    RuntimeError::msg(
                        PanicReason::Incomparable,
                        format!(
                            "cannot compare {} with {}",
                            self.heap.type_name(left),
                            self.heap.type_name(right)
                        ),
                    )
                })?;
                match ordered {
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Ge => ordering != Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                    _ => unreachable!("equality handled above"),
                }
            }
        };
        self.push(Value::Bool(result))
    }

    /// `x in c`: list element, substring, map key, or range bounds.
    fn eval_in(&mut self, needle: Value, container: Value) -> SimpleResult<bool> {
        let id = match container.as_obj() {
            Some(id) => id,
            None => {
                return Err(RuntimeError::msg(
                    PanicReason::TypeMismatch,
                    format!(
                        "'in' needs a collection, got {}",
                        self.heap.type_name(container)
                    ),
                ))
            }
        };
        Ok(match self.heap.get(id) {
            Object::List(l) => l
                .items
                .iter()
                .any(|item| self.heap.deep_equals(needle, *item)),
            Object::Str(s) => match self.heap.str_of(needle) {
                Some(sub) => s.as_str().contains(sub.as_str()),
                None => false,
            },
            Object::Map(m) => {
                let key = self.heap.display(needle);
                m.table.has(&key)
            }
            Object::Range(r) => {
                let (r, value) = (*r, self.heap.as_number(needle)?);
                let (lo, hi) = if r.step > 0.0 {
                    (r.start, r.end)
                } else {
                    (r.end, r.start)
                };
                if r.inclusive {
                    value >= lo && value <= hi
                } else if r.step > 0.0 {
                    value >= lo && value < hi
                } else {
                    value > lo && value <= hi
                }
            }
            _ => false,
        })
    }

    pub(crate) fn unary(&mut self, op: UnaryOp) -> SimpleResult<()> {
        let value = self.pop()?;
        let result = match op {
            UnaryOp::Plus => Value::Num(self.heap.as_number(value)?),
            UnaryOp::Neg => Value::Num(-self.heap.as_number(value)?),
            UnaryOp::Not => Value::Bool(!self.heap.truthy(value)),
            UnaryOp::BitNot => Value::Num(!(self.heap.as_number(value)? as i64) as f64),
            UnaryOp::Len => {
                let length = match value.as_obj().map(|id| self.heap.get(id)) {
                    Some(Object::Str(s)) => s.char_len(),
                    Some(Object::List(l)) => l.items.len(),
                    Some(Object::Map(m)) => m.table.len(),
                    _ => {
                        return Err(RuntimeError::msg(
                            PanicReason::TypeMismatch,
                            format!(
                                "'#' needs a collection, got {}",
                                self.heap.type_name(value)
                            ),
                        ))
                    }
                };
                Value::Num(length as f64)
            }
            UnaryOp::Incr => Value::Num(self.heap.as_number(value)? + 1.0),
            UnaryOp::Decr => Value::Num(self.heap.as_number(value)? - 1.0),
            UnaryOp::TypeOf => {
                let name = self.heap.type_name(value);
                self.heap.alloc_str(name)
            }
        };
        self.push(result)
    }
}
