//! Object heap: the allocator registry and the tri-color collector.
//!
//! Every heap object lives in a slot of the arena and is addressed by
//! an [`ObjId`] handle; no object can be reached from a [`Value`]
//! without occupying a slot, which is the registry invariant the
//! collector relies on. Collection is stop-the-world and runs only at
//! interpreter safe-points, so no write barrier is needed.

use pi_asm::PanicReason;

use crate::consts::GC_INITIAL_THRESHOLD;
use crate::error::SimpleResult;
use crate::object::{
    Function, GcColor, Object, PiList, PiMap, PiRange, PiStr, UpvalueCell,
};
use crate::table::Table;
use crate::value::Value;

/// Handle to a heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId(u32);

impl ObjId {
    /// Raw slot index, for display purposes only.
    pub fn index(&self) -> u32 {
        self.0
    }
}

/// The object arena plus collector state.
#[derive(Debug, Default)]
pub struct Heap {
    slots: Vec<Option<Object>>,
    colors: Vec<GcColor>,
    free: Vec<u32>,
    gray: Vec<ObjId>,
    live: usize,
    allocated_since_gc: usize,
    next_gc: usize,
}

impl Heap {
    /// An empty heap with the default collection threshold.
    pub fn new() -> Self {
        Heap {
            next_gc: GC_INITIAL_THRESHOLD,
            ..Heap::default()
        }
    }

    /// Register an object and return its handle.
    pub fn alloc(&mut self, obj: Object) -> ObjId {
        self.allocated_since_gc += 1;
        self.live += 1;
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(obj);
                self.colors[slot as usize] = GcColor::White;
                ObjId(slot)
            }
            None => {
                self.slots.push(Some(obj));
                self.colors.push(GcColor::White);
                ObjId(self.slots.len() as u32 - 1)
            }
        }
    }

    /// Allocate a string object.
    pub fn alloc_str(&mut self, s: impl Into<String>) -> Value {
        Value::Obj(self.alloc(Object::Str(PiStr::new(s))))
    }

    /// Allocate a list object.
    pub fn alloc_list(&mut self, items: Vec<Value>) -> Value {
        Value::Obj(self.alloc(Object::List(PiList::new(items))))
    }

    /// Allocate an empty map object.
    pub fn alloc_map(&mut self, table: Table) -> Value {
        Value::Obj(self.alloc(Object::Map(PiMap {
            table,
            ..PiMap::default()
        })))
    }

    /// Allocate a range object; step 0 is rejected at construction.
    pub fn alloc_range(
        &mut self,
        start: f64,
        end: f64,
        step: f64,
        inclusive: bool,
    ) -> SimpleResult<Value> {
        if step == 0.0 {
            return Err(PanicReason::ZeroStep.into());
        }
        Ok(Value::Obj(self.alloc(Object::Range(PiRange {
            start,
            end,
            step,
            inclusive,
            current: start,
        }))))
    }

    /// Live object count.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the heap holds no live objects.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Whether enough allocations piled up to warrant a collection.
    pub fn wants_gc(&self) -> bool {
        self.allocated_since_gc >= self.next_gc
    }

    /// Borrow an object. A dangling handle means the collector freed a
    /// reachable object, which is a VM bug, so this panics rather than
    /// returning an error the program could observe.
    #[track_caller]
    pub fn get(&self, id: ObjId) -> &Object {
        match self.slots.get(id.0 as usize).and_then(Option::as_ref) {
            Some(obj) => obj,
            None => panic!("dangling object handle {}", id.0),
        }
    }

    /// Mutably borrow an object.
    #[track_caller]
    pub fn get_mut(&mut self, id: ObjId) -> &mut Object {
        match self.slots.get_mut(id.0 as usize).and_then(Option::as_mut) {
            Some(obj) => obj,
            None => panic!("dangling object handle {}", id.0),
        }
    }

    /// Whether the handle still points at a live object. Used by the
    /// collection tests; the interpreter never holds stale handles.
    pub fn contains(&self, id: ObjId) -> bool {
        self.slots
            .get(id.0 as usize)
            .map_or(false, Option::is_some)
    }

    /// The string payload behind a value, if it is one.
    pub fn str_of(&self, value: Value) -> Option<&PiStr> {
        match value {
            Value::Obj(id) => match self.get(id) {
                Object::Str(s) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    /// The list payload behind a value, if it is one.
    pub fn list_of(&self, value: Value) -> Option<&PiList> {
        match value {
            Value::Obj(id) => match self.get(id) {
                Object::List(l) => Some(l),
                _ => None,
            },
            _ => None,
        }
    }

    /// The map payload behind a value, if it is one.
    pub fn map_of(&self, value: Value) -> Option<&PiMap> {
        match value {
            Value::Obj(id) => match self.get(id) {
                Object::Map(m) => Some(m),
                _ => None,
            },
            _ => None,
        }
    }

    /// The function payload behind a value, if it is one.
    pub fn function_of(&self, value: Value) -> Option<&Function> {
        match value {
            Value::Obj(id) => match self.get(id) {
                Object::Function(f) => Some(f),
                _ => None,
            },
            _ => None,
        }
    }

    // ---- collection ----

    /// Run a full mark/sweep cycle. `root_values` and `root_objects`
    /// must cover every root set: operand stack, globals, constants,
    /// open upvalues, live frames, and the iterator stack.
    pub fn collect(
        &mut self,
        root_values: impl IntoIterator<Item = Value>,
        root_objects: impl IntoIterator<Item = ObjId>,
    ) {
        let before = self.live;

        for value in root_values {
            self.mark_value(value);
        }
        for id in root_objects {
            self.mark_object(id);
        }

        // Process the gray worklist until the reachable graph is black.
        while let Some(id) = self.gray.pop() {
            self.colors[id.0 as usize] = GcColor::Black;
            self.blacken(id);
        }

        self.sweep();

        self.allocated_since_gc = 0;
        self.next_gc = self.next_gc.saturating_mul(2);

        tracing::debug!(
            before,
            after = self.live,
            next_gc = self.next_gc,
            "gc cycle complete"
        );
    }

    fn mark_value(&mut self, value: Value) {
        if let Value::Obj(id) = value {
            self.mark_object(id);
        }
    }

    /// Color a white object gray and queue it for scanning.
    fn mark_object(&mut self, id: ObjId) {
        let slot = id.0 as usize;
        if self.slots[slot].is_none() || self.colors[slot] != GcColor::White {
            return;
        }
        self.colors[slot] = GcColor::Gray;
        self.gray.push(id);
    }

    /// Scan the out-edges of a gray object, graying white targets.
    fn blacken(&mut self, id: ObjId) {
        // Children are gathered first so the arena borrow ends before
        // colors are touched.
        let mut values: Vec<Value> = Vec::new();
        let mut objects: Vec<ObjId> = Vec::new();

        match self.get(id) {
            Object::List(list) => values.extend(list.items.iter().copied()),
            Object::Map(map) => {
                values.extend(map.table.values());
                objects.extend(map.proto);
            }
            Object::Function(f) => {
                values.extend(f.params.iter().copied());
                objects.extend(f.code);
                objects.extend(f.instance);
                for cell in &f.upvalues {
                    if let UpvalueCell::Closed(v) = *cell.borrow() {
                        values.push(v);
                    }
                }
            }
            Object::Model(model) => objects.extend(model.texture),
            Object::Str(_)
            | Object::Range(_)
            | Object::Code(_)
            | Object::File(_)
            | Object::Image(_)
            | Object::Sprite(_)
            | Object::Sound(_) => {}
        }

        for value in values {
            self.mark_value(value);
        }
        for object in objects {
            self.mark_object(object);
        }
    }

    /// Free every white object and reset survivors to white. Dropping
    /// the payload runs kind-specific cleanup (file handles close).
    fn sweep(&mut self) {
        for (slot, obj) in self.slots.iter_mut().enumerate() {
            if obj.is_none() {
                continue;
            }
            match self.colors[slot] {
                GcColor::White => {
                    *obj = None;
                    self.free.push(slot as u32);
                    self.live -= 1;
                }
                GcColor::Black | GcColor::Gray => {
                    self.colors[slot] = GcColor::White;
                }
            }
        }
    }

    // ---- iterator protocol ----

    /// Rewind an iterable to its first element.
    pub fn iter_reset(&mut self, id: ObjId) -> SimpleResult<()> {
        match self.get_mut(id) {
            Object::Range(r) => r.current = r.start,
            Object::List(l) => l.cursor = 0,
            Object::Str(s) => s.cursor = 0,
            Object::Map(m) => m.cursor = 0,
            _ => return Err(PanicReason::NotIterable.into()),
        }
        Ok(())
    }

    /// Whether the iterable has a next element. Once this reports
    /// `false` it keeps reporting `false` until a reset.
    pub fn iter_has_next(&self, id: ObjId) -> SimpleResult<bool> {
        Ok(match self.get(id) {
            Object::Range(r) => r.in_bounds(r.current),
            Object::List(l) => l.cursor < l.items.len(),
            Object::Str(s) => s.cursor < s.as_str().len(),
            Object::Map(m) => m.cursor < m.table.len(),
            _ => return Err(PanicReason::NotIterable.into()),
        })
    }

    /// Yield the next element and advance the cursor. String iteration
    /// allocates a fresh single-character string; map iteration yields
    /// values in insertion order.
    pub fn iter_next(&mut self, id: ObjId) -> SimpleResult<Value> {
        if !self.iter_has_next(id)? {
            return Err(PanicReason::IteratorExhausted.into());
        }
        let pending = match self.get_mut(id) {
            Object::Range(r) => {
                let value = r.current;
                r.current += r.step;
                return Ok(Value::Num(value));
            }
            Object::List(l) => {
                let value = l.items[l.cursor];
                l.cursor += 1;
                return Ok(value);
            }
            Object::Map(m) => {
                let value = m
                    .table
                    .nth(m.cursor)
                    .map(|(_, v)| v)
                    .ok_or(PanicReason::IteratorExhausted)?;
                m.cursor += 1;
                return Ok(value);
            }
            Object::Str(s) => {
                let rest = &s.as_str()[s.cursor..];
                let ch = rest.chars().next().ok_or(PanicReason::IteratorExhausted)?;
                s.cursor += ch.len_utf8();
                ch
            }
            _ => return Err(PanicReason::NotIterable.into()),
        };
        // A fresh one-character string per yielded element.
        Ok(self.alloc_str(pending.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::UpvalueCell;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn collect_frees_unreachable_objects() {
        let mut heap = Heap::new();
        let kept = heap.alloc_list(vec![]);
        let _garbage = heap.alloc_str("doomed");
        let _more = heap.alloc_str("also doomed");
        assert_eq!(heap.len(), 3);

        heap.collect([kept], []);

        assert_eq!(heap.len(), 1);
        assert!(heap.contains(kept.as_obj().unwrap()));
    }

    #[test]
    fn collect_traces_through_containers() {
        let mut heap = Heap::new();
        let leaf = heap.alloc_str("leaf");
        let list = heap.alloc_list(vec![leaf]);
        let mut table = Table::new();
        table.put("inner", list);
        let map = heap.alloc_map(table);

        heap.collect([map], []);

        assert!(heap.contains(leaf.as_obj().unwrap()));
        assert!(heap.contains(list.as_obj().unwrap()));
        assert_eq!(heap.len(), 3);
    }

    #[test]
    fn collect_handles_cycles() {
        // A map holding a closure whose instance is the map itself.
        let mut heap = Heap::new();
        let map = heap.alloc(Object::Map(PiMap::default()));
        let f = heap.alloc(Object::Function(Function {
            name: "method".into(),
            instance: Some(map),
            is_method: true,
            ..Function::default()
        }));
        match heap.get_mut(map) {
            Object::Map(m) => m.table.put("f", Value::Obj(f)),
            _ => unreachable!(),
        }

        // Reachable cycle survives.
        heap.collect([Value::Obj(map)], []);
        assert_eq!(heap.len(), 2);

        // Unreachable cycle is collected whole.
        heap.collect(std::iter::empty(), []);
        assert_eq!(heap.len(), 0);
        assert!(!heap.contains(map));
        assert!(!heap.contains(f));
    }

    #[test]
    fn closed_upvalues_are_roots_through_functions() {
        let mut heap = Heap::new();
        let captured = heap.alloc_str("captured");
        let cell = Rc::new(RefCell::new(UpvalueCell::Closed(captured)));
        let f = heap.alloc(Object::Function(Function {
            name: "closure".into(),
            upvalues: vec![cell],
            ..Function::default()
        }));

        heap.collect([Value::Obj(f)], []);
        assert!(heap.contains(captured.as_obj().unwrap()));
    }

    #[test]
    fn slots_are_reused_after_sweep() {
        let mut heap = Heap::new();
        let doomed = heap.alloc_str("x");
        heap.collect(std::iter::empty(), []);
        assert!(!heap.contains(doomed.as_obj().unwrap()));

        let fresh = heap.alloc_str("y");
        assert_eq!(fresh.as_obj().unwrap(), doomed.as_obj().unwrap());
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn exhausted_iterators_stay_exhausted() {
        let mut heap = Heap::new();
        let range = heap.alloc_range(0.0, 2.0, 1.0, false).unwrap();
        let id = range.as_obj().unwrap();

        assert_eq!(heap.iter_next(id).unwrap(), Value::Num(0.0));
        assert_eq!(heap.iter_next(id).unwrap(), Value::Num(1.0));
        assert!(!heap.iter_has_next(id).unwrap());
        assert!(!heap.iter_has_next(id).unwrap());
        assert!(heap.iter_next(id).is_err());

        heap.iter_reset(id).unwrap();
        assert!(heap.iter_has_next(id).unwrap());
    }

    #[test]
    fn zero_step_ranges_are_rejected() {
        let mut heap = Heap::new();
        assert!(heap.alloc_range(0.0, 5.0, 0.0, false).is_err());
    }
}
