/// Tuples: an ordered, growable run of values. A push that does not fit
/// relocates the tuple into a slot exactly one element larger.
use genheap::{Root, WORD_BYTES};

use crate::error::RuntimeError;
use crate::headers::BuiltinType;
use crate::layout::tuple;
use crate::runtime::Interpreter;
use crate::value::Value;

fn tuple_size(capacity: usize) -> usize {
    (tuple::ITEMS + capacity) * WORD_BYTES
}

impl Interpreter {
    pub fn tuple_empty(&mut self) -> Result<Value, RuntimeError> {
        self.tuple_with_size(0)
    }

    /// An empty tuple with room for `capacity` items
    pub fn tuple_with_size(&mut self, capacity: usize) -> Result<Value, RuntimeError> {
        self.alloc(BuiltinType::Tuple.into(), tuple_size(capacity))
    }

    /// A tuple of one item
    pub fn tuple_new(&mut self, item: Value) -> Result<Value, RuntimeError> {
        self.scope(|interp| {
            let tuple = interp.tuple_with_size(1)?;
            let root = interp.push_root(tuple);
            interp.tuple_push(root, item)
        })
    }

    /// A tuple holding `items` in order
    pub fn tuple_from(&mut self, items: &[Value]) -> Result<Value, RuntimeError> {
        self.scope(|interp| {
            let roots: Vec<Root> = items.iter().map(|item| interp.push_root(*item)).collect();
            let tuple = interp.tuple_with_size(items.len())?;
            let root = interp.push_root(tuple);

            for item in roots {
                let item = interp.value(item);
                interp.tuple_push(root, item)?;
            }

            Ok(interp.value(root))
        })
    }

    pub fn tuple_len(&self, tuple: Value) -> Result<usize, RuntimeError> {
        let addr = self.address_of(tuple, BuiltinType::Tuple)?;
        Ok(self.raw(addr, tuple::LEN))
    }

    /// Item `index`, or nil past the end
    pub fn tuple_at(&self, tuple: Value, index: usize) -> Result<Value, RuntimeError> {
        let addr = self.address_of(tuple, BuiltinType::Tuple)?;

        if index < self.raw(addr, tuple::LEN) {
            Ok(self.load(addr, tuple::ITEMS + index))
        } else {
            Ok(Value::NIL)
        }
    }

    pub fn tuple_items(&self, tuple: Value) -> Result<Vec<Value>, RuntimeError> {
        let len = self.tuple_len(tuple)?;
        (0..len).map(|i| self.tuple_at(tuple, i)).collect()
    }

    /// Append `item`, relocating the tuple if it is full. Returns the tuple's
    /// current handle; the root is updated too. This is a relocation point.
    pub fn tuple_push(&mut self, tuple: Root, item: Value) -> Result<Value, RuntimeError> {
        self.scope(|interp| {
            let item = interp.push_root(item);

            let len = interp.tuple_len(interp.value(tuple))?;
            interp.heap.grow_if_needed(tuple, tuple_size(len + 1))?;

            let addr = interp.address(interp.value(tuple))?;
            interp.set_raw(addr, tuple::LEN, len + 1);

            let item = interp.value(item);
            interp.store(addr, tuple::ITEMS + len, item)?;

            Ok(interp.value(tuple))
        })
    }

    /// Index of the first item identical to `item`
    pub fn tuple_find(&self, tuple: Value, item: Value) -> Result<Option<usize>, RuntimeError> {
        let items = self.tuple_items(tuple)?;
        Ok(items.iter().position(|candidate| self.same(*candidate, item)))
    }

    /// Append `item` unless an identical item is already present
    pub fn tuple_push_unless(&mut self, tuple: Root, item: Value) -> Result<Value, RuntimeError> {
        if self.tuple_find(self.value(tuple), item)?.is_some() {
            Ok(self.value(tuple))
        } else {
            self.tuple_push(tuple, item)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::runtime::Config;

    fn interp() -> Interpreter {
        Interpreter::new(Config::default()).unwrap()
    }

    #[test]
    fn test_push_and_relocate() {
        let mut interp = interp();

        let t = interp.tuple_with_size(5).unwrap();
        let root = interp.pin(t);
        for i in 0..5 {
            interp.tuple_push(root, Value::int(i * 2)).unwrap();
        }

        assert!(interp.value(root) == t);
        assert!(interp.tuple_at(t, 3).unwrap() == Value::int(6));
        assert!(interp.tuple_len(t).unwrap() == 5);

        let old = interp.value(root);
        let new = interp.tuple_push(root, Value::int(10)).unwrap();
        assert!(new != old);
        assert!(interp.tuple_len(old).unwrap() == 6);
        assert!(interp.tuple_len(new).unwrap() == 6);
        assert!(interp.tuple_at(old, 5).unwrap() == Value::int(10));
    }

    #[test]
    fn test_push_from_empty() {
        let mut interp = interp();

        let first = interp.tuple_empty().unwrap();
        let root = interp.pin(first);
        for i in 0..5 {
            interp.tuple_push(root, Value::int(i * 2)).unwrap();
        }

        let t = interp.value(root);
        assert!(interp.tuple_len(t).unwrap() == 5);
        assert!(interp.tuple_at(t, 3).unwrap() == Value::int(6));

        let kept = interp.pin(t);
        let grown = interp.tuple_push(root, Value::int(10)).unwrap();
        let expected: Vec<Value> = (0..6).map(|i| Value::int(i * 2)).collect();

        for handle in &[first, interp.value(kept), grown] {
            assert!(interp.same(*handle, grown));
            assert!(interp.tuple_len(*handle).unwrap() == 6);
            assert!(interp.tuple_items(*handle).unwrap() == expected);
        }

        interp.collect(0, false).unwrap();

        let kept = interp.value(kept);
        assert!(kept == interp.value(root));
        assert!(interp.tuple_items(kept).unwrap() == expected);
    }

    #[test]
    fn test_out_of_range_is_nil() {
        let mut interp = interp();
        let t = interp.tuple_new(Value::TRUE).unwrap();

        assert!(interp.tuple_at(t, 0).unwrap() == Value::TRUE);
        assert!(interp.tuple_at(t, 1).unwrap() == Value::NIL);
    }

    #[test]
    fn test_find_and_push_unless() {
        let mut interp = interp();

        let greet = interp.intern("greet").unwrap();
        let t = interp.tuple_from(&[Value::int(1), greet]).unwrap();
        let root = interp.pin(t);

        assert!(interp.tuple_find(t, greet).unwrap() == Some(1));
        assert!(interp.tuple_find(t, Value::int(2)).unwrap().is_none());

        interp.tuple_push_unless(root, Value::int(1)).unwrap();
        assert!(interp.tuple_len(interp.value(root)).unwrap() == 2);

        interp.tuple_push_unless(root, Value::int(2)).unwrap();
        assert!(interp.tuple_len(interp.value(root)).unwrap() == 3);
    }

    #[test]
    fn test_nested_tuples_survive_collection() {
        let mut interp = interp();

        let inner = interp.tuple_from(&[Value::int(7), Value::int(8)]).unwrap();
        let outer = interp.tuple_new(inner).unwrap();
        let root = interp.pin(outer);

        for _ in 0..200 {
            interp.tuple_from(&[Value::int(0); 8]).unwrap();
        }
        interp.collect(0, false).unwrap();
        interp.collect(0, true).unwrap();

        let outer = interp.value(root);
        let inner = interp.tuple_at(outer, 0).unwrap();
        assert!(interp.tuple_items(inner).unwrap() == vec![Value::int(7), Value::int(8)]);
    }
}
