/// Method tables: open-addressed hash tables from interned Strings to values.
/// Keys hash on their intern id, which is stable across collections. A table
/// that becomes too full is rebuilt at twice the size.
use std::hash::Hasher;

use fnv::FnvHasher;

use genheap::{Address, Root, WORD_BYTES};

use crate::error::RuntimeError;
use crate::headers::BuiltinType;
use crate::layout::table;
use crate::runtime::Interpreter;
use crate::value::Value;

pub const TABLE_MIN_CAPACITY: usize = 8;

fn hash_id(id: usize) -> usize {
    let mut hasher = FnvHasher::default();
    hasher.write_usize(id);
    hasher.finish() as usize
}

fn key_index(slot: usize) -> usize {
    table::PAIRS + 2 * slot
}

impl Interpreter {
    pub(crate) fn table_new(&mut self, capacity: usize) -> Result<Value, RuntimeError> {
        let capacity = capacity.max(TABLE_MIN_CAPACITY).next_power_of_two();
        self.alloc(
            BuiltinType::Table.into(),
            (table::PAIRS + 2 * capacity) * WORD_BYTES,
        )
    }

    pub(crate) fn table_len(&self, table: Value) -> Result<usize, RuntimeError> {
        let addr = self.address_of(table, BuiltinType::Table)?;
        Ok(self.raw(addr, table::LEN))
    }

    // The slot holding `key`, or the empty slot where it would go
    fn table_slot(&self, addr: Address, key_id: usize) -> Result<usize, RuntimeError> {
        let capacity = self.raw(addr, table::CAPACITY);
        let mut slot = hash_id(key_id) & (capacity - 1);

        loop {
            let key = self.load(addr, key_index(slot));
            if key.is_nil() || self.string_id(key)? == key_id {
                return Ok(slot);
            }
            slot = (slot + 1) & (capacity - 1);
        }
    }

    pub(crate) fn table_get(
        &self,
        table: Value,
        key: Value,
    ) -> Result<Option<Value>, RuntimeError> {
        let addr = self.address_of(table, BuiltinType::Table)?;
        let slot = self.table_slot(addr, self.string_id(key)?)?;

        if self.load(addr, key_index(slot)).is_nil() {
            Ok(None)
        } else {
            Ok(Some(self.load(addr, key_index(slot) + 1)))
        }
    }

    /// Every (key, value) pair
    pub(crate) fn table_entries(&self, table: Value) -> Result<Vec<(Value, Value)>, RuntimeError> {
        let addr = self.address_of(table, BuiltinType::Table)?;
        let capacity = self.raw(addr, table::CAPACITY);

        Ok((0..capacity)
            .map(|slot| {
                (
                    self.load(addr, key_index(slot)),
                    self.load(addr, key_index(slot) + 1),
                )
            })
            .filter(|(key, _)| !key.is_nil())
            .collect())
    }

    /// Bind `key` to `value`. If the table had to be rebuilt the root is
    /// updated to the new table, which is also returned. This is a
    /// relocation point.
    pub(crate) fn table_put(
        &mut self,
        target: Root,
        key: Value,
        value: Value,
    ) -> Result<Value, RuntimeError> {
        self.scope(|interp| {
            let key = interp.push_root(key);
            let value = interp.push_root(value);

            let table = interp.value(target);
            let len = interp.table_len(table)?;
            let addr = interp.address(table)?;
            let capacity = interp.raw(addr, table::CAPACITY);

            if (len + 1) * 4 > capacity * 3 {
                interp.table_rebuild(target, capacity * 2)?;
            }

            interp.table_insert(target, key, value)?;
            Ok(interp.value(target))
        })
    }

    fn table_rebuild(&mut self, target: Root, capacity: usize) -> Result<(), RuntimeError> {
        self.scope(|interp| {
            let fresh = interp.table_new(capacity)?;
            let fresh = interp.push_root(fresh);

            let entries = interp.table_entries(interp.value(target))?;
            let entries: Vec<(Root, Root)> = entries
                .into_iter()
                .map(|(key, value)| (interp.push_root(key), interp.push_root(value)))
                .collect();

            for (key, value) in entries {
                interp.table_insert(fresh, key, value)?;
            }

            let fresh = interp.value(fresh);
            interp.set_value(target, fresh);
            Ok(())
        })
    }

    // Insert without checking the load factor
    fn table_insert(&mut self, target: Root, key: Root, value: Root) -> Result<(), RuntimeError> {
        let key_id = self.string_id(self.value(key))?;
        let addr = self.address(self.value(target))?;
        let slot = self.table_slot(addr, key_id)?;

        if self.load(addr, key_index(slot)).is_nil() {
            let len = self.raw(addr, table::LEN);
            self.set_raw(addr, table::LEN, len + 1);
        }

        let key_value = self.value(key);
        self.store(addr, key_index(slot), key_value)?;

        let addr = self.address(self.value(target))?;
        let value = self.value(value);
        self.store(addr, key_index(slot) + 1, value)
    }
}
