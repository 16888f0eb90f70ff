/// Slotted objects, weak references, files and raw data blocks.
use genheap::{Address, WORD_BYTES};

use crate::error::{err_bounds, err_type, RuntimeError};
use crate::headers::{BuiltinType, TypeTag};
use crate::layout::{data, file, slots, weak};
use crate::runtime::Interpreter;
use crate::value::Value;

/// Whether objects of this type are a counted run of value slots
fn is_slotted(tag: TypeTag) -> bool {
    use BuiltinType::*;

    match tag.builtin() {
        Some(Object) | Some(Lobby) | Some(State) | Some(Source) | None => true,
        _ => false,
    }
}

impl Interpreter {
    /// A new instance of a registered slotted type with `count` nil slots
    pub fn object_new(&mut self, tag: TypeTag, count: usize) -> Result<Value, RuntimeError> {
        self.vtable_of(tag)?;
        if !is_slotted(tag) {
            return Err(err_type(&format!(
                "{} instances are not slotted objects",
                self.type_name(tag)?
            )));
        }

        let object = self.alloc(tag, (slots::SLOTS + count) * WORD_BYTES)?;
        let addr = self.address(object)?;
        self.set_raw(addr, slots::COUNT, count);
        Ok(object)
    }

    fn slots_of(&self, object: Value) -> Result<Address, RuntimeError> {
        if is_slotted(self.kind_of(object)) && object.is_ref() {
            self.address(object)
        } else {
            Err(err_type(&format!("expected a slotted object, found {}", object)))
        }
    }

    pub fn slot_count(&self, object: Value) -> Result<usize, RuntimeError> {
        let addr = self.slots_of(object)?;
        Ok(self.raw(addr, slots::COUNT))
    }

    pub fn slot(&self, object: Value, index: usize) -> Result<Value, RuntimeError> {
        let addr = self.slots_of(object)?;

        if index < self.raw(addr, slots::COUNT) {
            Ok(self.load(addr, slots::SLOTS + index))
        } else {
            Err(err_bounds())
        }
    }

    /// Set a slot. This is a relocation point.
    pub fn set_slot(
        &mut self,
        object: Value,
        index: usize,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let addr = self.slots_of(object)?;

        if index < self.raw(addr, slots::COUNT) {
            self.store(addr, slots::SLOTS + index, value)
        } else {
            Err(err_bounds())
        }
    }

    /// A weak reference cell holding `value`, used to share a mutable
    /// binding between closures
    pub fn weak_ref(&mut self, value: Value) -> Result<Value, RuntimeError> {
        self.scope(|interp| {
            let value = interp.push_root(value);

            let cell = interp.alloc(BuiltinType::WeakRef.into(), weak::WORDS * WORD_BYTES)?;
            let addr = interp.address(cell)?;
            interp.store(addr, weak::DATA, interp.value(value))?;

            Ok(Value::weak(addr))
        })
    }

    fn weak_cell(&self, reference: Value) -> Result<Address, RuntimeError> {
        if !reference.is_weak_ref() {
            return Err(err_type(&format!("expected a weak reference, found {}", reference)));
        }
        self.address_of(reference, BuiltinType::WeakRef)
    }

    pub fn weak_get(&self, reference: Value) -> Result<Value, RuntimeError> {
        let addr = self.weak_cell(reference)?;
        Ok(self.load(addr, weak::DATA))
    }

    pub fn weak_set(&mut self, reference: Value, value: Value) -> Result<(), RuntimeError> {
        let addr = self.weak_cell(reference)?;
        self.store(addr, weak::DATA, value)
    }

    /// A file record: descriptor, path and mode
    pub fn file_new(&mut self, fd: isize, path: &str, mode: &str) -> Result<Value, RuntimeError> {
        self.scope(|interp| {
            let path = interp.intern(path)?;
            let path = interp.push_root(path);
            let mode = interp.intern(mode)?;
            let mode = interp.push_root(mode);

            let record = interp.alloc(BuiltinType::File.into(), file::WORDS * WORD_BYTES)?;
            let addr = interp.address(record)?;
            interp.set_raw(addr, file::FD, Value::int(fd).as_word());
            interp.store(addr, file::PATH, interp.value(path))?;
            interp.store(addr, file::MODE, interp.value(mode))?;

            Ok(record)
        })
    }

    pub fn file_fd(&self, record: Value) -> Result<isize, RuntimeError> {
        let addr = self.address_of(record, BuiltinType::File)?;
        self.load(addr, file::FD)
            .as_int()
            .ok_or_else(|| err_type("corrupt file descriptor"))
    }

    pub fn file_path(&self, record: Value) -> Result<String, RuntimeError> {
        let addr = self.address_of(record, BuiltinType::File)?;
        self.string_text(self.load(addr, file::PATH))
    }

    pub fn file_mode(&self, record: Value) -> Result<String, RuntimeError> {
        let addr = self.address_of(record, BuiltinType::File)?;
        self.string_text(self.load(addr, file::MODE))
    }

    /// A raw data block holding a copy of `bytes`
    pub fn data_new(&mut self, bytes: &[u8]) -> Result<Value, RuntimeError> {
        let block = self.alloc(
            BuiltinType::Data.into(),
            data::BYTES * WORD_BYTES + bytes.len(),
        )?;

        let addr = self.address(block)?;
        self.set_raw(addr, data::LEN, bytes.len());
        self.write_bytes(addr, data::BYTES * WORD_BYTES, bytes);
        Ok(block)
    }

    pub fn data_bytes(&self, block: Value) -> Result<Vec<u8>, RuntimeError> {
        let addr = self.address_of(block, BuiltinType::Data)?;
        Ok(self.read_bytes(addr, data::BYTES * WORD_BYTES, self.raw(addr, data::LEN)))
    }
}
