/// Interned strings and mutable byte strings.

use tracing::trace;

use genheap::{Root, WORD_BYTES};

use crate::error::{err_type, RuntimeError};
use crate::headers::BuiltinType;
use crate::layout::{bytes, string};
use crate::runtime::Interpreter;
use crate::value::Value;

impl Interpreter {
    /// The unique String for `text`. Interned strings are never collected;
    /// each carries an id assigned in interning order.
    pub fn intern(&mut self, text: &str) -> Result<Value, RuntimeError> {
        if let Some(root) = self.strings.get(text) {
            return Ok(self.value(*root));
        }

        let value = self.alloc(
            BuiltinType::String.into(),
            string::BYTES * WORD_BYTES + text.len(),
        )?;
        let addr = self.address(value)?;

        let id = self.next_string_id;
        self.next_string_id += 1;

        self.set_raw(addr, string::LEN, text.len());
        self.set_raw(addr, string::ID, id);
        self.write_bytes(addr, string::BYTES * WORD_BYTES, text.as_bytes());

        let root = self.pin(value);
        self.strings.insert(text.into(), root);

        trace!(target: "tagvm", text, id, "interned string");
        Ok(value)
    }

    /// Number of interned strings
    pub fn interned_count(&self) -> usize {
        self.strings.len()
    }

    pub fn string_id(&self, value: Value) -> Result<usize, RuntimeError> {
        let addr = self.address_of(value, BuiltinType::String)?;
        Ok(self.raw(addr, string::ID))
    }

    /// Length in bytes of a String or Bytes
    pub fn string_len(&self, value: Value) -> Result<usize, RuntimeError> {
        let addr = self.address(value)?;

        match self.kind_of(value).builtin() {
            Some(BuiltinType::String) => Ok(self.raw(addr, string::LEN)),
            Some(BuiltinType::Bytes) => Ok(self.raw(addr, bytes::LEN)),
            _ => Err(err_type("expected a String or Bytes")),
        }
    }

    /// The text of a String or Bytes
    pub fn string_text(&self, value: Value) -> Result<String, RuntimeError> {
        let addr = self.address(value)?;

        let raw = match self.kind_of(value).builtin() {
            Some(BuiltinType::String) => self.read_bytes(
                addr,
                string::BYTES * WORD_BYTES,
                self.raw(addr, string::LEN),
            ),
            Some(BuiltinType::Bytes) => {
                self.read_bytes(addr, bytes::BYTES * WORD_BYTES, self.raw(addr, bytes::LEN))
            }
            _ => return Err(err_type("expected a String or Bytes")),
        };

        String::from_utf8(raw).map_err(|_| err_type("invalid UTF-8 in string"))
    }

    /// An empty byte string with room for `capacity` bytes
    pub fn bytes_new(&mut self, capacity: usize) -> Result<Value, RuntimeError> {
        self.alloc(
            BuiltinType::Bytes.into(),
            bytes::BYTES * WORD_BYTES + capacity,
        )
    }

    /// Append text to a byte string, relocating it if it is full. This is a
    /// relocation point.
    pub fn bytes_append(&mut self, target: Root, text: &str) -> Result<(), RuntimeError> {
        let addr = self.address_of(self.value(target), BuiltinType::Bytes)?;
        let len = self.raw(addr, bytes::LEN);
        let capacity = self.raw(addr, bytes::CAPACITY);

        if len + text.len() > capacity {
            let wanted = (len + text.len()).max(capacity * 2);
            self.heap
                .grow_if_needed(target, bytes::BYTES * WORD_BYTES + wanted)?;
        }

        let addr = self.address(self.value(target))?;
        self.write_bytes(addr, bytes::BYTES * WORD_BYTES + len, text.as_bytes());
        self.set_raw(addr, bytes::LEN, len + text.len());
        Ok(())
    }
}
