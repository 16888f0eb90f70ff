/// The flexible array container: a relocatable buffer of bytes or values with
/// a length and a capacity, grown through the heap's relocation protocol.
use std::convert::TryFrom;
use std::mem::size_of;

use tracing::trace;

use genheap::{Root, WORD_BYTES};

use crate::error::{err_bounds, err_type, ErrorKind, RuntimeError};
use crate::headers::BuiltinType;
use crate::layout::{flex, flex_capacity, flex_size};
use crate::runtime::Interpreter;
use crate::value::Value;

/// Growth never yields fewer bytes than this
pub const FLEX_UNIT: usize = 4096;

/// What a flex holds: raw bytes, or traced values
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FlexKind {
    Bytes,
    Values,
}

impl FlexKind {
    fn code(self) -> usize {
        match self {
            FlexKind::Bytes => flex::KIND_BYTES,
            FlexKind::Values => flex::KIND_VALUES,
        }
    }

    fn element_size(self) -> usize {
        match self {
            FlexKind::Bytes => 1,
            FlexKind::Values => WORD_BYTES,
        }
    }
}

/// Element widths accepted by `flex_append`
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Width {
    Byte,
    Int,
    Word,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Width::Byte => 1,
            Width::Int => size_of::<i32>(),
            Width::Word => size_of::<usize>(),
        }
    }

    // The low `bytes()` bytes of `word`, in native order
    fn encode(self, word: usize) -> Vec<u8> {
        match self {
            Width::Byte => vec![word as u8],
            Width::Int => (word as u32).to_ne_bytes().to_vec(),
            Width::Word => word.to_ne_bytes().to_vec(),
        }
    }

    fn decode(self, bytes: &[u8]) -> usize {
        match self {
            Width::Byte => bytes[0] as usize,
            Width::Int => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(bytes);
                u32::from_ne_bytes(raw) as usize
            }
            Width::Word => {
                let mut raw = [0u8; WORD_BYTES];
                raw.copy_from_slice(bytes);
                usize::from_ne_bytes(raw)
            }
        }
    }
}

impl TryFrom<usize> for Width {
    type Error = RuntimeError;

    fn try_from(bytes: usize) -> Result<Width, RuntimeError> {
        if bytes == Width::Byte.bytes() {
            Ok(Width::Byte)
        } else if bytes == Width::Int.bytes() {
            Ok(Width::Int)
        } else if bytes == Width::Word.bytes() {
            Ok(Width::Word)
        } else {
            Err(RuntimeError::new(ErrorKind::UnsupportedWidth(bytes)))
        }
    }
}

impl Interpreter {
    /// A new, empty flex with room for at least `capacity` elements
    pub fn flex_new(&mut self, kind: FlexKind, capacity: usize) -> Result<Value, RuntimeError> {
        let code = kind.code();
        let flex = self.alloc(BuiltinType::Flex.into(), flex_size(code, capacity))?;

        let addr = self.address(flex)?;
        let alloc_size = self.heap.object_size(addr);
        self.set_raw(addr, flex::KIND, code);
        self.set_raw(addr, flex::CAPACITY, flex_capacity(code, alloc_size));

        Ok(flex)
    }

    pub fn flex_kind(&self, flex: Value) -> Result<FlexKind, RuntimeError> {
        let addr = self.address_of(flex, BuiltinType::Flex)?;

        if self.raw(addr, flex::KIND) == flex::KIND_VALUES {
            Ok(FlexKind::Values)
        } else {
            Ok(FlexKind::Bytes)
        }
    }

    /// Length in elements: bytes for a byte flex, values for a value flex
    pub fn flex_len(&self, flex: Value) -> Result<usize, RuntimeError> {
        let addr = self.address_of(flex, BuiltinType::Flex)?;
        Ok(self.raw(addr, flex::LEN))
    }

    pub fn flex_capacity(&self, flex: Value) -> Result<usize, RuntimeError> {
        let addr = self.address_of(flex, BuiltinType::Flex)?;
        Ok(self.raw(addr, flex::CAPACITY))
    }

    /// Make room for `additional` more elements. When the flex must grow it
    /// is relocated to at least twice its capacity, rounded up to whole
    /// `FLEX_UNIT`s of data. This is a relocation point.
    pub fn flex_ensure_capacity(
        &mut self,
        flex: Root,
        additional: usize,
    ) -> Result<(), RuntimeError> {
        let kind = self.flex_kind(self.value(flex))?;
        let addr = self.address(self.value(flex))?;
        let len = self.raw(addr, flex::LEN);
        let capacity = self.raw(addr, flex::CAPACITY);

        let needed = len + additional;
        if needed <= capacity {
            return Ok(());
        }

        let element = kind.element_size();
        let doubled = 2 * capacity * element;
        let rounded = (needed * element + FLEX_UNIT - 1) / FLEX_UNIT * FLEX_UNIT;
        let new_capacity = doubled.max(rounded) / element;

        self.heap
            .grow_if_needed(flex, flex_size(kind.code(), new_capacity))?;

        trace!(target: "tagvm", ?kind, capacity, new_capacity, "flex grown");
        Ok(())
    }

    /// Append one element. A value flex accepts only word-width values; a
    /// byte flex stores the low `width` bytes of the value's word.
    pub fn flex_append(
        &mut self,
        flex: Root,
        value: Value,
        width: Width,
    ) -> Result<(), RuntimeError> {
        match self.flex_kind(self.value(flex))? {
            FlexKind::Bytes => self.flex_append_raw(flex, value.as_word(), width),
            FlexKind::Values => {
                if width != Width::Word {
                    return Err(RuntimeError::new(ErrorKind::UnsupportedWidth(width.bytes())));
                }

                self.scope(|interp| {
                    let item = interp.push_root(value);
                    interp.flex_ensure_capacity(flex, 1)?;

                    let addr = interp.address(interp.value(flex))?;
                    let len = interp.raw(addr, flex::LEN);
                    interp.set_raw(addr, flex::LEN, len + 1);

                    let value = interp.value(item);
                    interp.store(addr, flex::DATA + len, value)
                })
            }
        }
    }

    /// Append the low `width` bytes of `word` to a byte flex
    pub fn flex_append_raw(
        &mut self,
        flex: Root,
        word: usize,
        width: Width,
    ) -> Result<(), RuntimeError> {
        if self.flex_kind(self.value(flex))? != FlexKind::Bytes {
            return Err(err_type("raw bytes appended to a value flex"));
        }

        self.flex_ensure_capacity(flex, width.bytes())?;

        let addr = self.address(self.value(flex))?;
        let len = self.raw(addr, flex::LEN);
        self.write_bytes(addr, flex::DATA * WORD_BYTES + len, &width.encode(word));
        self.set_raw(addr, flex::LEN, len + width.bytes());

        Ok(())
    }

    /// Read an element back: `offset` is a byte offset into a byte flex, or
    /// an index into a value flex
    pub fn flex_read(
        &self,
        flex: Value,
        offset: usize,
        width: Width,
    ) -> Result<usize, RuntimeError> {
        let kind = self.flex_kind(flex)?;
        let addr = self.address(flex)?;
        let len = self.raw(addr, flex::LEN);

        match kind {
            FlexKind::Bytes => {
                if offset.checked_add(width.bytes()).map_or(true, |end| end > len) {
                    return Err(err_bounds());
                }
                let start = flex::DATA * WORD_BYTES + offset;
                let bytes = self.read_bytes(addr, start, width.bytes());
                Ok(width.decode(&bytes))
            }
            FlexKind::Values => {
                if width != Width::Word {
                    return Err(RuntimeError::new(ErrorKind::UnsupportedWidth(width.bytes())));
                }
                if offset >= len {
                    return Err(err_bounds());
                }
                Ok(self.raw(addr, flex::DATA + offset))
            }
        }
    }

    /// Element `index` of a value flex
    pub fn flex_value(&self, flex: Value, index: usize) -> Result<Value, RuntimeError> {
        self.flex_read(flex, index, Width::Word).map(Value::from_word)
    }

    /// The contents of a byte flex
    pub fn flex_bytes(&self, flex: Value) -> Result<Vec<u8>, RuntimeError> {
        if self.flex_kind(flex)? != FlexKind::Bytes {
            return Err(err_type("expected a byte flex"));
        }

        let addr = self.address(flex)?;
        let len = self.raw(addr, flex::LEN);
        Ok(self.read_bytes(addr, flex::DATA * WORD_BYTES, len))
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
    fn test_width_conversion() {
        assert!(Width::try_from(1).unwrap() == Width::Byte);
        assert!(Width::try_from(4).unwrap() == Width::Int);
        assert!(Width::try_from(8).unwrap() == Width::Word);

        let err = Width::try_from(3).unwrap_err();
        assert!(*err.error_kind() == ErrorKind::UnsupportedWidth(3));
    }

    #[test]
    fn test_byte_widths_round_trip() {
        let mut interp = interp();
        let flex = interp.flex_new(FlexKind::Bytes, 4).unwrap();
        let root = interp.pin(flex);

        interp.flex_append_raw(root, 0xab, Width::Byte).unwrap();
        interp.flex_append_raw(root, 0x1234_5678, Width::Int).unwrap();
        interp
            .flex_append_raw(root, 0x0102_0304_0506_0708, Width::Word)
            .unwrap();

        let flex = interp.value(root);
        assert!(interp.flex_len(flex).unwrap() == 13);
        assert!(interp.flex_read(flex, 0, Width::Byte).unwrap() == 0xab);
        assert!(interp.flex_read(flex, 1, Width::Int).unwrap() == 0x1234_5678);
        assert!(interp.flex_read(flex, 5, Width::Word).unwrap() == 0x0102_0304_0506_0708);

        let err = interp.flex_read(flex, 10, Width::Word).unwrap_err();
        assert!(*err.error_kind() == ErrorKind::BoundsError);
    }

    #[test]
    fn test_int_width_truncates() {
        let mut interp = interp();
        let flex = interp.flex_new(FlexKind::Bytes, 16).unwrap();
        let root = interp.pin(flex);

        interp
            .flex_append_raw(root, 0xffff_0000_0000_0001, Width::Int)
            .unwrap();
        assert!(interp.flex_read(interp.value(root), 0, Width::Int).unwrap() == 1);
    }

    #[test]
    fn test_value_flex_rejects_narrow_widths() {
        let mut interp = interp();
        let flex = interp.flex_new(FlexKind::Values, 4).unwrap();
        let root = interp.pin(flex);

        let err = interp
            .flex_append(root, Value::int(1), Width::Byte)
            .unwrap_err();
        assert!(*err.error_kind() == ErrorKind::UnsupportedWidth(1));

        interp.flex_append(root, Value::int(1), Width::Word).unwrap();
        assert!(interp.flex_len(interp.value(root)).unwrap() == 1);
    }

    #[test]
    fn test_growth_relocates() {
        let mut interp = interp();
        let flex = interp.flex_new(FlexKind::Values, 2).unwrap();
        let root = interp.pin(flex);

        for i in 0..3 {
            interp.flex_append(root, Value::int(i), Width::Word).unwrap();
        }

        let grown = interp.value(root);
        assert!(grown != flex);
        assert!(interp.same(grown, flex));
        assert!(interp.flex_capacity(grown).unwrap() == FLEX_UNIT / WORD_BYTES);
        for i in 0..3 {
            assert!(interp.flex_value(flex, i).unwrap() == Value::int(i as isize));
        }
    }

    #[test]
    fn test_ensure_capacity_noop_when_room() {
        let mut interp = interp();
        let flex = interp.flex_new(FlexKind::Bytes, 64).unwrap();
        let root = interp.pin(flex);

        interp.flex_ensure_capacity(root, 64).unwrap();
        assert!(interp.value(root) == flex);
    }

    #[test]
    fn test_values_survive_collection() {
        let mut interp = interp();
        let flex = interp.flex_new(FlexKind::Values, 2).unwrap();
        let root = interp.pin(flex);

        for i in 0..5 {
            let t = interp.tuple_new(Value::int(i)).unwrap();
            interp.flex_append(root, t, Width::Word).unwrap();
        }

        interp.collect(0, false).unwrap();
        interp.collect(0, true).unwrap();

        let flex = interp.value(root);
        for i in 0..5 {
            let t = interp.flex_value(flex, i).unwrap();
            assert!(interp.tuple_at(t, 0).unwrap() == Value::int(i as isize));
        }
    }

    #[test]
    fn test_raw_append_to_value_flex_is_a_type_error() {
        let mut interp = interp();
        let flex = interp.flex_new(FlexKind::Values, 2).unwrap();
        let root = interp.pin(flex);

        assert!(interp.flex_append_raw(root, 1, Width::Byte).is_err());
    }

    #[test]
    fn test_read_past_end_is_a_bounds_error() {
        let mut interp = interp();
        let flex = interp.flex_new(FlexKind::Bytes, 8).unwrap();
        let root = interp.pin(flex);
        interp.flex_append_raw(root, 0x0102_0304, Width::Int).unwrap();

        let flex = interp.value(root);
        for (offset, width) in &[(1, Width::Int), (4, Width::Byte), (usize::MAX, Width::Int)] {
            let err = interp.flex_read(flex, *offset, *width).unwrap_err();
            assert!(*err.error_kind() == ErrorKind::BoundsError);
        }
        let last = 0x0102_0304u32.to_ne_bytes()[3] as usize;
        assert!(interp.flex_read(flex, 3, Width::Byte).unwrap() == last);
    }
}
