/// Heap access for the interpreter: roots, allocation, field loads and
/// stores with the write barrier, byte-level access and collection.
///
/// Every method taking `&mut self` may allocate and so may move objects.
/// Values held across such calls must be kept in a root and re-read.
use genheap::{Address, HeapStats, Root, WORD_BYTES};

use crate::error::{err_type, RuntimeError};
use crate::headers::{BuiltinType, TypeTag, BUILTIN_NAMES};
use crate::layout::sized_for;
use crate::runtime::Interpreter;
use crate::value::Value;

impl Interpreter {
    /// Keep `value` alive, and track its moves, for the interpreter's lifetime
    pub fn pin(&mut self, value: Value) -> Root {
        self.heap.add_global(value.as_word())
    }

    /// Keep `value` alive until the enclosing `scope` ends
    pub fn push_root(&mut self, value: Value) -> Root {
        self.heap.push_local(value.as_word())
    }

    pub fn value(&self, root: Root) -> Value {
        Value::from_word(self.heap.root(root))
    }

    pub fn set_value(&mut self, root: Root, value: Value) {
        self.heap.set_root(root, value.as_word())
    }

    /// Run `f`, releasing every local root it pushed when it returns
    pub fn scope<T, F>(&mut self, f: F) -> Result<T, RuntimeError>
    where
        F: FnOnce(&mut Interpreter) -> Result<T, RuntimeError>,
    {
        let mark = self.heap.local_mark();
        let result = f(self);
        self.heap.pop_locals(mark);
        result
    }

    /// Allocate a zeroed object of a registered type. Every value field starts
    /// nil and counts are fitted to the space actually allocated. Tables and
    /// vtables are owned by the runtime and cannot be made this way.
    pub fn allocate(&mut self, size: usize, tag: TypeTag) -> Result<Value, RuntimeError> {
        self.vtable_of(tag)?;

        match tag.builtin() {
            Some(BuiltinType::Nil) | Some(BuiltinType::Boolean) => Err(err_type(&format!(
                "{} values are immediate",
                BUILTIN_NAMES[tag.index()]
            ))),
            Some(BuiltinType::Table) | Some(BuiltinType::VTable) => Err(err_type(&format!(
                "{} objects are built by the runtime",
                BUILTIN_NAMES[tag.index()]
            ))),
            _ => self.alloc(tag, sized_for(tag, size)),
        }
    }

    pub(crate) fn alloc(&mut self, tag: TypeTag, size: usize) -> Result<Value, RuntimeError> {
        let addr = self.heap.allocate(size, tag.as_word())?;
        Ok(Value::from_address(addr))
    }

    /// Tell the collector `holder` now refers to `referenced`. Stores made
    /// through the runtime already do this; code writing fields directly must
    /// call it after each store. This is a relocation point.
    pub fn write_barrier(&mut self, holder: Value, referenced: Value) -> Result<(), RuntimeError> {
        let addr = self.address(holder)?;
        self.heap.record(addr, referenced.as_word())?;
        Ok(())
    }

    /// The current address of the object `value` refers to
    pub(crate) fn address(&self, value: Value) -> Result<Address, RuntimeError> {
        value
            .address()
            .map(|addr| self.heap.resolve(addr))
            .ok_or_else(|| err_type(&format!("expected an object, found {}", value)))
    }

    /// As `address`, also checking the object's type
    pub(crate) fn address_of(
        &self,
        value: Value,
        builtin: BuiltinType,
    ) -> Result<Address, RuntimeError> {
        let addr = self.address(value)?;

        if self.heap.header(addr) == builtin as usize {
            Ok(addr)
        } else {
            Err(err_type(&format!(
                "expected {}, found {:?}",
                BUILTIN_NAMES[builtin as usize],
                self.kind_of(value)
            )))
        }
    }

    pub(crate) fn raw(&self, addr: Address, index: usize) -> usize {
        self.heap.word(addr, index)
    }

    pub(crate) fn set_raw(&mut self, addr: Address, index: usize, word: usize) {
        self.heap.set_word(addr, index, word)
    }

    pub(crate) fn load(&self, addr: Address, index: usize) -> Value {
        Value::from_word(self.heap.word(addr, index))
    }

    /// Store a value field and apply the write barrier. This is a relocation
    /// point.
    pub(crate) fn store(
        &mut self,
        addr: Address,
        index: usize,
        value: Value,
    ) -> Result<(), RuntimeError> {
        self.heap.set_word(addr, index, value.as_word());
        self.heap.record(addr, value.as_word())?;
        Ok(())
    }

    /// Copy `len` bytes out of an object, starting `offset` bytes past its header
    pub(crate) fn read_bytes(&self, addr: Address, offset: usize, len: usize) -> Vec<u8> {
        let object = self.heap.object(addr);

        (offset..offset + len)
            .map(|at| object[at / WORD_BYTES].to_ne_bytes()[at % WORD_BYTES])
            .collect()
    }

    pub(crate) fn write_bytes(&mut self, addr: Address, offset: usize, bytes: &[u8]) {
        let object = self.heap.object_mut(addr);

        for (i, byte) in bytes.iter().enumerate() {
            let at = offset + i;
            let word = &mut object[at / WORD_BYTES];
            let mut unpacked = word.to_ne_bytes();
            unpacked[at % WORD_BYTES] = *byte;
            *word = usize::from_ne_bytes(unpacked);
        }
    }

    /// Identity, looking through forwarding
    pub fn same(&self, a: Value, b: Value) -> bool {
        match (a.address(), b.address()) {
            (Some(x), Some(y)) => {
                a.is_weak_ref() == b.is_weak_ref() && self.heap.resolve(x) == self.heap.resolve(y)
            }
            _ => a == b,
        }
    }

    /// The type of any value
    pub fn kind_of(&self, value: Value) -> TypeTag {
        if value.is_nil() {
            BuiltinType::Nil.into()
        } else if value.is_number() {
            BuiltinType::Number.into()
        } else if value.is_bool() {
            BuiltinType::Boolean.into()
        } else if let Some(addr) = value.address() {
            TypeTag::new(self.heap.header(self.heap.resolve(addr)))
        } else {
            BuiltinType::Nil.into()
        }
    }

    /// Collect now. A minor collection empties the young space; a major one,
    /// run when `force_major` is set or the collector escalates, sizes the
    /// old generation to keep `min_free` more bytes free.
    pub fn collect(&mut self, min_free: usize, force_major: bool) -> Result<(), RuntimeError> {
        self.heap.collect(min_free, force_major)?;
        Ok(())
    }

    /// Collect before the next allocation
    pub fn request_collection(&mut self) {
        self.heap.request_collection()
    }

    pub fn gc_stats(&self) -> HeapStats {
        self.heap.stats()
    }
}
