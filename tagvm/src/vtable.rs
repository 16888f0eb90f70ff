/// The type registry: a value flex indexed by type tag, holding one vtable
/// per registered type. A vtable carries its tag, its method table, the
/// vtable it delegates to and the type's name. Tags are dense and never
/// reused; the registry only grows.
use tracing::trace;

use genheap::WORD_BYTES;

use crate::error::{ErrorKind, RuntimeError};
use crate::flex::{FlexKind, Width};
use crate::function::NativeFn;
use crate::headers::{BuiltinType, TypeTag};
use crate::layout::vtable;
use crate::runtime::Interpreter;
use crate::table::TABLE_MIN_CAPACITY;
use crate::value::Value;

/// Initial registry capacity, enough for the builtins and a few user types
pub const REGISTRY_CAPACITY: usize = 32;

impl Interpreter {
    /// Register a new type delegating to `parent`, or to Object if none is
    /// given
    pub fn register_type(&mut self, parent: Option<TypeTag>) -> Result<TypeTag, RuntimeError> {
        self.register_type_named(parent, "")
    }

    pub fn register_type_named(
        &mut self,
        parent: Option<TypeTag>,
        name: &str,
    ) -> Result<TypeTag, RuntimeError> {
        let parent = parent.unwrap_or_else(|| BuiltinType::Object.into());
        let parent = self.vtable_of(parent)?;
        self.register_with(parent, name)
    }

    pub(crate) fn registry_new(&mut self) -> Result<(), RuntimeError> {
        let registry = self.flex_new(FlexKind::Values, REGISTRY_CAPACITY)?;
        self.set_value(self.registry, registry);
        Ok(())
    }

    /// Append a fresh vtable to the registry. `parent` is a vtable or nil.
    pub(crate) fn register_with(
        &mut self,
        parent: Value,
        name: &str,
    ) -> Result<TypeTag, RuntimeError> {
        self.scope(|interp| {
            let parent = interp.push_root(parent);

            let name = if name.is_empty() {
                Value::NIL
            } else {
                interp.intern(name)?
            };
            let name = interp.push_root(name);

            let methods = interp.table_new(TABLE_MIN_CAPACITY)?;
            let methods = interp.push_root(methods);

            let vt = interp.alloc(BuiltinType::VTable.into(), vtable::WORDS * WORD_BYTES)?;
            let vt = interp.push_root(vt);

            let tag = interp.type_count()?;
            let addr = interp.address(interp.value(vt))?;
            interp.set_raw(addr, vtable::TAG, tag);
            interp.store(addr, vtable::METHODS, interp.value(methods))?;
            interp.store(addr, vtable::PARENT, interp.value(parent))?;
            interp.store(addr, vtable::NAME, interp.value(name))?;

            interp.flex_append(interp.registry, interp.value(vt), Width::Word)?;

            trace!(target: "tagvm", tag, "type registered");
            Ok(TypeTag::new(tag))
        })
    }

    /// Number of registered types, the next tag to be handed out
    pub fn type_count(&self) -> Result<usize, RuntimeError> {
        self.flex_len(self.value(self.registry))
    }

    pub fn vtable_of(&self, tag: TypeTag) -> Result<Value, RuntimeError> {
        if tag.index() < self.type_count()? {
            self.flex_value(self.value(self.registry), tag.index())
        } else {
            Err(RuntimeError::new(ErrorKind::UnknownType(tag.index())))
        }
    }

    /// The tag a vtable was registered under
    pub fn vtable_tag(&self, vt: Value) -> Result<TypeTag, RuntimeError> {
        let addr = self.address_of(vt, BuiltinType::VTable)?;
        Ok(TypeTag::new(self.raw(addr, vtable::TAG)))
    }

    pub(crate) fn vtable_methods(&self, vt: Value) -> Result<Value, RuntimeError> {
        let addr = self.address_of(vt, BuiltinType::VTable)?;
        Ok(self.load(addr, vtable::METHODS))
    }

    pub(crate) fn vtable_parent(&self, vt: Value) -> Result<Value, RuntimeError> {
        let addr = self.address_of(vt, BuiltinType::VTable)?;
        Ok(self.load(addr, vtable::PARENT))
    }

    /// The type `tag` delegates to, if any
    pub fn type_parent(&self, tag: TypeTag) -> Result<Option<TypeTag>, RuntimeError> {
        let parent = self.vtable_parent(self.vtable_of(tag)?)?;

        if parent.is_nil() {
            Ok(None)
        } else {
            self.vtable_tag(parent).map(Some)
        }
    }

    /// Change or clear the type `tag` delegates to
    pub fn set_type_parent(
        &mut self,
        tag: TypeTag,
        parent: Option<TypeTag>,
    ) -> Result<(), RuntimeError> {
        let parent = match parent {
            Some(parent) => self.vtable_of(parent)?,
            None => Value::NIL,
        };

        let addr = self.address(self.vtable_of(tag)?)?;
        self.store(addr, vtable::PARENT, parent)?;
        self.caches.clear();
        Ok(())
    }

    pub fn type_name(&self, tag: TypeTag) -> Result<String, RuntimeError> {
        let addr = self.address(self.vtable_of(tag)?)?;
        let name = self.load(addr, vtable::NAME);

        if name.is_nil() {
            Ok(format!("Type{}", tag.index()))
        } else {
            self.string_text(name)
        }
    }

    /// Bind `name` to `closure` in the method table of type `tag`. Every call
    /// site cache is dropped so no site keeps serving a replaced method.
    pub fn def_method(
        &mut self,
        tag: TypeTag,
        name: &str,
        closure: Value,
    ) -> Result<(), RuntimeError> {
        self.scope(|interp| {
            let closure = interp.push_root(closure);
            let key = interp.intern(name)?;

            let vt = interp.vtable_of(tag)?;
            let vt = interp.push_root(vt);
            let methods = interp.vtable_methods(interp.value(vt))?;
            let methods = interp.push_root(methods);

            let methods = interp.table_put(methods, key, interp.value(closure))?;

            let addr = interp.address(interp.value(vt))?;
            interp.store(addr, vtable::METHODS, methods)?;

            interp.caches.clear();
            trace!(target: "tagvm", tag = tag.index(), name, "method defined");
            Ok(())
        })
    }

    /// Define a method whose body is a native entry
    pub fn def_native(
        &mut self,
        tag: TypeTag,
        name: &'static str,
        entry: NativeFn,
    ) -> Result<(), RuntimeError> {
        let closure = self.closure_new(name, entry, Value::NIL, 0)?;
        self.def_method(tag, name, closure)
    }

    /// Names bound directly on type `tag`, sorted
    pub fn method_names(&self, tag: TypeTag) -> Result<Vec<String>, RuntimeError> {
        let methods = self.vtable_methods(self.vtable_of(tag)?)?;

        let mut names = self
            .table_entries(methods)?
            .into_iter()
            .map(|(key, _)| self.string_text(key))
            .collect::<Result<Vec<String>, RuntimeError>>()?;
        names.sort();
        Ok(names)
    }
}
