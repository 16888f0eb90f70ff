/// Closures over native entry points, their call frames, and protos, the
/// containers a front end compiles a unit of code into.
use genheap::{Root, WORD_BYTES};

use crate::error::{err_bounds, err_type, RuntimeError};
use crate::headers::BuiltinType;
use crate::layout::{closure, proto};
use crate::runtime::Interpreter;
use crate::value::Value;

/// A native method body
pub type NativeFn = fn(&mut Interpreter, &CallFrame) -> Result<Value, RuntimeError>;

/// A registered native entry point
#[derive(Clone)]
pub struct Native {
    pub name: &'static str,
    pub entry: NativeFn,
}

/// The rooted closure, receiver and arguments of a native call
pub struct CallFrame {
    closure: Root,
    receiver: Root,
    args: Vec<Root>,
}

impl CallFrame {
    pub fn closure(&self, interp: &Interpreter) -> Value {
        interp.value(self.closure)
    }

    pub fn receiver(&self, interp: &Interpreter) -> Value {
        interp.value(self.receiver)
    }

    /// The root holding the receiver, for natives that relocate it
    pub fn receiver_root(&self) -> Root {
        self.receiver
    }

    /// Argument `index`, or nil if it was not passed
    pub fn arg(&self, interp: &Interpreter, index: usize) -> Value {
        self.args
            .get(index)
            .map_or(Value::NIL, |root| interp.value(*root))
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }
}

/// The value fields of a proto
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ProtoField {
    Source,
    Sig,
    Stack,
    Locals,
    Upvals,
    Values,
    Protos,
    Asm,
}

impl ProtoField {
    fn index(self) -> usize {
        match self {
            ProtoField::Source => proto::SOURCE,
            ProtoField::Sig => proto::SIG,
            ProtoField::Stack => proto::STACK,
            ProtoField::Locals => proto::LOCALS,
            ProtoField::Upvals => proto::UPVALS,
            ProtoField::Values => proto::VALUES,
            ProtoField::Protos => proto::PROTOS,
            ProtoField::Asm => proto::ASM,
        }
    }
}

impl Interpreter {
    /// Register a native entry point, returning its id. Registering the same
    /// entry under the same name again returns the existing id.
    pub fn register_native(&mut self, name: &'static str, entry: NativeFn) -> usize {
        let existing = self
            .natives
            .iter()
            .position(|native| native.name == name && native.entry as usize == entry as usize);

        match existing {
            Some(id) => id,
            None => {
                self.natives.push(Native { name, entry });
                self.natives.len() - 1
            }
        }
    }

    /// A closure over a native entry with `upvalues` nil upvalue slots
    pub fn closure_new(
        &mut self,
        name: &'static str,
        entry: NativeFn,
        sig: Value,
        upvalues: usize,
    ) -> Result<Value, RuntimeError> {
        self.scope(|interp| {
            let sig = interp.push_root(sig);
            let id = interp.register_native(name, entry);

            let value = interp.alloc(
                BuiltinType::Closure.into(),
                (closure::UPVALUES + upvalues) * WORD_BYTES,
            )?;
            let addr = interp.address(value)?;
            interp.set_raw(addr, closure::NATIVE, id);
            interp.set_raw(addr, closure::UPVALUE_COUNT, upvalues);

            let sig = interp.value(sig);
            interp.store(addr, closure::SIG, sig)?;
            Ok(value)
        })
    }

    /// The native a closure runs
    pub fn closure_native(&self, closure: Value) -> Result<&Native, RuntimeError> {
        let addr = self.address_of(closure, BuiltinType::Closure)?;
        self.natives
            .get(self.raw(addr, closure::NATIVE))
            .ok_or_else(|| err_type("closure refers to an unregistered native"))
    }

    pub fn closure_upvalue(&self, closure: Value, index: usize) -> Result<Value, RuntimeError> {
        let addr = self.address_of(closure, BuiltinType::Closure)?;

        if index < self.raw(addr, closure::UPVALUE_COUNT) {
            Ok(self.load(addr, closure::UPVALUES + index))
        } else {
            Err(err_bounds())
        }
    }

    pub fn closure_set_upvalue(
        &mut self,
        closure: Value,
        index: usize,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let addr = self.address_of(closure, BuiltinType::Closure)?;

        if index < self.raw(addr, closure::UPVALUE_COUNT) {
            self.store(addr, closure::UPVALUES + index, value)
        } else {
            Err(err_bounds())
        }
    }

    /// Invoke a closure's native entry
    pub fn call(
        &mut self,
        closure: Value,
        receiver: Value,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        let entry = self.closure_native(closure)?.entry;

        self.scope(|interp| {
            let frame = CallFrame {
                closure: interp.push_root(closure),
                receiver: interp.push_root(receiver),
                args: args.iter().map(|arg| interp.push_root(*arg)).collect(),
            };

            entry(interp, &frame)
        })
    }

    /// A proto for the given source, every other field nil
    pub fn proto_new(&mut self, source: Value) -> Result<Value, RuntimeError> {
        self.scope(|interp| {
            let source = interp.push_root(source);

            let value = interp.alloc(BuiltinType::Proto.into(), proto::WORDS * WORD_BYTES)?;
            let addr = interp.address(value)?;

            let source = interp.value(source);
            interp.store(addr, proto::SOURCE, source)?;
            Ok(value)
        })
    }

    pub fn proto_field(&self, proto: Value, field: ProtoField) -> Result<Value, RuntimeError> {
        let addr = self.address_of(proto, BuiltinType::Proto)?;
        Ok(self.load(addr, field.index()))
    }

    /// Set a value field of a proto. This is a relocation point.
    pub fn proto_set(
        &mut self,
        proto: Value,
        field: ProtoField,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let addr = self.address_of(proto, BuiltinType::Proto)?;
        self.store(addr, field.index(), value)
    }

    /// The (local count, upvalue count) of a proto
    pub fn proto_sizes(&self, proto: Value) -> Result<(usize, usize), RuntimeError> {
        let addr = self.address_of(proto, BuiltinType::Proto)?;
        Ok((
            self.raw(addr, proto::LOCAL_SIZE),
            self.raw(addr, proto::UPVAL_SIZE),
        ))
    }

    pub fn proto_set_sizes(
        &mut self,
        proto: Value,
        locals: usize,
        upvals: usize,
    ) -> Result<(), RuntimeError> {
        let addr = self.address_of(proto, BuiltinType::Proto)?;
        self.set_raw(addr, proto::LOCAL_SIZE, locals);
        self.set_raw(addr, proto::UPVAL_SIZE, upvals);
        Ok(())
    }
}
