/// Boot: register the builtin types, create the lobby and bind the core
/// native methods.
use crate::error::RuntimeError;
use crate::function::CallFrame;
use crate::headers::{BuiltinType, TypeTag, BUILTIN_COUNT, BUILTIN_NAMES};
use crate::runtime::Interpreter;
use crate::value::Value;

const LOBBY_SLOTS: usize = 4;

fn usize_value(n: usize) -> Value {
    Value::int(n as isize)
}

fn object_kind(interp: &mut Interpreter, frame: &CallFrame) -> Result<Value, RuntimeError> {
    let receiver = frame.receiver(interp);
    interp.vtable_of(interp.kind_of(receiver))
}

fn object_is_nil(_interp: &mut Interpreter, _frame: &CallFrame) -> Result<Value, RuntimeError> {
    Ok(Value::FALSE)
}

fn nil_is_nil(_interp: &mut Interpreter, _frame: &CallFrame) -> Result<Value, RuntimeError> {
    Ok(Value::TRUE)
}

fn tuple_length(interp: &mut Interpreter, frame: &CallFrame) -> Result<Value, RuntimeError> {
    let receiver = frame.receiver(interp);
    interp.tuple_len(receiver).map(usize_value)
}

fn tuple_at(interp: &mut Interpreter, frame: &CallFrame) -> Result<Value, RuntimeError> {
    let receiver = frame.receiver(interp);

    match frame.arg(interp, 0).as_int() {
        Some(index) if index >= 0 => interp.tuple_at(receiver, index as usize),
        _ => Ok(Value::NIL),
    }
}

fn tuple_push(interp: &mut Interpreter, frame: &CallFrame) -> Result<Value, RuntimeError> {
    let item = frame.arg(interp, 0);
    interp.tuple_push(frame.receiver_root(), item)
}

fn string_length(interp: &mut Interpreter, frame: &CallFrame) -> Result<Value, RuntimeError> {
    let receiver = frame.receiver(interp);
    interp.string_len(receiver).map(usize_value)
}

fn gc_fixed(interp: &mut Interpreter, _frame: &CallFrame) -> Result<Value, RuntimeError> {
    Ok(usize_value(interp.gc_stats().fixed))
}

fn gc_actual(interp: &mut Interpreter, _frame: &CallFrame) -> Result<Value, RuntimeError> {
    Ok(usize_value(interp.gc_stats().actual))
}

fn gc_reserved(interp: &mut Interpreter, _frame: &CallFrame) -> Result<Value, RuntimeError> {
    Ok(usize_value(interp.gc_stats().reserved))
}

fn collect(interp: &mut Interpreter, frame: &CallFrame) -> Result<Value, RuntimeError> {
    let major = frame.arg(interp, 0).truthy();
    interp.collect(0, major)?;
    Ok(Value::NIL)
}

impl Interpreter {
    pub(crate) fn boot(&mut self) -> Result<(), RuntimeError> {
        self.registry_new()?;

        // Object does not exist yet, so every builtin starts without a
        // parent and is linked to Object afterwards
        for name in BUILTIN_NAMES.iter() {
            self.register_with(Value::NIL, name)?;
        }

        let object = TypeTag::from(BuiltinType::Object);
        for index in (0..BUILTIN_COUNT).filter(|index| *index != object.index()) {
            self.set_type_parent(TypeTag::new(index), Some(object))?;
        }

        let lobby = self.object_new(BuiltinType::Lobby.into(), LOBBY_SLOTS)?;
        self.set_value(self.lobby, lobby);

        self.def_native(object, "kind", object_kind)?;
        self.def_native(object, "nil?", object_is_nil)?;
        self.def_native(BuiltinType::Nil.into(), "nil?", nil_is_nil)?;

        let tuple = TypeTag::from(BuiltinType::Tuple);
        self.def_native(tuple, "length", tuple_length)?;
        self.def_native(tuple, "at", tuple_at)?;
        self.def_native(tuple, "push", tuple_push)?;

        self.def_native(BuiltinType::String.into(), "length", string_length)?;
        self.def_native(BuiltinType::Bytes.into(), "length", string_length)?;

        let lobby = TypeTag::from(BuiltinType::Lobby);
        self.def_native(lobby, "gc_fixed", gc_fixed)?;
        self.def_native(lobby, "gc_actual", gc_actual)?;
        self.def_native(lobby, "gc_reserved", gc_reserved)?;
        self.def_native(lobby, "collect", collect)?;

        Ok(())
    }
}
