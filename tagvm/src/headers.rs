/// Type tags: the first word of every heap object, and the index of the
/// type's vtable in the registry.
use std::fmt;

use num_traits::FromPrimitive;

/// The builtin types, registered in this order at boot
#[repr(usize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum BuiltinType {
    Nil,
    Number,
    Boolean,
    String,
    WeakRef,
    Closure,
    Tuple,
    State,
    File,
    Object,
    VTable,
    Source,
    Bytes,
    Proto,
    Lobby,
    Table,
    Flex,
    Data,
}

/// Number of builtin types; user types are tagged from here on
pub const BUILTIN_COUNT: usize = 18;

pub const BUILTIN_NAMES: [&str; BUILTIN_COUNT] = [
    "NilKind", "Number", "Boolean", "String", "WeakRef", "Closure", "Tuple", "State", "File",
    "Object", "VTable", "Source", "Bytes", "Proto", "Lobby", "Table", "Flex", "Data",
];

/// A dense, never reused type identifier
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(usize);

impl TypeTag {
    pub fn new(index: usize) -> TypeTag {
        TypeTag(index)
    }

    pub fn index(self) -> usize {
        self.0
    }

    /// The header word objects of this type carry
    pub fn as_word(self) -> usize {
        self.0
    }

    pub fn builtin(self) -> Option<BuiltinType> {
        BuiltinType::from_usize(self.0)
    }

    pub fn is_user(self) -> bool {
        self.0 >= BUILTIN_COUNT
    }
}

impl From<BuiltinType> for TypeTag {
    fn from(builtin: BuiltinType) -> TypeTag {
        TypeTag(builtin as usize)
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.builtin() {
            Some(builtin) => write!(f, "{:?}", builtin),
            None => write!(f, "TypeTag({})", self.0),
        }
    }
}
