/// Tagged word values.
///
/// Every value is one machine word. Immediates are distinguished by their low
/// bits; anything else is a reference to a heap object whose low three bits
/// name the reference subclass.
use std::fmt;

use genheap::Address;

// Low-bit tags
pub const PRIMITIVE_MASK: usize = 0x7;
pub const REF_MASK: usize = !PRIMITIVE_MASK;
pub const TAG_NUMBER: usize = 0x1;
pub const TAG_BOOLEAN: usize = 0x2;
pub const TAG_WEAK: usize = 0x4;

const NIL_WORD: usize = 0x0;
const FALSE_WORD: usize = TAG_BOOLEAN;
const TRUE_WORD: usize = TAG_BOOLEAN | TAG_WEAK;

/// A tagged value
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Value(usize);

impl Value {
    pub const NIL: Value = Value(NIL_WORD);
    pub const FALSE: Value = Value(FALSE_WORD);
    pub const TRUE: Value = Value(TRUE_WORD);

    pub fn from_word(word: usize) -> Value {
        Value(word)
    }

    pub fn as_word(self) -> usize {
        self.0
    }

    /// Encode an integer. Values outside the 63-bit range are silently
    /// truncated.
    pub fn int(value: isize) -> Value {
        Value(((value as usize) << 1) | TAG_NUMBER)
    }

    pub fn bool(value: bool) -> Value {
        if value {
            Value::TRUE
        } else {
            Value::FALSE
        }
    }

    /// A plain reference to the object at `addr`
    pub fn from_address(addr: Address) -> Value {
        Value(addr.as_word())
    }

    /// A weak-ref tagged reference to the object at `addr`
    pub fn weak(addr: Address) -> Value {
        Value(addr.as_word() | TAG_WEAK)
    }

    pub fn is_nil(self) -> bool {
        self.0 == NIL_WORD
    }

    pub fn is_number(self) -> bool {
        self.0 & TAG_NUMBER == TAG_NUMBER
    }

    pub fn is_bool(self) -> bool {
        self.0 & (TAG_NUMBER | TAG_BOOLEAN) == TAG_BOOLEAN
    }

    pub fn is_ref(self) -> bool {
        self.0 != NIL_WORD && self.0 & (TAG_NUMBER | TAG_BOOLEAN) == 0
    }

    pub fn is_weak_ref(self) -> bool {
        self.is_ref() && self.0 & TAG_WEAK == TAG_WEAK
    }

    /// Everything except nil and false is true
    pub fn truthy(self) -> bool {
        self.0 != NIL_WORD && self.0 != FALSE_WORD
    }

    pub fn as_int(self) -> Option<isize> {
        if self.is_number() {
            Some((self.0 as isize) >> 1)
        } else {
            None
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        if self.is_bool() {
            Some(self.0 == TRUE_WORD)
        } else {
            None
        }
    }

    /// The address this value refers to, ignoring the reference subclass
    pub fn address(self) -> Option<Address> {
        if self.is_ref() {
            Address::from_word(self.0 & REF_MASK)
        } else {
            None
        }
    }

    /// This reference pointed at `to`, keeping its reference subclass
    pub fn retarget(self, to: Address) -> Value {
        Value(to.as_word() | (self.0 & PRIMITIVE_MASK))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_nil() {
            write!(f, "nil")
        } else if let Some(b) = self.as_bool() {
            write!(f, "{}", b)
        } else if let Some(i) = self.as_int() {
            write!(f, "{}", i)
        } else if let Some(addr) = self.address() {
            write!(f, "<object {:?}>", addr)
        } else {
            write!(f, "<invalid {:#x}>", self.0)
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_weak_ref() {
            write!(f, "weak {}", self)
        } else {
            write!(f, "{}", self)
        }
    }
}
