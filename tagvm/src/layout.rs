/// Word layouts of every heap object kind, and the `ObjectModel` the
/// collector uses to size, trace and fit them.
///
/// Word 0 of every object is its type tag. The indices below name the
/// payload words that follow.
use genheap::{Address, ObjectModel, Word, WORD_BYTES};

use crate::headers::{BuiltinType, TypeTag};
use crate::value::Value;

pub mod string {
    pub const LEN: usize = 1;
    pub const ID: usize = 2;
    pub const BYTES: usize = 3;
}

pub mod bytes {
    pub const LEN: usize = 1;
    pub const CAPACITY: usize = 2;
    pub const BYTES: usize = 3;
}

pub mod data {
    pub const LEN: usize = 1;
    pub const BYTES: usize = 2;
}

pub mod decimal {
    pub const SIGN: usize = 1;
    pub const DIGIT_COUNT: usize = 2;
    pub const DIGITS: usize = 3;
}

pub mod weak {
    pub const DATA: usize = 1;
    pub const WORDS: usize = 2;
}

pub mod file {
    pub const FD: usize = 1;
    pub const PATH: usize = 2;
    pub const MODE: usize = 3;
    pub const WORDS: usize = 4;
}

pub mod closure {
    pub const NATIVE: usize = 1;
    pub const SIG: usize = 2;
    pub const UPVALUE_COUNT: usize = 3;
    pub const UPVALUES: usize = 4;
}

pub mod proto {
    pub const SOURCE: usize = 1;
    pub const SIG: usize = 2;
    pub const STACK: usize = 3;
    pub const LOCALS: usize = 4;
    pub const UPVALS: usize = 5;
    pub const VALUES: usize = 6;
    pub const PROTOS: usize = 7;
    pub const LOCAL_SIZE: usize = 8;
    pub const UPVAL_SIZE: usize = 9;
    pub const ASM: usize = 10;
    pub const WORDS: usize = 11;
}

pub mod tuple {
    pub const LEN: usize = 1;
    pub const CAPACITY: usize = 2;
    pub const ITEMS: usize = 3;
}

pub mod flex {
    pub const CAPACITY: usize = 1;
    pub const LEN: usize = 2;
    pub const KIND: usize = 3;
    pub const DATA: usize = 4;

    pub const KIND_BYTES: usize = 0;
    pub const KIND_VALUES: usize = 1;
}

pub mod table {
    pub const LEN: usize = 1;
    pub const CAPACITY: usize = 2;
    pub const PAIRS: usize = 3;
}

pub mod vtable {
    pub const TAG: usize = 1;
    pub const METHODS: usize = 2;
    pub const PARENT: usize = 3;
    pub const NAME: usize = 4;
    pub const WORDS: usize = 5;
}

/// Objects, the lobby, states, sources and user types: a counted run of slots
pub mod slots {
    pub const COUNT: usize = 1;
    pub const SLOTS: usize = 2;
}

fn words(count: usize) -> usize {
    count * WORD_BYTES
}

fn flex_element_size(kind: Word) -> usize {
    if kind == flex::KIND_VALUES {
        WORD_BYTES
    } else {
        1
    }
}

/// Byte size of a flex of the given kind holding `capacity` elements
pub fn flex_size(kind: Word, capacity: usize) -> usize {
    words(flex::DATA) + capacity * flex_element_size(kind)
}

/// Element capacity of a flex of the given kind in `alloc_size` bytes
pub fn flex_capacity(kind: Word, alloc_size: usize) -> usize {
    (alloc_size - words(flex::DATA)) / flex_element_size(kind)
}

/// The byte size to allocate for a `tag` object when `requested` bytes were
/// asked for. Fixed-size kinds always get their own size and every other
/// kind gets at least its header.
pub fn sized_for(tag: TypeTag, requested: usize) -> usize {
    use BuiltinType::*;

    let at_least = |header_words: usize| requested.max(words(header_words));

    match tag.builtin() {
        Some(WeakRef) => words(weak::WORDS),
        Some(File) => words(file::WORDS),
        Some(Proto) => words(proto::WORDS),
        Some(VTable) => words(vtable::WORDS),
        Some(Number) => at_least(decimal::DIGITS),
        Some(String) => at_least(string::BYTES),
        Some(Bytes) => at_least(bytes::BYTES),
        Some(Data) => at_least(data::BYTES),
        Some(Closure) => at_least(closure::UPVALUES),
        Some(Tuple) => at_least(tuple::ITEMS),
        Some(Flex) => at_least(flex::DATA),
        Some(Table) => at_least(table::PAIRS),
        Some(Object) | Some(Lobby) | Some(State) | Some(Source) | None => at_least(slots::SLOTS),
        Some(Nil) | Some(Boolean) => requested,
    }
}

/// The object model shared by every interpreter heap
pub struct Layout;

impl ObjectModel for Layout {
    fn reference(&self, word: Word) -> Option<Address> {
        Value::from_word(word).address()
    }

    fn retarget(&self, word: Word, to: Address) -> Word {
        Value::from_word(word).retarget(to).as_word()
    }

    fn size_of(&self, object: &[Word]) -> usize {
        use BuiltinType::*;

        match TypeTag::new(object[0]).builtin() {
            Some(Number) => words(decimal::DIGITS + object[decimal::DIGIT_COUNT]),
            Some(String) => words(string::BYTES) + object[string::LEN],
            Some(Bytes) => words(bytes::BYTES) + object[bytes::CAPACITY],
            Some(Data) => words(data::BYTES) + object[data::LEN],
            Some(WeakRef) => words(weak::WORDS),
            Some(File) => words(file::WORDS),
            Some(Closure) => words(closure::UPVALUES + object[closure::UPVALUE_COUNT]),
            Some(Proto) => words(proto::WORDS),
            Some(Tuple) => words(tuple::ITEMS + object[tuple::CAPACITY]),
            Some(Flex) => flex_size(object[flex::KIND], object[flex::CAPACITY]),
            Some(Table) => words(table::PAIRS + 2 * object[table::CAPACITY]),
            Some(VTable) => words(vtable::WORDS),
            Some(Object) | Some(Lobby) | Some(State) | Some(Source) | None => {
                words(slots::SLOTS + object[slots::COUNT])
            }
            Some(Nil) | Some(Boolean) => panic!("corrupt object header {}", object[0]),
        }
    }

    fn trace(&self, object: &[Word], visit: &mut dyn FnMut(usize)) {
        use BuiltinType::*;

        let mut range = |from: usize, count: usize| {
            for index in from..from + count {
                visit(index);
            }
        };

        match TypeTag::new(object[0]).builtin() {
            Some(Number) | Some(String) | Some(Bytes) | Some(Data) => (),
            Some(WeakRef) => range(weak::DATA, 1),
            Some(File) => range(file::PATH, 2),
            Some(Closure) => {
                range(closure::SIG, 1);
                range(closure::UPVALUES, object[closure::UPVALUE_COUNT]);
            }
            Some(Proto) => {
                range(proto::SOURCE, proto::PROTOS - proto::SOURCE + 1);
                range(proto::ASM, 1);
            }
            Some(Tuple) => range(tuple::ITEMS, object[tuple::LEN]),
            Some(Flex) => {
                if object[flex::KIND] == flex::KIND_VALUES {
                    range(flex::DATA, object[flex::LEN]);
                }
            }
            Some(Table) => range(table::PAIRS, 2 * object[table::CAPACITY]),
            Some(VTable) => range(vtable::METHODS, 3),
            Some(Object) | Some(Lobby) | Some(State) | Some(Source) | None => {
                range(slots::SLOTS, object[slots::COUNT])
            }
            Some(Nil) | Some(Boolean) => panic!("corrupt object header {}", object[0]),
        }
    }

    fn fit(&self, object: &mut [Word], alloc_size: usize) {
        use BuiltinType::*;

        let spare = |header_words: usize| (alloc_size - words(header_words)) / WORD_BYTES;

        match TypeTag::new(object[0]).builtin() {
            Some(Number) => object[decimal::DIGIT_COUNT] = spare(decimal::DIGITS),
            Some(String) => object[string::LEN] = alloc_size - words(string::BYTES),
            Some(Bytes) => object[bytes::CAPACITY] = alloc_size - words(bytes::BYTES),
            Some(Data) => object[data::LEN] = alloc_size - words(data::BYTES),
            Some(Closure) => object[closure::UPVALUE_COUNT] = spare(closure::UPVALUES),
            Some(Tuple) => object[tuple::CAPACITY] = spare(tuple::ITEMS),
            Some(Flex) => {
                object[flex::CAPACITY] = flex_capacity(object[flex::KIND], alloc_size)
            }
            Some(Table) => object[table::CAPACITY] = spare(table::PAIRS) / 2,
            Some(Object) | Some(Lobby) | Some(State) | Some(Source) | None => {
                object[slots::COUNT] = spare(slots::SLOTS)
            }
            Some(WeakRef) | Some(File) | Some(Proto) | Some(VTable) => (),
            Some(Nil) | Some(Boolean) => panic!("corrupt object header {}", object[0]),
        }
    }
}
