//! A minimal object model for exercising the heap.
//!
//! Nodes are `[tag, capacity, fields...]` with every field traced. Leaves are
//! `[tag, size, bytes...]` and hold no references.
use crate::address::Address;
use crate::allocator::{ObjectModel, Word};
use crate::heap::Heap;

pub const NODE: Word = 1;
pub const LEAF: Word = 2;

pub struct TestModel;

impl ObjectModel for TestModel {
    fn reference(&self, word: Word) -> Option<Address> {
        if word & 7 == 0 {
            Address::from_word(word)
        } else {
            None
        }
    }

    fn retarget(&self, _word: Word, to: Address) -> Word {
        to.as_word()
    }

    fn size_of(&self, object: &[Word]) -> usize {
        match object[0] {
            NODE => 16 + 8 * object[1],
            LEAF => object[1],
            tag => panic!("unknown test tag {}", tag),
        }
    }

    fn trace(&self, object: &[Word], visit: &mut dyn FnMut(usize)) {
        if object[0] == NODE {
            for index in 2..2 + object[1] {
                visit(index);
            }
        }
    }

    fn fit(&self, object: &mut [Word], alloc_size: usize) {
        if object[0] == NODE {
            object[1] = (alloc_size - 16) / 8;
        } else {
            object[1] = alloc_size;
        }
    }
}

pub fn int(value: usize) -> Word {
    (value << 1) | 1
}

pub fn node(heap: &mut Heap<TestModel>, fields: usize) -> Address {
    heap.allocate(16 + 8 * fields, NODE).unwrap()
}

pub fn leaf(heap: &mut Heap<TestModel>) -> Address {
    heap.allocate(24, LEAF).unwrap()
}
