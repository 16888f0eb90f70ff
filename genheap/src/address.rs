use std::fmt;

use crate::constants::{OFFSET_MASK, OLD_SPACES, SPACE_SHIFT, WORD_BYTES, YOUNG_SPACE};

/// An opaque handle to a heap slot: a space id in the high half of the word
/// and a byte offset into that space's block in the low half.
///
/// Addresses are word aligned and never zero, so they can share a word with
/// immediate values that use the low tag bits or the zero word.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(usize);

impl Address {
    pub(crate) fn new(space: u32, offset: usize) -> Address {
        debug_assert!(offset % WORD_BYTES == 0 && offset <= OFFSET_MASK);
        Address(((space as usize) << SPACE_SHIFT) | offset)
    }

    /// Reinterpret a word previously produced by `as_word()`
    pub(crate) fn from_raw(word: usize) -> Address {
        Address(word)
    }

    /// Interpret an untagged word as an address, if it could be one
    pub fn from_word(word: usize) -> Option<Address> {
        let space = (word >> SPACE_SHIFT) as u32;
        let valid_space = space == YOUNG_SPACE || OLD_SPACES.contains(&space);

        if valid_space && word % WORD_BYTES == 0 {
            Some(Address(word))
        } else {
            None
        }
    }

    pub fn as_word(self) -> usize {
        self.0
    }

    pub fn space(self) -> u32 {
        (self.0 >> SPACE_SHIFT) as u32
    }

    pub fn offset(self) -> usize {
        self.0 & OFFSET_MASK
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "@{}:{:#x}", self.space(), self.offset())
    }
}
