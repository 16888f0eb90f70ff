use blockalloc::Block;

use crate::address::Address;
use crate::allocator::{AllocError, Word};
use crate::constants::WORD_BYTES;

/// A contiguous space of heap, bump allocated upward from offset zero.
/// The cursor is the byte offset of the next free word.
pub struct Region {
    block: Block,
    space: u32,
    cursor: usize,
}

impl Region {
    pub fn new(space: u32, size: usize) -> Result<Region, AllocError> {
        Ok(Region {
            block: Block::new(size)?,
            space,
            cursor: 0,
        })
    }

    pub fn space(&self) -> u32 {
        self.space
    }

    pub fn capacity(&self) -> usize {
        self.block.size()
    }

    pub fn used(&self) -> usize {
        self.cursor
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.cursor
    }

    /// True if `addr` lies in the allocated part of this region
    pub fn contains(&self, addr: Address) -> bool {
        addr.space() == self.space && addr.offset() < self.cursor
    }

    /// Claim `size` bytes, zero filled. `size` must already be aligned.
    pub fn bump(&mut self, size: usize) -> Option<Address> {
        let offset = self.cursor;
        let next = offset.checked_add(size)?;

        if next > self.capacity() {
            return None;
        }

        self.block.zero(offset, size);
        self.cursor = next;
        Some(Address::new(self.space, offset))
    }

    /// Forget every allocation
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn word(&self, addr: Address, index: usize) -> Word {
        self.block.word(addr.offset() + index * WORD_BYTES)
    }

    pub fn set_word(&mut self, addr: Address, index: usize, value: Word) {
        self.block.set_word(addr.offset() + index * WORD_BYTES, value)
    }

    /// Read a word by byte offset, for bookkeeping stored outside objects
    pub fn raw_word(&self, offset: usize) -> Word {
        self.block.word(offset)
    }

    pub fn set_raw_word(&mut self, offset: usize, value: Word) {
        self.block.set_word(offset, value)
    }

    /// The `count` words of the object at `addr`
    pub fn object(&self, addr: Address, count: usize) -> &[Word] {
        self.block.words(addr.offset(), count)
    }

    pub fn object_mut(&mut self, addr: Address, count: usize) -> &mut [Word] {
        self.block.words_mut(addr.offset(), count)
    }

    /// Every word from `addr` to the end of the allocated part of the region
    pub fn tail(&self, addr: Address) -> &[Word] {
        let count = self.cursor.saturating_sub(addr.offset()) / WORD_BYTES;
        self.block.words(addr.offset(), count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::YOUNG_SPACE;

    #[test]
    fn test_bump_until_full() {
        let mut region = Region::new(YOUNG_SPACE, 4096).unwrap();

        let mut count = 0;
        while let Some(addr) = region.bump(32) {
            assert!(region.contains(addr));
            assert!(region.word(addr, 0) == 0);
            region.set_word(addr, 0, count);
            count += 1;
        }

        assert!(count == 4096 / 32);
        assert!(region.free() == 0);
    }

    #[test]
    fn test_reset_rezeroes_on_reuse() {
        let mut region = Region::new(YOUNG_SPACE, 4096).unwrap();

        let first = region.bump(24).unwrap();
        region.set_word(first, 1, 99);
        region.reset();

        let again = region.bump(24).unwrap();
        assert!(again == first);
        assert!(region.word(again, 1) == 0);
        assert!(!region.contains(Address::new(YOUNG_SPACE, 24)));
    }
}
