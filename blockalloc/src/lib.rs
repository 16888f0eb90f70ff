/// A block allocator for the regions of a managed heap. Blocks are:
///  - powers of two in size
///  - aligned to their size
///  - zero filled when handed out
///
/// Internally this calls the stabilized std Alloc API.
/// https://doc.rust-lang.org/std/alloc/index.html
///
/// Usage:
/// ```
/// extern crate blockalloc;
/// use blockalloc::Block;
///
/// let size = 4096;  // must be a power of 2
/// let block = Block::new(size).unwrap();
/// assert!(block.word(0) == 0);
/// ```
///
/// Normal scoping rules will call Block::drop() when `block` goes out of scope
/// causing the block to be fully deallocated.
use std::ptr::NonNull;

pub type BlockPtr = NonNull<u8>;
pub type BlockSize = usize;

/// Size in bytes of the words a block is addressed in
pub const WORD_BYTES: usize = std::mem::size_of::<usize>();

/// Set of possible block allocation failures
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BlockError {
    /// Usually means requested block size, and therefore alignment, wasn't a
    /// power of two
    BadRequest,
    /// Insufficient memory, couldn't allocate a block
    OOM,
}

/// A block-size-aligned, zero-initialized block of memory
pub struct Block {
    ptr: BlockPtr,
    size: BlockSize,
}

impl Block {
    /// Instantiate a new block of the given size. Size must be a power of two
    /// and at least one word.
    pub fn new(size: BlockSize) -> Result<Block, BlockError> {
        if size < WORD_BYTES || !size.is_power_of_two() {
            return Err(BlockError::BadRequest);
        }

        Ok(Block {
            ptr: internal::alloc_block(size)?,
            size,
        })
    }

    /// Return the size in bytes of the block
    pub fn size(&self) -> BlockSize {
        self.size
    }

    /// Read the word at the given byte offset. The offset must be word aligned.
    pub fn word(&self, offset: usize) -> usize {
        assert!(offset % WORD_BYTES == 0 && offset + WORD_BYTES <= self.size);
        unsafe { *(self.ptr.as_ptr().add(offset) as *const usize) }
    }

    /// Write the word at the given byte offset. The offset must be word aligned.
    pub fn set_word(&mut self, offset: usize, value: usize) {
        assert!(offset % WORD_BYTES == 0 && offset + WORD_BYTES <= self.size);
        unsafe { *(self.ptr.as_ptr().add(offset) as *mut usize) = value }
    }

    /// Borrow `count` words starting at the given byte offset
    pub fn words(&self, offset: usize, count: usize) -> &[usize] {
        assert!(offset % WORD_BYTES == 0 && offset + count * WORD_BYTES <= self.size);
        unsafe {
            std::slice::from_raw_parts(self.ptr.as_ptr().add(offset) as *const usize, count)
        }
    }

    /// Mutably borrow `count` words starting at the given byte offset
    pub fn words_mut(&mut self, offset: usize, count: usize) -> &mut [usize] {
        assert!(offset % WORD_BYTES == 0 && offset + count * WORD_BYTES <= self.size);
        unsafe {
            std::slice::from_raw_parts_mut(self.ptr.as_ptr().add(offset) as *mut usize, count)
        }
    }

    /// Zero-fill `len` bytes starting at `offset`
    pub fn zero(&mut self, offset: usize, len: usize) {
        assert!(offset + len <= self.size);
        unsafe { std::ptr::write_bytes(self.ptr.as_ptr().add(offset), 0, len) }
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        internal::dealloc_block(self.ptr, self.size);
    }
}

/// The set of possible allocation sources
#[derive(Debug, PartialEq)]
pub enum BlockSource {
    RustAlloc,
}

pub fn block_source() -> BlockSource {
    internal::BLOCK_SOURCE
}

/// The operating system's memory page size, used to round region sizes
pub fn page_size() -> usize {
    internal::page_size()
}

mod internal {
    use super::{BlockError, BlockPtr, BlockSize, BlockSource};
    use std::alloc::{alloc_zeroed, dealloc, Layout};
    use std::ptr::NonNull;

    pub const BLOCK_SOURCE: BlockSource = BlockSource::RustAlloc;

    const FALLBACK_PAGE_SIZE: usize = 4096;

    pub fn alloc_block(size: BlockSize) -> Result<BlockPtr, BlockError> {
        let layout = Layout::from_size_align(size, size).map_err(|_| BlockError::BadRequest)?;

        let ptr = unsafe { alloc_zeroed(layout) };
        NonNull::new(ptr).ok_or(BlockError::OOM)
    }

    pub fn dealloc_block(ptr: BlockPtr, size: BlockSize) {
        unsafe {
            let layout = Layout::from_size_align_unchecked(size, size);

            dealloc(ptr.as_ptr(), layout);
        }
    }

    #[cfg(unix)]
    pub fn page_size() -> usize {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            FALLBACK_PAGE_SIZE
        }
    }

    #[cfg(not(unix))]
    pub fn page_size() -> usize {
        FALLBACK_PAGE_SIZE
    }
}
