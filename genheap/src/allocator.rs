use std::error::Error;
use std::fmt;

use blockalloc::BlockError;

use crate::address::Address;
use crate::constants::{ALLOC_ALIGN_BYTES, ALLOC_ALIGN_MASK, MIN_ALLOC_SIZE};

/// A heap word: a header, a tagged value or a raw integer
pub type Word = usize;

/// An allocation error type
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AllocError {
    /// Some attribute of the allocation, most likely the size requested or
    /// the heap settings, could not be fulfilled
    BadRequest,
    /// Out of memory - even after collecting, the heap could not make room
    OOM,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AllocError::BadRequest => write!(f, "invalid allocation request"),
            AllocError::OOM => write!(f, "out of memory"),
        }
    }
}

impl Error for AllocError {}

impl From<BlockError> for AllocError {
    fn from(error: BlockError) -> AllocError {
        match error {
            BlockError::BadRequest => AllocError::BadRequest,
            BlockError::OOM => AllocError::OOM,
        }
    }
}

/// Layout knowledge the collector needs about the objects it manages.
///
/// Word 0 of every object is its header, a nonzero type tag owned by the
/// model. All slices handed to the model start at the header.
pub trait ObjectModel {
    /// If `word` is a reference to a heap object, return the object address
    fn reference(&self, word: Word) -> Option<Address>;

    /// Return `word` pointing at `to`, keeping any tag bits `word` carries
    fn retarget(&self, word: Word, to: Address) -> Word;

    /// The object's size in bytes as it would be requested from `allocate`.
    /// `object` runs from the header to the end of the used region.
    fn size_of(&self, object: &[Word]) -> usize;

    /// Call `visit` with the word index of every field that may hold a
    /// reference. `object` is exactly the object's allocation.
    fn trace(&self, object: &[Word], visit: &mut dyn FnMut(usize));

    /// Record the allocation size in the object's own capacity fields.
    /// Called after allocation and after relocation into a larger slot.
    fn fit(&self, object: &mut [Word], alloc_size: usize);
}

/// Return the allocated size of an object: its size rounded up to a word
/// boundary, but never smaller than a forwarding record
pub fn alloc_size_of(object_size: usize) -> usize {
    let aligned = (object_size + (ALLOC_ALIGN_BYTES - 1)) & ALLOC_ALIGN_MASK;
    aligned.max(MIN_ALLOC_SIZE)
}
