pub use blockalloc::WORD_BYTES;

/// Space id of the young (birth) region
pub const YOUNG_SPACE: u32 = 1;
/// Space ids of the two alternating old-region semispaces
pub const OLD_SPACES: [u32; 2] = [2, 3];

pub const SPACE_SHIFT: usize = 32;
pub const OFFSET_MASK: usize = (1 << SPACE_SHIFT) - 1;

pub const ALLOC_ALIGN_BYTES: usize = WORD_BYTES;
pub const ALLOC_ALIGN_MASK: usize = !(ALLOC_ALIGN_BYTES - 1);

/// Header plus room for a forwarding record's two payload words
pub const MIN_ALLOC_SIZE: usize = 3 * WORD_BYTES;
pub const MAX_ALLOC_SIZE: usize = std::u32::MAX as usize;

/// Header value marking a slot whose object has moved
pub const FORWARDED: usize = 0;
/// Word index of the new address inside a forwarding record
pub const FORWARD_TARGET: usize = 1;
/// Word index of the prior allocation size inside a forwarding record
pub const FORWARD_SIZE: usize = 2;

/// How many of the most recent remembered-set entries are checked for
/// duplicates before pushing a new holder
pub const REMEMBERED_WINDOW: usize = 3;
