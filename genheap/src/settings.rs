use blockalloc::page_size;

use crate::allocator::AllocError;
use crate::constants::{MIN_ALLOC_SIZE, OFFSET_MASK, WORD_BYTES};

const DEFAULT_YOUNG_SIZE: usize = 1 << 18;
const DEFAULT_OLD_SIZE: usize = 1 << 20;
const DEFAULT_MAX_OLD_SIZE: usize = 1 << 30;
const DEFAULT_MINORS_PER_MAJOR: usize = 10;
const DEFAULT_SAFETY_MARGIN: usize = 4 * WORD_BYTES;

/// Sizing and policy knobs for a `Heap`
#[derive(Clone, Debug, PartialEq)]
pub struct HeapSettings {
    /// Bytes in the young region, shared with the remembered set
    pub young_size: usize,
    /// Initial bytes in the old region
    pub old_size: usize,
    /// Ceiling for the old region; a major collection that cannot fit the
    /// live set plus one young region below it reports out of memory
    pub max_old_size: usize,
    /// Objects at least this large are allocated straight into the old region
    pub pretenure_threshold: usize,
    /// Minor collections between forced major collections
    pub minors_per_major: usize,
    /// Young headroom kept free for remembered-set growth
    pub safety_margin: usize,
}

impl Default for HeapSettings {
    fn default() -> HeapSettings {
        let young_size = DEFAULT_YOUNG_SIZE.max(page_size().next_power_of_two());

        HeapSettings {
            young_size,
            old_size: DEFAULT_OLD_SIZE.max(young_size),
            max_old_size: DEFAULT_MAX_OLD_SIZE,
            pretenure_threshold: young_size / 8,
            minors_per_major: DEFAULT_MINORS_PER_MAJOR,
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }
}

impl HeapSettings {
    /// Settings with the given young region size and proportional defaults
    pub fn with_young_size(young_size: usize) -> HeapSettings {
        HeapSettings {
            young_size,
            old_size: young_size * 4,
            pretenure_threshold: young_size / 8,
            ..HeapSettings::default()
        }
    }

    pub fn validate(&self) -> Result<(), AllocError> {
        let region_ok = |size: usize| size.is_power_of_two() && size >= 4096 && size <= OFFSET_MASK;

        if !region_ok(self.young_size)
            || !region_ok(self.old_size)
            || !region_ok(self.max_old_size)
            || self.max_old_size < self.old_size
            || self.max_old_size < 2 * self.young_size
            || self.pretenure_threshold < MIN_ALLOC_SIZE
            || self.pretenure_threshold > self.young_size / 4
            || self.safety_margin < WORD_BYTES
            || self.safety_margin > self.young_size / 16
            || self.minors_per_major == 0
        {
            return Err(AllocError::BadRequest);
        }

        Ok(())
    }
}
