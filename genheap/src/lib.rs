//! A generational copying heap for a tagged-value runtime.
//!
//! Objects are born in a young region and promoted into an old region by a
//! Cheney-style minor collection. Major collections copy everything reachable
//! into a fresh old semispace. Variable-size objects grow by relocation,
//! leaving a forwarding record behind at their previous address.
//!
//! The heap knows nothing about object layouts beyond the header word. Layout
//! knowledge is supplied through the `ObjectModel` trait.
extern crate blockalloc;
extern crate fnv;
extern crate tracing;

#[cfg(not(target_pointer_width = "64"))]
compile_error!("genheap addresses require a 64-bit target");

mod address;
mod allocator;
mod constants;
mod heap;
mod region;
mod roots;
mod settings;

#[cfg(test)]
mod testing;

pub use crate::address::Address;
pub use crate::allocator::{alloc_size_of, AllocError, ObjectModel, Word};
pub use crate::constants::{
    FORWARDED, FORWARD_SIZE, FORWARD_TARGET, MAX_ALLOC_SIZE, MIN_ALLOC_SIZE, WORD_BYTES,
};
pub use crate::heap::{Heap, HeapStats, Pass};
pub use crate::roots::Root;
pub use crate::settings::HeapSettings;
