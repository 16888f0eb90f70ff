//! The core of a dynamic-language runtime: tagged values, heap object
//! layouts over a generational copying heap, a type registry of vtables and
//! message dispatch with per-call-site inline caches.
//!
//! Everything hangs off an `Interpreter`, which owns its heap. Methods that
//! take `&mut self` may allocate, and allocation may move objects, so a
//! `Value` held across such a call must be kept in a root (`pin`, or
//! `push_root` inside `scope`) and re-read from it afterwards.
extern crate blockalloc;
extern crate fnv;
extern crate genheap;
extern crate itertools;
extern crate num;
#[macro_use]
extern crate num_derive;
extern crate num_traits;
extern crate tracing;
extern crate tracing_subscriber;

mod asm;
mod dispatch;
mod error;
mod flex;
mod function;
mod headers;
mod layout;
mod lobby;
pub mod logging;
mod memory;
mod number;
mod object;
mod printer;
mod runtime;
mod table;
mod text;
mod tuple;
mod value;
mod vtable;

pub use crate::dispatch::{CacheEntry, CacheStats, InlineCacheTable};
pub use crate::error::{ErrorKind, RuntimeError};
pub use crate::flex::{FlexKind, Width, FLEX_UNIT};
pub use crate::function::{CallFrame, Native, NativeFn, ProtoField};
pub use crate::headers::{BuiltinType, TypeTag, BUILTIN_COUNT, BUILTIN_NAMES};
pub use crate::layout::Layout;
pub use crate::runtime::{Config, Interpreter};
pub use crate::value::Value;
pub use crate::vtable::REGISTRY_CAPACITY;

pub use genheap::{HeapSettings, HeapStats, Root};
