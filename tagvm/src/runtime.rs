use fnv::FnvHashMap;
use tracing::debug;

use genheap::{Heap, HeapSettings, Root};

use crate::dispatch::InlineCacheTable;
use crate::error::RuntimeError;
use crate::function::Native;
use crate::layout::Layout;
use crate::value::Value;

/// Interpreter configuration
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub heap: HeapSettings,
    /// Memoize dispatch results per call site in `send_cached`
    pub inline_cache: bool,
    /// Follow a vtable's parent when it has no binding for a message
    pub delegation: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            heap: HeapSettings::default(),
            inline_cache: true,
            delegation: true,
        }
    }
}

/// One interpreter instance. It owns its heap, type registry, intern table
/// and call-site caches; separate instances share nothing.
pub struct Interpreter {
    pub(crate) heap: Heap<Layout>,
    pub(crate) config: Config,
    pub(crate) natives: Vec<Native>,
    pub(crate) strings: FnvHashMap<Box<str>, Root>,
    pub(crate) next_string_id: usize,
    pub(crate) registry: Root,
    pub(crate) lobby: Root,
    pub(crate) caches: InlineCacheTable,
}

impl Interpreter {
    pub fn new(config: Config) -> Result<Interpreter, RuntimeError> {
        let mut heap = Heap::new(Layout, config.heap.clone())?;
        let registry = heap.add_global(Value::NIL.as_word());
        let lobby = heap.add_global(Value::NIL.as_word());

        let mut interp = Interpreter {
            heap,
            config,
            natives: Vec::new(),
            strings: FnvHashMap::default(),
            next_string_id: 0,
            registry,
            lobby,
            caches: InlineCacheTable::new(),
        };

        interp.boot()?;

        debug!(
            target: "tagvm",
            types = interp.type_count()?,
            natives = interp.natives.len(),
            "interpreter booted"
        );
        Ok(interp)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The root namespace object
    pub fn lobby(&self) -> Value {
        self.value(self.lobby)
    }
}
