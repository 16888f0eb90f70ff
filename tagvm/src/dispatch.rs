/// Message dispatch: resolve a message against the receiver's vtable, and
/// optionally its delegates, then invoke the bound closure.
///
/// `send_cached` memoizes resolution per call site. A cache entry is keyed on
/// the receiver's type tag and the registry size when the entry was filled,
/// so registering any type invalidates every site. That is coarser than
/// needed but can never serve a closure resolved for a different set of
/// types. `def_method` and `set_type_parent` also drop every site's entry,
/// as neither changes the registry size.
use tracing::trace;

use genheap::Root;

use crate::error::{err_dispatch, RuntimeError};
use crate::headers::TypeTag;
use crate::runtime::Interpreter;
use crate::value::Value;

/// What a call site last resolved
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub tag: TypeTag,
    pub registry_size: usize,
    /// Global root holding the resolved closure
    pub closure: Root,
}

/// Hit and miss counts across every call site
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// Per call site dispatch memos, indexed by site id
#[derive(Debug, Default)]
pub struct InlineCacheTable {
    sites: Vec<Option<CacheEntry>>,
    roots: Vec<Root>,
    stats: CacheStats,
}

impl InlineCacheTable {
    pub fn new() -> InlineCacheTable {
        InlineCacheTable::default()
    }

    /// The cached closure root for `site` if it was filled for `tag` at the
    /// current registry size
    pub fn check(&self, site: usize, tag: TypeTag, registry_size: usize) -> Option<Root> {
        match self.sites.get(site) {
            Some(Some(entry)) if entry.tag == tag && entry.registry_size == registry_size => {
                Some(entry.closure)
            }
            _ => None,
        }
    }

    pub fn get(&self, site: usize) -> Option<&CacheEntry> {
        self.sites.get(site).and_then(|entry| entry.as_ref())
    }

    /// The root slot reserved for `site`, if it has one
    fn root(&self, site: usize) -> Option<Root> {
        self.roots.get(site).copied()
    }

    fn update(&mut self, site: usize, entry: CacheEntry) {
        if site >= self.sites.len() {
            self.sites.resize(site + 1, None);
        }
        self.sites[site] = Some(entry);
    }

    /// Forget every resolution. Root slots are kept for reuse.
    pub fn clear(&mut self) {
        for entry in self.sites.iter_mut() {
            *entry = None;
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl Interpreter {
    /// The closure `message` is bound to for `receiver`, or `None` on a miss.
    /// With delegation enabled each vtable's parent is tried in turn.
    pub fn bind(&self, receiver: Value, message: Value) -> Result<Option<Value>, RuntimeError> {
        self.bind_tag(self.kind_of(receiver), message)
    }

    pub fn bind_tag(&self, tag: TypeTag, message: Value) -> Result<Option<Value>, RuntimeError> {
        let mut vt = self.vtable_of(tag)?;

        // a delegate chain can be no longer than the registry
        for _ in 0..self.type_count()? {
            let methods = self.vtable_methods(vt)?;
            if let Some(closure) = self.table_get(methods, message)? {
                return Ok(Some(closure));
            }

            if !self.config.delegation {
                break;
            }

            vt = self.vtable_parent(vt)?;
            if vt.is_nil() {
                break;
            }
        }

        Ok(None)
    }

    /// Resolve and invoke `message` on `receiver`
    pub fn send(
        &mut self,
        receiver: Value,
        message: Value,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        match self.bind(receiver, message)? {
            Some(closure) => self.call(closure, receiver, args),
            None => Err(err_dispatch(&self.string_text(message)?)),
        }
    }

    /// As `send`, interning the message name first
    pub fn send_name(
        &mut self,
        receiver: Value,
        name: &str,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        self.scope(|interp| {
            let receiver = interp.push_root(receiver);
            let args: Vec<Root> = args.iter().map(|arg| interp.push_root(*arg)).collect();

            let message = interp.intern(name)?;

            let args: Vec<Value> = args.iter().map(|arg| interp.value(*arg)).collect();
            interp.send(interp.value(receiver), message, &args)
        })
    }

    /// As `send`, reusing the resolution cached for call site `site` when the
    /// receiver's type and the registry size are unchanged
    pub fn send_cached(
        &mut self,
        site: usize,
        receiver: Value,
        message: Value,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        if !self.config.inline_cache {
            return self.send(receiver, message, args);
        }

        let tag = self.kind_of(receiver);
        let registry_size = self.type_count()?;

        if let Some(root) = self.caches.check(site, tag, registry_size) {
            self.caches.stats.hits += 1;
            let closure = self.value(root);
            return self.call(closure, receiver, args);
        }

        self.caches.stats.misses += 1;
        trace!(target: "tagvm", site, tag = tag.index(), registry_size, "inline cache miss");

        let closure = match self.bind_tag(tag, message)? {
            Some(closure) => closure,
            None => return Err(err_dispatch(&self.string_text(message)?)),
        };

        let root = match self.caches.root(site) {
            Some(root) => root,
            None => self.reserve_site_roots(site),
        };
        self.set_value(root, closure);
        self.caches.update(
            site,
            CacheEntry {
                tag,
                registry_size,
                closure: root,
            },
        );

        self.call(closure, receiver, args)
    }

    // Root slots are globals and so are never released; reserve them up to
    // and including `site`
    fn reserve_site_roots(&mut self, site: usize) -> Root {
        while self.caches.roots.len() <= site {
            let root = self.heap.add_global(Value::NIL.as_word());
            self.caches.roots.push(root);
        }
        self.caches.roots[site]
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.caches.stats()
    }
}
