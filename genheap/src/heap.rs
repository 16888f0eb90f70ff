use std::mem::take;

use fnv::{FnvHashMap, FnvHashSet};
use tracing::{debug, trace};

use crate::address::Address;
use crate::allocator::{alloc_size_of, AllocError, ObjectModel, Word};
use crate::constants::{
    FORWARDED, FORWARD_SIZE, FORWARD_TARGET, MAX_ALLOC_SIZE, OLD_SPACES, REMEMBERED_WINDOW,
    WORD_BYTES, YOUNG_SPACE,
};
use crate::region::Region;
use crate::roots::{Root, RootSet};
use crate::settings::HeapSettings;

/// Which collection, if any, is in progress
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Pass {
    Idle,
    Minor,
    Major,
}

/// A snapshot of heap occupancy and collector activity
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct HeapStats {
    /// Live objects in the old generation
    pub fixed: usize,
    /// Bytes allocated in both generations
    pub actual: usize,
    /// Bytes reserved by both generations
    pub reserved: usize,
    /// Entries in the remembered set
    pub remembered: usize,
    pub minors: usize,
    pub majors: usize,
}

/// A two-generation copying heap.
///
/// The young region is bump allocated upward while the remembered set grows
/// downward from the top of the same block; `store` is the byte offset of the
/// most recent remembered entry. The bump cursor never passes `store`.
pub struct Heap<M: ObjectModel> {
    model: M,
    settings: HeapSettings,
    young: Region,
    store: usize,
    old: Region,
    // the next old semispace while a major collection is copying into it
    to: Option<Region>,
    roots: RootSet,
    // forwarding target -> every slot currently forwarding to it
    redirects: FnvHashMap<Address, Vec<Address>>,
    scratch: Vec<Word>,
    fields: Vec<usize>,
    collecting: bool,
    dirty: bool,
    pass: Pass,
    minors: usize,
    majors: usize,
    minors_since_major: usize,
}

impl<M: ObjectModel> Heap<M> {
    pub fn new(model: M, settings: HeapSettings) -> Result<Heap<M>, AllocError> {
        settings.validate()?;

        let young = Region::new(YOUNG_SPACE, settings.young_size)?;
        let old = Region::new(OLD_SPACES[0], settings.old_size)?;

        Ok(Heap {
            model,
            store: young.capacity(),
            young,
            old,
            settings,
            to: None,
            roots: RootSet::default(),
            redirects: FnvHashMap::default(),
            scratch: Vec::new(),
            fields: Vec::new(),
            collecting: false,
            dirty: false,
            pass: Pass::Idle,
            minors: 0,
            majors: 0,
            minors_since_major: 0,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn settings(&self) -> &HeapSettings {
        &self.settings
    }

    pub fn pass(&self) -> Pass {
        self.pass
    }

    fn region(&self, space: u32) -> &Region {
        if space == self.young.space() {
            &self.young
        } else if space == self.old.space() {
            &self.old
        } else {
            match self.to {
                Some(ref to) if to.space() == space => to,
                _ => panic!("no heap region for space {}", space),
            }
        }
    }

    fn region_mut(&mut self, space: u32) -> &mut Region {
        if space == self.young.space() {
            &mut self.young
        } else if space == self.old.space() {
            &mut self.old
        } else {
            match self.to {
                Some(ref mut to) if to.space() == space => to,
                _ => panic!("no heap region for space {}", space),
            }
        }
    }

    // The region a collection copies into
    fn to_space_mut(&mut self) -> &mut Region {
        match (self.pass, self.to.as_mut()) {
            (Pass::Major, Some(to)) => to,
            _ => &mut self.old,
        }
    }

    /// Read word `index` of the slot at `addr` without resolving forwarding
    pub fn word(&self, addr: Address, index: usize) -> Word {
        self.region(addr.space()).word(addr, index)
    }

    /// Write word `index` of the slot at `addr`. No write barrier is applied;
    /// see `record`.
    pub fn set_word(&mut self, addr: Address, index: usize, value: Word) {
        self.region_mut(addr.space()).set_word(addr, index, value)
    }

    pub fn header(&self, addr: Address) -> Word {
        self.word(addr, 0)
    }

    pub fn is_forwarded(&self, addr: Address) -> bool {
        self.header(addr) == FORWARDED
    }

    /// Follow forwarding records until a live object is reached. Resolving
    /// an already resolved address returns it unchanged.
    pub fn resolve(&self, addr: Address) -> Address {
        let mut current = addr;
        while self.is_forwarded(current) {
            current = Address::from_raw(self.word(current, FORWARD_TARGET));
        }
        current
    }

    /// The allocation size of the slot at `addr`, forwarded or not
    pub fn object_size(&self, addr: Address) -> usize {
        let region = self.region(addr.space());

        if region.word(addr, 0) == FORWARDED {
            region.word(addr, FORWARD_SIZE)
        } else {
            alloc_size_of(self.model.size_of(region.tail(addr)))
        }
    }

    /// The words of the live object at `addr`, header first
    pub fn object(&self, addr: Address) -> &[Word] {
        let count = self.object_size(addr) / WORD_BYTES;
        self.region(addr.space()).object(addr, count)
    }

    pub fn object_mut(&mut self, addr: Address) -> &mut [Word] {
        let count = self.object_size(addr) / WORD_BYTES;
        self.region_mut(addr.space()).object_mut(addr, count)
    }

    pub fn in_young(&self, addr: Address) -> bool {
        addr.space() == YOUNG_SPACE
    }

    pub fn in_old(&self, addr: Address) -> bool {
        addr.space() == self.old.space()
    }

    /// Bytes between the young bump cursor and the remembered set
    pub fn headroom(&self) -> usize {
        self.store.saturating_sub(self.young.used())
    }

    // Roots

    pub fn add_global(&mut self, word: Word) -> Root {
        self.roots.add_global(word)
    }

    pub fn push_local(&mut self, word: Word) -> Root {
        self.roots.push_local(word)
    }

    /// The current depth of the local root stack
    pub fn local_mark(&self) -> usize {
        self.roots.locals.len()
    }

    /// Release every local root pushed since `mark` was taken
    pub fn pop_locals(&mut self, mark: usize) {
        self.roots.locals.truncate(mark);
    }

    pub fn root(&self, root: Root) -> Word {
        self.roots.get(root)
    }

    pub fn set_root(&mut self, root: Root, word: Word) {
        self.roots.set(root, word)
    }

    /// The resolved address of the object a root refers to
    pub fn root_address(&self, root: Root) -> Result<Address, AllocError> {
        self.model
            .reference(self.root(root))
            .map(|addr| self.resolve(addr))
            .ok_or(AllocError::BadRequest)
    }

    // Allocation

    /// Allocate a zeroed object of `size` bytes with the given header tag.
    /// This is a relocation point: any collection it triggers moves objects.
    pub fn allocate(&mut self, size: usize, tag: Word) -> Result<Address, AllocError> {
        self.allocate_reserving(size, tag, 0)
    }

    // As `allocate`, but also leave `reserve` bytes of young headroom for
    // remembered-set pushes the caller is about to make
    fn allocate_reserving(
        &mut self,
        size: usize,
        tag: Word,
        reserve: usize,
    ) -> Result<Address, AllocError> {
        if tag == FORWARDED || size > MAX_ALLOC_SIZE {
            return Err(AllocError::BadRequest);
        }

        let alloc_size = alloc_size_of(size);
        let margin = self.settings.safety_margin + reserve;

        if alloc_size >= self.settings.pretenure_threshold {
            return self.allocate_old(alloc_size, tag, margin);
        }

        let wanted = alloc_size + margin;
        if self.dirty || self.headroom() < wanted {
            self.collect(wanted, false)?;
        }
        if self.headroom() < wanted {
            return Err(AllocError::OOM);
        }

        let addr = self.young.bump(alloc_size).ok_or(AllocError::OOM)?;
        self.initialize(addr, tag, alloc_size);
        Ok(addr)
    }

    fn allocate_old(
        &mut self,
        alloc_size: usize,
        tag: Word,
        margin: usize,
    ) -> Result<Address, AllocError> {
        if self.dirty || self.headroom() < margin {
            self.collect(margin, false)?;
        }
        if self.old.free() < alloc_size {
            self.collect(alloc_size, true)?;
        }

        let addr = self.old.bump(alloc_size).ok_or(AllocError::OOM)?;
        self.initialize(addr, tag, alloc_size);

        trace!(target: "gc", size = alloc_size, "pretenured object");
        Ok(addr)
    }

    fn initialize(&mut self, addr: Address, tag: Word, alloc_size: usize) {
        let model = &self.model;
        let region = if addr.space() == self.young.space() {
            &mut self.young
        } else {
            &mut self.old
        };

        let object = region.object_mut(addr, alloc_size / WORD_BYTES);
        object[0] = tag;
        model.fit(object, alloc_size);
    }

    // Write barrier

    /// Note that `holder` now refers to `referenced`. Only old-to-young
    /// references are remembered. This is a relocation point: a full
    /// remembered set triggers a collection.
    pub fn record(&mut self, holder: Address, referenced: Word) -> Result<(), AllocError> {
        let target = match self.model.reference(referenced) {
            Some(target) => target,
            None => return Ok(()),
        };

        if !self.in_old(holder) || !self.in_young(target) {
            return Ok(());
        }

        if self.remember(holder) {
            self.collect(0, false)?;
        }
        Ok(())
    }

    // Push a holder onto the remembered set unless it is one of the most
    // recent entries. Returns true when young headroom has fallen below the
    // safety margin.
    fn remember(&mut self, holder: Address) -> bool {
        let capacity = self.young.capacity();
        let young = &self.young;
        let duplicate = (0..REMEMBERED_WINDOW)
            .map(|i| self.store + i * WORD_BYTES)
            .take_while(|offset| *offset < capacity)
            .any(|offset| young.raw_word(offset) == holder.as_word());

        if !duplicate {
            debug_assert!(self.headroom() >= WORD_BYTES);
            self.store -= WORD_BYTES;
            self.young.set_raw_word(self.store, holder.as_word());
        }

        self.headroom() < self.settings.safety_margin
    }

    pub fn remembered(&self) -> usize {
        (self.young.capacity() - self.store) / WORD_BYTES
    }

    // Relocation

    /// Make sure the object held in `root` can hold `new_size` bytes. If it
    /// cannot, it is copied into a larger slot, a forwarding record is left
    /// at the old slot and the root is updated. Every slot that forwarded to
    /// the old slot is redirected to the new one, so resolution never takes
    /// more than one hop. This is a relocation point.
    pub fn grow_if_needed(&mut self, root: Root, new_size: usize) -> Result<Address, AllocError> {
        let from = self.root_address(root)?;
        let new_alloc_size = alloc_size_of(new_size);

        if self.object_size(from) >= new_alloc_size {
            return Ok(from);
        }

        let tag = self.header(from);
        let pending = self.redirects.get(&from).map_or(0, Vec::len) + 2;
        let fresh = self.allocate_reserving(new_size, tag, pending * WORD_BYTES)?;

        // allocation may have collected
        let from = self.root_address(root)?;
        let size = self.object_size(from);

        let mut scratch = take(&mut self.scratch);
        scratch.clear();
        scratch.extend_from_slice(self.object(from));
        {
            let model = &self.model;
            let region = if fresh.space() == self.young.space() {
                &mut self.young
            } else {
                &mut self.old
            };
            let object = region.object_mut(fresh, new_alloc_size / WORD_BYTES);
            object[..scratch.len()].copy_from_slice(&scratch);
            model.fit(object, new_alloc_size);
        }
        self.scratch = scratch;

        self.write_forward(from, fresh, size);

        let mut sources = self.redirects.remove(&from).unwrap_or_default();
        for source in &sources {
            self.set_word(*source, FORWARD_TARGET, fresh.as_word());
            if self.in_old(*source) && self.in_young(fresh) {
                self.remember(*source);
            }
        }
        sources.push(from);

        if self.in_old(from) && self.in_young(fresh) {
            self.remember(from);
        }
        if self.in_old(fresh) {
            self.remember(fresh);
        }
        self.redirects.insert(fresh, sources);

        let word = self.root(root);
        let retargeted = self.model.retarget(word, fresh);
        self.set_root(root, retargeted);

        trace!(target: "gc", ?from, ?fresh, size = new_alloc_size, "relocated object");
        Ok(fresh)
    }

    fn write_forward(&mut self, from: Address, to: Address, size: usize) {
        let region = self.region_mut(from.space());
        region.set_word(from, 0, FORWARDED);
        region.set_word(from, FORWARD_TARGET, to.as_word());
        region.set_word(from, FORWARD_SIZE, size);
    }

    // Collection

    /// Ask for a collection before the next allocation
    pub fn request_collection(&mut self) {
        self.dirty = true;
    }

    /// Run a collection leaving at least `min_free` bytes of room. A minor
    /// collection is escalated to a major one when the old region could not
    /// absorb the young survivors, every `minors_per_major` minors, or when
    /// `force_major` is set. Collections do not nest.
    pub fn collect(&mut self, min_free: usize, force_major: bool) -> Result<(), AllocError> {
        if self.collecting {
            return Ok(());
        }
        self.collecting = true;

        let major = force_major
            || self.minors_since_major >= self.settings.minors_per_major
            || self.old.free() < self.young.used();

        let result = if major {
            self.major(min_free)
        } else {
            self.minor()
        };

        self.collecting = false;
        self.pass = Pass::Idle;
        if result.is_ok() {
            self.dirty = false;
        }
        result
    }

    fn minor(&mut self) -> Result<(), AllocError> {
        self.pass = Pass::Minor;

        let young_used = self.young.used();
        let scan_start = self.old.used();

        self.evacuate_roots()?;

        let mut offset = self.store;
        while offset < self.young.capacity() {
            let holder = Address::from_raw(self.young.raw_word(offset));
            self.scan_remembered(holder)?;
            offset += WORD_BYTES;
        }

        let mut scan = scan_start;
        while scan < self.old.used() {
            let addr = Address::new(self.old.space(), scan);
            self.scan_object(addr)?;
            scan += self.object_size(addr);
        }

        let promoted = self.old.used() - scan_start;
        self.reset_young();
        self.refresh_redirects();
        self.minors += 1;
        self.minors_since_major += 1;

        debug!(
            target: "gc",
            young_used,
            promoted,
            old_used = self.old.used(),
            "minor collection complete"
        );
        Ok(())
    }

    fn major(&mut self, extra: usize) -> Result<(), AllocError> {
        let before = self.young.used() + self.old.used();
        let live = self.live_bytes();

        // leave room for one full minor collection plus the pending request
        let needed = live + self.young.capacity() + extra;
        if needed > self.settings.max_old_size {
            debug!(target: "gc", live, needed, "major collection cannot fit live set");
            return Err(AllocError::OOM);
        }

        let capacity = self
            .settings
            .old_size
            .max((needed * 2).next_power_of_two())
            .min(self.settings.max_old_size);
        let space = if self.old.space() == OLD_SPACES[0] {
            OLD_SPACES[1]
        } else {
            OLD_SPACES[0]
        };

        self.to = Some(Region::new(space, capacity)?);
        self.pass = Pass::Major;

        self.evacuate_roots()?;

        let mut scan = 0;
        while scan < self.to_space_mut().used() {
            let addr = Address::new(space, scan);
            self.scan_object(addr)?;
            scan += self.object_size(addr);
        }

        if let Some(to) = self.to.take() {
            self.old = to;
        }
        self.reset_young();
        self.redirects.clear();
        self.majors += 1;
        self.minors_since_major = 0;

        debug!(
            target: "gc",
            before,
            live,
            capacity,
            "major collection complete"
        );
        Ok(())
    }

    fn reset_young(&mut self) {
        self.young.reset();
        self.store = self.young.capacity();
    }

    // Bytes occupied by every object reachable from the roots
    fn live_bytes(&self) -> usize {
        let model = &self.model;
        let mut seen = FnvHashSet::default();
        let mut stack: Vec<Address> = self
            .roots
            .words()
            .filter_map(|word| model.reference(*word))
            .collect();
        let mut live = 0;

        while let Some(addr) = stack.pop() {
            let addr = self.resolve(addr);
            if !seen.insert(addr) {
                continue;
            }

            live += self.object_size(addr);

            let object = self.object(addr);
            model.trace(object, &mut |index| {
                if let Some(child) = model.reference(object[index]) {
                    stack.push(child);
                }
            });
        }

        live
    }

    fn in_from_space(&self, addr: Address) -> bool {
        match self.pass {
            Pass::Minor => self.in_young(addr),
            Pass::Major => self.in_young(addr) || self.in_old(addr),
            Pass::Idle => false,
        }
    }

    fn evacuate_roots(&mut self) -> Result<(), AllocError> {
        for index in 0..self.roots.globals.len() {
            let word = self.roots.globals[index];
            self.roots.globals[index] = self.evacuate(word)?;
        }
        for index in 0..self.roots.locals.len() {
            let word = self.roots.locals[index];
            self.roots.locals[index] = self.evacuate(word)?;
        }
        Ok(())
    }

    fn evacuate(&mut self, word: Word) -> Result<Word, AllocError> {
        match self.model.reference(word) {
            Some(addr) => {
                let to = self.evacuate_address(addr)?;
                if to == addr {
                    Ok(word)
                } else {
                    Ok(self.model.retarget(word, to))
                }
            }
            None => Ok(word),
        }
    }

    // Return the address the object at `addr` will occupy after this
    // collection, copying it there if it has not been copied yet
    fn evacuate_address(&mut self, addr: Address) -> Result<Address, AllocError> {
        let addr = self.resolve(addr);

        if self.in_from_space(addr) {
            self.copy_object(addr)
        } else {
            Ok(addr)
        }
    }

    fn copy_object(&mut self, addr: Address) -> Result<Address, AllocError> {
        let size = self.object_size(addr);

        let mut scratch = take(&mut self.scratch);
        scratch.clear();
        scratch.extend_from_slice(self.object(addr));

        let to_space = self.to_space_mut();
        let copied = to_space.bump(size).map(|to| {
            to_space.object_mut(to, scratch.len()).copy_from_slice(&scratch);
            to
        });
        self.scratch = scratch;

        let to = copied.ok_or(AllocError::OOM)?;
        self.write_forward(addr, to, size);
        Ok(to)
    }

    // Rewrite every reference field of the object at `addr`
    fn scan_object(&mut self, addr: Address) -> Result<(), AllocError> {
        let mut fields = take(&mut self.fields);
        fields.clear();
        self.model
            .trace(self.object(addr), &mut |index| fields.push(index));

        for index in fields.iter() {
            let word = self.word(addr, *index);
            let moved = self.evacuate(word)?;
            if moved != word {
                self.set_word(addr, *index, moved);
            }
        }

        self.fields = fields;
        Ok(())
    }

    fn scan_remembered(&mut self, holder: Address) -> Result<(), AllocError> {
        if self.is_forwarded(holder) {
            let target = Address::from_raw(self.word(holder, FORWARD_TARGET));
            let moved = self.evacuate_address(target)?;
            self.set_word(holder, FORWARD_TARGET, moved.as_word());
            Ok(())
        } else {
            self.scan_object(holder)
        }
    }

    // After a minor collection only old forwarded slots still exist; regroup
    // them under their targets' new addresses
    fn refresh_redirects(&mut self) {
        let sources: Vec<Address> = self.redirects.drain().flat_map(|(_, list)| list).collect();

        for source in sources {
            if self.in_old(source) && self.is_forwarded(source) {
                let target = Address::from_raw(self.word(source, FORWARD_TARGET));
                self.redirects.entry(target).or_insert_with(Vec::new).push(source);
            }
        }
    }

    // Diagnostics

    /// The number of live objects in the old generation
    pub fn fixed(&self) -> usize {
        let mut count = 0;
        let mut offset = 0;

        while offset < self.old.used() {
            let addr = Address::new(self.old.space(), offset);
            if !self.is_forwarded(addr) {
                count += 1;
            }
            offset += self.object_size(addr);
        }

        count
    }

    /// Bytes allocated in both generations
    pub fn actual(&self) -> usize {
        self.young.used() + self.old.used()
    }

    /// Bytes reserved by both generations
    pub fn reserved(&self) -> usize {
        self.young.capacity() + self.old.capacity()
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            fixed: self.fixed(),
            actual: self.actual(),
            reserved: self.reserved(),
            remembered: self.remembered(),
            minors: self.minors,
            majors: self.majors,
        }
    }

    /// Slots currently forwarding to `target`
    pub fn redirected_to(&self, target: Address) -> &[Address] {
        self.redirects.get(&target).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{int, leaf, node, TestModel, LEAF};

    fn small_heap() -> Heap<TestModel> {
        Heap::new(TestModel, HeapSettings::with_young_size(4096)).unwrap()
    }

    #[test]
    fn test_allocate_zeroed() {
        let mut heap = small_heap();

        let a = heap.allocate(40, LEAF).unwrap();
        let b = heap.allocate(40, LEAF).unwrap();

        assert!(a != b);
        assert!(heap.in_young(a));
        assert!(heap.header(a) == LEAF);
        assert!(heap.word(a, 1) == 40);
        assert!(heap.object(a)[2..].iter().all(|w| *w == 0));
        assert!(heap.object_size(a) == 40);
    }

    #[test]
    fn test_bad_requests() {
        let mut heap = small_heap();
        assert!(heap.allocate(8, FORWARDED) == Err(AllocError::BadRequest));
        assert!(heap.allocate(MAX_ALLOC_SIZE + 1, LEAF) == Err(AllocError::BadRequest));
    }

    #[test]
    fn test_minor_preserves_reachable() {
        let mut heap = small_heap();

        let n = node(&mut heap, 2);
        heap.set_word(n, 2, int(42));
        let root = heap.add_global(n.as_word());

        // garbage
        for _ in 0..10 {
            leaf(&mut heap);
        }
        let used = heap.actual();

        heap.collect(0, false).unwrap();

        let moved = heap.root_address(root).unwrap();
        assert!(moved != n);
        assert!(heap.in_old(moved));
        assert!(heap.word(moved, 2) == int(42));
        assert!(heap.actual() < used);
        assert!(heap.fixed() == 1);
        assert!(heap.stats().minors == 1);
    }

    #[test]
    fn test_old_to_young_reference_survives_minor() {
        let mut heap = small_heap();

        let holder = node(&mut heap, 1);
        let root = heap.add_global(holder.as_word());
        heap.collect(0, false).unwrap();
        let holder = heap.root_address(root).unwrap();
        assert!(heap.in_old(holder));

        let child = node(&mut heap, 1);
        heap.set_word(child, 2, int(7));
        heap.set_word(holder, 2, child.as_word());
        heap.record(holder, child.as_word()).unwrap();
        assert!(heap.remembered() == 1);

        heap.collect(0, false).unwrap();

        let child = Address::from_word(heap.word(holder, 2)).unwrap();
        assert!(heap.in_old(child));
        assert!(heap.word(child, 2) == int(7));
        assert!(heap.remembered() == 0);
    }

    #[test]
    fn test_barrier_ignores_other_edges() {
        let mut heap = small_heap();

        let young = node(&mut heap, 1);
        let other = node(&mut heap, 1);
        heap.record(young, other.as_word()).unwrap();
        heap.record(young, int(3)).unwrap();

        assert!(heap.remembered() == 0);
    }

    #[test]
    fn test_barrier_skips_recent_duplicates() {
        let mut heap = small_heap();

        let holder = node(&mut heap, 1);
        let root = heap.add_global(holder.as_word());
        heap.collect(0, false).unwrap();
        let holder = heap.root_address(root).unwrap();

        let child = leaf(&mut heap);
        heap.record(holder, child.as_word()).unwrap();
        heap.record(holder, child.as_word()).unwrap();
        heap.record(holder, child.as_word()).unwrap();

        assert!(heap.remembered() == 1);
    }

    #[test]
    fn test_full_remembered_set_collects() {
        let mut heap = small_heap();

        // more old holders than the young block has words
        let mut roots = Vec::new();
        for _ in 0..6 {
            for _ in 0..90 {
                let holder = node(&mut heap, 1);
                roots.push(heap.add_global(holder.as_word()));
            }
            heap.collect(0, false).unwrap();
        }
        let holders: Vec<Address> = roots
            .iter()
            .map(|root| heap.root_address(*root).unwrap())
            .collect();
        assert!(holders.iter().all(|holder| heap.in_old(*holder)));
        assert!(holders.len() * WORD_BYTES > heap.young.capacity());

        let child = leaf(&mut heap);
        let child = heap.add_global(child.as_word());
        let minors = heap.stats().minors;

        for holder in &holders {
            let target = heap.root_address(child).unwrap();
            heap.set_word(*holder, 2, target.as_word());
            heap.record(*holder, target.as_word()).unwrap();

            assert!(heap.young.used() <= heap.store);
            assert!(heap.headroom() >= WORD_BYTES);
        }

        assert!(heap.stats().minors == minors + 1);
        assert!(heap.remembered() == 0);

        let child = heap.root_address(child).unwrap();
        assert!(heap.in_old(child));
        assert!(heap.header(child) == LEAF);
        for holder in &holders {
            assert!(heap.word(*holder, 2) == child.as_word());
        }
    }

    #[test]
    fn test_grow_leaves_forwarding_record() {
        let mut heap = small_heap();

        let n = node(&mut heap, 1);
        heap.set_word(n, 2, int(5));
        let root = heap.push_local(n.as_word());

        let grown = heap.grow_if_needed(root, 16 + 8 * 6).unwrap();
        assert!(grown != n);
        assert!(heap.is_forwarded(n));
        assert!(heap.word(n, FORWARD_SIZE) == 24);
        assert!(heap.resolve(n) == grown);
        assert!(heap.resolve(heap.resolve(n)) == heap.resolve(n));
        assert!(heap.word(grown, 1) == 6);
        assert!(heap.word(grown, 2) == int(5));
        assert!(heap.root_address(root).unwrap() == grown);

        // already big enough
        assert!(heap.grow_if_needed(root, 24).unwrap() == grown);
    }

    #[test]
    fn test_chains_stay_one_hop() {
        let mut heap = small_heap();

        let first = node(&mut heap, 1);
        let root = heap.push_local(first.as_word());

        let second = heap.grow_if_needed(root, 64).unwrap();
        let third = heap.grow_if_needed(root, 256).unwrap();

        assert!(second != third);
        assert!(heap.word(first, FORWARD_TARGET) == third.as_word());
        assert!(heap.word(second, FORWARD_TARGET) == third.as_word());
        assert!(heap.redirected_to(third).len() == 2);
    }

    #[test]
    fn test_forwarded_old_slot_survives_minor() {
        let mut heap = small_heap();

        let n = node(&mut heap, 1);
        let root = heap.add_global(n.as_word());
        heap.collect(0, false).unwrap();
        let old = heap.root_address(root).unwrap();

        // a second holder keeps pointing at the stale old slot
        let stale = heap.add_global(old.as_word());

        let grown = heap.grow_if_needed(root, 64).unwrap();
        assert!(heap.in_young(grown));
        heap.set_word(grown, 3, int(11));

        heap.collect(0, false).unwrap();

        let via_stale = heap.root_address(stale).unwrap();
        let via_root = heap.root_address(root).unwrap();
        assert!(via_stale == via_root);
        assert!(heap.word(via_root, 3) == int(11));
    }

    #[test]
    fn test_major_reclaims_and_compacts() {
        let mut heap = small_heap();

        let n = node(&mut heap, 1);
        heap.set_word(n, 2, int(9));
        let root = heap.add_global(n.as_word());

        for _ in 0..4 {
            for _ in 0..20 {
                leaf(&mut heap);
            }
            heap.collect(0, false).unwrap();
        }

        heap.collect(0, true).unwrap();

        let n = heap.root_address(root).unwrap();
        assert!(heap.word(n, 2) == int(9));
        assert!(heap.fixed() == 1);
        assert!(heap.actual() == 24);
        assert!(heap.stats().majors == 1);
    }

    #[test]
    fn test_periodic_major() {
        let mut heap = small_heap();

        for _ in 0..heap.settings().minors_per_major + 1 {
            heap.collect(0, false).unwrap();
        }

        let stats = heap.stats();
        assert!(stats.minors == heap.settings().minors_per_major);
        assert!(stats.majors == 1);
    }

    #[test]
    fn test_allocation_triggers_collection() {
        let mut heap = small_heap();

        let n = node(&mut heap, 1);
        heap.set_word(n, 2, int(1));
        let root = heap.add_global(n.as_word());

        for _ in 0..1000 {
            leaf(&mut heap);
        }

        assert!(heap.stats().minors > 0);
        let n = heap.root_address(root).unwrap();
        assert!(heap.word(n, 2) == int(1));
    }

    #[test]
    fn test_dirty_flag_collects() {
        let mut heap = small_heap();
        heap.request_collection();
        leaf(&mut heap);
        assert!(heap.stats().minors == 1);
    }

    #[test]
    fn test_pretenure() {
        let mut heap = small_heap();
        let threshold = heap.settings().pretenure_threshold;

        let big = heap.allocate(threshold, LEAF).unwrap();
        assert!(heap.in_old(big));
    }

    #[test]
    fn test_out_of_memory() {
        let settings = HeapSettings {
            old_size: 8192,
            max_old_size: 8192,
            ..HeapSettings::with_young_size(4096)
        };
        let mut heap = Heap::new(TestModel, settings).unwrap();

        let mut result = Ok(());
        for _ in 0..1000 {
            match heap.allocate(256, LEAF) {
                Ok(addr) => {
                    heap.add_global(addr.as_word());
                }
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        assert!(result == Err(AllocError::OOM));
    }

    #[test]
    fn test_local_roots() {
        let mut heap = small_heap();

        let mark = heap.local_mark();
        let n = leaf(&mut heap);
        let root = heap.push_local(n.as_word());
        heap.collect(0, false).unwrap();
        assert!(heap.in_old(heap.root_address(root).unwrap()));

        heap.pop_locals(mark);
        heap.collect(0, true).unwrap();
        assert!(heap.fixed() == 0);
    }
}
