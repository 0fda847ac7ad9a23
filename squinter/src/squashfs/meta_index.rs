//! The meta-index cache: a small, fixed-size, memory-bounded cache of per-file
//! block-list-to-data-offset mappings. Large files otherwise require rescanning
//! their block list from the start on every random access; this cache lets
//! repeated and concurrent reads resume from the nearest previously-visited
//! point instead.
//!
//! Grounded on [`super::readermux::ReaderMux`]'s "single shared resource behind
//! a lock, handed to many clients, each with its own handshake" shape --
//! generalized here from one active reader id to eight lockable cache slots.

use std::sync::atomic::{fence, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::metadata::EntryReference;

/// Number of cache slots held per archive instance. Fixed by the cache's design,
/// not configurable at runtime.
pub(crate) const SLOT_COUNT: usize = 8;

/// Maximum number of mapping entries a single slot can hold.
pub(crate) const ENTRIES_PER_SLOT: usize = 127;

/// Number of raw datablock indexes spanned by one meta-index entry, before
/// applying a file's `skip` factor.
pub(crate) const INDEXES_PER_ENTRY: u64 = 16;

/// Upper bound on `skip`, chosen so that a single hop between adjacent cache
/// entries never exceeds what the metadata-block cache can hold resident.
pub(crate) const CACHED_METADATA_BLOCKS: u64 = 8;

/// Words read per `BlockListReader` call, bounding how much a single hop
/// across skipped indexes costs in one go.
pub(crate) const SCRATCH_WORDS: usize = 512;

/// `skip(blocks) = min(CACHED_METADATA_BLOCKS - 1, ((blocks - 1) / ((ENTRIES_PER_SLOT + 1) * INDEXES_PER_ENTRY)) + 1)`
///
/// Chosen so a single full slot covers the whole file when possible, but never
/// so large that one hop between cache entries would outrun the metadata
/// block cache.
pub(crate) fn skip(blocks: u64) -> u64 {
    let blocks = blocks.max(1);
    let step = (ENTRIES_PER_SLOT as u64 + 1) * INDEXES_PER_ENTRY;
    let computed = (blocks - 1) / step + 1;
    computed.min(CACHED_METADATA_BLOCKS - 1)
}

/// One cached mapping from a coarse-index position to its on-disk location.
/// `index_ref` combines `index_block` and `offset_in_block` the same way
/// [`EntryReference`] already does for inode/dirent lookups -- a position
/// within the compressed metadata stream.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MetaEntry {
    pub index_ref: EntryReference,
    pub data_block: u64,
}

#[derive(Debug, Default)]
struct MetaSlot {
    inode_number: u32,
    offset: u64,
    skip: u64,
    entries: Vec<MetaEntry>,
    locked: bool,
}

impl Default for MetaEntry {
    fn default() -> Self {
        Self {
            index_ref: EntryReference::new(0, 0),
            data_block: 0,
        }
    }
}

/// The fixed-size slot cache for one archive instance. Allocated lazily, as a
/// unit, on first use; never freed until the instance is dropped.
#[derive(Debug)]
pub(crate) struct SlotTable {
    slots: Mutex<Option<Vec<MetaSlot>>>,
    next_slot: AtomicUsize,
}

impl SlotTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(None),
            next_slot: AtomicUsize::new(0),
        }
    }

    /// Scan all slots for the best candidate describing `inode` somewhere in
    /// `[low, high]`: unlocked, matching inode, with the largest `offset` not
    /// exceeding `high` -- closest to the target without overshooting it.
    pub(crate) fn locate(&self, inode: u32, low: u64, high: u64) -> Option<SlotHandle<'_>> {
        let mut guard = self.slots.lock().unwrap();
        let slots = guard.as_mut()?;

        let mut best: Option<(usize, u64)> = None;
        for (i, s) in slots.iter().enumerate() {
            if s.inode_number == inode && !s.locked && s.offset >= low && s.offset <= high {
                let beats_current = match best {
                    Some((_, o)) => s.offset > o,
                    None => true,
                };
                if beats_current {
                    best = Some((i, s.offset));
                }
            }
        }
        let (idx, _) = best?;
        slots[idx].locked = true;
        Some(SlotHandle { table: self, index: idx })
    }

    /// Evict a non-locked slot via round-robin probing and reassign it to
    /// `inode` starting at `coarse_offset`. Allocates the slot array on first
    /// call. The probe cursor advances on every attempt, including a total
    /// failure -- preserved intentionally (see `DESIGN.md`) so repeated
    /// exhaustion still spreads future evictions instead of sticking.
    pub(crate) fn empty(&self, inode: u32, coarse_offset: u64, skip: u64) -> Option<SlotHandle<'_>> {
        let mut guard = self.slots.lock().unwrap();
        if guard.is_none() {
            *guard = Some((0..SLOT_COUNT).map(|_| MetaSlot::default()).collect());
            self.next_slot.store(0, Ordering::SeqCst);
        }
        let slots = guard.as_mut().unwrap();

        let mut chosen = None;
        for _ in 0..SLOT_COUNT {
            let i = self
                .next_slot
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some((n + 1) % SLOT_COUNT))
                .unwrap();
            if !slots[i].locked {
                chosen = Some(i);
                break;
            }
        }
        let idx = chosen?;
        slots[idx] = MetaSlot {
            inode_number: inode,
            offset: coarse_offset,
            skip,
            entries: Vec::new(),
            locked: true,
        };
        Some(SlotHandle { table: self, index: idx })
    }

    fn release(&self, index: usize) {
        let mut guard = self.slots.lock().unwrap();
        if let Some(slots) = guard.as_mut() {
            slots[index].locked = false;
        }
        drop(guard);
        // The mutex unlock above already establishes the needed happens-before
        // edge; this fence is kept only so the release step stays explicit and
        // observationally matches the spec's documented barrier.
        fence(Ordering::Release);
    }
}

/// A uniquely-owned, exclusive handle to one locked slot. Dropping it releases
/// the slot -- this is the "bounded set of slot handles" re-architecture the
/// spec's design notes call out, which removes the need to reason about the
/// release barrier at every call site.
pub(crate) struct SlotHandle<'a> {
    table: &'a SlotTable,
    index: usize,
}

impl SlotHandle<'_> {
    pub(crate) fn offset(&self) -> u64 {
        self.with_slot(|s| s.offset)
    }

    pub(crate) fn skip(&self) -> u64 {
        self.with_slot(|s| s.skip)
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.with_slot(|s| s.entries.len())
    }

    pub(crate) fn entry(&self, i: u64) -> MetaEntry {
        self.with_slot(|s| s.entries[i as usize])
    }

    /// Append a new entry. The caller is responsible for respecting
    /// `ENTRIES_PER_SLOT` -- exceeding it is a logic error in the filler.
    pub(crate) fn push_entry(&self, entry: MetaEntry) {
        self.with_slot(|s| {
            debug_assert!(s.entries.len() < ENTRIES_PER_SLOT);
            s.entries.push(entry);
        })
    }

    fn with_slot<T>(&self, f: impl FnOnce(&mut MetaSlot) -> T) -> T {
        let mut guard = self.table.slots.lock().unwrap();
        let slots = guard.as_mut().expect("slot array allocated before any handle exists");
        f(&mut slots[self.index])
    }
}

impl Drop for SlotHandle<'_> {
    fn drop(&mut self) {
        self.table.release(self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_boundary_behaviors() {
        assert_eq!(skip(1), 1);
        assert!(skip(CACHED_METADATA_BLOCKS * ENTRIES_PER_SLOT as u64 * INDEXES_PER_ENTRY * 100) <= CACHED_METADATA_BLOCKS - 1);

        let mut last = skip(1);
        for blocks in [1u64, 10, 1000, 100_000, 10_000_000] {
            let s = skip(blocks);
            assert!(s >= last || blocks == 1);
            last = s;
        }
    }

    #[test]
    fn empty_allocates_lazily_and_locks() {
        let table = SlotTable::new();
        let handle = table.empty(42, 0, 1).expect("slot available");
        assert_eq!(handle.offset(), 0);
        assert_eq!(handle.entry_count(), 0);
    }

    #[test]
    fn locate_finds_largest_offset_not_past_high() {
        let table = SlotTable::new();
        {
            let h = table.empty(7, 5, 1).unwrap();
            h.push_entry(MetaEntry { index_ref: EntryReference::new(0, 0), data_block: 0 });
        }
        {
            let h = table.empty(7, 10, 1).unwrap();
            h.push_entry(MetaEntry { index_ref: EntryReference::new(0, 0), data_block: 0 });
        }
        let found = table.locate(7, 0, 20).expect("candidate exists");
        assert_eq!(found.offset(), 10);
    }

    #[test]
    fn locate_skips_locked_slots() {
        let table = SlotTable::new();
        let locked = table.empty(1, 0, 1).unwrap();
        assert!(table.locate(1, 0, 0).is_none());
        drop(locked);
        assert!(table.locate(1, 0, 0).is_some());
    }

    #[test]
    fn exhaustion_advances_cursor_even_on_total_failure() {
        let table = SlotTable::new();
        let mut held = Vec::new();
        for i in 0..SLOT_COUNT {
            held.push(table.empty(100 + i as u32, 0, 1).unwrap());
        }
        assert!(table.empty(200, 0, 1).is_none());
        assert_eq!(table.next_slot.load(Ordering::SeqCst), 0);
    }
}
