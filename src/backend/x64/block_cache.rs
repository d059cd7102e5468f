use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::backend::x64::block_of_code::{BlockOfCode, PatchKind};
use crate::backend::x64::emit::{EmittedBlockInfo, PatchEntry};
use crate::backend::x64::invalidation::IntervalSet;
use crate::ir::location::LocationDescriptor;

const PAGE_SHIFT: u32 = 12;

/// Record kept per translated block.
pub struct CachedBlock {
    /// Offset of the entrypoint in the code buffer.
    pub entrypoint_offset: usize,
    /// Host code size in bytes.
    pub size: usize,
    /// Guest address range `[start, end)` the translated input covers.
    pub range_start: u32,
    pub range_end: u32,
    /// Outgoing link sites inside this block.
    pub outgoing: Vec<PatchEntry>,
}

/// Cache of emitted blocks, keyed by location descriptor, together with
/// the patch-site and guest-range bookkeeping the link and invalidation
/// protocols need.
///
/// Invariants: a descriptor maps to at most one live block; every
/// incoming patch site of a live block either targets that block's
/// entrypoint or is in its unresolved (slow-path) form.
pub struct BlockCache {
    blocks: HashMap<LocationDescriptor, CachedBlock>,
    /// Patch sites (buffer offsets) referencing each target descriptor.
    incoming: HashMap<LocationDescriptor, Vec<(PatchKind, usize)>>,
    /// Guest page base -> descriptors whose input covers the page.
    page_index: HashMap<u32, HashSet<LocationDescriptor>>,
}

impl BlockCache {
    pub fn new() -> Self {
        Self {
            blocks: HashMap::new(),
            incoming: HashMap::new(),
            page_index: HashMap::new(),
        }
    }

    pub fn get(&self, location: &LocationDescriptor) -> Option<&CachedBlock> {
        self.blocks.get(location)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn pages(start: u32, end: u32) -> impl Iterator<Item = u32> {
        let first = start >> PAGE_SHIFT;
        let last = end.saturating_sub(1).max(start) >> PAGE_SHIFT;
        (first..=last).map(|p| p << PAGE_SHIFT)
    }

    /// Register a freshly emitted block and resolve what links it can:
    /// its own outgoing sites were resolved at emission; here any
    /// existing sites waiting on this descriptor are re-pointed at the
    /// new entrypoint.
    pub fn insert(
        &mut self,
        location: LocationDescriptor,
        range_start: u32,
        range_end: u32,
        info: EmittedBlockInfo,
        code: &mut BlockOfCode,
    ) {
        debug_assert!(
            !self.blocks.contains_key(&location),
            "descriptor {location} already has a live block"
        );

        for patch in &info.patches {
            self.incoming
                .entry(patch.target)
                .or_default()
                .push((patch.kind, patch.offset));
        }

        for page in Self::pages(range_start, range_end) {
            self.page_index.entry(page).or_default().insert(location);
        }

        let entry_addr = code.base_addr() + info.entrypoint_offset;
        if let Some(sites) = self.incoming.get(&location) {
            for &(kind, offset) in sites {
                code.patch(kind, offset, Some(entry_addr));
            }
        }

        self.blocks.insert(
            location,
            CachedBlock {
                entrypoint_offset: info.entrypoint_offset,
                size: info.size,
                range_start,
                range_end,
                outgoing: info.patches,
            },
        );
    }

    /// Drop all cache state. The caller rewinds the code buffer, so no
    /// unpatching is needed.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.incoming.clear();
        self.page_index.clear();
    }

    /// Evict every block whose covered range intersects the set.
    /// Returns the number of blocks invalidated.
    pub fn invalidate_ranges(&mut self, ranges: &IntervalSet, code: &mut BlockOfCode) -> usize {
        let mut affected: HashSet<LocationDescriptor> = HashSet::new();
        for (start, end) in ranges.iter() {
            for page in Self::pages(start, end) {
                if let Some(descs) = self.page_index.get(&page) {
                    for desc in descs {
                        let block = &self.blocks[desc];
                        if ranges.intersects(block.range_start, block.range_end) {
                            affected.insert(*desc);
                        }
                    }
                }
            }
        }

        for desc in &affected {
            self.remove_block(*desc, code);
        }
        debug!(count = affected.len(), "invalidated blocks by range");
        affected.len()
    }

    /// Remove one block: rewrite its incoming patch sites to the slow
    /// path and drop its own sites from the link bookkeeping.
    fn remove_block(&mut self, location: LocationDescriptor, code: &mut BlockOfCode) {
        let Some(block) = self.blocks.remove(&location) else {
            return;
        };

        if let Some(sites) = self.incoming.get(&location) {
            for &(kind, offset) in sites {
                code.patch(kind, offset, None);
            }
        }

        for patch in &block.outgoing {
            if let Some(sites) = self.incoming.get_mut(&patch.target) {
                sites.retain(|&(_, offset)| offset != patch.offset);
            }
        }

        for page in Self::pages(block.range_start, block.range_end) {
            if let Some(descs) = self.page_index.get_mut(&page) {
                descs.remove(&location);
            }
        }
    }
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_info(offset: usize) -> EmittedBlockInfo {
        EmittedBlockInfo {
            entrypoint_offset: offset,
            size: 32,
            patches: Vec::new(),
        }
    }

    fn test_code() -> BlockOfCode {
        use crate::backend::x64::block_of_code::RunCodeCallbacks;
        extern "sysv64" fn stub(_: u64) -> u64 {
            0
        }
        extern "sysv64" fn stub2(_: u64, _: u64) {}
        BlockOfCode::new(
            1 << 20,
            &RunCodeCallbacks {
                arg: 0,
                lookup_block: stub as usize as u64,
                add_ticks: stub2 as usize as u64,
                get_ticks_remaining: stub as usize as u64,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let mut code = test_code();
        let mut cache = BlockCache::new();
        let loc = LocationDescriptor::new(0x1000);
        cache.insert(loc, 0x1000, 0x1010, block_info(0x100), &mut code);
        assert_eq!(cache.len(), 1);
        let block = cache.get(&loc).unwrap();
        assert_eq!(block.entrypoint_offset, 0x100);
        assert_eq!(block.range_end, 0x1010);
    }

    #[test]
    fn test_invalidate_range_evicts_intersecting() {
        let mut code = test_code();
        let mut cache = BlockCache::new();
        cache.insert(LocationDescriptor::new(0x1000), 0x1000, 0x1010, block_info(0), &mut code);
        cache.insert(LocationDescriptor::new(0x2000), 0x2000, 0x2010, block_info(64), &mut code);
        cache.insert(LocationDescriptor::new(0x3000), 0x3000, 0x3010, block_info(128), &mut code);

        let mut ranges = IntervalSet::new();
        ranges.add(0x1000, 0x1800);
        let removed = cache.invalidate_ranges(&ranges, &mut code);
        assert_eq!(removed, 2);
        assert!(cache.get(&LocationDescriptor::new(0x1000)).is_none());
        assert!(cache.get(&LocationDescriptor::new(0x2000)).is_none());
        assert!(cache.get(&LocationDescriptor::new(0x3000)).is_some());
    }

    #[test]
    fn test_invalidate_narrow_range_inside_block() {
        let mut code = test_code();
        let mut cache = BlockCache::new();
        // A 4-instruction block at 0; rewriting the word at 4 must evict it.
        cache.insert(LocationDescriptor::new(0), 0, 0x10, block_info(0), &mut code);
        let mut ranges = IntervalSet::new();
        ranges.add(4, 4);
        assert_eq!(cache.invalidate_ranges(&ranges, &mut code), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut code = test_code();
        let mut cache = BlockCache::new();
        cache.insert(LocationDescriptor::new(0x1000), 0x1000, 0x1010, block_info(0), &mut code);
        cache.clear();
        assert!(cache.is_empty());
    }
}
