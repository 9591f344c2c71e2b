use std::collections::BTreeMap;
use std::fmt;

use log::debug;

/// A power-of-two block of the simulated heap
///
/// `order` is log2(size / min_block_size); the buddy of a block lives at
/// `address ^ size`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HeapBlock {
    pub address: usize,
    pub size: usize,
    pub order: usize,
}

/// Aggregate heap counters, see [`HeapAllocator::stats`]
#[derive(Clone, Copy, Debug)]
pub struct HeapStats {
    pub allocations: usize,
    pub deallocations: usize,
    pub bytes_allocated: usize,
    pub bytes_freed: usize,
    pub in_use: usize,
    pub free: usize,
    pub largest_free_block: usize,
    pub internal_fragmentation_pct: f64,
    pub external_fragmentation_pct: f64,
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "heap: {} in use, {} free", self.in_use, self.free)?;
        writeln!(
            f,
            "  allocations={} deallocations={}",
            self.allocations, self.deallocations
        )?;
        writeln!(
            f,
            "  internal fragmentation={:.2}% external fragmentation={:.2}%",
            self.internal_fragmentation_pct, self.external_fragmentation_pct
        )?;
        write!(f, "  largest free block={} bytes", self.largest_free_block)
    }
}

/// Buddy-system allocator over a fixed power-of-two address range
///
/// Free blocks live on per-order free lists; allocated blocks are indexed
/// by base address. Splitting keeps the low half and frees the high half,
/// coalescing walks buddies upward until one is missing.
pub struct HeapAllocator {
    total_size: usize,
    min_block_size: usize,
    max_order: usize,
    free_lists: Vec<Vec<HeapBlock>>,
    allocated: BTreeMap<usize, HeapBlock>,
    total_allocations: usize,
    total_deallocations: usize,
    total_bytes_allocated: usize,
    total_bytes_freed: usize,
    internal_fragmentation: usize,
}

impl HeapAllocator {
    /// Builds a heap of `total_size` bytes carved into blocks no smaller
    /// than `min_block_size`; both must be powers of two
    pub fn new(total_size: usize, min_block_size: usize) -> HeapAllocator {
        debug_assert!(total_size.is_power_of_two());
        debug_assert!(min_block_size.is_power_of_two());
        debug_assert!(min_block_size <= total_size);

        let max_order = (total_size / min_block_size).trailing_zeros() as usize;
        let mut free_lists = vec![Vec::new(); max_order + 1];
        free_lists[max_order].push(HeapBlock {
            address: 0,
            size: total_size,
            order: max_order,
        });

        HeapAllocator {
            total_size,
            min_block_size,
            max_order,
            free_lists,
            allocated: BTreeMap::new(),
            total_allocations: 0,
            total_deallocations: 0,
            total_bytes_allocated: 0,
            total_bytes_freed: 0,
            internal_fragmentation: 0,
        }
    }

    fn block_size(&self, order: usize) -> usize {
        self.min_block_size << order
    }

    fn order_for(&self, size: usize) -> Option<usize> {
        let mut order = 0;
        while self.block_size(order) < size {
            if order == self.max_order {
                return None;
            }
            order += 1;
        }
        Some(order)
    }

    /// Reserves a block of at least `size` bytes, returning its base address
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        if size == 0 || size > self.total_size {
            return None;
        }
        let order = self.order_for(size)?;

        let found = (order..=self.max_order).find(|&o| !self.free_lists[o].is_empty())?;
        let mut block = self.free_lists[found].pop()?;

        // split down, keeping the low half as the working block
        while block.order > order {
            let half = block.size / 2;
            self.free_lists[block.order - 1].push(HeapBlock {
                address: block.address + half,
                size: half,
                order: block.order - 1,
            });
            block = HeapBlock {
                address: block.address,
                size: half,
                order: block.order - 1,
            };
        }

        self.allocated.insert(block.address, block);
        self.total_allocations += 1;
        self.total_bytes_allocated += block.size;
        self.internal_fragmentation += block.size - size;
        debug!("allocated {} bytes at {:#x}", block.size, block.address);
        Some(block.address)
    }

    /// Returns the block at `address` to the free lists, coalescing buddies
    pub fn deallocate(&mut self, address: usize) -> bool {
        let Some(block) = self.allocated.remove(&address) else {
            return false;
        };
        self.total_deallocations += 1;
        self.total_bytes_freed += block.size;

        let mut addr = block.address;
        let mut order = block.order;
        while order < self.max_order {
            let buddy = addr ^ self.block_size(order);
            let Some(pos) = self.free_lists[order]
                .iter()
                .position(|b| b.address == buddy)
            else {
                break;
            };
            self.free_lists[order].remove(pos);
            addr = addr.min(buddy);
            order += 1;
        }

        let size = self.block_size(order);
        self.free_lists[order].push(HeapBlock {
            address: addr,
            size,
            order,
        });
        debug!("freed {} bytes at {:#x}", block.size, block.address);
        true
    }

    /// Drops every allocation and restores the single top-order block
    pub fn reset(&mut self) {
        for list in self.free_lists.iter_mut() {
            list.clear();
        }
        self.allocated.clear();
        self.free_lists[self.max_order].push(HeapBlock {
            address: 0,
            size: self.total_size,
            order: self.max_order,
        });
        self.total_allocations = 0;
        self.total_deallocations = 0;
        self.total_bytes_allocated = 0;
        self.total_bytes_freed = 0;
        self.internal_fragmentation = 0;
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn min_block_size(&self) -> usize {
        self.min_block_size
    }

    pub fn max_order(&self) -> usize {
        self.max_order
    }

    pub fn total_allocated(&self) -> usize {
        self.total_bytes_allocated - self.total_bytes_freed
    }

    pub fn total_free(&self) -> usize {
        self.total_size - self.total_allocated()
    }

    /// Block size of the highest non-empty free list order, 0 if none
    pub fn largest_free_block(&self) -> usize {
        (0..=self.max_order)
            .rev()
            .find(|&o| !self.free_lists[o].is_empty())
            .map(|o| self.block_size(o))
            .unwrap_or(0)
    }

    pub fn free_blocks_at(&self, order: usize) -> &[HeapBlock] {
        &self.free_lists[order]
    }

    /// Allocated blocks ordered by base address
    pub fn allocation_map(&self) -> impl Iterator<Item = &HeapBlock> {
        self.allocated.values()
    }

    pub fn internal_fragmentation_pct(&self) -> f64 {
        if self.total_bytes_allocated == 0 {
            0.0
        } else {
            self.internal_fragmentation as f64 * 100.0 / self.total_bytes_allocated as f64
        }
    }

    pub fn external_fragmentation_pct(&self) -> f64 {
        let free = self.total_free();
        if free == 0 {
            0.0
        } else {
            (free - self.largest_free_block()) as f64 * 100.0 / free as f64
        }
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            allocations: self.total_allocations,
            deallocations: self.total_deallocations,
            bytes_allocated: self.total_bytes_allocated,
            bytes_freed: self.total_bytes_freed,
            in_use: self.total_allocated(),
            free: self.total_free(),
            largest_free_block: self.largest_free_block(),
            internal_fragmentation_pct: self.internal_fragmentation_pct(),
            external_fragmentation_pct: self.external_fragmentation_pct(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_then_coalesce_restores_the_whole_heap() {
        let mut heap = HeapAllocator::new(64 * 1024, 64);
        assert_eq!(heap.max_order(), 10);

        let a = heap.allocate(64).unwrap();
        let b = heap.allocate(64).unwrap();
        let c = heap.allocate(128).unwrap();
        assert_ne!(a, b);

        assert!(heap.deallocate(a));
        assert!(heap.deallocate(b));
        assert!(heap.deallocate(c));

        let top = heap.free_blocks_at(10);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].address, 0);
        assert_eq!(top[0].size, 64 * 1024);
        assert_eq!(heap.total_free(), 64 * 1024);
    }

    #[test]
    fn splitting_leaves_one_buddy_per_order() {
        let mut heap = HeapAllocator::new(64 * 1024, 64);
        heap.allocate(64).unwrap();
        for order in 0..heap.max_order() {
            assert_eq!(heap.free_blocks_at(order).len(), 1, "order {order}");
        }
        assert!(heap.free_blocks_at(heap.max_order()).is_empty());
    }

    #[test]
    fn rejects_zero_and_oversized_requests() {
        let mut heap = HeapAllocator::new(1024, 64);
        assert_eq!(heap.allocate(0), None);
        assert_eq!(heap.allocate(2048), None);
        assert_eq!(heap.total_free(), 1024);
    }

    #[test]
    fn returns_none_when_exhausted() {
        let mut heap = HeapAllocator::new(256, 64);
        assert!(heap.allocate(256).is_some());
        assert_eq!(heap.allocate(64), None);
    }

    #[test]
    fn deallocate_of_unknown_address_fails() {
        let mut heap = HeapAllocator::new(1024, 64);
        let a = heap.allocate(64).unwrap();
        assert!(!heap.deallocate(a + 1));
        assert!(heap.deallocate(a));
        // double free
        assert!(!heap.deallocate(a));
    }

    #[test]
    fn min_block_equal_to_total_is_a_single_block_allocator() {
        let mut heap = HeapAllocator::new(4096, 4096);
        assert_eq!(heap.max_order(), 0);

        let a = heap.allocate(1).unwrap();
        assert_eq!(heap.allocate(1), None);
        assert!(heap.deallocate(a));
        assert!(heap.allocate(4096).is_some());
    }

    #[test]
    fn fragmentation_accounting() {
        let mut heap = HeapAllocator::new(1024, 64);

        // 100 bytes round up to a 128-byte block: 28 bytes wasted
        let a = heap.allocate(100).unwrap();
        assert!((heap.internal_fragmentation_pct() - 21.875).abs() < 1e-9);

        // free space 896 in blocks 128 + 256 + 512
        let external = (896.0 - 512.0) * 100.0 / 896.0;
        assert!((heap.external_fragmentation_pct() - external).abs() < 1e-9);
        assert_eq!(heap.largest_free_block(), 512);

        heap.deallocate(a);
        assert_eq!(heap.external_fragmentation_pct(), 0.0);
    }

    #[test]
    fn alloc_free_pairs_stabilize_the_free_lists() {
        let mut heap = HeapAllocator::new(4096, 64);
        let signature = |h: &HeapAllocator| -> Vec<usize> {
            (0..=h.max_order()).map(|o| h.free_blocks_at(o).len()).collect()
        };
        let initial = signature(&heap);

        for _ in 0..3 {
            let a = heap.allocate(200).unwrap();
            assert!(heap.deallocate(a));
            assert_eq!(signature(&heap), initial);
            assert_eq!(heap.total_free(), 4096);
        }
    }

    #[test]
    fn reset_restores_a_fresh_heap() {
        let mut heap = HeapAllocator::new(1024, 64);
        heap.allocate(64);
        heap.allocate(300);
        heap.reset();

        assert_eq!(heap.total_free(), 1024);
        assert_eq!(heap.stats().allocations, 0);
        assert_eq!(heap.free_blocks_at(heap.max_order()).len(), 1);
        assert_eq!(heap.allocation_map().count(), 0);
    }
}
