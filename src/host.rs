//! The host memory system this backend allocates from.
//!
//! `spec.md` §3 treats the host as an external collaborator that can
//! allocate a contiguous run of `2^order` pages under an intent flag set,
//! free such a run, and optionally split a run into single pages. This
//! module expresses that collaborator as a trait so the core algorithm in
//! [`crate::pool`], [`crate::packer`], and [`crate::heap`] can run against
//! an in-memory fake in tests, and against a real allocator in production.

use std::alloc::{GlobalAlloc, Layout, System};
use std::ptr::NonNull;

use crate::error::{HeapError, Result};
use crate::page::{PageHandle, Residency};
use crate::sg_table::ScatterGatherTable;

/// Allocation-intent flag bundle communicated to the host allocator.
///
/// `spec.md` §6: high-order allocations fail fast rather than stall or
/// trigger reclaim, so the packer can fall back to a smaller order instead
/// of blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocIntent {
    /// User-class, no warning, allow normal reclaim. Used for single-page
    /// runs and for refilling a pool at order 0.
    LowOrder,
    /// User-class, no warning, no retry, no wake of background reclaim, no
    /// waiting. Used for any order > 0.
    HighOrder,
}

impl AllocIntent {
    /// The intent a fresh allocation at `order` should be made with.
    pub fn for_order(order: u32) -> Self {
        if order > 0 {
            AllocIntent::HighOrder
        } else {
            AllocIntent::LowOrder
        }
    }
}

/// The host memory system: allocates, frees, splits, and zeroes physical
/// page runs, and performs DMA synchronization over an assembled table.
///
/// Implementations must tolerate being called from any thread and must be
/// safe to block (page allocation is a documented suspension point, see
/// `spec.md` §5).
pub trait HostAllocator: Send + Sync {
    /// Allocate a fresh run of `2^order` physically-contiguous pages.
    /// Returns `None` on allocation failure; this is not a retryable
    /// condition for `HighOrder` intent by design.
    fn alloc_run(&self, order: u32, intent: AllocIntent) -> Option<PageHandle>;

    /// Free a run of `2^order` pages previously obtained from [`alloc_run`](Self::alloc_run).
    fn free_run(&self, page: PageHandle, order: u32);

    /// Split a run of `2^order` pages into `2^order` independent single
    /// pages, e.g. so a user fault handler can map them individually.
    fn split_run(&self, page: PageHandle, order: u32) -> Result<Vec<PageHandle>>;

    /// Zero the contents of a `2^order` run. May involve a temporary kernel
    /// mapping for high-memory pages.
    fn zero_run(&self, page: &PageHandle, order: u32);

    /// Issue a DMA sync over the assembled table.
    fn sync(&self, table: &ScatterGatherTable);
}

/// Production [`HostAllocator`] backed by the process's system allocator.
///
/// There is no real highmem/lowmem distinction in userspace; this
/// implementation tags pages obtained under [`AllocIntent::HighOrder`] as
/// [`Residency::High`] and everything else as [`Residency::Low`], which
/// reproduces the pool's LIFO/tie-break behavior faithfully even though the
/// physical memory underneath is uniform.
pub struct SystemHostAllocator {
    page_size: usize,
}

impl SystemHostAllocator {
    pub fn new(page_size: usize) -> Self {
        Self { page_size }
    }

    fn layout_for(&self, order: u32) -> Layout {
        let size = self.page_size << order;
        Layout::from_size_align(size, self.page_size)
            .expect("order/page_size combination must yield a valid layout")
    }
}

impl HostAllocator for SystemHostAllocator {
    fn alloc_run(&self, order: u32, intent: AllocIntent) -> Option<PageHandle> {
        let layout = self.layout_for(order);
        // SAFETY: layout is non-zero-sized and page-aligned.
        let raw = unsafe { System.alloc(layout) };
        let base = NonNull::new(raw)?;
        let residency = match intent {
            AllocIntent::HighOrder => Residency::High,
            AllocIntent::LowOrder => Residency::Low,
        };
        tracing::debug!(order, ?intent, "host: allocated fresh run");
        Some(PageHandle::new(base, residency))
    }

    fn free_run(&self, page: PageHandle, order: u32) {
        let layout = self.layout_for(order);
        unsafe {
            System.dealloc(page.base().as_ptr(), layout);
        }
        tracing::debug!(order, "host: freed run");
    }

    fn split_run(&self, page: PageHandle, order: u32) -> Result<Vec<PageHandle>> {
        let residency = page.residency();
        let run_layout = self.layout_for(order);
        // The system allocator cannot free sub-regions of a single
        // allocation independently, unlike a kernel buddy allocator's
        // `split_page`. We reproduce the externally-visible effect —
        // `2^order` independently-freeable single pages — by releasing the
        // run and allocating its replacements as order-0 blocks. The
        // original run may have been pool-served (already zeroed); the
        // replacements are brand new allocations, so they must be zeroed
        // here too or a caller that trusted the run's prior zero state
        // would observe uninitialized memory.
        unsafe {
            System.dealloc(page.base().as_ptr(), run_layout);
        }
        let unit_layout = self.layout_for(0);
        let mut pages = Vec::with_capacity(1usize << order);
        for _ in 0..(1u32 << order) {
            // SAFETY: unit_layout is non-zero-sized and page-aligned.
            let raw = unsafe { System.alloc_zeroed(unit_layout) };
            match NonNull::new(raw) {
                Some(base) => pages.push(PageHandle::new(base, residency)),
                None => {
                    let failed_at = pages.len() + 1;
                    let total = 1usize << order;
                    for page in pages {
                        unsafe { System.dealloc(page.base().as_ptr(), unit_layout) };
                    }
                    return Err(HeapError::OutOfMemory(format!(
                        "split_run: failed to allocate replacement page {failed_at}/{total}"
                    )));
                }
            }
        }
        Ok(pages)
    }

    fn zero_run(&self, page: &PageHandle, order: u32) {
        let len = self.page_size << order;
        unsafe {
            std::ptr::write_bytes(page.base().as_ptr(), 0, len);
        }
    }

    fn sync(&self, table: &ScatterGatherTable) {
        tracing::debug!(entries = table.entries().len(), "host: dma sync");
    }
}
