//! Per-order page pool: a LIFO cache of freed runs awaiting reuse.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::host::{AllocIntent, HostAllocator};
use crate::page::{PageHandle, Residency};

/// Two LIFO stacks guarded by a single mutex — `alloc`, `free`, and `shrink`
/// all need to touch both stacks together, so one lock covers the pair
/// rather than one per stack.
struct Stacks {
    high: Vec<PageHandle>,
    low: Vec<PageHandle>,
}

/// A per-order cache of freed runs.
///
/// Invariants (`spec.md` §3): `high_count == high_stack.len()` and
/// `low_count == low_stack.len()`; every page on a stack was obtained as a
/// run of exactly `order` and is still owned by this pool; a pooled page is
/// always zeroed. Runs on different pools never overlap.
///
/// Zeroing itself is not this type's job: the heap zeroes a buffer's runs in
/// one bulk pass, gated on `NOZEROED`, before handing them back here (see
/// `SystemHeap::free`). A page only ever reaches `free` already zeroed (or
/// exempted by the caller's flags), so the pool does not zero again —
/// mirroring `ion_heap_buffer_zero` being called once, ahead of
/// `ion_page_pool_free`, in the original driver.
pub struct PagePool {
    order: u32,
    stacks: Mutex<Stacks>,
    high_count: AtomicUsize,
    low_count: AtomicUsize,
    host: Arc<dyn HostAllocator>,
}

impl PagePool {
    pub fn new(order: u32, host: Arc<dyn HostAllocator>) -> Self {
        Self {
            order,
            stacks: Mutex::new(Stacks {
                high: Vec::new(),
                low: Vec::new(),
            }),
            high_count: AtomicUsize::new(0),
            low_count: AtomicUsize::new(0),
            host,
        }
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    /// Serve from the high stack, then the low stack, then fall back to a
    /// fresh host allocation at this pool's order. Returns `None` only if
    /// the fresh allocation fails.
    pub fn alloc(&self) -> Option<PageHandle> {
        {
            let mut stacks = self.stacks.lock();
            if let Some(page) = stacks.high.pop() {
                self.high_count.fetch_sub(1, Ordering::Relaxed);
                tracing::debug!(order = self.order, "pool: served from high stack");
                return Some(page);
            }
            if let Some(page) = stacks.low.pop() {
                self.low_count.fetch_sub(1, Ordering::Relaxed);
                tracing::debug!(order = self.order, "pool: served from low stack");
                return Some(page);
            }
        }

        tracing::debug!(order = self.order, "pool: empty, refilling from host");
        self.host
            .alloc_run(self.order, AllocIntent::for_order(self.order))
    }

    /// Push an already-zeroed (or zero-exempt) run onto the stack matching
    /// its residency.
    pub fn free(&self, page: PageHandle) {
        let mut stacks = self.stacks.lock();
        match page.residency() {
            Residency::High => {
                stacks.high.push(page);
                self.high_count.fetch_add(1, Ordering::Relaxed);
            }
            Residency::Low => {
                stacks.low.push(page);
                self.low_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Pop pages off the stacks — low first, then high — returning them to
    /// the host until `target_pages` is reached or both stacks are empty.
    /// Returns the number of pages relinquished. Invoked by the host's
    /// memory-pressure hook; never blocks behind a single allocation beyond
    /// the pool's own mutex.
    pub fn shrink(&self, target_pages: usize) -> usize {
        let mut reclaimed = 0;
        let mut stacks = self.stacks.lock();

        while reclaimed < target_pages {
            let page = if let Some(page) = stacks.low.pop() {
                self.low_count.fetch_sub(1, Ordering::Relaxed);
                page
            } else if let Some(page) = stacks.high.pop() {
                self.high_count.fetch_sub(1, Ordering::Relaxed);
                page
            } else {
                break;
            };
            // Drop the lock while returning to the host: `free_run` may
            // block and must never hold up a concurrent `alloc`/`free`.
            drop(stacks);
            self.host.free_run(page, self.order);
            reclaimed += 1;
            stacks = self.stacks.lock();
        }

        if reclaimed > 0 {
            tracing::info!(order = self.order, reclaimed, "pool: shrunk");
        }
        reclaimed
    }

    pub fn count_high(&self) -> usize {
        self.high_count.load(Ordering::Relaxed)
    }

    pub fn count_low(&self) -> usize {
        self.low_count.load(Ordering::Relaxed)
    }

    /// Total pages currently resident (both stacks).
    pub fn count_total(&self) -> usize {
        self.count_high() + self.count_low()
    }
}

impl Drop for PagePool {
    /// Return every resident page to the host. Run during heap teardown.
    fn drop(&mut self) {
        let mut stacks = self.stacks.lock();
        for page in stacks.high.drain(..) {
            self.host.free_run(page, self.order);
        }
        for page in stacks.low.drain(..) {
            self.host.free_run(page, self.order);
        }
    }
}
