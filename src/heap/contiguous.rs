//! Degenerate one-shot allocator for a single physically-contiguous run.
//!
//! Grounded on `ion_system_contig_heap_*` in the original `ion_system_heap.c`.
//! Included only because it shares [`HeapOps`] with [`super::SystemHeap`];
//! it has no pools, no tiered orders, and no readiness latch.

use std::alloc::{GlobalAlloc, Layout, System};
use std::ptr::NonNull;

use crate::buffer::HeapBuffer;
use crate::error::{HeapError, Result};
use crate::heap::HeapOps;
use crate::sg_table::{ScatterGatherEntry, ScatterGatherTable};

pub struct ContiguousHeap {
    page_size: usize,
}

impl ContiguousHeap {
    pub fn new(page_size: usize) -> Self {
        Self { page_size }
    }
}

impl HeapOps for ContiguousHeap {
    fn allocate(&self, buffer: &mut dyn HeapBuffer, _align: usize) -> Result<()> {
        let size = buffer.size().max(1);
        let layout = Layout::from_size_align(size, self.page_size)
            .map_err(|e| HeapError::OutOfMemory(format!("invalid layout: {e}")))?;

        // SAFETY: layout is non-zero-sized.
        let raw = unsafe { System.alloc_zeroed(layout) };
        let base = NonNull::new(raw)
            .ok_or_else(|| HeapError::OutOfMemory(format!("failed to allocate {size} bytes")))?;

        let mut table = ScatterGatherTable::with_capacity(1);
        table.push(ScatterGatherEntry {
            page: crate::page::PageHandle::new(base, crate::page::Residency::Low),
            len: size,
            offset: 0,
        });
        buffer.set_sg_table(table);
        tracing::debug!(size, "contiguous heap: allocate complete");
        Ok(())
    }

    fn free(&self, buffer: &mut dyn HeapBuffer) -> Result<()> {
        let table = buffer.take_sg_table();
        for entry in table.into_entries() {
            let layout = Layout::from_size_align(entry.len, self.page_size)
                .expect("layout used at allocation time must still be valid");
            unsafe {
                System.dealloc(entry.page.base().as_ptr(), layout);
            }
        }
        tracing::debug!("contiguous heap: free complete");
        Ok(())
    }
}
