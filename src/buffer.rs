//! The buffer contract a heap allocates into.
//!
//! The shared-buffer subsystem that owns concrete buffers, per-client
//! bookkeeping, and the user-space mapping path is an external collaborator
//! (`spec.md` §1, out of scope). This module expresses the slice of that
//! contract the heap reads and writes as a trait, so the heap can be tested
//! without depending on that subsystem's concrete buffer type.

use bitflags::bitflags;

use crate::sg_table::ScatterGatherTable;

bitflags! {
    /// Buffer flag bits this backend recognizes. Any other bits a caller
    /// sets are ignored.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferFlags: u32 {
        /// CPU-cacheable mapping desired. Bypasses the page pools entirely.
        const CACHED = 1 << 0;
        /// The buffer will be mapped page-by-page via a fault handler;
        /// every run is split into single pages before being installed.
        const FAULT_USER_MAPPINGS = 1 << 1;
        /// Skip zeroing on free.
        const NOZEROED = 1 << 2;
        /// Force a DMA sync before marking the buffer ready.
        const SYNC_FORCE = 1 << 3;
    }
}

/// The fields and callbacks a [`crate::heap::HeapOps`] implementation reads
/// and writes on the buffer it is allocating into or freeing.
pub trait HeapBuffer {
    /// Bytes requested by the caller (unpadded).
    fn size(&self) -> usize;

    fn flags(&self) -> BufferFlags;

    /// Store the assembled scatter/gather table, replacing any previous one.
    fn set_sg_table(&mut self, table: ScatterGatherTable);

    /// Take the scatter/gather table for the free path. Implementations
    /// should leave the buffer's table empty afterward.
    fn take_sg_table(&mut self) -> ScatterGatherTable;

    /// Borrow the assembled scatter/gather table, e.g. for `map_dma`.
    fn sg_table(&self) -> Option<&ScatterGatherTable>;

    /// Latch buffer readiness. One-way: once called, the buffer's contents
    /// are safe for first device access without further cache maintenance.
    fn mark_ready(&mut self);
}

/// A minimal [`HeapBuffer`] implementation for standalone use and tests.
/// Real callers in the shared-buffer subsystem are expected to implement
/// the trait over their own buffer type instead of using this one.
#[derive(Debug, Default)]
pub struct SimpleBuffer {
    size: usize,
    flags: BufferFlags,
    table: Option<ScatterGatherTable>,
    ready: bool,
}

impl SimpleBuffer {
    pub fn new(size: usize, flags: BufferFlags) -> Self {
        Self {
            size,
            flags,
            table: None,
            ready: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }
}

impl HeapBuffer for SimpleBuffer {
    fn size(&self) -> usize {
        self.size
    }

    fn flags(&self) -> BufferFlags {
        self.flags
    }

    fn set_sg_table(&mut self, table: ScatterGatherTable) {
        self.table = Some(table);
    }

    fn take_sg_table(&mut self) -> ScatterGatherTable {
        self.table.take().unwrap_or_default()
    }

    fn sg_table(&self) -> Option<&ScatterGatherTable> {
        self.table.as_ref()
    }

    fn mark_ready(&mut self) {
        self.ready = true;
    }
}

impl Default for BufferFlags {
    fn default() -> Self {
        BufferFlags::empty()
    }
}
