//! The heap-operations interface consumed by the outer shared-buffer
//! subsystem, and the two heap implementations that install into it.

mod contiguous;
mod system;

pub use contiguous::ContiguousHeap;
pub use system::SystemHeap;

use crate::buffer::HeapBuffer;
use crate::error::Result;

/// A record of function pointers the outer subsystem dispatches through
/// (`spec.md` §6). `map_kernel`/`unmap_kernel`/`map_user` delegate to
/// generic helpers supplied by the subsystem — represented here by
/// [`generic_mmap`] — rather than being reimplemented by every concrete
/// heap.
pub trait HeapOps {
    /// Materialize `buffer.size()` bytes as a scatter/gather table of
    /// physical runs, honoring `buffer.flags()`. `align` is accepted for
    /// interface completeness but this backend guarantees no stronger
    /// alignment than one page.
    fn allocate(&self, buffer: &mut dyn HeapBuffer, align: usize) -> Result<()>;

    /// Release every run in the buffer's scatter/gather table.
    ///
    /// Ordinary operation never fails: the only error this can return is
    /// [`crate::error::HeapError::InvalidOrder`], which signals a
    /// programming error (a scatter/gather entry with a corrupt length)
    /// rather than a runtime condition.
    fn free(&self, buffer: &mut dyn HeapBuffer) -> Result<()>;

    /// Return the already-assembled table. DMA address resolution is
    /// deferred to a downstream mapper.
    fn map_dma(&self, buffer: &dyn HeapBuffer) -> Option<&crate::sg_table::ScatterGatherTable> {
        buffer.sg_table()
    }

    /// No-op: this backend performs no teardown work at unmap time.
    fn unmap_dma(&self, _buffer: &mut dyn HeapBuffer) {}

    fn map_kernel(&self, buffer: &dyn HeapBuffer) -> Result<()> {
        generic_mmap::map_kernel(buffer)
    }

    fn unmap_kernel(&self, buffer: &dyn HeapBuffer) {
        generic_mmap::unmap_kernel(buffer)
    }

    fn map_user(&self, buffer: &dyn HeapBuffer) -> Result<()> {
        generic_mmap::map_user(buffer)
    }
}

/// Stand-ins for the generic kernel/user mapping helpers the outer
/// subsystem supplies. Kernel virtual mapping and the page-fault/VMA
/// installation path are explicitly out of scope (`spec.md` §1); these
/// exist only so `HeapOps`'s default methods have somewhere to delegate.
pub mod generic_mmap {
    use crate::buffer::HeapBuffer;
    use crate::error::Result;

    pub fn map_kernel(_buffer: &dyn HeapBuffer) -> Result<()> {
        Ok(())
    }

    pub fn unmap_kernel(_buffer: &dyn HeapBuffer) {}

    pub fn map_user(_buffer: &dyn HeapBuffer) -> Result<()> {
        Ok(())
    }
}
