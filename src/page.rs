//! Opaque physical page handles.

use std::ptr::NonNull;

/// Kernel-residency class of a physical page.
///
/// Low memory is directly mapped into the kernel address space; high memory
/// is not. The pool keeps separate stacks per class (`spec.md` §3) because
/// releasing high memory back to the system is cheaper, so it is preferred
/// on allocation and drained last on shrink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Residency {
    High,
    Low,
}

/// Opaque reference to a physical page frame, as handed out by a
/// [`crate::host::HostAllocator`].
///
/// `PageHandle` is transient: it is single-owner from the moment the host
/// allocator produces it until it is either pushed onto a pool stack,
/// installed into a scatter/gather entry, or handed back to the host.
#[derive(Debug)]
pub struct PageHandle {
    base: NonNull<u8>,
    residency: Residency,
}

// SAFETY: a `PageHandle` has exactly one owner at a time (pool stack,
// in-flight run, or scatter/gather entry); it carries no thread-affine
// state.
unsafe impl Send for PageHandle {}

impl PageHandle {
    /// Construct a handle around a base address obtained from the host
    /// allocator.
    pub fn new(base: NonNull<u8>, residency: Residency) -> Self {
        Self { base, residency }
    }

    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    pub fn residency(&self) -> Residency {
        self.residency
    }
}
