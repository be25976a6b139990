//! The packer's transient output unit.

use crate::page::PageHandle;

/// An immutable record of a contiguous physical run produced by a single
/// allocation attempt.
///
/// Runs are transient: they exist from the moment the packer obtains them
/// until the moment they are installed into a buffer's scatter/gather
/// table, at which point `order` and `from_pool` are consumed (the table
/// entry recovers `order` from its byte length instead, per `spec.md` §9).
#[derive(Debug)]
pub struct RunDescriptor {
    pub page: PageHandle,
    pub order: u32,
    /// Optimistic label: whether this run's base page was observed to have
    /// come from a non-empty pool stack at the moment the packer inspected
    /// it. May be wrong under contention; only affects the aggregate
    /// readiness heuristic (`spec.md` §4.2, §4.3).
    pub from_pool: bool,
}

impl RunDescriptor {
    pub fn new(page: PageHandle, order: u32, from_pool: bool) -> Self {
        Self {
            page,
            order,
            from_pool,
        }
    }
}
