//! Crate-wide error type.

use thiserror::Error;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, HeapError>;

#[derive(Error, Debug)]
pub enum HeapError {
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("order {0} is not in the heap's allowed order set")]
    InvalidOrder(u32),

    #[error("failed to allocate scatter/gather table: {0}")]
    ScatterGatherAllocation(String),
}
