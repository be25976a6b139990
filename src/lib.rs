//! # Tiered Page Heap
//!
//! A tiered page-allocation backend for a shared-buffer subsystem that hands
//! out physically-discontiguous memory regions to DMA-capable peripherals.
//!
//! The backend partitions allocations over a fixed set of allocation orders
//! (power-of-two page counts), caches freed pages in per-order pools to
//! amortise zeroing and reclaim cost, and assembles each buffer as a
//! scatter/gather list of variable-size physical runs.
//!
//! ## Architecture
//!
//! - [`pool::PagePool`] — one per order, a LIFO cache of freed runs with
//!   high/low memory accounting.
//! - [`packer`] — greedy large-order-first decomposition of a byte count
//!   into a sequence of runs.
//! - [`heap::SystemHeap`] — owns the pool array, implements the
//!   buffer-facing allocate/free/map contract.
//! - [`heap::ContiguousHeap`] — a one-shot, non-tiered satellite allocator
//!   included for interface completeness.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use tiered_page_heap::buffer::{BufferFlags, HeapBuffer, SimpleBuffer};
//! use tiered_page_heap::config::HeapConfig;
//! use tiered_page_heap::heap::{HeapOps, SystemHeap};
//! use tiered_page_heap::host::SystemHostAllocator;
//!
//! let config = HeapConfig::default();
//! let host = Arc::new(SystemHostAllocator::new(config.page_size));
//! let heap = SystemHeap::new(config, host);
//!
//! let mut buffer = SimpleBuffer::new(64 * 1024, BufferFlags::empty());
//! heap.allocate(&mut buffer, 0).unwrap();
//! heap.free(&mut buffer).unwrap();
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod heap;
pub mod host;
pub mod packer;
pub mod page;
pub mod pool;
pub mod run;
pub mod sg_table;

pub use error::{HeapError, Result};
