//! The tiered system heap: packs a requested size into runs, serves pooled
//! or fresh pages per run, and assembles the result into a scatter/gather
//! table.
//!
//! Grounded on `ion_system_heap_allocate`/`ion_system_heap_free` in the
//! original `ion_system_heap.c`.

use std::sync::Arc;

use crate::buffer::{BufferFlags, HeapBuffer};
use crate::config::HeapConfig;
use crate::error::{HeapError, Result};
use crate::heap::HeapOps;
use crate::host::HostAllocator;
use crate::packer;
use crate::pool::PagePool;
use crate::sg_table::{ScatterGatherEntry, ScatterGatherTable};

/// Owns the pool array and the host allocator handle. One per
/// shared-buffer subsystem instance.
pub struct SystemHeap {
    config: HeapConfig,
    pools: Vec<PagePool>,
    host: Arc<dyn HostAllocator>,
}

impl SystemHeap {
    /// Construct a heap with one pool per configured order.
    pub fn new(config: HeapConfig, host: Arc<dyn HostAllocator>) -> Self {
        let pools = config
            .orders
            .iter()
            .map(|&order| PagePool::new(order, Arc::clone(&host)))
            .collect();
        tracing::info!(orders = ?config.orders, "system heap: constructed");
        Self {
            config,
            pools,
            host,
        }
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Recover a run's order from its scatter/gather entry's byte length:
    /// `order = log2(length / page_size)`, matching `get_order(sg_dma_len(sg))`
    /// in the original C source.
    ///
    /// An entry whose length doesn't correspond to a whole power-of-two
    /// multiple of the page size, or to one of this heap's configured
    /// orders, is a programming error, not a runtime condition — caught
    /// loudly via `debug_assert!` in non-release builds and returned as
    /// [`HeapError::InvalidOrder`] otherwise.
    fn order_from_entry_len(&self, len: usize) -> Result<u32> {
        let page_size = self.config.page_size;
        let pages = (len / page_size) as u32;
        let order = pages.trailing_zeros();
        let valid =
            len % page_size == 0 && pages.is_power_of_two() && self.config.orders.contains(&order);
        debug_assert!(
            valid,
            "scatter/gather entry length {len} does not correspond to a configured order"
        );
        if valid {
            Ok(order)
        } else {
            Err(HeapError::InvalidOrder(order))
        }
    }

    /// Per-order high/low residency counts and byte totals, in the format
    /// `spec.md` §6 specifies for debug output.
    pub fn debug_dump(&self) -> String {
        let mut out = String::new();
        for pool in &self.pools {
            let high = pool.count_high();
            let low = pool.count_low();
            let order = pool.order();
            let unit = self.config.order_bytes(order);
            out.push_str(&format!(
                "{high} order {order} highmem pages in pool = {} total\n",
                unit * high
            ));
            out.push_str(&format!(
                "{low} order {order} lowmem pages in pool = {} total\n",
                unit * low
            ));
        }
        out
    }
}

impl HeapOps for SystemHeap {
    fn allocate(&self, buffer: &mut dyn HeapBuffer, _align: usize) -> Result<()> {
        let flags = buffer.flags();
        let padded = self.config.page_align(buffer.size());

        let runs = packer::pack(&self.pools, &self.host, &self.config, padded, flags)?;

        let mut table = ScatterGatherTable::with_capacity(runs.len());
        let mut all_from_pool = true;
        for run in runs {
            all_from_pool &= run.from_pool;
            table.push(ScatterGatherEntry {
                len: self.config.order_bytes(run.order),
                offset: 0,
                page: run.page,
            });
        }

        let sync_force = flags.contains(BufferFlags::SYNC_FORCE);
        if sync_force {
            self.host.sync(&table);
        }

        if all_from_pool || sync_force {
            // Pooled pages are already zeroed and cache-clean from a prior
            // free, so no pre-use sync is required on first use.
            buffer.mark_ready();
        }

        tracing::debug!(
            entries = table.entries().len(),
            bytes = table.total_bytes(),
            all_from_pool,
            sync_force,
            "system heap: allocate complete"
        );

        buffer.set_sg_table(table);
        Ok(())
    }

    fn free(&self, buffer: &mut dyn HeapBuffer) -> Result<()> {
        let flags = buffer.flags();
        let cached = flags.contains(BufferFlags::CACHED);
        let split = flags.contains(BufferFlags::FAULT_USER_MAPPINGS);
        let nozeroed = flags.contains(BufferFlags::NOZEROED);

        let table = buffer.take_sg_table();

        if !cached && !nozeroed {
            for entry in table.entries() {
                let order = self.order_from_entry_len(entry.len)?;
                self.host.zero_run(&entry.page, order);
            }
        }

        for entry in table.into_entries() {
            let order = self.order_from_entry_len(entry.len)?;
            if !cached && !split {
                match self.pools.iter().find(|p| p.order() == order) {
                    Some(pool) => {
                        pool.free(entry.page);
                        continue;
                    }
                    None => {
                        // `order` just passed validation against
                        // `config.orders`, so every pool should exist for
                        // it; a miss here means the pool array and the
                        // order set have gone out of sync.
                        debug_assert!(
                            false,
                            "order {order} validated against the configured set but has no matching pool"
                        );
                    }
                }
            }
            self.host.free_run(entry.page, order);
        }

        tracing::debug!("system heap: free complete");
        Ok(())
    }
}
