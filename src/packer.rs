//! Greedy large-order-first decomposition of a byte count into runs.
//!
//! Grounded on `alloc_largest_available`/`ion_system_heap_allocate` in the
//! original `ion_system_heap.c`: walk the order set from largest to
//! smallest under a monotonically non-increasing cap, serve the first order
//! that fits, and lower the cap to whatever order was actually served. This
//! biases the buffer toward a small number of large runs.

use std::sync::Arc;

use crate::buffer::BufferFlags;
use crate::config::HeapConfig;
use crate::error::{HeapError, Result};
use crate::host::{AllocIntent, HostAllocator};
use crate::pool::PagePool;
use crate::run::RunDescriptor;

/// Decompose `size` (already page-aligned) into an ordered, non-empty list
/// of runs whose summed byte extents equal `size`.
///
/// On failure, every run already collected is freed before returning the
/// error — no partial allocation is left attached to the caller.
pub fn pack(
    pools: &[PagePool],
    host: &Arc<dyn HostAllocator>,
    config: &HeapConfig,
    size: usize,
    flags: BufferFlags,
) -> Result<Vec<RunDescriptor>> {
    let mut remaining = size;
    let mut cap = config.max_order();
    let mut runs: Vec<RunDescriptor> = Vec::new();

    while remaining > 0 {
        match alloc_largest_available(pools, host, config, remaining, cap, flags)? {
            Some((mut descriptors, served_order)) => {
                remaining -= config.order_bytes(served_order);
                cap = served_order;
                runs.append(&mut descriptors);
            }
            None => {
                tracing::warn!(remaining, "packer: exhausted all orders, unwinding");
                free_runs(pools, host, runs, flags);
                return Err(HeapError::OutOfMemory(format!(
                    "no order could satisfy {remaining} remaining bytes"
                )));
            }
        }
    }

    Ok(runs)
}

/// Try every order from largest to smallest, skipping any whose extent
/// exceeds `remaining` or `cap`. Returns the descriptors produced by the
/// first order that yields a run, along with that order, or `Ok(None)` if
/// none did.
fn alloc_largest_available(
    pools: &[PagePool],
    host: &Arc<dyn HostAllocator>,
    config: &HeapConfig,
    remaining: usize,
    cap: u32,
    flags: BufferFlags,
) -> Result<Option<(Vec<RunDescriptor>, u32)>> {
    for (index, &order) in config.orders.iter().enumerate() {
        let extent = config.order_bytes(order);
        if extent > remaining || order > cap {
            continue;
        }

        if let Some(descriptors) = alloc_run(&pools[index], host, order, flags)? {
            return Ok(Some((descriptors, order)));
        }
    }
    Ok(None)
}

/// Serve or allocate a single run at `order`, applying the cached-bypass and
/// fault-user-mappings-split policies of `spec.md` §4.2.
fn alloc_run(
    pool: &PagePool,
    host: &Arc<dyn HostAllocator>,
    order: u32,
    flags: BufferFlags,
) -> Result<Option<Vec<RunDescriptor>>> {
    let cached = flags.contains(BufferFlags::CACHED);

    // Optimistic label, inspected before the allocation attempt. May race
    // with a concurrent allocator draining or refilling the pool; the label
    // is only used by the aggregate readiness heuristic, so mislabelling is
    // harmless (`spec.md` §4.2).
    let from_pool = !cached && pool.count_total() > 0;

    let page = if cached {
        host.alloc_run(order, AllocIntent::for_order(order))
    } else {
        pool.alloc()
    };
    let Some(page) = page else {
        return Ok(None);
    };

    if flags.contains(BufferFlags::FAULT_USER_MAPPINGS) && order > 0 {
        let pages = host.split_run(page, order)?;
        return Ok(Some(
            pages
                .into_iter()
                .map(|p| RunDescriptor::new(p, 0, from_pool))
                .collect(),
        ));
    }

    Ok(Some(vec![RunDescriptor::new(page, order, from_pool)]))
}

/// Unwind: return every collected run either to its pool or to the host,
/// mirroring the free-path dispatch a run would have taken.
fn free_runs(
    pools: &[PagePool],
    host: &Arc<dyn HostAllocator>,
    runs: Vec<RunDescriptor>,
    flags: BufferFlags,
) {
    let cached = flags.contains(BufferFlags::CACHED);
    let split = flags.contains(BufferFlags::FAULT_USER_MAPPINGS);
    for run in runs {
        if !cached && !split {
            match pools.iter().find(|p| p.order() == run.order) {
                Some(pool) => {
                    pool.free(run.page);
                    continue;
                }
                None => {
                    // `run.order` always comes from `config.orders` or from a
                    // split (order 0); a missing pool here only means this
                    // heap's order set omits order 0, not a corrupted order.
                    debug_assert!(
                        run.order == 0,
                        "run order {} has no matching pool",
                        run.order
                    );
                }
            }
        }
        host.free_run(run.page, run.order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SystemHostAllocator;

    fn setup() -> (HeapConfig, Vec<PagePool>, Arc<dyn HostAllocator>) {
        let config = HeapConfig::default();
        let host: Arc<dyn HostAllocator> = Arc::new(SystemHostAllocator::new(config.page_size));
        let pools = config
            .orders
            .iter()
            .map(|&order| PagePool::new(order, Arc::clone(&host)))
            .collect();
        (config, pools, host)
    }

    fn free_all(pools: &[PagePool], host: &Arc<dyn HostAllocator>, runs: Vec<RunDescriptor>) {
        for run in runs {
            if let Some(pool) = pools.iter().find(|p| p.order() == run.order) {
                pool.free(run.page);
            } else {
                host.free_run(run.page, run.order);
            }
        }
    }

    #[test]
    fn packs_one_mib_as_a_single_order_eight_run() {
        let (config, pools, host) = setup();
        let runs = pack(&pools, &host, &config, 1024 * 1024, BufferFlags::empty()).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].order, 8);
        assert!(!runs[0].from_pool);
        free_all(&pools, &host, runs);
    }

    #[test]
    fn orders_never_increase_across_successive_runs() {
        let (config, pools, host) = setup();
        // 1 MiB + 68 KiB: order 8 (1 MiB) leaves 68 KiB, which must be
        // satisfied by order 4 + order 0 pairs, never by re-trying order 8.
        let size = 1024 * 1024 + 68 * 1024;
        let runs = pack(&pools, &host, &config, size, BufferFlags::empty()).unwrap();

        let mut last_order = u32::MAX;
        for run in &runs {
            assert!(run.order <= last_order, "order increased mid-pack");
            last_order = run.order;
        }
        let total: usize = runs.iter().map(|r| config.order_bytes(r.order)).sum();
        assert_eq!(total, size);
        free_all(&pools, &host, runs);
    }

    #[test]
    fn sixty_eight_kib_skips_order_eight() {
        let (config, pools, host) = setup();
        let runs = pack(&pools, &host, &config, 68 * 1024, BufferFlags::empty()).unwrap();
        let orders: Vec<u32> = runs.iter().map(|r| r.order).collect();
        assert!(!orders.contains(&8));
        let total: usize = runs.iter().map(|r| config.order_bytes(r.order)).sum();
        assert_eq!(total, 68 * 1024);
        free_all(&pools, &host, runs);
    }

    #[test]
    fn every_run_order_is_in_the_configured_set() {
        let (config, pools, host) = setup();
        let runs = pack(&pools, &host, &config, 5 * 1024 * 1024, BufferFlags::empty()).unwrap();
        for run in &runs {
            assert!(config.orders.contains(&run.order) || run.order == 0);
        }
        free_all(&pools, &host, runs);
    }

    #[test]
    fn cached_flag_bypasses_pools_entirely() {
        let (config, pools, host) = setup();
        let runs = pack(&pools, &host, &config, 1024 * 1024, BufferFlags::CACHED).unwrap();
        assert!(runs.iter().all(|r| !r.from_pool));
        for run in runs {
            host.free_run(run.page, run.order);
        }
        for pool in &pools {
            assert_eq!(pool.count_total(), 0);
        }
    }

    #[test]
    fn fault_user_mappings_splits_every_run_to_order_zero() {
        let (config, pools, host) = setup();
        // One order-4 run (16 pages) split down to 16 order-0 descriptors.
        let size = config.order_bytes(4);
        let runs = pack(
            &pools,
            &host,
            &config,
            size,
            BufferFlags::FAULT_USER_MAPPINGS,
        )
        .unwrap();
        assert_eq!(runs.len(), 16);
        assert!(runs.iter().all(|r| r.order == 0));
        free_all(&pools, &host, runs);
    }

    #[test]
    fn repeated_alloc_free_is_served_entirely_from_pool() {
        let (config, pools, host) = setup();
        let first = pack(&pools, &host, &config, 1024 * 1024, BufferFlags::empty()).unwrap();
        free_all(&pools, &host, first);

        let second = pack(&pools, &host, &config, 1024 * 1024, BufferFlags::empty()).unwrap();
        assert!(second.iter().all(|r| r.from_pool));
        free_all(&pools, &host, second);
    }
}
