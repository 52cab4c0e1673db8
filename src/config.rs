//! # Cache Geometry
//!
//! This module centralizes the sizing constants and the computation that
//! turns a requested `(page_size, buffer_size)` pair into a concrete cache
//! geometry: page size, shard count, and per-shard page quota.
//!
//! ## Relationships
//!
//! ```text
//! page_size (power of two, default 4096)
//!       │
//!       └─> total_pages = max(buffer_size / page_size, MIN_TOTAL_PAGES)
//!                 │
//!                 └─> nshards = pow2(min(ceil(total_pages / 32), 128))
//!                           │
//!                           └─> pgmax = total_pages / nshards  (per shard)
//! ```
//!
//! The shard count is always a power of two so that shard dispatch is a bit
//! mask (`page_number & (nshards - 1)`) instead of a modulo. The
//! 32-pages-per-shard target balances lock contention against footprint;
//! the floor of four total pages avoids degenerate single-page thrashing.

/// Size of each cache page in bytes unless the caller chooses otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default upper bound on cache memory, 8 MiB.
pub const DEFAULT_BUFFER_SIZE: usize = 0x0080_0000;

/// Minimum number of pages across all shards.
pub const MIN_TOTAL_PAGES: usize = 4;

/// Ideal number of pages per shard.
pub const PAGES_PER_SHARD: usize = 32;

/// Maximum number of shards per pool.
pub const MAX_SHARDS: usize = 128;

const _: () = assert!(DEFAULT_PAGE_SIZE.is_power_of_two());

const _: () = assert!(MAX_SHARDS.is_power_of_two());

const _: () = assert!(
    DEFAULT_BUFFER_SIZE >= DEFAULT_PAGE_SIZE * MIN_TOTAL_PAGES,
    "default buffer must hold the minimum page count"
);

/// Concrete cache shape derived from a requested page and buffer size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
    /// Page size in bytes, a power of two.
    pub pgsize: usize,
    /// Per-shard page quota.
    pub pgmax: usize,
    /// Number of shards, a power of two in `[1, MAX_SHARDS]`.
    pub nshards: usize,
}

impl Geometry {
    /// Computes the cache geometry. Zero means "use the default" for both
    /// arguments; a non-power-of-two page size rounds up, and a buffer
    /// smaller than one page is raised to one page.
    pub fn compute(page_size: usize, buffer_size: usize) -> Self {
        let mut pgsize = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        if !pgsize.is_power_of_two() {
            pgsize = pgsize.next_power_of_two();
        }

        let mut bufsize = if buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            buffer_size
        };
        if bufsize < pgsize {
            bufsize = pgsize;
        }

        let total = (bufsize / pgsize).max(MIN_TOTAL_PAGES);
        let nshards = total
            .div_ceil(PAGES_PER_SHARD)
            .min(MAX_SHARDS)
            .next_power_of_two();

        Self {
            pgsize,
            pgmax: total / nshards,
            nshards,
        }
    }
}
