//! # pagepool - Page Buffer Pool for Single-File I/O
//!
//! pagepool is a user-space page cache for random and sequential I/O against
//! a single backing file. It is an alternative to memory-mapped I/O for
//! DBMS-style workloads where the application wants explicit control over
//! when pages are resident, when they are evicted, and when they are written
//! back. Callers perform byte-granular reads and writes at arbitrary
//! offsets; the pool stages fixed-size pages in memory and writes them
//! back to the file as needed.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pagepool::File;
//!
//! // A 1 GiB file backed by an 8 MiB page cache.
//! let f = File::create("data.bin", 1 << 30, 0)?;
//!
//! f.write_at(b"hello", 512)?;
//!
//! let mut buf = [0u8; 5];
//! f.read_at(&mut buf, 512)?;
//! assert_eq!(&buf, b"hello");
//!
//! f.close()?; // flush + sync + close
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │   File façade (fixed size, Clone-able)   │──┐
//! ├──────────────────────────────────────────┤  │ Stream (atomic cursor)
//! │   Pager (bounds, page-chunk dispatch)    │◄─┘
//! ├──────────────────────────────────────────┤
//! │   Shard[0..n]  (map + dirty-set + LRU)   │   n = power of two, ≤ 128
//! ├──────────────────────────────────────────┤
//! │   BackingFile (positional read/write)    │
//! └──────────────────────────────────────────┘
//! ```
//!
//! A request is clamped against the file's committed size, then walked in
//! page-aligned chunks. Each chunk locks exactly one shard, selected by
//! `page_number & (nshards - 1)`. On a miss into a full shard the
//! least-recently-used page is reclaimed, written back first if dirty.
//! Writes only dirty in-memory pages; [`Pager::flush`] writes them back and
//! [`Pager::sync`] additionally commits to stable storage.
//!
//! ## Concurrency
//!
//! All operations take `&self` and are thread-safe. Reads and writes run
//! under a shared pager lock and serialize per page on the owning shard's
//! mutex, so operations on different pages proceed in parallel. `flush`,
//! `sync`, `close`, and `truncate` take the pager lock exclusively.
//!
//! ## Durability
//!
//! There is no write-ahead log: a crash before `flush` loses buffered
//! writes. The on-disk format is byte-identical to what the caller wrote;
//! pages are purely an in-memory optimization with no headers or checksums.
//!
//! ## Module Overview
//!
//! - `backing`: the positional-I/O contract a backing file must satisfy
//! - `config`: cache geometry (page size, shard count, per-shard quota)
//! - `page` / `shard`: arena-based intrusive LRU partitions
//! - `pager`: the file-scoped coordinator, both size policies
//! - `stream`: sequential cursor over a pager
//! - `file`: fixed-size façade with clone and metadata passthroughs

mod backing;
mod config;
mod file;
mod page;
mod pager;
mod shard;
mod stream;

pub use backing::BackingFile;
pub use config::{DEFAULT_BUFFER_SIZE, DEFAULT_PAGE_SIZE};
pub use file::File;
pub use pager::{Closed, Pager};
pub use stream::Stream;
