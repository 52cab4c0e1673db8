//! # Pager
//!
//! The pager is the file-scoped coordinator: it owns the backing file, the
//! cache geometry, the shard array, and the authoritative file size. Every
//! byte-range operation is validated and clamped here, then walked in
//! page-aligned chunks, each dispatched to the shard owning that page.
//!
//! ## Size policies
//!
//! The same cache serves two policies over the committed size:
//!
//! - **Fixed**: the size is committed at construction and only changes via
//!   [`Pager::truncate`]. Reads *and* writes past the end are clamped to
//!   the in-bounds prefix and report a short count. Once closed, every
//!   operation fails with [`Closed`].
//! - **Grow**: the size starts unknown and is read from the file on first
//!   use; writes past the end extend it. Only reads clamp.
//!
//! ## Locking
//!
//! A readers-writer lock guards the size and the closed flag. `read_at`
//! and `write_at` hold it shared for their whole page walk; `flush`,
//! `sync`, `close`, and `truncate` hold it exclusive, which also fences
//! out all in-flight I/O. Growing the size briefly drops the shared lock
//! and retakes it exclusive; two racing extenders settle on the larger
//! end, and the winner's guard is downgraded back to shared without a gap.
//!
//! Each shard has its own mutex, held for exactly one page's worth of
//! work. Shard locks are only ever taken under the shared pager lock,
//! never the other way around, so the order is acyclic.

use std::fmt;

use eyre::{ensure, Result};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backing::{self, BackingFile};
use crate::config::Geometry;
use crate::page::Page;
use crate::shard::Shard;

/// Error reported by every operation on a pool whose file has been closed.
///
/// Retrievable from the report chain via
/// `err.downcast_ref::<Closed>()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closed;

impl fmt::Display for Closed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("file already closed")
    }
}

impl std::error::Error for Closed {}

/// How the pool interprets I/O past the committed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SizePolicy {
    /// Size fixed at construction; out-of-range I/O is truncated.
    Fixed,
    /// Size lazily read from the file and extended to cover writes.
    Grow,
}

/// Size and lifecycle state, guarded by the pager lock.
struct Meta {
    /// Logical file size in bytes; negative means "not yet known"
    /// (Grow policy only).
    size: i64,
    closed: bool,
}

/// One page-granular transfer direction.
enum PageIo<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

/// Sharded page buffer pool over a single backing file.
///
/// All operations take `&self`; share the pager across threads with
/// [`Arc`](std::sync::Arc). This type is the grow-on-write variant; the
/// fixed-size policy is exposed through [`crate::File`].
pub struct Pager<F = std::fs::File> {
    file: F,
    pgsize: usize,
    pgmax: usize,
    policy: SizePolicy,
    meta: RwLock<Meta>,
    shards: Box<[Mutex<Shard>]>,
}

impl<F: BackingFile> Pager<F> {
    /// Wraps `file` with the default page size and an 8 MiB buffer.
    pub fn new(file: F) -> Self {
        Self::with_size(file, 0, 0)
    }

    /// Wraps `file` with an explicit geometry. Zero means "use the
    /// default" for either argument; a non-power-of-two page size rounds
    /// up.
    pub fn with_size(file: F, page_size: usize, buffer_size: usize) -> Self {
        Self::with_policy(file, SizePolicy::Grow, -1, page_size, buffer_size)
    }

    pub(crate) fn fixed(file: F, size: i64, buffer_size: usize) -> Self {
        Self::with_policy(file, SizePolicy::Fixed, size, 0, buffer_size)
    }

    fn with_policy(
        file: F,
        policy: SizePolicy,
        size: i64,
        page_size: usize,
        buffer_size: usize,
    ) -> Self {
        let geo = Geometry::compute(page_size, buffer_size);
        debug_assert!(geo.nshards.is_power_of_two() && geo.pgmax >= 1);
        let shards: Vec<Mutex<Shard>> = (0..geo.nshards)
            .map(|_| Mutex::new(Shard::default()))
            .collect();
        Self {
            file,
            pgsize: geo.pgsize,
            pgmax: geo.pgmax,
            policy,
            meta: RwLock::new(Meta {
                size,
                closed: false,
            }),
            shards: shards.into_boxed_slice(),
        }
    }

    /// Reads up to `b.len()` bytes at byte offset `off`.
    ///
    /// Returns the number of bytes read; a count short of `b.len()`
    /// (including zero) means the request extended past the end of the
    /// file. Negative offsets are rejected.
    pub fn read_at(&self, b: &mut [u8], off: i64) -> Result<usize> {
        ensure!(off >= 0, "negative offset");
        let (meta, eff) = self.bounds(off, b.len(), false)?;
        let pgsize = self.pgsize as u64;
        let mut off = off as u64;
        let mut done = 0;
        while done < eff {
            let pnum = off / pgsize;
            let pstart = (off & (pgsize - 1)) as usize;
            let pend = (pstart + (eff - done)).min(self.pgsize);
            let n = pend - pstart;
            self.pio(pnum, pstart, pend, meta.size, PageIo::Read(&mut b[done..done + n]))?;
            off += n as u64;
            done += n;
        }
        Ok(done)
    }

    /// Writes up to `b.len()` bytes at byte offset `off`.
    ///
    /// Under the Grow policy the committed size is extended to cover the
    /// write and the full count is returned. Under the Fixed policy writes
    /// past the committed size are truncated and the short count reports
    /// how much fell in bounds. Negative offsets are rejected.
    pub fn write_at(&self, b: &[u8], off: i64) -> Result<usize> {
        ensure!(off >= 0, "negative offset");
        let (meta, eff) = self.bounds(off, b.len(), true)?;
        let pgsize = self.pgsize as u64;
        let mut off = off as u64;
        let mut done = 0;
        while done < eff {
            let pnum = off / pgsize;
            let pstart = (off & (pgsize - 1)) as usize;
            let pend = (pstart + (eff - done)).min(self.pgsize);
            let n = pend - pstart;
            self.pio(pnum, pstart, pend, meta.size, PageIo::Write(&b[done..done + n]))?;
            off += n as u64;
            done += n;
        }
        Ok(done)
    }

    /// Validates the request against the committed size and returns the
    /// pager lock (held shared for the caller's page walk) plus the
    /// effective transfer length.
    fn bounds(&self, off: i64, len: usize, write: bool) -> Result<(RwLockReadGuard<'_, Meta>, usize)> {
        let mut meta = self.meta.read();
        let end = off.saturating_add(len as i64);
        let grows = write && self.policy == SizePolicy::Grow;
        if meta.size < 0 || (grows && end > meta.size) {
            drop(meta);
            let mut exclusive = self.meta.write();
            if exclusive.size < 0 {
                exclusive.size = self.file.len()? as i64;
            }
            if grows && end > exclusive.size {
                exclusive.size = end;
            }
            meta = RwLockWriteGuard::downgrade(exclusive);
        }
        ensure!(!meta.closed, Closed);
        let eff = if grows {
            len
        } else {
            (meta.size - off).clamp(0, len as i64) as usize
        };
        Ok((meta, eff))
    }

    /// One page's worth of I/O: look the page up in its shard, faulting
    /// and evicting as needed, then copy through the cached buffer. The
    /// shard lock is held for the whole call.
    fn pio(&self, pnum: u64, pstart: usize, pend: usize, size: i64, op: PageIo<'_>) -> Result<()> {
        let write = matches!(op, PageIo::Write(_));
        let partial = pend - pstart < self.pgsize;
        let mut s = self.shards[(pnum as usize) & (self.shards.len() - 1)].lock();
        s.init();
        let idx = match s.map.get(&pnum).copied() {
            Some(idx) => {
                s.bump(idx);
                idx
            }
            None => {
                let idx = if s.len() >= self.pgmax {
                    // At quota: reclaim the LRU slot, writing it back
                    // first if dirty.
                    let idx = s.lru();
                    s.pop(idx);
                    let old = s.page(idx).num;
                    s.map.remove(&old);
                    if s.dirty.remove(&old) {
                        if let Err(err) = self.write_page(s.page(idx), size) {
                            s.release(idx);
                            return Err(err);
                        }
                    }
                    // Residual bytes from the evicted page must not leak
                    // into the unwritten range of a partial write. Reads
                    // and full-page writes overwrite what they expose.
                    if write && partial {
                        s.page_mut(idx).data.fill(0);
                    }
                    idx
                } else {
                    s.alloc(self.pgsize)
                };
                s.page_mut(idx).num = pnum;
                // Full-page writes clobber the whole buffer; everyone else
                // needs the on-disk bytes first. End-of-file reads short.
                if !write || partial {
                    if let Err(err) = self.read_page(s.page_mut(idx)) {
                        s.release(idx);
                        return Err(err);
                    }
                }
                s.map.insert(pnum, idx);
                s.push(idx);
                idx
            }
        };
        match op {
            PageIo::Write(b) => {
                s.page_mut(idx).data[pstart..pend].copy_from_slice(b);
                s.dirty.insert(pnum);
            }
            PageIo::Read(b) => b.copy_from_slice(&s.page(idx).data[pstart..pend]),
        }
        Ok(())
    }

    /// Fills a page buffer from the file; a short read (end-of-file)
    /// leaves the tail of the buffer as-is.
    fn read_page(&self, p: &mut Page) -> Result<()> {
        let off = p.num * self.pgsize as u64;
        backing::read_full_at(&self.file, &mut p.data, off)?;
        Ok(())
    }

    /// Writes a page buffer back, truncated to the committed size so a
    /// non-page-aligned tail keeps the file's intended length. A page
    /// wholly past the size writes nothing.
    fn write_page(&self, p: &Page, size: i64) -> Result<()> {
        let off = p.num * self.pgsize as u64;
        let end = (size - off as i64).clamp(0, self.pgsize as i64) as usize;
        if end == 0 {
            return Ok(());
        }
        backing::write_full_at(&self.file, &p.data[..end], off)?;
        Ok(())
    }

    /// Writes every dirty page back to the file.
    ///
    /// On error the failing page stays dirty and the flush stops; pages
    /// already written remain clean.
    pub fn flush(&self) -> Result<()> {
        let meta = self.meta.write();
        ensure!(!meta.closed, Closed);
        self.flush_locked(&meta)
    }

    fn flush_locked(&self, meta: &Meta) -> Result<()> {
        for shard in self.shards.iter() {
            let mut s = shard.lock();
            let dirty: Vec<u64> = s.dirty.iter().copied().collect();
            for pnum in dirty {
                let Some(idx) = s.map.get(&pnum).copied() else {
                    continue;
                };
                self.write_page(s.page(idx), meta.size)?;
                s.dirty.remove(&pnum);
            }
        }
        Ok(())
    }

    /// Flushes, then asks the file to commit to stable storage.
    pub fn sync(&self) -> Result<()> {
        let meta = self.meta.write();
        ensure!(!meta.closed, Closed);
        self.flush_locked(&meta)?;
        self.file.sync()?;
        Ok(())
    }

    /// Flushes and syncs, then marks the pool closed. The closed flag is
    /// set even when flushing fails; the first error wins.
    pub(crate) fn close(&self) -> Result<()> {
        let mut meta = self.meta.write();
        ensure!(!meta.closed, Closed);
        let flushed = self.flush_locked(&meta);
        let synced = self.file.sync();
        meta.closed = true;
        flushed?;
        synced?;
        Ok(())
    }

    /// Resizes the backing file and the committed size. Cached pages
    /// outside the new size are not evicted; reads clamp against the new
    /// size and tail writeback uses it.
    pub fn truncate(&self, size: i64) -> Result<()> {
        ensure!(size >= 0, "negative size");
        let mut meta = self.meta.write();
        ensure!(!meta.closed, Closed);
        self.file.set_len(size as u64)?;
        meta.size = size;
        Ok(())
    }

    /// The committed file size, reading it from the file if not yet
    /// known.
    pub fn size(&self) -> Result<i64> {
        let meta = self.meta.read();
        if meta.size >= 0 {
            return Ok(meta.size);
        }
        drop(meta);
        let mut meta = self.meta.write();
        if meta.size < 0 {
            meta.size = self.file.len()? as i64;
        }
        Ok(meta.size)
    }

    /// Number of pages currently resident across all shards.
    pub fn pages(&self) -> usize {
        let _meta = self.meta.read();
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    /// Page size in bytes.
    pub fn page_size(&self) -> usize {
        self.pgsize
    }

    /// Upper bound on resident pages (per-shard quota times shard count).
    pub fn max_pages(&self) -> usize {
        self.pgmax * self.shards.len()
    }

    /// Number of cache shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub(crate) fn committed_size(&self) -> i64 {
        self.meta.read().size
    }

    pub(crate) fn check_open(&self) -> Result<()> {
        ensure!(!self.meta.read().closed, Closed);
        Ok(())
    }

    pub(crate) fn file(&self) -> &F {
        &self.file
    }
}
