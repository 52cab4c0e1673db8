//! # File Façade
//!
//! A size-capped, cloneable wrapper around a fixed-size pager over an
//! on-disk file. The committed size is established at `create`/`open`
//! time and only moves through [`File::truncate`]; reads and writes past
//! it are clamped to the in-bounds prefix.
//!
//! Clones share one pager (a single cache, dirty-set, and closed flag)
//! but each clone carries its own sequential cursor starting at zero.
//! Closing through any clone flushes and syncs; afterwards every
//! operation on every clone fails with [`Closed`](crate::Closed).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use eyre::{ensure, Result, WrapErr};

use crate::pager::Pager;

/// A buffered file of fixed size.
///
/// All I/O goes through the shared page cache; nothing reaches the disk
/// until [`File::flush`], [`File::sync`], [`File::close`], or an eviction
/// writes pages back.
pub struct File {
    pager: Arc<Pager<fs::File>>,
    path: PathBuf,
    off: AtomicI64,
}

impl File {
    /// Creates (or truncates) the file at `path` and sizes it to `size`
    /// bytes. Zero `buffer_size` means the 8 MiB default.
    pub fn create<P: AsRef<Path>>(path: P, size: i64, buffer_size: usize) -> Result<Self> {
        let path = path.as_ref();
        ensure!(size >= 0, "negative file size");
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create '{}'", path.display()))?;
        file.set_len(size as u64)
            .wrap_err_with(|| format!("failed to size '{}' to {} bytes", path.display(), size))?;
        Ok(Self::from_pager(Pager::fixed(file, size, buffer_size), path))
    }

    /// Opens the file at `path` read-write; the committed size is the
    /// file's current length.
    pub fn open<P: AsRef<Path>>(path: P, buffer_size: usize) -> Result<Self> {
        let mut opts = fs::OpenOptions::new();
        opts.read(true).write(true);
        Self::open_with(path, &opts, buffer_size)
    }

    /// Opens the file at `path` with caller-provided options (flags,
    /// creation mode, permissions).
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        opts: &fs::OpenOptions,
        buffer_size: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = opts
            .open(path)
            .wrap_err_with(|| format!("failed to open '{}'", path.display()))?;
        let size = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", path.display()))?
            .len() as i64;
        Ok(Self::from_pager(Pager::fixed(file, size, buffer_size), path))
    }

    fn from_pager(pager: Pager<fs::File>, path: &Path) -> Self {
        Self {
            pager: Arc::new(pager),
            path: path.to_path_buf(),
            off: AtomicI64::new(0),
        }
    }

    /// Reads up to `b.len()` bytes at byte offset `off`. A short count
    /// means the request extended past the committed size.
    pub fn read_at(&self, b: &mut [u8], off: i64) -> Result<usize> {
        self.pager.read_at(b, off)
    }

    /// Writes up to `b.len()` bytes at byte offset `off`; bytes past the
    /// committed size are dropped and the short count reports how much
    /// fell in bounds.
    pub fn write_at(&self, b: &[u8], off: i64) -> Result<usize> {
        self.pager.write_at(b, off)
    }

    /// Reads from this handle's sequential cursor, advancing it.
    pub fn read(&self, b: &mut [u8]) -> Result<usize> {
        let off = self.off.load(Ordering::Relaxed);
        let n = self.pager.read_at(b, off)?;
        self.off.fetch_add(n as i64, Ordering::Relaxed);
        Ok(n)
    }

    /// Writes at this handle's sequential cursor, advancing it.
    pub fn write(&self, b: &[u8]) -> Result<usize> {
        let off = self.off.load(Ordering::Relaxed);
        let n = self.pager.write_at(b, off)?;
        self.off.fetch_add(n as i64, Ordering::Relaxed);
        Ok(n)
    }

    /// Writes all dirty pages back to the file.
    pub fn flush(&self) -> Result<()> {
        self.pager.flush()
    }

    /// Flushes, then commits the file to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.pager.sync()
    }

    /// Flushes, syncs, and marks the file closed for every clone. A
    /// second close fails like any other operation on a closed file.
    pub fn close(&self) -> Result<()> {
        self.pager.close()
    }

    /// Resizes the file and the committed size.
    pub fn truncate(&self, size: i64) -> Result<()> {
        self.pager.truncate(size)
    }

    /// The committed size in bytes.
    pub fn size(&self) -> i64 {
        self.pager.committed_size()
    }

    /// Number of pages currently held in memory.
    pub fn pages(&self) -> usize {
        self.pager.pages()
    }

    /// Metadata of the underlying file.
    pub fn stat(&self) -> Result<fs::Metadata> {
        self.pager.check_open()?;
        Ok(self.pager.file().metadata()?)
    }

    /// Changes the permissions on the underlying file.
    pub fn set_permissions(&self, perm: fs::Permissions) -> Result<()> {
        self.pager.check_open()?;
        self.pager.file().set_permissions(perm)?;
        Ok(())
    }

    /// Changes the ownership of the underlying file.
    #[cfg(unix)]
    pub fn chown(&self, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        self.pager.check_open()?;
        std::os::unix::fs::fchown(self.pager.file(), uid, gid)?;
        Ok(())
    }

    /// The path this file was opened with.
    pub fn name(&self) -> &Path {
        &self.path
    }
}

impl Clone for File {
    /// A shallow clone: shares the pager (cache, dirty-set, closed flag)
    /// with a fresh sequential cursor at offset zero.
    fn clone(&self) -> Self {
        Self {
            pager: Arc::clone(&self.pager),
            path: self.path.clone(),
            off: AtomicI64::new(0),
        }
    }
}

impl io::Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        File::read(self, buf).map_err(io::Error::other)
    }
}

impl io::Write for File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        File::write(self, buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        File::flush(self).map_err(io::Error::other)
    }
}
