//! # Backing File Contract
//!
//! The pool talks to its file through [`BackingFile`], a small positional
//! I/O trait. Keeping the seam copy-based makes backends trivial to
//! implement (`std::fs::File` for production, in-memory or instrumented
//! files for tests) without any lifetime entanglement with the cache.
//!
//! Positional reads and writes must be thread-safe with respect to
//! concurrent calls at non-overlapping offsets; `std::fs::File` satisfies
//! this via `pread`/`pwrite` on unix and `seek_read`/`seek_write` on
//! windows (the latter move the file cursor, which the pool never relies
//! on).
//!
//! The free helpers [`read_full_at`] and [`write_full_at`] lift the
//! single-syscall methods into full-buffer transfers: short counts are
//! retried, `Interrupted` is swallowed, and end-of-file is success for
//! reads (the caller learns how many bytes actually existed).

use std::fs;
use std::io;

/// Positional I/O over a byte-addressable file.
///
/// This is everything the pool needs from its backing store: positional
/// read/write, current length, truncation, and durable commit.
pub trait BackingFile: Send + Sync {
    /// Reads into `buf` at absolute offset `off`. A single attempt; may
    /// return a short count. `Ok(0)` with a non-empty `buf` means
    /// end-of-file.
    fn read_at(&self, buf: &mut [u8], off: u64) -> io::Result<usize>;

    /// Writes `buf` at absolute offset `off`. A single attempt; may return
    /// a short count.
    fn write_at(&self, buf: &[u8], off: u64) -> io::Result<usize>;

    /// Current length of the file in bytes.
    fn len(&self) -> io::Result<u64>;

    /// Resizes the file to exactly `size` bytes.
    fn set_len(&self, size: u64) -> io::Result<()>;

    /// Commits file contents to stable storage.
    fn sync(&self) -> io::Result<()>;
}

impl BackingFile for fs::File {
    fn read_at(&self, buf: &mut [u8], off: u64) -> io::Result<usize> {
        #[cfg(unix)]
        {
            std::os::unix::fs::FileExt::read_at(self, buf, off)
        }
        #[cfg(windows)]
        {
            std::os::windows::fs::FileExt::seek_read(self, buf, off)
        }
    }

    fn write_at(&self, buf: &[u8], off: u64) -> io::Result<usize> {
        #[cfg(unix)]
        {
            std::os::unix::fs::FileExt::write_at(self, buf, off)
        }
        #[cfg(windows)]
        {
            std::os::windows::fs::FileExt::seek_write(self, buf, off)
        }
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn set_len(&self, size: u64) -> io::Result<()> {
        fs::File::set_len(self, size)
    }

    fn sync(&self) -> io::Result<()> {
        self.sync_all()
    }
}

/// Reads until `buf` is full or the file ends. Returns the number of bytes
/// actually read; anything short of `buf.len()` means end-of-file was hit.
pub(crate) fn read_full_at<F: BackingFile>(file: &F, buf: &mut [u8], off: u64) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read_at(&mut buf[filled..], off + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Writes all of `buf` at `off`, retrying short counts.
pub(crate) fn write_full_at<F: BackingFile>(file: &F, buf: &[u8], off: u64) -> io::Result<()> {
    let mut written = 0;
    while written < buf.len() {
        match file.write_at(&buf[written..], off + written as u64) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fs_file_positional_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positional");

        let mut f = fs::File::create(&path).unwrap();
        f.write_all(b"0123456789").unwrap();
        drop(f);

        let f = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(read_full_at(&f, &mut buf, 3).unwrap(), 4);
        assert_eq!(&buf, b"3456");

        // read past the end is a short, successful read
        let mut buf = [0u8; 8];
        assert_eq!(read_full_at(&f, &mut buf, 6).unwrap(), 4);
        assert_eq!(&buf[..4], b"6789");

        write_full_at(&f, b"xy", 1).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(read_full_at(&f, &mut buf, 0).unwrap(), 4);
        assert_eq!(&buf, b"0xy3");

        assert_eq!(BackingFile::len(&f).unwrap(), 10);
    }
}
