//! # Boundary and Eviction Semantics
//!
//! Exercises the edges of the I/O protocol: end-of-file clamping,
//! page-boundary splitting, eviction writeback with buffer recycling, and
//! the cold-read skip for full-page writes (observed through an
//! instrumented backing file).

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::tempdir;

use pagepool::{BackingFile, File, Pager};

const PGSIZE: usize = 4096;

#[test]
fn reads_clamp_at_committed_size() {
    let dir = tempdir().unwrap();
    let f = File::create(dir.path().join("eof"), 100, 0).unwrap();

    let mut pattern = [0u8; 100];
    for (i, b) in pattern.iter_mut().enumerate() {
        *b = i as u8;
    }
    f.write_at(&pattern, 0).unwrap();

    // request extends past the end: only the in-bounds prefix comes back
    let mut buf = [0u8; 50];
    assert_eq!(f.read_at(&mut buf, 80).unwrap(), 20);
    assert_eq!(&buf[..20], &pattern[80..]);

    assert_eq!(f.read_at(&mut buf, 100).unwrap(), 0);
    assert_eq!(f.read_at(&mut buf, 101).unwrap(), 0);
    assert!(f.read_at(&mut buf, -1).is_err());
}

#[test]
fn boundary_spanning_write_dirties_both_pages() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("span");
    let f = File::create(&path, (4 * PGSIZE) as i64, 0).unwrap();

    let buf = [0x77u8; 200];
    assert_eq!(f.write_at(&buf, (PGSIZE - 100) as i64).unwrap(), 200);
    assert_eq!(f.pages(), 2);

    f.flush().unwrap();
    f.close().unwrap();

    let raw = std::fs::read(&path).unwrap();
    assert!(raw[PGSIZE - 100..PGSIZE + 100].iter().all(|&b| b == 0x77));
    assert!(raw[..PGSIZE - 100].iter().all(|&b| b == 0));
    assert!(raw[PGSIZE + 100..].iter().all(|&b| b == 0));
}

/// A four-page, single-shard pool so evictions are easy to provoke.
fn small_pool(file: std::fs::File) -> Pager<std::fs::File> {
    Pager::with_size(file, PGSIZE, PGSIZE)
}

#[test]
fn evicted_page_is_refetched_intact() {
    let dir = tempdir().unwrap();
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(dir.path().join("evict"))
        .unwrap();
    let pager = small_pool(file);
    assert_eq!(pager.max_pages(), 4);

    for pnum in 0u8..4 {
        pager
            .write_at(&vec![pnum + 1; PGSIZE], (pnum as i64) * PGSIZE as i64)
            .unwrap();
    }
    pager.flush().unwrap();

    // fault in a fifth page; page 0 is the LRU victim
    pager.write_at(&[9u8], (4 * PGSIZE) as i64).unwrap();
    assert_eq!(pager.pages(), 4);

    // page 0 comes back from the file, not from a recycled buffer
    let mut buf = vec![0u8; PGSIZE - 1];
    assert_eq!(pager.read_at(&mut buf, 1).unwrap(), PGSIZE - 1);
    assert!(buf.iter().all(|&b| b == 1));
}

#[test]
fn recycled_buffer_never_leaks_into_the_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("leak");
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .unwrap();
    let pager = small_pool(file);

    // fill the cache and the file with a recognizable pattern
    for pnum in 0u8..4 {
        pager
            .write_at(&vec![0xAB; PGSIZE], (pnum as i64) * PGSIZE as i64)
            .unwrap();
    }
    pager.flush().unwrap();

    // one byte in the middle of page 4: the write recycles page 0's
    // buffer, and the file physically ends before page 4, so only the
    // zero-fill stands between page 0's bytes and the flush below
    let off = (4 * PGSIZE + 1616) as i64;
    pager.write_at(&[0xCD], off).unwrap();
    pager.flush().unwrap();

    let raw = std::fs::read(&path).unwrap();
    assert_eq!(raw.len(), 4 * PGSIZE + 1617);
    assert_eq!(raw[4 * PGSIZE + 1616], 0xCD);
    assert!(
        raw[4 * PGSIZE..4 * PGSIZE + 1616].iter().all(|&b| b == 0),
        "evicted page bytes were persisted into the new page"
    );
}

/// Counts positional reads so tests can see which operations fault pages
/// in from the file.
struct CountingFile {
    inner: std::fs::File,
    reads: Arc<AtomicUsize>,
}

impl BackingFile for CountingFile {
    fn read_at(&self, buf: &mut [u8], off: u64) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.inner.read_at(buf, off)
    }

    fn write_at(&self, buf: &[u8], off: u64) -> io::Result<usize> {
        self.inner.write_at(buf, off)
    }

    fn len(&self) -> io::Result<u64> {
        self.inner.len()
    }

    fn set_len(&self, size: u64) -> io::Result<()> {
        BackingFile::set_len(&self.inner, size)
    }

    fn sync(&self) -> io::Result<()> {
        self.inner.sync()
    }
}

#[test]
fn full_page_write_to_cold_page_skips_the_disk() {
    let dir = tempdir().unwrap();
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(dir.path().join("cold"))
        .unwrap();

    let reads = Arc::new(AtomicUsize::new(0));
    let pager = Pager::with_size(
        CountingFile {
            inner: file,
            reads: Arc::clone(&reads),
        },
        PGSIZE,
        0,
    );

    pager.write_at(&vec![1u8; PGSIZE], 0).unwrap();
    pager.write_at(&vec![2u8; 3 * PGSIZE], PGSIZE as i64).unwrap();
    assert_eq!(
        reads.load(Ordering::Relaxed),
        0,
        "full-page writes must not fault the page in"
    );

    // a partial write does fault the page in
    pager.write_at(&[3u8; 100], (8 * PGSIZE) as i64).unwrap();
    assert!(reads.load(Ordering::Relaxed) > 0);
}
