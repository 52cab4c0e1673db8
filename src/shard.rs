//! # Cache Shards
//!
//! A shard is an independently locked partition of the page cache: a page
//! map, a dirty-set, and an LRU list threaded through an arena of page
//! slots. The pool dispatches page `p` to shard `p & (nshards - 1)`, so
//! each shard only ever sees its own residue class and the shards share
//! nothing but the backing file.
//!
//! ## LRU list
//!
//! The list is doubly linked with two sentinel slots; real pages live
//! strictly between them, most-recently-used adjacent to `HEAD`:
//!
//! ```text
//! HEAD ⇄ mru ⇄ ... ⇄ lru ⇄ TAIL
//! ```
//!
//! `push` inserts at the MRU position, `pop` unlinks, and `bump` is
//! pop + push. All are O(1). `push` requires a detached slot, `pop` and
//! `bump` a linked one; the eviction candidate is `TAIL.prev`, which is a
//! real page exactly when the shard is non-empty.
//!
//! ## Arena slots
//!
//! Slots are never removed from the arena. A slot whose acquisition was
//! aborted by an I/O error is detached from both map and list and parked
//! on a free list; `alloc` reuses it (zeroed) before growing the arena.

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::page::Page;

/// Arena index of the MRU-side sentinel.
pub(crate) const HEAD: u32 = 0;
/// Arena index of the LRU-side sentinel.
pub(crate) const TAIL: u32 = 1;

#[derive(Default)]
pub(crate) struct Shard {
    arena: Vec<Page>,
    /// Page number → arena slot of every resident page.
    pub map: HashMap<u64, u32>,
    /// Page numbers whose buffers have diverged from the file.
    pub dirty: HashSet<u64>,
    free: SmallVec<[u32; 4]>,
}

impl Shard {
    /// Lazily sets up the sentinels; a no-op after the first call.
    pub fn init(&mut self) {
        if self.arena.is_empty() {
            self.arena.push(Page::sentinel(crate::page::NIL, TAIL));
            self.arena.push(Page::sentinel(HEAD, crate::page::NIL));
        }
    }

    /// Number of resident pages.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn page(&self, idx: u32) -> &Page {
        &self.arena[idx as usize]
    }

    pub fn page_mut(&mut self, idx: u32) -> &mut Page {
        &mut self.arena[idx as usize]
    }

    /// Slot of the least-recently-used page. Only meaningful when the
    /// shard is non-empty.
    pub fn lru(&self) -> u32 {
        self.arena[TAIL as usize].prev
    }

    /// Links a detached slot in at the MRU position.
    pub fn push(&mut self, idx: u32) {
        let first = self.arena[HEAD as usize].next;
        {
            let p = &mut self.arena[idx as usize];
            p.prev = HEAD;
            p.next = first;
        }
        self.arena[first as usize].prev = idx;
        self.arena[HEAD as usize].next = idx;
    }

    /// Unlinks a currently linked slot.
    pub fn pop(&mut self, idx: u32) {
        let (prev, next) = {
            let p = &self.arena[idx as usize];
            (p.prev, p.next)
        };
        self.arena[prev as usize].next = next;
        self.arena[next as usize].prev = prev;
    }

    /// Moves a linked slot to the MRU position.
    pub fn bump(&mut self, idx: u32) {
        self.pop(idx);
        self.push(idx);
    }

    /// Takes a slot for a brand-new page: reuses a free-listed slot
    /// (zeroed) or grows the arena. The slot starts detached.
    pub fn alloc(&mut self, pgsize: usize) -> u32 {
        match self.free.pop() {
            Some(idx) => {
                self.arena[idx as usize].data.fill(0);
                idx
            }
            None => {
                let idx = self.arena.len() as u32;
                self.arena.push(Page::new(pgsize));
                idx
            }
        }
    }

    /// Parks a detached slot on the free list after an aborted
    /// acquisition.
    pub fn release(&mut self, idx: u32) {
        self.free.push(idx);
    }
}
