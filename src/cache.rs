//! A fixed-capacity, write-back page cache sitting atop the block store.
//!
//! Capacity is pinned at [`CAPACITY`] resident pages (spec section 9:
//! this is a pedagogical constraint, not a tuning knob). Pages are
//! handed to callers as owned, cloned [`Node`] values rather than
//! references — after any `get`/`allocate`/`put` call the cache may have
//! evicted a page a caller still cares about, so holding a reference
//! across such a call is a bug by construction. Giving out owned values
//! instead of references makes that bug impossible to write.

use std::num::NonZeroUsize;

use log::{debug, trace};
use lru::LruCache;

use crate::block::BlockStore;
use crate::error::Error;
use crate::node::{Node, BLOCK_SIZE};

pub const CAPACITY: usize = 3;

struct CachedPage {
    node: Node,
    dirty: bool,
}

pub struct PageCache {
    store: BlockStore,
    resident: LruCache<u64, CachedPage>,
}

impl PageCache {
    pub fn new(store: BlockStore) -> Self {
        PageCache {
            store,
            resident: LruCache::new(NonZeroUsize::new(CAPACITY).unwrap()),
        }
    }

    /// Fetches the node at `block_id`, loading it from disk on a miss.
    pub fn get(&mut self, block_id: u64) -> Result<Node, Error> {
        if let Some(page) = self.resident.get(&block_id) {
            trace!("cache hit for block {}", block_id);
            return Ok(page.node.clone());
        }
        trace!("cache miss for block {}, loading from disk", block_id);
        let buf: [u8; BLOCK_SIZE] = self.store.read_block(block_id)?;
        let node = Node::from_bytes(&buf)?;
        self.admit(block_id, node.clone(), false)?;
        Ok(node)
    }

    /// Creates a freshly zeroed page for `block_id`, marks it dirty, and
    /// admits it into the cache.
    pub fn allocate(&mut self, block_id: u64, parent_id: u64) -> Result<Node, Error> {
        let node = Node::new(block_id, parent_id);
        self.admit(block_id, node.clone(), true)?;
        Ok(node)
    }

    /// Writes a mutated node back into the cache, marking it dirty.
    /// Callers must call this after mutating any node fetched via
    /// `get`/`allocate`, since those return owned copies.
    pub fn put(&mut self, node: Node) -> Result<(), Error> {
        self.admit(node.block_id, node, true)
    }

    fn admit(&mut self, block_id: u64, node: Node, dirty: bool) -> Result<(), Error> {
        if let Some((evicted_id, evicted)) = self.resident.push(block_id, CachedPage { node, dirty }) {
            if evicted_id != block_id && evicted.dirty {
                debug!("evicting dirty block {}, writing back", evicted_id);
                self.store
                    .write_block(evicted_id, &evicted.node.to_bytes())?;
            }
        }
        Ok(())
    }

    /// Writes every dirty resident page back through the block store.
    pub fn flush_all(&mut self) -> Result<(), Error> {
        for (block_id, page) in self.resident.iter_mut() {
            if page.dirty {
                debug!("flushing dirty block {}", block_id);
                self.store.write_block(*block_id, &page.node.to_bytes())?;
                page.dirty = false;
            }
        }
        Ok(())
    }

    pub fn store_mut(&mut self) -> &mut BlockStore {
        &mut self.store
    }

    /// Number of pages currently resident. Never exceeds [`CAPACITY`];
    /// exposed for tooling and tests the way `store_mut` exposes the
    /// backing store.
    pub fn len(&self) -> usize {
        self.resident.len()
    }
}
