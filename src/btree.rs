//! Search, pre-emptive-split insertion, and in-order traversal over a
//! disk-resident B-tree of minimum degree [`T`].

use std::path::Path;

use log::{info, trace};

use crate::cache::PageCache;
use crate::block::BlockStore;
use crate::error::Error;
use crate::node::{Header, Node, MAX_KEYS, T};

pub struct BTree {
    header: Header,
    cache: PageCache,
}

impl BTree {
    /// Creates a new index file with a fresh header. Fails with
    /// [`Error::Exists`] if `path` already exists.
    pub fn create(path: &Path) -> Result<Self, Error> {
        let store = BlockStore::create_new(path)?;
        let mut cache = PageCache::new(store);
        let header = Header::new();
        cache
            .store_mut()
            .write_block(0, &header.to_bytes())?;
        info!("created new index at {}", path.display());
        Ok(BTree { header, cache })
    }

    /// Opens an existing index file. Fails with [`Error::Missing`] if
    /// the file does not exist, or [`Error::Format`] on a magic
    /// mismatch.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let mut store = BlockStore::open_existing(path)?;
        let header_bytes = store.read_block(0)?;
        let header = Header::from_bytes(&header_bytes)?;
        info!(
            "opened index at {} (root={}, next={})",
            path.display(),
            header.root_block,
            header.next_block
        );
        Ok(BTree {
            header,
            cache: PageCache::new(store),
        })
    }

    fn alloc_block(&mut self, parent_id: u64) -> Result<Node, Error> {
        let block_id = self.header.next_block;
        self.header.next_block += 1;
        self.cache.allocate(block_id, parent_id)
    }

    /// Flushes the cache and writes the header. Must be called before
    /// the process exits for the index to be durable.
    pub fn close(mut self) -> Result<(), Error> {
        self.cache.flush_all()?;
        self.cache
            .store_mut()
            .write_block(0, &self.header.to_bytes())?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // search
    // ------------------------------------------------------------------

    pub fn search(&mut self, key: u64) -> Result<Option<u64>, Error> {
        if self.header.root_block == 0 {
            return Ok(None);
        }
        self.search_node(self.header.root_block, key)
    }

    fn search_node(&mut self, block_id: u64, key: u64) -> Result<Option<u64>, Error> {
        let node = self.cache.get(block_id)?;
        let i = node.keys[..node.num_keys].partition_point(|&k| k < key);
        if i < node.num_keys && node.keys[i] == key {
            return Ok(Some(node.values[i]));
        }
        if node.is_leaf() {
            return Ok(None);
        }
        let child = node.children[i];
        self.search_node(child, key)
    }

    // ------------------------------------------------------------------
    // insert
    // ------------------------------------------------------------------

    /// Inserts `(key, value)`. Duplicate keys are rejected with
    /// [`Error::Duplicate`] (see DESIGN.md for the policy rationale).
    pub fn insert(&mut self, key: u64, value: u64) -> Result<(), Error> {
        if self.search(key)?.is_some() {
            return Err(Error::Duplicate);
        }

        if self.header.root_block == 0 {
            let mut root = self.alloc_block(0)?;
            root.num_keys = 1;
            root.keys[0] = key;
            root.values[0] = value;
            self.header.root_block = root.block_id;
            self.cache.put(root)?;
            return Ok(());
        }

        let root = self.cache.get(self.header.root_block)?;
        if root.num_keys == MAX_KEYS {
            let mut new_root = self.alloc_block(0)?;
            new_root.children[0] = root.block_id;
            self.header.root_block = new_root.block_id;

            let mut old_root = root;
            old_root.parent_id = new_root.block_id;
            self.cache.put(old_root)?;
            self.cache.put(new_root.clone())?;

            self.split_child(new_root.block_id, 0)?;
            self.insert_nonfull(new_root.block_id, key, value)
        } else {
            self.insert_nonfull(root.block_id, key, value)
        }
    }

    /// Splits `parent.children[i]`, which must be full (`2T-1` keys),
    /// promoting its median key/value up into `parent`.
    fn split_child(&mut self, parent_id: u64, i: usize) -> Result<(), Error> {
        let mut parent = self.cache.get(parent_id)?;
        let child_id = parent.children[i];
        let mut child = self.cache.get(child_id)?;
        debug_assert_eq!(child.num_keys, MAX_KEYS);

        let mid = T - 1;
        let mut sibling = self.alloc_block(parent.block_id)?;

        sibling.num_keys = MAX_KEYS - T;
        for j in 0..sibling.num_keys {
            sibling.keys[j] = child.keys[j + T];
            sibling.values[j] = child.values[j + T];
        }

        if !child.is_leaf() {
            for j in 0..=sibling.num_keys {
                sibling.children[j] = child.children[j + T];
            }
            for slot in child.children[T..].iter_mut() {
                *slot = 0;
            }
        }

        // Promote the median pair before zeroing its slot below.
        let median_key = child.keys[mid];
        let median_value = child.values[mid];

        for slot in child.keys[mid..].iter_mut() {
            *slot = 0;
        }
        for slot in child.values[mid..].iter_mut() {
            *slot = 0;
        }
        child.num_keys = mid;

        for j in (i + 1..=parent.num_keys).rev() {
            parent.children[j + 1] = parent.children[j];
        }
        parent.children[i + 1] = sibling.block_id;

        for j in (i..parent.num_keys).rev() {
            parent.keys[j + 1] = parent.keys[j];
            parent.values[j + 1] = parent.values[j];
        }
        parent.keys[i] = median_key;
        parent.values[i] = median_value;
        parent.num_keys += 1;

        trace!(
            "split block {} at parent {} index {}: promoted key {}",
            child_id, parent_id, i, parent.keys[i]
        );

        self.cache.put(child)?;
        self.cache.put(sibling)?;
        self.cache.put(parent)?;
        Ok(())
    }

    /// Inserts into the subtree rooted at `node_id`, which must not be
    /// full. Any full child encountered on the descent is split first
    /// (the pre-emptive-split discipline), so the recursive call below
    /// always lands on a non-full node.
    fn insert_nonfull(&mut self, node_id: u64, key: u64, value: u64) -> Result<(), Error> {
        let mut node = self.cache.get(node_id)?;

        if node.is_leaf() {
            let mut i = node.num_keys;
            while i > 0 && node.keys[i - 1] > key {
                node.keys[i] = node.keys[i - 1];
                node.values[i] = node.values[i - 1];
                i -= 1;
            }
            node.keys[i] = key;
            node.values[i] = value;
            node.num_keys += 1;
            self.cache.put(node)?;
            return Ok(());
        }

        let mut i = node.keys[..node.num_keys].partition_point(|&k| k < key);
        let child_id = node.children[i];
        let child = self.cache.get(child_id)?;

        if child.num_keys == MAX_KEYS {
            self.split_child(node_id, i)?;
            // The split may have changed node's contents; re-fetch.
            let node = self.cache.get(node_id)?;
            if key > node.keys[i] {
                i += 1;
            }
        }

        let node = self.cache.get(node_id)?;
        let next_child = node.children[i];
        self.insert_nonfull(next_child, key, value)
    }

    // ------------------------------------------------------------------
    // traversal
    // ------------------------------------------------------------------

    /// Visits every stored pair in ascending key order.
    pub fn traverse<F>(&mut self, mut visitor: F) -> Result<(), Error>
    where
        F: FnMut(u64, u64),
    {
        if self.header.root_block == 0 {
            return Ok(());
        }
        self.traverse_node(self.header.root_block, &mut visitor)
    }

    fn traverse_node<F>(&mut self, block_id: u64, visitor: &mut F) -> Result<(), Error>
    where
        F: FnMut(u64, u64),
    {
        let node = self.cache.get(block_id)?;
        for i in 0..node.num_keys {
            if node.children[i] != 0 {
                self.traverse_node(node.children[i], visitor)?;
            }
            visitor(node.keys[i], node.values[i]);
        }
        if node.children[node.num_keys] != 0 {
            self.traverse_node(node.children[node.num_keys], visitor)?;
        }
        Ok(())
    }

    /// Fetches a raw node by block index, for inspection/debugging.
    /// Not needed by any command; exposed for tooling and tests the way
    /// a page-oriented store typically exposes a raw-page accessor.
    pub fn read_node(&mut self, block_id: u64) -> Result<Node, Error> {
        self.cache.get(block_id)
    }

    /// Number of pages currently resident in the page cache, for
    /// tooling and tests that need to observe the capacity bound.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn root_block(&self) -> u64 {
        self.header.root_block
    }

    pub fn next_block(&self) -> u64 {
        self.header.next_block
    }
}
