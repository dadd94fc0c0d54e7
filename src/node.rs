//! On-disk layout of the header block and node blocks.
//!
//! Every integer is an 8-byte big-endian unsigned value. A block is
//! always exactly [`BLOCK_SIZE`] bytes; unused tail bytes are zero.

use crate::error::Error;

pub const BLOCK_SIZE: usize = 512;
pub const MAGIC: &[u8; 8] = b"4348PRJ3";

/// Minimum degree. Non-root nodes hold between `T-1` and `2T-1` keys.
pub const T: usize = 10;
pub const MAX_KEYS: usize = 2 * T - 1;
pub const MAX_CHILDREN: usize = 2 * T;

/// Header stored in block 0.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub root_block: u64,
    pub next_block: u64,
}

impl Header {
    pub fn new() -> Self {
        Header {
            root_block: 0,
            next_block: 1,
        }
    }

    pub fn from_bytes(buf: &[u8; BLOCK_SIZE]) -> Result<Self, Error> {
        if &buf[0..8] != MAGIC {
            return Err(Error::Format("bad magic in header block".into()));
        }
        let root_block = u64::from_be_bytes(buf[8..16].try_into().unwrap());
        let next_block = u64::from_be_bytes(buf[16..24].try_into().unwrap());
        Ok(Header {
            root_block,
            next_block,
        })
    }

    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[0..8].copy_from_slice(MAGIC);
        buf[8..16].copy_from_slice(&self.root_block.to_be_bytes());
        buf[16..24].copy_from_slice(&self.next_block.to_be_bytes());
        buf
    }
}

/// A single B-tree page. `Clone`able so the page cache can hand out and
/// take back owned copies instead of references (see `cache.rs`).
#[derive(Debug, Clone)]
pub struct Node {
    pub block_id: u64,
    pub parent_id: u64,
    pub num_keys: usize,
    pub keys: [u64; MAX_KEYS],
    pub values: [u64; MAX_KEYS],
    pub children: [u64; MAX_CHILDREN],
}

impl Node {
    pub fn new(block_id: u64, parent_id: u64) -> Self {
        Node {
            block_id,
            parent_id,
            num_keys: 0,
            keys: [0; MAX_KEYS],
            values: [0; MAX_KEYS],
            children: [0; MAX_CHILDREN],
        }
    }

    /// A node is a leaf iff every child slot that could be populated
    /// (`children[0..=num_keys]`) is zero. Block 0 is reserved for the
    /// header, so zero is a safe "no child" sentinel.
    pub fn is_leaf(&self) -> bool {
        self.children[0..=self.num_keys].iter().all(|&c| c == 0)
    }

    pub fn from_bytes(buf: &[u8; BLOCK_SIZE]) -> Result<Self, Error> {
        let mut pos = 0usize;
        let read_u64 = |buf: &[u8; BLOCK_SIZE], pos: &mut usize| -> u64 {
            let v = u64::from_be_bytes(buf[*pos..*pos + 8].try_into().unwrap());
            *pos += 8;
            v
        };

        let block_id = read_u64(buf, &mut pos);
        let parent_id = read_u64(buf, &mut pos);
        let num_keys = read_u64(buf, &mut pos) as usize;
        if num_keys > MAX_KEYS {
            return Err(Error::Format(format!(
                "node at block {} has impossible key count {}",
                block_id, num_keys
            )));
        }

        let mut keys = [0u64; MAX_KEYS];
        for slot in keys.iter_mut() {
            *slot = read_u64(buf, &mut pos);
        }
        let mut values = [0u64; MAX_KEYS];
        for slot in values.iter_mut() {
            *slot = read_u64(buf, &mut pos);
        }
        let mut children = [0u64; MAX_CHILDREN];
        for slot in children.iter_mut() {
            *slot = read_u64(buf, &mut pos);
        }

        Ok(Node {
            block_id,
            parent_id,
            num_keys,
            keys,
            values,
            children,
        })
    }

    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        let mut pos = 0usize;
        let mut write_u64 = |buf: &mut [u8; BLOCK_SIZE], v: u64| {
            buf[pos..pos + 8].copy_from_slice(&v.to_be_bytes());
            pos += 8;
        };

        write_u64(&mut buf, self.block_id);
        write_u64(&mut buf, self.parent_id);
        write_u64(&mut buf, self.num_keys as u64);
        for k in self.keys {
            write_u64(&mut buf, k);
        }
        for v in self.values {
            write_u64(&mut buf, v);
        }
        for c in self.children {
            write_u64(&mut buf, c);
        }
        buf
    }
}
