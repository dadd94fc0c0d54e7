//! Owns the backing file and performs fixed-size block I/O.
//!
//! Block 0 is reserved for the header; node blocks start at index 1.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::trace;

use crate::error::Error;
use crate::node::BLOCK_SIZE;

pub struct BlockStore {
    file: File,
}

impl BlockStore {
    /// Creates a brand new index file. Fails with [`Error::Exists`] if
    /// `path` is already present.
    pub fn create_new(path: &Path) -> Result<Self, Error> {
        if path.exists() {
            return Err(Error::Exists);
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(BlockStore { file })
    }

    /// Opens an existing index file. Fails with [`Error::Missing`] if
    /// `path` does not exist.
    pub fn open_existing(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Err(Error::Missing(format!(
                "index file {} does not exist",
                path.display()
            )));
        }
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(BlockStore { file })
    }

    pub fn read_block(&mut self, block_id: u64) -> Result<[u8; BLOCK_SIZE], Error> {
        let offset = block_id * BLOCK_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = [0u8; BLOCK_SIZE];
        self.file.read_exact(&mut buf).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("truncated read of block {}: {}", block_id, e),
            ))
        })?;
        trace!("read block {}", block_id);
        Ok(buf)
    }

    pub fn write_block(&mut self, block_id: u64, buf: &[u8; BLOCK_SIZE]) -> Result<(), Error> {
        let offset = block_id * BLOCK_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("short write of block {}: {}", block_id, e),
            ))
        })?;
        self.file.sync_data()?;
        trace!("wrote block {}", block_id);
        Ok(())
    }
}
