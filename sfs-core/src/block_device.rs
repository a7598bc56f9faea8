//! Raw block I/O against a flat disk image file.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::layout::{ALLOCATION_BYTES, BLOCK_SIZE};

/// A fixed-size disk image, addressed in `BLOCK_SIZE` blocks.
pub struct BlockDevice {
    file: File,
}

impl BlockDevice {
    /// Opens `path` for reading and writing, creating and zero-extending it
    /// to [`ALLOCATION_BYTES`] if it does not already exist or is smaller.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        if file.metadata()?.len() < ALLOCATION_BYTES {
            file.set_len(ALLOCATION_BYTES)?;
        }
        Ok(Self { file })
    }

    /// Reads block `index` into `buf`, which must be exactly `BLOCK_SIZE`
    /// bytes long.
    pub fn read_block(&mut self, index: u64, buf: &mut [u8]) -> io::Result<usize> {
        debug_assert_eq!(buf.len(), BLOCK_SIZE);
        self.file.seek(SeekFrom::Start(index * BLOCK_SIZE as u64))?;
        self.file.read_exact(buf)?;
        Ok(BLOCK_SIZE)
    }

    /// Writes `buf`, which must be exactly `BLOCK_SIZE` bytes long, to block
    /// `index`.
    pub fn write_block(&mut self, index: u64, buf: &[u8]) -> io::Result<usize> {
        debug_assert_eq!(buf.len(), BLOCK_SIZE);
        self.file.seek(SeekFrom::Start(index * BLOCK_SIZE as u64))?;
        self.file.write_all(buf)?;
        self.file.flush()?;
        Ok(BLOCK_SIZE)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn fresh_image_is_zeroed_and_sized() {
        let tmp = NamedTempFile::new().unwrap();
        let mut dev = BlockDevice::open(tmp.path()).unwrap();
        let mut buf = [0u8; BLOCK_SIZE];
        dev.read_block(0, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(tmp.path().metadata().unwrap().len(), ALLOCATION_BYTES);
    }

    #[test]
    fn write_then_read_round_trips() {
        let tmp = NamedTempFile::new().unwrap();
        let mut dev = BlockDevice::open(tmp.path()).unwrap();
        let mut out = [0u8; BLOCK_SIZE];
        out[0] = 0xAB;
        out[BLOCK_SIZE - 1] = 0xCD;
        dev.write_block(5, &out).unwrap();
        let mut back = [0u8; BLOCK_SIZE];
        dev.read_block(5, &mut back).unwrap();
        assert_eq!(out, back);
    }
}
