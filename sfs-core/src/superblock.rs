//! The single super block occupying block 0.

use crate::bitmap::Bitmap;
use crate::block_device::BlockDevice;
use crate::byte_buffer::ByteBuffer;
use crate::error::SfsResult;
use crate::layout::{BLOCK_SIZE, NUM_DATA_BLOCKS, NUM_INODE_BLOCKS, SUPER_BLOCK_INDEX};

/// Free-space accounting and allocation bitmaps for the whole image.
pub struct SuperBlock {
    pub num_free_blocks: u32,
    pub num_free_inodes: u8,
    pub block_bitmap: Bitmap,
    pub inode_bitmap: Bitmap,
}

impl SuperBlock {
    /// A super block for a freshly zeroed disk image: every block and
    /// inode free.
    pub fn new_empty() -> Self {
        Self {
            num_free_blocks: NUM_DATA_BLOCKS as u32,
            num_free_inodes: NUM_INODE_BLOCKS as u8,
            block_bitmap: Bitmap::new(NUM_DATA_BLOCKS),
            inode_bitmap: Bitmap::new(NUM_INODE_BLOCKS),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::new(BLOCK_SIZE);
        buf.write_u32(self.num_free_blocks);
        buf.write_u8(self.num_free_inodes);
        buf.write_u32(self.block_bitmap.num_words() as u32);
        for word in self.block_bitmap.words() {
            buf.write_u32(*word);
        }
        buf.write_u32(self.inode_bitmap.num_words() as u32);
        for word in self.inode_bitmap.words() {
            buf.write_u32(*word);
        }
        buf.into_bytes()
    }

    pub fn deserialize(bytes: &[u8]) -> Self {
        let mut buf = ByteBuffer::from_bytes(bytes.to_vec());
        let num_free_blocks = buf.read_u32();
        let num_free_inodes = buf.read_u8();

        let block_words = buf.read_u32() as usize;
        let mut block_bitmap_words = Vec::with_capacity(block_words);
        for _ in 0..block_words {
            block_bitmap_words.push(buf.read_u32());
        }

        let inode_words = buf.read_u32() as usize;
        let mut inode_bitmap_words = Vec::with_capacity(inode_words);
        for _ in 0..inode_words {
            inode_bitmap_words.push(buf.read_u32());
        }

        Self {
            num_free_blocks,
            num_free_inodes,
            block_bitmap: Bitmap::from_words(NUM_DATA_BLOCKS, block_bitmap_words),
            inode_bitmap: Bitmap::from_words(NUM_INODE_BLOCKS, inode_bitmap_words),
        }
    }

    pub fn flush(&self, dev: &mut BlockDevice) -> SfsResult<()> {
        dev.write_block(SUPER_BLOCK_INDEX, &self.serialize())?;
        Ok(())
    }

    /// Loads the super block from block 0, or initializes a fresh one if
    /// that block is still all zero (first mount of an empty image).
    pub fn load_or_init(dev: &mut BlockDevice) -> SfsResult<Self> {
        let mut block = vec![0u8; BLOCK_SIZE];
        dev.read_block(SUPER_BLOCK_INDEX, &mut block)?;
        if block.iter().all(|&b| b == 0) {
            let sb = Self::new_empty();
            sb.flush(dev)?;
            Ok(sb)
        } else {
            Ok(Self::deserialize(&block))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_through_serialize() {
        let mut sb = SuperBlock::new_empty();
        sb.block_bitmap.set(3);
        sb.num_free_blocks -= 1;
        sb.inode_bitmap.set(0);
        sb.num_free_inodes -= 1;

        let bytes = sb.serialize();
        let restored = SuperBlock::deserialize(&bytes);
        assert_eq!(restored.num_free_blocks, sb.num_free_blocks);
        assert_eq!(restored.num_free_inodes, sb.num_free_inodes);
        assert_eq!(restored.block_bitmap.get(3), 1);
        assert_eq!(restored.inode_bitmap.get(0), 1);
    }
}
