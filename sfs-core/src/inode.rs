//! Inode records: metadata plus direct block links.

use crate::block_device::BlockDevice;
use crate::byte_buffer::ByteBuffer;
use crate::error::{SfsError, SfsResult};
use crate::layout::{BLOCK_SIZE, NUM_BLOCK_LINKS, ROOT_INODE_ID};
use crate::superblock::SuperBlock;

/// Mode bit marking a directory inode, mirroring `S_IFDIR`.
pub const MODE_IFDIR: u32 = 0o040000;
/// Mode bit marking a regular-file inode, mirroring `S_IFREG`.
pub const MODE_IFREG: u32 = 0o100000;
/// Owner execute bit, `S_IXUSR`.
pub const MODE_IXUSR: u32 = 0o100;

const UNRESERVED: i16 = -1;

#[derive(Clone)]
pub struct Inode {
    pub id: u64,
    pub user_id: u32,
    pub group_id: u32,
    pub mode: u32,
    pub last_file_mod_time: u64,
    pub last_access_time: u64,
    pub last_inode_mod_time: u64,
    pub num_file_links: u64,
    pub file_size: u64,
    pub block_links: [i16; NUM_BLOCK_LINKS],
}

impl Inode {
    pub fn is_dir(&self) -> bool {
        self.mode & MODE_IFDIR != 0
    }

    pub fn is_reg(&self) -> bool {
        self.mode & MODE_IFREG != 0
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::new(BLOCK_SIZE);
        buf.write_u64(self.id);
        buf.write_u32(self.user_id);
        buf.write_u32(self.group_id);
        buf.write_u32(self.mode);
        buf.write_u64(self.last_file_mod_time);
        buf.write_u64(self.last_access_time);
        buf.write_u64(self.last_inode_mod_time);
        buf.write_u64(self.num_file_links);
        buf.write_u64(self.file_size);
        for link in self.block_links {
            buf.write_i16(link);
        }
        buf.into_bytes()
    }

    pub fn deserialize(bytes: &[u8]) -> Self {
        let mut buf = ByteBuffer::from_bytes(bytes.to_vec());
        let id = buf.read_u64();
        let user_id = buf.read_u32();
        let group_id = buf.read_u32();
        let mode = buf.read_u32();
        let last_file_mod_time = buf.read_u64();
        let last_access_time = buf.read_u64();
        let last_inode_mod_time = buf.read_u64();
        let num_file_links = buf.read_u64();
        let file_size = buf.read_u64();
        let mut block_links = [UNRESERVED; NUM_BLOCK_LINKS];
        for link in block_links.iter_mut() {
            *link = buf.read_i16();
        }
        Self {
            id,
            user_id,
            group_id,
            mode,
            last_file_mod_time,
            last_access_time,
            last_inode_mod_time,
            num_file_links,
            file_size,
            block_links,
        }
    }

    pub fn flush(&self, dev: &mut BlockDevice) -> SfsResult<()> {
        dev.write_block(1 + self.id, &self.serialize())?;
        Ok(())
    }

    /// A freshly reset, unlinked inode slot at id 0. Callers overwrite the
    /// id with `stat`.
    pub fn default_unlinked() -> Self {
        let mut node = Self {
            id: 0,
            user_id: 0,
            group_id: 0,
            mode: 0,
            last_file_mod_time: 0,
            last_access_time: 0,
            last_inode_mod_time: 0,
            num_file_links: 0,
            file_size: 0,
            block_links: [UNRESERVED; NUM_BLOCK_LINKS],
        };
        node.stat(0, MODE_IFREG | 0o700, 0);
        node
    }

    /// Stamps this inode with a fresh identity: id, mode, link count, the
    /// calling process's uid, current timestamps, and a cleared block-link
    /// table.
    ///
    /// `group_id` is set from `getuid()`, not `getgid()` — this mirrors
    /// `node_stat` setting both fields from the calling process's uid, a
    /// literal behavior the originating spec calls out explicitly rather
    /// than flagging as a bug to fix.
    pub fn stat(&mut self, id: u64, mode: u32, nlink: u64) {
        self.id = id;
        let uid = unsafe { libc::getuid() };
        self.user_id = uid;
        self.group_id = uid;
        let now = utils::util::get_timestamp().as_secs();
        self.last_file_mod_time = now;
        self.last_access_time = now;
        self.last_inode_mod_time = now;
        self.mode = mode;
        self.num_file_links = nlink;
        self.file_size = 0;
        self.block_links = [UNRESERVED; NUM_BLOCK_LINKS];
    }

    /// Marks this inode's id as in-use in the inode bitmap.
    pub fn reserve(&self, super_block: &mut SuperBlock) {
        let idx = self.id as usize;
        if super_block.inode_bitmap.get(idx) == 1 {
            return;
        }
        super_block.inode_bitmap.set(idx);
        super_block.num_free_inodes -= 1;
    }

    /// Reserves the first free data block and the first free block-link
    /// slot, links them together, and returns `(absolute_block, slot)`.
    pub fn reserve_block(&mut self, super_block: &mut SuperBlock) -> Option<(u64, usize)> {
        let bit = super_block.block_bitmap.first_free()?;
        let slot = self.block_links.iter().position(|&l| l == UNRESERVED)?;
        let block_number = crate::layout::DATA_BLOCK_START as u64 + bit as u64;
        self.block_links[slot] = block_number as i16;
        super_block.block_bitmap.set(bit);
        super_block.num_free_blocks -= 1;
        Some((block_number, slot))
    }

    /// Releases every block this inode owns, resets it to an unlinked
    /// default, and frees its inode-bitmap bit. The root inode can never be
    /// destroyed.
    pub fn destroy(&mut self, super_block: &mut SuperBlock, dev: &mut BlockDevice) -> SfsResult<()> {
        if self.id == ROOT_INODE_ID {
            return Err(SfsError::AccessDenied);
        }
        let zero = vec![0u8; BLOCK_SIZE];
        for link in self.block_links {
            if link == UNRESERVED {
                continue;
            }
            dev.write_block(link as u64, &zero)?;
            let bit = link as usize - crate::layout::DATA_BLOCK_START;
            if super_block.block_bitmap.get(bit) == 1 {
                super_block.block_bitmap.clear(bit);
                super_block.num_free_blocks += 1;
            }
        }
        let id = self.id;
        if super_block.inode_bitmap.get(id as usize) == 1 {
            super_block.inode_bitmap.clear(id as usize);
            super_block.num_free_inodes += 1;
        }
        self.stat(id, MODE_IFREG | 0o700, 0);
        self.flush(dev)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_through_serialize() {
        let mut node = Inode::default_unlinked();
        node.stat(3, MODE_IFDIR | 0o700, 2);
        node.block_links[0] = 129;
        node.file_size = 17;

        let bytes = node.serialize();
        let restored = Inode::deserialize(&bytes);
        assert_eq!(restored.id, 3);
        assert!(restored.is_dir());
        assert_eq!(restored.num_file_links, 2);
        assert_eq!(restored.block_links[0], 129);
        assert_eq!(restored.file_size, 17);
    }

    #[test]
    fn destroy_refuses_root() {
        let mut root = Inode::default_unlinked();
        root.stat(ROOT_INODE_ID, MODE_IFDIR | 0o700, 2);
        let mut sb = SuperBlock::new_empty();
        let mut dev = BlockDevice::open(tempfile::NamedTempFile::new().unwrap().path()).unwrap();
        let err = root.destroy(&mut sb, &mut dev).unwrap_err();
        assert!(matches!(err, SfsError::AccessDenied));
    }
}
