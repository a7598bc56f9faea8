//! The mounted filesystem state: device, super block, inode table and
//! directory graph, guarded by a single lock for the whole operation set.

use std::path::Path;
use std::sync::Mutex;

use log::info;

use crate::block_device::BlockDevice;
use crate::directory::DirectoryGraph;
use crate::error::SfsResult;
use crate::inode::{self, Inode};
use crate::layout::{BLOCK_SIZE, NUM_INODE_BLOCKS, ROOT_INODE_ID};
use crate::ops::{self, Attr};
use crate::superblock::SuperBlock;

/// Everything a filesystem operation needs to touch, bundled so a single
/// mutex can guard the lot.
pub struct MountState {
    pub device: BlockDevice,
    pub super_block: SuperBlock,
    pub inodes: Vec<Inode>,
    pub directories: DirectoryGraph,
}

impl MountState {
    fn open(path: &Path) -> SfsResult<Self> {
        let mut device = BlockDevice::open(path)?;
        let mut super_block = SuperBlock::load_or_init(&mut device)?;

        let mut inodes = Vec::with_capacity(NUM_INODE_BLOCKS);
        for id in 0..NUM_INODE_BLOCKS as u64 {
            let mut block = vec![0u8; BLOCK_SIZE];
            device.read_block(1 + id, &mut block)?;
            let node = if block.iter().all(|&b| b == 0) {
                let is_root = id == ROOT_INODE_ID;
                let mut node = Inode::default_unlinked();
                node.stat(
                    id,
                    if is_root {
                        inode::MODE_IFDIR | 0o700
                    } else {
                        inode::MODE_IFREG | 0o700
                    },
                    if is_root { 2 } else { 0 },
                );
                if is_root {
                    node.reserve(&mut super_block);
                    node.reserve_block(&mut super_block)
                        .expect("a fresh image always has a free block for the root entry");
                }
                node.flush(&mut device)?;
                node
            } else {
                Inode::deserialize(&block)
            };
            inodes.push(node);
        }

        let mut directories = DirectoryGraph::new();
        directories.allocate(ROOT_INODE_ID, "/".to_string());
        let root_block = inodes[ROOT_INODE_ID as usize].block_links[crate::layout::DIR_ENTRY_SLOT];
        let mut root_raw = vec![0u8; BLOCK_SIZE];
        device.read_block(root_block as u64, &mut root_raw)?;
        if root_raw.iter().all(|&b| b == 0) {
            directories.save(ROOT_INODE_ID, root_block as u64, &mut device)?;
        } else {
            directories.load(ROOT_INODE_ID, &inodes, &mut device)?;
        }

        super_block.flush(&mut device)?;

        Ok(Self {
            device,
            super_block,
            inodes,
            directories,
        })
    }
}

/// The mounted filesystem, safe to share across the kernel bridge's
/// concurrent callback threads.
pub struct Mount {
    state: Mutex<MountState>,
}

impl Mount {
    pub fn open(path: &Path) -> SfsResult<Self> {
        info!("mounting disk image {}", path.display());
        let state = MountState::open(path)?;
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    pub fn getattr(&self, path: &str) -> SfsResult<Attr> {
        let mut state = self.state.lock().unwrap();
        ops::getattr(&mut state, path)
    }

    pub fn create(&self, path: &str, mode: u32) -> SfsResult<()> {
        let mut state = self.state.lock().unwrap();
        ops::create(&mut state, path, mode)
    }

    pub fn mkdir(&self, path: &str, mode: u32) -> SfsResult<()> {
        let mut state = self.state.lock().unwrap();
        ops::mkdir(&mut state, path, mode)
    }

    pub fn unlink(&self, path: &str) -> SfsResult<()> {
        let mut state = self.state.lock().unwrap();
        ops::unlink(&mut state, path)
    }

    pub fn rmdir(&self, path: &str) -> SfsResult<()> {
        let mut state = self.state.lock().unwrap();
        ops::rmdir(&mut state, path)
    }

    pub fn open_file(&self, path: &str) -> SfsResult<()> {
        let state = self.state.lock().unwrap();
        ops::open(&state, path)
    }

    pub fn opendir(&self, path: &str) -> SfsResult<()> {
        let state = self.state.lock().unwrap();
        ops::opendir(&state, path)
    }

    pub fn readdir(&self, path: &str) -> SfsResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        let mut names = Vec::new();
        ops::readdir(&state, path, |name| names.push(name.to_string()))?;
        Ok(names)
    }

    pub fn read(&self, path: &str, buf: &mut [u8], offset: u64) -> SfsResult<usize> {
        let mut state = self.state.lock().unwrap();
        ops::read(&mut state, path, buf, offset)
    }

    pub fn write(&self, path: &str, data: &[u8], offset: u64) -> SfsResult<usize> {
        let mut state = self.state.lock().unwrap();
        ops::write(&mut state, path, data, offset)
    }

    pub fn release(&self, _path: &str) -> SfsResult<()> {
        Ok(())
    }

    pub fn releasedir(&self, _path: &str) -> SfsResult<()> {
        Ok(())
    }

    /// Snapshot of the super block's free-space counters and bitmaps, for
    /// checking that the counters stay consistent with the bitmaps after a
    /// sequence of operations.
    pub fn free_space_counters(&self) -> FreeSpaceCounters {
        let state = self.state.lock().unwrap();
        FreeSpaceCounters {
            num_free_blocks: state.super_block.num_free_blocks,
            num_free_inodes: state.super_block.num_free_inodes,
            block_bitmap_ones: state.super_block.block_bitmap.count_ones(),
            inode_bitmap_ones: state.super_block.inode_bitmap.count_ones(),
        }
    }
}

pub struct FreeSpaceCounters {
    pub num_free_blocks: u32,
    pub num_free_inodes: u8,
    pub block_bitmap_ones: usize,
    pub inode_bitmap_ones: usize,
}
