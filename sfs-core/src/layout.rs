//! On-disk sizing constants.
//!
//! `BLOCK_SIZE` and `NUM_INODE_BLOCKS` are fixed by the external interface;
//! `NUM_DATA_BLOCKS` is chosen so the block bitmap fits inside the super
//! block's single `BLOCK_SIZE` slot alongside the inode bitmap and the two
//! free counters. The compile-time assertions below are the actual budget
//! check; keep the constants and the assertions in sync.

/// Size of every block on the disk image, super block and inode blocks
/// included.
pub const BLOCK_SIZE: usize = 512;

/// Number of inode-table blocks, immediately following the super block.
pub const NUM_INODE_BLOCKS: usize = 128;

/// Number of data blocks available for directory entries and file content.
///
/// 3,840 = 120 bitmap words, chosen so the super block payload (free
/// counters plus both bitmaps) fits in one 512-byte block. See the budget
/// assertion below.
pub const NUM_DATA_BLOCKS: usize = 3_840;

/// Absolute block index of the first data block.
pub const DATA_BLOCK_START: usize = 1 + NUM_INODE_BLOCKS;

/// Total number of blocks the disk image must contain.
pub const NUM_TOTAL_BLOCKS: usize = DATA_BLOCK_START + NUM_DATA_BLOCKS;

/// Size, in bytes, the backing disk image is created with.
pub const ALLOCATION_BYTES: u64 = (NUM_TOTAL_BLOCKS * BLOCK_SIZE) as u64;

/// Inode id of the filesystem root. Always block 1 on disk.
pub const ROOT_INODE_ID: u64 = 0;

/// Block index of the super block.
pub const SUPER_BLOCK_INDEX: u64 = 0;

/// Number of direct block-link slots per inode.
pub const NUM_BLOCK_LINKS: usize = 200;

/// Longest path this filesystem will resolve, matching PATH_MAX on Linux.
pub const PATH_MAX: usize = 4096;

/// Block-link slot reserved for an inode's own directory-graph entry.
pub const DIR_ENTRY_SLOT: usize = 0;

/// Block-link slot used for file content, the "first indirect slot".
pub const CONTENT_SLOT: usize = 1;

/// Longest entry name that fits in a directory-graph entry block: the
/// name, its NUL terminator, and the three u16 entry fields
/// (self_ino/sibling_ino/child_ino) must all fit in one `BLOCK_SIZE` block.
pub const NAME_MAX: usize = BLOCK_SIZE - 1 - 2 * 3;

const WORD_BITS: usize = 32;

const fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

/// Words needed to hold one bit per data block.
pub const BLOCK_BITMAP_WORDS: usize = ceil_div(NUM_DATA_BLOCKS, WORD_BITS);

/// Words needed to hold one bit per inode.
pub const INODE_BITMAP_WORDS: usize = ceil_div(NUM_INODE_BLOCKS, WORD_BITS);

/// Serialized super block payload length: free-block count (u32),
/// free-inode count (u8), block-bitmap word count (u32) + words, inode-bitmap
/// word count (u32) + words.
pub const SUPER_BLOCK_PAYLOAD_LEN: usize =
    4 + 1 + 4 + BLOCK_BITMAP_WORDS * 4 + 4 + INODE_BITMAP_WORDS * 4;

const _: () = assert!(
    SUPER_BLOCK_PAYLOAD_LEN <= BLOCK_SIZE,
    "super block payload must fit in one block"
);

/// Serialized inode record length: id, uid, gid, mode, three timestamps,
/// link count, file size (all u64 except uid/gid/mode which are u32), plus
/// one i16 per block-link slot.
pub const INODE_RECORD_LEN: usize = 8 + 4 + 4 + 4 + 8 + 8 + 8 + 8 + 8 + NUM_BLOCK_LINKS * 2;

const _: () = assert!(
    INODE_RECORD_LEN <= BLOCK_SIZE,
    "inode record must fit in one block"
);
