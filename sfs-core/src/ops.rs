//! The filesystem operation layer the kernel bridge calls into: one
//! function per FUSE-style callback, each resolving a path, checking the
//! relevant invariants, mutating in-memory state and flushing to disk.

use log::debug;

use crate::error::{SfsError, SfsResult};
use crate::inode;
use crate::layout::{BLOCK_SIZE, CONTENT_SLOT, DIR_ENTRY_SLOT, NAME_MAX, PATH_MAX};
use crate::mount::MountState;
use crate::resolver;

/// Attributes reported back for `getattr`.
pub struct Attr {
    pub ino: u64,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub nlink: u64,
    pub atime: u64,
    pub mtime: u64,
    /// `Some` for regular files, `None` for directories.
    pub size: Option<u64>,
}

pub fn getattr(state: &mut MountState, path: &str) -> SfsResult<Attr> {
    let ino = resolver::resolve(&state.directories, path).ok_or(SfsError::NotFound)?;
    let node = &state.inodes[ino as usize];
    Ok(Attr {
        ino: node.id,
        uid: node.user_id,
        gid: node.group_id,
        mode: node.mode,
        nlink: node.num_file_links,
        atime: node.last_access_time,
        mtime: node.last_file_mod_time,
        size: node.is_reg().then_some(node.file_size),
    })
}

fn create_entry(
    state: &mut MountState,
    path: &str,
    mode: u32,
    type_bits: u32,
    nlink: u64,
) -> SfsResult<()> {
    if resolver::resolve(&state.directories, path).is_some() {
        return Ok(());
    }
    if path.len() >= PATH_MAX {
        return Err(SfsError::NameTooLong);
    }
    let name = resolver::entry_name_of(path).to_string();
    if name.len() > NAME_MAX {
        return Err(SfsError::NameTooLong);
    }
    let parent = resolver::resolve_parent(&state.directories, path).ok_or(SfsError::NotFound)?;
    let ino = state
        .super_block
        .inode_bitmap
        .first_free()
        .ok_or(SfsError::NoSpace)? as u64;

    let node = &mut state.inodes[ino as usize];
    node.reserve(&mut state.super_block);
    node.stat(ino, mode | type_bits, nlink);
    let (block, slot) = node
        .reserve_block(&mut state.super_block)
        .ok_or(SfsError::NoSpace)?;
    debug_assert_eq!(slot, DIR_ENTRY_SLOT);

    state.directories.allocate(ino, name);
    let persisted = state.directories.insert_child(parent, ino);
    let persisted_block = state.inodes[persisted as usize].block_links[DIR_ENTRY_SLOT] as u64;
    state.directories.save(persisted, persisted_block, &mut state.device)?;
    state.directories.save(ino, block, &mut state.device)?;

    state.inodes[ino as usize].flush(&mut state.device)?;
    state.super_block.flush(&mut state.device)?;
    Ok(())
}

pub fn create(state: &mut MountState, path: &str, mode: u32) -> SfsResult<()> {
    create_entry(state, path, mode, inode::MODE_IFREG, 1)
}

pub fn mkdir(state: &mut MountState, path: &str, mode: u32) -> SfsResult<()> {
    create_entry(state, path, mode, inode::MODE_IFDIR, 2)
}

pub fn unlink(state: &mut MountState, path: &str) -> SfsResult<()> {
    let ino = resolver::resolve(&state.directories, path).ok_or(SfsError::NotFound)?;
    if state.inodes[ino as usize].is_dir() {
        return Err(SfsError::IsDirectory);
    }
    state.inodes[ino as usize].destroy(&mut state.super_block, &mut state.device)?;
    detach_and_persist(state, ino)?;
    state.super_block.flush(&mut state.device)?;
    Ok(())
}

pub fn rmdir(state: &mut MountState, path: &str) -> SfsResult<()> {
    let ino = resolver::resolve(&state.directories, path).ok_or(SfsError::NotFound)?;
    if state.inodes[ino as usize].is_reg() {
        return Err(SfsError::NotDirectory);
    }
    state.inodes[ino as usize].destroy(&mut state.super_block, &mut state.device)?;
    detach_and_persist(state, ino)?;
    state.super_block.flush(&mut state.device)?;
    Ok(())
}

fn detach_and_persist(state: &mut MountState, ino: u64) -> SfsResult<()> {
    if let Some(persisted) = state.directories.detach(ino) {
        let block = state.inodes[persisted as usize].block_links[DIR_ENTRY_SLOT] as u64;
        state.directories.save(persisted, block, &mut state.device)?;
    }
    state.directories.remove(ino);
    Ok(())
}

pub fn open(state: &MountState, path: &str) -> SfsResult<()> {
    let ino = resolver::resolve(&state.directories, path).ok_or(SfsError::NotFound)?;
    let node = &state.inodes[ino as usize];
    if node.is_dir() {
        return Err(SfsError::IsDirectory);
    }
    if node.mode & inode::MODE_IXUSR == 0 {
        return Err(SfsError::AccessDenied);
    }
    Ok(())
}

pub fn opendir(state: &MountState, path: &str) -> SfsResult<()> {
    let ino = resolver::resolve(&state.directories, path).ok_or(SfsError::NotFound)?;
    let node = &state.inodes[ino as usize];
    if node.is_reg() {
        return Err(SfsError::NotDirectory);
    }
    if node.mode & inode::MODE_IXUSR == 0 {
        return Err(SfsError::AccessDenied);
    }
    Ok(())
}

pub fn readdir<F: FnMut(&str)>(state: &MountState, path: &str, mut filler: F) -> SfsResult<()> {
    let ino = resolver::resolve(&state.directories, path).ok_or(SfsError::NotFound)?;
    let mut child = state.directories.get(ino).and_then(|n| n.child);
    while let Some(c) = child {
        let node = state.directories.get(c).ok_or(SfsError::NotFound)?;
        filler(&node.name);
        child = node.sibling;
    }
    Ok(())
}

pub fn read(state: &mut MountState, path: &str, buf: &mut [u8], offset: u64) -> SfsResult<usize> {
    let ino = resolver::resolve(&state.directories, path).ok_or(SfsError::NotFound)?;
    if offset >= BLOCK_SIZE as u64 {
        return Ok(0);
    }
    let node = &mut state.inodes[ino as usize];
    let link = node.block_links[CONTENT_SLOT];
    if link == -1 {
        return Ok(0);
    }

    let mut block_buf = vec![0u8; BLOCK_SIZE];
    state.device.read_block(link as u64, &mut block_buf)?;

    let node = &mut state.inodes[ino as usize];
    let within = offset as usize;
    let readable = node.file_size.saturating_sub(offset) as usize;
    let n = buf.len().min(BLOCK_SIZE - within).min(readable);
    buf[..n].copy_from_slice(&block_buf[within..within + n]);

    node.last_access_time = utils::util::get_timestamp().as_secs();
    node.flush(&mut state.device)?;
    debug!("read {} bytes from {} at offset {}", n, path, offset);
    Ok(n)
}

pub fn write(state: &mut MountState, path: &str, data: &[u8], offset: u64) -> SfsResult<usize> {
    let ino = resolver::resolve(&state.directories, path).ok_or(SfsError::NotFound)?;
    if offset >= BLOCK_SIZE as u64 {
        return Err(SfsError::NoSpace);
    }
    let within = offset as usize;

    let node = &mut state.inodes[ino as usize];
    let existing = node.block_links[CONTENT_SLOT];
    let block_number = if existing != -1 {
        existing as u64
    } else {
        let (number, slot) = node
            .reserve_block(&mut state.super_block)
            .ok_or(SfsError::NoSpace)?;
        debug_assert_eq!(slot, CONTENT_SLOT, "directory-entry slot must already be reserved");
        number
    };

    let mut block_buf = vec![0u8; BLOCK_SIZE];
    if within > 0 {
        state.device.read_block(block_number, &mut block_buf)?;
    }
    let n = data.len().min(BLOCK_SIZE - within);
    block_buf[within..within + n].copy_from_slice(&data[..n]);
    state.device.write_block(block_number, &block_buf)?;

    let node = &mut state.inodes[ino as usize];
    let new_size = offset + n as u64;
    if new_size > node.file_size {
        node.file_size = new_size;
    }
    node.last_file_mod_time = utils::util::get_timestamp().as_secs();
    node.flush(&mut state.device)?;
    state.super_block.flush(&mut state.device)?;
    debug!("wrote {} bytes to {} at offset {}", n, path, offset);
    Ok(n)
}
