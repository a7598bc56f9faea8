//! End-to-end scenarios against a mounted, tempfile-backed disk image.
//! These exercise the operation layer directly; no real kernel transport
//! is involved.

use sfs_core::error::SfsError;
use sfs_core::layout::{BLOCK_SIZE, NUM_DATA_BLOCKS, NUM_INODE_BLOCKS};
use sfs_core::mount::Mount;

fn fresh_mount() -> (tempfile::TempDir, Mount) {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("disk.img");
    let mount = Mount::open(&image).unwrap();
    (dir, mount)
}

#[test]
fn s1_mount_empty_disk_initializes_root() {
    let (_dir, mount) = fresh_mount();
    let attr = mount.getattr("/").unwrap();
    assert_eq!(attr.ino, 0);
    assert_eq!(attr.nlink, 2);
    assert!(attr.size.is_none());
    assert_eq!(mount.readdir("/").unwrap(), Vec::<String>::new());
    assert_free_space_invariant(&mount);
}

#[test]
fn s2_mkdir_then_readdir_lists_new_entry() {
    let (_dir, mount) = fresh_mount();
    mount.mkdir("/a", 0o700).unwrap();
    assert_eq!(mount.readdir("/").unwrap(), vec!["a".to_string()]);
    let attr = mount.getattr("/a").unwrap();
    assert_eq!(attr.nlink, 2);
    assert!(attr.size.is_none());
}

#[test]
fn s3_create_under_existing_directory() {
    let (_dir, mount) = fresh_mount();
    mount.mkdir("/a", 0o700).unwrap();
    mount.create("/a/f", 0o700).unwrap();
    assert_eq!(mount.readdir("/a").unwrap(), vec!["f".to_string()]);
    let attr = mount.getattr("/a/f").unwrap();
    assert_eq!(attr.nlink, 1);
    assert_eq!(attr.size, Some(0));
}

#[test]
fn s4_write_then_read_round_trips_within_one_block() {
    let (_dir, mount) = fresh_mount();
    mount.mkdir("/a", 0o700).unwrap();
    mount.create("/a/f", 0o700).unwrap();

    let payload: Vec<u8> = (0..BLOCK_SIZE as u8).collect();
    let written = mount.write("/a/f", &payload, 0).unwrap();
    assert_eq!(written, BLOCK_SIZE);

    let mut back = vec![0u8; BLOCK_SIZE];
    let read = mount.read("/a/f", &mut back, 0).unwrap();
    assert_eq!(read, BLOCK_SIZE);
    assert_eq!(back, payload);

    let attr = mount.getattr("/a/f").unwrap();
    assert_eq!(attr.size, Some(BLOCK_SIZE as u64));
}

#[test]
fn s5_unlink_removes_entry_from_parent() {
    let (_dir, mount) = fresh_mount();
    mount.mkdir("/a", 0o700).unwrap();
    mount.create("/a/f", 0o700).unwrap();
    mount.unlink("/a/f").unwrap();
    assert_eq!(mount.readdir("/a").unwrap(), Vec::<String>::new());
    assert!(matches!(
        mount.getattr("/a/f").unwrap_err(),
        SfsError::NotFound
    ));
    assert_free_space_invariant(&mount);
}

/// SPEC_FULL.md §8: `num_free_blocks`/`num_free_inodes` must always equal
/// the total minus the number of set bits in the corresponding bitmap.
fn assert_free_space_invariant(mount: &Mount) {
    let counters = mount.free_space_counters();
    assert_eq!(
        counters.num_free_blocks as usize,
        NUM_DATA_BLOCKS - counters.block_bitmap_ones
    );
    assert_eq!(
        counters.num_free_inodes as usize,
        NUM_INODE_BLOCKS - counters.inode_bitmap_ones
    );
}

#[test]
fn free_space_counters_track_the_bitmaps_across_create_and_unlink() {
    let (_dir, mount) = fresh_mount();
    assert_free_space_invariant(&mount);

    mount.mkdir("/a", 0o700).unwrap();
    assert_free_space_invariant(&mount);

    mount.create("/a/f", 0o700).unwrap();
    mount.create("/a/g", 0o700).unwrap();
    assert_free_space_invariant(&mount);

    mount.write("/a/f", b"some content", 0).unwrap();
    assert_free_space_invariant(&mount);

    mount.unlink("/a/f").unwrap();
    assert_free_space_invariant(&mount);

    mount.unlink("/a/g").unwrap();
    mount.rmdir("/a").unwrap();
    assert_free_space_invariant(&mount);
}

#[test]
fn s6_rmdir_root_is_refused_and_leaves_state_unchanged() {
    let (_dir, mount) = fresh_mount();
    mount.mkdir("/a", 0o700).unwrap();
    let err = mount.rmdir("/").unwrap_err();
    assert!(matches!(err, SfsError::AccessDenied));
    // Root and its child both survive untouched.
    assert_eq!(mount.readdir("/").unwrap(), vec!["a".to_string()]);
    let attr = mount.getattr("/").unwrap();
    assert_eq!(attr.ino, 0);
}

#[test]
fn unlink_rejects_directories_and_rmdir_rejects_files() {
    let (_dir, mount) = fresh_mount();
    mount.mkdir("/a", 0o700).unwrap();
    mount.create("/a/f", 0o700).unwrap();

    assert!(matches!(
        mount.unlink("/a").unwrap_err(),
        SfsError::IsDirectory
    ));
    assert!(matches!(
        mount.rmdir("/a/f").unwrap_err(),
        SfsError::NotDirectory
    ));
}

#[test]
fn create_on_existing_path_is_idempotent() {
    let (_dir, mount) = fresh_mount();
    mount.create("/f", 0o700).unwrap();
    mount.write("/f", b"hello", 0).unwrap();
    mount.create("/f", 0o700).unwrap();
    let mut back = vec![0u8; 5];
    mount.read("/f", &mut back, 0).unwrap();
    assert_eq!(&back, b"hello");
}

#[test]
fn remounting_reloads_the_directory_tree_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("disk.img");
    {
        let mount = Mount::open(&image).unwrap();
        mount.mkdir("/a", 0o700).unwrap();
        mount.create("/a/f", 0o700).unwrap();
        mount.write("/a/f", b"persisted", 0).unwrap();
    }
    {
        let mount = Mount::open(&image).unwrap();
        assert_eq!(mount.readdir("/").unwrap(), vec!["a".to_string()]);
        assert_eq!(mount.readdir("/a").unwrap(), vec!["f".to_string()]);
        let mut back = vec![0u8; 9];
        mount.read("/a/f", &mut back, 0).unwrap();
        assert_eq!(&back, b"persisted");
    }
}

#[test]
fn inode_table_and_bitmap_sizes_match_layout_constants() {
    assert_eq!(NUM_INODE_BLOCKS, 128);
    assert_eq!(NUM_DATA_BLOCKS, 3_840);
}
