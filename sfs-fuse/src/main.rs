//! `sfs-fuse` is the kernel bridge: it parses the command line, opens the
//! disk image, and translates FUSE callbacks into calls against
//! `sfs_core::Mount`. All filesystem semantics live in `sfs-core`; this
//! binary only adapts them to a real transport.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request,
};
use log::{error, info, warn};

use sfs_core::error::SfsError;
use sfs_core::mount::Mount;
use sfs_core::ops::Attr;

/// Mount a simple file system disk image at a directory.
#[derive(Parser, Debug)]
#[command(name = "sfs-fuse", version, about)]
struct Cli {
    /// Path to the backing disk image file. Created and zero-filled if it
    /// does not already exist.
    diskfile: PathBuf,

    /// Existing directory to mount the filesystem at.
    mountpoint: PathBuf,

    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity,
}

fn validate(cli: &Cli) -> Result<(), String> {
    if let Some(parent) = cli.diskfile.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            return Err(format!(
                "directory {} for disk image does not exist",
                parent.display()
            ));
        }
    }
    if !cli.mountpoint.exists() {
        return Err(format!(
            "mountpoint {} does not exist",
            cli.mountpoint.display()
        ));
    }
    if !cli.mountpoint.is_dir() {
        return Err(format!(
            "mountpoint {} is not a directory",
            cli.mountpoint.display()
        ));
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbosity.log_level_filter())
        .init();

    if let Err(msg) = validate(&cli) {
        error!("{msg}");
        std::process::exit(1);
    }

    let mount = match Mount::open(&cli.diskfile) {
        Ok(m) => m,
        Err(e) => {
            error!("failed to open disk image {}: {e}", cli.diskfile.display());
            std::process::exit(1);
        }
    };

    let fs = SfsFuse::new(mount);
    let options = vec![MountOption::FSName("sfs".to_string())];
    info!(
        "mounting {} at {}",
        cli.diskfile.display(),
        cli.mountpoint.display()
    );
    if let Err(e) = fuser::mount2(fs, &cli.mountpoint, &options) {
        error!("mount failed: {e}");
        std::process::exit(1);
    }
}

const TTL: Duration = Duration::from_secs(1);
/// FUSE reserves inode 1 for the mount root; our own root inode is 0, so
/// every id crossing this bridge is offset by one.
const ROOT_FUSE_INO: u64 = 1;

fn sfs_to_fuse(ino: u64) -> u64 {
    ino + 1
}

fn join_path(parent: &str, name: &OsStr) -> String {
    let name = name.to_string_lossy();
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn parent_path_of(path: &str) -> String {
    if path == "/" {
        return "/".to_string();
    }
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(pos) => trimmed[..pos].to_string(),
        None => "/".to_string(),
    }
}

fn errno(e: &SfsError) -> i32 {
    e.errno()
}

fn file_attr(ino: u64, attr: &Attr) -> FileAttr {
    let kind = match attr.size {
        Some(_) => FileType::RegularFile,
        None => FileType::Directory,
    };
    let size = attr.size.unwrap_or(0);
    let time = |secs: u64| UNIX_EPOCH + Duration::from_secs(secs);
    FileAttr {
        ino,
        size,
        blocks: if size == 0 { 0 } else { 1 },
        atime: time(attr.atime),
        mtime: time(attr.mtime),
        ctime: time(attr.mtime),
        crtime: time(attr.mtime),
        kind,
        perm: (attr.mode & 0o7777) as u16,
        nlink: attr.nlink as u32,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: sfs_core::layout::BLOCK_SIZE as u32,
        flags: 0,
    }
}

/// Bridges `fuser`'s inode-number callbacks to `sfs_core`'s path-based
/// operation layer by remembering, for every inode the kernel has seen,
/// which path it names. Entries are never evicted on unlink/rmdir; a
/// long-running mount accumulates stale cache entries for removed paths,
/// which is harmless since they are simply never looked up again.
struct SfsFuse {
    mount: Mount,
    paths: Mutex<HashMap<u64, String>>,
}

impl SfsFuse {
    fn new(mount: Mount) -> Self {
        let mut paths = HashMap::new();
        paths.insert(ROOT_FUSE_INO, "/".to_string());
        Self {
            mount,
            paths: Mutex::new(paths),
        }
    }

    fn path_for(&self, ino: u64) -> Option<String> {
        self.paths.lock().unwrap().get(&ino).cloned()
    }

    fn remember(&self, fuse_ino: u64, path: String) {
        self.paths.lock().unwrap().insert(fuse_ino, path);
    }

    fn lookup_entry(&self, parent_path: &str, name: &OsStr) -> Result<(u64, Attr), SfsError> {
        let path = join_path(parent_path, name);
        let attr = self.mount.getattr(&path)?;
        let fuse_ino = sfs_to_fuse(attr.ino);
        self.remember(fuse_ino, path);
        Ok((fuse_ino, attr))
    }
}

impl Filesystem for SfsFuse {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(parent_path) = self.path_for(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.lookup_entry(&parent_path, name) {
            Ok((fuse_ino, attr)) => reply.entry(&TTL, &file_attr(fuse_ino, &attr), 0),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.mount.getattr(&path) {
            Ok(attr) => reply.attr(&TTL, &file_attr(ino, &attr)),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(parent_path) = self.path_for(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = join_path(&parent_path, name);
        if let Err(e) = self.mount.mkdir(&path, mode) {
            reply.error(errno(&e));
            return;
        }
        match self.mount.getattr(&path) {
            Ok(attr) => {
                let fuse_ino = sfs_to_fuse(attr.ino);
                self.remember(fuse_ino, path);
                reply.entry(&TTL, &file_attr(fuse_ino, &attr), 0);
            }
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(parent_path) = self.path_for(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = join_path(&parent_path, name);
        if let Err(e) = self.mount.create(&path, mode) {
            reply.error(errno(&e));
            return;
        }
        match self.mount.getattr(&path) {
            Ok(attr) => {
                let fuse_ino = sfs_to_fuse(attr.ino);
                self.remember(fuse_ino, path);
                reply.created(&TTL, &file_attr(fuse_ino, &attr), 0, 0, 0);
            }
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(parent_path) = self.path_for(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = join_path(&parent_path, name);
        match self.mount.unlink(&path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(parent_path) = self.path_for(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = join_path(&parent_path, name);
        match self.mount.rmdir(&path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.mount.open_file(&path) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn opendir(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.mount.opendir(&path) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let mut buf = vec![0u8; size as usize];
        match self.mount.read(&path, &mut buf, offset as u64) {
            Ok(n) => reply.data(&buf[..n]),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.mount.write(&path, data, offset as u64) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let parent_path = parent_path_of(&path);
        let parent_ino = self
            .mount
            .getattr(&parent_path)
            .map(|a| sfs_to_fuse(a.ino))
            .unwrap_or(ino);

        let names = match self.mount.readdir(&path) {
            Ok(names) => names,
            Err(e) => {
                reply.error(errno(&e));
                return;
            }
        };

        let mut entries = vec![
            (ino, FileType::Directory, ".".to_string()),
            (parent_ino, FileType::Directory, "..".to_string()),
        ];
        for name in names {
            let child_path = join_path(&path, OsStr::new(&name));
            match self.mount.getattr(&child_path) {
                Ok(attr) => {
                    let fuse_ino = sfs_to_fuse(attr.ino);
                    self.remember(fuse_ino, child_path);
                    let kind = if attr.size.is_some() {
                        FileType::RegularFile
                    } else {
                        FileType::Directory
                    };
                    entries.push((fuse_ino, kind, name));
                }
                Err(e) => warn!("readdir: entry {name} vanished mid-listing: {e}"),
            }
        }

        for (i, (ino, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            if reply.add(ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        if let Some(path) = self.path_for(ino) {
            let _ = self.mount.release(&path);
        }
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request, ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        if let Some(path) = self.path_for(ino) {
            let _ = self.mount.releasedir(&path);
        }
        reply.ok();
    }
}
