//! Error kinds returned by the filesystem operation layer, and their
//! mapping onto the `errno` values the kernel bridge reports back.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SfsError {
    #[error("no such file or directory")]
    NotFound,

    #[error("file name too long")]
    NameTooLong,

    #[error("no space left on device")]
    NoSpace,

    #[error("is a directory")]
    IsDirectory,

    #[error("not a directory")]
    NotDirectory,

    #[error("permission denied")]
    AccessDenied,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SfsResult<T> = Result<T, SfsError>;

impl SfsError {
    /// Maps this error to the `errno` value the kernel bridge should report.
    pub fn errno(&self) -> i32 {
        match self {
            SfsError::NotFound => libc::ENOENT,
            SfsError::NameTooLong => libc::ENAMETOOLONG,
            SfsError::NoSpace => libc::ENOSPC,
            SfsError::IsDirectory => libc::EISDIR,
            SfsError::NotDirectory => libc::ENOTDIR,
            SfsError::AccessDenied => libc::EACCES,
            SfsError::Io(_) => libc::EIO,
        }
    }
}
