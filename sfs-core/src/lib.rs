//! Core, transport-free implementation of the simple file system: block
//! allocation, the inode table, the directory graph and the path
//! resolver. A kernel bridge wires these operations to a real transport;
//! this crate has no knowledge of FUSE, or of any other transport.

pub mod bitmap;
pub mod block_device;
pub mod byte_buffer;
pub mod directory;
pub mod error;
pub mod inode;
pub mod layout;
pub mod mount;
pub mod ops;
pub mod resolver;
pub mod superblock;

pub use error::{SfsError, SfsResult};
pub use mount::Mount;
pub use ops::Attr;
