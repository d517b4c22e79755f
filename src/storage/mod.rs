pub mod avail;
pub mod buffer;
pub mod buffer_pool;
pub mod catalog;
pub mod chain;
pub mod dealloc;
pub mod header;
pub mod volume;

pub const VOLUME_HEADER_SIZE: usize = 64;
pub const VOLUME_MAGIC: &[u8; 16] = b"PETAK VOLUME v1\0";
pub const VOLUME_FORMAT_VERSION: u8 = 1;
