pub mod error;
pub mod ids;
pub mod object;
pub mod page;

pub use ids::{FileCatalogRef, ObjectId, PageId};

// Common type aliases
pub type PageNo = u32;
pub type VolNo = u16;
pub type SlotNo = u16;
pub type FileId = u32;
pub type Unique = u32;

// Page layout constants
pub const PAGE_SIZE: usize = 4096;
pub const PAGE_HEADER_SIZE: usize = 36; // Per-page header
pub const DATA_AREA_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE;

pub const SLOT_ENTRY_SIZE: usize = 6; // offset (2 bytes) + unique (4 bytes)
pub const OBJECT_HEADER_SIZE: usize = 8; // properties (2) + tag (2) + length (4)
pub const OBJECT_ALIGNMENT: usize = 4;

pub const CHECKSUM_SIZE: usize = 4; // CRC32 checksum size
pub const PAGE_CHECKSUM_OFFSET: usize = PAGE_HEADER_SIZE - CHECKSUM_SIZE;

pub const EMPTY_SLOT: u16 = u16::MAX;
pub const NIL_PAGE: PageNo = u32::MAX;

/// Slot 0 never holds an object; a page reduced to it is empty.
pub const SENTINEL_SLOT: SlotNo = 0;
