use thiserror::Error;

use crate::types::PageId;

/// Failures raised by the collaborators this layer is built on: the buffer
/// cache, the catalog, the page chain, the availability index and the
/// deallocation pool.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {pid} is not resident in the buffer cache")]
    PageNotResident { pid: PageId },

    #[error("Buffer pool exhausted ({frames} frames, all pinned)")]
    BufferPoolExhausted { frames: usize },

    #[error("Deallocation pool exhausted (capacity: {capacity})")]
    PoolExhausted { capacity: usize },

    #[error("Catalog lookup failed: {reason}")]
    CatalogLookup { reason: String },

    #[error("Page chain error: {reason}")]
    Chain { reason: String },

    #[error("Availability index error: {reason}")]
    AvailabilityIndex { reason: String },

    #[error("Invalid volume header: {reason}")]
    InvalidVolumeHeader { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Bad catalog reference")]
    BadCatalogReference,

    #[error("Bad object identifier: {reason}")]
    BadObjectIdentifier { reason: String },

    #[error("Bad file identifier: {reason}")]
    BadFileIdentifier { reason: String },

    #[error("Invalid slot index {index} (max: {max})")]
    InvalidSlotIndex { index: usize, max: usize },

    #[error("Page is full (pid: {pid})")]
    PageFull { pid: PageId },

    #[error("Invalid page size: {expected} bytes, got {actual} bytes")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Corrupted page: pid={pid}, reason={reason}")]
    CorruptedPage { pid: PageId, reason: String },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Collaborator(CollaboratorError::Io(err))
    }
}

impl StorageError {
    pub fn bad_object(reason: impl Into<String>) -> Self {
        StorageError::BadObjectIdentifier {
            reason: reason.into(),
        }
    }

    pub fn bad_file(reason: impl Into<String>) -> Self {
        StorageError::BadFileIdentifier {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
