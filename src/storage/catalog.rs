//! Per-file catalog entries and the accessor seam used to read them.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    storage::buffer::{BufferCache, PinnedPage},
    types::{
        FileCatalogRef, FileId, NIL_PAGE, PageId, PageNo, VolNo,
        error::{CollaboratorError, Result, StorageError},
        object::properties,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct CatalogEntry {
    pub fid: FileId,
    pub volume: VolNo,
    pub first_page: PageNo,
    pub last_page: PageNo,
}

impl CatalogEntry {
    /// Entry for a file made of the single page `first_page`.
    pub fn new(fid: FileId, volume: VolNo, first_page: PageNo) -> Self {
        Self {
            fid,
            volume,
            first_page,
            last_page: first_page,
        }
    }

    pub fn is_first_page(&self, page_no: PageNo) -> bool {
        self.first_page == page_no
    }

    pub fn is_last_page(&self, page_no: PageNo) -> bool {
        self.last_page == page_no
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::encode_to_vec(self, catalog_config()).map_err(|e| {
            CollaboratorError::CatalogLookup {
                reason: format!("failed to encode catalog entry: {}", e),
            }
            .into()
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (entry, _) = bincode::decode_from_slice(bytes, catalog_config()).map_err(|e| {
            CollaboratorError::CatalogLookup {
                reason: format!("failed to decode catalog entry: {}", e),
            }
        })?;
        Ok(entry)
    }
}

// Fixed-width so an entry can be rewritten in place.
fn catalog_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

pub trait CatalogAccessor {
    fn file_entry(&self, cat: &FileCatalogRef) -> Result<CatalogEntry>;

    fn update_file_entry(&self, cat: &FileCatalogRef, entry: &CatalogEntry) -> Result<()>;
}

/// Catalog entries stored as objects on slotted catalog pages, reached
/// through the buffer cache.
pub struct PageCatalog<'a> {
    cache: &'a dyn BufferCache,
}

impl<'a> PageCatalog<'a> {
    pub fn new(cache: &'a dyn BufferCache) -> Self {
        Self { cache }
    }

    /// Stores `entry` on `catalog_page` and returns the reference naming it.
    pub fn register(&self, catalog_page: PageId, entry: &CatalogEntry) -> Result<FileCatalogRef> {
        let page = PinnedPage::fetch(self.cache, catalog_page)?;
        let bytes = entry.encode()?;
        let oid = page.write().append_object(properties::CLEAR, &bytes)?;
        page.mark_dirty()?;
        debug!(catalog = %oid, fid = entry.fid, "registered catalog entry");
        Ok(FileCatalogRef::new(oid))
    }
}

impl CatalogAccessor for PageCatalog<'_> {
    fn file_entry(&self, cat: &FileCatalogRef) -> Result<CatalogEntry> {
        if cat.is_nil() {
            return Err(StorageError::BadCatalogReference);
        }
        let oid = cat.object_id();
        let pinned = PinnedPage::fetch(self.cache, oid.page_id())?;
        let page = pinned.read();
        match page.slot(oid.slot_no) {
            Some(slot) if page.is_live(oid.slot_no) && slot.unique == oid.unique => {}
            _ => {
                return Err(CollaboratorError::CatalogLookup {
                    reason: format!("no catalog object at {}", oid),
                }
                .into());
            }
        }
        let body = page.object_body(oid.slot_no).unwrap_or_default();
        let entry = CatalogEntry::decode(body)?;
        if entry.first_page == NIL_PAGE {
            return Err(CollaboratorError::CatalogLookup {
                reason: format!("catalog entry {} has no first page", oid),
            }
            .into());
        }
        Ok(entry)
    }

    fn update_file_entry(&self, cat: &FileCatalogRef, entry: &CatalogEntry) -> Result<()> {
        if cat.is_nil() {
            return Err(StorageError::BadCatalogReference);
        }
        let oid = cat.object_id();
        let bytes = entry.encode()?;
        let pinned = PinnedPage::fetch(self.cache, oid.page_id())?;
        {
            let mut page = pinned.write();
            let body = page
                .object_body_mut(oid.slot_no)
                .filter(|body| body.len() == bytes.len())
                .ok_or_else(|| CollaboratorError::CatalogLookup {
                    reason: format!("no catalog object of matching size at {}", oid),
                })?;
            body.copy_from_slice(&bytes);
        }
        pinned.mark_dirty()
    }
}
