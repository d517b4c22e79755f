use tracing::debug;

use crate::{
    manager::ObjectManager,
    storage::{
        buffer::PinnedPage,
        catalog::CatalogEntry,
        dealloc::{DeallocPool, DeallocQueue, DeallocRecord},
    },
    types::{
        EMPTY_SLOT, FileCatalogRef, ObjectId, SENTINEL_SLOT, SLOT_ENTRY_SIZE, SlotNo,
        error::{Result, StorageError},
        page::SlottedPage,
    },
};

/// How the space of a destroyed object was given back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclamation {
    /// The last slot was dropped and `free` rolled back over the object.
    Immediate { freed_offset: u16 },
    /// The bytes were added to `unused` for a later compaction.
    Lazy { bytes: u16 },
}

impl ObjectManager<'_> {
    /// Removes `oid` from its page.
    ///
    /// A page left without live objects is unlinked from the file and queued
    /// in `queue` for deallocation after the enclosing operation, unless it
    /// is the file's first page. Any other page goes back into the
    /// availability index with its new free-space figures.
    pub fn destroy_object(
        &self,
        cat: &FileCatalogRef,
        oid: &ObjectId,
        pool: &mut DeallocPool,
        queue: &mut DeallocQueue,
    ) -> Result<Reclamation> {
        if cat.is_nil() {
            return Err(StorageError::BadCatalogReference);
        }
        if oid.is_nil() {
            return Err(StorageError::bad_object("nil object identifier"));
        }

        let entry = self.catalog.file_entry(cat)?;
        if oid.volume != entry.volume {
            return Err(StorageError::bad_file(format!(
                "object {} is not on volume {} of file {}",
                oid, entry.volume, entry.fid
            )));
        }

        let pid = oid.page_id();
        let page = PinnedPage::fetch(self.cache, pid)?;
        check_target(&page.read(), &entry, oid)?;

        self.avail.remove(cat, &page.read())?;
        let reclamation = remove_slot(&mut page.write(), oid.slot_no);
        page.mark_dirty()?;
        debug!(%oid, ?reclamation, "destroyed object");

        let now_empty = !page.read().has_live_object();
        if now_empty && !entry.is_first_page(pid.page_no) {
            let record = pool.allocate(DeallocRecord::Page(pid))?;
            if let Err(e) = self.chain.unlink_page(cat, pid) {
                pool.release(record);
                return Err(e);
            }
            queue.push(record);
            debug!(%pid, fid = entry.fid, "page queued for deferred deallocation");
        } else {
            self.avail.insert(cat, &page.read())?;
        }

        Ok(reclamation)
    }
}

fn check_target(page: &SlottedPage, entry: &CatalogEntry, oid: &ObjectId) -> Result<()> {
    if page.header.fid != entry.fid {
        return Err(StorageError::bad_file(format!(
            "page {} belongs to file {}, not {}",
            page.pid(),
            page.header.fid,
            entry.fid
        )));
    }
    if oid.slot_no == SENTINEL_SLOT {
        return Err(StorageError::bad_object("slot 0 holds no object"));
    }
    let slot = page
        .slot(oid.slot_no)
        .filter(|slot| !slot.is_empty())
        .ok_or_else(|| StorageError::bad_object(format!("no object in slot of {}", oid)))?;
    if slot.unique != oid.unique {
        return Err(StorageError::bad_object(format!(
            "stale identifier {}, slot now carries stamp {}",
            oid, slot.unique
        )));
    }
    Ok(())
}

fn remove_slot(page: &mut SlottedPage, slot_no: SlotNo) -> Reclamation {
    let index = slot_no as usize;
    let offset = page.slots[index].offset;
    let size = page.header_at(offset as usize).stored_size();
    page.slots[index].offset = EMPTY_SLOT;

    if index + 1 == page.slots.len() {
        page.slots.pop();
        if offset as usize + size == page.header.free as usize {
            page.header.free = offset;
            return Reclamation::Immediate {
                freed_offset: offset,
            };
        }
        // moved away from the tail by a pinned compaction; the slot entry
        // itself is gone, only the object bytes remain to reclaim
        page.header.unused += size as u16;
        return Reclamation::Lazy { bytes: size as u16 };
    }

    let bytes = (size + SLOT_ENTRY_SIZE) as u16;
    page.header.unused += bytes;
    Reclamation::Lazy { bytes }
}
