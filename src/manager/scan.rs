use tracing::trace;

use crate::{
    manager::ObjectManager,
    storage::{buffer::PinnedPage, catalog::CatalogEntry},
    types::{
        FileCatalogRef, NIL_PAGE, ObjectId, PageId, PageNo, SlotNo,
        error::{Result, StorageError},
        object::ObjectHeader,
        page::SlottedPage,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedObject {
    pub oid: ObjectId,
    pub header: ObjectHeader,
}

fn scanned_object(page: &SlottedPage, slot_no: SlotNo) -> Option<ScannedObject> {
    Some(ScannedObject {
        oid: page.object_id(slot_no)?,
        header: page.object_header(slot_no)?,
    })
}

impl ObjectManager<'_> {
    /// Returns the object that follows `current` in file order: slot order
    /// within a page, chain order across pages. With no `current`, returns
    /// the first object of the file. `None` marks the end of the scan.
    ///
    /// `current` is located by walking the chain from the first page. If
    /// destroying `current` left its page empty, that page has been unlinked
    /// and the call fails with `BadObjectIdentifier`. A caller that deletes
    /// while scanning must fetch the successor before destroying.
    pub fn next_object(
        &self,
        cat: &FileCatalogRef,
        current: Option<&ObjectId>,
    ) -> Result<Option<ScannedObject>> {
        if cat.is_nil() {
            return Err(StorageError::BadCatalogReference);
        }
        if current.is_some_and(|oid| oid.is_nil()) {
            return Err(StorageError::bad_object("nil current object"));
        }

        let entry = self.catalog.file_entry(cat)?;
        let Some(current) = current else {
            return self.first_object_from(&entry, entry.first_page);
        };
        if current.volume != entry.volume {
            return Err(StorageError::bad_file(format!(
                "object {} is not on volume {} of file {}",
                current, entry.volume, entry.fid
            )));
        }

        let next_page = {
            let pinned = self.locate_in_chain(&entry, current.page_no)?;
            let page = pinned.read();
            if let Some(found) = page
                .next_live_slot(Some(current.slot_no))
                .and_then(|slot_no| scanned_object(&page, slot_no))
            {
                return Ok(Some(found));
            }
            page.header.next_page
        };

        if entry.is_last_page(current.page_no) {
            return Ok(None);
        }
        self.first_object_from(&entry, next_page)
    }

    /// First live object at or after `page_no` in chain order, skipping
    /// pages that hold none.
    fn first_object_from(
        &self,
        entry: &CatalogEntry,
        mut page_no: PageNo,
    ) -> Result<Option<ScannedObject>> {
        while page_no != NIL_PAGE {
            let pinned = PinnedPage::fetch(self.cache, PageId::new(entry.volume, page_no))?;
            let page = pinned.read();
            if let Some(found) = page
                .next_live_slot(None)
                .and_then(|slot_no| scanned_object(&page, slot_no))
            {
                return Ok(Some(found));
            }
            trace!(page_no, fid = entry.fid, "skipping page without live objects");
            page_no = page.header.next_page;
        }
        Ok(None)
    }

    /// Walks the chain from the first page until `page_no`, returning it
    /// pinned. Every page passed on the way is released.
    fn locate_in_chain(&self, entry: &CatalogEntry, page_no: PageNo) -> Result<PinnedPage<'_>> {
        let mut current = entry.first_page;
        while current != NIL_PAGE {
            let pinned = PinnedPage::fetch(self.cache, PageId::new(entry.volume, current))?;
            if current == page_no {
                return Ok(pinned);
            }
            current = pinned.read().header.next_page;
        }
        Err(StorageError::bad_object(format!(
            "page {} is not in the chain of file {}",
            page_no, entry.fid
        )))
    }

    pub fn scanner(&self, cat: FileCatalogRef) -> ObjectScanner<'_, '_> {
        ObjectScanner::new(self, cat)
    }

    /// Collects every object of the file in scan order.
    pub fn scan_file(&self, cat: &FileCatalogRef) -> Result<Vec<ScannedObject>> {
        ScanIterator::new(self.scanner(*cat)).collect()
    }
}

pub trait Scanner {
    fn scan(&mut self) -> Result<Option<ScannedObject>>;
    fn scan_batch(&mut self, batch_size: usize) -> Result<Vec<ScannedObject>>;
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    StartOfFile,
    PositionedAt(ObjectId),
    EndOfScan,
}

/// Cursor over a file's objects, one [`ObjectManager::next_object`] call per
/// step. No page stays pinned between steps.
pub struct ObjectScanner<'m, 'a> {
    manager: &'m ObjectManager<'a>,
    cat: FileCatalogRef,
    state: ScanState,
}

impl<'m, 'a> ObjectScanner<'m, 'a> {
    pub fn new(manager: &'m ObjectManager<'a>, cat: FileCatalogRef) -> Self {
        Self {
            manager,
            cat,
            state: ScanState::StartOfFile,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }
}

impl Scanner for ObjectScanner<'_, '_> {
    fn scan(&mut self) -> Result<Option<ScannedObject>> {
        let current = match self.state {
            ScanState::StartOfFile => None,
            ScanState::PositionedAt(oid) => Some(oid),
            ScanState::EndOfScan => return Ok(None),
        };
        match self.manager.next_object(&self.cat, current.as_ref())? {
            Some(found) => {
                self.state = ScanState::PositionedAt(found.oid);
                Ok(Some(found))
            }
            None => {
                self.state = ScanState::EndOfScan;
                Ok(None)
            }
        }
    }

    fn scan_batch(&mut self, batch_size: usize) -> Result<Vec<ScannedObject>> {
        let mut batch = Vec::with_capacity(batch_size);
        while batch.len() < batch_size {
            match self.scan()? {
                Some(found) => batch.push(found),
                None => break,
            }
        }
        Ok(batch)
    }

    fn reset(&mut self) {
        self.state = ScanState::StartOfFile;
    }
}

pub struct ScanIterator<S: Scanner> {
    scanner: S,
}

impl<S: Scanner> ScanIterator<S> {
    pub fn new(scanner: S) -> Self {
        Self { scanner }
    }
}

impl<S: Scanner> Iterator for ScanIterator<S> {
    type Item = Result<ScannedObject>;
    fn next(&mut self) -> Option<Self::Item> {
        match self.scanner.scan() {
            Ok(Some(found)) => Some(Ok(found)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
