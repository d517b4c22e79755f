//! In-memory collaborators and fixtures for exercising the object manager
//! without a volume file.

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
    path::PathBuf,
    rc::Rc,
};

use tempfile::TempDir;

use crate::{
    storage::{
        avail::AvailabilityIndex,
        buffer::{BufferCache, PinnedPage, SharedPage},
        catalog::{CatalogAccessor, CatalogEntry},
        volume::Volume,
    },
    types::{
        DATA_AREA_SIZE, FileCatalogRef, FileId, ObjectId, PageId, PageNo, VolNo,
        error::{CollaboratorError, Result, StorageError},
        object::properties,
        page::SlottedPage,
    },
};

struct MemoryFrame {
    page: SharedPage,
    pin_count: usize,
    dirty: bool,
}

/// Buffer cache over pages kept in a map, with pin accounting and fetch
/// failure injection.
#[derive(Default)]
pub struct MemoryBufferCache {
    frames: RefCell<HashMap<PageId, MemoryFrame>>,
    failing: RefCell<HashSet<PageId>>,
}

impl MemoryBufferCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_page(&self, page: SlottedPage) {
        self.frames.borrow_mut().insert(
            page.pid(),
            MemoryFrame {
                page: Rc::new(RefCell::new(page)),
                pin_count: 0,
                dirty: false,
            },
        );
    }

    /// Copy of the page as it currently stands.
    pub fn snapshot(&self, pid: PageId) -> Option<SlottedPage> {
        self.frames
            .borrow()
            .get(&pid)
            .map(|frame| frame.page.borrow().clone())
    }

    pub fn pin_count(&self, pid: PageId) -> usize {
        self.frames
            .borrow()
            .get(&pid)
            .map_or(0, |frame| frame.pin_count)
    }

    pub fn total_pins(&self) -> usize {
        self.frames
            .borrow()
            .values()
            .map(|frame| frame.pin_count)
            .sum()
    }

    pub fn is_dirty(&self, pid: PageId) -> bool {
        self.frames.borrow().get(&pid).is_some_and(|frame| frame.dirty)
    }

    /// Makes every later fetch of `pid` fail with an I/O error.
    pub fn fail_fetch(&self, pid: PageId) {
        self.failing.borrow_mut().insert(pid);
    }

    pub fn clear_failures(&self) {
        self.failing.borrow_mut().clear();
    }
}

impl BufferCache for MemoryBufferCache {
    fn fetch(&self, pid: PageId) -> Result<SharedPage> {
        if self.failing.borrow().contains(&pid) {
            return Err(std::io::Error::other(format!("injected read failure on {}", pid)).into());
        }
        let mut frames = self.frames.borrow_mut();
        let frame = frames
            .get_mut(&pid)
            .ok_or(CollaboratorError::PageNotResident { pid })?;
        frame.pin_count += 1;
        Ok(Rc::clone(&frame.page))
    }

    fn release(&self, pid: PageId) {
        if let Some(frame) = self.frames.borrow_mut().get_mut(&pid) {
            frame.pin_count = frame.pin_count.saturating_sub(1);
        }
    }

    fn mark_dirty(&self, pid: PageId) -> Result<()> {
        let mut frames = self.frames.borrow_mut();
        let frame = frames
            .get_mut(&pid)
            .ok_or(CollaboratorError::PageNotResident { pid })?;
        frame.dirty = true;
        Ok(())
    }
}

/// Page number used for the synthetic catalog objects of [`MemoryCatalog`].
pub const MEMORY_CATALOG_PAGE: PageNo = 0;

#[derive(Default)]
pub struct MemoryCatalog {
    entries: RefCell<HashMap<ObjectId, CatalogEntry>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, entry: CatalogEntry) -> FileCatalogRef {
        let mut entries = self.entries.borrow_mut();
        let slot_no = entries.len() as u16 + 1;
        let oid = ObjectId::new(entry.volume, MEMORY_CATALOG_PAGE, slot_no, 1);
        entries.insert(oid, entry);
        FileCatalogRef::new(oid)
    }

    pub fn entry(&self, cat: &FileCatalogRef) -> Option<CatalogEntry> {
        self.entries.borrow().get(&cat.object_id()).copied()
    }
}

impl CatalogAccessor for MemoryCatalog {
    fn file_entry(&self, cat: &FileCatalogRef) -> Result<CatalogEntry> {
        if cat.is_nil() {
            return Err(StorageError::BadCatalogReference);
        }
        self.entry(cat).ok_or_else(|| {
            CollaboratorError::CatalogLookup {
                reason: format!("no entry for {}", cat),
            }
            .into()
        })
    }

    fn update_file_entry(&self, cat: &FileCatalogRef, entry: &CatalogEntry) -> Result<()> {
        match self.entries.borrow_mut().get_mut(&cat.object_id()) {
            Some(stored) => {
                *stored = *entry;
                Ok(())
            }
            None => Err(CollaboratorError::CatalogLookup {
                reason: format!("no entry for {}", cat),
            }
            .into()),
        }
    }
}

/// Free-space bucket, by the share of the data area a page has free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AvailBucket {
    Percent10,
    Percent20,
    Percent30,
    Percent40,
    Percent50,
}

impl AvailBucket {
    /// `None` when less than a tenth of the page is free.
    pub fn for_page(page: &SlottedPage) -> Option<Self> {
        let percent = page.total_free() * 100 / DATA_AREA_SIZE;
        match percent {
            0..=9 => None,
            10..=19 => Some(AvailBucket::Percent10),
            20..=29 => Some(AvailBucket::Percent20),
            30..=39 => Some(AvailBucket::Percent30),
            40..=49 => Some(AvailBucket::Percent40),
            _ => Some(AvailBucket::Percent50),
        }
    }
}

#[derive(Default)]
pub struct BucketedAvailIndex {
    buckets: RefCell<HashMap<PageId, AvailBucket>>,
    fail_inserts: Cell<bool>,
}

impl BucketedAvailIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket_of(&self, pid: PageId) -> Option<AvailBucket> {
        self.buckets.borrow().get(&pid).copied()
    }

    pub fn contains(&self, pid: PageId) -> bool {
        self.buckets.borrow().contains_key(&pid)
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.set(fail);
    }
}

impl AvailabilityIndex for BucketedAvailIndex {
    fn remove(&self, _cat: &FileCatalogRef, page: &SlottedPage) -> Result<()> {
        self.buckets.borrow_mut().remove(&page.pid());
        Ok(())
    }

    fn insert(&self, _cat: &FileCatalogRef, page: &SlottedPage) -> Result<()> {
        if self.fail_inserts.get() {
            return Err(CollaboratorError::AvailabilityIndex {
                reason: format!("injected insert failure on {}", page.pid()),
            }
            .into());
        }
        if let Some(bucket) = AvailBucket::for_page(page) {
            self.buckets.borrow_mut().insert(page.pid(), bucket);
        }
        Ok(())
    }
}

/// A data file laid out across linked pages of a [`MemoryBufferCache`].
pub struct TestFile {
    pub cat: FileCatalogRef,
    pub fid: FileId,
    pub pages: Vec<PageId>,
}

impl TestFile {
    /// Creates `page_count` empty pages numbered from `first_page_no`,
    /// links them in order and registers the file in `catalog`.
    pub fn create(
        cache: &MemoryBufferCache,
        catalog: &MemoryCatalog,
        volume: VolNo,
        fid: FileId,
        first_page_no: PageNo,
        page_count: usize,
    ) -> Self {
        let pages: Vec<PageId> = (0..page_count as PageNo)
            .map(|i| PageId::new(volume, first_page_no + i))
            .collect();

        for (i, pid) in pages.iter().enumerate() {
            let mut page = SlottedPage::new(*pid, fid);
            if i > 0 {
                page.header.prev_page = pages[i - 1].page_no;
            }
            if let Some(next) = pages.get(i + 1) {
                page.header.next_page = next.page_no;
            }
            cache.insert_page(page);
        }

        let mut entry = CatalogEntry::new(fid, volume, pages[0].page_no);
        entry.last_page = pages[pages.len() - 1].page_no;
        let cat = catalog.register(entry);

        Self { cat, fid, pages }
    }

    /// Appends an object of `body` to the `page_index`-th page.
    pub fn append(
        &self,
        cache: &MemoryBufferCache,
        page_index: usize,
        body: &[u8],
    ) -> Result<ObjectId> {
        let page = PinnedPage::fetch(cache, self.pages[page_index])?;
        let oid = page.write().append_object(properties::CLEAR, body)?;
        page.mark_dirty()?;
        Ok(oid)
    }
}

/// A volume file in a temporary directory removed on drop.
pub struct TempVolume {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TempVolume {
    pub fn with_prefix(prefix: &str) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        let path = dir.path().join("volume.db");
        Ok(Self { dir, path })
    }

    pub fn open(&self, volume: VolNo) -> Result<Volume> {
        Volume::new(&self.path, volume)
    }
}
