use petak::{
    config::BufferPoolConfig,
    manager::ObjectManager,
    storage::{
        buffer::PinnedPage,
        buffer_pool::BufferPool,
        catalog::{CatalogAccessor, CatalogEntry, PageCatalog},
        chain::{FileChain, PageChain},
        dealloc::{DeallocPool, DeallocQueue},
    },
    types::{
        FileCatalogRef, NIL_PAGE, ObjectId, PageId,
        error::{CollaboratorError, StorageError},
        object::properties,
    },
    utils::mock::{BucketedAvailIndex, TempVolume},
};

const VOLUME: u16 = 4;
const CATALOG_FID: u32 = 0;
const FID: u32 = 31;

/// A volume whose page 0 holds the catalog, followed by `data_pages` pages
/// linked into one file.
struct OnDiskFile {
    pool: BufferPool,
    catalog_page: PageId,
    pages: Vec<PageId>,
}

impl OnDiskFile {
    fn create(temp: &TempVolume, data_pages: usize) -> Self {
        let volume = temp.open(VOLUME).unwrap();
        let pool = BufferPool::new(volume, BufferPoolConfig::new(8)).unwrap();
        let catalog_page = pool.allocate_page(CATALOG_FID).unwrap();
        let pages: Vec<PageId> = (0..data_pages)
            .map(|_| pool.allocate_page(FID).unwrap())
            .collect();

        for (i, pid) in pages.iter().enumerate() {
            let pinned = PinnedPage::fetch(&pool, *pid).unwrap();
            {
                let mut page = pinned.write();
                page.header.prev_page = if i > 0 { pages[i - 1].page_no } else { NIL_PAGE };
                page.header.next_page = pages.get(i + 1).map_or(NIL_PAGE, |next| next.page_no);
            }
            pinned.mark_dirty().unwrap();
        }

        Self {
            pool,
            catalog_page,
            pages,
        }
    }

    fn entry(&self) -> CatalogEntry {
        let mut entry = CatalogEntry::new(FID, VOLUME, self.pages[0].page_no);
        entry.last_page = self.pages[self.pages.len() - 1].page_no;
        entry
    }

    fn links(&self, pid: PageId) -> (u32, u32) {
        let pinned = PinnedPage::fetch(&self.pool, pid).unwrap();
        let page = pinned.read();
        (page.header.prev_page, page.header.next_page)
    }
}

#[test]
fn test_catalog_entry_encoding_is_fixed_width() {
    let small = CatalogEntry::new(1, 1, 1);
    let large = CatalogEntry {
        fid: u32::MAX - 1,
        volume: u16::MAX,
        first_page: 70_000,
        last_page: NIL_PAGE - 1,
    };

    let small_bytes = small.encode().unwrap();
    let large_bytes = large.encode().unwrap();
    assert_eq!(small_bytes.len(), 14);
    assert_eq!(large_bytes.len(), small_bytes.len());
    assert_eq!(&small_bytes[0..4], &1u32.to_le_bytes());

    assert_eq!(CatalogEntry::decode(&large_bytes).unwrap(), large);
    assert!(CatalogEntry::decode(&large_bytes[..5]).is_err());
}

#[test]
fn test_page_catalog_register_update_and_reload() {
    let temp = TempVolume::with_prefix("petak_catalog").unwrap();
    let (cat, other_cat) = {
        let file = OnDiskFile::create(&temp, 2);
        let catalog = PageCatalog::new(&file.pool);

        let cat = catalog.register(file.catalog_page, &file.entry()).unwrap();
        let other_cat = catalog
            .register(file.catalog_page, &CatalogEntry::new(FID + 1, VOLUME, 40))
            .unwrap();
        assert_eq!(cat.object_id().slot_no, 1);
        assert_eq!(other_cat.object_id().slot_no, 2);
        assert_eq!(catalog.file_entry(&cat).unwrap(), file.entry());

        let mut entry = file.entry();
        entry.last_page = file.pages[0].page_no;
        catalog.update_file_entry(&cat, &entry).unwrap();
        assert_eq!(catalog.file_entry(&cat).unwrap(), entry);
        assert!(file.pool.is_dirty(file.catalog_page));

        file.pool.flush_all().unwrap();
        (cat, other_cat)
    };

    let volume = temp.open(VOLUME).unwrap();
    let pool = BufferPool::new(volume, BufferPoolConfig::default()).unwrap();
    let catalog = PageCatalog::new(&pool);

    let entry = catalog.file_entry(&cat).unwrap();
    assert_eq!(entry.fid, FID);
    assert_eq!(entry.first_page, entry.last_page);
    assert_eq!(catalog.file_entry(&other_cat).unwrap().first_page, 40);
    assert_eq!(pool.pin_count(cat.object_id().page_id()), 0);
}

#[test]
fn test_page_catalog_rejects_unknown_references() {
    let temp = TempVolume::with_prefix("petak_catalog").unwrap();
    let file = OnDiskFile::create(&temp, 1);
    let catalog = PageCatalog::new(&file.pool);
    let cat = catalog.register(file.catalog_page, &file.entry()).unwrap();

    let stale = FileCatalogRef::new(ObjectId {
        unique: cat.object_id().unique + 1,
        ..cat.object_id()
    });
    assert!(matches!(
        catalog.file_entry(&stale),
        Err(StorageError::Collaborator(CollaboratorError::CatalogLookup { .. }))
    ));
    assert!(matches!(
        catalog.file_entry(&FileCatalogRef::nil()),
        Err(StorageError::BadCatalogReference)
    ));

    // a catalog object must be rewritten with a body of the same size
    let data_object = {
        let pinned = PinnedPage::fetch(&file.pool, file.catalog_page).unwrap();
        let oid = pinned
            .write()
            .append_object(properties::CLEAR, b"x")
            .unwrap();
        oid
    };
    let result = catalog.update_file_entry(&FileCatalogRef::new(data_object), &file.entry());
    assert!(matches!(
        result,
        Err(StorageError::Collaborator(CollaboratorError::CatalogLookup { .. }))
    ));
    assert_eq!(file.pool.pin_count(file.catalog_page), 0);
}

#[test]
fn test_chain_unlinks_middle_and_tail_pages() {
    let temp = TempVolume::with_prefix("petak_chain").unwrap();
    let file = OnDiskFile::create(&temp, 4);
    let catalog = PageCatalog::new(&file.pool);
    let cat = catalog.register(file.catalog_page, &file.entry()).unwrap();
    let chain = PageChain::new(&file.pool, &catalog);
    let [p0, p1, p2, p3] = [0, 1, 2, 3].map(|i| file.pages[i]);

    chain.unlink_page(&cat, p1).unwrap();
    assert_eq!(file.links(p0), (NIL_PAGE, p2.page_no));
    assert_eq!(file.links(p2), (p0.page_no, p3.page_no));
    assert_eq!(file.links(p1), (NIL_PAGE, NIL_PAGE));
    assert_eq!(catalog.file_entry(&cat).unwrap().last_page, p3.page_no);

    chain.unlink_page(&cat, p3).unwrap();
    assert_eq!(file.links(p2), (p0.page_no, NIL_PAGE));
    assert_eq!(catalog.file_entry(&cat).unwrap().last_page, p2.page_no);

    assert!(file.pages.iter().all(|pid| file.pool.pin_count(*pid) == 0));
}

#[test]
fn test_chain_refuses_first_and_unlinked_pages() {
    let temp = TempVolume::with_prefix("petak_chain").unwrap();
    let file = OnDiskFile::create(&temp, 3);
    let catalog = PageCatalog::new(&file.pool);
    let cat = catalog.register(file.catalog_page, &file.entry()).unwrap();
    let chain = PageChain::new(&file.pool, &catalog);

    assert!(matches!(
        chain.unlink_page(&cat, file.pages[0]),
        Err(StorageError::Collaborator(CollaboratorError::Chain { .. }))
    ));

    chain.unlink_page(&cat, file.pages[1]).unwrap();
    assert!(matches!(
        chain.unlink_page(&cat, file.pages[1]),
        Err(StorageError::Collaborator(CollaboratorError::Chain { .. }))
    ));
    assert_eq!(file.links(file.pages[0]), (NIL_PAGE, file.pages[2].page_no));
}

#[test]
fn test_object_manager_over_volume() {
    let temp = TempVolume::with_prefix("petak_manager").unwrap();
    let cat = {
        let file = OnDiskFile::create(&temp, 3);
        let catalog = PageCatalog::new(&file.pool);
        let cat = catalog.register(file.catalog_page, &file.entry()).unwrap();
        let chain = PageChain::new(&file.pool, &catalog);
        let avail = BucketedAvailIndex::new();
        let manager = ObjectManager::new(&file.pool, &catalog, &avail, &chain);

        let objects: [(usize, &[u8]); 4] =
            [(0, b"alpha"), (0, b"beta"), (1, b"gamma"), (2, b"delta")];
        let mut oids = Vec::new();
        for (page_index, body) in objects {
            let pinned = PinnedPage::fetch(&file.pool, file.pages[page_index]).unwrap();
            oids.push(pinned.write().append_object(properties::CLEAR, body).unwrap());
            pinned.mark_dirty().unwrap();
        }

        let mut pool = DeallocPool::new(8);
        let mut queue = DeallocQueue::new();
        manager
            .destroy_object(&cat, &oids[2], &mut pool, &mut queue)
            .unwrap();
        manager
            .destroy_object(&cat, &oids[0], &mut pool, &mut queue)
            .unwrap();
        assert!(queue.contains_page(file.pages[1]));
        assert_eq!(queue.len(), 1);

        manager.compact(file.pages[0], None).unwrap();

        let scanned: Vec<ObjectId> = manager
            .scan_file(&cat)
            .unwrap()
            .into_iter()
            .map(|found| found.oid)
            .collect();
        assert_eq!(scanned, vec![oids[1], oids[3]]);
        assert!(
            [file.catalog_page]
                .iter()
                .chain(&file.pages)
                .all(|pid| file.pool.pin_count(*pid) == 0)
        );

        file.pool.flush_all().unwrap();
        cat
    };

    let volume = temp.open(VOLUME).unwrap();
    let pool = BufferPool::new(volume, BufferPoolConfig::default()).unwrap();
    let catalog = PageCatalog::new(&pool);
    let chain = PageChain::new(&pool, &catalog);
    let avail = BucketedAvailIndex::new();
    let manager = ObjectManager::new(&pool, &catalog, &avail, &chain);

    let found = manager.scan_file(&cat).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].header.length, 4);
    assert_eq!(found[1].header.length, 5);

    let pinned = PinnedPage::fetch(&pool, found[0].oid.page_id()).unwrap();
    assert_eq!(pinned.read().slots[2].offset, 0);
    assert_eq!(pinned.read().header.unused, 0);
}
