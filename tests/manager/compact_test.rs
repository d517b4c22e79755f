use petak::{
    config::{ObjectManagerConfig, SlotCountPolicy},
    manager::{ObjectManager, compact_page},
    storage::chain::PageChain,
    types::{
        EMPTY_SLOT, PageId, SLOT_ENTRY_SIZE, SlotNo,
        error::StorageError,
        object::properties,
        page::SlottedPage,
    },
    utils::mock::{BucketedAvailIndex, MemoryBufferCache, MemoryCatalog, TestFile},
};

fn page_with_objects(body_sizes: &[usize]) -> SlottedPage {
    let mut page = SlottedPage::new(PageId::new(1, 20), 5);
    for (i, &size) in body_sizes.iter().enumerate() {
        page.append_object(properties::CLEAR, &vec![i as u8 + 1; size])
            .unwrap();
    }
    page
}

/// Empties `slot_no` the way a lazy destroy does.
fn punch_hole(page: &mut SlottedPage, slot_no: SlotNo) {
    let size = page.object_bytes(slot_no).unwrap().len();
    page.slots[slot_no as usize].offset = EMPTY_SLOT;
    page.header.unused += (size + SLOT_ENTRY_SIZE) as u16;
}

fn contents(page: &SlottedPage) -> Vec<(SlotNo, Vec<u8>)> {
    page.live_slots()
        .map(|slot_no| (slot_no, page.object_bytes(slot_no).unwrap().to_vec()))
        .collect()
}

#[test]
fn test_compaction_preserves_content() {
    let mut page = page_with_objects(&[4, 12, 8, 20, 1]);
    punch_hole(&mut page, 2);
    punch_hole(&mut page, 4);
    let before = contents(&page);

    let summary = compact_page(&mut page, None, SlotCountPolicy::PreserveSlotNumbers).unwrap();

    assert_eq!(contents(&page), before);
    assert_eq!(summary.moved, 3);
    assert_eq!(summary.orphaned, 0);
    assert_eq!(page.header.unused, 0);

    let live_bytes: usize = before.iter().map(|(_, bytes)| bytes.len()).sum();
    assert_eq!(page.header.free as usize, live_bytes);
    assert_eq!(summary.free, page.header.free);

    // objects are packed from offset 0 in slot order
    let mut expected_offset = 0;
    for (slot_no, bytes) in &before {
        assert_eq!(page.slots[*slot_no as usize].offset, expected_offset);
        expected_offset += bytes.len() as u16;
    }
    assert!(page.validate().is_ok());
}

#[test]
fn test_compaction_places_pinned_slot_last() {
    let mut page = page_with_objects(&[4, 12, 8]);
    let before = contents(&page);

    compact_page(&mut page, Some(1), SlotCountPolicy::PreserveSlotNumbers).unwrap();

    assert_eq!(contents(&page), before);
    assert_eq!(page.slots[2].offset, 0);
    assert_eq!(page.slots[3].offset, 20);
    assert_eq!(page.slots[1].offset, 36);
    assert_eq!(page.header.free, 48);
    assert!(page.validate().is_ok());
}

#[test]
fn test_compaction_is_idempotent() {
    let mut page = page_with_objects(&[7, 3, 30, 9]);
    punch_hole(&mut page, 1);
    punch_hole(&mut page, 3);

    compact_page(&mut page, None, SlotCountPolicy::PreserveSlotNumbers).unwrap();
    let once = page.clone();
    compact_page(&mut page, None, SlotCountPolicy::PreserveSlotNumbers).unwrap();

    assert_eq!(page, once);
}

#[test]
fn test_compaction_rejects_empty_pinned_slot() {
    let mut page = page_with_objects(&[4, 4, 4]);
    punch_hole(&mut page, 2);
    let before = page.clone();

    for pinned in [0, 2, 9] {
        let result = compact_page(&mut page, Some(pinned), SlotCountPolicy::PreserveSlotNumbers);
        assert!(matches!(result, Err(StorageError::InvalidSlotIndex { .. })));
        assert_eq!(page, before);
    }
}

#[test]
fn test_compaction_of_empty_page() {
    let mut page = page_with_objects(&[4, 4]);
    punch_hole(&mut page, 1);
    punch_hole(&mut page, 2);

    let summary = compact_page(&mut page, None, SlotCountPolicy::PreserveSlotNumbers).unwrap();

    assert_eq!(summary.moved, 0);
    assert_eq!(page.n_slots(), 1);
    assert_eq!(page.header.free, 0);
    assert_eq!(page.header.unused, 0);
    assert!(!page.has_live_object());
}

#[test]
fn test_preserve_policy_trims_trailing_empty_slots() {
    let mut page = page_with_objects(&[4, 4, 4]);
    punch_hole(&mut page, 2);
    punch_hole(&mut page, 3);

    let summary = compact_page(&mut page, None, SlotCountPolicy::PreserveSlotNumbers).unwrap();

    assert_eq!(summary.n_slots, 2);
    assert_eq!(page.n_slots(), 2);
    assert_eq!(page.header.free, 12);
    assert!(page.is_live(1));
}

#[test]
fn test_recount_policy_orphans_objects_above_a_hole() {
    let mut page = page_with_objects(&[4, 4, 4]);
    punch_hole(&mut page, 1);

    let summary = compact_page(&mut page, None, SlotCountPolicy::RecountLiveSlots).unwrap();

    assert_eq!(summary.moved, 2);
    assert_eq!(summary.n_slots, 3);
    assert_eq!(summary.orphaned, 1);
    assert_eq!(page.header.free, 24);
    assert!(page.is_live(2));
    assert!(page.object_header(3).is_none());
    assert_eq!(page.live_slots().collect::<Vec<_>>(), vec![2]);
}

#[test]
fn test_recount_policy_matches_preserve_without_holes() {
    let mut preserved = page_with_objects(&[4, 12, 8]);
    let mut recounted = preserved.clone();

    compact_page(&mut preserved, None, SlotCountPolicy::PreserveSlotNumbers).unwrap();
    let summary = compact_page(&mut recounted, None, SlotCountPolicy::RecountLiveSlots).unwrap();

    assert_eq!(summary.orphaned, 0);
    assert_eq!(preserved, recounted);
}

#[test]
fn test_compacted_page_survives_serialization() {
    let mut page = page_with_objects(&[5, 11, 2, 40]);
    punch_hole(&mut page, 2);
    compact_page(&mut page, Some(4), SlotCountPolicy::PreserveSlotNumbers).unwrap();

    let reconstructed = SlottedPage::from_bytes(&page.to_bytes()).unwrap();
    assert_eq!(contents(&reconstructed), contents(&page));
}

#[test]
fn test_manager_compact_marks_page_dirty_and_releases_pin() {
    let cache = MemoryBufferCache::new();
    let catalog = MemoryCatalog::new();
    let avail = BucketedAvailIndex::new();
    let chain = PageChain::new(&cache, &catalog);
    let file = TestFile::create(&cache, &catalog, 1, 5, 30, 1);
    for size in [4, 12, 8] {
        file.append(&cache, 0, &vec![0xCD; size]).unwrap();
    }
    {
        let pid = file.pages[0];
        let mut page = cache.snapshot(pid).unwrap();
        punch_hole(&mut page, 1);
        cache.insert_page(page);
    }

    let manager = ObjectManager::new(&cache, &catalog, &avail, &chain).with_config(
        ObjectManagerConfig::new().with_slot_count_policy(SlotCountPolicy::PreserveSlotNumbers),
    );
    assert_eq!(
        manager.config().slot_count_policy,
        SlotCountPolicy::PreserveSlotNumbers
    );
    let summary = manager.compact(file.pages[0], None).unwrap();

    assert_eq!(summary.moved, 2);
    assert_eq!(summary.free, 36);
    assert!(cache.is_dirty(file.pages[0]));
    assert_eq!(cache.total_pins(), 0);

    let page = cache.snapshot(file.pages[0]).unwrap();
    assert_eq!(page.slots[2].offset, 0);
    assert_eq!(page.slots[3].offset, 20);
}

#[test]
fn test_manager_compact_releases_pin_on_invalid_slot() {
    let cache = MemoryBufferCache::new();
    let catalog = MemoryCatalog::new();
    let avail = BucketedAvailIndex::new();
    let chain = PageChain::new(&cache, &catalog);
    let file = TestFile::create(&cache, &catalog, 1, 5, 30, 1);
    file.append(&cache, 0, &[1, 2, 3]).unwrap();

    let manager = ObjectManager::new(&cache, &catalog, &avail, &chain);
    let result = manager.compact(file.pages[0], Some(4));

    assert!(matches!(result, Err(StorageError::InvalidSlotIndex { .. })));
    assert_eq!(cache.total_pins(), 0);
}

#[test]
fn test_default_policy_keeps_identifiers_after_hole() {
    assert_eq!(SlotCountPolicy::default(), SlotCountPolicy::PreserveSlotNumbers);

    let mut page = page_with_objects(&[4, 12, 8]);
    punch_hole(&mut page, 1);
    let before = contents(&page);

    let summary = compact_page(&mut page, None, SlotCountPolicy::default()).unwrap();

    assert_eq!(summary.orphaned, 0);
    assert_eq!(page.n_slots(), 4);
    assert_eq!(contents(&page), before);
    assert_eq!(page.live_slots().collect::<Vec<_>>(), vec![2, 3]);
}
