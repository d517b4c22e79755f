use tracing::{debug, warn};

use crate::{
    config::SlotCountPolicy,
    manager::ObjectManager,
    storage::buffer::PinnedPage,
    types::{
        DATA_AREA_SIZE, PageId, SlotNo,
        error::{Result, StorageError},
        page::SlottedPage,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionSummary {
    /// Objects copied into the new layout.
    pub moved: usize,
    pub free: u16,
    pub n_slots: u16,
    /// Live objects left outside the slot range by a recount.
    pub orphaned: usize,
}

/// Moves every live object to the front of the data area in slot order,
/// leaving all free space contiguous. A `pinned` slot is placed last so the
/// free region starts right after it.
///
/// The new data area is built in a separate buffer and swapped in once
/// complete.
pub fn compact_page(
    page: &mut SlottedPage,
    pinned: Option<SlotNo>,
    policy: SlotCountPolicy,
) -> Result<CompactionSummary> {
    if let Some(slot_no) = pinned {
        if !page.is_live(slot_no) {
            return Err(StorageError::InvalidSlotIndex {
                index: slot_no as usize,
                max: page.slots.len(),
            });
        }
    }

    let order: Vec<SlotNo> = page
        .live_slots()
        .filter(|&slot_no| Some(slot_no) != pinned)
        .chain(pinned)
        .collect();

    let mut data = vec![0u8; DATA_AREA_SIZE];
    let mut slots = page.slots.clone();
    let mut cursor = 0usize;

    for &slot_no in &order {
        if let Some(bytes) = page.object_bytes(slot_no) {
            data[cursor..cursor + bytes.len()].copy_from_slice(bytes);
            slots[slot_no as usize].offset = cursor as u16;
            cursor += bytes.len();
        }
    }

    let retained = match policy {
        SlotCountPolicy::PreserveSlotNumbers => page
            .live_slots()
            .last()
            .map_or(1, |slot_no| slot_no as usize + 1),
        SlotCountPolicy::RecountLiveSlots => order.len() + 1,
    };
    let orphaned = order
        .iter()
        .filter(|&&slot_no| slot_no as usize >= retained)
        .count();
    if orphaned > 0 {
        warn!(
            pid = %page.pid(),
            orphaned,
            n_slots = retained,
            "slot recount left live objects outside the slot array"
        );
    }
    slots.truncate(retained);

    page.data = data;
    page.slots = slots;
    page.header.free = cursor as u16;
    page.header.unused = 0;

    Ok(CompactionSummary {
        moved: order.len(),
        free: page.header.free,
        n_slots: page.n_slots(),
        orphaned,
    })
}

impl ObjectManager<'_> {
    /// Compacts a resident page in place and marks it dirty.
    pub fn compact(&self, pid: PageId, pinned: Option<SlotNo>) -> Result<CompactionSummary> {
        let page = PinnedPage::fetch(self.cache, pid)?;
        let summary = compact_page(&mut page.write(), pinned, self.config.slot_count_policy)?;
        page.mark_dirty()?;
        debug!(
            %pid,
            moved = summary.moved,
            free = summary.free,
            n_slots = summary.n_slots,
            "compacted page"
        );
        Ok(summary)
    }
}
