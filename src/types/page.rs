use serde::{Deserialize, Serialize};

use crate::{
    types::{
        DATA_AREA_SIZE, EMPTY_SLOT, FileId, NIL_PAGE, OBJECT_HEADER_SIZE, ObjectId,
        PAGE_CHECKSUM_OFFSET, PAGE_HEADER_SIZE, PAGE_SIZE, PageId, PageNo, SENTINEL_SLOT,
        SLOT_ENTRY_SIZE, SlotNo, Unique,
        error::{Result, StorageError},
        object::ObjectHeader,
    },
    utils::hash::{calculate_page_checksum, verify_page_checksum},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub offset: u16, // Offset into the data area, or EMPTY_SLOT
    pub unique: Unique,
}

impl Slot {
    pub const EMPTY: Slot = Slot {
        offset: EMPTY_SLOT,
        unique: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.offset == EMPTY_SLOT
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageHeader {
    pub pid: PageId,
    pub flags: u16,
    pub free: u16,   // Start of contiguous free space in the data area
    pub unused: u16, // Bytes reclaimable by compaction
    pub fid: FileId,
    pub unique: Unique, // Last generation stamp handed out on this page
    pub prev_page: PageNo,
    pub next_page: PageNo,
}

/*
 * Slotted Page Layout on Disk (little-endian)
 * ┌─────────────────────────────────────────────────────────────────┐
 * │                    PAGE HEADER (36 bytes)                       │
 * │  page_no(4) | volume(2) | flags(2) | n_slots(2) | free(2) |     │
 * │  unused(2) | reserved(2) | fid(4) | unique(4) | prev(4) |       │
 * │  next(4) | checksum(4)                                          │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    DATA AREA (grows upward)                     │
 * │  [hdr|obj 1] [hdr|obj 2] [hole] [hdr|obj 4] ...                 │
 * │                                                  ^ free         │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    FREE SPACE                                   │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                  SLOT ARRAY (grows downward)                    │
 * │  ... [slot2: offset(2)|unique(4)] [slot1] [slot0 sentinel]      │
 * └─────────────────────────────────────────────────────────────────┘
 */

#[derive(Debug, Clone, PartialEq)]
pub struct SlottedPage {
    pub header: PageHeader,
    pub slots: Vec<Slot>, // slots[n] is slot number n
    pub data: Vec<u8>,    // Always DATA_AREA_SIZE bytes
}

impl SlottedPage {
    pub fn new(pid: PageId, fid: FileId) -> Self {
        Self {
            header: PageHeader {
                pid,
                flags: 0,
                free: 0,
                unused: 0,
                fid,
                unique: 0,
                prev_page: NIL_PAGE,
                next_page: NIL_PAGE,
            },
            slots: vec![Slot::EMPTY],
            data: vec![0; DATA_AREA_SIZE],
        }
    }

    pub fn pid(&self) -> PageId {
        self.header.pid
    }

    pub fn n_slots(&self) -> u16 {
        self.slots.len() as u16
    }

    pub fn slot(&self, slot_no: SlotNo) -> Option<&Slot> {
        self.slots.get(slot_no as usize)
    }

    pub fn is_live(&self, slot_no: SlotNo) -> bool {
        slot_no != SENTINEL_SLOT && self.slot(slot_no).is_some_and(|slot| !slot.is_empty())
    }

    pub fn live_slots(&self) -> impl Iterator<Item = SlotNo> + '_ {
        self.slots
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, slot)| !slot.is_empty())
            .map(|(slot_no, _)| slot_no as SlotNo)
    }

    pub fn has_live_object(&self) -> bool {
        self.live_slots().next().is_some()
    }

    /// Lowest live slot strictly above `after`, or the first live slot.
    pub fn next_live_slot(&self, after: Option<SlotNo>) -> Option<SlotNo> {
        let start = after.map_or(1, |slot_no| slot_no as usize + 1).max(1);
        (start..self.slots.len())
            .find(|&slot_no| !self.slots[slot_no].is_empty())
            .map(|slot_no| slot_no as SlotNo)
    }

    pub fn slot_array_size(&self) -> usize {
        self.slots.len() * SLOT_ENTRY_SIZE
    }

    pub fn contiguous_free(&self) -> usize {
        DATA_AREA_SIZE.saturating_sub(self.header.free as usize + self.slot_array_size())
    }

    pub fn total_free(&self) -> usize {
        self.contiguous_free() + self.header.unused as usize
    }

    pub(crate) fn header_at(&self, offset: usize) -> ObjectHeader {
        let mut raw = [0u8; OBJECT_HEADER_SIZE];
        raw.copy_from_slice(&self.data[offset..offset + OBJECT_HEADER_SIZE]);
        ObjectHeader::decode(&raw)
    }

    fn live_offset(&self, slot_no: SlotNo) -> Option<usize> {
        if self.is_live(slot_no) {
            Some(self.slots[slot_no as usize].offset as usize)
        } else {
            None
        }
    }

    pub fn object_header(&self, slot_no: SlotNo) -> Option<ObjectHeader> {
        self.live_offset(slot_no).map(|offset| self.header_at(offset))
    }

    /// Header and padded body, exactly as stored in the data area.
    pub fn object_bytes(&self, slot_no: SlotNo) -> Option<&[u8]> {
        let offset = self.live_offset(slot_no)?;
        let size = self.header_at(offset).stored_size();
        Some(&self.data[offset..offset + size])
    }

    pub fn object_body(&self, slot_no: SlotNo) -> Option<&[u8]> {
        let offset = self.live_offset(slot_no)?;
        let start = offset + OBJECT_HEADER_SIZE;
        Some(&self.data[start..start + self.header_at(offset).length as usize])
    }

    pub fn object_body_mut(&mut self, slot_no: SlotNo) -> Option<&mut [u8]> {
        let offset = self.live_offset(slot_no)?;
        let start = offset + OBJECT_HEADER_SIZE;
        let end = start + self.header_at(offset).length as usize;
        Some(&mut self.data[start..end])
    }

    pub fn object_id(&self, slot_no: SlotNo) -> Option<ObjectId> {
        if !self.is_live(slot_no) {
            return None;
        }
        let pid = self.header.pid;
        Some(ObjectId::new(
            pid.volume,
            pid.page_no,
            slot_no,
            self.slots[slot_no as usize].unique,
        ))
    }

    /// Places an object at the start of contiguous free space under a new
    /// slot number. Holes left by destroyed objects are not reused here.
    pub fn append_object(&mut self, properties: u16, body: &[u8]) -> Result<ObjectId> {
        let pid = self.header.pid;
        let length = u32::try_from(body.len()).map_err(|_| StorageError::PageFull { pid })?;
        let header = ObjectHeader::new(properties, length);
        let stored_size = header.stored_size();

        if self.contiguous_free() < stored_size + SLOT_ENTRY_SIZE {
            return Err(StorageError::PageFull { pid });
        }

        let offset = self.header.free as usize;
        let body_start = offset + OBJECT_HEADER_SIZE;
        self.data[offset..body_start].copy_from_slice(&header.encode());
        self.data[body_start..body_start + body.len()].copy_from_slice(body);
        // zero the alignment padding
        self.data[body_start + body.len()..offset + stored_size].fill(0);

        self.header.unique = self.header.unique.wrapping_add(1);
        let unique = self.header.unique;
        self.slots.push(Slot {
            offset: offset as u16,
            unique,
        });
        self.header.free = (offset + stored_size) as u16;

        let slot_no = (self.slots.len() - 1) as SlotNo;
        Ok(ObjectId::new(pid.volume, pid.page_no, slot_no, unique))
    }

    /// Checks the free-space accounting and that every live object lies
    /// inside `[0, free)`.
    pub fn validate(&self) -> Result<()> {
        let pid = self.header.pid;
        let corrupted = |reason: String| StorageError::CorruptedPage { pid, reason };
        let free = self.header.free as usize;

        if self.slots.is_empty() {
            return Err(corrupted("missing sentinel slot".to_string()));
        }
        if free + self.slot_array_size() > DATA_AREA_SIZE {
            return Err(corrupted(format!(
                "free offset {} overlaps slot array of {} entries",
                free,
                self.slots.len()
            )));
        }
        if self.header.unused as usize > free + self.slot_array_size() {
            return Err(corrupted(format!(
                "unused bytes {} exceed allocated space",
                self.header.unused
            )));
        }

        for slot_no in self.live_slots() {
            let offset = self.slots[slot_no as usize].offset as usize;
            if offset + OBJECT_HEADER_SIZE > free {
                return Err(corrupted(format!(
                    "slot {} offset {} beyond free offset {}",
                    slot_no, offset, free
                )));
            }
            let end = offset + self.header_at(offset).stored_size();
            if end > free {
                return Err(corrupted(format!(
                    "object in slot {} ends at {} beyond free offset {}",
                    slot_no, end, free
                )));
            }
        }

        Ok(())
    }

    /// Serialize the page to bytes following the documented layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; PAGE_SIZE];
        let header = &self.header;

        // PAGE HEADER
        buffer[0..4].copy_from_slice(&header.pid.page_no.to_le_bytes());
        buffer[4..6].copy_from_slice(&header.pid.volume.to_le_bytes());
        buffer[6..8].copy_from_slice(&header.flags.to_le_bytes());
        buffer[8..10].copy_from_slice(&self.n_slots().to_le_bytes());
        buffer[10..12].copy_from_slice(&header.free.to_le_bytes());
        buffer[12..14].copy_from_slice(&header.unused.to_le_bytes());
        // 14..16 reserved
        buffer[16..20].copy_from_slice(&header.fid.to_le_bytes());
        buffer[20..24].copy_from_slice(&header.unique.to_le_bytes());
        buffer[24..28].copy_from_slice(&header.prev_page.to_le_bytes());
        buffer[28..32].copy_from_slice(&header.next_page.to_le_bytes());

        // DATA AREA, only the allocated prefix is meaningful
        let free = header.free as usize;
        buffer[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + free].copy_from_slice(&self.data[..free]);

        // SLOT ARRAY, addressed from the end of the page inward
        for (slot_no, slot) in self.slots.iter().enumerate() {
            let at = slot_position(slot_no);
            buffer[at..at + 2].copy_from_slice(&slot.offset.to_le_bytes());
            buffer[at + 2..at + 6].copy_from_slice(&slot.unique.to_le_bytes());
        }

        let checksum = calculate_page_checksum(&buffer);
        buffer[PAGE_CHECKSUM_OFFSET..PAGE_HEADER_SIZE].copy_from_slice(&checksum.to_le_bytes());

        buffer
    }

    /// Deserialize a page from bytes following the documented layout
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(StorageError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            });
        }

        let pid = PageId::new(read_u16(bytes, 4), read_u32(bytes, 0));
        let stored_checksum = read_u32(bytes, PAGE_CHECKSUM_OFFSET);
        if !verify_page_checksum(bytes, stored_checksum) {
            return Err(StorageError::CorruptedPage {
                pid,
                reason: "checksum mismatch".to_string(),
            });
        }

        let n_slots = read_u16(bytes, 8) as usize;
        let free = read_u16(bytes, 10);
        if n_slots == 0 || free as usize + n_slots * SLOT_ENTRY_SIZE > DATA_AREA_SIZE {
            return Err(StorageError::CorruptedPage {
                pid,
                reason: format!("{} slots with free offset {} exceed data area", n_slots, free),
            });
        }

        let header = PageHeader {
            pid,
            flags: read_u16(bytes, 6),
            free,
            unused: read_u16(bytes, 12),
            fid: read_u32(bytes, 16),
            unique: read_u32(bytes, 20),
            prev_page: read_u32(bytes, 24),
            next_page: read_u32(bytes, 28),
        };

        let slots = (0..n_slots)
            .map(|slot_no| {
                let at = slot_position(slot_no);
                Slot {
                    offset: read_u16(bytes, at),
                    unique: read_u32(bytes, at + 2),
                }
            })
            .collect();

        let mut data = vec![0u8; DATA_AREA_SIZE];
        data[..free as usize]
            .copy_from_slice(&bytes[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + free as usize]);

        let page = SlottedPage {
            header,
            slots,
            data,
        };
        page.validate()?;
        Ok(page)
    }
}

fn slot_position(slot_no: usize) -> usize {
    PAGE_SIZE - (slot_no + 1) * SLOT_ENTRY_SIZE
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
