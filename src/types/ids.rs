use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{NIL_PAGE, PageNo, SlotNo, Unique, VolNo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId {
    pub volume: VolNo,
    pub page_no: PageNo,
}

impl PageId {
    pub const fn new(volume: VolNo, page_no: PageNo) -> Self {
        Self { volume, page_no }
    }

    pub fn is_nil(&self) -> bool {
        self.page_no == NIL_PAGE
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.volume, self.page_no)
    }
}

/// Identifies an object by the slot that locates it. The `unique` stamp must
/// match the slot's stamp, otherwise the identifier is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    pub volume: VolNo,
    pub page_no: PageNo,
    pub slot_no: SlotNo,
    pub unique: Unique,
}

impl ObjectId {
    pub const fn new(volume: VolNo, page_no: PageNo, slot_no: SlotNo, unique: Unique) -> Self {
        Self {
            volume,
            page_no,
            slot_no,
            unique,
        }
    }

    pub const fn nil() -> Self {
        Self::new(0, NIL_PAGE, 0, 0)
    }

    pub fn is_nil(&self) -> bool {
        self.page_no == NIL_PAGE
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(self.volume, self.page_no)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}#{}",
            self.volume, self.page_no, self.slot_no, self.unique
        )
    }
}

/// A data file is named by the object that holds its catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileCatalogRef(pub ObjectId);

impl FileCatalogRef {
    pub const fn new(catalog_object: ObjectId) -> Self {
        Self(catalog_object)
    }

    pub const fn nil() -> Self {
        Self(ObjectId::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn object_id(&self) -> ObjectId {
        self.0
    }
}

impl fmt::Display for FileCatalogRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "catalog({})", self.0)
    }
}
