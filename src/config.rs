//! Configuration for the object manager and the collaborators it ships with.

use serde::{Deserialize, Serialize};

/// How compaction sets the slot count of the page it rewrites.
///
/// Recounting renumbers nothing but shrinks the slot range, so identifiers
/// above a hole left by destroy stop resolving after compaction and a later
/// scan skips them. Identifiers that must survive destroy, compact, then
/// scan need the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotCountPolicy {
    /// Every live slot keeps its number; only trailing EMPTY entries are
    /// dropped.
    #[default]
    PreserveSlotNumbers,
    /// `n_slots` becomes the number of copied objects plus the sentinel.
    /// Objects sitting above an earlier hole fall outside the slot range and
    /// their identifiers stop resolving.
    RecountLiveSlots,
}

/// Configuration for [`crate::manager::ObjectManager`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectManagerConfig {
    pub slot_count_policy: SlotCountPolicy,
}

impl ObjectManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot_count_policy(mut self, policy: SlotCountPolicy) -> Self {
        self.slot_count_policy = policy;
        self
    }
}

/// Configuration for the file-backed [`crate::storage::buffer_pool::BufferPool`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferPoolConfig {
    /// Number of page frames kept resident.
    pub frames: usize,
}

impl BufferPoolConfig {
    pub fn new(frames: usize) -> Self {
        Self { frames }
    }

    pub fn with_frames(mut self, frames: usize) -> Self {
        self.frames = frames;
        self
    }

    /// Returns the memory held by resident frames.
    pub fn memory_usage(&self) -> usize {
        self.frames * crate::types::PAGE_SIZE
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.frames == 0 {
            return Err("frames must be > 0");
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Configuration for [`crate::storage::dealloc::DeallocPool`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeallocPoolConfig {
    /// Records that may be outstanding in queues at once.
    pub capacity: usize,
}

impl DeallocPoolConfig {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

impl Default for DeallocPoolConfig {
    fn default() -> Self {
        Self::new(128)
    }
}
