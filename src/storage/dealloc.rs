//! Deferred deallocation: records of storage to release once the enclosing
//! operation has finished, queued by the caller and drained by a sweep.

use std::collections::VecDeque;

use crate::{
    config::DeallocPoolConfig,
    types::{
        PageId,
        error::{CollaboratorError, Result},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeallocRecord {
    Page(PageId),
}

/// Bounded supply of queue records shared by the queues of one context.
#[derive(Debug)]
pub struct DeallocPool {
    capacity: usize,
    outstanding: usize,
}

impl DeallocPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            outstanding: 0,
        }
    }

    pub fn from_config(config: &DeallocPoolConfig) -> Self {
        Self::new(config.capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.capacity - self.outstanding
    }

    pub fn allocate(&mut self, record: DeallocRecord) -> Result<DeallocRecord> {
        if self.outstanding >= self.capacity {
            return Err(CollaboratorError::PoolExhausted {
                capacity: self.capacity,
            }
            .into());
        }
        self.outstanding += 1;
        Ok(record)
    }

    /// Gives back a record that never made it into a queue.
    pub fn release(&mut self, _record: DeallocRecord) {
        self.free(1);
    }

    fn free(&mut self, count: usize) {
        self.outstanding = self.outstanding.saturating_sub(count);
    }
}

/// Caller-owned list of pending deallocations. Newest records come first.
#[derive(Debug, Default)]
pub struct DeallocQueue {
    records: VecDeque<DeallocRecord>,
}

impl DeallocQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: DeallocRecord) {
        self.records.push_front(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeallocRecord> {
        self.records.iter()
    }

    pub fn contains_page(&self, pid: PageId) -> bool {
        self.records
            .iter()
            .any(|record| matches!(record, DeallocRecord::Page(p) if *p == pid))
    }

    /// Hands every record to the sweep and returns their nodes to `pool`.
    pub fn drain(&mut self, pool: &mut DeallocPool) -> Vec<DeallocRecord> {
        let records: Vec<_> = self.records.drain(..).collect();
        pool.free(records.len());
        records
    }
}
