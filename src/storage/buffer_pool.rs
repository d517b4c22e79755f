//! File-backed buffer cache.
//!
//! Pages are read from a [`Volume`] on first fetch and kept resident while
//! pinned. When every frame is taken, an unpinned frame is evicted, writing
//! it back first if it is dirty.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use tracing::{debug, warn};

use crate::{
    config::BufferPoolConfig,
    storage::{
        buffer::{BufferCache, SharedPage},
        volume::Volume,
    },
    types::{
        FileId, PageId, VolNo,
        error::{CollaboratorError, Result},
    },
};

struct Frame {
    page: SharedPage,
    pin_count: usize,
    dirty: bool,
}

pub struct BufferPool {
    config: BufferPoolConfig,
    volume: RefCell<Volume>,
    frames: RefCell<HashMap<PageId, Frame>>,
}

impl BufferPool {
    pub fn new(volume: Volume, config: BufferPoolConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|reason| CollaboratorError::InvalidConfig {
                reason: reason.to_string(),
            })?;
        Ok(Self {
            frames: RefCell::new(HashMap::with_capacity(config.frames)),
            config,
            volume: RefCell::new(volume),
        })
    }

    pub fn volume_no(&self) -> VolNo {
        self.volume.borrow().volume_no()
    }

    /// Allocates a fresh page on the volume; it is not pinned.
    pub fn allocate_page(&self, fid: FileId) -> Result<PageId> {
        self.volume.borrow_mut().allocate_page(fid)
    }

    pub fn pin_count(&self, pid: PageId) -> usize {
        self.frames
            .borrow()
            .get(&pid)
            .map_or(0, |frame| frame.pin_count)
    }

    pub fn is_dirty(&self, pid: PageId) -> bool {
        self.frames.borrow().get(&pid).is_some_and(|frame| frame.dirty)
    }

    pub fn resident_pages(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Writes every dirty frame back to the volume.
    pub fn flush_all(&self) -> Result<()> {
        let mut frames = self.frames.borrow_mut();
        let mut volume = self.volume.borrow_mut();
        for frame in frames.values_mut().filter(|frame| frame.dirty) {
            volume.write_page(&frame.page.borrow())?;
            frame.dirty = false;
        }
        Ok(())
    }

    fn evict_one(&self, frames: &mut HashMap<PageId, Frame>) -> Result<()> {
        let victim = frames
            .iter()
            .find(|(_, frame)| frame.pin_count == 0)
            .map(|(pid, _)| *pid)
            .ok_or(CollaboratorError::BufferPoolExhausted {
                frames: self.config.frames,
            })?;

        if let Some(frame) = frames.get(&victim) {
            if frame.dirty {
                self.volume.borrow_mut().write_page(&frame.page.borrow())?;
            }
        }
        frames.remove(&victim);
        debug!(pid = %victim, "evicted page");
        Ok(())
    }
}

impl BufferCache for BufferPool {
    fn fetch(&self, pid: PageId) -> Result<SharedPage> {
        let mut frames = self.frames.borrow_mut();
        if let Some(frame) = frames.get_mut(&pid) {
            frame.pin_count += 1;
            return Ok(Rc::clone(&frame.page));
        }

        if pid.volume != self.volume_no() {
            return Err(CollaboratorError::PageNotResident { pid }.into());
        }
        if frames.len() >= self.config.frames {
            self.evict_one(&mut frames)?;
        }

        let page = self.volume.borrow_mut().read_page(pid.page_no)?;
        let page = Rc::new(RefCell::new(page));
        frames.insert(
            pid,
            Frame {
                page: Rc::clone(&page),
                pin_count: 1,
                dirty: false,
            },
        );
        Ok(page)
    }

    fn release(&self, pid: PageId) {
        match self.frames.borrow_mut().get_mut(&pid) {
            Some(frame) if frame.pin_count > 0 => frame.pin_count -= 1,
            _ => warn!(%pid, "release of a page that is not pinned"),
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
