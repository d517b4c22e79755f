//! The buffer-cache seam and the scoped pin built on it.

use std::{
    cell::{Ref, RefCell, RefMut},
    fmt,
    rc::Rc,
};

use tracing::trace;

use crate::types::{PageId, error::Result, page::SlottedPage};

/// A resident page frame. Exclusive use of a frame for the length of a call
/// comes from the pin, not from a lock.
pub type SharedPage = Rc<RefCell<SlottedPage>>;

pub trait BufferCache {
    /// Pins the page, reading it in if it is not resident.
    fn fetch(&self, pid: PageId) -> Result<SharedPage>;

    /// Drops one pin taken by [`BufferCache::fetch`].
    fn release(&self, pid: PageId);

    fn mark_dirty(&self, pid: PageId) -> Result<()>;
}

/// A pinned page that is released when the guard goes out of scope, on
/// normal, early and error returns alike.
pub struct PinnedPage<'a> {
    cache: &'a dyn BufferCache,
    pid: PageId,
    page: SharedPage,
}

impl<'a> PinnedPage<'a> {
    pub fn fetch(cache: &'a dyn BufferCache, pid: PageId) -> Result<Self> {
        let page = cache.fetch(pid)?;
        trace!(%pid, "pinned page");
        Ok(Self { cache, pid, page })
    }

    pub fn pid(&self) -> PageId {
        self.pid
    }

    pub fn read(&self) -> Ref<'_, SlottedPage> {
        self.page.borrow()
    }

    pub fn write(&self) -> RefMut<'_, SlottedPage> {
        self.page.borrow_mut()
    }

    pub fn mark_dirty(&self) -> Result<()> {
        self.cache.mark_dirty(self.pid)
    }
}

impl Drop for PinnedPage<'_> {
    fn drop(&mut self) {
        self.cache.release(self.pid);
        trace!(pid = %self.pid, "released page");
    }
}

impl fmt::Debug for PinnedPage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedPage").field("pid", &self.pid).finish()
    }
}
