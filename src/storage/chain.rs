//! Removal of a page from a file's doubly linked page chain.

use tracing::debug;

use crate::{
    storage::{
        buffer::{BufferCache, PinnedPage},
        catalog::CatalogAccessor,
    },
    types::{
        FileCatalogRef, NIL_PAGE, PageId,
        error::{CollaboratorError, Result},
    },
};

pub trait FileChain {
    fn unlink_page(&self, cat: &FileCatalogRef, pid: PageId) -> Result<()>;
}

pub struct PageChain<'a> {
    cache: &'a dyn BufferCache,
    catalog: &'a dyn CatalogAccessor,
}

impl<'a> PageChain<'a> {
    pub fn new(cache: &'a dyn BufferCache, catalog: &'a dyn CatalogAccessor) -> Self {
        Self { cache, catalog }
    }
}

impl FileChain for PageChain<'_> {
    /// Splices `pid` out of the chain. The file's first page anchors the
    /// chain and is never removed; removing the tail moves `last_page` back.
    fn unlink_page(&self, cat: &FileCatalogRef, pid: PageId) -> Result<()> {
        let mut entry = self.catalog.file_entry(cat)?;
        if entry.is_first_page(pid.page_no) {
            return Err(CollaboratorError::Chain {
                reason: format!("page {} is the first page of file {}", pid, entry.fid),
            }
            .into());
        }

        let target = PinnedPage::fetch(self.cache, pid)?;
        let (prev_page, next_page) = {
            let page = target.read();
            (page.header.prev_page, page.header.next_page)
        };
        if prev_page == NIL_PAGE {
            return Err(CollaboratorError::Chain {
                reason: format!("page {} is not linked into file {}", pid, entry.fid),
            }
            .into());
        }

        let prev = PinnedPage::fetch(self.cache, PageId::new(pid.volume, prev_page))?;
        prev.write().header.next_page = next_page;
        prev.mark_dirty()?;

        if next_page == NIL_PAGE {
            entry.last_page = prev_page;
            self.catalog.update_file_entry(cat, &entry)?;
        } else {
            let next = PinnedPage::fetch(self.cache, PageId::new(pid.volume, next_page))?;
            next.write().header.prev_page = prev_page;
            next.mark_dirty()?;
        }

        {
            let mut page = target.write();
            page.header.prev_page = NIL_PAGE;
            page.header.next_page = NIL_PAGE;
        }
        target.mark_dirty()?;

        debug!(%pid, prev_page, next_page, fid = entry.fid, "unlinked page from file chain");
        Ok(())
    }
}
