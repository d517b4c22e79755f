use crate::types::{FileCatalogRef, error::Result, page::SlottedPage};

/// Capacity-bucketed index of a file's pages by free space. Bucket
/// selection belongs to the implementation and is read off the page's
/// free-space figures at call time.
pub trait AvailabilityIndex {
    /// Takes the page out of whatever bucket holds it. A page held by no
    /// bucket is not an error.
    fn remove(&self, cat: &FileCatalogRef, page: &SlottedPage) -> Result<()>;

    fn insert(&self, cat: &FileCatalogRef, page: &SlottedPage) -> Result<()>;
}
