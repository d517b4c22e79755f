//! Object manager: destroys objects, compacts pages and walks a file's
//! objects in order, on top of the collaborators in [`crate::storage`].

pub mod compact;
pub mod destroy;
pub mod scan;

use crate::{
    config::ObjectManagerConfig,
    storage::{
        avail::AvailabilityIndex, buffer::BufferCache, catalog::CatalogAccessor,
        chain::FileChain,
    },
};

pub use compact::{CompactionSummary, compact_page};
pub use destroy::Reclamation;
pub use scan::{ObjectScanner, ScanIterator, ScanState, ScannedObject, Scanner};

pub struct ObjectManager<'a> {
    cache: &'a dyn BufferCache,
    catalog: &'a dyn CatalogAccessor,
    avail: &'a dyn AvailabilityIndex,
    chain: &'a dyn FileChain,
    config: ObjectManagerConfig,
}

impl<'a> ObjectManager<'a> {
    pub fn new(
        cache: &'a dyn BufferCache,
        catalog: &'a dyn CatalogAccessor,
        avail: &'a dyn AvailabilityIndex,
        chain: &'a dyn FileChain,
    ) -> Self {
        Self {
            cache,
            catalog,
            avail,
            chain,
            config: ObjectManagerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ObjectManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ObjectManagerConfig {
        &self.config
    }
}
