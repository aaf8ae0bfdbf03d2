//! Durable mapping of page id to page record, plus the page image directory.
//!
//! The store is the single source of truth for search, view and delete.
//! Backends guard their state with a reader-writer lock (or SQLite's own
//! locking) and hand out owned snapshots, so a reader never observes a
//! half-applied write. A reader may see a job's pages committed so far.

use crate::error::StoreError;

pub mod images;
pub mod json;
pub mod record;
pub mod sqlite;

pub use images::PageImages;
pub use json::JsonPageStore;
pub use record::{PageId, PageRecord, StoredPage};
pub use sqlite::SqlitePageStore;

pub trait PageStore: Send + Sync {
    fn get(&self, id: PageId) -> Result<Option<PageRecord>, StoreError>;

    /// Inserts or replaces the record for `id`. A replaced record keeps its
    /// place in the insertion order.
    fn put(&self, id: PageId, record: PageRecord) -> Result<(), StoreError>;

    /// Removes `id`, returning the record that was stored.
    fn delete(&self, id: PageId) -> Result<Option<PageRecord>, StoreError>;

    /// Owned copy of every page, in the order the pages were first inserted.
    fn snapshot(&self) -> Result<Vec<StoredPage>, StoreError>;

    fn contains(&self, id: PageId) -> Result<bool, StoreError>;

    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Makes every write so far durable.
    fn persist(&self) -> Result<(), StoreError>;
}

/// Opens the backend selected in `config`.
pub fn open_store(
    config: &crate::config::Config,
) -> Result<std::sync::Arc<dyn PageStore>, StoreError> {
    use crate::config::StoreBackend;

    let path = config.store_path();
    let store: std::sync::Arc<dyn PageStore> = match config.store.backend {
        StoreBackend::Json => std::sync::Arc::new(JsonPageStore::open(&path)?),
        StoreBackend::Sqlite => std::sync::Arc::new(SqlitePageStore::open(&path)?),
    };
    tracing::info!(
        backend = ?config.store.backend,
        pages = store.len()?,
        "page store opened"
    );
    Ok(store)
}

/// Picks the id for a newly accepted page: the smallest id from
/// `len + 1` upward that is neither stored nor backed by an image file.
pub fn allocate_page_id(store: &dyn PageStore, images: &PageImages) -> Result<PageId, StoreError> {
    let mut candidate = PageId(store.len()? as u64 + 1);
    while store.contains(candidate)? || images.exists(candidate) {
        candidate = candidate.next();
    }
    Ok(candidate)
}
