use std::path::Path;

use crate::db::{page_repo, Database};
use crate::error::StoreError;
use crate::store::{PageId, PageRecord, PageStore, StoredPage};

/// Write-through page store on SQLite. Every `put`/`delete` is committed
/// immediately; `persist` only checkpoints the WAL.
#[derive(Clone)]
pub struct SqlitePageStore {
    db: Database,
}

impl SqlitePageStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }
}

impl PageStore for SqlitePageStore {
    fn get(&self, id: PageId) -> Result<Option<PageRecord>, StoreError> {
        Ok(page_repo::find_by_id(&self.db, id)?)
    }

    fn put(&self, id: PageId, record: PageRecord) -> Result<(), StoreError> {
        Ok(page_repo::upsert(&self.db, id, &record)?)
    }

    fn delete(&self, id: PageId) -> Result<Option<PageRecord>, StoreError> {
        let existing = page_repo::find_by_id(&self.db, id)?;
        if existing.is_some() {
            page_repo::delete(&self.db, id)?;
        }
        Ok(existing)
    }

    fn snapshot(&self) -> Result<Vec<StoredPage>, StoreError> {
        Ok(page_repo::list_all(&self.db)?)
    }

    fn contains(&self, id: PageId) -> Result<bool, StoreError> {
        Ok(page_repo::exists(&self.db, id)?)
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(page_repo::count(&self.db)?)
    }

    fn persist(&self) -> Result<(), StoreError> {
        Ok(self.db.checkpoint()?)
    }
}
