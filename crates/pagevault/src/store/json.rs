use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use crate::error::StoreError;
use crate::store::{PageId, PageRecord, PageStore, StoredPage};

/// Page store kept in memory and written as one pretty-printed JSON object
/// keyed by page id. Entries keep the order they were first inserted in,
/// both in memory and in the file.
///
/// `put` and `delete` only touch memory; `persist` writes the whole map to a
/// temporary file next to the target and renames it into place.
pub struct JsonPageStore {
    path: Option<PathBuf>,
    pages: RwLock<IndexMap<PageId, PageRecord>>,
}

impl JsonPageStore {
    /// Loads `path`. A missing or blank file yields an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let pages = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => IndexMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexMap::new(),
            Err(e) => return Err(StoreError::Read { path, source: e }),
        };

        tracing::debug!(path = %path.display(), pages = pages.len(), "loaded json page store");

        Ok(Self {
            path: Some(path),
            pages: RwLock::new(pages),
        })
    }

    /// A store with no backing file; `persist` is a no-op.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            pages: RwLock::new(IndexMap::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<PageId, PageRecord>> {
        match self.pages.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Page store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<PageId, PageRecord>> {
        match self.pages.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Page store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl PageStore for JsonPageStore {
    fn get(&self, id: PageId) -> Result<Option<PageRecord>, StoreError> {
        Ok(self.read().get(&id).cloned())
    }

    /// Replacing an existing id keeps its position.
    fn put(&self, id: PageId, record: PageRecord) -> Result<(), StoreError> {
        self.write().insert(id, record);
        Ok(())
    }

    fn delete(&self, id: PageId) -> Result<Option<PageRecord>, StoreError> {
        Ok(self.write().shift_remove(&id))
    }

    fn snapshot(&self) -> Result<Vec<StoredPage>, StoreError> {
        Ok(self
            .read()
            .iter()
            .map(|(id, record)| StoredPage {
                page_id: *id,
                record: record.clone(),
            })
            .collect())
    }

    fn contains(&self, id: PageId) -> Result<bool, StoreError> {
        Ok(self.read().contains_key(&id))
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read().len())
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        // Serialize under the read lock so the file matches one consistent state.
        let json = serde_json::to_string_pretty(&*self.read())?;

        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&directory).map_err(|e| StoreError::CreateDirectory {
            path: directory.clone(),
            source: e,
        })?;

        let write_err = |e: std::io::Error| StoreError::Write {
            path: path.clone(),
            source: e,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&directory).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        tracing::debug!(path = %path.display(), "persisted json page store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, page: u32) -> PageRecord {
        PageRecord::new(text.to_string(), "scan.pdf", page, format!("hash-{}", page))
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonPageStore::open(dir.path().join("page_data.json")).unwrap();
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_data.json");

        let store = JsonPageStore::open(&path).unwrap();
        store.put(PageId(1), record("first page", 1)).unwrap();
        store.put(PageId(2), record("second page", 2)).unwrap();
        store.persist().unwrap();

        let reloaded = JsonPageStore::open(&path).unwrap();
        assert_eq!(reloaded.len().unwrap(), 2);
        assert_eq!(
            reloaded.get(PageId(2)).unwrap().unwrap().text,
            "second page"
        );
    }

    #[test]
    fn test_snapshot_keeps_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_data.json");

        let store = JsonPageStore::open(&path).unwrap();
        store.put(PageId(3), record("three", 1)).unwrap();
        store.put(PageId(2), record("two", 2)).unwrap();
        store.put(PageId(3), record("three again", 1)).unwrap();
        store.persist().unwrap();

        let ids = |store: &JsonPageStore| -> Vec<u64> {
            store
                .snapshot()
                .unwrap()
                .iter()
                .map(|p| p.page_id.get())
                .collect()
        };
        assert_eq!(ids(&store), vec![3, 2]);

        let reloaded = JsonPageStore::open(&path).unwrap();
        assert_eq!(ids(&reloaded), vec![3, 2]);
        assert_eq!(reloaded.get(PageId(3)).unwrap().unwrap().text, "three again");

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.find("\"3\"").unwrap() < raw.find("\"2\"").unwrap());
    }

    #[test]
    fn test_delete_keeps_remaining_order() {
        let store = JsonPageStore::in_memory();
        for id in [5, 1, 4] {
            store.put(PageId(id), record("x", 1)).unwrap();
        }
        store.delete(PageId(1)).unwrap();
        store.put(PageId(2), record("y", 2)).unwrap();

        let ids: Vec<u64> = store
            .snapshot()
            .unwrap()
            .iter()
            .map(|p| p.page_id.get())
            .collect();
        assert_eq!(ids, vec![5, 4, 2]);
    }

    #[test]
    fn test_file_shape_is_keyed_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_data.json");
        let store = JsonPageStore::open(&path).unwrap();
        store.put(PageId(7), record("hello", 3)).unwrap();
        store.persist().unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["7"]["local_page"], 3);
        assert_eq!(raw["7"]["original_text"], "hello");
    }

    #[test]
    fn test_reads_existing_page_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_data.json");
        std::fs::write(
            &path,
            r#"{"3": {"text": "t", "original_text": "t", "source_pdf": "old.pdf",
                      "local_page": 2, "image_hash": "abc"}}"#,
        )
        .unwrap();

        let store = JsonPageStore::open(&path).unwrap();
        assert!(store.contains(PageId(3)).unwrap());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_data.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let result = JsonPageStore::open(&path);
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_delete_returns_removed_record() {
        let store = JsonPageStore::in_memory();
        store.put(PageId(1), record("x", 1)).unwrap();
        assert!(store.delete(PageId(1)).unwrap().is_some());
        assert!(store.delete(PageId(1)).unwrap().is_none());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let store = JsonPageStore::in_memory();
        store.put(PageId(1), record("x", 1)).unwrap();
        let snapshot = store.snapshot().unwrap();
        store.put(PageId(2), record("y", 2)).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_persist_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("data");
        let store = JsonPageStore::open(parent.join("page_data.json")).unwrap();
        store.put(PageId(1), record("x", 1)).unwrap();

        // A plain file where the parent directory should be.
        std::fs::write(&parent, b"file").unwrap();
        assert!(store.persist().is_err());
    }
}
