//! JSON-file-based store backend.
//!
//! Keeps category rows and product counts in JSON files under a
//! configurable directory (default: `$XDG_DATA_HOME/medishop-catalog/`).

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

#[cfg(feature = "async")]
use core::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::error::{CatalogError, Result};
use crate::models::{CategoryRow, PersistentId, StoredCategory};

/// Application name used for the XDG data directory.
const APP_NAME: &str = "medishop-catalog";

/// File name for store metadata.
const META_FILE: &str = "meta.json";
/// File name for category rows.
const CATEGORIES_FILE: &str = "categories.json";
/// File name for product counts keyed by category name.
const PRODUCTS_FILE: &str = "products.json";
/// Sentinel file used for cross-process file locking.
const LOCK_FILE: &str = "storage.lock";

/// Metadata stored alongside the data files.
#[derive(Debug, Serialize, Deserialize, Default)]
struct Meta {
    /// Time of the last write in seconds since epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_write: Option<i64>,
}

/// File-backed category store.
///
/// # Concurrency
///
/// Thread safety within a single process is provided by an in-process
/// [`Mutex`]. Cross-process safety is achieved via an advisory file lock
/// on `storage.lock`. Reads take a shared lock, writes an exclusive one.
///
/// # File layout
///
/// ```text
/// <dir>/
///   storage.lock          (cross-process lock sentinel)
///   meta.json
///   categories.json
///   products.json
/// ```
#[derive(Debug)]
pub struct FileStore {
    /// Root directory containing all JSON files.
    dir: PathBuf,
    /// Mutex serializing concurrent in-process access.
    lock: Mutex<()>,
    /// Sentinel file for cross-process advisory locking.
    lock_file: fs::File,
}

impl FileStore {
    /// Creates a store rooted at the given directory, creating it if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the lock
    /// file cannot be opened.
    #[inline]
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).map_err(storage_io_error)?;
        let lock_file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))
            .map_err(storage_io_error)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
            lock_file,
        })
    }

    /// Returns the default XDG-compliant data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform data directory cannot be determined.
    #[inline]
    pub fn default_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|data_path| data_path.join(APP_NAME))
            .ok_or_else(|| {
                CatalogError::Storage("could not determine platform data directory".into())
            })
    }

    /// Returns the time of the last write, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata file cannot be read.
    #[inline]
    pub fn last_write(&self) -> Result<Option<DateTime<Utc>>> {
        self.with_shared_lock(|| {
            let meta: Meta = self.read_json(META_FILE)?;
            Ok(meta
                .last_write
                .and_then(|ts| DateTime::from_timestamp(ts, 0_u32)))
        })
    }

    /// Records how many products are assigned to the named category.
    ///
    /// # Errors
    ///
    /// Returns an error if the products file cannot be read or written.
    #[inline]
    pub fn set_product_count(&self, category_name: &str, count: u32) -> Result<()> {
        self.with_exclusive_lock(|| {
            let mut counts: HashMap<String, u32> = self.read_json(PRODUCTS_FILE)?;
            let _old = counts.insert(category_name.to_owned(), count);
            self.write_json(PRODUCTS_FILE, &counts)
        })
    }

    // ── Private helpers ─────────────────────────────────────────────

    /// Returns the full path for a given file name.
    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Acquires an in-process mutex guard and a shared (read) file lock,
    /// executes `op`, then releases the file lock.
    fn with_shared_lock<R, F: FnOnce() -> Result<R>>(&self, op: F) -> Result<R> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_poison_error(&err))?;
        self.lock_file.lock_shared().map_err(storage_io_error)?;
        let result = op();
        // Only surface the unlock error when the operation succeeded;
        // otherwise the original error is more useful.
        if let Err(err) = self.lock_file.unlock()
            && result.is_ok()
        {
            return Err(storage_io_error(err));
        }
        result
    }

    /// Acquires an in-process mutex guard and an exclusive (write) file
    /// lock, executes `op`, then releases the file lock.
    fn with_exclusive_lock<R, F: FnOnce() -> Result<R>>(&self, op: F) -> Result<R> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_poison_error(&err))?;
        self.lock_file.lock().map_err(storage_io_error)?;
        let result = op();
        if let Err(err) = self.lock_file.unlock()
            && result.is_ok()
        {
            return Err(storage_io_error(err));
        }
        result
    }

    /// Reads and deserializes a JSON file, returning the default value if
    /// the file does not exist.
    fn read_json<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        match fs::read_to_string(self.path(name)) {
            Ok(contents) => serde_json::from_str(&contents).map_err(CatalogError::from),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(err) => Err(storage_io_error(err)),
        }
    }

    /// Atomically writes a serialized JSON file (write-to-tmp then rename).
    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.path(name);
        let tmp_path = self.path(&format!("{name}.tmp"));
        let json = serde_json::to_string_pretty(value).map_err(CatalogError::from)?;
        fs::write(&tmp_path, json).map_err(storage_io_error)?;
        fs::rename(&tmp_path, &path).map_err(storage_io_error)?;
        Ok(())
    }

    /// Writes the category rows and stamps the metadata.
    fn write_rows(&self, rows: &[StoredCategory]) -> Result<()> {
        self.write_json(CATEGORIES_FILE, rows)?;
        let meta = Meta {
            last_write: Some(Utc::now().timestamp()),
        };
        self.write_json(META_FILE, &meta)
    }

    /// Reads all rows sorted by parent and order (with lock).
    fn read_rows(&self) -> Result<Vec<StoredCategory>> {
        self.with_shared_lock(|| {
            let mut rows: Vec<StoredCategory> = self.read_json(CATEGORIES_FILE)?;
            super::sort_rows(&mut rows);
            Ok(rows)
        })
    }

    /// Inserts or replaces one row (with lock).
    fn upsert_row(&self, row: CategoryRow) -> Result<StoredCategory> {
        self.with_exclusive_lock(|| {
            let mut rows: Vec<StoredCategory> = self.read_json(CATEGORIES_FILE)?;
            let id = row.id.unwrap_or_else(PersistentId::generate);
            let stored = StoredCategory::from_row(id, row);
            match rows.iter_mut().find(|existing| existing.id == id) {
                Some(existing) => existing.clone_from(&stored),
                None => rows.push(stored.clone()),
            }
            self.write_rows(&rows)?;
            Ok(stored)
        })
    }

    /// Removes rows by id (with lock).
    fn remove_rows(&self, ids: &[PersistentId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let id_set: HashSet<&PersistentId> = ids.iter().collect();
        self.with_exclusive_lock(|| {
            let rows: Vec<StoredCategory> = self.read_json(CATEGORIES_FILE)?;
            let kept: Vec<StoredCategory> = rows
                .into_iter()
                .filter(|row| !id_set.contains(&row.id))
                .collect();
            self.write_rows(&kept)
        })
    }

    /// Reads one product count (with lock).
    fn read_product_count(&self, category_name: &str) -> Result<u32> {
        self.with_shared_lock(|| {
            let counts: HashMap<String, u32> = self.read_json(PRODUCTS_FILE)?;
            Ok(counts.get(category_name).copied().unwrap_or_default())
        })
    }
}

// ── Free-standing helpers ───────────────────────────────────────────────

/// Wraps an I/O error into a [`CatalogError::Storage`].
fn storage_io_error(err: std::io::Error) -> CatalogError {
    CatalogError::Storage(Box::new(err))
}

/// Wraps a mutex poison error into a [`CatalogError::Storage`].
fn lock_poison_error<T>(err: &std::sync::PoisonError<T>) -> CatalogError {
    CatalogError::Storage(err.to_string().into())
}

// ── BlockingCategoryStore implementation ────────────────────────────────

#[cfg(feature = "blocking")]
impl super::BlockingCategoryStore for FileStore {
    #[inline]
    fn fetch_all(&self) -> Result<Vec<StoredCategory>> {
        self.read_rows()
    }

    #[inline]
    fn upsert(&self, row: CategoryRow) -> Result<StoredCategory> {
        self.upsert_row(row)
    }

    #[inline]
    fn delete_by_ids(&self, ids: &[PersistentId]) -> Result<()> {
        self.remove_rows(ids)
    }

    #[inline]
    fn product_count(&self, category_name: &str) -> Result<u32> {
        self.read_product_count(category_name)
    }
}

// ── CategoryStore (async) implementation ────────────────────────────────

#[cfg(feature = "async")]
impl super::CategoryStore for FileStore {
    #[inline]
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<StoredCategory>>> + Send {
        core::future::ready(self.read_rows())
    }

    #[inline]
    fn upsert(&self, row: CategoryRow) -> impl Future<Output = Result<StoredCategory>> + Send {
        core::future::ready(self.upsert_row(row))
    }

    #[inline]
    fn delete_by_ids(&self, ids: &[PersistentId]) -> impl Future<Output = Result<()>> + Send {
        core::future::ready(self.remove_rows(ids))
    }

    #[inline]
    fn product_count(&self, category_name: &str) -> impl Future<Output = Result<u32>> + Send {
        core::future::ready(self.read_product_count(category_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, parent: Option<PersistentId>, order: i32) -> CategoryRow {
        CategoryRow {
            id: None,
            name: name.to_owned(),
            parent_id: parent,
            order,
        }
    }

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    #[test]
    fn new_creates_directory_and_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let _store = FileStore::new(nested.clone()).unwrap();
        assert!(nested.join(LOCK_FILE).exists());
    }

    #[test]
    fn empty_store_reads_nothing() {
        let (_dir, s) = store();
        assert!(s.read_rows().unwrap().is_empty());
        assert_eq!(s.read_product_count("Density").unwrap(), 0);
        assert!(s.last_write().unwrap().is_none());
    }

    #[test]
    fn default_dir_ends_with_app_name() {
        if let Ok(dir) = FileStore::default_dir() {
            assert!(dir.ends_with(APP_NAME));
        }
    }

    #[cfg(feature = "blocking")]
    mod blocking {
        use super::*;
        use crate::store::BlockingCategoryStore;

        #[test]
        fn upsert_persists_across_instances() {
            let dir = tempfile::tempdir().unwrap();
            let stored = {
                let s = FileStore::new(dir.path().to_path_buf()).unwrap();
                s.upsert(row("Density", None, 1)).unwrap()
            };
            let reopened = FileStore::new(dir.path().to_path_buf()).unwrap();
            assert_eq!(reopened.fetch_all().unwrap(), vec![stored]);
            assert!(reopened.last_write().unwrap().is_some());
        }

        #[test]
        fn update_replaces_by_id() {
            let (_dir, s) = store();
            let stored = s.upsert(row("Density", None, 1)).unwrap();
            let mut renamed = row("Tubing", None, 3);
            renamed.id = Some(stored.id);
            let _updated = s.upsert(renamed).unwrap();
            let all = s.fetch_all().unwrap();
            assert_eq!(all.len(), 1);
            assert_eq!(all.first().map(|r| r.order), Some(3));
        }

        #[test]
        fn delete_by_ids_removes_rows() {
            let (_dir, s) = store();
            let parent = s.upsert(row("Root", None, 1)).unwrap();
            let child = s.upsert(row("Child", Some(parent.id), 1)).unwrap();
            s.delete_by_ids(&[child.id]).unwrap();
            assert_eq!(s.fetch_all().unwrap(), vec![parent]);
            s.delete_by_ids(&[]).unwrap();
        }

        #[test]
        fn product_counts_are_read_by_name() {
            let (_dir, s) = store();
            s.set_product_count("Density", 4).unwrap();
            assert_eq!(s.product_count("Density").unwrap(), 4);
            assert_eq!(s.product_count("Other").unwrap(), 0);
        }

        #[test]
        fn corrupt_file_is_a_serialization_error() {
            let (dir, s) = store();
            fs::write(dir.path().join(CATEGORIES_FILE), "not json").unwrap();
            assert!(matches!(
                s.fetch_all(),
                Err(CatalogError::Serialization(_))
            ));
        }
    }

    #[cfg(feature = "async")]
    mod async_tests {
        use super::*;
        use crate::store::CategoryStore;

        #[tokio::test]
        async fn upsert_and_fetch() {
            let (_dir, s) = store();
            let stored = s.upsert(row("Density", None, 1)).await.unwrap();
            assert_eq!(s.fetch_all().await.unwrap(), vec![stored.clone()]);
            s.delete_by_ids(&[stored.id]).await.unwrap();
            assert!(s.fetch_all().await.unwrap().is_empty());
        }
    }
}
