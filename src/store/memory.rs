//! In-memory store backend for tests and demos.
//!
//! Provides [`InMemoryStore`], a thread-safe in-memory implementation of
//! the store traits. It assigns UUIDs on insert the way the managed
//! database does and can be told to fail after a number of writes to
//! exercise partial-save paths.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[cfg(feature = "async")]
use core::future::{self, Future};

use crate::error::{CatalogError, Result};
use crate::models::{CategoryRow, PersistentId, StoredCategory};

/// Thread-safe in-memory category store.
///
/// This type implements both [`super::CategoryStore`] (async) and
/// [`super::BlockingCategoryStore`] (blocking) traits.
///
/// # Upsert semantics
///
/// Rows without an id get a fresh UUID. Rows with an id replace the
/// stored row with that id, or are inserted under it if it is unknown.
///
/// # Example
///
/// ```rust
/// use medishop_catalog::store::InMemoryStore;
///
/// let store = InMemoryStore::new();
/// store.set_product_count("Density", 3).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// All state behind a single mutex for thread-safe interior mutability.
    inner: Mutex<Inner>,
}

/// Inner mutable state.
#[derive(Debug, Default)]
struct Inner {
    /// Stored rows, in insertion order.
    rows: Vec<StoredCategory>,
    /// Product counts keyed by category name.
    product_counts: HashMap<String, u32>,
    /// Number of successful upserts so far.
    upserts: usize,
    /// Upserts allowed before every further write fails.
    fail_after: Option<usize>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with rows.
    #[inline]
    #[must_use]
    pub fn with_rows(rows: Vec<StoredCategory>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                rows,
                ..Inner::default()
            }),
        }
    }

    /// Sets the number of products assigned to the named category.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    #[inline]
    pub fn set_product_count(&self, category_name: &str, count: u32) -> Result<()> {
        self.with_lock(|inner| {
            let _old = inner
                .product_counts
                .insert(category_name.to_owned(), count);
        })
    }

    /// Makes every upsert after the first `writes` fail with a storage
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    #[inline]
    pub fn fail_after_upserts(&self, writes: usize) -> Result<()> {
        self.with_lock(|inner| inner.fail_after = Some(writes))
    }

    /// Returns how many upserts have succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    #[inline]
    pub fn upsert_count(&self) -> Result<usize> {
        self.with_lock(|inner| inner.upserts)
    }

    /// Acquires the inner lock and applies a closure.
    fn with_lock<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R> {
        let mut inner = self.inner.lock().map_err(|err| lock_error(&err))?;
        Ok(f(&mut inner))
    }

    /// Returns all rows sorted by parent and order.
    fn read_rows(&self) -> Result<Vec<StoredCategory>> {
        self.with_lock(|inner| {
            let mut rows = inner.rows.clone();
            super::sort_rows(&mut rows);
            rows
        })
    }

    /// Inserts or replaces a row.
    fn write_row(&self, row: CategoryRow) -> Result<StoredCategory> {
        self.with_lock(|inner| {
            if inner.fail_after.is_some_and(|limit| inner.upserts >= limit) {
                return Err(CatalogError::Storage("injected write failure".into()));
            }
            let id = row.id.unwrap_or_else(PersistentId::generate);
            let stored = StoredCategory::from_row(id, row);
            match inner.rows.iter_mut().find(|existing| existing.id == id) {
                Some(existing) => existing.clone_from(&stored),
                None => inner.rows.push(stored.clone()),
            }
            inner.upserts += 1;
            Ok(stored)
        })?
    }

    /// Removes rows whose id is in `ids`.
    fn remove_rows(&self, ids: &[PersistentId]) -> Result<()> {
        let id_set: HashSet<&PersistentId> = ids.iter().collect();
        self.with_lock(|inner| inner.rows.retain(|row| !id_set.contains(&row.id)))
    }

    /// Looks up a product count, defaulting to zero.
    fn read_product_count(&self, category_name: &str) -> Result<u32> {
        self.with_lock(|inner| {
            inner
                .product_counts
                .get(category_name)
                .copied()
                .unwrap_or_default()
        })
    }
}

/// Wraps a mutex poison error.
fn lock_error<T>(err: &std::sync::PoisonError<T>) -> CatalogError {
    CatalogError::Storage(err.to_string().into())
}

// ── BlockingCategoryStore implementation ────────────────────────────────

#[cfg(feature = "blocking")]
impl super::BlockingCategoryStore for InMemoryStore {
    #[inline]
    fn fetch_all(&self) -> Result<Vec<StoredCategory>> {
        self.read_rows()
    }

    #[inline]
    fn upsert(&self, row: CategoryRow) -> Result<StoredCategory> {
        self.write_row(row)
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
impl super::CategoryStore for InMemoryStore {
    #[inline]
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<StoredCategory>>> + Send {
        future::ready(self.read_rows())
    }

    #[inline]
    fn upsert(&self, row: CategoryRow) -> impl Future<Output = Result<StoredCategory>> + Send {
        future::ready(self.write_row(row))
    }

    #[inline]
    fn delete_by_ids(&self, ids: &[PersistentId]) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.remove_rows(ids))
    }

    #[inline]
    fn product_count(&self, category_name: &str) -> impl Future<Output = Result<u32>> + Send {
        future::ready(self.read_product_count(category_name))
    }
}
