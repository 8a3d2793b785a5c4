//! Reconciles an edited category collection with a store.
//!
//! A synchronization writes every category of the draft, resolving
//! editor-assigned local ids into store-assigned persistent ids on the
//! way, then deletes every stored row the draft no longer contains.
//!
//! [`synchronize`] runs against an async [`CategoryStore`](crate::store::CategoryStore),
//! [`synchronize_blocking`] against a
//! [`BlockingCategoryStore`](crate::store::BlockingCategoryStore). Both are
//! generated from one macro so the algorithm exists once.
//!
//! Store calls are made one at a time in collection order. A failure
//! stops the run and is returned as [`CatalogError::Sync`]; writes that
//! already succeeded stay committed.
//!
//! There is no version check. A draft built from an outdated load deletes
//! rows that other sessions added since, so load right before editing.

use std::collections::{HashSet, VecDeque};

use crate::editor::normalize_orders;
use crate::error::{CatalogError, Result, SyncStage};
use crate::models::{
    Category, CategoryId, CategoryRow, LocalId, PersistentId, StoredCategory, validate_collection,
};

/// Outcome of a successful synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// The saved collection in draft order, every id and parent persistent.
    pub categories: Vec<Category>,
    /// Local ids that were inserted, with the id the store assigned.
    pub created: Vec<(LocalId, PersistentId)>,
    /// Number of existing rows written back.
    pub updated: usize,
    /// Stored rows removed because the draft no longer contains them.
    pub deleted: Vec<PersistentId>,
}

impl SyncReport {
    /// Returns the persistent id a local id was saved under.
    #[inline]
    #[must_use]
    pub fn resolved(&self, local: LocalId) -> Option<PersistentId> {
        self.created
            .iter()
            .find(|&&(created, _)| created == local)
            .map(|&(_, persistent)| persistent)
    }
}

/// A draft category waiting to be written, tagged with its draft position.
#[derive(Debug)]
struct Pending {
    /// Position in the draft.
    position: usize,
    /// The category, parent rewritten once it resolves.
    category: Category,
}

/// Validates the draft and normalizes sibling orders.
fn prepare(edited: &[Category]) -> Result<VecDeque<Pending>> {
    validate_collection(edited).map_err(|err| err.during(SyncStage::Validate))?;
    let normalized = normalize_orders(edited);
    let local = normalized
        .iter()
        .filter(|category| !category.id.is_persistent())
        .count();
    tracing::debug!(
        persistent = normalized.len() - local,
        local,
        "partitioned draft"
    );
    Ok(normalized
        .into_iter()
        .enumerate()
        .map(|(position, category)| Pending { position, category })
        .collect())
}

/// Builds the store row for a category, or `None` while its parent still
/// carries a local id.
fn row_for(category: &Category) -> Option<CategoryRow> {
    let parent_id = match category.parent_id {
        None => None,
        Some(CategoryId::Persistent(parent)) => Some(parent),
        Some(CategoryId::Local(_)) => return None,
    };
    Some(CategoryRow {
        id: category.id.as_persistent(),
        name: category.name.clone(),
        parent_id,
        order: category.order,
    })
}

/// Replaces every parent reference to `local` with `persistent`.
fn rewrite_parent_refs(pending: &mut VecDeque<Pending>, local: LocalId, persistent: PersistentId) {
    let from = CategoryId::Local(local);
    for item in pending.iter_mut() {
        if item.category.parent_id == Some(from) {
            item.category.parent_id = Some(CategoryId::Persistent(persistent));
        }
    }
}

/// Error for a node whose parent can never be written.
fn unresolvable(item: &Pending) -> CatalogError {
    let parent = item.category.parent_id.unwrap_or(item.category.id);
    CatalogError::DanglingParent {
        id: item.category.id,
        parent,
    }
    .during(SyncStage::Upsert)
}

/// Ids in `stored` that are absent from the saved collection.
fn stale_ids(stored: &[StoredCategory], saved: &[Category]) -> Vec<PersistentId> {
    let keep: HashSet<PersistentId> = saved
        .iter()
        .filter_map(|category| category.id.as_persistent())
        .collect();
    stored
        .iter()
        .map(|row| row.id)
        .filter(|id| !keep.contains(id))
        .collect()
}

/// Generates a synchronize function (async or blocking).
macro_rules! define_synchronize {
    (
        fn_name: $fn_name:ident,
        store_trait: $store_trait:ident,
        fn_doc: $fn_doc:expr,
        $(async_kw: $async_kw:tt,)?
        $(await_kw: $await_ext:tt,)?
    ) => {
        #[doc = $fn_doc]
        ///
        /// # Errors
        ///
        /// Returns [`CatalogError::Sync`](crate::error::CatalogError::Sync)
        /// wrapping the first validation or store failure. Nothing is written when validation fails.
        #[tracing::instrument(skip_all, fields(categories = edited.len()))]
        pub $($async_kw)? fn $fn_name<S: $store_trait>(
            edited: &[Category],
            store: &S,
        ) -> Result<SyncReport> {
            let mut pending = prepare(edited)?;
            let mut report = SyncReport::default();
            let mut saved: Vec<(usize, Category)> = Vec::with_capacity(pending.len());
            let mut deferred_in_a_row = 0_usize;

            while let Some(item) = pending.pop_front() {
                let Some(row) = row_for(&item.category) else {
                    deferred_in_a_row += 1;
                    if deferred_in_a_row > pending.len() {
                        return Err(unresolvable(&item));
                    }
                    tracing::trace!(id = %item.category.id, "parent not written yet, deferring");
                    pending.push_back(item);
                    continue;
                };
                deferred_in_a_row = 0;

                let stored = store
                    .upsert(row)
                    $( .$await_ext )?
                    .map_err(|err| err.during(SyncStage::Upsert))?;
                tracing::trace!(id = %stored.id, name = %stored.name, "row written");

                if let CategoryId::Local(local) = item.category.id {
                    tracing::debug!(%local, persistent = %stored.id, "resolved local id");
                    rewrite_parent_refs(&mut pending, local, stored.id);
                    report.created.push((local, stored.id));
                } else {
                    report.updated += 1;
                }
                saved.push((item.position, stored.into_category(item.category.product_count)));
            }

            saved.sort_by_key(|&(position, _)| position);
            report.categories = saved.into_iter().map(|(_, category)| category).collect();

            let stored = store
                .fetch_all()
                $( .$await_ext )?
                .map_err(|err| err.during(SyncStage::Fetch))?;
            let stale = stale_ids(&stored, &report.categories);
            if !stale.is_empty() {
                tracing::debug!(count = stale.len(), "deleting rows missing from the draft");
                store
                    .delete_by_ids(&stale)
                    $( .$await_ext )?
                    .map_err(|err| err.during(SyncStage::Delete))?;
            }
            report.deleted = stale;

            tracing::info!(
                created = report.created.len(),
                updated = report.updated,
                deleted = report.deleted.len(),
                "synchronization finished"
            );
            Ok(report)
        }
    };
}

// ── Async variant ───────────────────────────────────────────────────────

#[cfg(feature = "async")]
mod async_sync {
    //! Async synchronizer.

    use super::{
        Category, CategoryId, Result, SyncReport, SyncStage, prepare, rewrite_parent_refs,
        row_for, stale_ids, unresolvable,
    };
    use crate::store::CategoryStore;

    define_synchronize! {
        fn_name: synchronize,
        store_trait: CategoryStore,
        fn_doc: "Saves `edited` to an async store and deletes stored rows it omits.",
        async_kw: async,
        await_kw: await,
    }
}

// ── Blocking variant ────────────────────────────────────────────────────

#[cfg(feature = "blocking")]
mod blocking_sync {
    //! Blocking synchronizer.

    use super::{
        Category, CategoryId, Result, SyncReport, SyncStage, prepare, rewrite_parent_refs,
        row_for, stale_ids, unresolvable,
    };
    use crate::store::BlockingCategoryStore;

    define_synchronize! {
        fn_name: synchronize_blocking,
        store_trait: BlockingCategoryStore,
        fn_doc: "Saves `edited` to a blocking store and deletes stored rows it omits.",
    }
}

#[cfg(feature = "async")]
pub use async_sync::synchronize;
#[cfg(feature = "blocking")]
pub use blocking_sync::synchronize_blocking;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::add_child;
    use crate::store::InMemoryStore;

    fn stored(name: &str, parent: Option<PersistentId>, order: i32) -> StoredCategory {
        StoredCategory {
            id: PersistentId::generate(),
            name: name.to_owned(),
            parent_id: parent,
            order,
        }
    }

    fn local_of(categories: &[Category], name: &str) -> CategoryId {
        categories
            .iter()
            .find(|category| category.name == name)
            .map(|category| category.id)
            .unwrap()
    }

    #[test]
    fn row_for_defers_local_parent() {
        let parent = CategoryId::new_local();
        let child = Category::new(CategoryId::new_local(), "Child".to_owned(), Some(parent), 1);
        assert!(row_for(&child).is_none());
        let root = Category::new(CategoryId::new_local(), "Root".to_owned(), None, 1);
        let row = row_for(&root).unwrap();
        assert!(row.id.is_none());
        assert!(row.parent_id.is_none());
    }

    #[test]
    fn stale_ids_lists_only_missing_rows() {
        let keep = stored("Keep", None, 1);
        let gone = stored("Gone", None, 2);
        let saved = vec![keep.clone().into_category(0)];
        assert_eq!(stale_ids(&[keep, gone.clone()], &saved), vec![gone.id]);
    }

    #[test]
    fn report_resolves_created_ids() {
        let local = LocalId::next();
        let persistent = PersistentId::generate();
        let report = SyncReport {
            created: vec![(local, persistent)],
            ..SyncReport::default()
        };
        assert_eq!(report.resolved(local), Some(persistent));
        assert!(report.resolved(LocalId::next()).is_none());
    }

    // ── Blocking tests ─────────────────────────────────────────────────

    #[cfg(feature = "blocking")]
    mod blocking {
        use super::*;
        use crate::store::BlockingCategoryStore;

        #[test]
        fn new_child_under_new_root_gets_persistent_parent() {
            let store = InMemoryStore::new();
            let draft = add_child(&[], None, "Density").unwrap();
            let root = local_of(&draft, "Density");
            let draft = add_child(&draft, Some(&root), "서브").unwrap();

            let report = synchronize_blocking(&draft, &store).unwrap();

            assert_eq!(report.created.len(), 2);
            assert!(report.categories.iter().all(|c| c.id.is_persistent()));
            assert!(
                report
                    .categories
                    .iter()
                    .all(|c| c.parent_id.is_none_or(|p| p.is_persistent()))
            );
            let rows = store.fetch_all().unwrap();
            let parent = rows.iter().find(|r| r.name == "Density").unwrap();
            let child = rows.iter().find(|r| r.name == "서브").unwrap();
            assert_eq!(child.parent_id, Some(parent.id));
            assert_eq!(
                report.resolved(root.as_local().unwrap()),
                Some(parent.id)
            );
        }

        #[test]
        fn child_listed_before_parent_is_deferred() {
            let store = InMemoryStore::new();
            let root = CategoryId::new_local();
            let child = CategoryId::new_local();
            let draft = vec![
                Category::new(child, "Child".to_owned(), Some(root), 1),
                Category::new(root, "Root".to_owned(), None, 1),
            ];

            let report = synchronize_blocking(&draft, &store).unwrap();

            assert_eq!(
                report.created.first().map(|&(local, _)| local),
                root.as_local()
            );
            let names: Vec<&str> = report.categories.iter().map(|c| c.name.as_str()).collect();
            assert_eq!(names, ["Child", "Root"]);
            let rows = store.fetch_all().unwrap();
            let parent = rows.iter().find(|r| r.name == "Root").unwrap();
            let saved_child = rows.iter().find(|r| r.name == "Child").unwrap();
            assert_eq!(saved_child.parent_id, Some(parent.id));
        }

        #[test]
        fn omitted_rows_are_deleted() {
            let keep = stored("Keep", None, 1);
            let gone = stored("Gone", None, 2);
            let store = InMemoryStore::with_rows(vec![keep.clone(), gone.clone()]);

            let report = synchronize_blocking(&[keep.clone().into_category(0)], &store).unwrap();

            assert_eq!(report.deleted, vec![gone.id]);
            assert_eq!(report.updated, 1);
            assert_eq!(store.fetch_all().unwrap(), vec![keep]);
        }

        #[test]
        fn nothing_to_delete_skips_delete() {
            let keep = stored("Keep", None, 1);
            let store = InMemoryStore::with_rows(vec![keep.clone()]);
            let report = synchronize_blocking(&[keep.into_category(3)], &store).unwrap();
            assert!(report.deleted.is_empty());
            assert_eq!(report.categories.first().map(|c| c.product_count), Some(3));
        }

        #[test]
        fn orders_are_normalized_before_writing() {
            let store = InMemoryStore::new();
            let draft = vec![
                Category::new(CategoryId::new_local(), "B".to_owned(), None, 20),
                Category::new(CategoryId::new_local(), "A".to_owned(), None, 10),
            ];
            let _report = synchronize_blocking(&draft, &store).unwrap();
            let rows = store.fetch_all().unwrap();
            let named: Vec<(&str, i32)> = rows.iter().map(|r| (r.name.as_str(), r.order)).collect();
            assert_eq!(named, [("A", 1), ("B", 2)]);
        }

        #[test]
        fn invalid_draft_writes_nothing() {
            let store = InMemoryStore::new();
            let draft = vec![Category::new(
                CategoryId::new_local(),
                "Orphan".to_owned(),
                Some(CategoryId::new_local()),
                1,
            )];
            let err = synchronize_blocking(&draft, &store).unwrap_err();
            assert!(matches!(
                err,
                CatalogError::Sync {
                    stage: SyncStage::Validate,
                    ..
                }
            ));
            assert_eq!(store.upsert_count().unwrap(), 0);
        }

        #[test]
        fn store_failure_halts_without_rollback() {
            let stale = stored("Stale", None, 9);
            let store = InMemoryStore::with_rows(vec![stale.clone()]);
            store.fail_after_upserts(1).unwrap();
            let draft = add_child(&[], None, "First").unwrap();
            let draft = add_child(&draft, None, "Second").unwrap();

            let err = synchronize_blocking(&draft, &store).unwrap_err();

            assert!(matches!(
                err,
                CatalogError::Sync {
                    stage: SyncStage::Upsert,
                    ..
                }
            ));
            assert!(!err.is_user_facing());
            let rows = store.fetch_all().unwrap();
            assert_eq!(rows.len(), 2);
            assert!(rows.iter().any(|r| r.id == stale.id));
            assert!(rows.iter().any(|r| r.name == "First"));
        }
    }

    // ── Async tests ────────────────────────────────────────────────────

    #[cfg(feature = "async")]
    mod async_tests {
        use super::*;
        use crate::store::CategoryStore;

        #[tokio::test]
        async fn resolves_local_parent() {
            let store = InMemoryStore::new();
            let draft = add_child(&[], None, "Density").unwrap();
            let root = local_of(&draft, "Density");
            let draft = add_child(&draft, Some(&root), "서브").unwrap();

            let report = synchronize(&draft, &store).await.unwrap();

            assert_eq!(report.created.len(), 2);
            let rows = store.fetch_all().await.unwrap();
            let parent = rows.iter().find(|r| r.name == "Density").unwrap();
            let child = rows.iter().find(|r| r.name == "서브").unwrap();
            assert_eq!(child.parent_id, Some(parent.id));
        }

        #[tokio::test]
        async fn empty_draft_clears_store() {
            let store = InMemoryStore::with_rows(vec![stored("A", None, 1), stored("B", None, 2)]);
            let report = synchronize(&[], &store).await.unwrap();
            assert_eq!(report.deleted.len(), 2);
            assert!(store.fetch_all().await.unwrap().is_empty());
        }
    }
}
