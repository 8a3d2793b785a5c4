//! High-level catalog session over a store.
//!
//! Combines a [`CategoryStore`](crate::store::CategoryStore) /
//! [`BlockingCategoryStore`](crate::store::BlockingCategoryStore) backend
//! with the synchronizer and the price resolver. A typical session loads
//! the canonical tree, edits it with [`crate::editor`], saves it, and loads
//! again.

use crate::error::CatalogError;
use crate::models::{Category, PricingTier, ProductPricing};
use crate::pricing::{PriceQuote, quote};
use crate::tree::walk_depth_first;

/// One line of a rendered tree, owning its category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    /// Nesting level, `0` for roots.
    pub depth: usize,
    /// The category shown on this line.
    pub category: Category,
}

/// Flattens a collection into owned tree rows in display order.
#[must_use]
pub fn tree_rows(categories: &[Category]) -> Vec<TreeRow> {
    walk_depth_first(categories)
        .into_iter()
        .map(|entry| TreeRow {
            depth: entry.depth,
            category: entry.category.clone(),
        })
        .collect()
}

/// Quotes a cart line, warning when the tier list is not a bulk-discount
/// ladder.
#[must_use]
pub fn price(pricing: &ProductPricing, quantity: u32, is_subscription: bool) -> PriceQuote {
    if !PricingTier::is_bulk_discount_shape(&pricing.tiers) {
        tracing::warn!(
            tiers = pricing.tiers.len(),
            "pricing tiers are not sorted by quantity with falling prices"
        );
    }
    quote(pricing, quantity, is_subscription)
}

/// Error returned by a builder without a store.
fn missing_storage() -> CatalogError {
    CatalogError::Storage("storage backend is required".into())
}

/// Generates a catalog session type (async or blocking).
macro_rules! define_catalog {
    (
        catalog_name: $catalog:ident,
        builder_name: $builder:ident,
        store_trait: $store_trait:ident,
        sync_fn: $sync_fn:ident,
        catalog_doc: $catalog_doc:expr,
        builder_doc: $builder_doc:expr,
        $(async_kw: $async_kw:tt,)?
        $(await_kw: $await_ext:tt,)?
    ) => {
        #[doc = $builder_doc]
        #[derive(Debug)]
        pub struct $builder<S: $store_trait> {
            /// Store backend.
            storage: Option<S>,
        }

        impl<S: $store_trait> $builder<S> {
            /// Sets the store backend.
            #[inline]
            #[must_use]
            pub fn storage(mut self, storage: S) -> Self {
                self.storage = Some(storage);
                self
            }

            /// Builds the catalog.
            ///
            /// # Errors
            ///
            /// Returns [`CatalogError::Storage`](crate::error::CatalogError::Storage)
            /// if no store was provided.
            #[inline]
            pub fn build(self) -> Result<$catalog<S>> {
                let storage = self.storage.ok_or_else(missing_storage)?;
                Ok($catalog { storage })
            }
        }

        #[doc = $catalog_doc]
        #[derive(Debug)]
        pub struct $catalog<S: $store_trait> {
            /// Store backend.
            storage: S,
        }

        impl<S: $store_trait> $catalog<S> {
            /// Creates a new builder for configuring the catalog.
            #[inline]
            #[must_use]
            pub const fn builder() -> $builder<S> {
                $builder { storage: None }
            }

            /// Reads the canonical tree, with product counts, ready for
            /// editing.
            ///
            /// # Errors
            ///
            /// Returns an error if the store fails to read.
            #[tracing::instrument(skip_all)]
            pub $($async_kw)? fn load(&self) -> Result<Vec<Category>> {
                let rows = self.storage.fetch_all() $( .$await_ext )? ?;
                let mut categories = Vec::with_capacity(rows.len());
                for row in rows {
                    let count = self.storage.product_count(&row.name) $( .$await_ext )? ?;
                    categories.push(row.into_category(count));
                }
                tracing::debug!(count = categories.len(), "catalog loaded");
                Ok(categories)
            }

            /// Saves an edited draft. Reload with [`Self::load`] before the
            /// next edit session, whether or not the save succeeded.
            ///
            /// # Errors
            ///
            /// Returns [`CatalogError::Sync`](crate::error::CatalogError::Sync) if
            /// validation or a store call fails.
            #[inline]
            pub $($async_kw)? fn save(&self, draft: &[Category]) -> Result<SyncReport> {
                $sync_fn(draft, &self.storage) $( .$await_ext )?
            }

            /// Loads the tree and flattens it in display order.
            ///
            /// # Errors
            ///
            /// Returns an error if the store fails to read.
            pub $($async_kw)? fn tree(&self) -> Result<Vec<TreeRow>> {
                let categories = self.load() $( .$await_ext )? ?;
                Ok(tree_rows(&categories))
            }

            /// Returns a reference to the store backend.
            #[inline]
            #[must_use]
            pub const fn storage(&self) -> &S {
                &self.storage
            }
        }
    };
}

// ── Async variant ───────────────────────────────────────────────────────

#[cfg(feature = "async")]
mod async_catalog {
    //! Async catalog session.

    use super::{TreeRow, missing_storage, tree_rows};
    use crate::error::Result;
    use crate::models::Category;
    use crate::store::CategoryStore;
    use crate::sync::{SyncReport, synchronize};

    define_catalog! {
        catalog_name: Catalog,
        builder_name: CatalogBuilder,
        store_trait: CategoryStore,
        sync_fn: synchronize,
        catalog_doc: "Async catalog session over a category store.\n\nUse [`Catalog::builder()`] to construct an instance.",
        builder_doc: "Builder for constructing a [`Catalog`].",
        async_kw: async,
        await_kw: await,
    }
}

// ── Blocking variant ────────────────────────────────────────────────────

#[cfg(feature = "blocking")]
mod blocking_catalog {
    //! Blocking catalog session.

    use super::{TreeRow, missing_storage, tree_rows};
    use crate::error::Result;
    use crate::models::Category;
    use crate::store::BlockingCategoryStore;
    use crate::sync::{SyncReport, synchronize_blocking};

    define_catalog! {
        catalog_name: CatalogBlocking,
        builder_name: CatalogBlockingBuilder,
        store_trait: BlockingCategoryStore,
        sync_fn: synchronize_blocking,
        catalog_doc: "Blocking catalog session over a category store.\n\nUse [`CatalogBlocking::builder()`] to construct an instance.",
        builder_doc: "Builder for constructing a [`CatalogBlocking`].",
    }
}

#[cfg(feature = "async")]
pub use async_catalog::{Catalog, CatalogBuilder};
#[cfg(feature = "blocking")]
pub use blocking_catalog::{CatalogBlocking, CatalogBlockingBuilder};
