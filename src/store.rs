//! Pluggable persistence backends for category rows.
//!
//! This module defines the [`CategoryStore`] (async) and
//! [`BlockingCategoryStore`] (blocking) traits via a shared macro, mirroring
//! the synchronizer generation pattern in [`crate::sync`].

#[cfg(feature = "storage-file")]
mod file;
mod memory;

#[cfg(feature = "storage-file")]
pub use file::FileStore;
pub use memory::InMemoryStore;

/// Generates a store trait (async or blocking) with all row methods.
///
/// Uses `@methods` to define the method list once, and `@method` to render
/// each method in async (`impl Future + Send`) or blocking (`fn`) style.
macro_rules! define_store {
    // ── Entry points ────────────────────────────────────────────────
    (
        trait_name: $trait_name:ident,
        trait_doc: $trait_doc:expr,
        mode: async_mode,
    ) => {
        #[doc = $trait_doc]
        pub trait $trait_name: core::fmt::Debug + Send + Sync {
            define_store!(@methods async_mode);
        }
    };
    (
        trait_name: $trait_name:ident,
        trait_doc: $trait_doc:expr,
        mode: blocking,
    ) => {
        #[doc = $trait_doc]
        pub trait $trait_name: core::fmt::Debug + Send + Sync {
            define_store!(@methods blocking);
        }
    };

    // ── Single method list (shared between both variants) ───────────
    (@methods $mode:ident) => {
        define_store!(@method $mode, fetch_all,
            "Returns every stored category row, ordered by parent and `order`.\n\n# Errors\n\nReturns an error if the backend fails to read.",
            -> Result<Vec<StoredCategory>>);
        define_store!(@method $mode, upsert,
            "Inserts the row if it has no id (or an id the backend does not know), otherwise updates it.\n\nReturns the row as stored, with a definite id.\n\n# Errors\n\nReturns an error if the backend fails to write.",
            row: CategoryRow, -> Result<StoredCategory>);
        define_store!(@method $mode, delete_by_ids,
            "Removes the rows with the given ids. Unknown ids are ignored.\n\n# Errors\n\nReturns an error if the backend fails to write.",
            ids: &[PersistentId], -> Result<()>);
        define_store!(@method $mode, product_count,
            "Returns how many products are assigned to the named category.\n\n# Errors\n\nReturns an error if the backend fails to read.",
            category_name: &str, -> Result<u32>);
    };

    // ── Blocking method renderer ────────────────────────────────────
    (@method blocking, $name:ident, $doc:expr,
     $($param:ident: $param_ty:ty,)* -> $ret:ty) => {
        #[doc = $doc]
        fn $name(&self $(, $param: $param_ty)*) -> $ret;
    };

    // ── Async method renderer (returns impl Future + Send) ──────────
    (@method async_mode, $name:ident, $doc:expr,
     $($param:ident: $param_ty:ty,)* -> $ret:ty) => {
        #[doc = $doc]
        fn $name(&self $(, $param: $param_ty)*)
            -> impl core::future::Future<Output = $ret> + Send;
    };
}

#[cfg(feature = "async")]
mod async_store {
    //! Async store trait definition.

    use crate::error::Result;
    use crate::models::{CategoryRow, PersistentId, StoredCategory};

    define_store! {
        trait_name: CategoryStore,
        trait_doc: "Async persistence backend for category rows.\n\nAll methods take `&self`; implementations use interior mutability\n(e.g. `Mutex`) for thread-safe mutation.",
        mode: async_mode,
    }
}

#[cfg(feature = "blocking")]
mod blocking_store {
    //! Blocking store trait definition.

    use crate::error::Result;
    use crate::models::{CategoryRow, PersistentId, StoredCategory};

    define_store! {
        trait_name: BlockingCategoryStore,
        trait_doc: "Blocking persistence backend for category rows.\n\nAll methods take `&self`; implementations use interior mutability\n(e.g. `Mutex`) for thread-safe mutation.",
        mode: blocking,
    }
}

#[cfg(feature = "async")]
pub use async_store::CategoryStore;
#[cfg(feature = "blocking")]
pub use blocking_store::BlockingCategoryStore;

/// Sorts rows the way [`CategoryStore::fetch_all`] promises: by parent,
/// then `order`.
pub(crate) fn sort_rows(rows: &mut [crate::models::StoredCategory]) {
    rows.sort_by(|left, right| {
        left.parent_id
            .cmp(&right.parent_id)
            .then(left.order.cmp(&right.order))
    });
}
