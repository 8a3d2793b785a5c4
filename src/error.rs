//! Error types for the catalog core.

use crate::models::CategoryId;

/// Convenience alias used throughout the crate.
pub type Result<T, E = CatalogError> = core::result::Result<T, E>;

/// Phase of a synchronization run in which a store call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStage {
    /// Draft validation before any write.
    Validate,
    /// Writing a single category row.
    Upsert,
    /// Reading the stored rows before the delete phase.
    Fetch,
    /// Removing rows missing from the draft.
    Delete,
}

impl core::fmt::Display for SyncStage {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match *self {
            Self::Validate => "validation",
            Self::Upsert => "upsert",
            Self::Fetch => "fetch",
            Self::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// All errors produced by the tree editor, the synchronizer and the
/// store backends.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Input rejected before any mutation (e.g. an empty name).
    #[error("invalid input: {0}")]
    Validation(String),

    /// The referenced category is not part of the collection.
    #[error("category {0} not found")]
    NotFound(CategoryId),

    /// Delete blocked: the category still has child categories.
    #[error("category {id} still has {children} child categories")]
    HasChildren {
        /// Category the caller tried to delete.
        id: CategoryId,
        /// Number of direct children.
        children: usize,
    },

    /// Delete blocked: products are still assigned to the category.
    #[error("category {id} still has {count} products assigned")]
    HasProducts {
        /// Category the caller tried to delete.
        id: CategoryId,
        /// Number of assigned products.
        count: u32,
    },

    /// A drop across sibling groups; reordering never reparents.
    #[error("cannot move {dragged} next to {target}: they have different parents")]
    CrossParentMove {
        /// Category being dragged.
        dragged: CategoryId,
        /// Category it was dropped on.
        target: CategoryId,
    },

    /// The parent chain of a category loops back onto itself.
    #[error("category {0} is its own ancestor")]
    Cycle(CategoryId),

    /// A parent reference that does not resolve inside the collection.
    #[error("category {id} references missing parent {parent}")]
    DanglingParent {
        /// Category holding the reference.
        id: CategoryId,
        /// The unresolved parent identifier.
        parent: CategoryId,
    },

    /// A string that is neither a persistent nor a local identifier.
    #[error("invalid category identifier: {0:?}")]
    InvalidId(String),

    /// A synchronization run stopped; earlier writes may have committed.
    #[error("synchronization failed during {stage}: {source}")]
    Sync {
        /// Phase in which the failure happened.
        stage: SyncStage,
        /// Underlying store or validation error.
        #[source]
        source: Box<CatalogError>,
    },

    /// Storage backend failed.
    #[error("storage error: {0}")]
    Storage(Box<dyn core::error::Error + Send + Sync>),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error from the REST store.
    #[cfg(any(feature = "async", feature = "blocking"))]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote store answered with a non-success status.
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },
}

impl CatalogError {
    /// Wraps `self` as a synchronization failure in the given stage.
    #[inline]
    #[must_use]
    pub fn during(self, stage: SyncStage) -> Self {
        Self::Sync {
            stage,
            source: Box::new(self),
        }
    }

    /// Returns `true` for errors the admin UI recovers from locally by
    /// showing a message while keeping the draft unchanged.
    #[inline]
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            *self,
            Self::Validation(_)
                | Self::NotFound(_)
                | Self::HasChildren { .. }
                | Self::HasProducts { .. }
                | Self::CrossParentMove { .. }
        )
    }

    /// Message shown to the operator of the admin back-office.
    #[must_use]
    pub fn user_message(&self) -> String {
        match *self {
            Self::HasChildren { .. } => {
                "This category has subcategories. Delete them first.".to_owned()
            }
            Self::HasProducts { count, .. } => {
                format!("{count} products are still assigned to this category. Move them first.")
            }
            Self::CrossParentMove { .. } => {
                "Categories can only be reordered within the same level.".to_owned()
            }
            Self::Sync { .. } => {
                "Saving failed. Reload the tree before editing again.".to_owned()
            }
            Self::Validation(_)
            | Self::NotFound(_)
            | Self::Cycle(_)
            | Self::DanglingParent { .. }
            | Self::InvalidId(_)
            | Self::Storage(_)
            | Self::Serialization(_)
            | Self::Api { .. } => self.to_string(),
            #[cfg(any(feature = "async", feature = "blocking"))]
            Self::Http(_) => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocalId;

    #[test]
    fn error_from_serde_json() {
        let serde_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err = CatalogError::from(serde_err);
        assert!(matches!(err, CatalogError::Serialization(_)));
        assert!(err.to_string().contains("serialization error"));
    }

    #[test]
    fn error_storage_display() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = CatalogError::Storage(Box::new(inner));
        let msg = err.to_string();
        assert!(msg.contains("storage error"));
        assert!(msg.contains("file missing"));
    }

    #[test]
    fn sync_error_keeps_stage_and_source() {
        let err = CatalogError::Api {
            status: 503,
            message: "unavailable".to_owned(),
        }
        .during(SyncStage::Upsert);
        let msg = err.to_string();
        assert!(msg.contains("upsert"));
        assert!(msg.contains("503"));
        assert!(core::error::Error::source(&err).is_some());
        assert!(!err.is_user_facing());
    }

    #[test]
    fn guard_errors_are_user_facing() {
        let id = CategoryId::Local(LocalId::new(3));
        let err = CatalogError::HasProducts { id, count: 4 };
        assert!(err.is_user_facing());
        assert!(err.user_message().contains('4'));
        assert!(CatalogError::Validation("empty".to_owned()).is_user_facing());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CatalogError>();
    }
}
