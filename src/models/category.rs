//! Category rows and their structural invariants.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{CategoryId, PersistentId};
use crate::error::{CatalogError, Result};

/// A product category as held by an editing session.
///
/// The collection is flat: hierarchy is expressed only through
/// `parent_id`, sibling position only through `order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Identifier in either the persistent or the local space.
    pub id: CategoryId,
    /// Display name, never empty after trimming.
    pub name: String,
    /// Parent category, `None` for a root.
    pub parent_id: Option<CategoryId>,
    /// Position among siblings sharing the same `parent_id`.
    pub order: i32,
    /// Number of products assigned to this category. Supplied by the
    /// catalog, never changed by the editor.
    #[serde(default)]
    pub product_count: u32,
}

impl Category {
    /// Creates a category with no products assigned.
    #[inline]
    #[must_use]
    pub const fn new(
        id: CategoryId,
        name: String,
        parent_id: Option<CategoryId>,
        order: i32,
    ) -> Self {
        Self {
            id,
            name,
            parent_id,
            order,
            product_count: 0,
        }
    }

    /// Sets the product count.
    #[inline]
    #[must_use]
    pub const fn with_product_count(mut self, count: u32) -> Self {
        self.product_count = count;
        self
    }

    /// Returns `true` for top-level categories.
    #[inline]
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Trims `name` and rejects it if nothing is left.
///
/// # Errors
///
/// Returns [`CatalogError::Validation`] for empty or whitespace-only names.
#[inline]
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::Validation(
            "category name must not be empty".to_owned(),
        ));
    }
    Ok(trimmed.to_owned())
}

/// Checks the invariants a collection must satisfy before it is saved:
/// unique ids, every parent present, no category its own ancestor.
///
/// Local ids are allowed anywhere; resolution happens during sync.
///
/// # Errors
///
/// Returns [`CatalogError::Validation`] for duplicate ids,
/// [`CatalogError::DanglingParent`] for unknown parents and
/// [`CatalogError::Cycle`] when a parent chain loops.
pub fn validate_collection(categories: &[Category]) -> Result<()> {
    let mut parents: HashMap<CategoryId, Option<CategoryId>> =
        HashMap::with_capacity(categories.len());
    for category in categories {
        if parents.insert(category.id, category.parent_id).is_some() {
            return Err(CatalogError::Validation(format!(
                "duplicate category id {}",
                category.id
            )));
        }
    }

    for category in categories {
        if let Some(parent) = category.parent_id
            && !parents.contains_key(&parent)
        {
            return Err(CatalogError::DanglingParent {
                id: category.id,
                parent,
            });
        }
    }

    for category in categories {
        let mut seen: HashSet<CategoryId> = HashSet::new();
        let mut cursor = Some(category.id);
        while let Some(current) = cursor {
            if !seen.insert(current) {
                return Err(CatalogError::Cycle(category.id));
            }
            cursor = parents.get(&current).copied().flatten();
        }
    }
    Ok(())
}

/// A category row as sent to the store.
///
/// `id` is absent for rows the store has never seen; the store assigns one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRow {
    /// Existing identifier, `None` to insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PersistentId>,
    /// Display name.
    pub name: String,
    /// Parent identifier, always persistent by the time a row is written.
    pub parent_id: Option<PersistentId>,
    /// Normalized sibling position.
    pub order: i32,
}

/// A category row as returned by the store, with a definite id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCategory {
    /// Store-assigned identifier.
    pub id: PersistentId,
    /// Display name.
    pub name: String,
    /// Parent identifier.
    pub parent_id: Option<PersistentId>,
    /// Sibling position.
    pub order: i32,
}

impl StoredCategory {
    /// Builds a stored row from a written row and the id the store chose.
    #[inline]
    #[must_use]
    pub fn from_row(id: PersistentId, row: CategoryRow) -> Self {
        Self {
            id,
            name: row.name,
            parent_id: row.parent_id,
            order: row.order,
        }
    }

    /// Converts the row into an editable category.
    #[inline]
    #[must_use]
    pub fn into_category(self, product_count: u32) -> Category {
        Category {
            id: CategoryId::Persistent(self.id),
            name: self.name,
            parent_id: self.parent_id.map(CategoryId::Persistent),
            order: self.order,
            product_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocalId;

    fn local(n: u64) -> CategoryId {
        CategoryId::Local(LocalId::new(n))
    }

    fn node(id: CategoryId, parent: Option<CategoryId>, order: i32) -> Category {
        Category::new(id, format!("cat-{id}"), parent, order)
    }

    #[test]
    fn validate_name_trims() {
        assert_eq!(validate_name("  Density ").unwrap(), "Density");
        assert!(matches!(
            validate_name("   "),
            Err(CatalogError::Validation(_))
        ));
        assert!(validate_name("").is_err());
    }

    #[test]
    fn valid_collection_passes() {
        let cats = vec![
            node(local(1), None, 1),
            node(local(2), Some(local(1)), 1),
            node(local(3), Some(local(2)), 1),
        ];
        assert!(validate_collection(&cats).is_ok());
    }

    #[test]
    fn dangling_parent_is_reported() {
        let cats = vec![node(local(1), Some(local(99)), 1)];
        let err = validate_collection(&cats).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::DanglingParent { parent, .. } if parent == local(99)
        ));
    }

    #[test]
    fn cycle_is_reported() {
        let cats = vec![
            node(local(1), Some(local(2)), 1),
            node(local(2), Some(local(1)), 1),
        ];
        assert!(matches!(
            validate_collection(&cats),
            Err(CatalogError::Cycle(_))
        ));

        let self_parent = vec![node(local(5), Some(local(5)), 1)];
        assert!(matches!(
            validate_collection(&self_parent),
            Err(CatalogError::Cycle(id)) if id == local(5)
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let cats = vec![node(local(1), None, 1), node(local(1), None, 2)];
        assert!(matches!(
            validate_collection(&cats),
            Err(CatalogError::Validation(_))
        ));
    }

    #[test]
    fn row_omits_missing_id() {
        let row = CategoryRow {
            id: None,
            name: "Sub".to_owned(),
            parent_id: None,
            order: 1,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["name"], "Sub");
        assert_eq!(json["order"], 1);
    }

    #[test]
    fn stored_row_becomes_persistent_category() {
        let parent = PersistentId::generate();
        let stored = StoredCategory {
            id: PersistentId::generate(),
            name: "Needles".to_owned(),
            parent_id: Some(parent),
            order: 2,
        };
        let category = stored.clone().into_category(7);
        assert_eq!(category.id, CategoryId::Persistent(stored.id));
        assert_eq!(category.parent_id, Some(CategoryId::Persistent(parent)));
        assert_eq!(category.product_count, 7);
        assert!(!category.is_root());
    }

    #[test]
    fn category_wire_format_is_camel_case() {
        let json = r#"{
            "id": "local-8",
            "name": "Catheters",
            "parentId": null,
            "order": 3
        }"#;
        let category: Category = serde_json::from_str(json).unwrap();
        assert_eq!(category.id, local(8));
        assert!(category.is_root());
        assert_eq!(category.product_count, 0);
    }
}
