//! In-memory editing operations on a category collection.
//!
//! Every operation takes the current draft by reference and either returns
//! a new collection or an error; a failed call never produces a partial
//! result, so the caller's draft stays as it was.

use std::collections::HashMap;

use crate::error::{CatalogError, Result};
use crate::models::{Category, CategoryId, LocalId, validate_name};
use crate::tree::{children_of, descendants_of, partition_by_parent};

/// Looks up a category by id.
fn find<'cat>(categories: &'cat [Category], id: &CategoryId) -> Result<&'cat Category> {
    categories
        .iter()
        .find(|category| category.id == *id)
        .ok_or(CatalogError::NotFound(*id))
}

/// Converts a zero-based position into a one-based `order` value.
fn order_at(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX).saturating_add(1)
}

/// Returns a copy of `categories` with the given `order` overrides applied.
fn with_orders(categories: &[Category], orders: &HashMap<CategoryId, i32>) -> Vec<Category> {
    categories
        .iter()
        .map(|category| {
            let mut updated = category.clone();
            if let Some(&order) = orders.get(&category.id) {
                updated.order = order;
            }
            updated
        })
        .collect()
}

/// Allocates a local id that no category in the collection already uses,
/// including drafts reloaded from an earlier process.
fn fresh_local_id(categories: &[Category]) -> CategoryId {
    if let Some(highest) = categories.iter().filter_map(|category| category.id.as_local()).max() {
        LocalId::reserve_through(highest);
    }
    CategoryId::new_local()
}

/// Appends a new child of `parent_id` (a root for `None`).
///
/// The new category gets a fresh local id, no products, and an `order`
/// one above the largest among its future siblings. It is the last
/// element of the returned collection.
///
/// # Errors
///
/// Returns [`CatalogError::Validation`] if `name` is blank and
/// [`CatalogError::NotFound`] if `parent_id` is not in the collection.
pub fn add_child(
    categories: &[Category],
    parent_id: Option<&CategoryId>,
    name: &str,
) -> Result<Vec<Category>> {
    let trimmed = validate_name(name)?;
    if let Some(parent) = parent_id {
        let _parent = find(categories, parent)?;
    }
    let order = children_of(categories, parent_id)
        .iter()
        .map(|sibling| sibling.order)
        .max()
        .map_or(1, |max| max.saturating_add(1));

    let child = Category::new(fresh_local_id(categories), trimmed, parent_id.copied(), order);
    tracing::debug!(id = %child.id, order, "category added");
    let mut next = categories.to_vec();
    next.push(child);
    Ok(next)
}

/// Replaces the name of `id`.
///
/// # Errors
///
/// Returns [`CatalogError::NotFound`] if `id` is absent and
/// [`CatalogError::Validation`] if `new_name` is blank.
pub fn rename(categories: &[Category], id: &CategoryId, new_name: &str) -> Result<Vec<Category>> {
    let _existing = find(categories, id)?;
    let name = validate_name(new_name)?;
    Ok(categories
        .iter()
        .map(|category| {
            let mut updated = category.clone();
            if updated.id == *id {
                updated.name.clone_from(&name);
            }
            updated
        })
        .collect())
}

/// Removes `id` from the collection.
///
/// Only leaves without products can be removed. A child blocks the delete
/// even if it is itself about to be removed; children go first, one call
/// at a time.
///
/// # Errors
///
/// Returns [`CatalogError::NotFound`] if `id` is absent,
/// [`CatalogError::HasChildren`] if any category names it as parent and
/// [`CatalogError::HasProducts`] if products are still assigned.
pub fn remove(categories: &[Category], id: &CategoryId) -> Result<Vec<Category>> {
    let target = find(categories, id)?;
    let children = categories
        .iter()
        .filter(|category| category.parent_id == Some(*id))
        .count();
    if children > 0 {
        return Err(CatalogError::HasChildren { id: *id, children });
    }
    if target.product_count > 0 {
        return Err(CatalogError::HasProducts {
            id: *id,
            count: target.product_count,
        });
    }
    tracing::debug!(id = %id, "category removed");
    Ok(categories
        .iter()
        .filter(|category| category.id != *id)
        .cloned()
        .collect())
}

/// Drops `dragged` directly in front of `target` among their shared
/// siblings and renumbers that group `1..=n` in the new order.
///
/// Repeating a drop changes nothing: once `dragged` sits in front of
/// `target` the result equals the input apart from order renumbering.
/// Dropping a category on itself returns the collection unchanged. Only
/// the sibling group of the two categories is touched.
///
/// A drop on a category under another parent is an error, not a no-op.
/// Callers show [`CatalogError::user_message`] and keep their draft;
/// reparenting goes through [`move_to`].
///
/// # Errors
///
/// Returns [`CatalogError::NotFound`] if either id is absent and
/// [`CatalogError::CrossParentMove`] if the two have different parents.
pub fn reorder(
    categories: &[Category],
    dragged: &CategoryId,
    target: &CategoryId,
) -> Result<Vec<Category>> {
    let dragged_node = find(categories, dragged)?;
    let target_node = find(categories, target)?;
    if dragged == target {
        return Ok(categories.to_vec());
    }
    if dragged_node.parent_id != target_node.parent_id {
        tracing::warn!(dragged = %dragged, target = %target, "cross-parent drop rejected");
        return Err(CatalogError::CrossParentMove {
            dragged: *dragged,
            target: *target,
        });
    }

    let mut group: Vec<CategoryId> = children_of(categories, dragged_node.parent_id.as_ref())
        .iter()
        .map(|category| category.id)
        .collect();
    let from = group
        .iter()
        .position(|id| id == dragged)
        .ok_or(CatalogError::NotFound(*dragged))?;
    let moved = group.remove(from);
    let to = group
        .iter()
        .position(|id| id == target)
        .ok_or(CatalogError::NotFound(*target))?;
    group.insert(to, moved);

    let orders: HashMap<CategoryId, i32> = group
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, order_at(index)))
        .collect();
    tracing::debug!(dragged = %dragged, from, to, "siblings reordered");
    Ok(with_orders(categories, &orders))
}

/// Reparents `id` under `new_parent` (to the root level for `None`),
/// appending it after the new siblings.
///
/// Moving to the current parent returns the collection unchanged.
///
/// # Errors
///
/// Returns [`CatalogError::NotFound`] if either id is absent and
/// [`CatalogError::Cycle`] if `new_parent` is `id` itself or one of its
/// descendants.
pub fn move_to(
    categories: &[Category],
    id: &CategoryId,
    new_parent: Option<&CategoryId>,
) -> Result<Vec<Category>> {
    let node = find(categories, id)?;
    if let Some(parent) = new_parent {
        let _parent = find(categories, parent)?;
        if parent == id || descendants_of(categories, id).contains(parent) {
            return Err(CatalogError::Cycle(*id));
        }
    }
    if node.parent_id.as_ref() == new_parent {
        return Ok(categories.to_vec());
    }
    let order = children_of(categories, new_parent)
        .iter()
        .map(|sibling| sibling.order)
        .max()
        .map_or(1, |max| max.saturating_add(1));
    Ok(categories
        .iter()
        .map(|category| {
            let mut updated = category.clone();
            if updated.id == *id {
                updated.parent_id = new_parent.copied();
                updated.order = order;
            }
            updated
        })
        .collect())
}

/// Renumbers every sibling group to a contiguous `1..=n` sequence in its
/// current display order.
#[must_use]
pub fn normalize_orders(categories: &[Category]) -> Vec<Category> {
    let orders: HashMap<CategoryId, i32> = partition_by_parent(categories)
        .values()
        .flat_map(|group| {
            group
                .iter()
                .enumerate()
                .map(|(index, category)| (category.id, order_at(index)))
        })
        .collect();
    with_orders(categories, &orders)
}
