//! Hierarchical views over a flat category collection.
//!
//! Everything here is a pure function of the slice it is given; the tree
//! is re-derived on demand rather than stored.

use std::collections::{BTreeMap, HashSet};

use crate::models::{Category, CategoryId};

/// A category together with its depth in a depth-first walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeEntry<'cat> {
    /// Number of ancestors; roots are at depth 0.
    pub depth: usize,
    /// The category itself.
    pub category: &'cat Category,
}

/// Returns the children of `parent_id` (roots for `None`) ordered by
/// ascending `order`.
///
/// Ties keep their position in `categories`, so a draft that temporarily
/// holds duplicate `order` values still has a total ordering.
#[must_use]
pub fn children_of<'cat>(
    categories: &'cat [Category],
    parent_id: Option<&CategoryId>,
) -> Vec<&'cat Category> {
    let mut children: Vec<&Category> = categories
        .iter()
        .filter(|category| category.parent_id.as_ref() == parent_id)
        .collect();
    children.sort_by_key(|category| category.order);
    children
}

/// Returns the top-level categories in display order.
#[inline]
#[must_use]
pub fn roots(categories: &[Category]) -> Vec<&Category> {
    children_of(categories, None)
}

/// Walks the tree depth-first from the roots, visiting siblings in
/// `order`.
///
/// Categories that cannot be reached from a root (a dangling parent or a
/// cycle) are not emitted.
#[must_use]
pub fn walk_depth_first(categories: &[Category]) -> Vec<TreeEntry<'_>> {
    let mut entries = Vec::with_capacity(categories.len());
    let mut visited: HashSet<CategoryId> = HashSet::with_capacity(categories.len());
    for root in roots(categories) {
        visit(categories, root, 0, &mut visited, &mut entries);
    }
    entries
}

/// Pushes `category` and its subtree onto `entries`.
fn visit<'cat>(
    categories: &'cat [Category],
    category: &'cat Category,
    depth: usize,
    visited: &mut HashSet<CategoryId>,
    entries: &mut Vec<TreeEntry<'cat>>,
) {
    if !visited.insert(category.id) {
        return;
    }
    entries.push(TreeEntry { depth, category });
    for child in children_of(categories, Some(&category.id)) {
        visit(categories, child, depth + 1, visited, entries);
    }
}

/// Groups the collection by `parent_id`, each group in display order.
///
/// Every category lands in exactly one group.
#[must_use]
pub fn partition_by_parent(
    categories: &[Category],
) -> BTreeMap<Option<CategoryId>, Vec<&Category>> {
    let mut groups: BTreeMap<Option<CategoryId>, Vec<&Category>> = BTreeMap::new();
    for category in categories {
        groups.entry(category.parent_id).or_default().push(category);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|category| category.order);
    }
    groups
}

/// Returns the ids of every category below `id`, excluding `id` itself.
#[must_use]
pub fn descendants_of(categories: &[Category], id: &CategoryId) -> HashSet<CategoryId> {
    let mut found: HashSet<CategoryId> = HashSet::new();
    let mut pending = vec![*id];
    while let Some(current) = pending.pop() {
        for child in categories
            .iter()
            .filter(|category| category.parent_id == Some(current))
        {
            if found.insert(child.id) {
                pending.push(child.id);
            }
        }
    }
    let _removed = found.remove(id);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocalId;

    fn id(n: u64) -> CategoryId {
        CategoryId::Local(LocalId::new(n))
    }

    fn cat(n: u64, parent: Option<u64>, order: i32) -> Category {
        Category::new(id(n), format!("c{n}"), parent.map(id), order)
    }

    /// Two roots; the first has two children (listed out of order) and a
    /// grandchild.
    fn sample() -> Vec<Category> {
        vec![
            cat(1, None, 2),
            cat(2, None, 1),
            cat(3, Some(1), 2),
            cat(4, Some(1), 1),
            cat(5, Some(4), 1),
        ]
    }

    fn ids(nodes: &[&Category]) -> Vec<CategoryId> {
        nodes.iter().map(|category| category.id).collect()
    }

    #[test]
    fn children_are_sorted_by_order() {
        let cats = sample();
        assert_eq!(ids(&children_of(&cats, Some(&id(1)))), vec![id(4), id(3)]);
        assert_eq!(ids(&roots(&cats)), vec![id(2), id(1)]);
        assert!(children_of(&cats, Some(&id(3))).is_empty());
    }

    #[test]
    fn children_of_is_restartable() {
        let cats = sample();
        let first = ids(&children_of(&cats, Some(&id(1))));
        let second = ids(&children_of(&cats, Some(&id(1))));
        assert_eq!(first, second);
    }

    #[test]
    fn ties_keep_slice_position() {
        let cats = vec![cat(7, None, 1), cat(6, None, 1), cat(8, None, 0)];
        assert_eq!(ids(&roots(&cats)), vec![id(8), id(7), id(6)]);
    }

    #[test]
    fn depth_first_walk_is_preorder() {
        let cats = sample();
        let walk: Vec<(u64, usize)> = walk_depth_first(&cats)
            .iter()
            .filter_map(|entry| entry.category.id.as_local().map(|l| (l.into_inner(), entry.depth)))
            .collect();
        assert_eq!(walk, vec![(2, 0), (1, 0), (4, 1), (5, 2), (3, 1)]);
    }

    #[test]
    fn walk_skips_unreachable_nodes() {
        let mut cats = sample();
        cats.push(cat(9, Some(42), 1));
        cats.push(cat(10, Some(11), 1));
        cats.push(cat(11, Some(10), 1));
        assert_eq!(walk_depth_first(&cats).len(), 5);
    }

    #[test]
    fn partition_covers_every_node_once() {
        let cats = sample();
        let groups = partition_by_parent(&cats);
        let total: usize = groups.values().map(Vec::len).sum();
        assert_eq!(total, cats.len());

        let mut seen: HashSet<CategoryId> = HashSet::new();
        for (parent, group) in &groups {
            assert_eq!(ids(group), ids(&children_of(&cats, parent.as_ref())));
            for category in group {
                assert!(seen.insert(category.id));
            }
        }
        assert_eq!(seen.len(), cats.len());
    }

    #[test]
    fn descendants_include_grandchildren() {
        let cats = sample();
        let below = descendants_of(&cats, &id(1));
        assert_eq!(below.len(), 3);
        assert!(below.contains(&id(5)));
        assert!(!below.contains(&id(1)));
        assert!(descendants_of(&cats, &id(5)).is_empty());
    }
}
