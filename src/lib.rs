//! Category tree editing and tiered pricing for the medishop storefront.
//!
//! The crate covers two cores of a B2B store for medical-device
//! consumables:
//!
//! - the product category tree: a flat collection of [`models::Category`]
//!   rows edited in memory with [`editor`], rendered with [`tree`], and
//!   saved with [`sync`] against a pluggable [`store`];
//! - quantity tiered prices composed with a subscription discount, in
//!   [`pricing`].
//!
//! [`catalog`] ties both together for an admin session.
//!
//! # Example
//!
//! ```rust
//! use medishop_catalog::editor::add_child;
//! use medishop_catalog::models::CategoryId;
//! use medishop_catalog::tree::walk_depth_first;
//!
//! let draft = add_child(&[], None, "Density").unwrap();
//! let root: CategoryId = draft[0].id;
//! let draft = add_child(&draft, Some(&root), "Sub").unwrap();
//! let depths: Vec<usize> = walk_depth_first(&draft).iter().map(|e| e.depth).collect();
//! assert_eq!(depths, [0, 1]);
//! ```

pub mod catalog;
#[cfg(any(feature = "async", feature = "blocking"))]
pub mod client;
pub mod editor;
pub mod error;
pub mod models;
pub mod pricing;
pub mod store;
pub mod sync;
pub mod tree;
