//! Identifier types for categories.
//!
//! A category id lives in one of two spaces: *persistent* ids are assigned
//! by the store and never change, *local* ids are handed out by the tree
//! editor for nodes that have not been saved yet. [`CategoryId`] carries
//! the space as a tag so callers never inspect the string form.

use core::str::FromStr;
use core::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CatalogError, Result};

/// Prefix of the textual form of a [`LocalId`].
const LOCAL_PREFIX: &str = "local-";

/// Source of fresh local tokens for the current process.
static NEXT_LOCAL: AtomicU64 = AtomicU64::new(1);

/// Macro to define a newtype ID wrapping a `Copy` inner type.
macro_rules! define_copy_id {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// Wraps the given value.
            #[inline]
            #[must_use]
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Returns a reference to the inner value.
            #[inline]
            #[must_use]
            pub const fn as_inner(&self) -> &$inner {
                &self.0
            }

            /// Consumes the wrapper and returns the inner value.
            #[inline]
            #[must_use]
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            #[inline]
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }
    };
}

define_copy_id! {
    /// Store-assigned category identifier (UUID).
    PersistentId(Uuid)
}

define_copy_id! {
    /// Editor-assigned placeholder for a category that is not stored yet.
    LocalId(u64)
}

impl PersistentId {
    /// Generates a random identifier. Used by store backends that assign
    /// ids themselves.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses the canonical UUID form.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidId`] if `raw` is not a UUID.
    #[inline]
    pub fn parse(raw: &str) -> Result<Self> {
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_err| CatalogError::InvalidId(raw.to_owned()))
    }
}

impl core::fmt::Display for PersistentId {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for PersistentId {
    type Err = CatalogError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl LocalId {
    /// Returns a token never handed out before in this process.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_LOCAL.fetch_add(1, Ordering::Relaxed))
    }

    /// Advances the process counter past `used`, so later calls to
    /// [`LocalId::next`] cannot return it or anything below it.
    #[inline]
    pub fn reserve_through(used: Self) {
        let _previous = NEXT_LOCAL.fetch_max(used.0.saturating_add(1), Ordering::Relaxed);
    }
}

impl core::fmt::Display for LocalId {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{LOCAL_PREFIX}{}", self.0)
    }
}

impl FromStr for LocalId {
    type Err = CatalogError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        s.strip_prefix(LOCAL_PREFIX)
            .and_then(|token| token.parse::<u64>().ok())
            .map(Self)
            .ok_or_else(|| CatalogError::InvalidId(s.to_owned()))
    }
}

/// Identifier of a category in either identifier space.
///
/// On the wire it is a plain string: the UUID for persistent ids,
/// `local-<n>` for local ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CategoryId {
    /// Assigned by the store.
    Persistent(PersistentId),
    /// Assigned by the editor, pending its first save.
    Local(LocalId),
}

impl CategoryId {
    /// Allocates a fresh local identifier.
    #[inline]
    #[must_use]
    pub fn new_local() -> Self {
        Self::Local(LocalId::next())
    }

    /// Returns `true` if the id was assigned by the store.
    #[inline]
    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        matches!(*self, Self::Persistent(_))
    }

    /// Returns the persistent id, if this is one.
    #[inline]
    #[must_use]
    pub const fn as_persistent(&self) -> Option<PersistentId> {
        match *self {
            Self::Persistent(id) => Some(id),
            Self::Local(_) => None,
        }
    }

    /// Returns the local id, if this is one.
    #[inline]
    #[must_use]
    pub const fn as_local(&self) -> Option<LocalId> {
        match *self {
            Self::Local(id) => Some(id),
            Self::Persistent(_) => None,
        }
    }
}

impl core::fmt::Display for CategoryId {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Self::Persistent(ref id) => core::fmt::Display::fmt(id, f),
            Self::Local(ref id) => core::fmt::Display::fmt(id, f),
        }
    }
}

impl FromStr for CategoryId {
    type Err = CatalogError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        if s.starts_with(LOCAL_PREFIX) {
            s.parse().map(Self::Local)
        } else {
            s.parse().map(Self::Persistent)
        }
    }
}

impl TryFrom<String> for CategoryId {
    type Error = CatalogError;

    #[inline]
    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CategoryId> for String {
    #[inline]
    fn from(value: CategoryId) -> Self {
        value.to_string()
    }
}

impl From<PersistentId> for CategoryId {
    #[inline]
    fn from(value: PersistentId) -> Self {
        Self::Persistent(value)
    }
}

impl From<LocalId> for CategoryId {
    #[inline]
    fn from(value: LocalId) -> Self {
        Self::Local(value)
    }
}
