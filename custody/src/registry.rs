//! # Asset Registry -- The Ordered Set of Assets Ever Seen
//!
//! The registry records every asset that has ever been deposited or ever
//! had a price feed assigned. It is append-only: an asset is inserted
//! exactly once, enumeration order is first-insertion order, and nothing
//! ever shrinks it.
//!
//! Enumeration order is visible behavior -- the cap enforcer's aggregate
//! revaluation walks the registry in this order on every deposit, so the
//! scan is deterministic and restartable without snapshot isolation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::asset::AssetId;

/// Insertion-ordered, idempotent set of asset identifiers.
///
/// Serialized as the plain ordered list; the membership index is rebuilt
/// on deserialization.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<AssetId>", into = "Vec<AssetId>")]
pub struct AssetRegistry {
    order: Vec<AssetId>,
    seen: HashSet<AssetId>,
}

impl AssetRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent insert. Returns `true` if the asset was newly tracked,
    /// `false` if it was already present (in which case nothing changes,
    /// including the enumeration order of every other entry).
    pub fn ensure_tracked(&mut self, asset: AssetId) -> bool {
        if self.seen.contains(&asset) {
            return false;
        }
        self.seen.insert(asset);
        self.order.push(asset);
        true
    }

    /// Returns `true` if the asset has ever been tracked.
    pub fn contains(&self, asset: &AssetId) -> bool {
        self.seen.contains(asset)
    }

    /// Enumerates tracked assets in first-insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, AssetId> {
        self.order.iter()
    }

    /// Number of distinct assets ever tracked.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no asset has ever been tracked.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl From<Vec<AssetId>> for AssetRegistry {
    fn from(order: Vec<AssetId>) -> Self {
        let seen = order.iter().copied().collect();
        Self { order, seen }
    }
}

impl From<AssetRegistry> for Vec<AssetId> {
    fn from(registry: AssetRegistry) -> Self {
        registry.order
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
