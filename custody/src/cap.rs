//! # Cap Enforcement -- The Aggregate Deposit Ceiling
//!
//! Before a deposit is accepted, the engine computes the canonical value of
//! everything currently custodied and rejects the deposit if adding the
//! incoming value would push the total strictly above a configured cap.
//!
//! The aggregate is recomputed on demand from the asset registry and the
//! engine's held quantities rather than maintained as a running total that
//! could drift. That makes every deposit O(number of assets ever tracked).
//! Known scalability ceiling -- the scan lives behind this module's
//! interface precisely so an incrementally-maintained total can replace it
//! later without touching the custody engine's contract.
//!
//! Pricing failures during the scan silently under-count: an asset whose
//! feed is down contributes zero instead of failing the whole aggregate.
//! Deliberate -- a single stale feed must not freeze all deposits -- but it
//! does mean custodied value can drift past the cap's intended backing
//! while a feed is dark.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::asset::AssetId;
use crate::registry::AssetRegistry;
use crate::valuation::{CanonicalValue, FeedDirectory};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by the cap check.
#[derive(Debug, Error)]
pub enum CapError {
    /// The deposit would push total custodied value strictly above the cap.
    #[error(
        "deposit of {incoming} canonical units would raise custodied value {total} above the cap {cap}"
    )]
    Exceeded {
        /// Total custodied value before the deposit.
        total: CanonicalValue,
        /// Strict canonical value of the incoming deposit.
        incoming: CanonicalValue,
        /// The configured cap.
        cap: CanonicalValue,
    },
}

// ---------------------------------------------------------------------------
// GlobalCap
// ---------------------------------------------------------------------------

/// The single global deposit ceiling, in canonical units.
///
/// Zero means uncapped. Lowering the cap below current holdings does not
/// retroactively invalidate them -- it only gates the next deposit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalCap {
    cap: CanonicalValue,
}

impl GlobalCap {
    /// An uncapped configuration.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// A cap at `limit` canonical units (zero = uncapped).
    pub fn new(limit: CanonicalValue) -> Self {
        Self { cap: limit }
    }

    /// Replaces the cap, returning the previous value. Takes effect for
    /// the next deposit's check.
    pub fn set(&mut self, limit: CanonicalValue) -> CanonicalValue {
        std::mem::replace(&mut self.cap, limit)
    }

    /// The configured limit (zero = uncapped).
    pub fn limit(&self) -> CanonicalValue {
        self.cap
    }

    /// Returns `true` if no ceiling is configured.
    pub fn is_unlimited(&self) -> bool {
        self.cap.is_zero()
    }

    /// Rejects the incoming value if it would push the total strictly
    /// above a non-zero cap. Exactly reaching the cap is allowed.
    pub fn check(
        &self,
        total: CanonicalValue,
        incoming: CanonicalValue,
    ) -> Result<(), CapError> {
        if self.is_unlimited() {
            return Ok(());
        }
        // An unrepresentable sum is certainly above any representable cap.
        let projected = total.checked_add(incoming).unwrap_or(CanonicalValue::MAX);
        if projected > self.cap {
            return Err(CapError::Exceeded {
                total,
                incoming,
                cap: self.cap,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Aggregate revaluation
// ---------------------------------------------------------------------------

/// Total canonical value of everything currently custodied.
///
/// Walks the registry in insertion order; for each asset reads the
/// authoritative held quantity via `held`, skips zero holdings, and
/// converts tolerantly -- an unpriceable holding is excluded from the
/// total rather than failing the scan or counting as zero-worth backing.
pub fn total_custodied_value(
    registry: &AssetRegistry,
    feeds: &FeedDirectory,
    held: impl Fn(&AssetId) -> U256,
) -> CanonicalValue {
    let mut total = CanonicalValue::ZERO;
    for asset in registry.iter() {
        let quantity = held(asset);
        if quantity.is_zero() {
            continue;
        }
        let value = feeds.convert_tolerant(*asset, quantity);
        debug!(asset = %asset, %quantity, %value, "aggregate scan entry");
        total = total.checked_add(value).unwrap_or(CanonicalValue::MAX);
    }
    total
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
