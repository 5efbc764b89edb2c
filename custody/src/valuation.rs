//! # Valuation Engine -- Raw Amounts to Canonical Units
//!
//! Converts an asset amount into the canonical 6-decimal accounting unit
//! through the asset's price feed. Two policies share one arithmetic core
//! so they can never drift apart:
//!
//! - **strict** ([`FeedDirectory::convert_strict`]) propagates every
//!   failure. Deposits use it -- funds must never be admitted at an
//!   unknown valuation, or the global cap means nothing.
//! - **tolerant** ([`FeedDirectory::convert_tolerant`]) maps every failure
//!   to zero. Withdrawals and the aggregate scan use it -- returning funds
//!   is a higher-priority guarantee than an accurate audit number, so an
//!   oracle outage degrades the report, never the transfer.
//!
//! The conversion is `floor(amount * price / 10^decimals) * 10^6`, and the
//! order matters: multiply before dividing by the quote scale, otherwise
//! small amounts floor to zero before they ever meet the price.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use alloy_primitives::{I256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::asset::AssetId;
use crate::config::{canonical_scale, pow10};
use crate::oracle::{PriceQuote, PriceSource};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during strict valuation.
#[derive(Debug, Error)]
pub enum ValuationError {
    /// No price feed is associated with the asset, or the feed could not
    /// be queried. Both mean the same thing to a deposit: no usable price.
    #[error("no usable price for asset {0}")]
    PriceUnavailable(AssetId),

    /// The feed answered with a non-positive price. Invalid, not "worth
    /// zero" -- a zero valuation would sail straight past the cap check.
    #[error("invalid price {price} for asset {asset}")]
    InvalidPrice {
        /// The asset whose feed misbehaved.
        asset: AssetId,
        /// The offending quote.
        price: I256,
    },

    /// The conversion arithmetic left 256 bits.
    #[error("valuation overflow for asset {0}")]
    Overflow(AssetId),
}

// ---------------------------------------------------------------------------
// CanonicalValue
// ---------------------------------------------------------------------------

/// A quantity in the canonical 6-decimal accounting unit.
///
/// Derived and point-in-time: canonical values are compared against the
/// cap and reported in notifications, but never stored as balances.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CanonicalValue(U256);

impl CanonicalValue {
    /// Zero canonical units.
    pub const ZERO: Self = Self(U256::ZERO);

    /// The largest representable canonical value.
    pub const MAX: Self = Self(U256::MAX);

    /// Wraps a raw 6-decimal fixed-point quantity.
    pub fn from_raw(raw: impl Into<U256>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw 6-decimal fixed-point quantity.
    pub fn raw(&self) -> U256 {
        self.0
    }

    /// Returns `true` if this value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checked addition.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl fmt::Display for CanonicalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = canonical_scale();
        let whole = self.0 / scale;
        // The remainder is < 10^6, so narrowing to u64 cannot truncate.
        let frac = (self.0 % scale).to::<u64>();
        write!(f, "{}.{:06}", whole, frac)
    }
}

// ---------------------------------------------------------------------------
// FeedDirectory
// ---------------------------------------------------------------------------

/// The asset-to-price-feed association, plus the conversion routines.
///
/// One asset has at most one feed at a time; assigning a new one replaces
/// the old atomically. Mutation is gated upstream by the custody engine's
/// admin capability check.
#[derive(Clone, Default)]
pub struct FeedDirectory {
    feeds: HashMap<AssetId, Arc<dyn PriceSource>>,
}

impl FeedDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `feed` with `asset`, replacing any existing association.
    /// Returns the replaced feed, if there was one.
    pub fn set_feed(
        &mut self,
        asset: AssetId,
        feed: Arc<dyn PriceSource>,
    ) -> Option<Arc<dyn PriceSource>> {
        self.feeds.insert(asset, feed)
    }

    /// Returns the feed associated with `asset`, if any.
    pub fn feed_for(&self, asset: &AssetId) -> Option<&Arc<dyn PriceSource>> {
        self.feeds.get(asset)
    }

    /// Returns `true` if `asset` has a feed.
    pub fn has_feed(&self, asset: &AssetId) -> bool {
        self.feeds.contains_key(asset)
    }

    /// Strict conversion: any failure propagates.
    ///
    /// Pure with respect to engine state -- no mutation, no caching.
    ///
    /// # Errors
    ///
    /// [`ValuationError::PriceUnavailable`] if no feed is associated with
    /// `asset` or the feed query fails; [`ValuationError::InvalidPrice`] if
    /// the quote is non-positive; [`ValuationError::Overflow`] if the
    /// arithmetic leaves 256 bits.
    pub fn convert_strict(
        &self,
        asset: AssetId,
        amount: U256,
    ) -> Result<CanonicalValue, ValuationError> {
        let feed = self
            .feeds
            .get(&asset)
            .ok_or(ValuationError::PriceUnavailable(asset))?;
        let quote = feed
            .query(asset)
            .map_err(|_| ValuationError::PriceUnavailable(asset))?;
        convert_quote(asset, &quote, amount)
    }

    /// Tolerant conversion: identical arithmetic, but every failure
    /// condition yields zero. Used only where a best-effort number is
    /// acceptable -- withdrawal notifications and the aggregate scan.
    pub fn convert_tolerant(&self, asset: AssetId, amount: U256) -> CanonicalValue {
        match self.convert_strict(asset, amount) {
            Ok(value) => value,
            Err(err) => {
                warn!(asset = %asset, %err, "tolerant valuation degraded to zero");
                CanonicalValue::ZERO
            }
        }
    }
}

impl fmt::Debug for FeedDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedDirectory")
            .field("feeds", &self.feeds.len())
            .finish()
    }
}

/// The shared arithmetic core behind both policies:
/// `floor(amount * price / 10^decimals) * 10^6`.
fn convert_quote(
    asset: AssetId,
    quote: &PriceQuote,
    amount: U256,
) -> Result<CanonicalValue, ValuationError> {
    if !quote.is_positive() {
        return Err(ValuationError::InvalidPrice {
            asset,
            price: quote.price,
        });
    }
    let price = quote.price.unsigned_abs();
    let quote_scale = pow10(quote.decimals).ok_or(ValuationError::Overflow(asset))?;

    // Multiply first. Dividing the amount by the quote scale up front would
    // floor small positions to zero before the price is ever applied.
    let gross = amount
        .checked_mul(price)
        .ok_or(ValuationError::Overflow(asset))?;
    let units = gross / quote_scale;
    let value = units
        .checked_mul(canonical_scale())
        .ok_or(ValuationError::Overflow(asset))?;
    Ok(CanonicalValue(value))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{FixedPrice, OracleError};

    /// A source that always fails, for exercising the failure policies.
    struct DeadFeed;

    impl PriceSource for DeadFeed {
        fn query(&self, _asset: AssetId) -> Result<PriceQuote, OracleError> {
            Err(OracleError::Offline("connection refused".into()))
        }
    }

    fn price(p: i64) -> I256 {
        I256::try_from(p).unwrap()
    }

    fn eth() -> AssetId {
        AssetId::derive("eth-mainnet", "eth")
    }

    fn directory_with(asset: AssetId, p: i64, decimals: u8) -> FeedDirectory {
        let mut directory = FeedDirectory::new();
        directory.set_feed(asset, Arc::new(FixedPrice::new(price(p), decimals, "fix")));
        directory
    }

    #[test]
    fn strict_conversion_eth_at_2000_usd() {
        // 2000.00 USD quoted with 2 decimals: 1 ETH -> 2_000_000_000 raw
        // canonical units (2000.000000).
        let directory = directory_with(eth(), 200_000, 2);
        let value = directory.convert_strict(eth(), U256::from(1u64)).unwrap();
        assert_eq!(value, CanonicalValue::from_raw(U256::from(2_000_000_000u64)));
        assert_eq!(value.to_string(), "2000.000000");
    }

    #[test]
    fn strict_conversion_multiplies_before_dividing() {
        // Price 0.025 quoted with 3 decimals. Dividing 100 by 10^3 first
        // would floor to zero; the correct order yields 2 whole units.
        let directory = directory_with(eth(), 25, 3);
        let value = directory.convert_strict(eth(), U256::from(100u64)).unwrap();
        assert_eq!(value, CanonicalValue::from_raw(U256::from(2_000_000u64)));
    }

    #[test]
    fn strict_conversion_floors_sub_unit_results() {
        // Price 0.5 with 1 decimal: one unit floors to zero canonical.
        let directory = directory_with(eth(), 5, 1);
        let value = directory.convert_strict(eth(), U256::from(1u64)).unwrap();
        assert_eq!(value, CanonicalValue::ZERO);
    }

    #[test]
    fn strict_conversion_is_linear_at_an_even_price() {
        // With price/scale an exact integer, floor introduces no loss and
        // conversion distributes over addition.
        let directory = directory_with(eth(), 200_000, 2);
        let a1 = U256::from(17u64);
        let a2 = U256::from(25u64);
        let whole = directory.convert_strict(eth(), a1 + a2).unwrap();
        let split = directory
            .convert_strict(eth(), a1)
            .unwrap()
            .checked_add(directory.convert_strict(eth(), a2).unwrap())
            .unwrap();
        assert_eq!(whole, split);
    }

    #[test]
    fn strict_conversion_is_deterministic() {
        let directory = directory_with(eth(), 123_456, 4);
        let first = directory.convert_strict(eth(), U256::from(789u64)).unwrap();
        let second = directory.convert_strict(eth(), U256::from(789u64)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn strict_fails_without_a_feed() {
        let directory = FeedDirectory::new();
        let result = directory.convert_strict(eth(), U256::from(1u64));
        assert!(matches!(
            result,
            Err(ValuationError::PriceUnavailable(asset)) if asset == eth()
        ));
    }

    #[test]
    fn strict_maps_feed_outage_to_price_unavailable() {
        let mut directory = FeedDirectory::new();
        directory.set_feed(eth(), Arc::new(DeadFeed));
        let result = directory.convert_strict(eth(), U256::from(1u64));
        assert!(matches!(result, Err(ValuationError::PriceUnavailable(_))));
    }

    #[test]
    fn strict_rejects_zero_and_negative_prices() {
        for bad in [0i64, -100] {
            let directory = directory_with(eth(), bad, 2);
            let result = directory.convert_strict(eth(), U256::from(1u64));
            assert!(
                matches!(result, Err(ValuationError::InvalidPrice { .. })),
                "price {} must be invalid",
                bad
            );
        }
    }

    #[test]
    fn strict_reports_overflow() {
        let directory = directory_with(eth(), 1_000_000, 0);
        let result = directory.convert_strict(eth(), U256::MAX);
        assert!(matches!(result, Err(ValuationError::Overflow(_))));
    }

    #[test]
    fn tolerant_matches_strict_on_success() {
        let directory = directory_with(eth(), 200_000, 2);
        let amount = U256::from(3u64);
        assert_eq!(
            directory.convert_tolerant(eth(), amount),
            directory.convert_strict(eth(), amount).unwrap()
        );
    }

    #[test]
    fn tolerant_degrades_every_failure_to_zero() {
        // No feed.
        let empty = FeedDirectory::new();
        assert_eq!(empty.convert_tolerant(eth(), U256::from(10u64)), CanonicalValue::ZERO);

        // Dead feed.
        let mut dead = FeedDirectory::new();
        dead.set_feed(eth(), Arc::new(DeadFeed));
        assert_eq!(dead.convert_tolerant(eth(), U256::from(10u64)), CanonicalValue::ZERO);

        // Invalid price.
        let invalid = directory_with(eth(), -1, 0);
        assert_eq!(invalid.convert_tolerant(eth(), U256::from(10u64)), CanonicalValue::ZERO);
    }

    #[test]
    fn set_feed_replaces_atomically() {
        let mut directory = directory_with(eth(), 100, 0);
        let replaced = directory.set_feed(
            eth(),
            Arc::new(FixedPrice::new(price(300), 0, "second")),
        );
        assert!(replaced.is_some());
        let value = directory.convert_strict(eth(), U256::from(1u64)).unwrap();
        assert_eq!(value, CanonicalValue::from_raw(U256::from(300_000_000u64)));
    }

    #[test]
    fn canonical_value_display_pads_fraction() {
        assert_eq!(CanonicalValue::from_raw(U256::from(1_500_000u64)).to_string(), "1.500000");
        assert_eq!(CanonicalValue::from_raw(U256::from(42u64)).to_string(), "0.000042");
        assert_eq!(CanonicalValue::ZERO.to_string(), "0.000000");
    }

    #[test]
    fn canonical_value_serde_roundtrip() {
        let value = CanonicalValue::from_raw(U256::from(2_000_000_000u64));
        let json = serde_json::to_string(&value).expect("serialize");
        let recovered: CanonicalValue = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(value, recovered);
    }
}
