//! # Price Sources
//!
//! The contract between the valuation engine and whatever answers the
//! question "what is 1 unit of asset X worth right now?". One source per
//! asset; the association lives in the
//! [`FeedDirectory`](crate::valuation::FeedDirectory), not here.
//!
//! Quotes follow the Chainlink shape: a signed integer price scaled by
//! `10^decimals`. A non-positive price is an *invalid* quote, not a "worth
//! nothing" quote -- the valuation engine treats it the same as an outage.

use alloy_primitives::I256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::AssetId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure signal from a price source.
///
/// Callers must treat every variant uniformly -- an unreachable source and
/// a stale one both mean "no usable price".
#[derive(Debug, Error)]
pub enum OracleError {
    /// The source could not be queried at all.
    #[error("price source offline: {0}")]
    Offline(String),

    /// The source answered, but the quote is older than the source's own
    /// freshness policy allows.
    #[error("stale quote: {age_secs}s old, limit {max_age_secs}s")]
    StaleQuote {
        /// Age of the most recent quote.
        age_secs: u64,
        /// Source-configured freshness limit.
        max_age_secs: u64,
    },
}

// ---------------------------------------------------------------------------
// PriceQuote
// ---------------------------------------------------------------------------

/// A point-in-time price observation.
///
/// `price` is the value of one whole unit of the asset in the quoted
/// currency, scaled by `10^decimals`. A quote of 2000.00 USD with
/// `decimals = 2` arrives as `price = 200_000`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Scaled price. Signed because upstream oracle networks report signed
    /// answers; anything non-positive is invalid.
    pub price: I256,

    /// Number of fractional digits in the scaled price.
    pub decimals: u8,
}

impl PriceQuote {
    /// Returns `true` if the quoted price is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.price > I256::ZERO
    }
}

// ---------------------------------------------------------------------------
// PriceSource trait
// ---------------------------------------------------------------------------

/// One external price source, wrapped.
///
/// A query either returns synchronously or signals failure -- no timeouts
/// or cancellation are modeled at this layer. Implementations must expect
/// to be called once per deposit per tracked asset, so anything expensive
/// should cache internally.
pub trait PriceSource {
    /// Current price of 1 unit of `asset` plus the quote's precision.
    fn query(&self, asset: AssetId) -> Result<PriceQuote, OracleError>;

    /// Short human-readable tag for this source, carried in audit
    /// notifications when the source is assigned to an asset.
    fn label(&self) -> String {
        "unlabeled".to_string()
    }
}

// ---------------------------------------------------------------------------
// FixedPrice
// ---------------------------------------------------------------------------

/// A source that always answers with the same quote.
///
/// Useful for stable-value assets with an administratively pinned price,
/// and as the workhorse fixture in tests.
#[derive(Clone, Debug)]
pub struct FixedPrice {
    quote: PriceQuote,
    label: String,
}

impl FixedPrice {
    /// Creates a source pinned to `price` scaled by `10^decimals`.
    pub fn new(price: I256, decimals: u8, label: impl Into<String>) -> Self {
        Self {
            quote: PriceQuote { price, decimals },
            label: label.into(),
        }
    }
}

impl PriceSource for FixedPrice {
    fn query(&self, _asset: AssetId) -> Result<PriceQuote, OracleError> {
        Ok(self.quote)
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
