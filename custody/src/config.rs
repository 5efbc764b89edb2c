//! # Engine Constants
//!
//! Every magic number in the custody engine lives here. If you're hardcoding
//! a constant somewhere else, you're doing it wrong.
//!
//! The canonical accounting unit is the load-bearing definition: every cap
//! comparison and every reported valuation is expressed in it. Changing its
//! precision after deployments exist would silently re-denominate every
//! configured cap, so don't.

use alloy_primitives::U256;

// ---------------------------------------------------------------------------
// Canonical Accounting Unit
// ---------------------------------------------------------------------------

/// Fractional digits of the canonical accounting unit.
///
/// Six decimals, USDC-style. A raw canonical value of `2_000_000_000`
/// reads as `2000.000000` canonical units.
pub const CANONICAL_DECIMALS: u8 = 6;

/// `10^CANONICAL_DECIMALS`, as a plain integer for places that want one.
pub const CANONICAL_SCALE: u64 = 1_000_000;

/// `10^CANONICAL_DECIMALS` as a [`U256`], for the conversion arithmetic.
pub fn canonical_scale() -> U256 {
    U256::from(CANONICAL_SCALE)
}

// ---------------------------------------------------------------------------
// Quote Precision Bounds
// ---------------------------------------------------------------------------

/// Largest quote precision the valuation arithmetic accepts.
///
/// `10^77 < 2^256 <= 10^78`, so any exponent above 77 cannot be represented
/// as a divisor and the conversion reports overflow instead.
pub const MAX_QUOTE_DECIMALS: u8 = 77;

/// Computes `10^exp` as a [`U256`], or `None` if it doesn't fit.
pub fn pow10(exp: u8) -> Option<U256> {
    if exp > MAX_QUOTE_DECIMALS {
        return None;
    }
    U256::from(10u64).checked_pow(U256::from(exp))
}
