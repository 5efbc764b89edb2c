//! # Transfer Port -- Moving Assets Into and Out of Custody
//!
//! The engine never moves value itself; it drives an injected
//! [`TransferPort`] that either fully succeeds or fully fails. There is no
//! partial-transfer state to reason about -- the port is the atomic
//! boundary, and the engine rolls its own book entries back when the port
//! reports failure.
//!
//! Native-asset deposits never cross this port: the transferred-in funds
//! arrive with the call itself and the engine only verifies the declared
//! amount. Token deposits, and every withdrawal, do cross it. Port calls
//! are external, untrusted control -- the engine treats each one as capable
//! of re-entering it.

use alloy_primitives::U256;
use thiserror::Error;

use crate::asset::{AssetId, OwnerId};

/// Errors surfaced by a transfer port.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Pulling funds into custody failed; nothing moved.
    #[error("transfer-in failed: {0}")]
    InboundFailed(String),

    /// Paying funds out of custody failed; nothing moved.
    #[error("transfer-out failed: {0}")]
    OutboundFailed(String),
}

/// The atomic move-funds collaborator.
pub trait TransferPort {
    /// Pulls `amount` of `asset` from `from` into custody.
    ///
    /// Only invoked for token assets, and only after every deposit check
    /// has passed.
    fn transfer_in(
        &mut self,
        from: &OwnerId,
        asset: AssetId,
        amount: U256,
    ) -> Result<(), TransferError>;

    /// Pays `amount` of `asset` out of custody to `to`.
    fn transfer_out(
        &mut self,
        to: &OwnerId,
        asset: AssetId,
        amount: U256,
    ) -> Result<(), TransferError>;
}
