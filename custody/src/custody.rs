//! # Custody Engine -- Deposit & Withdrawal Orchestration
//!
//! The top-level state machine. Deposits run strict check-effects-interact:
//! value the incoming amount (strict -- unknown valuations are never
//! admitted), check the cap, verify the native paid-in amount, credit the
//! ledger, pull token funds through the transfer port, track the asset,
//! notify. Any failure before the credit aborts with no state change; a
//! port failure after the credit rolls the credit back, so rejection is
//! all-or-nothing either way.
//!
//! Withdrawals invert the priorities: debit first, transfer out, then
//! compute a best-effort value for the notification only. The debit
//! happening before the external call is what makes a reentrant caller see
//! an already-reduced balance; the call-in-progress flag on top of that is
//! defense in depth, held across the whole operation and released on every
//! exit path.
//!
//! The engine also owns the authoritative held-quantity book (one total per
//! asset, conserved against the per-owner ledger), which is what the cap
//! enforcer's aggregate scan reads.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::asset::{AssetId, OwnerId};
use crate::cap::{self, CapError, GlobalCap};
use crate::events::{EventSink, Notification};
use crate::ledger::{Ledger, LedgerError};
use crate::oracle::PriceSource;
use crate::registry::AssetRegistry;
use crate::transfer::{TransferError, TransferPort};
use crate::valuation::{CanonicalValue, FeedDirectory, ValuationError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by custody operations.
///
/// Every deposit-path error is fully atomic: no ledger mutation, no
/// registry mutation, no transfer has happened by the time it is returned.
/// Nothing is retried internally; retry is the caller's business.
#[derive(Debug, Error)]
pub enum CustodyError {
    /// Zero-amount operations are rejected outright.
    #[error("zero-amount operations are not permitted")]
    ZeroAmount,

    /// Declared and actually-transferred amounts disagree.
    #[error("invalid amount: declared {declared}, transferred-in {transferred}")]
    InvalidAmount {
        /// The amount the caller declared.
        declared: U256,
        /// The amount that actually arrived with the call.
        transferred: U256,
    },

    /// A ledger operation failed (insufficient balance, overflow).
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Strict valuation failed. Only reachable from the deposit path --
    /// withdrawals swallow valuation failures by design.
    #[error("valuation error: {0}")]
    Valuation(#[from] ValuationError),

    /// The deposit would breach the configured cap.
    #[error("cap error: {0}")]
    Cap(#[from] CapError),

    /// The external transfer failed; all book entries were rolled back.
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// The caller does not hold the admin capability.
    #[error("caller {0} does not hold the admin capability")]
    NotAuthorized(OwnerId),

    /// An operation re-entered the engine while another was in progress.
    #[error("reentrant call rejected: an operation is already in progress")]
    ReentrantCall,
}

// ---------------------------------------------------------------------------
// AdminGate
// ---------------------------------------------------------------------------

/// The capability check gating administrative mutation.
///
/// Role storage lives entirely outside the engine; this trait is the whole
/// coupling surface.
pub trait AdminGate {
    /// Returns `true` if `caller` may configure price feeds and the cap.
    fn is_admin(&self, caller: &OwnerId) -> bool;
}

/// A fixed allowlist of admin-capable owners.
#[derive(Clone, Debug, Default)]
pub struct AdminAllowlist {
    admins: HashSet<OwnerId>,
}

impl AdminAllowlist {
    /// Builds an allowlist from any collection of owner ids.
    pub fn new(admins: impl IntoIterator<Item = OwnerId>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    /// An allowlist containing exactly one owner.
    pub fn single(admin: OwnerId) -> Self {
        Self::new([admin])
    }
}

impl AdminGate for AdminAllowlist {
    fn is_admin(&self, caller: &OwnerId) -> bool {
        self.admins.contains(caller)
    }
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Returned by [`CustodyEngine::deposit`] on success.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DepositReceipt {
    /// The owner whose balance was credited.
    pub owner: OwnerId,
    /// The deposited asset.
    pub asset: AssetId,
    /// Raw amount in the asset's own units.
    pub amount: U256,
    /// Strict canonical value at acceptance time.
    pub value: CanonicalValue,
    /// The owner's balance after the credit.
    pub new_balance: U256,
    /// When the deposit was accepted (UTC).
    pub accepted_at: DateTime<Utc>,
}

/// Returned by [`CustodyEngine::withdraw`] on success.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    /// The owner whose balance was debited.
    pub owner: OwnerId,
    /// The withdrawn asset.
    pub asset: AssetId,
    /// Raw amount in the asset's own units.
    pub amount: U256,
    /// Best-effort canonical value; zero if the feed was unavailable.
    pub value: CanonicalValue,
    /// The owner's balance after the debit.
    pub new_balance: U256,
    /// When the withdrawal completed (UTC).
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// CustodyEngine
// ---------------------------------------------------------------------------

/// The custodial multi-asset ledger, assembled.
///
/// The host environment serializes calls -- each operation runs to
/// completion or abort with no interleaving -- so the engine is a plain
/// `&mut self` state machine. The only concurrency hazard it defends
/// against is reentrant re-entry from within an external port or feed
/// call, handled by effects-before-interaction ordering plus the
/// call-in-progress flag.
pub struct CustodyEngine {
    ledger: Ledger,
    registry: AssetRegistry,
    feeds: FeedDirectory,
    cap: GlobalCap,
    /// Authoritative held quantity per asset. Conserved against the sum of
    /// per-owner ledger balances; the aggregate scan reads this instead of
    /// re-walking the whole ledger.
    holdings: HashMap<AssetId, U256>,
    port: Box<dyn TransferPort>,
    sink: Box<dyn EventSink>,
    admin: Box<dyn AdminGate>,
    in_progress: bool,
}

impl CustodyEngine {
    /// Assembles an engine around its three external collaborators, with
    /// no cap configured.
    pub fn new(
        port: Box<dyn TransferPort>,
        sink: Box<dyn EventSink>,
        admin: Box<dyn AdminGate>,
    ) -> Self {
        Self {
            ledger: Ledger::new(),
            registry: AssetRegistry::new(),
            feeds: FeedDirectory::new(),
            cap: GlobalCap::unlimited(),
            holdings: HashMap::new(),
            port,
            sink,
            admin,
            in_progress: false,
        }
    }

    // -----------------------------------------------------------------------
    // Deposit
    // -----------------------------------------------------------------------

    /// Deposits `amount` of `asset` for `caller`.
    ///
    /// `paid_in` is the quantity of the native asset that arrived with the
    /// call. For a native deposit it must equal `amount` exactly -- no
    /// over- or under-payment is tolerated. For a token deposit it must be
    /// zero, and the funds are pulled through the transfer port instead.
    ///
    /// # Errors
    ///
    /// Any of the deposit-path variants of [`CustodyError`]. All of them
    /// leave the engine exactly as it was.
    pub fn deposit(
        &mut self,
        caller: &OwnerId,
        asset: AssetId,
        amount: U256,
        paid_in: U256,
    ) -> Result<DepositReceipt, CustodyError> {
        self.guarded(|engine| engine.deposit_inner(caller, asset, amount, paid_in))
    }

    fn deposit_inner(
        &mut self,
        caller: &OwnerId,
        asset: AssetId,
        amount: U256,
        paid_in: U256,
    ) -> Result<DepositReceipt, CustodyError> {
        if amount.is_zero() {
            return Err(CustodyError::ZeroAmount);
        }

        // Strict valuation: a deposit is never admitted at an unknown value.
        let value = self.feeds.convert_strict(asset, amount)?;

        let total = self.total_custodied_value();
        self.cap.check(total, value)?;

        if asset.is_native() {
            if paid_in != amount {
                return Err(CustodyError::InvalidAmount {
                    declared: amount,
                    transferred: paid_in,
                });
            }
        } else if !paid_in.is_zero() {
            return Err(CustodyError::InvalidAmount {
                declared: U256::ZERO,
                transferred: paid_in,
            });
        }

        // The holdings ceiling is checked before anything mutates so a late
        // overflow can't leave a half-applied deposit.
        let held = self.held_quantity(&asset);
        let new_held = held.checked_add(amount).ok_or(LedgerError::Overflow {
            asset,
            current: held,
            credit: amount,
        })?;

        let new_balance = self.ledger.credit(caller, asset, amount)?;

        if !asset.is_native() {
            // The only external interaction on the deposit path. A failed
            // pull undoes the credit so rejection stays all-or-nothing.
            if let Err(err) = self.port.transfer_in(caller, asset, amount) {
                let _ = self.ledger.debit(caller, asset, amount);
                return Err(err.into());
            }
        }

        self.holdings.insert(asset, new_held);
        self.registry.ensure_tracked(asset);

        info!(owner = %caller, asset = %asset, %amount, %value, "deposit accepted");
        self.sink.emit(Notification::Deposit {
            owner: caller.clone(),
            asset,
            amount,
            value,
        });

        Ok(DepositReceipt {
            owner: caller.clone(),
            asset,
            amount,
            value,
            new_balance,
            accepted_at: Utc::now(),
        })
    }

    // -----------------------------------------------------------------------
    // Withdrawal
    // -----------------------------------------------------------------------

    /// Withdraws `amount` of `asset` from `caller`'s own balance.
    ///
    /// The debit lands before the transfer-out -- mandatory ordering, so a
    /// reentrant call from inside the port observes the reduced balance. A
    /// port failure restores the debit and the held quantity. Valuation
    /// problems never fail a withdrawal; they only zero the reported value.
    pub fn withdraw(
        &mut self,
        caller: &OwnerId,
        asset: AssetId,
        amount: U256,
    ) -> Result<WithdrawalReceipt, CustodyError> {
        self.guarded(|engine| engine.withdraw_inner(caller, asset, amount))
    }

    fn withdraw_inner(
        &mut self,
        caller: &OwnerId,
        asset: AssetId,
        amount: U256,
    ) -> Result<WithdrawalReceipt, CustodyError> {
        if amount.is_zero() {
            return Err(CustodyError::ZeroAmount);
        }

        let new_balance = self.ledger.debit(caller, asset, amount)?;

        // held >= amount follows from conservation: the debit above just
        // proved the owner's balance covered it.
        let held = self.held_quantity(&asset);
        self.holdings.insert(asset, held.saturating_sub(amount));

        if let Err(err) = self.port.transfer_out(caller, asset, amount) {
            self.holdings.insert(asset, held);
            let _ = self.ledger.credit(caller, asset, amount);
            return Err(err.into());
        }

        // Best-effort only: a dark feed degrades the audit number, never
        // the return of funds.
        let value = self.feeds.convert_tolerant(asset, amount);

        info!(owner = %caller, asset = %asset, %amount, %value, "withdrawal completed");
        self.sink.emit(Notification::Withdrawal {
            owner: caller.clone(),
            asset,
            amount,
            value,
        });

        Ok(WithdrawalReceipt {
            owner: caller.clone(),
            asset,
            amount,
            value,
            new_balance,
            completed_at: Utc::now(),
        })
    }

    // -----------------------------------------------------------------------
    // Administrative operations
    // -----------------------------------------------------------------------

    /// Associates a price feed with an asset, replacing any existing
    /// association atomically. Always tracks the asset.
    pub fn set_price_feed(
        &mut self,
        caller: &OwnerId,
        asset: AssetId,
        feed: Arc<dyn PriceSource>,
    ) -> Result<(), CustodyError> {
        self.require_admin(caller)?;

        let adapter = feed.label();
        self.feeds.set_feed(asset, feed);
        self.registry.ensure_tracked(asset);

        info!(asset = %asset, %adapter, "price feed set");
        self.sink.emit(Notification::PriceFeedSet { asset, adapter });
        Ok(())
    }

    /// Replaces the global cap, returning the previous value.
    ///
    /// Takes effect for the next deposit's check. Holdings already above a
    /// newly lowered cap stay put -- the cap gates deposits, it never
    /// confiscates.
    pub fn set_global_cap(
        &mut self,
        caller: &OwnerId,
        limit: CanonicalValue,
    ) -> Result<CanonicalValue, CustodyError> {
        self.require_admin(caller)?;

        let previous = self.cap.set(limit);
        info!(cap = %limit, "global cap set");
        self.sink.emit(Notification::GlobalCapSet { cap: limit });
        Ok(previous)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Current balance of `owner` under `asset`.
    pub fn balance_of(&self, owner: &OwnerId, asset: &AssetId) -> U256 {
        self.ledger.balance_of(owner, asset)
    }

    /// All non-zero balances for one owner.
    pub fn balances_of_owner(&self, owner: &OwnerId) -> Vec<(AssetId, U256)> {
        self.ledger.balances_of_owner(owner)
    }

    /// Authoritative held quantity of one asset.
    pub fn held_quantity(&self, asset: &AssetId) -> U256 {
        self.holdings.get(asset).copied().unwrap_or(U256::ZERO)
    }

    /// Current total custodied value in canonical units. Recomputed on
    /// demand; costs one tolerant conversion per tracked asset.
    pub fn total_custodied_value(&self) -> CanonicalValue {
        cap::total_custodied_value(&self.registry, &self.feeds, |asset| {
            self.holdings.get(asset).copied().unwrap_or(U256::ZERO)
        })
    }

    /// The set of assets ever seen.
    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// The configured global cap.
    pub fn cap(&self) -> &GlobalCap {
        &self.cap
    }

    /// Returns `true` if `asset` currently has a price feed.
    pub fn has_feed(&self, asset: &AssetId) -> bool {
        self.feeds.has_feed(asset)
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn require_admin(&self, caller: &OwnerId) -> Result<(), CustodyError> {
        if !self.admin.is_admin(caller) {
            return Err(CustodyError::NotAuthorized(caller.clone()));
        }
        Ok(())
    }

    /// Wraps an operation in the call-in-progress flag. The flag is
    /// cleared on every exit path, success or failure.
    fn guarded<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, CustodyError>,
    ) -> Result<T, CustodyError> {
        if self.in_progress {
            return Err(CustodyError::ReentrantCall);
        }
        self.in_progress = true;
        let result = op(self);
        self.in_progress = false;
        result
    }

    /// Simulates an operation already being in flight.
    #[cfg(test)]
    fn force_in_progress(&mut self) {
        self.in_progress = true;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
