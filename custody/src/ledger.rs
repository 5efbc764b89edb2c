//! # Ledger -- Per-(Owner, Asset) Balance Accounting
//!
//! The ledger is the only component that mutates balances, and only in
//! response to successful deposit/withdraw operations. Balances are `U256`
//! so realistic token supplies never get near the ceiling, but the ceiling
//! is still checked -- arithmetic that silently wraps has no place in a
//! custody system.
//!
//! Balance entries are created implicitly at zero on first reference and
//! never deleted, only driven back to zero. Reading an entry that was never
//! touched returns zero rather than an error; the distinction between
//! "never seen" and "seen and empty" is not observable through the balance
//! API and nothing downstream depends on it.

use std::collections::HashMap;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::{asset_id_map, AssetId, OwnerId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Attempted to debit more than the available balance.
    #[error(
        "insufficient balance for {owner} on asset {asset}: available {available}, requested {requested}"
    )]
    InsufficientBalance {
        /// The owner whose balance was being debited.
        owner: OwnerId,
        /// The asset that was being debited.
        asset: AssetId,
        /// The amount that was requested.
        requested: U256,
        /// The current balance.
        available: U256,
    },

    /// Arithmetic overflow during a credit operation.
    ///
    /// Unreachable with any realistic asset supply, but checked rather
    /// than assumed.
    #[error("balance overflow on asset {asset}: current {current}, credit {credit}")]
    Overflow {
        /// The asset that was being credited.
        asset: AssetId,
        /// The balance before the failed credit.
        current: U256,
        /// The amount that caused the overflow.
        credit: U256,
    },
}

// ---------------------------------------------------------------------------
// AccountBook
// ---------------------------------------------------------------------------

/// All balances held by a single owner, keyed by asset.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccountBook {
    #[serde(with = "asset_id_map")]
    balances: HashMap<AssetId, U256>,
}

impl AccountBook {
    /// Returns the balance for one asset, zero if never touched.
    pub fn balance(&self, asset: &AssetId) -> U256 {
        self.balances.get(asset).copied().unwrap_or(U256::ZERO)
    }

    /// Returns all non-zero balances as `(AssetId, amount)` pairs.
    pub fn non_zero(&self) -> Vec<(AssetId, U256)> {
        self.balances
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(asset, amount)| (*asset, *amount))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// The mapping from (owner, asset) to a non-negative balance.
///
/// Thread safety is the caller's concern -- the custody engine serializes
/// all access, so the ledger itself is a plain data structure.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Ledger {
    accounts: HashMap<OwnerId, AccountBook>,
}

impl Ledger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits (adds) `amount` to the balance of `owner` under `asset`.
    ///
    /// An entry is created implicitly at zero if this is the first time the
    /// (owner, asset) pair is referenced. Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if the credit would exceed the
    /// integer width.
    pub fn credit(
        &mut self,
        owner: &OwnerId,
        asset: AssetId,
        amount: U256,
    ) -> Result<U256, LedgerError> {
        let book = self.accounts.entry(owner.clone()).or_default();
        let current = book.balance(&asset);
        let new_balance = current
            .checked_add(amount)
            .ok_or(LedgerError::Overflow {
                asset,
                current,
                credit: amount,
            })?;
        book.balances.insert(asset, new_balance);
        Ok(new_balance)
    }

    /// Debits (subtracts) `amount` from the balance of `owner` under
    /// `asset`. Returns the new balance. Never produces a negative result.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] if `amount` exceeds the
    /// current balance.
    pub fn debit(
        &mut self,
        owner: &OwnerId,
        asset: AssetId,
        amount: U256,
    ) -> Result<U256, LedgerError> {
        let available = self.balance_of(owner, &asset);
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                owner: owner.clone(),
                asset,
                requested: amount,
                available,
            });
        }
        let book = self.accounts.entry(owner.clone()).or_default();
        let new_balance = available - amount;
        book.balances.insert(asset, new_balance);
        Ok(new_balance)
    }

    /// Returns the balance of `owner` under `asset`. Pure read; entries
    /// that were never touched read as zero.
    pub fn balance_of(&self, owner: &OwnerId, asset: &AssetId) -> U256 {
        self.accounts
            .get(owner)
            .map(|book| book.balance(asset))
            .unwrap_or(U256::ZERO)
    }

    /// Returns all non-zero balances for one owner.
    pub fn balances_of_owner(&self, owner: &OwnerId) -> Vec<(AssetId, U256)> {
        self.accounts
            .get(owner)
            .map(|book| book.non_zero())
            .unwrap_or_default()
    }

    /// Returns the number of owners with at least one (possibly zero)
    /// balance entry.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> OwnerId {
        OwnerId::new("vela:alice")
    }

    fn token() -> AssetId {
        AssetId::derive("eth-mainnet", "0xtoken")
    }

    #[test]
    fn credit_creates_entry_implicitly() {
        let mut ledger = Ledger::new();
        let new_balance = ledger.credit(&owner(), token(), U256::from(1000u64)).unwrap();
        assert_eq!(new_balance, U256::from(1000u64));
        assert_eq!(ledger.balance_of(&owner(), &token()), U256::from(1000u64));
    }

    #[test]
    fn credit_accumulates() {
        let mut ledger = Ledger::new();
        ledger.credit(&owner(), token(), U256::from(500u64)).unwrap();
        ledger.credit(&owner(), token(), U256::from(300u64)).unwrap();
        assert_eq!(ledger.balance_of(&owner(), &token()), U256::from(800u64));
    }

    #[test]
    fn credit_overflow_rejected() {
        let mut ledger = Ledger::new();
        ledger.credit(&owner(), token(), U256::MAX).unwrap();
        let result = ledger.credit(&owner(), token(), U256::from(1u64));
        assert!(matches!(result, Err(LedgerError::Overflow { .. })));
        // The failed credit left the balance untouched.
        assert_eq!(ledger.balance_of(&owner(), &token()), U256::MAX);
    }

    #[test]
    fn debit_reduces_balance() {
        let mut ledger = Ledger::new();
        ledger.credit(&owner(), token(), U256::from(1000u64)).unwrap();
        let remaining = ledger.debit(&owner(), token(), U256::from(400u64)).unwrap();
        assert_eq!(remaining, U256::from(600u64));
    }

    #[test]
    fn debit_to_zero_keeps_the_entry() {
        let mut ledger = Ledger::new();
        ledger.credit(&owner(), token(), U256::from(500u64)).unwrap();
        let remaining = ledger.debit(&owner(), token(), U256::from(500u64)).unwrap();
        assert_eq!(remaining, U256::ZERO);
        assert_eq!(ledger.account_count(), 1);
    }

    #[test]
    fn debit_insufficient_balance_carries_diagnostics() {
        let mut ledger = Ledger::new();
        ledger.credit(&owner(), token(), U256::from(50u64)).unwrap();
        let result = ledger.debit(&owner(), token(), U256::from(80u64));
        match result {
            Err(LedgerError::InsufficientBalance {
                requested,
                available,
                ..
            }) => {
                assert_eq!(requested, U256::from(80u64));
                assert_eq!(available, U256::from(50u64));
            }
            other => panic!("expected InsufficientBalance, got {:?}", other),
        }
        assert_eq!(ledger.balance_of(&owner(), &token()), U256::from(50u64));
    }

    #[test]
    fn debit_untouched_entry_is_insufficient() {
        let mut ledger = Ledger::new();
        let result = ledger.debit(&owner(), token(), U256::from(1u64));
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn balances_are_isolated_per_owner_and_asset() {
        let mut ledger = Ledger::new();
        let alice = OwnerId::new("vela:alice");
        let bob = OwnerId::new("vela:bob");
        let native = AssetId::native();

        ledger.credit(&alice, token(), U256::from(100u64)).unwrap();
        ledger.credit(&alice, native, U256::from(7u64)).unwrap();
        ledger.credit(&bob, token(), U256::from(200u64)).unwrap();

        assert_eq!(ledger.balance_of(&alice, &token()), U256::from(100u64));
        assert_eq!(ledger.balance_of(&alice, &native), U256::from(7u64));
        assert_eq!(ledger.balance_of(&bob, &token()), U256::from(200u64));
        assert_eq!(ledger.balance_of(&bob, &native), U256::ZERO);
        assert_eq!(ledger.account_count(), 2);
    }

    #[test]
    fn deposit_withdraw_sequences_conserve() {
        // Final balance equals credits minus debits, and never goes negative.
        let mut ledger = Ledger::new();
        ledger.credit(&owner(), token(), U256::from(1000u64)).unwrap();
        ledger.debit(&owner(), token(), U256::from(250u64)).unwrap();
        ledger.credit(&owner(), token(), U256::from(50u64)).unwrap();
        ledger.debit(&owner(), token(), U256::from(800u64)).unwrap();
        assert_eq!(ledger.balance_of(&owner(), &token()), U256::ZERO);
        assert!(ledger.debit(&owner(), token(), U256::from(1u64)).is_err());
    }

    #[test]
    fn balances_of_owner_excludes_zeros() {
        let mut ledger = Ledger::new();
        ledger.credit(&owner(), token(), U256::from(500u64)).unwrap();
        ledger.credit(&owner(), AssetId::native(), U256::from(10u64)).unwrap();
        ledger.debit(&owner(), token(), U256::from(500u64)).unwrap();

        let non_zero = ledger.balances_of_owner(&owner());
        assert_eq!(non_zero.len(), 1);
        assert_eq!(non_zero[0], (AssetId::native(), U256::from(10u64)));
    }

    #[test]
    fn ledger_serialization_roundtrip() {
        let mut ledger = Ledger::new();
        ledger.credit(&owner(), token(), U256::from(42u64)).unwrap();
        ledger.credit(&owner(), AssetId::native(), U256::from(9u64)).unwrap();

        let json = serde_json::to_string(&ledger).expect("serialize");
        let recovered: Ledger = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(recovered.balance_of(&owner(), &token()), U256::from(42u64));
        assert_eq!(
            recovered.balance_of(&owner(), &AssetId::native()),
            U256::from(9u64)
        );
    }
}
