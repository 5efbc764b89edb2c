// Copyright (c) 2026 Vela Labs. MIT License.
// See LICENSE for details.

//! # VELA Custody -- Multi-Asset Ledger with Cap Enforcement
//!
//! A custodial ledger that lets participants deposit and withdraw one
//! native asset and any number of fungible tokens, while a risk-control
//! layer enforces an aggregate deposit cap denominated in a canonical
//! 6-decimal accounting unit. Valuation is delegated to one external price
//! source per asset, queried on demand -- never cached, never trusted
//! further than one conversion.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual concerns of a
//! custody engine, leaf-first:
//!
//! - **config** -- Canonical-unit constants. One place, no exceptions.
//! - **asset** -- Opaque asset and owner identifiers; zero is the native
//!   sentinel.
//! - **oracle** -- The price-source contract. A quote is either positive
//!   and fresh or it doesn't exist.
//! - **valuation** -- Amount → canonical units. Strict for deposits,
//!   tolerant for everything where a best-effort number is acceptable.
//! - **ledger** -- The (owner, asset) → balance book. The only thing that
//!   mutates balances.
//! - **registry** -- The append-only, insertion-ordered set of assets ever
//!   seen.
//! - **cap** -- The global ceiling and the on-demand aggregate scan.
//! - **transfer** -- The atomic move-funds port. Fully succeeds or fully
//!   fails; there is no third option.
//! - **events** -- Notifications, the only durable audit trail.
//! - **custody** -- The orchestrator that sequences all of the above as
//!   strict check-effects-interact protocols.
//!
//! ## Design Philosophy
//!
//! 1. Deposits are never admitted at an unknown valuation -- the cap would
//!    mean nothing otherwise.
//! 2. Withdrawals are never blocked by an oracle outage -- returning funds
//!    outranks an accurate audit number.
//! 3. Checked arithmetic everywhere money is counted. Wrapping is a bug
//!    with a balance sheet.
//! 4. If it touches money, it has tests. Plural.

pub mod asset;
pub mod cap;
pub mod config;
pub mod custody;
pub mod events;
pub mod ledger;
pub mod oracle;
pub mod registry;
pub mod transfer;
pub mod valuation;

pub use asset::{AssetId, OwnerId};
pub use cap::{CapError, GlobalCap};
pub use custody::{
    AdminAllowlist, AdminGate, CustodyEngine, CustodyError, DepositReceipt, WithdrawalReceipt,
};
pub use events::{EventSink, MemorySink, Notification, NullSink};
pub use ledger::{Ledger, LedgerError};
pub use oracle::{FixedPrice, OracleError, PriceQuote, PriceSource};
pub use registry::AssetRegistry;
pub use transfer::{TransferError, TransferPort};
pub use valuation::{CanonicalValue, FeedDirectory, ValuationError};
