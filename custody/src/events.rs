//! # Notifications -- The Only Durable Audit Trail
//!
//! Every successful operation emits exactly one [`Notification`] into an
//! injected [`EventSink`]. The engine keeps no transaction history of its
//! own; whatever the sink does with the stream -- append it to a log, ship
//! it to an indexer, drop it on the floor -- is outside the custody
//! engine's contract.
//!
//! Sinks are a side channel, not a queryable data structure. The
//! [`MemorySink`] here exists because an in-process deployment still needs
//! somewhere for the audit trail to land, and because tests need to see it.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::asset::{AssetId, OwnerId};
use crate::valuation::CanonicalValue;
use alloy_primitives::U256;

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// One audit record per successful operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    /// A deposit was credited and custody took the funds.
    Deposit {
        owner: OwnerId,
        asset: AssetId,
        /// Raw amount in the asset's own units.
        amount: U256,
        /// Strict canonical value computed at acceptance time.
        value: CanonicalValue,
    },

    /// A withdrawal was debited and the funds left custody.
    Withdrawal {
        owner: OwnerId,
        asset: AssetId,
        amount: U256,
        /// Best-effort canonical value; zero when the asset's feed was
        /// unavailable at withdrawal time.
        value: CanonicalValue,
    },

    /// A price feed association was created or replaced.
    PriceFeedSet {
        asset: AssetId,
        /// The new feed's label.
        adapter: String,
    },

    /// The global cap was changed.
    GlobalCapSet { cap: CanonicalValue },
}

// ---------------------------------------------------------------------------
// EventSink
// ---------------------------------------------------------------------------

/// Where notifications go. Append-only from the engine's point of view.
pub trait EventSink {
    /// Accepts one notification. Must not fail -- a sink that can't keep
    /// up decides for itself whether to buffer or drop.
    fn emit(&mut self, event: Notification);
}

/// A sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: Notification) {}
}

/// An in-memory recording sink.
///
/// Cloning is cheap and every clone shares the same backing store, so a
/// handle kept outside the engine observes everything the engine emits.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out everything emitted so far, in emission order.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.events.lock().clone()
    }

    /// Number of notifications emitted so far.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns `true` if nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    fn emit(&mut self, event: Notification) {
        self.events.lock().push(event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
