// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

use std::fmt;

use alloy_primitives::{Address, B256};
use serde::Serialize;

/// Account whose operations must reach the ledger in strict sequence order.
pub type AccountKey = Address;

/// Hash identifying a submitted operation; used to ask the ledger whether it finished.
pub type SubmissionHandle = B256;

/// Per-account index the ledger requires for each accepted operation.
pub type SequenceNumber = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TicketId(u64);

impl TicketId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A caller's reserved place in one account's line.
///
/// Tickets are handed out by the sequencer and never reused; the caller must hand the
/// ticket back through `retire` on every path, including cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub id: TicketId,
    pub key: AccountKey,
}

impl Ticket {
    pub const fn new(id: TicketId, key: AccountKey) -> Self {
        Self { id, key }
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.key)
    }
}
