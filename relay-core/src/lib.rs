// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

//! Shared vocabulary for the ordered relay: account keys, tickets, submission handles,
//! and the external ledger boundary the sequencer probes.
pub mod account;
pub mod ledger;

pub use account::{AccountKey, SequenceNumber, SubmissionHandle, Ticket, TicketId};
pub use ledger::{Ledger, LedgerError, LedgerProbe, SubmissionStatus};
