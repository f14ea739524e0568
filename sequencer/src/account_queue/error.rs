// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

use relay_core::{AccountKey, LedgerError, SequenceNumber, TicketId};
use thiserror::Error;

use crate::poller::PollError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("ticket {ticket} on {key} is not at the head of the line (head: {head:?})")]
    NotHead {
        key: AccountKey,
        ticket: TicketId,
        head: Option<TicketId>,
    },
    #[error("{key} already has submission of ticket {holder} in flight")]
    AlreadyLocked { key: AccountKey, holder: TicketId },
    #[error("sequence {requested} for {key} does not follow previous sequence {previous}")]
    SequenceRegressed {
        key: AccountKey,
        previous: SequenceNumber,
        requested: SequenceNumber,
    },
    #[error("ticket {ticket} on {key} was retired while waiting")]
    TicketRetired { key: AccountKey, ticket: TicketId },
    #[error("waiting for turn failed")]
    Turn {
        #[source]
        source: PollError,
    },
    #[error("cannot determine next sequence for {key}")]
    SequenceUnavailable {
        key: AccountKey,
        #[source]
        source: LedgerError,
    },
}
