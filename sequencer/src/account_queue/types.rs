// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

use relay_core::{SequenceNumber, SubmissionHandle, TicketId};

/// The submission currently owning an account: sent, but not yet seen as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub ticket: TicketId,
    pub sequence: SequenceNumber,
    pub handle: SubmissionHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Head of the line and the account is unlocked: the holder may submit.
    Granted,
    /// Still in line. `ahead` counts tickets before this one, including a locked head.
    Waiting { ahead: usize },
    /// No longer in the line (retired, or settled after its submission finished).
    Retired,
}

impl TurnState {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    pub(super) fn is_final(&self) -> bool {
        matches!(self, Self::Granted | Self::Retired)
    }
}
