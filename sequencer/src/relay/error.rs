// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

use relay_core::{AccountKey, LedgerError, SequenceNumber};
use thiserror::Error;

use crate::account_queue::QueueError;
use crate::poller::PollError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("account {key} failed verification")]
    AccountRejected {
        key: AccountKey,
        #[source]
        source: LedgerError,
    },
    #[error("submission {sequence} for {key} was not accepted: {reason}")]
    SubmissionRejected {
        key: AccountKey,
        sequence: SequenceNumber,
        reason: LedgerError,
    },
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("waiting for confirmation failed")]
    Confirmation(#[from] PollError),
}

impl RelayError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AccountRejected { .. } => "ACCOUNT_REJECTED",
            Self::SubmissionRejected { .. } => "SUBMISSION_REJECTED",
            Self::Queue(QueueError::Turn { source }) | Self::Confirmation(source)
                if source.is_timeout() =>
            {
                "TIMEOUT_EXCEEDED"
            }
            Self::Queue(_) => "QUEUE_ERROR",
            Self::Confirmation(_) => "CONFIRMATION_CANCELLED",
        }
    }
}
