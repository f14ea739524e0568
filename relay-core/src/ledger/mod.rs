// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

//! The external ledger as seen from the relay: something that accepts one operation at a
//! time per account and only later reports, when asked, that it finished.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::account::{AccountKey, SequenceNumber, SubmissionHandle};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger refused the operation; nothing entered its state.
    #[error("rejected: {0}")]
    Rejected(String),
    /// The ledger (or the index in front of it) could not answer right now.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Finished,
}

impl SubmissionStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Read-only queries the sequencer needs to decide when an account's line may move.
///
/// Every method is a best-effort probe: an `Err` means "cannot tell yet" and callers retry.
#[async_trait]
pub trait LedgerProbe: Send + Sync {
    async fn check_outstanding_submission(
        &self,
        key: AccountKey,
        handle: SubmissionHandle,
    ) -> Result<SubmissionStatus, LedgerError>;

    /// Next sequence number the ledger expects for `key`, if it knows the account at all.
    async fn current_sequence_hint(
        &self,
        key: AccountKey,
    ) -> Result<Option<SequenceNumber>, LedgerError>;
}

#[async_trait]
pub trait Ledger: LedgerProbe {
    type Payload: Send + 'static;

    /// Hands one operation to the relay service.
    ///
    /// Implementations must return `Ok` whenever the operation may have been accepted: an
    /// `Err` tells the caller the ledger never saw it, and the account's line moves on.
    async fn submit(
        &self,
        key: AccountKey,
        sequence: SequenceNumber,
        payload: Self::Payload,
    ) -> Result<SubmissionHandle, LedgerError>;

    async fn verify_account(&self, _key: AccountKey) -> Result<(), LedgerError> {
        Ok(())
    }
}
