// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

//! Caller-side protocol on top of the sequencer: wait for the account's turn, pick the
//! sequence, submit, lock, and later settle once the ledger confirms.

mod error;

use std::sync::Arc;

use relay_core::{AccountKey, Ledger, LedgerProbe, SequenceNumber, SubmissionHandle, Ticket};
use tracing::{info, warn};

use crate::account_queue::Sequencer;
use crate::config::RelayConfig;
use crate::poller::poll;

pub use error::RelayError;

/// An operation the ledger accepted but has not (yet) been seen as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub ticket: Ticket,
    pub sequence: SequenceNumber,
    pub handle: SubmissionHandle,
}

pub struct OrderedRelay<L: Ledger> {
    ledger: Arc<L>,
    sequencer: Sequencer<L>,
    config: RelayConfig,
}

impl<L: Ledger> OrderedRelay<L> {
    pub fn new(ledger: Arc<L>, config: RelayConfig) -> Self {
        let sequencer = Sequencer::new(Arc::clone(&ledger), config.sequencer_config());
        Self {
            ledger,
            sequencer,
            config,
        }
    }

    pub fn sequencer(&self) -> &Sequencer<L> {
        &self.sequencer
    }

    /// Sends `payload` for `key` once every earlier operation on the account finished.
    ///
    /// Returns as soon as the ledger accepted the operation. The account stays locked by
    /// the returned submission until some later waiter, or [`Self::await_confirmation`],
    /// sees it finish. Dropping the future before that retires the ticket, so an abandoned
    /// call never holds up the account.
    pub async fn submit(
        &self,
        key: AccountKey,
        payload: L::Payload,
    ) -> Result<Submission, RelayError> {
        self.ledger
            .verify_account(key)
            .await
            .map_err(|source| RelayError::AccountRejected { key, source })?;

        let ticket = TicketGuard::new(&self.sequencer, self.sequencer.enqueue(key));
        let turn_options = self.config.turn_poll_options(format!("turn:{key}"));
        self.sequencer.await_turn(ticket.ticket(), &turn_options).await?;
        let sequence = self.sequencer.next_sequence_number(ticket.ticket()).await?;

        let handle = match self.ledger.submit(key, sequence, payload).await {
            Ok(handle) => handle,
            Err(reason) => {
                warn!(key = %key, sequence, error = %reason, "submission rejected");
                return Err(RelayError::SubmissionRejected {
                    key,
                    sequence,
                    reason,
                });
            }
        };

        self.sequencer.lock(ticket.ticket(), sequence, handle)?;
        let ticket = ticket.disarm();

        info!(key = %key, sequence, handle = %handle, "operation submitted");
        Ok(Submission {
            ticket,
            sequence,
            handle,
        })
    }

    /// Polls the ledger until `submission` finished, then releases its account.
    ///
    /// Safe to race with waiters that settle the same submission first. On error the
    /// account stays locked: the operation may still finish, and the next waiter settles it.
    pub async fn await_confirmation(&self, submission: &Submission) -> Result<(), RelayError> {
        let key = submission.ticket.key;
        let options = self
            .config
            .confirm_poll_options(format!("confirm:{}", submission.handle));

        poll(
            || {
                self.ledger
                    .check_outstanding_submission(key, submission.handle)
            },
            |status| status.is_finished(),
            &options,
        )
        .await?;

        self.sequencer.unlock(&submission.ticket);
        self.sequencer.retire(&submission.ticket);
        info!(
            key = %key,
            sequence = submission.sequence,
            handle = %submission.handle,
            "operation confirmed"
        );
        Ok(())
    }

    pub async fn submit_and_confirm(
        &self,
        key: AccountKey,
        payload: L::Payload,
    ) -> Result<Submission, RelayError> {
        let submission = self.submit(key, payload).await?;
        self.await_confirmation(&submission).await?;
        Ok(submission)
    }
}

/// Retires its ticket when dropped unless disarmed. Covers every exit from
/// [`OrderedRelay::submit`] before the account is locked, including a dropped future.
struct TicketGuard<'a, P: LedgerProbe + ?Sized> {
    sequencer: &'a Sequencer<P>,
    ticket: Ticket,
    armed: bool,
}

impl<'a, P: LedgerProbe + ?Sized> TicketGuard<'a, P> {
    fn new(sequencer: &'a Sequencer<P>, ticket: Ticket) -> Self {
        Self {
            sequencer,
            ticket,
            armed: true,
        }
    }

    fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    fn disarm(mut self) -> Ticket {
        self.armed = false;
        self.ticket
    }
}

impl<P: LedgerProbe + ?Sized> Drop for TicketGuard<'_, P> {
    fn drop(&mut self) {
        if self.armed {
            self.sequencer.retire(&self.ticket);
        }
    }
}
