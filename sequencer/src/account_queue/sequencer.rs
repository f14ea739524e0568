// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use relay_core::{
    AccountKey, LedgerError, LedgerProbe, SequenceNumber, SubmissionHandle, Ticket, TicketId,
};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::profiling::{SequencerMetrics, SequencerMetricsSnapshot};
use super::queue::KeyQueue;
use super::{InFlight, QueueError, TurnState};
use crate::poller::{PollOptions, poll};

#[derive(Debug, Clone, Copy)]
pub struct SequencerConfig {
    pub metrics_enabled: bool,
    pub metrics_log_interval: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_log_interval: Duration::from_secs(5),
        }
    }
}

/// Admits at most one in-flight submission per account, in `enqueue` order.
///
/// There is no background task: whichever caller is waiting on an account probes the
/// ledger for the locked submission and, once it finished, advances the line for everyone.
/// Accounts are independent; the shared map is only locked to find an account's entry.
pub struct Sequencer<P: LedgerProbe + ?Sized> {
    probe: Arc<P>,
    accounts: Mutex<HashMap<AccountKey, Arc<Mutex<KeyQueue>>>>,
    next_ticket_id: AtomicU64,
    metrics: SequencerMetrics,
}

impl<P: LedgerProbe + ?Sized> Sequencer<P> {
    pub fn new(probe: Arc<P>, config: SequencerConfig) -> Self {
        Self {
            probe,
            accounts: Mutex::new(HashMap::new()),
            next_ticket_id: AtomicU64::new(1),
            metrics: SequencerMetrics::new(config.metrics_enabled, config.metrics_log_interval),
        }
    }

    pub fn enqueue(&self, key: AccountKey) -> Ticket {
        let account = self.account(key);
        let ticket = {
            let mut queue = lock_queue(&account);
            // Allocated under the account lock so ticket order matches line order.
            let id = TicketId::new(self.next_ticket_id.fetch_add(1, Ordering::Relaxed));
            queue.push(id);
            Ticket::new(id, key)
        };

        self.metrics.on_enqueue();
        debug!(key = %key, ticket = %ticket.id, "ticket enqueued");
        ticket
    }

    /// Waits until `ticket` heads its line and the account has nothing in flight.
    ///
    /// Dropping the returned future leaves the ticket in line; the caller still owes a
    /// [`Sequencer::retire`] or the account stalls behind it.
    pub async fn await_turn(
        &self,
        ticket: &Ticket,
        options: &PollOptions,
    ) -> Result<(), QueueError> {
        let account = self.account(ticket.key);
        let started = Instant::now();

        let state = poll(
            || self.advance(&account, ticket),
            TurnState::is_final,
            options,
        )
        .await
        .map_err(|source| QueueError::Turn { source })?;

        match state {
            TurnState::Granted => {
                let waited = started.elapsed();
                self.metrics.on_turn_granted(waited);
                debug!(
                    key = %ticket.key,
                    ticket = %ticket.id,
                    waited_ms = waited.as_millis() as u64,
                    "turn granted"
                );
                Ok(())
            }
            TurnState::Retired => Err(QueueError::TicketRetired {
                key: ticket.key,
                ticket: ticket.id,
            }),
            TurnState::Waiting { .. } => unreachable!("poll only returns final turn states"),
        }
    }

    /// One poll attempt: settle the account's in-flight submission if the ledger reports
    /// it finished, then report where `ticket` stands.
    async fn advance(
        &self,
        account: &Mutex<KeyQueue>,
        ticket: &Ticket,
    ) -> Result<TurnState, LedgerError> {
        let observed = lock_queue(account).in_flight();

        if let Some(in_flight) = observed {
            let status = match self
                .probe
                .check_outstanding_submission(ticket.key, in_flight.handle)
                .await
            {
                Ok(status) => status,
                Err(err) => {
                    self.metrics.on_probe_error();
                    // A concurrent waiter may already have settled the lock.
                    let state = lock_queue(account).turn_of(ticket.id);
                    return if state.is_final() {
                        Ok(state)
                    } else {
                        Err(err)
                    };
                }
            };

            if status.is_finished() && lock_queue(account).settle(in_flight) {
                self.metrics.on_settled();
                debug!(
                    key = %ticket.key,
                    ticket = %in_flight.ticket,
                    sequence = in_flight.sequence,
                    "in-flight submission finished, line advanced"
                );
            }
        }

        Ok(lock_queue(account).turn_of(ticket.id))
    }

    /// Marks the submission the turn holder just sent. Refusals mean the caller broke the
    /// protocol (no turn, already locked, or a sequence that does not advance) and leave
    /// the account untouched.
    pub fn lock(
        &self,
        ticket: &Ticket,
        sequence: SequenceNumber,
        handle: SubmissionHandle,
    ) -> Result<(), QueueError> {
        let account = self.account(ticket.key);
        lock_queue(&account).set_in_flight(InFlight {
            ticket: ticket.id,
            sequence,
            handle,
        })?;

        self.metrics.on_lock();
        debug!(
            key = %ticket.key,
            ticket = %ticket.id,
            sequence,
            handle = %handle,
            "account locked"
        );
        Ok(())
    }

    /// Releases the lock held by `ticket`, if any. The ticket keeps its place in line.
    pub fn unlock(&self, ticket: &Ticket) -> bool {
        self.existing_account(ticket.key)
            .is_some_and(|account| lock_queue(&account).clear_in_flight(ticket.id))
    }

    /// Removes `ticket` from its line (and its lock, if held). Safe to call on every exit
    /// path: retiring an already settled or retired ticket is a no-op.
    pub fn retire(&self, ticket: &Ticket) -> bool {
        let removed = self
            .existing_account(ticket.key)
            .is_some_and(|account| lock_queue(&account).remove(ticket.id));
        if removed {
            self.metrics.on_retire();
            debug!(key = %ticket.key, ticket = %ticket.id, "ticket retired");
        }
        removed
    }

    /// Sequence the turn holder should submit with: the ledger's hint, but never below one
    /// past the last sequence this process locked for the account.
    pub async fn next_sequence_number(
        &self,
        ticket: &Ticket,
    ) -> Result<SequenceNumber, QueueError> {
        let floor = self
            .last_sequence(ticket.key)
            .map(|previous| previous.saturating_add(1));

        match self.probe.current_sequence_hint(ticket.key).await {
            Ok(hint) => Ok(match (hint, floor) {
                (Some(hint), Some(floor)) => hint.max(floor),
                (Some(hint), None) => hint,
                (None, Some(floor)) => floor,
                (None, None) => 0,
            }),
            Err(source) => match floor {
                Some(floor) => {
                    warn!(
                        key = %ticket.key,
                        error = %source,
                        sequence = floor,
                        "sequence hint unavailable, continuing from last locked sequence"
                    );
                    Ok(floor)
                }
                None => Err(QueueError::SequenceUnavailable {
                    key: ticket.key,
                    source,
                }),
            },
        }
    }

    pub fn turn_state(&self, ticket: &Ticket) -> TurnState {
        self.existing_account(ticket.key)
            .map_or(TurnState::Retired, |account| {
                lock_queue(&account).turn_of(ticket.id)
            })
    }

    pub fn in_flight(&self, key: AccountKey) -> Option<InFlight> {
        self.existing_account(key)
            .and_then(|account| lock_queue(&account).in_flight())
    }

    pub fn waiting(&self, key: AccountKey) -> Vec<TicketId> {
        self.existing_account(key)
            .map(|account| lock_queue(&account).waiting())
            .unwrap_or_default()
    }

    pub fn last_sequence(&self, key: AccountKey) -> Option<SequenceNumber> {
        self.existing_account(key)
            .and_then(|account| lock_queue(&account).last_sequence())
    }

    pub fn metrics_snapshot(&self) -> SequencerMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn account(&self, key: AccountKey) -> Arc<Mutex<KeyQueue>> {
        let mut accounts = self.lock_accounts();
        Arc::clone(
            accounts
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(KeyQueue::new(key)))),
        )
    }

    fn existing_account(&self, key: AccountKey) -> Option<Arc<Mutex<KeyQueue>>> {
        self.lock_accounts().get(&key).map(Arc::clone)
    }

    fn lock_accounts(&self) -> MutexGuard<'_, HashMap<AccountKey, Arc<Mutex<KeyQueue>>>> {
        self.accounts
            .lock()
            .expect("sequencer account map mutex poisoned")
    }
}

impl<P: LedgerProbe + ?Sized> Drop for Sequencer<P> {
    fn drop(&mut self) {
        self.metrics.log_final();
    }
}

fn lock_queue(account: &Mutex<KeyQueue>) -> MutexGuard<'_, KeyQueue> {
    account.lock().expect("account queue mutex poisoned")
}
