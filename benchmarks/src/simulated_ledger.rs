// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

//! In-memory ledger with the properties the relay has to respect: one gapless sequence per
//! account, and confirmation that only shows up after a few status checks.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use alloy_primitives::keccak256;
use async_trait::async_trait;
use relay_core::{
    AccountKey, Ledger, LedgerError, LedgerProbe, SequenceNumber, SubmissionHandle,
    SubmissionStatus,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct SimulatedLedgerConfig {
    /// Status checks answered with `Pending` before an accepted operation finishes.
    pub confirm_after_probes: u32,
    /// Refuse every n-th submission before it reaches the ledger state.
    pub reject_every: Option<u64>,
    pub submit_latency: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerCounters {
    pub submissions: u64,
    pub accepted: u64,
    pub refused: u64,
    pub sequence_violations: u64,
    pub overlapping_submissions: u64,
    pub probes: u64,
}

#[derive(Debug, Default)]
struct SimAccount {
    next_expected: SequenceNumber,
    outstanding: Option<(SubmissionHandle, u32)>,
}

#[derive(Debug, Default)]
struct SimState {
    accounts: HashMap<AccountKey, SimAccount>,
    counters: LedgerCounters,
}

#[derive(Debug)]
pub struct SimulatedLedger {
    config: SimulatedLedgerConfig,
    state: Mutex<SimState>,
}

impl SimulatedLedger {
    pub fn new(config: SimulatedLedgerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SimState::default()),
        }
    }

    pub fn counters(&self) -> LedgerCounters {
        self.lock_state().counters
    }

    pub fn next_expected(&self, key: AccountKey) -> SequenceNumber {
        self.lock_state()
            .accounts
            .get(&key)
            .map_or(0, |account| account.next_expected)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().expect("simulated ledger mutex poisoned")
    }
}

pub fn submission_handle(key: AccountKey, sequence: SequenceNumber) -> SubmissionHandle {
    let mut preimage = Vec::with_capacity(28);
    preimage.extend_from_slice(key.as_slice());
    preimage.extend_from_slice(&sequence.to_be_bytes());
    keccak256(preimage)
}

#[async_trait]
impl LedgerProbe for SimulatedLedger {
    async fn check_outstanding_submission(
        &self,
        key: AccountKey,
        handle: SubmissionHandle,
    ) -> Result<SubmissionStatus, LedgerError> {
        let mut state = self.lock_state();
        state.counters.probes = state.counters.probes.saturating_add(1);
        let Some(account) = state.accounts.get_mut(&key) else {
            return Err(LedgerError::unavailable(format!("account {key} not indexed yet")));
        };

        match account.outstanding {
            Some((outstanding, 0)) if outstanding == handle => {
                account.outstanding = None;
                Ok(SubmissionStatus::Finished)
            }
            Some((outstanding, remaining)) if outstanding == handle => {
                account.outstanding = Some((outstanding, remaining - 1));
                Ok(SubmissionStatus::Pending)
            }
            _ => Ok(SubmissionStatus::Finished),
        }
    }

    async fn current_sequence_hint(
        &self,
        key: AccountKey,
    ) -> Result<Option<SequenceNumber>, LedgerError> {
        Ok(self
            .lock_state()
            .accounts
            .get(&key)
            .map(|account| account.next_expected))
    }
}

#[async_trait]
impl Ledger for SimulatedLedger {
    type Payload = Vec<u8>;

    async fn submit(
        &self,
        key: AccountKey,
        sequence: SequenceNumber,
        _payload: Vec<u8>,
    ) -> Result<SubmissionHandle, LedgerError> {
        if !self.config.submit_latency.is_zero() {
            tokio::time::sleep(self.config.submit_latency).await;
        }

        let confirm_after_probes = self.config.confirm_after_probes;
        let reject_every = self.config.reject_every;
        let mut state = self.lock_state();
        state.counters.submissions = state.counters.submissions.saturating_add(1);
        let submissions = state.counters.submissions;

        if reject_every.is_some_and(|every| every > 0 && submissions % every == 0) {
            state.counters.refused = state.counters.refused.saturating_add(1);
            return Err(LedgerError::rejected("simulated refusal"));
        }

        let account = state.accounts.entry(key).or_default();
        let overlapping = account.outstanding.is_some();
        let expected = account.next_expected;
        if sequence != expected {
            state.counters.sequence_violations =
                state.counters.sequence_violations.saturating_add(1);
            return Err(LedgerError::rejected(format!(
                "expected sequence {expected}, got {sequence}"
            )));
        }

        let handle = submission_handle(key, sequence);
        account.next_expected = expected.saturating_add(1);
        account.outstanding = Some((handle, confirm_after_probes));
        state.counters.accepted = state.counters.accepted.saturating_add(1);
        if overlapping {
            state.counters.overlapping_submissions =
                state.counters.overlapping_submissions.saturating_add(1);
        }
        Ok(handle)
    }
}
