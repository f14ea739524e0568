// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use relay_core::{
    AccountKey, Ledger, LedgerError, LedgerProbe, SequenceNumber, SubmissionHandle,
    SubmissionStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Apply,
    Reject,
}

#[derive(Debug, Default)]
struct AccountState {
    next_expected: SequenceNumber,
    outstanding: Option<(SubmissionHandle, u32)>,
    accepted: Vec<SequenceNumber>,
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<AccountKey, AccountState>,
    out_of_order: u64,
    overlapping: u64,
    probes: u64,
}

/// Ledger that only accepts the exact next sequence per account and reports an accepted
/// operation as finished after `probes_until_finished` status checks.
#[derive(Debug, Default)]
pub struct StrictLedger {
    probes_until_finished: u32,
    state: Mutex<LedgerState>,
    banned: Mutex<Vec<AccountKey>>,
}

impl StrictLedger {
    pub fn new(probes_until_finished: u32) -> Self {
        Self {
            probes_until_finished,
            ..Self::default()
        }
    }

    pub fn ban(&self, key: AccountKey) {
        self.banned.lock().expect("banned accounts").push(key);
    }

    pub fn accepted(&self, key: AccountKey) -> Vec<SequenceNumber> {
        self.lock_state()
            .accounts
            .get(&key)
            .map(|account| account.accepted.clone())
            .unwrap_or_default()
    }

    pub fn out_of_order(&self) -> u64 {
        self.lock_state().out_of_order
    }

    pub fn overlapping(&self) -> u64 {
        self.lock_state().overlapping
    }

    pub fn probes(&self) -> u64 {
        self.lock_state().probes
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().expect("ledger state")
    }
}

pub fn handle_for(key: AccountKey, sequence: SequenceNumber) -> SubmissionHandle {
    let mut bytes = [0_u8; 32];
    bytes[..20].copy_from_slice(key.as_slice());
    bytes[24..].copy_from_slice(&sequence.to_be_bytes());
    B256::from(bytes)
}

pub fn account(seed: u8) -> Address {
    Address::repeat_byte(seed)
}

#[async_trait]
impl LedgerProbe for StrictLedger {
    async fn check_outstanding_submission(
        &self,
        key: AccountKey,
        handle: SubmissionHandle,
    ) -> Result<SubmissionStatus, LedgerError> {
        let mut state = self.lock_state();
        state.probes += 1;
        let Some(account) = state.accounts.get_mut(&key) else {
            // Nothing outstanding for an account the ledger never saw.
            return Ok(SubmissionStatus::Finished);
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
impl Ledger for StrictLedger {
    type Payload = Op;

    async fn submit(
        &self,
        key: AccountKey,
        sequence: SequenceNumber,
        payload: Op,
    ) -> Result<SubmissionHandle, LedgerError> {
        if payload == Op::Reject {
            return Err(LedgerError::rejected("payload refused"));
        }

        let probes_until_finished = self.probes_until_finished;
        let mut state = self.lock_state();
        let account = state.accounts.entry(key).or_default();
        let overlapping = account.outstanding.is_some();
        let expected = account.next_expected;
        if sequence != expected {
            state.out_of_order += 1;
            return Err(LedgerError::rejected(format!(
                "expected sequence {expected}, got {sequence}"
            )));
        }

        let handle = handle_for(key, sequence);
        account.next_expected += 1;
        account.accepted.push(sequence);
        account.outstanding = Some((handle, probes_until_finished));
        if overlapping {
            state.overlapping += 1;
        }
        Ok(handle)
    }

    async fn verify_account(&self, key: AccountKey) -> Result<(), LedgerError> {
        if self.banned.lock().expect("banned accounts").contains(&key) {
            return Err(LedgerError::rejected("unknown identity"));
        }
        Ok(())
    }
}
