// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

use std::collections::VecDeque;

use relay_core::{AccountKey, SequenceNumber, TicketId};

use super::{InFlight, QueueError, TurnState};

/// Line and lock for one account. Every method is synchronous; callers hold the account's
/// mutex for the whole read-then-mutate step and never across an `.await`.
#[derive(Debug)]
pub(super) struct KeyQueue {
    key: AccountKey,
    waiting: VecDeque<TicketId>,
    in_flight: Option<InFlight>,
    // Survives unlock so a later ticket never reuses a sequence already handed out.
    last_sequence: Option<SequenceNumber>,
}

impl KeyQueue {
    pub(super) fn new(key: AccountKey) -> Self {
        Self {
            key,
            waiting: VecDeque::new(),
            in_flight: None,
            last_sequence: None,
        }
    }

    pub(super) fn push(&mut self, ticket: TicketId) {
        debug_assert!(
            !self.waiting.contains(&ticket),
            "ticket {ticket} enqueued twice on {}",
            self.key
        );
        self.waiting.push_back(ticket);
    }

    pub(super) fn head(&self) -> Option<TicketId> {
        self.waiting.front().copied()
    }

    pub(super) fn in_flight(&self) -> Option<InFlight> {
        self.in_flight
    }

    pub(super) fn last_sequence(&self) -> Option<SequenceNumber> {
        self.last_sequence
    }

    pub(super) fn waiting(&self) -> Vec<TicketId> {
        self.waiting.iter().copied().collect()
    }

    pub(super) fn turn_of(&self, ticket: TicketId) -> TurnState {
        match self.waiting.iter().position(|id| *id == ticket) {
            None => TurnState::Retired,
            Some(0) if self.in_flight.is_none() => TurnState::Granted,
            Some(ahead) => TurnState::Waiting { ahead },
        }
    }

    /// Records the head ticket's submission. Refused without side effects when the caller
    /// does not hold the turn or the sequence does not move forward.
    pub(super) fn set_in_flight(&mut self, next: InFlight) -> Result<(), QueueError> {
        if let Some(current) = self.in_flight {
            return Err(QueueError::AlreadyLocked {
                key: self.key,
                holder: current.ticket,
            });
        }
        if self.head() != Some(next.ticket) {
            return Err(QueueError::NotHead {
                key: self.key,
                ticket: next.ticket,
                head: self.head(),
            });
        }
        if let Some(previous) = self.last_sequence {
            if next.sequence <= previous {
                return Err(QueueError::SequenceRegressed {
                    key: self.key,
                    previous,
                    requested: next.sequence,
                });
            }
        }

        self.in_flight = Some(next);
        self.last_sequence = Some(next.sequence);
        Ok(())
    }

    /// Unlocks and drops the ticket behind `observed`, but only if that exact submission
    /// still holds the lock. A caller that lost the race to another prober is a no-op.
    pub(super) fn settle(&mut self, observed: InFlight) -> bool {
        if self.in_flight != Some(observed) {
            return false;
        }
        self.in_flight = None;
        self.remove_waiting(observed.ticket);
        true
    }

    pub(super) fn clear_in_flight(&mut self, ticket: TicketId) -> bool {
        match self.in_flight {
            Some(current) if current.ticket == ticket => {
                self.in_flight = None;
                true
            }
            _ => false,
        }
    }

    /// Drops `ticket` from the line wherever it sits, releasing its lock if it holds one.
    pub(super) fn remove(&mut self, ticket: TicketId) -> bool {
        let unlocked = self.clear_in_flight(ticket);
        self.remove_waiting(ticket) || unlocked
    }

    fn remove_waiting(&mut self, ticket: TicketId) -> bool {
        match self.waiting.iter().position(|id| *id == ticket) {
            Some(index) => {
                self.waiting.remove(index);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::KeyQueue;
    use crate::account_queue::{InFlight, QueueError, TurnState};
    use alloy_primitives::{Address, B256};
    use relay_core::TicketId;

    fn queue_with(tickets: &[u64]) -> KeyQueue {
        let mut queue = KeyQueue::new(Address::repeat_byte(0x58));
        for ticket in tickets {
            queue.push(TicketId::new(*ticket));
        }
        queue
    }

    fn in_flight(ticket: u64, sequence: u64) -> InFlight {
        InFlight {
            ticket: TicketId::new(ticket),
            sequence,
            handle: B256::repeat_byte(ticket as u8),
        }
    }

    #[test]
    fn only_unlocked_head_is_granted() {
        let mut queue = queue_with(&[1, 2, 3]);
        assert_eq!(queue.turn_of(TicketId::new(1)), TurnState::Granted);
        assert_eq!(
            queue.turn_of(TicketId::new(3)),
            TurnState::Waiting { ahead: 2 }
        );

        queue.set_in_flight(in_flight(1, 10)).expect("head may lock");
        assert_eq!(
            queue.turn_of(TicketId::new(1)),
            TurnState::Waiting { ahead: 0 }
        );
        assert_eq!(
            queue.turn_of(TicketId::new(2)),
            TurnState::Waiting { ahead: 1 }
        );
        assert_eq!(queue.turn_of(TicketId::new(9)), TurnState::Retired);
    }

    #[test]
    fn lock_refuses_non_head_and_second_lock() {
        let mut queue = queue_with(&[1, 2]);

        let err = queue.set_in_flight(in_flight(2, 0)).unwrap_err();
        assert!(matches!(
            err,
            QueueError::NotHead { head: Some(head), .. } if head == TicketId::new(1)
        ));

        queue.set_in_flight(in_flight(1, 0)).expect("head may lock");
        let err = queue.set_in_flight(in_flight(1, 1)).unwrap_err();
        assert!(matches!(
            err,
            QueueError::AlreadyLocked { holder, .. } if holder == TicketId::new(1)
        ));
        assert_eq!(queue.in_flight(), Some(in_flight(1, 0)));
    }

    #[test]
    fn lock_refuses_sequence_that_does_not_advance() {
        let mut queue = queue_with(&[1, 2]);
        queue.set_in_flight(in_flight(1, 10)).expect("first lock");
        assert!(queue.settle(in_flight(1, 10)));

        let err = queue.set_in_flight(in_flight(2, 10)).unwrap_err();
        assert_eq!(
            err,
            QueueError::SequenceRegressed {
                key: Address::repeat_byte(0x58),
                previous: 10,
                requested: 10,
            }
        );
        queue.set_in_flight(in_flight(2, 11)).expect("next sequence");
        assert_eq!(queue.last_sequence(), Some(11));
    }

    #[test]
    fn settle_is_compare_and_clear() {
        let mut queue = queue_with(&[1, 2]);
        queue.set_in_flight(in_flight(1, 4)).expect("lock");

        assert!(!queue.settle(in_flight(1, 5)), "stale observation must not settle");
        assert!(queue.settle(in_flight(1, 4)));
        assert!(!queue.settle(in_flight(1, 4)), "second settle is a no-op");
        assert_eq!(queue.waiting(), vec![TicketId::new(2)]);
        assert_eq!(queue.turn_of(TicketId::new(2)), TurnState::Granted);
    }

    #[test]
    fn remove_is_idempotent_and_releases_own_lock() {
        let mut queue = queue_with(&[1, 2, 3]);
        queue.set_in_flight(in_flight(1, 0)).expect("lock");

        assert!(queue.remove(TicketId::new(2)));
        assert!(!queue.remove(TicketId::new(2)));
        assert_eq!(queue.in_flight(), Some(in_flight(1, 0)));

        assert!(queue.remove(TicketId::new(1)));
        assert_eq!(queue.in_flight(), None);
        assert_eq!(queue.head(), Some(TicketId::new(3)));
        assert_eq!(queue.last_sequence(), Some(0));
    }

    #[test]
    fn clear_in_flight_ignores_other_tickets() {
        let mut queue = queue_with(&[1]);
        queue.set_in_flight(in_flight(1, 0)).expect("lock");
        assert!(!queue.clear_in_flight(TicketId::new(2)));
        assert!(queue.clear_in_flight(TicketId::new(1)));
        assert!(!queue.clear_in_flight(TicketId::new(1)));
        assert_eq!(queue.turn_of(TicketId::new(1)), TurnState::Granted);
    }
}
