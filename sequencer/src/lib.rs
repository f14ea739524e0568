// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

//! Per-account operation sequencing for a relay whose ledger only confirms asynchronously.
//!
//! Flow: enqueue -> await turn (poller) -> submit -> lock -> settled by the next waiter.
//! Each account admits one in-flight submission at a time, in enqueue order.
pub mod account_queue;
pub mod config;
pub mod poller;
pub mod relay;

pub use account_queue::{
    InFlight, QueueError, Sequencer, SequencerConfig, SequencerMetricsSnapshot, TurnState,
};
pub use config::RelayConfig;
pub use poller::{PollError, PollOptions, PollStop, poll};
pub use relay::{OrderedRelay, RelayError, Submission};
