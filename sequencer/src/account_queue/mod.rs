// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

//! Per-account admission: a FIFO line of tickets plus a single in-flight lock per account.

mod error;
mod profiling;
mod queue;
mod sequencer;
mod types;

pub use error::QueueError;
pub use profiling::SequencerMetricsSnapshot;
pub use sequencer::{Sequencer, SequencerConfig};
pub use types::{InFlight, TurnState};
