// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

//! Retry-until-condition loop for eventually-consistent external state.

mod error;
mod options;
mod poll;

pub use error::PollError;
pub use options::{PollOptions, PollStop};
pub use poll::poll;
