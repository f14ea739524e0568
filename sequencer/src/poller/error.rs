// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("{label}: condition not met after {attempts} attempts in {elapsed:?}")]
    TimeoutExceeded {
        label: String,
        attempts: u64,
        // Attempts whose probe itself failed, as opposed to answering "not yet".
        failed_attempts: u64,
        elapsed: Duration,
        last_error: Option<String>,
    },
    #[error("{label}: polling stopped after {attempts} attempts")]
    Cancelled { label: String, attempts: u64 },
}

impl PollError {
    pub fn label(&self) -> &str {
        match self {
            Self::TimeoutExceeded { label, .. } | Self::Cancelled { label, .. } => label,
        }
    }

    pub fn attempts(&self) -> u64 {
        match self {
            Self::TimeoutExceeded { attempts, .. } | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimeoutExceeded { .. })
    }
}
