// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Per-call-site polling knobs. There is no process-wide default; each wait names its own.
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// `None` polls until the condition holds, however long that takes.
    pub timeout: Option<Duration>,
    pub label: String,
    pub stop: Option<PollStop>,
}

impl PollOptions {
    pub fn new(label: impl Into<String>, interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
            label: label.into(),
            stop: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_optional_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_stop(mut self, stop: PollStop) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub(super) fn is_stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(PollStop::is_stop_requested)
    }
}

/// Cooperative stop flag shared between a poll loop and whoever owns its lifetime.
///
/// The loop observes it at its next suspension point; an attempt already running is left
/// to finish.
#[derive(Debug, Clone, Default)]
pub struct PollStop {
    stopped: Arc<AtomicBool>,
}

impl PollStop {
    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}
