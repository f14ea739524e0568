// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SequencerMetricsSnapshot {
    pub enqueued: u64,
    pub granted: u64,
    pub locked: u64,
    pub settled: u64,
    pub retired: u64,
    pub probe_errors: u64,
    pub turn_wait: Duration,
    pub max_turn_wait: Duration,
}

impl SequencerMetricsSnapshot {
    fn log_window(&self, elapsed: Duration, final_window: bool) {
        let mean_turn_wait_ms = if self.granted > 0 {
            self.turn_wait.as_secs_f64() * 1000.0 / self.granted as f64
        } else {
            0.0
        };
        info!(
            final_window,
            window_ms = elapsed.as_millis() as u64,
            enqueued = self.enqueued,
            granted = self.granted,
            locked = self.locked,
            settled = self.settled,
            retired = self.retired,
            probe_errors = self.probe_errors,
            mean_turn_wait_ms = mean_turn_wait_ms,
            max_turn_wait_ms = self.max_turn_wait.as_millis() as u64,
            "sequencer metrics"
        );
    }
}

#[derive(Debug)]
struct MetricsState {
    window_started_at: Instant,
    window: SequencerMetricsSnapshot,
    totals: SequencerMetricsSnapshot,
}

/// Counters shared by every caller of one sequencer. Disabled metrics cost one branch.
#[derive(Debug)]
pub(super) struct SequencerMetrics {
    enabled: bool,
    log_interval: Duration,
    state: Mutex<MetricsState>,
}

impl SequencerMetrics {
    pub(super) fn new(enabled: bool, log_interval: Duration) -> Self {
        Self {
            enabled,
            log_interval,
            state: Mutex::new(MetricsState {
                window_started_at: Instant::now(),
                window: SequencerMetricsSnapshot::default(),
                totals: SequencerMetricsSnapshot::default(),
            }),
        }
    }

    pub(super) fn on_enqueue(&self) {
        self.record(|counters| counters.enqueued = counters.enqueued.saturating_add(1));
    }

    pub(super) fn on_turn_granted(&self, waited: Duration) {
        self.record(|counters| {
            counters.granted = counters.granted.saturating_add(1);
            counters.turn_wait = counters.turn_wait.saturating_add(waited);
            counters.max_turn_wait = counters.max_turn_wait.max(waited);
        });
    }

    pub(super) fn on_lock(&self) {
        self.record(|counters| counters.locked = counters.locked.saturating_add(1));
    }

    pub(super) fn on_settled(&self) {
        self.record(|counters| counters.settled = counters.settled.saturating_add(1));
    }

    pub(super) fn on_retire(&self) {
        self.record(|counters| counters.retired = counters.retired.saturating_add(1));
    }

    pub(super) fn on_probe_error(&self) {
        self.record(|counters| counters.probe_errors = counters.probe_errors.saturating_add(1));
    }

    pub(super) fn snapshot(&self) -> SequencerMetricsSnapshot {
        if !self.enabled {
            return SequencerMetricsSnapshot::default();
        }
        self.lock_state().totals
    }

    pub(super) fn log_final(&self) {
        if !self.enabled {
            return;
        }
        let state = self.lock_state();
        let elapsed = state.window_started_at.elapsed();
        if state.window == SequencerMetricsSnapshot::default() {
            return;
        }
        state.window.log_window(elapsed, true);
    }

    fn record(&self, update: impl Fn(&mut SequencerMetricsSnapshot)) {
        if !self.enabled {
            return;
        }
        let mut state = self.lock_state();
        update(&mut state.window);
        update(&mut state.totals);

        let elapsed = state.window_started_at.elapsed();
        if elapsed < self.log_interval {
            return;
        }
        state.window.log_window(elapsed, false);
        state.window = SequencerMetricsSnapshot::default();
        state.window_started_at = Instant::now();
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, MetricsState> {
        self.state
            .lock()
            .expect("sequencer metrics mutex poisoned")
    }
}
