// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

use std::time::Duration;

use crate::account_queue::SequencerConfig;
use crate::poller::PollOptions;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_METRICS_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Knobs for one relay instance. Built once (usually from the environment) and passed in;
/// nothing here is read from global state afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    pub poll_interval: Duration,
    /// `None` waits for a turn indefinitely.
    pub turn_timeout: Option<Duration>,
    pub confirm_timeout: Option<Duration>,
    pub metrics_enabled: bool,
    pub metrics_log_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            turn_timeout: None,
            confirm_timeout: Some(DEFAULT_CONFIRM_TIMEOUT),
            metrics_enabled: false,
            metrics_log_interval: DEFAULT_METRICS_LOG_INTERVAL,
        }
    }
}

impl RelayConfig {
    /// Reads `RELAY_*` variables; unset or unparsable values fall back to the defaults.
    /// A timeout of `0` means unbounded.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: Duration::from_millis(
                lookup_u64(
                    &lookup,
                    "RELAY_POLL_INTERVAL_MS",
                    defaults.poll_interval.as_millis() as u64,
                )
                .max(1),
            ),
            turn_timeout: optional_timeout(lookup_u64(&lookup, "RELAY_TURN_TIMEOUT_MS", 0)),
            confirm_timeout: optional_timeout(lookup_u64(
                &lookup,
                "RELAY_CONFIRM_TIMEOUT_MS",
                DEFAULT_CONFIRM_TIMEOUT.as_millis() as u64,
            )),
            metrics_enabled: lookup_bool(
                &lookup,
                "RELAY_METRICS_ENABLED",
                defaults.metrics_enabled,
            ),
            metrics_log_interval: Duration::from_millis(
                lookup_u64(
                    &lookup,
                    "RELAY_METRICS_LOG_INTERVAL_MS",
                    defaults.metrics_log_interval.as_millis() as u64,
                )
                .max(1),
            ),
        }
    }

    pub fn sequencer_config(&self) -> SequencerConfig {
        SequencerConfig {
            metrics_enabled: self.metrics_enabled,
            metrics_log_interval: self.metrics_log_interval,
        }
    }

    pub fn turn_poll_options(&self, label: impl Into<String>) -> PollOptions {
        PollOptions::new(label, self.poll_interval).with_optional_timeout(self.turn_timeout)
    }

    pub fn confirm_poll_options(&self, label: impl Into<String>) -> PollOptions {
        PollOptions::new(label, self.poll_interval).with_optional_timeout(self.confirm_timeout)
    }
}

fn optional_timeout(millis: u64) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(millis))
}

fn lookup_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn lookup_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).as_deref().map(str::trim) {
        Some("1" | "true" | "TRUE" | "yes") => true,
        Some("0" | "false" | "FALSE" | "no") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_CONFIRM_TIMEOUT, RelayConfig};
    use std::collections::HashMap;
    use std::time::Duration;

    fn config_from(pairs: &[(&str, &str)]) -> RelayConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        RelayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        assert_eq!(config_from(&[]), RelayConfig::default());
        assert_eq!(
            RelayConfig::default().confirm_timeout,
            Some(DEFAULT_CONFIRM_TIMEOUT)
        );
    }

    #[test]
    fn zero_timeouts_mean_unbounded() {
        let config = config_from(&[
            ("RELAY_TURN_TIMEOUT_MS", "0"),
            ("RELAY_CONFIRM_TIMEOUT_MS", "0"),
        ]);
        assert_eq!(config.turn_timeout, None);
        assert_eq!(config.confirm_timeout, None);
        assert_eq!(config.confirm_poll_options("confirm").timeout, None);
    }

    #[test]
    fn values_are_parsed_and_clamped() {
        let config = config_from(&[
            ("RELAY_POLL_INTERVAL_MS", "0"),
            ("RELAY_TURN_TIMEOUT_MS", "1500"),
            ("RELAY_METRICS_ENABLED", "true"),
            ("RELAY_METRICS_LOG_INTERVAL_MS", "not-a-number"),
        ]);
        assert_eq!(config.poll_interval, Duration::from_millis(1));
        assert_eq!(config.turn_timeout, Some(Duration::from_millis(1500)));
        assert!(config.metrics_enabled);
        assert_eq!(config.metrics_log_interval, Duration::from_secs(5));

        let options = config.turn_poll_options("turn:0xabc");
        assert_eq!(options.label, "turn:0xabc");
        assert_eq!(options.interval, Duration::from_millis(1));
        assert_eq!(options.timeout, Some(Duration::from_millis(1500)));
    }
}
