// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

pub mod simulated_ledger;

use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::Address;
use futures_util::future::join_all;
use relay_sequencer::{OrderedRelay, RelayConfig, RelayError, SequencerMetricsSnapshot};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::info;

use crate::simulated_ledger::{LedgerCounters, SimulatedLedger, SimulatedLedgerConfig};

pub type BenchResult<T> = Result<T, Box<dyn Error + Send + Sync>>;
pub const DEFAULT_ACCOUNTS: usize = 8;
pub const DEFAULT_OPERATIONS_PER_ACCOUNT: usize = 50;
pub const DEFAULT_CONCURRENCY: usize = 64;
pub const DEFAULT_CONFIRM_AFTER_PROBES: u32 = 2;
pub const DEFAULT_BENCH_POLL_INTERVAL_MS: u64 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub count: usize,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub p999: Duration,
}

#[derive(Debug, Clone)]
pub struct ContentionConfig {
    pub accounts: usize,
    pub operations_per_account: usize,
    /// Callers allowed to be inside the relay at the same time.
    pub concurrency: usize,
    pub confirm_after_probes: u32,
    pub reject_every: Option<u64>,
    pub submit_latency: Duration,
    pub relay: RelayConfig,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self {
            accounts: DEFAULT_ACCOUNTS,
            operations_per_account: DEFAULT_OPERATIONS_PER_ACCOUNT,
            concurrency: DEFAULT_CONCURRENCY,
            confirm_after_probes: DEFAULT_CONFIRM_AFTER_PROBES,
            reject_every: None,
            submit_latency: Duration::ZERO,
            relay: RelayConfig {
                poll_interval: Duration::from_millis(DEFAULT_BENCH_POLL_INTERVAL_MS),
                ..RelayConfig::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentionReport {
    pub accounts: usize,
    pub operations: usize,
    pub concurrency: usize,
    pub accepted: u64,
    pub rejected: u64,
    pub rejection_rate: f64,
    pub rejection_breakdown: BTreeMap<String, u64>,
    pub total_wall: Duration,
    pub throughput_ops_per_s: f64,
    /// From enqueue to observed confirmation, for accepted operations only.
    pub latency: Option<Stats>,
    pub ledger: LedgerCounters,
    pub sequencer: SequencerMetricsSnapshot,
    /// Accounts whose final ledger sequence differs from the accepted count.
    pub gapped_accounts: usize,
}

impl ContentionReport {
    /// Any ordering defect the ledger or the final sequence check observed.
    pub fn violations(&self) -> u64 {
        self.ledger
            .sequence_violations
            .saturating_add(self.ledger.overlapping_submissions)
            .saturating_add(self.gapped_accounts as u64)
    }
}

struct CallerOutcome {
    key: Address,
    latency: Duration,
    result: Result<(), RelayError>,
}

pub async fn run_contention(config: &ContentionConfig) -> BenchResult<ContentionReport> {
    if config.accounts == 0 || config.operations_per_account == 0 {
        return Err(err("accounts and operations per account must be positive"));
    }

    let ledger = Arc::new(SimulatedLedger::new(SimulatedLedgerConfig {
        confirm_after_probes: config.confirm_after_probes,
        reject_every: config.reject_every,
        submit_latency: config.submit_latency,
    }));
    let relay = Arc::new(OrderedRelay::new(Arc::clone(&ledger), config.relay));
    let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let keys: Vec<Address> = (0..config.accounts).map(account_key).collect();

    let started_at = Instant::now();
    let mut handles = Vec::with_capacity(config.accounts * config.operations_per_account);
    for round in 0..config.operations_per_account {
        for key in keys.iter().copied() {
            let relay = Arc::clone(&relay);
            let permits = Arc::clone(&permits);
            let payload = (round as u64).to_be_bytes().to_vec();
            handles.push(tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| err(format!("semaphore closed: {e}")))?;
                let op_started_at = Instant::now();
                let result = relay.submit_and_confirm(key, payload).await.map(|_| ());
                Ok::<_, Box<dyn Error + Send + Sync>>(CallerOutcome {
                    key,
                    latency: op_started_at.elapsed(),
                    result,
                })
            }));
        }
    }

    let mut accepted = 0_u64;
    let mut rejected = 0_u64;
    let mut rejection_breakdown = BTreeMap::new();
    let mut latencies = Vec::with_capacity(handles.len());
    let mut accepted_per_key: BTreeMap<Address, u64> = BTreeMap::new();
    for joined in join_all(handles).await {
        let outcome = joined.map_err(|e| err(format!("caller task failed: {e}")))??;
        match outcome.result {
            Ok(()) => {
                accepted = accepted.saturating_add(1);
                latencies.push(outcome.latency);
                *accepted_per_key.entry(outcome.key).or_default() += 1;
            }
            Err(e) => {
                rejected = rejected.saturating_add(1);
                *rejection_breakdown.entry(e.code().to_string()).or_default() += 1;
            }
        }
    }
    let total_wall = started_at.elapsed();

    let gapped_accounts = keys
        .iter()
        .filter(|key| {
            let accepted = accepted_per_key.get(*key).copied().unwrap_or(0);
            ledger.next_expected(**key) != accepted
        })
        .count();
    info!(
        accepted,
        rejected,
        gapped_accounts,
        wall_ms = total_wall.as_millis() as u64,
        "contention run finished"
    );
    let latency = if latencies.is_empty() {
        None
    } else {
        Some(summarize(latencies.as_slice())?)
    };

    Ok(ContentionReport {
        accounts: config.accounts,
        operations: config.accounts * config.operations_per_account,
        concurrency: config.concurrency,
        accepted,
        rejected,
        rejection_rate: rejection_rate(accepted, rejected),
        rejection_breakdown,
        total_wall,
        throughput_ops_per_s: throughput_ops_per_s(accepted as usize, total_wall),
        latency,
        ledger: ledger.counters(),
        sequencer: relay.sequencer().metrics_snapshot(),
        gapped_accounts,
    })
}

pub fn print_contention_report(report: &ContentionReport) {
    println!("contention:");
    println!("  accounts:     {}", report.accounts);
    println!("  operations:   {}", report.operations);
    println!("  concurrency:  {}", report.concurrency);
    println!("  accepted:     {}", report.accepted);
    println!("  rejected:     {}", report.rejected);
    println!("  reject rate:  {:.2}%", report.rejection_rate);
    for (code, count) in &report.rejection_breakdown {
        println!("    {code}: {count}");
    }
    println!("  wall:         {}", format_ms(report.total_wall));
    println!("  throughput:   {:.1} ops/s", report.throughput_ops_per_s);
    println!("  probes:       {}", report.ledger.probes);
    println!("  violations:   {}", report.violations());
    if let Some(latency) = report.latency.as_ref() {
        print_stats("submit-to-confirm latency", latency);
    }
}

pub fn summarize(samples: &[Duration]) -> BenchResult<Stats> {
    if samples.is_empty() {
        return Err(err("cannot summarize empty sample set"));
    }

    let mut nanos: Vec<u128> = samples.iter().map(Duration::as_nanos).collect();
    nanos.sort_unstable();
    let sum: u128 = nanos.iter().copied().sum();
    let count = nanos.len();

    Ok(Stats {
        count,
        min: duration_from_nanos(nanos[0]),
        max: duration_from_nanos(nanos[count - 1]),
        mean: duration_from_nanos(sum / count as u128),
        p50: duration_from_nanos(percentile(&nanos, 0.50)),
        p95: duration_from_nanos(percentile(&nanos, 0.95)),
        p99: duration_from_nanos(percentile(&nanos, 0.99)),
        p999: duration_from_nanos(percentile(&nanos, 0.999)),
    })
}

pub fn print_stats(name: &str, stats: &Stats) {
    println!("{name}:");
    println!("  count: {}", stats.count);
    println!("  min:   {}", format_ms(stats.min));
    println!("  p50:   {}", format_ms(stats.p50));
    println!("  p95:   {}", format_ms(stats.p95));
    println!("  p99:   {}", format_ms(stats.p99));
    println!("  p99.9: {}", format_ms(stats.p999));
    println!("  max:   {}", format_ms(stats.max));
    println!("  mean:  {}", format_ms(stats.mean));
}

pub fn throughput_ops_per_s(accepted_count: usize, total_wall: Duration) -> f64 {
    if total_wall.is_zero() {
        0.0
    } else {
        accepted_count as f64 / total_wall.as_secs_f64()
    }
}

pub fn rejection_rate(accepted: u64, rejected: u64) -> f64 {
    let total = accepted.saturating_add(rejected);
    if total == 0 {
        0.0
    } else {
        (rejected as f64 / total as f64) * 100.0
    }
}

pub fn account_key(index: usize) -> Address {
    let mut bytes = [0_u8; 20];
    bytes[12..].copy_from_slice(&(index as u64).saturating_add(1).to_be_bytes());
    Address::from(bytes)
}

fn percentile(sorted_nanos: &[u128], p: f64) -> u128 {
    let last = sorted_nanos.len() - 1;
    let rank = (p * last as f64).ceil() as usize;
    sorted_nanos[rank.min(last)]
}

fn duration_from_nanos(value: u128) -> Duration {
    let nanos = u64::try_from(value).unwrap_or(u64::MAX);
    Duration::from_nanos(nanos)
}

fn format_ms(value: Duration) -> String {
    format!("{:.3} ms", value.as_secs_f64() * 1000.0)
}

pub fn err(message: impl Into<String>) -> Box<dyn Error + Send + Sync> {
    Box::new(std::io::Error::other(message.into()))
}
