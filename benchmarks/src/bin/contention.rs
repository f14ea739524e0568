// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

use std::fs;
use std::time::Duration;

use benchmarks::{
    BenchResult, ContentionConfig, DEFAULT_ACCOUNTS, DEFAULT_BENCH_POLL_INTERVAL_MS,
    DEFAULT_CONCURRENCY, DEFAULT_CONFIRM_AFTER_PROBES, DEFAULT_OPERATIONS_PER_ACCOUNT, err,
    print_contention_report, run_contention,
};
use clap::Parser;
use relay_sequencer::RelayConfig;
use relay_sequencer::config::DEFAULT_METRICS_LOG_INTERVAL;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "contention",
    about = "drive many callers per account through the ordered relay",
    version,
    after_help = "Examples:\n  cargo run -p benchmarks --bin contention -- --accounts 16 --ops-per-account 200 --concurrency 128\n  cargo run -p benchmarks --bin contention --release -- --reject-every 7 --submit-latency-ms 2 --json-out benchmarks/results/contention-latest.json"
)]
struct Args {
    #[arg(long, default_value_t = DEFAULT_ACCOUNTS)]
    accounts: usize,
    #[arg(long, default_value_t = DEFAULT_OPERATIONS_PER_ACCOUNT)]
    ops_per_account: usize,
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,
    #[arg(long, default_value_t = DEFAULT_CONFIRM_AFTER_PROBES)]
    confirm_after_probes: u32,
    #[arg(long)]
    reject_every: Option<u64>,
    #[arg(long, default_value_t = 0_u64)]
    submit_latency_ms: u64,
    #[arg(long, default_value_t = DEFAULT_BENCH_POLL_INTERVAL_MS)]
    poll_interval_ms: u64,
    /// 0 waits for a turn indefinitely.
    #[arg(long, default_value_t = 0_u64)]
    turn_timeout_ms: u64,
    /// 0 waits for confirmation indefinitely.
    #[arg(long, default_value_t = 60_000_u64)]
    confirm_timeout_ms: u64,
    #[arg(long, default_value_t = false)]
    metrics: bool,
    #[arg(long)]
    json_out: Option<String>,
}

fn millis_or_unbounded(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_millis(value))
}

#[tokio::main]
async fn main() -> BenchResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ContentionConfig {
        accounts: args.accounts,
        operations_per_account: args.ops_per_account,
        concurrency: args.concurrency.max(1),
        confirm_after_probes: args.confirm_after_probes,
        reject_every: args.reject_every.filter(|every| *every > 0),
        submit_latency: Duration::from_millis(args.submit_latency_ms),
        relay: RelayConfig {
            poll_interval: Duration::from_millis(args.poll_interval_ms.max(1)),
            turn_timeout: millis_or_unbounded(args.turn_timeout_ms),
            confirm_timeout: millis_or_unbounded(args.confirm_timeout_ms),
            metrics_enabled: args.metrics,
            metrics_log_interval: DEFAULT_METRICS_LOG_INTERVAL,
        },
    };

    let report = run_contention(&config).await?;
    print_contention_report(&report);

    if let Some(path) = args.json_out.as_deref() {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json)?;
        println!("wrote {path}");
    }

    let violations = report.violations();
    if violations > 0 {
        return Err(err(format!("{violations} ordering violations observed")));
    }
    Ok(())
}
