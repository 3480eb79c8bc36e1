//! redbox-bench - benchmark and validation runner for RedBoxDb.
//!
//! ```text
//! redbox-bench [bench|validate] [--json]
//! ```
//!
//! The server endpoint comes from `ClientConfig::load()` (config file and
//! `REDBOX_*` environment variables). Benchmark sizes come from the
//! `REDBOX_BENCH_*` variables.

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use redbox_client::bench::{self, BenchConfig, BenchReport, ValidationReport};
use redbox_client::ClientConfig;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "redbox_client=info,redbox_bench=info";

/// Which routine to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Bench,
    Validate,
}

struct Args {
    mode: Mode,
    json: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        mode: Mode::Bench,
        json: false,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "bench" => args.mode = Mode::Bench,
            "validate" => args.mode = Mode::Validate,
            "--json" => args.json = true,
            other => bail!("Unknown argument: {} (usage: redbox-bench [bench|validate] [--json])", other),
        }
    }
    Ok(args)
}

fn print_metric(label: &str, value: String, unit: &str) {
    println!("   • {:<15}: {} {}", label, value, unit);
}

fn print_bench(report: &BenchReport) {
    println!("==================================================");
    println!("   RedBoxDb BENCHMARK @ {}", report.endpoint);
    println!(
        "   Target: {} Vectors | Dim: {}",
        report.config.vectors, report.config.dimension
    );
    println!("==================================================");

    println!("\n[PHASE 1] Ingestion Throughput");
    print_metric("Total Time", format!("{:.2}", report.ingest.total_secs), "s");
    print_metric(
        "Throughput",
        format!("{:.0}", report.ingest.vectors_per_sec),
        "vectors/sec",
    );

    println!("\n[PHASE 2] Search Latency");
    match &report.search {
        Some(stats) => {
            print_metric("Probes", stats.samples.to_string(), "");
            print_metric("Average", format!("{:.2}", stats.mean_ms), "ms");
            print_metric("Median (P50)", format!("{:.2}", stats.p50_ms), "ms");
            print_metric("P95", format!("{:.2}", stats.p95_ms), "ms");
            print_metric("P99", format!("{:.2}", stats.p99_ms), "ms");
        }
        None => println!("   (no probes run)"),
    }

    println!("\n[PHASE 3] Multi-Tenant Context Switching");
    print_metric(
        "Avg Switch",
        format!("{:.2}", report.context_switch_avg_ms),
        "ms",
    );
}

fn print_validation(report: &ValidationReport) {
    for check in &report.checks {
        let tag = if check.passed { "PASS" } else { "FAIL" };
        println!("   [{}] {} ({})", tag, check.name, check.detail);
    }
    println!("\n========================================");
    println!(
        "   TEST SUMMARY: {} Passed, {} Failed",
        report.passed, report.failed
    );
    println!("========================================");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!("Starting redbox-bench v{}", env!("CARGO_PKG_VERSION"));

    let args = parse_args()?;
    let config = ClientConfig::load().context("Failed to load client configuration")?;
    let endpoint = config.endpoint();

    match args.mode {
        Mode::Bench => {
            let mut bench_config = BenchConfig::default();
            bench_config.apply_env(|key| std::env::var(key).ok())?;

            let report = bench::run_benchmark(&endpoint, &bench_config)
                .await
                .context("Benchmark failed")?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_bench(&report);
            }
        }
        Mode::Validate => {
            let report = bench::run_validation(&endpoint)
                .await
                .context("Validation aborted")?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_validation(&report);
            }
            if !report.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
