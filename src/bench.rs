//! Benchmark and end-to-end validation against a live server.
//!
//! Both routines drive the public `Connection` API only. The benchmark
//! measures ingestion throughput, search latency and database switching;
//! the validation suite checks search, CRUD, isolation and persistence
//! behavior and records pass/fail per check.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{error, info};

use crate::connection::Connection;
use crate::error::ClientError;
use crate::models::Endpoint;

/// How often ingestion progress is logged.
const PROGRESS_EVERY: usize = 10_000;

/// Number of database switches timed in the context switching phase.
const SWITCH_ROUNDS: u32 = 100;

/// Benchmark parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BenchConfig {
    pub database: String,
    pub dimension: u32,
    pub vectors: usize,
    pub queries: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            database: "bench_final_100k".to_string(),
            dimension: 64,
            vectors: 50_000,
            queries: 2_000,
        }
    }
}

impl BenchConfig {
    /// Apply `REDBOX_BENCH_*` overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup("REDBOX_BENCH_DB") {
            self.database = db;
        }
        if let Some(dim) = lookup("REDBOX_BENCH_DIM") {
            self.dimension = dim
                .parse()
                .with_context(|| format!("Invalid REDBOX_BENCH_DIM value: {}", dim))?;
        }
        if let Some(n) = lookup("REDBOX_BENCH_VECTORS") {
            self.vectors = n
                .parse()
                .with_context(|| format!("Invalid REDBOX_BENCH_VECTORS value: {}", n))?;
        }
        if let Some(n) = lookup("REDBOX_BENCH_QUERIES") {
            self.queries = n
                .parse()
                .with_context(|| format!("Invalid REDBOX_BENCH_QUERIES value: {}", n))?;
        }
        Ok(())
    }
}

/// Latency summary in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyStats {
    pub samples: usize,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl LatencyStats {
    /// Summarize millisecond samples. Returns `None` for an empty set.
    pub fn from_samples(mut samples: Vec<f64>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_by(|a, b| a.total_cmp(b));

        let len = samples.len();
        let percentile = |p: f64| samples[((len as f64 * p) as usize).min(len - 1)];

        Some(Self {
            samples: len,
            mean_ms: samples.iter().sum::<f64>() / len as f64,
            p50_ms: percentile(0.50),
            p95_ms: percentile(0.95),
            p99_ms: percentile(0.99),
        })
    }
}

/// Ingestion phase result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestStats {
    pub vectors: usize,
    pub total_secs: f64,
    pub vectors_per_sec: f64,
}

/// Full benchmark result.
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub started_at: DateTime<Utc>,
    pub endpoint: String,
    pub config: BenchConfig,
    pub ingest: IngestStats,
    pub search: Option<LatencyStats>,
    pub context_switch_avg_ms: f64,
}

/// Generate `count` random vectors with components in `[0, 1)`.
pub fn random_vectors(count: usize, dimension: u32) -> Vec<Vec<f32>> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| (0..dimension).map(|_| rng.random::<f32>()).collect())
        .collect()
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// Run the three benchmark phases against `endpoint`.
pub async fn run_benchmark(endpoint: &Endpoint, config: &BenchConfig) -> Result<BenchReport> {
    let started_at = Utc::now();

    info!(
        vectors = config.vectors,
        dimension = config.dimension,
        "generating synthetic vectors"
    );
    let data = random_vectors(config.vectors, config.dimension);

    let mut conn = Connection::open(endpoint.clone(), &config.database, config.dimension)
        .await
        .with_context(|| format!("Failed to open benchmark database at {}", endpoint))?;

    // Phase 1: ingestion through plain insert, full protocol overhead per vector
    info!(vectors = data.len(), "phase 1: ingestion throughput");
    let start = Instant::now();
    for (i, vector) in data.iter().enumerate() {
        let id = u32::try_from(i).context("Vector index exceeds u32 id space")?;
        conn.insert(id, vector).await?;
        if (i + 1) % PROGRESS_EVERY == 0 {
            info!(inserted = i + 1, "ingestion progress");
        }
    }
    let total = start.elapsed().as_secs_f64();
    let ingest = IngestStats {
        vectors: data.len(),
        total_secs: total,
        vectors_per_sec: if total > 0.0 {
            data.len() as f64 / total
        } else {
            0.0
        },
    };

    // Phase 2: probe with stored vectors so every search has an exact hit
    let probes = config.queries.min(data.len());
    info!(probes, "phase 2: search latency");
    let indices = rand::seq::index::sample(&mut rand::rng(), data.len(), probes);
    let mut latencies = Vec::with_capacity(probes);
    for index in indices.iter() {
        let t0 = Instant::now();
        conn.search(&data[index]).await?;
        latencies.push(millis(t0.elapsed()));
    }
    let search = LatencyStats::from_samples(latencies);

    // Phase 3: alternate between two databases over the same socket
    info!(rounds = SWITCH_ROUNDS, "phase 3: context switching");
    let start = Instant::now();
    for round in 0..SWITCH_ROUNDS {
        let target = if round % 2 == 0 { "bench_A" } else { "bench_B" };
        conn.select_database(target, config.dimension).await?;
    }
    let context_switch_avg_ms = millis(start.elapsed()) / SWITCH_ROUNDS as f64;

    conn.close().await;

    Ok(BenchReport {
        started_at,
        endpoint: endpoint.to_string(),
        config: config.clone(),
        ingest,
        search,
        context_switch_avg_ms,
    })
}

/// Outcome of a single validation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

/// Pass/fail tally for the validation suite.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub passed: usize,
    pub failed: usize,
    pub checks: Vec<CheckResult>,
}

impl ValidationReport {
    pub fn check(&mut self, name: &str, passed: bool, detail: impl Into<String>) {
        let detail = detail.into();
        if passed {
            self.passed += 1;
            info!(check = name, detail = %detail, "PASS");
        } else {
            self.failed += 1;
            error!(check = name, detail = %detail, "FAIL");
        }
        self.checks.push(CheckResult {
            name: name.to_string(),
            passed,
            detail,
        });
    }

    pub fn check_eq<T>(&mut self, name: &str, actual: T, expected: T)
    where
        T: PartialEq + std::fmt::Debug,
    {
        let passed = actual == expected;
        let detail = if passed {
            format!("got {:?}", actual)
        } else {
            format!("expected {:?}, got {:?}", expected, actual)
        };
        self.check(name, passed, detail);
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Run the end-to-end validation suite against `endpoint`.
///
/// Check failures are recorded in the report; transport errors abort the
/// run.
pub async fn run_validation(endpoint: &Endpoint) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();
    let (db_suffix, target): (u32, u32) = {
        let mut rng = rand::rng();
        (rng.random(), rng.random_range(1000..999_999))
    };

    // Proximity search on orthogonal unit vectors
    info!("validation: vector proximity search");
    let mut conn = Connection::open(endpoint.clone(), "verify_math", 3).await?;
    conn.insert(10, &[1.0, 0.0, 0.0]).await?;
    conn.insert(20, &[0.0, 1.0, 0.0]).await?;
    conn.insert(30, &[0.0, 0.0, 1.0]).await?;
    let near_x = conn.search(&[0.9, 0.1, 0.0]).await?;
    report.check_eq("search proximity to X axis", near_x, 10);
    let near_y = conn.search(&[0.1, 0.9, 0.0]).await?;
    report.check_eq("search proximity to Y axis", near_y, 20);
    conn.close().await;

    // CRUD lifecycle in a fresh database so stale data can't interfere
    info!("validation: CRUD lifecycle");
    let db_name = format!("verify_crud_{:08x}", db_suffix);
    let mut conn = Connection::open(endpoint.clone(), &db_name, 4).await?;

    let data = [1.0, 1.0, 1.0, 1.0];
    conn.insert(target, &data).await?;
    let found = conn.search(&data).await?;
    report.check_eq("insert and retrieve", found, target as i32);

    let updated_data = [2.0, 2.0, 2.0, 2.0];
    let updated = conn.update(target, &updated_data).await?;
    report.check("update returned success", updated, format!("id {}", target));
    let found = conn.search(&updated_data).await?;
    report.check_eq("search finds updated vector", found, target as i32);

    let deleted = conn.delete(target).await?;
    report.check("delete returned success", deleted, format!("id {}", target));
    let distractor = target + 1;
    conn.insert(distractor, &[5.0, 5.0, 5.0, 5.0]).await?;
    let found = conn.search(&updated_data).await?;
    report.check(
        "deleted id not found",
        found != target as i32,
        format!("got {}", found),
    );
    report.check_eq("search falls back to distractor", found, distractor as i32);

    let auto_vector = [-3.0, -3.0, -3.0, -3.0];
    let assigned = conn.insert_auto(&auto_vector).await?;
    let found = conn.search(&auto_vector).await?;
    report.check_eq("auto insert is searchable", i64::from(found), assigned as i64);

    let ranked = conn.search_n(&[0.0, 0.0, 0.0, 0.0], 10).await?;
    report.check(
        "search_n respects requested count",
        ranked.len() <= 10,
        format!("got {} ids", ranked.len()),
    );
    conn.close().await;

    // Isolation between databases of different dimension
    info!("validation: multi-tenant isolation");
    let mut small = Connection::open(endpoint.clone(), "verify_iso_tiny", 2).await?;
    small.insert(1, &[1.0, 1.0]).await?;
    small.close().await;

    let mut large = Connection::open(endpoint.clone(), "verify_iso_huge", 10).await?;
    match large.search(&[1.0, 1.0]).await {
        Err(ClientError::DimensionMismatch { expected, actual }) => report.check(
            "dimension mismatch blocked",
            true,
            format!("expected {}, actual {}", expected, actual),
        ),
        other => report.check("dimension mismatch blocked", false, format!("{:?}", other)),
    }
    let updated = large.update(99_999, &[0.0; 10]).await?;
    report.check(
        "strict update on missing id returns false",
        !updated,
        format!("got {}", updated),
    );
    large.close().await;

    // Persistence across reconnect
    info!("validation: persistence across reconnect");
    let persist_id = 777;
    let persist_vec = [0.5, 0.5, 0.5];
    let mut conn = Connection::open(endpoint.clone(), "verify_persist", 3).await?;
    conn.insert(persist_id, &persist_vec).await?;
    conn.close().await;

    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut conn = Connection::open(endpoint.clone(), "verify_persist", 3).await?;
    let found = conn.search(&persist_vec).await?;
    report.check_eq("data survived reconnection", found, persist_id as i32);
    conn.close().await;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_latency_stats_percentiles() {
        let samples: Vec<f64> = (1..=100u32).rev().map(f64::from).collect();
        let stats = LatencyStats::from_samples(samples).unwrap();

        assert_eq!(stats.samples, 100);
        assert_eq!(stats.mean_ms, 50.5);
        assert_eq!(stats.p50_ms, 51.0);
        assert_eq!(stats.p95_ms, 96.0);
        assert_eq!(stats.p99_ms, 100.0);
    }

    #[test]
    fn test_latency_stats_single_and_empty() {
        assert!(LatencyStats::from_samples(Vec::new()).is_none());

        let stats = LatencyStats::from_samples(vec![2.5]).unwrap();
        assert_eq!(stats.p50_ms, 2.5);
        assert_eq!(stats.p99_ms, 2.5);
    }

    #[test]
    fn test_random_vectors_shape() {
        let vectors = random_vectors(5, 7);
        assert_eq!(vectors.len(), 5);
        assert!(vectors.iter().all(|v| v.len() == 7));
        assert!(vectors
            .iter()
            .flatten()
            .all(|x| (0.0..1.0).contains(x)));
    }

    #[test]
    fn test_bench_config_env() {
        let mut config = BenchConfig::default();
        config
            .apply_env(|key| match key {
                "REDBOX_BENCH_VECTORS" => Some("100".to_string()),
                "REDBOX_BENCH_DIM" => Some("8".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.vectors, 100);
        assert_eq!(config.dimension, 8);
        assert_eq!(config.queries, 2_000);

        assert!(config
            .apply_env(|key| (key == "REDBOX_BENCH_QUERIES").then(|| "many".to_string()))
            .is_err());
    }

    #[test]
    fn test_validation_report_tally() {
        let mut report = ValidationReport::default();
        report.check_eq("equal", 1, 1);
        report.check_eq("not equal", 1, 2);
        report.check("flag", true, "ok");

        assert_eq!(report.passed, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.is_success());
        assert_eq!(report.checks[1].detail, "expected 2, got 1");
    }
}
