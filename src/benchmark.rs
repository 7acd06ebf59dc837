use std::convert::Infallible;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::effect::{for_each_par, from_future, succeed, Effect};
use crate::runtime::Runtime;

pub struct BenchmarkParams {
    /// Length of the synchronous `map` chain
    pub steps: usize,
    /// Branches per concurrent group
    pub branches: usize,
    /// Simulated latency of each branch's host future
    pub latency_ms: u64,
    /// Number of concurrent groups to time
    pub rounds: usize,
}

#[derive(Debug, Serialize)]
pub struct BenchmarkReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub yield_interval: u32,
    pub steps: usize,
    pub chain_ms: f64,
    pub steps_per_sec: f64,
    pub branches: usize,
    pub latency_ms: u64,
    pub rounds: usize,
    pub group_avg_ms: f64,
    pub group_overhead_ms: f64,
}

pub async fn run_benchmark(runtime: &Runtime, params: BenchmarkParams) -> Result<BenchmarkReport> {
    validate_params(&params)?;
    let started_at = Utc::now();

    let chain_elapsed = time_chain(runtime, params.steps).await?;

    let mut group_total = Duration::ZERO;
    for _ in 0..params.rounds {
        group_total += time_group(runtime, params.branches, params.latency_ms).await?;
    }

    let chain_ms = chain_elapsed.as_secs_f64() * 1000.0;
    let group_avg_ms = group_total.as_secs_f64() * 1000.0 / params.rounds as f64;

    Ok(BenchmarkReport {
        started_at,
        finished_at: Utc::now(),
        yield_interval: runtime.config().interpreter.yield_interval,
        steps: params.steps,
        chain_ms,
        steps_per_sec: params.steps as f64 / chain_elapsed.as_secs_f64().max(f64::EPSILON),
        branches: params.branches,
        latency_ms: params.latency_ms,
        rounds: params.rounds,
        group_avg_ms,
        group_overhead_ms: (group_avg_ms - params.latency_ms as f64).max(0.0),
    })
}

fn validate_params(params: &BenchmarkParams) -> Result<()> {
    if params.steps == 0 && params.branches == 0 {
        return Err(anyhow!("Must specify --steps or --branches (or both)"));
    }

    if params.rounds == 0 {
        return Err(anyhow!("Must run at least 1 round"));
    }

    Ok(())
}

/// Left-associated chain of `steps` maps over a single value
async fn time_chain(runtime: &Runtime, steps: usize) -> Result<Duration> {
    let mut effect: Effect<(), Infallible, usize> = succeed(0);
    for _ in 0..steps {
        effect = effect.map(|n| n + 1);
    }

    let started = Instant::now();
    let total = runtime
        .execute_or_throw(effect, None)
        .await
        .map_err(|error| anyhow!("Chain run failed: {}", error))?;
    let elapsed = started.elapsed();

    if total != steps {
        return Err(anyhow!("Chain produced {} instead of {}", total, steps));
    }
    Ok(elapsed)
}

/// One concurrent group of latency-bound branches
async fn time_group(runtime: &Runtime, branches: usize, latency_ms: u64) -> Result<Duration> {
    let group = for_each_par(0..branches, move |index| {
        from_future::<(), Infallible, usize, _>(async move {
            tokio::time::sleep(Duration::from_millis(latency_ms)).await;
            Ok(index)
        })
    });

    let started = Instant::now();
    let indices = runtime
        .execute_or_throw(group, None)
        .await
        .map_err(|error| anyhow!("Group run failed: {}", error))?;
    let elapsed = started.elapsed();

    if indices.iter().copied().ne(0..branches) {
        return Err(anyhow!("Group results came back out of order"));
    }
    Ok(elapsed)
}

pub fn display_report(report: &BenchmarkReport) {
    println!("\n");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📊 Benchmark Results");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("⚙️  Yield interval: {}", report.yield_interval);
    println!();
    println!("🔗 Chain:");
    println!("   Steps: {}", report.steps);
    println!("   Duration: {:.2}ms", report.chain_ms);
    println!("   Throughput: {:.0} steps/sec", report.steps_per_sec);
    println!();
    println!("🌿 Concurrent group:");
    println!("   Branches: {} x {}ms latency", report.branches, report.latency_ms);
    println!("   Rounds: {}", report.rounds);
    println!("   Average: {:.2}ms", report.group_avg_ms);
    println!("   Overhead: {:.2}ms", report.group_overhead_ms);
    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_benchmark_reports_both_phases() {
        let runtime = Runtime::new(Config::default());
        let report = run_benchmark(
            &runtime,
            BenchmarkParams {
                steps: 20_000,
                branches: 8,
                latency_ms: 5,
                rounds: 2,
            },
        )
        .await
        .unwrap();

        assert_eq!(report.steps, 20_000);
        assert!(report.group_avg_ms >= 5.0);
        assert!(serde_json::to_value(&report).unwrap()["finished_at"].is_string());
    }

    #[tokio::test]
    async fn test_rejects_empty_benchmark() {
        let runtime = Runtime::new(Config::default());
        let params = BenchmarkParams {
            steps: 0,
            branches: 0,
            latency_ms: 0,
            rounds: 1,
        };
        assert!(run_benchmark(&runtime, params).await.is_err());
    }
}
