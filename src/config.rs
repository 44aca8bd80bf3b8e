use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser};

use crate::runner::{BenchOptions, DEFAULT_CONCURRENCY, DEFAULT_NUM_RUNS};

/// Options shared by every binary.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// TOML file overriding connection profile settings
    #[arg(long, env = "QBENCH_PROFILES")]
    pub profiles: Option<PathBuf>,

    /// Log level or filter directives (e.g. "debug" or "query_bench=trace")
    #[arg(long, default_value = "info", env = "QBENCH_LOG_LEVEL")]
    pub log_level: String,
}

/// CLI configuration for the benchmark tool.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "query-bench",
    version,
    about = "Benchmark SQL files against Redshift using the server's query history"
)]
pub struct Config {
    /// SQL files or directories to benchmark. The first positive integer among
    /// them is the number of runs.
    /// Example: query-bench reports/ 10
    #[arg(value_name = "PATH|RUNS")]
    pub inputs: Vec<String>,

    /// Maximum number of queries in flight
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY, env = "QBENCH_CONCURRENCY")]
    pub concurrency: usize,

    /// Fail a query run that takes longer than this many seconds
    #[arg(long, env = "QBENCH_TASK_TIMEOUT_SECS")]
    pub task_timeout_secs: Option<u64>,

    /// Print per-file averages after the last run
    #[arg(long, default_value_t = false)]
    pub summary: bool,

    /// Write a JSON report into this directory
    #[arg(long, env = "QBENCH_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl Config {
    pub fn num_runs(&self) -> usize {
        self.inputs
            .iter()
            .filter_map(|arg| arg.parse::<usize>().ok())
            .find(|n| *n > 0)
            .unwrap_or(DEFAULT_NUM_RUNS)
    }

    /// Every input that is not a number
    pub fn paths(&self) -> Vec<PathBuf> {
        self.inputs
            .iter()
            .filter(|arg| arg.parse::<usize>().is_err())
            .map(PathBuf::from)
            .collect()
    }

    pub fn bench_options(&self) -> BenchOptions {
        BenchOptions {
            num_runs: self.num_runs(),
            concurrency: self.concurrency,
            task_timeout: self.task_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// CLI configuration for the plan viewer tool.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "query-plan",
    version,
    about = "Write an EXPLAIN plan viewer link next to each SQL file"
)]
pub struct PlanConfig {
    /// SQL files or directories
    #[arg(value_name = "PATH", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Plan viewer page; defaults to pev2.html next to the executable
    #[arg(long, env = "QBENCH_VIEWER_URL")]
    pub viewer_url: Option<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}
