//! Benchmark orchestration
//!
//! Every run executes every file once. The runs are flattened run-major into a
//! single task list and handed to the scheduler, so files of different runs can
//! overlap when the concurrency limit allows it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::client::QueryGateway;
use crate::discovery::QueryFile;
use crate::error::{BenchError, Result};
use crate::params::extract_query_parameters;
use crate::profile::Profile;
use crate::protocol::{run_timed, TimingRecord};
use crate::reporter::StreamingLogger;
use crate::scheduler::run_bounded;

pub const DEFAULT_NUM_RUNS: usize = 5;
pub const DEFAULT_CONCURRENCY: usize = 2;

/// One query file and the gateway it runs against
pub struct BenchItem {
    pub file: PathBuf,
    pub query_sql: String,
    pub profile: Profile,
    pub target: Arc<dyn QueryGateway>,
}

impl BenchItem {
    pub fn new(file: impl Into<PathBuf>, query_sql: impl Into<String>, target: Arc<dyn QueryGateway>) -> Self {
        let query_sql = query_sql.into();
        Self {
            file: file.into(),
            profile: Profile::detect(&query_sql),
            query_sql,
            target,
        }
    }

    pub fn from_file(file: QueryFile, target: Arc<dyn QueryGateway>) -> Self {
        Self {
            file: file.path,
            query_sql: file.sql,
            profile: file.profile,
            target,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BenchOptions {
    pub num_runs: usize,
    pub concurrency: usize,
    /// Deadline for one task, session checkout included
    pub task_timeout: Option<Duration>,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            num_runs: DEFAULT_NUM_RUNS,
            concurrency: DEFAULT_CONCURRENCY,
            task_timeout: None,
        }
    }
}

/// Records of a finished benchmark, `runs[run][item]`
#[derive(Debug, Clone, Default)]
pub struct BenchOutcome {
    pub runs: Vec<Vec<TimingRecord>>,
    pub duration: Duration,
}

impl BenchOutcome {
    pub fn task_count(&self) -> usize {
        self.runs.iter().map(Vec::len).sum()
    }
}

/// Measure one item once: extract its parameters, check out a session and
/// run the timed protocol on it.
pub async fn run_item(item: &BenchItem) -> Result<TimingRecord> {
    let parsed = extract_query_parameters(&item.query_sql)?;
    let session = item.target.session().await?;
    run_timed(session.as_ref(), &item.file, &parsed).await
}

async fn run_item_with_deadline(item: &BenchItem, deadline: Option<Duration>) -> Result<TimingRecord> {
    let Some(after) = deadline else {
        return run_item(item).await;
    };
    tokio::time::timeout(after, run_item(item))
        .await
        .map_err(|_| BenchError::TaskTimeout {
            file: item.file.display().to_string(),
            after,
        })?
}

/// Tasks left per run; logs when a run's last task lands.
struct BatchProgress {
    remaining: Vec<AtomicUsize>,
}

impl BatchProgress {
    fn new(num_runs: usize, batch_size: usize) -> Self {
        Self {
            remaining: (0..num_runs).map(|_| AtomicUsize::new(batch_size)).collect(),
        }
    }

    /// Count one finished task of `run`. True for the call that finishes it.
    fn complete(&self, run: usize) -> bool {
        let finished = self.remaining[run].fetch_sub(1, Ordering::SeqCst) == 1;
        if finished {
            log::info!("Run {}/{} complete", run + 1, self.remaining.len());
        }
        finished
    }
}

/// Run every item `options.num_runs` times and stream each record to `logger`
/// as it lands.
pub async fn run_benchmark(
    items: Vec<BenchItem>,
    options: &BenchOptions,
    logger: Arc<Mutex<StreamingLogger>>,
) -> Result<BenchOutcome> {
    let start = Instant::now();
    let batch_size = items.len();
    if batch_size == 0 || options.num_runs == 0 {
        return Ok(BenchOutcome {
            runs: vec![Vec::new(); options.num_runs],
            duration: start.elapsed(),
        });
    }

    log::info!(
        "Benchmarking {} file(s) x {} run(s), {} at a time",
        batch_size,
        options.num_runs,
        options.concurrency
    );

    let items: Vec<Arc<BenchItem>> = items.into_iter().map(Arc::new).collect();
    let progress = Arc::new(BatchProgress::new(options.num_runs, batch_size));
    let deadline = options.task_timeout;

    let tasks: Vec<_> = (0..options.num_runs)
        .flat_map(|run| items.iter().map(move |item| (run, Arc::clone(item))))
        .map(|(run, item)| {
            let logger = Arc::clone(&logger);
            let progress = Arc::clone(&progress);
            move || async move {
                let record = run_item_with_deadline(&item, deadline).await?;
                {
                    let mut logger = logger.lock().unwrap_or_else(|e| e.into_inner());
                    logger.log(&record)?;
                }
                progress.complete(run);
                Ok::<_, BenchError>(record)
            }
        })
        .collect();

    let records = run_bounded(tasks, options.concurrency).await?;

    let runs = records
        .chunks(batch_size)
        .map(<[TimingRecord]>::to_vec)
        .collect();

    Ok(BenchOutcome {
        runs,
        duration: start.elapsed(),
    })
}
