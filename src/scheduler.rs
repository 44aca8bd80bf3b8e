//! Bounded concurrency scheduler
//!
//! Runs a list of task producers with at most `limit` tasks in flight. The
//! window slides: each completion starts the next task in input order. Results
//! come back in input order no matter when each task finished.
//!
//! On the first failure no further task is started. Tasks already running are
//! detached rather than aborted; they finish on their own and their results are
//! dropped.

use std::collections::HashMap;
use std::future::Future;

use thiserror::Error;
use tokio::task::{Id, JoinSet};

#[derive(Error, Debug)]
pub enum SchedulerError<E> {
    /// A task returned an error
    #[error("task #{index} failed: {source}")]
    Aborted { index: usize, source: E },

    /// A task panicked
    #[error("task #{index} panicked")]
    Panicked { index: usize },

    #[error("concurrency limit must be at least 1")]
    InvalidLimit,
}

/// Run `tasks` with at most `limit` in flight and collect their results by index.
///
/// Each producer is called exactly once, when its slot in the window opens.
pub async fn run_bounded<T, E, F, Fut>(
    tasks: Vec<F>,
    limit: usize,
) -> Result<Vec<T>, SchedulerError<E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    if limit == 0 {
        return Err(SchedulerError::InvalidLimit);
    }

    let total = tasks.len();
    log::debug!("Scheduling {} task(s), at most {} in flight", total, limit);

    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
    let mut pending = tasks.into_iter().enumerate();
    let mut in_flight = JoinSet::new();
    let mut task_index: HashMap<Id, usize> = HashMap::new();

    let mut start_next = |in_flight: &mut JoinSet<(usize, Result<T, E>)>,
                          task_index: &mut HashMap<Id, usize>| {
        if let Some((index, produce)) = pending.next() {
            let fut = produce();
            let handle = in_flight.spawn(async move { (index, fut.await) });
            task_index.insert(handle.id(), index);
        }
    };

    for _ in 0..limit.min(total) {
        start_next(&mut in_flight, &mut task_index);
    }

    while let Some(joined) = in_flight.join_next().await {
        match joined {
            Ok((index, Ok(value))) => {
                slots[index] = Some(value);
                start_next(&mut in_flight, &mut task_index);
            },
            Ok((index, Err(source))) => {
                let still_running = in_flight.len();
                in_flight.detach_all();
                log::debug!(
                    "Task #{} failed; leaving {} running task(s) to finish",
                    index,
                    still_running
                );
                return Err(SchedulerError::Aborted { index, source });
            },
            Err(join_error) => {
                in_flight.detach_all();
                let index = task_index.get(&join_error.id()).copied().unwrap_or(total);
                return Err(SchedulerError::Panicked { index });
            },
        }
    }

    Ok(slots.into_iter().flatten().collect())
}
