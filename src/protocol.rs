//! Timed execution protocol
//!
//! One measurement is three statements on the same session:
//!
//! 1. disable the result cache for the session,
//! 2. run the query with a unique tag comment in front of it, timing the round
//!    trip on the client,
//! 3. look the tagged query up in `sys_query_history` to read the server's own
//!    timing breakdown.
//!
//! The tag is what tells concurrent measurements apart on the server, so it
//! must be unique per run of a query.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::client::{Row, SqlExecutor};
use crate::error::{BenchError, Result};
use crate::params::ParsedQuery;

pub const DISABLE_RESULT_CACHE: &str = "SET enable_result_cache_for_session TO off";

const TAG_PREFIX: &str = "-- qbench:";

/// How far before the tag time the history window opens, to absorb clock
/// skew between this machine and the cluster.
const HISTORY_WINDOW_BACKDATE_SECS: i64 = 5;

/// Timing breakdown for one query run.
///
/// `req_time` is measured on the client; everything else is copied from the
/// server's history row. Field order is the column order of every report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    pub req_time: i64,
    pub elapsed_time: i64,
    pub queue_time: i64,
    pub execution_time: i64,
    pub compile_time: i64,
    pub planning_time: i64,
    pub lock_wait_time: i64,
}

impl Timings {
    pub const FIELDS: [&'static str; 7] = [
        "req_time",
        "elapsed_time",
        "queue_time",
        "execution_time",
        "compile_time",
        "planning_time",
        "lock_wait_time",
    ];

    /// Values in [`Timings::FIELDS`] order
    pub fn values(&self) -> [i64; 7] {
        [
            self.req_time,
            self.elapsed_time,
            self.queue_time,
            self.execution_time,
            self.compile_time,
            self.planning_time,
            self.lock_wait_time,
        ]
    }
}

/// Result of one benchmark task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingRecord {
    pub file: PathBuf,
    pub query_id: String,
    pub times: Timings,
}

impl TimingRecord {
    /// Combine the client-side request time with a `sys_query_history` row.
    pub fn from_history(file: &Path, req_time: i64, row: &Row) -> Result<Self> {
        Ok(Self {
            file: file.to_path_buf(),
            query_id: history_text(row, "query_id")?,
            times: Timings {
                req_time,
                elapsed_time: history_int(row, "elapsed_time")?,
                queue_time: history_int(row, "queue_time")?,
                execution_time: history_int(row, "execution_time")?,
                compile_time: history_int(row, "compile_time")?,
                planning_time: history_int(row, "planning_time")?,
                lock_wait_time: history_int(row, "lock_wait_time")?,
            },
        })
    }
}

/// The tagged statement and its history lookup
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedQuery {
    pub tag: String,
    pub statement: String,
    pub history_lookup: String,
}

impl TaggedQuery {
    pub fn new(clean_query: &str, now: DateTime<Utc>) -> Self {
        Self::with_tag(format!("{}{}", TAG_PREFIX, Uuid::new_v4()), clean_query, now)
    }

    fn with_tag(tag: String, clean_query: &str, now: DateTime<Utc>) -> Self {
        let window_start = (now - chrono::Duration::seconds(HISTORY_WINDOW_BACKDATE_SECS))
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let statement = format!("{}\n{}", tag, clean_query);
        let history_lookup = format!(
            "SELECT * FROM sys_query_history WHERE query_text LIKE '{}%' AND start_time > timestamp '{}'",
            tag, window_start
        );
        Self {
            tag,
            statement,
            history_lookup,
        }
    }
}

/// Run the three protocol steps for one query on `session`.
pub async fn run_timed(
    session: &dyn SqlExecutor,
    file: &Path,
    parsed: &ParsedQuery,
) -> Result<TimingRecord> {
    session.execute(DISABLE_RESULT_CACHE, None).await?;

    let tagged = TaggedQuery::new(&parsed.clean_query, Utc::now());
    log::trace!("{}: running {}", file.display(), tagged.tag);

    let start = Instant::now();
    session
        .execute(&tagged.statement, parsed.params.as_ref())
        .await?;
    // Milliseconds scaled by 1000, the unit the history view reports in.
    let req_time = i64::try_from(start.elapsed().as_micros()).unwrap_or(i64::MAX);

    let rows = session.execute(&tagged.history_lookup, None).await?;
    if rows.len() > 1 {
        log::debug!(
            "{}: {} history rows matched {}, using the first",
            file.display(),
            rows.len(),
            tagged.tag
        );
    }
    let row = rows
        .first()
        .ok_or_else(|| BenchError::HistoryNotFound {
            tag: tagged.tag.clone(),
        })?;

    TimingRecord::from_history(file, req_time, row)
}

fn history_int(row: &Row, column: &str) -> Result<i64> {
    let malformed = || BenchError::MalformedHistoryRow {
        column: column.to_string(),
    };
    match row.get(column).ok_or_else(malformed)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .ok_or_else(malformed),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
                .ok_or_else(malformed)
        },
        _ => Err(malformed()),
    }
}

fn history_text(row: &Row, column: &str) -> Result<String> {
    match row.get(column) {
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(BenchError::MalformedHistoryRow {
            column: column.to_string(),
        }),
    }
}
