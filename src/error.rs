//! Error types for query-bench
//!
//! `BenchError` is what every benchmark task and the binaries surface.
//! `GatewayError` covers everything the database gateway can fail with and is
//! carried through unchanged.

use std::time::Duration;

use thiserror::Error;

use crate::scheduler::SchedulerError;

/// Result type for benchmark operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors that can occur while benchmarking a query file
#[derive(Error, Debug)]
pub enum BenchError {
    /// Mixed positional/named parameter blocks, or a block that is not a
    /// sequence or mapping.
    #[error("Invalid query params: {0}")]
    InvalidParameterShape(String),

    /// A parameter block is not a valid literal
    #[error("Invalid query params at offset {offset}: {message}")]
    ParameterSyntax { offset: usize, message: String },

    /// Failure reported by the execution gateway
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The history lookup returned no row for the tag
    #[error("No query history row found for tag '{tag}'")]
    HistoryNotFound { tag: String },

    /// The history row lacks a column or holds a non-integer value
    #[error("Query history row has no usable '{column}' column")]
    MalformedHistoryRow { column: String },

    /// The per-task deadline elapsed
    #[error("{file}: benchmark task exceeded its deadline of {after:?}")]
    TaskTimeout { file: String, after: Duration },

    /// A task failed and the scheduler stopped the run
    #[error("Benchmark aborted by task #{index}")]
    SchedulerAborted {
        index: usize,
        #[source]
        source: Box<BenchError>,
    },

    /// A task panicked
    #[error("Benchmark task #{index} panicked")]
    TaskPanicked { index: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O error
    #[error("File error: {0}")]
    File(String),
}

impl From<std::io::Error> for BenchError {
    fn from(err: std::io::Error) -> Self {
        BenchError::File(err.to_string())
    }
}

impl From<toml::de::Error> for BenchError {
    fn from(err: toml::de::Error) -> Self {
        BenchError::Config(format!("TOML parse error: {}", err))
    }
}

impl From<SchedulerError<BenchError>> for BenchError {
    fn from(err: SchedulerError<BenchError>) -> Self {
        match err {
            SchedulerError::Aborted { index, source } => BenchError::SchedulerAborted {
                index,
                source: Box::new(source),
            },
            SchedulerError::Panicked { index } => BenchError::TaskPanicked { index },
            SchedulerError::InvalidLimit => {
                BenchError::Config("concurrency limit must be at least 1".into())
            },
        }
    }
}

/// Errors raised by the query execution gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Could not open a database connection. The driver error is rendered
    /// in the message, not chained as a source.
    #[error("Connection failed: {}", describe_pg_error(.0))]
    Connect(tokio_postgres::Error),

    /// No pooled connection became available in time
    #[error("Timed out after {0:?} waiting for a pooled connection")]
    AcquireTimeout(Duration),

    /// The pool was closed while waiting
    #[error("Connection pool is closed")]
    PoolClosed,

    /// Parameters do not match the statement's placeholders
    #[error("Parameter binding error: {0}")]
    Binding(String),

    /// Error returned by the driver or the server
    #[error("SQL error: {}", describe_pg_error(.0))]
    Driver(tokio_postgres::Error),

    /// Failure from a non-PostgreSQL gateway
    #[error("{0}")]
    Other(String),
}

impl From<tokio_postgres::Error> for GatewayError {
    fn from(err: tokio_postgres::Error) -> Self {
        GatewayError::Driver(err)
    }
}

/// Prefer the server's message over the driver's terse "db error".
fn describe_pg_error(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => match db.detail() {
            Some(detail) => format!("{} ({}) [{}]", db.message(), detail, db.code().code()),
            None => format!("{} [{}]", db.message(), db.code().code()),
        },
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BenchError::HistoryNotFound {
            tag: "-- qbench:abc".into(),
        };
        assert_eq!(
            err.to_string(),
            "No query history row found for tag '-- qbench:abc'"
        );

        let err = BenchError::from(GatewayError::Binding("expected 2 values, got 1".into()));
        assert_eq!(
            err.to_string(),
            "Parameter binding error: expected 2 values, got 1"
        );
    }

    #[test]
    fn test_error_chain_prints_each_cause_once() {
        let err: BenchError = SchedulerError::Aborted {
            index: 2,
            source: BenchError::from(GatewayError::PoolClosed),
        }
        .into();

        assert_eq!(err.to_string(), "Benchmark aborted by task #2");
        assert_eq!(
            format!("{:#}", anyhow::Error::from(err)),
            "Benchmark aborted by task #2: Connection pool is closed"
        );
    }

    #[test]
    fn test_scheduler_error_conversion_keeps_source() {
        let err: BenchError = SchedulerError::Aborted {
            index: 3,
            source: BenchError::InvalidParameterShape("mixed".into()),
        }
        .into();

        match err {
            BenchError::SchedulerAborted { index, source } => {
                assert_eq!(index, 3);
                assert!(matches!(*source, BenchError::InvalidParameterShape(_)));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
