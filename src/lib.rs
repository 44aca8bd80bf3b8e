//! query-bench: repeatable latency benchmarks for SQL files against Redshift.
//!
//! Each query file is run a number of times with the result cache disabled.
//! Every run is tagged so the server's own timing breakdown can be read back
//! from `sys_query_history`, even when several queries are in flight at once.

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod params;
pub mod plan;
pub mod profile;
pub mod protocol;
pub mod reporter;
pub mod runner;
pub mod scheduler;

pub use error::{BenchError, GatewayError, Result};
pub use params::{extract_query_parameters, ParsedQuery, QueryParams};
pub use protocol::{run_timed, TimingRecord, Timings};
pub use runner::{run_benchmark, BenchItem, BenchOptions, BenchOutcome};
pub use scheduler::{run_bounded, SchedulerError};
