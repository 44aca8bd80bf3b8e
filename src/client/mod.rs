//! Query execution gateway
//!
//! The benchmark core only needs one operation: run a statement with an
//! optional parameter list and get rows back. [`SqlExecutor`] is that
//! operation; [`QueryGateway`] hands out executors bound to a single database
//! session so that session-scoped settings stay in effect between statements.
//!
//! The PostgreSQL-wire implementation lives in [`pool`], with placeholder
//! rewriting in [`binding`] and value conversion in [`values`].

pub mod binding;
pub mod pool;
pub mod registry;
pub mod values;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::GatewayError;
use crate::params::QueryParams;

pub use pool::{PgPool, PooledConnection};
pub use registry::ConnectionRegistry;

/// One result row keyed by column name
pub type Row = Map<String, Value>;

/// Executes statements on one database session.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run `sql`, binding `params` when present. `None` means the statement is
    /// sent without a parameter list at all.
    async fn execute(
        &self,
        sql: &str,
        params: Option<&QueryParams>,
    ) -> Result<Vec<Row>, GatewayError>;
}

/// Source of database sessions for one target.
#[async_trait]
pub trait QueryGateway: Send + Sync {
    /// Check out a session. It goes back to the gateway when dropped.
    async fn session(&self) -> Result<Box<dyn SqlExecutor>, GatewayError>;

    /// Label used in logs
    fn name(&self) -> &str;
}
