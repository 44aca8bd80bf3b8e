//! Bounded pool of PostgreSQL-wire connections for one profile, on top of
//! deadpool-postgres.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{
    ClientWrapper, Hook, HookError, Manager, ManagerConfig, Metrics, Object, Pool, PoolError,
    RecyclingMethod, Runtime,
};
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{NoTls, SimpleQueryMessage};

use super::binding::bind;
use super::values::{simple_row, typed_row, SqlParam};
use super::{QueryGateway, Row, SqlExecutor};
use crate::error::GatewayError;
use crate::params::QueryParams;
use crate::profile::ProfileSettings;

/// Connection pool with a hard ceiling on open sessions.
///
/// Connections are opened lazily and reused; a session checked out with
/// [`PgPool::acquire`] returns to the pool when dropped.
#[derive(Clone)]
pub struct PgPool {
    label: String,
    acquire_timeout: Duration,
    pool: Pool,
}

impl PgPool {
    pub fn new(label: impl Into<String>, settings: &ProfileSettings) -> Result<Self, GatewayError> {
        let label = label.into();
        let manager = Manager::from_config(
            settings.pg_config(),
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let mut builder = Pool::builder(manager)
            .max_size(settings.pool_max.max(1))
            .wait_timeout(Some(settings.acquire_timeout))
            .create_timeout(Some(settings.acquire_timeout))
            .runtime(Runtime::Tokio1);

        if let Some(statement) = settings.schema.as_deref().map(search_path_statement) {
            let hook_label = label.clone();
            builder = builder.post_create(Hook::async_fn(
                move |client: &mut ClientWrapper, _: &Metrics| {
                    let statement = statement.clone();
                    let label = hook_label.clone();
                    Box::pin(async move {
                        client.batch_execute(&statement).await.map_err(HookError::Backend)?;
                        log::debug!("[{}] {}", label, statement);
                        Ok(())
                    })
                },
            ));
        }

        let pool = builder
            .build()
            .map_err(|e| GatewayError::Other(format!("[{}] cannot build pool: {}", label, e)))?;

        Ok(Self {
            label,
            acquire_timeout: settings.acquire_timeout,
            pool,
        })
    }

    pub fn max_size(&self) -> usize {
        self.pool.status().max_size
    }

    /// Check out a connection, opening one if none is idle.
    pub async fn acquire(&self) -> Result<PooledConnection, GatewayError> {
        let client = self.pool.get().await.map_err(|e| self.pool_error(e))?;
        Ok(PooledConnection { client })
    }

    fn pool_error(&self, err: PoolError) -> GatewayError {
        match err {
            PoolError::Timeout(_) => GatewayError::AcquireTimeout(self.acquire_timeout),
            PoolError::Closed => GatewayError::PoolClosed,
            PoolError::Backend(e) => GatewayError::Connect(e),
            PoolError::PostCreateHook(HookError::Backend(e)) => GatewayError::Driver(e),
            other => GatewayError::Other(format!("[{}] {}", self.label, other)),
        }
    }

    /// Close the pool. Idle connections close now, checked-out ones when
    /// their holders drop them.
    pub fn close(&self) {
        let status = self.pool.status();
        log::debug!(
            "[{}] Closing pool: {} open, {} idle",
            self.label,
            status.size,
            status.available
        );
        self.pool.close();
    }
}

/// `SET search_path` with every schema in the comma-separated list quoted as
/// an identifier.
pub fn search_path_statement(schemas: &str) -> String {
    let quoted: Vec<String> = schemas
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(quote_identifier)
        .collect();
    format!("SET search_path TO {}", quoted.join(", "))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[async_trait]
impl QueryGateway for PgPool {
    async fn session(&self) -> Result<Box<dyn SqlExecutor>, GatewayError> {
        Ok(Box::new(self.acquire().await?))
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// A connection checked out of a [`PgPool`]
pub struct PooledConnection {
    client: Object,
}

#[async_trait]
impl SqlExecutor for PooledConnection {
    /// Without parameters the statement goes out through the simple query
    /// protocol. With parameters it is parsed, bound and executed in one round
    /// trip; values travel as text and the server infers their types.
    async fn execute(
        &self,
        sql: &str,
        params: Option<&QueryParams>,
    ) -> Result<Vec<Row>, GatewayError> {
        let Some(params) = params else {
            let messages = self.client.simple_query(sql).await?;
            return Ok(messages
                .iter()
                .filter_map(|message| match message {
                    SimpleQueryMessage::Row(row) => Some(simple_row(row)),
                    _ => None,
                })
                .collect());
        };

        let bound = bind(sql, params)?;
        let args: Vec<SqlParam<'_>> = bound.values.iter().map(SqlParam).collect();
        let typed: Vec<(&(dyn ToSql + Sync), Type)> = args
            .iter()
            .map(|a| (a as &(dyn ToSql + Sync), Type::UNKNOWN))
            .collect();
        let rows = self.client.query_typed(&bound.sql, &typed).await?;
        Ok(rows.iter().map(typed_row).collect())
    }
}
