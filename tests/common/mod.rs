#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use query_bench::client::{QueryGateway, Row, SqlExecutor};
use query_bench::params::QueryParams;
use query_bench::GatewayError;

/// Queries containing this marker never show up in the history view.
pub const LOST_IN_HISTORY: &str = "lost_in_history";

/// In-memory stand-in for a warehouse with a query history view.
#[derive(Clone)]
pub struct FakeWarehouse {
    inner: Arc<Inner>,
}

struct Inner {
    delay: Duration,
    next_query_id: AtomicI64,
    history: Mutex<HashMap<String, Row>>,
    executed: Mutex<Vec<(String, Option<QueryParams>)>>,
    open_sessions: AtomicUsize,
    peak_sessions: AtomicUsize,
}

impl FakeWarehouse {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                delay,
                next_query_id: AtomicI64::new(1000),
                history: Mutex::new(HashMap::new()),
                executed: Mutex::new(Vec::new()),
                open_sessions: AtomicUsize::new(0),
                peak_sessions: AtomicUsize::new(0),
            }),
        }
    }

    /// Tagged benchmark statements executed so far
    pub fn tagged_statements(&self) -> Vec<(String, Option<QueryParams>)> {
        self.inner
            .executed
            .lock()
            .unwrap()
            .iter()
            .filter(|(sql, _)| sql.starts_with("-- qbench:"))
            .cloned()
            .collect()
    }

    pub fn executed(&self) -> Vec<String> {
        self.inner
            .executed
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn peak_sessions(&self) -> usize {
        self.inner.peak_sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryGateway for FakeWarehouse {
    async fn session(&self) -> Result<Box<dyn SqlExecutor>, GatewayError> {
        let open = self.inner.open_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak_sessions.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            inner: Arc::clone(&self.inner),
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakeSession {
    inner: Arc<Inner>,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.inner.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SqlExecutor for FakeSession {
    async fn execute(
        &self,
        sql: &str,
        params: Option<&QueryParams>,
    ) -> Result<Vec<Row>, GatewayError> {
        self.inner
            .executed
            .lock()
            .unwrap()
            .push((sql.to_string(), params.cloned()));

        if sql.contains("sys_query_history") {
            let tag = sql
                .split("LIKE '")
                .nth(1)
                .and_then(|rest| rest.split("%'").next())
                .unwrap_or_default();
            let history = self.inner.history.lock().unwrap();
            return Ok(history.get(tag).cloned().into_iter().collect());
        }

        if sql.starts_with("-- qbench:") {
            let tag = sql.lines().next().unwrap_or_default();
            tokio::time::sleep(self.inner.delay).await;
            if !sql.contains(LOST_IN_HISTORY) {
                let query_id = self.inner.next_query_id.fetch_add(1, Ordering::SeqCst);
                let row = json!({
                    "query_id": query_id,
                    "elapsed_time": query_id * 1000,
                    "queue_time": 250,
                    "execution_time": query_id * 900,
                    "compile_time": 0,
                    "planning_time": 40,
                    "lock_wait_time": null,
                });
                if let Some(row) = row.as_object() {
                    self.inner.history.lock().unwrap().insert(tag.to_string(), row.clone());
                }
            }
        }

        Ok(Vec::new())
    }
}

/// A writer the test can read back after handing a clone to a logger.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}
