//! Query plan links
//!
//! Runs `EXPLAIN` for a query file and writes `<file>.plan.txt` next to it. The
//! file holds a single URL: a plan viewer page with the file name, the plan
//! text and the SQL as written packed into its `q` query parameter as a JSON
//! array.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use url::Url;

use crate::client::{Row, SqlExecutor};
use crate::discovery::QueryFile;
use crate::error::{BenchError, Result};
use crate::params::extract_query_parameters;

/// Column `EXPLAIN` returns its lines in
pub const PLAN_COLUMN: &str = "QUERY PLAN";

const VIEWER_PAGE: &str = "pev2.html";
const SIDECAR_SUFFIX: &str = ".plan.txt";

/// `pev2.html` in the directory of the running executable
pub fn default_viewer_url() -> Result<Url> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or_else(|| BenchError::Config("executable has no parent directory".into()))?;
    Url::from_file_path(dir.join(VIEWER_PAGE))
        .map_err(|_| BenchError::Config(format!("cannot build a file URL for {}", dir.display())))
}

pub fn parse_viewer_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| BenchError::Config(format!("invalid viewer URL '{}': {}", raw, e)))
}

/// Join the plan lines from `EXPLAIN` output.
pub fn plan_text(rows: &[Row]) -> String {
    rows.iter()
        .map(|row| match row.get(PLAN_COLUMN) {
            Some(Value::String(line)) => line.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn plan_url(viewer: &Url, file: &Path, plan: &str, sql: &str) -> Url {
    let payload = Value::from(vec![
        file.display().to_string(),
        plan.to_string(),
        sql.to_string(),
    ])
    .to_string();

    let mut url = viewer.clone();
    url.query_pairs_mut().append_pair("q", &payload);
    url
}

pub fn sidecar_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Explain `query` on `session` and write its plan link. Returns the path
/// written.
pub async fn write_plan(session: &dyn SqlExecutor, query: &QueryFile, viewer: &Url) -> Result<PathBuf> {
    let parsed = extract_query_parameters(&query.sql)?;
    let explain = format!("EXPLAIN {}", parsed.clean_query);
    let rows = session.execute(&explain, parsed.params.as_ref()).await?;

    let plan = plan_text(&rows);
    let url = plan_url(viewer, &query.path, &plan, &query.sql);

    let target = sidecar_path(&query.path);
    fs::write(&target, url.as_str())
        .map_err(|e| BenchError::File(format!("Write error for {}: {}", target.display(), e)))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::params::QueryParams;
    use crate::profile::Profile;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct ExplainSession {
        seen: Mutex<Vec<(String, Option<QueryParams>)>>,
    }

    #[async_trait]
    impl SqlExecutor for ExplainSession {
        async fn execute(
            &self,
            sql: &str,
            params: Option<&QueryParams>,
        ) -> std::result::Result<Vec<Row>, GatewayError> {
            self.seen.lock().unwrap().push((sql.to_string(), params.cloned()));
            Ok(["XN Seq Scan on events", "  Filter: (day = $1)"]
                .iter()
                .map(|line| json!({ PLAN_COLUMN: line }).as_object().cloned().unwrap())
                .collect())
        }
    }

    #[test]
    fn test_plan_url_encodes_payload() {
        let viewer = parse_viewer_url("http://localhost:8000/pev2.html").unwrap();
        let url = plan_url(&viewer, Path::new("q/a.sql"), "Seq Scan", "SELECT 1");

        assert!(url.as_str().starts_with("http://localhost:8000/pev2.html?q="));
        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "q");
        let payload: Value = serde_json::from_str(&value).unwrap();
        assert_eq!(payload, json!(["q/a.sql", "Seq Scan", "SELECT 1"]));
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(sidecar_path(Path::new("q/a.sql")), PathBuf::from("q/a.sql.plan.txt"));
    }

    #[test]
    fn test_invalid_viewer_url() {
        assert!(matches!(parse_viewer_url("not a url"), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_default_viewer_url_is_file_url() {
        let url = default_viewer_url().unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("/pev2.html"));
    }

    #[tokio::test]
    async fn test_write_plan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sql");
        let sql = "/* ```params\n['2024-01-01']\n``` */\nSELECT * FROM events WHERE day = ?";
        fs::write(&path, sql).unwrap();

        let session = ExplainSession {
            seen: Mutex::new(Vec::new()),
        };
        let query = QueryFile {
            path: path.clone(),
            sql: sql.to_string(),
            profile: Profile::Prod,
        };
        let viewer = parse_viewer_url("http://viewer/pev2.html").unwrap();

        let written = write_plan(&session, &query, &viewer).await.unwrap();
        assert_eq!(written, sidecar_path(&path));

        let seen = session.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "EXPLAIN \nSELECT * FROM events WHERE day = ?");
        assert_eq!(seen[0].1, Some(QueryParams::Positional(vec![json!("2024-01-01")])));

        let link = Url::parse(&fs::read_to_string(&written).unwrap()).unwrap();
        let (_, value) = link.query_pairs().next().unwrap();
        let payload: Value = serde_json::from_str(&value).unwrap();
        assert_eq!(payload[1], "XN Seq Scan on events\n  Filter: (day = $1)");
        assert_eq!(payload[2], sql);
    }
}
