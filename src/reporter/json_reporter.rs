use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use super::FileSummary;
use crate::error::{BenchError, Result};
use crate::protocol::{TimingRecord, Timings};

/// Run settings echoed into the report
#[derive(Debug, Clone, Serialize)]
pub struct ReportConfig {
    pub num_runs: usize,
    pub concurrency: usize,
    pub task_timeout_secs: Option<u64>,
    pub files: Vec<PathBuf>,
}

#[derive(Serialize)]
struct BenchReport<'a> {
    version: &'static str,
    timestamp: String,
    config: &'a ReportConfig,
    runs: &'a [Vec<TimingRecord>],
    summary: Vec<FileMeans>,
}

#[derive(Serialize)]
struct FileMeans {
    file: PathBuf,
    runs: usize,
    mean_seconds: Map<String, Value>,
}

impl From<&FileSummary> for FileMeans {
    fn from(summary: &FileSummary) -> Self {
        let mean_seconds = Timings::FIELDS
            .iter()
            .zip(summary.mean)
            .map(|(field, mean)| (field.to_string(), Value::from(mean)))
            .collect();
        Self {
            file: summary.file.clone(),
            runs: summary.runs.len(),
            mean_seconds,
        }
    }
}

/// Write a JSON report to disk and return the file path.
pub fn write_json_report(
    runs: &[Vec<TimingRecord>],
    summaries: &[FileSummary],
    config: &ReportConfig,
    output_dir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).map_err(|e| {
        BenchError::File(format!(
            "Failed to create output dir {}: {}",
            output_dir.display(),
            e
        ))
    })?;

    let timestamp = chrono::Utc::now();
    let filename = format!("bench-{}.json", timestamp.format("%Y-%m-%d-%H%M%S"));
    let path = output_dir.join(filename);

    let report = BenchReport {
        version: env!("CARGO_PKG_VERSION"),
        timestamp: timestamp.to_rfc3339(),
        config,
        runs,
        summary: summaries.iter().map(FileMeans::from).collect(),
    };

    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| BenchError::File(format!("Serialize error: {}", e)))?;

    fs::write(&path, json)
        .map_err(|e| BenchError::File(format!("Write error for {}: {}", path.display(), e)))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::summarize;

    #[test]
    fn test_writes_runs_and_means() {
        let dir = tempfile::tempdir().unwrap();
        let runs = vec![vec![TimingRecord {
            file: PathBuf::from("a.sql"),
            query_id: "42".into(),
            times: Timings {
                req_time: 3_000_000,
                ..Timings::default()
            },
        }]];
        let config = ReportConfig {
            num_runs: 1,
            concurrency: 2,
            task_timeout_secs: None,
            files: vec![PathBuf::from("a.sql")],
        };

        let out_dir = dir.path().join("results");
        let path = write_json_report(&runs, &summarize(&runs), &config, &out_dir).unwrap();

        assert!(path.starts_with(&out_dir));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("bench-") && name.ends_with(".json"));

        let report: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(report["config"]["concurrency"], 2);
        assert_eq!(report["runs"][0][0]["query_id"], "42");
        assert_eq!(report["runs"][0][0]["times"]["req_time"], 3_000_000);
        assert_eq!(report["summary"][0]["mean_seconds"]["req_time"], 3.0);
        assert_eq!(report["summary"][0]["runs"], 1);
    }
}
