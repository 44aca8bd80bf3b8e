//! Per-file aggregation over all runs

use std::fmt::Write as _;
use std::path::PathBuf;

use super::{format_time, TIME_SCALE};
use crate::protocol::{TimingRecord, Timings};

const SUMMARY_WIDTH: usize = 20;

/// Every run of one file plus the mean of each timing field
#[derive(Debug, Clone, PartialEq)]
pub struct FileSummary {
    pub file: PathBuf,
    /// One entry per run, in run order
    pub runs: Vec<Timings>,
    /// Means in seconds, in [`Timings::FIELDS`] order
    pub mean: [f64; 7],
}

/// Group records by file, keeping the order in which files first appear.
pub fn summarize(runs: &[Vec<TimingRecord>]) -> Vec<FileSummary> {
    let mut summaries: Vec<FileSummary> = Vec::new();

    for record in runs.iter().flatten() {
        let position = match summaries.iter().position(|s| s.file == record.file) {
            Some(position) => position,
            None => {
                summaries.push(FileSummary {
                    file: record.file.clone(),
                    runs: Vec::new(),
                    mean: [0.0; 7],
                });
                summaries.len() - 1
            },
        };
        summaries[position].runs.push(record.times);
    }

    for summary in &mut summaries {
        let count = summary.runs.len() as f64;
        for times in &summary.runs {
            for (slot, value) in summary.mean.iter_mut().zip(times.values()) {
                *slot += value as f64 / TIME_SCALE / count;
            }
        }
    }

    summaries
}

/// Render the detail table and averages for every file.
pub fn render_summary(summaries: &[FileSummary]) -> String {
    let mut out = String::from("\n");

    for summary in summaries {
        let _ = writeln!(out, "file:  {}", summary.file.display());

        let mut header = String::from("#\t");
        for field in Timings::FIELDS {
            let _ = write!(header, "{:<width$}", field, width = SUMMARY_WIDTH);
        }
        let _ = writeln!(out, "{}", header.trim_end());

        for (run, times) in summary.runs.iter().enumerate() {
            let mut row = format!("{}#\t", run);
            for value in times.values() {
                let _ = write!(row, "{:<width$}", format_time(value as f64), width = SUMMARY_WIDTH);
            }
            let _ = writeln!(out, "{}", row.trim_end());
        }

        let _ = writeln!(out, "Avg");
        for (field, mean) in Timings::FIELDS.iter().zip(summary.mean) {
            let _ = writeln!(out, "\t{:<width$}: {:.3}", field, mean, width = SUMMARY_WIDTH);
        }
        let _ = writeln!(out, "{}", "-".repeat(30));
    }

    out
}
