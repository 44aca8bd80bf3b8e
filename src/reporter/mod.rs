//! Result reporting
//!
//! - [`stream`]: one line per record as results land, header first
//! - [`summary`]: per-file means and per-run detail once the run is over
//! - [`json_reporter`]: the same data as a timestamped JSON file

pub mod json_reporter;
pub mod stream;
pub mod summary;

pub use stream::StreamingLogger;
pub use summary::{summarize, FileSummary};

/// Timing values are reported in seconds with millisecond precision.
pub(crate) const TIME_SCALE: f64 = 1e6;

/// Width of the file column: longest path plus a gap.
pub fn file_column_width<'a, I>(files: I) -> usize
where
    I: IntoIterator<Item = &'a std::path::Path>,
{
    files
        .into_iter()
        .map(|f| f.display().to_string().chars().count())
        .max()
        .unwrap_or(0)
        + 5
}

pub(crate) fn format_time(value: f64) -> String {
    format!("{:.3}", value / TIME_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_file_column_width() {
        let files = [Path::new("a.sql"), Path::new("reports/daily.sql")];
        assert_eq!(file_column_width(files), 22);
        assert_eq!(file_column_width(Vec::<&Path>::new()), 5);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(1_500_000.0), "1.500");
        assert_eq!(format_time(1234.0), "0.001");
        assert_eq!(format_time(0.0), "0.000");
    }
}
