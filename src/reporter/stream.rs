//! Streaming result lines
//!
//! Records are printed in completion order, which is not the order the tasks
//! were scheduled in. The header goes out once, right before the first record.

use std::io::{self, Write};

use super::format_time;
use crate::protocol::{TimingRecord, Timings};

const VALUE_WIDTH: usize = 15;

pub struct StreamingLogger {
    out: Box<dyn Write + Send>,
    file_width: usize,
    header_printed: bool,
}

impl StreamingLogger {
    pub fn new(out: Box<dyn Write + Send>, file_width: usize) -> Self {
        Self {
            out,
            file_width,
            header_printed: false,
        }
    }

    pub fn stdout(file_width: usize) -> Self {
        Self::new(Box::new(io::stdout()), file_width)
    }

    /// Print one record, preceded by the header if nothing was printed yet.
    pub fn log(&mut self, record: &TimingRecord) -> io::Result<()> {
        if !self.header_printed {
            let header = self.header_line();
            writeln!(self.out, "{}", header)?;
            self.header_printed = true;
        }
        let line = self.record_line(record);
        writeln!(self.out, "{}", line)?;
        self.out.flush()
    }

    fn header_line(&self) -> String {
        let mut columns = vec![
            pad("file", self.file_width),
            pad("queryId", VALUE_WIDTH),
        ];
        columns.extend(Timings::FIELDS.iter().map(|f| pad(f, VALUE_WIDTH)));
        columns.join(" ")
    }

    fn record_line(&self, record: &TimingRecord) -> String {
        let mut columns = vec![
            pad(&record.file.display().to_string(), self.file_width),
            pad(&record.query_id, VALUE_WIDTH),
        ];
        columns.extend(
            record
                .times
                .values()
                .iter()
                .map(|v| pad(&format_time(*v as f64), VALUE_WIDTH)),
        );
        columns.join(" ")
    }
}

fn pad(value: &str, width: usize) -> String {
    format!("{:<width$}", value, width = width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn record(file: &str, query_id: &str, elapsed: i64) -> TimingRecord {
        TimingRecord {
            file: PathBuf::from(file),
            query_id: query_id.to_string(),
            times: Timings {
                req_time: 2_000_000,
                elapsed_time: elapsed,
                ..Timings::default()
            },
        }
    }

    #[test]
    fn test_header_printed_once_before_first_record() {
        let buffer = SharedBuffer::default();
        let mut logger = StreamingLogger::new(Box::new(buffer.clone()), 10);

        logger.log(&record("a.sql", "101", 1_250_000)).unwrap();
        logger.log(&record("b.sql", "102", 500)).unwrap();

        let lines = buffer.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("file       queryId"));
        assert!(lines[0].contains("req_time"));
        assert!(lines[0].trim_end().ends_with("lock_wait_time"));
        assert!(lines[1].starts_with("a.sql      101"));
        assert!(lines[2].starts_with("b.sql      102"));
        assert_eq!(lines.iter().filter(|l| l.starts_with("file ")).count(), 1);
    }

    #[test]
    fn test_column_layout() {
        let buffer = SharedBuffer::default();
        let mut logger = StreamingLogger::new(Box::new(buffer.clone()), 10);
        logger.log(&record("a.sql", "101", 1_250_000)).unwrap();

        let line = &buffer.lines()[1];
        // file(10) + space + queryId(15) + space
        assert_eq!(&line[..11], "a.sql      ");
        assert_eq!(&line[11..27], "101             ");
        assert_eq!(&line[27..43], "2.000           ");
        assert_eq!(&line[43..59], "1.250           ");
        assert_eq!(line.len(), 11 + 16 * 7 + 15);
    }
}
