//! Input discovery
//!
//! Arguments may name `.sql` files or directories. Directories are walked up to
//! [`MAX_DEPTH`] levels, counting the argument itself. Anything whose path
//! contains `.ignore` is skipped, which lets a whole directory be parked by
//! renaming it.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BenchError, Result};
use crate::profile::Profile;

pub const MAX_DEPTH: usize = 3;

const SQL_EXTENSION: &str = ".sql";
const IGNORE_MARKER: &str = ".ignore";

/// A query file read from disk
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFile {
    pub path: PathBuf,
    pub sql: String,
    pub profile: Profile,
}

/// Expand file and directory arguments into `.sql` files, in argument order.
/// Directory entries are visited in name order.
pub fn find_sql_files<P: AsRef<Path>>(args: &[P]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for arg in args {
        let path = arg.as_ref();
        if !path.exists() {
            log::warn!("Skipping {}: no such file or directory", path.display());
            continue;
        }
        walk(path, MAX_DEPTH, &mut found)?;
    }
    Ok(found)
}

fn walk(path: &Path, depth: usize, found: &mut Vec<PathBuf>) -> Result<()> {
    if path.is_dir() {
        if depth == 0 {
            log::debug!("Not descending into {}: depth limit", path.display());
            return Ok(());
        }
        let mut entries = fs::read_dir(path)
            .map_err(|e| BenchError::File(format!("Cannot read {}: {}", path.display(), e)))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();
        for entry in entries {
            walk(&entry, depth - 1, found)?;
        }
    } else if path.is_file() && is_benchmark_file(path) {
        found.push(path.to_path_buf());
    }
    Ok(())
}

fn is_benchmark_file(path: &Path) -> bool {
    let name = path.to_string_lossy();
    name.ends_with(SQL_EXTENSION) && !name.contains(IGNORE_MARKER)
}

/// Read each file and detect its connection profile.
pub fn load_query_files(paths: &[PathBuf]) -> Result<Vec<QueryFile>> {
    paths
        .iter()
        .map(|path| {
            let sql = fs::read_to_string(path).map_err(|e| {
                BenchError::File(format!("Failed to read {}: {}", path.display(), e))
            })?;
            Ok(QueryFile {
                path: path.clone(),
                profile: Profile::detect(&sql),
                sql,
            })
        })
        .collect()
}
