//! Integration tests for the processor module
//!
//! Exercises the batch pipeline end to end against temporary directories and
//! zip archives built on the fly.

pub mod basic_processing;

use crate::config::ConverterConfig;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// Unlabelled instance with an informational header line
pub const SCENARIO: &str = "200 customers
25 200
0 40 50 0 0 1236 0
1 45 68 10 912 967 90
2 45 70 30 825 870 90
3 42 66 10 65 146 90
";

/// Instance laid out the way published Homberger files are
pub const LABELLED: &str = "C2_2_1

VEHICLE
NUMBER     CAPACITY
  50          700

CUSTOMER
CUST NO.  XCOORD.   YCOORD.    DEMAND   READY TIME  DUE DATE   SERVICE TIME

    0      70         70          0          0       1351          0
    1      33         78         20        750        809         90
    2      59         52         20        345        404         90
";

/// Line 5 carries only six tokens
pub const SIX_TOKENS: &str = "broken
25 200
0 40 50 0 0 1236 0
1 45 68 10 912 967 90
2 45 70 30 825 870
";

pub fn test_config(temp_dir: &TempDir) -> ConverterConfig {
    ConverterConfig::default()
        .with_output_dir(temp_dir.path().join("output"))
        .with_concurrency(2)
        .without_progress()
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

pub fn write_zip(path: &Path, files: &[(&str, &str)]) -> PathBuf {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, content) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path.to_path_buf()
}

pub fn output_files(dir: &Path) -> Vec<String> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
