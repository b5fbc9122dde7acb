//! Line-delimited JSON result stream.
//!
//! The agent writes one JSON record per line. The last `result` record is the
//! authoritative outcome of the invocation; everything before it is progress.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use todone_core::ResultRecord;

use crate::artifacts::{write_json, FINAL_OBJECT_JSON, RAW_OUTPUT_JSON};

/// Parsed records of one stream file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    records: Vec<Value>,
    last_line: Option<String>,
    skipped_lines: usize,
}

impl Transcript {
    pub fn parse(raw: &str) -> Self {
        let mut transcript = Transcript::default();
        for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
            transcript.last_line = Some(line.to_string());
            match serde_json::from_str::<Value>(line) {
                Ok(record) => transcript.records.push(record),
                Err(_) => transcript.skipped_lines += 1,
            }
        }
        transcript
    }

    /// Read a stream file. A missing file is an empty transcript.
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Ok(Self::parse(&raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    /// Last non-empty raw line, parsed or not
    pub fn last_line(&self) -> Option<&str> {
        self.last_line.as_deref()
    }

    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The last `result` record
    pub fn authoritative_result(&self) -> Option<ResultRecord> {
        self.records.iter().rev().find_map(ResultRecord::from_value)
    }

    /// The most recent `n` records, newest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Value> {
        self.records.iter().rev().take(n)
    }
}

/// Files produced from one stream file
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedOutput {
    pub json_array: PathBuf,
    pub final_object: Option<PathBuf>,
}

/// Write the stream as a pretty JSON array next to it, and its last record as
/// a single object. Re-running on the same stream rewrites identical bytes.
pub fn materialize(jsonl_path: &Path) -> Result<MaterializedOutput> {
    let raw = std::fs::read_to_string(jsonl_path)
        .with_context(|| format!("Failed to read {}", jsonl_path.display()))?;
    let transcript = Transcript::parse(&raw);

    let dir = jsonl_path.parent().unwrap_or_else(|| Path::new("."));
    let json_array = dir.join(RAW_OUTPUT_JSON);
    write_json(&json_array, transcript.records())?;

    let final_object = match transcript.records().last() {
        Some(last) => {
            let path = dir.join(FINAL_OBJECT_JSON);
            write_json(&path, last)?;
            Some(path)
        }
        None => None,
    };

    debug!(
        records = transcript.records().len(),
        skipped = transcript.skipped_lines(),
        path = %json_array.display(),
        "Materialized agent stream"
    );

    Ok(MaterializedOutput {
        json_array,
        final_object,
    })
}
