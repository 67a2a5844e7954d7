//! JSONL trace log: one [`TraceEntry`] per line, append-only.
//!
//! [`JsonlTraceSink`] opens the file in append mode on every write, so
//! concurrent runs interleave whole lines. [`run_traces`] is the audit view
//! behind `cra traces`.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use clause_audit_core::error::TraceWriteError;
use clause_audit_core::models::TraceEntry;
use clause_audit_core::trace::TraceSink;

use crate::config::Config;

/// Appends JSON lines to a file, creating parent directories on demand.
#[derive(Debug, Clone)]
pub struct JsonlTraceSink {
    path: PathBuf,
}

impl JsonlTraceSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TraceSink for JsonlTraceSink {
    fn append(&self, entry: &TraceEntry) -> Result<(), TraceWriteError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TraceWriteError(e.to_string()))?;
            }
        }

        let mut line = serde_json::to_string(entry).map_err(|e| TraceWriteError(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TraceWriteError(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes())
            .map_err(|e| TraceWriteError(e.to_string()))
    }
}

/// Read every well-formed entry from a trace log, in file order.
///
/// Malformed lines are skipped with a warning. A missing file reads as an
/// empty log.
pub fn read_traces(path: &Path) -> Result<Vec<TraceEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace log: {}", path.display()))?;

    let mut entries = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TraceEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::warn!(line = lineno + 1, error = %e, "skipping malformed trace line"),
        }
    }
    Ok(entries)
}

/// `cra traces`: print the last `limit` entries, most recent last.
pub fn run_traces(config: &Config, limit: Option<usize>, json: bool) -> Result<()> {
    let entries = read_traces(&config.trace.path)?;
    let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
    let shown = &entries[skip..];

    if json {
        for entry in shown {
            println!("{}", serde_json::to_string(entry)?);
        }
        return Ok(());
    }

    if shown.is_empty() {
        println!("No traces.");
        return Ok(());
    }

    for entry in shown {
        let status = match &entry.error {
            Some(err) => format!("degraded ({})", err),
            None => "ok".to_string(),
        };
        println!(
            "{}  run={}  clause={}  len={}  risk={}  attempts={}  precedents={}  {}",
            entry.ts.format("%Y-%m-%dT%H:%M:%SZ"),
            short_id(&entry.run_id),
            entry.clause_id,
            entry.clause_length,
            entry.risk_score,
            entry.attempts,
            entry.precedents.len(),
            status
        );
    }
    println!("{} of {} entries", shown.len(), entries.len());
    Ok(())
}

fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
