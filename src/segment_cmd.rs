//! `cra segment`: print the clauses of a plain-text contract.

use anyhow::{Context, Result};
use std::path::Path;

use clause_audit_core::models::Clause;
use clause_audit_core::segment::segment_bytes;

use crate::config::Config;

/// Read and segment `file` with the configured length thresholds.
pub fn load_clauses(config: &Config, file: &Path) -> Result<Vec<Clause>> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let clauses = segment_bytes(&bytes, &config.segmentation.options())
        .with_context(|| format!("Failed to segment {}", file.display()))?;
    Ok(clauses)
}

pub fn run_segment(config: &Config, file: &Path, json: bool) -> Result<()> {
    let clauses = load_clauses(config, file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&clauses)?);
        return Ok(());
    }

    if clauses.is_empty() {
        println!("No clauses.");
        return Ok(());
    }

    for c in &clauses {
        let flag = if c.too_short { "  (short)" } else { "" };
        println!("[{}] {} chars{}", c.id, c.length, flag);
        println!("{}", c.text);
        println!();
    }
    println!("{} clauses", clauses.len());
    Ok(())
}
