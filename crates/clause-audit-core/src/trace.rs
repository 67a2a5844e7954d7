//! Trace sink abstraction.
//!
//! The orchestrator appends one [`TraceEntry`] per analysis attempt and
//! ignores write failures. The application writes JSON lines to a file;
//! [`MemoryTraceSink`] keeps entries in memory for tests and embedding.

use std::sync::RwLock;

use crate::error::TraceWriteError;
use crate::models::TraceEntry;

/// Append-only destination for trace entries.
pub trait TraceSink: Send + Sync {
    fn append(&self, entry: &TraceEntry) -> Result<(), TraceWriteError>;
}

/// Discards every entry.
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn append(&self, _entry: &TraceEntry) -> Result<(), TraceWriteError> {
        Ok(())
    }
}

/// Collects entries behind a `RwLock`.
#[derive(Default)]
pub struct MemoryTraceSink {
    entries: RwLock<Vec<TraceEntry>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl TraceSink for MemoryTraceSink {
    fn append(&self, entry: &TraceEntry) -> Result<(), TraceWriteError> {
        let mut guard = self
            .entries
            .write()
            .map_err(|e| TraceWriteError(e.to_string()))?;
        guard.push(entry.clone());
        Ok(())
    }
}
