//! Core data models that flow through the analysis pipeline.
//!
//! [`Clause`]s come out of the segmenter, [`AnalysisResult`]s out of the
//! orchestrator, and one [`TraceEntry`] is appended per analysis attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One semantically coherent fragment of a contract document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    /// Position in document order, contiguous from 0.
    pub id: usize,
    /// Whitespace-normalized clause text, never empty.
    pub text: String,
    /// Character count of `text`.
    pub length: usize,
    /// Below the minimum length and nothing to merge into.
    pub too_short: bool,
}

impl Clause {
    pub fn new(id: usize, text: String, too_short: bool) -> Self {
        let length = text.chars().count();
        Self {
            id,
            text,
            length,
            too_short,
        }
    }

    /// SHA-256 hex digest of the clause text.
    pub fn hash(&self) -> String {
        text_hash(&self.text)
    }
}

/// SHA-256 hex digest of arbitrary text.
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sampling parameters passed to the model client on every attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 512,
            timeout_secs: 20,
        }
    }
}

/// The model's verdict on one clause, after validation and coercion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_score: u8,
    pub reasons: Vec<String>,
    pub redline: String,
}

impl RiskAssessment {
    /// Safe default used when the model path fails.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            risk_score: 0,
            reasons: vec![reason.into()],
            redline: String::new(),
        }
    }
}

/// Analysis output for a single clause.
///
/// `clause_id` is a plain id; results never hold the [`Clause`] itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub clause_id: usize,
    pub clause_text: String,
    pub risk_score: u8,
    pub reasons: Vec<String>,
    pub redline: String,
    pub precedents: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn new(
        clause: &Clause,
        assessment: RiskAssessment,
        precedents: Vec<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            clause_id: clause.id,
            clause_text: clause.text.trim().to_string(),
            risk_score: assessment.risk_score,
            reasons: assessment.reasons,
            redline: assessment.redline,
            precedents,
            timestamp,
        }
    }
}

/// One audit record of a clause-analysis attempt, serialized as a single
/// JSON line in the trace log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub ts: DateTime<Utc>,
    pub run_id: String,
    pub clause_id: usize,
    pub clause_length: usize,
    pub clause_hash: String,
    pub prompt: String,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub risk_score: u8,
    #[serde(default)]
    pub precedents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TraceEntry {
    /// Provisional entry recorded before the model is called. The
    /// outcome fields are filled in once the call completes or fails.
    pub fn provisional(
        run_id: &str,
        clause: &Clause,
        prompt: &str,
        prompt_chars: usize,
        ts: DateTime<Utc>,
    ) -> Self {
        Self {
            ts,
            run_id: run_id.to_string(),
            clause_id: clause.id,
            clause_length: clause.text.trim().chars().count(),
            clause_hash: clause.hash(),
            prompt: truncate_chars(prompt, prompt_chars),
            response: None,
            raw_response: None,
            attempts: 0,
            risk_score: 0,
            precedents: Vec::new(),
            error: None,
        }
    }
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
