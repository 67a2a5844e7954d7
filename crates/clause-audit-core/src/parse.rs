//! Tolerant recovery of JSON from language-model output.
//!
//! Models asked for "JSON only" still wrap answers in Markdown fences or
//! surround them with commentary. [`parse`] tries, in order:
//!
//! 1. strip one enclosing triple-backtick fence (opening line, including
//!    any language tag, and closing line),
//! 2. parse the remaining text directly,
//! 3. parse the first balanced `{ … }` substring.
//!
//! Anything else yields `None`; there is no partial reconstruction.
//! Checking that the value is an object is left to the caller, see
//! [`RiskAssessment::from_value`](crate::models::RiskAssessment).

use serde_json::Value;
use tracing::debug;

use crate::models::RiskAssessment;

const FENCE: &str = "```";

/// Recover a JSON value from raw model text. Never fails loudly.
pub fn parse(raw_text: &str) -> Option<Value> {
    if raw_text.trim().is_empty() {
        return None;
    }

    let text = strip_code_fence(raw_text);

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let candidate = extract_first_object(text)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "failed parsing extracted JSON substring");
            None
        }
    }
}

/// Remove a single pair of enclosing fence lines, if both are present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let lines: Vec<&str> = trimmed.lines().collect();
    if lines.len() < 2 {
        return trimmed;
    }
    let first = lines[0].trim_start();
    let last = lines[lines.len() - 1].trim();
    if !first.starts_with(FENCE) || last != FENCE {
        return trimmed;
    }

    let body_start = lines[0].len();
    let body_end = trimmed.len() - lines[lines.len() - 1].len();
    if body_start >= body_end {
        return "";
    }
    trimmed[body_start..body_end].trim()
}

/// The first substring running from a `{` to the `}` that closes it.
///
/// Braces inside JSON strings are counted like any other brace.
pub fn extract_first_object(text: &str) -> Option<&str> {
    let mut start = None;
    let mut depth = 0usize;
    for (i, ch) in text.char_indices() {
        match ch {
            '{' => {
                if start.is_none() {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|s| &text[s..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

impl RiskAssessment {
    /// Validate a parsed value and coerce it into an assessment.
    ///
    /// Returns `None` unless the value is a JSON object. Missing or
    /// malformed fields fall back to their safe defaults.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let risk_score = obj.get("risk_score").map(coerce_score).unwrap_or(0);

        let reasons = match obj.get("reasons") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                })
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => Vec::new(),
        };

        let redline = obj
            .get("redline")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        Some(Self {
            risk_score,
            reasons,
            redline,
        })
    }
}

fn coerce_score(value: &Value) -> u8 {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(v) if v.is_finite() => v.round().clamp(0.0, 5.0) as u8,
        _ => 0,
    }
}
