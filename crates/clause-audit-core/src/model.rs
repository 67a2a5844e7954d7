//! Model client interface and prompt construction.
//!
//! The application provides a concrete [`ModelClient`] (an
//! OpenAI-compatible chat endpoint); tests provide scripted ones.

use async_trait::async_trait;

use crate::error::ModelError;
use crate::models::ModelParams;

/// System message sent with every clause prompt.
pub const SYSTEM_PROMPT: &str = "You are a contract risk assistant. Reply in valid JSON only.";

/// Schema line embedded in every clause prompt.
pub const RESPONSE_SCHEMA: &str = r#"{ "risk_score": int (0-5), "reasons": [str], "redline": str }"#;

/// Sends one prompt to a language model and returns its raw text.
///
/// Implementations make exactly one request per call; retries are the
/// orchestrator's job.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model identifier, recorded in logs.
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str, params: &ModelParams) -> Result<String, ModelError>;
}

/// Build the user prompt for one clause.
pub fn build_prompt(clause_text: &str) -> String {
    format!(
        "Analyze the following contract clause and return JSON only following this schema:\n\
         {RESPONSE_SCHEMA}\n\
         Be concise. Do not include extra commentary or markdown. If you cannot assess the clause, \
         set risk_score to 0 and return an empty reasons array and an empty redline.\n\n\
         Clause:\n\"\"\"\n{clause_text}\n\"\"\"\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_clause_and_schema() {
        let p = build_prompt("The Licensee waives all claims.");
        assert!(p.contains("\"\"\"\nThe Licensee waives all claims.\n\"\"\""));
        assert!(p.contains(r#""risk_score": int (0-5)"#));
        assert!(p.contains(r#""redline": str"#));
        assert!(p.contains("JSON only"));
    }
}
