//! Precedent lookup primitives.
//!
//! [`SimilarityStore`] is the interface of the semantic path; the
//! application backs it with a SQLite embedding index. [`rank_by_overlap`]
//! is the deterministic keyword path used when the store is missing or
//! fails.
//!
//! # Keyword scoring
//!
//! 1. Lowercase the query and split it into a set of `\w+` tokens.
//! 2. Score each reference by the size of its token-set intersection
//!    with the query.
//! 3. Sort by score, descending; equal scores by reference text, descending.
//! 4. Keep the top `top_k` with a score above zero; if none qualifies,
//!    return the first `top_k` references unscored.

use std::collections::HashSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::PrecedentError;

/// A nearest-neighbour index over reference clauses.
#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// Short label for logs (e.g. `"sqlite"`).
    fn name(&self) -> &str;

    /// Up to `top_k` reference texts, most similar first.
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<String>, PrecedentError>;
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("word pattern compiles"))
}

/// Lowercased set of word tokens.
pub fn tokenize(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    word_re()
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Rank `corpus` against `query` by token overlap. Pure and deterministic.
pub fn rank_by_overlap(query: &str, corpus: &[String], top_k: usize) -> Vec<String> {
    if top_k == 0 || query.trim().is_empty() {
        return Vec::new();
    }

    let query_tokens = tokenize(query);
    let mut scored: Vec<(usize, &String)> = corpus
        .iter()
        .map(|reference| {
            let score = tokenize(reference).intersection(&query_tokens).count();
            (score, reference)
        })
        .collect();
    // Equal scores order by reference text, descending.
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(a.1)));

    let hits: Vec<String> = scored
        .iter()
        .take(top_k)
        .filter(|(score, _)| *score > 0)
        .map(|(_, reference)| (*reference).clone())
        .collect();

    if hits.is_empty() {
        corpus.iter().take(top_k).cloned().collect()
    } else {
        hits
    }
}

/// Decode a reference corpus: a JSON array of strings.
pub fn parse_corpus(json: &str) -> Result<Vec<String>, String> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let items = value
        .as_array()
        .ok_or_else(|| "corpus must be a JSON array of strings".to_string())?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("corpus entry is not a string: {}", item))
        })
        .collect()
}

/// Drop blank entries from store results, keeping order.
pub fn clean_results(results: Vec<String>) -> Vec<String> {
    results
        .into_iter()
        .filter(|r| !r.trim().is_empty())
        .collect()
}
