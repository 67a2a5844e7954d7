//! Precedent resolution: semantic index first, keyword overlap as fallback.
//!
//! The resolver variant is chosen once, at startup, by [`select_resolver`].
//! Per-call store failures still degrade to the keyword scorer, so
//! [`PrecedentResolver::resolve`] never fails.

use anyhow::Result;
use std::path::{Path, PathBuf};

use clause_audit_core::error::PrecedentError;
use clause_audit_core::precedent::{clean_results, parse_corpus, rank_by_overlap, SimilarityStore};

use crate::config::Config;
use crate::embedding;
use crate::migrate;
use crate::precedent_store::SqlitePrecedentStore;

/// Token-overlap ranking over the JSON reference corpus.
///
/// The corpus file is re-read on every call.
#[derive(Debug, Clone)]
pub struct KeywordFallback {
    corpus_path: PathBuf,
}

impl KeywordFallback {
    pub fn new(corpus_path: impl Into<PathBuf>) -> Self {
        Self {
            corpus_path: corpus_path.into(),
        }
    }

    pub fn corpus_path(&self) -> &Path {
        &self.corpus_path
    }

    fn load_corpus(&self) -> Result<Vec<String>, PrecedentError> {
        let raw = std::fs::read_to_string(&self.corpus_path).map_err(|e| {
            PrecedentError::CorpusLoad {
                path: self.corpus_path.clone(),
                reason: e.to_string(),
            }
        })?;
        parse_corpus(&raw).map_err(|reason| PrecedentError::CorpusLoad {
            path: self.corpus_path.clone(),
            reason,
        })
    }

    /// Rank the corpus against `text`. Any corpus problem yields an empty
    /// list.
    pub fn resolve(&self, text: &str, top_k: usize) -> Vec<String> {
        if top_k == 0 || text.trim().is_empty() {
            return Vec::new();
        }
        match self.load_corpus() {
            Ok(corpus) => rank_by_overlap(text, &corpus, top_k),
            Err(e) => {
                tracing::warn!(error = %e, "precedent corpus unavailable");
                Vec::new()
            }
        }
    }
}

/// Strategy selected at startup.
pub enum PrecedentResolver {
    SemanticStore {
        store: Box<dyn SimilarityStore>,
        fallback: KeywordFallback,
    },
    KeywordFallback(KeywordFallback),
}

impl PrecedentResolver {
    /// Up to `top_k` precedent texts for `text`. Infallible.
    pub async fn resolve(&self, text: &str, top_k: usize) -> Vec<String> {
        if top_k == 0 || text.trim().is_empty() {
            return Vec::new();
        }
        match self {
            PrecedentResolver::SemanticStore { store, fallback } => {
                match store.query(text, top_k).await {
                    Ok(results) => clean_results(results),
                    Err(e) => {
                        tracing::warn!(
                            store = store.name(),
                            error = %e,
                            "similarity store failed; using keyword fallback"
                        );
                        fallback.resolve(text, top_k)
                    }
                }
            }
            PrecedentResolver::KeywordFallback(fallback) => fallback.resolve(text, top_k),
        }
    }

    /// Label of the active variant.
    pub fn variant(&self) -> &'static str {
        match self {
            PrecedentResolver::SemanticStore { .. } => "semantic",
            PrecedentResolver::KeywordFallback(_) => "keyword",
        }
    }
}

/// Probe the configured store once and pick a resolver.
///
/// The semantic variant requires: `precedents.store = "sqlite"`, an enabled
/// and usable embedding provider, an existing index, and at least one
/// reference for the configured model. Anything else selects the keyword
/// fallback.
pub async fn select_resolver(config: &Config) -> PrecedentResolver {
    let fallback = KeywordFallback::new(&config.precedents.corpus_path);

    match probe_store(config).await {
        Ok(Some(store)) => {
            tracing::info!(variant = "semantic", "precedent resolver selected");
            PrecedentResolver::SemanticStore {
                store: Box::new(store),
                fallback,
            }
        }
        Ok(None) => {
            tracing::debug!(variant = "keyword", "precedent store disabled");
            PrecedentResolver::KeywordFallback(fallback)
        }
        Err(e) => {
            let reason = format!("{:#}", e);
            tracing::warn!(error = %reason, "precedent store unusable; using keyword fallback");
            PrecedentResolver::KeywordFallback(fallback)
        }
    }
}

async fn probe_store(config: &Config) -> Result<Option<SqlitePrecedentStore>> {
    if !config.precedents.store_enabled() {
        return Ok(None);
    }
    if !config.embedding.is_enabled() {
        anyhow::bail!("precedents.store is set but embedding provider is disabled");
    }
    embedding::create_provider(&config.embedding)?;

    let store = SqlitePrecedentStore::open(&config.precedents.db_path, &config.embedding).await?;
    if store.count().await? == 0 {
        anyhow::bail!("precedent index is empty; run `cra precedents seed`");
    }
    Ok(Some(store))
}

/// `cra precedents init`.
pub async fn run_init(config: &Config) -> Result<()> {
    migrate::run_migrations(config).await?;
    println!(
        "Precedent index initialized at {}",
        config.precedents.db_path.display()
    );
    Ok(())
}

/// `cra precedents query`.
pub async fn run_query(config: &Config, text: &str, top_k: Option<usize>) -> Result<()> {
    let top_k = top_k.unwrap_or(config.analysis.top_k);
    let resolver = select_resolver(config).await;
    let results = resolver.resolve(text, top_k).await;

    println!("resolver: {}", resolver.variant());
    if results.is_empty() {
        println!("No precedents.");
        return Ok(());
    }
    for (i, r) in results.iter().enumerate() {
        println!("{}. {}", i + 1, r);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io::Write;

    struct FailingStore;

    #[async_trait]
    impl SimilarityStore for FailingStore {
        fn name(&self) -> &str {
            "failing"
        }
        async fn query(&self, _text: &str, _top_k: usize) -> Result<Vec<String>, PrecedentError> {
            Err(PrecedentError::Lookup("connection refused".into()))
        }
    }

    struct FixedStore(Vec<String>);

    #[async_trait]
    impl SimilarityStore for FixedStore {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn query(&self, _text: &str, top_k: usize) -> Result<Vec<String>, PrecedentError> {
            Ok(self.0.iter().take(top_k).cloned().collect())
        }
    }

    fn corpus_file(json: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(json.as_bytes()).unwrap();
        f
    }

    const CORPUS: &str = r#"[
        "The Supplier shall indemnify the Buyer against third party claims.",
        "Either party may terminate on thirty days written notice.",
        "Liability is capped at the fees paid in the preceding twelve months."
    ]"#;

    #[test]
    fn test_keyword_fallback_ranks_corpus() {
        let f = corpus_file(CORPUS);
        let fb = KeywordFallback::new(f.path());
        let hits = fb.resolve("Buyer may terminate with written notice", 1);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].starts_with("Either party may terminate"));
    }

    #[test]
    fn test_keyword_fallback_missing_corpus_is_empty() {
        let fb = KeywordFallback::new("/nonexistent/precedents.json");
        assert!(fb.resolve("any clause text", 3).is_empty());
    }

    #[test]
    fn test_keyword_fallback_malformed_corpus_is_empty() {
        let f = corpus_file(r#"{"not": "an array"}"#);
        assert!(KeywordFallback::new(f.path()).resolve("clause", 3).is_empty());
    }

    #[test]
    fn test_keyword_fallback_rereads_corpus() {
        let f = corpus_file(r#"["alpha clause"]"#);
        let fb = KeywordFallback::new(f.path());
        assert_eq!(fb.resolve("alpha", 3), vec!["alpha clause".to_string()]);

        std::fs::write(f.path(), r#"["beta clause"]"#).unwrap();
        assert_eq!(fb.resolve("beta", 3), vec!["beta clause".to_string()]);
    }

    #[tokio::test]
    async fn test_store_failure_uses_fallback() {
        let f = corpus_file(CORPUS);
        let resolver = PrecedentResolver::SemanticStore {
            store: Box::new(FailingStore),
            fallback: KeywordFallback::new(f.path()),
        };
        let hits = resolver.resolve("Liability cap of fees paid", 1).await;
        assert_eq!(hits.len(), 1);
        assert!(hits[0].starts_with("Liability is capped"));
    }

    #[tokio::test]
    async fn test_store_results_cleaned_in_order() {
        let resolver = PrecedentResolver::SemanticStore {
            store: Box::new(FixedStore(vec![
                "first".into(),
                "   ".into(),
                "second".into(),
            ])),
            fallback: KeywordFallback::new("/nonexistent.json"),
        };
        assert_eq!(
            resolver.resolve("clause", 3).await,
            vec!["first".to_string(), "second".to_string()]
        );
        assert_eq!(resolver.variant(), "semantic");
    }

    #[tokio::test]
    async fn test_zero_k_and_blank_text() {
        let f = corpus_file(CORPUS);
        let resolver = PrecedentResolver::KeywordFallback(KeywordFallback::new(f.path()));
        assert!(resolver.resolve("terminate", 0).await.is_empty());
        assert!(resolver.resolve("  \n ", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_select_resolver_defaults_to_keyword() {
        let resolver = select_resolver(&Config::minimal()).await;
        assert_eq!(resolver.variant(), "keyword");
    }

    #[tokio::test]
    async fn test_select_resolver_missing_index_falls_back() {
        let mut cfg = Config::minimal();
        cfg.precedents.store = "sqlite".to_string();
        cfg.precedents.db_path = PathBuf::from("/nonexistent/dir/precedents.sqlite");
        cfg.embedding.provider = "openai".to_string();
        cfg.embedding.model = Some("m".to_string());
        cfg.embedding.dims = Some(2);
        cfg.embedding.api_key_env = "PATH".to_string();
        let resolver = select_resolver(&cfg).await;
        assert_eq!(resolver.variant(), "keyword");
    }
}
