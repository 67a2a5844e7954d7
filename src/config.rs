//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or
//! [`Config::minimal`]) is a valid configuration: keyword-only precedents,
//! embeddings disabled, traces in `logs/agent_traces.jsonl`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clause_audit_core::models::ModelParams;
use clause_audit_core::retry::RetryPolicy;
use clause_audit_core::segment::{SegmentOptions, DEFAULT_MAX_LEN, DEFAULT_MIN_LEN};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub precedents: PrecedentsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub trace: TraceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmentationConfig {
    #[serde(default = "default_min_len")]
    pub min_len: usize,
    #[serde(default = "default_max_len")]
    pub max_len: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_LEN,
            max_len: DEFAULT_MAX_LEN,
        }
    }
}

fn default_min_len() -> usize {
    DEFAULT_MIN_LEN
}
fn default_max_len() -> usize {
    DEFAULT_MAX_LEN
}

impl SegmentationConfig {
    pub fn options(&self) -> SegmentOptions {
        SegmentOptions {
            min_len: self.min_len,
            max_len: self.max_len,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// When false, missing or rejected credentials stop retrying at once.
    #[serde(default = "default_true")]
    pub retry_fatal_errors: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key_env: default_llm_api_key_env(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_fatal_errors: true,
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_llm_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_llm_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_max_tokens() -> u32 {
    512
}
fn default_llm_timeout_secs() -> u64 {
    20
}
fn default_llm_max_retries() -> u32 {
    2
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}

impl LlmConfig {
    pub fn params(&self) -> ModelParams {
        ModelParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout_secs: self.timeout_secs,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
            retry_configuration_errors: self.retry_fatal_errors,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_max_clauses")]
    pub max_clauses: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_clauses: default_max_clauses(),
            top_k: default_top_k(),
        }
    }
}

fn default_max_clauses() -> usize {
    20
}
fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct PrecedentsConfig {
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,
    /// `"disabled"` or `"sqlite"`.
    #[serde(default = "default_store")]
    pub store: String,
    #[serde(default = "default_precedent_db_path")]
    pub db_path: PathBuf,
}

impl Default for PrecedentsConfig {
    fn default() -> Self {
        Self {
            corpus_path: default_corpus_path(),
            store: default_store(),
            db_path: default_precedent_db_path(),
        }
    }
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/precedents.json")
}
fn default_store() -> String {
    "disabled".to_string()
}
fn default_precedent_db_path() -> PathBuf {
    PathBuf::from("data/precedents.sqlite")
}

impl PrecedentsConfig {
    pub fn store_enabled(&self) -> bool {
        self.store != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL of an OpenAI-compatible API.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            api_key_env: default_embedding_api_key_env(),
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_max_retries() -> u32 {
    5
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TraceConfig {
    #[serde(default = "default_trace_path")]
    pub path: PathBuf,
    /// Prompt characters kept in each trace entry.
    #[serde(default = "default_prompt_chars")]
    pub prompt_chars: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            path: default_trace_path(),
            prompt_chars: default_prompt_chars(),
        }
    }
}

fn default_trace_path() -> PathBuf {
    PathBuf::from("logs/agent_traces.jsonl")
}
fn default_prompt_chars() -> usize {
    500
}

impl Config {
    /// Defaults only; used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.segmentation.max_len == 0 {
        anyhow::bail!("segmentation.max_len must be > 0");
    }
    if config.segmentation.min_len > config.segmentation.max_len {
        anyhow::bail!("segmentation.min_len must not exceed segmentation.max_len");
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.max_tokens == 0 {
        anyhow::bail!("llm.max_tokens must be > 0");
    }
    if config.llm.timeout_secs == 0 {
        anyhow::bail!("llm.timeout_secs must be > 0");
    }

    if config.analysis.max_clauses == 0 {
        anyhow::bail!("analysis.max_clauses must be >= 1");
    }

    match config.precedents.store.as_str() {
        "disabled" | "sqlite" => {}
        other => anyhow::bail!(
            "Unknown precedent store: '{}'. Must be disabled or sqlite.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(())
}
