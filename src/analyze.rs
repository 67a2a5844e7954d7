//! Analysis orchestration: one model verdict per clause, never aborting.
//!
//! For each clause the [`Analyzer`]:
//!
//! 1. builds the prompt and a provisional [`TraceEntry`],
//! 2. calls the model under the [`RetryPolicy`]; each attempt is request,
//!    parse, and object validation,
//! 3. degrades to `risk_score = 0` once the attempts are exhausted, with a
//!    reason naming the failure mode (`llm_error: ...`, `parse_error: ...`
//!    or `config_error: ...`),
//! 4. resolves precedents,
//! 5. records the [`AnalysisResult`] and appends the finalized trace entry.
//!
//! Clauses are processed strictly in order by an [`AnalysisRun`], an
//! explicit cursor over an immutable clause slice. Trace write failures are
//! logged and ignored.

use anyhow::Result;
use chrono::Utc;
use std::path::Path;

use clause_audit_core::error::ModelError;
use clause_audit_core::model::{build_prompt, ModelClient};
use clause_audit_core::models::{AnalysisResult, Clause, ModelParams, RiskAssessment, TraceEntry};
use clause_audit_core::parse::parse;
use clause_audit_core::retry::RetryPolicy;
use clause_audit_core::trace::TraceSink;

use crate::config::Config;
use crate::llm::ChatClient;
use crate::precedents::{select_resolver, PrecedentResolver};
use crate::segment_cmd::load_clauses;
use crate::trace_log::JsonlTraceSink;

/// Collaborators and settings shared by every clause of a run.
pub struct Analyzer<'a> {
    client: &'a dyn ModelClient,
    resolver: &'a PrecedentResolver,
    sink: &'a dyn TraceSink,
    retry: RetryPolicy,
    params: ModelParams,
    prompt_chars: usize,
}

/// Successful model outcome of one clause.
struct Verdict {
    assessment: RiskAssessment,
    response: serde_json::Value,
    attempts: u32,
}

/// Failed model outcome after the last attempt.
struct Failure {
    error: ModelError,
    raw_response: Option<String>,
    attempts: u32,
}

impl<'a> Analyzer<'a> {
    pub fn new(
        client: &'a dyn ModelClient,
        resolver: &'a PrecedentResolver,
        sink: &'a dyn TraceSink,
    ) -> Self {
        Self {
            client,
            resolver,
            sink,
            retry: RetryPolicy::default(),
            params: ModelParams::default(),
            prompt_chars: 500,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    /// Prompt characters kept in trace entries.
    pub fn with_prompt_chars(mut self, prompt_chars: usize) -> Self {
        self.prompt_chars = prompt_chars;
        self
    }

    /// Start a run over `clauses` with a fresh run id.
    pub fn start<'r>(&'r self, clauses: &'r [Clause], top_k: usize) -> AnalysisRun<'r> {
        AnalysisRun {
            analyzer: self,
            clauses,
            cursor: 0,
            top_k,
            run_id: uuid::Uuid::new_v4().to_string(),
            results: Vec::with_capacity(clauses.len()),
        }
    }

    /// Analyze every clause in order. Returns one result per clause whose
    /// trimmed text is non-empty.
    pub async fn analyze(&self, clauses: &[Clause], top_k: usize) -> Vec<AnalysisResult> {
        let mut run = self.start(clauses, top_k);
        while run.step().await {}
        run.into_results()
    }

    async fn analyze_clause(&self, run_id: &str, clause: &Clause, top_k: usize) -> AnalysisResult {
        let prompt = build_prompt(clause.text.trim());
        let mut trace =
            TraceEntry::provisional(run_id, clause, &prompt, self.prompt_chars, Utc::now());

        let assessment = match self.call_with_retries(&prompt).await {
            Ok(verdict) => {
                trace.attempts = verdict.attempts;
                trace.response = Some(verdict.response);
                verdict.assessment
            }
            Err(failure) => {
                let reason = format!("{}: {}", failure.error.kind(), failure.error);
                tracing::warn!(
                    run_id,
                    clause_id = clause.id,
                    attempts = failure.attempts,
                    kind = failure.error.kind(),
                    error = %failure.error,
                    "model analysis failed; returning degraded result"
                );
                trace.attempts = failure.attempts;
                trace.raw_response = failure.raw_response;
                trace.error = Some(reason.clone());
                RiskAssessment::degraded(reason)
            }
        };

        let precedents = self.resolver.resolve(&clause.text, top_k).await;

        trace.risk_score = assessment.risk_score;
        trace.precedents = precedents.clone();
        let result = AnalysisResult::new(clause, assessment, precedents, Utc::now());

        if let Err(e) = self.sink.append(&trace) {
            tracing::warn!(clause_id = clause.id, error = %e, "trace write failed");
        }

        tracing::info!(
            run_id,
            clause_id = clause.id,
            risk_score = result.risk_score,
            attempts = trace.attempts,
            precedents = result.precedents.len(),
            "clause analyzed"
        );
        result
    }

    async fn call_with_retries(&self, prompt: &str) -> Result<Verdict, Failure> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let (err, raw) = match self.client.complete(prompt, &self.params).await {
                Ok(raw) => match interpret(&raw) {
                    Ok((assessment, response)) => {
                        return Ok(Verdict {
                            assessment,
                            response,
                            attempts: attempt,
                        })
                    }
                    Err(err) => (err, Some(raw)),
                },
                Err(err) => (err, None),
            };

            if !self.retry.should_retry(attempt, &err) {
                return Err(Failure {
                    error: err,
                    raw_response: raw,
                    attempts: attempt,
                });
            }

            let delay = self.retry.delay_after(attempt);
            tracing::debug!(
                model = self.client.model_name(),
                attempt,
                ?delay,
                error = %err,
                "model attempt failed; retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Parse and validate raw model text.
fn interpret(raw: &str) -> Result<(RiskAssessment, serde_json::Value), ModelError> {
    let value = parse(raw).ok_or(ModelError::Unparseable)?;
    let assessment = RiskAssessment::from_value(&value).ok_or(ModelError::NotAnObject)?;
    Ok((assessment, value))
}

/// Cursor over a clause slice. Each [`step`](Self::step) consumes one
/// clause; results so far are visible through [`results`](Self::results).
pub struct AnalysisRun<'r> {
    analyzer: &'r Analyzer<'r>,
    clauses: &'r [Clause],
    cursor: usize,
    top_k: usize,
    run_id: String,
    results: Vec<AnalysisResult>,
}

impl<'r> AnalysisRun<'r> {
    /// Process the next clause. Returns `false` once every clause has been
    /// consumed.
    pub async fn step(&mut self) -> bool {
        let clauses = self.clauses;
        let Some(clause) = clauses.get(self.cursor) else {
            return false;
        };
        self.cursor += 1;

        if clause.text.trim().is_empty() {
            tracing::debug!(clause_id = clause.id, "skipping empty clause");
            return true;
        }

        let result = self
            .analyzer
            .analyze_clause(&self.run_id, clause, self.top_k)
            .await;
        self.results.push(result);
        true
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.clauses.len()
    }

    /// Clauses consumed so far, skipped ones included.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn results(&self) -> &[AnalysisResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<AnalysisResult> {
        self.results
    }
}

/// `cra analyze`: segment a text file, analyze up to `max_clauses`
/// clauses, and print the results.
pub async fn run_analyze(
    config: &Config,
    file: &Path,
    max_clauses: Option<usize>,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut clauses = load_clauses(config, file)?;

    let limit = max_clauses.unwrap_or(config.analysis.max_clauses);
    if clauses.len() > limit {
        tracing::info!(total = clauses.len(), limit, "truncating clause list");
        clauses.truncate(limit);
    }
    let top_k = top_k.unwrap_or(config.analysis.top_k);

    let client = ChatClient::from_config(&config.llm);
    let resolver = select_resolver(config).await;
    let sink = JsonlTraceSink::new(&config.trace.path);

    let analyzer = Analyzer::new(&client, &resolver, &sink)
        .with_retry(config.llm.retry_policy())
        .with_params(config.llm.params())
        .with_prompt_chars(config.trace.prompt_chars);
    let results = analyzer.analyze(&clauses, top_k).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    for r in &results {
        println!("[clause {}] risk {}/5", r.clause_id, r.risk_score);
        println!("{}", r.clause_text);
        for reason in &r.reasons {
            println!("  - {}", reason);
        }
        if !r.redline.is_empty() {
            println!("  redline: {}", r.redline);
        }
        for p in &r.precedents {
            println!("  precedent: {}", p);
        }
        println!();
    }

    let high = results.iter().filter(|r| r.risk_score >= 4).count();
    println!(
        "{} clauses analyzed ({} high risk, precedents: {})",
        results.len(),
        high,
        resolver.variant()
    );
    Ok(())
}
