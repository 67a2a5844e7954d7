//! # Clause Audit
//!
//! Contract clause risk analysis: split a contract into clauses, ask a
//! language model for a risk verdict on each, attach similar reference
//! clauses, and record an audit trace of every attempt.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ contract │──▶│ segmenter  │──▶│  analyzer    │──▶│  results    │
//! │  (.txt)  │   │  (core)    │   │ LLM + retry  │   │ text / JSON │
//! └──────────┘   └────────────┘   └──────┬───────┘   └─────────────┘
//!                                        │
//!                      ┌─────────────────┼──────────────────┐
//!                      ▼                 ▼                  ▼
//!               ┌────────────┐   ┌───────────────┐   ┌────────────┐
//!               │ chat API   │   │  precedents   │   │ JSONL      │
//!               │ (reqwest)  │   │ SQLite/keyword│   │ trace log  │
//!               └────────────┘   └───────────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cra segment contract.txt                # inspect clause boundaries
//! cra analyze contract.txt                # full analysis
//! cra precedents init && cra precedents seed
//! cra traces --limit 20                   # audit view
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`llm`] | OpenAI-compatible chat client |
//! | [`analyze`] | Analysis orchestration |
//! | [`precedents`] | Precedent resolver selection and fallback |
//! | [`precedent_store`] | SQLite embedding index |
//! | [`embedding`] | Embedding provider and vector utilities |
//! | [`trace_log`] | JSONL trace sink and audit view |
//! | [`segment_cmd`] | Segmentation command |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//!
//! Pure logic (segmenter, response parser, keyword ranking, retry policy,
//! data model) lives in [`clause_audit_core`], re-exported here.

pub use clause_audit_core;

pub mod analyze;
pub mod config;
pub mod db;
pub mod embedding;
pub mod llm;
pub mod migrate;
pub mod precedent_store;
pub mod precedents;
pub mod segment_cmd;
pub mod trace_log;
