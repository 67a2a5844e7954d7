//! # Clause Audit Core
//!
//! Shared, I/O-free logic for Clause Audit: the clause and analysis data
//! model, the document segmenter, the tolerant model-response parser,
//! keyword precedent ranking, retry delays, and the traits the
//! application implements for its external collaborators (model client,
//! similarity store, trace sink).
//!
//! This crate contains no tokio, sqlx, reqwest, or filesystem access.
//! Everything that talks to the outside world lives in the `clause-audit`
//! application crate.

pub mod error;
pub mod model;
pub mod models;
pub mod parse;
pub mod precedent;
pub mod retry;
pub mod segment;
pub mod trace;
