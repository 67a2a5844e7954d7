//! Heading-aware clause segmenter.
//!
//! Turns raw contract text into an ordered list of [`Clause`]s. Pure
//! function, no I/O.
//!
//! # Algorithm
//!
//! 1. Normalize whitespace: unify line endings, collapse runs of three or
//!    more line feeds to one blank line, collapse runs of spaces/tabs,
//!    trim the document.
//! 2. Split at structural headings (`Section 3`, `Clause 4:`, all-caps
//!    heading lines, `1. Definitions`, `1.1 `). Every heading starts a new
//!    candidate block.
//! 3. If that yields a single block (or no heading matched), split on
//!    blank-line paragraphs instead, as long as that yields more than one.
//! 4. Blocks longer than `max_len` are re-chunked on sentence boundaries;
//!    a lone sentence longer than `max_len` is sliced every `max_len`
//!    characters.
//! 5. Chunks shorter than `min_len` are appended to the previous clause.
//!    A short first chunk is kept and flagged `too_short`, then dropped at
//!    the end if other clauses exist and it never grew past `min_len`.
//! 6. Ids `0..N-1` are assigned in document order.
//!
//! All lengths are counted in characters, not bytes.
//!
//! # Example
//!
//! ```rust
//! use clause_audit_core::segment::{segment, SegmentOptions};
//!
//! let text = "Section 1. Payment\nThe Buyer shall pay every invoice within thirty days.\n\
//!             Section 2. Term\nThis Agreement remains in force for a period of two years.";
//! let clauses = segment(text, &SegmentOptions::default()).unwrap();
//! assert_eq!(clauses.len(), 2);
//! assert_eq!(clauses[1].id, 1);
//! ```

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::error::InputError;
use crate::models::Clause;

/// Minimum clause length in characters before a fragment is merged.
pub const DEFAULT_MIN_LEN: usize = 40;
/// Maximum clause length in characters before a block is re-chunked.
pub const DEFAULT_MAX_LEN: usize = 2000;

/// Line-start heading markers, tried as one alternation:
/// `Section N` / `Clause N`, an all-caps line, `N. Capitalized heading`,
/// and an `N.N ` subsection marker.
///
/// The keywords are case-sensitive. All-caps and numbered heading lines
/// must end in a line feed, so the last line of a document never counts.
const HEADING_PATTERN: &str = r"(?m)^(?:(?:Section|Clause)[ \t]+\d+[.:\- ]?|[A-Z][A-Z ]{4,}\n|\d+\.[ \t]+[A-Z][A-Za-z ]{3,}\n|\d+\.\d+[ \t]+)";

/// Length thresholds for [`segment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentOptions {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_LEN,
            max_len: DEFAULT_MAX_LEN,
        }
    }
}

impl SegmentOptions {
    fn validate(&self) -> Result<(), InputError> {
        if self.max_len == 0 {
            return Err(InputError::InvalidOptions("max_len must be > 0".into()));
        }
        if self.min_len > self.max_len {
            return Err(InputError::InvalidOptions(format!(
                "min_len ({}) must not exceed max_len ({})",
                self.min_len, self.max_len
            )));
        }
        Ok(())
    }
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(HEADING_PATTERN).expect("heading pattern compiles"))
}

fn paragraph_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("paragraph pattern compiles"))
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n\s*\n+").expect("blank-run pattern compiles"))
}

fn horizontal_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("horizontal-run pattern compiles"))
}

fn sentence_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.?!]\s+").expect("sentence pattern compiles"))
}

/// A candidate block with its byte offsets in the normalized text.
#[derive(Debug)]
struct Block<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

/// A clause under construction during the merge pass.
struct Draft {
    text: String,
    too_short: bool,
}

/// Normalize line endings and whitespace runs. Idempotent.
pub fn normalize_whitespace(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = blank_run_re().replace_all(&unified, "\n\n");
    let spaced = horizontal_run_re().replace_all(&collapsed, " ");
    spaced.trim().to_string()
}

/// Segment raw file content. Fails with [`InputError::NotText`] when the
/// bytes are not UTF-8.
pub fn segment_bytes(bytes: &[u8], opts: &SegmentOptions) -> Result<Vec<Clause>, InputError> {
    let text = std::str::from_utf8(bytes).map_err(|e| InputError::NotText {
        offset: e.valid_up_to(),
    })?;
    segment(text, opts)
}

/// Split `text` into ordered clauses.
///
/// Returns an empty list for empty or whitespace-only input.
pub fn segment(text: &str, opts: &SegmentOptions) -> Result<Vec<Clause>, InputError> {
    opts.validate()?;

    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Ok(Vec::new());
    }

    let blocks = candidate_blocks(&normalized);

    let mut chunks: Vec<String> = Vec::new();
    for block in &blocks {
        debug!(
            start = block.start,
            end = block.end,
            "candidate block of {} chars",
            char_len(block.text)
        );
        chunks.extend(chunk_block(block.text, opts.max_len));
    }

    let drafts = merge_short_fragments(chunks, opts.min_len);

    Ok(drafts
        .into_iter()
        .enumerate()
        .map(|(id, d)| Clause::new(id, d.text, d.too_short))
        .collect())
}

/// Heading split, falling back to paragraphs when headings give one block.
fn candidate_blocks(text: &str) -> Vec<Block<'_>> {
    let headings = heading_blocks(text);
    if headings.len() > 1 {
        return headings;
    }
    let paragraphs = paragraph_blocks(text);
    if paragraphs.len() > 1 {
        paragraphs
    } else {
        headings
    }
}

fn heading_blocks(text: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut last = 0;
    for m in heading_re().find_iter(text) {
        if m.start() > last {
            push_block(&mut blocks, text, last, m.start());
        }
        last = m.start();
    }
    push_block(&mut blocks, text, last, text.len());
    blocks
}

fn paragraph_blocks(text: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut last = 0;
    for m in paragraph_break_re().find_iter(text) {
        push_block(&mut blocks, text, last, m.start());
        last = m.end();
    }
    push_block(&mut blocks, text, last, text.len());
    blocks
}

fn push_block<'a>(blocks: &mut Vec<Block<'a>>, text: &'a str, start: usize, end: usize) {
    let trimmed = text[start..end].trim();
    if !trimmed.is_empty() {
        blocks.push(Block {
            text: trimmed,
            start,
            end,
        });
    }
}

/// Re-chunk a block on sentence boundaries so no chunk exceeds `max_len`.
fn chunk_block(text: &str, max_len: usize) -> Vec<String> {
    if char_len(text) <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(text) {
        let len = char_len(sentence);
        let joined = if current.is_empty() {
            len
        } else {
            current_len + 1 + len
        };

        if joined <= max_len {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
            current_len = joined;
            continue;
        }

        flush_chunk(&mut chunks, &mut current);
        current_len = 0;

        if len > max_len {
            chunks.extend(force_split(sentence, max_len));
        } else {
            current.push_str(sentence);
            current_len = len;
        }
    }
    flush_chunk(&mut chunks, &mut current);

    chunks
}

fn flush_chunk(chunks: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
}

/// Split after `.`, `?` or `!` followed by whitespace; the whitespace is
/// dropped.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in sentence_break_re().find_iter(text) {
        let end = m.start() + 1;
        if end > start {
            sentences.push(&text[start..end]);
        }
        start = m.end();
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Slice a sentence into consecutive `max_len`-character pieces.
fn force_split(sentence: &str, max_len: usize) -> Vec<String> {
    let chars: Vec<char> = sentence.chars().collect();
    chars
        .chunks(max_len)
        .map(|piece| piece.iter().collect::<String>())
        .filter_map(|piece| {
            let trimmed = piece.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}

/// Fold short chunks into their predecessor; drop a short leading
/// fragment once there is anything else to return.
///
/// Merging ignores heading boundaries: a short first paragraph of a new
/// section lands in the previous section's clause.
fn merge_short_fragments(chunks: Vec<String>, min_len: usize) -> Vec<Draft> {
    let mut drafts: Vec<Draft> = Vec::new();

    for chunk in chunks {
        if char_len(&chunk) < min_len {
            if let Some(prev) = drafts.last_mut() {
                prev.text.push_str("\n\n");
                prev.text.push_str(&chunk);
                prev.too_short = char_len(&prev.text) < min_len;
                continue;
            }
            drafts.push(Draft {
                text: chunk,
                too_short: true,
            });
        } else {
            drafts.push(Draft {
                text: chunk,
                too_short: false,
            });
        }
    }

    if drafts.len() > 1 {
        drafts.retain(|d| !(d.too_short && char_len(&d.text) < min_len));
    }
    drafts
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
