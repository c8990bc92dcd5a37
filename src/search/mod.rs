// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The search engine: query in, result rows out.
//!
//! A query resolves to a set of column-0 positions. Exact queries resolve
//! through the dictionary's sorted array; a trailing `*` enumerates ids
//! through the radix tree; a regex query goes through the query parser and
//! turns into literal prefixes first. One `load_range` covering the whole
//! position span pulls every needed column chunk into memory, and from
//! there the per-position tree walks are pure CPU -- so they fan out
//! across threads, each worker posting its rows to a bounded queue that
//! the caller drains in arrival order.
//!
//! Dictionaries and columns are loaded per query and shared read-only
//! during the fan-out; nothing here mutates after the range load, which is
//! what makes the sharing safe without locks.
//!
//! Errors carry an HTTP-shaped status code because the original surface of
//! this engine is a JSON service; the CLI reuses the same mapping.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;

use crate::dict::WordDictReader;
use crate::index::{NgramIndex, NgramSearchResult};
use crate::query::{self, ParseError, QueryPrefix};

/// In-flight worker chunks before fan-out workers block.
const FANOUT_QUEUE_DEPTH: usize = 64;

// ============================================================================
// ARGUMENTS
// ============================================================================

/// How the phrase is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryType {
    /// Literal token, or a prefix when it ends with `*`.
    #[default]
    Exact,
    /// Restricted regular expression (see the query module).
    Regex,
}

impl QueryType {
    /// Parse the external spelling (`default` / `regexp`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Exact),
            "regexp" => Some(Self::Regex),
            _ => None,
        }
    }
}

/// One search request.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub corpus_id: String,
    pub phrase: String,
    /// Metadata attributes to return with each row.
    pub attrs: Vec<String>,
    pub offset: usize,
    /// `None` returns everything.
    pub limit: Option<usize>,
    pub query_type: QueryType,
}

/// Cooperative cancellation flag, shared with whoever may abort the query.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-query limits: an optional wall-clock deadline and a cancel flag.
/// Workers consult this at the top of each fan-out iteration and before
/// chunk loads.
#[derive(Debug, Clone, Default)]
pub struct SearchControl {
    pub deadline: Option<Instant>,
    pub cancel: CancelToken,
}

impl SearchControl {
    fn stop_reason(&self) -> Option<SearchError> {
        if self.cancel.is_cancelled() {
            return Some(SearchError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() > d) {
            return Some(SearchError::DeadlineExceeded);
        }
        None
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Search failure, mapped onto the JSON error surface.
#[derive(Debug)]
pub enum SearchError {
    /// Malformed regex query (4xx).
    BadQuery(ParseError),
    /// Unknown corpus id (404).
    CorpusNotFound(String),
    /// Underlying column/dictionary I/O failure (500).
    Io(io::Error),
    Cancelled,
    DeadlineExceeded,
}

impl SearchError {
    pub fn http_code(&self) -> u16 {
        match self {
            SearchError::BadQuery(_) => 400,
            SearchError::CorpusNotFound(_) => 404,
            SearchError::Io(_) => 500,
            SearchError::Cancelled => 503,
            SearchError::DeadlineExceeded => 504,
        }
    }

    /// The `{"message": ..., "code": ...}` error body.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            message: self.to_string(),
            code: self.http_code(),
        }
    }
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::BadQuery(e) => write!(f, "{}", e),
            SearchError::CorpusNotFound(id) => write!(f, "corpus '{}' not found", id),
            SearchError::Io(e) => write!(f, "index access failed: {}", e),
            SearchError::Cancelled => write!(f, "search cancelled"),
            SearchError::DeadlineExceeded => write!(f, "search deadline exceeded"),
        }
    }
}

impl std::error::Error for SearchError {}

impl From<io::Error> for SearchError {
    fn from(e: io::Error) -> Self {
        SearchError::Io(e)
    }
}

impl From<ParseError> for SearchError {
    fn from(e: ParseError) -> Self {
        SearchError::BadQuery(e)
    }
}

/// JSON error body of the search surface.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: u16,
}

// ============================================================================
// RESPONSE
// ============================================================================

/// One decoded result row.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchResultItem {
    pub ngram: Vec<String>,
    pub count: u32,
    pub args: Vec<String>,
}

/// The JSON response of the search surface.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub size: usize,
    pub rows: Vec<SearchResultItem>,
    #[serde(rename = "searchTime")]
    pub search_time: f64,
}

// ============================================================================
// SEARCHER
// ============================================================================

/// Search entry point over a data directory holding one subdirectory per
/// corpus.
pub struct Searcher {
    data_path: PathBuf,
}

impl Searcher {
    pub fn new(data_path: PathBuf) -> Self {
        Self { data_path }
    }

    /// Run one query. Dictionaries and columns are loaded for this call
    /// only; concurrent queries do not share mutable state.
    pub fn search(
        &self,
        args: &SearchArgs,
        ctl: &SearchControl,
    ) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();
        let dir = self.data_path.join(&args.corpus_id);
        if !dir.is_dir() {
            return Err(SearchError::CorpusNotFound(args.corpus_id.clone()));
        }

        let dict = WordDictReader::load(&dir)?;
        let mut index = NgramIndex::open(&dir, &args.attrs)?;

        // the phrase becomes a set of literal prefixes; for exact queries
        // that set is a single element
        let (prefixes, final_re) = match args.query_type {
            QueryType::Exact => {
                let prefix = match args.phrase.strip_suffix('*') {
                    Some(stem) => QueryPrefix {
                        text: stem.to_string(),
                        wildcard: true,
                    },
                    None => QueryPrefix {
                        text: args.phrase.clone(),
                        wildcard: false,
                    },
                };
                (vec![prefix], None)
            }
            QueryType::Regex => {
                let prefixes = query::parse(&args.phrase)?;
                let re = regex::Regex::new(&format!("^(?:{})$", args.phrase))
                    .map_err(|e| {
                        SearchError::BadQuery(ParseError {
                            position: 0,
                            message: e.to_string(),
                        })
                    })?;
                (prefixes, Some(re))
            }
        };

        let mut positions: Vec<usize> = Vec::new();
        for prefix in &prefixes {
            if prefix.wildcard {
                for id in dict.find_by_prefix(&prefix.text) {
                    if let Some(pos) = index.col0_index_of(id) {
                        positions.push(pos);
                    }
                }
            } else if let Some(id) = dict.find(&prefix.text) {
                if let Some(pos) = index.col0_index_of(id) {
                    positions.push(pos);
                }
            }
            // a token absent from the dictionary or from first position
            // is an empty result, not an error
        }
        positions.sort_unstable();
        positions.dedup();

        if positions.is_empty() {
            return Ok(SearchResponse {
                size: 0,
                rows: Vec::new(),
                search_time: started.elapsed().as_secs_f64(),
            });
        }

        if let Some(stop) = ctl.stop_reason() {
            return Err(stop);
        }
        let lo = *positions.first().expect("non-empty positions");
        let hi = *positions.last().expect("non-empty positions");
        index.load_range(lo, hi)?;

        let mut result = fan_out(&index, &positions, ctl);
        if let Some(stop) = ctl.stop_reason() {
            return Err(stop);
        }

        if let Some(re) = &final_re {
            result.filter(|row| re.is_match(dict.decode(row.ngram[0])));
        }
        if let Some(limit) = args.limit {
            result.slice(args.offset, args.offset.saturating_add(limit));
        } else if args.offset > 0 {
            result.slice(args.offset, result.size());
        }

        let rows: Vec<SearchResultItem> = result
            .rows()
            .iter()
            .map(|row| SearchResultItem {
                ngram: dict.decode_ngram(&row.ngram),
                count: row.count,
                args: row.args.clone(),
            })
            .collect();
        Ok(SearchResponse {
            size: rows.len(),
            rows,
            search_time: started.elapsed().as_secs_f64(),
        })
    }
}

/// Walk every selected column-0 position, one worker per position, and
/// append worker chunks in arrival order. Workers observe cancellation at
/// the top of their iteration and simply stop producing; the caller turns
/// the flag into an error.
fn fan_out(
    index: &NgramIndex,
    positions: &[usize],
    ctl: &SearchControl,
) -> NgramSearchResult {
    let mut combined = NgramSearchResult::new();
    if positions.len() == 1 {
        // no point paying thread handoff for a single walk
        return index.get_ngrams_at(positions[0]);
    }

    let (tx, rx) = mpsc::sync_channel::<NgramSearchResult>(FANOUT_QUEUE_DEPTH);
    rayon::scope(|scope| {
        scope.spawn(move |_| {
            positions.par_iter().for_each_with(tx, |tx, &pos| {
                if ctl.stop_reason().is_some() {
                    return;
                }
                let chunk = index.get_ngrams_at(pos);
                // a failed send means the aggregator is gone; stop quietly
                let _ = tx.send(chunk);
            });
        });
        for chunk in rx {
            combined.append(chunk);
        }
    });
    combined
}
