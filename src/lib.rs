// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Column-oriented n-gram index and search engine for large corpora.
//!
//! Engram ingests a token stream, counts every n-gram of a fixed width N,
//! and persists the result as a read-optimized column store: the n-gram
//! tree flattened into N parallel columns with child-range pointers, plus
//! aligned frequency and metadata columns. Any subtree -- all n-grams
//! sharing a prefix -- is contiguous in every column, so a query loads a
//! handful of byte ranges and nothing else.
//!
//! # Architecture
//!
//! ```text
//!  build:                                 search:
//!  ┌────────────┐                         ┌────────────┐
//!  │  source    │ vertical / plain        │   query    │ regex → prefixes
//!  └─────┬──────┘                         └─────┬──────┘
//!        ▼ bounded channel                      ▼
//!  ┌────────────┐   ┌────────────┐        ┌────────────┐
//!  │  builder   │──▶│   accum    │        │  searcher  │──▶ dict lookup
//!  └─────┬──────┘   └─────┬──────┘        └─────┬──────┘    col-0 ranges
//!        │ dictionaries   │ sorted n-grams      ▼
//!        ▼                ▼                ┌────────────┐
//!  ┌────────────┐   ┌────────────┐        │   index    │ load_range +
//!  │   dict     │◀──│   index    │───────▶│ (read side)│ parallel walks
//!  └────────────┘   │ (dynamic)  │        └────────────┘
//!                   └─────┬──────┘
//!                         ▼
//!                 column files on disk
//! ```
//!
//! The persisted layout of a corpus directory:
//!
//! | file                 | content                                       |
//! |----------------------|-----------------------------------------------|
//! | `words.dict`         | sorted vocabulary, line-per-token             |
//! | `idx_col_<k>.idx`    | tree column k: `(token_id, upto)` u64 pairs   |
//! | `column__counts.idx` | per-n-gram frequencies                        |
//! | `column_<attr>.idx`  | per-n-gram metadata value ids                 |
//! | `column_<attr>.dict` | value dictionary of one metadata attribute    |
//!
//! Indexes are write-once: a build creates the directory, readers never
//! mutate it. Everything a query loads is private to that query or
//! immutable, which keeps concurrent searches lock-free.

pub mod accum;
pub mod builder;
pub mod column;
pub mod config;
pub mod dict;
pub mod index;
pub mod query;
pub mod search;
pub mod source;

// Re-exports for the common build-then-search round trip
pub use builder::{run_build, run_extract, BuildSummary, IndexBuilder};
pub use config::{IndexBuilderConf, SearchConf};
pub use index::{DynamicNgramIndex, NgramIndex, NgramSearchResult};
pub use search::{
    CancelToken, QueryType, SearchArgs, SearchControl, SearchError, SearchResponse, Searcher,
};
