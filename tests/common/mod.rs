// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures: build a small corpus on disk, query it back.

// not every test binary uses every helper
#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use engram::builder::run_build;
use engram::config::IndexBuilderConf;
use engram::search::{
    QueryType, SearchArgs, SearchControl, SearchResponse, Searcher,
};

/// A corpus built into a temp directory, ready for searching.
pub struct CorpusFixture {
    _tmp: TempDir,
    pub data_path: PathBuf,
    pub corpus_id: String,
}

impl CorpusFixture {
    /// Build an index from raw vertical-file content.
    pub fn from_vertical(content: &str, ngram_size: usize) -> Self {
        Self::from_vertical_with(content, ngram_size, |_| {})
    }

    /// Same, with a hook to adjust the build configuration.
    pub fn from_vertical_with(
        content: &str,
        ngram_size: usize,
        adjust: impl FnOnce(&mut IndexBuilderConf),
    ) -> Self {
        let tmp = TempDir::new().expect("temp dir");
        let input = tmp.path().join("corpus.vert");
        fs::write(&input, content).expect("write vertical file");
        let out = tmp.path().join("indexes");

        let mut conf = IndexBuilderConf {
            input_file_path: input,
            out_directory: out.clone(),
            min_ngram_freq: 1,
            ..IndexBuilderConf::default()
        };
        adjust(&mut conf);
        let summary = run_build(&conf, ngram_size).expect("build");

        Self {
            _tmp: tmp,
            data_path: out,
            corpus_id: summary.corpus_id,
        }
    }

    /// Build from a flat token stream, one token per line.
    pub fn from_tokens(tokens: &[&str], ngram_size: usize) -> Self {
        Self::from_tokens_with(tokens, ngram_size, |_| {})
    }

    pub fn from_tokens_with(
        tokens: &[&str],
        ngram_size: usize,
        adjust: impl FnOnce(&mut IndexBuilderConf),
    ) -> Self {
        let content = tokens.join("\n") + "\n";
        Self::from_vertical_with(&content, ngram_size, adjust)
    }

    pub fn searcher(&self) -> Searcher {
        Searcher::new(self.data_path.clone())
    }

    /// One-shot exact query with default paging.
    pub fn search_exact(&self, phrase: &str) -> SearchResponse {
        self.search(phrase, QueryType::Exact, &[], 0, None)
    }

    pub fn search(
        &self,
        phrase: &str,
        query_type: QueryType,
        attrs: &[&str],
        offset: usize,
        limit: Option<usize>,
    ) -> SearchResponse {
        let args = SearchArgs {
            corpus_id: self.corpus_id.clone(),
            phrase: phrase.to_string(),
            attrs: attrs.iter().map(|a| a.to_string()).collect(),
            offset,
            limit,
            query_type,
        };
        self.searcher()
            .search(&args, &SearchControl::default())
            .expect("search")
    }
}

/// Rows as `(joined n-gram, count)` pairs, sorted for order-insensitive
/// comparison (the multi-position fan-out appends in arrival order).
pub fn sorted_rows(response: &SearchResponse) -> Vec<(String, u32)> {
    let mut rows: Vec<(String, u32)> = response
        .rows
        .iter()
        .map(|r| (r.ngram.join(" "), r.count))
        .collect();
    rows.sort();
    rows
}
