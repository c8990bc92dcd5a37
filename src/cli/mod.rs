// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! CLI definitions for the engram command-line interface.
//!
//! Four subcommands: `create-index` builds a corpus index from a
//! configured token source, `extract-ngrams` dumps the raw sorted
//! n-gram/count table without building columns, `search` runs a one-shot
//! query against a built corpus (as a readable table or as the JSON body
//! the search surface serves), and `inspect` shows the column structure
//! of a built corpus directory.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "engram",
    about = "Column-oriented n-gram index and search engine",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a persisted n-gram index from the configured token source
    CreateIndex {
        /// Build configuration file (JSON)
        conf: PathBuf,

        /// Width of the indexed n-grams
        #[arg(long, default_value_t = 2)]
        ngram_size: usize,
    },

    /// Dump the sorted n-gram/count table without building an index
    ExtractNgrams {
        /// Build configuration file (JSON)
        conf: PathBuf,

        /// Width of the extracted n-grams
        #[arg(long, default_value_t = 2)]
        ngram_size: usize,
    },

    /// Show the structure of a built corpus
    Inspect {
        /// Corpus id (the subdirectory name inside the data directory)
        corpus: String,

        /// Data directory holding corpora (overrides the configuration)
        #[arg(long)]
        data_path: Option<PathBuf>,

        /// Search configuration file (JSON) supplying dataPath
        #[arg(long)]
        conf_path: Option<PathBuf>,
    },

    /// Query a built corpus
    Search {
        /// Corpus id (the subdirectory name inside the data directory)
        corpus: String,

        /// Query phrase; a trailing '*' means prefix search, and
        /// `--qtype regexp` switches to regular-expression queries
        query: String,

        /// Data directory holding corpora (overrides the configuration)
        #[arg(long)]
        data_path: Option<PathBuf>,

        /// Search configuration file (JSON) supplying dataPath
        #[arg(long)]
        conf_path: Option<PathBuf>,

        /// Metadata attributes to return with each row
        #[arg(long, value_delimiter = ',')]
        attrs: Vec<String>,

        /// Rows to skip from the beginning of the result
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Maximum rows to return; negative means unlimited
        #[arg(long, default_value_t = -1)]
        limit: i64,

        /// Query interpretation: `default` or `regexp`
        #[arg(long, default_value = "default")]
        qtype: String,

        /// Per-query deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print the JSON response body instead of a table
        #[arg(long)]
        json: bool,
    },
}
