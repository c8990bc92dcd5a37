// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Build and search configuration.
//!
//! Both configurations are JSON files with camelCase keys. The build
//! configuration names the token source, the output location, the indexed
//! metadata attributes with their column widths, and the token filters;
//! the search configuration points at the data directory and carries the
//! listen address for whatever service wrapper fronts the searcher.
//!
//! A build writes its corpus into `<outDirectory>/<input file stem>/`; the
//! stem doubles as the corpus id that search requests use.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::column::attr::ColumnWidth;

// ============================================================================
// ERRORS
// ============================================================================

/// Fatal configuration problem, reported at startup.
#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, io::Error),
    Parse(PathBuf, serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "cannot read {}: {}", path.display(), e),
            ConfigError::Parse(path, e) => write!(f, "invalid config {}: {}", path.display(), e),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

// ============================================================================
// BUILD CONFIGURATION
// ============================================================================

/// Kind of token source feeding the build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Vertical,
    Plain,
}

/// Custom n-gram filter selection.
///
/// Historically this pointed at a shared library and a symbol inside it;
/// filters are compiled in now, so only the function name participates in
/// the lookup and `lib` is accepted for compatibility and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NgramFilterConf {
    #[serde(default)]
    pub lib: String,
    #[serde(rename = "fn", default)]
    pub function: String,
}

fn default_min_freq() -> u32 {
    1
}

/// Configuration of `create-index` / `extract-ngrams`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexBuilderConf {
    /// Path to the token source file (plain or gzipped).
    pub input_file_path: PathBuf,

    #[serde(default)]
    pub source_type: SourceType,

    /// Parent directory; the corpus lands in a subdirectory named after
    /// the input file stem.
    pub out_directory: PathBuf,

    /// Drop n-grams occurring fewer times than this.
    #[serde(default = "default_min_freq")]
    pub min_ngram_freq: u32,

    /// Indexed structural attributes: name → column type
    /// (`"col8"` / `"col32"`).
    #[serde(default)]
    pub args: BTreeMap<String, String>,

    /// Tokens that reset the n-gram window (sentence boundary semantics).
    #[serde(default)]
    pub ngram_stop_strings: Vec<String>,

    /// Tokens skipped without resetting the window.
    #[serde(default)]
    pub ngram_ignore_strings: Vec<String>,

    /// Per-position prefix whitelist: an n-gram is kept only if its token
    /// at each listed position starts with the listed prefix.
    #[serde(default)]
    pub ngram_match_prefix: Vec<String>,

    /// Built-in n-gram filter to apply over `(words, tags)`.
    #[serde(default)]
    pub ngram_filter: Option<NgramFilterConf>,

    /// Positional-attribute index supplying the tag column for the filter.
    #[serde(default)]
    pub tag_attr_idx: Option<usize>,

    /// Working directory for external-merge chunks.
    #[serde(default)]
    pub tmp_dir: Option<PathBuf>,

    /// When positive, use the external-merge accumulator and spill every
    /// this-many distinct n-grams.
    #[serde(default)]
    pub proc_chunk_size: usize,

    /// Structural-attribute filter: for every named attribute, a token is
    /// retained only when its value is one of the listed alternatives.
    #[serde(default)]
    pub filter_args: BTreeMap<String, Vec<String>>,
}

impl IndexBuilderConf {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let conf: Self = load_json(path)?;
        conf.attr_widths()?;
        if conf.input_file_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("inputFilePath is not set".into()));
        }
        if conf.out_directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("outDirectory is not set".into()));
        }
        Ok(conf)
    }

    /// Attribute map with parsed column widths.
    pub fn attr_widths(&self) -> Result<BTreeMap<String, ColumnWidth>, ConfigError> {
        let mut out = BTreeMap::new();
        for (name, type_ident) in &self.args {
            let width = ColumnWidth::parse(type_ident).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "unknown column type '{}' for attribute '{}'",
                    type_ident, name
                ))
            })?;
            out.insert(name.clone(), width);
        }
        Ok(out)
    }

    /// Corpus id: the input file name with its last extension stripped
    /// (`corpus.vert.gz` → `corpus.vert`).
    pub fn corpus_id(&self) -> String {
        let name = self
            .input_file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match name.rfind('.') {
            Some(i) if i > 0 => name[..i].to_string(),
            _ => name,
        }
    }

    /// Directory the corpus index is written into.
    pub fn index_dir(&self) -> PathBuf {
        self.out_directory.join(self.corpus_id())
    }

    /// Working directory for merge chunks: `tmpDir` when set, the system
    /// temp directory otherwise.
    pub fn merge_work_dir(&self) -> PathBuf {
        self.tmp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join(format!("engram-{}", self.corpus_id()))
    }
}

// ============================================================================
// SEARCH CONFIGURATION
// ============================================================================

fn default_server_address() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8090
}

/// Configuration of the search surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConf {
    /// Directory holding one subdirectory per corpus.
    pub data_path: PathBuf,

    /// Listen address for a service wrapper around the searcher.
    #[serde(default = "default_server_address")]
    pub server_address: String,

    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

impl SearchConf {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_json(path)
    }
}
