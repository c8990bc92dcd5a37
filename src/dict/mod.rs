// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Word dictionary: the token ↔ integer mapping every column refers to.
//!
//! The on-disk form is deliberately boring -- a text file, one token per
//! line, sorted, with the count on the first line -- so it can be inspected
//! with `head` and diffed between builds. Position in the file IS the token
//! id, stable for the lifetime of the index.
//!
//! Two lookup overlays serve the read side: the sorted array answers exact
//! lookups by binary search, the radix tree answers prefix enumeration.
//! Both are built once at load and never mutated, so concurrent readers
//! need no locking.
//!
//! # Wire Format (`words.dict`)
//!
//! ```text
//! count: decimal integer, LF
//! token[0], LF      (lexicographically smallest)
//! token[1], LF
//! ...
//! ```

pub mod attrs;
pub mod radix;

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub use attrs::{AttrDictReader, AttrDictWriter};
pub use radix::RadixTree;

/// File name of the word dictionary inside a corpus directory.
pub const WORDS_DICT_FILE: &str = "words.dict";

// ============================================================================
// WRITER
// ============================================================================

/// Collects tokens during a build and assigns the final sorted ids.
///
/// Ids handed out before `finalize` are provisional insertion numbers and
/// must not leak into the index; `finalize` sorts the vocabulary and
/// renumbers every token to its sorted position.
#[derive(Debug, Default)]
pub struct WordDictWriter {
    index: HashMap<String, u64>,
    finalized: bool,
}

impl WordDictWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token; adding an already-present token is a no-op.
    pub fn add_token(&mut self, token: &str) {
        let next = self.index.len() as u64;
        self.index.entry(token.to_string()).or_insert(next);
    }

    /// Number of distinct tokens collected so far.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Sort the vocabulary and renumber ids to sorted positions.
    pub fn finalize(&mut self) {
        let mut words: Vec<&str> = self.index.keys().map(|s| s.as_str()).collect();
        words.sort_unstable();
        let renumbered: HashMap<String, u64> = words
            .into_iter()
            .enumerate()
            .map(|(i, w)| (w.to_string(), i as u64))
            .collect();
        self.index = renumbered;
        self.finalized = true;
    }

    /// Final id of a token. Meaningless before `finalize`; `None` when the
    /// token never passed through `add_token`.
    pub fn token_index(&self, token: &str) -> Option<u64> {
        debug_assert!(self.finalized, "token_index before finalize");
        self.index.get(token).copied()
    }

    /// Write `words.dict` into `dir`. Requires a prior `finalize`.
    pub fn save(&self, dir: &Path) -> io::Result<()> {
        assert!(self.finalized, "save before finalize");
        let mut words: Vec<&str> = self.index.keys().map(|s| s.as_str()).collect();
        words.sort_unstable();
        let f = File::create(dir.join(WORDS_DICT_FILE))?;
        let mut w = BufWriter::new(f);
        writeln!(w, "{}", words.len())?;
        for word in words {
            writeln!(w, "{}", word)?;
        }
        w.flush()
    }
}

// ============================================================================
// READER
// ============================================================================

/// Immutable word dictionary loaded from `words.dict`.
#[derive(Debug)]
pub struct WordDictReader {
    data: Vec<String>,
    tree: RadixTree,
}

impl WordDictReader {
    /// Load the dictionary from a corpus directory, building both lookup
    /// overlays in one pass.
    pub fn load(dir: &Path) -> io::Result<Self> {
        let path = dir.join(WORDS_DICT_FILE);
        let f = File::open(&path)?;
        let mut lines = BufReader::new(f).lines();
        let count: usize = match lines.next() {
            Some(first) => first?.trim().parse().map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{}: bad count line: {}", path.display(), e),
                )
            })?,
            None => 0,
        };
        let mut data = Vec::with_capacity(count);
        let mut tree = RadixTree::new();
        for line in lines {
            let word = line?;
            tree.add(&word, data.len() as u64);
            data.push(word);
        }
        if data.len() != count {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{}: header says {} words, file has {}",
                    path.display(),
                    count,
                    data.len()
                ),
            ));
        }
        Ok(Self { data, tree })
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Exact lookup, O(log n) over the sorted array.
    pub fn find(&self, word: &str) -> Option<u64> {
        self.data
            .binary_search_by(|probe| probe.as_str().cmp(word))
            .ok()
            .map(|i| i as u64)
    }

    /// Ids of all words starting with `prefix`, via the radix tree.
    pub fn find_by_prefix(&self, prefix: &str) -> Vec<u64> {
        self.tree.find_indices_by_prefix(prefix)
    }

    /// Token text for an id. Panics on an id outside the dictionary, which
    /// would mean a corrupted column referenced a nonexistent word.
    pub fn decode(&self, id: u64) -> &str {
        &self.data[id as usize]
    }

    /// Decode a whole encoded n-gram.
    pub fn decode_ngram(&self, ngram: &[u64]) -> Vec<String> {
        ngram.iter().map(|&id| self.decode(id).to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writer_sorts_and_renumbers() {
        let mut w = WordDictWriter::new();
        for t in ["the", "cat", "sat", "on", "the", "mat"] {
            w.add_token(t);
        }
        assert_eq!(w.len(), 5);
        w.finalize();
        // sorted order: cat, mat, on, sat, the
        assert_eq!(w.token_index("cat"), Some(0));
        assert_eq!(w.token_index("mat"), Some(1));
        assert_eq!(w.token_index("on"), Some(2));
        assert_eq!(w.token_index("sat"), Some(3));
        assert_eq!(w.token_index("the"), Some(4));
        assert_eq!(w.token_index("dog"), None);
    }

    #[test]
    fn round_trip_through_disk() {
        let dir = tempdir().unwrap();
        let mut w = WordDictWriter::new();
        for t in ["romane", "romanus", "romulus", "rubens", "ruber", "rubicon", "voltron"] {
            w.add_token(t);
        }
        w.finalize();
        w.save(dir.path()).unwrap();

        let r = WordDictReader::load(dir.path()).unwrap();
        assert_eq!(r.len(), 7);
        assert_eq!(r.find("romane"), Some(0));
        assert_eq!(r.find("voltron"), Some(6));
        assert_eq!(r.find("romix"), None);
        assert_eq!(r.decode(3), "rubens");

        let mut ids = r.find_by_prefix("rom");
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(r.find_by_prefix("romix").is_empty());
    }

    #[test]
    fn empty_dictionary_round_trips() {
        let dir = tempdir().unwrap();
        let mut w = WordDictWriter::new();
        w.finalize();
        w.save(dir.path()).unwrap();
        let r = WordDictReader::load(dir.path()).unwrap();
        assert!(r.is_empty());
        assert_eq!(r.find("anything"), None);
    }

    #[test]
    fn file_format_is_count_then_sorted_lines() {
        let dir = tempdir().unwrap();
        let mut w = WordDictWriter::new();
        w.add_token("b");
        w.add_token("a");
        w.finalize();
        w.save(dir.path()).unwrap();
        let text = std::fs::read_to_string(dir.path().join(WORDS_DICT_FILE)).unwrap();
        assert_eq!(text, "2\na\nb\n");
    }
}
