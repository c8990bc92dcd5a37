// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Write-side index construction.
//!
//! The accumulator hands over n-grams in strict lexicographic order, and
//! that order is what makes this writer trivial: consecutive n-grams share
//! a prefix, so each `add` only touches the columns at and below the first
//! position where the new n-gram diverges from the previous one (the split
//! position). Above the split, the parent's `upto` is bumped by one to
//! adopt the new child; below it, fresh rows are appended.
//!
//! Feeding n-grams out of order would silently corrupt the tree, so it is
//! checked on every `add` and treated as a programmer error.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use crate::column::attr::ColumnWidth;
use crate::column::metadata::MetadataWriter;
use crate::column::{AttrColumn, IndexColumn, IndexItem};

/// Builder of the N index columns plus the aligned counts and metadata
/// columns.
pub struct DynamicNgramIndex {
    columns: Vec<IndexColumn>,
    counts: AttrColumn,
    metadata: MetadataWriter,
    /// Row of the most recent write per column; -1 before the first.
    cursors: Vec<isize>,
    initial_len: usize,
}

impl DynamicNgramIndex {
    /// `initial_len` is the preallocated row count per column; columns grow
    /// by half of it whenever they run out.
    pub fn new(
        ngram_size: usize,
        initial_len: usize,
        attrs: &BTreeMap<String, ColumnWidth>,
    ) -> Self {
        Self::with_metadata(ngram_size, initial_len, MetadataWriter::new(attrs, initial_len))
    }

    /// Build around an existing metadata writer whose dictionaries were
    /// already populated during the token scan.
    pub fn with_metadata(
        ngram_size: usize,
        initial_len: usize,
        metadata: MetadataWriter,
    ) -> Self {
        assert!(ngram_size > 0, "n-gram size must be positive");
        Self {
            columns: (0..ngram_size).map(|_| IndexColumn::new(initial_len)).collect(),
            counts: AttrColumn::new_counts(initial_len),
            metadata,
            cursors: vec![-1; ngram_size],
            initial_len,
        }
    }

    pub fn ngram_size(&self) -> usize {
        self.columns.len()
    }

    /// Number of distinct n-grams added so far.
    pub fn len(&self) -> usize {
        (self.cursors[self.columns.len() - 1] + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Access to the metadata writer, for interning attribute values while
    /// the token stream is scanned.
    pub fn metadata_mut(&mut self) -> &mut MetadataWriter {
        &mut self.metadata
    }

    /// Smallest position where `ngram` diverges from the current cursor
    /// path; `None` when it equals the previous n-gram entirely.
    fn split_position(&self, ngram: &[u64]) -> Option<usize> {
        for (i, col) in self.columns.iter().enumerate() {
            if self.cursors[i] < 0 || ngram[i] != col.get(self.cursors[i] as usize).token_id {
                return Some(i);
            }
        }
        None
    }

    fn grow_amount(&self) -> usize {
        (self.initial_len / 2).max(1)
    }

    /// Add the next n-gram with its total count and one metadata record.
    ///
    /// Panics when `ngram` is not strictly greater than the previous one;
    /// the sorted accumulator output upholds this by construction.
    pub fn add(&mut self, ngram: &[u64], count: u32, metadata: &[u32]) {
        assert_eq!(
            ngram.len(),
            self.columns.len(),
            "n-gram width {} does not match index width {}",
            ngram.len(),
            self.columns.len()
        );
        let sp = match self.split_position(ngram) {
            Some(sp) => sp,
            None => panic!("n-grams must be added in strictly ascending order (duplicate)"),
        };
        if self.cursors[sp] >= 0 {
            let at_cursor = self.columns[sp].get(self.cursors[sp] as usize).token_id;
            assert!(
                ngram[sp] > at_cursor,
                "n-grams must be added in strictly ascending order ({} < {} at position {})",
                ngram[sp],
                at_cursor,
                sp
            );
        }

        let n = self.columns.len();
        for i in 0..n {
            if self.cursors[i] + 1 >= self.columns[i].size() as isize {
                let grow = self.grow_amount();
                self.columns[i].extend(grow);
            }
            if i + 1 == sp {
                // existing parent adopted a new child
                let cursor = self.cursors[i] as usize;
                let mut item = self.columns[i].get(cursor);
                item.upto += 1;
                self.columns[i].set(cursor, item);
            } else if i >= sp {
                self.cursors[i] += 1;
                let upto = if i < n - 1 {
                    (self.cursors[i + 1] + 1) as u64
                } else {
                    0
                };
                self.columns[i].set(
                    self.cursors[i] as usize,
                    IndexItem {
                        token_id: ngram[i],
                        upto,
                    },
                );
            }
        }

        let last = self.cursors[n - 1] as usize;
        if last >= self.counts.size() {
            let grow = self.grow_amount();
            self.counts.extend(grow);
        }
        self.counts.set(last, count);
        if last >= self.metadata.size() {
            let grow = self.grow_amount();
            self.metadata.extend(grow);
        }
        self.metadata.set(last, metadata);
    }

    /// Drop the preallocated tail of every column. Call once, after the
    /// last `add`.
    pub fn finish(&mut self) {
        for (i, col) in self.columns.iter_mut().enumerate() {
            col.shrink((self.cursors[i] + 1) as usize);
        }
        let rows = (self.cursors[self.columns.len() - 1] + 1) as usize;
        self.counts.shrink(rows);
        self.metadata.shrink(rows);
    }

    /// Serialize every column, the counts column, and the metadata columns
    /// with their dictionaries into `dir`.
    pub fn save(&mut self, dir: &Path) -> io::Result<()> {
        for (k, col) in self.columns.iter_mut().enumerate() {
            col.save(k, dir)?;
        }
        self.counts.save(dir)?;
        self.metadata.save(dir)?;
        log::info!("saved {}", self.info());
        Ok(())
    }

    /// Human-readable column overview, for build logs.
    pub fn info(&self) -> String {
        let sizes: Vec<String> = self
            .columns
            .iter()
            .map(|c| c.size().to_string())
            .collect();
        format!(
            "n-gram index: {} columns, sizes {}",
            self.columns.len(),
            sizes.join(", ")
        )
    }

    #[cfg(test)]
    pub(crate) fn column(&self, k: usize) -> &IndexColumn {
        &self.columns[k]
    }

    #[cfg(test)]
    pub(crate) fn counts(&self) -> &AttrColumn {
        &self.counts
    }
}
