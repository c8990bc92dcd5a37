// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Read side of the n-gram index.
//!
//! A query touches one contiguous range per column. `load_range` resolves
//! those ranges top-down: the column-0 range is given, and each deeper
//! range is `[C(k)[from-1].upto + 1, C(k)[to].upto]` -- exactly the
//! children of the rows above. Only those byte ranges are read from disk;
//! the traversal afterwards runs entirely in memory and stays inside the
//! loaded windows by construction.
//!
//! Column 0 is loaded whole at open time. It is the smallest column, and
//! exact lookups need to binary search it by token id anyway.

pub mod dynamic;
pub mod result;

use std::io;
use std::path::Path;

use crate::column::metadata::MetadataReader;
use crate::column::{col_idx_path, AttrColumn, IndexColumn};

pub use dynamic::DynamicNgramIndex;
pub use result::{NgramSearchResult, ResultRow};

/// Largest supported n-gram width; bounds the column-file probe at open.
pub const MAX_NGRAM_SIZE: usize = 10;

/// File-bound n-gram index: N token columns, the counts column, and the
/// metadata columns of the attributes a query asked for.
pub struct NgramIndex {
    columns: Vec<IndexColumn>,
    counts: AttrColumn,
    metadata: MetadataReader,
}

impl NgramIndex {
    /// Open the index inside a corpus directory. The n-gram width is
    /// discovered by probing `idx_col_<k>.idx` files; `attrs` selects the
    /// metadata columns to bind.
    pub fn open(dir: &Path, attrs: &[String]) -> io::Result<Self> {
        let mut columns = Vec::new();
        for k in 0..MAX_NGRAM_SIZE {
            let path = col_idx_path(dir, k);
            if !path.is_file() {
                break;
            }
            columns.push(IndexColumn::open(path)?);
        }
        if columns.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no index columns found in {}", dir.display()),
            ));
        }
        columns[0].load_whole()?;
        Ok(Self {
            columns,
            counts: AttrColumn::open_counts(dir)?,
            metadata: MetadataReader::open(dir, attrs)?,
        })
    }

    /// Width of the indexed n-grams.
    pub fn ngram_size(&self) -> usize {
        self.columns.len()
    }

    /// Number of distinct first tokens.
    pub fn col0_size(&self) -> usize {
        self.columns[0].size()
    }

    /// Column-0 row holding `token_id`, if the token ever appears in first
    /// position. Column 0 is sorted by token id (sibling ordering of the
    /// root's children), so this is a binary search.
    pub fn col0_index_of(&self, token_id: u64) -> Option<usize> {
        let col = &self.columns[0];
        let mut lo = 0usize;
        let mut hi = col.size();
        while lo < hi {
            let mid = (lo + hi) / 2;
            if col.get(mid).token_id < token_id {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo < col.size() && col.get(lo).token_id == token_id {
            Some(lo)
        } else {
            None
        }
    }

    /// Load every chunk the walks over column-0 rows `[from, to]` will
    /// touch: the deeper index columns, the counts, and the metadata.
    pub fn load_range(&mut self, from: usize, to: usize) -> io::Result<()> {
        if to >= self.columns[0].size() || from > to {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "column-0 range [{}, {}] out of bounds ({} rows)",
                    from,
                    to,
                    self.columns[0].size()
                ),
            ));
        }
        let mut range = (from, to);
        for k in 1..self.columns.len() {
            let parent = &self.columns[k - 1];
            let child_from = if range.0 == 0 {
                0
            } else {
                parent.get(range.0 - 1).upto as usize + 1
            };
            let child_to = parent.get(range.1).upto as usize;
            self.columns[k].load_chunk(child_from, child_to)?;
            range = (child_from, child_to);
        }
        self.counts.load_chunk(range.0, range.1)?;
        self.metadata.load_chunk(range.0, range.1)?;
        Ok(())
    }

    /// All n-grams whose column-0 row is `pos0`, with counts and decoded
    /// metadata. The needed range must have been loaded via `load_range`.
    pub fn get_ngrams_at(&self, pos0: usize) -> NgramSearchResult {
        let mut result = NgramSearchResult::new();
        let mut prefix = Vec::with_capacity(self.columns.len());
        self.walk(0, pos0, pos0, &mut prefix, &mut result);
        result.reset_cursor();
        result
    }

    /// Depth-first walk over rows `[from, to]` of column `k`, extending
    /// `prefix` with each row's token and descending into its child range.
    fn walk(
        &self,
        k: usize,
        from: usize,
        to: usize,
        prefix: &mut Vec<u64>,
        result: &mut NgramSearchResult,
    ) {
        let col = &self.columns[k];
        for i in from..=to {
            let item = col.get(i);
            prefix.push(item.token_id);
            if k + 1 == self.columns.len() {
                result.push(ResultRow {
                    ngram: prefix.clone(),
                    count: self.counts.get(i),
                    args: self.metadata.get(i),
                });
            } else {
                let child_from = if i == 0 {
                    0
                } else {
                    col.get(i - 1).upto as usize + 1
                };
                let child_to = item.upto as usize;
                self.walk(k + 1, child_from, child_to, prefix, result);
            }
            prefix.pop();
        }
    }
}
