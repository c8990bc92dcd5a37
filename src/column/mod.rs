// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! On-disk index columns.
//!
//! An n-gram index of width N is a tree flattened into N parallel columns.
//! Column k stores, for every node at depth k, the node's token id and the
//! inclusive index of its last child in column k+1 (`upto`). Siblings are
//! contiguous and sorted by token id, so any subtree -- every n-gram sharing
//! a prefix -- is a contiguous slice of each column. That is the whole point
//! of the layout: a search touches one byte range per column, not a pointer
//! chase across the file.
//!
//! Columns load either whole (`load_whole`) or as a dense chunk
//! (`load_chunk`). A chunk load for rows `[from, to]` actually starts at
//! `from - 1`, because walking the tree needs the previous row's `upto` to
//! find where a child range begins. After a chunk load, `get(i)` still takes
//! logical row numbers; the column remembers its offset.
//!
//! # Wire Format (`idx_col_<k>.idx`)
//!
//! ```text
//! count: u64 LE
//! count × record:
//!   token_id: u64 LE
//!   upto:     u64 LE
//! ```

pub mod attr;
pub mod metadata;

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub use attr::{AttrColumn, ColumnWidth, COUNTS_COLUMN_NAME};
pub use metadata::{MetadataReader, MetadataWriter};

/// Bytes per stored record: two u64 fields.
const RECORD_SIZE: usize = 16;
/// Bytes before the first record: the u64 count.
const HEADER_SIZE: u64 = 8;

/// Path of the column file for tree depth `k` inside a corpus directory.
pub fn col_idx_path(dir: &Path, k: usize) -> PathBuf {
    dir.join(format!("idx_col_{}.idx", k))
}

/// One tree node: the k-th token of some n-gram and the inclusive index of
/// its last child in the next column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexItem {
    pub token_id: u64,
    pub upto: u64,
}

/// A single index column, either in-memory (build side) or bound to a file
/// (read side, possibly partially loaded).
#[derive(Debug)]
pub struct IndexColumn {
    data: Vec<IndexItem>,
    /// Logical row number of `data[0]` after a partial load.
    offset: usize,
    /// Number of records on disk (0 until saved or opened).
    full_size: usize,
    path: Option<PathBuf>,
}

impl IndexColumn {
    /// Fresh in-memory column with `initial_len` zeroed rows (build side).
    pub fn new(initial_len: usize) -> Self {
        Self {
            data: vec![IndexItem::default(); initial_len],
            offset: 0,
            full_size: 0,
            path: None,
        }
    }

    /// Bind to an existing column file without loading its payload. The
    /// header is read once so `stored_size` is known up front.
    pub fn open(path: PathBuf) -> io::Result<Self> {
        let mut f = File::open(&path)?;
        let mut buf = [0u8; 8];
        f.read_exact(&mut buf)?;
        Ok(Self {
            data: Vec::new(),
            offset: 0,
            full_size: u64::from_le_bytes(buf) as usize,
            path: Some(path),
        })
    }

    /// Number of records currently in memory.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Number of records on disk.
    pub fn stored_size(&self) -> usize {
        self.full_size
    }

    /// Logical row number of the first loaded record.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Record at logical row `idx`. Panics when the row is not loaded;
    /// `load_range` on the index guarantees it is.
    pub fn get(&self, idx: usize) -> IndexItem {
        self.data[idx - self.offset]
    }

    /// Overwrite the record at logical row `idx` (build side).
    pub fn set(&mut self, idx: usize, item: IndexItem) {
        self.data[idx - self.offset] = item;
    }

    /// Append `n` zeroed rows.
    pub fn extend(&mut self, n: usize) {
        self.data
            .resize(self.data.len() + n, IndexItem::default());
    }

    /// Truncate to `new_len` rows, dropping preallocated spare capacity.
    /// Shrinking must never enlarge; that would fabricate records.
    pub fn shrink(&mut self, new_len: usize) {
        assert!(
            new_len <= self.data.len(),
            "cannot shrink column to a larger size ({} > {})",
            new_len,
            self.data.len()
        );
        self.data.truncate(new_len);
    }

    /// Write the column as `idx_col_<k>.idx` into `dir` and bind to it.
    pub fn save(&mut self, k: usize, dir: &Path) -> io::Result<()> {
        let path = col_idx_path(dir, k);
        let mut w = io::BufWriter::new(File::create(&path)?);
        w.write_all(&(self.data.len() as u64).to_le_bytes())?;
        for item in &self.data {
            w.write_all(&item.token_id.to_le_bytes())?;
            w.write_all(&item.upto.to_le_bytes())?;
        }
        w.flush()?;
        self.full_size = self.data.len();
        self.path = Some(path);
        Ok(())
    }

    fn bound_path(&self) -> io::Result<&Path> {
        self.path.as_deref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "index column is not bound to a file",
            )
        })
    }

    /// Load every record from disk.
    pub fn load_whole(&mut self) -> io::Result<()> {
        let path = self.bound_path()?.to_path_buf();
        let mut f = File::open(&path)?;
        let mut buf = [0u8; 8];
        f.read_exact(&mut buf)?;
        self.full_size = u64::from_le_bytes(buf) as usize;

        let mut raw = vec![0u8; self.full_size * RECORD_SIZE];
        f.read_exact(&mut raw)?;
        self.data.clear();
        self.data.reserve(self.full_size);
        for rec in raw.chunks_exact(RECORD_SIZE) {
            self.data.push(decode_record(rec));
        }
        self.offset = 0;
        Ok(())
    }

    /// Load rows `[from, to]` (inclusive) plus row `from - 1` when it
    /// exists -- the walk needs the previous `upto` to bound child ranges.
    /// The file handle is scoped to this call.
    pub fn load_chunk(&mut self, from: usize, to: usize) -> io::Result<()> {
        let path = self.bound_path()?.to_path_buf();
        let mut f = File::open(&path)?;
        let mut buf = [0u8; 8];
        f.read_exact(&mut buf)?;
        self.full_size = u64::from_le_bytes(buf) as usize;

        if to >= self.full_size || from > to {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "chunk [{}, {}] out of bounds for column of {} records",
                    from, to, self.full_size
                ),
            ));
        }
        let from = from.saturating_sub(1);
        let n = to + 1 - from;

        f.seek(SeekFrom::Start(HEADER_SIZE + (from * RECORD_SIZE) as u64))?;
        let mut raw = vec![0u8; n * RECORD_SIZE];
        f.read_exact(&mut raw)?;
        self.data.clear();
        self.data.reserve(n);
        for rec in raw.chunks_exact(RECORD_SIZE) {
            self.data.push(decode_record(rec));
        }
        self.offset = from;
        Ok(())
    }
}

fn decode_record(rec: &[u8]) -> IndexItem {
    let token_id = u64::from_le_bytes(rec[0..8].try_into().unwrap());
    let upto = u64::from_le_bytes(rec[8..16].try_into().unwrap());
    IndexItem { token_id, upto }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_column(n: usize) -> IndexColumn {
        let mut col = IndexColumn::new(n);
        for i in 0..n {
            col.set(
                i,
                IndexItem {
                    token_id: (i * 7) as u64,
                    upto: (i * 2 + 1) as u64,
                },
            );
        }
        col
    }

    #[test]
    fn save_load_whole_round_trip() {
        let dir = tempdir().unwrap();
        let mut col = sample_column(10);
        col.save(0, dir.path()).unwrap();

        let mut loaded = IndexColumn::open(col_idx_path(dir.path(), 0)).unwrap();
        assert_eq!(loaded.stored_size(), 10);
        assert_eq!(loaded.size(), 0);
        loaded.load_whole().unwrap();
        assert_eq!(loaded.size(), 10);
        for i in 0..10 {
            assert_eq!(loaded.get(i), col.get(i));
        }
    }

    #[test]
    fn chunk_load_includes_previous_row() {
        let dir = tempdir().unwrap();
        let mut col = sample_column(20);
        col.save(1, dir.path()).unwrap();

        let mut loaded = IndexColumn::open(col_idx_path(dir.path(), 1)).unwrap();
        loaded.load_chunk(5, 9).unwrap();
        // rows 4..=9 are present, addressed by logical row number
        assert_eq!(loaded.size(), 6);
        assert_eq!(loaded.offset(), 4);
        for i in 4..=9 {
            assert_eq!(loaded.get(i), col.get(i));
        }
    }

    #[test]
    fn chunk_load_from_zero_has_no_previous_row() {
        let dir = tempdir().unwrap();
        let mut col = sample_column(8);
        col.save(0, dir.path()).unwrap();

        let mut loaded = IndexColumn::open(col_idx_path(dir.path(), 0)).unwrap();
        loaded.load_chunk(0, 3).unwrap();
        assert_eq!(loaded.size(), 4);
        assert_eq!(loaded.offset(), 0);
        assert_eq!(loaded.get(0), col.get(0));
        assert_eq!(loaded.get(3), col.get(3));
    }

    #[test]
    fn repeated_chunk_load_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut col = sample_column(16);
        col.save(2, dir.path()).unwrap();

        let mut loaded = IndexColumn::open(col_idx_path(dir.path(), 2)).unwrap();
        loaded.load_chunk(6, 12).unwrap();
        let first: Vec<IndexItem> = (5..=12).map(|i| loaded.get(i)).collect();
        loaded.load_chunk(6, 12).unwrap();
        let second: Vec<IndexItem> = (5..=12).map(|i| loaded.get(i)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn chunk_out_of_bounds_is_an_error() {
        let dir = tempdir().unwrap();
        let mut col = sample_column(4);
        col.save(0, dir.path()).unwrap();
        let mut loaded = IndexColumn::open(col_idx_path(dir.path(), 0)).unwrap();
        assert!(loaded.load_chunk(2, 4).is_err());
    }

    #[test]
    #[should_panic(expected = "cannot shrink")]
    fn shrink_to_larger_panics() {
        let mut col = IndexColumn::new(4);
        col.shrink(5);
    }

    #[test]
    fn shrink_drops_spare_rows() {
        let mut col = sample_column(6);
        col.extend(10);
        assert_eq!(col.size(), 16);
        col.shrink(6);
        assert_eq!(col.size(), 6);
        assert_eq!(col.get(5).token_id, 35);
    }
}
