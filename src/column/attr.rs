// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Dense metadata and count columns.
//!
//! These are flat arrays of unsigned integers aligned 1:1 with the deepest
//! index column: row i of every attribute column belongs to the i-th
//! distinct n-gram. Values are ids into the attribute's dictionary, so the
//! column itself can be narrow -- one byte when the attribute has at most
//! 256 distinct values, four bytes otherwise. The width is chosen per
//! attribute in the build configuration and recorded in the file header, so
//! a reader never has to guess.
//!
//! # Wire Format (`column_<attr>.idx`, `column__counts.idx`)
//!
//! ```text
//! count:  u64 LE
//! flags:  8 bytes; flags[0] = item width in bits (8 or 32), rest reserved
//! count × item: u8 or u32 LE
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// The counts column is stored under this pseudo-attribute name, which
/// yields the `column__counts.idx` file name.
pub const COUNTS_COLUMN_NAME: &str = "_counts";

/// Bytes before the first item: u64 count + 8 flag bytes.
const HEADER_SIZE: u64 = 16;

fn attr_col_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("column_{}.idx", name))
}

/// Storage width of one attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnWidth {
    /// One byte per item; attribute may have at most 256 distinct values.
    Col8,
    /// Four bytes per item.
    Col32,
}

impl ColumnWidth {
    /// Parse the configuration spelling (`"col8"` / `"col32"`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "col8" => Some(Self::Col8),
            "col32" => Some(Self::Col32),
            _ => None,
        }
    }

    pub fn unit_size(self) -> usize {
        match self {
            Self::Col8 => 1,
            Self::Col32 => 4,
        }
    }

    pub fn bits(self) -> u8 {
        (self.unit_size() * 8) as u8
    }

    /// Whether a dictionary id is representable at this width.
    pub fn fits(self, value: u32) -> bool {
        match self {
            Self::Col8 => value <= u8::MAX as u32,
            Self::Col32 => true,
        }
    }
}

impl fmt::Display for ColumnWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Col8 => write!(f, "col8"),
            Self::Col32 => write!(f, "col32"),
        }
    }
}

#[derive(Debug, Clone)]
enum Items {
    Byte(Vec<u8>),
    Word(Vec<u32>),
}

impl Items {
    fn len(&self) -> usize {
        match self {
            Items::Byte(v) => v.len(),
            Items::Word(v) => v.len(),
        }
    }
}

/// One dense attribute (or counts) column.
#[derive(Debug)]
pub struct AttrColumn {
    name: String,
    items: Items,
    /// Logical row number of the first in-memory item after a partial load.
    offset: usize,
    full_size: usize,
    path: Option<PathBuf>,
}

impl AttrColumn {
    /// Fresh in-memory column with `initial_len` zeroed items (build side).
    pub fn new(name: &str, width: ColumnWidth, initial_len: usize) -> Self {
        let items = match width {
            ColumnWidth::Col8 => Items::Byte(vec![0; initial_len]),
            ColumnWidth::Col32 => Items::Word(vec![0; initial_len]),
        };
        Self {
            name: name.to_string(),
            items,
            offset: 0,
            full_size: 0,
            path: None,
        }
    }

    /// Fresh counts column (always 32-bit).
    pub fn new_counts(initial_len: usize) -> Self {
        Self::new(COUNTS_COLUMN_NAME, ColumnWidth::Col32, initial_len)
    }

    /// Bind to an existing `column_<name>.idx` without loading the payload.
    /// The header determines the item width.
    pub fn open(dir: &Path, name: &str) -> io::Result<Self> {
        let path = attr_col_path(dir, name);
        let mut f = File::open(&path)?;
        let mut header = [0u8; 16];
        f.read_exact(&mut header)?;
        let full_size = u64::from_le_bytes(header[0..8].try_into().unwrap()) as usize;
        let items = match header[8] {
            8 => Items::Byte(Vec::new()),
            32 => Items::Word(Vec::new()),
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "{}: unsupported item width {} bits",
                        path.display(),
                        other
                    ),
                ))
            }
        };
        Ok(Self {
            name: name.to_string(),
            items,
            offset: 0,
            full_size,
            path: Some(path),
        })
    }

    /// Bind to the counts column of a corpus directory.
    pub fn open_counts(dir: &Path) -> io::Result<Self> {
        Self::open(dir, COUNTS_COLUMN_NAME)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> ColumnWidth {
        match self.items {
            Items::Byte(_) => ColumnWidth::Col8,
            Items::Word(_) => ColumnWidth::Col32,
        }
    }

    /// Number of items currently in memory.
    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Number of items on disk.
    pub fn stored_size(&self) -> usize {
        self.full_size
    }

    /// Item at logical row `idx`.
    pub fn get(&self, idx: usize) -> u32 {
        match &self.items {
            Items::Byte(v) => v[idx - self.offset] as u32,
            Items::Word(v) => v[idx - self.offset],
        }
    }

    /// Store an item at logical row `idx`. The caller is responsible for
    /// checking `width().fits(value)` first; an unrepresentable value is a
    /// programmer error here.
    pub fn set(&mut self, idx: usize, value: u32) {
        match &mut self.items {
            Items::Byte(v) => {
                assert!(
                    value <= u8::MAX as u32,
                    "value {} does not fit 8-bit column '{}'",
                    value,
                    self.name
                );
                v[idx - self.offset] = value as u8;
            }
            Items::Word(v) => v[idx - self.offset] = value,
        }
    }

    /// Append `n` zeroed items.
    pub fn extend(&mut self, n: usize) {
        match &mut self.items {
            Items::Byte(v) => v.resize(v.len() + n, 0),
            Items::Word(v) => v.resize(v.len() + n, 0),
        }
    }

    /// Truncate to `new_len` items; enlarging is forbidden.
    pub fn shrink(&mut self, new_len: usize) {
        assert!(
            new_len <= self.items.len(),
            "cannot shrink column '{}' to a larger size ({} > {})",
            self.name,
            new_len,
            self.items.len()
        );
        match &mut self.items {
            Items::Byte(v) => v.truncate(new_len),
            Items::Word(v) => v.truncate(new_len),
        }
    }

    /// Write the column into `dir` and bind to the created file.
    pub fn save(&mut self, dir: &Path) -> io::Result<()> {
        let path = attr_col_path(dir, &self.name);
        let mut w = io::BufWriter::new(File::create(&path)?);
        w.write_all(&(self.items.len() as u64).to_le_bytes())?;
        let mut flags = [0u8; 8];
        flags[0] = self.width().bits();
        w.write_all(&flags)?;
        match &self.items {
            Items::Byte(v) => w.write_all(v)?,
            Items::Word(v) => {
                for &item in v {
                    w.write_all(&item.to_le_bytes())?;
                }
            }
        }
        w.flush()?;
        self.full_size = self.items.len();
        self.path = Some(path);
        log::debug!("saved column '{}' ({})", self.name, self.width());
        Ok(())
    }

    fn bound_path(&self) -> io::Result<&Path> {
        self.path.as_deref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("attr column '{}' is not bound to a file", self.name),
            )
        })
    }

    /// Load every item from disk.
    pub fn load_whole(&mut self) -> io::Result<()> {
        let full = self.stored_or_read_size()?;
        self.load_chunk_inner(0, full.saturating_sub(1), full)
    }

    /// Load items `[from, to]` (inclusive) plus item `from - 1` when it
    /// exists, mirroring the index-column chunk contract so both stay
    /// aligned during a range load.
    pub fn load_chunk(&mut self, from: usize, to: usize) -> io::Result<()> {
        let full = self.stored_or_read_size()?;
        if to >= full || from > to {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "chunk [{}, {}] out of bounds for column '{}' of {} items",
                    from, to, self.name, full
                ),
            ));
        }
        self.load_chunk_inner(from, to, full)
    }

    fn stored_or_read_size(&mut self) -> io::Result<usize> {
        let path = self.bound_path()?.to_path_buf();
        let mut f = File::open(path)?;
        let mut header = [0u8; 16];
        f.read_exact(&mut header)?;
        self.full_size = u64::from_le_bytes(header[0..8].try_into().unwrap()) as usize;
        Ok(self.full_size)
    }

    fn load_chunk_inner(&mut self, from: usize, to: usize, full: usize) -> io::Result<()> {
        if full == 0 {
            match &mut self.items {
                Items::Byte(v) => v.clear(),
                Items::Word(v) => v.clear(),
            }
            self.offset = 0;
            return Ok(());
        }
        let from = from.saturating_sub(1);
        let n = to + 1 - from;
        let unit = self.width().unit_size();

        let path = self.bound_path()?.to_path_buf();
        let mut f = File::open(path)?;
        f.seek(SeekFrom::Start(HEADER_SIZE + (from * unit) as u64))?;
        let mut raw = vec![0u8; n * unit];
        f.read_exact(&mut raw)?;
        match &mut self.items {
            Items::Byte(v) => {
                v.clear();
                v.extend_from_slice(&raw);
            }
            Items::Word(v) => {
                v.clear();
                v.reserve(n);
                for chunk in raw.chunks_exact(4) {
                    v.push(u32::from_le_bytes(chunk.try_into().unwrap()));
                }
            }
        }
        self.offset = from;
        Ok(())
    }
}
