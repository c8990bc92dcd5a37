// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Bundled metadata columns.
//!
//! One attribute column plus one value dictionary per configured attribute,
//! kept in a fixed order (attribute name, ascending) so that an encoded
//! record `[u32]` always lines up with the same attributes. Values are
//! interned into the dictionaries while the token stream is scanned, which
//! is why the dictionaries are insertion-ordered: the ids are already
//! baked into accumulated records by the time anything is saved.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use crate::column::attr::{AttrColumn, ColumnWidth};
use crate::dict::attrs::{AttrDictReader, AttrDictWriter};

/// Write side: dictionaries to intern into, columns to flush.
#[derive(Debug)]
pub struct MetadataWriter {
    names: Vec<String>,
    widths: Vec<ColumnWidth>,
    dicts: Vec<AttrDictWriter>,
    cols: Vec<AttrColumn>,
}

impl MetadataWriter {
    /// Create one column + dictionary per configured attribute. The map is
    /// ordered, so record layout is deterministic across builds.
    pub fn new(attrs: &BTreeMap<String, ColumnWidth>, initial_len: usize) -> Self {
        let mut names = Vec::with_capacity(attrs.len());
        let mut widths = Vec::with_capacity(attrs.len());
        let mut dicts = Vec::with_capacity(attrs.len());
        let mut cols = Vec::with_capacity(attrs.len());
        for (name, &width) in attrs {
            names.push(name.clone());
            widths.push(width);
            dicts.push(AttrDictWriter::new(name));
            cols.push(AttrColumn::new(name, width, initial_len));
        }
        Self {
            names,
            widths,
            dicts,
            cols,
        }
    }

    /// Attribute names in record order.
    pub fn attr_names(&self) -> &[String] {
        &self.names
    }

    pub fn num_cols(&self) -> usize {
        self.cols.len()
    }

    /// Intern one occurrence's structural attributes into a record. A
    /// missing attribute is interned as the empty string, so every record
    /// has the full width. Fails when an attribute configured as `col8`
    /// exceeds 256 distinct values.
    pub fn encode_record(
        &mut self,
        struct_attrs: &BTreeMap<String, String>,
    ) -> Result<Vec<u32>, String> {
        let mut record = Vec::with_capacity(self.names.len());
        for (i, name) in self.names.iter().enumerate() {
            let value = struct_attrs.get(name).map(|s| s.as_str()).unwrap_or("");
            let id = self.dicts[i].add_value(value);
            if !self.widths[i].fits(id) {
                return Err(format!(
                    "attribute '{}' exceeded the capacity of a {} column ({} distinct values)",
                    name,
                    self.widths[i],
                    id as u64 + 1
                ));
            }
            record.push(id);
        }
        Ok(record)
    }

    /// Store a record at row `idx` of every column.
    pub fn set(&mut self, idx: usize, record: &[u32]) {
        debug_assert_eq!(record.len(), self.cols.len());
        for (col, &value) in self.cols.iter_mut().zip(record) {
            col.set(idx, value);
        }
    }

    pub fn extend(&mut self, n: usize) {
        for col in &mut self.cols {
            col.extend(n);
        }
    }

    pub fn shrink(&mut self, new_len: usize) {
        for col in &mut self.cols {
            col.shrink(new_len);
        }
    }

    /// Row capacity of the columns (all kept equal).
    pub fn size(&self) -> usize {
        self.cols.first().map(|c| c.size()).unwrap_or(0)
    }

    /// Flush every column and dictionary into `dir`.
    pub fn save(&mut self, dir: &Path) -> io::Result<()> {
        for col in &mut self.cols {
            col.save(dir)?;
        }
        for dict in &self.dicts {
            dict.save(dir)?;
        }
        Ok(())
    }
}

/// Read side: the subset of attribute columns a query asked for.
#[derive(Debug)]
pub struct MetadataReader {
    cols: Vec<AttrColumn>,
    dicts: Vec<AttrDictReader>,
}

impl MetadataReader {
    /// Bind the named attribute columns and load their dictionaries.
    pub fn open(dir: &Path, attr_names: &[String]) -> io::Result<Self> {
        let mut cols = Vec::with_capacity(attr_names.len());
        let mut dicts = Vec::with_capacity(attr_names.len());
        for name in attr_names {
            cols.push(AttrColumn::open(dir, name)?);
            dicts.push(AttrDictReader::load(dir, name)?);
        }
        Ok(Self { cols, dicts })
    }

    pub fn num_cols(&self) -> usize {
        self.cols.len()
    }

    /// Load rows `[from, to]` of every column.
    pub fn load_chunk(&mut self, from: usize, to: usize) -> io::Result<()> {
        for col in &mut self.cols {
            col.load_chunk(from, to)?;
        }
        Ok(())
    }

    /// Decoded attribute values for row `idx`, in attribute order. An id
    /// missing from its dictionary decodes to an empty string rather than
    /// failing the whole row.
    pub fn get(&self, idx: usize) -> Vec<String> {
        self.cols
            .iter()
            .zip(&self.dicts)
            .map(|(col, dict)| dict.decode(col.get(idx)).unwrap_or("").to_string())
            .collect()
    }
}
