// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Per-attribute value dictionaries.
//!
//! Structurally the same deal as the word dictionary, with one difference:
//! values are stored in insertion order, not sorted. The metadata columns
//! reference ids handed out during the build, and renumbering them would
//! mean rewriting every column, so id 0 is simply the first value seen.
//!
//! # Wire Format (`column_<attr>.dict`)
//!
//! ```text
//! count: decimal integer, LF
//! value[0], LF     (insertion order, id 0 first)
//! value[1], LF
//! ...
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn dict_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("column_{}.dict", name))
}

/// Build-side dictionary for one metadata attribute.
#[derive(Debug)]
pub struct AttrDictWriter {
    name: String,
    index: HashMap<String, u32>,
    values: Vec<String>,
}

impl AttrDictWriter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            index: HashMap::new(),
            values: Vec::new(),
        }
    }

    /// Attribute name this dictionary belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Intern a value, returning its id. Repeated values reuse their id.
    pub fn add_value(&mut self, value: &str) -> u32 {
        if let Some(&id) = self.index.get(value) {
            return id;
        }
        let id = self.values.len() as u32;
        self.index.insert(value.to_string(), id);
        self.values.push(value.to_string());
        id
    }

    /// Number of distinct values interned so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Write `column_<name>.dict` into `dir`.
    pub fn save(&self, dir: &Path) -> io::Result<()> {
        let f = File::create(dict_path(dir, &self.name))?;
        let mut w = BufWriter::new(f);
        writeln!(w, "{}", self.values.len())?;
        for v in &self.values {
            writeln!(w, "{}", v)?;
        }
        w.flush()
    }
}

/// Read-side dictionary for one metadata attribute.
#[derive(Debug)]
pub struct AttrDictReader {
    name: String,
    values: Vec<String>,
}

impl AttrDictReader {
    /// Load `column_<name>.dict` from a corpus directory.
    pub fn load(dir: &Path, name: &str) -> io::Result<Self> {
        let path = dict_path(dir, name);
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
        let mut values = Vec::with_capacity(count);
        for line in lines {
            values.push(line?);
        }
        if values.len() != count {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{}: header says {} values, file has {}",
                    path.display(),
                    count,
                    values.len()
                ),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of values in the dictionary.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value text for an id; `None` for an id the dictionary never issued.
    pub fn decode(&self, id: u32) -> Option<&str> {
        self.values.get(id as usize).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn insertion_order_ids() {
        let mut d = AttrDictWriter::new("author");
        assert_eq!(d.add_value("asimov"), 0);
        assert_eq!(d.add_value("lem"), 1);
        assert_eq!(d.add_value("asimov"), 0);
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn round_trip_preserves_insertion_order() {
        let dir = tempdir().unwrap();
        let mut d = AttrDictWriter::new("genre");
        d.add_value("sci-fi");
        d.add_value("essay");
        d.add_value("");
        d.save(dir.path()).unwrap();

        let r = AttrDictReader::load(dir.path(), "genre").unwrap();
        assert_eq!(r.decode(0), Some("sci-fi"));
        assert_eq!(r.decode(1), Some("essay"));
        assert_eq!(r.decode(2), Some(""));
        assert_eq!(r.decode(3), None);
    }
}
