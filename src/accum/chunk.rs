// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Spill-chunk serialization for the external-merge accumulator.
//!
//! A chunk file is a plain concatenation of records, written in sorted
//! order, with no header and no index: the only consumer is the k-way
//! merge, which reads every chunk front to back exactly once. Varints keep
//! the common case (short tokens, count 1, one metadata record) compact.
//!
//! # Wire Format (one record)
//!
//! ```text
//! ngram_len: varint
//! ngram_len × token:
//!   byte_len: varint
//!   bytes:    [u8; byte_len] (UTF-8)
//! count: varint
//! meta_count: varint
//! meta_count × record:
//!   attr_count: varint
//!   attr_count × id: varint
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use super::NgramRecord;

/// u64 needs at most 10 varint bytes; anything longer is corruption.
const MAX_VARINT_BYTES: usize = 10;

pub fn write_varint<W: Write>(w: &mut W, mut value: u64) -> io::Result<()> {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            return w.write_all(&[byte]);
        }
        w.write_all(&[byte | 0x80])?;
    }
}

/// Read one varint. `Ok(None)` means clean EOF before the first byte,
/// which is how a chunk ends; EOF mid-varint is an error.
pub fn read_varint<R: Read>(r: &mut R) -> io::Result<Option<u64>> {
    let mut result: u64 = 0;
    let mut shift = 0;
    for i in 0..MAX_VARINT_BYTES {
        let mut byte = [0u8; 1];
        match r.read_exact(&mut byte) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof && i == 0 => return Ok(None),
            Err(e) => return Err(e),
        }
        result |= ((byte[0] & 0x7F) as u64) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(Some(result));
        }
        shift += 7;
    }
    Err(io::Error::new(
        ErrorKind::InvalidData,
        "varint exceeds maximum length (chunk corrupted)",
    ))
}

fn read_required_varint<R: Read>(r: &mut R) -> io::Result<u64> {
    read_varint(r)?.ok_or_else(|| {
        io::Error::new(ErrorKind::UnexpectedEof, "truncated chunk record")
    })
}

/// Sequential writer for one spill chunk.
pub struct ChunkWriter {
    w: BufWriter<File>,
}

impl ChunkWriter {
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self {
            w: BufWriter::new(File::create(path)?),
        })
    }

    pub fn write_record(&mut self, record: &NgramRecord) -> io::Result<()> {
        write_varint(&mut self.w, record.ngram.len() as u64)?;
        for token in &record.ngram {
            write_varint(&mut self.w, token.len() as u64)?;
            self.w.write_all(token.as_bytes())?;
        }
        write_varint(&mut self.w, record.count)?;
        write_varint(&mut self.w, record.metadata.len() as u64)?;
        for meta in &record.metadata {
            write_varint(&mut self.w, meta.len() as u64)?;
            for &id in meta {
                write_varint(&mut self.w, id as u64)?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<()> {
        self.w.flush()
    }
}

/// Lazy sorted stream over one spill chunk.
pub struct ChunkReader {
    r: BufReader<File>,
}

impl ChunkReader {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            r: BufReader::new(File::open(path)?),
        })
    }

    /// Next record, or `None` at end of chunk.
    pub fn read_record(&mut self) -> io::Result<Option<NgramRecord>> {
        let ngram_len = match read_varint(&mut self.r)? {
            Some(n) => n as usize,
            None => return Ok(None),
        };
        let mut ngram = Vec::with_capacity(ngram_len);
        for _ in 0..ngram_len {
            let byte_len = read_required_varint(&mut self.r)? as usize;
            let mut buf = vec![0u8; byte_len];
            self.r.read_exact(&mut buf)?;
            let token = String::from_utf8(buf)
                .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
            ngram.push(token);
        }
        let count = read_required_varint(&mut self.r)?;
        let meta_count = read_required_varint(&mut self.r)? as usize;
        let mut metadata = Vec::with_capacity(meta_count);
        for _ in 0..meta_count {
            let attr_count = read_required_varint(&mut self.r)? as usize;
            let mut meta = Vec::with_capacity(attr_count);
            for _ in 0..attr_count {
                meta.push(read_required_varint(&mut self.r)? as u32);
            }
            metadata.push(meta);
        }
        Ok(Some(NgramRecord {
            ngram,
            count,
            metadata,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn varint_round_trip() {
        let values = [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX];
        let mut buf = Vec::new();
        for &v in &values {
            write_varint(&mut buf, v).unwrap();
        }
        let mut cursor = io::Cursor::new(buf);
        for &v in &values {
            assert_eq!(read_varint(&mut cursor).unwrap(), Some(v));
        }
        assert_eq!(read_varint(&mut cursor).unwrap(), None);
    }

    #[test]
    fn chunk_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunk-000");
        let records = vec![
            NgramRecord {
                ngram: vec!["on".into(), "the".into()],
                count: 3,
                metadata: vec![vec![0, 1], vec![0, 2], vec![1, 1]],
            },
            NgramRecord {
                ngram: vec!["žluťoučký".into(), "kůň".into()],
                count: 1,
                metadata: vec![vec![]],
            },
        ];

        let mut w = ChunkWriter::create(&path).unwrap();
        for r in &records {
            w.write_record(r).unwrap();
        }
        w.finish().unwrap();

        let mut r = ChunkReader::open(&path).unwrap();
        assert_eq!(r.read_record().unwrap().as_ref(), Some(&records[0]));
        assert_eq!(r.read_record().unwrap().as_ref(), Some(&records[1]));
        assert!(r.read_record().unwrap().is_none());
    }

    #[test]
    fn truncated_record_is_an_error_not_eof() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunk-000");
        let mut w = ChunkWriter::create(&path).unwrap();
        w.write_record(&NgramRecord {
            ngram: vec!["abc".into(), "def".into()],
            count: 1,
            metadata: vec![],
        })
        .unwrap();
        w.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
        let mut r = ChunkReader::open(&path).unwrap();
        assert!(r.read_record().is_err());
    }
}
