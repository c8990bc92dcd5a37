// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! External-merge accumulator: bounded memory over arbitrarily large input.
//!
//! Occurrences land in a [`RamAccumulator`] until it holds `chunk_size`
//! distinct n-grams; the map is then spilled to a sorted chunk file and
//! reset. Iteration runs a k-way merge over every chunk with a min-heap of
//! chunk heads: pop the smallest, coalesce every head equal to it (counts
//! summed, metadata concatenated in chunk order), advance the readers that
//! contributed, repeat. Each chunk advances independently, so the merge is
//! monotone and loses nothing -- both properties are pinned by the
//! property tests in `tests/property.rs`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs;
use std::io;
use std::path::PathBuf;

use super::chunk::{ChunkReader, ChunkWriter};
use super::{Accumulator, NgramRecord, RamAccumulator};

/// Heap entry: the current head of one chunk. Reversed ordering turns the
/// std max-heap into a min-heap; ties between chunks break toward the
/// earlier chunk so coalescing order is deterministic.
struct Head {
    record: NgramRecord,
    chunk: usize,
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        self.record.ngram == other.record.ngram && self.chunk == other.chunk
    }
}

impl Eq for Head {}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        self.record
            .ngram
            .cmp(&other.record.ngram)
            .then(self.chunk.cmp(&other.chunk))
            .reverse()
    }
}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bounded-memory accumulator spilling sorted chunks into `work_dir`.
pub struct MergeAccumulator {
    current: RamAccumulator,
    chunk_size: usize,
    work_dir: PathBuf,
    chunks: Vec<PathBuf>,
}

impl MergeAccumulator {
    /// `chunk_size` is the number of distinct in-memory n-grams that
    /// triggers a spill; it must be positive.
    pub fn new(work_dir: PathBuf, chunk_size: usize) -> io::Result<Self> {
        assert!(chunk_size > 0, "chunk size must be positive");
        fs::create_dir_all(&work_dir)?;
        Ok(Self {
            current: RamAccumulator::new(),
            chunk_size,
            work_dir,
            chunks: Vec::new(),
        })
    }

    /// Number of chunks spilled so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn spill(&mut self) -> io::Result<()> {
        let path = self
            .work_dir
            .join(format!("chunk-{:03}", self.chunks.len()));
        log::debug!(
            "spilling {} n-grams to {}",
            self.current.len(),
            path.display()
        );
        let mut writer = ChunkWriter::create(&path)?;
        for record in self.current.drain_sorted() {
            writer.write_record(&record)?;
        }
        writer.finish()?;
        self.chunks.push(path);
        Ok(())
    }

    fn merge_chunks(&mut self, visit: &mut dyn FnMut(NgramRecord)) -> io::Result<()> {
        let mut readers = Vec::with_capacity(self.chunks.len());
        for path in &self.chunks {
            readers.push(ChunkReader::open(path)?);
        }

        let mut heap = BinaryHeap::with_capacity(readers.len());
        for (i, reader) in readers.iter_mut().enumerate() {
            if let Some(record) = reader.read_record()? {
                heap.push(Head { record, chunk: i });
            }
        }

        while let Some(smallest) = heap.pop() {
            let mut merged = smallest.record;
            if let Some(next) = readers[smallest.chunk].read_record()? {
                heap.push(Head {
                    record: next,
                    chunk: smallest.chunk,
                });
            }
            // coalesce every chunk head carrying the same n-gram
            while let Some(head) = heap.peek() {
                if head.record.ngram != merged.ngram {
                    break;
                }
                let tied = heap.pop().expect("peeked head vanished");
                merged.count += tied.record.count;
                merged.metadata.extend(tied.record.metadata);
                if let Some(next) = readers[tied.chunk].read_record()? {
                    heap.push(Head {
                        record: next,
                        chunk: tied.chunk,
                    });
                }
            }
            visit(merged);
        }
        Ok(())
    }

    fn cleanup(&mut self) {
        for path in self.chunks.drain(..) {
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("failed to remove chunk {}: {}", path.display(), e);
            }
        }
    }
}

impl Accumulator for MergeAccumulator {
    fn add(&mut self, ngram: Vec<String>, metadata: Vec<u32>) -> io::Result<()> {
        self.current.add(ngram, metadata)?;
        if self.current.len() >= self.chunk_size {
            self.spill()?;
        }
        Ok(())
    }

    fn for_each(&mut self, visit: &mut dyn FnMut(NgramRecord)) -> io::Result<()> {
        if !self.current.is_empty() {
            self.spill()?;
        }
        let result = self.merge_chunks(visit);
        self.cleanup();
        result
    }

    fn len(&self) -> usize {
        self.current.len()
    }
}

impl Drop for MergeAccumulator {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn gram(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn collect(acc: &mut MergeAccumulator) -> Vec<NgramRecord> {
        let mut out = Vec::new();
        acc.for_each(&mut |r| out.push(r)).unwrap();
        out
    }

    #[test]
    fn merges_across_chunks_in_global_order() {
        let dir = tempdir().unwrap();
        let mut acc = MergeAccumulator::new(dir.path().join("tmp"), 2).unwrap();
        // chunk boundaries fall between these adds (threshold 2)
        acc.add(gram(&["d", "d"]), vec![]).unwrap();
        acc.add(gram(&["a", "a"]), vec![]).unwrap();
        acc.add(gram(&["c", "c"]), vec![]).unwrap();
        acc.add(gram(&["b", "b"]), vec![]).unwrap();
        acc.add(gram(&["e", "e"]), vec![]).unwrap();
        assert!(acc.chunk_count() >= 2);

        let out = collect(&mut acc);
        let firsts: Vec<_> = out.iter().map(|r| r.ngram[0].as_str()).collect();
        assert_eq!(firsts, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn coalesces_equal_ngrams_across_chunks() {
        let dir = tempdir().unwrap();
        let mut acc = MergeAccumulator::new(dir.path().join("tmp"), 2).unwrap();
        for i in 0..6u32 {
            acc.add(gram(&["the", "cat"]), vec![i]).unwrap();
            acc.add(gram(&[&format!("w{}", i), "x"]), vec![]).unwrap();
        }
        let out = collect(&mut acc);
        let cat = out
            .iter()
            .find(|r| r.ngram == gram(&["the", "cat"]))
            .expect("merged n-gram missing");
        assert_eq!(cat.count, 6);
        // all six occurrence records survive the merge
        let mut ids: Vec<u32> = cat.metadata.iter().map(|m| m[0]).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn unspilled_tail_is_included() {
        let dir = tempdir().unwrap();
        let mut acc = MergeAccumulator::new(dir.path().join("tmp"), 100).unwrap();
        acc.add(gram(&["z", "z"]), vec![]).unwrap();
        acc.add(gram(&["a", "a"]), vec![]).unwrap();
        assert_eq!(acc.chunk_count(), 0);
        let out = collect(&mut acc);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].ngram, gram(&["a", "a"]));
    }

    #[test]
    fn empty_accumulator_yields_nothing() {
        let dir = tempdir().unwrap();
        let mut acc = MergeAccumulator::new(dir.path().join("tmp"), 4).unwrap();
        assert!(collect(&mut acc).is_empty());
    }

    #[test]
    fn chunks_are_removed_after_merge() {
        let dir = tempdir().unwrap();
        let work = dir.path().join("tmp");
        let mut acc = MergeAccumulator::new(work.clone(), 1).unwrap();
        acc.add(gram(&["a", "b"]), vec![]).unwrap();
        acc.add(gram(&["b", "c"]), vec![]).unwrap();
        assert_eq!(acc.chunk_count(), 2);
        let _ = collect(&mut acc);
        assert_eq!(fs::read_dir(&work).unwrap().count(), 0);
    }
}
