// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Build orchestration: token stream in, corpus directory out.
//!
//! The builder consumes source events and applies the per-token pipeline:
//! structural filtering, stop words (reset the window), ignore words
//! (skip), then push + dictionary collection, and finally the n-gram
//! gates (per-position prefix whitelist, optional custom filter) before
//! the occurrence lands in the accumulator.
//!
//! Finalization turns the accumulated multiset into the persisted index:
//! the word dictionary is sorted and renumbered, every n-gram at or above
//! the frequency floor is encoded to token ids and fed -- still in sorted
//! order -- to the dynamic column writer, and everything is flushed into
//! the corpus directory.
//!
//! Token ids are meaningless until the dictionary is finalized, which is
//! why encoding must wait for the end of the scan; there is no
//! single-pass variant of this build.

pub mod buffer;
pub mod filter;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use unicode_normalization::UnicodeNormalization;

use crate::accum::{Accumulator, MergeAccumulator, RamAccumulator};
use crate::config::{IndexBuilderConf, SourceType};
use crate::dict::WordDictWriter;
use crate::column::metadata::MetadataWriter;
use crate::index::DynamicNgramIndex;
use crate::source::plain::PlainSource;
use crate::source::vertical::VerticalSource;
use crate::source::{drive, SourceEvent, Token, TokenSource};

pub use buffer::NgramBuffer;
pub use filter::NgramFilter;

/// Preallocated rows per index column.
const INDEX_INITIAL_LEN: usize = 1 << 16;

/// NFC-normalize and lowercase a surface form. Applied to every token
/// before it touches the buffer, the dictionary, or the filters.
pub fn normalize_token(word: &str) -> String {
    word.nfc().collect::<String>().to_lowercase()
}

/// What a finished build produced.
#[derive(Debug)]
pub struct BuildSummary {
    pub corpus_id: String,
    pub index_dir: PathBuf,
    pub tokens_seen: u64,
    pub distinct_ngrams: u64,
    pub dict_words: usize,
    pub elapsed: Duration,
}

/// Streaming build state; one per `create-index` / `extract-ngrams` run.
pub struct IndexBuilder {
    ngram_size: usize,
    min_ngram_freq: u32,
    stop_words: Vec<String>,
    ignore_words: Vec<String>,
    match_prefix: Vec<String>,
    custom_filter: Option<&'static dyn NgramFilter>,
    tag_attr_idx: Option<usize>,
    filter_args: BTreeMap<String, Vec<String>>,
    buffer: NgramBuffer,
    tag_buffer: Option<NgramBuffer>,
    word_dict: WordDictWriter,
    metadata: MetadataWriter,
    accumulator: Box<dyn Accumulator>,
    tokens_seen: u64,
}

impl IndexBuilder {
    pub fn from_conf(conf: &IndexBuilderConf, ngram_size: usize) -> io::Result<Self> {
        let widths = conf
            .attr_widths()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let custom_filter = match &conf.ngram_filter {
            Some(fc) if !fc.function.is_empty() => {
                if !fc.lib.is_empty() {
                    log::info!("ngramFilter.lib '{}' ignored; filters are built in", fc.lib);
                }
                let f = filter::lookup(&fc.function).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("unknown n-gram filter '{}'", fc.function),
                    )
                })?;
                log::info!("using n-gram filter '{}'", f.name());
                Some(f)
            }
            _ => None,
        };
        let accumulator: Box<dyn Accumulator> = if conf.proc_chunk_size > 0 {
            log::info!(
                "external-merge accumulation, chunk size {}, work dir {}",
                conf.proc_chunk_size,
                conf.merge_work_dir().display()
            );
            Box::new(MergeAccumulator::new(
                conf.merge_work_dir(),
                conf.proc_chunk_size,
            )?)
        } else {
            Box::new(RamAccumulator::new())
        };
        Ok(Self {
            ngram_size,
            min_ngram_freq: conf.min_ngram_freq,
            stop_words: conf.ngram_stop_strings.clone(),
            ignore_words: conf.ngram_ignore_strings.clone(),
            match_prefix: conf.ngram_match_prefix.clone(),
            custom_filter,
            tag_attr_idx: conf.tag_attr_idx,
            filter_args: conf.filter_args.clone(),
            buffer: NgramBuffer::new(ngram_size),
            tag_buffer: conf.tag_attr_idx.map(|_| NgramBuffer::new(ngram_size)),
            word_dict: WordDictWriter::new(),
            metadata: MetadataWriter::new(&widths, 0),
            accumulator,
            tokens_seen: 0,
        })
    }

    pub fn tokens_seen(&self) -> u64 {
        self.tokens_seen
    }

    fn reset_window(&mut self) {
        self.buffer.reset();
        if let Some(tb) = &mut self.tag_buffer {
            tb.reset();
        }
    }

    /// Structural-attribute retention check: every configured attribute
    /// must carry one of its allowed values.
    fn passes_filter_args(&self, token: &Token) -> bool {
        self.filter_args.iter().all(|(name, allowed)| {
            token
                .struct_attrs
                .get(name)
                .is_some_and(|v| allowed.iter().any(|a| a == v))
        })
    }

    fn passes_match_prefix(&self, words: &[String]) -> bool {
        self.match_prefix
            .iter()
            .zip(words)
            .all(|(prefix, word)| word.starts_with(prefix))
    }

    pub fn process_event(&mut self, event: SourceEvent) -> io::Result<()> {
        match event {
            SourceEvent::Token(token) => self.process_token(&token),
            // n-grams never span a structural boundary
            SourceEvent::StructOpen { .. } | SourceEvent::StructClose { .. } => {
                self.reset_window();
                Ok(())
            }
        }
    }

    fn process_token(&mut self, token: &Token) -> io::Result<()> {
        self.tokens_seen += 1;
        if !self.passes_filter_args(token) {
            return Ok(());
        }
        let word = normalize_token(&token.word);
        if self.stop_words.contains(&word) {
            self.reset_window();
            return Ok(());
        }
        if self.ignore_words.contains(&word) {
            return Ok(());
        }

        self.buffer.push(&word);
        self.word_dict.add_token(&word);
        if let (Some(idx), Some(tb)) = (self.tag_attr_idx, &mut self.tag_buffer) {
            tb.push(token.attrs.get(idx).map(|s| s.as_str()).unwrap_or(""));
        }

        if !self.buffer.is_valid() {
            return Ok(());
        }
        let words = self.buffer.snapshot();
        if !self.passes_match_prefix(&words) {
            return Ok(());
        }
        if let Some(f) = self.custom_filter {
            let tags = self
                .tag_buffer
                .as_ref()
                .map(|tb| tb.snapshot())
                .unwrap_or_default();
            if !f.accept(&words, &tags) {
                return Ok(());
            }
        }
        let record = self
            .metadata
            .encode_record(&token.struct_attrs)
            .map_err(|msg| io::Error::new(io::ErrorKind::InvalidData, msg))?;
        self.accumulator.add(words, record)
    }

    /// Finalize into a persisted index under `dir`.
    pub fn finalize_into_index(mut self, dir: &Path) -> io::Result<(u64, usize)> {
        fs::create_dir_all(dir)?;
        self.word_dict.finalize();

        let mut index =
            DynamicNgramIndex::with_metadata(self.ngram_size, INDEX_INITIAL_LEN, self.metadata);
        let min_freq = self.min_ngram_freq as u64;
        let word_dict = &self.word_dict;
        let mut encoded = Vec::with_capacity(self.ngram_size);
        let mut dropped_low_freq: u64 = 0;

        self.accumulator.for_each(&mut |rec| {
            if rec.count < min_freq {
                dropped_low_freq += 1;
                return;
            }
            encoded.clear();
            for word in &rec.ngram {
                match word_dict.token_index(word) {
                    Some(id) => encoded.push(id),
                    None => {
                        // cannot happen for tokens that went through the
                        // scan; a miss here means the accumulator state
                        // predates this dictionary
                        log::error!("token '{}' missing from dictionary, n-gram dropped", word);
                        encoded.clear();
                        return;
                    }
                }
            }
            let count = u32::try_from(rec.count).unwrap_or_else(|_| {
                log::warn!("n-gram count {} saturated to u32::MAX", rec.count);
                u32::MAX
            });
            let meta = rec
                .metadata
                .first()
                .cloned()
                .unwrap_or_default();
            index.add(&encoded, count, &meta);
        })?;

        index.finish();
        self.word_dict.save(dir)?;
        index.save(dir)?;
        if dropped_low_freq > 0 {
            log::info!(
                "dropped {} n-grams below frequency {}",
                dropped_low_freq,
                min_freq
            );
        }
        Ok((index.len() as u64, self.word_dict.len()))
    }

    /// Finalize into a raw tab-separated n-gram dump instead of an index.
    /// Rows are `token .. token count`, sorted, one per distinct n-gram at
    /// or above the frequency floor. Returns the number of rows written.
    pub fn finalize_into_tsv(mut self, out_path: &Path) -> io::Result<u64> {
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut w = BufWriter::new(File::create(out_path)?);
        let min_freq = self.min_ngram_freq as u64;
        let mut rows: u64 = 0;
        let mut write_err: Option<io::Error> = None;

        self.accumulator.for_each(&mut |rec| {
            if rec.count < min_freq || write_err.is_some() {
                return;
            }
            let line = format!("{}\t{}", rec.ngram.join("\t"), rec.count);
            if let Err(e) = writeln!(w, "{}", line) {
                write_err = Some(e);
                return;
            }
            rows += 1;
        })?;
        if let Some(e) = write_err {
            return Err(e);
        }
        w.flush()?;
        Ok(rows)
    }
}

fn make_source(conf: &IndexBuilderConf) -> Box<dyn TokenSource> {
    match conf.source_type {
        SourceType::Vertical => Box::new(VerticalSource::new(conf.input_file_path.clone())),
        SourceType::Plain => Box::new(PlainSource::new(conf.input_file_path.clone())),
    }
}

fn scan_spinner(label: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:<10} {msg}")
            .expect("progress template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
    );
    pb.set_prefix(label.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn run_scan(builder: &mut IndexBuilder, conf: &IndexBuilderConf) -> io::Result<()> {
    let pb = scan_spinner("Scanning");
    pb.set_message(conf.input_file_path.display().to_string());
    let mut since_tick: u64 = 0;
    let result = drive(make_source(conf), |event| {
        builder.process_event(event)?;
        since_tick += 1;
        if since_tick == 1_000_000 {
            since_tick = 0;
            pb.set_message(format!("{} tokens", builder.tokens_seen()));
        }
        Ok(())
    });
    pb.finish_with_message(format!("{} tokens", builder.tokens_seen()));
    result
}

/// Build a persisted index per configuration. The whole pipeline:
/// source → buffer/filters → accumulator → encode → columns on disk.
pub fn run_build(conf: &IndexBuilderConf, ngram_size: usize) -> io::Result<BuildSummary> {
    let started = Instant::now();
    let mut builder = IndexBuilder::from_conf(conf, ngram_size)?;
    run_scan(&mut builder, conf)?;

    let tokens_seen = builder.tokens_seen();
    let dir = conf.index_dir();
    let pb = scan_spinner("Encoding");
    pb.set_message(dir.display().to_string());
    let (distinct_ngrams, dict_words) = builder.finalize_into_index(&dir)?;
    pb.finish_with_message(format!("{} distinct {}-grams", distinct_ngrams, ngram_size));

    Ok(BuildSummary {
        corpus_id: conf.corpus_id(),
        index_dir: dir,
        tokens_seen,
        distinct_ngrams,
        dict_words,
        elapsed: started.elapsed(),
    })
}

/// Dump raw sorted n-grams with counts instead of building columns.
/// Returns the output path and row count.
pub fn run_extract(conf: &IndexBuilderConf, ngram_size: usize) -> io::Result<(PathBuf, u64)> {
    let mut builder = IndexBuilder::from_conf(conf, ngram_size)?;
    run_scan(&mut builder, conf)?;

    let out_path = conf
        .index_dir()
        .join(format!("{}_{}-grams.tsv", conf.corpus_id(), ngram_size));
    let rows = builder.finalize_into_tsv(&out_path)?;
    Ok((out_path, rows))
}
