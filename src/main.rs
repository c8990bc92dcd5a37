// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Engram CLI: build and query column-oriented n-gram indexes.
//!
//! ```bash
//! # Build a bigram index from a configured vertical file
//! engram create-index build.json --ngram-size 2
//!
//! # Dump the raw sorted n-gram table instead
//! engram extract-ngrams build.json --ngram-size 3
//!
//! # Query a built corpus
//! engram search susanne "the*" --data-path ./indexes --limit 10
//! engram search susanne "(foo)|(bar)" --qtype regexp --json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;

use engram::builder::{run_build, run_extract};
use engram::column::{col_idx_path, AttrColumn, IndexColumn, COUNTS_COLUMN_NAME};
use engram::config::{IndexBuilderConf, SearchConf};
use engram::dict::{AttrDictReader, WordDictReader};
use engram::index::MAX_NGRAM_SIZE;
use engram::search::{QueryType, SearchArgs, SearchControl, Searcher};

mod cli;
use cli::{Cli, Commands};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn check_ngram_size(n: usize) -> Result<(), String> {
    if n == 0 || n > MAX_NGRAM_SIZE {
        return Err(format!(
            "n-gram size must be between 1 and {}, got {}",
            MAX_NGRAM_SIZE, n
        ));
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::CreateIndex { conf, ngram_size } => {
            check_ngram_size(ngram_size)?;
            let conf = IndexBuilderConf::load(&conf).map_err(|e| e.to_string())?;
            let summary = run_build(&conf, ngram_size).map_err(|e| e.to_string())?;
            println!(
                "built corpus '{}' in {}",
                summary.corpus_id,
                summary.index_dir.display()
            );
            println!(
                "  {} tokens, {} distinct {}-grams, {} dictionary words, {:.1}s",
                summary.tokens_seen,
                summary.distinct_ngrams,
                ngram_size,
                summary.dict_words,
                summary.elapsed.as_secs_f64()
            );
            Ok(())
        }
        Commands::ExtractNgrams { conf, ngram_size } => {
            check_ngram_size(ngram_size)?;
            let conf = IndexBuilderConf::load(&conf).map_err(|e| e.to_string())?;
            let (path, rows) = run_extract(&conf, ngram_size).map_err(|e| e.to_string())?;
            println!("wrote {} n-gram rows to {}", rows, path.display());
            Ok(())
        }
        Commands::Inspect {
            corpus,
            data_path,
            conf_path,
        } => {
            let data_path = resolve_data_path(data_path, conf_path)?;
            inspect_corpus(&data_path.join(&corpus), &corpus)
        }
        Commands::Search {
            corpus,
            query,
            data_path,
            conf_path,
            attrs,
            offset,
            limit,
            qtype,
            timeout_ms,
            json,
        } => {
            let data_path = resolve_data_path(data_path, conf_path)?;
            let query_type = QueryType::parse(&qtype)
                .ok_or_else(|| format!("unknown query type '{}', try default|regexp", qtype))?;
            let args = SearchArgs {
                corpus_id: corpus,
                phrase: query,
                attrs,
                offset,
                limit: usize::try_from(limit).ok(),
                query_type,
            };
            let ctl = SearchControl {
                deadline: timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms)),
                cancel: Default::default(),
            };

            let searcher = Searcher::new(data_path);
            match searcher.search(&args, &ctl) {
                Ok(response) if json => {
                    let body = serde_json::to_string(&response)
                        .map_err(|e| format!("response serialization failed: {}", e))?;
                    println!("{}", body);
                    Ok(())
                }
                Ok(response) => {
                    for row in &response.rows {
                        if row.args.is_empty() {
                            println!("{}\t{}", row.ngram.join(" "), row.count);
                        } else {
                            println!(
                                "{}\t{}\t{}",
                                row.ngram.join(" "),
                                row.count,
                                row.args.join("\t")
                            );
                        }
                    }
                    println!(
                        "-- {} row(s) in {:.4}s",
                        response.size, response.search_time
                    );
                    Ok(())
                }
                Err(e) if json => {
                    let body = serde_json::to_string(&e.to_body())
                        .unwrap_or_else(|_| format!("{{\"message\":\"{}\"}}", e));
                    println!("{}", body);
                    Err(e.to_string())
                }
                Err(e) => Err(e.to_string()),
            }
        }
    }
}

fn resolve_data_path(
    data_path: Option<PathBuf>,
    conf_path: Option<PathBuf>,
) -> Result<PathBuf, String> {
    if let Some(p) = data_path {
        return Ok(p);
    }
    if let Some(c) = conf_path {
        let conf = SearchConf::load(&c).map_err(|e| e.to_string())?;
        return Ok(conf.data_path);
    }
    Err("either --data-path or --conf-path is required".to_string())
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1 << 20 {
        format!("{:.1} MiB", bytes as f64 / (1 << 20) as f64)
    } else if bytes >= 1 << 10 {
        format!("{:.1} KiB", bytes as f64 / (1 << 10) as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Print the structure of a built corpus: dictionary size, per-depth
/// column sizes, total occurrence count, and metadata columns.
fn inspect_corpus(dir: &std::path::Path, corpus: &str) -> Result<(), String> {
    if !dir.is_dir() {
        return Err(format!("corpus '{}' not found in {}", corpus, dir.display()));
    }
    let file_size = |name: &str| {
        std::fs::metadata(dir.join(name))
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "?".to_string())
    };

    let dict = WordDictReader::load(dir).map_err(|e| e.to_string())?;
    println!("corpus '{}' ({})", corpus, dir.display());
    println!(
        "  {:<22} {:>12} words  {:>10}",
        "words.dict",
        dict.len(),
        file_size("words.dict")
    );

    for k in 0..MAX_NGRAM_SIZE {
        let path = col_idx_path(dir, k);
        if !path.is_file() {
            break;
        }
        let col = IndexColumn::open(path).map_err(|e| e.to_string())?;
        let name = format!("idx_col_{}.idx", k);
        println!(
            "  {:<22} {:>12} records  {:>8}",
            name,
            col.stored_size(),
            file_size(&name)
        );
    }

    let mut counts = AttrColumn::open_counts(dir).map_err(|e| e.to_string())?;
    counts.load_whole().map_err(|e| e.to_string())?;
    let total: u64 = (0..counts.size()).map(|i| counts.get(i) as u64).sum();
    println!(
        "  {:<22} {:>12} rows  {:>12} occurrences",
        "column__counts.idx",
        counts.size(),
        total
    );

    // metadata columns: whatever column_<attr>.idx files exist
    let mut attr_names: Vec<String> = std::fs::read_dir(dir)
        .map_err(|e| e.to_string())?
        .filter_map(|entry| {
            let name = entry.ok()?.file_name().to_string_lossy().into_owned();
            let attr = name
                .strip_prefix("column_")
                .and_then(|rest| rest.strip_suffix(".idx"))?;
            if attr == COUNTS_COLUMN_NAME {
                None
            } else {
                Some(attr.to_string())
            }
        })
        .collect();
    attr_names.sort();

    for attr in attr_names {
        let col = AttrColumn::open(dir, &attr).map_err(|e| e.to_string())?;
        let values = AttrDictReader::load(dir, &attr)
            .map(|d| d.len())
            .unwrap_or(0);
        println!(
            "  {:<22} {:>12} rows  ({}, {} distinct values)",
            format!("column_{}.idx", attr),
            col.stored_size(),
            col.width(),
            values
        );
    }
    Ok(())
}
