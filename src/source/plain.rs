// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Plain-text token source.
//!
//! For corpora that are just text: lines are split on a punctuation and
//! whitespace class and every non-empty piece becomes a bare token with no
//! positional or structural attributes. There are no structure events, so
//! n-grams run across line boundaries; sentence segmentation is the
//! vertical format's job, not this one's.

use std::io;
use std::io::BufRead;
use std::path::PathBuf;

use regex::Regex;

use super::{open_reader, SourceEvent, Token, TokenSource};

/// Plain-text token source. Accepts plain or gzipped files.
pub struct PlainSource {
    path: PathBuf,
    separator_re: Regex,
}

impl PlainSource {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            separator_re: Regex::new(r"[,.\s;?!:]+").expect("separator regex"),
        }
    }
}

impl TokenSource for PlainSource {
    fn run(
        &mut self,
        sink: &mut dyn FnMut(SourceEvent) -> io::Result<()>,
    ) -> io::Result<()> {
        let reader = open_reader(&self.path)?;
        for line in reader.lines() {
            let line = line?;
            for piece in self.separator_re.split(&line) {
                if piece.is_empty() {
                    continue;
                }
                sink(SourceEvent::Token(Token {
                    word: piece.to_string(),
                    ..Token::default()
                }))?;
            }
        }
        Ok(())
    }
}
