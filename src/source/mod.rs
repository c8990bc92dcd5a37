// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Token sources: where the build gets its tokens from.
//!
//! A source emits a flat event stream: tokens carrying their positional
//! attributes and the flattened attributes of every open structure, plus
//! open/close events for the structures themselves (the builder resets its
//! n-gram window on those, so n-grams never cross a document or sentence
//! element).
//!
//! Parsing and indexing overlap: [`drive`] runs the source on its own
//! thread and hands event chunks to the consumer over a bounded channel.
//! Chunks amortize the handoff -- sending single tokens through a channel
//! costs more than parsing them.

pub mod plain;
pub mod vertical;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use flate2::read::GzDecoder;

/// Events per channel message.
const CHUNK_LEN: usize = 65_536;
/// In-flight chunks before the producer blocks.
const CHANNEL_DEPTH: usize = 4;

/// One token of the source stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Token {
    /// Surface form, exactly as the source spells it.
    pub word: String,
    /// Positional attributes (lemma, tag, ...) in source column order.
    pub attrs: Vec<String>,
    /// Flattened attributes of the currently open structures,
    /// `<struct>.<attr>` → value.
    pub struct_attrs: BTreeMap<String, String>,
}

/// One event of the source stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Token(Token),
    StructOpen {
        name: String,
        attrs: Vec<(String, String)>,
    },
    StructClose {
        name: String,
    },
}

/// A source of token events. The sink may fail (downstream error or a hung
/// up pipeline); sources must propagate that failure and stop.
pub trait TokenSource: Send {
    fn run(
        &mut self,
        sink: &mut dyn FnMut(SourceEvent) -> io::Result<()>,
    ) -> io::Result<()>;
}

/// Open a source file, transparently decompressing `.gz`.
pub fn open_reader(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let f = File::open(path)?;
    if path.extension().is_some_and(|e| e == "gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(f))))
    } else {
        Ok(Box::new(BufReader::new(f)))
    }
}

/// Run `source` on a producer thread, feeding `consume` on the calling
/// thread through a bounded chunk channel. The first error from either
/// side stops the pipeline and is returned.
pub fn drive<F>(mut source: Box<dyn TokenSource>, mut consume: F) -> io::Result<()>
where
    F: FnMut(SourceEvent) -> io::Result<()>,
{
    let (tx, rx) = mpsc::sync_channel::<io::Result<Vec<SourceEvent>>>(CHANNEL_DEPTH);

    thread::scope(|scope| {
        scope.spawn(move || {
            let mut chunk = Vec::with_capacity(CHUNK_LEN);
            let result = source.run(&mut |event| {
                chunk.push(event);
                if chunk.len() >= CHUNK_LEN {
                    let full = std::mem::replace(&mut chunk, Vec::with_capacity(CHUNK_LEN));
                    if tx.send(Ok(full)).is_err() {
                        // consumer went away; stop parsing
                        return Err(io::Error::new(
                            io::ErrorKind::BrokenPipe,
                            "token pipeline closed",
                        ));
                    }
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    if !chunk.is_empty() {
                        let _ = tx.send(Ok(chunk));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Err(e) => {
                    let _ = tx.send(Err(e));
                }
            }
        });

        for message in rx {
            for event in message? {
                consume(event)?;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Source yielding a fixed event sequence; enough to test the pipeline.
    struct FixedSource(Vec<SourceEvent>);

    impl TokenSource for FixedSource {
        fn run(
            &mut self,
            sink: &mut dyn FnMut(SourceEvent) -> io::Result<()>,
        ) -> io::Result<()> {
            for event in self.0.drain(..) {
                sink(event)?;
            }
            Ok(())
        }
    }

    fn word(w: &str) -> SourceEvent {
        SourceEvent::Token(Token {
            word: w.to_string(),
            ..Token::default()
        })
    }

    #[test]
    fn pipeline_preserves_order() {
        let events: Vec<SourceEvent> = (0..200_000).map(|i| word(&format!("w{}", i))).collect();
        let mut seen = Vec::new();
        drive(Box::new(FixedSource(events.clone())), |e| {
            seen.push(e);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen.len(), events.len());
        assert_eq!(seen.first(), events.first());
        assert_eq!(seen.last(), events.last());
    }

    #[test]
    fn consumer_error_stops_the_pipeline() {
        let events: Vec<SourceEvent> = (0..300_000).map(|i| word(&format!("w{}", i))).collect();
        let mut count = 0usize;
        let result = drive(Box::new(FixedSource(events)), |_| {
            count += 1;
            if count == 10 {
                Err(io::Error::other("downstream failure"))
            } else {
                Ok(())
            }
        });
        assert!(result.is_err());
        assert_eq!(count, 10);
    }
}
