// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Vertical file parser.
//!
//! The vertical format is the SGML-ish corpus interchange format: one
//! token per line with tab-separated positional attributes, interleaved
//! with angle-bracketed structure markers:
//!
//! ```text
//! <doc author="Isaac Asimov" year="1956">
//! <s>
//! The     the     DT
//! robot   robot   NN
//! </s>
//! </doc>
//! ```
//!
//! Structures nest; the parser keeps a stack of open elements and stamps
//! every token with the flattened attributes of everything currently open
//! (`doc.author`, `doc.year`, ...). Mismatched closing tags happen in real
//! corpora and are logged, not fatal -- the innermost element is closed
//! regardless, the way every lenient SGML reader does it.

use std::io;
use std::io::BufRead;
use std::path::PathBuf;

use regex::Regex;

use super::{open_reader, SourceEvent, Token, TokenSource};

/// One open structure: its name and attributes.
#[derive(Debug, Clone)]
struct OpenElement {
    name: String,
    attrs: Vec<(String, String)>,
}

/// Stack of currently open structures.
#[derive(Debug, Default)]
struct ElementStack {
    items: Vec<OpenElement>,
}

impl ElementStack {
    fn open(&mut self, name: &str, attrs: Vec<(String, String)>) {
        self.items.push(OpenElement {
            name: name.to_string(),
            attrs,
        });
    }

    fn close(&mut self, name: &str) {
        match self.items.pop() {
            Some(top) if top.name == name => {}
            Some(top) => {
                log::warn!("tag nesting problem: expected </{}>, found </{}>", top.name, name)
            }
            None => log::warn!("closing tag </{}> with no open element", name),
        }
    }

    /// Flattened view of every open structure's attributes.
    fn struct_attrs(&self) -> std::collections::BTreeMap<String, String> {
        let mut out = std::collections::BTreeMap::new();
        for elm in &self.items {
            for (k, v) in &elm.attrs {
                out.insert(format!("{}.{}", elm.name, k), v.clone());
            }
        }
        out
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Vertical-file token source. Accepts plain or gzipped files.
pub struct VerticalSource {
    path: PathBuf,
    tag_re: Regex,
    attr_re: Regex,
}

impl VerticalSource {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            tag_re: Regex::new(r"^<\s*/?\s*([\w.-]+)").expect("tag regex"),
            attr_re: Regex::new(r#"([\w.-]+)="([^"]*)""#).expect("attr regex"),
        }
    }

    fn parse_attrs(&self, tag: &str) -> Vec<(String, String)> {
        self.attr_re
            .captures_iter(tag)
            .map(|c| (c[1].to_string(), c[2].to_string()))
            .collect()
    }

    fn tag_name(&self, tag: &str) -> Option<String> {
        self.tag_re.captures(tag).map(|c| c[1].to_string())
    }
}

fn is_open_tag(line: &str) -> bool {
    line.starts_with('<') && !line.starts_with("</") && !line.ends_with("/>")
}

fn is_close_tag(line: &str) -> bool {
    line.starts_with("</")
}

fn is_self_close_tag(line: &str) -> bool {
    line.starts_with('<') && line.ends_with("/>")
}

impl TokenSource for VerticalSource {
    fn run(
        &mut self,
        sink: &mut dyn FnMut(SourceEvent) -> io::Result<()>,
    ) -> io::Result<()> {
        let reader = open_reader(&self.path)?;
        let mut stack = ElementStack::default();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }
            if is_close_tag(line) {
                let Some(name) = self.tag_name(line) else {
                    log::warn!("unparseable closing tag: {}", line);
                    continue;
                };
                stack.close(&name);
                sink(SourceEvent::StructClose { name })?;
            } else if is_open_tag(line) {
                let Some(name) = self.tag_name(line) else {
                    log::warn!("unparseable tag: {}", line);
                    continue;
                };
                let attrs = self.parse_attrs(line);
                stack.open(&name, attrs.clone());
                sink(SourceEvent::StructOpen { name, attrs })?;
            } else if is_self_close_tag(line) {
                // an empty element opens and closes in one line; it never
                // contributes attributes to any token
                let Some(name) = self.tag_name(line) else {
                    log::warn!("unparseable tag: {}", line);
                    continue;
                };
                let attrs = self.parse_attrs(line);
                sink(SourceEvent::StructOpen {
                    name: name.clone(),
                    attrs,
                })?;
                sink(SourceEvent::StructClose { name })?;
            } else {
                let mut cols = line.split('\t');
                let word = cols.next().unwrap_or("").to_string();
                let attrs: Vec<String> = cols.map(|c| c.to_string()).collect();
                sink(SourceEvent::Token(Token {
                    word,
                    attrs,
                    struct_attrs: stack.struct_attrs(),
                }))?;
            }
        }
        if stack.len() > 0 {
            log::warn!("{} structure(s) left open at end of input", stack.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn collect_events(content: &str) -> Vec<SourceEvent> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let mut source = VerticalSource::new(file.path().to_path_buf());
        let mut events = Vec::new();
        source
            .run(&mut |e| {
                events.push(e);
                Ok(())
            })
            .unwrap();
        events
    }

    #[test]
    fn tokens_carry_positional_and_structural_attrs() {
        let events = collect_events(
            "<doc author=\"Isaac Asimov\" year=\"1956\">\n\
             <s>\n\
             The\tthe\tDT\n\
             robot\trobot\tNN\n\
             </s>\n\
             </doc>\n",
        );
        let tokens: Vec<&Token> = events
            .iter()
            .filter_map(|e| match e {
                SourceEvent::Token(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].word, "The");
        assert_eq!(tokens[0].attrs, vec!["the", "DT"]);
        assert_eq!(
            tokens[0].struct_attrs.get("doc.author").map(|s| s.as_str()),
            Some("Isaac Asimov")
        );
        assert_eq!(
            tokens[1].struct_attrs.get("doc.year").map(|s| s.as_str()),
            Some("1956")
        );
    }

    #[test]
    fn structure_events_bracket_their_content() {
        let events = collect_events("<s>\nhello\n</s>\n");
        assert!(matches!(
            &events[0],
            SourceEvent::StructOpen { name, .. } if name == "s"
        ));
        assert!(matches!(&events[1], SourceEvent::Token(t) if t.word == "hello"));
        assert!(matches!(
            &events[2],
            SourceEvent::StructClose { name } if name == "s"
        ));
    }

    #[test]
    fn closed_structures_stop_contributing_attrs() {
        let events = collect_events(
            "<doc author=\"a\">\nx\n</doc>\n<doc author=\"b\">\ny\n</doc>\n",
        );
        let tokens: Vec<&Token> = events
            .iter()
            .filter_map(|e| match e {
                SourceEvent::Token(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(tokens[0].struct_attrs["doc.author"], "a");
        assert_eq!(tokens[1].struct_attrs["doc.author"], "b");
    }

    #[test]
    fn self_closing_tags_emit_open_and_close() {
        let events = collect_events("<g/>\nword\n");
        assert!(matches!(&events[0], SourceEvent::StructOpen { name, .. } if name == "g"));
        assert!(matches!(&events[1], SourceEvent::StructClose { name } if name == "g"));
        // the token after it sees no attributes from the empty element
        assert!(matches!(
            &events[2],
            SourceEvent::Token(t) if t.struct_attrs.is_empty()
        ));
    }

    #[test]
    fn nested_structures_flatten_outer_and_inner() {
        let events = collect_events(
            "<doc id=\"1\">\n<p n=\"2\">\nw\n</p>\n</doc>\n",
        );
        let token = events
            .iter()
            .find_map(|e| match e {
                SourceEvent::Token(t) => Some(t),
                _ => None,
            })
            .unwrap();
        assert_eq!(token.struct_attrs["doc.id"], "1");
        assert_eq!(token.struct_attrs["p.n"], "2");
    }

    #[test]
    fn gzipped_input_is_transparent() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let mut file = tempfile::Builder::new().suffix(".gz").tempfile().unwrap();
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"alpha\nbeta\n").unwrap();
        file.write_all(&enc.finish().unwrap()).unwrap();
        file.flush().unwrap();

        let mut source = VerticalSource::new(file.path().to_path_buf());
        let mut words = Vec::new();
        source
            .run(&mut |e| {
                if let SourceEvent::Token(t) = e {
                    words.push(t.word);
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(words, vec!["alpha", "beta"]);
    }
}
