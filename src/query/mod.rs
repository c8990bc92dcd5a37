// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Query parsing: a restricted regex turned into literal prefixes.
//!
//! Search always scans from the first-token column, so a regex query is
//! compiled into a finite set of literal prefixes to look up there.
//! `te[dxa]Z` becomes `tedZ`, `texZ`, `teaZ`; `abc?d` becomes `abcd`,
//! `abd`. Unbounded character classes -- `.` and friends, quantified or
//! not -- collapse into a wildcard marker: the prefix ends there and
//! matches any continuation.
//!
//! Quantified literal repetition is NOT expanded: `*` and `?` over a
//! literal factor enumerate it zero-or-one times, so `ab*c` yields `abc`
//! and `ac` but never `abbc`, even though the full regex accepts it.
//! Every enumerated prefix therefore heads at least one matching string,
//! but the set does not cover every match -- open-ended repetitions would
//! make it infinite. The compiled regex runs once more downstream as a
//! final filter over the candidates the prefixes did fetch; it rejects
//! false positives, it cannot resurrect candidates never enumerated.
//!
//! Grammar (recursive descent):
//!
//! ```text
//! R  → T R'
//! R' → R | ε | ')'-terminated
//! T  → F T'
//! T' → '*' | '?' | '|' T | ε
//! F  → atom | '(' R ')' | '[' L ']'
//! L  → atom L | ε
//! ```
//!
//! where an atom is any character except `( ) [ ] * ? + |`.

use std::fmt;

/// Keeps pathological queries like `[ab][ab][ab]...` from expanding into
/// millions of alternatives.
const MAX_PREFIXES: usize = 4096;

// ============================================================================
// ERRORS
// ============================================================================

/// Malformed query, with the character position that broke the parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at position {}: {}", self.position, self.message)
    }
}

impl std::error::Error for ParseError {}

// ============================================================================
// OUTPUT
// ============================================================================

/// One enumerated prefix. `wildcard` means the original query continues in
/// a way that cannot be enumerated; search must treat the prefix as
/// "match any continuation".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryPrefix {
    pub text: String,
    pub wildcard: bool,
}

impl fmt::Display for QueryPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wildcard {
            write!(f, "{}*", self.text)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

// ============================================================================
// AST
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Seq(Vec<Node>),
    /// Ordered alternation branches.
    Alt(Vec<Node>),
    /// `F?` and, for prefix purposes, `F*`.
    Optional(Box<Node>),
    /// A point past which continuations cannot be enumerated.
    Wildcard,
    Char(char),
    /// `[abc]`, alternatives in listed order.
    List(Vec<char>),
}

fn is_meta(c: char) -> bool {
    matches!(c, '(' | ')' | '[' | ']' | '*' | '?' | '+' | '|')
}

// ============================================================================
// PARSER
// ============================================================================

struct Parser {
    input: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            position: self.pos,
            message: message.into(),
        }
    }

    fn starts_factor(&self) -> bool {
        match self.current() {
            Some(c) => c == '(' || c == '[' || !is_meta(c),
            None => false,
        }
    }

    /// R → T R'
    fn parse_regex(&mut self) -> Result<Node, ParseError> {
        if !self.starts_factor() {
            return Err(self.error("expected an atom, '(' or '['"));
        }
        let mut items = vec![self.parse_term()?];
        loop {
            match self.current() {
                Some(')') | None => break,
                Some(c) if c == '(' || c == '[' || !is_meta(c) => {
                    items.push(self.parse_term()?);
                }
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            }
        }
        Ok(if items.len() == 1 {
            items.pop().expect("non-empty")
        } else {
            Node::Seq(items)
        })
    }

    /// T → F T'
    fn parse_term(&mut self) -> Result<Node, ParseError> {
        let factor = self.parse_factor()?;
        match self.current() {
            Some('*') => {
                self.bump();
                // '*' is optional-for-prefix-purposes, except over an
                // unbounded class where nothing can be enumerated at all
                Ok(match factor {
                    Node::Wildcard => Node::Wildcard,
                    f => Node::Optional(Box::new(f)),
                })
            }
            Some('?') => {
                self.bump();
                Ok(match factor {
                    Node::Wildcard => Node::Wildcard,
                    f => Node::Optional(Box::new(f)),
                })
            }
            Some('+') => {
                self.bump();
                // at least one occurrence: keep F exactly once
                Ok(factor)
            }
            Some('|') => {
                self.bump();
                let rhs = self.parse_term()?;
                Ok(Node::Alt(vec![factor, rhs]))
            }
            _ => Ok(factor),
        }
    }

    /// F → atom | '(' R ')' | '[' L ']'
    fn parse_factor(&mut self) -> Result<Node, ParseError> {
        match self.current() {
            Some('(') => {
                self.bump();
                let inner = self.parse_regex()?;
                self.expect(')')?;
                Ok(inner)
            }
            Some('[') => {
                self.bump();
                let list = self.parse_list()?;
                self.expect(']')?;
                Ok(Node::List(list))
            }
            Some('.') => {
                self.bump();
                // '.' matches an arbitrary character: not enumerable
                Ok(Node::Wildcard)
            }
            Some(c) if !is_meta(c) => {
                self.bump();
                Ok(Node::Char(c))
            }
            Some(c) => Err(self.error(format!("unexpected '{}'", c))),
            None => Err(self.error("unexpected end of query")),
        }
    }

    /// L → atom L | ε
    fn parse_list(&mut self) -> Result<Vec<char>, ParseError> {
        let mut chars = Vec::new();
        loop {
            match self.current() {
                Some(']') => return Ok(chars),
                Some(c) if !is_meta(c) => {
                    chars.push(c);
                    self.bump();
                }
                Some(c) => {
                    return Err(self.error(format!("'{}' is not allowed in a character list", c)))
                }
                None => return Err(self.error("unterminated character list")),
            }
        }
    }

    fn expect(&mut self, c: char) -> Result<(), ParseError> {
        if self.current() == Some(c) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!(
                "expected '{}'{}",
                c,
                match self.current() {
                    Some(found) => format!(", found '{}'", found),
                    None => ", found end of query".to_string(),
                }
            )))
        }
    }
}

// ============================================================================
// PREFIX ENUMERATION
// ============================================================================

#[derive(Debug, Clone)]
struct Partial {
    text: String,
    /// false once a wildcard terminated this branch.
    open: bool,
}

fn enumerate(node: &Node, partials: Vec<Partial>, limit: usize) -> Result<Vec<Partial>, ParseError> {
    let over_limit = || ParseError {
        position: 0,
        message: format!("query expands to more than {} alternatives", limit),
    };
    match node {
        Node::Char(c) => Ok(partials
            .into_iter()
            .map(|mut p| {
                if p.open {
                    p.text.push(*c);
                }
                p
            })
            .collect()),
        Node::Wildcard => Ok(partials
            .into_iter()
            .map(|mut p| {
                if p.open {
                    p.open = false;
                }
                p
            })
            .collect()),
        Node::List(chars) => {
            let mut out = Vec::new();
            for p in partials {
                if !p.open {
                    out.push(p);
                    continue;
                }
                for &c in chars {
                    let mut branch = p.clone();
                    branch.text.push(c);
                    out.push(branch);
                }
                if out.len() > limit {
                    return Err(over_limit());
                }
            }
            Ok(out)
        }
        Node::Alt(branches) => {
            let mut out = Vec::new();
            for p in partials {
                if !p.open {
                    out.push(p);
                    continue;
                }
                for branch in branches {
                    out.extend(enumerate(branch, vec![p.clone()], limit)?);
                    if out.len() > limit {
                        return Err(over_limit());
                    }
                }
            }
            Ok(out)
        }
        Node::Optional(inner) => {
            let mut out = Vec::new();
            for p in partials {
                if !p.open {
                    out.push(p);
                    continue;
                }
                out.extend(enumerate(inner, vec![p.clone()], limit)?);
                out.push(p);
                if out.len() > limit {
                    return Err(over_limit());
                }
            }
            Ok(out)
        }
        Node::Seq(items) => {
            let mut current = partials;
            for item in items {
                current = enumerate(item, current, limit)?;
                if current.len() > limit {
                    return Err(over_limit());
                }
            }
            Ok(current)
        }
    }
}

/// Parse a query and enumerate its literal prefixes.
///
/// Every returned prefix is a prefix (up to a terminal wildcard marker)
/// of at least one string the query can match. The converse does not
/// hold: `*`/`?` are enumerated as zero-or-one occurrences, so matches
/// reachable only through repeated quantified literals (`abbc` for
/// `ab*c`) have no prefix here. Duplicates produced by redundant
/// alternatives are removed, first occurrence wins.
pub fn parse(input: &str) -> Result<Vec<QueryPrefix>, ParseError> {
    let mut parser = Parser::new(input);
    let ast = parser.parse_regex()?;
    if parser.pos < parser.input.len() {
        return Err(parser.error("incomplete expression"));
    }

    let seed = vec![Partial {
        text: String::new(),
        open: true,
    }];
    let partials = enumerate(&ast, seed, MAX_PREFIXES)?;

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(partials.len());
    for p in partials {
        let prefix = QueryPrefix {
            text: p.text,
            wildcard: !p.open,
        };
        if seen.insert(prefix.clone()) {
            out.push(prefix);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes(q: &str) -> Vec<String> {
        parse(q).unwrap().iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn plain_literal_is_its_own_prefix() {
        assert_eq!(prefixes("žluťoučký"), vec!["žluťoučký"]);
        assert_eq!(prefixes("a"), vec!["a"]);
    }

    #[test]
    fn character_list_fans_out_in_listed_order() {
        assert_eq!(prefixes("te[dxa]Z"), vec!["tedZ", "texZ", "teaZ"]);
    }

    #[test]
    fn grouped_alternation() {
        assert_eq!(prefixes("(foo)|([bB]ar)"), vec!["foo", "bar", "Bar"]);
    }

    #[test]
    fn optional_factor_branches() {
        assert_eq!(prefixes("abc?d"), vec!["abcd", "abd"]);
    }

    #[test]
    fn unbounded_class_collapses_to_wildcard() {
        assert_eq!(prefixes("foo.+z"), vec!["foo*"]);
        assert_eq!(prefixes("foo.*z"), vec!["foo*"]);
        assert_eq!(prefixes("foo."), vec!["foo*"]);
    }

    #[test]
    fn star_is_treated_as_optional() {
        assert_eq!(prefixes("ab*c"), vec!["abc", "ac"]);
    }

    #[test]
    fn plus_keeps_factor_once() {
        assert_eq!(prefixes("ab+c"), vec!["abc"]);
    }

    #[test]
    fn single_char_alternation() {
        assert_eq!(prefixes("a|b"), vec!["a", "b"]);
    }

    #[test]
    fn nested_groups() {
        assert_eq!(prefixes("x(a|(b|c))y"), vec!["xay", "xby", "xcy"]);
    }

    #[test]
    fn duplicate_alternatives_are_removed() {
        assert_eq!(prefixes("a(b|b)c"), vec!["abc"]);
    }

    #[test]
    fn empty_character_list_kills_the_branch() {
        assert_eq!(prefixes("a[]z"), Vec::<String>::new());
    }

    #[test]
    fn errors_carry_positions() {
        let err = parse("(ab").unwrap_err();
        assert_eq!(err.position, 3);

        let err = parse("te[d(a]Z").unwrap_err();
        assert_eq!(err.position, 4);

        let err = parse("ab)").unwrap_err();
        assert_eq!(err.position, 2);

        assert!(parse("").is_err());
        assert!(parse("*ab").is_err());
    }

    #[test]
    fn every_prefix_heads_a_matching_string() {
        // soundness spot-check: the enumerated prefixes of a query with no
        // wildcard are themselves matched by the query's regex
        for q in ["abc?d", "te[dxa]Z", "(foo)|([bB]ar)", "a|b", "ab*c"] {
            let re = regex::Regex::new(&format!("^(?:{})$", q)).unwrap();
            for p in parse(q).unwrap() {
                assert!(!p.wildcard, "unexpected wildcard for {}", q);
                assert!(re.is_match(&p.text), "{} !~ {}", p.text, q);
            }
        }
    }
}
