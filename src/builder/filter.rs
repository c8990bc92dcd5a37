// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Built-in n-gram filters.
//!
//! A filter sees each candidate n-gram as two parallel slices -- the
//! window of words and the window of tags (when the build configures a tag
//! attribute) -- and decides whether the n-gram enters the index. Filters
//! used to be loaded from shared libraries at run time; they are ordinary
//! compiled-in trait objects now, selected by name from this registry. A
//! host-controlled plug-in runtime buys nothing here and costs a lot.

/// Predicate over a candidate n-gram.
pub trait NgramFilter: Send + Sync {
    /// Registry name, as referenced from the build configuration.
    fn name(&self) -> &'static str;

    /// `words` is the n-gram window; `tags` is the parallel tag window,
    /// empty when the build has no `tagAttrIdx`.
    fn accept(&self, words: &[String], tags: &[String]) -> bool;
}

/// Accepts n-grams consisting entirely of alphabetic words -- drops
/// anything with digits or punctuation leftovers.
struct AlphaWords;

impl NgramFilter for AlphaWords {
    fn name(&self) -> &'static str {
        "alpha-words"
    }

    fn accept(&self, words: &[String], _tags: &[String]) -> bool {
        words
            .iter()
            .all(|w| !w.is_empty() && w.chars().all(|c| c.is_alphabetic()))
    }
}

/// Accepts n-grams whose every position carries a non-empty tag. Useful
/// for corpora where untagged rows mark noise.
struct FullyTagged;

impl NgramFilter for FullyTagged {
    fn name(&self) -> &'static str {
        "fully-tagged"
    }

    fn accept(&self, words: &[String], tags: &[String]) -> bool {
        tags.len() == words.len() && tags.iter().all(|t| !t.is_empty())
    }
}

static ALPHA_WORDS: AlphaWords = AlphaWords;
static FULLY_TAGGED: FullyTagged = FullyTagged;
static ALL_FILTERS: [&dyn NgramFilter; 2] = [&ALPHA_WORDS, &FULLY_TAGGED];

/// Every available filter.
pub fn all() -> &'static [&'static dyn NgramFilter] {
    &ALL_FILTERS
}

/// Resolve a filter by its registry name.
pub fn lookup(name: &str) -> Option<&'static dyn NgramFilter> {
    all().iter().copied().find(|f| f.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(ws: &[&str]) -> Vec<String> {
        ws.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn registry_resolves_by_name() {
        assert!(lookup("alpha-words").is_some());
        assert!(lookup("fully-tagged").is_some());
        assert!(lookup("no-such-filter").is_none());
    }

    #[test]
    fn alpha_words_rejects_digits_and_punctuation() {
        let f = lookup("alpha-words").unwrap();
        assert!(f.accept(&words(&["the", "cat"]), &[]));
        assert!(f.accept(&words(&["žluťoučký", "kůň"]), &[]));
        assert!(!f.accept(&words(&["the", "42"]), &[]));
        assert!(!f.accept(&words(&["semi;colon", "x"]), &[]));
        assert!(!f.accept(&words(&["", "x"]), &[]));
    }

    #[test]
    fn fully_tagged_requires_every_tag() {
        let f = lookup("fully-tagged").unwrap();
        assert!(f.accept(&words(&["a", "b"]), &words(&["DT", "NN"])));
        assert!(!f.accept(&words(&["a", "b"]), &words(&["DT", ""])));
        assert!(!f.accept(&words(&["a", "b"]), &words(&["DT"])));
        assert!(!f.accept(&words(&["a", "b"]), &[]));
    }
}
