// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Byte-keyed radix tree for prefix lookups over the word dictionary.
//!
//! Edges carry byte substrings, so a lookup costs O(|prefix|) regardless of
//! dictionary size. A terminal edge carries the token id of the word spelled
//! by the path down to it. Inserting may split an existing edge:
//!
//! ```text
//! o --------------> o --- ...          o ----------> o -------------> o --- ...
//!      [aabb] id            becomes         [aa]         [bb] id
//! ```
//!
//! The sub-edge keeps the original id and the original subtree, which is what
//! makes the split safe to do mid-stream while the dictionary loads.
//!
//! Labels are raw bytes, not chars: splits may land inside a UTF-8 sequence,
//! but terminal paths always reassemble the exact byte string that was added.

/// An edge holds a label, an optional token id (terminal edges only), and
/// the node it leads to.
#[derive(Debug)]
struct Edge {
    label: Vec<u8>,
    id: Option<u64>,
    node: Node,
}

#[derive(Debug, Default)]
struct Node {
    edges: Vec<Edge>,
}

/// Radix tree mapping words to dictionary ids.
#[derive(Debug, Default)]
pub struct RadixTree {
    root: Node,
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Split `edge` after `at` label bytes. The tail of the label, the old id,
/// and the old subtree all move one level down; the caller decides what id
/// the shortened top edge gets.
fn split_edge(edge: &mut Edge, at: usize) {
    debug_assert!(at < edge.label.len());
    let rest = edge.label.split_off(at);
    let child = Edge {
        label: rest,
        id: edge.id.take(),
        node: std::mem::take(&mut edge.node),
    };
    edge.node.edges.push(child);
}

fn insert(node: &mut Node, word: &[u8], id: u64) {
    for i in 0..node.edges.len() {
        let cpl = common_prefix_len(word, &node.edges[i].label);
        if cpl == 0 {
            continue;
        }
        let label_len = node.edges[i].label.len();
        if cpl == label_len && cpl == word.len() {
            // word ends exactly on this edge (created earlier by a split)
            node.edges[i].id.get_or_insert(id);
            return;
        }
        if cpl == label_len {
            return insert(&mut node.edges[i].node, &word[cpl..], id);
        }
        if cpl == word.len() {
            // word is a proper prefix of the label: the shortened edge
            // becomes terminal for it
            split_edge(&mut node.edges[i], cpl);
            node.edges[i].id = Some(id);
            return;
        }
        // partial overlap: split at the fork, then descend with the rest
        split_edge(&mut node.edges[i], cpl);
        node.edges[i].id = None;
        return insert(&mut node.edges[i].node, &word[cpl..], id);
    }
    node.edges.push(Edge {
        label: word.to_vec(),
        id: Some(id),
        node: Node::default(),
    });
}

/// Locate the edge on whose label `word` ends exactly.
fn traverse<'a>(node: &'a Node, word: &[u8]) -> Option<&'a Edge> {
    for edge in &node.edges {
        if word == edge.label.as_slice() {
            return Some(edge);
        }
        if word.starts_with(&edge.label) {
            return traverse(&edge.node, &word[edge.label.len()..]);
        }
    }
    None
}

/// Locate the edge on whose label `prefix` ends, inclusive: the prefix may
/// stop in the middle of the label.
fn locate_prefix<'a>(node: &'a Node, prefix: &[u8]) -> Option<&'a Edge> {
    for edge in &node.edges {
        if prefix.starts_with(&edge.label) && prefix.len() > edge.label.len() {
            return locate_prefix(&edge.node, &prefix[edge.label.len()..]);
        }
        if edge.label.starts_with(prefix) {
            return Some(edge);
        }
    }
    None
}

fn collect_ids(node: &Node, out: &mut Vec<u64>) {
    for edge in &node.edges {
        if let Some(id) = edge.id {
            out.push(id);
        }
        collect_ids(&edge.node, out);
    }
}

fn collect_words(node: &Node, path: &mut Vec<u8>, out: &mut Vec<String>) {
    for edge in &node.edges {
        path.extend_from_slice(&edge.label);
        if edge.id.is_some() {
            out.push(String::from_utf8_lossy(path).into_owned());
        }
        collect_words(&edge.node, path, out);
        path.truncate(path.len() - edge.label.len());
    }
}

impl RadixTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a word with its dictionary id, splitting edges as needed.
    pub fn add(&mut self, word: &str, id: u64) {
        if word.is_empty() {
            return;
        }
        insert(&mut self.root, word.as_bytes(), id);
    }

    /// Exact lookup.
    pub fn find(&self, word: &str) -> Option<u64> {
        traverse(&self.root, word.as_bytes()).and_then(|e| e.id)
    }

    /// Ids of every word starting with `prefix`, including the prefix itself
    /// when it is a word. Ids come out in edge-insertion order.
    pub fn find_indices_by_prefix(&self, prefix: &str) -> Vec<u64> {
        let mut out = Vec::new();
        if let Some(edge) = locate_prefix(&self.root, prefix.as_bytes()) {
            if let Some(id) = edge.id {
                out.push(id);
            }
            collect_ids(&edge.node, &mut out);
        }
        out
    }

    /// Words starting with `prefix`, reassembled from edge labels.
    pub fn find_by_prefix(&self, prefix: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(edge) = locate_prefix(&self.root, prefix.as_bytes()) {
            if edge.id.is_some() {
                out.push(prefix.to_string());
            }
            let mut path = prefix.as_bytes().to_vec();
            collect_words(&edge.node, &mut path, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latin_tree() -> RadixTree {
        let words = [
            "romane", "romanus", "romulus", "rubens", "ruber", "rubicon", "rubicundus",
        ];
        let mut tree = RadixTree::new();
        for (i, w) in words.iter().enumerate() {
            tree.add(w, i as u64);
        }
        tree
    }

    #[test]
    fn exact_find_after_splits() {
        let tree = latin_tree();
        assert_eq!(tree.find("romane"), Some(0));
        assert_eq!(tree.find("romanus"), Some(1));
        assert_eq!(tree.find("rubicon"), Some(5));
        assert_eq!(tree.find("rubicundus"), Some(6));
        assert_eq!(tree.find("rom"), None);
        assert_eq!(tree.find("rubico"), None);
    }

    #[test]
    fn prefix_search_collects_whole_subtree() {
        let tree = latin_tree();
        let mut ids = tree.find_indices_by_prefix("rom");
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2]);

        let mut ids = tree.find_indices_by_prefix("rubic");
        ids.sort_unstable();
        assert_eq!(ids, vec![5, 6]);

        assert!(tree.find_indices_by_prefix("romix").is_empty());
        assert!(tree.find_indices_by_prefix("x").is_empty());
    }

    #[test]
    fn prefix_that_is_itself_a_word_is_included() {
        let mut tree = RadixTree::new();
        tree.add("car", 0);
        tree.add("carpet", 1);
        tree.add("carpets", 2);
        let mut ids = tree.find_indices_by_prefix("car");
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2]);
        let mut ids = tree.find_indices_by_prefix("carpet");
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn split_preserves_existing_subtree() {
        let mut tree = RadixTree::new();
        tree.add("abcdef", 10);
        tree.add("abcxyz", 11);
        tree.add("abc", 12);
        assert_eq!(tree.find("abcdef"), Some(10));
        assert_eq!(tree.find("abcxyz"), Some(11));
        assert_eq!(tree.find("abc"), Some(12));
    }

    #[test]
    fn collects_words_not_just_ids() {
        let tree = latin_tree();
        let mut words = tree.find_by_prefix("rub");
        words.sort();
        assert_eq!(words, vec!["rubens", "ruber", "rubicon", "rubicundus"]);
    }

    #[test]
    fn multibyte_words_survive_byte_level_splits() {
        let mut tree = RadixTree::new();
        tree.add("žluťoučký", 0);
        tree.add("žlutý", 1);
        assert_eq!(tree.find("žluťoučký"), Some(0));
        assert_eq!(tree.find("žlutý"), Some(1));
        let mut words = tree.find_by_prefix("žlu");
        words.sort();
        assert_eq!(words, vec!["žlutý", "žluťoučký"]);
    }
}
