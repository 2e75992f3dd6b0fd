//! Multi-level token trie.
//!
//! Each level maps a full token to the next level. Lookups may abbreviate
//! any token to a unique prefix of a key at that level (`en.ho` finds
//! `env.home`), unless a perfect match is requested. An exact key always
//! wins over abbreviations, so `a` resolves to `a` even when `ab` exists.

use std::collections::BTreeMap;


#[derive(Debug, Clone)]
struct TrieLevel<V> {
    value: Option<V>,
    children: BTreeMap<String, TrieLevel<V>>,
}

impl<V> TrieLevel<V> {
    fn new() -> Self {
        TrieLevel {
            value: None,
            children: BTreeMap::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    /// Keys at this level that start with `token`, in sorted order.
    fn keys_with_prefix<'a>(&'a self, token: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.children
            .range::<str, _>((std::ops::Bound::Included(token), std::ops::Bound::Unbounded))
            .map(|(k, _)| k)
            .take_while(move |k| k.starts_with(token))
    }
}


/// Outcome of a trie search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult<V> {
    /// Every token matched and a value is stored at the final level.
    pub found: bool,
    /// The search stopped because a token abbreviates several keys.
    pub ambiguous: bool,
    /// Number of leading tokens that were resolved.
    pub matched_token_count: usize,
    /// The full keys of the resolved tokens.
    pub matched_path: Vec<String>,
    /// Keys sharing the unresolved token, filled only when ambiguous.
    pub candidates: Vec<String>,
    pub value: Option<V>,
}


/// Prefix tree keyed by token sequences.
#[derive(Debug, Clone)]
pub struct MultiLevelTrie<V> {
    root: TrieLevel<V>,
}

impl<V: Clone> MultiLevelTrie<V> {
    pub fn new() -> Self {
        MultiLevelTrie {
            root: TrieLevel::new(),
        }
    }

    /// Store `value` at `tokens`, returning the value it replaced.
    pub fn insert(&mut self, tokens: &[String], value: V) -> Option<V> {
        let mut level = &mut self.root;
        for token in tokens {
            level = level
                .children
                .entry(token.clone())
                .or_insert_with(TrieLevel::new);
        }
        level.value.replace(value)
    }

    /// Remove the value at exactly `tokens`, pruning levels left empty.
    pub fn remove(&mut self, tokens: &[String]) -> Option<V> {
        remove_at(&mut self.root, tokens)
    }

    /// Value stored at exactly `tokens`, without abbreviation.
    pub fn get(&self, tokens: &[String]) -> Option<&V> {
        let mut level = &self.root;
        for token in tokens {
            level = level.children.get(token)?;
        }
        level.value.as_ref()
    }

    /// Walk `tokens` down the trie.
    ///
    /// With `perfect_match` every token must equal a key. Otherwise a token
    /// may abbreviate exactly one key; abbreviating several stops the walk
    /// and reports the ambiguity.
    pub fn search(&self, tokens: &[String], perfect_match: bool) -> SearchResult<V> {
        let mut level = &self.root;
        let mut matched_path = Vec::with_capacity(tokens.len());

        for token in tokens {
            if let Some(child) = level.children.get(token) {
                matched_path.push(token.clone());
                level = child;
                continue;
            }
            if perfect_match {
                return SearchResult::stopped(matched_path, Vec::new());
            }
            let mut keys = level.keys_with_prefix(token);
            match (keys.next(), keys.next()) {
                (Some(only), None) => {
                    matched_path.push(only.clone());
                    level = &level.children[only];
                }
                (Some(first), Some(second)) => {
                    let mut candidates = vec![first.clone(), second.clone()];
                    candidates.extend(keys.cloned());
                    return SearchResult::stopped(matched_path, candidates);
                }
                _ => return SearchResult::stopped(matched_path, Vec::new()),
            }
        }

        SearchResult {
            found: level.value.is_some(),
            ambiguous: false,
            matched_token_count: matched_path.len(),
            matched_path,
            candidates: Vec::new(),
            value: level.value.clone(),
        }
    }

    /// Every stored entry whose token sequence starts with `prefix`,
    /// in lexical token order.
    pub fn enumerate_prefix(&self, prefix: &[String]) -> Vec<(Vec<String>, V)> {
        let mut level = &self.root;
        for token in prefix {
            match level.children.get(token) {
                Some(child) => level = child,
                None => return Vec::new(),
            }
        }
        let mut out = Vec::new();
        let mut path = prefix.to_vec();
        collect(level, &mut path, &mut out);
        out
    }
}

impl<V: Clone> Default for MultiLevelTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SearchResult<V> {
    fn stopped(matched_path: Vec<String>, candidates: Vec<String>) -> Self {
        SearchResult {
            found: false,
            ambiguous: !candidates.is_empty(),
            matched_token_count: matched_path.len(),
            matched_path,
            candidates,
            value: None,
        }
    }
}


// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

fn remove_at<V>(level: &mut TrieLevel<V>, tokens: &[String]) -> Option<V> {
    let Some((first, rest)) = tokens.split_first() else {
        return level.value.take();
    };
    let child = level.children.get_mut(first)?;
    let removed = remove_at(child, rest);
    if child.is_empty() {
        level.children.remove(first);
    }
    removed
}

fn collect<V: Clone>(level: &TrieLevel<V>, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, V)>) {
    if let Some(value) = &level.value {
        out.push((path.clone(), value.clone()));
    }
    for (key, child) in &level.children {
        path.push(key.clone());
        collect(child, path, out);
        path.pop();
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split('.').map(String::from).collect()
    }

    fn sample() -> MultiLevelTrie<u32> {
        let mut trie = MultiLevelTrie::new();
        trie.insert(&toks("env.home"), 1);
        trie.insert(&toks("env.host"), 2);
        trie.insert(&toks("env.path"), 3);
        trie.insert(&toks("enable"), 4);
        trie
    }

    #[test]
    fn exact_search_finds_value() {
        let trie = sample();
        let r = trie.search(&toks("env.home"), true);
        assert!(r.found);
        assert_eq!(r.value, Some(1));
        assert_eq!(r.matched_token_count, 2);
    }

    #[test]
    fn abbreviated_tokens_resolve_when_unique() {
        let trie = sample();
        let r = trie.search(&toks("env.pa"), false);
        assert!(r.found);
        assert_eq!(r.value, Some(3));
        assert_eq!(r.matched_path, toks("env.path"));
    }

    #[test]
    fn abbreviation_refused_with_perfect_match() {
        let trie = sample();
        let r = trie.search(&toks("env.pa"), true);
        assert!(!r.found);
        assert!(!r.ambiguous);
        assert_eq!(r.matched_token_count, 1);
    }

    #[test]
    fn shared_prefix_is_ambiguous() {
        let trie = sample();
        let r = trie.search(&toks("env.ho"), false);
        assert!(!r.found);
        assert!(r.ambiguous);
        assert_eq!(r.matched_path, toks("env"));
        assert_eq!(r.candidates, vec!["home".to_string(), "host".to_string()]);
    }

    #[test]
    fn exact_key_beats_abbreviation() {
        let mut trie = MultiLevelTrie::new();
        trie.insert(&toks("a"), 1);
        trie.insert(&toks("ab"), 2);
        let r = trie.search(&toks("a"), false);
        assert!(r.found);
        assert_eq!(r.value, Some(1));
    }

    #[test]
    fn intermediate_level_is_not_found() {
        let trie = sample();
        let r = trie.search(&toks("env"), true);
        assert!(!r.found);
        assert_eq!(r.matched_token_count, 1);
    }

    #[test]
    fn remove_prunes_empty_levels() {
        let mut trie = MultiLevelTrie::new();
        trie.insert(&toks("a.b.c"), 1);
        assert_eq!(trie.remove(&toks("a.b.c")), Some(1));
        assert!(trie.enumerate_prefix(&[]).is_empty());
        assert!(!trie.search(&toks("a"), false).ambiguous);
        assert_eq!(trie.search(&toks("a"), false).matched_token_count, 0);
    }

    #[test]
    fn remove_keeps_descendants() {
        let mut trie = MultiLevelTrie::new();
        trie.insert(&toks("a.b"), 1);
        trie.insert(&toks("a.b.c"), 2);
        trie.remove(&toks("a.b"));
        assert_eq!(trie.get(&toks("a.b.c")), Some(&2));
        assert_eq!(trie.enumerate_prefix(&[]).len(), 1);
    }

    #[test]
    fn enumerate_prefix_lists_subtree() {
        let trie = sample();
        let entries = trie.enumerate_prefix(&toks("env"));
        let paths: Vec<String> = entries.iter().map(|(p, _)| p.join(".")).collect();
        assert_eq!(paths, vec!["env.home", "env.host", "env.path"]);
        assert_eq!(trie.enumerate_prefix(&[]).len(), 4);
    }

    #[test]
    fn ambiguity_at_first_level_lists_every_key() {
        let trie = sample();
        let r = trie.search(&toks("en.home"), false);
        assert!(r.ambiguous);
        assert_eq!(r.matched_token_count, 0);
        assert_eq!(r.candidates, vec!["enable".to_string(), "env".to_string()]);
    }

    #[test]
    fn insert_replaces_value() {
        let mut trie = MultiLevelTrie::new();
        assert_eq!(trie.insert(&toks("x"), 1), None);
        assert_eq!(trie.insert(&toks("x"), 2), Some(1));
        assert_eq!(trie.enumerate_prefix(&[]), vec![(toks("x"), 2)]);
    }
}
