//! Record-id index with radix trie
//!
//! Ids are keyed case-insensitively so `Smith2020` and `smith2020` collide,
//! as they would on case-insensitive filesystems where PDFs are named after
//! record ids.

use parking_lot::RwLock;
use radix_trie::{Trie, TrieCommon};

/// Index of the ids in use
///
/// The trie answers "which ids start with this base" for suffix generation.
#[derive(Debug, Default)]
pub struct IdIndex {
    /// lowercase id -> id as written
    trie: RwLock<Trie<String, String>>,
}

impl IdIndex {
    /// Create empty index
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index built from existing ids
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let index = Self::new();
        for id in ids {
            index.insert(id.as_ref());
        }
        index
    }

    /// Register an id; returns false if a case-insensitive equal id exists
    pub fn insert(&self, id: &str) -> bool {
        let key = id.to_lowercase();
        let mut trie = self.trie.write();
        if trie.get(&key).is_some() {
            return false;
        }
        trie.insert(key, id.to_string());
        true
    }

    /// Remove an id
    pub fn remove(&self, id: &str) -> bool {
        self.trie.write().remove(&id.to_lowercase()).is_some()
    }

    /// Whether an id is taken (case-insensitive)
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.trie.read().get(&id.to_lowercase()).is_some()
    }

    /// Ids sharing the prefix `base`, including `base` itself
    #[must_use]
    pub fn with_prefix(&self, base: &str) -> Vec<String> {
        let key = base.to_lowercase();
        let trie = self.trie.read();
        trie.get_raw_descendant(&key)
            .map(|sub| {
                sub.values()
                    .filter(|id| id.to_lowercase().starts_with(&key))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of ids
    #[must_use]
    pub fn len(&self) -> usize {
        self.trie.read().len()
    }

    /// Whether the index is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First free id among `base`, `base`a ... `base`z, `base`aa, ...
    #[must_use]
    pub fn next_unique_id(&self, base: &str) -> String {
        let taken: Vec<String> = self
            .with_prefix(base)
            .into_iter()
            .map(|id| id.to_lowercase())
            .collect();
        if !taken.contains(&base.to_lowercase()) {
            return base.to_string();
        }
        (1..)
            .map(letter_suffix)
            .map(|suffix| format!("{base}{suffix}"))
            .find(|candidate| !taken.contains(&candidate.to_lowercase()))
            .unwrap_or_else(|| base.to_string())
    }
}

/// `1 -> a`, `26 -> z`, `27 -> aa`, `28 -> ab`
fn letter_suffix(mut n: usize) -> String {
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push(b'a' + u8::try_from(n % 26).unwrap_or(0));
        n /= 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_suffixes() {
        assert_eq!(letter_suffix(1), "a");
        assert_eq!(letter_suffix(26), "z");
        assert_eq!(letter_suffix(27), "aa");
        assert_eq!(letter_suffix(28), "ab");
        assert_eq!(letter_suffix(52), "az");
        assert_eq!(letter_suffix(53), "ba");
    }

    #[test]
    fn case_insensitive_collisions() {
        let index = IdIndex::from_ids(["Smith2020"]);
        assert!(index.contains("SMITH2020"));
        assert!(!index.insert("smith2020"));
        assert_eq!(index.next_unique_id("Smith2020"), "Smith2020a");
    }

    #[test]
    fn suffixes_skip_taken_letters() {
        let index = IdIndex::from_ids(["Smith2020", "Smith2020a", "Smith2020B"]);
        assert_eq!(index.next_unique_id("Smith2020"), "Smith2020c");
        assert_eq!(index.next_unique_id("Doe2020"), "Doe2020");
    }

    #[test]
    fn prefix_lookup() {
        let index = IdIndex::from_ids(["Smith2020", "Smith2020a", "Smith2021"]);
        let mut found = index.with_prefix("Smith2020");
        found.sort();
        assert_eq!(found, vec!["Smith2020", "Smith2020a"]);
        assert!(index.with_prefix("Doe").is_empty());
    }

    #[test]
    fn removed_ids_are_free_again() {
        let index = IdIndex::from_ids(["Smith2020", "Smith2020a"]);
        assert!(index.remove("SMITH2020"));
        assert!(!index.contains("Smith2020"));
        assert_eq!(index.len(), 1);
        assert_eq!(index.next_unique_id("Smith2020"), "Smith2020");
    }
}
