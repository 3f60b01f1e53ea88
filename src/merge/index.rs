//! Multi-key identity index over merge representatives
//!
//! The primary map answers "is there a representative registered under
//! this exact id" in O(1). The secondary map holds every folded id, name
//! and tag of every representative, pointing at the earliest representative
//! that carries it. Probing it reproduces a scan over all representatives
//! in creation order without walking them.

use std::collections::HashMap;

use crate::utils::text::fold_key;

/// Position of a representative in the merge engine's arena
pub type RepId = usize;

#[derive(Debug, Default)]
pub struct IdentityIndex {
    primary: HashMap<String, RepId>,
    secondary: HashMap<String, RepId>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Representative registered under exactly this (folded) id
    pub fn primary(&self, id: &str) -> Option<RepId> {
        self.primary.get(id).copied()
    }

    /// Register `rep` under `id` unless another representative already owns it
    pub fn register_primary(&mut self, id: &str, rep: RepId) -> bool {
        if id.is_empty() || self.primary.contains_key(id) {
            return false;
        }
        self.primary.insert(id.to_string(), rep);
        true
    }

    /// Fast path: the candidate's id, then each of its tags, against registered ids
    pub fn exact<'a, I>(&self, id: &str, tags: I) -> Option<RepId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.primary(id)
            .or_else(|| tags.into_iter().find_map(|tag| self.primary(tag)))
    }

    /// Fallback: any of the candidate's keys against any key of any representative
    ///
    /// Returns the earliest-created matching representative.
    pub fn alias<'a, I>(&self, keys: I) -> Option<RepId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter()
            .filter(|key| !key.is_empty())
            .filter_map(|key| self.secondary.get(key).copied())
            .min()
    }

    /// Make `rep` reachable through each of `keys` (folded before insertion)
    pub fn register_aliases<'a, I>(&mut self, keys: I, rep: RepId)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for key in keys {
            let folded = fold_key(key);
            if folded.is_empty() {
                continue;
            }
            let slot = self.secondary.entry(folded).or_insert(rep);
            if rep < *slot {
                *slot = rep;
            }
        }
    }

    pub fn primary_len(&self) -> usize {
        self.primary.len()
    }

    pub fn alias_len(&self) -> usize {
        self.secondary.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_prefers_id_then_tags() {
        let mut index = IdentityIndex::new();
        assert!(index.register_primary("vtv1", 0));
        assert!(index.register_primary("htv7", 1));
        assert!(!index.register_primary("vtv1", 5));

        assert_eq!(index.exact("vtv1", ["htv7"]), Some(0));
        assert_eq!(index.exact("unknown", ["nope", "htv7"]), Some(1));
        assert_eq!(index.exact("unknown", Vec::<&str>::new()), None);
    }

    #[test]
    fn test_alias_returns_earliest_representative() {
        let mut index = IdentityIndex::new();
        index.register_aliases(["VTV1", " VTV One "], 3);
        index.register_aliases(["vtv one", "VTV1 HD"], 1);
        index.register_aliases(["vtv1 hd"], 2);

        assert_eq!(index.alias(["vtv one"]), Some(1));
        assert_eq!(index.alias(["vtv1", "vtv1 hd"]), Some(1));
        assert_eq!(index.alias(["vtv1"]), Some(3));
        assert_eq!(index.alias(["", "other"]), None);
        assert_eq!(index.alias_len(), 3);
    }
}
