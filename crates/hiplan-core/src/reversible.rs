//! A map that can also be queried in reverse.
//!
//! The forward direction maps each key to exactly one value; the reverse direction
//! maps each value to the set of keys that currently map to it. Both directions are
//! only ever changed together, through [`ReversibleMap::insert`] and friends.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A forward map `K -> V` kept in sync with its reverse `V -> {K}`.
///
/// # Example
///
/// ```
/// use hiplan_core::ReversibleMap;
///
/// // step -> current sub-goal stage index
/// let mut current = ReversibleMap::new();
/// current.insert(1, 1);
/// current.insert(2, 1);
/// current.insert(3, 2);
///
/// assert_eq!(current.get(&2), Some(&1));
/// assert_eq!(current.reverse_get(&1).map(|s| s.len()), Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<K, V>", into = "BTreeMap<K, V>")]
#[serde(bound(
    serialize = "K: Ord + Clone + Serialize, V: Ord + Clone + Serialize",
    deserialize = "K: Ord + Clone + Deserialize<'de>, V: Ord + Clone + Deserialize<'de>"
))]
pub struct ReversibleMap<K: Ord + Clone, V: Ord + Clone> {
    forward: BTreeMap<K, V>,
    reverse: BTreeMap<V, BTreeSet<K>>,
}

impl<K: Ord + Clone, V: Ord + Clone> ReversibleMap<K, V> {
    pub fn new() -> Self {
        Self {
            forward: BTreeMap::new(),
            reverse: BTreeMap::new(),
        }
    }

    /// Maps `key` to `value`, returning the value it previously mapped to.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.forward.insert(key.clone(), value.clone());
        if let Some(old) = &previous {
            self.detach(&key, old);
        }
        self.reverse.entry(value).or_default().insert(key);
        previous
    }

    /// Removes `key`, returning the value it mapped to.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.forward.remove(key)?;
        self.detach(key, &value);
        Some(value)
    }

    /// Inserts every pair of `other`, overwriting existing keys.
    pub fn extend(&mut self, other: &ReversibleMap<K, V>) {
        for (key, value) in other.iter() {
            self.insert(key.clone(), value.clone());
        }
    }

    /// Keeps only the pairs for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) {
        let dropped: Vec<K> = self
            .forward
            .iter()
            .filter(|(k, v)| !keep(k, v))
            .map(|(k, _)| k.clone())
            .collect();
        for key in dropped {
            self.remove(&key);
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.forward.get(key)
    }

    /// Returns the set of keys mapping to `value`.
    pub fn reverse_get(&self, value: &V) -> Option<&BTreeSet<K>> {
        self.reverse.get(value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.forward.contains_key(key)
    }

    pub fn contains_value(&self, value: &V) -> bool {
        self.reverse.contains_key(value)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.forward.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.forward.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.forward.values()
    }

    /// Iterates the reverse direction in value order.
    pub fn reverse_iter(&self) -> impl Iterator<Item = (&V, &BTreeSet<K>)> {
        self.reverse.iter()
    }

    pub fn first_key(&self) -> Option<&K> {
        self.forward.keys().next()
    }

    pub fn last_key(&self) -> Option<&K> {
        self.forward.keys().next_back()
    }

    fn detach(&mut self, key: &K, value: &V) {
        if let Some(keys) = self.reverse.get_mut(value) {
            keys.remove(key);
            if keys.is_empty() {
                self.reverse.remove(value);
            }
        }
    }
}

impl<K: Ord + Clone, V: Ord + Clone> Default for ReversibleMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V: Ord + Clone> FromIterator<(K, V)> for ReversibleMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<K: Ord + Clone, V: Ord + Clone> From<BTreeMap<K, V>> for ReversibleMap<K, V> {
    fn from(forward: BTreeMap<K, V>) -> Self {
        forward.into_iter().collect()
    }
}

impl<K: Ord + Clone, V: Ord + Clone> From<ReversibleMap<K, V>> for BTreeMap<K, V> {
    fn from(map: ReversibleMap<K, V>) -> Self {
        map.forward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_moves_reverse_entry() {
        let mut map = ReversibleMap::new();
        map.insert(5, 2);
        map.insert(6, 2);
        assert_eq!(map.insert(6, 3), Some(2));

        assert_eq!(map.reverse_get(&2).map(|s| s.len()), Some(1));
        assert!(map.reverse_get(&3).is_some_and(|s| s.contains(&6)));
    }

    #[test]
    fn test_remove_drops_empty_reverse_set() {
        let mut map: ReversibleMap<u32, u32> = [(1, 1), (2, 2)].into_iter().collect();
        map.remove(&2);

        assert!(!map.contains_value(&2));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_retain() {
        let mut map: ReversibleMap<u32, u32> = (1..=6).map(|s| (s, (s + 1) / 2)).collect();
        map.retain(|step, _| *step <= 3);

        assert_eq!(map.last_key(), Some(&3));
        assert_eq!(map.reverse_get(&2).map(|s| s.len()), Some(1));
        assert!(!map.contains_value(&3));
    }
}
