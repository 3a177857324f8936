use std::collections::{btree_map::Entry, BTreeMap};

/// Keyed set of substructures where each item carries its own key.
///
/// The key is derived from the item by a plain function supplied at
/// construction, so the same store serves every substructure kind. Adding an
/// item whose key is already present keeps the stored item.
#[derive(Debug, Clone)]
pub struct DedupStore<K, T> {
    items: BTreeMap<K, T>,
    key_of: fn(&T) -> K,
}

impl<K: Ord, T> DedupStore<K, T> {
    pub fn new(key_of: fn(&T) -> K) -> Self {
        Self {
            items: BTreeMap::new(),
            key_of,
        }
    }

    pub fn key_of(&self, item: &T) -> K {
        (self.key_of)(item)
    }

    /// Returns false, dropping `item`, if its key is already taken
    pub fn add(&mut self, item: T) -> bool {
        match self.items.entry((self.key_of)(&item)) {
            Entry::Vacant(entry) => {
                entry.insert(item);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn remove(&mut self, item: &T) -> Option<T> {
        self.items.remove(&(self.key_of)(item))
    }

    pub fn remove_key(&mut self, key: &K) -> Option<T> {
        self.items.remove(key)
    }

    pub fn get(&self, key: &K) -> Option<&T> {
        self.items.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.items.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &T)> {
        self.items.iter()
    }

    /// Linear scan counting the items accepted by `predicate`
    pub fn count_matching<P>(&self, predicate: P) -> usize
    where
        P: Fn(&K, &T) -> bool,
    {
        self.items.iter().filter(|(k, v)| predicate(k, v)).count()
    }
}
