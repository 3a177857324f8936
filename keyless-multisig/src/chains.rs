use std::{collections::BTreeMap, sync::OnceLock};

use keyless_crypto::hash::DataHash;
use keyless_primitives::AggregationHashChain;

use crate::{DedupStore, Error, HierarchicalKey};

#[derive(Debug, Clone, Default)]
struct Leaves {
    keys: Vec<HierarchicalKey>,
    by_input_hash: BTreeMap<DataHash, HierarchicalKey>,
}

/// Aggregation chains of every stored signature, addressed by
/// [`HierarchicalKey`].
///
/// A stored key is a leaf when no other stored key precedes it; leaves are the
/// lowest chain of some signature and are looked up by their input hash. The
/// leaf set is computed lazily and forgotten on every mutation.
#[derive(Debug, Clone)]
pub struct ChainIndex {
    chains: DedupStore<HierarchicalKey, AggregationHashChain>,
    leaves: OnceLock<Leaves>,
}

impl Default for ChainIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainIndex {
    pub fn new() -> Self {
        Self {
            chains: DedupStore::new(HierarchicalKey::of_chain),
            leaves: OnceLock::new(),
        }
    }

    /// Inserts every chain not yet stored, returns how many were new
    pub fn add<I>(&mut self, chains: I) -> usize
    where
        I: IntoIterator<Item = AggregationHashChain>,
    {
        let mut added = 0;

        for chain in chains {
            if self.chains.add(chain) {
                added += 1;
            }
        }

        self.reindex();

        added
    }

    pub fn remove(&mut self, key: &HierarchicalKey) -> Option<AggregationHashChain> {
        let removed = self.chains.remove_key(key);
        self.reindex();
        removed
    }

    /// Drops the memoized leaf set
    pub fn reindex(&mut self) {
        self.leaves.take();
    }

    pub fn get(&self, key: &HierarchicalKey) -> Option<&AggregationHashChain> {
        self.chains.get(key)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn chains(&self) -> impl Iterator<Item = &AggregationHashChain> {
        self.chains.values()
    }

    /// Number of stored chains sitting below `key`
    pub fn count_referencing(&self, key: &HierarchicalKey) -> usize {
        self.chains.count_matching(|other, _| other.precedes(key))
    }

    /// Number of stored chains in the round
    pub fn count_in_round(&self, round_time: u64) -> usize {
        self.chains
            .count_matching(|key, _| key.round_time() == round_time)
    }

    fn leaves(&self) -> &Leaves {
        self.leaves.get_or_init(|| {
            let mut leaves = Leaves::default();

            for (key, chain) in self.chains.iter() {
                if self.chains.keys().any(|other| other.precedes(key)) {
                    continue;
                }

                leaves.keys.push(key.clone());

                // same document in two rounds, the later round wins
                leaves
                    .by_input_hash
                    .insert(chain.input_hash.clone(), key.clone());
            }

            leaves
        })
    }

    pub fn leaf_index(&self) -> &BTreeMap<DataHash, HierarchicalKey> {
        &self.leaves().by_input_hash
    }

    pub fn leaf_keys(&self) -> &[HierarchicalKey] {
        &self.leaves().keys
    }

    pub fn resolve(&self, input_hash: &DataHash) -> Option<&HierarchicalKey> {
        self.leaf_index().get(input_hash)
    }

    /// Chains from `key` up to the top of its tree
    pub fn chain_path(&self, key: &HierarchicalKey) -> Result<Vec<AggregationHashChain>, Error> {
        std::iter::once(key.clone())
            .chain(key.ancestor_keys())
            .map(|key| match self.chains.get(&key) {
                Some(chain) => Ok(chain.clone()),
                None => Err(Error::MissingChain(key)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyless_crypto::hash::{HashAlgorithm, Hasher};

    fn chain(round: u64, index: &[u64]) -> AggregationHashChain {
        AggregationHashChain {
            aggregation_time: round,
            chain_index: index.to_vec(),
            input_data: None,
            input_hash: Hasher::hash(HashAlgorithm::Sha2_256, format!("{index:?}").as_bytes()),
            aggregation_algorithm: HashAlgorithm::Sha2_256,
            links: vec![],
        }
    }

    fn index() -> ChainIndex {
        let mut index = ChainIndex::new();

        index.add([chain(10, &[1, 1]), chain(10, &[1])]);
        index.add([chain(10, &[1, 3, 1]), chain(10, &[1, 3]), chain(10, &[1])]);

        index
    }

    #[test]
    fn shared_chains_are_stored_once() {
        let index = index();

        assert_eq!(index.len(), 4);
        assert_eq!(index.leaf_keys().len(), 2);
    }

    #[test]
    fn leaves_resolve_by_input_hash() {
        let index = index();
        let leaf = chain(10, &[1, 3, 1]);

        let key = index.resolve(&leaf.input_hash).unwrap();
        assert_eq!(key.path(), &[1, 3, 1]);

        // inner chains are not leaves
        assert!(index.resolve(&chain(10, &[1, 3]).input_hash).is_none());
    }

    #[test]
    fn path_goes_bottom_to_top() {
        let index = index();

        let path = index
            .chain_path(&HierarchicalKey::new(10, vec![1, 3, 1]))
            .unwrap();

        let indices: Vec<_> = path.iter().map(|x| x.chain_index.clone()).collect();
        assert_eq!(indices, vec![vec![1, 3, 1], vec![1, 3], vec![1]]);
    }

    #[test]
    fn missing_ancestor_is_an_inconsistency() {
        let mut index = ChainIndex::new();
        index.add([chain(10, &[1, 3, 1]), chain(10, &[1])]);

        match index.chain_path(&HierarchicalKey::new(10, vec![1, 3, 1])) {
            Err(Error::MissingChain(key)) => assert_eq!(key.path(), &[1, 3]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn mutation_refreshes_leaves() {
        let mut index = index();
        assert_eq!(index.leaf_keys().len(), 2);

        index.remove(&HierarchicalKey::new(10, vec![1, 3, 1]));

        let leaves: Vec<_> = index.leaf_keys().iter().map(|x| x.path().to_vec()).collect();
        assert_eq!(leaves, vec![vec![1, 1], vec![1, 3]]);
    }

    #[test]
    fn references_come_from_lower_chains() {
        let index = index();

        assert_eq!(index.count_referencing(&HierarchicalKey::new(10, vec![1])), 3);
        assert_eq!(index.count_referencing(&HierarchicalKey::new(10, vec![1, 3])), 1);
        assert_eq!(index.count_referencing(&HierarchicalKey::new(10, vec![1, 1])), 0);
        assert_eq!(index.count_in_round(10), 4);
        assert_eq!(index.count_in_round(11), 0);
    }
}
