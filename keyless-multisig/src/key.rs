use std::fmt;

use keyless_primitives::{AggregationHashChain, Timestamp};

/// Address of an aggregation chain: its round plus its chain index.
///
/// Keys form a forest per round. A key whose path extends another key's path
/// sits below it (closer to the document) and is said to *precede* it.
///
/// The derived ordering (round, then path lexicographically) only gives the
/// container a stable storage order; it says nothing about precedence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HierarchicalKey {
    round_time: Timestamp,
    path: Vec<u64>,
}

impl HierarchicalKey {
    pub fn new(round_time: Timestamp, path: Vec<u64>) -> Self {
        Self { round_time, path }
    }

    pub fn of_chain(chain: &AggregationHashChain) -> Self {
        Self::new(chain.aggregation_time, chain.chain_index.clone())
    }

    #[inline]
    pub fn round_time(&self) -> Timestamp {
        self.round_time
    }

    #[inline]
    pub fn path(&self) -> &[u64] {
        &self.path
    }

    /// True when `other` is a strict, shorter prefix of `self` in the same
    /// round.
    pub fn precedes(&self, other: &HierarchicalKey) -> bool {
        self.round_time == other.round_time
            && other.path.len() < self.path.len()
            && self.path.starts_with(&other.path)
    }

    /// Keys of every proper, non-empty prefix of the path, longest first
    pub fn ancestor_keys(&self) -> Vec<HierarchicalKey> {
        (1..self.path.len())
            .rev()
            .map(|len| HierarchicalKey::new(self.round_time, self.path[..len].to_vec()))
            .collect()
    }
}

impl fmt::Display for HierarchicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/", self.round_time)?;

        for (i, step) in self.path.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }

            write!(f, "{step}")?;
        }

        Ok(())
    }
}
