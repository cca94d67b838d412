// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Minimal batched prefetch planning for selection chains.

use alloc::vec::Vec;

use tracing::debug;

use crate::item::SelectionChain;
use crate::key::TreeKey;
use crate::store::TreeStore;

/// How much of a broken chain a single plan requests.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum PlanDepth {
    /// Request every ancestor from the first unresolved link to the end of
    /// the chain.
    ///
    /// The data source sees the full unresolved suffix and can answer with a
    /// subtree deep enough to resolve the chain, so one plan suffices.
    #[default]
    FullSuffix,
    /// Request only the first unresolved link of each chain.
    ///
    /// Deeper links are left for a later plan, once the first fetch has made
    /// them known.
    FirstUnresolved,
}

/// Keys to fetch, grouped into rank buckets.
///
/// The rank of a key is its offset within the chain that requested it, not
/// its depth in the tree. Each bucket is sorted and free of duplicates, and
/// there is never a trailing empty bucket. Interior buckets may be empty.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchRequest<K> {
    buckets: Vec<Vec<K>>,
}

impl<K> Default for BatchRequest<K> {
    fn default() -> Self {
        Self {
            buckets: Vec::new(),
        }
    }
}

impl<K: TreeKey> BatchRequest<K> {
    /// Returns `true` if nothing needs fetching.
    ///
    /// An empty request must not be sent to the data source.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// The rank buckets, lowest rank first.
    #[must_use]
    pub fn buckets(&self) -> &[Vec<K>] {
        &self.buckets
    }

    /// All requested keys, lowest rank first.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.buckets.iter().flatten()
    }

    /// Total number of requested keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Returns `true` if `key` was requested at any rank.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.buckets
            .iter()
            .any(|bucket| bucket.binary_search(key).is_ok())
    }
}

/// Computes the smallest batched fetch that makes selection chains resolvable.
///
/// # Example
///
/// ```
/// use understory_lazy_tree::{Item, PrefetchPlanner, SelectionChain, TreeStore};
///
/// let mut store = TreeStore::new();
/// store
///     .materialize(None, [Item::unknown("a"), Item::branch("b", [Item::leaf("b1")])])
///     .unwrap();
///
/// let planner = PrefetchPlanner::new();
/// assert!(planner.plan(&store, &[SelectionChain::new("b1", ["b"])]).is_empty());
///
/// let request = planner.plan(&store, &[SelectionChain::new("x", ["a", "a1"])]);
/// assert_eq!(request.buckets(), &[vec!["a"], vec!["a1"]]);
/// ```
#[derive(Copy, Clone, Debug, Default)]
pub struct PrefetchPlanner {
    depth: PlanDepth,
}

impl PrefetchPlanner {
    /// Creates a planner requesting full unresolved suffixes.
    #[must_use]
    pub fn new() -> Self {
        Self::with_depth(PlanDepth::default())
    }

    /// Creates a planner with the given [`PlanDepth`].
    #[must_use]
    pub fn with_depth(depth: PlanDepth) -> Self {
        Self { depth }
    }

    /// The configured [`PlanDepth`].
    #[must_use]
    pub fn depth(&self) -> PlanDepth {
        self.depth
    }

    /// Plans the fetch needed to resolve every chain in `targets`.
    ///
    /// For each chain the first ancestor that is not resolved (unknown
    /// children, or not in the store at all) marks the broken link. That
    /// ancestor, and with [`PlanDepth::FullSuffix`] every later one, lands in
    /// the bucket of its chain offset. Fully resolved chains contribute
    /// nothing, so resolved keys are never requested.
    ///
    /// With only `A` materialized and unresolved, the chain `X` under
    /// `[A, A1]` plans as `[[A], [A1]]` by default and as `[[A]]` with
    /// [`PlanDepth::FirstUnresolved`].
    #[must_use]
    pub fn plan<K: TreeKey>(
        &self,
        store: &TreeStore<K>,
        targets: &[SelectionChain<K>],
    ) -> BatchRequest<K> {
        let mut buckets: Vec<Vec<K>> = Vec::new();
        for chain in targets {
            let Some(first) = chain.parents.iter().position(|key| !store.is_resolved(key)) else {
                continue;
            };
            let last = match self.depth {
                PlanDepth::FullSuffix => chain.parents.len(),
                PlanDepth::FirstUnresolved => first + 1,
            };
            if buckets.len() < last {
                buckets.resize_with(last, Vec::new);
            }
            for (rank, key) in chain.parents.iter().enumerate().take(last).skip(first) {
                // Later links may already be resolved if the caller's chain
                // disagrees with the store; those never need fetching.
                if !store.is_resolved(key) {
                    buckets[rank].push(key.clone());
                }
            }
        }

        for bucket in &mut buckets {
            bucket.sort_unstable();
            bucket.dedup();
        }
        while buckets.last().is_some_and(Vec::is_empty) {
            buckets.pop();
        }

        let request = BatchRequest { buckets };
        debug!(
            target: "understory_lazy_tree::plan",
            targets = targets.len(),
            buckets = request.buckets.len(),
            keys = request.len(),
            "planned prefetch"
        );
        request
    }
}
