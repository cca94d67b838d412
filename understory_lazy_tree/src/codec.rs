// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conversion between live check flags and portable selection chains.

use alloc::vec::Vec;

use hashbrown::HashSet;
use tracing::warn;

use crate::item::SelectionChain;
use crate::key::TreeKey;
use crate::select::SelectionEngine;
use crate::store::TreeStore;

/// Seeds check flags from chains and reads them back out.
#[derive(Copy, Clone, Debug, Default)]
pub struct SelectionCodec {
    engine: SelectionEngine,
}

impl SelectionCodec {
    /// Creates a codec that applies chains through `engine`.
    #[must_use]
    pub fn new(engine: SelectionEngine) -> Self {
        Self { engine }
    }

    /// Checks every target whose key is already in the store.
    ///
    /// Each applied target goes through [`SelectionEngine::toggle`], so
    /// descendants and ancestors update as they would for a user click.
    /// Targets whose key is not known yet are returned unchanged so they can
    /// be re-applied after the prefetch completes.
    ///
    /// A target whose declared parents disagree with the store is still
    /// applied; the store's own ancestry wins and a warning is logged.
    pub fn apply<K: TreeKey>(
        &self,
        store: &mut TreeStore<K>,
        targets: &[SelectionChain<K>],
    ) -> Vec<SelectionChain<K>> {
        let mut deferred = Vec::new();
        for target in targets {
            let Ok(chain) = store.ancestor_chain(&target.key) else {
                deferred.push(target.clone());
                continue;
            };
            if chain != target.parents {
                warn!(
                    target: "understory_lazy_tree::codec",
                    key = ?target.key,
                    declared = ?target.parents,
                    known = ?chain,
                    "selection chain disagrees with the tree; using the tree"
                );
            }
            if self.engine.toggle(store, &target.key, true).is_err() {
                deferred.push(target.clone());
            }
        }
        deferred
    }

    /// Collects every checked node, with its ancestors, in depth-first
    /// order.
    ///
    /// Checked ancestors do not stop the walk; each checked descendant is
    /// reported on its own. If the store has never been materialized there
    /// is nothing to walk, and `fallback` is echoed back unchanged.
    #[must_use]
    pub fn extract<K: TreeKey>(
        &self,
        store: &TreeStore<K>,
        fallback: &[SelectionChain<K>],
    ) -> Vec<SelectionChain<K>> {
        if !store.is_materialized() {
            return fallback.to_vec();
        }

        let mut out = Vec::new();
        // (key, depth) pairs; `path` holds the ancestors of the current depth.
        let mut stack: Vec<(&K, usize)> = store.roots().iter().rev().map(|key| (key, 0)).collect();
        let mut path: Vec<K> = Vec::new();
        let mut seen = HashSet::new();
        while let Some((key, depth)) = stack.pop() {
            path.truncate(depth);
            if !seen.insert(key) {
                continue;
            }
            let Some(node) = store.lookup(key) else {
                continue;
            };
            if node.is_checked() {
                out.push(SelectionChain::new(key.clone(), path.iter().cloned()));
            }
            let children = node.children().keys();
            if !children.is_empty() {
                path.push(key.clone());
                stack.extend(children.iter().rev().map(|child| (child, depth + 1)));
            }
        }
        out
    }
}
