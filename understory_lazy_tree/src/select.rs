// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tri-state check propagation over a [`TreeStore`].

use alloc::vec::Vec;

use hashbrown::HashSet;
use tracing::trace;

use crate::error::UnknownKey;
use crate::key::TreeKey;
use crate::store::{NodeChildren, TreeStore};

/// Policy knobs for [`SelectionEngine`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct SelectionConfig {
    /// When `true`, unchecking a node also unchecks every materialized
    /// descendant. By default only the ancestors are cleared.
    pub cascade_down_on_uncheck: bool,
}

/// Check state of a node derived from its own flag and its descendants.
///
/// Only the boolean flag is stored; `Partial` is computed on demand for
/// views that render an indeterminate box.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CheckState {
    /// The node is checked.
    Checked,
    /// The node is unchecked but some materialized descendant is checked.
    Partial,
    /// Neither the node nor any materialized descendant is checked.
    Unchecked,
}

/// Applies check toggles and keeps ancestors and descendants consistent.
///
/// Checking a node checks its resolved descendants and then walks upward,
/// checking each ancestor whose materialized children are now all checked.
/// Unchecking a node always unchecks every ancestor.
///
/// Every mutating method returns the keys whose flag actually changed, in the
/// order they were visited, so a view can re-render just those rows.
///
/// # Example
///
/// ```
/// use understory_lazy_tree::{Item, SelectionEngine, TreeStore};
///
/// let mut store = TreeStore::new();
/// store
///     .materialize(None, [Item::branch("b", [Item::leaf("b1"), Item::leaf("b2")])])
///     .unwrap();
///
/// let engine = SelectionEngine::new();
/// engine.toggle(&mut store, &"b1", true).unwrap();
/// assert!(!store.lookup(&"b").unwrap().is_checked());
///
/// let changed = engine.toggle(&mut store, &"b2", true).unwrap();
/// assert_eq!(changed, ["b2", "b"]);
///
/// let changed = engine.toggle(&mut store, &"b1", false).unwrap();
/// assert_eq!(changed, ["b1", "b"]);
/// assert!(store.lookup(&"b2").unwrap().is_checked());
/// ```
#[derive(Copy, Clone, Debug, Default)]
pub struct SelectionEngine {
    config: SelectionConfig,
}

impl SelectionEngine {
    /// Creates an engine with the default [`SelectionConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SelectionConfig::default())
    }

    /// Creates an engine with the given configuration.
    #[must_use]
    pub fn with_config(config: SelectionConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> SelectionConfig {
        self.config
    }

    /// Sets `key` to `checked` and propagates the change.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownKey`] if `key` is not in the store. Nothing is
    /// modified in that case.
    pub fn toggle<K: TreeKey>(
        &self,
        store: &mut TreeStore<K>,
        key: &K,
        checked: bool,
    ) -> Result<Vec<K>, UnknownKey<K>> {
        let node = store
            .lookup_mut(key)
            .ok_or_else(|| UnknownKey(key.clone()))?;
        let mut changed = Vec::new();
        if node.set_checked(checked) {
            changed.push(key.clone());
        }

        if checked {
            check_descendants(store, key, &mut changed);
            check_ancestors(store, key, &mut changed);
        } else {
            if self.config.cascade_down_on_uncheck {
                uncheck_descendants(store, key, &mut changed);
            }
            uncheck_ancestors(store, key, &mut changed);
        }

        trace!(
            target: "understory_lazy_tree::select",
            ?key,
            checked,
            changed = changed.len(),
            "toggle"
        );
        Ok(changed)
    }

    /// Checks every resolved node in the store.
    ///
    /// Nodes reachable from the roots are visited in pre-order, followed by
    /// any detached nodes in key order.
    pub fn select_all<K: TreeKey>(&self, store: &mut TreeStore<K>) -> Vec<K> {
        set_all_resolved(store, true)
    }

    /// Unchecks every resolved node in the store, in the same order as
    /// [`select_all`](Self::select_all).
    pub fn unselect_all<K: TreeKey>(&self, store: &mut TreeStore<K>) -> Vec<K> {
        set_all_resolved(store, false)
    }

    /// Re-applies the downward cascade below a checked `key`.
    ///
    /// Used after new children were materialized under a node that was
    /// already checked. Does nothing if `key` is unknown or unchecked.
    pub fn inherit_checked<K: TreeKey>(&self, store: &mut TreeStore<K>, key: &K) -> Vec<K> {
        let mut changed = Vec::new();
        if store.lookup(key).is_some_and(|node| node.is_checked()) {
            check_descendants(store, key, &mut changed);
        }
        changed
    }

    /// Derives the tri-state of `key` from the stored flags.
    ///
    /// Returns `None` if `key` is unknown.
    #[must_use]
    pub fn check_state<K: TreeKey>(&self, store: &TreeStore<K>, key: &K) -> Option<CheckState> {
        let node = store.lookup(key)?;
        if node.is_checked() {
            return Some(CheckState::Checked);
        }
        let mut seen = HashSet::new();
        let mut stack: Vec<&K> = node.children().keys().iter().collect();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            if store.lookup(next).is_some_and(|node| node.is_checked()) {
                return Some(CheckState::Partial);
            }
            stack.extend(store.children(next));
        }
        Some(CheckState::Unchecked)
    }
}

/// Checks resolved descendants of `key`. Unresolved ones are skipped; they
/// have nothing below them to descend into anyway.
fn check_descendants<K: TreeKey>(store: &mut TreeStore<K>, key: &K, changed: &mut Vec<K>) {
    let mut seen = HashSet::new();
    let mut stack: Vec<K> = store.children(key).iter().rev().cloned().collect();
    while let Some(next) = stack.pop() {
        if !seen.insert(next.clone()) {
            continue;
        }
        let Some(node) = store.lookup_mut(&next) else {
            continue;
        };
        if !node.is_resolved() {
            continue;
        }
        if node.set_checked(true) {
            changed.push(next.clone());
        }
        stack.extend(store.children(&next).iter().rev().cloned());
    }
}

fn uncheck_descendants<K: TreeKey>(store: &mut TreeStore<K>, key: &K, changed: &mut Vec<K>) {
    let mut seen = HashSet::new();
    let mut stack: Vec<K> = store.children(key).iter().rev().cloned().collect();
    while let Some(next) = stack.pop() {
        if !seen.insert(next.clone()) {
            continue;
        }
        if let Some(node) = store.lookup_mut(&next)
            && node.set_checked(false)
        {
            changed.push(next.clone());
        }
        stack.extend(store.children(&next).iter().rev().cloned());
    }
}

/// Walks upward from `key`, checking each parent whose materialized
/// children are all checked. Stops at the first parent that does not qualify.
fn check_ancestors<K: TreeKey>(store: &mut TreeStore<K>, key: &K, changed: &mut Vec<K>) {
    let mut current = key.clone();
    for _ in 0..store.len() {
        let Some(parent) = store.parent(&current).cloned() else {
            return;
        };
        let complete = match store.lookup(&parent).map(|node| node.children()) {
            Some(NodeChildren::Loaded(siblings)) => siblings
                .iter()
                .all(|sibling| store.lookup(sibling).is_some_and(|node| node.is_checked())),
            Some(NodeChildren::Unknown | NodeChildren::Leaf) | None => false,
        };
        if !complete {
            return;
        }
        if let Some(node) = store.lookup_mut(&parent)
            && node.set_checked(true)
        {
            changed.push(parent.clone());
        }
        current = parent;
    }
}

fn uncheck_ancestors<K: TreeKey>(store: &mut TreeStore<K>, key: &K, changed: &mut Vec<K>) {
    let Ok(chain) = store.ancestor_chain(key) else {
        return;
    };
    for ancestor in chain.into_iter().rev() {
        if let Some(node) = store.lookup_mut(&ancestor)
            && node.set_checked(false)
        {
            changed.push(ancestor);
        }
    }
}

fn set_all_resolved<K: TreeKey>(store: &mut TreeStore<K>, checked: bool) -> Vec<K> {
    let mut changed = Vec::new();
    let mut keys = store.preorder();
    let mut detached: Vec<K> = {
        let reachable: HashSet<&K> = keys.iter().collect();
        store
            .keys()
            .filter(|key| !reachable.contains(key))
            .cloned()
            .collect()
    };
    detached.sort();
    keys.extend(detached);
    for key in keys {
        if let Some(node) = store.lookup_mut(&key)
            && node.is_resolved()
            && node.set_checked(checked)
        {
            changed.push(key);
        }
    }
    changed
}
