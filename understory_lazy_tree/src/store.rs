// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flat key index over a partially materialized forest.

use alloc::string::String;
use alloc::vec::Vec;

use hashbrown::hash_map::Entry;
use hashbrown::{HashMap, HashSet};
use tracing::{debug, trace, warn};

use crate::error::UnknownKey;
use crate::item::{ChildState, Item};
use crate::key::TreeKey;

/// What a [`Node`] knows about its children.
///
/// Children are stored as keys; the nodes themselves live in the owning
/// [`TreeStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeChildren<K> {
    /// Not fetched yet.
    Unknown,
    /// The node is a leaf.
    Leaf,
    /// Known children, in display order. May be empty.
    Loaded(Vec<K>),
}

impl<K> NodeChildren<K> {
    /// Returns the child keys, or an empty slice if none are materialized.
    #[must_use]
    pub fn keys(&self) -> &[K] {
        match self {
            Self::Loaded(keys) => keys,
            Self::Unknown | Self::Leaf => &[],
        }
    }

    /// Returns `true` if at least one child is materialized.
    ///
    /// Populated levels are never overwritten by later materialization.
    fn is_populated(&self) -> bool {
        match self {
            Self::Loaded(keys) => !keys.is_empty(),
            Self::Unknown | Self::Leaf => false,
        }
    }
}

/// A node of the [`TreeStore`].
///
/// Structural links (`parent`, children) are plain keys resolved through the
/// store; a node never references another node directly.
#[derive(Clone, Debug)]
pub struct Node<K> {
    key: K,
    title: Option<String>,
    description: Option<String>,
    parent: Option<K>,
    children: NodeChildren<K>,
    child_index: HashMap<K, usize>,
    checked: bool,
}

impl<K: TreeKey> Node<K> {
    fn new(key: K) -> Self {
        Self {
            key,
            title: None,
            description: None,
            parent: None,
            children: NodeChildren::Unknown,
            child_index: HashMap::new(),
            checked: false,
        }
    }

    /// The node's key.
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The title from the most recent materialization, if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The description from the most recent materialization, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Key of the enclosing node, or `None` for a root.
    #[must_use]
    pub fn parent(&self) -> Option<&K> {
        self.parent.as_ref()
    }

    /// What is known about this node's children.
    #[must_use]
    pub fn children(&self) -> &NodeChildren<K> {
        &self.children
    }

    /// Position of `child` among this node's materialized children.
    #[must_use]
    pub fn child_position(&self, child: &K) -> Option<usize> {
        self.child_index.get(child).copied()
    }

    /// Whether the node is currently checked.
    #[must_use]
    pub fn is_checked(&self) -> bool {
        self.checked
    }

    /// Returns `true` if the children are known (possibly empty or a leaf).
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        match self.children {
            NodeChildren::Unknown => false,
            NodeChildren::Leaf | NodeChildren::Loaded(_) => true,
        }
    }

    /// Sets the checked flag, returning `true` if it changed.
    pub(crate) fn set_checked(&mut self, checked: bool) -> bool {
        let changed = self.checked != checked;
        self.checked = checked;
        changed
    }
}

/// Flat key-to-node index over a forest that is materialized on demand.
///
/// The store exclusively owns every [`Node`]. Lookups are O(1) and never
/// fail: an absent key only means "not known yet".
///
/// Materialization is idempotent per level. Once a node has a non-empty list
/// of children, later materialization of that level is ignored, so duplicate
/// or late fetch responses can be applied in any order.
///
/// # Example
///
/// ```
/// use understory_lazy_tree::{Item, TreeStore};
///
/// let mut store = TreeStore::new();
/// store
///     .materialize(None, [Item::unknown("a"), Item::branch("b", [Item::leaf("b1")])])
///     .unwrap();
///
/// assert!(!store.is_resolved(&"a"));
/// assert!(store.is_resolved(&"b"));
/// assert_eq!(store.ancestor_chain(&"b1").unwrap(), ["b"]);
///
/// store.materialize(Some(&"a"), [Item::leaf("a1")]).unwrap();
/// assert!(store.is_resolved(&"a"));
/// ```
#[derive(Clone, Debug)]
pub struct TreeStore<K> {
    nodes: HashMap<K, Node<K>>,
    roots: Vec<K>,
    materialized: bool,
    rejected: Vec<K>,
}

impl<K: TreeKey> Default for TreeStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TreeKey> TreeStore<K> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            materialized: false,
            rejected: Vec::new(),
        }
    }

    /// Number of known nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no node is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` once any level, including an empty root list, has been
    /// materialized.
    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.materialized
    }

    /// Root keys in display order.
    #[must_use]
    pub fn roots(&self) -> &[K] {
        &self.roots
    }

    /// Returns the node for `key`, or `None` if it is not known yet.
    #[must_use]
    pub fn lookup(&self, key: &K) -> Option<&Node<K>> {
        self.nodes.get(key)
    }

    pub(crate) fn lookup_mut(&mut self, key: &K) -> Option<&mut Node<K>> {
        self.nodes.get_mut(key)
    }

    /// Every known key, reachable from the roots or not, in no particular
    /// order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.nodes.keys()
    }

    /// Returns `true` if `key` is known.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.nodes.contains_key(key)
    }

    /// Returns `true` if `key` is known and its children are known.
    #[must_use]
    pub fn is_resolved(&self, key: &K) -> bool {
        self.nodes.get(key).is_some_and(Node::is_resolved)
    }

    /// Materialized children of `key`; empty if unknown, unresolved, or a leaf.
    #[must_use]
    pub fn children(&self, key: &K) -> &[K] {
        self.nodes
            .get(key)
            .map_or(&[][..], |node| node.children.keys())
    }

    /// Parent of `key`, if `key` is known and not a root.
    #[must_use]
    pub fn parent(&self, key: &K) -> Option<&K> {
        self.nodes.get(key).and_then(|node| node.parent.as_ref())
    }

    /// Drains the keys dropped by [`materialize`](Self::materialize) since the
    /// last call.
    ///
    /// An item is dropped when placing it would make a node its own ancestor,
    /// for example a fetched subtree that repeats the key it was fetched for.
    pub fn take_rejected(&mut self) -> Vec<K> {
        core::mem::take(&mut self.rejected)
    }

    /// Keys of the ancestors of `key`, root first, immediate parent last.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownKey`] if `key` has never been materialized.
    pub fn ancestor_chain(&self, key: &K) -> Result<Vec<K>, UnknownKey<K>> {
        let mut node = self.nodes.get(key).ok_or_else(|| UnknownKey(key.clone()))?;
        let mut chain = Vec::new();
        // Bounded by the node count so a caller-supplied cycle cannot hang us.
        while let Some(parent) = &node.parent {
            if chain.len() >= self.nodes.len() {
                break;
            }
            chain.push(parent.clone());
            match self.nodes.get(parent) {
                Some(next) => node = next,
                None => break,
            }
        }
        chain.reverse();
        Ok(chain)
    }

    /// Attaches `items` below `parent`, or replaces the root list if `parent`
    /// is `None`.
    ///
    /// Nested [`ChildState::Loaded`] children are merged in the same pass.
    /// Below a parent, the items are installed only if the parent's children
    /// are currently unknown or empty; otherwise the call is a no-op. Every
    /// node that is (re)registered takes its title, description, and parent
    /// from the new data. A node that moves to a new parent is removed from
    /// its old parent's children.
    ///
    /// Items that would make a node its own ancestor are skipped with a
    /// warning; see [`take_rejected`](Self::take_rejected).
    ///
    /// Returns `true` if the level was installed.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownKey`] if `parent` is not known. The store is left
    /// unchanged in that case.
    pub fn materialize(
        &mut self,
        parent: Option<&K>,
        items: impl IntoIterator<Item = Item<K>>,
    ) -> Result<bool, UnknownKey<K>> {
        let Some(parent) = parent else {
            self.replace_roots(items);
            return Ok(true);
        };

        let node = self
            .nodes
            .get(parent)
            .ok_or_else(|| UnknownKey(parent.clone()))?;
        self.materialized = true;
        if node.children.is_populated() {
            trace!(
                target: "understory_lazy_tree::store",
                key = ?parent,
                "level already populated; ignoring"
            );
            return Ok(false);
        }
        self.install(parent.clone(), items);
        Ok(true)
    }

    /// Replaces the root list. Infallible form of `materialize(None, ..)`.
    pub(crate) fn replace_roots(&mut self, items: impl IntoIterator<Item = Item<K>>) {
        let (roots, _) = self.register_level(None, items);
        debug!(
            target: "understory_lazy_tree::store",
            roots = roots.len(),
            "replaced root level"
        );
        self.roots = roots;
        self.materialized = true;
    }

    /// Keys reachable from the roots through materialized children, in
    /// depth-first pre-order.
    #[must_use]
    pub fn preorder(&self) -> Vec<K> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut seen = HashSet::with_capacity(self.nodes.len());
        let mut stack: Vec<&K> = self.roots.iter().rev().collect();
        while let Some(key) = stack.pop() {
            if !seen.insert(key) {
                continue;
            }
            out.push(key.clone());
            stack.extend(self.children(key).iter().rev());
        }
        out
    }

    fn install(&mut self, key: K, items: impl IntoIterator<Item = Item<K>>) {
        let (keys, index) = self.register_level(Some(&key), items);
        if let Some(node) = self.nodes.get_mut(&key) {
            node.children = NodeChildren::Loaded(keys);
            node.child_index = index;
        }
    }

    fn register_level(
        &mut self,
        parent: Option<&K>,
        items: impl IntoIterator<Item = Item<K>>,
    ) -> (Vec<K>, HashMap<K, usize>) {
        let items = items.into_iter();
        let (lower, _) = items.size_hint();
        let mut keys = Vec::with_capacity(lower);
        let mut index = HashMap::with_capacity(lower);
        for item in items {
            if self.is_ancestor_or_self(&item.key, parent) {
                warn!(
                    target: "understory_lazy_tree::store",
                    key = ?item.key,
                    ?parent,
                    "ignoring item that would be its own ancestor"
                );
                self.rejected.push(item.key);
                continue;
            }
            // A repeated key keeps its first position; its payload is
            // overwritten by the later occurrence.
            if let Entry::Vacant(slot) = index.entry(item.key.clone()) {
                slot.insert(keys.len());
                keys.push(item.key.clone());
            }
            self.register(parent.cloned(), item);
        }

        // A key may have moved deeper later in the same response.
        if keys.iter().any(|key| self.parent(key) != parent) {
            keys.retain(|key| self.parent(key) == parent);
            index = position_index(&keys);
        }
        (keys, index)
    }

    /// Returns `true` if `key` is `parent` or one of its ancestors.
    fn is_ancestor_or_self(&self, key: &K, parent: Option<&K>) -> bool {
        let mut current = parent;
        for _ in 0..=self.nodes.len() {
            match current {
                Some(next) if next == key => return true,
                Some(next) => current = self.parent(next),
                None => return false,
            }
        }
        false
    }

    /// Removes `key` from the children of `parent`, or from the roots.
    fn detach(&mut self, parent: Option<&K>, key: &K) {
        let Some(parent) = parent else {
            self.roots.retain(|root| root != key);
            return;
        };
        if let Some(node) = self.nodes.get_mut(parent)
            && let NodeChildren::Loaded(keys) = &mut node.children
        {
            keys.retain(|child| child != key);
            node.child_index = position_index(keys);
        }
    }

    fn register(&mut self, parent: Option<K>, item: Item<K>) {
        let Item {
            key,
            title,
            description,
            children,
        } = item;
        trace!(target: "understory_lazy_tree::store", ?key, "register");

        if let Some(previous) = self.nodes.get(&key).map(|node| node.parent.clone())
            && previous != parent
        {
            self.detach(previous.as_ref(), &key);
        }

        let node = self
            .nodes
            .entry(key.clone())
            .or_insert_with(|| Node::new(key.clone()));
        node.title = title;
        node.description = description;
        node.parent = parent;
        if node.children.is_populated() {
            return;
        }

        match children {
            ChildState::Unknown => {
                node.children = NodeChildren::Unknown;
                node.child_index.clear();
            }
            ChildState::Leaf => {
                node.children = NodeChildren::Leaf;
                node.child_index.clear();
            }
            ChildState::Loaded(items) => self.install(key, items),
        }
    }
}

fn position_index<K: TreeKey>(keys: &[K]) -> HashMap<K, usize> {
    keys.iter()
        .enumerate()
        .map(|(position, key)| (key.clone(), position))
        .collect()
}
