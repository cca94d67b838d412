// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Portable payload types exchanged with the data source and the embedder.

use alloc::string::String;
use alloc::vec::Vec;

/// The children of an [`Item`] as reported by the data source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChildState<K> {
    /// Children have not been fetched yet.
    #[default]
    Unknown,
    /// The item is a leaf; it has no children.
    Leaf,
    /// The children are known, in display order. The list may be empty.
    Loaded(Vec<Item<K>>),
}

impl<K> ChildState<K> {
    /// Returns `true` unless the children are [`ChildState::Unknown`].
    #[must_use]
    pub fn is_known(&self) -> bool {
        match self {
            Self::Unknown => false,
            Self::Leaf | Self::Loaded(_) => true,
        }
    }
}

/// One node of the hierarchy as delivered by a data source.
///
/// Items nest: a fetch response may carry grandchildren (and deeper levels)
/// pre-materialized via [`ChildState::Loaded`], and [`TreeStore::materialize`]
/// consumes the whole nested structure in one pass.
///
/// [`TreeStore::materialize`]: crate::TreeStore::materialize
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Item<K> {
    /// Globally unique key.
    pub key: K,
    /// Optional display title.
    pub title: Option<String>,
    /// Optional longer description.
    pub description: Option<String>,
    /// What is known about the children of this item.
    pub children: ChildState<K>,
}

impl<K> Item<K> {
    /// Creates an item whose children have not been fetched yet.
    #[must_use]
    pub fn unknown(key: K) -> Self {
        Self {
            key,
            title: None,
            description: None,
            children: ChildState::Unknown,
        }
    }

    /// Creates a leaf item.
    #[must_use]
    pub fn leaf(key: K) -> Self {
        Self {
            children: ChildState::Leaf,
            ..Self::unknown(key)
        }
    }

    /// Creates an item with materialized children.
    #[must_use]
    pub fn branch(key: K, children: impl IntoIterator<Item = Self>) -> Self {
        Self {
            children: ChildState::Loaded(children.into_iter().collect()),
            ..Self::unknown(key)
        }
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A selected key together with the keys of its ancestors.
///
/// `parents` runs from the root-most ancestor to the immediate parent and is
/// empty for a root. Chains are the unit of exchange for selections: they are
/// what callers seed a selection with, what [`SelectionCodec::extract`]
/// produces, and what the prefetch planner inspects.
///
/// [`SelectionCodec::extract`]: crate::SelectionCodec::extract
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectionChain<K> {
    /// The selected key.
    pub key: K,
    /// Ancestors of `key`, root first.
    pub parents: Vec<K>,
}

impl<K> SelectionChain<K> {
    /// Creates a chain for `key` below `parents` (root first).
    #[must_use]
    pub fn new(key: K, parents: impl IntoIterator<Item = K>) -> Self {
        Self {
            key,
            parents: parents.into_iter().collect(),
        }
    }

    /// Creates a chain for a root key.
    #[must_use]
    pub fn root(key: K) -> Self {
        Self {
            key,
            parents: Vec::new(),
        }
    }
}
