// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The contract a subtree provider must satisfy.

use alloc::vec::Vec;
use core::future::Future;

use crate::item::Item;
use crate::plan::BatchRequest;

/// One answer in a batch fetch: the children of `key`.
///
/// `subtree` is materialized below `key` and may nest as deep as needed;
/// a good answer carries every level required to resolve the chains that
/// requested `key`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchEntry<K> {
    /// The requested key.
    pub key: K,
    /// Children of `key`, possibly with deeper levels pre-materialized.
    pub subtree: Vec<Item<K>>,
}

impl<K> BatchEntry<K> {
    /// Creates an entry.
    #[must_use]
    pub fn new(key: K, subtree: impl IntoIterator<Item = Item<K>>) -> Self {
        Self {
            key,
            subtree: subtree.into_iter().collect(),
        }
    }
}

/// Fetches subtrees on demand.
///
/// The transport (HTTP, RPC, an in-memory fixture) is up to the implementor.
/// Failures are returned as-is; retry policies belong here rather than in the
/// index, which never retries.
pub trait DataSource<K> {
    /// Error produced when a fetch fails.
    type Error;

    /// Returns the immediate children of `key`.
    ///
    /// `chain` holds the ancestors of `key`, root first. Returned items may
    /// carry grandchildren pre-materialized.
    fn fetch_children(
        &mut self,
        key: &K,
        chain: &[K],
    ) -> impl Future<Output = Result<Vec<Item<K>>, Self::Error>>;

    /// Answers a planned batch request.
    ///
    /// Entries for keys that were never requested are ignored by the index.
    fn fetch_batch(
        &mut self,
        request: &BatchRequest<K>,
    ) -> impl Future<Output = Result<Vec<BatchEntry<K>>, Self::Error>>;
}
