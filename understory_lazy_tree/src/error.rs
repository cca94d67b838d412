// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use core::fmt;

/// Error returned when an operation is given a key the store has never seen.
///
/// This indicates a programmer error on the caller's side. Lookups that merely
/// ask whether a key is known yet return `Option`/`bool` instead.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("key {0:?} is not known to the tree store")]
pub struct UnknownKey<K: fmt::Debug>(pub K);

/// Error returned when a selection-planning fetch is started while another
/// one is still outstanding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("a selection fetch is already in flight")]
pub struct Busy;

/// Error returned by the fetch-driving operations of [`SelectionIndex`].
///
/// [`SelectionIndex`]: crate::SelectionIndex
#[derive(Debug, thiserror::Error)]
pub enum ResolveError<K: fmt::Debug, E> {
    /// The data source rejected the request. The store was left untouched.
    #[error("data source fetch failed")]
    Fetch(#[source] E),
    /// A selection-planning fetch is already outstanding.
    #[error(transparent)]
    Busy(#[from] Busy),
    /// The requested node is not known to the store.
    #[error(transparent)]
    UnknownKey(#[from] UnknownKey<K>),
}
