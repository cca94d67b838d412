// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::fmt::Debug;
use core::hash::Hash;

/// Bound shared by every key type used with this crate.
///
/// Keys must be globally unique across the whole tree, not just among
/// siblings. `Ord` is used to sort prefetch buckets so that identical plans
/// compare equal; for string keys this is the raw string order.
///
/// This trait is implemented for every type meeting the bounds.
pub trait TreeKey: Clone + Eq + Hash + Ord + Debug {}

impl<K> TreeKey for K where K: Clone + Eq + Hash + Ord + Debug {}
