// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_lazy_tree --heading-base-level=0

//! Understory Lazy Tree: check selection over a tree that is fetched on demand.
//!
//! Large hierarchies (file systems, org charts, taxonomies) are rarely known up
//! front. This crate keeps the _bookkeeping_ for a checkbox tree whose
//! subtrees arrive lazily from some data source, so that checking and
//! unchecking stays consistent even where most of the tree has never been
//! seen. It does not render anything and does not know how data is fetched;
//! callers plug in a [`DataSource`] or drive fetches by hand.
//!
//! The pieces, leaves first:
//!
//! - [`TreeStore`]: a flat key-to-node index with partial materialization.
//!   Levels are merged idempotently, so a late or duplicate fetch response
//!   never clobbers one that already arrived.
//! - [`PrefetchPlanner`]: given target selections as [`SelectionChain`]s
//!   (a key plus its ancestors), computes the smallest batched
//!   [`BatchRequest`] that makes those chains resolvable.
//! - [`SelectionEngine`]: tri-state check propagation. Checking cascades
//!   down to resolved descendants and up through ancestors whose children
//!   are all checked; unchecking clears every ancestor.
//! - [`SelectionCodec`]: converts between the live check flags and chains.
//! - [`SelectionIndex`]: the caller-facing handle that wires these together
//!   and guards the single outstanding selection fetch.
//!
//! ## Minimal example
//!
//! ```rust
//! use understory_lazy_tree::{Item, SelectionChain, SelectionIndex};
//!
//! let mut index = SelectionIndex::new();
//! index.set_roots([
//!     Item::unknown("docs"),
//!     Item::branch("src", [Item::leaf("lib.rs"), Item::leaf("main.rs")]),
//! ]);
//!
//! // Checking every child of `src` checks `src` itself.
//! index.toggle(&"lib.rs", true).unwrap();
//! index.toggle(&"main.rs", true).unwrap();
//! assert!(index.store().lookup(&"src").unwrap().is_checked());
//!
//! // Unchecking one child clears its ancestors but leaves its sibling alone.
//! index.toggle(&"lib.rs", false).unwrap();
//! assert_eq!(index.selection(), [SelectionChain::new("main.rs", ["src"])]);
//! ```
//!
//! ## Fetching
//!
//! Targets under levels that are not materialized yet stay pending. Either
//! call the async [`SelectionIndex::resolve`] with a [`DataSource`], or drive
//! the fetch yourself with [`SelectionIndex::begin_resolve`] and
//! [`SelectionIndex::finish_resolve`]. The planner groups keys by their
//! offset in the requesting chain, and the data source is expected to answer
//! each key with a subtree deep enough to resolve that chain.
//!
//! ## Logging
//!
//! Diagnostics are emitted through [`tracing`]. Malformed batch responses are
//! reported with `warn!` and skipped; the crate never installs a subscriber.
//!
//! ## Features
//!
//! - `std` (default): no behavioral change; for dependants that prefer `std`.
//! - `serde`: `Serialize`/`Deserialize` for items, chains, and batch types.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod codec;
mod error;
mod index;
mod item;
mod key;
mod plan;
mod select;
mod source;
mod store;

pub use codec::SelectionCodec;
pub use error::{Busy, ResolveError, UnknownKey};
pub use index::{BatchOutcome, IndexConfig, SelectionIndex};
pub use item::{ChildState, Item, SelectionChain};
pub use key::TreeKey;
pub use plan::{BatchRequest, PlanDepth, PrefetchPlanner};
pub use select::{CheckState, SelectionConfig, SelectionEngine};
pub use source::{BatchEntry, DataSource};
pub use store::{Node, NodeChildren, TreeStore};
