// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Caller-facing handle tying the store, planner, engine, and codec together.

use alloc::vec::Vec;
use core::mem;

use tracing::{debug, warn};

use crate::codec::SelectionCodec;
use crate::error::{Busy, ResolveError, UnknownKey};
use crate::item::{Item, SelectionChain};
use crate::key::TreeKey;
use crate::plan::{BatchRequest, PlanDepth, PrefetchPlanner};
use crate::select::{CheckState, SelectionConfig, SelectionEngine};
use crate::source::{BatchEntry, DataSource};
use crate::store::TreeStore;

/// Configuration for [`SelectionIndex`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct IndexConfig {
    /// Toggle propagation policy.
    pub selection: SelectionConfig,
    /// How much of a broken chain each plan requests.
    pub plan_depth: PlanDepth,
}

/// Result of applying one batch response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOutcome<K> {
    /// Keys whose children were installed by this response.
    pub installed: Vec<K>,
    /// Entries that were skipped: never requested, or not placeable in the
    /// tree. Also lists items dropped from installed subtrees because they
    /// repeated an ancestor's key.
    pub ignored: Vec<K>,
    /// Number of target chains still waiting for data.
    pub unresolved: usize,
    /// `true` if a render was deferred while the fetch was outstanding and
    /// should run now.
    pub render_ready: bool,
}

impl<K> Default for BatchOutcome<K> {
    fn default() -> Self {
        Self {
            installed: Vec::new(),
            ignored: Vec::new(),
            unresolved: 0,
            render_ready: false,
        }
    }
}

impl<K> BatchOutcome<K> {
    fn merge(&mut self, other: Self) {
        self.installed.extend(other.installed);
        self.ignored.extend(other.ignored);
        self.unresolved = other.unresolved;
        self.render_ready |= other.render_ready;
    }
}

/// A lazily materialized tree with a persistent check selection.
///
/// The index owns the [`TreeStore`] and drives it through the usual flow:
/// seed the roots, set a target selection, fetch whatever the planner says is
/// missing, then let user toggles propagate. Data sources are passed to the
/// fetching methods rather than stored, so the same index can be driven by
/// different transports.
///
/// At most one selection-planning fetch is outstanding at a time. While one
/// is, [`request_render`](Self::request_render) answers `false` and the render
/// is reported ready once the fetch completes.
///
/// # Example
///
/// ```
/// use understory_lazy_tree::{BatchEntry, Item, SelectionChain, SelectionIndex};
///
/// let mut index = SelectionIndex::new();
/// index.set_roots([Item::unknown("a"), Item::leaf("b")]);
/// index.set_target_selection([SelectionChain::new("a1", ["a"])]);
/// assert_eq!(index.pending_targets().len(), 1);
///
/// // Drive the fetch by hand; `resolve` does the same with a `DataSource`.
/// let request = index.begin_resolve().unwrap().unwrap();
/// assert_eq!(request.buckets(), &[vec!["a"]]);
/// let outcome = index.finish_resolve(vec![BatchEntry::new(
///     "a",
///     [Item::leaf("a1"), Item::leaf("a2")],
/// )]);
/// assert_eq!(outcome.installed, ["a"]);
///
/// assert_eq!(index.selection(), [SelectionChain::new("a1", ["a"])]);
/// ```
#[derive(Clone, Debug)]
pub struct SelectionIndex<K> {
    store: TreeStore<K>,
    planner: PrefetchPlanner,
    engine: SelectionEngine,
    codec: SelectionCodec,
    targets: Vec<SelectionChain<K>>,
    pending: Vec<SelectionChain<K>>,
    in_flight: Option<BatchRequest<K>>,
    render_pending: bool,
}

impl<K: TreeKey> Default for SelectionIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TreeKey> SelectionIndex<K> {
    /// Creates an empty index with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    /// Creates an empty index with the given configuration.
    #[must_use]
    pub fn with_config(config: IndexConfig) -> Self {
        let engine = SelectionEngine::with_config(config.selection);
        Self {
            store: TreeStore::new(),
            planner: PrefetchPlanner::with_depth(config.plan_depth),
            engine,
            codec: SelectionCodec::new(engine),
            targets: Vec::new(),
            pending: Vec::new(),
            in_flight: None,
            render_pending: false,
        }
    }

    /// Read access to the underlying store.
    #[must_use]
    pub fn store(&self) -> &TreeStore<K> {
        &self.store
    }

    /// Replaces the root level and applies any targets it made resolvable.
    pub fn set_roots(&mut self, items: impl IntoIterator<Item = Item<K>>) {
        self.store.replace_roots(items);
        self.store.take_rejected();
        self.reapply_pending();
    }

    /// Sets the selection to converge on.
    ///
    /// Targets whose key is already known are checked immediately; the rest
    /// stay pending until a fetch makes them known. The chains are also kept
    /// as the answer to [`selection`](Self::selection) while nothing has been
    /// materialized.
    pub fn set_target_selection(&mut self, chains: impl IntoIterator<Item = SelectionChain<K>>) {
        self.targets = chains.into_iter().collect();
        self.pending = self.codec.apply(&mut self.store, &self.targets);
        debug!(
            target: "understory_lazy_tree::index",
            targets = self.targets.len(),
            pending = self.pending.len(),
            "target selection set"
        );
    }

    /// Target chains not applied yet.
    #[must_use]
    pub fn pending_targets(&self) -> &[SelectionChain<K>] {
        &self.pending
    }

    /// Plans the fetch the pending targets need, without starting it.
    #[must_use]
    pub fn plan(&self) -> BatchRequest<K> {
        self.planner.plan(&self.store, &self.pending)
    }

    /// Returns `true` while a selection-planning fetch is outstanding.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Asks whether the tree may be rendered now.
    ///
    /// Returns `false` while a selection-planning fetch is outstanding and
    /// remembers the request; the completed fetch then reports
    /// [`BatchOutcome::render_ready`].
    pub fn request_render(&mut self) -> bool {
        if self.is_busy() {
            self.render_pending = true;
            false
        } else {
            true
        }
    }

    /// Consumes a deferred render request, if any.
    pub fn take_pending_render(&mut self) -> bool {
        mem::take(&mut self.render_pending)
    }

    /// Starts a selection-planning fetch.
    ///
    /// Returns the request to send, or `None` if every pending target is
    /// already resolvable; in that case nothing must be fetched and the
    /// pending targets have been applied.
    ///
    /// # Errors
    ///
    /// Returns [`Busy`] if a previous fetch has not been finished or aborted.
    pub fn begin_resolve(&mut self) -> Result<Option<BatchRequest<K>>, Busy> {
        if self.is_busy() {
            return Err(Busy);
        }
        let request = self.plan();
        if request.is_empty() {
            self.reapply_pending();
            return Ok(None);
        }
        self.in_flight = Some(request.clone());
        Ok(Some(request))
    }

    /// Applies the response to the outstanding fetch.
    ///
    /// Entries are materialized in request order. An entry whose key was not
    /// requested, or that still cannot be placed once the rest of the response
    /// is in, is skipped with a warning and listed in
    /// [`BatchOutcome::ignored`]. So is any item inside a subtree that repeats
    /// the key of one of its own ancestors.
    pub fn finish_resolve(&mut self, entries: Vec<BatchEntry<K>>) -> BatchOutcome<K> {
        let request = self.in_flight.take().unwrap_or_default();
        let mut outcome = BatchOutcome::default();

        let mut queue: Vec<(usize, BatchEntry<K>)> = Vec::with_capacity(entries.len());
        for entry in entries {
            match request.keys().position(|key| *key == entry.key) {
                Some(rank) => queue.push((rank, entry)),
                None => {
                    warn!(
                        target: "understory_lazy_tree::index",
                        key = ?entry.key,
                        "ignoring batch entry for a key that was not requested"
                    );
                    outcome.ignored.push(entry.key);
                }
            }
        }
        queue.sort_by_key(|(rank, _)| *rank);

        // Deeper requested keys only become known once a shallower entry in
        // the same response has been installed.
        loop {
            let mut retry = Vec::new();
            let before = queue.len();
            for (rank, entry) in queue {
                if !self.store.contains(&entry.key) {
                    retry.push((rank, entry));
                    continue;
                }
                if let Ok(true) = self.store.materialize(Some(&entry.key), entry.subtree) {
                    self.engine.inherit_checked(&mut self.store, &entry.key);
                    outcome.installed.push(entry.key);
                }
                outcome.ignored.extend(self.store.take_rejected());
            }
            if retry.is_empty() || retry.len() == before {
                for (_, entry) in retry {
                    warn!(
                        target: "understory_lazy_tree::index",
                        key = ?entry.key,
                        "ignoring batch entry that cannot be placed in the tree"
                    );
                    outcome.ignored.push(entry.key);
                }
                break;
            }
            queue = retry;
        }

        self.reapply_pending();
        outcome.unresolved = self.pending.len();
        outcome.render_ready = self.take_pending_render();
        debug!(
            target: "understory_lazy_tree::index",
            installed = outcome.installed.len(),
            ignored = outcome.ignored.len(),
            unresolved = outcome.unresolved,
            "batch applied"
        );
        outcome
    }

    /// Abandons the outstanding fetch, leaving the store as it was.
    ///
    /// A render deferred meanwhile stays pending; see
    /// [`take_pending_render`](Self::take_pending_render).
    pub fn abort_resolve(&mut self) {
        self.in_flight = None;
    }

    /// Fetches whatever the pending targets need and applies the result.
    ///
    /// With [`PlanDepth::FirstUnresolved`] this re-plans after every batch
    /// until nothing is left to fetch or a batch installs nothing new.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Busy`] if a manual fetch is outstanding.
    /// - [`ResolveError::Fetch`] if the data source fails. Levels installed
    ///   by earlier batches of the same call are kept; the failed batch
    ///   changes nothing.
    pub async fn resolve<S>(
        &mut self,
        source: &mut S,
    ) -> Result<BatchOutcome<K>, ResolveError<K, S::Error>>
    where
        S: DataSource<K>,
    {
        let mut outcome = BatchOutcome::default();
        while let Some(request) = self.begin_resolve()? {
            let entries = match source.fetch_batch(&request).await {
                Ok(entries) => entries,
                Err(err) => {
                    self.abort_resolve();
                    return Err(ResolveError::Fetch(err));
                }
            };
            let step = self.finish_resolve(entries);
            let stalled = step.installed.is_empty();
            outcome.merge(step);
            if stalled || self.planner.depth() == PlanDepth::FullSuffix {
                break;
            }
        }
        outcome.unresolved = self.pending.len();
        Ok(outcome)
    }

    /// Installs `items` as the children of `key`.
    ///
    /// If `key` is checked, the new descendants inherit the check. Pending
    /// targets are re-applied. Returns `true` if the level was installed,
    /// `false` if `key` already had children.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownKey`] if `key` is not in the store.
    pub fn attach_children(
        &mut self,
        key: &K,
        items: impl IntoIterator<Item = Item<K>>,
    ) -> Result<bool, UnknownKey<K>> {
        let installed = self.store.materialize(Some(key), items)?;
        self.store.take_rejected();
        if installed {
            self.engine.inherit_checked(&mut self.store, key);
            self.reapply_pending();
        }
        Ok(installed)
    }

    /// Fetches and installs the children of an unresolved node.
    ///
    /// Resolved nodes are left alone and yield `Ok(false)`.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::UnknownKey`] if `key` is not in the store.
    /// - [`ResolveError::Fetch`] if the data source fails; nothing changes.
    pub async fn load_children<S>(
        &mut self,
        key: &K,
        source: &mut S,
    ) -> Result<bool, ResolveError<K, S::Error>>
    where
        S: DataSource<K>,
    {
        let chain = self.store.ancestor_chain(key)?;
        if self.store.is_resolved(key) {
            return Ok(false);
        }
        let items = source
            .fetch_children(key, &chain)
            .await
            .map_err(ResolveError::Fetch)?;
        Ok(self.attach_children(key, items)?)
    }

    /// Checks or unchecks `key` and returns the keys whose flag changed.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownKey`] if `key` is not in the store.
    pub fn toggle(&mut self, key: &K, checked: bool) -> Result<Vec<K>, UnknownKey<K>> {
        self.engine.toggle(&mut self.store, key, checked)
    }

    /// Checks every resolved node.
    pub fn select_all(&mut self) -> Vec<K> {
        self.engine.select_all(&mut self.store)
    }

    /// Unchecks every resolved node and drops all target chains.
    pub fn unselect_all(&mut self) -> Vec<K> {
        self.targets.clear();
        self.pending.clear();
        self.engine.unselect_all(&mut self.store)
    }

    /// Derived tri-state of `key`, or `None` if it is unknown.
    #[must_use]
    pub fn check_state(&self, key: &K) -> Option<CheckState> {
        self.engine.check_state(&self.store, key)
    }

    /// The current selection as chains.
    ///
    /// Before anything has been materialized this echoes the target chains.
    #[must_use]
    pub fn selection(&self) -> Vec<SelectionChain<K>> {
        self.codec.extract(&self.store, &self.targets)
    }

    fn reapply_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = mem::take(&mut self.pending);
        self.pending = self.codec.apply(&mut self.store, &pending);
    }
}
