// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the `understory_lazy_tree` crate.
//!
//! These drive a [`SelectionIndex`] end to end against an in-memory data
//! source: seeding roots, resolving target selections, toggling, and reading
//! the selection back.

use std::collections::HashMap;

use understory_lazy_tree::{
    BatchEntry, BatchRequest, Busy, DataSource, IndexConfig, Item, PlanDepth, ResolveError,
    SelectionChain, SelectionIndex, UnknownKey,
};

type Key = &'static str;

#[derive(Debug, thiserror::Error)]
#[error("backend unavailable")]
struct Unavailable;

/// A data source backed by a static edge list.
struct Fixture {
    children: HashMap<Key, Vec<Key>>,
    deep: bool,
    fail: bool,
    batches: usize,
    child_fetches: usize,
}

impl Fixture {
    fn new() -> Self {
        let edges: [(Key, &[Key]); 3] = [
            ("A", &["A1", "A2"]),
            ("A1", &["A1a", "A1b"]),
            ("B", &["B1", "B2"]),
        ];
        Self {
            children: edges
                .into_iter()
                .map(|(parent, kids)| (parent, kids.to_vec()))
                .collect(),
            deep: false,
            fail: false,
            batches: 0,
            child_fetches: 0,
        }
    }

    fn deep(mut self) -> Self {
        self.deep = true;
        self
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn shallow_item(&self, key: Key) -> Item<Key> {
        if self.children.contains_key(key) {
            Item::unknown(key)
        } else {
            Item::leaf(key)
        }
    }

    fn deep_item(&self, key: Key) -> Item<Key> {
        match self.children.get(key) {
            Some(kids) => Item::branch(key, kids.iter().map(|kid| self.deep_item(*kid))),
            None => Item::leaf(key),
        }
    }

    fn level(&self, key: Key) -> Vec<Item<Key>> {
        self.children
            .get(key)
            .map(|kids| {
                kids.iter()
                    .map(|kid| {
                        if self.deep {
                            self.deep_item(*kid)
                        } else {
                            self.shallow_item(*kid)
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl DataSource<Key> for Fixture {
    type Error = Unavailable;

    async fn fetch_children(
        &mut self,
        key: &Key,
        _chain: &[Key],
    ) -> Result<Vec<Item<Key>>, Unavailable> {
        self.child_fetches += 1;
        if self.fail {
            return Err(Unavailable);
        }
        Ok(self.level(*key))
    }

    async fn fetch_batch(
        &mut self,
        request: &BatchRequest<Key>,
    ) -> Result<Vec<BatchEntry<Key>>, Unavailable> {
        self.batches += 1;
        if self.fail {
            return Err(Unavailable);
        }
        Ok(request
            .keys()
            .map(|key| BatchEntry::new(*key, self.level(*key)))
            .collect())
    }
}

fn index() -> SelectionIndex<Key> {
    index_with(IndexConfig::default())
}

fn index_with(config: IndexConfig) -> SelectionIndex<Key> {
    let mut index = SelectionIndex::with_config(config);
    index.set_roots([
        Item::unknown("A"),
        Item::branch("B", [Item::leaf("B1"), Item::leaf("B2")]),
    ]);
    index
}

fn checked(index: &SelectionIndex<Key>, key: Key) -> bool {
    index.store().lookup(&key).unwrap().is_checked()
}

fn sorted(mut chains: Vec<SelectionChain<Key>>) -> Vec<SelectionChain<Key>> {
    chains.sort();
    chains
}

#[test]
fn resolves_targets_in_one_batch() {
    let mut index = index();
    let mut source = Fixture::new().deep();
    let targets = vec![
        SelectionChain::new("A1a", ["A", "A1"]),
        SelectionChain::new("B1", ["B"]),
    ];
    index.set_target_selection(targets.clone());
    assert_eq!(index.pending_targets(), &[SelectionChain::new("A1a", ["A", "A1"])]);
    assert!(checked(&index, "B1"));

    let outcome = pollster::block_on(index.resolve(&mut source)).unwrap();
    assert_eq!(source.batches, 1);
    assert_eq!(outcome.installed, ["A"]);
    assert!(outcome.ignored.is_empty());
    assert_eq!(outcome.unresolved, 0);
    assert!(index.pending_targets().is_empty());
    assert_eq!(sorted(index.selection()), sorted(targets));
}

#[test]
fn full_suffix_resolves_with_shallow_answers() {
    let mut index = index();
    let mut source = Fixture::new();
    index.set_target_selection([SelectionChain::new("A1b", ["A", "A1"])]);
    assert_eq!(index.plan().buckets(), &[vec!["A"], vec!["A1"]]);

    let outcome = pollster::block_on(index.resolve(&mut source)).unwrap();
    assert_eq!(source.batches, 1);
    assert_eq!(outcome.installed, ["A", "A1"]);
    assert!(checked(&index, "A1b"));
}

#[test]
fn first_unresolved_replans_until_done() {
    let mut index = index_with(IndexConfig {
        plan_depth: PlanDepth::FirstUnresolved,
        ..IndexConfig::default()
    });
    let mut source = Fixture::new();
    index.set_target_selection([SelectionChain::new("A1a", ["A", "A1"])]);
    assert_eq!(index.plan().buckets(), &[vec!["A"]]);

    let outcome = pollster::block_on(index.resolve(&mut source)).unwrap();
    assert_eq!(source.batches, 2);
    assert_eq!(outcome.installed, ["A", "A1"]);
    assert_eq!(outcome.unresolved, 0);
    assert!(checked(&index, "A1a"));
}

#[test]
fn resolvable_targets_issue_no_fetch() {
    let mut index = index();
    let mut source = Fixture::new();
    index.set_target_selection([SelectionChain::new("B1", ["B"])]);
    assert!(index.plan().is_empty());

    let outcome = pollster::block_on(index.resolve(&mut source)).unwrap();
    assert_eq!(source.batches, 0);
    assert!(outcome.installed.is_empty());
    assert!(!index.is_busy());
}

#[test]
fn fetch_failure_leaves_store_untouched() {
    let mut index = index();
    let mut source = Fixture::new().failing();
    index.set_target_selection([SelectionChain::new("A1a", ["A", "A1"])]);
    let before = index.store().len();

    let err = pollster::block_on(index.resolve(&mut source)).unwrap_err();
    assert!(matches!(err, ResolveError::Fetch(Unavailable)));
    assert_eq!(index.store().len(), before);
    assert!(!index.store().is_resolved(&"A"));
    assert!(!index.is_busy());
    assert_eq!(index.pending_targets().len(), 1);
}

#[test]
fn only_one_selection_fetch_at_a_time() {
    let mut index = index();
    let mut source = Fixture::new();
    index.set_target_selection([SelectionChain::new("A1", ["A"])]);

    let request = index.begin_resolve().unwrap();
    assert!(request.is_some());
    assert_eq!(index.begin_resolve(), Err(Busy));
    let err = pollster::block_on(index.resolve(&mut source)).unwrap_err();
    assert!(matches!(err, ResolveError::Busy(Busy)));

    index.abort_resolve();
    assert!(!index.is_busy());
    pollster::block_on(index.resolve(&mut source)).unwrap();
    assert!(checked(&index, "A1"));
}

#[test]
fn render_is_deferred_while_busy() {
    let mut index = index();
    index.set_target_selection([SelectionChain::new("A2", ["A"])]);
    assert!(index.request_render());

    let request = index.begin_resolve().unwrap().unwrap();
    assert!(!index.request_render());
    let entries = request
        .keys()
        .map(|key| BatchEntry::new(*key, [Item::leaf("A1"), Item::leaf("A2")]))
        .collect();
    let outcome = index.finish_resolve(entries);
    assert!(outcome.render_ready);
    assert!(index.request_render());
    assert!(!index.take_pending_render());
}

#[test]
fn aborted_fetch_keeps_deferred_render() {
    let mut index = index();
    index.set_target_selection([SelectionChain::new("A2", ["A"])]);
    index.begin_resolve().unwrap();
    assert!(!index.request_render());
    index.abort_resolve();
    assert!(index.take_pending_render());
    assert!(!index.take_pending_render());
}

#[test]
fn malformed_entries_are_ignored() {
    let mut index = index();
    index.set_target_selection([SelectionChain::new("A1a", ["A", "A1"])]);
    index.begin_resolve().unwrap();

    // `Z` was never requested, and `A1` cannot be placed without `A`'s level.
    let outcome = index.finish_resolve(vec![
        BatchEntry::new("Z", [Item::leaf("Z1")]),
        BatchEntry::new("A1", [Item::leaf("A1a")]),
    ]);
    assert!(outcome.installed.is_empty());
    assert_eq!(outcome.ignored, ["Z", "A1"]);
    assert_eq!(outcome.unresolved, 1);
    assert!(!index.store().contains(&"Z1"));
    assert!(!index.is_busy());
}

#[test]
fn entry_repeating_an_ancestor_key_is_dropped() {
    let mut index = index();
    index.set_target_selection([SelectionChain::new("X", ["A"])]);
    index.begin_resolve().unwrap();

    let outcome = index.finish_resolve(vec![BatchEntry::new(
        "A",
        [Item::branch("A1", [Item::leaf("A")])],
    )]);
    assert_eq!(outcome.installed, ["A"]);
    assert_eq!(outcome.ignored, ["A"]);
    assert_eq!(index.store().parent(&"A"), None);
    assert!(index.store().is_resolved(&"A1"));
    assert!(index.store().children(&"A1").is_empty());

    // The tree stays usable.
    index.toggle(&"A1", true).unwrap();
    assert!(checked(&index, "A"));
    assert_eq!(
        sorted(index.selection()),
        [SelectionChain::root("A"), SelectionChain::new("A1", ["A"])]
    );
}

#[test]
fn self_parented_root_is_dropped() {
    let mut index = SelectionIndex::new();
    index.set_roots([Item::branch("A", [Item::leaf("A")])]);
    assert_eq!(index.toggle(&"A", true).unwrap(), ["A"]);
    assert_eq!(index.selection(), [SelectionChain::root("A")]);
}

#[test]
fn duplicate_responses_do_not_clobber() {
    let mut index = index();
    index.set_target_selection([SelectionChain::new("A1", ["A"])]);
    index.begin_resolve().unwrap();
    let outcome = index.finish_resolve(vec![
        BatchEntry::new("A", [Item::leaf("A1"), Item::leaf("A2")]),
        BatchEntry::new("A", [Item::leaf("late")]),
    ]);
    assert_eq!(outcome.installed, ["A"]);
    assert_eq!(index.store().children(&"A"), &["A1", "A2"]);
    assert!(!index.store().contains(&"late"));
}

#[test]
fn toggle_scenario_from_sibling_checks() {
    let mut index = index();
    index.toggle(&"B1", true).unwrap();
    assert!(!checked(&index, "B"));
    index.toggle(&"B2", true).unwrap();
    assert!(checked(&index, "B"));

    let changed = index.toggle(&"B1", false).unwrap();
    assert_eq!(changed, ["B1", "B"]);
    assert!(!checked(&index, "B"));
    assert!(checked(&index, "B2"));
}

#[test]
fn toggle_unknown_key_is_an_error() {
    let mut index = index();
    assert_eq!(index.toggle(&"nope", true), Err(UnknownKey("nope")));
}

#[test]
fn load_children_inherits_check() {
    let mut index = index();
    let mut source = Fixture::new().deep();
    index.toggle(&"A", true).unwrap();

    assert!(pollster::block_on(index.load_children(&"A", &mut source)).unwrap());
    for key in ["A1", "A1a", "A1b", "A2"] {
        assert!(checked(&index, key), "{key} should inherit the check");
    }

    // Already resolved: no second fetch.
    assert!(!pollster::block_on(index.load_children(&"A", &mut source)).unwrap());
    assert_eq!(source.child_fetches, 1);
}

#[test]
fn load_children_applies_pending_targets() {
    let mut index = index();
    let mut source = Fixture::new();
    index.set_target_selection([SelectionChain::new("A2", ["A"])]);
    pollster::block_on(index.load_children(&"A", &mut source)).unwrap();
    assert!(index.pending_targets().is_empty());
    assert!(checked(&index, "A2"));
    assert!(!checked(&index, "A1"));
}

#[test]
fn load_children_errors() {
    let mut index = index();
    let err = pollster::block_on(index.load_children(&"Q", &mut Fixture::new())).unwrap_err();
    assert!(matches!(err, ResolveError::UnknownKey(UnknownKey("Q"))));

    let err = pollster::block_on(index.load_children(&"A", &mut Fixture::new().failing()))
        .unwrap_err();
    assert!(matches!(err, ResolveError::Fetch(Unavailable)));
    assert!(!index.store().is_resolved(&"A"));
}

#[test]
fn selection_echoes_targets_before_materialization() {
    let mut index = SelectionIndex::<Key>::new();
    let targets = vec![SelectionChain::new("x", ["p", "q"])];
    index.set_target_selection(targets.clone());
    assert_eq!(index.selection(), targets);
}

#[test]
fn unselect_all_drops_pending_targets() {
    let mut index = index();
    index.set_target_selection([
        SelectionChain::new("B1", ["B"]),
        SelectionChain::new("A1a", ["A", "A1"]),
    ]);
    let changed = index.unselect_all();
    assert_eq!(changed, ["B1"]);
    assert!(index.pending_targets().is_empty());
    assert!(index.plan().is_empty());
    assert!(index.selection().is_empty());
}

#[test]
fn select_all_checks_resolved_nodes() {
    let mut index = index();
    let changed = index.select_all();
    assert_eq!(changed, ["B", "B1", "B2"]);
    assert!(!checked(&index, "A"));
}

#[cfg(feature = "serde")]
#[test]
fn chains_survive_json() {
    let chains = vec![
        SelectionChain::new(String::from("A1a"), [String::from("A"), String::from("A1")]),
        SelectionChain::root(String::from("B")),
    ];
    let json = serde_json::to_string(&chains).unwrap();
    let back: Vec<SelectionChain<String>> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, chains);
}
