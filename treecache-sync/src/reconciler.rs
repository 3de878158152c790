//! Reconciler - folds delivered event bundles into the item state cache.
//!
//! A bundle is processed in two phases:
//!
//! 1. **Additions.** `NodeAdded` / `PropertyAdded` events register a child
//!    reference in their parent, so they are applied to the parent and only
//!    once the parent is resident. They are resolved in sweeps until every
//!    addition has found its parent or a sweep makes no progress; what is left
//!    describes subtrees the cache does not track and is dropped.
//! 2. **Everything else.** Removals and property changes are applied to the
//!    subject and to the parent, each event independently. A parent that is
//!    itself removed in the same bundle is not refreshed through its
//!    children's removals.
//!
//! Phase 1 always completes before phase 2 starts.
//!
//! Lookups never fetch. An absent subject or parent means there is nothing
//! cached to refresh, which is the common case and not an error.

use crate::error::SyncResult;
use std::collections::HashSet;
use tracing::{debug, error, trace, Span};
use treecache_state::{RefreshableState, StateLookup};
use treecache_types::{ChangeEvent, EventBundle, EventKind, ItemId, WireBundle};

/// An event left over after additions are split off.
#[derive(Debug, Clone, Copy)]
enum Remaining<'a> {
    Removal(&'a ChangeEvent),
    PropertyChange(&'a ChangeEvent),
}

/// Per-bundle working sets, built fresh for every bundle.
#[derive(Debug, Default)]
struct Partition<'a> {
    /// Subjects of `NodeRemoved` events, for membership tests only.
    removed_subjects: HashSet<ItemId>,
    pending_adds: Vec<&'a ChangeEvent>,
    remainder: Vec<Remaining<'a>>,
}

impl<'a> Partition<'a> {
    fn of(bundle: &'a EventBundle) -> Self {
        let mut partition = Partition::default();
        for event in bundle.iter() {
            match event.kind {
                EventKind::NodeAdded | EventKind::PropertyAdded => {
                    partition.pending_adds.push(event);
                }
                EventKind::NodeRemoved => {
                    partition.removed_subjects.insert(event.item_id);
                    partition.remainder.push(Remaining::Removal(event));
                }
                EventKind::PropertyRemoved => {
                    partition.remainder.push(Remaining::Removal(event));
                }
                EventKind::PropertyChanged => {
                    partition.remainder.push(Remaining::PropertyChange(event));
                }
            }
        }
        partition
    }
}

/// Outcome of the addition phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct AddResolution {
    sweeps: usize,
    resolved: usize,
    discarded: usize,
}

/// Applies event bundles to a cache.
///
/// The caller must not run two `reconcile` calls for the same cache at once;
/// bundles are expected in delivery order.
pub struct Reconciler<C: StateLookup> {
    cache: C,
    span: Span,
}

impl<C: StateLookup> Reconciler<C> {
    /// Creates a reconciler logging under a span named after `cache_name`.
    pub fn new(cache: C, cache_name: &str) -> Self {
        let span = tracing::info_span!("reconciler", cache = %cache_name);
        Self::with_span(cache, span)
    }

    /// Creates a reconciler that logs under the given span.
    pub fn with_span(cache: C, span: Span) -> Self {
        Self { cache, span }
    }

    /// Returns the cache this reconciler refreshes.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Returns the span reconcile output is recorded under.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Decodes an upstream bundle and reconciles it.
    ///
    /// An unknown event kind rejects the whole bundle before any cache entry
    /// is looked up, so a failed call leaves the cache untouched.
    pub fn reconcile_wire(&self, wire: WireBundle) -> SyncResult<()> {
        let _entered = self.span.enter();
        let bundle = EventBundle::try_from(wire).inspect_err(|e| {
            error!(error = %e, "rejecting event bundle");
        })?;
        drop(_entered);
        self.reconcile(&bundle);
        Ok(())
    }

    /// Refreshes every resident entry the bundle affects.
    pub fn reconcile(&self, bundle: &EventBundle) {
        if bundle.is_empty() {
            return;
        }
        let _entered = self.span.enter();

        let Partition {
            removed_subjects,
            pending_adds,
            remainder,
        } = Partition::of(bundle);

        let adds = self.resolve_additions(pending_adds);

        let mut refreshed = 0;
        for remaining in remainder {
            refreshed += self.refresh_remaining(remaining, &removed_subjects);
        }

        debug!(
            events = bundle.len(),
            local = bundle.is_local,
            sweeps = adds.sweeps,
            adds_resolved = adds.resolved,
            adds_discarded = adds.discarded,
            refreshed,
            "reconciled event bundle"
        );
    }

    /// Applies additions to their parents, sweeping until nothing is pending
    /// or a sweep resolves nothing.
    fn resolve_additions(&self, adds: Vec<&ChangeEvent>) -> AddResolution {
        let mut outcome = AddResolution::default();
        let mut pending = adds;

        while !pending.is_empty() {
            outcome.sweeps += 1;
            let mut progress = false;
            let mut unresolved = Vec::with_capacity(pending.len());

            for event in pending {
                let Some(parent_id) = event.parent_id else {
                    trace!(item = %event.item_id, kind = %event.kind, "dropping addition without parent");
                    outcome.discarded += 1;
                    continue;
                };
                match self.cache.lookup(&parent_id) {
                    Some(parent) => {
                        parent.apply(event);
                        outcome.resolved += 1;
                        progress = true;
                    }
                    None => unresolved.push(event),
                }
            }

            pending = unresolved;
            if !progress {
                break;
            }
        }

        if !pending.is_empty() {
            trace!(count = pending.len(), "dropping additions below untracked parents");
            outcome.discarded += pending.len();
        }
        outcome
    }

    /// Refreshes subject and parent for a removal or property change.
    /// Returns the number of entries refreshed.
    fn refresh_remaining(&self, remaining: Remaining<'_>, removed: &HashSet<ItemId>) -> usize {
        let event = match remaining {
            Remaining::Removal(ev) | Remaining::PropertyChange(ev) => ev,
        };
        let state = self.cache.lookup(&event.item_id);
        let parent = event
            .parent_id
            .and_then(|pid| self.cache.lookup(&pid).map(|p| (pid, p)));

        let mut refreshed = 0;
        if let Some(state) = state {
            state.apply(event);
            refreshed += 1;
        }
        match (remaining, parent) {
            (Remaining::Removal(_), Some((pid, parent))) => {
                // skip parents removed by this bundle
                if !removed.contains(&pid) {
                    parent.apply(event);
                    refreshed += 1;
                }
            }
            (Remaining::PropertyChange(_), Some((_, parent))) => {
                parent.apply(event);
                refreshed += 1;
            }
            (_, None) => {}
        }
        refreshed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex, RwLock};

    /// A store where attaching a child node to a resident parent makes the
    /// child resident, as a fetch path reacting to the attach would.
    #[derive(Default)]
    struct AttachingStore {
        states: Arc<RwLock<HashMap<ItemId, Arc<AttachingState>>>>,
    }

    struct AttachingState {
        id: ItemId,
        store: Arc<RwLock<HashMap<ItemId, Arc<AttachingState>>>>,
        applied: Mutex<Vec<ChangeEvent>>,
    }

    impl AttachingStore {
        fn insert(&self, id: ItemId) {
            let state = Arc::new(AttachingState {
                id,
                store: Arc::clone(&self.states),
                applied: Mutex::new(Vec::new()),
            });
            self.states.write().unwrap().insert(id, state);
        }
    }

    impl RefreshableState for AttachingState {
        fn id(&self) -> ItemId {
            self.id
        }

        fn apply(&self, event: &ChangeEvent) {
            self.applied.lock().unwrap().push(event.clone());
            if event.kind == EventKind::NodeAdded && event.parent_id == Some(self.id) {
                let child = Arc::new(AttachingState {
                    id: event.item_id,
                    store: Arc::clone(&self.store),
                    applied: Mutex::new(Vec::new()),
                });
                self.store.write().unwrap().insert(event.item_id, child);
            }
        }
    }

    impl StateLookup for AttachingStore {
        type State = AttachingState;

        fn lookup(&self, id: &ItemId) -> Option<Arc<AttachingState>> {
            self.states.read().unwrap().get(id).cloned()
        }
    }

    fn chain(root: ItemId, depth: usize) -> Vec<ChangeEvent> {
        let mut parent = root;
        let mut events = Vec::new();
        for level in 0..depth {
            let child = ItemId::new();
            events.push(ChangeEvent::node_added(child, parent, format!("level{level}")));
            parent = child;
        }
        // deepest first
        events.reverse();
        events
    }

    #[test]
    fn partition_splits_by_kind() {
        let parent = ItemId::new();
        let removed = ItemId::new();
        let bundle = EventBundle::new(vec![
            ChangeEvent::node_added(ItemId::new(), parent, "a"),
            ChangeEvent::property_added(ItemId::new(), parent, "b"),
            ChangeEvent::node_removed(removed, parent, "c"),
            ChangeEvent::property_removed(ItemId::new(), parent, "d"),
            ChangeEvent::property_changed(ItemId::new(), parent, "e"),
        ]);

        let partition = Partition::of(&bundle);

        assert_eq!(partition.pending_adds.len(), 2);
        assert_eq!(partition.remainder.len(), 3);
        assert_eq!(partition.removed_subjects, HashSet::from([removed]));
    }

    #[test]
    fn property_removal_is_not_a_removed_subject() {
        let bundle = EventBundle::new(vec![ChangeEvent::property_removed(
            ItemId::new(),
            ItemId::new(),
            "p",
        )]);
        assert!(Partition::of(&bundle).removed_subjects.is_empty());
    }

    #[test]
    fn nested_chain_resolves_within_depth_sweeps() {
        for depth in 1..6 {
            let store = AttachingStore::default();
            let root = ItemId::new();
            store.insert(root);
            let events = chain(root, depth);
            let reconciler = Reconciler::new(store, "test");

            let outcome = reconciler.resolve_additions(events.iter().collect());

            let root_state = reconciler.cache().lookup(&root).unwrap();
            assert_eq!(root_state.applied.lock().unwrap().len(), 1);
            assert_eq!(outcome.resolved, depth);
            assert_eq!(outcome.discarded, 0);
            assert!(outcome.sweeps <= depth, "depth {depth} took {} sweeps", outcome.sweeps);
        }
    }

    #[test]
    fn unsatisfiable_additions_terminate() {
        let store = AttachingStore::default();
        let a = ItemId::new();
        let b = ItemId::new();
        // each waits on the other; neither parent is resident
        let events = vec![
            ChangeEvent::node_added(a, b, "a"),
            ChangeEvent::node_added(b, a, "b"),
        ];
        let reconciler = Reconciler::new(store, "test");

        let outcome = reconciler.resolve_additions(events.iter().collect());

        assert_eq!(
            outcome,
            AddResolution {
                sweeps: 1,
                resolved: 0,
                discarded: 2
            }
        );
    }

    #[test]
    fn parentless_addition_dropped_in_first_sweep() {
        let store = AttachingStore::default();
        let root = ItemId::new();
        store.insert(root);
        let events = vec![
            ChangeEvent::node_added(ItemId::new(), root, "kept"),
            ChangeEvent::new(ItemId::new(), None, "orphan", EventKind::NodeAdded),
        ];
        let reconciler = Reconciler::new(store, "test");

        let outcome = reconciler.resolve_additions(events.iter().collect());

        assert_eq!(outcome.resolved, 1);
        assert_eq!(outcome.discarded, 1);
        assert_eq!(outcome.sweeps, 1);
    }

    #[test]
    fn empty_additions_take_no_sweeps() {
        let reconciler = Reconciler::new(AttachingStore::default(), "test");
        assert_eq!(reconciler.resolve_additions(Vec::new()), AddResolution::default());
    }
}
