//! # Collection Manager
//!
//! Process-wide coordinator for views and caches. Holds a non-owning registry
//! of live views per entity kind and at most one [`LruCache`] per kind,
//! answers "is this record already in memory?" lookups, and fans store
//! mutations out to every interested view.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                        CollectionManager                             │
//!   │                                                                      │
//!   │   kinds: FxHashMap<TypeId, Box<dyn ErasedKind>>                      │
//!   │                              │                                       │
//!   │               ┌──────────────┴──────────────┐                        │
//!   │               ▼                             ▼                        │
//!   │     KindState<Message>             KindState<Contact>                │
//!   │       views: SlotArena<Weak<..>>     views: SlotArena<Weak<..>>      │
//!   │       cache: Option<LruCache>        cache: Option<LruCache>         │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The entity type is the kind key. Views are held through `Weak`
//! references: dropping the last `View` handle retires it, the registry skips
//! the dead entry during fan-out and prunes it on the next registration or
//! [`sweep`](CollectionManager::sweep).
//!
//! ## Lookup Path
//!
//! ```text
//!   lookup_by_id(id, promote)
//!     1. cache.hit(id)            ── found ──► return (recency bumped)
//!     2. each live view.get(id)   ── found ──► promote into cache, return
//!     3. None                     ── caller loads from the store, then
//!                                    unify_instances / items_loaded
//! ```
//!
//! `lookup_many_by_ids` runs the same two phases over a set: one cache pass,
//! then one pass per view over only the ids still unresolved.
//!
//! ## Notification Fan-out
//!
//! | Entry point         | Cache                    | Each live view                       |
//! |---------------------|--------------------------|--------------------------------------|
//! | `items_loaded`      | add                      | untouched                            |
//! | `items_added`       | add                      | add the matching subset              |
//! | `items_modified`    | untouched                | one added/modified/removed batch each|
//! | `items_deleted`     | drop, no write-back      | remove members (not frozen views)    |
//! | `items_deleted_by`  | drop matches             | remove matching members (not frozen) |
//!
//! Listener failures are contained by each view, so every view of the kind
//! is notified even when one listener errors or panics.
//!
//! ## Thread Safety
//!
//! `CollectionManager` is `Send` and runs on one coordinating thread. With
//! the `concurrency` feature, [`ConcurrentCollectionManager`] serialises
//! access behind `Arc<parking_lot::Mutex<..>>`. Listeners run while the
//! manager is borrowed and must not call back into it.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Weak;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use crate::cache::{CommitReport, LruCache, MIN_CACHE_CAPACITY};
use crate::ds::{SlotArena, SlotId};
use crate::entity::{EntityId, EntityRef};
#[cfg(feature = "metrics")]
use crate::metrics::metrics_impl::ManagerMetrics;
#[cfg(feature = "metrics")]
use crate::metrics::snapshot::ManagerMetricsSnapshot;
#[cfg(feature = "metrics")]
use crate::metrics::traits::{ManagerMetricsRecorder, MetricsSnapshotProvider};
use crate::traits::{Entity, WriteBack};
use crate::view::{View, ViewShared};

#[cfg(feature = "concurrency")]
use parking_lot::Mutex;
#[cfg(feature = "concurrency")]
use std::sync::Arc;

/// Handle returned by [`CollectionManager::register_view`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewKey {
    kind: TypeId,
    slot: SlotId,
    token: u64,
}

/// Result of [`CollectionManager::lookup_many_by_ids`].
#[derive(Debug)]
pub struct LookupMany<E> {
    pub found: FxHashMap<EntityId, EntityRef<E>>,
    pub not_found: FxHashSet<EntityId>,
}

impl<E> LookupMany<E> {
    pub fn is_complete(&self) -> bool {
        self.not_found.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Cache,
    View,
}

struct Registration<E: Entity> {
    token: u64,
    view: Weak<ViewShared<E>>,
}

struct KindState<E: Entity> {
    views: SlotArena<Registration<E>>,
    cache: Option<LruCache<E>>,
}

impl<E: Entity> KindState<E> {
    fn new() -> Self {
        Self {
            views: SlotArena::new(),
            cache: None,
        }
    }

    fn live(&self) -> impl Iterator<Item = View<E>> + '_ {
        self.views
            .iter()
            .filter_map(|(_, registration)| registration.view.upgrade())
            .map(View::from_shared)
    }

    fn prune(&mut self) -> usize {
        self.views
            .retain(|registration| registration.view.strong_count() > 0)
    }

    /// Canonical instance for `id`, bumping cache recency on a cache hit.
    fn find_canonical(&mut self, id: EntityId) -> Option<(EntityRef<E>, Source)> {
        if let Some(entity) = self.cache.as_mut().and_then(|cache| cache.hit(id)) {
            return Some((entity, Source::Cache));
        }
        self.live()
            .find_map(|view| view.get(id))
            .map(|entity| (entity, Source::View))
    }
}

trait ErasedKind: Send {
    fn kind_name(&self) -> &'static str;
    fn sweep(&mut self) -> usize;
    #[cfg(feature = "metrics")]
    fn live_views(&self) -> usize;
    fn commit_dirty(&mut self) -> CommitReport;
    fn unregister(&mut self, slot: SlotId, token: u64) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<E: Entity> ErasedKind for KindState<E> {
    fn kind_name(&self) -> &'static str {
        E::KIND
    }

    fn sweep(&mut self) -> usize {
        self.prune()
    }

    #[cfg(feature = "metrics")]
    fn live_views(&self) -> usize {
        self.live().count()
    }

    fn commit_dirty(&mut self) -> CommitReport {
        self.cache
            .as_mut()
            .map(LruCache::commit_dirty)
            .unwrap_or_default()
    }

    fn unregister(&mut self, slot: SlotId, token: u64) -> bool {
        let matches = self
            .views
            .get(slot)
            .is_some_and(|registration| registration.token == token);
        if matches {
            self.views.remove(slot);
            trace!(kind = E::KIND, token, "unregistered view");
        }
        matches
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

type Kinds = FxHashMap<TypeId, Box<dyn ErasedKind>>;

fn kind_ref<E: Entity>(kinds: &Kinds) -> Option<&KindState<E>> {
    kinds
        .get(&TypeId::of::<E>())?
        .as_any()
        .downcast_ref::<KindState<E>>()
}

fn kind_mut<E: Entity>(kinds: &mut Kinds) -> Option<&mut KindState<E>> {
    kinds
        .get_mut(&TypeId::of::<E>())?
        .as_any_mut()
        .downcast_mut::<KindState<E>>()
}

fn kind_entry<E: Entity>(kinds: &mut Kinds) -> &mut KindState<E> {
    let erased = kinds
        .entry(TypeId::of::<E>())
        .or_insert_with(|| Box::new(KindState::<E>::new()));
    match erased.as_any_mut().downcast_mut::<KindState<E>>() {
        Some(state) => state,
        None => unreachable!("kind map entry for {} holds another entity type", E::KIND),
    }
}

/// Registry of live views and per-kind caches.
pub struct CollectionManager {
    kinds: Kinds,
    cache_floor: usize,
    next_token: u64,
    #[cfg(feature = "metrics")]
    metrics: ManagerMetrics,
}

impl CollectionManager {
    /// Empty manager using [`MIN_CACHE_CAPACITY`] as the cache floor.
    pub fn new() -> Self {
        Self::with_cache_floor(MIN_CACHE_CAPACITY)
    }

    pub(crate) fn with_cache_floor(floor: usize) -> Self {
        Self {
            kinds: FxHashMap::default(),
            cache_floor: floor.max(1),
            next_token: 0,
            #[cfg(feature = "metrics")]
            metrics: ManagerMetrics::default(),
        }
    }

    pub fn cache_floor(&self) -> usize {
        self.cache_floor
    }

    // -- registry -----------------------------------------------------------

    /// Registers a non-owning reference to `view`. Registering the same view
    /// twice returns its existing key. Dead registrations of the kind are
    /// pruned first.
    pub fn register_view<E: Entity>(&mut self, view: &View<E>) -> ViewKey {
        let state = kind_entry::<E>(&mut self.kinds);
        let pruned = state.prune();
        if pruned > 0 {
            debug!(kind = E::KIND, pruned, "pruned dropped views");
        }
        #[cfg(feature = "metrics")]
        self.metrics.record_stale_views_pruned(pruned);

        let weak = view.downgrade();
        if let Some((slot, registration)) = state
            .views
            .iter()
            .find(|(_, registration)| Weak::ptr_eq(&registration.view, &weak))
        {
            return ViewKey {
                kind: TypeId::of::<E>(),
                slot,
                token: registration.token,
            };
        }

        let token = self.next_token;
        self.next_token += 1;
        let slot = state.views.insert(Registration { token, view: weak });
        trace!(kind = E::KIND, token, "registered view");
        ViewKey {
            kind: TypeId::of::<E>(),
            slot,
            token,
        }
    }

    /// Drops a registration eagerly. Returns `false` for a key that is no
    /// longer registered.
    pub fn unregister_view(&mut self, key: ViewKey) -> bool {
        let Some(erased) = self.kinds.get_mut(&key.kind) else {
            return false;
        };
        erased.unregister(key.slot, key.token)
    }

    /// Live views of kind `E`.
    pub fn views<E: Entity>(&self) -> Vec<View<E>> {
        kind_ref::<E>(&self.kinds)
            .map(|state| state.live().collect())
            .unwrap_or_default()
    }

    /// Prunes dropped views of every kind; returns how many were removed.
    pub fn sweep(&mut self) -> usize {
        let pruned: usize = self.kinds.values_mut().map(|kind| kind.sweep()).sum();
        if pruned > 0 {
            debug!(pruned, "swept dropped views");
        }
        #[cfg(feature = "metrics")]
        self.metrics.record_stale_views_pruned(pruned);
        pruned
    }

    // -- caches -------------------------------------------------------------

    /// Creates the cache for kind `E`, replacing any existing one.
    pub fn define_cache<E: Entity>(&mut self, capacity: usize) -> &mut LruCache<E> {
        let cache = LruCache::with_floor(capacity, self.cache_floor);
        self.install_cache(cache)
    }

    pub fn define_cache_with_write_back<E: Entity>(
        &mut self,
        capacity: usize,
        hook: impl WriteBack<E> + 'static,
    ) -> &mut LruCache<E> {
        let cache = LruCache::with_floor(capacity, self.cache_floor).with_write_back(hook);
        self.install_cache(cache)
    }

    /// Installs a prepared cache. A replaced cache has its dirty entities
    /// committed before it is dropped.
    pub fn install_cache<E: Entity>(&mut self, cache: LruCache<E>) -> &mut LruCache<E> {
        let state = kind_entry::<E>(&mut self.kinds);
        if let Some(mut old) = state.cache.take() {
            warn!(
                kind = E::KIND,
                resident = old.len(),
                "cache redefined; resident entities are dropped"
            );
            old.commit_dirty();
        }
        debug!(kind = E::KIND, capacity = cache.capacity(), "defined cache");
        state.cache.insert(cache)
    }

    pub fn cache<E: Entity>(&self) -> Option<&LruCache<E>> {
        kind_ref::<E>(&self.kinds)?.cache.as_ref()
    }

    pub fn cache_mut<E: Entity>(&mut self) -> Option<&mut LruCache<E>> {
        kind_mut::<E>(&mut self.kinds)?.cache.as_mut()
    }

    /// Commits dirty entities of every kind's cache.
    pub fn commit_dirty_all(&mut self) -> CommitReport {
        let mut report = CommitReport::default();
        for kind in self.kinds.values_mut() {
            let committed = kind.commit_dirty();
            if committed != CommitReport::default() {
                debug!(
                    kind = kind.kind_name(),
                    flushed = committed.flushed,
                    failed = committed.failed,
                    "committed dirty entities"
                );
            }
            report += committed;
        }
        report
    }

    // -- lookups ------------------------------------------------------------

    /// Finds the in-memory instance for `id`: cache first, then every live
    /// view. A view-only hit is promoted into the cache when `promote` is set.
    pub fn lookup_by_id<E: Entity>(&mut self, id: EntityId, promote: bool) -> Option<EntityRef<E>> {
        #[cfg(feature = "metrics")]
        self.metrics.record_lookup_call();

        let found = kind_mut::<E>(&mut self.kinds).and_then(|state| {
            let (entity, source) = state.find_canonical(id)?;
            let promoted = source == Source::View && promote && promote_into(state, &entity);
            Some((entity, source, promoted))
        });

        match found {
            Some((entity, source, _promoted)) => {
                #[cfg(feature = "metrics")]
                self.record_resolution(source, _promoted);
                trace!(kind = E::KIND, %id, ?source, "lookup resolved");
                Some(entity)
            }
            None => {
                #[cfg(feature = "metrics")]
                self.metrics.record_lookup_miss();
                None
            }
        }
    }

    /// Batched [`lookup_by_id`](Self::lookup_by_id): one cache pass, then one
    /// pass per view over the ids still unresolved.
    pub fn lookup_many_by_ids<E: Entity>(
        &mut self,
        ids: impl IntoIterator<Item = EntityId>,
        promote: bool,
    ) -> LookupMany<E> {
        let mut unresolved: FxHashSet<EntityId> = ids.into_iter().collect();
        let mut found = FxHashMap::default();
        #[cfg(feature = "metrics")]
        self.metrics.record_lookup_call();

        if let Some(state) = kind_mut::<E>(&mut self.kinds) {
            if let Some(cache) = state.cache.as_mut() {
                unresolved.retain(|&id| match cache.hit(id) {
                    Some(entity) => {
                        found.insert(id, entity);
                        false
                    }
                    None => true,
                });
            }
            #[cfg(feature = "metrics")]
            self.metrics.record_cache_hits(found.len());

            let mut from_views = Vec::new();
            for view in state.live() {
                if unresolved.is_empty() {
                    break;
                }
                unresolved.retain(|&id| match view.get(id) {
                    Some(entity) => {
                        from_views.push(entity.clone());
                        found.insert(id, entity);
                        false
                    }
                    None => true,
                });
            }
            #[cfg(feature = "metrics")]
            self.metrics.record_view_hits(from_views.len());

            if promote && !from_views.is_empty() {
                if let Some(cache) = state.cache.as_mut() {
                    #[cfg(feature = "metrics")]
                    self.metrics.record_promotions(from_views.len());
                    cache.add(from_views);
                }
            }
        }

        #[cfg(feature = "metrics")]
        self.metrics.record_lookup_misses(unresolved.len());
        trace!(
            kind = E::KIND,
            found = found.len(),
            missing = unresolved.len(),
            "batch lookup resolved"
        );
        LookupMany {
            found,
            not_found: unresolved,
        }
    }

    /// In-memory instances for `ids`, without touching cache residency or
    /// recency. Ids with no resident instance are simply absent.
    pub fn lookup_resident<E: Entity>(
        &self,
        ids: impl IntoIterator<Item = EntityId>,
    ) -> FxHashMap<EntityId, EntityRef<E>> {
        let mut found = FxHashMap::default();
        let Some(state) = kind_ref::<E>(&self.kinds) else {
            return found;
        };
        let mut unresolved: Vec<EntityId> = Vec::new();
        for id in ids {
            match state.cache.as_ref().and_then(|cache| cache.get(id)) {
                Some(entity) => {
                    found.insert(id, entity);
                }
                None => unresolved.push(id),
            }
        }
        for view in state.live() {
            if unresolved.is_empty() {
                break;
            }
            unresolved.retain(|&id| match view.get(id) {
                Some(entity) => {
                    found.insert(id, entity);
                    false
                }
                None => true,
            });
        }
        found
    }

    /// Same shape as [`lookup_by_id`](Self::lookup_by_id), keyed by the
    /// kind's unique value. Always `None` for kinds without one.
    pub fn lookup_by_unique_value<E: Entity>(
        &mut self,
        value: &str,
        promote: bool,
    ) -> Option<EntityRef<E>> {
        #[cfg(feature = "metrics")]
        self.metrics.record_lookup_call();
        if !E::USES_UNIQUE_VALUE {
            #[cfg(feature = "metrics")]
            self.metrics.record_lookup_miss();
            return None;
        }

        let found = kind_mut::<E>(&mut self.kinds).and_then(|state| {
            if let Some(cache) = state.cache.as_mut() {
                if let Some(entity) = cache.get_by_unique_value(value) {
                    cache.hit(entity.id());
                    return Some((entity, Source::Cache, false));
                }
            }
            let entity = state.live().find_map(|view| view.get_by_unique_value(value))?;
            let promoted = promote && promote_into(state, &entity);
            Some((entity, Source::View, promoted))
        });

        match found {
            Some((entity, _source, _promoted)) => {
                #[cfg(feature = "metrics")]
                self.record_resolution(_source, _promoted);
                Some(entity)
            }
            None => {
                #[cfg(feature = "metrics")]
                self.metrics.record_lookup_miss();
                None
            }
        }
    }

    // -- unification --------------------------------------------------------

    /// Replaces each freshly loaded entity whose id already has an in-memory
    /// instance with that instance. With `cache_if_missing` set, entities
    /// with no canonical instance and canonical instances found only in
    /// views are added to the cache; without it the cache is left as is.
    /// Repeated ids within the batch all resolve to the first one.
    pub fn unify_instances<E: Entity>(&mut self, items: &mut [EntityRef<E>], cache_if_missing: bool) {
        if items.is_empty() {
            return;
        }
        let mut state = kind_mut::<E>(&mut self.kinds);
        let mut first_seen: FxHashMap<EntityId, EntityRef<E>> = FxHashMap::default();
        let mut to_cache = Vec::new();
        let mut unified = 0usize;

        for slot in items.iter_mut() {
            let id = slot.id();
            if let Some(first) = first_seen.get(&id) {
                if !EntityRef::ptr_eq(first, slot) {
                    *slot = first.clone();
                    unified += 1;
                }
                continue;
            }
            match state.as_mut().and_then(|state| state.find_canonical(id)) {
                Some((canonical, source)) => {
                    if !EntityRef::ptr_eq(&canonical, slot) {
                        unified += 1;
                    }
                    if source == Source::View && cache_if_missing {
                        to_cache.push(canonical.clone());
                    }
                    *slot = canonical.clone();
                    first_seen.insert(id, canonical);
                }
                None => {
                    if cache_if_missing {
                        to_cache.push(slot.clone());
                    }
                    first_seen.insert(id, slot.clone());
                }
            }
        }

        if let Some(cache) = state.and_then(|state| state.cache.as_mut()) {
            cache.add(to_cache);
        }
        if unified > 0 {
            debug!(kind = E::KIND, unified, batch = items.len(), "unified loaded instances");
        }
        #[cfg(feature = "metrics")]
        self.metrics.record_unified_instances(unified);
    }

    /// Single-entity form of [`unify_instances`](Self::unify_instances),
    /// caching the entity if it is new.
    pub fn unify_one<E: Entity>(&mut self, entity: EntityRef<E>) -> EntityRef<E> {
        let mut batch = [entity];
        self.unify_instances(&mut batch, true);
        let [canonical] = batch;
        canonical
    }

    // -- notifications ------------------------------------------------------

    /// Seeds the cache with entities read from the store. Views are not told.
    pub fn items_loaded<E: Entity>(&mut self, items: &[EntityRef<E>]) {
        if let Some(cache) = self.cache_mut::<E>() {
            cache.add(items.iter().cloned());
        }
    }

    pub fn item_loaded<E: Entity>(&mut self, item: EntityRef<E>) {
        if let Some(cache) = self.cache_mut::<E>() {
            cache.add([item]);
        }
    }

    /// Brand-new entities: the cache absorbs them and every view receives
    /// the subset its predicate accepts.
    pub fn items_added<E: Entity>(&mut self, items: &[EntityRef<E>]) {
        if items.is_empty() {
            return;
        }
        let Some(state) = kind_mut::<E>(&mut self.kinds) else {
            return;
        };
        if let Some(cache) = state.cache.as_mut() {
            cache.add(items.iter().cloned());
        }
        let views: Vec<View<E>> = state.live().collect();
        trace!(kind = E::KIND, views = views.len(), batch = items.len(), "fanning out added items");

        for view in &views {
            let matching = view.matching(items);
            if !matching.is_empty() && view.add(matching) > 0 {
                #[cfg(feature = "metrics")]
                self.metrics.record_added_callback();
            }
        }
    }

    /// Content changes: each view gets at most one added, one modified and
    /// one removed batch. Frozen views never lose members here.
    pub fn items_modified<E: Entity>(&mut self, items: &[EntityRef<E>]) {
        if items.is_empty() {
            return;
        }
        let views = self.views::<E>();
        trace!(kind = E::KIND, views = views.len(), batch = items.len(), "fanning out modified items");

        for view in &views {
            let partition = view.partition_modified(items);
            if partition.is_empty() {
                continue;
            }
            #[cfg(feature = "metrics")]
            {
                if !partition.added.is_empty() {
                    self.metrics.record_added_callback();
                }
                if !partition.modified.is_empty() {
                    self.metrics.record_modified_callback();
                }
                if !partition.removed.is_empty() {
                    self.metrics.record_removed_callback();
                }
            }
            view.apply_partition(partition);
        }
    }

    /// Permanent deletion: dropped from the cache without write-back and
    /// removed from every view that is not frozen.
    ///
    /// Frozen views (Explicit, Null and frozen queries) keep deleted members,
    /// since no automatic event ever shrinks them. Callers holding such a
    /// view drop the members with [`View::remove_ids`].
    pub fn items_deleted<E: Entity>(&mut self, ids: &[EntityId]) {
        if ids.is_empty() {
            return;
        }
        let Some(state) = kind_mut::<E>(&mut self.kinds) else {
            return;
        };
        if let Some(cache) = state.cache.as_mut() {
            for &id in ids {
                cache.deleted(id);
            }
        }
        let views: Vec<View<E>> = state.live().collect();
        trace!(kind = E::KIND, views = views.len(), batch = ids.len(), "fanning out deletions");

        for view in &views {
            if view.is_frozen() {
                continue;
            }
            if view.remove_ids(ids.iter().copied()) > 0 {
                #[cfg(feature = "metrics")]
                self.metrics.record_removed_callback();
            }
        }
    }

    /// Bulk deletion by filter over resident entities only: the cache and
    /// every non-frozen view drop the members `filter` accepts. Frozen views
    /// are left alone, as in [`items_deleted`](Self::items_deleted).
    pub fn items_deleted_by<E: Entity>(&mut self, filter: impl Fn(&E) -> bool) {
        let Some(state) = kind_mut::<E>(&mut self.kinds) else {
            return;
        };
        if let Some(cache) = state.cache.as_mut() {
            let dropped = cache.deleted_where(&filter);
            if !dropped.is_empty() {
                debug!(kind = E::KIND, dropped = dropped.len(), "dropped filtered entities from cache");
            }
        }
        let views: Vec<View<E>> = state.live().collect();
        for view in &views {
            if view.is_frozen() {
                continue;
            }
            let doomed = view.members_where(&filter);
            if !doomed.is_empty() && view.remove_ids(doomed) > 0 {
                #[cfg(feature = "metrics")]
                self.metrics.record_removed_callback();
            }
        }
    }

    #[cfg(feature = "metrics")]
    fn record_resolution(&mut self, source: Source, promoted: bool) {
        match source {
            Source::Cache => self.metrics.record_cache_hit(),
            Source::View => self.metrics.record_view_hit(),
        }
        if promoted {
            self.metrics.record_promotion();
        }
    }
}

/// Adds a view-resident entity to the kind's cache; `false` if there is none.
fn promote_into<E: Entity>(state: &mut KindState<E>, entity: &EntityRef<E>) -> bool {
    let Some(cache) = state.cache.as_mut() else {
        return false;
    };
    cache.add([entity.clone()]);
    debug!(kind = E::KIND, id = %entity.id(), "promoted view-resident entity into cache");
    true
}

#[cfg(feature = "metrics")]
impl CollectionManager {
    pub fn metrics_snapshot(&self) -> ManagerMetricsSnapshot {
        ManagerMetricsSnapshot {
            lookup_calls: self.metrics.lookup_calls,
            cache_hits: self.metrics.cache_hits,
            view_hits: self.metrics.view_hits,
            promotions: self.metrics.promotions,
            lookup_misses: self.metrics.lookup_misses,
            unified_instances: self.metrics.unified_instances,
            added_callbacks: self.metrics.added_callbacks,
            modified_callbacks: self.metrics.modified_callbacks,
            removed_callbacks: self.metrics.removed_callbacks,
            stale_views_pruned: self.metrics.stale_views_pruned,
            kinds: self.kinds.len(),
            live_views: self.kinds.values().map(|kind| kind.live_views()).sum(),
        }
    }
}

#[cfg(feature = "metrics")]
impl MetricsSnapshotProvider<ManagerMetricsSnapshot> for CollectionManager {
    fn snapshot(&self) -> ManagerMetricsSnapshot {
        self.metrics_snapshot()
    }
}

impl Default for CollectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CollectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&'static str> = self.kinds.values().map(|kind| kind.kind_name()).collect();
        kinds.sort_unstable();
        f.debug_struct("CollectionManager")
            .field("kinds", &kinds)
            .field("cache_floor", &self.cache_floor)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ConcurrentCollectionManager
// ---------------------------------------------------------------------------

/// Cloneable, thread-safe handle over one [`CollectionManager`].
///
/// Every call takes the lock for its whole duration, listener callbacks
/// included, so a listener must never call back into this handle.
#[cfg(feature = "concurrency")]
#[derive(Clone, Default)]
pub struct ConcurrentCollectionManager {
    inner: Arc<Mutex<CollectionManager>>,
}

#[cfg(feature = "concurrency")]
impl ConcurrentCollectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_manager(manager: CollectionManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    /// Runs `f` with exclusive access to the manager.
    pub fn with<R>(&self, f: impl FnOnce(&mut CollectionManager) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn register_view<E: Entity>(&self, view: &View<E>) -> ViewKey {
        self.inner.lock().register_view(view)
    }

    pub fn unregister_view(&self, key: ViewKey) -> bool {
        self.inner.lock().unregister_view(key)
    }

    pub fn views<E: Entity>(&self) -> Vec<View<E>> {
        self.inner.lock().views()
    }

    pub fn sweep(&self) -> usize {
        self.inner.lock().sweep()
    }

    pub fn define_cache<E: Entity>(&self, capacity: usize) {
        self.inner.lock().define_cache::<E>(capacity);
    }

    pub fn define_cache_with_write_back<E: Entity>(
        &self,
        capacity: usize,
        hook: impl WriteBack<E> + 'static,
    ) {
        self.inner
            .lock()
            .define_cache_with_write_back::<E>(capacity, hook);
    }

    pub fn lookup_by_id<E: Entity>(&self, id: EntityId, promote: bool) -> Option<EntityRef<E>> {
        self.inner.lock().lookup_by_id(id, promote)
    }

    pub fn lookup_many_by_ids<E: Entity>(
        &self,
        ids: impl IntoIterator<Item = EntityId>,
        promote: bool,
    ) -> LookupMany<E> {
        self.inner.lock().lookup_many_by_ids(ids, promote)
    }

    pub fn lookup_resident<E: Entity>(
        &self,
        ids: impl IntoIterator<Item = EntityId>,
    ) -> FxHashMap<EntityId, EntityRef<E>> {
        self.inner.lock().lookup_resident(ids)
    }

    pub fn lookup_by_unique_value<E: Entity>(
        &self,
        value: &str,
        promote: bool,
    ) -> Option<EntityRef<E>> {
        self.inner.lock().lookup_by_unique_value(value, promote)
    }

    pub fn unify_instances<E: Entity>(&self, items: &mut [EntityRef<E>], cache_if_missing: bool) {
        self.inner.lock().unify_instances(items, cache_if_missing);
    }

    pub fn unify_one<E: Entity>(&self, entity: EntityRef<E>) -> EntityRef<E> {
        self.inner.lock().unify_one(entity)
    }

    pub fn items_loaded<E: Entity>(&self, items: &[EntityRef<E>]) {
        self.inner.lock().items_loaded(items);
    }

    pub fn items_added<E: Entity>(&self, items: &[EntityRef<E>]) {
        self.inner.lock().items_added(items);
    }

    pub fn items_modified<E: Entity>(&self, items: &[EntityRef<E>]) {
        self.inner.lock().items_modified(items);
    }

    pub fn items_deleted<E: Entity>(&self, ids: &[EntityId]) {
        self.inner.lock().items_deleted::<E>(ids);
    }

    pub fn items_deleted_by<E: Entity>(&self, filter: impl Fn(&E) -> bool) {
        self.inner.lock().items_deleted_by(filter);
    }

    pub fn commit_dirty_all(&self) -> CommitReport {
        self.inner.lock().commit_dirty_all()
    }
}

#[cfg(all(feature = "metrics", feature = "concurrency"))]
impl ConcurrentCollectionManager {
    pub fn metrics_snapshot(&self) -> ManagerMetricsSnapshot {
        self.inner.lock().metrics_snapshot()
    }
}

#[cfg(feature = "concurrency")]
impl fmt::Debug for ConcurrentCollectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentCollectionManager")
            .field("inner", &*self.inner.lock())
            .finish()
    }
}
