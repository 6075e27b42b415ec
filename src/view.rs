//! # Views
//!
//! A [`View`] is an ordered, deduplicated set of entities of one kind,
//! optionally bound to a [`Predicate`] and a [`ViewListener`].
//!
//! ## Architecture
//!
//! ```text
//!   View<E> (owner handle, cheap to clone)
//!     │
//!     ▼
//!   Arc<ViewShared<E>> ◄──── Weak ──── CollectionManager registry
//!     ├── Mutex<ViewState<E>>
//!     │     ├── items:      Vec<EntityRef<E>>            display order
//!     │     ├── by_id:      FxHashMap<EntityId, EntityRef>
//!     │     ├── by_unique:  Option<FxHashMap<str, EntityRef>>
//!     │     └── predicate:  Predicate<E>
//!     └── Mutex<ListenerSlot<E>>
//! ```
//!
//! ## Notification Flow
//!
//! ```text
//!   add/remove/modify
//!     1. lock state, update items + indices, unlock
//!     2. detach listener from its slot
//!     3. run callback under catch_unwind
//!     4. log Err / panic
//!     5. deliver notifications queued by the callback, in order
//!     6. reattach listener
//! ```
//!
//! Indices are fully updated before the callback runs, so a listener may
//! read or mutate the view it is attached to. Changes it makes from inside
//! a callback are queued and reach it after the callback returns.
//!
//! ## Membership Rules
//!
//! - At most one instance per id. Adding a colliding id keeps the existing
//!   instance and logs the duplicate.
//! - `remove` filters `items` in one pass against a delete set.
//! - `clear` is refused for views still bound to a query.
//! - `become_explicit` swaps any other predicate for `Predicate::Explicit`.
//!
//! ## Example Usage
//!
//! ```
//! use viewkit::entity::{EntityId, EntityRef};
//! use viewkit::predicate::Predicate;
//! use viewkit::traits::Entity;
//! use viewkit::view::View;
//!
//! struct Tag {
//!     id: u64,
//! }
//!
//! impl Entity for Tag {
//!     const KIND: &'static str = "tag";
//!     fn id(&self) -> EntityId {
//!         EntityId::new(self.id)
//!     }
//! }
//!
//! let view = View::new(Predicate::<Tag>::Null);
//! let tag = EntityRef::new(Tag { id: 1 });
//! assert_eq!(view.add([tag.clone(), tag.clone()]), 1);
//! assert!(view.contains(EntityId::new(1)));
//! assert_eq!(view.remove(&[tag]), 1);
//! assert!(view.is_empty());
//! ```

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{error, trace, warn};

use crate::entity::{EntityId, EntityRef};
use crate::error::InvariantError;
use crate::predicate::Predicate;
use crate::traits::{Entity, ViewListener};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Added,
    Modified,
    Removed,
    QueryCompleted,
}

impl Event {
    fn callback(self) -> &'static str {
        match self {
            Event::Added => "on_items_added",
            Event::Modified => "on_items_modified",
            Event::Removed => "on_items_removed",
            Event::QueryCompleted => "on_query_completed",
        }
    }
}

struct ViewState<E> {
    items: Vec<EntityRef<E>>,
    by_id: FxHashMap<EntityId, EntityRef<E>>,
    by_unique: Option<FxHashMap<Box<str>, EntityRef<E>>>,
    predicate: Predicate<E>,
    query_completed: bool,
}

impl<E: Entity> ViewState<E> {
    fn new(predicate: Predicate<E>) -> Self {
        Self {
            items: Vec::new(),
            by_id: FxHashMap::default(),
            by_unique: E::USES_UNIQUE_VALUE.then(FxHashMap::default),
            predicate,
            query_completed: false,
        }
    }

    /// Inserts every entity whose id is not yet a member and returns the
    /// ones actually inserted, in input order.
    fn insert_batch(&mut self, entities: impl IntoIterator<Item = EntityRef<E>>) -> Vec<EntityRef<E>> {
        let mut added = Vec::new();
        for entity in entities {
            let id = entity.id();
            if self.by_id.contains_key(&id) {
                warn!(kind = E::KIND, %id, "duplicate id added to view; keeping existing instance");
                continue;
            }
            if let (Some(index), Some(value)) = (self.by_unique.as_mut(), entity.unique_value()) {
                index.insert(Box::from(value), entity.clone());
            }
            self.by_id.insert(id, entity.clone());
            self.items.push(entity.clone());
            added.push(entity);
        }
        added
    }

    fn remove_ids(&mut self, ids: impl IntoIterator<Item = EntityId>) -> Vec<EntityRef<E>> {
        let mut doomed = FxHashSet::default();
        let mut removed = Vec::new();
        for id in ids {
            let Some(entity) = self.by_id.remove(&id) else {
                continue;
            };
            if let (Some(index), Some(value)) = (self.by_unique.as_mut(), entity.unique_value()) {
                index.remove(value);
            }
            doomed.insert(id);
            removed.push(entity);
        }
        if !doomed.is_empty() {
            self.items.retain(|entity| !doomed.contains(&entity.id()));
        }
        removed
    }

    fn matches(&self, entity: &EntityRef<E>) -> bool {
        let is_member = self.by_id.contains_key(&entity.id());
        self.predicate.test(&entity.read(), is_member)
    }
}

struct ListenerSlot<E: Entity> {
    current: Option<Box<dyn ViewListener<E>>>,
    generation: u64,
    running: bool,
    // raised while the listener runs, delivered in order once it returns
    pending: VecDeque<(Event, Vec<EntityRef<E>>)>,
}

pub(crate) struct ViewShared<E: Entity> {
    state: Mutex<ViewState<E>>,
    listener: Mutex<ListenerSlot<E>>,
    listener_failures: AtomicU64,
}

/// Entities of one `items_modified` batch, split by what they mean for a view.
#[derive(Debug)]
pub(crate) struct ModifiedPartition<E> {
    pub(crate) added: Vec<EntityRef<E>>,
    pub(crate) modified: Vec<EntityRef<E>>,
    pub(crate) removed: Vec<EntityRef<E>>,
}

impl<E> ModifiedPartition<E> {
    pub(crate) fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Ordered, deduplicated set of entities of kind `E`.
pub struct View<E: Entity> {
    shared: Arc<ViewShared<E>>,
}

impl<E: Entity> View<E> {
    pub fn new(predicate: Predicate<E>) -> Self {
        Self {
            shared: Arc::new(ViewShared {
                state: Mutex::new(ViewState::new(predicate)),
                listener: Mutex::new(ListenerSlot {
                    current: None,
                    generation: 0,
                    running: false,
                    pending: VecDeque::new(),
                }),
                listener_failures: AtomicU64::new(0),
            }),
        }
    }

    /// View with an initial membership. The initial load is not a change,
    /// so no listener hears about it.
    pub fn with_items(predicate: Predicate<E>, items: impl IntoIterator<Item = EntityRef<E>>) -> Self {
        let view = Self::new(predicate);
        view.shared.state.lock().insert_batch(items);
        view
    }

    /// Predicate-less view whose membership only changes through direct
    /// `add`/`remove` calls.
    pub fn explicit() -> Self {
        Self::new(Predicate::Explicit)
    }

    /// Attaches a listener, builder style.
    pub fn with_listener(self, listener: impl ViewListener<E> + 'static) -> Self {
        self.set_listener(listener);
        self
    }

    pub fn set_listener(&self, listener: impl ViewListener<E> + 'static) {
        let mut slot = self.shared.listener.lock();
        slot.current = Some(Box::new(listener));
        slot.generation += 1;
    }

    /// Detaches and returns the listener. Returns `None` from inside the
    /// listener's own callback, and the running listener is then dropped
    /// instead of reattached.
    pub fn take_listener(&self) -> Option<Box<dyn ViewListener<E>>> {
        let mut slot = self.shared.listener.lock();
        slot.generation += 1;
        slot.current.take()
    }

    pub fn has_listener(&self) -> bool {
        let slot = self.shared.listener.lock();
        slot.current.is_some() || slot.running
    }

    /// Adds entities, skipping ids that are already members, and notifies
    /// the listener with exactly the newly added ones. Returns how many
    /// were added.
    pub fn add(&self, items: impl IntoIterator<Item = EntityRef<E>>) -> usize {
        let added = self.shared.state.lock().insert_batch(items);
        if !added.is_empty() {
            self.notify(Event::Added, &added);
        }
        added.len()
    }

    /// Forwards a content change to the listener. Membership is untouched.
    pub fn modify(&self, items: &[EntityRef<E>]) {
        if !items.is_empty() {
            self.notify(Event::Modified, items);
        }
    }

    /// Removes the given entities (matched by id) and notifies the listener
    /// with the instances that were actually members. Returns how many were
    /// removed.
    pub fn remove(&self, items: &[EntityRef<E>]) -> usize {
        self.remove_ids(items.iter().map(EntityRef::id))
    }

    /// Id-keyed form of [`remove`](Self::remove).
    pub fn remove_ids(&self, ids: impl IntoIterator<Item = EntityId>) -> usize {
        let removed = self.shared.state.lock().remove_ids(ids);
        if !removed.is_empty() {
            self.notify(Event::Removed, &removed);
        }
        removed.len()
    }

    /// Replaces the predicate with `Predicate::Explicit`, freezing current
    /// membership. Members still receive modify notifications.
    pub fn become_explicit(&self) {
        let mut state = self.shared.state.lock();
        if !state.predicate.is_explicit() {
            state.predicate = Predicate::Explicit;
        }
    }

    /// Empties the view without notifying. Refused, with a warning, while
    /// the view is bound to a query.
    pub fn clear(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.predicate.is_query() {
            warn!(kind = E::KIND, "refusing to clear a query-bound view");
            return false;
        }
        state.items.clear();
        state.by_id.clear();
        if let Some(index) = state.by_unique.as_mut() {
            index.clear();
        }
        true
    }

    /// Marks the initial query load as finished and tells the listener.
    pub fn query_completed(&self) {
        self.shared.state.lock().query_completed = true;
        self.notify(Event::QueryCompleted, &[]);
    }

    pub fn is_query_completed(&self) -> bool {
        self.shared.state.lock().query_completed
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().items.is_empty()
    }

    /// Snapshot of the members in display order.
    pub fn items(&self) -> Vec<EntityRef<E>> {
        self.shared.state.lock().items.clone()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.shared
            .state
            .lock()
            .items
            .iter()
            .map(EntityRef::id)
            .collect()
    }

    pub fn get(&self, id: EntityId) -> Option<EntityRef<E>> {
        self.shared.state.lock().by_id.get(&id).cloned()
    }

    /// Always `None` for kinds without a unique value.
    pub fn get_by_unique_value(&self, value: &str) -> Option<EntityRef<E>> {
        self.shared
            .state
            .lock()
            .by_unique
            .as_ref()
            .and_then(|index| index.get(value).cloned())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.shared.state.lock().by_id.contains_key(&id)
    }

    pub fn is_frozen(&self) -> bool {
        self.shared.state.lock().predicate.is_frozen()
    }

    pub fn is_explicit(&self) -> bool {
        self.shared.state.lock().predicate.is_explicit()
    }

    /// Callbacks that returned an error or panicked since the view was built.
    pub fn listener_failures(&self) -> u64 {
        self.shared.listener_failures.load(Ordering::Relaxed)
    }

    /// `true` when both handles own the same view.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.shared, &b.shared)
    }

    /// Verifies that `items` and both indices describe the same members.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let state = self.shared.state.lock();
        if state.items.len() != state.by_id.len() {
            return Err(InvariantError::new(format!(
                "view holds {} items but its id index holds {}",
                state.items.len(),
                state.by_id.len()
            )));
        }
        let mut seen = FxHashSet::default();
        for entity in &state.items {
            let id = entity.id();
            if !seen.insert(id) {
                return Err(InvariantError::new(format!("id {id} appears twice in items")));
            }
            match state.by_id.get(&id) {
                Some(indexed) if EntityRef::ptr_eq(indexed, entity) => {}
                _ => {
                    return Err(InvariantError::new(format!(
                        "id index does not point at the member instance for id {id}"
                    )));
                }
            }
            if let (Some(index), Some(value)) = (state.by_unique.as_ref(), entity.unique_value()) {
                match index.get(value) {
                    Some(indexed) if EntityRef::ptr_eq(indexed, entity) => {}
                    _ => {
                        return Err(InvariantError::new(format!(
                            "unique value index is missing member {id}"
                        )));
                    }
                }
            }
        }
        if let Some(index) = state.by_unique.as_ref() {
            if index.len() > state.items.len() {
                return Err(InvariantError::new("unique value index holds stale entries"));
            }
        }
        Ok(())
    }

    // -- manager hooks ------------------------------------------------------

    pub(crate) fn downgrade(&self) -> Weak<ViewShared<E>> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn from_shared(shared: Arc<ViewShared<E>>) -> Self {
        Self { shared }
    }

    /// Entities of a fresh batch that satisfy the predicate.
    pub(crate) fn matching(&self, items: &[EntityRef<E>]) -> Vec<EntityRef<E>> {
        let state = self.shared.state.lock();
        items
            .iter()
            .filter(|entity| state.matches(entity))
            .cloned()
            .collect()
    }

    /// Splits a modified batch against current membership and predicate.
    pub(crate) fn partition_modified(&self, items: &[EntityRef<E>]) -> ModifiedPartition<E> {
        let state = self.shared.state.lock();
        let frozen = state.predicate.is_frozen();
        let mut partition = ModifiedPartition {
            added: Vec::new(),
            modified: Vec::new(),
            removed: Vec::new(),
        };
        for entity in items {
            let member = state.by_id.get(&entity.id());
            let matches = state.predicate.test(&entity.read(), member.is_some());
            match (member, matches) {
                (Some(_), true) => partition.modified.push(entity.clone()),
                (Some(current), false) if !frozen => partition.removed.push(current.clone()),
                (Some(_), false) => {}
                (None, true) => partition.added.push(entity.clone()),
                (None, false) => {}
            }
        }
        partition
    }

    /// Delivers a partition as at most one callback per bucket.
    pub(crate) fn apply_partition(&self, partition: ModifiedPartition<E>) {
        if !partition.added.is_empty() {
            self.add(partition.added);
        }
        if !partition.modified.is_empty() {
            self.modify(&partition.modified);
        }
        if !partition.removed.is_empty() {
            self.remove(&partition.removed);
        }
    }

    /// Members whose entity satisfies `filter`.
    pub(crate) fn members_where(&self, filter: &dyn Fn(&E) -> bool) -> Vec<EntityId> {
        self.shared
            .state
            .lock()
            .items
            .iter()
            .filter(|entity| filter(&entity.read()))
            .map(EntityRef::id)
            .collect()
    }

    fn notify(&self, event: Event, items: &[EntityRef<E>]) {
        let (mut listener, generation) = {
            let mut slot = self.shared.listener.lock();
            if slot.running {
                trace!(
                    kind = E::KIND,
                    callback = event.callback(),
                    batch = items.len(),
                    "queued notification raised inside a running listener"
                );
                slot.pending.push_back((event, items.to_vec()));
                return;
            }
            let Some(listener) = slot.current.take() else {
                return;
            };
            slot.running = true;
            (listener, slot.generation)
        };

        self.deliver(listener.as_mut(), event, items);

        loop {
            let (event, items) = {
                let mut slot = self.shared.listener.lock();
                if slot.generation != generation {
                    // listener replaced or taken mid-callback; the old one is dropped
                    slot.running = false;
                    let rest: Vec<_> = slot.pending.drain(..).collect();
                    drop(slot);
                    for (event, items) in rest {
                        self.notify(event, &items);
                    }
                    return;
                }
                match slot.pending.pop_front() {
                    Some(next) => next,
                    None => {
                        slot.running = false;
                        slot.current = Some(listener);
                        return;
                    }
                }
            };
            self.deliver(listener.as_mut(), event, &items);
        }
    }

    fn deliver(&self, listener: &mut dyn ViewListener<E>, event: Event, items: &[EntityRef<E>]) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match event {
            Event::Added => listener.on_items_added(items, self),
            Event::Modified => listener.on_items_modified(items, self),
            Event::Removed => listener.on_items_removed(items, self),
            Event::QueryCompleted => listener.on_query_completed(self),
        }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.shared.listener_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    kind = E::KIND,
                    callback = event.callback(),
                    batch = items.len(),
                    error = %err,
                    "view listener failed"
                );
            }
            Err(payload) => {
                self.shared.listener_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    kind = E::KIND,
                    callback = event.callback(),
                    batch = items.len(),
                    panic = panic_message(payload.as_ref()),
                    "view listener panicked"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

impl<E: Entity> Clone for View<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Entity> fmt::Debug for View<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("View")
            .field("kind", &E::KIND)
            .field("len", &state.items.len())
            .field("predicate", &state.predicate)
            .finish_non_exhaustive()
    }
}
