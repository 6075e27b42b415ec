//! # Trait Seams
//!
//! The engine talks to its collaborators through four small traits:
//!
//! ```text
//!   ┌──────────────────────┐     ┌───────────────────────────┐
//!   │ Entity               │     │ EntityQuery<E>            │
//!   │  KIND                │     │  test(&E) → bool          │
//!   │  USES_UNIQUE_VALUE   │     │  frozen() → bool          │
//!   │  id() → EntityId     │     └───────────────────────────┘
//!   │  unique_value()      │
//!   └──────────────────────┘     ┌───────────────────────────┐
//!                                │ ViewListener<E>           │
//!   ┌──────────────────────┐     │  on_items_added           │
//!   │ WriteBack<E>         │     │  on_items_modified        │
//!   │  write_back(&E)      │     │  on_items_removed         │
//!   └──────────────────────┘     │  on_query_completed       │
//!                                └───────────────────────────┘
//! ```
//!
//! | Trait            | Implemented by          | Consumed by                    |
//! |------------------|-------------------------|--------------------------------|
//! | `Entity`         | the data model          | views, cache, manager          |
//! | `EntityQuery`    | the query layer         | `Predicate::Query`             |
//! | `ViewListener`   | UI / indexers           | `View` notifications           |
//! | `WriteBack`      | the persistence layer   | `LruCache` eviction and commit |
//!
//! Closures implement `EntityQuery` (`Fn(&E) -> bool`) and `WriteBack`
//! (`Fn(&E) -> Result<(), WriteBackError>`), so most callers never write an
//! impl block for them.

use crate::entity::{EntityId, EntityRef};
use crate::error::{ListenerError, WriteBackError};
use crate::view::View;

/// A record owned by the backing store.
///
/// The engine only looks at the id and, for kinds that declare one, the
/// unique value. Both must stay fixed for the lifetime of the record.
///
/// ```
/// use viewkit::entity::EntityId;
/// use viewkit::traits::Entity;
///
/// struct Identity {
///     id: u64,
///     address: String,
/// }
///
/// impl Entity for Identity {
///     const KIND: &'static str = "identity";
///     const USES_UNIQUE_VALUE: bool = true;
///
///     fn id(&self) -> EntityId {
///         EntityId::new(self.id)
///     }
///
///     fn unique_value(&self) -> Option<&str> {
///         Some(&self.address)
///     }
/// }
/// ```
pub trait Entity: Send + Sync + 'static {
    /// Kind name used in log fields and metric labels.
    const KIND: &'static str;

    /// Whether views and caches of this kind keep a unique-value index.
    const USES_UNIQUE_VALUE: bool = false;

    fn id(&self) -> EntityId;

    fn unique_value(&self) -> Option<&str> {
        None
    }
}

/// Membership test for a query-bound view.
pub trait EntityQuery<E>: Send + Sync {
    fn test(&self, entity: &E) -> bool;

    /// A frozen query's view never loses members through automatic
    /// re-evaluation.
    fn frozen(&self) -> bool {
        false
    }
}

impl<E, F> EntityQuery<E> for F
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn test(&self, entity: &E) -> bool {
        self(entity)
    }
}

/// Result type of every listener callback.
pub type ListenerResult = Result<(), ListenerError>;

/// Receives membership and content changes of one view.
///
/// Batches are never empty. Errors and panics raised by a callback are
/// logged and swallowed by the view; they never reach the manager.
pub trait ViewListener<E: Entity>: Send {
    fn on_items_added(&mut self, items: &[EntityRef<E>], view: &View<E>) -> ListenerResult;

    fn on_items_modified(&mut self, items: &[EntityRef<E>], view: &View<E>) -> ListenerResult;

    fn on_items_removed(&mut self, items: &[EntityRef<E>], view: &View<E>) -> ListenerResult;

    /// Fired once by [`View::query_completed`].
    fn on_query_completed(&mut self, _view: &View<E>) -> ListenerResult {
        Ok(())
    }
}

/// Persists an entity's current field values, keyed by its id.
///
/// Called synchronously by the cache when a dirty entity is evicted or
/// committed. Returning `Ok` means the write is durably queued; the cache
/// then clears the entity's dirty flag.
pub trait WriteBack<E>: Send + Sync {
    fn write_back(&self, entity: &E) -> Result<(), WriteBackError>;
}

impl<E, F> WriteBack<E> for F
where
    F: Fn(&E) -> Result<(), WriteBackError> + Send + Sync,
{
    fn write_back(&self, entity: &E) -> Result<(), WriteBackError> {
        self(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Note {
        id: u64,
        pinned: bool,
    }

    impl Entity for Note {
        const KIND: &'static str = "note";

        fn id(&self) -> EntityId {
            EntityId::new(self.id)
        }
    }

    #[test]
    fn entity_defaults_have_no_unique_value() {
        let note = Note { id: 4, pinned: false };
        assert!(!Note::USES_UNIQUE_VALUE);
        assert_eq!(note.unique_value(), None);
        assert_eq!(note.id(), EntityId::new(4));
    }

    #[test]
    fn closures_are_unfrozen_queries() {
        let pinned = |note: &Note| note.pinned;
        assert!(pinned.test(&Note { id: 1, pinned: true }));
        assert!(!pinned.test(&Note { id: 2, pinned: false }));
        assert!(!EntityQuery::<Note>::frozen(&pinned));
    }

    #[test]
    fn closures_are_write_back_hooks() {
        let hook = |note: &Note| {
            if note.id == 0 {
                Err(WriteBackError::new("id 0 is reserved"))
            } else {
                Ok(())
            }
        };
        assert!(hook.write_back(&Note { id: 3, pinned: false }).is_ok());
        assert!(hook.write_back(&Note { id: 0, pinned: false }).is_err());
    }
}
