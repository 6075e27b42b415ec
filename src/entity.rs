//! Entity ids and the shared canonical handle.
//!
//! ## Architecture
//!
//! ```text
//!   View A ──┐
//!   View B ──┼──► EntityRef<E> ──► Arc<EntityCell<E>>
//!   Cache  ──┘                      ├── id            (fixed)
//!                                   ├── unique value  (fixed, optional)
//!                                   ├── dirty flag    (AtomicBool)
//!                                   └── RwLock<E>     (entity fields)
//! ```
//!
//! Every holder of the same logical record holds a clone of the same
//! `EntityRef`, so a mutation through one holder is visible to all of them.
//! The dirty flag lives on the cell rather than on the entity type, which
//! keeps cache bookkeeping out of the data model.
//!
//! ## Example Usage
//!
//! ```
//! use viewkit::entity::{EntityId, EntityRef};
//! use viewkit::traits::Entity;
//!
//! struct Contact {
//!     id: u64,
//!     name: String,
//! }
//!
//! impl Entity for Contact {
//!     const KIND: &'static str = "contact";
//!     fn id(&self) -> EntityId {
//!         EntityId::new(self.id)
//!     }
//! }
//!
//! let contact = EntityRef::new(Contact { id: 1, name: "Ann".into() });
//! let alias = contact.clone();
//!
//! contact.update(|c| c.name.push_str(" Lee"));
//! assert_eq!(alias.read().name, "Ann Lee");
//! assert!(alias.is_dirty());
//! assert!(EntityRef::ptr_eq(&contact, &alias));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::Entity;

/// Store-assigned id, unique per entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u64);

impl EntityId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct EntityCell<E> {
    id: EntityId,
    unique_value: Option<Box<str>>,
    dirty: AtomicBool,
    value: RwLock<E>,
}

/// Shared, interior-mutable handle to one in-memory instance of a record.
pub struct EntityRef<E> {
    cell: Arc<EntityCell<E>>,
}

impl<E: Entity> EntityRef<E> {
    /// Wraps a freshly materialized entity. The id and unique value are
    /// captured here and never re-read.
    pub fn new(entity: E) -> Self {
        let id = entity.id();
        let unique_value = if E::USES_UNIQUE_VALUE {
            entity.unique_value().map(Box::from)
        } else {
            None
        };
        Self {
            cell: Arc::new(EntityCell {
                id,
                unique_value,
                dirty: AtomicBool::new(false),
                value: RwLock::new(entity),
            }),
        }
    }
}

impl<E> EntityRef<E> {
    #[inline]
    pub fn id(&self) -> EntityId {
        self.cell.id
    }

    #[inline]
    pub fn unique_value(&self) -> Option<&str> {
        self.cell.unique_value.as_deref()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, E> {
        self.cell.value.read()
    }

    /// Write access that does not touch the dirty flag; use
    /// [`update`](Self::update) for changes that must reach the store.
    pub fn write(&self) -> RwLockWriteGuard<'_, E> {
        self.cell.value.write()
    }

    /// Mutates the entity in place and marks it dirty.
    pub fn update<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        let out = f(&mut self.cell.value.write());
        self.mark_dirty();
        out
    }

    #[inline]
    pub fn mark_dirty(&self) {
        self.cell.dirty.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.cell.dirty.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn clear_dirty(&self) {
        self.cell.dirty.store(false, Ordering::Release);
    }

    /// `true` when both handles name the same in-memory instance.
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.cell, &b.cell)
    }

    /// Number of live handles to this instance.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.cell)
    }
}

impl<E> Clone for EntityRef<E> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<E> fmt::Debug for EntityRef<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef")
            .field("id", &self.cell.id)
            .field("unique_value", &self.cell.unique_value)
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}
