//! Manager construction and per-kind cache configuration.
//!
//! Collects the cache floor and the caches to define at startup, then
//! builds a ready [`CollectionManager`].
//!
//! ## Example
//!
//! ```rust
//! use viewkit::builder::ManagerBuilder;
//! use viewkit::entity::EntityId;
//! use viewkit::error::WriteBackError;
//! use viewkit::traits::Entity;
//!
//! struct Folder {
//!     id: u64,
//! }
//!
//! impl Entity for Folder {
//!     const KIND: &'static str = "folder";
//!     fn id(&self) -> EntityId {
//!         EntityId::new(self.id)
//!     }
//! }
//!
//! let manager = ManagerBuilder::new()
//!     .cache_floor(8)
//!     .cache_with_write_back::<Folder>(16, |_: &Folder| -> Result<(), WriteBackError> { Ok(()) })
//!     .try_build()
//!     .unwrap();
//! assert_eq!(manager.cache::<Folder>().map(|c| c.capacity()), Some(16));
//! ```

use crate::cache::MIN_CACHE_CAPACITY;
use crate::error::ConfigError;
#[cfg(feature = "concurrency")]
use crate::manager::ConcurrentCollectionManager;
use crate::manager::CollectionManager;
use crate::traits::{Entity, WriteBack};

type Installer = Box<dyn FnOnce(&mut CollectionManager) + Send>;

struct CacheDecl {
    kind: &'static str,
    capacity: usize,
    install: Installer,
}

/// Builder for [`CollectionManager`].
pub struct ManagerBuilder {
    cache_floor: usize,
    caches: Vec<CacheDecl>,
}

impl ManagerBuilder {
    /// Builder with the default floor of [`MIN_CACHE_CAPACITY`] and no caches.
    pub fn new() -> Self {
        Self {
            cache_floor: MIN_CACHE_CAPACITY,
            caches: Vec::new(),
        }
    }

    /// Smallest capacity any cache of the manager runs with.
    pub fn cache_floor(mut self, floor: usize) -> Self {
        self.cache_floor = floor;
        self
    }

    /// Declares the cache for kind `E`. A later declaration for the same
    /// kind replaces an earlier one.
    pub fn cache<E: Entity>(mut self, capacity: usize) -> Self {
        self.caches.push(CacheDecl {
            kind: E::KIND,
            capacity,
            install: Box::new(move |manager| {
                manager.define_cache::<E>(capacity);
            }),
        });
        self
    }

    /// Declares the cache for kind `E` with a store write-back hook.
    pub fn cache_with_write_back<E: Entity>(
        mut self,
        capacity: usize,
        hook: impl WriteBack<E> + 'static,
    ) -> Self {
        self.caches.push(CacheDecl {
            kind: E::KIND,
            capacity,
            install: Box::new(move |manager| {
                manager.define_cache_with_write_back::<E>(capacity, hook);
            }),
        });
        self
    }

    /// Builds the manager, clamping a zero floor to 1 and any capacity up
    /// to the floor.
    pub fn build(self) -> CollectionManager {
        let mut manager = CollectionManager::with_cache_floor(self.cache_floor);
        for decl in self.caches {
            (decl.install)(&mut manager);
        }
        manager
    }

    /// Builds the manager, rejecting a zero floor or a zero cache capacity.
    pub fn try_build(self) -> Result<CollectionManager, ConfigError> {
        if self.cache_floor == 0 {
            return Err(ConfigError::new("cache floor must be at least 1"));
        }
        if let Some(decl) = self.caches.iter().find(|decl| decl.capacity == 0) {
            return Err(ConfigError::new(format!(
                "cache capacity for kind `{}` must be at least 1",
                decl.kind
            )));
        }
        Ok(self.build())
    }

    #[cfg(feature = "concurrency")]
    pub fn build_concurrent(self) -> ConcurrentCollectionManager {
        ConcurrentCollectionManager::from_manager(self.build())
    }
}

impl Default for ManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityId, EntityRef};
    use crate::error::WriteBackError;

    struct Label {
        id: u64,
    }

    impl Entity for Label {
        const KIND: &'static str = "label";

        fn id(&self) -> EntityId {
            EntityId::new(self.id)
        }
    }

    struct Thread {
        id: u64,
    }

    impl Entity for Thread {
        const KIND: &'static str = "thread";

        fn id(&self) -> EntityId {
            EntityId::new(self.id)
        }
    }

    #[test]
    fn test_default_floor_and_no_caches() {
        let manager = ManagerBuilder::default().build();
        assert_eq!(manager.cache_floor(), MIN_CACHE_CAPACITY);
        assert!(manager.cache::<Label>().is_none());
    }

    #[test]
    fn test_declared_caches_are_installed() {
        let manager = ManagerBuilder::new()
            .cache_floor(4)
            .cache::<Label>(2)
            .cache_with_write_back::<Thread>(10, |_: &Thread| -> Result<(), WriteBackError> {
                Ok(())
            })
            .build();

        let labels = manager.cache::<Label>().unwrap();
        assert_eq!(labels.capacity(), 4);
        assert!(!labels.has_write_back());

        let threads = manager.cache::<Thread>().unwrap();
        assert_eq!(threads.capacity(), 10);
        assert!(threads.has_write_back());
    }

    #[test]
    fn test_later_declaration_wins() {
        let mut manager = ManagerBuilder::new()
            .cache_floor(1)
            .cache::<Label>(5)
            .cache::<Label>(7)
            .build();
        assert_eq!(manager.cache::<Label>().map(|c| c.capacity()), Some(7));

        manager.items_loaded(&[EntityRef::new(Label { id: 1 })]);
        assert_eq!(manager.cache::<Label>().map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_build_clamps_zero_floor() {
        let manager = ManagerBuilder::new().cache_floor(0).cache::<Label>(0).build();
        assert_eq!(manager.cache_floor(), 1);
        assert_eq!(manager.cache::<Label>().map(|c| c.capacity()), Some(1));
    }

    #[test]
    fn test_try_build_rejects_zero_floor() {
        let err = ManagerBuilder::new().cache_floor(0).try_build().unwrap_err();
        assert!(err.message().contains("cache floor"));
    }

    #[test]
    fn test_try_build_rejects_zero_capacity() {
        let err = ManagerBuilder::new()
            .cache::<Label>(16)
            .cache::<Thread>(0)
            .try_build()
            .unwrap_err();
        assert!(err.to_string().contains("thread"));
    }
}
