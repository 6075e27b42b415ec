//! viewkit: object identity cache and live-view synchronization for record
//! stores.
//!
//! Keeps one in-memory instance per stored record, bounded per kind by an
//! LRU cache with write-back of dirty entities on eviction, and keeps live
//! views (query results, hand-built sets) in step with store mutations.
//!
//! ```text
//!   store events ──► CollectionManager ──► LruCache<E>   (one per kind)
//!                          │
//!                          └────────────► View<E> ...     (weakly held)
//!                                           └─► ViewListener<E>
//! ```
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod builder;
pub mod cache;
pub mod ds;
pub mod entity;
pub mod error;
pub mod manager;
pub mod predicate;
pub mod traits;
pub mod view;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod prelude;

pub use crate::builder::ManagerBuilder;
pub use crate::cache::LruCache;
pub use crate::entity::{EntityId, EntityRef};
pub use crate::manager::CollectionManager;
#[cfg(feature = "concurrency")]
pub use crate::manager::ConcurrentCollectionManager;
#[cfg(feature = "metrics")]
pub use crate::metrics::snapshot::{CacheMetricsSnapshot, ManagerMetricsSnapshot};
pub use crate::view::View;
