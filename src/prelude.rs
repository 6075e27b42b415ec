pub use crate::builder::ManagerBuilder;
pub use crate::cache::{CommitReport, LruCache, MIN_CACHE_CAPACITY};
pub use crate::entity::{EntityId, EntityRef};
pub use crate::error::{ConfigError, InvariantError, ListenerError, WriteBackError};
#[cfg(feature = "concurrency")]
pub use crate::manager::ConcurrentCollectionManager;
pub use crate::manager::{CollectionManager, LookupMany, ViewKey};
#[cfg(feature = "metrics")]
pub use crate::metrics::snapshot::{CacheMetricsSnapshot, ManagerMetricsSnapshot};
pub use crate::predicate::Predicate;
pub use crate::traits::{Entity, EntityQuery, ListenerResult, ViewListener, WriteBack};
pub use crate::view::View;
