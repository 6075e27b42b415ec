//! View membership predicates.
//!
//! | Variant    | `test(entity)`                 | Frozen | Typical use                       |
//! |------------|--------------------------------|--------|-----------------------------------|
//! | `Query`    | user query                     | query  | live query result                 |
//! | `Explicit` | entity's id is already a member| yes    | owned result set after a query    |
//! | `Null`     | never                          | yes    | hand-filled set, no auto-adds     |
//! | `Wildcard` | always                         | no     | "every entity of this kind"       |
//!
//! A frozen predicate's view is never shrunk by automatic re-evaluation;
//! only explicit `remove`/`clear` calls reduce it.

use std::fmt;

use crate::traits::{Entity, EntityQuery};

/// Decides which entities of a kind belong to a view.
pub enum Predicate<E> {
    Query(Box<dyn EntityQuery<E>>),
    Explicit,
    Null,
    Wildcard,
}

impl<E: Entity> Predicate<E> {
    /// Live query predicate from any [`EntityQuery`] (closures included).
    pub fn query(query: impl EntityQuery<E> + 'static) -> Self {
        Predicate::Query(Box::new(query))
    }

    /// Query predicate whose view keeps members that stop matching.
    pub fn frozen_query(test: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        Predicate::Query(Box::new(Frozen(test)))
    }

    pub fn is_frozen(&self) -> bool {
        match self {
            Predicate::Query(query) => query.frozen(),
            Predicate::Explicit | Predicate::Null => true,
            Predicate::Wildcard => false,
        }
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, Predicate::Explicit)
    }

    /// `true` for predicates whose membership tracks a query; such views
    /// refuse `clear`.
    pub fn is_query(&self) -> bool {
        matches!(self, Predicate::Query(_))
    }

    /// Evaluates the predicate. `is_member` reports whether the entity's id
    /// is already in the view; only `Explicit` consults it.
    pub(crate) fn test(&self, entity: &E, is_member: bool) -> bool {
        match self {
            Predicate::Query(query) => query.test(entity),
            Predicate::Explicit => is_member,
            Predicate::Null => false,
            Predicate::Wildcard => true,
        }
    }
}

impl<E> fmt::Debug for Predicate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Query(_) => f.write_str("Query"),
            Predicate::Explicit => f.write_str("Explicit"),
            Predicate::Null => f.write_str("Null"),
            Predicate::Wildcard => f.write_str("Wildcard"),
        }
    }
}

struct Frozen<F>(F);

impl<E, F> EntityQuery<E> for Frozen<F>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn test(&self, entity: &E) -> bool {
        (self.0)(entity)
    }

    fn frozen(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;

    struct Folder {
        id: u64,
        unread: u32,
    }

    impl Entity for Folder {
        const KIND: &'static str = "folder";

        fn id(&self) -> EntityId {
            EntityId::new(self.id)
        }
    }

    fn folder(unread: u32) -> Folder {
        Folder { id: 1, unread }
    }

    #[test]
    fn query_predicate_delegates_and_is_not_frozen() {
        let p: Predicate<Folder> = Predicate::query(|f: &Folder| f.unread > 0);
        assert!(p.test(&folder(3), false));
        assert!(!p.test(&folder(0), true));
        assert!(!p.is_frozen());
        assert!(p.is_query());
    }

    #[test]
    fn frozen_query_reports_frozen() {
        let p: Predicate<Folder> = Predicate::frozen_query(|f: &Folder| f.unread > 0);
        assert!(p.is_frozen());
        assert!(p.test(&folder(1), false));
    }

    #[test]
    fn explicit_matches_only_members() {
        let p: Predicate<Folder> = Predicate::Explicit;
        assert!(p.test(&folder(0), true));
        assert!(!p.test(&folder(9), false));
        assert!(p.is_frozen());
        assert!(p.is_explicit());
        assert!(!p.is_query());
    }

    #[test]
    fn null_and_wildcard() {
        let null: Predicate<Folder> = Predicate::Null;
        let all: Predicate<Folder> = Predicate::Wildcard;
        assert!(!null.test(&folder(1), true));
        assert!(null.is_frozen());
        assert!(all.test(&folder(0), false));
        assert!(!all.is_frozen());
        assert_eq!(format!("{all:?}"), "Wildcard");
    }
}
