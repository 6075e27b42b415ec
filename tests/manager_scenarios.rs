// ==============================================
// MANAGER SCENARIO TESTS (integration)
// ==============================================
//
// End-to-end flows through the public API: a store layer feeding loads and
// mutations into the manager while views and caches track them.

mod common;

use std::sync::Arc;

use parking_lot::Mutex;
use viewkit::builder::ManagerBuilder;
use viewkit::entity::{EntityId, EntityRef};
use viewkit::error::WriteBackError;
use viewkit::manager::CollectionManager;
use viewkit::predicate::Predicate;
use viewkit::view::View;

use common::{Faulty, Identity, Message, Recorder, Seen, identity, message};

fn ids(raw: impl IntoIterator<Item = u64>) -> Vec<EntityId> {
    raw.into_iter().map(EntityId::new).collect()
}

fn written_log() -> (
    Arc<Mutex<Vec<(u64, String)>>>,
    impl Fn(&Message) -> Result<(), WriteBackError> + Send + Sync + 'static,
) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let hook = move |m: &Message| -> Result<(), WriteBackError> {
        sink.lock().push((m.id, m.subject.clone()));
        Ok(())
    };
    (log, hook)
}

// ==============================================
// Cache Bound and Write-back
// ==============================================

mod eviction {
    use super::*;

    #[test]
    fn forty_loads_keep_the_newest_thirty_two_and_flush_the_dirty_one() {
        let (written, hook) = written_log();
        let mut manager = ManagerBuilder::new()
            .cache_with_write_back::<Message>(32, hook)
            .build();

        let first: Vec<_> = (1..=10).map(|id| message(id, 1)).collect();
        manager.items_loaded(&first);
        first[4].update(|m| m.subject = "x".to_string());
        assert!(first[4].is_dirty());

        let rest: Vec<_> = (11..=40).map(|id| message(id, 1)).collect();
        manager.items_loaded(&rest);

        let cache = manager.cache::<Message>().unwrap();
        assert_eq!(cache.len(), 32);
        assert_eq!(cache.recency_order(), ids(9..=40));
        assert!((1..=8).all(|id| !cache.contains(EntityId::new(id))));
        cache.check_invariants().unwrap();

        assert_eq!(*written.lock(), vec![(5, "x".to_string())]);
        assert!(!first[4].is_dirty());
    }

    #[test]
    fn capacity_below_floor_is_raised() {
        let mut manager = CollectionManager::new();
        manager.define_cache::<Message>(4);
        assert_eq!(manager.cache::<Message>().unwrap().capacity(), 32);
    }

    #[test]
    fn commit_dirty_all_flushes_without_evicting() {
        let (written, hook) = written_log();
        let mut manager = CollectionManager::new();
        manager.define_cache_with_write_back::<Message>(32, hook);

        let loaded: Vec<_> = (1..=3).map(|id| message(id, 1)).collect();
        manager.items_loaded(&loaded);
        loaded[0].mark_dirty();
        loaded[2].mark_dirty();

        let report = manager.commit_dirty_all();
        assert_eq!(report.flushed, 2);
        assert!(report.is_clean());
        assert_eq!(manager.cache::<Message>().unwrap().len(), 3);

        let flushed: Vec<u64> = written.lock().iter().map(|(id, _)| *id).collect();
        assert_eq!(flushed.len(), 2);
        assert!(flushed.contains(&1) && flushed.contains(&3));

        assert_eq!(manager.commit_dirty_all().flushed, 0);
    }

    #[test]
    fn deleted_entities_are_never_written_back() {
        let (written, hook) = written_log();
        let mut manager = CollectionManager::new();
        manager.define_cache_with_write_back::<Message>(32, hook);

        let doomed = message(1, 1);
        manager.item_loaded(doomed.clone());
        doomed.mark_dirty();
        manager.items_deleted::<Message>(&[EntityId::new(1)]);

        assert!(manager.cache::<Message>().unwrap().is_empty());
        assert_eq!(manager.commit_dirty_all().flushed, 0);
        assert!(written.lock().is_empty());
    }
}

// ==============================================
// Listener Fan-out
// ==============================================

mod fan_out {
    use super::*;

    #[test]
    fn a_failing_listener_does_not_starve_its_peers() {
        let mut manager = CollectionManager::new();
        let recorder = Recorder::default();

        let faulty = View::<Message>::new(Predicate::Wildcard).with_listener(Faulty::default());
        let healthy = View::<Message>::new(Predicate::Wildcard).with_listener(recorder.clone());
        manager.register_view(&faulty);
        manager.register_view(&healthy);

        let batch: Vec<_> = (1..=3).map(|id| message(id, 1)).collect();
        manager.items_added(&batch);
        assert_eq!(faulty.len(), 3);
        assert_eq!(healthy.len(), 3);
        assert_eq!(faulty.listener_failures(), 1);

        manager.items_modified(&batch[..1]);
        assert_eq!(faulty.listener_failures(), 2);

        manager.items_deleted::<Message>(&ids([2]));
        assert_eq!(faulty.listener_failures(), 3);
        assert_eq!(faulty.ids(), ids([1, 3]));

        assert_eq!(
            recorder.events(),
            vec![
                Seen::Added(vec![1, 2, 3]),
                Seen::Modified(vec![1]),
                Seen::Removed(vec![2]),
            ]
        );
        assert!(faulty.has_listener());
    }

    #[test]
    fn query_views_follow_predicate_changes() {
        let mut manager = CollectionManager::new();
        let recorder = Recorder::default();
        let inbox = View::<Message>::new(Predicate::query(|m: &Message| m.folder == 1))
            .with_listener(recorder.clone());
        manager.register_view(&inbox);

        let a = message(1, 1);
        let b = message(2, 2);
        manager.items_added(&[a.clone(), b.clone()]);
        assert_eq!(inbox.ids(), ids([1]));

        a.update(|m| m.folder = 2);
        b.update(|m| m.folder = 1);
        manager.items_modified(&[a.clone(), b.clone()]);
        assert_eq!(inbox.ids(), ids([2]));

        b.update(|m| m.subject = "renamed".to_string());
        manager.items_modified(&[b.clone()]);

        assert_eq!(
            recorder.events(),
            vec![
                Seen::Added(vec![1]),
                Seen::Added(vec![2]),
                Seen::Removed(vec![1]),
                Seen::Modified(vec![2]),
            ]
        );
        inbox.check_invariants().unwrap();
    }

    #[test]
    fn items_loaded_does_not_touch_views() {
        let mut manager = CollectionManager::new();
        manager.define_cache::<Message>(32);
        let recorder = Recorder::default();
        let all = View::<Message>::new(Predicate::Wildcard).with_listener(recorder.clone());
        manager.register_view(&all);

        manager.items_loaded(&[message(1, 1)]);
        assert!(all.is_empty());
        assert!(recorder.events().is_empty());
        assert_eq!(manager.cache::<Message>().unwrap().len(), 1);
    }

    #[test]
    fn deleting_by_filter_reaches_cache_and_live_views() {
        let mut manager = CollectionManager::new();
        manager.define_cache::<Message>(32);
        let all = View::<Message>::new(Predicate::Wildcard);
        manager.register_view(&all);

        let batch: Vec<_> = (1..=6).map(|id| message(id, id % 2)).collect();
        manager.items_added(&batch);
        manager.items_deleted_by(|m: &Message| m.folder == 0);

        assert_eq!(all.ids(), ids([1, 3, 5]));
        let cache = manager.cache::<Message>().unwrap();
        assert_eq!(cache.recency_order(), ids([1, 3, 5]));
    }
}

// ==============================================
// Lookups and Identity
// ==============================================

mod identity_map {
    use super::*;

    #[test]
    fn view_resident_hits_are_promoted_on_request() {
        let mut manager = CollectionManager::new();
        manager.define_cache::<Message>(32);
        manager.items_loaded(&[message(100, 2), message(101, 2)]);
        let held = message(7, 1);
        let inbox = View::with_items(
            Predicate::query(|m: &Message| m.folder == 1),
            [held.clone()],
        );
        manager.register_view(&inbox);

        let peeked = manager.lookup_by_id::<Message>(EntityId::new(7), false).unwrap();
        assert!(EntityRef::ptr_eq(&peeked, &held));
        assert!(!manager.cache::<Message>().unwrap().contains(EntityId::new(7)));

        let promoted = manager.lookup_by_id::<Message>(EntityId::new(7), true).unwrap();
        assert!(EntityRef::ptr_eq(&promoted, &held));
        assert_eq!(manager.cache::<Message>().unwrap().recency_order(), ids([100, 101, 7]));

        manager.items_loaded(&[message(102, 2)]);
        assert_eq!(
            manager.cache::<Message>().unwrap().newest().map(|m| m.id()),
            Some(EntityId::new(102))
        );

        // second lookup is served by the cache and bumps 7 to the newest end
        let hit = manager.lookup_by_id::<Message>(EntityId::new(7), false).unwrap();
        assert!(EntityRef::ptr_eq(&hit, &promoted));
        assert_eq!(
            manager.cache::<Message>().unwrap().recency_order(),
            ids([100, 101, 102, 7])
        );

        assert!(manager.lookup_by_id::<Message>(EntityId::new(99), true).is_none());
    }

    #[test]
    fn batch_lookup_reports_what_is_missing() {
        let mut manager = CollectionManager::new();
        manager.define_cache::<Message>(32);
        manager.items_loaded(&[message(1, 1)]);
        let view = View::with_items(Predicate::Null, [message(2, 1)]);
        manager.register_view(&view);

        let result = manager.lookup_many_by_ids::<Message>(ids([1, 2, 3]), true);
        assert_eq!(result.found.len(), 2);
        assert!(result.not_found.contains(&EntityId::new(3)));
        assert!(!result.is_complete());
        assert!(manager.cache::<Message>().unwrap().contains(EntityId::new(2)));
    }

    #[test]
    fn reloaded_records_collapse_onto_the_resident_instance() {
        let mut manager = CollectionManager::new();
        manager.define_cache::<Message>(32);
        let canonical = message(1, 1);
        manager.item_loaded(canonical.clone());

        let mut fresh = vec![message(1, 1), message(2, 1), message(2, 1)];
        manager.unify_instances(&mut fresh, true);

        assert!(EntityRef::ptr_eq(&fresh[0], &canonical));
        assert!(EntityRef::ptr_eq(&fresh[1], &fresh[2]));
        let cached = manager.lookup_by_id::<Message>(EntityId::new(2), false).unwrap();
        assert!(EntityRef::ptr_eq(&cached, &fresh[1]));

        let again = manager.unify_one(message(2, 1));
        assert!(EntityRef::ptr_eq(&again, &fresh[1]));
    }

    #[test]
    fn updates_through_one_holder_are_seen_by_all() {
        let mut manager = CollectionManager::new();
        manager.define_cache::<Message>(32);
        let view = View::<Message>::new(Predicate::Wildcard);
        manager.register_view(&view);
        manager.items_added(&[message(1, 1)]);

        let via_cache = manager.lookup_by_id::<Message>(EntityId::new(1), false).unwrap();
        via_cache.update(|m| m.starred = true);
        assert!(view.get(EntityId::new(1)).unwrap().read().starred);
    }

    #[test]
    fn unique_value_lookups_use_the_unique_index() {
        let mut manager = CollectionManager::new();
        manager.define_cache::<Identity>(32);
        let ann = identity(1, "ann@example.com");
        let view = View::with_items(Predicate::Null, [ann.clone()]);
        manager.register_view(&view);

        let found = manager
            .lookup_by_unique_value::<Identity>("ann@example.com", true)
            .unwrap();
        assert!(EntityRef::ptr_eq(&found, &ann));
        assert!(manager.cache::<Identity>().unwrap().contains(EntityId::new(1)));
        assert!(
            manager
                .lookup_by_unique_value::<Identity>("bob@example.com", true)
                .is_none()
        );
        assert!(
            manager
                .lookup_by_unique_value::<Message>("anything", true)
                .is_none()
        );
    }
}

// ==============================================
// Frozen Views and Registry Lifetime
// ==============================================

mod lifetime {
    use super::*;

    #[test]
    fn frozen_views_never_shrink_automatically() {
        let mut manager = CollectionManager::new();
        let starred = message(1, 1);
        starred.update(|m| m.starred = true);
        let snapshot = View::with_items(
            Predicate::frozen_query(|m: &Message| m.starred),
            [starred.clone()],
        );
        let recorder = Recorder::default();
        snapshot.set_listener(recorder.clone());
        manager.register_view(&snapshot);

        starred.update(|m| m.starred = false);
        manager.items_modified(&[starred.clone()]);
        manager.items_deleted::<Message>(&ids([1]));
        manager.items_deleted_by(|_: &Message| true);
        assert_eq!(snapshot.ids(), ids([1]));
        assert!(recorder.events().is_empty());

        assert_eq!(snapshot.remove(&[starred]), 1);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn explicit_views_keep_hearing_about_members() {
        let mut manager = CollectionManager::new();
        let recorder = Recorder::default();
        let picked = View::<Message>::new(Predicate::query(|m: &Message| m.folder == 1))
            .with_listener(recorder.clone());
        manager.register_view(&picked);

        let member = message(1, 1);
        manager.items_added(&[member.clone()]);
        picked.become_explicit();

        member.update(|m| m.folder = 9);
        manager.items_modified(&[member.clone()]);
        manager.items_added(&[message(2, 1)]);

        assert_eq!(picked.ids(), ids([1]));
        assert_eq!(
            recorder.events(),
            vec![Seen::Added(vec![1]), Seen::Modified(vec![1])]
        );
    }

    #[test]
    fn dropped_views_stop_receiving_and_are_swept() {
        let mut manager = CollectionManager::new();
        let keep = View::<Message>::new(Predicate::Wildcard);
        let gone = View::<Message>::new(Predicate::Wildcard);
        manager.register_view(&keep);
        let key = manager.register_view(&gone);
        drop(gone);

        manager.items_added(&[message(1, 1)]);
        assert_eq!(keep.len(), 1);
        assert_eq!(manager.views::<Message>().len(), 1);

        assert_eq!(manager.sweep(), 1);
        assert!(!manager.unregister_view(key));
        assert_eq!(manager.sweep(), 0);
    }

    #[test]
    fn unregistered_views_are_left_alone() {
        let mut manager = CollectionManager::new();
        let view = View::<Message>::new(Predicate::Wildcard);
        let key = manager.register_view(&view);
        assert_eq!(manager.register_view(&view), key);

        assert!(manager.unregister_view(key));
        manager.items_added(&[message(1, 1)]);
        assert!(view.is_empty());
    }
}
