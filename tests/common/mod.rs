#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use viewkit::entity::{EntityId, EntityRef};
use viewkit::error::ListenerError;
use viewkit::traits::{Entity, ListenerResult, ViewListener};
use viewkit::view::View;

#[derive(Debug, Clone)]
pub struct Message {
    pub id: u64,
    pub folder: u64,
    pub subject: String,
    pub starred: bool,
}

impl Entity for Message {
    const KIND: &'static str = "message";

    fn id(&self) -> EntityId {
        EntityId::new(self.id)
    }
}

pub fn message(id: u64, folder: u64) -> EntityRef<Message> {
    EntityRef::new(Message {
        id,
        folder,
        subject: format!("subject {id}"),
        starred: false,
    })
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub id: u64,
    pub address: String,
}

impl Entity for Identity {
    const KIND: &'static str = "identity";
    const USES_UNIQUE_VALUE: bool = true;

    fn id(&self) -> EntityId {
        EntityId::new(self.id)
    }

    fn unique_value(&self) -> Option<&str> {
        Some(&self.address)
    }
}

pub fn identity(id: u64, address: &str) -> EntityRef<Identity> {
    EntityRef::new(Identity {
        id,
        address: address.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Added(Vec<u64>),
    Modified(Vec<u64>),
    Removed(Vec<u64>),
    QueryCompleted,
}

fn raw_ids<E: Entity>(items: &[EntityRef<E>]) -> Vec<u64> {
    items.iter().map(|item| item.id().get()).collect()
}

/// Listener that records every callback into a shared log.
#[derive(Clone, Default)]
pub struct Recorder {
    pub log: Arc<Mutex<Vec<Seen>>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Seen> {
        self.log.lock().clone()
    }
}

impl<E: Entity> ViewListener<E> for Recorder {
    fn on_items_added(&mut self, items: &[EntityRef<E>], _view: &View<E>) -> ListenerResult {
        self.log.lock().push(Seen::Added(raw_ids(items)));
        Ok(())
    }

    fn on_items_modified(&mut self, items: &[EntityRef<E>], _view: &View<E>) -> ListenerResult {
        self.log.lock().push(Seen::Modified(raw_ids(items)));
        Ok(())
    }

    fn on_items_removed(&mut self, items: &[EntityRef<E>], _view: &View<E>) -> ListenerResult {
        self.log.lock().push(Seen::Removed(raw_ids(items)));
        Ok(())
    }

    fn on_query_completed(&mut self, _view: &View<E>) -> ListenerResult {
        self.log.lock().push(Seen::QueryCompleted);
        Ok(())
    }
}

/// Listener whose every callback fails, alternating between an error
/// result and a panic.
#[derive(Default)]
pub struct Faulty {
    calls: u32,
}

impl Faulty {
    fn fail(&mut self) -> ListenerResult {
        self.calls += 1;
        if self.calls % 2 == 0 {
            panic!("listener blew up on call {}", self.calls);
        }
        Err(ListenerError::new("listener rejected batch"))
    }
}

impl<E: Entity> ViewListener<E> for Faulty {
    fn on_items_added(&mut self, _items: &[EntityRef<E>], _view: &View<E>) -> ListenerResult {
        self.fail()
    }

    fn on_items_modified(&mut self, _items: &[EntityRef<E>], _view: &View<E>) -> ListenerResult {
        self.fail()
    }

    fn on_items_removed(&mut self, _items: &[EntityRef<E>], _view: &View<E>) -> ListenerResult {
        self.fail()
    }
}
