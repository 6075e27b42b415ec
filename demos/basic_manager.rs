//! Walkthrough of a mail-style store feeding a `CollectionManager`.
//!
//! Run with `RUST_LOG=viewkit=debug cargo run --example basic_manager`.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;
use viewkit::prelude::*;

struct Message {
    id: u64,
    folder: &'static str,
    subject: String,
}

impl Entity for Message {
    const KIND: &'static str = "message";

    fn id(&self) -> EntityId {
        EntityId::new(self.id)
    }
}

struct Printer(&'static str);

impl ViewListener<Message> for Printer {
    fn on_items_added(&mut self, items: &[EntityRef<Message>], view: &View<Message>) -> ListenerResult {
        for item in items {
            println!("[{}] + {} ({} total)", self.0, item.read().subject, view.len());
        }
        Ok(())
    }

    fn on_items_modified(
        &mut self,
        items: &[EntityRef<Message>],
        _view: &View<Message>,
    ) -> ListenerResult {
        for item in items {
            println!("[{}] ~ {}", self.0, item.read().subject);
        }
        Ok(())
    }

    fn on_items_removed(
        &mut self,
        items: &[EntityRef<Message>],
        _view: &View<Message>,
    ) -> ListenerResult {
        for item in items {
            println!("[{}] - {}", self.0, item.read().subject);
        }
        Ok(())
    }
}

fn main() -> Result<(), ConfigError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let written = Arc::new(Mutex::new(Vec::new()));
    let sink = written.clone();
    let mut manager = ManagerBuilder::new()
        .cache_floor(4)
        .cache_with_write_back::<Message>(4, move |m: &Message| -> Result<(), WriteBackError> {
            sink.lock().push(m.id);
            Ok(())
        })
        .try_build()?;

    let inbox = View::new(Predicate::query(|m: &Message| m.folder == "inbox"))
        .with_listener(Printer("inbox"));
    let archive = View::new(Predicate::query(|m: &Message| m.folder == "archive"))
        .with_listener(Printer("archive"));
    manager.register_view(&inbox);
    manager.register_view(&archive);

    let batch: Vec<_> = (1..=6)
        .map(|id| {
            EntityRef::new(Message {
                id,
                folder: "inbox",
                subject: format!("hello #{id}"),
            })
        })
        .collect();
    manager.items_added(&batch);

    batch[0].update(|m| m.folder = "archive");
    batch[1].update(|m| m.subject.push_str(" (edited)"));
    manager.items_modified(&batch[..2]);

    let reloaded = manager.unify_one(EntityRef::new(Message {
        id: 6,
        folder: "inbox",
        subject: "stale copy".into(),
    }));
    println!("reloaded #6 reads {:?}", reloaded.read().subject);

    manager.items_deleted::<Message>(&[EntityId::new(3)]);

    let report = manager.commit_dirty_all();
    println!(
        "inbox={} archive={} flushed={} written={:?}",
        inbox.len(),
        archive.len(),
        report.flushed,
        written.lock()
    );
    Ok(())
}
