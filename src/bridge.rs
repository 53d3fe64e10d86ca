// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Turns cache notifications into work queue keys.

use crate::key::ObjectKey;
use crate::queue::WorkQueue;
use crate::store::WatchEvent;
use futures::{Stream, StreamExt};
use kube::runtime::watcher;
use kube::Resource;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A change reported by the local cache.
#[derive(Debug, Clone)]
pub enum Notification<K> {
    Added(Arc<K>),
    Updated { old: Arc<K>, new: Arc<K> },
    Deleted(Arc<K>),
    /// The cache missed the deletion itself and only knows the key.
    DeletedFinalStateUnknown(ObjectKey),
}

/// Enqueues the key of every changed object.
///
/// Updates are never filtered here, even when old and new look identical:
/// whether work is needed is the reconciler's call.
#[derive(Clone)]
pub struct EventBridge {
    queue: Arc<WorkQueue<ObjectKey>>,
}

impl EventBridge {
    pub fn new(queue: Arc<WorkQueue<ObjectKey>>) -> Self {
        Self { queue }
    }

    pub fn handle<K: Resource>(&self, notification: &Notification<K>) {
        match notification {
            Notification::Added(obj) => self.enqueue(obj.as_ref()),
            Notification::Updated { new, .. } => self.enqueue(new.as_ref()),
            Notification::Deleted(obj) => self.enqueue(obj.as_ref()),
            Notification::DeletedFinalStateUnknown(key) => self.queue.add(key.clone()),
        }
    }

    pub fn handle_watch_event<K: Resource>(&self, event: &WatchEvent<K>) {
        self.enqueue(event.object());
    }

    pub fn handle_watcher_event<K: Resource>(&self, event: &watcher::Event<K>) {
        match event {
            watcher::Event::Apply(obj)
            | watcher::Event::InitApply(obj)
            | watcher::Event::Delete(obj) => self.enqueue(obj),
            watcher::Event::Init => debug!(queue = self.queue.name(), "Relisting"),
            watcher::Event::InitDone => debug!(queue = self.queue.name(), "Relist complete"),
        }
    }

    /// Feed a watcher stream into the queue until it ends or the queue shuts down.
    ///
    /// Watcher errors are logged; the stream is expected to recover on its own.
    pub async fn run<K, S>(self, events: S)
    where
        K: Resource,
        S: Stream<Item = Result<watcher::Event<K>, watcher::Error>>,
    {
        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            if self.queue.is_shutting_down() {
                break;
            }
            match event {
                Ok(event) => self.handle_watcher_event(&event),
                Err(e) => warn!(queue = self.queue.name(), "Watch error: {}", e),
            }
        }
        info!(queue = self.queue.name(), "Event bridge stopped");
    }

    fn enqueue<K: Resource>(&self, obj: &K) {
        match ObjectKey::from_resource(obj) {
            Ok(key) => self.queue.add(key),
            Err(e) => warn!(queue = self.queue.name(), "Couldn't derive key: {}", e),
        }
    }
}
