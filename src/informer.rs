// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch caches that feed the event router.
//!
//! An [`Informer`] runs a `kube` watcher, keeps a reflector store up to date,
//! and hands every change to a handler as a tagged [`ObjectEvent`]. The event
//! kind is decided here, against the store contents *before* the change is
//! applied:
//!
//! - `Apply` of an unknown object is [`EventKind::Added`]; of a cached one,
//!   [`EventKind::Updated`] carrying the cached `resourceVersion`
//! - `Delete` is [`EventKind::Deleted`]
//! - After a relist (`Init` .. `InitDone`), every cached object missing from
//!   the new list was deleted while the watch was down. It is reported as a
//!   tombstone: [`EventKind::Deleted`] with `final_state_unknown` and the last
//!   known snapshot.

use crate::router::{EventKind, ObjectEvent, ObjectKey};
use futures::StreamExt;
use kube::runtime::reflector::{store::Writer, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Turns raw watcher events into [`ObjectEvent`]s.
pub struct EventClassifier<K> {
    /// Objects received since the last `Init`, until `InitDone`
    relist: Option<Vec<K>>,
}

impl<K> Default for EventClassifier<K> {
    fn default() -> Self {
        Self { relist: None }
    }
}

impl<K> EventClassifier<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Eq + Hash + Clone + Default,
{
    /// Classify `event` against `store`, which must not have seen it yet.
    pub fn classify(&mut self, event: &watcher::Event<K>, store: &Store<K>) -> Vec<ObjectEvent<K>> {
        match event {
            watcher::Event::Apply(obj) => vec![Self::applied(obj, store)],
            watcher::Event::Delete(obj) => vec![ObjectEvent {
                kind: EventKind::Deleted {
                    final_state_unknown: false,
                },
                key: ObjectKey::from_resource(obj),
                object: Some(Arc::new(obj.clone())),
            }],
            watcher::Event::Init => {
                self.relist = Some(Vec::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                self.relist.get_or_insert_with(Vec::new).push(obj.clone());
                Vec::new()
            }
            watcher::Event::InitDone => {
                let listed = self.relist.take().unwrap_or_default();
                let seen: HashSet<ObjectRef<K>> = listed.iter().map(ObjectRef::from_obj).collect();

                let mut events: Vec<ObjectEvent<K>> =
                    listed.iter().map(|obj| Self::applied(obj, store)).collect();
                events.extend(
                    store
                        .state()
                        .into_iter()
                        .filter(|cached| !seen.contains(&ObjectRef::from_obj(cached.as_ref())))
                        .map(|cached| ObjectEvent {
                            kind: EventKind::Deleted {
                                final_state_unknown: true,
                            },
                            key: ObjectKey::from_resource(cached.as_ref()),
                            object: Some(cached),
                        }),
                );
                events
            }
        }
    }

    fn applied(obj: &K, store: &Store<K>) -> ObjectEvent<K> {
        let kind = match store.get(&ObjectRef::from_obj(obj)) {
            Some(cached) => EventKind::Updated {
                previous_version: cached.resource_version(),
            },
            None => EventKind::Added,
        };
        ObjectEvent {
            kind,
            key: ObjectKey::from_resource(obj),
            object: Some(Arc::new(obj.clone())),
        }
    }
}

/// A reflector store together with the classifier that tags its changes.
pub struct WatchCache<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Eq + Hash + Clone,
{
    store: Store<K>,
    writer: Writer<K>,
    classifier: EventClassifier<K>,
}

impl<K> Default for WatchCache<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Eq + Hash + Clone + Default,
{
    fn default() -> Self {
        let writer = Writer::default();
        Self {
            store: writer.as_reader(),
            writer,
            classifier: EventClassifier::default(),
        }
    }
}

impl<K> WatchCache<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Eq + Hash + Clone + Default,
{
    /// Read handle on the cache.
    #[must_use]
    pub fn store(&self) -> Store<K> {
        self.store.clone()
    }

    /// Apply one watcher event to the cache and pass the resulting events to `handler`.
    pub fn process<F>(&mut self, event: &watcher::Event<K>, handler: &mut F)
    where
        F: FnMut(ObjectEvent<K>),
    {
        let events = self.classifier.classify(event, &self.store);
        self.writer.apply_watcher_event(event);
        for object_event in events {
            handler(object_event);
        }
    }
}

/// A watcher feeding one [`WatchCache`] and one event handler.
pub struct Informer<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Eq + Hash + Clone,
{
    api: Api<K>,
    config: watcher::Config,
    cache: WatchCache<K>,
}

impl<K> Informer<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Eq + Hash + Clone + Default,
{
    #[must_use]
    pub fn new(api: Api<K>, config: watcher::Config) -> Self {
        Self {
            api,
            config,
            cache: WatchCache::default(),
        }
    }

    /// Read handle on the cache this informer maintains.
    #[must_use]
    pub fn store(&self) -> Store<K> {
        self.cache.store()
    }

    /// Watch until `shutdown` flips to true.
    ///
    /// Watch errors are retried by the watcher's backoff and never end the loop.
    pub async fn run<F>(mut self, mut handler: F, mut shutdown: watch::Receiver<bool>)
    where
        F: FnMut(ObjectEvent<K>) + Send,
    {
        let kind = K::kind(&K::DynamicType::default()).to_string();
        info!(kind = %kind, "Starting informer");

        let stream = watcher::watcher(self.api.clone(), self.config.clone()).default_backoff();
        tokio::pin!(stream);

        loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => {
                    debug!(kind = %kind, "Informer stopping");
                    break;
                }
                event = stream.next() => match event {
                    Some(Ok(event)) => self.cache.process(&event, &mut handler),
                    Some(Err(e)) => {
                        warn!(kind = %kind, error = %e, "Watch error, retrying with backoff");
                    }
                    None => {
                        warn!(kind = %kind, "Watch stream ended");
                        break;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
#[path = "informer_tests.rs"]
mod informer_tests;
