//! Watcher module
//!
//! Turns resource change notifications into reconcile keys. The routing
//! decision is pure data (see [`registry`]); this module only adapts
//! `kube::runtime::watcher` streams to it.

mod registry;

pub use registry::*;

use futures::{Stream, StreamExt, future};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

use crate::models::ResourceKind;

/// What happened to an object
///
/// `Created` is the first sighting of an object on a watch, later sightings
/// are `Applied`. The watch cannot see history, so every object that exists
/// when the process starts is reported as `Created` once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Applied,
    Deleted,
}

/// The parts of a changed object that routing decisions may look at
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: ResourceKind,
    pub event: EventKind,
    pub name: String,
    pub namespace: Option<String>,
    pub labels: BTreeMap<String, String>,
    /// Whether the object carries a deletion timestamp
    pub deleting: bool,
}

impl Notification {
    pub fn new(kind: ResourceKind, event: EventKind, name: &str, namespace: Option<&str>) -> Self {
        Self {
            kind,
            event,
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            labels: BTreeMap::new(),
            deleting: false,
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn marked_for_deletion(mut self) -> Self {
        self.deleting = true;
        self
    }

    /// Build a notification from any watched object
    pub fn from_resource<K: Resource>(kind: ResourceKind, event: EventKind, obj: &K) -> Self {
        Self {
            kind,
            event,
            name: obj.name_any(),
            namespace: obj.namespace(),
            labels: obj.labels().clone(),
            deleting: obj.meta().deletion_timestamp.is_some(),
        }
    }
}

/// Per-object state for the objects currently present on a watch
///
/// Entries are dropped on delete. A relist builds a fresh map, so objects
/// that vanished while the watch was down are dropped as well.
#[derive(Debug)]
struct WatchedObjects<V> {
    current: HashMap<String, V>,
    relisting: Option<HashMap<String, V>>,
}

impl<V> Default for WatchedObjects<V> {
    fn default() -> Self {
        Self {
            current: HashMap::new(),
            relisting: None,
        }
    }
}

impl<V> WatchedObjects<V> {
    /// Record `value` for `id`, returning the value held before
    fn insert(&mut self, id: String, value: V) -> Option<V> {
        match self.relisting.as_mut() {
            Some(next) => {
                let listed = next.insert(id.clone(), value);
                self.current.remove(&id).or(listed)
            }
            None => self.current.insert(id, value),
        }
    }

    fn remove(&mut self, id: &str) {
        self.current.remove(id);
        if let Some(next) = self.relisting.as_mut() {
            next.remove(id);
        }
    }

    fn start_relist(&mut self) {
        // An interrupted relist keeps what it already saw
        if let Some(partial) = self.relisting.take() {
            self.current.extend(partial);
        }
        self.relisting = Some(HashMap::new());
    }

    fn finish_relist(&mut self) {
        if let Some(next) = self.relisting.take() {
            self.current = next;
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.current.len() + self.relisting.as_ref().map_or(0, HashMap::len)
    }
}

fn object_id<K: Resource>(obj: &K) -> String {
    obj.uid().unwrap_or_else(|| obj.name_any())
}

/// Tracks whether a watch is in a run of errors
#[derive(Debug, Default)]
struct WatchHealth {
    failing: bool,
}

impl WatchHealth {
    /// Record a failure; true only for the first one of a run
    fn failed(&mut self) -> bool {
        !std::mem::replace(&mut self.failing, true)
    }

    fn recovered(&mut self) {
        self.failing = false;
    }
}

/// Turn raw watch events into notifications
///
/// Watch errors never end the stream. The first error of a run is logged at
/// warn, repeats at debug; a kind whose CRD is not installed fails on every
/// backoff cycle.
pub fn notifications<S, K>(
    events: S,
    kind: ResourceKind,
) -> impl Stream<Item = Notification> + Send + 'static
where
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>> + Send + 'static,
    K: Resource + Send + 'static,
{
    let mut present: WatchedObjects<()> = WatchedObjects::default();
    let mut health = WatchHealth::default();

    events.filter_map(move |event| {
        let notification = match event {
            Ok(event) => {
                health.recovered();
                match event {
                    watcher::Event::Init => {
                        present.start_relist();
                        None
                    }
                    watcher::Event::InitDone => {
                        present.finish_relist();
                        None
                    }
                    watcher::Event::Apply(obj) | watcher::Event::InitApply(obj) => {
                        let event = match present.insert(object_id(&obj), ()) {
                            None => EventKind::Created,
                            Some(()) => EventKind::Applied,
                        };
                        Some(Notification::from_resource(kind, event, &obj))
                    }
                    watcher::Event::Delete(obj) => {
                        present.remove(&object_id(&obj));
                        Some(Notification::from_resource(kind, EventKind::Deleted, &obj))
                    }
                }
            }
            Err(e) => {
                if health.failed() {
                    tracing::warn!(kind = %kind, error = %e, "Trigger watch failed, retrying");
                } else {
                    tracing::debug!(kind = %kind, error = %e, "Trigger watch still failing");
                }
                None
            }
        };
        future::ready(notification)
    })
}

/// Watch `api` and yield the reconcile key of every notification the router accepts
pub fn routed_triggers<K>(
    api: Api<K>,
    config: watcher::Config,
    kind: ResourceKind,
    router: Router,
) -> impl Stream<Item = String> + Send + 'static
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
{
    notifications(watcher(api, config).default_backoff(), kind).filter_map(move |notification| {
        let key = router.route(&notification);
        if let Some(ref key) = key {
            tracing::trace!(kind = %kind, key = %key, "routed notification");
        }
        future::ready(key)
    })
}

/// Pass an applied object only when its fingerprint differs from the last one seen
///
/// Objects are tracked by uid while they exist, so a deleted and recreated
/// object with the same content still passes. Errors always pass.
pub fn changed_only<S, K, F>(
    events: S,
    fingerprint: F,
) -> impl Stream<Item = Result<K, watcher::Error>> + Send + 'static
where
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>> + Send + 'static,
    K: Resource + Send + 'static,
    F: Fn(&K) -> u64 + Send + 'static,
{
    let mut seen: WatchedObjects<u64> = WatchedObjects::default();

    events.filter_map(move |event| {
        let passed = match event {
            Ok(watcher::Event::Apply(obj)) | Ok(watcher::Event::InitApply(obj)) => {
                let print = fingerprint(&obj);
                let changed = seen.insert(object_id(&obj), print) != Some(print);
                changed.then_some(Ok(obj))
            }
            Ok(watcher::Event::Delete(obj)) => {
                seen.remove(&object_id(&obj));
                None
            }
            Ok(watcher::Event::Init) => {
                seen.start_relist();
                None
            }
            Ok(watcher::Event::InitDone) => {
                seen.finish_relist();
                None
            }
            Err(e) => Some(Err(e)),
        };
        future::ready(passed)
    })
}
