//! Listener registry: the two-level mapping behind event and request routing
//!
//! The outer level is the channel kind (the facade keeps one set for events
//! and one for requests); the inner level maps names to ordered listener
//! entries, with a separate list for catch-all listeners. Scoping is a
//! name-prefix transform applied before lookup, not a different structure.

use dashmap::DashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Opaque handle identifying one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

struct Entry<L> {
    id: ListenerId,
    once: bool,
    callback: L,
}

/// Ordered listeners for one channel kind: named plus catch-all
pub(crate) struct ListenerSet<L: Clone> {
    named: DashMap<String, Vec<Entry<L>>>,
    any: RwLock<Vec<Entry<L>>>,
}

impl<L: Clone> ListenerSet<L> {
    pub(crate) fn new() -> Self {
        Self {
            named: DashMap::new(),
            any: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn insert(&self, name: &str, once: bool, callback: L) -> ListenerId {
        let id = ListenerId::new();
        self.named
            .entry(name.to_string())
            .or_default()
            .push(Entry { id, once, callback });
        id
    }

    pub(crate) fn insert_any(&self, once: bool, callback: L) -> ListenerId {
        let id = ListenerId::new();
        if let Ok(mut any) = self.any.write() {
            any.push(Entry { id, once, callback });
        }
        id
    }

    /// Remove one listener by id, or every listener for the name
    pub(crate) fn remove(&self, name: &str, id: Option<ListenerId>) {
        match id {
            Some(id) => {
                if let Some(mut entries) = self.named.get_mut(name) {
                    entries.retain(|e| e.id != id);
                }
            }
            None => {
                self.named.remove(name);
            }
        }
    }

    pub(crate) fn remove_any(&self, id: ListenerId) {
        if let Ok(mut any) = self.any.write() {
            any.retain(|e| e.id != id);
        }
    }

    /// Whether any named listener exists for `name`
    pub(crate) fn has(&self, name: &str) -> bool {
        self.named.get(name).map_or(false, |e| !e.is_empty())
    }

    /// Snapshot the callbacks registered for `name`, retiring once-entries
    pub(crate) fn fetch(&self, name: &str) -> Vec<L> {
        match self.named.get_mut(name) {
            Some(mut entries) => {
                let callbacks = entries.iter().map(|e| e.callback.clone()).collect();
                entries.retain(|e| !e.once);
                callbacks
            }
            None => Vec::new(),
        }
    }

    /// Snapshot the catch-all callbacks, retiring once-entries
    pub(crate) fn fetch_any(&self) -> Vec<L> {
        match self.any.write() {
            Ok(mut any) => {
                let callbacks = any.iter().map(|e| e.callback.clone()).collect();
                any.retain(|e| !e.once);
                callbacks
            }
            Err(_) => Vec::new(),
        }
    }

    /// Remove every named listener whose name starts with `prefix`
    pub(crate) fn remove_prefix(&self, prefix: &str) {
        self.named.retain(|name, _| !name.starts_with(prefix));
    }
}

/// Flat list of diagnostic taps, keyed by listener id
pub(crate) struct TapSet<T: Clone> {
    taps: RwLock<Vec<(ListenerId, T)>>,
}

impl<T: Clone> TapSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            taps: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn insert(&self, tap: T) -> ListenerId {
        let id = ListenerId::new();
        if let Ok(mut taps) = self.taps.write() {
            taps.push((id, tap));
        }
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) {
        if let Ok(mut taps) = self.taps.write() {
            taps.retain(|(tap_id, _)| *tap_id != id);
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<T> {
        match self.taps.read() {
            Ok(taps) => taps.iter().map(|(_, tap)| tap.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }
}
