use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;

use crate::store::error::{not_found, StoreError, StoreResult};
use crate::store::model::DocumentKey;
use crate::store::query::Query;
use crate::store::snapshot::{DocumentSnapshot, QuerySnapshot, Snapshot, SnapshotMetadata};
use crate::store::value::DocumentData;
use crate::store::write_batch::WriteOperation;

use super::{Datastore, ListenTarget, SnapshotListener};

/// Process-local datastore that mimics the cache/server split of the managed
/// backend.
///
/// While the network is enabled a new listener first sees a cache snapshot
/// (when it asked for metadata changes) and then a server-confirmed one. With
/// the network disabled every snapshot is cache-sourced and local writes are
/// flagged as pending until the network comes back.
#[derive(Clone, Default)]
pub struct InMemoryDatastore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    listen_count: AtomicUsize,
    delete_operations: AtomicUsize,
}

struct State {
    documents: BTreeMap<DocumentKey, DocumentData>,
    pending: BTreeSet<DocumentKey>,
    network_enabled: bool,
    listeners: Vec<ListenerEntry>,
    next_listener_id: u64,
    write_failure: Option<StoreError>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            documents: BTreeMap::new(),
            pending: BTreeSet::new(),
            network_enabled: true,
            listeners: Vec::new(),
            next_listener_id: 0,
            write_failure: None,
        }
    }
}

struct ListenerEntry {
    id: u64,
    target: ListenTarget,
    include_metadata_changes: bool,
    sender: async_channel::Sender<StoreResult<Snapshot>>,
    last: Option<Snapshot>,
}

impl ListenerEntry {
    fn covers(&self, key: &DocumentKey) -> bool {
        match &self.target {
            ListenTarget::Document(target) => target == key,
            ListenTarget::Query(query) => key.collection_path() == *query.collection_path(),
        }
    }

    /// Sends `snapshot` if it differs from the last delivered one. Returns
    /// `false` once the receiving side is gone.
    fn offer(&mut self, snapshot: Snapshot) -> bool {
        let changed = match &self.last {
            None => true,
            Some(last) if self.include_metadata_changes => last != &snapshot,
            Some(last) => !last.same_data(&snapshot),
        };
        if !changed {
            return !self.sender.is_closed();
        }
        self.last = Some(snapshot.clone());
        self.sender.try_send(Ok(snapshot)).is_ok()
    }
}

impl State {
    fn document_snapshot(&self, key: &DocumentKey, from_cache: bool) -> DocumentSnapshot {
        let metadata = SnapshotMetadata::new(from_cache, self.pending.contains(key));
        DocumentSnapshot::new(key.clone(), self.documents.get(key).cloned(), metadata)
    }

    fn query_snapshot(&self, query: &Query, from_cache: bool) -> QuerySnapshot {
        let matched = self
            .documents
            .iter()
            .filter(|(key, data)| query.matches(key, data))
            .map(|(key, data)| {
                let metadata = SnapshotMetadata::new(from_cache, self.pending.contains(key));
                DocumentSnapshot::new(key.clone(), Some(data.clone()), metadata)
            })
            .collect::<Vec<_>>();
        let documents = query.apply(matched);
        let has_pending_writes = documents
            .iter()
            .any(|document| document.metadata().has_pending_writes());
        QuerySnapshot::new(
            query.clone(),
            documents,
            SnapshotMetadata::new(from_cache, has_pending_writes),
        )
    }

    fn snapshot(&self, target: &ListenTarget, from_cache: bool) -> Snapshot {
        match target {
            ListenTarget::Document(key) => Snapshot::Document(self.document_snapshot(key, from_cache)),
            ListenTarget::Query(query) => Snapshot::Query(self.query_snapshot(query, from_cache)),
        }
    }

    /// Re-evaluates listeners touched by `affected` (all of them when `None`).
    fn broadcast(&mut self, affected: Option<&[DocumentKey]>) {
        let from_cache = !self.network_enabled;
        let mut listeners = std::mem::take(&mut self.listeners);
        listeners.retain_mut(|entry| {
            if let Some(keys) = affected {
                if !keys.iter().any(|key| entry.covers(key)) {
                    return !entry.sender.is_closed();
                }
            }
            let snapshot = self.snapshot(&entry.target, from_cache);
            entry.offer(snapshot)
        });
        self.listeners = listeners;
    }
}

impl InMemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches between online (server-confirmed) and offline (cache-only) delivery.
    pub fn set_network_enabled(&self, enabled: bool) {
        let mut state = self.inner.state.lock().unwrap();
        if state.network_enabled == enabled {
            return;
        }
        state.network_enabled = enabled;
        if enabled {
            state.pending.clear();
        }
        state.broadcast(None);
    }

    pub fn is_network_enabled(&self) -> bool {
        self.inner.state.lock().unwrap().network_enabled
    }

    /// Makes the next write (or commit) fail with `error` without applying it.
    pub fn fail_next_write(&self, error: StoreError) {
        self.inner.state.lock().unwrap().write_failure = Some(error);
    }

    /// Terminates every active listener with `error`.
    pub fn fail_listeners(&self, error: StoreError) {
        let listeners = std::mem::take(&mut self.inner.state.lock().unwrap().listeners);
        for entry in listeners {
            let _ = entry.sender.try_send(Err(error.clone()));
        }
    }

    /// Total number of listeners ever attached.
    pub fn listen_count(&self) -> usize {
        self.inner.listen_count.load(Ordering::SeqCst)
    }

    /// Number of listeners currently attached.
    pub fn active_listeners(&self) -> usize {
        let mut state = self.inner.state.lock().unwrap();
        state.listeners.retain(|entry| !entry.sender.is_closed());
        state.listeners.len()
    }

    /// Total number of delete writes applied.
    pub fn delete_operations(&self) -> usize {
        self.inner.delete_operations.load(Ordering::SeqCst)
    }

    pub fn document_count(&self) -> usize {
        self.inner.state.lock().unwrap().documents.len()
    }

    fn apply_writes(&self, writes: Vec<WriteOperation>) -> StoreResult<()> {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(error) = state.write_failure.take() {
            return Err(error);
        }

        let mut staged = state.documents.clone();
        let mut deletes = 0;
        for write in &writes {
            match write {
                WriteOperation::Set { key, data, merge } => {
                    if *merge {
                        let existing = staged.entry(key.clone()).or_default();
                        for (field, value) in data {
                            merge_into(existing, field, value.clone());
                        }
                    } else {
                        staged.insert(key.clone(), data.clone());
                    }
                }
                WriteOperation::Update { key, data } => {
                    let existing = staged
                        .get_mut(key)
                        .ok_or_else(|| not_found(format!("Document {key} does not exist")))?;
                    for (field, value) in data {
                        set_field_path(existing, field, value.clone());
                    }
                }
                WriteOperation::Delete { key } => {
                    staged.remove(key);
                    deletes += 1;
                }
            }
        }

        state.documents = staged;
        let keys = writes
            .iter()
            .map(|write| write.key().clone())
            .collect::<Vec<_>>();
        if !state.network_enabled {
            state.pending.extend(keys.iter().cloned());
        }
        self.inner
            .delete_operations
            .fetch_add(deletes, Ordering::SeqCst);
        state.broadcast(Some(&keys));
        Ok(())
    }
}

fn merge_into(fields: &mut DocumentData, field: &str, incoming: Value) {
    match fields.get_mut(field) {
        Some(existing) => merge_value(existing, incoming),
        None => {
            fields.insert(field.to_string(), incoming);
        }
    }
}

fn merge_value(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                merge_value(existing.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, incoming) => *slot = incoming,
    }
}

/// Writes `value` at a dotted field path, creating intermediate maps.
fn set_field_path(fields: &mut DocumentData, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            fields.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = fields
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            set_nested(child, rest, value);
        }
    }
}

fn set_nested(target: &mut Value, path: &str, value: Value) {
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    let Value::Object(map) = target else {
        return;
    };
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            set_nested(child, rest, value);
        }
    }
}

#[async_trait]
impl Datastore for InMemoryDatastore {
    async fn get_document(&self, key: &DocumentKey) -> StoreResult<DocumentSnapshot> {
        let state = self.inner.state.lock().unwrap();
        Ok(state.document_snapshot(key, !state.network_enabled))
    }

    async fn run_query(&self, query: &Query) -> StoreResult<QuerySnapshot> {
        let state = self.inner.state.lock().unwrap();
        Ok(state.query_snapshot(query, !state.network_enabled))
    }

    async fn set_document(
        &self,
        key: &DocumentKey,
        data: DocumentData,
        merge: bool,
    ) -> StoreResult<()> {
        self.apply_writes(vec![WriteOperation::Set {
            key: key.clone(),
            data,
            merge,
        }])
    }

    async fn update_document(&self, key: &DocumentKey, data: DocumentData) -> StoreResult<()> {
        self.apply_writes(vec![WriteOperation::Update {
            key: key.clone(),
            data,
        }])
    }

    async fn delete_document(&self, key: &DocumentKey) -> StoreResult<()> {
        self.apply_writes(vec![WriteOperation::Delete { key: key.clone() }])
    }

    async fn commit(&self, writes: Vec<WriteOperation>) -> StoreResult<()> {
        self.apply_writes(writes)
    }

    fn listen(&self, target: ListenTarget, include_metadata_changes: bool) -> SnapshotListener {
        let (sender, receiver) = async_channel::unbounded();
        let id = {
            let mut state = self.inner.state.lock().unwrap();
            let id = state.next_listener_id;
            state.next_listener_id += 1;

            let mut entry = ListenerEntry {
                id,
                target,
                include_metadata_changes,
                sender,
                last: None,
            };
            if state.network_enabled {
                if include_metadata_changes {
                    entry.offer(state.snapshot(&entry.target, true));
                }
                entry.offer(state.snapshot(&entry.target, false));
            } else {
                entry.offer(state.snapshot(&entry.target, true));
            }
            state.listeners.push(entry);
            id
        };
        self.inner.listen_count.fetch_add(1, Ordering::SeqCst);

        let inner = Arc::downgrade(&self.inner);
        SnapshotListener::new(
            receiver.boxed(),
            Box::new(move || {
                if let Some(inner) = inner.upgrade() {
                    let mut state = inner.state.lock().unwrap();
                    state.listeners.retain(|entry| entry.id != id);
                }
            }),
        )
    }
}
