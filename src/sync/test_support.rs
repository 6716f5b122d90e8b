use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::StreamExt;
use serde_json::Value;

use crate::store::{
    Datastore, DocumentData, DocumentKey, DocumentSnapshot, InMemoryDatastore, Snapshot,
    SnapshotMetadata, StoreError, StoreResult,
};
use crate::sync::handler::{HandlerStream, ReferenceCache, SnapshotHandler};

/// Handler whose snapshots are pushed by the test, one document at
/// `scripted/doc` carrying its payload under `value`.
#[derive(Clone)]
pub struct ScriptedHandler {
    datastore: Arc<dyn Datastore>,
    sender: async_channel::Sender<StoreResult<Option<Snapshot>>>,
    receiver: async_channel::Receiver<StoreResult<Option<Snapshot>>>,
    subscriptions: Arc<AtomicUsize>,
    references: ReferenceCache,
}

impl ScriptedHandler {
    pub fn new() -> Self {
        let (sender, receiver) = async_channel::unbounded();
        Self {
            datastore: Arc::new(InMemoryDatastore::new()),
            sender,
            receiver,
            subscriptions: Arc::new(AtomicUsize::new(0)),
            references: ReferenceCache::new(),
        }
    }

    pub fn key() -> DocumentKey {
        DocumentKey::from_string("scripted/doc").unwrap()
    }

    pub fn push_value(&self, value: Option<Value>, from_cache: bool) {
        let data = value.map(|value| DocumentData::from([("value".to_string(), value)]));
        let snapshot = DocumentSnapshot::new(
            Self::key(),
            data,
            SnapshotMetadata::new(from_cache, false),
        );
        self.push(Ok(Some(Snapshot::Document(snapshot))));
    }

    pub fn push_absent(&self) {
        self.push(Ok(None));
    }

    pub fn push_error(&self, error: StoreError) {
        self.push(Err(error));
    }

    fn push(&self, item: StoreResult<Option<Snapshot>>) {
        self.sender.try_send(item).unwrap();
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

impl SnapshotHandler for ScriptedHandler {
    type Data = Value;

    fn datastore(&self) -> &Arc<dyn Datastore> {
        &self.datastore
    }

    fn reference_cache(&self) -> &ReferenceCache {
        &self.references
    }

    fn snapshots(&self, _include_metadata_changes: bool) -> HandlerStream<Option<Snapshot>> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.receiver.clone().boxed()
    }

    fn to_object(&self, snapshot: Option<&Snapshot>) -> (Option<Value>, SnapshotMetadata) {
        match snapshot {
            Some(Snapshot::Document(document)) => (
                document.data().and_then(|data| data.get("value").cloned()),
                *document.metadata(),
            ),
            Some(other) => (None, *other.metadata()),
            None => (None, SnapshotMetadata::default()),
        }
    }
}
