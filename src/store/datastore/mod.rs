use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};

use crate::store::error::StoreResult;
use crate::store::model::DocumentKey;
use crate::store::query::Query;
use crate::store::snapshot::{DocumentSnapshot, QuerySnapshot, Snapshot};
use crate::store::value::DocumentData;
use crate::store::write_batch::WriteOperation;

pub mod in_memory;

pub use in_memory::InMemoryDatastore;

/// What a listener subscribes to.
#[derive(Clone, Debug, PartialEq)]
pub enum ListenTarget {
    Document(DocumentKey),
    Query(Query),
}

impl From<DocumentKey> for ListenTarget {
    fn from(key: DocumentKey) -> Self {
        ListenTarget::Document(key)
    }
}

impl From<Query> for ListenTarget {
    fn from(query: Query) -> Self {
        ListenTarget::Query(query)
    }
}

pub type Unsubscribe = Box<dyn FnOnce() + Send + 'static>;

/// Live subscription to a [`ListenTarget`].
///
/// Yields snapshots until the backend reports an error or the listener is
/// dropped; dropping detaches it from the datastore.
pub struct SnapshotListener {
    stream: BoxStream<'static, StoreResult<Snapshot>>,
    unsubscribe: Option<Unsubscribe>,
}

impl SnapshotListener {
    pub fn new(stream: BoxStream<'static, StoreResult<Snapshot>>, unsubscribe: Unsubscribe) -> Self {
        Self {
            stream,
            unsubscribe: Some(unsubscribe),
        }
    }

    pub fn detach(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Stream for SnapshotListener {
    type Item = StoreResult<Snapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.poll_next_unpin(cx)
    }
}

impl Drop for SnapshotListener {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for SnapshotListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotListener")
            .field("attached", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Client boundary of the managed document database.
///
/// Durability, conflict resolution and offline caching belong to the
/// implementation; callers only see snapshots tagged with their provenance.
#[async_trait]
pub trait Datastore: Send + Sync + 'static {
    async fn get_document(&self, key: &DocumentKey) -> StoreResult<DocumentSnapshot>;

    async fn run_query(&self, query: &Query) -> StoreResult<QuerySnapshot>;

    async fn set_document(&self, key: &DocumentKey, data: DocumentData, merge: bool)
        -> StoreResult<()>;

    async fn update_document(&self, key: &DocumentKey, data: DocumentData) -> StoreResult<()>;

    async fn delete_document(&self, key: &DocumentKey) -> StoreResult<()>;

    async fn commit(&self, writes: Vec<WriteOperation>) -> StoreResult<()>;

    fn listen(&self, target: ListenTarget, include_metadata_changes: bool) -> SnapshotListener;
}
