//! Snapshot handlers adapt one remote subscription into typed
//! `(payload, metadata)` pairs and keep track of the documents backing it.

mod document;
mod query;
mod source;

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::{join_all, ready};
use futures::stream::{BoxStream, StreamExt};

use crate::store::error::{resource_exhausted, StoreResult};
use crate::store::{Datastore, DocumentKey, Snapshot, SnapshotMetadata, WriteBatch};
use crate::sync::outcome::WriteOutcome;

pub use document::DocumentHandler;
pub use query::QueryHandler;
pub use source::{TargetBuilder, TargetSource};

pub(crate) use source::listen_target_stream;

pub type HandlerStream<T> = BoxStream<'static, StoreResult<T>>;

/// Reference list cached from the most recent snapshot.
#[derive(Clone, Default)]
pub struct ReferenceCache {
    keys: Arc<Mutex<Option<Vec<DocumentKey>>>>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Vec<DocumentKey>> {
        self.keys.lock().unwrap().clone()
    }

    pub fn store(&self, keys: Vec<DocumentKey>) {
        *self.keys.lock().unwrap() = Some(keys);
    }

    pub fn clear(&self) {
        self.keys.lock().unwrap().take();
    }
}

impl fmt::Debug for ReferenceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceCache")
            .field("keys", &self.get())
            .finish()
    }
}

#[async_trait]
pub trait SnapshotHandler: Clone + Send + Sync + 'static {
    type Data: Clone + PartialEq + Send + Sync + 'static;

    fn datastore(&self) -> &Arc<dyn Datastore>;

    fn reference_cache(&self) -> &ReferenceCache;

    /// Whether [`data_objects`](Self::data_objects) should also observe
    /// metadata-only changes such as a cache snapshot being confirmed.
    fn include_metadata_changes(&self) -> bool {
        true
    }

    /// Lazy, restartable stream of snapshots for the configured target.
    /// `Ok(None)` means there is no active target (e.g. nobody is signed in).
    fn snapshots(&self, include_metadata_changes: bool) -> HandlerStream<Option<Snapshot>>;

    /// Maps a snapshot to its typed payload; `None` maps to a confirmed
    /// absence with default (non-cache) metadata.
    fn to_object(&self, snapshot: Option<&Snapshot>) -> (Option<Self::Data>, SnapshotMetadata);

    /// Typed payloads of [`snapshots`](Self::snapshots). The cached reference
    /// list is recomputed on every snapshot.
    fn data_objects(&self) -> HandlerStream<(Option<Self::Data>, SnapshotMetadata)> {
        let handler = self.clone();
        self.snapshots(self.include_metadata_changes())
            .map(move |item| {
                item.map(|snapshot| {
                    handler.reference_cache().store(
                        snapshot
                            .as_ref()
                            .map(Snapshot::references)
                            .unwrap_or_default(),
                    );
                    handler.to_object(snapshot.as_ref())
                })
            })
            .boxed()
    }

    /// Reference lists backing the subscription.
    fn references(&self) -> BoxStream<'static, Vec<DocumentKey>> {
        derived_references(self)
    }

    /// Deletes the documents of the first available reference list, queued
    /// into `batch` when given or issued immediately otherwise.
    async fn delete_references(&self, batch: Option<&mut WriteBatch>) -> WriteOutcome<usize> {
        let Some(references) = self.references().next().await else {
            log::debug!("no reference list became available; delete cancelled");
            return WriteOutcome::Cancelled;
        };
        delete_keys(self.datastore(), references, batch).await
    }

    fn reset_references(&self) {
        self.reference_cache().clear();
    }
}

/// Reference lists read from a fresh subscription, stopping at the first error.
pub fn derived_references<H: SnapshotHandler>(handler: &H) -> BoxStream<'static, Vec<DocumentKey>> {
    let cache = handler.reference_cache().clone();
    handler
        .snapshots(false)
        .take_while(|item| ready(item.is_ok()))
        .filter_map(|item| ready(item.ok()))
        .map(move |snapshot| {
            let keys = snapshot
                .as_ref()
                .map(Snapshot::references)
                .unwrap_or_default();
            cache.store(keys.clone());
            keys
        })
        .boxed()
}

pub(crate) async fn delete_keys(
    datastore: &Arc<dyn Datastore>,
    keys: Vec<DocumentKey>,
    batch: Option<&mut WriteBatch>,
) -> WriteOutcome<usize> {
    if keys.is_empty() {
        return WriteOutcome::Success(0);
    }
    match batch {
        Some(batch) => {
            if batch.remaining_capacity() < keys.len() {
                return WriteOutcome::Failure(resource_exhausted(format!(
                    "batch has room for {} writes but {} deletes are required",
                    batch.remaining_capacity(),
                    keys.len()
                )));
            }
            for key in &keys {
                if let Err(err) = batch.delete(key) {
                    return WriteOutcome::Failure(err);
                }
            }
            WriteOutcome::Success(keys.len())
        }
        None => {
            let results = join_all(keys.iter().map(|key| datastore.delete_document(key))).await;
            match results.into_iter().find_map(Result::err) {
                Some(err) => WriteOutcome::Failure(err),
                None => WriteOutcome::Success(keys.len()),
            }
        }
    }
}
