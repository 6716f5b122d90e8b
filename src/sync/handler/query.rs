use std::fmt;
use std::sync::Arc;

use futures::future::ready;
use futures::stream::{self, BoxStream, StreamExt};

use crate::store::{DataConverter, Datastore, DocumentKey, Query, Snapshot, SnapshotMetadata};

use super::{
    derived_references, listen_target_stream, HandlerStream, ReferenceCache, SnapshotHandler,
    TargetSource,
};

/// Handler for a query, decoding each matched document through `C`.
///
/// Documents that fail to decode are skipped. An empty result is a confirmed
/// empty list, not an absence.
#[derive(Clone)]
pub struct QueryHandler<C: DataConverter> {
    datastore: Arc<dyn Datastore>,
    source: TargetSource<Query>,
    converter: C,
    references: ReferenceCache,
    include_metadata_changes: bool,
}

impl<C: DataConverter> QueryHandler<C> {
    pub fn new(datastore: Arc<dyn Datastore>, source: TargetSource<Query>, converter: C) -> Self {
        Self {
            datastore,
            source,
            converter,
            references: ReferenceCache::new(),
            include_metadata_changes: true,
        }
    }

    pub fn fixed(datastore: Arc<dyn Datastore>, query: Query, converter: C) -> Self {
        Self::new(datastore, TargetSource::Fixed(query), converter)
    }

    pub fn with_metadata_changes(mut self, include: bool) -> Self {
        self.include_metadata_changes = include;
        self
    }

    pub fn source(&self) -> &TargetSource<Query> {
        &self.source
    }
}

impl<C: DataConverter> SnapshotHandler for QueryHandler<C> {
    type Data = Vec<C::Model>;

    fn datastore(&self) -> &Arc<dyn Datastore> {
        &self.datastore
    }

    fn reference_cache(&self) -> &ReferenceCache {
        &self.references
    }

    fn include_metadata_changes(&self) -> bool {
        self.include_metadata_changes
    }

    fn snapshots(&self, include_metadata_changes: bool) -> HandlerStream<Option<Snapshot>> {
        listen_target_stream(
            Arc::clone(&self.datastore),
            self.source.clone(),
            include_metadata_changes,
        )
    }

    fn to_object(&self, snapshot: Option<&Snapshot>) -> (Option<Vec<C::Model>>, SnapshotMetadata) {
        match snapshot {
            None => (None, SnapshotMetadata::default()),
            Some(Snapshot::Query(result)) => {
                let models = result
                    .documents()
                    .iter()
                    .filter_map(|document| {
                        let data = document.data()?;
                        self.converter
                            .from_map(data)
                            .map_err(|err| {
                                log::warn!("skipping undecodable document {}: {err}", document.key())
                            })
                            .ok()
                    })
                    .collect();
                (Some(models), *result.metadata())
            }
            Some(other) => {
                log::warn!("query handler received a document snapshot");
                (None, *other.metadata())
            }
        }
    }

    fn references(&self) -> BoxStream<'static, Vec<DocumentKey>> {
        match self.references.get() {
            Some(cached) => stream::once(ready(cached)).boxed(),
            None => derived_references(self),
        }
    }
}

impl<C: DataConverter + fmt::Debug> fmt::Debug for QueryHandler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHandler")
            .field("source", &self.source)
            .field("converter", &self.converter)
            .finish_non_exhaustive()
    }
}
