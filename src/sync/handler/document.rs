use std::fmt;
use std::sync::Arc;

use futures::future::ready;
use futures::stream::{self, BoxStream, StreamExt};

use crate::store::{
    DataConverter, Datastore, DocumentData, DocumentKey, Snapshot, SnapshotMetadata,
};

use super::{listen_target_stream, HandlerStream, ReferenceCache, SnapshotHandler, TargetSource};

/// Handler for a single document, decoded through `C`.
#[derive(Clone)]
pub struct DocumentHandler<C: DataConverter> {
    datastore: Arc<dyn Datastore>,
    source: TargetSource<DocumentKey>,
    converter: C,
    references: ReferenceCache,
    include_metadata_changes: bool,
}

impl<C: DataConverter> DocumentHandler<C> {
    pub fn new(datastore: Arc<dyn Datastore>, source: TargetSource<DocumentKey>, converter: C) -> Self {
        Self {
            datastore,
            source,
            converter,
            references: ReferenceCache::new(),
            include_metadata_changes: true,
        }
    }

    pub fn fixed(datastore: Arc<dyn Datastore>, key: DocumentKey, converter: C) -> Self {
        Self::new(datastore, TargetSource::Fixed(key), converter)
    }

    pub fn with_metadata_changes(mut self, include: bool) -> Self {
        self.include_metadata_changes = include;
        self
    }

    pub fn source(&self) -> &TargetSource<DocumentKey> {
        &self.source
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    fn decode(&self, key: &DocumentKey, data: Option<&DocumentData>) -> Option<C::Model> {
        match self.converter.from_map(data?) {
            Ok(model) => Some(model),
            Err(err) => {
                log::warn!("failed to decode document {key}: {err}");
                None
            }
        }
    }
}

impl<C: DataConverter> SnapshotHandler for DocumentHandler<C> {
    type Data = C::Model;

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

    fn to_object(&self, snapshot: Option<&Snapshot>) -> (Option<C::Model>, SnapshotMetadata) {
        match snapshot {
            None => (None, SnapshotMetadata::default()),
            Some(Snapshot::Document(document)) => (
                self.decode(document.key(), document.data()),
                *document.metadata(),
            ),
            Some(other) => {
                log::warn!("document handler received a query snapshot");
                (None, *other.metadata())
            }
        }
    }

    /// The current document key, without opening a subscription.
    fn references(&self) -> BoxStream<'static, Vec<DocumentKey>> {
        let keys = self.source.current().map(|key| vec![key]).unwrap_or_default();
        stream::once(ready(keys)).boxed()
    }
}

impl<C: DataConverter + fmt::Debug> fmt::Debug for DocumentHandler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentHandler")
            .field("source", &self.source)
            .field("converter", &self.converter)
            .field("include_metadata_changes", &self.include_metadata_changes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthState;
    use crate::store::{InMemoryDatastore, PassthroughConverter, WriteBatch};
    use crate::sync::WriteOutcome;
    use serde_json::json;

    fn data(value: serde_json::Value) -> DocumentData {
        match value {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn cache_then_server_objects() {
        let store = InMemoryDatastore::new();
        let key = DocumentKey::from_string("users/u1").unwrap();
        store
            .set_document(&key, data(json!({"name": "Jay"})), false)
            .await
            .unwrap();
        let handler = DocumentHandler::fixed(Arc::new(store), key, PassthroughConverter);

        let mut objects = handler.data_objects();
        let (first, meta) = objects.next().await.unwrap().unwrap();
        assert!(meta.from_cache());
        assert_eq!(first.unwrap()["name"], json!("Jay"));
        let (_, meta) = objects.next().await.unwrap().unwrap();
        assert!(!meta.from_cache());
    }

    #[test]
    fn absent_snapshot_is_confirmed_absence() {
        let store = InMemoryDatastore::new();
        let key = DocumentKey::from_string("users/u1").unwrap();
        let handler = DocumentHandler::fixed(Arc::new(store), key, PassthroughConverter);
        let (data, meta) = handler.to_object(None);
        assert!(data.is_none());
        assert!(!meta.from_cache());
    }

    #[tokio::test]
    async fn references_follow_signed_in_user() {
        let datastore: Arc<dyn Datastore> = Arc::new(InMemoryDatastore::new());
        let auth = AuthState::new();
        let source = TargetSource::per_user(&auth, |uid| DocumentKey::from_string(&format!("users/{uid}")));
        let handler = DocumentHandler::new(datastore, source, PassthroughConverter);

        assert!(handler.references().next().await.unwrap().is_empty());
        auth.sign_in("u7");
        let keys = handler.references().next().await.unwrap();
        assert_eq!(keys, vec![DocumentKey::from_string("users/u7").unwrap()]);
    }

    #[tokio::test]
    async fn delete_references_queues_into_batch() {
        let store = InMemoryDatastore::new();
        let datastore: Arc<dyn Datastore> = Arc::new(store.clone());
        let key = DocumentKey::from_string("users/u1").unwrap();
        store.set_document(&key, data(json!({"a": 1})), false).await.unwrap();
        let handler = DocumentHandler::fixed(Arc::clone(&datastore), key, PassthroughConverter);

        let mut batch = WriteBatch::new(datastore);
        let outcome = handler.delete_references(Some(&mut batch)).await;
        assert_eq!(outcome, WriteOutcome::Success(1));
        assert_eq!(batch.len(), 1);
        assert_eq!(store.document_count(), 1);
        batch.commit().await.unwrap();
        assert_eq!(store.document_count(), 0);
    }

    #[tokio::test]
    async fn signed_out_delete_is_a_no_op() {
        let store = InMemoryDatastore::new();
        let auth = AuthState::new();
        let source = TargetSource::per_user(&auth, |uid| DocumentKey::from_string(&format!("users/{uid}")));
        let handler = DocumentHandler::new(Arc::new(store.clone()), source, PassthroughConverter);
        assert_eq!(handler.delete_references(None).await, WriteOutcome::Success(0));
        assert_eq!(store.delete_operations(), 0);
    }
}
