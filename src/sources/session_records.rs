use std::sync::Arc;

use serde_json::Value;

use crate::auth::AuthState;
use crate::store::error::{resource_exhausted, StoreResult};
use crate::store::{
    DataConverter, Datastore, DocumentKey, OrderDirection, Query, ResourcePath, SerdeConverter,
    WriteBatch, WriteOperation,
};
use crate::sync::{delete_where_in, DataFlow, DataStore, QueryHandler, TargetSource, WriteOutcome};

use super::{SessionRecord, OWNER_FIELD, SESSION_FIELD, TIMESTAMP_FIELD};

pub type SessionRecordHandler<M> = QueryHandler<SerdeConverter<M>>;

/// Records of the signed-in user stored in one collection, grouped by
/// recording session.
///
/// The store observes every record owned by the user; [`session_flow`]
/// narrows that down to a single session.
///
/// [`session_flow`]: SessionRecordSource::session_flow
#[derive(Clone)]
pub struct SessionRecordSource<M: SessionRecord> {
    datastore: Arc<dyn Datastore>,
    auth: AuthState,
    collection: ResourcePath,
    batch_limit: usize,
    include_metadata_changes: bool,
    converter: SerdeConverter<M>,
    store: DataStore<SessionRecordHandler<M>>,
}

impl<M: SessionRecord> SessionRecordSource<M> {
    pub fn new(
        datastore: Arc<dyn Datastore>,
        auth: AuthState,
        collection: &str,
        settings: &crate::config::SyncSettings,
    ) -> StoreResult<Self> {
        let collection = ResourcePath::from_string(collection)?;
        // Validates the path up front so the per-user builder cannot fail on it.
        Query::new(collection.clone())?;

        let target_collection = collection.clone();
        let source = TargetSource::per_user(&auth, move |uid| owned_by(&target_collection, uid));
        let handler = QueryHandler::new(Arc::clone(&datastore), source, SerdeConverter::new())
            .with_metadata_changes(settings.include_metadata_changes);
        let name = collection.canonical_string();
        Ok(Self {
            datastore,
            auth,
            collection,
            batch_limit: settings.batch_write_limit(),
            include_metadata_changes: settings.include_metadata_changes,
            converter: SerdeConverter::new(),
            store: DataStore::new(name, handler),
        })
    }

    pub fn store(&self) -> &DataStore<SessionRecordHandler<M>> {
        &self.store
    }

    pub fn collection(&self) -> &ResourcePath {
        &self.collection
    }

    /// A flow over one session's records in timestamp order. The flow is not
    /// started; call [`DataFlow::refresh`] or bind it to a lifecycle.
    pub fn session_flow(&self, session_uuid: &str) -> DataFlow<SessionRecordHandler<M>> {
        let collection = self.collection.clone();
        let session = session_uuid.to_string();
        let source = TargetSource::per_user(&self.auth, move |uid| {
            Ok(owned_by(&collection, uid)?
                .where_eq(SESSION_FIELD, session.as_str())?
                .order_by(TIMESTAMP_FIELD, OrderDirection::Ascending))
        });
        let handler = QueryHandler::new(Arc::clone(&self.datastore), source, self.converter.clone())
            .with_metadata_changes(self.include_metadata_changes);
        DataFlow::new(
            format!("{}/{session_uuid}", self.collection.canonical_string()),
            handler,
        )
    }

    /// Stores `records` for the signed-in user. Records without an id get a
    /// generated one; the owner is always overwritten.
    pub async fn insert(&self, records: &[M], batch: Option<&mut WriteBatch>) -> WriteOutcome<usize> {
        if records.is_empty() {
            return WriteOutcome::Cancelled;
        }
        let Some(uid) = self.auth.current_user() else {
            return WriteOutcome::Cancelled;
        };

        let mut writes = Vec::with_capacity(records.len());
        for record in records {
            match self.record_write(record, &uid) {
                Ok(write) => writes.push(write),
                Err(err) => return WriteOutcome::Failure(err),
            }
        }
        let count = writes.len();

        match batch {
            Some(batch) => {
                if batch.remaining_capacity() < count {
                    return WriteOutcome::Failure(resource_exhausted(format!(
                        "batch has room for {} writes but {count} records were given",
                        batch.remaining_capacity()
                    )));
                }
                for write in writes {
                    if let Err(err) = batch.push(write) {
                        return WriteOutcome::Failure(err);
                    }
                }
            }
            None => {
                for batch in WriteBatch::chunked(&self.datastore, writes, self.batch_limit) {
                    if let Err(err) = batch.commit().await {
                        return WriteOutcome::Failure(err);
                    }
                }
            }
        }
        log::debug!("stored {count} records in {}", self.collection);
        WriteOutcome::Success(count)
    }

    fn record_write(&self, record: &M, uid: &str) -> StoreResult<WriteOperation> {
        let mut record = record.clone();
        record.set_owner_uuid(uid.to_string());
        let key = if record.uuid().is_empty() {
            let key = DocumentKey::auto_id(&self.collection)?;
            record.set_uuid(key.id().to_string());
            key
        } else {
            DocumentKey::in_collection(&self.collection, record.uuid())?
        };
        Ok(WriteOperation::Set {
            key,
            data: self.converter.to_map(&record)?,
            merge: false,
        })
    }

    /// Deletes the signed-in user's records belonging to any of `session_uuids`.
    pub async fn delete_sessions(
        &self,
        session_uuids: &[String],
        batch: Option<&mut WriteBatch>,
    ) -> WriteOutcome<usize> {
        if session_uuids.is_empty() {
            return WriteOutcome::Cancelled;
        }
        let Some(uid) = self.auth.current_user() else {
            return WriteOutcome::Cancelled;
        };
        let base = match owned_by(&self.collection, &uid) {
            Ok(query) => query,
            Err(err) => return WriteOutcome::Failure(err),
        };
        let values: Vec<Value> = session_uuids.iter().map(|id| Value::from(id.as_str())).collect();
        delete_where_in(
            &self.datastore,
            &base,
            SESSION_FIELD,
            &values,
            batch,
            self.batch_limit,
        )
        .await
    }

    /// Deletes every record of the signed-in user in this collection.
    pub async fn delete_all(&self, batch: Option<&mut WriteBatch>) -> WriteOutcome<usize> {
        if !self.auth.is_signed_in() {
            return WriteOutcome::Cancelled;
        }
        self.store.delete_data(batch).await
    }
}

fn owned_by(collection: &ResourcePath, uid: &str) -> StoreResult<Query> {
    Query::new(collection.clone())?.where_eq(OWNER_FIELD, uid)
}
