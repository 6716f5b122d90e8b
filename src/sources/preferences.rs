use std::sync::Arc;

use serde_json::Value;

use crate::auth::AuthState;
use crate::config::SyncSettings;
use crate::store::error::StoreResult;
use crate::store::{
    DataConverter, Datastore, DocumentData, DocumentKey, ResourcePath, SerdeConverter,
    WriteBatch, WriteOperation,
};
use crate::sync::{DataStore, DocumentHandler, TargetSource, WriteOutcome};

use super::{apply_write, now_millis, FirestorePreferences, LAST_MODIFIED_FIELD};

pub type PreferencesHandler = DocumentHandler<SerdeConverter<FirestorePreferences>>;

#[derive(Clone)]
pub struct PreferencesDataSource {
    datastore: Arc<dyn Datastore>,
    auth: AuthState,
    collection: ResourcePath,
    store: DataStore<PreferencesHandler>,
}

impl PreferencesDataSource {
    pub fn new(
        datastore: Arc<dyn Datastore>,
        auth: AuthState,
        settings: &SyncSettings,
    ) -> StoreResult<Self> {
        let collection = ResourcePath::from_string(&settings.collections.preferences)?;
        let target_collection = collection.clone();
        let source = TargetSource::per_user(&auth, move |uid| {
            DocumentKey::in_collection(&target_collection, uid)
        });
        let handler = DocumentHandler::new(Arc::clone(&datastore), source, SerdeConverter::new())
            .with_metadata_changes(settings.include_metadata_changes);
        Ok(Self {
            datastore,
            auth,
            collection,
            store: DataStore::new("preferences", handler),
        })
    }

    pub fn store(&self) -> &DataStore<PreferencesHandler> {
        &self.store
    }

    fn current_key(&self) -> Option<StoreResult<DocumentKey>> {
        let uid = self.auth.current_user()?;
        Some(DocumentKey::in_collection(&self.collection, &uid))
    }

    /// Replaces the preferences document of the signed-in user.
    pub async fn save_preferences(
        &self,
        preferences: &FirestorePreferences,
        batch: Option<&mut WriteBatch>,
    ) -> WriteOutcome {
        let key = match self.current_key() {
            None => return WriteOutcome::Cancelled,
            Some(Err(err)) => return WriteOutcome::Failure(err),
            Some(Ok(key)) => key,
        };
        let mut preferences = preferences.clone();
        preferences.uuid = key.id().to_string();
        preferences.last_modified = now_millis();
        let data = match self.store.handler().converter().to_map(&preferences) {
            Ok(data) => data,
            Err(err) => return WriteOutcome::Failure(err),
        };
        apply_write(
            &self.datastore,
            batch,
            WriteOperation::Set {
                key,
                data,
                merge: false,
            },
        )
        .await
    }

    /// Merges a single field into the preferences document, creating it when
    /// missing.
    pub async fn set_preference(&self, field: &str, value: Value) -> WriteOutcome {
        let key = match self.current_key() {
            None => return WriteOutcome::Cancelled,
            Some(Err(err)) => return WriteOutcome::Failure(err),
            Some(Ok(key)) => key,
        };
        let mut data = DocumentData::new();
        data.insert("uuid".to_string(), Value::from(key.id()));
        data.insert(field.to_string(), value);
        data.insert(LAST_MODIFIED_FIELD.to_string(), Value::from(now_millis()));
        self.datastore.set_document(&key, data, true).await.into()
    }

    pub async fn delete_preferences(&self, batch: Option<&mut WriteBatch>) -> WriteOutcome<usize> {
        if !self.auth.is_signed_in() {
            return WriteOutcome::Cancelled;
        }
        self.store.delete_data(batch).await
    }
}
