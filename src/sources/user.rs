use std::sync::Arc;

use crate::auth::AuthState;
use crate::config::SyncSettings;
use crate::store::error::StoreResult;
use crate::store::{
    DataConverter, Datastore, DocumentKey, ResourcePath, SerdeConverter, WriteBatch,
    WriteOperation,
};
use crate::sync::{DataStore, DocumentHandler, TargetSource, WriteOutcome};

use super::{apply_write, now_millis, FirestoreUser};

pub type UserHandler = DocumentHandler<SerdeConverter<FirestoreUser>>;

/// Profile document of the signed-in user, stored at `users/{uid}`.
#[derive(Clone)]
pub struct UserDataSource {
    datastore: Arc<dyn Datastore>,
    auth: AuthState,
    collection: ResourcePath,
    store: DataStore<UserHandler>,
}

impl UserDataSource {
    pub fn new(
        datastore: Arc<dyn Datastore>,
        auth: AuthState,
        settings: &SyncSettings,
    ) -> StoreResult<Self> {
        let collection = ResourcePath::from_string(&settings.collections.users)?;
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
            store: DataStore::new("user", handler),
        })
    }

    pub fn store(&self) -> &DataStore<UserHandler> {
        &self.store
    }

    /// Writes the profile of the signed-in user, stamping its id and
    /// modification time.
    pub async fn save_user(
        &self,
        user: &FirestoreUser,
        batch: Option<&mut WriteBatch>,
    ) -> WriteOutcome {
        let Some(uid) = self.auth.current_user() else {
            return WriteOutcome::Cancelled;
        };
        let key = match DocumentKey::in_collection(&self.collection, &uid) {
            Ok(key) => key,
            Err(err) => return WriteOutcome::Failure(err),
        };
        let mut user = user.clone();
        user.uuid = uid;
        user.last_modified = now_millis();
        let data = match self.store.handler().converter().to_map(&user) {
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

    pub async fn delete_user(&self, batch: Option<&mut WriteBatch>) -> WriteOutcome<usize> {
        if !self.auth.is_signed_in() {
            return WriteOutcome::Cancelled;
        }
        self.store.delete_data(batch).await
    }
}
