use std::sync::Arc;

use crate::auth::AuthState;
use crate::config::SyncSettings;
use crate::lifecycle::AppLifecycle;
use crate::sources::{
    PathDataSource, PreferencesDataSource, SensorEventDataSource, UserDataSource,
};
use crate::store::error::StoreResult;
use crate::store::{Datastore, WriteBatch, WriteOperation};
use crate::sync::WriteOutcome;

/// The entity data sources of one signed-in app, sharing a datastore, an
/// auth state and a lifecycle.
#[derive(Clone)]
pub struct SyncServices {
    datastore: Arc<dyn Datastore>,
    auth: AuthState,
    settings: SyncSettings,
    users: UserDataSource,
    paths: PathDataSource,
    sensor_events: SensorEventDataSource,
    preferences: PreferencesDataSource,
}

impl SyncServices {
    /// Builds every source and binds its store to `lifecycle`.
    pub fn new(
        datastore: Arc<dyn Datastore>,
        auth: AuthState,
        lifecycle: &AppLifecycle,
        settings: SyncSettings,
    ) -> StoreResult<Self> {
        let users = UserDataSource::new(Arc::clone(&datastore), auth.clone(), &settings)?;
        let paths = PathDataSource::new(
            Arc::clone(&datastore),
            auth.clone(),
            &settings.collections.locations,
            &settings,
        )?;
        let sensor_events = SensorEventDataSource::new(
            Arc::clone(&datastore),
            auth.clone(),
            &settings.collections.sensor_events,
            &settings,
        )?;
        let preferences = PreferencesDataSource::new(Arc::clone(&datastore), auth.clone(), &settings)?;

        users.store().bind_lifecycle(lifecycle);
        paths.store().bind_lifecycle(lifecycle);
        sensor_events.store().bind_lifecycle(lifecycle);
        preferences.store().bind_lifecycle(lifecycle);

        Ok(Self {
            datastore,
            auth,
            settings,
            users,
            paths,
            sensor_events,
            preferences,
        })
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn users(&self) -> &UserDataSource {
        &self.users
    }

    pub fn paths(&self) -> &PathDataSource {
        &self.paths
    }

    pub fn sensor_events(&self) -> &SensorEventDataSource {
        &self.sensor_events
    }

    pub fn preferences(&self) -> &PreferencesDataSource {
        &self.preferences
    }

    /// Deletes everything stored for the signed-in user.
    ///
    /// Deletes are committed in batches of at most the configured write limit,
    /// so an account that fits in one batch is removed atomically. Returns the
    /// number of deleted documents.
    pub async fn delete_account_data(&self) -> WriteOutcome<usize> {
        if !self.auth.is_signed_in() {
            return WriteOutcome::Cancelled;
        }

        let references = [
            self.paths.store().data_references().await,
            self.sensor_events.store().data_references().await,
            self.preferences.store().data_references().await,
            self.users.store().data_references().await,
        ];
        let mut writes = Vec::new();
        for keys in references {
            let Some(keys) = keys else {
                return WriteOutcome::Cancelled;
            };
            writes.extend(keys.into_iter().map(|key| WriteOperation::Delete { key }));
        }
        let deleted = writes.len();
        if deleted == 0 {
            return WriteOutcome::Success(0);
        }

        let batches =
            WriteBatch::chunked(&self.datastore, writes, self.settings.batch_write_limit());
        log::debug!(
            "deleting {deleted} documents of the current account in {} batches",
            batches.len()
        );
        for batch in batches {
            if let Err(err) = batch.commit().await {
                return WriteOutcome::Failure(err);
            }
        }
        WriteOutcome::Success(deleted)
    }
}
