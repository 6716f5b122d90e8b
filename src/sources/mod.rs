//! Typed data sources for the entities synchronised per signed-in user.

mod model;
mod preferences;
mod session_records;
mod user;

use std::sync::Arc;

use crate::store::{Datastore, WriteBatch, WriteOperation};
use crate::sync::WriteOutcome;

pub use model::{
    FirestoreLocation, FirestorePreferences, FirestoreSensorEvent, FirestoreUser, SessionRecord,
    LAST_MODIFIED_FIELD, OWNER_FIELD, SESSION_FIELD, TIMESTAMP_FIELD,
};
pub use preferences::{PreferencesDataSource, PreferencesHandler};
pub use session_records::{SessionRecordHandler, SessionRecordSource};
pub use user::{UserDataSource, UserHandler};

/// Location samples recorded during driving sessions.
pub type PathDataSource = SessionRecordSource<FirestoreLocation>;

/// Raw sensor readings recorded during driving sessions.
pub type SensorEventDataSource = SessionRecordSource<FirestoreSensorEvent>;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Queues `write` into `batch`, or commits it on its own.
async fn apply_write(
    datastore: &Arc<dyn Datastore>,
    batch: Option<&mut WriteBatch>,
    write: WriteOperation,
) -> WriteOutcome {
    match batch {
        Some(batch) => batch.push(write).map(|_| ()).into(),
        None => datastore.commit(vec![write]).await.into(),
    }
}
