use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Field holding the owning user's id on per-session records.
pub const OWNER_FIELD: &str = "ownerUUID";
/// Field holding the recording session id on per-session records.
pub const SESSION_FIELD: &str = "sessionUUID";
pub const TIMESTAMP_FIELD: &str = "timestamp";
pub const LAST_MODIFIED_FIELD: &str = "lastModified";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FirestoreUser {
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub last_modified: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FirestoreLocation {
    pub uuid: String,
    #[serde(rename = "ownerUUID")]
    pub owner_uuid: String,
    #[serde(rename = "sessionUUID")]
    pub session_uuid: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f32>,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FirestoreSensorEvent {
    pub uuid: String,
    #[serde(rename = "ownerUUID")]
    pub owner_uuid: String,
    #[serde(rename = "sessionUUID")]
    pub session_uuid: String,
    /// Platform sensor type identifier.
    pub sensor_type: i32,
    pub values: Vec<f32>,
    pub accuracy: i32,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FirestorePreferences {
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personalized_ads: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_units: Option<bool>,
    pub last_modified: i64,
}

/// A record belonging to one user and one recording session.
pub trait SessionRecord:
    Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static
{
    fn uuid(&self) -> &str;

    fn set_uuid(&mut self, uuid: String);

    fn owner_uuid(&self) -> &str;

    fn set_owner_uuid(&mut self, owner: String);

    fn session_uuid(&self) -> &str;
}

macro_rules! session_record {
    ($model:ty) => {
        impl SessionRecord for $model {
            fn uuid(&self) -> &str {
                &self.uuid
            }

            fn set_uuid(&mut self, uuid: String) {
                self.uuid = uuid;
            }

            fn owner_uuid(&self) -> &str {
                &self.owner_uuid
            }

            fn set_owner_uuid(&mut self, owner: String) {
                self.owner_uuid = owner;
            }

            fn session_uuid(&self) -> &str {
                &self.session_uuid
            }
        }
    };
}

session_record!(FirestoreLocation);
session_record!(FirestoreSensorEvent);
