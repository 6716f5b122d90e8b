use serde::Deserialize;

use crate::store::error::{invalid_argument, StoreResult};
use crate::store::MAX_BATCH_WRITES;

/// Collection names used by the entity data sources.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectionNames {
    pub users: String,
    pub locations: String,
    pub sensor_events: String,
    pub preferences: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            users: "users".to_string(),
            locations: "locations".to_string(),
            sensor_events: "sensorEvents".to_string(),
            preferences: "preferences".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncSettings {
    pub collections: CollectionNames,
    /// Writes per committed batch, clamped to `1..=500`.
    pub batch_write_limit: usize,
    /// Whether handlers also observe metadata-only changes, which is how a
    /// cached value gets promoted to a cloud-confirmed one.
    pub include_metadata_changes: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            collections: CollectionNames::default(),
            batch_write_limit: MAX_BATCH_WRITES,
            include_metadata_changes: true,
        }
    }
}

impl SyncSettings {
    pub fn from_json_str(json: &str) -> StoreResult<Self> {
        let settings: SyncSettings = serde_json::from_str(json)
            .map_err(|err| invalid_argument(format!("invalid sync settings: {err}")))?;
        Ok(settings.normalized())
    }

    pub fn batch_write_limit(&self) -> usize {
        self.batch_write_limit.clamp(1, MAX_BATCH_WRITES)
    }

    fn normalized(mut self) -> Self {
        self.batch_write_limit = self.batch_write_limit();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreErrorCode;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings =
            SyncSettings::from_json_str(r#"{"collections": {"sensorEvents": "events"}}"#).unwrap();
        assert_eq!(settings.collections.sensor_events, "events");
        assert_eq!(settings.collections.users, "users");
        assert_eq!(settings.batch_write_limit, 500);
        assert!(settings.include_metadata_changes);
    }

    #[test]
    fn batch_limit_is_clamped() {
        let settings = SyncSettings::from_json_str(r#"{"batchWriteLimit": 2000}"#).unwrap();
        assert_eq!(settings.batch_write_limit, 500);
        let settings = SyncSettings::from_json_str(r#"{"batchWriteLimit": 0}"#).unwrap();
        assert_eq!(settings.batch_write_limit, 1);
    }

    #[test]
    fn malformed_json_is_invalid_argument() {
        let err = SyncSettings::from_json_str("{").unwrap_err();
        assert_eq!(err.code, StoreErrorCode::InvalidArgument);
    }
}
