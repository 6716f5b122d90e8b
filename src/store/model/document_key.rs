use std::fmt::{Display, Formatter};

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::store::error::{invalid_argument, StoreResult};
use crate::store::model::ResourcePath;

const AUTO_ID_LENGTH: usize = 20;

/// Locator of a single document: a path with an even number of segments.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentKey {
    path: ResourcePath,
}

impl DocumentKey {
    pub fn from_path(path: ResourcePath) -> StoreResult<Self> {
        if path.len() < 2 || path.len() % 2 != 0 {
            return Err(invalid_argument(format!(
                "Document keys must point to a document (even number of segments), got '{path}'"
            )));
        }
        Ok(Self { path })
    }

    pub fn from_string(path: &str) -> StoreResult<Self> {
        Self::from_path(ResourcePath::from_string(path)?)
    }

    /// Key of document `id` inside `collection`.
    pub fn in_collection(collection: &ResourcePath, id: &str) -> StoreResult<Self> {
        if id.is_empty() || id.contains('/') {
            return Err(invalid_argument(format!("Invalid document id '{id}'")));
        }
        Self::from_path(collection.child([id]))
    }

    /// Key with a random 20 character id inside `collection`.
    pub fn auto_id(collection: &ResourcePath) -> StoreResult<Self> {
        Self::in_collection(collection, &generate_auto_id())
    }

    pub fn collection_path(&self) -> ResourcePath {
        self.path.without_last()
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    pub fn id(&self) -> &str {
        self.path.last_segment().unwrap_or_default()
    }
}

impl Display for DocumentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path.canonical_string())
    }
}

fn generate_auto_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .take(AUTO_ID_LENGTH)
        .collect()
}
