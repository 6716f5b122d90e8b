use std::fmt;
use std::sync::Arc;

use crate::store::datastore::Datastore;
use crate::store::error::{resource_exhausted, StoreResult};
use crate::store::model::DocumentKey;
use crate::store::value::DocumentData;

/// Largest number of writes a single batch may carry.
pub const MAX_BATCH_WRITES: usize = 500;

#[derive(Clone, Debug, PartialEq)]
pub enum WriteOperation {
    Set {
        key: DocumentKey,
        data: DocumentData,
        merge: bool,
    },
    Update {
        key: DocumentKey,
        data: DocumentData,
    },
    Delete {
        key: DocumentKey,
    },
}

impl WriteOperation {
    pub fn key(&self) -> &DocumentKey {
        match self {
            WriteOperation::Set { key, .. }
            | WriteOperation::Update { key, .. }
            | WriteOperation::Delete { key } => key,
        }
    }
}

/// Aggregates write operations and commits them atomically: either every
/// write applies or none does.
#[derive(Clone)]
pub struct WriteBatch {
    datastore: Arc<dyn Datastore>,
    writes: Vec<WriteOperation>,
    max_writes: usize,
}

impl WriteBatch {
    pub fn new(datastore: Arc<dyn Datastore>) -> Self {
        Self::with_limit(datastore, MAX_BATCH_WRITES)
    }

    /// Creates a batch accepting at most `max_writes` operations (capped at
    /// [`MAX_BATCH_WRITES`]).
    pub fn with_limit(datastore: Arc<dyn Datastore>, max_writes: usize) -> Self {
        Self {
            datastore,
            writes: Vec::new(),
            max_writes: max_writes.clamp(1, MAX_BATCH_WRITES),
        }
    }

    /// Splits `writes` across as many batches as the limit requires.
    pub fn chunked(
        datastore: &Arc<dyn Datastore>,
        writes: Vec<WriteOperation>,
        max_writes: usize,
    ) -> Vec<WriteBatch> {
        let max_writes = max_writes.clamp(1, MAX_BATCH_WRITES);
        writes
            .chunks(max_writes)
            .map(|chunk| WriteBatch {
                datastore: Arc::clone(datastore),
                writes: chunk.to_vec(),
                max_writes,
            })
            .collect()
    }

    pub fn set(&mut self, key: &DocumentKey, data: DocumentData) -> StoreResult<&mut Self> {
        self.push(WriteOperation::Set {
            key: key.clone(),
            data,
            merge: false,
        })
    }

    /// Adds a set that merges `data` into the existing document.
    pub fn set_merge(&mut self, key: &DocumentKey, data: DocumentData) -> StoreResult<&mut Self> {
        self.push(WriteOperation::Set {
            key: key.clone(),
            data,
            merge: true,
        })
    }

    pub fn update(&mut self, key: &DocumentKey, data: DocumentData) -> StoreResult<&mut Self> {
        self.push(WriteOperation::Update {
            key: key.clone(),
            data,
        })
    }

    pub fn delete(&mut self, key: &DocumentKey) -> StoreResult<&mut Self> {
        self.push(WriteOperation::Delete { key: key.clone() })
    }

    pub fn push(&mut self, write: WriteOperation) -> StoreResult<&mut Self> {
        if self.writes.len() >= self.max_writes {
            return Err(resource_exhausted(format!(
                "WriteBatch cannot contain more than {} operations",
                self.max_writes
            )));
        }
        self.writes.push(write);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn remaining_capacity(&self) -> usize {
        self.max_writes - self.writes.len()
    }

    pub fn writes(&self) -> &[WriteOperation] {
        &self.writes
    }

    /// Commits all queued writes atomically. Empty batches succeed without
    /// touching the datastore.
    pub async fn commit(self) -> StoreResult<()> {
        if self.writes.is_empty() {
            return Ok(());
        }
        self.datastore.commit(self.writes).await
    }
}

impl fmt::Debug for WriteBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBatch")
            .field("writes", &self.writes)
            .field("max_writes", &self.max_writes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::datastore::InMemoryDatastore;

    fn datastore() -> Arc<dyn Datastore> {
        Arc::new(InMemoryDatastore::new())
    }

    #[test]
    fn rejects_writes_beyond_limit() {
        let mut batch = WriteBatch::with_limit(datastore(), 2);
        let key = DocumentKey::from_string("users/alice").unwrap();
        batch.delete(&key).unwrap();
        batch.set(&key, DocumentData::new()).unwrap();
        assert_eq!(batch.remaining_capacity(), 0);
        let err = batch.delete(&key).unwrap_err();
        assert_eq!(err.code_str(), "store/resource-exhausted");
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn chunked_respects_limit() {
        let store = datastore();
        let writes = (0..7)
            .map(|i| WriteOperation::Delete {
                key: DocumentKey::from_string(&format!("locations/l{i}")).unwrap(),
            })
            .collect::<Vec<_>>();
        let batches = WriteBatch::chunked(&store, writes, 3);
        let sizes = batches.iter().map(WriteBatch::len).collect::<Vec<_>>();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn commit_applies_all_writes() {
        let store = InMemoryDatastore::new();
        let shared: Arc<dyn Datastore> = Arc::new(store.clone());
        let mut batch = WriteBatch::new(Arc::clone(&shared));
        let first = DocumentKey::from_string("users/a").unwrap();
        let second = DocumentKey::from_string("users/b").unwrap();
        batch.set(&first, DocumentData::new()).unwrap();
        batch.set(&second, DocumentData::new()).unwrap();
        batch.commit().await.unwrap();

        assert!(shared.get_document(&first).await.unwrap().exists());
        assert!(shared.get_document(&second).await.unwrap().exists());
    }
}
