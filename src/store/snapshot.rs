use crate::store::model::DocumentKey;
use crate::store::query::Query;
use crate::store::value::DocumentData;

/// Metadata about the provenance of a snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SnapshotMetadata {
    from_cache: bool,
    has_pending_writes: bool,
}

impl SnapshotMetadata {
    /// Creates metadata with the provided cache/pending-write flags.
    pub fn new(from_cache: bool, has_pending_writes: bool) -> Self {
        Self {
            from_cache,
            has_pending_writes,
        }
    }

    /// Indicates whether the snapshot was served from the local cache rather
    /// than confirmed by the backend.
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// Indicates whether the snapshot contains writes not yet acknowledged.
    pub fn has_pending_writes(&self) -> bool {
        self.has_pending_writes
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    key: DocumentKey,
    data: Option<DocumentData>,
    metadata: SnapshotMetadata,
}

impl DocumentSnapshot {
    pub fn new(key: DocumentKey, data: Option<DocumentData>, metadata: SnapshotMetadata) -> Self {
        Self {
            key,
            data,
            metadata,
        }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    pub fn data(&self) -> Option<&DocumentData> {
        self.data.as_ref()
    }

    pub fn metadata(&self) -> &SnapshotMetadata {
        &self.metadata
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn id(&self) -> &str {
        self.key.id()
    }
}

/// Result set of a query at one point in time.
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySnapshot {
    query: Query,
    documents: Vec<DocumentSnapshot>,
    metadata: SnapshotMetadata,
}

impl QuerySnapshot {
    pub fn new(query: Query, documents: Vec<DocumentSnapshot>, metadata: SnapshotMetadata) -> Self {
        Self {
            query,
            documents,
            metadata,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn metadata(&self) -> &SnapshotMetadata {
        &self.metadata
    }
}

/// A snapshot delivered by a listener: either a single document or a query result.
#[derive(Clone, Debug, PartialEq)]
pub enum Snapshot {
    Document(DocumentSnapshot),
    Query(QuerySnapshot),
}

impl Snapshot {
    pub fn metadata(&self) -> &SnapshotMetadata {
        match self {
            Snapshot::Document(snapshot) => snapshot.metadata(),
            Snapshot::Query(snapshot) => snapshot.metadata(),
        }
    }

    pub fn from_cache(&self) -> bool {
        self.metadata().from_cache()
    }

    /// Keys of the documents backing this snapshot.
    ///
    /// A document snapshot always reports its own key, even when the document
    /// does not exist; a query snapshot reports one key per matched document.
    pub fn references(&self) -> Vec<DocumentKey> {
        match self {
            Snapshot::Document(snapshot) => vec![snapshot.key().clone()],
            Snapshot::Query(snapshot) => snapshot
                .documents()
                .iter()
                .map(|document| document.key().clone())
                .collect(),
        }
    }

    /// Compares everything but the metadata.
    pub(crate) fn same_data(&self, other: &Snapshot) -> bool {
        match (self, other) {
            (Snapshot::Document(a), Snapshot::Document(b)) => a.key == b.key && a.data == b.data,
            (Snapshot::Query(a), Snapshot::Query(b)) => {
                a.documents.len() == b.documents.len()
                    && a
                        .documents
                        .iter()
                        .zip(&b.documents)
                        .all(|(left, right)| left.key == right.key && left.data == right.data)
            }
            _ => false,
        }
    }
}
