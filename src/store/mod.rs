//! Client boundary of the managed document database.
//!
//! Everything the sync layer needs from the backend lives here: document
//! keys, JSON documents, queries, provenance-tagged snapshots and atomic
//! write batches, plus the [`Datastore`] trait and an in-memory implementation.

mod converter;
pub mod datastore;
pub mod error;
pub mod model;
pub mod query;
pub mod snapshot;
pub mod value;
mod write_batch;

pub use converter::{DataConverter, PassthroughConverter, SerdeConverter};
pub use datastore::{Datastore, InMemoryDatastore, ListenTarget, SnapshotListener, Unsubscribe};
pub use error::{StoreError, StoreErrorCode, StoreResult};
pub use model::{DocumentKey, ResourcePath};
pub use query::{FieldFilter, FilterOperator, OrderDirection, Query, MAX_IN_VALUES};
pub use snapshot::{DocumentSnapshot, QuerySnapshot, Snapshot, SnapshotMetadata};
pub use value::DocumentData;
pub use write_batch::{WriteBatch, WriteOperation, MAX_BATCH_WRITES};
