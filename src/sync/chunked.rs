//! Deleting by membership when the value list exceeds the `in` filter limit.

use std::sync::Arc;

use futures::future::join_all;
use futures::stream::StreamExt;
use serde_json::Value;

use crate::store::error::{cancelled, StoreResult};
use crate::store::{Datastore, DocumentKey, Query, WriteBatch, WriteOperation, MAX_IN_VALUES};
use crate::sync::handler::delete_keys;
use crate::sync::outcome::WriteOutcome;

/// Splits `values` into chunks that each fit one `in` filter.
pub fn chunk_in_values<V: Clone>(values: &[V]) -> Vec<Vec<V>> {
    values.chunks(MAX_IN_VALUES).map(<[V]>::to_vec).collect()
}

/// One query per chunk: `base` restricted to `field in chunk`.
pub fn where_in_chunks(base: &Query, field: &str, values: &[Value]) -> StoreResult<Vec<Query>> {
    chunk_in_values(values)
        .into_iter()
        .map(|chunk| base.clone().where_in(field, chunk))
        .collect()
}

/// Deletes every document matching `base` whose `field` is one of `values`.
///
/// Each chunk's query is listened to until its first result; all chunks run
/// concurrently and the outcome is reported once every chunk has answered.
/// Matches are queued into `batch` when one is supplied, otherwise committed
/// in batches of at most `batch_limit` writes.
pub async fn delete_where_in(
    datastore: &Arc<dyn Datastore>,
    base: &Query,
    field: &str,
    values: &[Value],
    batch: Option<&mut WriteBatch>,
    batch_limit: usize,
) -> WriteOutcome<usize> {
    if values.is_empty() {
        return WriteOutcome::Cancelled;
    }
    let queries = match where_in_chunks(base, field, values) {
        Ok(queries) => queries,
        Err(err) => return WriteOutcome::Failure(err),
    };
    log::debug!(
        "deleting {} by '{field}' across {} queries",
        base.collection_path(),
        queries.len()
    );

    let firsts = join_all(queries.into_iter().map(|query| async move {
        let mut listener = datastore.listen(query.into(), false);
        listener.next().await
    }))
    .await;

    let mut keys: Vec<DocumentKey> = Vec::new();
    for first in firsts {
        match first {
            Some(Ok(snapshot)) => keys.extend(snapshot.references()),
            Some(Err(err)) => return WriteOutcome::Failure(err),
            None => {
                return WriteOutcome::Failure(cancelled(
                    "listener closed before reporting a result",
                ))
            }
        }
    }
    keys.sort();
    keys.dedup();

    match batch {
        Some(batch) => delete_keys(datastore, keys, Some(batch)).await,
        None => {
            let count = keys.len();
            let writes = keys
                .into_iter()
                .map(|key| WriteOperation::Delete { key })
                .collect();
            for batch in WriteBatch::chunked(datastore, writes, batch_limit) {
                if let Err(err) = batch.commit().await {
                    return WriteOutcome::Failure(err);
                }
            }
            WriteOutcome::Success(count)
        }
    }
}
