use std::sync::Arc;
use std::time::Duration;

use jay_sync::auth::AuthState;
use jay_sync::lifecycle::AppLifecycle;
use jay_sync::store::error::unavailable;
use jay_sync::store::{
    Datastore, DocumentData, DocumentKey, InMemoryDatastore, PassthroughConverter, Query,
};
use jay_sync::sync::{DataFlow, DataStatus, DataStore, DocumentHandler, QueryHandler, TargetSource};
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

fn key(path: &str) -> DocumentKey {
    DocumentKey::from_string(path).unwrap()
}

fn fields(value: Value) -> DocumentData {
    value.as_object().unwrap().clone().into_iter().collect()
}

async fn settled<T: Clone + Send + Sync>(
    receiver: &mut watch::Receiver<DataStatus<T>>,
    predicate: impl Fn(&DataStatus<T>) -> bool,
) -> DataStatus<T> {
    let status = timeout(Duration::from_secs(5), receiver.wait_for(|status| predicate(status)))
        .await
        .expect("status in time")
        .expect("flow alive")
        .clone();
    status
}

async fn eventually(condition: impl Fn() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition reached in time");
}

fn name_of(status: &DataStatus<DocumentData>) -> Option<Value> {
    status.data.as_ref().and_then(|data| data.get("name").cloned())
}

#[tokio::test(flavor = "multi_thread")]
async fn cache_value_precedes_cloud_confirmation() {
    let store = InMemoryDatastore::new();
    store
        .set_document(&key("users/u1"), fields(json!({"name": "cached"})), false)
        .await
        .unwrap();
    store.set_network_enabled(false);

    let handler = DocumentHandler::fixed(Arc::new(store.clone()), key("users/u1"), PassthroughConverter);
    let flow = DataFlow::new("user", handler);
    let mut local = flow.data_status();
    let mut cloud = flow.cloud_data_status();
    assert!(flow.refresh());

    let status = settled(&mut local, |status| status.is_loading == Some(false)).await;
    assert_eq!(name_of(&status), Some(json!("cached")));
    assert_eq!(flow.current_cloud_status(), DataStatus::loading());
    assert!(!flow.refresh());

    store.set_network_enabled(true);
    let status = settled(&mut cloud, |status| status.is_loading == Some(false)).await;
    assert_eq!(name_of(&status), Some(json!("cached")));
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_write_reaches_cloud_after_reconnect() {
    let store = InMemoryDatastore::new();
    let handler = DocumentHandler::fixed(Arc::new(store.clone()), key("users/u1"), PassthroughConverter);
    let flow = DataFlow::new("user", handler);
    let mut local = flow.data_status();
    let mut cloud = flow.cloud_data_status();
    flow.refresh();

    let status = settled(&mut cloud, |status| status.is_loading == Some(false)).await;
    assert!(status.is_confirmed_empty());

    store.set_network_enabled(false);
    store
        .set_document(&key("users/u1"), fields(json!({"name": "offline"})), false)
        .await
        .unwrap();
    settled(&mut local, |status| name_of(status) == Some(json!("offline"))).await;
    assert!(flow.current_cloud_status().data.is_none());

    store.set_network_enabled(true);
    settled(&mut cloud, |status| name_of(status) == Some(json!("offline"))).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn per_user_store_follows_sign_in() {
    let store = InMemoryDatastore::new();
    store
        .set_document(&key("users/u1"), fields(json!({"name": "one"})), false)
        .await
        .unwrap();
    store
        .set_document(&key("users/u2"), fields(json!({"name": "two"})), false)
        .await
        .unwrap();

    let auth = AuthState::signed_in("u1");
    let source = TargetSource::per_user(&auth, |uid| DocumentKey::from_string(&format!("users/{uid}")));
    let users = DataStore::new(
        "user",
        DocumentHandler::new(Arc::new(store.clone()), source, PassthroughConverter),
    );

    let mut cloud = users.cloud_data_status();
    settled(&mut cloud, |status| name_of(status) == Some(json!("one"))).await;

    auth.sign_in("u2");
    settled(&mut cloud, |status| name_of(status) == Some(json!("two"))).await;

    auth.sign_out();
    let status = settled(&mut cloud, |status| status.data.is_none()).await;
    assert!(status.is_confirmed_empty());
    eventually(|| store.active_listeners() == 0).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn reset_and_refresh_keep_one_listener() {
    let store = InMemoryDatastore::new();
    let query = Query::collection("locations").unwrap();
    let flow = DataFlow::new(
        "locations",
        QueryHandler::fixed(Arc::new(store.clone()), query, PassthroughConverter),
    );
    for _ in 0..5 {
        flow.reset();
        assert!(flow.refresh());
    }
    eventually(|| store.active_listeners() == 1).await;
    assert_eq!(store.listen_count(), 5);

    flow.reset();
    assert_eq!(flow.current_status(), DataStatus::default());
    assert_eq!(flow.current_cloud_status(), DataStatus::default());
    eventually(|| store.active_listeners() == 0).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn background_and_foreground_restart_the_listener() {
    let store = InMemoryDatastore::new();
    store
        .set_document(&key("locations/a"), fields(json!({"name": "a"})), false)
        .await
        .unwrap();
    let lifecycle = AppLifecycle::new();
    let query = Query::collection("locations").unwrap();
    let flow = DataFlow::new(
        "locations",
        QueryHandler::fixed(Arc::new(store.clone()), query, PassthroughConverter),
    );
    flow.bind_lifecycle(&lifecycle);
    let mut cloud = flow.cloud_data_status();

    lifecycle.start();
    let status = settled(&mut cloud, |status| status.is_loading == Some(false)).await;
    assert_eq!(status.data.map(|documents| documents.len()), Some(1));

    lifecycle.stop();
    assert_eq!(flow.current_cloud_status(), DataStatus::default());
    eventually(|| store.active_listeners() == 0).await;

    lifecycle.start();
    settled(&mut cloud, |status| status.is_loading == Some(false)).await;
    assert_eq!(store.listen_count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn listener_failure_keeps_last_status() {
    let store = InMemoryDatastore::new();
    store
        .set_document(&key("users/u1"), fields(json!({"name": "last"})), false)
        .await
        .unwrap();
    let handler = DocumentHandler::fixed(Arc::new(store.clone()), key("users/u1"), PassthroughConverter);
    let flow = DataFlow::new("user", handler);
    let mut cloud = flow.cloud_data_status();
    flow.refresh();
    settled(&mut cloud, |status| status.is_loading == Some(false)).await;

    store.fail_listeners(unavailable("connection lost"));
    eventually(|| !flow.is_listening()).await;
    assert_eq!(name_of(&flow.current_cloud_status()), Some(json!("last")));
    assert!(flow.refresh());
}

#[tokio::test(flavor = "multi_thread")]
async fn views_report_distinct_values() {
    use futures::StreamExt;

    let store = InMemoryDatastore::new();
    let handler = DocumentHandler::fixed(Arc::new(store.clone()), key("users/u1"), PassthroughConverter);
    let flow = DataFlow::new("user", handler);
    let mut loading = flow.cloud_data_loading().into_stream();
    assert_eq!(loading.next().await, Some(None));

    flow.refresh();
    let seen = timeout(Duration::from_secs(5), async {
        let mut seen = Vec::new();
        while let Some(value) = loading.next().await {
            seen.push(value);
            if value == Some(false) {
                break;
            }
        }
        seen
    })
    .await
    .unwrap();
    assert_eq!(seen.last(), Some(&Some(false)));
    assert!(seen.windows(2).all(|pair| pair[0] != pair[1]));
}
