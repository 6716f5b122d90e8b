use std::fmt;
use std::pin::pin;
use std::sync::Arc;

use futures::future::{select, Either};
use futures::stream::{self, StreamExt};
use tokio::sync::watch;

use crate::auth::AuthState;
use crate::store::error::StoreResult;
use crate::store::{Datastore, ListenTarget, Snapshot, SnapshotListener};

use super::HandlerStream;

pub type TargetBuilder<T> = Arc<dyn Fn(&str) -> StoreResult<T> + Send + Sync + 'static>;

/// Where a handler's listen target comes from.
pub enum TargetSource<T> {
    /// The same target for the lifetime of the handler.
    Fixed(T),
    /// A target derived from the signed-in user; absent while signed out.
    PerUser {
        users: watch::Receiver<Option<String>>,
        build: TargetBuilder<T>,
    },
}

impl<T> TargetSource<T> {
    pub fn per_user<F>(auth: &AuthState, build: F) -> Self
    where
        F: Fn(&str) -> StoreResult<T> + Send + Sync + 'static,
    {
        TargetSource::PerUser {
            users: auth.subscribe(),
            build: Arc::new(build),
        }
    }
}

impl<T: Clone> TargetSource<T> {
    /// The target as of now.
    pub fn current(&self) -> Option<T> {
        match self {
            TargetSource::Fixed(target) => Some(target.clone()),
            TargetSource::PerUser { users, build } => {
                let uid = users.borrow().clone();
                resolve(build, uid.as_deref())
            }
        }
    }
}

impl<T: Clone> Clone for TargetSource<T> {
    fn clone(&self) -> Self {
        match self {
            TargetSource::Fixed(target) => TargetSource::Fixed(target.clone()),
            TargetSource::PerUser { users, build } => TargetSource::PerUser {
                users: users.clone(),
                build: Arc::clone(build),
            },
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for TargetSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSource::Fixed(target) => f.debug_tuple("Fixed").field(target).finish(),
            TargetSource::PerUser { users, .. } => f
                .debug_struct("PerUser")
                .field("user", &*users.borrow())
                .finish_non_exhaustive(),
        }
    }
}

fn resolve<T>(build: &TargetBuilder<T>, uid: Option<&str>) -> Option<T> {
    let uid = uid?;
    match build(uid) {
        Ok(target) => Some(target),
        Err(err) => {
            log::warn!("failed to build listen target for user {uid}: {err}");
            None
        }
    }
}

struct SwitchState<T> {
    datastore: Arc<dyn Datastore>,
    users: watch::Receiver<Option<String>>,
    build: TargetBuilder<T>,
    include_metadata_changes: bool,
    current: Option<SnapshotListener>,
    switch_pending: bool,
    users_closed: bool,
}

enum Step {
    Item(Option<StoreResult<Snapshot>>),
    Switch,
    UsersClosed,
}

/// Snapshots for `source`. For per-user sources the subscription follows the
/// latest user: a change drops the previous listener before attaching the
/// next one, and signing out yields `Ok(None)`.
pub(crate) fn listen_target_stream<T>(
    datastore: Arc<dyn Datastore>,
    source: TargetSource<T>,
    include_metadata_changes: bool,
) -> HandlerStream<Option<Snapshot>>
where
    T: Into<ListenTarget> + Clone + Send + Sync + 'static,
{
    let (users, build) = match source {
        TargetSource::Fixed(target) => {
            return datastore
                .listen(target.into(), include_metadata_changes)
                .map(|item| item.map(Some))
                .boxed();
        }
        TargetSource::PerUser { users, build } => (users, build),
    };

    let state = SwitchState {
        datastore,
        users,
        build,
        include_metadata_changes,
        current: None,
        switch_pending: true,
        users_closed: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.switch_pending {
                state.switch_pending = false;
                let target = {
                    let uid = state.users.borrow_and_update();
                    resolve(&state.build, uid.as_deref())
                };
                state.current = None;
                match target {
                    Some(target) => {
                        state.current = Some(
                            state
                                .datastore
                                .listen(target.into(), state.include_metadata_changes),
                        );
                    }
                    None => return Some((Ok(None), state)),
                }
            }

            let step = match (state.current.as_mut(), state.users_closed) {
                (Some(listener), false) => {
                    let changed = pin!(state.users.changed());
                    match select(listener.next(), changed).await {
                        Either::Left((item, _)) => Step::Item(item),
                        Either::Right((Ok(()), _)) => Step::Switch,
                        Either::Right((Err(_), _)) => Step::UsersClosed,
                    }
                }
                (Some(listener), true) => Step::Item(listener.next().await),
                (None, false) => match state.users.changed().await {
                    Ok(()) => Step::Switch,
                    Err(_) => return None,
                },
                (None, true) => return None,
            };

            match step {
                Step::Item(Some(item)) => return Some((item.map(Some), state)),
                Step::Item(None) => return None,
                Step::Switch => state.switch_pending = true,
                Step::UsersClosed => state.users_closed = true,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentKey, InMemoryDatastore, Query};
    use std::time::Duration;
    use tokio::time::timeout;

    fn user_doc(uid: &str) -> StoreResult<DocumentKey> {
        DocumentKey::from_string(&format!("users/{uid}"))
    }

    async fn next(stream: &mut HandlerStream<Option<Snapshot>>) -> Option<Snapshot> {
        timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("snapshot in time")
            .expect("stream open")
            .expect("no error")
    }

    #[tokio::test]
    async fn per_user_source_switches_with_auth() {
        let store = InMemoryDatastore::new();
        let datastore: Arc<dyn Datastore> = Arc::new(store.clone());
        let auth = AuthState::new();
        let source = TargetSource::per_user(&auth, user_doc);
        let mut snapshots = listen_target_stream(Arc::clone(&datastore), source, false);

        assert!(next(&mut snapshots).await.is_none());

        auth.sign_in("alice");
        let first = next(&mut snapshots).await.unwrap();
        assert_eq!(first.references(), vec![DocumentKey::from_string("users/alice").unwrap()]);

        auth.sign_in("bob");
        let second = next(&mut snapshots).await.unwrap();
        assert_eq!(second.references(), vec![DocumentKey::from_string("users/bob").unwrap()]);
        assert_eq!(store.active_listeners(), 1);

        auth.sign_out();
        assert!(next(&mut snapshots).await.is_none());
        assert_eq!(store.active_listeners(), 0);
    }

    #[tokio::test]
    async fn fixed_source_wraps_listener() {
        let datastore: Arc<dyn Datastore> = Arc::new(InMemoryDatastore::new());
        let query = Query::collection("locations").unwrap();
        let mut snapshots =
            listen_target_stream(datastore, TargetSource::Fixed(query), false);
        let snapshot = next(&mut snapshots).await.unwrap();
        assert!(snapshot.references().is_empty());
    }

    #[test]
    fn current_resolves_per_user_target() {
        let auth = AuthState::new();
        let source = TargetSource::per_user(&auth, user_doc);
        assert!(source.current().is_none());
        auth.sign_in("carol");
        assert_eq!(source.current().unwrap().id(), "carol");
    }
}
