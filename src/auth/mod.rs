//! Signed-in user notifications.
//!
//! The sync layer only needs the identifier of the current user; credential
//! handling stays with the identity provider.

use std::sync::Arc;

use tokio::sync::watch;

/// Holds the identifier of the signed-in user and broadcasts every change.
#[derive(Clone, Debug)]
pub struct AuthState {
    current: Arc<watch::Sender<Option<String>>>,
}

impl AuthState {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(None);
        Self {
            current: Arc::new(sender),
        }
    }

    /// Creates a state that starts out signed in as `uid`.
    pub fn signed_in(uid: impl Into<String>) -> Self {
        let state = Self::new();
        state.sign_in(uid);
        state
    }

    pub fn sign_in(&self, uid: impl Into<String>) {
        let uid = uid.into();
        log::debug!("auth state changed: signed in as {uid}");
        self.current.send_replace(Some(uid));
    }

    pub fn sign_out(&self) {
        if self.current.send_replace(None).is_some() {
            log::debug!("auth state changed: signed out");
        }
    }

    pub fn current_user(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Receiver observing the current user id; the current value is marked unseen.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        let mut receiver = self.current.subscribe();
        receiver.mark_changed();
        receiver
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}
