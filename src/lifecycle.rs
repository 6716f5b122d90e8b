//! App foreground/background notifications.

use std::sync::{Mutex, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Started,
    Stopped,
}

/// Receives app lifecycle transitions.
pub trait LifecycleObserver: Send + Sync {
    /// The app came to the foreground.
    fn on_start(&self);

    /// The app went to the background.
    fn on_stop(&self);
}

/// Process-wide lifecycle owner.
///
/// Observers are held weakly and called synchronously, in registration order,
/// on the thread that reports the transition.
pub struct AppLifecycle {
    state: Mutex<LifecycleState>,
    observers: Mutex<Vec<Weak<dyn LifecycleObserver>>>,
}

impl AppLifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState::Created),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap()
    }

    /// Registers `observer`. If the app is already started the observer gets
    /// `on_start` immediately.
    pub fn observe(&self, observer: Weak<dyn LifecycleObserver>) {
        let started = self.state() == LifecycleState::Started;
        let live = observer.upgrade();
        self.observers.lock().unwrap().push(observer);
        if started {
            if let Some(observer) = live {
                observer.on_start();
            }
        }
    }

    pub fn start(&self) {
        if !self.transition(LifecycleState::Started) {
            return;
        }
        log::debug!("app lifecycle: started");
        for observer in self.live_observers() {
            observer.on_start();
        }
    }

    pub fn stop(&self) {
        if !self.transition(LifecycleState::Stopped) {
            return;
        }
        log::debug!("app lifecycle: stopped");
        for observer in self.live_observers() {
            observer.on_stop();
        }
    }

    pub fn observer_count(&self) -> usize {
        self.live_observers().len()
    }

    fn transition(&self, next: LifecycleState) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state == next {
            return false;
        }
        *state = next;
        true
    }

    fn live_observers(&self) -> Vec<std::sync::Arc<dyn LifecycleObserver>> {
        let mut observers = self.observers.lock().unwrap();
        observers.retain(|observer| observer.strong_count() > 0);
        observers.iter().filter_map(Weak::upgrade).collect()
    }
}

impl Default for AppLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
