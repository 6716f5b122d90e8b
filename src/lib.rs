//! Reactive cache/cloud synchronisation for entities stored in a document
//! database.
//!
//! Each entity stream publishes two [`sync::DataStatus`] values: the latest
//! value known locally (cache or server) and the latest value confirmed by the
//! server. Streams are restarted when the app comes to the foreground and torn
//! down when it goes to the background.
//!
//! - [`store`]: document paths, queries, snapshots, write batches and the
//!   [`store::Datastore`] boundary, with an in-memory implementation.
//! - [`sync`]: snapshot handlers, [`sync::DataFlow`] and [`sync::DataStore`].
//! - [`sources`]: typed data sources for users, paths, sensor events and
//!   preferences.
//! - [`services`]: wires the sources to one datastore, auth state and lifecycle.

pub mod auth;
pub mod config;
pub mod lifecycle;
pub mod services;
pub mod sources;
pub mod store;
pub mod sync;
