//! Reactive cache/cloud synchronisation on top of [`crate::store`].

pub mod chunked;
mod flow;
pub mod handler;
mod outcome;
mod status;
mod store;
mod view;

#[cfg(test)]
pub(crate) mod test_support;

pub use chunked::{chunk_in_values, delete_where_in, where_in_chunks};
pub use flow::DataFlow;
pub use handler::{
    derived_references, DocumentHandler, HandlerStream, QueryHandler, ReferenceCache,
    SnapshotHandler, TargetBuilder, TargetSource,
};
pub use outcome::WriteOutcome;
pub use status::DataStatus;
pub use store::DataStore;
pub use view::StatusView;
