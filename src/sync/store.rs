use tokio::sync::watch;

use crate::lifecycle::AppLifecycle;
use crate::store::{DocumentKey, WriteBatch};
use crate::sync::flow::DataFlow;
use crate::sync::handler::SnapshotHandler;
use crate::sync::outcome::WriteOutcome;
use crate::sync::status::DataStatus;
use crate::sync::view::StatusView;

/// A [`DataFlow`] that starts listening the first time its status is observed.
///
/// Every status accessor starts a listener when none is running, including
/// after a listener ended on an error. Reading a status from outside a tokio
/// runtime starts nothing.
#[derive(Clone, Debug)]
pub struct DataStore<H: SnapshotHandler> {
    flow: DataFlow<H>,
}

impl<H: SnapshotHandler> DataStore<H> {
    pub fn new(name: impl Into<String>, handler: H) -> Self {
        Self {
            flow: DataFlow::new(name, handler),
        }
    }

    pub fn flow(&self) -> &DataFlow<H> {
        &self.flow
    }

    pub fn handler(&self) -> &H {
        self.flow.handler()
    }

    fn ensure_started(&self) {
        if !self.flow.is_listening() {
            self.flow.refresh();
        }
    }

    pub fn data_status(&self) -> watch::Receiver<DataStatus<H::Data>> {
        self.ensure_started();
        self.flow.data_status()
    }

    pub fn cloud_data_status(&self) -> watch::Receiver<DataStatus<H::Data>> {
        self.ensure_started();
        self.flow.cloud_data_status()
    }

    pub fn data(&self) -> StatusView<H::Data, Option<H::Data>> {
        self.ensure_started();
        self.flow.data()
    }

    pub fn data_loading(&self) -> StatusView<H::Data, Option<bool>> {
        self.ensure_started();
        self.flow.data_loading()
    }

    pub fn cloud_data(&self) -> StatusView<H::Data, Option<H::Data>> {
        self.ensure_started();
        self.flow.cloud_data()
    }

    pub fn cloud_data_loading(&self) -> StatusView<H::Data, Option<bool>> {
        self.ensure_started();
        self.flow.cloud_data_loading()
    }

    pub fn refresh(&self) -> bool {
        self.flow.refresh()
    }

    pub fn reset(&self) {
        self.flow.reset();
    }

    pub fn bind_lifecycle(&self, lifecycle: &AppLifecycle) {
        self.flow.bind_lifecycle(lifecycle);
    }

    pub fn is_listening(&self) -> bool {
        self.flow.is_listening()
    }

    pub async fn data_references(&self) -> Option<Vec<DocumentKey>> {
        self.flow.data_references().await
    }

    pub async fn delete_data(&self, batch: Option<&mut WriteBatch>) -> WriteOutcome<usize> {
        self.flow.delete_data(batch).await
    }
}
