use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use futures::stream::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::lifecycle::{AppLifecycle, LifecycleObserver};
use crate::store::{DocumentKey, SnapshotMetadata, WriteBatch};
use crate::sync::handler::{HandlerStream, SnapshotHandler};
use crate::sync::outcome::WriteOutcome;
use crate::sync::status::DataStatus;
use crate::sync::view::{project_data, project_loading, StatusView};

/// Reactive dual-status view over one snapshot handler.
///
/// The local status follows every snapshot, cached ones included; the cloud
/// status only follows snapshots confirmed by the server. At most one listener
/// job runs at a time, and a superseded job never publishes.
pub struct DataFlow<H: SnapshotHandler> {
    inner: Arc<FlowInner<H>>,
}

struct FlowInner<H: SnapshotHandler> {
    name: String,
    handler: H,
    local: watch::Sender<DataStatus<H::Data>>,
    cloud: watch::Sender<DataStatus<H::Data>>,
    job: Mutex<ListenerJob>,
    this: Weak<FlowInner<H>>,
}

#[derive(Default)]
struct ListenerJob {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl<H: SnapshotHandler> DataFlow<H> {
    pub fn new(name: impl Into<String>, handler: H) -> Self {
        let name = name.into();
        let (local, _) = watch::channel(DataStatus::default());
        let (cloud, _) = watch::channel(DataStatus::default());
        let inner = Arc::new_cyclic(|this| FlowInner {
            name,
            handler,
            local,
            cloud,
            job: Mutex::new(ListenerJob::default()),
            this: this.clone(),
        });
        Self { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn handler(&self) -> &H {
        &self.inner.handler
    }

    /// Restarts the listener unless a cloud load is already in flight. A job
    /// that ended on an error no longer counts as in flight.
    ///
    /// Returns `true` when a new listener job was started. Must be called from
    /// within a tokio runtime.
    pub fn refresh(&self) -> bool {
        self.inner.refresh()
    }

    /// Stops the listener and returns both statuses to their initial state.
    pub fn reset(&self) {
        self.inner.reset();
    }

    pub fn on_start(&self) {
        self.inner.on_start();
    }

    pub fn on_stop(&self) {
        self.inner.on_stop();
    }

    /// Follows `lifecycle`: restart on foreground, stop on background.
    ///
    /// The registration is weak, so it does not keep the flow alive.
    pub fn bind_lifecycle(&self, lifecycle: &AppLifecycle) {
        let observer: Weak<FlowInner<H>> = Arc::downgrade(&self.inner);
        lifecycle.observe(observer);
    }

    pub fn is_listening(&self) -> bool {
        self.inner
            .job
            .lock()
            .unwrap()
            .handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn data_status(&self) -> watch::Receiver<DataStatus<H::Data>> {
        self.inner.local.subscribe()
    }

    pub fn cloud_data_status(&self) -> watch::Receiver<DataStatus<H::Data>> {
        self.inner.cloud.subscribe()
    }

    pub fn current_status(&self) -> DataStatus<H::Data> {
        self.inner.local.borrow().clone()
    }

    pub fn current_cloud_status(&self) -> DataStatus<H::Data> {
        self.inner.cloud.borrow().clone()
    }

    pub fn data(&self) -> StatusView<H::Data, Option<H::Data>> {
        StatusView::new(self.data_status(), project_data)
    }

    pub fn data_loading(&self) -> StatusView<H::Data, Option<bool>> {
        StatusView::new(self.data_status(), project_loading)
    }

    pub fn cloud_data(&self) -> StatusView<H::Data, Option<H::Data>> {
        StatusView::new(self.cloud_data_status(), project_data)
    }

    pub fn cloud_data_loading(&self) -> StatusView<H::Data, Option<bool>> {
        StatusView::new(self.cloud_data_status(), project_loading)
    }

    /// First reference list backing this flow, `None` if none became available.
    pub async fn data_references(&self) -> Option<Vec<DocumentKey>> {
        self.inner.handler.references().next().await
    }

    /// Deletes every document backing this flow.
    pub async fn delete_data(&self, batch: Option<&mut WriteBatch>) -> WriteOutcome<usize> {
        self.inner.handler.delete_references(batch).await
    }
}

impl<H: SnapshotHandler> Clone for DataFlow<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: SnapshotHandler> fmt::Debug for DataFlow<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFlow")
            .field("name", &self.inner.name)
            .field("local_loading", &self.inner.local.borrow().is_loading)
            .field("cloud_loading", &self.inner.cloud.borrow().is_loading)
            .finish_non_exhaustive()
    }
}

impl<H: SnapshotHandler> FlowInner<H> {
    fn refresh(&self) -> bool {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                log::warn!("{}: refresh requested outside of a tokio runtime", self.name);
                return false;
            }
        };

        let mut job = self.job.lock().unwrap();
        let in_flight = job
            .handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        if in_flight && self.cloud.borrow().is_loading == Some(true) {
            log::debug!("{}: refresh suppressed, cloud load in progress", self.name);
            return false;
        }

        self.reset_locked(&mut job);
        self.local.send_replace(DataStatus::loading());
        self.cloud.send_replace(DataStatus::loading());

        let objects = self.handler.data_objects();
        job.handle = Some(runtime.spawn(run_listener(
            self.this.clone(),
            job.generation,
            objects,
        )));
        log::debug!("{}: listener started (generation {})", self.name, job.generation);
        true
    }

    fn reset(&self) {
        let mut job = self.job.lock().unwrap();
        self.reset_locked(&mut job);
        log::debug!("{}: reset", self.name);
    }

    fn reset_locked(&self, job: &mut ListenerJob) {
        job.generation = job.generation.wrapping_add(1);
        if let Some(handle) = job.handle.take() {
            handle.abort();
        }
        self.handler.reset_references();
        self.local.send_replace(DataStatus::default());
        self.cloud.send_replace(DataStatus::default());
    }

    /// Publishes one payload. Returns `false` once `generation` is stale.
    fn process_data(&self, generation: u64, data: Option<H::Data>, metadata: SnapshotMetadata) -> bool {
        let job = self.job.lock().unwrap();
        if job.generation != generation {
            return false;
        }
        if metadata.from_cache() {
            self.local.send_replace(DataStatus::loaded(data));
        } else {
            self.local.send_replace(DataStatus::loaded(data.clone()));
            self.cloud.send_replace(DataStatus::loaded(data));
        }
        true
    }
}

impl<H: SnapshotHandler> LifecycleObserver for FlowInner<H> {
    fn on_start(&self) {
        self.reset();
        self.refresh();
    }

    fn on_stop(&self) {
        self.reset();
    }
}

impl<H: SnapshotHandler> Drop for FlowInner<H> {
    fn drop(&mut self) {
        if let Ok(job) = self.job.get_mut() {
            if let Some(handle) = job.handle.take() {
                handle.abort();
            }
        }
    }
}

async fn run_listener<H: SnapshotHandler>(
    flow: Weak<FlowInner<H>>,
    generation: u64,
    mut objects: HandlerStream<(Option<H::Data>, SnapshotMetadata)>,
) {
    while let Some(item) = objects.next().await {
        let Some(flow) = flow.upgrade() else {
            return;
        };
        match item {
            Ok((data, metadata)) => {
                if !flow.process_data(generation, data, metadata) {
                    return;
                }
            }
            Err(err) => {
                log::warn!("{}: listener stopped: {err}", flow.name);
                return;
            }
        }
    }
}
