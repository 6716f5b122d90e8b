use std::fmt;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::watch;

use crate::sync::status::DataStatus;

/// Read-only projection of one field of a [`DataStatus`] stream.
///
/// Views are hot: they always reflect the owning flow's latest status and
/// never tear anything down when dropped.
pub struct StatusView<T, V> {
    receiver: watch::Receiver<DataStatus<T>>,
    project: fn(&DataStatus<T>) -> V,
}

impl<T, V> StatusView<T, V>
where
    T: Send + Sync + 'static,
    V: Clone + PartialEq + Send + 'static,
{
    pub(crate) fn new(
        receiver: watch::Receiver<DataStatus<T>>,
        project: fn(&DataStatus<T>) -> V,
    ) -> Self {
        Self { receiver, project }
    }

    /// Current projected value.
    pub fn get(&self) -> V {
        (self.project)(&self.receiver.borrow())
    }

    /// Waits until the projected value differs from its value at the time of
    /// the call. Returns `None` once the owning flow is gone.
    pub async fn changed(&mut self) -> Option<V> {
        let last = (self.project)(&self.receiver.borrow_and_update());
        loop {
            self.receiver.changed().await.ok()?;
            let next = (self.project)(&self.receiver.borrow_and_update());
            if next != last {
                return Some(next);
            }
        }
    }

    /// Waits until the projected value satisfies `predicate`, checking the
    /// current value first.
    pub async fn wait_for(&mut self, predicate: impl Fn(&V) -> bool) -> Option<V> {
        let project = self.project;
        let status = self
            .receiver
            .wait_for(|status| predicate(&project(status)))
            .await
            .ok()?;
        Some(project(&status))
    }

    /// Stream of distinct projected values, starting with the current one.
    pub fn into_stream(self) -> BoxStream<'static, V> {
        let Self { receiver, project } = self;
        stream::unfold(
            (receiver, None::<V>),
            move |(mut receiver, last)| async move {
                loop {
                    if last.is_some() {
                        receiver.changed().await.ok()?;
                    }
                    let next = {
                        let status = receiver.borrow_and_update();
                        project(&status)
                    };
                    if last.as_ref() != Some(&next) {
                        return Some((next.clone(), (receiver, Some(next))));
                    }
                }
            },
        )
        .boxed()
    }
}

impl<T, V> Clone for StatusView<T, V> {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
            project: self.project,
        }
    }
}

impl<T, V> fmt::Debug for StatusView<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusView").finish_non_exhaustive()
    }
}

pub(crate) fn project_data<T: Clone>(status: &DataStatus<T>) -> Option<T> {
    status.data.clone()
}

pub(crate) fn project_loading<T>(status: &DataStatus<T>) -> Option<bool> {
    status.is_loading
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_skips_duplicate_projections() {
        let (sender, receiver) = watch::channel(DataStatus::<u32>::default());
        let view = StatusView::new(receiver, project_loading::<u32>);
        let mut values = view.into_stream();
        assert_eq!(values.next().await, Some(None));

        sender.send_replace(DataStatus::loading());
        assert_eq!(values.next().await, Some(Some(true)));

        sender.send_replace(DataStatus::loaded(Some(1)));
        sender.send_replace(DataStatus::loaded(Some(2)));
        assert_eq!(values.next().await, Some(Some(false)));

        drop(sender);
        assert_eq!(values.next().await, None);
    }

    #[tokio::test]
    async fn wait_for_checks_current_value() {
        let (sender, receiver) = watch::channel(DataStatus::loaded(Some(5u32)));
        let mut view = StatusView::new(receiver, project_data::<u32>);
        assert_eq!(view.wait_for(|data| *data == Some(5)).await, Some(Some(5)));

        let waiter = tokio::spawn(async move { view.wait_for(|data| *data == Some(9)).await });
        sender.send_replace(DataStatus::loaded(Some(9)));
        assert_eq!(waiter.await.unwrap(), Some(Some(9)));
    }

    #[tokio::test]
    async fn changed_ignores_same_projection() {
        let (sender, receiver) = watch::channel(DataStatus::<u32>::loading());
        let mut view = StatusView::new(receiver, project_loading::<u32>);
        let waiter = tokio::spawn(async move { view.changed().await });
        tokio::task::yield_now().await;
        sender.send_replace(DataStatus::loading());
        sender.send_replace(DataStatus::loaded(None));
        assert_eq!(waiter.await.unwrap(), Some(Some(false)));
    }
}
