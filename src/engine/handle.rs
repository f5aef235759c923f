use async_channel::Sender;
use tokio::sync::watch;

use super::{Event, Snapshot};

use crate::{
    entities::GeoPoint,
    error::{unexpected_error, Error},
};

/// Cloneable front door to a running [`super::Engine`].
#[derive(Clone)]
pub struct EngineHandle {
    sender: Sender<Event>,
    snapshots: watch::Receiver<Snapshot>,
}

impl EngineHandle {
    pub(super) fn new(sender: Sender<Event>, snapshots: watch::Receiver<Snapshot>) -> Self {
        Self { sender, snapshots }
    }

    async fn send(&self, event: Event) -> Result<(), Error> {
        self.sender.send(event).await.map_err(|_| {
            tracing::error!("engine is not running");
            unexpected_error()
        })
    }

    pub async fn grant_permission(&self) -> Result<(), Error> {
        self.send(Event::GrantPermission).await
    }

    pub async fn deny_permission(&self) -> Result<(), Error> {
        self.send(Event::DenyPermission).await
    }

    pub async fn request_location(&self) -> Result<(), Error> {
        self.send(Event::RequestLocation).await
    }

    pub async fn tap(&self, point: GeoPoint) -> Result<(), Error> {
        self.send(Event::Tap(point)).await
    }

    /// Non-blocking variant of [`EngineHandle::tap`] for synchronous callers
    /// such as map tap callbacks.
    pub fn try_tap(&self, point: GeoPoint) -> Result<(), Error> {
        self.sender.try_send(Event::Tap(point)).map_err(|_| {
            tracing::error!("engine is not running");
            unexpected_error()
        })
    }

    pub async fn compute_route(&self) -> Result<(), Error> {
        self.send(Event::ComputeRoute).await
    }

    pub async fn clear(&self) -> Result<(), Error> {
        self.send(Event::Clear).await
    }

    pub async fn shutdown(&self) -> Result<(), Error> {
        self.send(Event::Shutdown).await
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Waits until a published snapshot satisfies `predicate`.
    pub async fn wait_for<F>(&self, predicate: F) -> Result<Snapshot, Error>
    where
        F: Fn(&Snapshot) -> bool,
    {
        let mut snapshots = self.snapshots.clone();

        loop {
            {
                let snapshot = snapshots.borrow_and_update();
                if predicate(&snapshot) {
                    return Ok(snapshot.clone());
                }
            }

            snapshots.changed().await.map_err(|_| unexpected_error())?;
        }
    }
}
