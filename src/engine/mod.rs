mod handle;
mod location_api;
mod route_api;

pub use handle::EngineHandle;

use async_channel::{Receiver, Sender};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    api::{DynLocationAPI, DynRouteAPI},
    entities::{AppState, GeoPoint, RouteState, Status},
    error::{Error, ErrorKind},
    persistence::PersistenceStore,
};

/// Everything the engine reacts to. UI actions come from an [`EngineHandle`];
/// `LocationResolved` and `RouteResolved` are posted by the engine's own
/// background lookups on a separate channel, so the engine stops once every
/// handle is gone.
#[derive(Debug)]
pub enum Event {
    GrantPermission,
    DenyPermission,
    RequestLocation,
    LocationResolved(Result<Option<GeoPoint>, Error>),
    Tap(GeoPoint),
    ComputeRoute,
    RouteResolved {
        token: Uuid,
        result: Result<Vec<GeoPoint>, Error>,
    },
    Clear,
    Shutdown,
}

/// What observers see after every event.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub status: Status,
    pub current_location: Option<GeoPoint>,
    pub route: RouteState,
    pub routing: bool,
    pub last_route_error: Option<ErrorKind>,
}

impl From<&AppState> for Snapshot {
    fn from(state: &AppState) -> Self {
        Self {
            status: state.status.clone(),
            current_location: state.current_location,
            route: state.route.clone(),
            routing: state.pending.is_some(),
            last_route_error: state.last_route_error,
        }
    }
}

pub struct Engine {
    state: AppState,
    persistence: PersistenceStore,
    routes: DynRouteAPI,
    locations: DynLocationAPI,
    commands: Receiver<Event>,
    sender: Sender<Event>,
    events: Receiver<Event>,
    observers: watch::Sender<Snapshot>,
}

impl Engine {
    /// Builds the engine and hydrates it from storage. Nothing runs until
    /// [`Engine::run`] is awaited.
    #[tracing::instrument(name = "Engine::new", skip(persistence, routes, locations))]
    pub async fn new(
        has_permission: bool,
        persistence: PersistenceStore,
        routes: DynRouteAPI,
        locations: DynLocationAPI,
    ) -> (Self, EngineHandle) {
        let mut state = AppState::new(has_permission);

        match persistence.load().await {
            Ok(saved) if saved.is_empty() => tracing::info!("no saved route"),
            Ok(saved) => state.hydrate(saved),
            Err(err) => tracing::error!("failed to load saved route: {}", err),
        }

        let (commander, commands) = async_channel::unbounded();
        let (sender, events) = async_channel::unbounded();
        let (observers, snapshots) = watch::channel(Snapshot::from(&state));

        let handle = EngineHandle::new(commander, snapshots);
        let engine = Self {
            state,
            persistence,
            routes,
            locations,
            commands,
            sender,
            events,
            observers,
        };

        (engine, handle)
    }

    /// Processes events until [`Event::Shutdown`] or until every handle is
    /// dropped, then writes the state one last time.
    #[tracing::instrument(name = "Engine::run", skip_all)]
    pub async fn run(mut self) {
        if self.state.can_request_location() {
            self.spawn_location_lookup();
        }

        loop {
            let event = tokio::select! {
                command = self.commands.recv() => match command {
                    Ok(Event::Shutdown) | Err(_) => break,
                    Ok(command) => command,
                },
                Ok(result) = self.events.recv() => result,
            };

            self.handle(event).await;
        }

        self.persist().await;
        tracing::info!("engine stopped");
    }

    async fn handle(&mut self, event: Event) {
        let before = self.state.route.clone();

        match event {
            Event::GrantPermission => self.grant_permission(),
            Event::DenyPermission => self.deny_permission(),
            Event::RequestLocation => self.request_location(),
            Event::LocationResolved(result) => self.location_resolved(result),
            Event::Tap(point) => self.tap(point),
            Event::ComputeRoute => self.compute_route(),
            Event::RouteResolved { token, result } => self.route_resolved(token, result),
            Event::Clear => {
                self.clear().await;
                self.publish();
                return;
            }
            Event::Shutdown => return,
        }

        if self.state.route != before {
            self.persist().await;
        }

        self.publish();
    }

    async fn persist(&self) {
        if let Err(err) = self.persistence.save(&self.state.route).await {
            tracing::error!("failed to save route: {}", err);
        }
    }

    fn publish(&self) {
        self.observers.send_replace(Snapshot::from(&self.state));
    }
}

#[cfg(test)]
mod test_support {
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{oneshot, Mutex};

    use super::{Engine, EngineHandle, Snapshot};
    use crate::{
        api::RouteAPI,
        db::MemoryStore,
        entities::GeoPoint,
        error::{unexpected_error, Error},
        external::location::ManualLocation,
        persistence::PersistenceStore,
    };

    type Reply = Result<Vec<GeoPoint>, Error>;

    /// Answers each request once the test releases the reply registered for
    /// that destination.
    #[derive(Default)]
    pub struct ScriptedRoutes {
        replies: Mutex<Vec<(GeoPoint, oneshot::Receiver<Reply>)>>,
    }

    impl ScriptedRoutes {
        pub async fn expect(&self, end: GeoPoint) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().await.push((end, rx));
            tx
        }
    }

    #[async_trait]
    impl RouteAPI for ScriptedRoutes {
        async fn walking_route(&self, _start: GeoPoint, end: GeoPoint) -> Reply {
            let reply = {
                let mut replies = self.replies.lock().await;
                let index = replies.iter().position(|(point, _)| *point == end);
                index.map(|index| replies.remove(index).1)
            };

            match reply {
                Some(rx) => rx.await.unwrap_or_else(|_| Err(unexpected_error())),
                None => Err(unexpected_error()),
            }
        }
    }

    pub struct Harness {
        pub handle: EngineHandle,
        pub memory: Arc<MemoryStore>,
        pub routes: Arc<ScriptedRoutes>,
        pub location: Arc<ManualLocation>,
        pub task: tokio::task::JoinHandle<()>,
    }

    impl Harness {
        pub async fn start(
            has_permission: bool,
            memory: Arc<MemoryStore>,
            fix: Option<GeoPoint>,
        ) -> Self {
            let routes = Arc::new(ScriptedRoutes::default());
            let location = Arc::new(ManualLocation::new(fix));

            let (engine, handle) = Engine::new(
                has_permission,
                PersistenceStore::new(memory.clone()),
                routes.clone(),
                location.clone(),
            )
            .await;
            let task = tokio::spawn(engine.run());

            Self {
                handle,
                memory,
                routes,
                location,
                task,
            }
        }

        pub async fn wait_for<F>(&self, predicate: F) -> Snapshot
        where
            F: Fn(&Snapshot) -> bool,
        {
            tokio::time::timeout(Duration::from_secs(5), self.handle.wait_for(predicate))
                .await
                .expect("timed out waiting for snapshot")
                .unwrap()
        }

        pub async fn stored(&self) -> crate::entities::RouteState {
            PersistenceStore::new(self.memory.clone()).load().await.unwrap()
        }

        pub async fn stop(self) {
            self.handle.shutdown().await.unwrap();
            self.task.await.unwrap();
        }
    }
}

#[cfg(test)]
use test_support::Harness;

#[cfg(test)]
fn point(latitude: f64, longitude: f64) -> GeoPoint {
    GeoPoint::new_unchecked(latitude, longitude)
}

#[tokio::test]
async fn tap_then_route_is_persisted() {
    use crate::db::MemoryStore;
    use std::sync::Arc;

    let origin = point(40.0, -3.0);
    let destination = point(40.01, -3.01);
    let harness = Harness::start(true, Arc::new(MemoryStore::new()), Some(origin)).await;

    harness.wait_for(|s| s.status == Status::Ready).await;
    assert_eq!(harness.stored().await, RouteState::new(Some(origin), None, None));

    harness.handle.tap(destination).await.unwrap();
    let snapshot = harness
        .wait_for(|s| s.route.destination == Some(destination))
        .await;
    assert_eq!(snapshot.route.path, None);

    let path = vec![origin, point(40.005, -3.005), destination];
    let reply = harness.routes.expect(destination).await;
    harness.handle.compute_route().await.unwrap();
    harness.wait_for(|s| s.routing).await;
    reply.send(Ok(path.clone())).unwrap();

    let snapshot = harness.wait_for(|s| s.route.path.is_some()).await;
    assert_eq!(snapshot.route.path.as_ref().map(Vec::len), Some(3));
    assert!(!snapshot.routing);
    assert_eq!(
        harness.stored().await,
        RouteState::new(Some(origin), Some(destination), Some(path))
    );

    harness.stop().await;
}

#[tokio::test]
async fn superseded_route_results_are_discarded() {
    use crate::db::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    let origin = point(40.0, -3.0);
    let first = point(40.01, -3.01);
    let second = point(40.02, -3.02);
    let harness = Harness::start(true, Arc::new(MemoryStore::new()), Some(origin)).await;
    harness.wait_for(|s| s.status == Status::Ready).await;

    let first_reply = harness.routes.expect(first).await;
    let second_reply = harness.routes.expect(second).await;

    harness.handle.tap(first).await.unwrap();
    harness.handle.compute_route().await.unwrap();
    harness.handle.tap(second).await.unwrap();
    harness.handle.compute_route().await.unwrap();
    harness
        .wait_for(|s| s.route.destination == Some(second) && s.routing)
        .await;

    first_reply.send(Ok(vec![origin, first])).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    second_reply.send(Ok(vec![origin, second])).unwrap();

    let snapshot = harness.wait_for(|s| !s.routing).await;
    assert_eq!(snapshot.route.path, Some(vec![origin, second]));
    assert_eq!(harness.stored().await.path, Some(vec![origin, second]));

    harness.stop().await;
}

#[tokio::test]
async fn failed_route_leaves_no_path() {
    use crate::db::MemoryStore;
    use crate::error::network_error;
    use std::sync::Arc;

    let origin = point(40.0, -3.0);
    let destination = point(40.01, -3.01);
    let harness = Harness::start(true, Arc::new(MemoryStore::new()), Some(origin)).await;
    harness.wait_for(|s| s.status == Status::Ready).await;

    harness.handle.tap(destination).await.unwrap();
    let reply = harness.routes.expect(destination).await;
    harness.handle.compute_route().await.unwrap();
    harness.wait_for(|s| s.routing).await;
    reply.send(Err(network_error("connection refused"))).unwrap();

    let snapshot = harness.wait_for(|s| !s.routing).await;
    assert_eq!(snapshot.route.path, None);
    assert_eq!(snapshot.last_route_error, Some(ErrorKind::Network));
    assert_eq!(harness.stored().await.path, None);

    harness.stop().await;
}

#[tokio::test]
async fn permission_gates_location() {
    use crate::db::MemoryStore;
    use std::sync::Arc;

    let here = point(40.0, -3.0);
    let harness = Harness::start(false, Arc::new(MemoryStore::new()), Some(here)).await;

    harness.handle.deny_permission().await.unwrap();
    harness.handle.tap(point(1.0, 1.0)).await.unwrap();
    harness.handle.request_location().await.unwrap();
    harness.handle.compute_route().await.unwrap();

    // Commands are handled in order, so once the grant has taken effect the
    // earlier ones have been handled too.
    harness.handle.grant_permission().await.unwrap();
    let snapshot = harness.wait_for(|s| s.status == Status::Ready).await;
    assert_eq!(snapshot.current_location, Some(here));
    assert_eq!(snapshot.route, RouteState::new(Some(here), None, None));
    assert!(!snapshot.routing);
    assert_eq!(snapshot.last_route_error, None);

    harness.stop().await;
}

#[tokio::test]
async fn location_failure_waits_for_a_retry() {
    use crate::db::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    let harness = Harness::start(false, Arc::new(MemoryStore::new()), None).await;
    harness.location.fail("location services disabled").await;

    harness.handle.grant_permission().await.unwrap();
    harness
        .wait_for(|s| s.status == Status::AwaitingLocation)
        .await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(harness.handle.snapshot().status, Status::AwaitingLocation);
    assert_eq!(harness.handle.snapshot().route.origin, None);

    let here = point(40.0, -3.0);
    harness.location.set(here).await;
    harness.handle.request_location().await.unwrap();
    let snapshot = harness.wait_for(|s| s.status == Status::Ready).await;
    assert_eq!(snapshot.route.origin, Some(here));

    harness.stop().await;
}

#[tokio::test]
async fn saved_route_is_restored_and_clear_wipes_storage() {
    use crate::db::MemoryStore;
    use std::sync::Arc;

    let origin = point(40.0, -3.0);
    let destination = point(40.01, -3.01);
    let saved = RouteState::new(Some(origin), Some(destination), Some(vec![origin, destination]));

    let memory = Arc::new(MemoryStore::new());
    PersistenceStore::new(memory.clone())
        .save(&saved)
        .await
        .unwrap();

    let harness = Harness::start(false, memory, None).await;
    assert_eq!(harness.handle.snapshot().route, saved);

    harness.handle.clear().await.unwrap();
    let snapshot = harness
        .wait_for(|s| s.route.destination.is_none())
        .await;
    assert_eq!(snapshot.route, RouteState::new(Some(origin), None, None));
    assert_eq!(harness.memory.len().await, 0);

    harness.stop().await;
}

#[tokio::test]
async fn dropping_every_handle_stops_the_engine_and_saves() {
    use crate::db::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    let origin = point(40.0, -3.0);
    let destination = point(40.01, -3.01);
    let memory = Arc::new(MemoryStore::new());
    PersistenceStore::new(memory.clone())
        .save(&RouteState::new(Some(origin), Some(destination), None))
        .await
        .unwrap();

    let harness = Harness::start(false, memory, None).await;
    harness.handle.clear().await.unwrap();
    harness
        .wait_for(|s| s.route.destination.is_none())
        .await;
    assert_eq!(harness.memory.len().await, 0);

    let Harness {
        handle,
        memory,
        task,
        ..
    } = harness;
    drop(handle);

    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("engine kept running without handles")
        .unwrap();
    assert_eq!(
        PersistenceStore::new(memory).load().await.unwrap(),
        RouteState::new(Some(origin), None, None)
    );
}

#[tokio::test]
async fn stored_path_without_destination_is_not_restored() {
    use crate::db::{Edit, KeyValueStore, MemoryStore};
    use crate::persistence::{KEY_POINT_A, KEY_POINT_B, KEY_ROUTE_POINTS};
    use std::sync::Arc;

    let memory = Arc::new(MemoryStore::new());
    memory
        .apply(vec![
            Edit::Put(KEY_POINT_A.into(), "40,-3".into()),
            Edit::Put(KEY_POINT_B.into(), "garbage".into()),
            Edit::Put(KEY_ROUTE_POINTS.into(), "40,-3|40.01,-3.01".into()),
        ])
        .await
        .unwrap();

    let harness = Harness::start(false, memory, None).await;
    let snapshot = harness.handle.snapshot();
    assert_eq!(snapshot.route.destination, None);
    assert_eq!(snapshot.route.path, None);

    harness.stop().await;
}
