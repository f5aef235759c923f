use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use palaksa::api::{fetch_walking_route, RouteAPI};
use palaksa::db::SqliteStore;
use palaksa::engine::{Engine, EngineHandle, Snapshot};
use palaksa::entities::{GeoPoint, RouteState, Status};
use palaksa::error::ErrorKind;
use palaksa::external::{location::ManualLocation, openrouteservice::OpenRouteService};
use palaksa::persistence::PersistenceStore;

const API_KEY: &str = "test-key";

type Requests = Arc<Mutex<Vec<HashMap<String, String>>>>;

async fn directions(
    Extension(requests): Extension<Requests>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    requests.lock().unwrap().push(params.clone());

    if params.get("api_key").map(String::as_str) != Some(API_KEY) {
        return (StatusCode::FORBIDDEN, Json(json!({"error": "bad key"}))).into_response();
    }

    match params.get("end").map(String::as_str) {
        Some("-3.01,40.01") => Json(json!({
            "type": "FeatureCollection",
            "features": [
                { "geometry": { "coordinates": [[-3.0, 40.0], [-3.005, 40.005], [-3.01, 40.01]] } },
                { "geometry": { "coordinates": [[0.0, 0.0]] } }
            ]
        }))
        .into_response(),
        Some("0,0") => Json(json!({ "features": [] })).into_response(),
        Some("1,1") => "<html>gateway</html>".into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
    }
}

async fn spawn_directions_service() -> (String, Requests) {
    let requests: Requests = Arc::new(Mutex::new(Vec::new()));

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new()
        .route("/v2/directions/foot-walking", get(directions))
        .layer(Extension(requests.clone()));

    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service())
            .await
            .unwrap();
    });

    (format!("http://{}", addr), requests)
}

fn local_service(base: impl Into<String>, api_key: &str) -> OpenRouteService {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    OpenRouteService::with_client(client, base, api_key)
}

fn point(latitude: f64, longitude: f64) -> GeoPoint {
    GeoPoint::new(latitude, longitude).unwrap()
}

async fn wait_for<F>(handle: &EngineHandle, predicate: F) -> Snapshot
where
    F: Fn(&Snapshot) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), handle.wait_for(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .unwrap()
}

#[tokio::test]
async fn walking_route_swaps_coordinate_order() {
    let (base, requests) = spawn_directions_service().await;
    let service = local_service(base, API_KEY);

    let points = service
        .walking_route(point(40.0, -3.0), point(40.01, -3.01))
        .await
        .unwrap();

    assert_eq!(
        points,
        vec![point(40.0, -3.0), point(40.005, -3.005), point(40.01, -3.01)]
    );

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["api_key"], API_KEY);
    assert_eq!(requests[0]["start"], "-3,40");
    assert_eq!(requests[0]["end"], "-3.01,40.01");
}

#[tokio::test]
async fn no_features_is_an_empty_route() {
    let (base, _) = spawn_directions_service().await;
    let service = local_service(base, API_KEY);

    let points = service
        .walking_route(point(40.0, -3.0), point(0.0, 0.0))
        .await
        .unwrap();
    assert!(points.is_empty());
}

#[tokio::test]
async fn failures_have_kinds_and_collapse_to_empty() {
    let (base, _) = spawn_directions_service().await;
    let service = local_service(base.clone(), API_KEY);
    let start = point(40.0, -3.0);

    let err = service.walking_route(start, point(2.0, 2.0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);

    let err = service.walking_route(start, point(1.0, 1.0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);

    let rejected = local_service(base, "wrong-key");
    let err = rejected
        .walking_route(start, point(40.01, -3.01))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert!(fetch_walking_route(&service, start, point(2.0, 2.0)).await.is_empty());
    assert!(fetch_walking_route(&rejected, start, point(40.01, -3.01))
        .await
        .is_empty());
}

#[tokio::test]
async fn unreachable_service_is_a_network_error() {
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let service = local_service(format!("http://{}", addr), API_KEY);

    let err = service
        .walking_route(point(40.0, -3.0), point(40.01, -3.01))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn tap_route_and_restart() {
    let (base, _) = spawn_directions_service().await;
    let store = Arc::new(
        SqliteStore::new("sqlite::memory:", 1, "PalaksaPrefs")
            .await
            .unwrap(),
    );
    let persistence = PersistenceStore::new(store.clone());
    let routes = Arc::new(local_service(base, API_KEY));

    let origin = point(40.0, -3.0);
    let destination = point(40.01, -3.01);

    let (engine, handle) = Engine::new(
        false,
        persistence.clone(),
        routes.clone(),
        Arc::new(ManualLocation::new(Some(origin))),
    )
    .await;
    let task = tokio::spawn(engine.run());

    handle.grant_permission().await.unwrap();
    wait_for(&handle, |s| s.status == Status::Ready).await;

    handle.tap(destination).await.unwrap();
    let snapshot = wait_for(&handle, |s| s.route.destination == Some(destination)).await;
    assert_eq!(snapshot.route.path, None);

    handle.compute_route().await.unwrap();
    let snapshot = wait_for(&handle, |s| s.route.path.is_some()).await;
    let expected = RouteState::new(
        Some(origin),
        Some(destination),
        Some(vec![origin, point(40.005, -3.005), destination]),
    );
    assert_eq!(snapshot.route, expected);
    assert_eq!(persistence.load().await.unwrap(), expected);

    handle.shutdown().await.unwrap();
    task.await.unwrap();

    let (engine, handle) = Engine::new(
        false,
        persistence.clone(),
        routes,
        Arc::new(ManualLocation::new(None)),
    )
    .await;
    assert_eq!(handle.snapshot().status, Status::NoPermission);
    assert_eq!(handle.snapshot().route, expected);

    let task = tokio::spawn(engine.run());
    handle.clear().await.unwrap();
    wait_for(&handle, |s| s.route.destination.is_none()).await;
    assert_eq!(persistence.load().await.unwrap(), RouteState::default());

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}
