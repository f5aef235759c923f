use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{GeoPoint, RouteState};
use crate::error::{empty_result_error, invalid_invocation_error, Error, ErrorKind};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Status {
    NoPermission,
    AwaitingLocation,
    Ready,
}

impl Status {
    pub fn name(&self) -> String {
        match self {
            Self::NoPermission => "no_permission".into(),
            Self::AwaitingLocation => "awaiting_location".into(),
            Self::Ready => "ready".into(),
        }
    }
}

/// A route request that has been handed to the directions service.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouteRequest {
    pub token: Uuid,
    pub start: GeoPoint,
    pub end: GeoPoint,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppState {
    pub status: Status,
    pub current_location: Option<GeoPoint>,
    pub route: RouteState,
    pub pending: Option<Uuid>,
    pub last_route_error: Option<ErrorKind>,
}

impl AppState {
    pub fn new(has_permission: bool) -> Self {
        let status = match has_permission {
            true => Status::AwaitingLocation,
            false => Status::NoPermission,
        };

        Self {
            status,
            current_location: None,
            route: RouteState::default(),
            pending: None,
            last_route_error: None,
        }
    }

    /// Applies persisted state; fields missing from storage keep their value.
    pub fn hydrate(&mut self, saved: RouteState) {
        if let Some(origin) = saved.origin {
            self.route.origin = Some(origin);
        }
        if let Some(destination) = saved.destination {
            self.route.destination = Some(destination);
        }
        if let Some(path) = saved.path {
            self.route.path = Some(path);
        }
    }

    #[tracing::instrument(skip(self), fields(status = %self.status.name()))]
    pub fn grant_permission(&mut self) -> Result<(), Error> {
        match self.status {
            Status::NoPermission => {
                self.status = Status::AwaitingLocation;
                Ok(())
            }
            _ => Err(invalid_invocation_error()),
        }
    }

    #[tracing::instrument(skip(self), fields(status = %self.status.name()))]
    pub fn deny_permission(&mut self) -> Result<(), Error> {
        match self.status {
            Status::NoPermission => Ok(()),
            _ => Err(invalid_invocation_error()),
        }
    }

    /// A location lookup may start once permission has been granted.
    pub fn can_request_location(&self) -> bool {
        self.status != Status::NoPermission
    }

    #[tracing::instrument(skip(self), fields(status = %self.status.name()))]
    pub fn set_location(&mut self, location: GeoPoint) -> Result<(), Error> {
        match self.status {
            Status::AwaitingLocation | Status::Ready => {
                self.status = Status::Ready;
                self.current_location = Some(location);
                self.route.origin = Some(location);
                Ok(())
            }
            Status::NoPermission => Err(invalid_invocation_error()),
        }
    }

    #[tracing::instrument(skip(self), fields(status = %self.status.name()))]
    pub fn tap(&mut self, destination: GeoPoint) -> Result<(), Error> {
        match self.status {
            Status::Ready => {
                self.route.destination = Some(destination);
                self.route.path = None;
                self.pending = None;
                self.last_route_error = None;
                Ok(())
            }
            _ => Err(invalid_invocation_error()),
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn begin_route(&mut self) -> Result<RouteRequest, Error> {
        match (self.route.origin, self.route.destination) {
            (Some(start), Some(end)) => {
                let token = Uuid::new_v4();
                self.pending = Some(token);
                self.last_route_error = None;

                Ok(RouteRequest { token, start, end })
            }
            _ => Err(invalid_invocation_error()),
        }
    }

    /// Applies a route result. Returns `false` when the token is stale.
    #[tracing::instrument(skip(self, result))]
    pub fn complete_route(&mut self, token: Uuid, result: Result<Vec<GeoPoint>, Error>) -> bool {
        if self.pending != Some(token) {
            return false;
        }

        self.pending = None;

        let result = result.and_then(|points| match points.is_empty() {
            true => Err(empty_result_error()),
            false => Ok(points),
        });

        match result {
            Ok(points) => {
                self.route.path = Some(points);
                self.last_route_error = None;
            }
            Err(err) => {
                self.route.path = None;
                self.last_route_error = Some(err.kind());
            }
        }

        true
    }

    #[tracing::instrument(skip(self))]
    pub fn clear(&mut self) {
        self.route.destination = None;
        self.route.path = None;
        self.pending = None;
        self.last_route_error = None;
    }
}

#[cfg(test)]
fn ready_at(origin: GeoPoint) -> AppState {
    let mut state = AppState::new(true);
    state.set_location(origin).unwrap();
    state
}

#[test]
fn permission_flow() {
    let mut state = AppState::new(false);
    assert_eq!(state.status, Status::NoPermission);

    state.deny_permission().unwrap();
    assert_eq!(state.status, Status::NoPermission);
    assert!(!state.can_request_location());

    state.grant_permission().unwrap();
    assert_eq!(state.status, Status::AwaitingLocation);
    assert!(state.grant_permission().is_err());

    let here = GeoPoint::new_unchecked(40.0, -3.0);
    state.set_location(here).unwrap();
    assert_eq!(state.status, Status::Ready);
    assert_eq!(state.current_location, Some(here));
    assert_eq!(state.route.origin, Some(here));
}

#[test]
fn tap_requires_ready() {
    let mut state = AppState::new(true);
    let err = state.tap(GeoPoint::new_unchecked(1.0, 1.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInvocation);
    assert_eq!(state.route.destination, None);
}

#[test]
fn new_destination_clears_path() {
    let a = GeoPoint::new_unchecked(40.0, -3.0);
    let b = GeoPoint::new_unchecked(40.01, -3.01);
    let mut state = ready_at(a);
    state.route.destination = Some(b);
    state.route.path = Some(vec![a, b]);

    state.tap(GeoPoint::new_unchecked(40.02, -3.02)).unwrap();
    assert_eq!(state.route.path, None);
    assert_eq!(
        state.route.destination,
        Some(GeoPoint::new_unchecked(40.02, -3.02))
    );
}

#[test]
fn route_needs_both_points() {
    let mut state = AppState::new(true);
    assert!(state.begin_route().is_err());

    let mut state = ready_at(GeoPoint::new_unchecked(40.0, -3.0));
    assert!(state.begin_route().is_err());
    assert_eq!(state.pending, None);
}

#[test]
fn stale_route_results_are_dropped() {
    let a = GeoPoint::new_unchecked(40.0, -3.0);
    let mut state = ready_at(a);
    state.tap(GeoPoint::new_unchecked(40.01, -3.01)).unwrap();

    let first = state.begin_route().unwrap();
    state.tap(GeoPoint::new_unchecked(40.02, -3.02)).unwrap();
    assert!(!state.complete_route(first.token, Ok(vec![a])));
    assert_eq!(state.route.path, None);

    let second = state.begin_route().unwrap();
    let third = state.begin_route().unwrap();
    assert!(!state.complete_route(second.token, Ok(vec![a])));
    assert!(state.complete_route(third.token, Ok(vec![a, first.end])));
    assert_eq!(state.route.path, Some(vec![a, first.end]));
    assert_eq!(state.pending, None);
}

#[test]
fn failed_or_empty_route_means_no_route() {
    let mut state = ready_at(GeoPoint::new_unchecked(40.0, -3.0));
    state.tap(GeoPoint::new_unchecked(40.01, -3.01)).unwrap();

    let request = state.begin_route().unwrap();
    assert!(state.complete_route(request.token, Ok(vec![])));
    assert_eq!(state.route.path, None);
    assert_eq!(state.last_route_error, Some(ErrorKind::EmptyResult));

    let request = state.begin_route().unwrap();
    assert_eq!(state.last_route_error, None);
    assert!(state.complete_route(request.token, Err(crate::error::network_error("down"))));
    assert_eq!(state.route.path, None);
    assert_eq!(state.last_route_error, Some(ErrorKind::Network));
}

#[test]
fn clear_keeps_origin() {
    let a = GeoPoint::new_unchecked(40.0, -3.0);
    let mut state = ready_at(a);
    state.tap(GeoPoint::new_unchecked(40.01, -3.01)).unwrap();
    let request = state.begin_route().unwrap();

    state.clear();
    assert_eq!(state.route, RouteState::new(Some(a), None, None));
    assert!(!state.complete_route(request.token, Ok(vec![a])));
}

#[test]
fn hydrate_only_overwrites_present_fields() {
    let a = GeoPoint::new_unchecked(40.0, -3.0);
    let b = GeoPoint::new_unchecked(41.0, -4.0);
    let mut state = ready_at(a);

    state.hydrate(RouteState::new(None, Some(b), Some(vec![a, b])));
    assert_eq!(state.route, RouteState::new(Some(a), Some(b), Some(vec![a, b])));
}
