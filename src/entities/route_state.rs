use serde::{Deserialize, Serialize};

use crate::entities::GeoPoint;

/// Origin, destination and the walking path between them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteState {
    pub origin: Option<GeoPoint>,
    pub destination: Option<GeoPoint>,
    pub path: Option<Vec<GeoPoint>>,
}

impl RouteState {
    pub fn new(
        origin: Option<GeoPoint>,
        destination: Option<GeoPoint>,
        path: Option<Vec<GeoPoint>>,
    ) -> Self {
        Self {
            origin,
            destination,
            path,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.origin.is_none() && self.destination.is_none() && self.path.is_none()
    }

    /// A path is only usable when both endpoints are known and it has points.
    pub fn has_route(&self) -> bool {
        self.origin.is_some()
            && self.destination.is_some()
            && self.path.as_ref().map_or(false, |path| !path.is_empty())
    }

    pub fn can_compute_route(&self) -> bool {
        self.origin.is_some() && self.destination.is_some()
    }
}

#[test]
fn empty_path_is_not_a_route() {
    let a = GeoPoint::new_unchecked(1.0, 2.0);
    let b = GeoPoint::new_unchecked(3.0, 4.0);

    assert!(!RouteState::new(Some(a), Some(b), Some(vec![])).has_route());
    assert!(!RouteState::new(None, Some(b), Some(vec![a, b])).has_route());
    assert!(RouteState::new(Some(a), Some(b), Some(vec![a, b])).has_route());
    assert!(RouteState::default().is_empty());
}
