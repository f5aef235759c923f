use geo_types::{Coord, Point};
use serde::{Deserialize, Serialize};

use crate::error::{invalid_input_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Builds a point, rejecting coordinates outside [-90, 90] x [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, Error> {
        if !Self::is_valid(latitude, longitude) {
            return Err(invalid_input_error());
        }

        Ok(Self::new_unchecked(latitude, longitude))
    }

    pub const fn new_unchecked(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(latitude: f64, longitude: f64) -> bool {
        (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
    }
}

impl From<GeoPoint> for Point<f64> {
    fn from(point: GeoPoint) -> Self {
        Point::new(point.longitude, point.latitude)
    }
}

impl From<Point<f64>> for GeoPoint {
    fn from(point: Point<f64>) -> Self {
        GeoPoint::new_unchecked(point.y(), point.x())
    }
}

impl From<GeoPoint> for Coord<f64> {
    fn from(point: GeoPoint) -> Self {
        Coord {
            x: point.longitude,
            y: point.latitude,
        }
    }
}

#[test]
fn rejects_out_of_range_coordinates() {
    assert!(GeoPoint::new(91.0, 0.0).is_err());
    assert!(GeoPoint::new(0.0, -180.5).is_err());
    assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    assert_eq!(
        GeoPoint::new(-90.0, 180.0).unwrap(),
        GeoPoint::new_unchecked(-90.0, 180.0)
    );
}

#[test]
fn geo_types_use_lon_lat_order() {
    let point: Point<f64> = GeoPoint::new_unchecked(40.0, -3.0).into();
    assert_eq!(point.x(), -3.0);
    assert_eq!(point.y(), 40.0);
    assert_eq!(GeoPoint::from(point), GeoPoint::new_unchecked(40.0, -3.0));
}
