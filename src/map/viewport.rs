//! Web-Mercator projection between screen pixels and geographic points.

use std::f64::consts::PI;

use crate::entities::GeoPoint;

pub const TILE_SIZE: f64 = 256.0;
pub const MIN_ZOOM: f64 = 3.0;
pub const MAX_ZOOM: f64 = 19.0;
pub const MAX_LATITUDE: f64 = 85.051_128_78;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub center: GeoPoint,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(center: GeoPoint, zoom: f64, width: f64, height: f64) -> Self {
        Self {
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            width,
            height,
        }
    }

    pub fn set_center(&mut self, center: GeoPoint, zoom: f64) {
        self.center = center;
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    fn world_size(&self) -> f64 {
        TILE_SIZE * self.zoom.exp2()
    }

    /// Point under the screen pixel `(x, y)`, origin at the top-left corner.
    pub fn pixel_to_point(&self, x: f64, y: f64) -> GeoPoint {
        let size = self.world_size();
        let (cx, cy) = project(&self.center, size);

        let wx = cx + x - self.width / 2.0;
        let wy = (cy + y - self.height / 2.0).clamp(0.0, size);

        unproject(wx, wy, size)
    }

    pub fn point_to_pixel(&self, point: &GeoPoint) -> (f64, f64) {
        let size = self.world_size();
        let (cx, cy) = project(&self.center, size);
        let (px, py) = project(point, size);

        (px - cx + self.width / 2.0, py - cy + self.height / 2.0)
    }
}

fn project(point: &GeoPoint, size: f64) -> (f64, f64) {
    let latitude = point.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let sin_lat = latitude.to_radians().sin();

    let x = (point.longitude + 180.0) / 360.0 * size;
    let y = (0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * PI)) * size;

    (x, y)
}

fn unproject(x: f64, y: f64, size: f64) -> GeoPoint {
    let longitude = (x / size * 360.0).rem_euclid(360.0) - 180.0;
    let n = PI - 2.0 * PI * y / size;
    let latitude = n.sinh().atan().to_degrees();

    GeoPoint::new_unchecked(latitude, longitude)
}

#[cfg(test)]
fn assert_close(a: GeoPoint, b: GeoPoint) {
    assert!((a.latitude - b.latitude).abs() < 1e-9, "{:?} != {:?}", a, b);
    assert!((a.longitude - b.longitude).abs() < 1e-9, "{:?} != {:?}", a, b);
}

#[test]
fn screen_center_is_the_map_center() {
    let center = GeoPoint::new_unchecked(40.4168, -3.7038);
    let viewport = Viewport::new(center, 16.0, 1080.0, 1920.0);

    assert_close(viewport.pixel_to_point(540.0, 960.0), center);
    assert_eq!(viewport.point_to_pixel(&center), (540.0, 960.0));
}

#[test]
fn pixels_and_points_are_inverse() {
    let viewport = Viewport::new(GeoPoint::new_unchecked(40.0, -3.0), 15.0, 800.0, 600.0);

    for (x, y) in [(0.0, 0.0), (800.0, 600.0), (123.5, 456.25)] {
        let point = viewport.pixel_to_point(x, y);
        let (px, py) = viewport.point_to_pixel(&point);
        assert!((px - x).abs() < 1e-6 && (py - y).abs() < 1e-6);
    }

    let east = viewport.pixel_to_point(800.0, 300.0);
    let north = viewport.pixel_to_point(400.0, 0.0);
    assert!(east.longitude > -3.0);
    assert!(north.latitude > 40.0);
}

#[test]
fn zoom_is_clamped_and_longitude_wraps() {
    let mut viewport = Viewport::new(GeoPoint::new_unchecked(0.0, 179.9), 25.0, 256.0, 256.0);
    assert_eq!(viewport.zoom, MAX_ZOOM);

    viewport.set_center(GeoPoint::new_unchecked(0.0, 179.9), 0.0);
    assert_eq!(viewport.zoom, MIN_ZOOM);

    let beyond = viewport.pixel_to_point(256.0, 128.0);
    assert!(beyond.longitude < 0.0 && beyond.longitude >= -180.0);
}

#[test]
fn center_tap_keeps_the_center_longitude() {
    let madrid = GeoPoint::new_unchecked(40.4168, -3.7038);
    let viewport = Viewport::new(madrid, 16.0, 1080.0, 1920.0);

    let tapped = viewport.pixel_to_point(540.0, 960.0);
    assert!((tapped.longitude + 3.7038).abs() < 1e-9, "{:?}", tapped);

    let west = viewport.pixel_to_point(0.0, 960.0);
    assert!(west.longitude < -3.7038 && west.longitude > -3.8);
}
