mod terminal;
mod viewport;

pub use terminal::{Overlay, TerminalSurface};
pub use viewport::{Viewport, MAX_ZOOM, MIN_ZOOM};

use geo_types::LineString;

use crate::{engine::Snapshot, entities::GeoPoint};

pub const ORIGIN_TITLE: &str = "Your location (Point A)";
pub const DESTINATION_TITLE: &str = "Destination (Point B)";
pub const CENTER_ZOOM: f64 = 16.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolylineStyle {
    pub color: &'static str,
    pub width: f32,
}

pub const ROUTE_STYLE: PolylineStyle = PolylineStyle {
    color: "#3F51B5",
    width: 12.0,
};

/// The drawing primitives of a map widget.
pub trait MapSurface {
    fn clear_overlays(&mut self);
    fn add_marker(&mut self, position: GeoPoint, title: &str);
    fn add_polyline(&mut self, line: &LineString<f64>, style: &PolylineStyle);
    fn animate_to(&mut self, center: GeoPoint, zoom: f64);
    fn invalidate(&mut self);
}

type TapCallback = Box<dyn FnMut(GeoPoint) + Send>;

/// Draws route state onto a [`MapSurface`] and turns screen taps into points.
pub struct MapView<S: MapSurface> {
    surface: S,
    viewport: Viewport,
    centered: bool,
    on_tap: Option<TapCallback>,
}

impl<S: MapSurface> MapView<S> {
    pub fn new(surface: S, viewport: Viewport) -> Self {
        Self {
            surface,
            viewport,
            centered: false,
            on_tap: None,
        }
    }

    pub fn on_tap<F>(&mut self, callback: F)
    where
        F: FnMut(GeoPoint) + Send + 'static,
    {
        self.on_tap = Some(Box::new(callback));
    }

    /// Single tap at screen pixel `(x, y)`.
    pub fn tap(&mut self, x: f64, y: f64) -> GeoPoint {
        let point = self.viewport.pixel_to_point(x, y);

        if let Some(callback) = self.on_tap.as_mut() {
            callback(point);
        }

        point
    }

    /// Replaces every marker and polyline with the given state. The camera
    /// moves to the first current location it sees and is left alone
    /// afterwards.
    pub fn render(
        &mut self,
        current_location: Option<GeoPoint>,
        origin: Option<GeoPoint>,
        destination: Option<GeoPoint>,
        path: Option<&[GeoPoint]>,
    ) {
        self.surface.clear_overlays();

        if let (false, Some(location)) = (self.centered, current_location) {
            self.viewport.set_center(location, CENTER_ZOOM);
            self.surface.animate_to(location, self.viewport.zoom);
            self.centered = true;
        }

        if let Some(origin) = origin {
            self.surface.add_marker(origin, ORIGIN_TITLE);
        }

        if let Some(destination) = destination {
            self.surface.add_marker(destination, DESTINATION_TITLE);
        }

        if let Some(path) = path.filter(|path| !path.is_empty()) {
            let line: LineString<f64> = path.iter().map(|&point| geo_types::Coord::from(point)).collect();
            self.surface.add_polyline(&line, &ROUTE_STYLE);
        }

        self.surface.invalidate();
    }

    pub fn render_snapshot(&mut self, snapshot: &Snapshot) {
        self.render(
            snapshot.current_location,
            snapshot.route.origin,
            snapshot.route.destination,
            snapshot.route.path.as_deref(),
        );
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

#[cfg(test)]
fn test_view() -> MapView<TerminalSurface<Vec<u8>>> {
    let viewport = Viewport::new(GeoPoint::new_unchecked(0.0, 0.0), 3.0, 1080.0, 1920.0);
    MapView::new(TerminalSurface::new(Vec::new()), viewport)
}

#[test]
fn render_is_idempotent() {
    let a = GeoPoint::new_unchecked(40.0, -3.0);
    let b = GeoPoint::new_unchecked(40.01, -3.01);
    let path = vec![a, GeoPoint::new_unchecked(40.005, -3.004), b];

    let mut view = test_view();
    view.render(Some(a), Some(a), Some(b), Some(path.as_slice()));
    let first = view.surface().overlays().to_vec();
    view.render(Some(a), Some(a), Some(b), Some(path.as_slice()));

    assert_eq!(view.surface().overlays(), first.as_slice());
    assert_eq!(first.len(), 3);
    assert_eq!(
        first[2],
        Overlay::Polyline {
            points: path.clone(),
            color: ROUTE_STYLE.color.into(),
            width: ROUTE_STYLE.width,
        }
    );

    view.render(Some(a), Some(a), None, None);
    assert_eq!(
        view.surface().overlays(),
        &[Overlay::Marker {
            position: a,
            title: ORIGIN_TITLE.into()
        }]
    );
}

#[test]
fn empty_path_draws_no_polyline() {
    let a = GeoPoint::new_unchecked(40.0, -3.0);
    let b = GeoPoint::new_unchecked(40.01, -3.01);

    let mut view = test_view();
    view.render(Some(a), Some(a), Some(b), Some(&[]));
    assert!(view
        .surface()
        .overlays()
        .iter()
        .all(|overlay| matches!(overlay, Overlay::Marker { .. })));
}

#[test]
fn camera_centers_once() {
    let a = GeoPoint::new_unchecked(40.0, -3.0);
    let b = GeoPoint::new_unchecked(41.0, -4.0);

    let mut view = test_view();
    view.render(None, None, None, None);
    assert_eq!(view.surface().camera_moves(), 0);

    view.render(Some(a), Some(a), None, None);
    view.render(Some(b), Some(b), None, None);
    assert_eq!(view.surface().camera_moves(), 1);
    assert_eq!(view.viewport().center, a);
    assert_eq!(view.viewport().zoom, CENTER_ZOOM);
}

#[test]
fn taps_report_map_points() {
    use std::sync::{Arc, Mutex};

    let a = GeoPoint::new_unchecked(40.0, -3.0);
    let tapped = Arc::new(Mutex::new(Vec::new()));

    let mut view = test_view();
    let sink = tapped.clone();
    view.on_tap(move |point| sink.lock().unwrap().push(point));
    view.render(Some(a), Some(a), None, None);

    let center = view.tap(540.0, 960.0);
    let east = view.tap(1000.0, 960.0);

    assert!((center.latitude - 40.0).abs() < 1e-9);
    assert!((center.longitude + 3.0).abs() < 1e-9);
    assert!(east.longitude > center.longitude);
    assert_eq!(*tapped.lock().unwrap(), vec![center, east]);
}

#[test]
fn camera_follows_the_current_location_not_a_restored_origin() {
    let restored = GeoPoint::new_unchecked(41.0, -4.0);
    let here = GeoPoint::new_unchecked(40.0, -3.0);

    let mut view = test_view();
    view.render(None, Some(restored), None, None);
    assert_eq!(view.surface().camera_moves(), 0);

    view.render(Some(here), Some(here), None, None);
    assert_eq!(view.surface().camera_moves(), 1);
    assert_eq!(view.viewport().center, here);
}
