use geo_types::LineString;
use std::io::Write;

use super::{MapSurface, PolylineStyle};
use crate::entities::GeoPoint;

#[derive(Clone, Debug, PartialEq)]
pub enum Overlay {
    Marker {
        position: GeoPoint,
        title: String,
    },
    Polyline {
        points: Vec<GeoPoint>,
        color: String,
        width: f32,
    },
}

/// Text rendering of the map: every invalidate writes one frame listing the
/// camera and the overlays.
pub struct TerminalSurface<W: Write> {
    out: W,
    overlays: Vec<Overlay>,
    camera: Option<(GeoPoint, f64)>,
    camera_moves: usize,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            overlays: vec![],
            camera: None,
            camera_moves: 0,
        }
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn camera_moves(&self) -> usize {
        self.camera_moves
    }

    fn write_frame(&mut self) -> std::io::Result<()> {
        writeln!(self.out, "----- map -----")?;

        if let Some((center, zoom)) = self.camera {
            writeln!(
                self.out,
                "camera  {:.6},{:.6} z{}",
                center.latitude, center.longitude, zoom
            )?;
        }

        for overlay in &self.overlays {
            match overlay {
                Overlay::Marker { position, title } => writeln!(
                    self.out,
                    "marker  {:.6},{:.6}  {}",
                    position.latitude, position.longitude, title
                )?,
                Overlay::Polyline {
                    points,
                    color,
                    width,
                } => {
                    writeln!(
                        self.out,
                        "route   {} points  {} w{}",
                        points.len(),
                        color,
                        width
                    )?;
                    for point in points {
                        writeln!(self.out, "        {:.6},{:.6}", point.latitude, point.longitude)?;
                    }
                }
            }
        }

        self.out.flush()
    }
}

impl<W: Write> MapSurface for TerminalSurface<W> {
    fn clear_overlays(&mut self) {
        self.overlays.clear();
    }

    fn add_marker(&mut self, position: GeoPoint, title: &str) {
        self.overlays.push(Overlay::Marker {
            position,
            title: title.into(),
        });
    }

    fn add_polyline(&mut self, line: &LineString<f64>, style: &PolylineStyle) {
        self.overlays.push(Overlay::Polyline {
            points: line.points().map(GeoPoint::from).collect(),
            color: style.color.into(),
            width: style.width,
        });
    }

    fn animate_to(&mut self, center: GeoPoint, zoom: f64) {
        self.camera = Some((center, zoom));
        self.camera_moves += 1;
    }

    fn invalidate(&mut self) {
        if let Err(err) = self.write_frame() {
            tracing::warn!("failed to draw map: {}", err);
        }
    }
}

#[test]
fn frames_list_camera_and_overlays() {
    use super::{MapView, Viewport, DESTINATION_TITLE, ORIGIN_TITLE};

    let a = GeoPoint::new_unchecked(40.0, -3.0);
    let b = GeoPoint::new_unchecked(40.01, -3.01);
    let mut view = MapView::new(
        TerminalSurface::new(Vec::new()),
        Viewport::new(a, 16.0, 100.0, 100.0),
    );

    view.render(Some(a), Some(a), Some(b), Some(&[a, b][..]));

    let frame = String::from_utf8(view.surface_mut().out.split_off(0)).unwrap();
    assert!(frame.contains("camera  40.000000,-3.000000 z16"));
    assert!(frame.contains(&format!("marker  40.000000,-3.000000  {}", ORIGIN_TITLE)));
    assert!(frame.contains(&format!("marker  40.010000,-3.010000  {}", DESTINATION_TITLE)));
    assert!(frame.contains("route   2 points  #3F51B5 w12"));
}
