//! Geographic to planar projection and fit-to-bounds math

use crate::camera::Viewport;
use geo::{Coord, Rect};
use std::f64::consts::{FRAC_PI_4, PI};

/// Latitude limit applied before projecting (the projection diverges at ±90°)
pub const MAX_LATITUDE: f64 = 85.0;

/// Whole-world bounds as `[min_lon, min_lat, max_lon, max_lat]`
pub const WORLD_BOUNDS: [f64; 4] = [-180.0, -MAX_LATITUDE, 180.0, MAX_LATITUDE];

/// Cylindrical (Mercator-style) projection onto a fixed reference plane
///
/// Longitude maps linearly onto `[0, width]`; latitude 0 maps onto `height / 2`
/// with north pointing towards smaller `y`, matching screen orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Projection {
    width: f64,
    height: f64,
}

impl Default for Projection {
    fn default() -> Self {
        Self::new(1000.0, 600.0)
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Projection {
    /// Create a projection onto a `width` x `height` reference plane
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Project WGS84 degrees onto the reference plane
    ///
    /// Undefined at ±90° latitude; use [`Projection::project_clamped`] for untrusted input.
    #[inline(always)]
    pub fn project(&self, lat: f64, lon: f64) -> Coord<f64> {
        let x = (lon + 180.0) * self.width / 360.0;
        let y =
            self.height / 2.0 - self.width * (FRAC_PI_4 + lat * PI / 360.0).tan().ln() / (2.0 * PI);
        Coord { x, y }
    }

    /// Project after clamping latitude to `±MAX_LATITUDE`
    #[inline(always)]
    pub fn project_clamped(&self, lat: f64, lon: f64) -> Coord<f64> {
        self.project(lat.clamp(-MAX_LATITUDE, MAX_LATITUDE), lon)
    }

    /// Inverse of [`Projection::project`], returning `(lat, lon)` in degrees
    pub fn unproject(&self, point: Coord<f64>) -> (f64, f64) {
        let lon = point.x * 360.0 / self.width - 180.0;
        let k = (self.height / 2.0 - point.y) * 2.0 * PI / self.width;
        let lat = (k.exp().atan() - FRAC_PI_4) * 360.0 / PI;
        (lat, lon)
    }

    /// Compute a viewport that shows `bounds` (x = lon, y = lat) on a canvas
    ///
    /// The box is centered and scaled so it fills `margin` (e.g. 0.9) of the tighter
    /// canvas axis. Returns `None` for a degenerate box or canvas.
    pub fn fit_to(&self, bounds: Rect<f64>, canvas: (f64, f64), margin: f64) -> Option<Viewport> {
        let (canvas_w, canvas_h) = canvas;
        if !(canvas_w > 0.0 && canvas_h > 0.0 && margin > 0.0) {
            return None;
        }

        // North-west and south-east corners; y grows southwards
        let top_left = self.project_clamped(bounds.max().y, bounds.min().x);
        let bottom_right = self.project_clamped(bounds.min().y, bounds.max().x);

        let projected_w = bottom_right.x - top_left.x;
        let projected_h = bottom_right.y - top_left.y;
        if !(projected_w > 0.0 && projected_h > 0.0) {
            return None;
        }

        let zoom = (canvas_w / projected_w).min(canvas_h / projected_h) * margin;
        let width = canvas_w / zoom;
        let height = canvas_h / zoom;
        let center_x = (top_left.x + bottom_right.x) / 2.0;
        let center_y = (top_left.y + bottom_right.y) / 2.0;

        Viewport::new(center_x - width / 2.0, center_y - height / 2.0, width, height)
    }
}

/// Whole-world bounds as a `geo::Rect` (x = lon, y = lat)
pub fn world_rect() -> Rect<f64> {
    let [min_lon, min_lat, max_lon, max_lat] = WORLD_BOUNDS;
    Rect::new(
        Coord {
            x: min_lon,
            y: min_lat,
        },
        Coord {
            x: max_lon,
            y: max_lat,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Rect<f64> {
        Rect::new(
            Coord {
                x: min_lon,
                y: min_lat,
            },
            Coord {
                x: max_lon,
                y: max_lat,
            },
        )
    }

    #[test]
    fn test_project_origin_is_center() {
        let projection = Projection::new(1000.0, 600.0);
        let point = projection.project(0.0, 0.0);
        assert!((point.x - 500.0).abs() < 1e-9);
        assert!((point.y - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_project_longitude_is_linear() {
        let projection = Projection::new(360.0, 200.0);
        assert!((projection.project(0.0, -180.0).x - 0.0).abs() < 1e-9);
        assert!((projection.project(0.0, 90.0).x - 270.0).abs() < 1e-9);
        assert!((projection.project(0.0, 180.0).x - 360.0).abs() < 1e-9);
    }

    #[test]
    fn test_north_is_up() {
        let projection = Projection::default();
        let north = projection.project(45.0, 0.0);
        let south = projection.project(-45.0, 0.0);
        assert!(north.y < south.y);
        // Symmetric around the equator
        let center = projection.height() / 2.0;
        assert!(((center - north.y) - (south.y - center)).abs() < 1e-9);
    }

    #[test]
    fn test_project_clamped_stays_finite_at_poles() {
        let projection = Projection::default();
        let north = projection.project_clamped(90.0, 10.0);
        let south = projection.project_clamped(-90.0, 10.0);
        assert!(north.x.is_finite() && north.y.is_finite());
        assert!(south.x.is_finite() && south.y.is_finite());
        assert_eq!(north, projection.project(MAX_LATITUDE, 10.0));
    }

    #[test]
    fn test_unproject_roundtrip() {
        let projection = Projection::default();
        let (lat, lon) = (51.5074, -0.1278);
        let point = projection.project(lat, lon);
        let (lat2, lon2) = projection.unproject(point);
        assert!((lat - lat2).abs() < 1e-9);
        assert!((lon - lon2).abs() < 1e-9);
    }

    #[test]
    fn test_fit_to_contains_projected_corners() {
        let projection = Projection::default();
        let canvas = (800.0, 500.0);
        let boxes = [
            bbox(-10.0, 35.0, 30.0, 60.0),
            bbox(100.0, -45.0, 155.0, -10.0),
            bbox(-0.5, 51.2, 0.3, 51.7),
            bbox(-180.0, -85.0, 180.0, 85.0),
        ];

        for bounds in boxes {
            let viewport = projection.fit_to(bounds, canvas, 0.9).unwrap();
            let top_left = projection.project(bounds.max().y, bounds.min().x);
            let bottom_right = projection.project(bounds.min().y, bounds.max().x);
            assert!(viewport.contains(top_left), "{bounds:?}");
            assert!(viewport.contains(bottom_right), "{bounds:?}");

            // The tighter axis keeps a 10% margin
            let fill_w = (bottom_right.x - top_left.x) / viewport.width();
            let fill_h = (bottom_right.y - top_left.y) / viewport.height();
            assert!((fill_w.max(fill_h) - 0.9).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fit_to_keeps_canvas_aspect() {
        let projection = Projection::default();
        let viewport = projection
            .fit_to(bbox(-10.0, 35.0, 30.0, 60.0), (800.0, 400.0), 0.9)
            .unwrap();
        assert!((viewport.width() / viewport.height() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_to_degenerate_box_is_none() {
        let projection = Projection::default();
        assert!(projection.fit_to(bbox(5.0, 5.0, 5.0, 10.0), (800.0, 500.0), 0.9).is_none());
        assert!(projection.fit_to(bbox(5.0, 5.0, 10.0, 5.0), (800.0, 500.0), 0.9).is_none());
        assert!(projection.fit_to(bbox(-10.0, 35.0, 30.0, 60.0), (0.0, 500.0), 0.9).is_none());
    }

    #[test]
    fn test_world_rect() {
        let world = world_rect();
        assert_eq!(world.min().x, -180.0);
        assert_eq!(world.max().y, MAX_LATITUDE);
    }
}
