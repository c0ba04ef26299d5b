//! Viewport and camera operations
//!
//! The camera owns the visible planar rectangle and the screen size it is drawn onto.
//! All screen coordinates are pixels relative to the canvas' top-left corner.

use crate::projection::world_rect;
use crate::{FeatureCollection, Projection};
use geo::{Coord, Rect};

/// Visible rectangle in planar units; width and height are always positive and finite
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Viewport {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl Viewport {
    /// Create a viewport, rejecting non-positive or non-finite dimensions
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Option<Self> {
        let valid = x.is_finite()
            && y.is_finite()
            && width.is_finite()
            && height.is_finite()
            && width > 0.0
            && height > 0.0;
        valid.then_some(Self {
            x,
            y,
            width,
            height,
        })
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.height
    }

    #[inline]
    pub fn center(&self) -> Coord<f64> {
        Coord {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    /// Whether a planar point lies inside (edges included)
    pub fn contains(&self, point: Coord<f64>) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.x,
                y: self.y,
            },
            Coord {
                x: self.x + self.width,
                y: self.y + self.height,
            },
        )
    }
}

/// Optional zoom limits, expressed as viewport widths in planar units
///
/// Both limits are unset by default, which leaves zoom unbounded apart from the
/// degenerate-viewport guard.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraConfig {
    /// Smallest allowed viewport width (maximum zoom in)
    pub min_width: Option<f64>,
    /// Largest allowed viewport width (maximum zoom out)
    pub max_width: Option<f64>,
}

/// Owner of the visible viewport
#[derive(Debug, Clone)]
pub struct Camera {
    viewport: Viewport,
    screen: (f64, f64),
    projection: Projection,
    config: CameraConfig,
    fit_margin: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Camera {
    /// Create a camera showing the whole world on a `screen` sized canvas
    ///
    /// Invalid screen sizes fall back to the projection's reference size.
    pub fn new(
        projection: Projection,
        screen: (f64, f64),
        config: CameraConfig,
        fit_margin: f64,
    ) -> Self {
        let screen = if screen.0 > 0.0 && screen.1 > 0.0 {
            screen
        } else {
            (projection.width(), projection.height())
        };
        let viewport = Viewport::new(0.0, 0.0, projection.width(), projection.height())
            .unwrap_or(Viewport {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
            });
        let mut camera = Self {
            viewport,
            screen,
            projection,
            config,
            fit_margin,
        };
        camera.fit_to_world();
        camera
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[inline]
    pub fn screen_size(&self) -> (f64, f64) {
        self.screen
    }

    #[inline]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Planar units per screen pixel along each axis
    #[inline]
    pub fn scale(&self) -> (f64, f64) {
        (
            self.viewport.width / self.screen.0,
            self.viewport.height / self.screen.1,
        )
    }

    /// Map a screen position into planar space
    #[inline]
    pub fn screen_to_planar(&self, screen_x: f64, screen_y: f64) -> Coord<f64> {
        let (sx, sy) = self.scale();
        Coord {
            x: self.viewport.x + screen_x * sx,
            y: self.viewport.y + screen_y * sy,
        }
    }

    /// Map a planar point onto the screen
    #[inline]
    pub fn planar_to_screen(&self, point: Coord<f64>) -> Coord<f64> {
        let (sx, sy) = self.scale();
        Coord {
            x: (point.x - self.viewport.x) / sx,
            y: (point.y - self.viewport.y) / sy,
        }
    }

    /// Resize the canvas, keeping the top-left corner and the pixel scale
    pub fn set_screen_size(&mut self, width: f64, height: f64) {
        if !(width > 0.0 && height > 0.0) || (width, height) == self.screen {
            return;
        }
        let (sx, sy) = self.scale();
        if let Some(viewport) =
            Viewport::new(self.viewport.x, self.viewport.y, width * sx, height * sy)
        {
            self.viewport = viewport;
            self.screen = (width, height);
        }
    }

    /// Translate by a screen-space drag delta
    ///
    /// Content follows the pointer: dragging right moves the viewport left.
    pub fn pan_by(&mut self, dx_screen: f64, dy_screen: f64) {
        let (sx, sy) = self.scale();
        let candidate = Viewport::new(
            self.viewport.x - dx_screen * sx,
            self.viewport.y - dy_screen * sy,
            self.viewport.width,
            self.viewport.height,
        );
        self.apply(candidate);
    }

    /// Scale the viewport by `factor` around a screen position
    ///
    /// `factor > 1` zooms out. The planar point under the cursor stays under the
    /// cursor. Returns `false` when the zoom was rejected.
    pub fn zoom_at(&mut self, screen_x: f64, screen_y: f64, factor: f64) -> bool {
        if !(factor.is_finite() && factor > 0.0) {
            tracing::warn!("Rejected zoom factor {}", factor);
            return false;
        }

        let mut new_width = self.viewport.width * factor;
        if let Some(min) = self.config.min_width {
            new_width = new_width.max(min);
        }
        if let Some(max) = self.config.max_width {
            new_width = new_width.min(max);
        }
        let applied = new_width / self.viewport.width;
        let new_height = self.viewport.height * applied;

        let point = self.screen_to_planar(screen_x, screen_y);
        let candidate = Viewport::new(
            point.x - screen_x * (new_width / self.screen.0),
            point.y - screen_y * (new_height / self.screen.1),
            new_width,
            new_height,
        );
        let accepted = self.apply(candidate);
        if !accepted {
            tracing::warn!("Rejected zoom to degenerate viewport (factor {})", factor);
        }
        accepted
    }

    /// Fit a geographic box (x = lon, y = lat); degenerate boxes are ignored
    pub fn fit_to_bounds(&mut self, bounds: Rect<f64>) -> bool {
        let candidate = self
            .projection
            .fit_to(bounds, self.screen, self.fit_margin);
        let fitted = self.apply(candidate);
        if fitted {
            tracing::debug!(
                "Fitted to ({:.4}, {:.4}) - ({:.4}, {:.4})",
                bounds.min().x,
                bounds.min().y,
                bounds.max().x,
                bounds.max().y
            );
        }
        fitted
    }

    /// Fit all features, or the whole world when they have no coordinates
    pub fn fit_to_features(&mut self, collection: &FeatureCollection) -> bool {
        match collection.bounds() {
            Some(bounds) => self.fit_to_bounds(bounds),
            None => self.fit_to_world(),
        }
    }

    pub fn fit_to_world(&mut self) -> bool {
        self.fit_to_bounds(world_rect())
    }

    fn apply(&mut self, candidate: Option<Viewport>) -> bool {
        match candidate {
            Some(viewport) => {
                self.viewport = viewport;
                true
            }
            None => false,
        }
    }
}
