//! Choropleth Library - Core Engine for Interactive Region Maps
//!
//! This library turns vector boundary data (countries, provinces, districts) into
//! drawable planar outlines, joins tabular rows onto those regions, reduces the joined
//! values per region and colors every region on a two-color scale. A [`MapSession`]
//! owns the whole interactive state and consumes pointer events.
//!
//! # Architecture
//!
//! - **[`Projection`]**: Cylindrical geo → planar mapping and fit-to-bounds math
//! - **[`FeatureCollection`]**: Typed features decoded from a FeatureCollection document
//! - **[`Outline`]**: Projected outline of one feature, holes subtracted
//! - **[`Camera`]**: Visible planar rectangle with pan, zoom-to-cursor and fit
//! - **[`aggregate`]**: Join + group + reduce over rows
//! - **[`color_for`]**: Linear choropleth color interpolation
//! - **[`StyleOverlay`]**: Manual per-feature styles on top of computed colors
//! - **[`MapSession`]**: Interaction state machine tying everything together
//!
//! # Performance Characteristics
//!
//! - **Load**: O(V) projection over all vertices, parallel across features
//! - **Aggregation**: O(R + F) for R rows and F features, only on data changes
//! - **Pan / Zoom**: O(1) camera update, no re-projection or re-aggregation

mod aggregate;
mod camera;
mod color;
mod feature;
pub mod insight;
mod outline;
mod projection;
mod session;
mod style;

// Public API exports
pub use aggregate::{
    AggregationResult, Aggregator, JoinSpec, Table, TableRow, ValueRange, aggregate, rows_for_key,
};
pub use camera::{Camera, CameraConfig, Viewport};
pub use color::{LegendStop, NEUTRAL_FALLBACK, Palette, Rgb, color_for, legend_stops};
pub use feature::{FeatureCollection, FeatureGeometry, GeoFeature, Properties, Scalar};
pub use outline::{Outline, compile_all, compile_outline};
pub use projection::{MAX_LATITUDE, Projection, WORLD_BOUNDS, world_rect};
pub use session::{
    Config, FeatureStyle, HoverState, InteractionMode, Legend, MapSession, PointerEvent, Popup,
    PopupContent,
};
pub use style::{DEFAULT_STROKE, DEFAULT_STROKE_WIDTH, StyleOverlay, StyleOverride};

/// Error types for the engine
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Not a FeatureCollection: {0}")]
    NotAFeatureCollection(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid table: {0}")]
    InvalidTable(String),

    #[error("Invalid color '{0}', expected #rrggbb")]
    InvalidColor(String),

    #[error("Unknown aggregator '{0}'")]
    UnknownAggregator(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MapError>;
