//! MapSession - Interaction state machine and owner of all per-session state
//!
//! A session holds the loaded features with their compiled outlines, the camera, the
//! current table and join, the computed choropleth colors, manual styles, and the
//! selection / hover / popup state. Input arrives as [`PointerEvent`]s; every
//! mutation that changes what is on screen raises the redraw flag.

use crate::aggregate::rows_for_key;
use crate::{
    AggregationResult, Camera, CameraConfig, FeatureCollection, GeoFeature, JoinSpec, Outline,
    Palette, Projection, Properties, Result, Rgb, StyleOverlay, StyleOverride, Table, TableRow,
    ValueRange, aggregate, compile_all, DEFAULT_STROKE, DEFAULT_STROKE_WIDTH, NEUTRAL_FALLBACK,
};
use geo::{Coord, Intersects};
use serde_json::Value;

/// Session configuration
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Reference plane of the projection
    pub projection_width: f64,
    pub projection_height: f64,
    /// Ramp used for aggregated values
    pub palette: Palette,
    /// Preferred fill of features without an aggregated value; replaced when the
    /// palette's ramp passes too close to it
    pub fallback_fill: Rgb,
    /// Share of the canvas a fitted box fills (0.9 leaves a 10% margin)
    pub fit_margin: f64,
    /// Zoom factor per wheel notch
    pub zoom_step: f64,
    pub camera: CameraConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            projection_width: 1000.0,
            projection_height: 600.0,
            palette: Palette::default(),
            fallback_fill: NEUTRAL_FALLBACK,
            fit_margin: 0.9,
            zoom_step: 1.1,
            camera: CameraConfig::default(),
        }
    }
}

/// Pointer input in screen pixels relative to the canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// Button pressed; primary presses select a feature or start a pan
    Down { position: Coord<f64>, primary: bool },
    Move { position: Coord<f64> },
    Up { position: Coord<f64> },
    /// Pointer left the canvas
    Leave,
    /// Positive `delta_y` zooms out
    Wheel { position: Coord<f64>, delta_y: f64 },
}

/// Pan state; hover and selection are tracked independently
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InteractionMode {
    #[default]
    Idle,
    Panning { last: Coord<f64> },
}

/// Feature under the pointer
#[derive(Debug, Clone, PartialEq)]
pub struct HoverState {
    pub feature_index: usize,
    pub feature_id: String,
    pub position: Coord<f64>,
}

/// What a popup lists
#[derive(Debug, Clone, PartialEq)]
pub enum PopupContent {
    /// Table rows joined to the feature
    Rows(Vec<TableRow>),
    /// The feature's own properties (no join, or no matching rows)
    Properties(Properties),
}

/// Click-opened details of a feature
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub feature_index: usize,
    pub feature_id: String,
    pub content: PopupContent,
    /// Screen position, kept in sync with the camera
    pub position: Coord<f64>,
    /// Planar point that was clicked
    anchor: Coord<f64>,
}

/// Resolved drawing style of one feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureStyle {
    pub fill: Rgb,
    pub stroke: Rgb,
    pub stroke_width: f32,
    pub selected: bool,
    pub hovered: bool,
}

/// Data needed to draw a legend
#[derive(Debug, Clone, PartialEq)]
pub struct Legend {
    pub join: JoinSpec,
    pub range: ValueRange,
    pub palette: Palette,
    pub fallback: Rgb,
    /// Features that received a value
    pub matched: usize,
}

/// Interactive state of one map view
pub struct MapSession {
    config: Config,
    features: FeatureCollection,
    outlines: Vec<Outline>,
    camera: Camera,
    table: Table,
    join: Option<JoinSpec>,
    aggregation: Option<AggregationResult>,
    /// Choropleth color per feature index
    choropleth: Vec<Option<Rgb>>,
    /// "No data" fill resolved against the current palette
    fallback: Rgb,
    styles: StyleOverlay,
    selection: Option<usize>,
    hover: Option<HoverState>,
    popup: Option<Popup>,
    mode: InteractionMode,
    redraw: bool,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl MapSession {
    /// Create an empty session showing the whole world
    pub fn new(config: Config) -> Self {
        let projection = Projection::new(config.projection_width, config.projection_height);
        let camera = Camera::new(
            projection,
            (config.projection_width, config.projection_height),
            config.camera,
            config.fit_margin,
        );
        let fallback = config.palette.fallback(config.fallback_fill);
        Self {
            config,
            features: FeatureCollection::default(),
            outlines: Vec::new(),
            camera,
            table: Table::default(),
            join: None,
            aggregation: None,
            choropleth: Vec::new(),
            fallback,
            styles: StyleOverlay::new(),
            selection: None,
            hover: None,
            popup: None,
            mode: InteractionMode::Idle,
            redraw: true,
        }
    }

    // ------------------------------------------------------------------
    // Loading and data
    // ------------------------------------------------------------------

    /// Load a decoded FeatureCollection document
    ///
    /// On error nothing changes and the previous features stay on screen.
    pub fn load_features(&mut self, document: &Value) -> Result<()> {
        match FeatureCollection::from_json(document) {
            Ok(collection) => {
                self.replace_features(collection);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Rejected boundary load, keeping previous state: {}", e);
                Err(e)
            }
        }
    }

    /// Replace the feature collection and reset everything tied to it
    ///
    /// Selection, hover, popup, manual styles and the join are cleared even when
    /// the new features reuse ids. The camera fits the new features.
    pub fn replace_features(&mut self, collection: FeatureCollection) {
        self.outlines = compile_all(&collection, self.camera.projection());
        self.features = collection;

        self.selection = None;
        self.hover = None;
        self.popup = None;
        self.styles.clear_all();
        self.join = None;
        self.mode = InteractionMode::Idle;
        self.recompute();

        self.camera.fit_to_features(&self.features);
        self.redraw = true;

        tracing::info!(
            "Loaded {} features ({} vertices)",
            self.features.len(),
            self.outlines.iter().map(Outline::vertex_count).sum::<usize>()
        );
    }

    /// Replace the table rows and re-run the join
    pub fn set_table(&mut self, table: Table) {
        tracing::info!(
            "Table set: {} rows, {} columns",
            table.len(),
            table.columns().len()
        );
        self.table = table;
        self.recompute();
    }

    /// Set or clear the join; re-runs aggregation
    pub fn set_join_spec(&mut self, join: Option<JoinSpec>) {
        if self.join == join {
            return;
        }
        self.join = join;
        self.recompute();
    }

    /// Change the ramp; colors are refreshed without re-aggregating
    pub fn set_palette(&mut self, palette: Palette) {
        self.config.palette = palette;
        self.recolor();
    }

    /// Full aggregation pass followed by recoloring
    fn recompute(&mut self) {
        self.aggregation = self
            .join
            .as_ref()
            .filter(|join| join.is_complete())
            .and_then(|join| {
                aggregate(
                    self.table.rows(),
                    &join.join_field,
                    &join.value_field,
                    join.aggregator,
                )
            });
        self.recolor();

        // An open popup lists rows of the current table
        if let Some(popup) = &self.popup {
            let index = popup.feature_index;
            let content = self.popup_content(index);
            if let Some(popup) = self.popup.as_mut() {
                popup.content = content;
            }
        }
    }

    fn recolor(&mut self) {
        self.fallback = self.config.palette.fallback(self.config.fallback_fill);
        self.choropleth = match (&self.join, &self.aggregation) {
            (Some(join), Some(aggregation)) => {
                let range = aggregation.range();
                self.features
                    .iter()
                    .map(|feature| {
                        feature
                            .property(&join.join_field)
                            .and_then(|key| aggregation.get(&key.to_string()))
                            .map(|value| self.config.palette.color_for(value, range))
                    })
                    .collect()
            }
            _ => vec![None; self.features.len()],
        };
        self.redraw = true;
    }

    // ------------------------------------------------------------------
    // Styles
    // ------------------------------------------------------------------

    pub fn set_style_override(&mut self, feature_id: &str, style: StyleOverride) {
        self.styles.set(feature_id, style);
        self.redraw = true;
    }

    pub fn clear_style_override(&mut self, feature_id: &str) {
        if self.styles.clear(feature_id).is_some() {
            self.redraw = true;
        }
    }

    #[inline]
    pub fn style_overlay(&self) -> &StyleOverlay {
        &self.styles
    }

    /// Aggregated value joined to a feature
    pub fn feature_value(&self, index: usize) -> Option<f64> {
        let join = self.join.as_ref()?;
        let aggregation = self.aggregation.as_ref()?;
        let key = self.features.get(index)?.property(&join.join_field)?;
        aggregation.get(&key.to_string())
    }

    /// Final fill: manual override, else choropleth color, else fallback
    pub fn feature_fill(&self, index: usize) -> Rgb {
        let manual = self
            .features
            .get(index)
            .and_then(|feature| self.styles.get(feature.id()))
            .and_then(|style| style.fill);
        manual
            .or_else(|| self.choropleth.get(index).copied().flatten())
            .unwrap_or(self.fallback)
    }

    /// Fill, stroke and interaction flags of a feature
    pub fn feature_style(&self, index: usize) -> FeatureStyle {
        let manual = self
            .features
            .get(index)
            .and_then(|feature| self.styles.get(feature.id()));
        FeatureStyle {
            fill: self.feature_fill(index),
            stroke: manual.and_then(|s| s.stroke).unwrap_or(DEFAULT_STROKE),
            stroke_width: manual
                .and_then(|s| s.stroke_width)
                .unwrap_or(DEFAULT_STROKE_WIDTH),
            selected: self.selection == Some(index),
            hovered: self.hover.as_ref().map(|h| h.feature_index) == Some(index),
        }
    }

    // ------------------------------------------------------------------
    // Camera
    // ------------------------------------------------------------------

    pub fn set_screen_size(&mut self, width: f64, height: f64) {
        let before = self.camera.screen_size();
        self.camera.set_screen_size(width, height);
        if self.camera.screen_size() != before {
            self.camera_moved();
        }
    }

    /// Pan by a screen delta outside of a pointer drag (keyboard, buttons)
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.camera.pan_by(dx, dy);
        self.camera_moved();
    }

    /// Zoom around a screen position by an explicit factor
    pub fn zoom_at(&mut self, position: Coord<f64>, factor: f64) {
        if self.camera.zoom_at(position.x, position.y, factor) {
            self.camera_moved();
        }
    }

    pub fn fit_to_features(&mut self) {
        if self.camera.fit_to_features(&self.features) {
            self.camera_moved();
        }
    }

    pub fn fit_to_world(&mut self) {
        if self.camera.fit_to_world() {
            self.camera_moved();
        }
    }

    fn camera_moved(&mut self) {
        if let Some(popup) = self.popup.as_mut() {
            popup.position = self.camera.planar_to_screen(popup.anchor);
        }
        self.redraw = true;
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Feed one pointer event; returns whether a redraw is needed
    pub fn handle_event(&mut self, event: PointerEvent) -> bool {
        match event {
            PointerEvent::Down { position, primary } if primary => {
                // A press on a feature is a click and never starts a pan
                match self.hit_test(position) {
                    Some(index) => self.select(index, position),
                    None => self.mode = InteractionMode::Panning { last: position },
                }
            }
            PointerEvent::Down { .. } => {}
            PointerEvent::Move { position } => match self.mode {
                InteractionMode::Panning { last } => {
                    self.pan_by(position.x - last.x, position.y - last.y);
                    self.mode = InteractionMode::Panning { last: position };
                }
                InteractionMode::Idle => self.update_hover(position),
            },
            PointerEvent::Up { .. } => {
                self.mode = InteractionMode::Idle;
            }
            PointerEvent::Leave => {
                self.mode = InteractionMode::Idle;
                if self.hover.take().is_some() {
                    self.redraw = true;
                }
            }
            PointerEvent::Wheel { position, delta_y } => {
                if delta_y != 0.0 {
                    let factor = if delta_y > 0.0 {
                        self.config.zoom_step
                    } else {
                        1.0 / self.config.zoom_step
                    };
                    self.zoom_at(position, factor);
                }
            }
        }
        tracing::trace!("{:?} -> {:?}", event, self.mode);
        self.redraw
    }

    /// Topmost feature under a screen position
    pub fn hit_test(&self, position: Coord<f64>) -> Option<usize> {
        let point = self.camera.screen_to_planar(position.x, position.y);
        // Drawn in order, so the last hit is on top
        self.outlines
            .iter()
            .rposition(|outline| outline.contains(point))
    }

    fn update_hover(&mut self, position: Coord<f64>) {
        let current = self.hover.as_ref().map(|hover| hover.feature_index);
        match (self.hit_test(position), current) {
            (Some(index), Some(hovered)) if index == hovered => {
                if let Some(hover) = self.hover.as_mut() {
                    hover.position = position;
                }
            }
            (Some(index), _) => {
                self.hover = self.features.get(index).map(|feature| HoverState {
                    feature_index: index,
                    feature_id: feature.id().to_string(),
                    position,
                });
            }
            (None, Some(_)) => self.hover = None,
            (None, None) => return,
        }
        self.redraw = true;
    }

    /// Select a feature and open its popup at a screen position
    pub fn select(&mut self, index: usize, position: Coord<f64>) {
        let Some(feature) = self.features.get(index) else {
            return;
        };
        let feature_id = feature.id().to_string();
        tracing::debug!("Selected feature '{}'", feature_id);

        self.popup = Some(Popup {
            feature_index: index,
            feature_id,
            content: self.popup_content(index),
            position,
            anchor: self.camera.screen_to_planar(position.x, position.y),
        });
        self.selection = Some(index);
        self.redraw = true;
    }

    fn popup_content(&self, index: usize) -> PopupContent {
        let Some(feature) = self.features.get(index) else {
            return PopupContent::Properties(Properties::new());
        };
        if let Some(join) = self.join.as_ref()
            && join.is_complete()
            && let Some(key) = feature.property(&join.join_field)
        {
            let rows = rows_for_key(self.table.rows(), &join.join_field, &key.to_string());
            if !rows.is_empty() {
                return PopupContent::Rows(rows.into_iter().cloned().collect());
            }
        }
        PopupContent::Properties(feature.properties().clone())
    }

    pub fn close_popup(&mut self) {
        if self.popup.take().is_some() {
            self.redraw = true;
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
        self.close_popup();
        self.redraw = true;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fill of features without a value under the current palette
    #[inline]
    pub fn fallback_fill(&self) -> Rgb {
        self.fallback
    }

    #[inline]
    pub fn features(&self) -> &FeatureCollection {
        &self.features
    }

    #[inline]
    pub fn outlines(&self) -> &[Outline] {
        &self.outlines
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[inline]
    pub fn table(&self) -> &Table {
        &self.table
    }

    #[inline]
    pub fn join_spec(&self) -> Option<&JoinSpec> {
        self.join.as_ref()
    }

    #[inline]
    pub fn aggregation(&self) -> Option<&AggregationResult> {
        self.aggregation.as_ref()
    }

    #[inline]
    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    #[inline]
    pub fn hover(&self) -> Option<&HoverState> {
        self.hover.as_ref()
    }

    #[inline]
    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    #[inline]
    pub fn selected_index(&self) -> Option<usize> {
        self.selection
    }

    /// Selected feature, for external inspectors
    pub fn selected_feature(&self) -> Option<&GeoFeature> {
        self.selection.and_then(|index| self.features.get(index))
    }

    /// Legend data, present while a join produced values
    pub fn legend(&self) -> Option<Legend> {
        let join = self.join.as_ref()?;
        let aggregation = self.aggregation.as_ref()?;
        Some(Legend {
            join: join.clone(),
            range: aggregation.range(),
            palette: self.config.palette,
            fallback: self.fallback,
            matched: self.choropleth.iter().filter(|c| c.is_some()).count(),
        })
    }

    /// Indices of features whose outline overlaps the viewport
    pub fn visible_features(&self) -> impl Iterator<Item = usize> + '_ {
        let view = self.camera.viewport().to_rect();
        self.outlines
            .iter()
            .enumerate()
            .filter(move |(_, outline)| outline.bounds().is_some_and(|b| b.intersects(&view)))
            .map(|(index, _)| index)
    }

    /// Whether something changed since the last [`MapSession::take_redraw`]
    #[inline]
    pub fn needs_redraw(&self) -> bool {
        self.redraw
    }

    /// Consume the redraw request
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }
}
