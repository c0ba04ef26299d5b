//! Manual per-feature style overrides

use crate::Rgb;
use std::collections::HashMap;

/// Stroke color used when nothing overrides it
pub const DEFAULT_STROKE: Rgb = Rgb::new(0x55, 0x55, 0x55);

/// Stroke width in screen pixels used when nothing overrides it
pub const DEFAULT_STROKE_WIDTH: f32 = 1.0;

/// Style set by hand for one feature; unset members fall through
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StyleOverride {
    pub fill: Option<Rgb>,
    pub stroke: Option<Rgb>,
    pub stroke_width: Option<f32>,
}

impl StyleOverride {
    pub fn is_empty(&self) -> bool {
        self.fill.is_none() && self.stroke.is_none() && self.stroke_width.is_none()
    }
}

/// Feature id → override
///
/// Survives re-aggregation; the session clears it when a new collection loads.
#[derive(Debug, Clone, Default)]
pub struct StyleOverlay {
    overrides: HashMap<String, StyleOverride>,
}

impl StyleOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the override of a feature; empty overrides remove it
    pub fn set(&mut self, feature_id: impl Into<String>, style: StyleOverride) {
        let feature_id = feature_id.into();
        if style.is_empty() {
            self.overrides.remove(&feature_id);
        } else {
            self.overrides.insert(feature_id, style);
        }
    }

    #[inline]
    pub fn get(&self, feature_id: &str) -> Option<&StyleOverride> {
        self.overrides.get(feature_id)
    }

    pub fn clear(&mut self, feature_id: &str) -> Option<StyleOverride> {
        self.overrides.remove(feature_id)
    }

    pub fn clear_all(&mut self) {
        self.overrides.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}
