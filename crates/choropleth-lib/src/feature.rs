//! Feature storage and FeatureCollection decoding
//!
//! This module provides typed map features decoded from an already-parsed
//! FeatureCollection document. Only polygonal geometry is kept; anything else is
//! retained as [`FeatureGeometry::Unsupported`] so the feature still participates in
//! joins and inspection while drawing nothing.

use crate::{MapError, Result};
use chrono::NaiveDate;
use geo::{Coord, LineString, MultiPolygon, Polygon, Rect};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Read;

/// Runtime-typed property or cell value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Scalar {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

/// Untyped property bag of a feature
pub type Properties = BTreeMap<String, Scalar>;

impl Scalar {
    /// Convert a JSON value; `null` is treated as absent
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Scalar::Number),
            Value::String(s) => Some(Self::from_text(s)),
            // Nested values are kept as their JSON text
            Value::Array(_) | Value::Object(_) => Some(Scalar::Text(value.to_string())),
        }
    }

    /// Interpret a string, recognising `YYYY-MM-DD` dates
    pub fn from_text(s: &str) -> Self {
        if s.len() == 10
            && let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        {
            return Scalar::Date(date);
        }
        Scalar::Text(s.to_string())
    }

    /// Numeric view of the value, if it has one
    ///
    /// Numbers are used as is and text is parsed after trimming. Booleans and dates
    /// are never numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) if n.is_finite() => Some(*n),
            Scalar::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
            }
            _ => None,
        }
    }

    /// Whether the value counts as empty (blank text)
    pub fn is_blank(&self) -> bool {
        matches!(self, Scalar::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Number(n) if n.is_infinite() => {
                f.write_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<NaiveDate> for Scalar {
    fn from(value: NaiveDate) -> Self {
        Scalar::Date(value)
    }
}

/// Convert a JSON object into a property bag, dropping `null` members
pub(crate) fn properties_from_json(object: &Map<String, Value>) -> Properties {
    object
        .iter()
        .filter_map(|(key, value)| Scalar::from_json(value).map(|s| (key.clone(), s)))
        .collect()
}

/// Geometry of a feature, in WGS84 degrees (x = lon, y = lat)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeatureGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
    /// Any other geometry type, or one that could not be decoded
    Unsupported { kind: String },
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl FeatureGeometry {
    /// Decode a geometry object
    ///
    /// Non-polygonal types decode to [`FeatureGeometry::Unsupported`]; structurally
    /// broken polygons are an [`MapError::InvalidGeometry`].
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| MapError::InvalidGeometry("geometry is not an object".to_string()))?;
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| MapError::InvalidGeometry("geometry has no type".to_string()))?;
        let coordinates = || {
            object.get("coordinates").ok_or_else(|| {
                MapError::InvalidGeometry(format!("{kind} without coordinates"))
            })
        };

        match kind {
            "Polygon" => Ok(FeatureGeometry::Polygon(parse_polygon(coordinates()?)?)),
            "MultiPolygon" => {
                let polygons = coordinates()?
                    .as_array()
                    .ok_or_else(|| {
                        MapError::InvalidGeometry("MultiPolygon coordinates is not an array".into())
                    })?
                    .iter()
                    .map(parse_polygon)
                    .collect::<Result<Vec<_>>>()?;
                Ok(FeatureGeometry::MultiPolygon(MultiPolygon::new(polygons)))
            }
            other => Ok(FeatureGeometry::Unsupported {
                kind: other.to_string(),
            }),
        }
    }

    /// The constituent polygons (empty for unsupported geometry)
    pub fn polygons(&self) -> &[Polygon<f64>] {
        match self {
            FeatureGeometry::Polygon(polygon) => std::slice::from_ref(polygon),
            FeatureGeometry::MultiPolygon(multi) => &multi.0,
            FeatureGeometry::Unsupported { .. } => &[],
        }
    }

    /// Whether the geometry produces an outline
    pub fn is_supported(&self) -> bool {
        !matches!(self, FeatureGeometry::Unsupported { .. })
    }

    /// Bounding box over every ring coordinate, holes included
    pub fn bounds(&self) -> Option<Rect<f64>> {
        let mut bounds = Bounds::default();
        for polygon in self.polygons() {
            for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                for coord in ring.coords() {
                    bounds.extend(*coord);
                }
            }
        }
        bounds.into_rect()
    }
}

/// Running min/max accumulator
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min: Coord<f64>,
    max: Coord<f64>,
    found: bool,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: Coord {
                x: f64::INFINITY,
                y: f64::INFINITY,
            },
            max: Coord {
                x: f64::NEG_INFINITY,
                y: f64::NEG_INFINITY,
            },
            found: false,
        }
    }
}

impl Bounds {
    #[inline]
    fn extend(&mut self, coord: Coord<f64>) {
        if !(coord.x.is_finite() && coord.y.is_finite()) {
            return;
        }
        self.min.x = self.min.x.min(coord.x);
        self.min.y = self.min.y.min(coord.y);
        self.max.x = self.max.x.max(coord.x);
        self.max.y = self.max.y.max(coord.y);
        self.found = true;
    }

    fn merge(&mut self, rect: Rect<f64>) {
        self.extend(rect.min());
        self.extend(rect.max());
    }

    fn into_rect(self) -> Option<Rect<f64>> {
        self.found.then(|| Rect::new(self.min, self.max))
    }
}

fn parse_position(value: &Value) -> Result<Coord<f64>> {
    let position = value
        .as_array()
        .ok_or_else(|| MapError::InvalidGeometry("position is not an array".to_string()))?;
    match (
        position.first().and_then(Value::as_f64),
        position.get(1).and_then(Value::as_f64),
    ) {
        (Some(lon), Some(lat)) => Ok(Coord { x: lon, y: lat }),
        _ => Err(MapError::InvalidGeometry(format!(
            "position {value} needs two numbers"
        ))),
    }
}

fn parse_ring(value: &Value) -> Result<LineString<f64>> {
    let ring = value
        .as_array()
        .ok_or_else(|| MapError::InvalidGeometry("ring is not an array".to_string()))?;
    let coords = ring.iter().map(parse_position).collect::<Result<Vec<_>>>()?;
    Ok(LineString::new(coords))
}

fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let rings = value
        .as_array()
        .ok_or_else(|| MapError::InvalidGeometry("polygon is not an array of rings".to_string()))?;
    let mut rings = rings.iter().map(parse_ring);
    let exterior = rings
        .next()
        .ok_or_else(|| MapError::InvalidGeometry("polygon without rings".to_string()))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

/// One discrete map region
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoFeature {
    id: String,
    geometry: FeatureGeometry,
    properties: Properties,
}

impl GeoFeature {
    pub fn new(id: impl Into<String>, geometry: FeatureGeometry, properties: Properties) -> Self {
        Self {
            id: id.into(),
            geometry,
            properties,
        }
    }

    /// Decode a feature object; `index` is the fallback id
    fn from_json(index: usize, value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            tracing::warn!("Feature #{} is not an object, keeping it without outline", index);
            return Self::new(
                index.to_string(),
                FeatureGeometry::Unsupported {
                    kind: "invalid".to_string(),
                },
                Properties::new(),
            );
        };

        let id = match object.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(|n| Scalar::Number(n).to_string())
                .unwrap_or_else(|| n.to_string()),
            _ => index.to_string(),
        };

        let geometry = match object.get("geometry") {
            None | Some(Value::Null) => FeatureGeometry::Unsupported {
                kind: "null".to_string(),
            },
            Some(geometry) => FeatureGeometry::from_json(geometry).unwrap_or_else(|e| {
                tracing::warn!("Skipping outline of feature '{}': {}", id, e);
                FeatureGeometry::Unsupported {
                    kind: "invalid".to_string(),
                }
            }),
        };

        let properties = object
            .get("properties")
            .and_then(Value::as_object)
            .map(properties_from_json)
            .unwrap_or_default();

        Self {
            id,
            geometry,
            properties,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn geometry(&self) -> &FeatureGeometry {
        &self.geometry
    }

    #[inline]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Look up a single property
    #[inline]
    pub fn property(&self, key: &str) -> Option<&Scalar> {
        self.properties.get(key)
    }
}

/// Ordered set of features, replaced wholesale on each load
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeatureCollection {
    features: Vec<GeoFeature>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl FeatureCollection {
    pub fn new(features: Vec<GeoFeature>) -> Self {
        Self { features }
    }

    /// Build a collection from a decoded FeatureCollection document
    ///
    /// The top-level shape must be an object with `"type": "FeatureCollection"` and a
    /// `features` array; anything else is rejected as a whole. Individual features
    /// are decoded best-effort.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            MapError::NotAFeatureCollection("top-level value is not an object".to_string())
        })?;

        match object.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => {}
            Some(other) => {
                return Err(MapError::NotAFeatureCollection(format!(
                    "type is '{other}'"
                )));
            }
            None => {
                return Err(MapError::NotAFeatureCollection(
                    "missing type member".to_string(),
                ));
            }
        }

        let features = object
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                MapError::NotAFeatureCollection("features is not an array".to_string())
            })?
            .iter()
            .enumerate()
            .map(|(index, feature)| GeoFeature::from_json(index, feature))
            .collect::<Vec<_>>();

        let skipped = features
            .iter()
            .filter(|f| !f.geometry.is_supported())
            .count();
        tracing::info!(
            "Decoded {} features ({} without drawable geometry)",
            features.len(),
            skipped
        );

        Ok(Self { features })
    }

    /// Parse JSON from a reader and decode it
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let value: Value = serde_json::from_reader(reader)?;
        Self::from_json(&value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    #[inline]
    pub fn features(&self) -> &[GeoFeature] {
        &self.features
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&GeoFeature> {
        self.features.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeoFeature> {
        self.features.iter()
    }

    /// Index of the first feature with the given id
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.features.iter().position(|f| f.id == id)
    }

    /// Combined bounding box (x = lon, y = lat), `None` without any coordinates
    pub fn bounds(&self) -> Option<Rect<f64>> {
        let mut bounds = Bounds::default();
        for feature in &self.features {
            if let Some(rect) = feature.geometry.bounds() {
                bounds.merge(rect);
            }
        }
        bounds.into_rect()
    }

    /// Sorted union of all property keys, used to offer join fields
    pub fn property_keys(&self) -> Vec<String> {
        self.features
            .iter()
            .flat_map(|f| f.properties.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square(x: f64, y: f64, size: f64) -> Value {
        json!([[
            [x, y],
            [x + size, y],
            [x + size, y + size],
            [x, y + size],
            [x, y]
        ]])
    }

    fn create_test_document() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "id": "ES",
                    "geometry": {"type": "Polygon", "coordinates": square(-9.0, 36.0, 12.0)},
                    "properties": {"name": "Spain", "code": "ES", "pop": 47.4}
                },
                {
                    "type": "Feature",
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [square(5.0, 43.0, 2.0), square(8.0, 41.0, 1.0)]
                    },
                    "properties": {"name": "Islands", "code": null}
                },
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
                    "properties": {"name": "Dot"}
                }
            ]
        })
    }

    #[test]
    fn test_decode_collection() {
        let collection = FeatureCollection::from_json(&create_test_document()).unwrap();
        assert_eq!(collection.len(), 3);

        let spain = collection.get(0).unwrap();
        assert_eq!(spain.id(), "ES");
        assert!(matches!(spain.geometry(), FeatureGeometry::Polygon(_)));
        assert_eq!(spain.property("pop"), Some(&Scalar::Number(47.4)));

        let islands = collection.get(1).unwrap();
        assert_eq!(islands.id(), "1"); // positional fallback
        assert_eq!(islands.geometry().polygons().len(), 2);
        assert!(islands.property("code").is_none()); // null is absent

        let dot = collection.get(2).unwrap();
        assert_eq!(
            dot.geometry(),
            &FeatureGeometry::Unsupported {
                kind: "Point".to_string()
            }
        );
    }

    #[test]
    fn test_reject_non_collection() {
        for value in [
            json!([1, 2, 3]),
            json!({"type": "Feature", "features": []}),
            json!({"features": []}),
            json!({"type": "FeatureCollection", "features": {}}),
        ] {
            let result = FeatureCollection::from_json(&value);
            assert!(matches!(result, Err(MapError::NotAFeatureCollection(_))));
        }
    }

    #[test]
    fn test_malformed_geometry_keeps_feature() {
        let value = json!({
            "type": "FeatureCollection",
            "features": [
                {"geometry": {"type": "Polygon", "coordinates": [[[0.0], [1.0, 1.0]]]}},
                {"geometry": {"type": "Polygon", "coordinates": []}},
                {"geometry": null, "properties": {"k": "v"}},
                "not a feature"
            ]
        });
        let collection = FeatureCollection::from_json(&value).unwrap();
        assert_eq!(collection.len(), 4);
        assert!(collection.iter().all(|f| !f.geometry().is_supported()));
        assert_eq!(
            collection.get(2).unwrap().property("k"),
            Some(&Scalar::from("v"))
        );
    }

    #[test]
    fn test_numeric_feature_id() {
        let value = json!({
            "type": "FeatureCollection",
            "features": [{"id": 7, "geometry": null}, {"id": 2.5, "geometry": null}]
        });
        let collection = FeatureCollection::from_json(&value).unwrap();
        assert_eq!(collection.get(0).unwrap().id(), "7");
        assert_eq!(collection.get(1).unwrap().id(), "2.5");
        assert_eq!(collection.index_of("2.5"), Some(1));
    }

    #[test]
    fn test_polygon_holes_are_interiors() {
        let geometry = FeatureGeometry::from_json(&json!({
            "type": "Polygon",
            "coordinates": [
                [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
                [[2.0, 2.0], [4.0, 2.0], [4.0, 4.0], [2.0, 4.0], [2.0, 2.0]]
            ]
        }))
        .unwrap();
        let polygon = &geometry.polygons()[0];
        assert_eq!(polygon.interiors().len(), 1);
    }

    #[test]
    fn test_bounds_walk() {
        let collection = FeatureCollection::from_json(&create_test_document()).unwrap();
        let bounds = collection.bounds().unwrap();
        assert_eq!(bounds.min().x, -9.0);
        assert_eq!(bounds.min().y, 36.0);
        assert_eq!(bounds.max().x, 9.0);
        assert_eq!(bounds.max().y, 48.0);

        let empty = FeatureCollection::default();
        assert!(empty.bounds().is_none());
    }

    #[test]
    fn test_scalar_display_matches_key_strings() {
        assert_eq!(Scalar::Number(30.0).to_string(), "30");
        assert_eq!(Scalar::Number(-1.5).to_string(), "-1.5");
        assert_eq!(Scalar::Bool(true).to_string(), "true");
        assert_eq!(Scalar::from_text("2024-03-09").to_string(), "2024-03-09");
        assert_eq!(Scalar::Number(f64::INFINITY).to_string(), "Infinity");
    }

    #[test]
    fn test_scalar_numeric_view() {
        assert_eq!(Scalar::Number(4.0).as_number(), Some(4.0));
        assert_eq!(Scalar::from(" 12.5 ").as_number(), Some(12.5));
        assert_eq!(Scalar::from("abc").as_number(), None);
        assert_eq!(Scalar::from("   ").as_number(), None);
        assert_eq!(Scalar::Bool(true).as_number(), None);
        assert!(Scalar::from("  ").is_blank());
        assert!(!Scalar::Number(0.0).is_blank());
    }

    #[test]
    fn test_date_detection() {
        assert!(matches!(Scalar::from_text("2023-12-31"), Scalar::Date(_)));
        assert!(matches!(Scalar::from_text("2023-13-31"), Scalar::Text(_)));
        assert!(matches!(Scalar::from_text("2023-1-5"), Scalar::Text(_)));
    }

    #[test]
    fn test_property_keys() {
        let collection = FeatureCollection::from_json(&create_test_document()).unwrap();
        assert_eq!(collection.property_keys(), vec!["code", "name", "pop"]);
    }

    #[test]
    fn test_from_reader() {
        let text = create_test_document().to_string();
        let collection = FeatureCollection::from_reader(text.as_bytes()).unwrap();
        assert_eq!(collection.len(), 3);
        assert!(matches!(
            FeatureCollection::from_reader("{not json".as_bytes()),
            Err(MapError::Json(_))
        ));
    }
}
