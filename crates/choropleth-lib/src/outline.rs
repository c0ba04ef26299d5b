//! Geometry-to-outline compilation
//!
//! Outlines live in the projection's planar space. They are compiled once per load;
//! panning and zooming only change how planar space maps onto the screen.
//!
//! Fill rule: every polygon fills its exterior ring minus its interior rings (holes),
//! and the parts of a multi-polygon are painted independently. Hit testing and
//! triangulation both follow this rule so what is drawn is what is clickable.

use crate::{FeatureCollection, FeatureGeometry, Projection};
use geo::{BoundingRect, Coord, Intersects, LineString, MultiPolygon, Polygon, Rect};
use rayon::prelude::*;

/// Projected outline of a single feature
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    /// Planar polygons, one per geographic polygon
    shape: MultiPolygon<f64>,
    /// Planar bounding box, `None` when empty
    bounds: Option<Rect<f64>>,
    /// Fill triangles in planar space
    triangles: Vec<[Coord<f64>; 3]>,
}

/// Compile a feature geometry into a planar outline
///
/// Unsupported geometry silently yields an empty outline.
pub fn compile_outline(geometry: &FeatureGeometry, projection: &Projection) -> Outline {
    let polygons = geometry
        .polygons()
        .iter()
        .map(|polygon| project_polygon(polygon, projection))
        .collect();
    Outline::new(MultiPolygon::new(polygons))
}

/// Compile every feature of a collection, preserving order
pub fn compile_all(collection: &FeatureCollection, projection: &Projection) -> Vec<Outline> {
    #[cfg(feature = "profiling")]
    profiling::scope!("outline::compile_all");

    collection
        .features()
        .par_iter()
        .map(|feature| compile_outline(feature.geometry(), projection))
        .collect()
}

fn project_ring(ring: &LineString<f64>, projection: &Projection) -> LineString<f64> {
    ring.coords()
        .map(|coord| projection.project_clamped(coord.y, coord.x))
        .collect()
}

fn project_polygon(polygon: &Polygon<f64>, projection: &Projection) -> Polygon<f64> {
    Polygon::new(
        project_ring(polygon.exterior(), projection),
        polygon
            .interiors()
            .iter()
            .map(|ring| project_ring(ring, projection))
            .collect(),
    )
}

impl Default for Outline {
    fn default() -> Self {
        Self::new(MultiPolygon::new(vec![]))
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Outline {
    /// Wrap already-planar polygons
    pub fn new(shape: MultiPolygon<f64>) -> Self {
        let bounds = shape.bounding_rect();
        let triangles = shape.0.iter().flat_map(triangulate_polygon).collect();
        Self {
            shape,
            bounds,
            triangles,
        }
    }

    #[inline]
    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    #[inline]
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.bounds
    }

    /// Triangles covering the filled area, holes excluded
    #[inline]
    pub fn triangles(&self) -> &[[Coord<f64>; 3]] {
        &self.triangles
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shape.0.is_empty()
    }

    /// Closed sub-paths in drawing order: each polygon's exterior, then its holes
    pub fn subpaths(&self) -> impl Iterator<Item = &LineString<f64>> {
        self.shape
            .0
            .iter()
            .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
    }

    /// Total number of planar vertices
    pub fn vertex_count(&self) -> usize {
        self.subpaths().map(|ring| ring.0.len()).sum()
    }

    /// Whether a planar point falls on the filled area (boundary included)
    pub fn contains(&self, point: Coord<f64>) -> bool {
        match self.bounds {
            Some(bounds) if bounds.intersects(&point) => {
                self.shape.0.iter().any(|polygon| polygon.intersects(&point))
            }
            _ => false,
        }
    }
}

/// Ear-cut a polygon with holes into planar triangles
fn triangulate_polygon(polygon: &Polygon<f64>) -> Vec<[Coord<f64>; 3]> {
    let mut vertices: Vec<Coord<f64>> = Vec::new();
    let mut hole_indices: Vec<usize> = Vec::new();

    for (ring_index, ring) in std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .enumerate()
    {
        let mut coords: &[Coord<f64>] = &ring.0;
        // Drop the closing duplicate
        if coords.len() >= 2 && coords.first() == coords.last() {
            coords = &coords[..coords.len() - 1];
        }
        if coords.len() < 3 {
            if ring_index == 0 {
                return Vec::new();
            }
            continue;
        }
        if ring_index > 0 {
            hole_indices.push(vertices.len());
        }
        vertices.extend_from_slice(coords);
    }

    let flat: Vec<f64> = vertices.iter().flat_map(|c| [c.x, c.y]).collect();
    let indices = match earcutr::earcut(&flat, &hole_indices, 2) {
        Ok(indices) => indices,
        Err(e) => {
            tracing::warn!("Triangulation failed, outline drawn without fill: {:?}", e);
            return Vec::new();
        }
    };

    indices
        .chunks_exact(3)
        .filter_map(|tri| {
            Some([
                *vertices.get(tri[0])?,
                *vertices.get(tri[1])?,
                *vertices.get(tri[2])?,
            ])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GeoFeature, Properties};
    use geo::Area;

    fn ring(coords: &[(f64, f64)]) -> LineString<f64> {
        coords.iter().map(|&(x, y)| Coord { x, y }).collect()
    }

    fn square(x: f64, y: f64, size: f64) -> LineString<f64> {
        ring(&[
            (x, y),
            (x + size, y),
            (x + size, y + size),
            (x, y + size),
            (x, y),
        ])
    }

    fn triangle_area(tri: &[Coord<f64>; 3]) -> f64 {
        let [a, b, c] = tri;
        ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)).abs() / 2.0
    }

    #[test]
    fn test_compile_projects_every_vertex() {
        let projection = Projection::new(360.0, 360.0);
        let geometry = FeatureGeometry::Polygon(Polygon::new(square(0.0, 0.0, 10.0), vec![]));
        let outline = compile_outline(&geometry, &projection);

        let exterior = outline.subpaths().next().unwrap();
        assert_eq!(exterior.0.len(), 5);
        assert_eq!(exterior.0[0], projection.project(0.0, 0.0));
        assert_eq!(exterior.0[2], projection.project(10.0, 10.0));
        assert!(exterior.is_closed());
    }

    #[test]
    fn test_subpaths_order_with_holes_and_parts() {
        let projection = Projection::default();
        let with_hole = Polygon::new(square(0.0, 0.0, 10.0), vec![square(2.0, 2.0, 2.0)]);
        let island = Polygon::new(square(20.0, 0.0, 5.0), vec![]);
        let geometry = FeatureGeometry::MultiPolygon(MultiPolygon::new(vec![with_hole, island]));
        let outline = compile_outline(&geometry, &projection);

        let subpaths: Vec<_> = outline.subpaths().collect();
        assert_eq!(subpaths.len(), 3);
        assert_eq!(subpaths[1].0[0], projection.project(2.0, 2.0));
        assert_eq!(subpaths[2].0[0], projection.project(0.0, 20.0));
        assert_eq!(outline.vertex_count(), 15);
    }

    #[test]
    fn test_unsupported_geometry_is_empty() {
        let geometry = FeatureGeometry::Unsupported {
            kind: "LineString".to_string(),
        };
        let outline = compile_outline(&geometry, &Projection::default());
        assert!(outline.is_empty());
        assert!(outline.bounds().is_none());
        assert!(outline.triangles().is_empty());
        assert!(!outline.contains(Coord { x: 500.0, y: 300.0 }));
    }

    #[test]
    fn test_contains_respects_holes() {
        let shape = MultiPolygon::new(vec![Polygon::new(
            square(0.0, 0.0, 10.0),
            vec![square(4.0, 4.0, 2.0)],
        )]);
        let outline = Outline::new(shape);
        assert!(outline.contains(Coord { x: 1.0, y: 1.0 }));
        assert!(!outline.contains(Coord { x: 5.0, y: 5.0 }));
        assert!(!outline.contains(Coord { x: 11.0, y: 5.0 }));
    }

    #[test]
    fn test_triangles_cover_area_minus_holes() {
        let shape = MultiPolygon::new(vec![
            Polygon::new(square(0.0, 0.0, 10.0), vec![square(4.0, 4.0, 2.0)]),
            Polygon::new(square(20.0, 0.0, 3.0), vec![]),
        ]);
        let outline = Outline::new(shape);
        let covered: f64 = outline.triangles().iter().map(triangle_area).sum();
        assert!((covered - outline.shape().unsigned_area()).abs() < 1e-9);
        assert!((covered - (100.0 - 4.0 + 9.0)).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_ring_has_no_fill() {
        let outline = Outline::new(MultiPolygon::new(vec![Polygon::new(
            ring(&[(0.0, 0.0), (1.0, 1.0)]),
            vec![],
        )]));
        assert!(outline.triangles().is_empty());
    }

    #[test]
    fn test_default_outline_is_empty() {
        let outline = Outline::default();
        assert!(outline.is_empty());
        assert_eq!(outline.bounds(), None);
        assert!(!outline.contains(Coord { x: 0.0, y: 0.0 }));
    }

    #[test]
    fn test_compile_all_keeps_order() {
        let features = (0..20)
            .map(|i| {
                GeoFeature::new(
                    i.to_string(),
                    FeatureGeometry::Polygon(Polygon::new(square(i as f64, 0.0, 0.5), vec![])),
                    Properties::new(),
                )
            })
            .collect();
        let collection = FeatureCollection::new(features);
        let projection = Projection::default();
        let outlines = compile_all(&collection, &projection);

        assert_eq!(outlines.len(), 20);
        for (i, outline) in outlines.iter().enumerate() {
            let first = outline.subpaths().next().unwrap().0[0];
            assert_eq!(first, projection.project(0.0, i as f64));
        }
    }
}
