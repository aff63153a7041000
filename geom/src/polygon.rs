use std::fmt;

use anyhow::{bail, Result};
use geo::{
    Area, BooleanOps, BoundingRect, Centroid, Contains, EuclideanDistance, Intersects,
    SimplifyVWPreserve,
};

use crate::{Bounds, Pt2D};

/// Along a meridian; along a parallel it shrinks with the cosine of the latitude.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// An area footprint: one or more outer rings, each with optional holes. Cadastral parcels and
/// buildings are frequently split into several pieces, so this is always a multipolygon
/// internally.
#[derive(PartialEq, Clone)]
pub struct Polygon(geo::MultiPolygon<f64>);

impl Polygon {
    /// Each entry is one polygon, described by its outer ring followed by any holes. Rings may
    /// be given open or closed.
    pub fn from_rings(polygons: Vec<Vec<Vec<Pt2D>>>) -> Result<Polygon> {
        let mut result = Vec::new();
        for rings in polygons {
            let mut rings = rings.into_iter().map(close_ring);
            let exterior = match rings.next() {
                Some(ring) => ring?,
                None => bail!("Polygon without an outer ring"),
            };
            let interiors = rings.collect::<Result<Vec<_>>>()?;
            result.push(geo::Polygon::new(exterior, interiors));
        }
        if result.is_empty() {
            bail!("Multipolygon without any polygons");
        }
        Ok(Polygon(geo::MultiPolygon(result)))
    }

    /// A simple polygon from one ring
    pub fn from_ring(pts: Vec<Pt2D>) -> Result<Polygon> {
        Polygon::from_rings(vec![vec![pts]])
    }

    /// An axis-aligned rectangle, mostly useful for tests
    pub fn rectangle(x1: f64, y1: f64, x2: f64, y2: f64) -> Polygon {
        Polygon(geo::MultiPolygon(vec![geo::Rect::new(
            geo::Point::new(x1, y1).0,
            geo::Point::new(x2, y2).0,
        )
        .to_polygon()]))
    }

    /// Per polygon, the outer ring and then the holes. Rings are closed (first == last).
    pub fn rings(&self) -> Vec<Vec<Vec<Pt2D>>> {
        self.0
             .0
            .iter()
            .map(|poly| {
                std::iter::once(poly.exterior())
                    .chain(poly.interiors().iter())
                    .map(|ls| ls.points().map(Pt2D::from).collect())
                    .collect()
            })
            .collect()
    }

    pub fn num_polygons(&self) -> usize {
        self.0 .0.len()
    }

    /// Splits a multipolygon into its individual pieces.
    pub fn explode(&self) -> Vec<Polygon> {
        self.0
             .0
            .iter()
            .map(|p| Polygon(geo::MultiPolygon(vec![p.clone()])))
            .collect()
    }

    pub fn area(&self) -> f64 {
        self.0.unsigned_area()
    }

    /// The area in square meters, scaled around the latitude of the center. Good enough for
    /// anything the size of a building.
    pub fn approx_area_m2(&self) -> f64 {
        let lat = self.center().map(|pt| pt.y()).unwrap_or(0.0);
        self.area() * METERS_PER_DEGREE * METERS_PER_DEGREE * lat.to_radians().cos()
    }

    /// Every ring has at least 3 distinct points and the area isn't zero.
    pub fn is_valid(&self) -> bool {
        self.area() > 0.0
            && self.0 .0.iter().all(|p| {
                std::iter::once(p.exterior())
                    .chain(p.interiors().iter())
                    .all(|ls| ls.0.len() >= 4)
            })
    }

    pub fn get_bounds(&self) -> Bounds {
        match self.0.bounding_rect() {
            Some(rect) => Bounds {
                min_x: rect.min().x,
                min_y: rect.min().y,
                max_x: rect.max().x,
                max_y: rect.max().y,
            },
            None => Bounds::new(),
        }
    }

    pub fn center(&self) -> Option<Pt2D> {
        self.0.centroid().map(Pt2D::from)
    }

    /// Does this polygon contain the point in its interior?
    pub fn contains_pt(&self, pt: Pt2D) -> bool {
        self.0.contains(&geo::Point::from(pt))
    }

    /// Do two polygons intersect at all? Touching boundaries count.
    pub fn intersects(&self, other: &Polygon) -> bool {
        self.get_bounds().intersects(&other.get_bounds()) && self.pieces_intersect(other)
    }

    /// True if more than half of `other`'s area lies inside this polygon. Footprints digitized
    /// on their parcel's boundary overlap it slightly in either direction, so strict containment
    /// is useless here.
    pub fn mostly_contains(&self, other: &Polygon) -> bool {
        if !self.get_bounds().intersects(&other.get_bounds()) {
            return false;
        }
        let area = other.area();
        if area == 0.0 {
            return other.center().map(|pt| self.contains_pt(pt)).unwrap_or(false);
        }
        if !self.pieces_intersect(other) {
            return false;
        }
        self.0.intersection(&other.0).unsigned_area() > 0.5 * area
    }

    /// Do the polygons touch, overlap, or come within `tolerance` of each other?
    pub fn is_adjacent(&self, other: &Polygon, tolerance: f64) -> bool {
        if !self
            .get_bounds()
            .buffer(tolerance)
            .intersects(&other.get_bounds())
        {
            return false;
        }
        if self.pieces_intersect(other) {
            return true;
        }
        self.0 .0.iter().any(|p1| {
            other
                .0
                 .0
                .iter()
                .any(|p2| p1.euclidean_distance(p2) <= tolerance)
        })
    }

    /// The point of an outer ring closest to `pt`, and how far it is.
    pub fn closest_outline_pt(&self, pt: Pt2D) -> Option<(Pt2D, f64)> {
        let mut best: Option<(Pt2D, f64)> = None;
        for poly in &self.0 .0 {
            let ring: Vec<Pt2D> = poly.exterior().points().map(Pt2D::from).collect();
            for pair in ring.windows(2) {
                let candidate = project(pair[0], pair[1], pt);
                let dist = candidate.dist_to(pt);
                if best.map(|(_, d)| dist < d).unwrap_or(true) {
                    best = Some((candidate, dist));
                }
            }
        }
        best
    }

    /// Makes sure an outer ring has a vertex at `pt`. An existing vertex within `tolerance` is
    /// reused; otherwise `pt` is inserted into the first wall passing within `tolerance`.
    /// Returns the position of the vertex, or None if no ring passes close enough.
    pub fn insert_vertex(&mut self, pt: Pt2D, tolerance: f64) -> Option<Pt2D> {
        for poly in self.0 .0.iter_mut() {
            let ring: Vec<Pt2D> = poly.exterior().points().map(Pt2D::from).collect();
            if let Some(existing) = ring.iter().find(|v| v.approx_eq(pt, tolerance)) {
                return Some(*existing);
            }
            let wall = (1..ring.len())
                .find(|i| project(ring[i - 1], ring[*i], pt).approx_eq(pt, tolerance));
            if let Some(i) = wall {
                poly.exterior_mut(|ls| ls.0.insert(i, (pt.x(), pt.y()).into()));
                return Some(pt);
            }
        }
        None
    }

    /// Union all of the polygons into one. None if the list is empty.
    pub fn union_all(mut list: Vec<Polygon>) -> Option<Polygon> {
        let mut result = list.pop()?.0;
        for p in list.into_iter().rev() {
            result = result.union(&p.0);
        }
        Some(Polygon(result))
    }

    pub fn simplify(&self, epsilon: f64) -> Polygon {
        Polygon(self.0.simplifyvw_preserve(&epsilon))
    }

    pub fn to_geojson(&self) -> geojson::Geometry {
        let polygons: Vec<Vec<Vec<Vec<f64>>>> = self
            .rings()
            .into_iter()
            .map(|rings| {
                rings
                    .into_iter()
                    .map(|ring| ring.into_iter().map(|pt| vec![pt.x(), pt.y()]).collect())
                    .collect()
            })
            .collect();
        if polygons.len() == 1 {
            geojson::Geometry::new(geojson::Value::Polygon(
                polygons.into_iter().next().unwrap_or_default(),
            ))
        } else {
            geojson::Geometry::new(geojson::Value::MultiPolygon(polygons))
        }
    }

    fn pieces_intersect(&self, other: &Polygon) -> bool {
        self.0 .0
            .iter()
            .any(|p1| other.0 .0.iter().any(|p2| p1.intersects(p2)))
    }
}

impl From<geo::MultiPolygon<f64>> for Polygon {
    fn from(mp: geo::MultiPolygon<f64>) -> Self {
        Polygon(mp)
    }
}

impl From<geo::Polygon<f64>> for Polygon {
    fn from(p: geo::Polygon<f64>) -> Self {
        Polygon(geo::MultiPolygon(vec![p]))
    }
}

impl fmt::Debug for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Polygon with {} pieces, area {}",
            self.num_polygons(),
            self.area()
        )
    }
}

/// The point of the segment from `a` to `b` closest to `pt`
fn project(a: Pt2D, b: Pt2D, pt: Pt2D) -> Pt2D {
    let (dx, dy) = (b.x() - a.x(), b.y() - a.y());
    let len = dx * dx + dy * dy;
    if len == 0.0 {
        return a;
    }
    let t = (((pt.x() - a.x()) * dx + (pt.y() - a.y()) * dy) / len).clamp(0.0, 1.0);
    Pt2D::new(a.x() + t * dx, a.y() + t * dy)
}

fn close_ring(mut pts: Vec<Pt2D>) -> Result<geo::LineString<f64>> {
    if pts.len() < 3 {
        bail!("Ring needs at least 3 points, got {}", pts.len());
    }
    if pts[0] != pts[pts.len() - 1] {
        pts.push(pts[0]);
    }
    if pts.len() < 4 {
        bail!("Ring needs at least 3 distinct points");
    }
    Ok(geo::LineString::from(
        pts.into_iter()
            .map(|pt| (pt.x(), pt.y()))
            .collect::<Vec<_>>(),
    ))
}
