use anyhow::{bail, Result};

use crate::{Bounds, Polygon, Pt2D};

/// What a source feature can look like.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point(Pt2D),
    Polygon(Polygon),
}

impl Geometry {
    pub fn from_geojson(geometry: &geojson::Geometry) -> Result<Geometry> {
        match &geometry.value {
            geojson::Value::Point(pos) => Ok(Geometry::Point(position(pos)?)),
            geojson::Value::Polygon(rings) => Ok(Geometry::Polygon(Polygon::from_rings(vec![
                positions(rings)?,
            ])?)),
            geojson::Value::MultiPolygon(polygons) => {
                let mut all = Vec::new();
                for rings in polygons {
                    all.push(positions(rings)?);
                }
                Ok(Geometry::Polygon(Polygon::from_rings(all)?))
            }
            _ => bail!("Only points, polygons, and multipolygons are supported"),
        }
    }

    pub fn to_geojson(&self) -> geojson::Geometry {
        match self {
            Geometry::Point(pt) => {
                geojson::Geometry::new(geojson::Value::Point(vec![pt.x(), pt.y()]))
            }
            Geometry::Polygon(p) => p.to_geojson(),
        }
    }

    pub fn get_bounds(&self) -> Bounds {
        match self {
            Geometry::Point(pt) => Bounds::from(&[*pt]),
            Geometry::Polygon(p) => p.get_bounds(),
        }
    }

    pub fn as_polygon(&self) -> Option<&Polygon> {
        match self {
            Geometry::Polygon(p) => Some(p),
            Geometry::Point(_) => None,
        }
    }

    pub fn as_point(&self) -> Option<Pt2D> {
        match self {
            Geometry::Point(pt) => Some(*pt),
            Geometry::Polygon(_) => None,
        }
    }
}

fn position(pos: &[f64]) -> Result<Pt2D> {
    if pos.len() < 2 || !pos[0].is_finite() || !pos[1].is_finite() {
        bail!("Bad position {:?}", pos);
    }
    Ok(Pt2D::new(pos[0], pos[1]))
}

fn positions(rings: &[Vec<Vec<f64>>]) -> Result<Vec<Vec<Pt2D>>> {
    rings
        .iter()
        .map(|ring| ring.iter().map(|pos| position(pos)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> geojson::Geometry {
        match raw.parse::<geojson::GeoJson>().unwrap() {
            geojson::GeoJson::Geometry(g) => g,
            x => panic!("not a geometry: {}", x),
        }
    }

    #[test]
    fn geojson_multipolygon() {
        let raw = r#"{"type": "MultiPolygon", "coordinates": [
            [[[0, 0], [1, 0], [1, 1], [0, 0]]],
            [[[2, 2], [3, 2], [3, 3], [2, 2]]]
        ]}"#;
        let gj = parse(raw);
        let geom = Geometry::from_geojson(&gj).unwrap();
        let poly = geom.as_polygon().unwrap();
        assert_eq!(poly.num_polygons(), 2);
        assert_eq!(geom.get_bounds().max_x, 3.0);

        let pt = parse(r#"{"type": "Point", "coordinates": [-3.7, 40.4]}"#);
        assert_eq!(
            Geometry::from_geojson(&pt).unwrap().as_point(),
            Some(Pt2D::new(-3.7, 40.4))
        );
    }
}
