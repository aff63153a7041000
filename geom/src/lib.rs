//! The geometry primitives the cadastre pipeline relies on: points in WGS84 degrees, (multi)polygon
//! footprints, bounding boxes, and a spatial index. All the real computational geometry is
//! delegated to the `geo` crate.

mod bounds;
mod find_intersecting;
mod geometry;
mod polygon;
mod pt;

pub use crate::bounds::Bounds;
pub use crate::find_intersecting::FindIntersecting;
pub use crate::geometry::Geometry;
pub use crate::polygon::Polygon;
pub use crate::pt::Pt2D;

/// Below this, two coordinates are considered the same. In degrees; roughly a centimeter.
pub const EPSILON_DEGREES: f64 = 1e-7;
