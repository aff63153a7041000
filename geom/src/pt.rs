use std::fmt;

/// A position in WGS84 degrees. x is the longitude, y the latitude.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pt2D {
    x: f64,
    y: f64,
}

impl Pt2D {
    pub fn new(x: f64, y: f64) -> Pt2D {
        if !x.is_finite() || !y.is_finite() {
            panic!("Bad Pt2D {}, {}", x, y);
        }
        Pt2D { x, y }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    /// Planar distance, in the same units as the coordinates.
    pub fn dist_to(&self, to: Pt2D) -> f64 {
        ((self.x - to.x).powi(2) + (self.y - to.y).powi(2)).sqrt()
    }

    pub fn approx_eq(&self, other: Pt2D, threshold: f64) -> bool {
        self.dist_to(other) <= threshold
    }
}

impl fmt::Display for Pt2D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pt2D({0}, {1})", self.x(), self.y())
    }
}

impl From<Pt2D> for geo::Point<f64> {
    fn from(pt: Pt2D) -> Self {
        geo::Point::new(pt.x, pt.y)
    }
}

impl From<geo::Point<f64>> for Pt2D {
    fn from(pt: geo::Point<f64>) -> Self {
        Pt2D::new(pt.x(), pt.y())
    }
}
