use crate::Pt2D;

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// A boundary including no points.
    pub fn new() -> Bounds {
        Bounds {
            min_x: f64::MAX,
            min_y: f64::MAX,
            max_x: f64::MIN,
            max_y: f64::MIN,
        }
    }

    pub fn from(pts: &[Pt2D]) -> Bounds {
        let mut b = Bounds::new();
        for pt in pts {
            b.update(*pt);
        }
        b
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn update(&mut self, pt: Pt2D) {
        self.min_x = self.min_x.min(pt.x());
        self.max_x = self.max_x.max(pt.x());
        self.min_y = self.min_y.min(pt.y());
        self.max_y = self.max_y.max(pt.y());
    }

    pub fn union(&mut self, other: Bounds) {
        if other.is_empty() {
            return;
        }
        self.update(Pt2D::new(other.min_x, other.min_y));
        self.update(Pt2D::new(other.max_x, other.max_y));
    }

    pub fn contains(&self, pt: Pt2D) -> bool {
        pt.x() >= self.min_x && pt.x() <= self.max_x && pt.y() >= self.min_y && pt.y() <= self.max_y
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        !(self.is_empty()
            || other.is_empty()
            || other.min_x > self.max_x
            || other.max_x < self.min_x
            || other.min_y > self.max_y
            || other.max_y < self.min_y)
    }

    /// Grows the box by `dist` in every direction.
    pub fn buffer(&self, dist: f64) -> Bounds {
        if self.is_empty() {
            return *self;
        }
        Bounds {
            min_x: self.min_x - dist,
            min_y: self.min_y - dist,
            max_x: self.max_x + dist,
            max_y: self.max_y + dist,
        }
    }

    /// Formats as "south,west,north,east", the order Overpass expects.
    pub fn to_overpass_bbox(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_y, self.min_x, self.max_y, self.max_x
        )
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bounds_never_intersect() {
        let empty = Bounds::new();
        let b = Bounds::from(&[Pt2D::new(0.0, 0.0), Pt2D::new(1.0, 2.0)]);
        assert!(!empty.intersects(&b));
        assert!(b.intersects(&b.buffer(0.5)));
        assert!(b.contains(Pt2D::new(0.5, 1.5)));
        assert_eq!(b.to_overpass_bbox(), "0,0,2,1");

        let mut u = Bounds::new();
        u.union(empty);
        assert!(u.is_empty());
        u.union(b);
        assert_eq!(u, b);
    }
}
