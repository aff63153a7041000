use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::Bounds;

/// Finds everything whose bounding box intersects a query box. Callers refine the candidates with
/// an exact predicate.
pub struct FindIntersecting<K> {
    keys: Vec<K>,
    tree: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>>,
}

impl<K: Clone> FindIntersecting<K> {
    pub fn new<I: IntoIterator<Item = (K, Bounds)>>(objects: I) -> FindIntersecting<K> {
        let mut keys = Vec::new();
        let mut entries = Vec::new();
        for (key, b) in objects {
            if b.is_empty() {
                continue;
            }
            entries.push(GeomWithData::new(
                Rectangle::from_corners([b.min_x, b.min_y], [b.max_x, b.max_y]),
                keys.len(),
            ));
            keys.push(key);
        }
        FindIntersecting {
            keys,
            tree: RTree::bulk_load(entries),
        }
    }

    /// Candidates in insertion order
    pub fn query(&self, b: &Bounds) -> Vec<K> {
        if b.is_empty() {
            return Vec::new();
        }
        let envelope = AABB::from_corners([b.min_x, b.min_y], [b.max_x, b.max_y]);
        let mut found: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|obj| obj.data)
            .collect();
        found.sort_unstable();
        found.into_iter().map(|idx| self.keys[idx].clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pt2D;

    #[test]
    fn query_returns_insertion_order() {
        let index = FindIntersecting::new(vec![
            ("c", Bounds::from(&[Pt2D::new(5.0, 5.0), Pt2D::new(6.0, 6.0)])),
            ("a", Bounds::from(&[Pt2D::new(0.0, 0.0), Pt2D::new(1.0, 1.0)])),
            ("b", Bounds::from(&[Pt2D::new(1.0, 0.0), Pt2D::new(2.0, 1.0)])),
            ("empty", Bounds::new()),
        ]);
        assert_eq!(index.len(), 3);
        let hits = index.query(&Bounds::from(&[Pt2D::new(0.5, 0.5), Pt2D::new(1.5, 0.5)]));
        assert_eq!(hits, vec!["a", "b"]);
        assert!(index.query(&Bounds::new()).is_empty());
    }
}
