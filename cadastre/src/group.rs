use std::collections::BTreeSet;

use petgraph::graphmap::UnGraphMap;

use geom::{FindIntersecting, Polygon};

/// Partitions features into connected components, where an edge means `is_adjacent` holds. Only
/// pairs whose bounding boxes come within `search_buffer` of each other are tested, so the
/// predicate must never hold beyond that distance.
///
/// Every input key lands in exactly one group. Groups are ordered by the position of their first
/// feature in the input.
pub fn group<K, F>(
    features: &[(K, &Polygon)],
    search_buffer: f64,
    is_adjacent: F,
) -> Vec<BTreeSet<K>>
where
    K: Clone + Ord,
    F: Fn(&Polygon, &Polygon) -> bool,
{
    let index = FindIntersecting::new(
        features
            .iter()
            .enumerate()
            .map(|(idx, (_, poly))| (idx, poly.get_bounds())),
    );

    let mut graph: UnGraphMap<usize, ()> = UnGraphMap::new();
    for (idx, (_, poly)) in features.iter().enumerate() {
        graph.add_node(idx);
        for other in index.query(&poly.get_bounds().buffer(search_buffer)) {
            if other > idx && is_adjacent(poly, features[other].1) {
                graph.add_edge(idx, other, ());
            }
        }
    }

    let mut components: Vec<Vec<usize>> = petgraph::algo::kosaraju_scc(&graph);
    for c in &mut components {
        c.sort_unstable();
    }
    components.sort_by_key(|c| c[0]);
    components
        .into_iter()
        .map(|c| c.into_iter().map(|idx| features[idx].0.clone()).collect())
        .collect()
}

/// Groups polygons that touch, overlap, or lie within `tolerance` of each other.
pub fn adjacency_groups<K: Clone + Ord>(
    features: &[(K, &Polygon)],
    tolerance: f64,
) -> Vec<BTreeSet<K>> {
    group(features, tolerance, |a, b| a.is_adjacent(b, tolerance))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squares(xs: &[f64]) -> Vec<Polygon> {
        xs.iter()
            .map(|x| Polygon::rectangle(*x, 0.0, x + 1.0, 1.0))
            .collect()
    }

    #[test]
    fn groups_partition_the_input() {
        // 0 and 1 touch, 3 touches 0, 2 is far away
        let polys = squares(&[0.0, 1.0, 10.0, -1.0]);
        let features: Vec<(usize, &Polygon)> = polys.iter().enumerate().collect();
        let groups = adjacency_groups(&features, 1e-6);
        assert_eq!(
            groups,
            vec![
                vec![0, 1, 3].into_iter().collect::<BTreeSet<_>>(),
                vec![2].into_iter().collect(),
            ]
        );
    }

    #[test]
    fn degenerate_inputs() {
        let empty: Vec<(usize, &Polygon)> = Vec::new();
        assert!(adjacency_groups(&empty, 1e-6).is_empty());

        let polys = squares(&[0.0, 5.0, 10.0]);
        let features: Vec<(&str, &Polygon)> = vec!["c", "a", "b"]
            .into_iter()
            .zip(polys.iter())
            .collect();
        let groups = adjacency_groups(&features, 1e-6);
        let singletons: Vec<Vec<&str>> = groups
            .into_iter()
            .map(|g| g.into_iter().collect())
            .collect();
        assert_eq!(singletons, vec![vec!["c"], vec!["a"], vec!["b"]]);
    }

    #[test]
    fn tolerance_bridges_gaps() {
        let polys = squares(&[0.0, 1.001]);
        let features: Vec<(usize, &Polygon)> = polys.iter().enumerate().collect();
        assert_eq!(adjacency_groups(&features, 1e-6).len(), 2);
        assert_eq!(adjacency_groups(&features, 0.01).len(), 1);
    }
}
