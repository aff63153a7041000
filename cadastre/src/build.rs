//! Turns translated features into an OSM element graph. Footprint vertices within a tolerance
//! of each other become one shared node, so adjacent buildings share their walls.

use std::collections::{HashMap, HashSet};

use abstutil::{Tags, Timer};
use geom::{Polygon, Pt2D};
use osm_data::{Member, NodeID, OsmData, OsmID};

use crate::translate::{translate, AsRecord, Record};
use crate::Report;

/// Incrementally builds one `OsmData`.
pub struct Builder {
    data: OsmData,
    tolerance: f64,
    /// Vertices bucketed by a grid with cells `tolerance` wide
    grid: HashMap<(i64, i64), Vec<NodeID>>,
    degenerate_ways: usize,
}

impl Builder {
    pub fn new(tolerance: f64) -> Builder {
        Builder {
            data: OsmData::new(),
            tolerance,
            grid: HashMap::new(),
            degenerate_ways: 0,
        }
    }

    fn cell(&self, pt: Pt2D) -> (i64, i64) {
        if self.tolerance <= 0.0 {
            return (pt.x().to_bits() as i64, pt.y().to_bits() as i64);
        }
        (
            (pt.x() / self.tolerance).floor() as i64,
            (pt.y() / self.tolerance).floor() as i64,
        )
    }

    /// The vertex at this position, reusing the first one created within tolerance.
    fn vertex(&mut self, pt: Pt2D) -> NodeID {
        let (cx, cy) = self.cell(pt);
        let neighbours = if self.tolerance <= 0.0 { 0 } else { 1 };
        for dx in -neighbours..=neighbours {
            for dy in -neighbours..=neighbours {
                if let Some(candidates) = self.grid.get(&(cx + dx, cy + dy)) {
                    for id in candidates {
                        if self.data.nodes[id].pt.approx_eq(pt, self.tolerance) {
                            return *id;
                        }
                    }
                }
            }
        }
        let id = self.data.add_node(pt, Tags::empty());
        self.grid.entry((cx, cy)).or_insert_with(Vec::new).push(id);
        id
    }

    /// A closed ring of vertices, or None if snapping collapsed it below 3 distinct nodes.
    fn ring(&mut self, pts: &[Pt2D]) -> Option<Vec<NodeID>> {
        let mut nodes: Vec<NodeID> = pts.iter().map(|pt| self.vertex(*pt)).collect();
        nodes.dedup();
        if nodes.len() > 1 && nodes[0] == nodes[nodes.len() - 1] {
            nodes.pop();
        }
        let mut distinct = nodes.clone();
        distinct.sort();
        distinct.dedup();
        if distinct.len() < 3 {
            self.degenerate_ways += 1;
            return None;
        }
        nodes.push(nodes[0]);
        Some(nodes)
    }

    /// Tagged points are kept where they are, never snapped onto footprint vertices.
    pub fn add_point(&mut self, pt: Pt2D, tags: Tags) -> NodeID {
        self.data.add_node(pt, tags)
    }

    /// A simple polygon becomes one tagged way, anything with holes or several pieces a
    /// multipolygon relation. Degenerate rings are dropped; None if nothing is left of the outer
    /// footprint.
    pub fn add_polygon(&mut self, polygon: &Polygon, tags: Tags) -> Option<OsmID> {
        let rings = polygon.rings();
        if rings.len() == 1 && rings[0].len() == 1 {
            let nodes = self.ring(&rings[0][0])?;
            return Some(OsmID::Way(self.data.add_way(nodes, tags)));
        }

        let mut members = Vec::new();
        for poly in rings {
            let mut poly = poly.into_iter();
            // Holes of a dropped outer ring go too
            let outer = match poly.next().and_then(|pts| self.ring(&pts)) {
                Some(nodes) => nodes,
                None => continue,
            };
            let way = self.data.add_way(outer, Tags::empty());
            members.push(Member::new(OsmID::Way(way), "outer"));
            for hole in poly {
                if let Some(nodes) = self.ring(&hole) {
                    let way = self.data.add_way(nodes, Tags::empty());
                    members.push(Member::new(OsmID::Way(way), "inner"));
                }
            }
        }
        if members.is_empty() {
            return None;
        }
        let mut tags = tags;
        tags.insert("type", "multipolygon");
        Some(OsmID::Relation(self.data.add_relation(members, tags)))
    }

    pub fn add(&mut self, record: Record, tags: Tags) -> Option<OsmID> {
        match record {
            Record::Address(a) => Some(OsmID::Node(self.add_point(a.pt, tags))),
            Record::Construction(c) => self.add_polygon(&c.polygon, tags),
            Record::Parcel(p) => self.add_polygon(&p.polygon, tags),
            Record::Zoning(z) => self.add_polygon(&z.polygon, tags),
        }
    }

    /// Drops unused vertices and merges exact duplicates. Also returns how many rings were
    /// degenerate.
    pub fn finish(mut self) -> (OsmData, usize) {
        // Vertices of rejected rings
        let used: HashSet<NodeID> = self
            .data
            .ways
            .values()
            .flat_map(|w| w.nodes.iter().cloned())
            .collect();
        self.data
            .nodes
            .retain(|id, n| !n.tags.is_empty() || used.contains(id));

        let merged = self.data.merge_duplicated();
        if merged > 0 {
            debug!("Merged {} duplicated elements", merged);
        }
        (self.data, self.degenerate_ways)
    }
}

/// Translates and builds every feature. Features without any tags are skipped.
pub fn to_osm<T: AsRecord>(
    features: &[T],
    tolerance: f64,
    upload: &str,
    source_date: Option<&str>,
    report: &mut Report,
    timer: &mut Timer,
) -> OsmData {
    let mut builder = Builder::new(tolerance);
    let mut skipped = 0;
    timer.start_iter("build OSM elements", features.len());
    for f in features {
        timer.next();
        let record = f.as_record();
        let tags = translate(record);
        if tags.is_empty() {
            skipped += 1;
            continue;
        }
        if tags.contains_key("fixme") {
            report.fixmes += 1;
        }
        builder.add(record, tags);
    }
    if skipped > 0 {
        debug!("Skipped {} features without tags", skipped);
    }

    let (mut data, degenerate) = builder.finish();
    if degenerate > 0 {
        timer.warn(format!("Rejected {} degenerate ways", degenerate));
    }
    report.degenerate_ways += degenerate;
    data.upload = upload.to_string();
    if let Some(date) = source_date {
        data.tags.insert("source:date", date);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Address, Construction};

    fn cons(local_id: &str, polygon: Polygon) -> Construction {
        Construction {
            local_id: local_id.to_string(),
            polygon,
            condition: Some("functional".to_string()),
            current_use: None,
            nature: None,
            lev_above: None,
            lev_below: None,
            layer: None,
            fixme: None,
            task: None,
        }
    }

    fn build(features: &[Construction], report: &mut Report) -> OsmData {
        to_osm(
            features,
            1e-7,
            "never",
            Some("2023-01-01"),
            report,
            &mut Timer::throwaway(),
        )
    }

    #[test]
    fn adjacent_buildings_share_nodes() {
        let mut report = Report::new();
        let data = build(
            &[
                cons("A", Polygon::rectangle(0.0, 0.0, 1.0, 1.0)),
                // Off by less than the tolerance
                cons("B", Polygon::rectangle(1.00000001, 0.0, 2.0, 1.0)),
            ],
            &mut report,
        );
        assert_eq!(data.ways.len(), 2);
        assert_eq!(data.nodes.len(), 6);
        assert!(data.ways.values().all(|w| w.is_closed() && w.nodes.len() == 5));
        assert!(data.tags.is("source:date", "2023-01-01"));
        assert_eq!(report.degenerate_ways, 0);

        // No two nodes within tolerance survive
        let pts: Vec<Pt2D> = data.nodes.values().map(|n| n.pt).collect();
        for (i, a) in pts.iter().enumerate() {
            for b in &pts[i + 1..] {
                assert!(!a.approx_eq(*b, 1e-7));
            }
        }
    }

    #[test]
    fn holes_and_pieces_make_relations() {
        let with_hole = Polygon::from_rings(vec![vec![
            vec![
                Pt2D::new(0.0, 0.0),
                Pt2D::new(10.0, 0.0),
                Pt2D::new(10.0, 10.0),
                Pt2D::new(0.0, 10.0),
            ],
            vec![
                Pt2D::new(4.0, 4.0),
                Pt2D::new(6.0, 4.0),
                Pt2D::new(6.0, 6.0),
                Pt2D::new(4.0, 6.0),
            ],
        ]])
        .unwrap();
        let mut report = Report::new();
        let data = build(&[cons("A", with_hole)], &mut report);
        assert_eq!(data.relations.len(), 1);
        let rel = data.relations.values().next().unwrap();
        assert!(rel.tags.is("type", "multipolygon"));
        assert!(rel.tags.is("ref", "A"));
        let roles: Vec<&str> = rel.members.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["outer", "inner"]);
        assert!(data.ways.values().all(|w| w.tags.is_empty()));
    }

    #[test]
    fn degenerate_rings_rejected() {
        let mut report = Report::new();
        let data = build(
            &[
                cons("A", Polygon::rectangle(0.0, 0.0, 1.0, 1e-8)),
                cons("B", Polygon::rectangle(5.0, 5.0, 6.0, 6.0)),
            ],
            &mut report,
        );
        assert_eq!(data.ways.len(), 1);
        assert_eq!(report.degenerate_ways, 1);
        assert!(data.ways.values().all(|w| w.nodes.len() >= 3));
    }

    #[test]
    fn addresses_are_points() {
        let address = Address {
            local_id: "ES.SDGC.AD.38001.B".to_string(),
            pt: Pt2D::new(0.0, 0.0),
            specification: None,
            designator: "1".to_string(),
            thoroughfare: Some("Calle Mayor".to_string()),
            post_code: None,
            image: None,
            pd_id: None,
            tn_id: None,
            task: None,
        };
        let mut nameless = address.clone();
        nameless.thoroughfare = None;
        let mut report = Report::new();
        let data = to_osm(
            &[address, nameless],
            1e-7,
            "never",
            None,
            &mut report,
            &mut Timer::throwaway(),
        );
        assert_eq!(data.nodes.len(), 1);
        assert!(data.nodes.values().all(|n| n.tags.is("ref", "B")));
        assert!(!data.tags.contains_key("source:date"));
    }
}
