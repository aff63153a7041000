use std::collections::{BTreeMap, HashMap};

use abstutil::{prettyprint_usize, Tags};
use geom::Pt2D;

use crate::{Member, Node, NodeID, OsmID, Relation, RelationID, Way, WayID};

/// One OSM data set.
#[derive(Clone, Debug)]
pub struct OsmData {
    /// Data set level tags, like `source:date`. Written as changeset tags.
    pub tags: Tags,
    /// The `upload` attribute of the root element: "never", "yes", or "false".
    pub upload: String,
    pub generator: String,

    pub nodes: BTreeMap<NodeID, Node>,
    pub ways: BTreeMap<WayID, Way>,
    pub relations: BTreeMap<RelationID, Relation>,

    next_id: usize,
}

impl OsmData {
    pub fn new() -> OsmData {
        OsmData {
            tags: Tags::empty(),
            upload: "never".to_string(),
            generator: format!("cat2osm {}", env!("CARGO_PKG_VERSION")),
            nodes: BTreeMap::new(),
            ways: BTreeMap::new(),
            relations: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn add_node(&mut self, pt: Pt2D, tags: Tags) -> NodeID {
        let id = NodeID(self.next());
        self.nodes.insert(id, Node { pt, tags });
        id
    }

    pub fn add_way(&mut self, nodes: Vec<NodeID>, tags: Tags) -> WayID {
        let id = WayID(self.next());
        self.ways.insert(id, Way { nodes, tags });
        id
    }

    pub fn add_relation(&mut self, members: Vec<Member>, tags: Tags) -> RelationID {
        let id = RelationID(self.next());
        self.relations.insert(id, Relation { members, tags });
        id
    }

    fn next(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.ways.is_empty() && self.relations.is_empty()
    }

    /// Every element, in creation order within each type: nodes, then ways, then relations.
    pub fn all_ids(&self) -> Vec<OsmID> {
        self.nodes
            .keys()
            .map(|n| OsmID::Node(*n))
            .chain(self.ways.keys().map(|w| OsmID::Way(*w)))
            .chain(self.relations.keys().map(|r| OsmID::Relation(*r)))
            .collect()
    }

    pub fn tags(&self, id: OsmID) -> Option<&Tags> {
        match id {
            OsmID::Node(n) => self.nodes.get(&n).map(|x| &x.tags),
            OsmID::Way(w) => self.ways.get(&w).map(|x| &x.tags),
            OsmID::Relation(r) => self.relations.get(&r).map(|x| &x.tags),
        }
    }

    pub fn tags_mut(&mut self, id: OsmID) -> Option<&mut Tags> {
        match id {
            OsmID::Node(n) => self.nodes.get_mut(&n).map(|x| &mut x.tags),
            OsmID::Way(w) => self.ways.get_mut(&w).map(|x| &mut x.tags),
            OsmID::Relation(r) => self.relations.get_mut(&r).map(|x| &mut x.tags),
        }
    }

    /// Ways, relations, then nodes carrying the tag key. The order matches how buildings and
    /// addresses are looked up: areas first.
    pub fn ids_with_tag(&self, key: &str) -> Vec<OsmID> {
        let mut result = Vec::new();
        for (id, w) in &self.ways {
            if w.tags.contains_key(key) {
                result.push(OsmID::Way(*id));
            }
        }
        for (id, r) in &self.relations {
            if r.tags.contains_key(key) {
                result.push(OsmID::Relation(*id));
            }
        }
        for (id, n) in &self.nodes {
            if n.tags.contains_key(key) {
                result.push(OsmID::Node(*id));
            }
        }
        result
    }

    /// The ways forming the outer footprint of an area: the way itself, or every member of a
    /// relation with the "outer" role.
    pub fn outer_ways(&self, id: OsmID) -> Vec<WayID> {
        match id {
            OsmID::Way(w) => vec![w],
            OsmID::Relation(r) => self
                .relations
                .get(&r)
                .map(|rel| {
                    rel.members
                        .iter()
                        .filter_map(|m| match m.id {
                            OsmID::Way(w) if m.role == "outer" => Some(w),
                            _ => None,
                        })
                        .collect()
                })
                .unwrap_or_default(),
            OsmID::Node(_) => Vec::new(),
        }
    }

    /// Finds the vertex of the way closest to this position, if it's within `tolerance`.
    pub fn search_node(&self, way: WayID, pt: Pt2D, tolerance: f64) -> Option<NodeID> {
        let way = self.ways.get(&way)?;
        let mut best: Option<(NodeID, f64)> = None;
        for n in &way.nodes {
            let dist = match self.nodes.get(n) {
                Some(node) => node.pt.dist_to(pt),
                None => continue,
            };
            if dist <= tolerance && best.map(|(_, d)| dist < d).unwrap_or(true) {
                best = Some((*n, dist));
            }
        }
        best.map(|(n, _)| n)
    }

    /// Removes a tag from every element. Returns how many elements had it.
    pub fn strip_tag(&mut self, key: &str) -> usize {
        let mut count = 0;
        for tags in self
            .nodes
            .values_mut()
            .map(|x| &mut x.tags)
            .chain(self.ways.values_mut().map(|x| &mut x.tags))
            .chain(self.relations.values_mut().map(|x| &mut x.tags))
        {
            if tags.remove(key).is_some() {
                count += 1;
            }
        }
        count
    }

    pub fn count_tag(&self, key: &str) -> usize {
        self.nodes
            .values()
            .map(|x| &x.tags)
            .chain(self.ways.values().map(|x| &x.tags))
            .chain(self.relations.values().map(|x| &x.tags))
            .filter(|tags| tags.contains_key(key))
            .count()
    }

    /// Collapses exact duplicates: nodes at the same position (unless both carry different
    /// tags), ways with the same node sequence and tags, and relations with the same members and
    /// tags. References are rewritten to the surviving element. Returns how many elements were
    /// removed.
    pub fn merge_duplicated(&mut self) -> usize {
        let mut removed = 0;

        let mut node_remap: HashMap<NodeID, NodeID> = HashMap::new();
        let mut by_pos: HashMap<(u64, u64), NodeID> = HashMap::new();
        let ids: Vec<NodeID> = self.nodes.keys().cloned().collect();
        for id in ids {
            let key = {
                let pt = self.nodes[&id].pt;
                (pt.x().to_bits(), pt.y().to_bits())
            };
            if let Some(keep) = by_pos.get(&key).cloned() {
                let compatible = {
                    let a = &self.nodes[&keep].tags;
                    let b = &self.nodes[&id].tags;
                    a.is_empty() || b.is_empty() || a == b
                };
                if compatible {
                    if let Some(dupe) = self.nodes.remove(&id) {
                        if let Some(node) = self.nodes.get_mut(&keep) {
                            node.tags.extend(&dupe.tags);
                        }
                    }
                    node_remap.insert(id, keep);
                    removed += 1;
                    continue;
                }
            }
            by_pos.entry(key).or_insert(id);
        }
        if !node_remap.is_empty() {
            for way in self.ways.values_mut() {
                for n in way.nodes.iter_mut() {
                    if let Some(keep) = node_remap.get(n) {
                        *n = *keep;
                    }
                }
                way.nodes.dedup();
            }
            for rel in self.relations.values_mut() {
                for m in rel.members.iter_mut() {
                    if let OsmID::Node(n) = m.id {
                        if let Some(keep) = node_remap.get(&n) {
                            m.id = OsmID::Node(*keep);
                        }
                    }
                }
            }
        }

        let mut way_remap: HashMap<WayID, WayID> = HashMap::new();
        let mut seen_ways: HashMap<(Vec<NodeID>, Tags), WayID> = HashMap::new();
        let ids: Vec<WayID> = self.ways.keys().cloned().collect();
        for id in ids {
            let key = (self.ways[&id].nodes.clone(), self.ways[&id].tags.clone());
            if let Some(keep) = seen_ways.get(&key) {
                way_remap.insert(id, *keep);
                self.ways.remove(&id);
                removed += 1;
            } else {
                seen_ways.insert(key, id);
            }
        }
        if !way_remap.is_empty() {
            for rel in self.relations.values_mut() {
                for m in rel.members.iter_mut() {
                    if let OsmID::Way(w) = m.id {
                        if let Some(keep) = way_remap.get(&w) {
                            m.id = OsmID::Way(*keep);
                        }
                    }
                }
            }
        }

        // Relations can contain relations, so rewriting members may expose more duplicates.
        loop {
            let mut rel_remap: HashMap<RelationID, RelationID> = HashMap::new();
            let mut seen: HashMap<(&[Member], &Tags), RelationID> = HashMap::new();
            for (id, rel) in &self.relations {
                match seen.get(&(rel.members.as_slice(), &rel.tags)) {
                    Some(keep) => {
                        rel_remap.insert(*id, *keep);
                    }
                    None => {
                        seen.insert((rel.members.as_slice(), &rel.tags), *id);
                    }
                }
            }
            if rel_remap.is_empty() {
                break;
            }
            for id in rel_remap.keys() {
                self.relations.remove(id);
                removed += 1;
            }
            for rel in self.relations.values_mut() {
                for m in rel.members.iter_mut() {
                    if let OsmID::Relation(r) = m.id {
                        if let Some(keep) = rel_remap.get(&r) {
                            m.id = OsmID::Relation(*keep);
                        }
                    }
                }
            }
        }

        removed
    }

    /// Appends every element of another data set, giving them fresh handles. Data set level
    /// tags are merged too.
    pub fn append(&mut self, other: OsmData) {
        self.tags.extend(&other.tags);
        let mut nodes = HashMap::new();
        for (id, node) in other.nodes {
            nodes.insert(id, self.add_node(node.pt, node.tags));
        }
        let mut ways = HashMap::new();
        for (id, way) in other.ways {
            let refs = way.nodes.iter().filter_map(|n| nodes.get(n).cloned()).collect();
            ways.insert(id, self.add_way(refs, way.tags));
        }
        // Relation members may point forwards; reserve every handle first.
        let mut relations = HashMap::new();
        for id in other.relations.keys() {
            relations.insert(*id, RelationID(self.next()));
        }
        for (id, rel) in other.relations {
            let members = rel
                .members
                .into_iter()
                .filter_map(|m| {
                    let id = match m.id {
                        OsmID::Node(n) => OsmID::Node(*nodes.get(&n)?),
                        OsmID::Way(w) => OsmID::Way(*ways.get(&w)?),
                        OsmID::Relation(r) => OsmID::Relation(*relations.get(&r)?),
                    };
                    Some(Member { id, role: m.role })
                })
                .collect();
            self.relations.insert(
                relations[&id],
                Relation {
                    members,
                    tags: rel.tags,
                },
            );
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{} nodes, {} ways, {} relations",
            prettyprint_usize(self.nodes.len()),
            prettyprint_usize(self.ways.len()),
            prettyprint_usize(self.relations.len())
        )
    }
}

impl Default for OsmData {
    fn default() -> Self {
        OsmData::new()
    }
}
