//! Matching freshly translated data against each other and against what's already in OSM.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use abstutil::Tags;
use geom::{FindIntersecting, Polygon, Pt2D};
use osm_data::{NodeID, OsmData, OsmID, WayID};

use crate::records::{Address, Construction};
use crate::Report;

/// Moves the tags of every address node onto the building with the same `ref`. Entrance
/// addresses go onto the vertex of the building's outer footprint within `tolerance` of the
/// address position instead; if there is no such vertex, the address is skipped. Vertices are
/// snapped by the same tolerance when building, so an entrance still finds its corner after it
/// was merged with a neighbour's.
///
/// If several buildings share one `ref`, the last one in `ids_with_tag` order gets the address.
pub fn merge_address(building: &mut OsmData, address: &OsmData, tolerance: f64) {
    if let Some(date) = address.tags.get("source:date") {
        building.tags.insert("source:date:addr", date.clone());
    }

    let mut buildings: BTreeMap<String, OsmID> = BTreeMap::new();
    for id in building.ids_with_tag("ref") {
        if let Some(r) = building.tags(id).and_then(|t| t.get("ref")) {
            buildings.insert(r.clone(), id);
        }
    }
    let mut addresses: BTreeMap<&str, (&Tags, Pt2D)> = BTreeMap::new();
    for node in address.nodes.values() {
        if let Some(r) = node.tags.get("ref") {
            addresses.insert(r.as_str(), (&node.tags, node.pt));
        }
    }

    let mut merged = 0;
    let mut missing_entrances = 0;
    for (r, id) in buildings {
        let (tags, pt) = match addresses.get(r.as_str()) {
            Some(x) => *x,
            None => continue,
        };
        if tags.contains_key("entrance") {
            let entrance = building
                .outer_ways(id)
                .into_iter()
                .find_map(|w| building.search_node(w, pt, tolerance));
            match entrance.and_then(|n| building.nodes.get_mut(&n)) {
                Some(node) => {
                    node.tags.extend(tags);
                    node.tags.remove("ref");
                    merged += 1;
                }
                None => {
                    missing_entrances += 1;
                }
            }
        } else if let Some(building_tags) = building.tags_mut(id) {
            building_tags.extend(tags);
            merged += 1;
        }
    }
    debug!(
        "Merged {} addresses into buildings, {} entrances not found",
        merged, missing_entrances
    );
}

/// The key two addresses are considered equal by: the street (or place) name immediately
/// followed by the house number.
pub fn address_key(street: &str, housenumber: &str) -> String {
    format!("{}{}", street, housenumber)
}

/// Collects the keys of every address currently in OSM. Elements with a street or place but no
/// house number are counted in `osm_addresses_without_number`.
pub fn current_address_keys(current: &OsmData, report: &mut Report) -> HashSet<String> {
    let mut keys = HashSet::new();
    let mut without_number = 0;
    for id in current.all_ids() {
        let tags = match current.tags(id) {
            Some(t) => t,
            None => continue,
        };
        let street = match tags.get("addr:street").or_else(|| tags.get("addr:place")) {
            Some(s) => s,
            None => continue,
        };
        match tags.get("addr:housenumber") {
            Some(number) => {
                keys.insert(address_key(street, number));
            }
            None => {
                without_number += 1;
            }
        }
    }
    if without_number > 0 {
        warn!(
            "There are {} addresses without house number in OSM",
            without_number
        );
    }
    report.osm_addresses_without_number += without_number;
    keys
}

/// Drops addresses already in OSM, and addresses without a real house number.
pub fn conflate_addresses(
    addresses: &mut Vec<Address>,
    current: &HashSet<String>,
    no_number: &str,
    report: &mut Report,
) {
    let mut refused = 0;
    let mut without_number = 0;
    addresses.retain(|a| {
        if a.designator.is_empty() || a.designator == no_number {
            without_number += 1;
            return false;
        }
        let street = a.thoroughfare.as_deref().unwrap_or("");
        if current.contains(&address_key(street, &a.designator)) {
            refused += 1;
            return false;
        }
        true
    });
    if refused > 0 {
        info!("Refused {} addresses already in OSM", refused);
    }
    report.refused_addresses += refused;
    report.addresses_without_number += without_number;
}

/// Finds the buildings currently in OSM overlapping a new building. They're tagged
/// `conflict=yes`, and everything else is dropped from `current`, keeping only the elements
/// needed to draw the conflicts. Returns the number of conflicts.
pub fn conflate_buildings(current: &mut OsmData, constructions: &[Construction]) -> usize {
    let buildings: Vec<&Polygon> = constructions
        .iter()
        .filter(|c| c.is_building())
        .map(|c| &c.polygon)
        .collect();
    let index = FindIntersecting::new(
        buildings
            .iter()
            .enumerate()
            .map(|(idx, p)| (idx, p.get_bounds())),
    );

    let mut conflicts = Vec::new();
    for id in current.ids_with_tag("building") {
        if let OsmID::Node(_) = id {
            continue;
        }
        let footprint = match outer_footprint(current, id) {
            Some(p) => p,
            None => continue,
        };
        if index
            .query(&footprint.get_bounds())
            .into_iter()
            .any(|idx| buildings[idx].intersects(&footprint))
        {
            conflicts.push(id);
        }
    }

    let mut keep_ways: BTreeSet<WayID> = BTreeSet::new();
    let mut keep_relations = BTreeSet::new();
    for id in &conflicts {
        if let Some(tags) = current.tags_mut(*id) {
            tags.insert("conflict", "yes");
        }
        keep_ways.extend(current.outer_ways(*id));
        if let OsmID::Relation(r) = id {
            keep_relations.insert(*r);
            if let Some(rel) = current.relations.get(r) {
                keep_ways.extend(rel.members.iter().filter_map(|m| match m.id {
                    OsmID::Way(w) => Some(w),
                    _ => None,
                }));
            }
        }
    }
    current.relations.retain(|id, _| keep_relations.contains(id));
    current.ways.retain(|id, _| keep_ways.contains(id));
    let keep_nodes: BTreeSet<NodeID> = current
        .ways
        .values()
        .flat_map(|w| w.nodes.iter().cloned())
        .collect();
    current.nodes.retain(|id, _| keep_nodes.contains(id));

    if !conflicts.is_empty() {
        warn!(
            "{} buildings in OSM overlap the new ones, check them in 'current_building.osm'",
            conflicts.len()
        );
    }
    conflicts.len()
}

/// One polygon per outer way of an area. None if any way is missing or too short.
fn outer_footprint(data: &OsmData, id: OsmID) -> Option<Polygon> {
    let mut polygons = Vec::new();
    for w in data.outer_ways(id) {
        let way = data.ways.get(&w)?;
        let ring: Vec<Pt2D> = way
            .nodes
            .iter()
            .filter_map(|n| data.nodes.get(n).map(|node| node.pt))
            .collect();
        polygons.push(vec![ring]);
    }
    if polygons.is_empty() {
        return None;
    }
    Polygon::from_rings(polygons).ok()
}
