//! Fixes to the addresses once the buildings they belong to are known.

use std::collections::{BTreeMap, HashSet};

use crate::records::{Address, Construction};

/// Points every address at the cadastre's photo of its facade. `url` has a `{}` where the last
/// 14 characters of the address ID (the cadastral reference) go.
pub fn set_image_links(addresses: &mut [Address], url: &str) {
    for a in addresses {
        let id = a.local_id.as_str();
        let start = id
            .char_indices()
            .rev()
            .nth(13)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        a.image = Some(url.replace("{}", &id[start..]));
    }
}

/// Removes addresses whose building doesn't exist. Returns the number removed.
pub fn delete_orphans(addresses: &mut Vec<Address>, constructions: &[Construction]) -> usize {
    let buildings: HashSet<&str> = constructions
        .iter()
        .filter(|c| c.is_building())
        .map(|c| c.local_id.as_str())
        .collect();
    let before = addresses.len();
    addresses.retain(|a| buildings.contains(a.reference()));
    let removed = before - addresses.len();
    if removed > 0 {
        debug!("Deleted {} addresses without a building", removed);
    }
    removed
}

/// What `move_entrances` did.
#[derive(Debug, Default, PartialEq)]
pub struct MovedEntrances {
    pub moved: usize,
    /// Too far from their building, so they became addresses of the whole building
    pub too_far: usize,
}

/// Moves every entrance onto the outline of its building, reusing a vertex within `tolerance` or
/// inserting a new one into the nearest wall. Parts of the building with a wall through that
/// point get the vertex too, so they share the node. Entrances farther than `threshold` stop
/// being entrances.
pub fn move_entrances(
    addresses: &mut [Address],
    constructions: &mut [Construction],
    threshold: f64,
    tolerance: f64,
) -> MovedEntrances {
    let mut by_building: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, c) in constructions.iter().enumerate() {
        if c.is_building() || c.is_part() {
            by_building
                .entry(c.building_id().to_string())
                .or_insert_with(Vec::new)
                .push(idx);
        }
    }

    let mut result = MovedEntrances::default();
    for a in addresses.iter_mut().filter(|a| a.is_entrance()) {
        let members = match by_building.get(a.reference()) {
            Some(list) => list,
            None => continue,
        };
        let building = match members.iter().find(|idx| constructions[**idx].is_building()) {
            Some(idx) => *idx,
            None => continue,
        };
        let (target, dist) = match constructions[building].polygon.closest_outline_pt(a.pt) {
            Some(x) => x,
            None => continue,
        };
        if dist > threshold {
            a.specification = Some("Parcel".to_string());
            result.too_far += 1;
            continue;
        }
        let vertex = constructions[building]
            .polygon
            .insert_vertex(target, tolerance)
            .unwrap_or(target);
        for idx in members.iter().filter(|idx| **idx != building) {
            constructions[*idx].polygon.insert_vertex(vertex, tolerance);
        }
        a.pt = vertex;
        result.moved += 1;
    }
    if result.too_far > 0 {
        debug!(
            "{} entrances too far from their building became building addresses",
            result.too_far
        );
    }
    result
}
