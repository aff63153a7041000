//! Repairs the parcel layer against the buildings. Cadastral parcels are frequently missing,
//! empty, or split into pieces that don't match how the buildings on them are actually built.
//! Every operation here is idempotent.

use std::collections::{BTreeMap, BTreeSet};

use geom::{FindIntersecting, Polygon};

use crate::group::adjacency_groups;
use crate::records::{Construction, Parcel};

fn index(parcels: &[Parcel]) -> FindIntersecting<usize> {
    FindIntersecting::new(
        parcels
            .iter()
            .enumerate()
            .map(|(idx, p)| (idx, p.polygon.get_bounds())),
    )
}

/// For each whole building (by position in `buildings`), the position of the first parcel that
/// mostly contains it.
fn assign_buildings(parcels: &[Parcel], buildings: &[&Construction]) -> Vec<Option<usize>> {
    let index = index(parcels);
    buildings
        .iter()
        .map(|b| {
            index
                .query(&b.polygon.get_bounds())
                .into_iter()
                .find(|idx| parcels[*idx].polygon.mostly_contains(&b.polygon))
        })
        .collect()
}

fn whole_buildings(constructions: &[Construction]) -> Vec<&Construction> {
    constructions.iter().filter(|c| c.is_building()).collect()
}

/// Removes every parcel without any building inside. Where parcels overlap, a building counts
/// for each of them. Returns the number removed.
pub fn delete_void_parcels(parcels: &mut Vec<Parcel>, constructions: &[Construction]) -> usize {
    let index = index(parcels);
    let mut used: BTreeSet<usize> = BTreeSet::new();
    for b in whole_buildings(constructions) {
        for idx in index.query(&b.polygon.get_bounds()) {
            if parcels[idx].polygon.mostly_contains(&b.polygon) {
                used.insert(idx);
            }
        }
    }
    let before = parcels.len();
    let mut idx = 0;
    parcels.retain(|_| {
        idx += 1;
        used.contains(&(idx - 1))
    });
    let removed = before - parcels.len();
    if removed > 0 {
        debug!("Deleted {} parcels without buildings", removed);
    }
    removed
}

/// Buildings not inside any parcel are grouped by adjacency, and each group becomes a new parcel
/// covering the union of its footprints. The new parcel takes the smallest building ID of the
/// group. Returns the number of parcels created.
pub fn create_missing_parcels(
    parcels: &mut Vec<Parcel>,
    constructions: &[Construction],
    tolerance: f64,
) -> usize {
    let buildings = whole_buildings(constructions);
    let orphans: Vec<(String, &Polygon)> = assign_buildings(parcels, &buildings)
        .into_iter()
        .zip(buildings.iter())
        .filter(|(parcel, _)| parcel.is_none())
        .map(|(_, b)| (b.local_id.clone(), &b.polygon))
        .collect();
    let footprints: BTreeMap<&str, &Polygon> =
        orphans.iter().map(|(id, p)| (id.as_str(), *p)).collect();

    let mut created = 0;
    for group in adjacency_groups(&orphans, tolerance) {
        let local_id = match group.iter().next() {
            Some(id) => id.clone(),
            None => continue,
        };
        let polygons: Vec<Polygon> = group
            .iter()
            .filter_map(|id| footprints.get(id.as_str()).map(|p| (*p).clone()))
            .collect();
        if let Some(polygon) = Polygon::union_all(polygons) {
            parcels.push(Parcel {
                local_id,
                polygon,
                label: None,
                parts: None,
            });
            created += 1;
        }
    }
    if created > 0 {
        debug!("Created {} missing parcels", created);
    }
    created
}

/// How parcels relate to the adjacency groups of their buildings.
#[derive(Debug, Default, PartialEq)]
pub struct ParcelGroups {
    /// Parcels holding buildings from more than one adjacency group. Splitting them is up to the
    /// caller.
    pub split: Vec<String>,
    /// Sets of two or more parcels whose buildings all belong to one adjacency group
    pub merge: Vec<BTreeSet<String>>,
}

pub fn get_groups_by_adjacent_buildings(
    parcels: &[Parcel],
    constructions: &[Construction],
    tolerance: f64,
) -> ParcelGroups {
    let buildings = whole_buildings(constructions);
    let assignment = assign_buildings(parcels, &buildings);

    // Only buildings inside some parcel take part
    let inside: Vec<(usize, &Polygon)> = assignment
        .iter()
        .enumerate()
        .filter(|(_, parcel)| parcel.is_some())
        .map(|(idx, _)| (idx, &buildings[idx].polygon))
        .collect();
    let mut group_of_building: BTreeMap<usize, usize> = BTreeMap::new();
    for (group_idx, group) in adjacency_groups(&inside, tolerance).into_iter().enumerate() {
        for b in group {
            group_of_building.insert(b, group_idx);
        }
    }

    let mut groups_per_parcel: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for (b, parcel) in assignment.iter().enumerate() {
        if let (Some(parcel), Some(group)) = (parcel, group_of_building.get(&b)) {
            groups_per_parcel
                .entry(*parcel)
                .or_insert_with(BTreeSet::new)
                .insert(*group);
        }
    }

    let mut result = ParcelGroups::default();
    let mut candidates: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
    for (parcel, groups) in groups_per_parcel {
        let local_id = parcels[parcel].local_id.clone();
        if groups.len() > 1 {
            result.split.push(local_id);
        } else if let Some(group) = groups.into_iter().next() {
            candidates
                .entry(group)
                .or_insert_with(BTreeSet::new)
                .insert(local_id);
        }
    }
    result.merge = candidates
        .into_values()
        .filter(|set| set.len() > 1)
        .collect();
    result
}

/// Merges every set of parcels sharing one adjacency group into the parcel with the smallest ID.
/// Returns the surviving parcel ID of every building inside some parcel, for use as a task label.
pub fn merge_by_adjacent_buildings(
    parcels: &mut Vec<Parcel>,
    constructions: &[Construction],
    tolerance: f64,
) -> BTreeMap<String, String> {
    let groups = get_groups_by_adjacent_buildings(parcels, constructions, tolerance);

    let mut survivor_of: BTreeMap<String, String> = BTreeMap::new();
    for set in &groups.merge {
        // Sets are ordered, so the first is the smallest ID
        if let Some(survivor) = set.iter().next() {
            for id in set {
                survivor_of.insert(id.clone(), survivor.clone());
            }
        }
    }

    let mut absorbed: BTreeMap<String, Vec<Polygon>> = BTreeMap::new();
    for p in parcels.iter() {
        if let Some(survivor) = survivor_of.get(&p.local_id) {
            absorbed
                .entry(survivor.clone())
                .or_insert_with(Vec::new)
                .push(p.polygon.clone());
        }
    }
    let before = parcels.len();
    parcels.retain(|p| match survivor_of.get(&p.local_id) {
        Some(survivor) => *survivor == p.local_id,
        None => true,
    });
    for p in parcels.iter_mut() {
        if let Some(polygons) = absorbed.remove(&p.local_id) {
            if let Some(union) = Polygon::union_all(polygons) {
                p.polygon = union;
            }
        }
    }
    if before > parcels.len() {
        debug!("Merged {} parcels", before - parcels.len());
    }

    let buildings = whole_buildings(constructions);
    let mut lookup = BTreeMap::new();
    for (b, parcel) in buildings.iter().zip(assign_buildings(parcels, &buildings)) {
        if let Some(parcel) = parcel {
            lookup.insert(b.local_id.clone(), parcels[parcel].local_id.clone());
        }
    }
    lookup
}

/// Sets the number of building parts inside every parcel. Returns the counts by parcel ID.
pub fn count_parts(
    parcels: &mut [Parcel],
    constructions: &[Construction],
) -> BTreeMap<String, usize> {
    let parts: Vec<&Construction> = constructions.iter().filter(|c| c.is_part()).collect();
    let mut counts = vec![0; parcels.len()];
    for parcel in assign_buildings(parcels, &parts).into_iter().flatten() {
        counts[parcel] += 1;
    }
    let mut result = BTreeMap::new();
    for (p, count) in parcels.iter_mut().zip(counts) {
        p.parts = Some(count);
        result.insert(p.local_id.clone(), count);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-6;

    fn parcel(local_id: &str, polygon: Polygon) -> Parcel {
        Parcel {
            local_id: local_id.to_string(),
            polygon,
            label: None,
            parts: None,
        }
    }

    fn cons(local_id: &str, polygon: Polygon) -> Construction {
        Construction {
            local_id: local_id.to_string(),
            polygon,
            condition: None,
            current_use: None,
            nature: None,
            lev_above: None,
            lev_below: None,
            layer: None,
            fixme: None,
            task: None,
        }
    }

    fn ids(parcels: &[Parcel]) -> Vec<&str> {
        parcels.iter().map(|p| p.local_id.as_str()).collect()
    }

    #[test]
    fn void_parcels_deleted_once() {
        let mut parcels = vec![
            parcel("P1", Polygon::rectangle(0.0, 0.0, 10.0, 10.0)),
            parcel("P2", Polygon::rectangle(10.0, 0.0, 20.0, 10.0)),
        ];
        let buildings = vec![cons("B1", Polygon::rectangle(1.0, 1.0, 3.0, 3.0))];
        assert_eq!(delete_void_parcels(&mut parcels, &buildings), 1);
        assert_eq!(ids(&parcels), vec!["P1"]);
        assert_eq!(delete_void_parcels(&mut parcels, &buildings), 0);
    }

    #[test]
    fn overlapping_parcels_share_a_building() {
        let mut parcels = vec![
            parcel("P1", Polygon::rectangle(0.0, 0.0, 2.0, 1.0)),
            parcel("P2", Polygon::rectangle(0.1, 0.0, 2.1, 1.0)),
        ];
        let buildings = vec![cons("B1", Polygon::rectangle(0.5, 0.2, 1.5, 0.8))];
        assert_eq!(delete_void_parcels(&mut parcels, &buildings), 0);
        assert_eq!(ids(&parcels), vec!["P1", "P2"]);
        // Still just one owner, so nothing is an orphan
        assert_eq!(
            create_missing_parcels(&mut parcels, &buildings, TOLERANCE),
            0
        );
    }

    #[test]
    fn missing_parcels_from_orphan_groups() {
        let mut parcels = vec![parcel("P1", Polygon::rectangle(0.0, 0.0, 10.0, 10.0))];
        let buildings = vec![
            cons("B1", Polygon::rectangle(1.0, 1.0, 3.0, 3.0)),
            // Two touching orphans and a lonely one
            cons("Z2", Polygon::rectangle(20.0, 0.0, 22.0, 2.0)),
            cons("Z1", Polygon::rectangle(22.0, 0.0, 24.0, 2.0)),
            cons("Y", Polygon::rectangle(40.0, 0.0, 42.0, 2.0)),
            // Parts are never orphans
            cons("X_part1", Polygon::rectangle(50.0, 0.0, 52.0, 2.0)),
        ];
        assert_eq!(create_missing_parcels(&mut parcels, &buildings, TOLERANCE), 2);
        assert_eq!(ids(&parcels), vec!["P1", "Z1", "Y"]);
        assert!((parcels[1].polygon.area() - 8.0).abs() < 1e-9);

        // Reconciling again changes nothing
        let before = parcels.clone();
        assert_eq!(delete_void_parcels(&mut parcels, &buildings), 0);
        assert_eq!(create_missing_parcels(&mut parcels, &buildings, TOLERANCE), 0);
        assert_eq!(parcels, before);
    }

    fn split_block() -> (Vec<Parcel>, Vec<Construction>) {
        let parcels = vec![
            parcel("P3", Polygon::rectangle(0.0, 0.0, 10.0, 10.0)),
            parcel("P1", Polygon::rectangle(10.0, 0.0, 20.0, 10.0)),
            parcel("P2", Polygon::rectangle(20.0, 0.0, 30.0, 10.0)),
            parcel("P4", Polygon::rectangle(30.0, 0.0, 40.0, 10.0)),
        ];
        let buildings = vec![
            // One row of buildings across P3 and P1
            cons("B1", Polygon::rectangle(5.0, 1.0, 10.0, 3.0)),
            cons("B2", Polygon::rectangle(10.0, 1.0, 15.0, 3.0)),
            // P2 holds two separate buildings, one touching P4's
            cons("B3", Polygon::rectangle(21.0, 1.0, 23.0, 3.0)),
            cons("B4", Polygon::rectangle(25.0, 1.0, 30.0, 3.0)),
            cons("B5", Polygon::rectangle(30.0, 1.0, 35.0, 3.0)),
            cons("B1_part1", Polygon::rectangle(6.0, 1.0, 7.0, 2.0)),
            cons("B1_part2", Polygon::rectangle(8.0, 1.0, 9.0, 2.0)),
        ];
        (parcels, buildings)
    }

    #[test]
    fn groups_by_adjacent_buildings() {
        let (parcels, buildings) = split_block();
        let groups = get_groups_by_adjacent_buildings(&parcels, &buildings, TOLERANCE);
        assert_eq!(groups.split, vec!["P2".to_string()]);
        assert_eq!(
            groups.merge,
            vec![vec!["P1".to_string(), "P3".to_string()]
                .into_iter()
                .collect::<BTreeSet<_>>()]
        );
    }

    #[test]
    fn merge_keeps_smallest_id() {
        let (mut parcels, buildings) = split_block();
        let lookup = merge_by_adjacent_buildings(&mut parcels, &buildings, TOLERANCE);
        assert_eq!(ids(&parcels), vec!["P1", "P2", "P4"]);
        assert!((parcels[0].polygon.area() - 200.0).abs() < 1e-9);
        assert_eq!(lookup["B1"], "P1");
        assert_eq!(lookup["B2"], "P1");
        assert_eq!(lookup["B3"], "P2");
        assert_eq!(lookup["B5"], "P4");

        let before = parcels.clone();
        merge_by_adjacent_buildings(&mut parcels, &buildings, TOLERANCE);
        assert_eq!(parcels, before);

        let counts = count_parts(&mut parcels, &buildings);
        assert_eq!(counts["P1"], 2);
        assert_eq!(counts["P4"], 0);
        assert_eq!(parcels[0].parts, Some(2));
    }
}
