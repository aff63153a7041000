use std::collections::BTreeMap;

use abstutil::{plain_list_names, prettyprint_usize, Counter};

/// Everything counted over a run that's worth telling the user at the end. Each stage returns or
/// fills in its own counts; the driver merges them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    /// Per whole building, the most floors above ground over the building and its parts
    pub max_level: BTreeMap<String, i64>,
    /// Per whole building, the most floors below ground
    pub min_level: BTreeMap<String, i64>,
    pub fixmes: usize,

    pub malformed_postcodes: usize,
    pub refused_addresses: usize,
    pub addresses_without_number: usize,
    /// Current OSM addresses lacking addr:housenumber
    pub osm_addresses_without_number: usize,
    /// Addresses whose building doesn't exist
    pub orphan_addresses: usize,
    /// Entrances too far from their building, kept as building addresses
    pub far_entrances: usize,

    pub outside_parts: usize,
    pub invalid_zones: usize,
    pub unlabeled_buildings: usize,
    pub degenerate_ways: usize,
    /// Buildings in OSM overlapping the new ones
    pub building_conflicts: usize,

    pub void_parcels: usize,
    pub created_parcels: usize,
    pub merged_parcels: usize,
    pub parts_in_parcels: usize,
}

impl Report {
    pub fn new() -> Report {
        Report::default()
    }

    /// Records the levels of one building or part under its building's ID, keeping the maximum.
    pub fn update_levels(&mut self, building_id: &str, above: Option<i64>, below: Option<i64>) {
        let above = above.unwrap_or(0);
        let below = below.unwrap_or(0);
        let max = self.max_level.entry(building_id.to_string()).or_insert(above);
        *max = (*max).max(above);
        let min = self.min_level.entry(building_id.to_string()).or_insert(below);
        *min = (*min).max(below);
    }

    pub fn merge(&mut self, other: Report) {
        for (id, level) in other.max_level {
            let entry = self.max_level.entry(id).or_insert(level);
            *entry = (*entry).max(level);
        }
        for (id, level) in other.min_level {
            let entry = self.min_level.entry(id).or_insert(level);
            *entry = (*entry).max(level);
        }
        self.fixmes += other.fixmes;
        self.malformed_postcodes += other.malformed_postcodes;
        self.refused_addresses += other.refused_addresses;
        self.addresses_without_number += other.addresses_without_number;
        self.osm_addresses_without_number += other.osm_addresses_without_number;
        self.orphan_addresses += other.orphan_addresses;
        self.far_entrances += other.far_entrances;
        self.building_conflicts += other.building_conflicts;
        self.outside_parts += other.outside_parts;
        self.invalid_zones += other.invalid_zones;
        self.unlabeled_buildings += other.unlabeled_buildings;
        self.degenerate_ways += other.degenerate_ways;
        self.void_parcels += other.void_parcels;
        self.created_parcels += other.created_parcels;
        self.merged_parcels += other.merged_parcels;
        self.parts_in_parcels += other.parts_in_parcels;
    }

    /// "floors: buildings" pairs, ascending by number of floors
    pub fn floors_above(&self) -> String {
        let counter: Counter<i64> = self.max_level.values().cloned().collect();
        plain_list_names(counter.consume())
    }

    pub fn floors_below(&self) -> String {
        let counter: Counter<i64> = self.min_level.values().cloned().collect();
        plain_list_names(counter.consume())
    }

    /// Lines describing the data quality issues found, skipping everything that's zero.
    pub fn warnings(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut push = |count: usize, what: &str| {
            if count > 0 {
                lines.push(format!("{} {}", prettyprint_usize(count), what));
            }
        };
        push(
            self.malformed_postcodes,
            "addresses with a malformed postcode",
        );
        push(
            self.refused_addresses,
            "addresses refused because they exist in OSM",
        );
        push(
            self.addresses_without_number,
            "addresses deleted without house number",
        );
        push(
            self.osm_addresses_without_number,
            "addresses without house number in the OSM data",
        );
        push(self.orphan_addresses, "addresses deleted without a building");
        push(self.far_entrances, "entrances too far from their building");
        push(self.outside_parts, "parts deleted outside their building");
        push(self.invalid_zones, "zones deleted with invalid geometry");
        push(self.unlabeled_buildings, "buildings outside every zone");
        push(self.degenerate_ways, "degenerate ways rejected");
        push(self.building_conflicts, "buildings in OSM overlapping the new ones");
        push(self.void_parcels, "parcels deleted without buildings");
        push(self.created_parcels, "missing parcels created");
        push(self.merged_parcels, "parcels merged by adjacent buildings");
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_keep_the_maximum() {
        let mut a = Report::new();
        a.update_levels("A", Some(2), None);
        a.update_levels("A", Some(3), Some(1));
        a.update_levels("B", Some(2), Some(0));
        let mut b = Report::new();
        b.update_levels("C", Some(2), None);
        b.fixmes = 2;
        b.refused_addresses = 1;
        a.merge(b);

        assert_eq!(a.max_level["A"], 3);
        assert_eq!(a.min_level["A"], 1);
        assert_eq!(a.floors_above(), "2: 2, 3: 1");
        assert_eq!(a.floors_below(), "0: 2, 1: 1");
        assert_eq!(a.fixmes, 2);
        assert_eq!(
            a.warnings(),
            vec!["1 addresses refused because they exist in OSM".to_string()]
        );
    }
}
