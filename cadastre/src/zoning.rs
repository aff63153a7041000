use std::collections::BTreeMap;

use geojson::{Feature, FeatureCollection, GeoJson};
use serde_json::Value;

use geom::{Bounds, FindIntersecting, Polygon};

use crate::group::adjacency_groups;
use crate::records::{Address, Construction, ZoneKind, Zoning};
use crate::translate::zoning_tags;
use crate::Error;

/// The cadastral zoning, split into city blocks and rural areas. Each zone's label names a task.
pub struct ZoningLayers {
    pub urban: Vec<Zoning>,
    pub rustic: Vec<Zoning>,
}

impl ZoningLayers {
    /// Splits the zones by level and labels them in input order: `u00001` for urban zones and
    /// `r001` for rustic ones.
    pub fn new(zones: Vec<Zoning>) -> ZoningLayers {
        let mut urban = Vec::new();
        let mut rustic = Vec::new();
        for mut z in zones {
            match z.kind {
                ZoneKind::Urban => {
                    z.label = Some(format!("u{:05}", urban.len() + 1));
                    urban.push(z);
                }
                ZoneKind::Rustic => {
                    z.label = Some(format!("r{:03}", rustic.len() + 1));
                    rustic.push(z);
                }
            }
        }
        ZoningLayers { urban, rustic }
    }

    /// Drops zones with invalid geometry and simplifies the city blocks. Returns the number of
    /// zones dropped.
    pub fn clean(&mut self, simplify_tolerance: f64) -> usize {
        let before = self.urban.len() + self.rustic.len();
        self.urban.retain(|z| z.polygon.is_valid());
        self.rustic.retain(|z| z.polygon.is_valid());
        for z in &mut self.urban {
            let simple = z.polygon.simplify(simplify_tolerance);
            if simple.is_valid() {
                z.polygon = simple;
            }
        }
        before - self.urban.len() - self.rustic.len()
    }

    /// Unions city blocks that touch or lie within `tolerance` of each other into one zone, then
    /// relabels the city blocks. Returns the number of zones merged away.
    pub fn merge_adjacents(&mut self, tolerance: f64) -> usize {
        let before = self.urban.len();
        let groups = {
            let features: Vec<(usize, &Polygon)> = self
                .urban
                .iter()
                .enumerate()
                .map(|(idx, z)| (idx, &z.polygon))
                .collect();
            adjacency_groups(&features, tolerance)
        };
        let mut zones: Vec<Option<Zoning>> = std::mem::take(&mut self.urban)
            .into_iter()
            .map(Some)
            .collect();
        for group in groups {
            let mut members: Vec<Zoning> =
                group.iter().filter_map(|idx| zones[*idx].take()).collect();
            if members.len() > 1 {
                let polygons = members.iter().map(|z| z.polygon.clone()).collect();
                if let Some(union) = Polygon::union_all(polygons) {
                    members[0].polygon = union;
                }
            }
            if !members.is_empty() {
                self.urban.push(members.swap_remove(0));
            }
        }
        for (idx, z) in self.urban.iter_mut().enumerate() {
            z.label = Some(format!("u{:05}", idx + 1));
        }
        let merged = before - self.urban.len();
        if merged > 0 {
            debug!("Merged {} adjacent city blocks", merged);
        }
        merged
    }

    /// Covers every zone, used to restrict queries against OSM.
    pub fn get_bounds(&self) -> Bounds {
        let mut b = Bounds::new();
        for z in self.urban.iter().chain(self.rustic.iter()) {
            b.union(z.polygon.get_bounds());
        }
        b
    }

    pub fn labels(&self) -> Vec<String> {
        self.rustic
            .iter()
            .chain(self.urban.iter())
            .filter_map(|z| z.label.clone())
            .collect()
    }

    /// Writes `urban_zoning.geojson` and `rustic_zoning.geojson` into `dir`.
    pub fn export(&self, dir: &str) -> Result<(), Error> {
        for (zones, name) in [
            (&self.urban, "urban_zoning.geojson"),
            (&self.rustic, "rustic_zoning.geojson"),
        ] {
            let path = format!("{}/{}", dir, name);
            export_zones(zones, &path)?;
            info!("Generated '{}'", name);
        }
        Ok(())
    }

    /// Labels every construction with the task of its zone. A whole building takes the first city
    /// block that mostly contains it, or else the first rural area. Parts and pools follow their
    /// building. Returns the number of buildings left without a label.
    pub fn set_tasks(&self, constructions: &mut [Construction]) -> usize {
        let urban = index(&self.urban);
        let rustic = index(&self.rustic);
        let find = |c: &Construction| -> Option<String> {
            let bounds = c.polygon.get_bounds();
            for (zones, idx) in [(&self.urban, &urban), (&self.rustic, &rustic)] {
                for i in idx.query(&bounds) {
                    if zones[i].polygon.mostly_contains(&c.polygon) {
                        return zones[i].label.clone();
                    }
                }
            }
            None
        };

        let mut labels: BTreeMap<String, String> = BTreeMap::new();
        let mut unlabeled = 0;
        for c in constructions.iter_mut().filter(|c| c.is_building()) {
            c.task = find(c);
            match c.task {
                Some(ref label) => {
                    labels.insert(c.local_id.clone(), label.clone());
                }
                None => {
                    unlabeled += 1;
                }
            }
        }
        for c in constructions.iter_mut().filter(|c| !c.is_building()) {
            c.task = match labels.get(c.building_id()) {
                Some(label) => Some(label.clone()),
                None => find(c),
            };
        }
        if unlabeled > 0 {
            warn!("{} buildings are outside every zone", unlabeled);
        }
        unlabeled
    }
}

/// Labels addresses with the task of the building they refer to.
pub fn set_address_tasks(addresses: &mut [Address], constructions: &[Construction]) {
    let labels: BTreeMap<&str, &String> = constructions
        .iter()
        .filter(|c| c.is_building())
        .filter_map(|c| c.task.as_ref().map(|t| (c.local_id.as_str(), t)))
        .collect();
    for a in addresses {
        a.task = labels.get(a.reference()).map(|t| (*t).clone());
    }
}

/// Labels constructions with an explicit building-to-task lookup, like the one produced by
/// merging parcels. Returns the number of buildings left without a label.
pub fn set_tasks_from_lookup(
    constructions: &mut [Construction],
    lookup: &BTreeMap<String, String>,
) -> usize {
    let mut unlabeled = 0;
    for c in constructions.iter_mut() {
        c.task = lookup.get(c.building_id()).cloned();
        if c.task.is_none() && c.is_building() {
            unlabeled += 1;
        }
    }
    unlabeled
}

fn index(zones: &[Zoning]) -> FindIntersecting<usize> {
    FindIntersecting::new(
        zones
            .iter()
            .enumerate()
            .map(|(idx, z)| (idx, z.polygon.get_bounds())),
    )
}

fn export_zones(zones: &[Zoning], path: &str) -> Result<(), Error> {
    let features = zones
        .iter()
        .map(|z| {
            let mut feature = Feature {
                bbox: None,
                geometry: Some(z.polygon.to_geojson()),
                id: None,
                properties: None,
                foreign_members: None,
            };
            for (k, v) in zoning_tags(z).into_inner() {
                feature.set_property(k, Value::String(v));
            }
            feature
        })
        .collect();
    let gj = GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    });
    let fail = |reason: String| Error::Export {
        path: path.to_string(),
        reason,
    };
    abstio::write_json(path, &gj).map_err(|err| fail(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(local_id: &str, kind: ZoneKind, polygon: Polygon) -> Zoning {
        Zoning {
            local_id: local_id.to_string(),
            polygon,
            kind,
            label: None,
        }
    }

    fn building(local_id: &str, polygon: Polygon) -> Construction {
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

    fn layers() -> ZoningLayers {
        ZoningLayers::new(vec![
            zone("R1", ZoneKind::Rustic, Polygon::rectangle(0.0, 0.0, 100.0, 100.0)),
            zone("M1", ZoneKind::Urban, Polygon::rectangle(0.0, 0.0, 10.0, 10.0)),
            zone("M2", ZoneKind::Urban, Polygon::rectangle(10.0, 0.0, 20.0, 10.0)),
        ])
    }

    #[test]
    fn labels_in_input_order() {
        let layers = layers();
        assert_eq!(layers.urban[0].label.as_deref(), Some("u00001"));
        assert_eq!(layers.urban[1].label.as_deref(), Some("u00002"));
        assert_eq!(layers.rustic[0].label.as_deref(), Some("r001"));
        assert_eq!(layers.labels(), vec!["r001", "u00001", "u00002"]);
    }

    #[test]
    fn urban_before_rustic_and_parts_follow() {
        let layers = layers();
        let mut cons = vec![
            // Straddles both blocks, mostly in the second
            building("A", Polygon::rectangle(8.0, 1.0, 14.0, 2.0)),
            building("B", Polygon::rectangle(50.0, 50.0, 51.0, 51.0)),
            building("C", Polygon::rectangle(500.0, 500.0, 501.0, 501.0)),
            // Part lies in the first block, but follows its building
            building("A_part1", Polygon::rectangle(8.0, 1.0, 9.0, 2.0)),
            building("D_PI.1", Polygon::rectangle(1.0, 1.0, 2.0, 2.0)),
        ];
        assert_eq!(layers.set_tasks(&mut cons), 1);
        let tasks: Vec<Option<&str>> = cons.iter().map(|c| c.task.as_deref()).collect();
        assert_eq!(
            tasks,
            vec![
                Some("u00002"),
                Some("r001"),
                None,
                Some("u00002"),
                Some("u00001")
            ]
        );
    }

    #[test]
    fn invalid_zones_dropped_and_exported() {
        let mut layers = layers();
        layers.urban.push(zone(
            "M3",
            ZoneKind::Urban,
            Polygon::rectangle(5.0, 5.0, 5.0, 6.0),
        ));
        assert_eq!(layers.clean(1e-6), 1);
        assert_eq!(layers.urban.len(), 2);

        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path().display().to_string();
        layers.export(&dir).unwrap();
        let raw = String::from_utf8(
            abstio::slurp_file(format!("{}/urban_zoning.geojson", dir)).unwrap(),
        )
        .unwrap();
        assert!(raw.contains("u00002"));
        assert!(abstio::file_exists(format!("{}/rustic_zoning.geojson", dir)));
    }

    #[test]
    fn adjacent_blocks_merged() {
        let mut layers = ZoningLayers::new(vec![
            zone("M1", ZoneKind::Urban, Polygon::rectangle(0.0, 0.0, 10.0, 10.0)),
            zone("M2", ZoneKind::Urban, Polygon::rectangle(50.0, 0.0, 60.0, 10.0)),
            zone("M3", ZoneKind::Urban, Polygon::rectangle(10.0, 0.0, 20.0, 10.0)),
            zone("R1", ZoneKind::Rustic, Polygon::rectangle(20.0, 0.0, 30.0, 10.0)),
        ]);
        assert_eq!(layers.merge_adjacents(1e-6), 1);
        assert_eq!(layers.urban.len(), 2);
        assert_eq!(layers.urban[0].local_id, "M1");
        assert!((layers.urban[0].polygon.area() - 200.0).abs() < 1e-6);
        assert_eq!(layers.urban[1].local_id, "M2");
        assert_eq!(layers.labels(), vec!["r001", "u00001", "u00002"]);
    }
}
