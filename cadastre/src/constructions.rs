use std::collections::BTreeMap;

use geom::Polygon;

use crate::records::Construction;
use crate::Report;

/// Removes every part that isn't mostly inside its building, including parts of buildings that
/// don't exist. Returns the number removed.
pub fn remove_outside_parts(constructions: &mut Vec<Construction>) -> usize {
    let buildings: BTreeMap<String, Polygon> = constructions
        .iter()
        .filter(|c| c.is_building())
        .map(|c| (c.local_id.clone(), c.polygon.clone()))
        .collect();
    let before = constructions.len();
    constructions.retain(|c| {
        if !c.is_part() {
            return true;
        }
        match buildings.get(c.building_id()) {
            Some(building) => building.mostly_contains(&c.polygon),
            None => false,
        }
    });
    let removed = before - constructions.len();
    if removed > 0 {
        debug!("Removed {} parts outside their building", removed);
    }
    removed
}

/// Splits parts and pools made of several polygons into one feature per polygon. Whole buildings
/// stay multipolygons.
pub fn explode_multi_parts(constructions: Vec<Construction>) -> Vec<Construction> {
    let mut result = Vec::new();
    for c in constructions {
        if c.is_building() || c.polygon.num_polygons() == 1 {
            result.push(c);
            continue;
        }
        for polygon in c.polygon.explode() {
            let mut piece = c.clone();
            piece.polygon = polygon;
            result.push(piece);
        }
    }
    result
}

/// Collects the floors above and below ground of every building, taking its parts into account.
pub fn update_levels(constructions: &[Construction], report: &mut Report) {
    for c in constructions {
        if c.is_building() || c.is_part() {
            report.update_levels(c.building_id(), c.lev_above, c.lev_below);
        }
    }
}

/// Flags constructions with a suspicious area for review with a `fixme` tag. Anything under
/// `min_area` square meters is flagged; only whole buildings are checked against `max_area`.
/// Existing notes aren't overwritten. Returns the number of constructions flagged.
pub fn validate(constructions: &mut [Construction], min_area: f64, max_area: f64) -> usize {
    let mut flagged = 0;
    for c in constructions.iter_mut() {
        if c.fixme.is_some() {
            continue;
        }
        let area = c.polygon.approx_area_m2();
        if area < min_area {
            c.fixme = Some("Check, area too small".to_string());
        } else if c.is_building() && area > max_area {
            c.fixme = Some("Check, area too big".to_string());
        } else {
            continue;
        }
        flagged += 1;
    }
    if flagged > 0 {
        debug!("{} constructions need a check of their area", flagged);
    }
    flagged
}
