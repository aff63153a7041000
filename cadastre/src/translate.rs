//! From source records to OSM tags. Every function here is pure.

use abstutil::Tags;

use crate::records::{Address, Construction, Parcel, Zoning};

/// Leading words of a thoroughfare name meaning it's a named place, not a street.
const PLACE_TYPES: &[&str] = &[
    "agregado",
    "aldea",
    "área",
    "barranco",
    "barrio",
    "campa",
    "campo",
    "cañada",
    "caserío",
    "chalet",
    "cigarral",
    "colegio",
    "colonia",
    "concejo",
    "conjunto",
    "diseminado",
    "edificios",
    "finca",
    "grupo",
    "lugar",
    "masía",
    "paraje",
    "parque",
    "partida",
    "polígono",
    "residencial",
    "rincón",
    "sector",
    "sitio",
    "urbanización",
];

/// Place types that are dropped from the name itself.
const REMOVE_PLACE_FROM_NAME: &[&str] = &["lugar"];

/// Source conditions and the key their buildings are tagged under.
fn building_key(condition: Option<&str>) -> &'static str {
    match condition {
        Some("declined") => "disused:building",
        Some("ruin") => "abandoned:building",
        _ => "building",
    }
}

fn use_value(current_use: &str) -> Option<&'static str> {
    match current_use {
        "1_residential" => Some("residential"),
        "2_agriculture" => Some("barn"),
        "3_industrial" => Some("industrial"),
        "4_1_office" => Some("office"),
        "4_2_retail" => Some("retail"),
        "4_3_publicServices" => Some("public"),
        _ => None,
    }
}

/// A borrowed view of any record that can be translated.
#[derive(Clone, Copy)]
pub enum Record<'a> {
    Address(&'a Address),
    Construction(&'a Construction),
    Parcel(&'a Parcel),
    Zoning(&'a Zoning),
}

pub trait AsRecord {
    fn as_record(&self) -> Record;
}

impl<T: AsRecord> AsRecord for &T {
    fn as_record(&self) -> Record {
        (*self).as_record()
    }
}

impl AsRecord for Address {
    fn as_record(&self) -> Record {
        Record::Address(self)
    }
}

impl AsRecord for Construction {
    fn as_record(&self) -> Record {
        Record::Construction(self)
    }
}

impl AsRecord for Parcel {
    fn as_record(&self) -> Record {
        Record::Parcel(self)
    }
}

impl AsRecord for Zoning {
    fn as_record(&self) -> Record {
        Record::Zoning(self)
    }
}

pub fn translate(record: Record) -> Tags {
    match record {
        Record::Address(a) => address_tags(a),
        Record::Construction(c) => building_tags(c),
        Record::Parcel(p) => parcel_tags(p),
        Record::Zoning(z) => zoning_tags(z),
    }
}

/// An address without a thoroughfare name produces no tags at all.
pub fn address_tags(a: &Address) -> Tags {
    let mut tags = Tags::empty();
    let name = a.thoroughfare.as_deref().unwrap_or("").trim();
    if name.is_empty() {
        return tags;
    }
    let mut words = name.split_whitespace();
    let first = words.next().unwrap_or("").to_lowercase();
    let name = if REMOVE_PLACE_FROM_NAME.contains(&first.as_str()) {
        words.collect::<Vec<_>>().join(" ")
    } else {
        name.to_string()
    };
    if name.is_empty() {
        return tags;
    }
    if PLACE_TYPES.contains(&first.as_str()) {
        tags.insert("addr:place", name);
    } else {
        tags.insert("addr:street", name);
    }
    tags.insert("addr:housenumber", a.designator.clone());
    if let Some(code) = postcode(a) {
        tags.insert("addr:postcode", code);
    }
    if a.is_entrance() {
        tags.insert("entrance", "yes");
    }
    tags.insert("ref", a.reference());
    if let Some(ref image) = a.image {
        tags.insert("image", image.clone());
    }
    tags
}

/// Zero padded to 5 digits. None if the source value isn't a number.
pub fn postcode(a: &Address) -> Option<String> {
    let code = a.post_code.as_ref()?.trim().parse::<i64>().ok()?;
    Some(format!("{:05}", code))
}

/// Addresses whose postal code was present but unusable
pub fn count_malformed_postcodes(addresses: &[Address]) -> usize {
    addresses
        .iter()
        .filter(|a| a.post_code.is_some() && postcode(a).is_none())
        .count()
}

pub fn building_tags(c: &Construction) -> Tags {
    let mut tags = Tags::empty();
    if c.is_building() {
        tags.insert("building", "yes");
    }
    if !c.is_part() {
        tags.insert("ref", c.local_id.clone());
    }

    // Condition first, then current use, so the use value lands under the condition's key
    match c.condition.as_deref() {
        Some("declined") => tags.insert("building", "yes"),
        Some("ruin") => tags.insert("building", "ruins"),
        _ => {}
    }
    if let Some(value) = c.current_use.as_deref().and_then(use_value) {
        tags.insert(building_key(c.condition.as_deref()), value);
    }
    if c.nature.as_deref() == Some("openAirPool") {
        tags.insert("leisure", "swimming_pool");
    }
    if c.condition.as_deref() == Some("ruin") && c.current_use.is_none() {
        tags.insert("abandoned:building", "yes");
    }

    if c.is_part() {
        let roof = c.lev_above == Some(0);
        tags.insert("building:part", if roof { "roof" } else { "yes" });
    }
    if let Some(n) = c.lev_above.filter(|n| *n != 0) {
        tags.insert("building:levels", n.to_string());
    }
    if let Some(n) = c.lev_below.filter(|n| *n != 0) {
        tags.insert("building:levels:underground", n.to_string());
    }
    if c.layer == Some(1) {
        tags.insert("layer", "1");
        tags.insert("location", "roof");
    }
    if let Some(ref fixme) = c.fixme {
        tags.insert("fixme", fixme.clone());
    }
    tags
}

/// Every present attribute under its own name
pub fn parcel_tags(p: &Parcel) -> Tags {
    let mut tags = Tags::empty();
    tags.insert("localId", p.local_id.clone());
    if let Some(ref label) = p.label {
        tags.insert("label", label.clone());
    }
    if let Some(parts) = p.parts {
        tags.insert("parts", parts.to_string());
    }
    tags
}

pub fn zoning_tags(z: &Zoning) -> Tags {
    let mut tags = Tags::empty();
    tags.insert("localId", z.local_id.clone());
    if let Some(ref label) = z.label {
        tags.insert("label", label.clone());
    }
    tags.insert("levelName", z.level_name());
    tags
}

#[cfg(test)]
mod tests {
    use geom::{Polygon, Pt2D};

    use super::*;

    fn address(name: Option<&str>) -> Address {
        Address {
            local_id: "ES.SDGC.AD.38001.8642317CS5284S".to_string(),
            pt: Pt2D::new(-3.0, 40.0),
            specification: Some("Parcel".to_string()),
            designator: "222".to_string(),
            thoroughfare: name.map(|x| x.to_string()),
            post_code: None,
            image: None,
            pd_id: None,
            tn_id: None,
            task: None,
        }
    }

    fn construction(local_id: &str) -> Construction {
        Construction {
            local_id: local_id.to_string(),
            polygon: Polygon::rectangle(0.0, 0.0, 1.0, 1.0),
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

    #[test]
    fn address_streets_and_places() {
        let mut a = address(Some("Calle Mayor"));
        a.post_code = Some("333".to_string());
        let tags = address_tags(&a);
        assert!(tags.is("addr:street", "Calle Mayor"));
        assert!(tags.is("addr:housenumber", "222"));
        assert!(tags.is("addr:postcode", "00333"));
        assert!(tags.is("ref", "8642317CS5284S"));
        assert!(!tags.contains_key("entrance"));
        a.post_code = Some(" 5000000000 ".to_string());
        assert_eq!(postcode(&a).as_deref(), Some("5000000000"));

        let mut a = address(Some("Lugar Los Llanos"));
        a.specification = Some("Entrance".to_string());
        a.post_code = Some("38A01".to_string());
        a.image = Some("http://example.com/1.jpg".to_string());
        let tags = address_tags(&a);
        assert!(tags.is("addr:place", "Los Llanos"));
        assert!(!tags.contains_key("addr:street"));
        assert!(tags.is("entrance", "yes"));
        assert!(tags.is("image", "http://example.com/1.jpg"));
        assert!(!tags.contains_key("addr:postcode"));
        assert_eq!(count_malformed_postcodes(&[a]), 1);

        let tags = address_tags(&address(Some("Paraje El Rincón")));
        assert!(tags.is("addr:place", "Paraje El Rincón"));
    }

    #[test]
    fn empty_names_yield_nothing() {
        assert!(address_tags(&address(None)).is_empty());
        assert!(address_tags(&address(Some("   "))).is_empty());
        assert!(address_tags(&address(Some("Lugar"))).is_empty());
    }

    #[test]
    fn condition_keys_the_use() {
        let mut c = construction("8642317CS5284S");
        c.condition = Some("declined".to_string());
        c.current_use = Some("1_residential".to_string());
        let tags = building_tags(&c);
        assert!(tags.is("disused:building", "residential"));
        assert!(tags.is("building", "yes"));
        assert!(tags.is("ref", "8642317CS5284S"));

        c.current_use = Some("2_agriculture".to_string());
        assert!(building_tags(&c).is("disused:building", "barn"));

        c.condition = Some("functional".to_string());
        assert!(building_tags(&c).is("building", "barn"));

        c.condition = Some("ruin".to_string());
        c.current_use = None;
        let tags = building_tags(&c);
        assert!(tags.is("building", "ruins"));
        assert!(tags.is("abandoned:building", "yes"));
    }

    #[test]
    fn parts_and_pools() {
        let mut part = construction("8642317CS5284S_part1");
        part.lev_above = Some(0);
        let tags = building_tags(&part);
        assert!(tags.is("building:part", "roof"));
        assert!(!tags.contains_key("ref"));
        assert!(!tags.contains_key("building"));
        assert!(!tags.contains_key("building:levels"));

        part.lev_above = Some(2);
        part.lev_below = Some(1);
        part.layer = Some(1);
        part.fixme = Some("Check geometry".to_string());
        let tags = building_tags(&part);
        assert!(tags.is("building:part", "yes"));
        assert!(tags.is("building:levels", "2"));
        assert!(tags.is("building:levels:underground", "1"));
        assert!(tags.is("location", "roof"));
        assert!(tags.is("fixme", "Check geometry"));

        let mut pool = construction("8642317CS5284S_PI.1");
        pool.condition = None;
        pool.nature = Some("openAirPool".to_string());
        let tags = building_tags(&pool);
        assert!(tags.is("leisure", "swimming_pool"));
        assert!(tags.is("ref", "8642317CS5284S_PI.1"));
        assert!(!tags.contains_key("building"));
    }

    #[test]
    fn all_attributes() {
        let p = Parcel {
            local_id: "8642317CS5284S".to_string(),
            polygon: Polygon::rectangle(0.0, 0.0, 1.0, 1.0),
            label: None,
            parts: Some(3),
        };
        let tags = translate(p.as_record());
        assert!(tags.is("localId", "8642317CS5284S"));
        assert!(tags.is("parts", "3"));
        assert!(!tags.contains_key("label"));
        assert!(!tags.contains_key("ref"));
    }
}
