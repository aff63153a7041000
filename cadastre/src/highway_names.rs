//! Cadastral street names are upper case and abbreviated ("CL MAYOR"). Before addresses are
//! produced, every name is translated to the one already used in OSM nearby, or failing that to
//! a cleaned up version. The translations are written out for the user to review.

use std::collections::BTreeMap;

use anyhow::Result;

use geom::{Bounds, FindIntersecting};
use osm_data::{OsmData, OsmID};

use crate::records::Address;

/// Lower case words of a name, except as the first word
const PARTICLES: &[&str] = &["a", "de", "del", "e", "el", "en", "la", "las", "los", "y"];

/// Lower case, without diacritics and repeated whitespace. Two names are the same if this is.
pub fn normalize(name: &str) -> String {
    let lower: String = name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            _ => c,
        })
        .collect();
    lower.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Expands a leading type abbreviation and fixes the capitalization: "CL DE LA PAZ" becomes
/// "Calle de la Paz".
pub fn parse(name: &str, highway_types: &BTreeMap<String, String>) -> String {
    let mut words = name.split_whitespace();
    let first = match words.next() {
        Some(w) => w,
        None => return String::new(),
    };
    let mut result = vec![match highway_types.get(&first.to_uppercase()) {
        Some(full) => full.clone(),
        None => title_case(first),
    }];
    for word in words {
        let lower = word.to_lowercase();
        if PARTICLES.contains(&lower.as_str()) {
            result.push(lower);
        } else {
            result.push(title_case(word));
        }
    }
    result.join(" ")
}

/// The name without its leading type word, if that word is a known type.
fn core(normalized: &str, types: &[String]) -> String {
    match normalized.split_once(' ') {
        Some((first, rest)) if types.iter().any(|t| *t == first) => rest.to_string(),
        _ => normalized.to_string(),
    }
}

/// Picks the first OSM name equal to the cadastral one, ignoring case, diacritics, and the type
/// of street. Without a match, the name is just parsed.
pub fn match_name(
    name: &str,
    choices: &[String],
    highway_types: &BTreeMap<String, String>,
) -> String {
    let parsed = parse(name, highway_types);
    let types: Vec<String> = highway_types
        .iter()
        .flat_map(|(abbrev, full)| vec![normalize(abbrev), normalize(full)])
        .collect();
    let target = normalize(&parsed);
    let target_core = core(&target, &types);
    for choice in choices {
        let candidate = normalize(choice);
        if candidate == target || core(&candidate, &types) == target_core {
            return choice.clone();
        }
    }
    parsed
}

/// Bounds of every named element, with their name.
fn named_elements(highway: &OsmData) -> Vec<(String, Bounds)> {
    let mut result = Vec::new();
    for id in highway.ids_with_tag("name") {
        let name = abstutil::skip_fail!(highway.tags(id).and_then(|t| t.get("name"))).clone();
        let ways = match id {
            OsmID::Node(_) => continue,
            OsmID::Way(w) => vec![w],
            OsmID::Relation(r) => highway.relations[&r]
                .members
                .iter()
                .filter_map(|m| match m.id {
                    OsmID::Way(w) => Some(w),
                    _ => None,
                })
                .collect(),
        };
        let mut bounds = Bounds::new();
        for w in ways {
            if let Some(way) = highway.ways.get(&w) {
                for n in &way.nodes {
                    if let Some(node) = highway.nodes.get(n) {
                        bounds.update(node.pt);
                    }
                }
            }
        }
        if !bounds.is_empty() {
            result.push((name, bounds));
        }
    }
    result
}

/// Translates every thoroughfare name of the addresses, using the OSM names found near the
/// addresses on that street.
pub fn get_highway_names(
    addresses: &[Address],
    highway: &OsmData,
    bbox_buffer: f64,
    highway_types: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut streets: BTreeMap<&str, Bounds> = BTreeMap::new();
    for a in addresses {
        if let Some(ref name) = a.thoroughfare {
            streets.entry(name.as_str()).or_insert_with(Bounds::new).update(a.pt);
        }
    }

    let named = named_elements(highway);
    let index = FindIntersecting::new(named.iter().enumerate().map(|(idx, (_, b))| (idx, *b)));
    let mut result = BTreeMap::new();
    for (name, bounds) in streets {
        let choices: Vec<String> = index
            .query(&bounds.buffer(bbox_buffer))
            .into_iter()
            .map(|idx| named[idx].0.clone())
            .collect();
        result.insert(name.to_string(), match_name(name, &choices, highway_types));
    }
    result
}

/// Reads `highway_names.csv` from `dir`, or creates it when missing. The flag says if it was
/// just created.
pub fn get_translations(
    dir: &str,
    addresses: &[Address],
    highway: &OsmData,
    bbox_buffer: f64,
    highway_types: &BTreeMap<String, String>,
) -> Result<(BTreeMap<String, String>, bool)> {
    let path = format!("{}/highway_names.csv", dir);
    if abstio::file_exists(&path) {
        return Ok((abstio::read_csv_dict(&path)?, false));
    }
    let names = get_highway_names(addresses, highway, bbox_buffer, highway_types);
    abstio::write_csv_dict(&path, &names)?;
    info!("Generated '{}' with {} names", path, names.len());
    Ok((names, true))
}

/// Returns how many addresses were renamed.
pub fn apply(addresses: &mut [Address], translations: &BTreeMap<String, String>) -> usize {
    let mut changed = 0;
    for a in addresses {
        if let Some(new) = a.thoroughfare.as_ref().and_then(|t| translations.get(t)) {
            if Some(new) != a.thoroughfare.as_ref() {
                a.thoroughfare = Some(new.clone());
                changed += 1;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use abstutil::Tags;
    use geom::Pt2D;

    use super::*;
    use crate::config::Settings;

    fn types() -> BTreeMap<String, String> {
        Settings::default().highway_types
    }

    fn address(street: &str, x: f64) -> Address {
        Address {
            local_id: format!("ES.SDGC.AD.1.{}", x),
            pt: Pt2D::new(x, 0.0),
            specification: None,
            designator: "1".to_string(),
            thoroughfare: Some(street.to_string()),
            post_code: None,
            image: None,
            pd_id: None,
            tn_id: None,
            task: None,
        }
    }

    #[test]
    fn parse_names() {
        let types = types();
        assert_eq!(parse("CL DE LA PAZ", &types), "Calle de la Paz");
        assert_eq!(parse("  LA  RAMBLA ", &types), "La Rambla");
        assert_eq!(parse("XX  SOL", &types), "Xx Sol");
        assert_eq!(parse("", &types), "");
        assert_eq!(normalize(" Plaza  de  ESPAÑA "), "plaza de espana");
    }

    #[test]
    fn match_ignores_type_and_accents() {
        let types = types();
        let choices = vec!["Avenida de la Constitución".to_string()];
        assert_eq!(
            match_name("CL DE LA CONSTITUCION", &choices, &types),
            "Avenida de la Constitución"
        );
        assert_eq!(match_name("CL MAYOR", &choices, &types), "Calle Mayor");
    }

    #[test]
    fn nearby_names_only() {
        let mut highway = OsmData::new();
        let mut tags = Tags::empty();
        tags.insert("name", "Calle Mayor");
        let a = highway.add_node(Pt2D::new(0.0, 0.0), Tags::empty());
        let b = highway.add_node(Pt2D::new(0.001, 0.0), Tags::empty());
        highway.add_way(vec![a, b], tags.clone());
        let c = highway.add_node(Pt2D::new(1.0, 0.0), Tags::empty());
        let d = highway.add_node(Pt2D::new(1.001, 0.0), Tags::empty());
        tags.insert("name", "Calle Real");
        highway.add_way(vec![c, d], tags);

        let mut addresses = vec![address("CL MAYOR", 0.0005), address("CL REAL", 0.0005)];
        let names = get_highway_names(&addresses, &highway, 0.001, &types());
        assert_eq!(names["CL MAYOR"], "Calle Mayor");
        assert_eq!(names["CL REAL"], "Calle Real");

        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path().display().to_string();
        let (first, is_new) =
            get_translations(&dir, &addresses, &highway, 0.001, &types()).unwrap();
        assert!(is_new);
        let (second, is_new) =
            get_translations(&dir, &addresses, &OsmData::new(), 0.001, &types()).unwrap();
        assert!(!is_new);
        assert_eq!(first, second);

        assert_eq!(apply(&mut addresses, &second), 2);
        assert_eq!(addresses[0].thoroughfare.as_deref(), Some("Calle Mayor"));
        assert_eq!(apply(&mut addresses, &second), 0);
    }
}
