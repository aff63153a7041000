use std::collections::HashMap;

use anyhow::{bail, Context, Result};

use abstio::slurp_file;
use abstutil::{Tags, Timer};
use geom::Pt2D;

use crate::{Member, NodeID, OsmData, OsmID, RelationID, WayID};

// References to missing objects are just filtered out. Per
// https://wiki.openstreetmap.org/wiki/OSM_XML#Certainties_and_Uncertainties, nodes come before
// ways, and ways before relations. Relations may reference later relations, so they take two
// passes.

pub fn read_file(path: &str, timer: &mut Timer) -> Result<OsmData> {
    timer.start(format!("read {}", path));
    let bytes = slurp_file(path)?;
    let raw_string = std::str::from_utf8(&bytes).with_context(|| path.to_string())?;
    let result = read(raw_string, timer).with_context(|| path.to_string());
    timer.stop(format!("read {}", path));
    result
}

pub fn read(raw_string: &str, timer: &mut Timer) -> Result<OsmData> {
    let tree = roxmltree::Document::parse(raw_string)?;
    let root = tree.root_element();
    if root.tag_name().name() != "osm" {
        bail!("Root element is <{}>, not <osm>", root.tag_name().name());
    }

    let mut data = OsmData::new();
    if let Some(upload) = root.attribute("upload") {
        data.upload = upload.to_string();
    }
    if let Some(generator) = root.attribute("generator") {
        data.generator = generator.to_string();
    }

    let mut nodes: HashMap<i64, NodeID> = HashMap::new();
    let mut ways: HashMap<i64, WayID> = HashMap::new();
    let mut relations: HashMap<i64, RelationID> = HashMap::new();
    let mut relation_objs = Vec::new();

    for obj in root.children() {
        if !obj.is_element() {
            continue;
        }
        match obj.tag_name().name() {
            "changeset" => {
                data.tags.extend(&read_tags(obj)?);
            }
            "node" => {
                let osm_id = parse_id(obj)?;
                if nodes.contains_key(&osm_id) {
                    bail!("Duplicate node {}, the .osm is corrupt", osm_id);
                }
                let pt = parse_pt(obj)?;
                let id = data.add_node(pt, read_tags(obj)?);
                nodes.insert(osm_id, id);
            }
            "way" => {
                let osm_id = parse_id(obj)?;
                if ways.contains_key(&osm_id) {
                    bail!("Duplicate way {}, the .osm is corrupt", osm_id);
                }
                let mut refs = Vec::new();
                for child in obj.children() {
                    if child.tag_name().name() == "nd" {
                        let n: i64 = parse_attr(child, "ref")?;
                        // Just skip missing nodes
                        if let Some(id) = nodes.get(&n) {
                            refs.push(*id);
                        }
                    }
                }
                if refs.is_empty() {
                    timer.warn(format!("Way {} has no known nodes, skipping", osm_id));
                    continue;
                }
                let id = data.add_way(refs, read_tags(obj)?);
                ways.insert(osm_id, id);
            }
            "relation" => {
                let osm_id = parse_id(obj)?;
                if relations.contains_key(&osm_id) {
                    bail!("Duplicate relation {}, the .osm is corrupt", osm_id);
                }
                let id = data.add_relation(Vec::new(), read_tags(obj)?);
                relations.insert(osm_id, id);
                relation_objs.push((id, obj));
            }
            _ => {}
        }
    }

    for (id, obj) in relation_objs {
        let mut members = Vec::new();
        for child in obj.children() {
            if child.tag_name().name() != "member" {
                continue;
            }
            let r: i64 = parse_attr(child, "ref")?;
            let member = match child.attribute("type") {
                Some("node") => nodes.get(&r).map(|n| OsmID::Node(*n)),
                Some("way") => ways.get(&r).map(|w| OsmID::Way(*w)),
                Some("relation") => relations.get(&r).map(|r| OsmID::Relation(*r)),
                _ => None,
            };
            if let Some(member) = member {
                members.push(Member::new(member, child.attribute("role").unwrap_or("")));
            }
        }
        if let Some(rel) = data.relations.get_mut(&id) {
            rel.members = members;
        }
    }

    timer.note(format!("Found {}", data.describe()));
    Ok(data)
}

fn parse_id(obj: roxmltree::Node) -> Result<i64> {
    parse_attr(obj, "id")
}

fn parse_attr<T: std::str::FromStr>(obj: roxmltree::Node, attr: &str) -> Result<T> {
    let raw = match obj.attribute(attr) {
        Some(x) => x,
        None => bail!("<{}> is missing {}", obj.tag_name().name(), attr),
    };
    match raw.parse::<T>() {
        Ok(x) => Ok(x),
        Err(_) => bail!("<{}> has bad {}={}", obj.tag_name().name(), attr, raw),
    }
}

fn parse_pt(obj: roxmltree::Node) -> Result<Pt2D> {
    let lon: f64 = parse_attr(obj, "lon")?;
    let lat: f64 = parse_attr(obj, "lat")?;
    if !lon.is_finite() || !lat.is_finite() {
        bail!("<{}> has a bad position {}, {}", obj.tag_name().name(), lon, lat);
    }
    Ok(Pt2D::new(lon, lat))
}

fn read_tags(obj: roxmltree::Node) -> Result<Tags> {
    let mut tags = Tags::empty();
    for child in obj.children() {
        if child.tag_name().name() == "tag" {
            match (child.attribute("k"), child.attribute("v")) {
                (Some(k), Some(v)) => tags.insert(k, v),
                _ => bail!("<tag> without k or v inside <{}>", obj.tag_name().name()),
            }
        }
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="test" upload="false">
  <changeset>
    <tag k="source:date" v="2021-06"/>
  </changeset>
  <node id="1" lat="40.0" lon="-3.0"/>
  <node id="2" lat="40.0" lon="-3.1"/>
  <node id="3" lat="40.1" lon="-3.1">
    <tag k="addr:street" v="Calle Mayor"/>
    <tag k="addr:housenumber" v="7"/>
  </node>
  <way id="10">
    <nd ref="1"/>
    <nd ref="2"/>
    <nd ref="99"/>
    <nd ref="3"/>
    <nd ref="1"/>
    <tag k="building" v="yes"/>
  </way>
  <relation id="20">
    <member type="relation" ref="21" role=""/>
    <member type="way" ref="10" role="outer"/>
    <tag k="type" v="multipolygon"/>
  </relation>
  <relation id="21">
    <member type="node" ref="3" role="entrance"/>
  </relation>
</osm>"#;

    #[test]
    fn reads_elements_and_skips_missing_refs() {
        let data = read(SAMPLE, &mut Timer::throwaway()).unwrap();
        assert_eq!(data.upload, "false");
        assert!(data.tags.is("source:date", "2021-06"));
        assert_eq!(data.nodes.len(), 3);
        assert_eq!(data.ways.len(), 1);
        let way = data.ways.values().next().unwrap();
        assert_eq!(way.nodes.len(), 4);
        assert!(way.is_closed());
        assert_eq!(data.relations.len(), 2);
        // The forward reference to relation 21 resolves
        let rel = data.relations.values().next().unwrap();
        assert_eq!(rel.members.len(), 2);
        assert!(matches!(rel.members[0].id, OsmID::Relation(_)));
        assert_eq!(data.ids_with_tag("addr:street").len(), 1);
    }

    #[test]
    fn rejects_other_documents() {
        assert!(read("<gpx/>", &mut Timer::throwaway()).is_err());
        assert!(read("<osm><node id=\"1\"/></osm>", &mut Timer::throwaway()).is_err());
    }

    #[test]
    fn rejects_positions_out_of_range() {
        let raw = r#"<osm><node id="1" lat="NaN" lon="-3.0"/></osm>"#;
        assert!(read(raw, &mut Timer::throwaway()).is_err());
        let raw = r#"<osm><node id="1" lat="40.0" lon="inf"/></osm>"#;
        assert!(read(raw, &mut Timer::throwaway()).is_err());
    }
}
