use std::collections::HashMap;
use std::fmt::Write;

use anyhow::Result;

use abstutil::Tags;

use crate::{OsmData, OsmID};

/// Serializes as OSM XML 0.6. Elements get negative placeholder IDs from one counter, so nodes
/// are -1..-n, then ways continue, then relations.
pub fn to_xml(data: &OsmData) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "<?xml version='1.0' encoding='UTF-8'?>")?;
    writeln!(
        out,
        "<osm version=\"0.6\" generator=\"{}\" upload=\"{}\">",
        escape(&data.generator),
        escape(&data.upload)
    )?;
    if !data.tags.is_empty() {
        writeln!(out, "  <changeset>")?;
        write_tags(&mut out, &data.tags)?;
        writeln!(out, "  </changeset>")?;
    }

    let mut ids: HashMap<OsmID, i64> = HashMap::new();
    let mut next_id = 0;
    for id in data.all_ids() {
        next_id -= 1;
        ids.insert(id, next_id);
    }

    for (id, node) in &data.nodes {
        let osm_id = ids[&OsmID::Node(*id)];
        if node.tags.is_empty() {
            writeln!(
                out,
                "  <node id=\"{}\" action=\"modify\" lat=\"{}\" lon=\"{}\"/>",
                osm_id,
                node.pt.y(),
                node.pt.x()
            )?;
        } else {
            writeln!(
                out,
                "  <node id=\"{}\" action=\"modify\" lat=\"{}\" lon=\"{}\">",
                osm_id,
                node.pt.y(),
                node.pt.x()
            )?;
            write_tags(&mut out, &node.tags)?;
            writeln!(out, "  </node>")?;
        }
    }
    for (id, way) in &data.ways {
        writeln!(
            out,
            "  <way id=\"{}\" action=\"modify\">",
            ids[&OsmID::Way(*id)]
        )?;
        for n in &way.nodes {
            if let Some(osm_id) = ids.get(&OsmID::Node(*n)) {
                writeln!(out, "    <nd ref=\"{}\"/>", osm_id)?;
            }
        }
        write_tags(&mut out, &way.tags)?;
        writeln!(out, "  </way>")?;
    }
    for (id, rel) in &data.relations {
        writeln!(
            out,
            "  <relation id=\"{}\" action=\"modify\">",
            ids[&OsmID::Relation(*id)]
        )?;
        for m in &rel.members {
            let member_type = match m.id {
                OsmID::Node(_) => "node",
                OsmID::Way(_) => "way",
                OsmID::Relation(_) => "relation",
            };
            if let Some(osm_id) = ids.get(&m.id) {
                writeln!(
                    out,
                    "    <member type=\"{}\" ref=\"{}\" role=\"{}\"/>",
                    member_type,
                    osm_id,
                    escape(&m.role)
                )?;
            }
        }
        write_tags(&mut out, &rel.tags)?;
        writeln!(out, "  </relation>")?;
    }
    writeln!(out, "</osm>")?;
    Ok(out)
}

pub fn write_file(path: &str, data: &OsmData) -> Result<()> {
    let xml = to_xml(data)?;
    abstio::write_file(path, xml.as_bytes())?;
    info!("Generated '{}': {}", path, data.describe());
    Ok(())
}

fn write_tags(out: &mut String, tags: &Tags) -> Result<()> {
    for (k, v) in tags.iter() {
        writeln!(out, "    <tag k=\"{}\" v=\"{}\"/>", escape(k), escape(v))?;
    }
    Ok(())
}

fn escape(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            '\n' => result.push_str("&#10;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use abstutil::Timer;
    use geom::Pt2D;

    use super::*;
    use crate::Member;

    #[test]
    fn placeholder_ids_and_escaping() {
        let mut data = OsmData::new();
        data.upload = "yes".to_string();
        data.tags.insert("source:date", "2021-06");
        let a = data.add_node(Pt2D::new(-3.0, 40.0), Tags::empty());
        let b = data.add_node(Pt2D::new(-3.1, 40.0), Tags::empty());
        let c = data.add_node(Pt2D::new(-3.1, 40.1), Tags::empty());
        let mut tags = Tags::empty();
        tags.insert("name", "Bar \"Tom & Jerry\" <1>");
        let w = data.add_way(vec![a, b, c, a], tags);
        data.add_relation(
            vec![Member::new(OsmID::Way(w), "outer")],
            vec![("type", "multipolygon")].into_iter().collect(),
        );

        let xml = to_xml(&data).unwrap();
        assert!(xml.contains("upload=\"yes\""));
        assert!(xml.contains("<node id=\"-1\""));
        assert!(xml.contains("<way id=\"-4\""));
        assert!(xml.contains("<relation id=\"-5\""));
        assert!(xml.contains("<member type=\"way\" ref=\"-4\" role=\"outer\"/>"));
        assert!(xml.contains("Bar &quot;Tom &amp; Jerry&quot; &lt;1&gt;"));

        // And it reads back
        let back = crate::read(&xml, &mut Timer::throwaway()).unwrap();
        assert_eq!(back.describe(), data.describe());
        assert!(back.tags.is("source:date", "2021-06"));
        let way = back.ways.values().next().unwrap();
        assert!(way.tags.is("name", "Bar \"Tom & Jerry\" <1>"));
    }
}
