//! Reads the source datasets of one municipality. Each kind lives in `<dir>/<kind>.geojson`.
//! GeoJSON is always WGS84, so nothing needs to be reprojected.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use geojson::GeoJson;
use serde_json::{Map, Value};

use abstutil::prettyprint_usize;
use geom::{Geometry, Polygon};

use crate::records::{Address, Construction, Parcel, ZoneKind, Zoning};
use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FeatureKind {
    Building,
    BuildingPart,
    OtherConstruction,
    CadastralParcel,
    CadastralZoning,
    Address,
    PostalDescriptor,
    ThoroughfareName,
}

impl FeatureKind {
    pub fn name(self) -> &'static str {
        match self {
            FeatureKind::Building => "building",
            FeatureKind::BuildingPart => "buildingpart",
            FeatureKind::OtherConstruction => "otherconstruction",
            FeatureKind::CadastralParcel => "cadastralparcel",
            FeatureKind::CadastralZoning => "cadastralzoning",
            FeatureKind::Address => "address",
            FeatureKind::PostalDescriptor => "postaldescriptor",
            FeatureKind::ThoroughfareName => "thoroughfarename",
        }
    }

    /// Not every municipality has other constructions.
    pub fn is_optional(self) -> bool {
        self == FeatureKind::OtherConstruction
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A feature before it's interpreted as a record. Tables without geometry are allowed.
pub struct RawFeature {
    pub geometry: Option<Geometry>,
    pub properties: Map<String, Value>,
}

pub struct RawLayer {
    pub kind: FeatureKind,
    pub features: Vec<RawFeature>,
    pub source_date: Option<String>,
}

/// Typed records plus the date the cadastre published them.
#[derive(Clone, Debug)]
pub struct Layer<T> {
    pub features: Vec<T>,
    pub source_date: Option<String>,
}

impl<T> Layer<T> {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

pub struct GeojsonSource {
    dir: String,
}

impl GeojsonSource {
    pub fn new<I: Into<String>>(dir: I) -> GeojsonSource {
        GeojsonSource { dir: dir.into() }
    }

    pub fn path(&self, kind: FeatureKind) -> String {
        format!("{}/{}.geojson", self.dir, kind.name())
    }

    /// None only for a missing optional kind.
    pub fn read(&self, kind: FeatureKind) -> Result<Option<RawLayer>> {
        let path = self.path(kind);
        if !abstio::file_exists(&path) {
            if kind.is_optional() {
                return Ok(None);
            }
            let msg = format!("Missing the '{}' dataset: {}", kind, path);
            return Err(Error::source_data(msg).into());
        }
        let bytes = abstio::slurp_file(&path)?;
        let text = String::from_utf8(bytes).with_context(|| path.clone())?;
        let collection = match text.parse::<GeoJson>().with_context(|| path.clone())? {
            GeoJson::FeatureCollection(fc) => fc,
            _ => {
                return Err(
                    Error::source_data(format!("{} isn't a FeatureCollection", path)).into(),
                )
            }
        };
        let source_date = collection
            .foreign_members
            .as_ref()
            .and_then(|m| m.get("source_date"))
            .and_then(value_to_string);

        let mut features = Vec::new();
        for feature in collection.features {
            let geometry = match feature.geometry {
                Some(ref g) => Some(
                    Geometry::from_geojson(g)
                        .with_context(|| format!("bad geometry in {}", path))?,
                ),
                None => None,
            };
            features.push(RawFeature {
                geometry,
                properties: feature.properties.unwrap_or_default(),
            });
        }
        debug!("Read {} features from {}", prettyprint_usize(features.len()), path);
        Ok(Some(RawLayer {
            kind,
            features,
            source_date,
        }))
    }

    fn read_required(&self, kind: FeatureKind) -> Result<RawLayer> {
        match self.read(kind)? {
            Some(layer) => Ok(layer),
            None => Err(Error::source_data(format!("Missing the '{}' dataset", kind)).into()),
        }
    }

    /// Reads addresses and joins the postal code and thoroughfare name tables onto them.
    pub fn read_addresses(&self) -> Result<Layer<Address>> {
        let raw = self.read_required(FeatureKind::Address)?;
        let mut features = Vec::new();
        for f in &raw.features {
            let props = Props(&f.properties);
            let local_id = props.local_id(raw.kind)?;
            let pt = match f.geometry.as_ref().and_then(|g| g.as_point()) {
                Some(pt) => pt,
                None => {
                    return Err(Error::source_data(format!(
                        "Address {} isn't a point",
                        local_id
                    ))
                    .into())
                }
            };
            let hrefs = props.string(&["component_href"]);
            features.push(Address {
                local_id,
                pt,
                specification: props.string(&["specification", "spec"]),
                designator: props.string(&["designator"]).unwrap_or_default(),
                thoroughfare: props.string(&["TN_text"]),
                post_code: props.string(&["postCode"]),
                image: props.string(&["image"]),
                pd_id: props
                    .string(&["PD_id"])
                    .or_else(|| resolve_href(hrefs.as_deref(), ".PD.")),
                tn_id: props
                    .string(&["TN_id"])
                    .or_else(|| resolve_href(hrefs.as_deref(), ".TN.")),
                task: None,
            });
        }
        let mut layer = Layer {
            features,
            source_date: raw.source_date,
        };

        let postal = self.read_table(FeatureKind::PostalDescriptor, "postCode")?;
        let names = self.read_table(FeatureKind::ThoroughfareName, "text")?;
        join(&mut layer.features, &postal, &names)?;
        info!(
            "Read {} addresses",
            prettyprint_usize(layer.features.len())
        );
        Ok(layer)
    }

    /// gml_id to one field
    fn read_table(&self, kind: FeatureKind, field: &str) -> Result<BTreeMap<String, String>> {
        let raw = self.read_required(kind)?;
        let mut table = BTreeMap::new();
        for f in &raw.features {
            let props = Props(&f.properties);
            if let (Some(id), Some(value)) = (props.string(&["gml_id"]), props.string(&[field])) {
                table.insert(id, value);
            }
        }
        Ok(table)
    }

    /// Buildings, their parts, and other constructions form one layer.
    pub fn read_constructions(&self) -> Result<Layer<Construction>> {
        let mut features = Vec::new();
        let mut source_date = None;
        for kind in [
            FeatureKind::Building,
            FeatureKind::BuildingPart,
            FeatureKind::OtherConstruction,
        ] {
            let raw = match self.read(kind)? {
                Some(raw) => raw,
                None => continue,
            };
            if kind == FeatureKind::Building {
                source_date = raw.source_date.clone();
            }
            for f in &raw.features {
                let props = Props(&f.properties);
                let local_id = props.local_id(kind)?;
                let polygon = polygon(f, &local_id)?;
                features.push(Construction {
                    local_id,
                    polygon,
                    condition: props.string(&["condition", "conditionOfConstruction"]),
                    current_use: props.string(&["currentUse"]),
                    nature: props.string(&["nature", "constructionNature"]),
                    lev_above: props.int(&["lev_above", "numberOfFloorsAboveGround"]),
                    lev_below: props.int(&["lev_below", "numberOfFloorsBelowGround"]),
                    layer: props.int(&["layer"]),
                    fixme: props.string(&["fixme"]),
                    task: None,
                });
            }
        }
        info!(
            "Read {} constructions",
            prettyprint_usize(features.len())
        );
        Ok(Layer {
            features,
            source_date,
        })
    }

    pub fn read_parcels(&self) -> Result<Layer<Parcel>> {
        let raw = self.read_required(FeatureKind::CadastralParcel)?;
        let mut features = Vec::new();
        for f in &raw.features {
            let props = Props(&f.properties);
            let local_id = props.local_id(raw.kind)?;
            let polygon = polygon(f, &local_id)?;
            features.push(Parcel {
                local_id,
                polygon,
                label: props.string(&["label"]),
                parts: None,
            });
        }
        Ok(Layer {
            features,
            source_date: raw.source_date,
        })
    }

    /// Zones of an unknown level are skipped.
    pub fn read_zoning(&self) -> Result<Layer<Zoning>> {
        let raw = self.read_required(FeatureKind::CadastralZoning)?;
        let mut features = Vec::new();
        for f in &raw.features {
            let props = Props(&f.properties);
            let local_id = props.local_id(raw.kind)?;
            let level = props
                .string(&["levelName", "LocalisedCharacterString"])
                .unwrap_or_default();
            let kind = match zone_kind(&level) {
                Some(kind) => kind,
                None => {
                    debug!("Skipping zone {} with level {:?}", local_id, level);
                    continue;
                }
            };
            let polygon = polygon(f, &local_id)?;
            features.push(Zoning {
                local_id,
                polygon,
                kind,
                label: None,
            });
        }
        Ok(Layer {
            features,
            source_date: raw.source_date,
        })
    }
}

/// Fills in the postal code and thoroughfare name of every address from the joined tables.
pub fn join(
    addresses: &mut [Address],
    postal: &BTreeMap<String, String>,
    names: &BTreeMap<String, String>,
) -> Result<()> {
    if !addresses.is_empty() && addresses.iter().all(|a| a.tn_id.is_none()) {
        return Err(Error::source_data(
            "Could not resolve joined tables for the 'address' layer",
        )
        .into());
    }
    for a in addresses {
        if let Some(code) = a.pd_id.as_ref().and_then(|id| postal.get(id)) {
            a.post_code = Some(code.clone());
        }
        if let Some(name) = a.tn_id.as_ref().and_then(|id| names.get(id)) {
            a.thoroughfare = Some(name.clone());
        }
    }
    Ok(())
}

fn zone_kind(level: &str) -> Option<ZoneKind> {
    let level = level.trim().to_uppercase();
    if level == "M" || level.contains("MANZANA") {
        Some(ZoneKind::Urban)
    } else if level == "P" || level.contains("POLIGONO") {
        Some(ZoneKind::Rustic)
    } else {
        None
    }
}

fn polygon(f: &RawFeature, local_id: &str) -> Result<Polygon> {
    match f.geometry.as_ref().and_then(|g| g.as_polygon()) {
        Some(p) => Ok(p.clone()),
        None => Err(Error::source_data(format!("{} has no polygon geometry", local_id)).into()),
    }
}

/// Cadastre references look like `#ES.SDGC.TN.38001.3`. A feature may list several.
fn resolve_href(hrefs: Option<&str>, marker: &str) -> Option<String> {
    hrefs?
        .split(|c: char| !(c.is_alphanumeric() || c == '.' || c == '_'))
        .find(|token| token.contains(marker))
        .map(|token| token.to_string())
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Number(n) => match n.as_f64() {
            Some(x) if x.fract() == 0.0 && x.abs() < 1e15 => Some(format!("{}", x as i64)),
            _ => Some(n.to_string()),
        },
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

struct Props<'a>(&'a Map<String, Value>);

impl<'a> Props<'a> {
    /// The first of the aliases that's present and non-empty
    fn string(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .find_map(value_to_string)
    }

    fn int(&self, keys: &[&str]) -> Option<i64> {
        keys.iter().filter_map(|k| self.0.get(*k)).find_map(|v| match v {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|x| x as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        })
    }

    fn local_id(&self, kind: FeatureKind) -> Result<String> {
        match self.string(&["localId", "inspireId_localId"]) {
            Some(id) => Ok(id),
            None => Err(Error::source_data(format!("A '{}' feature has no localId", kind)).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use geom::Pt2D;

    use super::*;

    fn write(dir: &std::path::Path, kind: FeatureKind, raw: &str) {
        abstio::write_file(
            format!("{}/{}.geojson", dir.display(), kind.name()),
            raw.as_bytes(),
        )
        .unwrap();
    }

    #[test]
    fn addresses_are_joined() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            FeatureKind::Address,
            r#"{"type": "FeatureCollection", "source_date": "2021-06-01", "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-3.0, 40.0]},
                 "properties": {"localId": "AD.38001.B1", "designator": "7",
                    "specification": "Entrance",
                    "component_href": "(2:#ES.SDGC.PD.38001.1,#ES.SDGC.TN.38001.3)"}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-3.1, 40.0]},
                 "properties": {"localId": "AD.38001.B2", "designator": 9,
                    "PD_id": "ES.SDGC.PD.38001.2", "TN_id": "ES.SDGC.TN.38001.3"}}
            ]}"#,
        );
        write(
            dir.path(),
            FeatureKind::PostalDescriptor,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": null,
                 "properties": {"gml_id": "ES.SDGC.PD.38001.1", "postCode": 38001}}
            ]}"#,
        );
        write(
            dir.path(),
            FeatureKind::ThoroughfareName,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": null,
                 "properties": {"gml_id": "ES.SDGC.TN.38001.3", "text": "CL MAYOR"}}
            ]}"#,
        );

        let layer = GeojsonSource::new(dir.path().display().to_string())
            .read_addresses()
            .unwrap();
        assert_eq!(layer.source_date.as_deref(), Some("2021-06-01"));
        let a = &layer.features[0];
        assert_eq!(a.reference(), "B1");
        assert!(a.is_entrance());
        assert_eq!(a.post_code.as_deref(), Some("38001"));
        assert_eq!(a.thoroughfare.as_deref(), Some("CL MAYOR"));
        let b = &layer.features[1];
        assert_eq!(b.designator, "9");
        assert_eq!(b.post_code, None);
        assert_eq!(b.thoroughfare.as_deref(), Some("CL MAYOR"));
    }

    #[test]
    fn unresolved_join_is_fatal() {
        let mut addresses = vec![Address {
            local_id: "AD.1".to_string(),
            pt: Pt2D::new(0.0, 0.0),
            specification: None,
            designator: "1".to_string(),
            thoroughfare: None,
            post_code: None,
            image: None,
            pd_id: None,
            tn_id: None,
            task: None,
        }];
        let err = join(&mut addresses, &BTreeMap::new(), &BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains("Could not resolve joined tables"));
    }

    #[test]
    fn missing_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let source = GeojsonSource::new(dir.path().display().to_string());
        assert!(source.read(FeatureKind::OtherConstruction).unwrap().is_none());
        let err = source.read_parcels().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::SourceData(_))
        ));
    }

    #[test]
    fn zone_levels() {
        assert_eq!(zone_kind("M"), Some(ZoneKind::Urban));
        assert_eq!(zone_kind("1000:MANZANA "), Some(ZoneKind::Urban));
        assert_eq!(zone_kind("P"), Some(ZoneKind::Rustic));
        assert_eq!(zone_kind("X"), None);
    }
}
