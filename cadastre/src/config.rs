use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Which datasets the user asked for, before any defaults are applied.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Options {
    pub tasks: bool,
    pub zoning: bool,
    pub building: bool,
    pub address: bool,
    pub parcel: bool,
    pub all: bool,
    pub manual: bool,
}

/// The fully expanded set of stages to run. Nothing downstream looks at `Options` directly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stages {
    pub zoning: bool,
    pub tasks: bool,
    pub building: bool,
    pub address: bool,
    pub parcel: bool,
    /// Compare against data currently in OSM
    pub conflate: bool,
}

impl Options {
    pub fn resolve(&self) -> Stages {
        let mut stages = Stages {
            zoning: self.zoning,
            tasks: self.tasks,
            building: self.building,
            address: self.address,
            parcel: self.parcel,
            conflate: !self.manual,
        };
        if self.all {
            stages.building = true;
            stages.tasks = true;
            stages.address = true;
            stages.parcel = true;
        }
        if !(stages.tasks || stages.zoning || stages.building || stages.address || stages.parcel)
        {
            stages.tasks = true;
            stages.address = true;
        }
        if stages.tasks {
            stages.zoning = true;
        }
        stages
    }
}

impl Stages {
    /// The street name translations were just created and need review, so don't produce anything
    /// depending on them yet.
    pub fn first_run(&mut self) {
        self.tasks = false;
        self.building = false;
    }

    /// Are any constructions needed?
    pub fn constructions(&self) -> bool {
        self.tasks || self.building
    }
}

const DEFAULT_DOC_URL: &str =
    "http://ovc.catastro.meh.es/OVCServWeb/OVCWcfLibres/OVCFotoFachada.svc/RecuperarFotoFachadaGet?ReferenciaCatastral={}";

/// Tunables read from an optional `cadastre.toml` in the working directory. Every key is
/// optional.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Vertices closer than this (in degrees) become one node
    pub node_tolerance: f64,
    /// Buildings closer than this (in degrees) are adjacent
    pub adjacency_tolerance: f64,
    pub simplify_tolerance: f64,
    /// The house number used by the cadastre for addresses without one
    pub no_number: String,
    pub overpass_url: String,
    /// Degrees to grow the area around a street's addresses when matching OSM names
    pub bbox_buffer: f64,
    /// Use merged parcels as tasks, instead of zoning
    pub split_tasks_by_parcel: bool,
    /// Abbreviated street types to their full name, like "CL" to "Calle"
    pub highway_types: BTreeMap<String, String>,
    /// Entrances farther than this (in degrees) from their building become building addresses
    pub entrance_threshold: f64,
    /// Constructions smaller than this many square meters get a fixme
    pub warning_min_area: f64,
    /// Buildings larger than this many square meters get a fixme
    pub warning_max_area: f64,
    /// Link to the cadastre's photo of a building; `{}` is replaced by its reference
    pub doc_url: String,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            node_tolerance: geom::EPSILON_DEGREES,
            adjacency_tolerance: 1e-6,
            simplify_tolerance: 1e-6,
            no_number: "S-N".to_string(),
            overpass_url: osm_data::overpass::DEFAULT_URL.to_string(),
            bbox_buffer: 0.001,
            split_tasks_by_parcel: false,
            highway_types: default_highway_types(),
            entrance_threshold: 4e-5,
            warning_min_area: 1.0,
            warning_max_area: 30000.0,
            doc_url: DEFAULT_DOC_URL.to_string(),
        }
    }
}

impl Settings {
    /// Reads `<dir>/cadastre.toml` if it exists. A malformed file is an error, not a silent
    /// fallback. Abbreviations in the file extend the defaults.
    pub fn load(dir: &str) -> Result<Settings> {
        let path = format!("{}/cadastre.toml", dir);
        if !abstio::file_exists(&path) {
            return Ok(Settings::default());
        }
        let bytes = abstio::slurp_file(&path)?;
        let text = String::from_utf8(bytes).with_context(|| path.clone())?;
        Settings::from_toml(&text).with_context(|| path.clone())
    }

    pub fn from_toml(text: &str) -> Result<Settings> {
        let mut settings: Settings = toml::from_str(text)?;
        let mut types = default_highway_types();
        types.extend(std::mem::take(&mut settings.highway_types));
        settings.highway_types = types;
        Ok(settings)
    }
}

fn default_highway_types() -> BTreeMap<String, String> {
    vec![
        ("AD", "Aldea"),
        ("AL", "Alameda"),
        ("AR", "Área"),
        ("AU", "Autopista"),
        ("AV", "Avenida"),
        ("BJ", "Bajada"),
        ("BO", "Barrio"),
        ("BR", "Barranco"),
        ("CA", "Cañada"),
        ("CJ", "Callejón"),
        ("CL", "Calle"),
        ("CM", "Camino"),
        ("CN", "Colonia"),
        ("CR", "Carretera"),
        ("CS", "Caserío"),
        ("CT", "Cuesta"),
        ("DS", "Diseminado"),
        ("ED", "Edificios"),
        ("GL", "Glorieta"),
        ("GR", "Grupo"),
        ("LG", "Lugar"),
        ("MC", "Mercado"),
        ("MN", "Municipio"),
        ("MZ", "Manzana"),
        ("PB", "Poblado"),
        ("PD", "Partida"),
        ("PG", "Polígono"),
        ("PJ", "Pasaje"),
        ("PQ", "Parque"),
        ("PR", "Prolongación"),
        ("PS", "Paseo"),
        ("PZ", "Plaza"),
        ("RB", "Rambla"),
        ("RD", "Ronda"),
        ("SD", "Senda"),
        ("SL", "Solar"),
        ("TR", "Travesía"),
        ("UR", "Urbanización"),
        ("VR", "Vereda"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(f: impl Fn(&mut Options)) -> Stages {
        let mut opts = Options::default();
        f(&mut opts);
        opts.resolve()
    }

    #[test]
    fn defaults_imply_each_other() {
        let stages = resolve(|_| {});
        assert!(stages.tasks && stages.address && stages.zoning && stages.conflate);
        assert!(!stages.building && !stages.parcel);

        let stages = resolve(|o| o.building = true);
        assert!(stages.building);
        assert!(!stages.tasks && !stages.address && !stages.zoning);

        let stages = resolve(|o| {
            o.all = true;
            o.manual = true;
        });
        assert!(stages.building && stages.tasks && stages.address && stages.parcel);
        assert!(stages.zoning);
        assert!(!stages.conflate);

        let mut stages = resolve(|o| o.tasks = true);
        assert!(stages.zoning && !stages.address);
        stages.first_run();
        assert!(!stages.constructions());
    }

    #[test]
    fn partial_settings() {
        let settings = Settings::from_toml(
            "adjacency_tolerance = 0.5\n[highway_types]\nXX = \"Calleja\"\n",
        )
        .unwrap();
        assert_eq!(settings.adjacency_tolerance, 0.5);
        assert_eq!(settings.no_number, "S-N");
        assert_eq!(settings.warning_max_area, 30000.0);
        assert!(settings.doc_url.ends_with("ReferenciaCatastral={}"));
        assert_eq!(settings.highway_types["XX"], "Calleja");
        assert_eq!(settings.highway_types["CL"], "Calle");
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
        assert!(Settings::from_toml("node_tolerance = \"far\"").is_err());
    }
}
