//! The pipeline for one municipality. Which stages run is decided up front by `Options::resolve`;
//! only the first run of the street name translations can switch stages off later.

use std::collections::BTreeMap;

use anyhow::Result;

use abstutil::{prettyprint_usize, Timer};
use cadastre::build::to_osm;
use cadastre::zoning::ZoningLayers;
use cadastre::{
    address, conflate, constructions, highway_names, parcel, tasks, translate, zoning, Address,
    Construction, GeojsonSource, Layer, Options, Report, Settings, Stages,
};
use geom::Bounds;
use osm_data::overpass::{self, Query};
use osm_data::OsmData;

const CURRENT_ADDRESS: &str = "node[\"addr:street\"][\"addr:housenumber\"];\
    way[\"addr:street\"][\"addr:housenumber\"];\
    relation[\"addr:street\"][\"addr:housenumber\"];\
    node[\"addr:place\"][\"addr:housenumber\"];\
    way[\"addr:place\"][\"addr:housenumber\"];\
    relation[\"addr:place\"][\"addr:housenumber\"]";

const CURRENT_HIGHWAY: &str = "way[\"highway\"][\"name\"];\
    relation[\"highway\"][\"name\"];\
    way[\"place\"=\"square\"][\"name\"];\
    relation[\"place\"=\"square\"][\"name\"]";

const CURRENT_BUILDING: &str = "way[\"building\"];relation[\"building\"]";

struct App {
    path: String,
    settings: Settings,
    stages: Stages,
    source: GeojsonSource,
    report: Report,
    /// The street name translations were created on this run
    is_new: bool,
}

pub async fn run(path: &str, options: Options) -> Result<()> {
    let mut timer = Timer::new(format!("process {}", path));
    let mut app = App {
        path: path.to_string(),
        settings: Settings::load(path)?,
        stages: options.resolve(),
        source: GeojsonSource::new(path),
        report: Report::new(),
        is_new: false,
    };
    info!("Start processing '{}'", path);
    debug!("Running {:?}", app.stages);

    let zones = if app.stages.zoning {
        Some(app.process_zoning(&mut timer)?)
    } else {
        None
    };

    let mut address = None;
    if app.stages.address {
        let mut layer = app.read_address(zones.as_ref(), &mut timer).await?;
        if app.is_new {
            app.stages.first_run();
        } else if app.stages.conflate {
            let bounds = app.search_area(zones.as_ref(), address_bounds(&layer.features));
            let current = app
                .current_osm(CURRENT_ADDRESS, "current_address.osm", bounds, &mut timer)
                .await?;
            let keys = conflate::current_address_keys(&current, &mut app.report);
            conflate::conflate_addresses(
                &mut layer.features,
                &keys,
                &app.settings.no_number,
                &mut app.report,
            );
        }
        address = Some(layer);
    }

    let mut building = None;
    if app.stages.constructions() {
        let mut layer = app.read_constructions(&mut timer)?;
        if let Some(ref mut addresses) = address {
            app.report.orphan_addresses +=
                address::delete_orphans(&mut addresses.features, &layer.features);
            let moved = address::move_entrances(
                &mut addresses.features,
                &mut layer.features,
                app.settings.entrance_threshold,
                app.settings.node_tolerance,
            );
            app.report.far_entrances += moved.too_far;
        }
        // Flags are counted as fixme tags when the OSM data is built
        constructions::validate(
            &mut layer.features,
            app.settings.warning_min_area,
            app.settings.warning_max_area,
        );
        if app.stages.tasks {
            app.set_tasks(&mut layer.features, zones.as_ref(), &mut timer)?;
            if let Some(ref mut address) = address {
                zoning::set_address_tasks(&mut address.features, &layer.features);
            }
        }
        if app.stages.conflate && !app.is_new {
            app.conflate_buildings(&layer.features, zones.as_ref(), &mut timer).await?;
        }
        building = Some(layer);
    }

    let address_osm = match address {
        Some(ref layer) => Some(to_osm(
            &layer.features,
            app.settings.node_tolerance,
            "never",
            layer.source_date.as_deref(),
            &mut app.report,
            &mut timer,
        )),
        None => None,
    };

    if let Some(ref layer) = building {
        if app.stages.tasks {
            app.write_tasks(layer, address_osm.as_ref(), &mut timer)?;
        }
        if app.stages.building {
            // Tasks already counted everything
            let mut scratch = Report::new();
            let report = if app.stages.tasks {
                &mut scratch
            } else {
                &mut app.report
            };
            let mut building_osm = to_osm(
                &layer.features,
                app.settings.node_tolerance,
                "never",
                layer.source_date.as_deref(),
                report,
                &mut timer,
            );
            if let Some(ref address_osm) = address_osm {
                conflate::merge_address(
                    &mut building_osm,
                    address_osm,
                    app.settings.node_tolerance,
                );
            }
            app.write_osm(building_osm, "building.osm")?;
        }
    }

    if let Some(address_osm) = address_osm {
        app.write_osm(address_osm, "address.osm")?;
    }

    if app.stages.parcel {
        app.process_parcel(building.as_ref(), &mut timer)?;
    }

    app.end_messages();
    Ok(())
}

impl App {
    fn process_zoning(&mut self, timer: &mut Timer) -> Result<ZoningLayers> {
        timer.start("zoning");
        let layer = self.source.read_zoning()?;
        let mut zones = ZoningLayers::new(layer.features);
        self.report.invalid_zones += zones.clean(self.settings.simplify_tolerance);
        zones.merge_adjacents(self.settings.adjacency_tolerance);
        zones.export(&self.path)?;
        info!(
            "Read {} urban and {} rustic zones",
            prettyprint_usize(zones.urban.len()),
            prettyprint_usize(zones.rustic.len())
        );
        timer.stop("zoning");
        Ok(zones)
    }

    /// The area to query OSM for: the zoning if it was read, else the features at hand.
    fn search_area(&self, zones: Option<&ZoningLayers>, fallback: Bounds) -> Bounds {
        match zones {
            Some(z) if !z.get_bounds().is_empty() => z.get_bounds(),
            _ => fallback.buffer(self.settings.bbox_buffer),
        }
    }

    async fn current_osm(
        &self,
        statements: &str,
        filename: &str,
        bounds: Bounds,
        timer: &mut Timer,
    ) -> Result<OsmData> {
        let query = Query::new(&bounds).add(statements);
        let path = format!("{}/{}", self.path, filename);
        overpass::read_or_download(&query, &self.settings.overpass_url, &path, timer).await
    }

    async fn read_address(
        &mut self,
        zones: Option<&ZoningLayers>,
        timer: &mut Timer,
    ) -> Result<Layer<Address>> {
        timer.start("address");
        let mut layer = self.source.read_addresses()?;
        address::set_image_links(&mut layer.features, &self.settings.doc_url);
        self.report.malformed_postcodes += translate::count_malformed_postcodes(&layer.features);

        let highway = if self.stages.conflate {
            let bounds = self.search_area(zones, address_bounds(&layer.features));
            self.current_osm(CURRENT_HIGHWAY, "current_highway.osm", bounds, timer)
                .await?
        } else {
            OsmData::new()
        };
        let (names, is_new) = highway_names::get_translations(
            &self.path,
            &layer.features,
            &highway,
            self.settings.bbox_buffer,
            &self.settings.highway_types,
        )?;
        self.is_new = is_new;
        let renamed = highway_names::apply(&mut layer.features, &names);
        debug!("Translated {} street names of addresses", renamed);
        timer.stop("address");
        Ok(layer)
    }

    fn read_constructions(&mut self, timer: &mut Timer) -> Result<Layer<Construction>> {
        timer.start("constructions");
        let mut layer = self.source.read_constructions()?;
        self.report.outside_parts += constructions::remove_outside_parts(&mut layer.features);
        layer.features = constructions::explode_multi_parts(layer.features);
        constructions::update_levels(&layer.features, &mut self.report);
        timer.stop("constructions");
        Ok(layer)
    }

    /// Writes the buildings in OSM overlapping the new ones to `current_building.osm`, if any.
    async fn conflate_buildings(
        &mut self,
        features: &[Construction],
        zones: Option<&ZoningLayers>,
        timer: &mut Timer,
    ) -> Result<()> {
        let mut fallback = Bounds::new();
        for c in features {
            fallback.union(c.polygon.get_bounds());
        }
        let bounds = self.search_area(zones, fallback);
        let mut current = self
            .current_osm(CURRENT_BUILDING, "current_building_raw.osm", bounds, timer)
            .await?;
        let conflicts = conflate::conflate_buildings(&mut current, features);
        self.report.building_conflicts += conflicts;
        if conflicts > 0 {
            osm_data::write_file(&format!("{}/current_building.osm", self.path), &current)?;
        }
        Ok(())
    }

    fn set_tasks(
        &mut self,
        features: &mut [Construction],
        zones: Option<&ZoningLayers>,
        timer: &mut Timer,
    ) -> Result<()> {
        timer.start("set tasks");
        let unlabeled = if self.settings.split_tasks_by_parcel {
            let mut parcels = self.source.read_parcels()?.features;
            let lookup = self.reconcile_parcels(&mut parcels, features, true);
            zoning::set_tasks_from_lookup(features, &lookup)
        } else {
            match zones {
                Some(z) => z.set_tasks(features),
                None => features.iter().filter(|c| c.is_building()).count(),
            }
        };
        self.report.unlabeled_buildings += unlabeled;
        timer.stop("set tasks");
        Ok(())
    }

    /// Returns the building to parcel lookup if parcels were merged.
    fn reconcile_parcels(
        &mut self,
        parcels: &mut Vec<cadastre::Parcel>,
        features: &[Construction],
        merge: bool,
    ) -> BTreeMap<String, String> {
        let tolerance = self.settings.adjacency_tolerance;
        self.report.void_parcels += parcel::delete_void_parcels(parcels, features);
        self.report.created_parcels += parcel::create_missing_parcels(parcels, features, tolerance);
        if !merge {
            return BTreeMap::new();
        }
        let before = parcels.len();
        let lookup = parcel::merge_by_adjacent_buildings(parcels, features, tolerance);
        self.report.merged_parcels += before - parcels.len();
        lookup
    }

    fn write_tasks(
        &mut self,
        layer: &Layer<Construction>,
        address_osm: Option<&OsmData>,
        timer: &mut Timer,
    ) -> Result<()> {
        timer.start("tasks");
        let dir = format!("{}/tasks", self.path);
        abstio::clear_dir(&dir)?;
        let batches = tasks::partition(&layer.features, |c| c.task.as_deref());
        for (label, batch) in batches {
            let mut task_report = Report::new();
            let mut task_osm = to_osm(
                &batch,
                self.settings.node_tolerance,
                "yes",
                layer.source_date.as_deref(),
                &mut task_report,
                timer,
            );
            if task_report.fixmes > 0 {
                debug!("Task {} has {} fixme tags", label, task_report.fixmes);
            }
            self.report.merge(task_report);
            if let Some(address_osm) = address_osm {
                conflate::merge_address(&mut task_osm, address_osm, self.settings.node_tolerance);
            }
            self.write_osm(task_osm, &format!("tasks/{}.osm", label))?;
        }
        timer.stop("tasks");
        Ok(())
    }

    fn process_parcel(
        &mut self,
        building: Option<&Layer<Construction>>,
        timer: &mut Timer,
    ) -> Result<()> {
        timer.start("parcel");
        let mut layer = self.source.read_parcels()?;
        if let Some(building) = building {
            self.reconcile_parcels(&mut layer.features, &building.features, false);
            let counts = parcel::count_parts(&mut layer.features, &building.features);
            self.report.parts_in_parcels += counts.values().sum::<usize>();
        }
        let parcel_osm = to_osm(
            &layer.features,
            self.settings.node_tolerance,
            "never",
            layer.source_date.as_deref(),
            &mut self.report,
            timer,
        );
        self.write_osm(parcel_osm, "parcel.osm")?;
        timer.stop("parcel");
        Ok(())
    }

    /// `ref` is only used to match addresses with buildings; it never ends up in OSM.
    fn write_osm(&self, mut data: OsmData, filename: &str) -> Result<()> {
        data.strip_tag("ref");
        data.merge_duplicated();
        osm_data::write_file(&format!("{}/{}", self.path, filename), &data)
    }

    fn end_messages(&self) {
        if self.stages.constructions() {
            info!(
                "Distribution of floors above ground {}",
                self.report.floors_above()
            );
            info!(
                "Distribution of floors below ground {}",
                self.report.floors_below()
            );
        }
        if self.report.fixmes > 0 {
            warn!("Check {} fixme tags", prettyprint_usize(self.report.fixmes));
        }
        if self.report.parts_in_parcels > 0 {
            info!(
                "{} building parts inside parcels",
                prettyprint_usize(self.report.parts_in_parcels)
            );
        }
        for line in self.report.warnings() {
            warn!("{}", line);
        }
        if self.is_new {
            info!(
                "The translation file 'highway_names.csv' has been written in '{}'",
                self.path
            );
            info!("Please, check it and run again");
        } else {
            info!("Finished!");
            warn!("Only for testing purposes. Don't upload any result to OSM");
        }
    }
}

fn address_bounds(addresses: &[Address]) -> Bounds {
    let mut b = Bounds::new();
    for a in addresses {
        b.update(a.pt);
    }
    b
}
