//! Converts the datasets of the Spanish cadastre for one municipality into OSM files.

#[macro_use]
extern crate log;

mod app;

use structopt::StructOpt;

use cadastre::Options;

#[derive(StructOpt)]
#[structopt(
    name = "cat2osm",
    about = "Converts the datasets of the Spanish cadastre into OSM files"
)]
struct Args {
    /// Directory for input and output files. The source datasets are read from
    /// `<path>/<kind>.geojson`.
    #[structopt()]
    path: String,
    /// Splits constructions into task files (default, implies -z)
    #[structopt(short, long)]
    tasks: bool,
    /// Process the cadastral zoning dataset
    #[structopt(short, long)]
    zoning: bool,
    /// Process buildings to a single file instead of tasks
    #[structopt(short, long)]
    building: bool,
    /// Process the address dataset (default)
    #[structopt(short = "d", long)]
    address: bool,
    /// Process the cadastral parcel dataset
    #[structopt(short, long)]
    parcel: bool,
    /// Process all datasets (equivalent to -bdptz)
    #[structopt(short, long)]
    all: bool,
    /// Disable conflation with OSM data
    #[structopt(short, long)]
    manual: bool,
    /// DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[structopt(long, default_value = "INFO")]
    log: String,
}

impl Args {
    fn options(&self) -> Options {
        Options {
            tasks: self.tasks,
            zoning: self.zoning,
            building: self.building,
            address: self.address,
            parcel: self.parcel,
            all: self.all,
            manual: self.manual,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::from_args();
    let level = match abstutil::logger::parse_level(&args.log) {
        Some(level) => level,
        None => {
            eprintln!("Unknown log level {}", args.log);
            std::process::exit(2);
        }
    };
    abstutil::logger::setup(level);

    if let Err(err) = app::run(&args.path, args.options()).await {
        error!("{:#}", err);
        std::process::exit(1);
    }
}
