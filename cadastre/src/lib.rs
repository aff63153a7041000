//! Turns the datasets of the Spanish cadastre into OSM data ready for review: addresses,
//! buildings split into tasks, and parcels.
//!
//! Everything in here is an in-memory transformation. Reading and writing files and talking to
//! Overpass is up to the caller.

#[macro_use]
extern crate log;

pub mod address;
pub mod build;
pub mod config;
pub mod conflate;
pub mod constructions;
mod error;
pub mod group;
pub mod highway_names;
pub mod parcel;
pub mod records;
mod report;
pub mod source;
pub mod tasks;
pub mod translate;
pub mod zoning;

pub use crate::config::{Options, Settings, Stages};
pub use crate::error::Error;
pub use crate::records::{Address, Construction, Parcel, ZoneKind, Zoning};
pub use crate::report::Report;
pub use crate::source::{FeatureKind, GeojsonSource, Layer};
