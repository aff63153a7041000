//! Reading and writing the files of one municipality's working directory: source layers, cached
//! downloads, CSV translation tables, and generated output.

#[macro_use]
extern crate log;

mod csv_dict;
mod download;
mod io;

pub use crate::csv_dict::{read_csv_dict, write_csv_dict};
pub use crate::download::{download_bytes, download_to_file, maybe_download, url_with_params};
pub use crate::io::{clear_dir, file_exists, list_dir, slurp_file, write_file, write_json};
