//! Raster input and statistics output

pub mod dem;
pub mod report;

pub use dem::DemReader;
pub use report::{read_statistics_json, statistics_to_json_string, write_statistics_json};
