use crate::core::statistics::RunStatistics;
use crate::types::SnowResult;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Pretty-printed JSON form of a run's counters
pub fn statistics_to_json_string(statistics: &RunStatistics) -> SnowResult<String> {
    Ok(serde_json::to_string_pretty(statistics)?)
}

/// Write the run counters, totals and per-day breakdown, to a JSON file
pub fn write_statistics_json<P: AsRef<Path>>(statistics: &RunStatistics, path: P) -> SnowResult<()> {
    log::info!("Writing gap-filling statistics to: {}", path.as_ref().display());

    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut writer, statistics)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn read_statistics_json<P: AsRef<Path>>(path: P) -> SnowResult<RunStatistics> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(serde_json::from_reader(reader)?)
}
