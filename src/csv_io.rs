//! CSV input of pings and output of stays and home/work pairs.
//!
//! Ping files need a header row with `device_id` (or `uid`),
//! `timestamp_ms` (or `timestamp`), `latitude` and `longitude` columns.

use std::io::{Read, Write};

use log::warn;

use crate::error::{Result, StayError};
use crate::pipeline::HomeWorkPair;
use crate::{Ping, StayRecord};

/// Read pings from CSV.
///
/// Rows that fail to parse are fatal and reported with their line number.
pub fn read_pings<R: Read>(reader: R) -> Result<Vec<Ping>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut pings = Vec::new();
    for (row, record) in csv_reader.deserialize::<Ping>().enumerate() {
        let ping = record.map_err(|e| StayError::InvalidRecord {
            line: e.position().map(|p| p.line()).unwrap_or(row as u64 + 2),
            reason: e.to_string(),
        })?;
        pings.push(ping);
    }

    let empty_ids = pings.iter().filter(|p| p.device_id.is_empty()).count();
    if empty_ids > 0 {
        warn!("[Pipeline] Dropping {} pings with an empty device id", empty_ids);
        pings.retain(|p| !p.device_id.is_empty());
    }
    Ok(pings)
}

/// Write stay records as CSV with a header row.
pub fn write_records<W: Write>(writer: W, records: &[StayRecord]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write home/work pairs as CSV with a header row.
pub fn write_pairs<W: Write>(writer: W, pairs: &[HomeWorkPair]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for pair in pairs {
        csv_writer.serialize(pair)?;
    }
    csv_writer.flush()?;
    Ok(())
}
