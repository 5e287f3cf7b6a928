//! CSV record format for data samples.
//!
//! One sample per line, comma-delimited, columns as in [`HEADER`]. The
//! header line is written once when a file is newly created; decode accepts
//! files both with and without it, so archives produced by older tooling
//! still import cleanly.

use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use speck_types::DataSample;

use crate::error::{Error, Result};

/// Column names, in file order.
pub const HEADER: [&str; 6] = [
    "sample_timestamp_utc_secs",
    "raw_particle_count",
    "particle_count",
    "temperature",
    "humidity",
    "download_timestamp_utc_millis",
];

/// File name used for the CSV sample archive inside a store directory.
pub const SAMPLES_FILE: &str = "data_samples.csv";

/// Encode a sample as one CSV record, fields in [`HEADER`] order.
pub(crate) fn encode_record(sample: &DataSample) -> [String; 6] {
    [
        sample.sample_time_utc_secs.to_string(),
        sample.raw_particle_count.to_string(),
        sample.particle_count.to_string(),
        sample.temperature.to_string(),
        sample.humidity.to_string(),
        sample.download_time_utc_millis.to_string(),
    ]
}

/// Whether a record is the column header rather than data.
pub(crate) fn is_header(record: &StringRecord) -> bool {
    record.get(0).is_some_and(|field| field.trim() == HEADER[0])
}

/// Decode one CSV record into a sample.
///
/// `line` is the 1-based line number, reported in decode errors.
pub(crate) fn decode_record(record: &StringRecord, line: u64) -> Result<DataSample> {
    if record.len() != HEADER.len() {
        return Err(Error::MalformedRecord {
            line,
            message: format!("expected {} fields, found {}", HEADER.len(), record.len()),
        });
    }

    Ok(DataSample {
        sample_time_utc_secs: parse_field(record, 0, line)?,
        raw_particle_count: parse_field(record, 1, line)?,
        particle_count: parse_field(record, 2, line)?,
        temperature: parse_field(record, 3, line)?,
        humidity: parse_field(record, 4, line)?,
        download_time_utc_millis: parse_field(record, 5, line)?,
    })
}

fn parse_field<T: std::str::FromStr>(record: &StringRecord, index: usize, line: u64) -> Result<T> {
    let raw = record.get(index).unwrap_or("");
    raw.trim().parse().map_err(|_| Error::MalformedRecord {
        line,
        message: format!("field {} has invalid value {:?}", HEADER[index], raw),
    })
}

/// Read every sample from a CSV file.
///
/// Accepts files with or without the header line. Stops at the first
/// malformed record; use [`SqliteSampleStore::import_csv`] to skip and count
/// bad rows instead.
///
/// [`SqliteSampleStore::import_csv`]: crate::SqliteSampleStore::import_csv
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened,
/// [`Error::MalformedRecord`] on the first undecodable line.
pub fn read_samples<P: AsRef<Path>>(path: P) -> Result<Vec<DataSample>> {
    let file = File::open(path.as_ref())?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut samples = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        if index == 0 && is_header(&record) {
            continue;
        }
        samples.push(decode_record(&record, index as u64 + 1)?);
    }

    Ok(samples)
}
