//! # Crash CSV Source
//!
//! Column layout of the historical data set:
//!
//! | # | Column | Notes |
//! |---|--------|-------|
//! | 0 | date | `January 02, 2006` |
//! | 1 | time | `15:04`, empty or `?` means midnight |
//! | 2-8 | location .. serial number | free text |
//! | 9 | aboard | `7 (passengers:6 crew:1)` |
//! | 10 | fatalities | same shape as aboard |
//! | 11 | ground | integer |
//! | 12 | summary | free text |
//!
//! `?` marks an unknown value and leaves the field empty. Dates are UTC.

use crate::errors::{IngressError, RowError};
use chrono::{DateTime, NaiveDateTime, Utc};
use crash_telemetry::{metric_inc, INGRESS_ROWS_SKIPPED};
use csv::{ReaderBuilder, StringRecord};
use shared_types::{Aboard, FlightCrash};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

pub const COLUMNS: usize = 13;

const UNKNOWN: &str = "?";
const DATE_FORMAT: &str = "%B %d, %Y %H:%M";
const MIDNIGHT: &str = "00:00";

/// Parsed contents of one CSV file.
#[derive(Debug, Default)]
pub struct CrashFile {
    pub records: Vec<FlightCrash>,
    /// Data rows seen, header excluded.
    pub rows: usize,
    pub skipped: usize,
}

pub fn read_path(path: &Path) -> Result<CrashFile, IngressError> {
    let file = File::open(path).map_err(|source| IngressError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let parsed = read_crashes(file)?;
    info!(
        path = %path.display(),
        rows = parsed.rows,
        records = parsed.records.len(),
        skipped = parsed.skipped,
        "CSV read"
    );
    Ok(parsed)
}

/// Parse every data row, skipping and counting the ones that do not parse.
pub fn read_crashes<R: Read>(input: R) -> Result<CrashFile, IngressError> {
    // `flexible` lets short and long rows through to `parse_row`, which
    // rejects them one at a time.
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let mut parsed = CrashFile::default();
    for (index, row) in reader.records().enumerate() {
        parsed.rows += 1;
        let row = match row {
            Ok(row) => parse_row(&row),
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => Err(RowError::Malformed(e.to_string())),
        };
        match row {
            Ok(record) => parsed.records.push(record),
            Err(e) => {
                warn!(row = index + 1, error = %e, "Row skipped");
                metric_inc!(INGRESS_ROWS_SKIPPED);
                parsed.skipped += 1;
            }
        }
    }
    Ok(parsed)
}

pub fn parse_row(row: &StringRecord) -> Result<FlightCrash, RowError> {
    if row.len() != COLUMNS {
        return Err(RowError::ColumnCount {
            expected: COLUMNS,
            found: row.len(),
        });
    }

    Ok(FlightCrash {
        date: Some(parse_date(&row[0], &row[1])?),
        location: known(&row[2]),
        operator: known(&row[3]),
        flight_no: known(&row[4]),
        route: known(&row[5]),
        aircraft_type: known(&row[6]),
        registration: known(&row[7]),
        serial_number: known(&row[8]),
        aboard: parse_aboard(&row[9])?,
        fatalities: parse_aboard(&row[10])?,
        ground: parse_ground(&row[11])?,
        summary: known(&row[12]),
        ..Default::default()
    })
}

fn is_unknown(raw: &str) -> bool {
    raw.trim() == UNKNOWN
}

fn known(raw: &str) -> String {
    if is_unknown(raw) {
        String::new()
    } else {
        raw.to_string()
    }
}

fn parse_date(date: &str, time: &str) -> Result<DateTime<Utc>, RowError> {
    let time = match time.trim() {
        "" | UNKNOWN => MIDNIGHT,
        time => time,
    };
    let stamp = format!("{} {}", date.trim(), time);
    NaiveDateTime::parse_from_str(&stamp, DATE_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|_| RowError::Date(stamp))
}

/// Parse `"7 (passengers:6 crew:1)"`. Any part may be `?`; trailing parts
/// may be missing.
pub fn parse_aboard(raw: &str) -> Result<Aboard, RowError> {
    if is_unknown(raw) || raw.trim().is_empty() {
        return Ok(Aboard::default());
    }
    let cleaned = raw
        .replace("(passengers:", " ")
        .replace("crew:", " ")
        .replace(')', " ");
    let parts: Vec<&str> = cleaned.split_whitespace().collect();
    if parts.len() > 3 {
        return Err(RowError::Number {
            field: "aboard",
            value: raw.to_string(),
        });
    }

    let part = |i: usize, field: &'static str| parts.get(i).map_or(Ok(0), |p| count(p, field));
    Ok(Aboard {
        total: part(0, "total")?,
        passengers: part(1, "passengers")?,
        crew: part(2, "crew")?,
    })
}

fn parse_ground(raw: &str) -> Result<u32, RowError> {
    match raw.trim() {
        "" | UNKNOWN => Ok(0),
        value => count(value, "ground"),
    }
}

fn count(raw: &str, field: &'static str) -> Result<u32, RowError> {
    if raw == UNKNOWN {
        return Ok(0);
    }
    raw.parse().map_err(|_| RowError::Number {
        field,
        value: raw.to_string(),
    })
}
