//! Loading range tables from CSV.
//!
//! The expected layout follows the IP2Location LITE exports:
//!
//! ```text
//! "ip_from","ip_to","country_code","country_name","region_name","city_name",...
//! "16777216","16777471","US","United States","California","Los Angeles",...
//! ```
//!
//! Only the first six columns are used; anything after them (coordinates,
//! zip code, time zone) is ignored. Rows that cannot be used are skipped and
//! logged rather than failing the whole load.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{info, warn};

use crate::database::{GeoRecord, OverlapPolicy, RangeIndex, RangeIndexBuilder};
use crate::error::{Error, Result};

#[cfg(feature = "download")]
use std::fs;

const MIN_FIELDS: usize = 6;

/// How a CSV dataset should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Skip the first row.
    pub has_header: bool,
    pub overlap_policy: OverlapPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            overlap_policy: OverlapPolicy::Reject,
        }
    }
}

/// Counters from a single load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_skipped: usize,
}

/// Load a CSV dataset from `path` and build an index from it.
///
/// # Errors
/// Returns an error if the file cannot be opened, is empty, is not valid
/// CSV, or contains ranges that violate the overlap policy.
pub fn load_csv<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<(RangeIndex, LoadReport)> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let (index, report) = load_csv_reader(BufReader::new(file), options)?;

    info!(
        path = %path.display(),
        ranges = index.len(),
        rows = report.rows_read,
        skipped = report.rows_skipped,
        "loaded geo dataset"
    );
    Ok((index, report))
}

/// Same as [`load_csv`], reading from any [`Read`] source.
///
/// # Examples
/// ```
/// use ip_geo_lookup::loader::{load_csv_reader, LoadOptions};
///
/// let data = "ip_from,ip_to,country_code,country_name,region_name,city_name\n\
///             16777216,16777471,US,United States,California,Los Angeles\n";
/// let (index, report) = load_csv_reader(data.as_bytes(), &LoadOptions::default()).unwrap();
/// assert_eq!(report.rows_read, 1);
/// assert_eq!(index.lookup(16_777_300).unwrap().country, "United States");
/// ```
pub fn load_csv_reader<R: Read>(reader: R, options: &LoadOptions) -> Result<(RangeIndex, LoadReport)> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(options.has_header)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    if options.has_header && rdr.byte_headers()?.is_empty() {
        return Err(Error::EmptyDataset);
    }

    let mut builder = RangeIndexBuilder::new(options.overlap_policy);
    let mut report = LoadReport::default();

    for result in rdr.records() {
        let record = result?;
        report.rows_read += 1;

        let line = record.position().map(|p| p.line()).unwrap_or_default();
        match parse_row(&record) {
            Ok((start, end, geo)) => builder.push(start, end, geo)?,
            Err(reason) => {
                warn!(line, reason, "skipping dataset row");
                report.rows_skipped += 1;
            }
        }
    }

    if !options.has_header && report.rows_read == 0 {
        return Err(Error::EmptyDataset);
    }

    Ok((builder.build(), report))
}

fn parse_row(record: &StringRecord) -> std::result::Result<(u32, u32, GeoRecord), &'static str> {
    if record.len() < MIN_FIELDS {
        return Err("too few fields");
    }

    let start: u32 = record[0].parse().map_err(|_| "invalid ip_from")?;
    let end: u32 = record[1].parse().map_err(|_| "invalid ip_to")?;
    if start > end {
        return Err("ip_from is greater than ip_to");
    }

    let geo = GeoRecord {
        country: record[3].to_string(),
        country_code: record[2].to_string(),
        region: optional_field(&record[4]),
        city: optional_field(&record[5]),
    };
    Ok((start, end, geo))
}

/// Empty strings and the `-` placeholder mean "unknown".
fn optional_field(value: &str) -> Option<String> {
    match value {
        "" | "-" => None,
        v => Some(v.to_string()),
    }
}

/// Download a dataset from `url` and atomically replace `cache_path`.
///
/// The download is written to a temporary file next to the destination and then
/// renamed into place.
///
/// # Errors
/// Returns an error if the download fails or the cache file cannot be written.
///
/// # Feature
/// Available only when the crate is built with the `download` feature.
#[cfg(feature = "download")]
pub fn update_cache_from_url<P: AsRef<Path>>(cache_path: P, url: &str) -> Result<u64> {
    use std::io::Write;

    let cache_path = cache_path.as_ref();

    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let bytes = reqwest::blocking::get(url)?.error_for_status()?.bytes()?;
    if bytes.is_empty() {
        return Err(Error::EmptyDataset);
    }

    // Same directory as the destination, so the rename stays on one filesystem
    let tmp_path = cache_path.with_extension("tmp");
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(&bytes)?;
        f.sync_all()?;
    }

    if cache_path.exists() {
        // On Windows rename can fail if target exists, so remove first.
        let _ = fs::remove_file(cache_path);
    }
    fs::rename(&tmp_path, cache_path)?;

    info!(url, path = %cache_path.display(), bytes = bytes.len(), "dataset cache updated");
    Ok(bytes.len() as u64)
}
