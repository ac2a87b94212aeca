//! Filename contract: rasters are named `SIF_YYYYMMDD.tif`.
//!
//! The zero-padded date makes lexicographic order equal chronological
//! order, which the catalog relies on for item link ordering.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::error::{CatalogError, Result};

static FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SIF_(\d{8})\.tif$").expect("valid literal pattern"));

/// Whether a file name follows the raster naming contract.
pub fn matches_contract(file_name: &str) -> bool {
    FILENAME_RE.is_match(file_name)
}

/// Item identifier for a raster file: the file name minus its extension.
///
/// Fails on names outside the contract so that the id ⇔ filename
/// mapping stays a bijection.
pub fn item_id(file_name: &str) -> Result<&str> {
    if !matches_contract(file_name) {
        return Err(CatalogError::MalformedFilename(file_name.to_string()));
    }
    // Safe: the pattern guarantees the suffix.
    Ok(file_name.trim_end_matches(".tif"))
}

/// Parse the acquisition date encoded in a raster file name.
///
/// The result is always midnight UTC on the encoded calendar day; two
/// files for the same day can never disagree on the timestamp.
pub fn parse_date(file_name: &str) -> Result<DateTime<Utc>> {
    let caps = FILENAME_RE
        .captures(file_name)
        .ok_or_else(|| CatalogError::MalformedFilename(file_name.to_string()))?;

    let date = NaiveDate::parse_from_str(&caps[1], "%Y%m%d")
        .map_err(|_| CatalogError::MalformedFilename(file_name.to_string()))?;

    Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}
