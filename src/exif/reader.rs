use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime};
use nom_exif::*;
use std::path::Path;

use super::synth::EXIF_DATETIME_FORMAT;

// IFD0 tag IDs
const TAG_MAKE: u16 = 0x010F;
const TAG_MODEL: u16 = 0x0110;
const TAG_SOFTWARE: u16 = 0x0131;
const TAG_DATE_TIME: u16 = 0x0132;

/// Identifying EXIF fields of an image: the ones a wash replaces or removes.
#[derive(Debug, Clone, Default)]
pub struct ExifData {
    pub make: Option<String>,
    pub model: Option<String>,
    pub software: Option<String>,
    pub date_time: Option<String>,
    pub date_time_original: Option<String>,
    pub date_time_digitized: Option<String>,
    pub has_gps: bool,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
}

impl ExifData {
    /// True when none of the identifying fields were found.
    pub fn is_empty(&self) -> bool {
        self.make.is_none()
            && self.model.is_none()
            && self.software.is_none()
            && self.date_time.is_none()
            && self.date_time_original.is_none()
            && self.date_time_digitized.is_none()
            && !self.has_gps
    }
}

/// Read existing EXIF data from an image file.
///
/// A file without an EXIF block yields an empty [`ExifData`], not an error.
pub fn read_exif(path: &Path) -> Result<ExifData> {
    let mut parser = MediaParser::new();
    let ms = MediaSource::file_path(path).context("Failed to open image file")?;

    let iter: ExifIter = match parser.parse(ms) {
        Ok(iter) => iter,
        Err(_) => {
            log::debug!("No EXIF data found in {}", path.display());
            return Ok(ExifData::default());
        }
    };

    // Parse GPS info before converting to Exif (consumes the iterator)
    let gps_info = iter.parse_gps_info().ok().flatten();
    let exif: Exif = iter.into();

    let mut data = ExifData {
        make: exif.get_by_ifd_tag_code(0, TAG_MAKE).and_then(entry_to_string),
        model: exif.get_by_ifd_tag_code(0, TAG_MODEL).and_then(entry_to_string),
        software: exif.get_by_ifd_tag_code(0, TAG_SOFTWARE).and_then(entry_to_string),
        date_time: exif
            .get_by_ifd_tag_code(0, TAG_DATE_TIME)
            .and_then(entry_to_datetime),
        date_time_original: exif.get(ExifTag::DateTimeOriginal).and_then(entry_to_datetime),
        date_time_digitized: exif.get(ExifTag::CreateDate).and_then(entry_to_datetime),
        ..ExifData::default()
    };

    // GPS via nom-exif's built-in parser
    if let Some(gps) = gps_info {
        data.has_gps = true;
        data.gps_latitude = Some(latlng_to_decimal(&gps.latitude, gps.latitude_ref));
        data.gps_longitude = Some(latlng_to_decimal(&gps.longitude, gps.longitude_ref));
    }

    Ok(data)
}

/// Convert an EntryValue to an Option<String>.
fn entry_to_string(val: &EntryValue) -> Option<String> {
    let s = val.to_string();
    let s = s.trim().trim_matches('"').to_string();
    if s.is_empty() { None } else { Some(s) }
}

/// Date tags in EXIF's own `YYYY:MM:DD HH:MM:SS` form, whichever way
/// nom-exif chose to render them.
fn entry_to_datetime(val: &EntryValue) -> Option<String> {
    entry_to_string(val).map(|s| normalize_datetime(&s))
}

fn normalize_datetime(s: &str) -> String {
    let parsed = NaiveDateTime::parse_from_str(s, EXIF_DATETIME_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()))
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok());
    match parsed {
        Some(dt) => dt.format(EXIF_DATETIME_FORMAT).to_string(),
        None => s.to_string(),
    }
}

/// Convert a nom-exif LatLng (3 URationals: deg, min, sec) to decimal degrees.
fn latlng_to_decimal(latlng: &LatLng, reference: char) -> f64 {
    let degrees = latlng.0.0 as f64 / latlng.0.1 as f64;
    let minutes = latlng.1.0 as f64 / latlng.1.1 as f64;
    let seconds = latlng.2.0 as f64 / latlng.2.1 as f64;

    let mut coord = degrees + minutes / 60.0 + seconds / 3600.0;

    if reference == 'S' || reference == 'W' {
        coord = -coord;
    }

    coord
}
