//! Output filenames for washed images.
//!
//! Washed copies are named `{prefix}{YYYYmmddHHMMSS}{.ext}`, e.g.
//! `washer20240601123045.jpg`. The extension is carried over from the input
//! exactly as written.

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Extensions accepted for washing.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Whether a filename ends in an allowed extension (case-insensitive).
///
/// Only the text after the last `.` counts; names without a dot are rejected.
pub fn is_allowed(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Build `{prefix}{timestamp}{.ext}`. `extension` is used verbatim, without a leading dot.
pub fn washed_filename(prefix: &str, extension: &str, now: NaiveDateTime) -> String {
    let stamp = now.format(TIMESTAMP_FORMAT);
    if extension.is_empty() {
        format!("{prefix}{stamp}")
    } else {
        format!("{prefix}{stamp}.{extension}")
    }
}

/// A path in `dir` for a washed copy of `input` that does not exist yet.
///
/// Falls back to `-1`, `-2`, ... suffixes when several files land in the same second.
pub fn unique_output_path(dir: &Path, prefix: &str, input: &Path, now: NaiveDateTime) -> PathBuf {
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    let candidate = dir.join(washed_filename(prefix, extension, now));
    if !candidate.exists() {
        return candidate;
    }

    let stem = washed_filename(prefix, "", now);
    (1u32..)
        .map(|n| {
            let name = if extension.is_empty() {
                format!("{stem}-{n}")
            } else {
                format!("{stem}-{n}.{extension}")
            };
            dir.join(name)
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
