//! EXIF synthesis, writing and reading.
//!
//! - [`synthesize`] / [`synthesize_with`] — fabricate a plausible capture event
//!   (vendor-consistent make/model, a timestamp within the past five years)
//! - [`SyntheticMetadata::to_exif_block`] and [`attach_exif`] — serialize that
//!   event and make it the only metadata of an encoded JPEG
//! - [`read_exif`] — inspect the identifying fields of any file, used to
//!   confirm what a wash left behind

mod reader;
mod synth;
mod writer;

pub use reader::{ExifData, read_exif};
pub use synth::{
    CAMERA_CATALOG, EXIF_DATETIME_FORMAT, MAX_AGE_DAYS, SyntheticMetadata, synthesize,
    synthesize_with,
};
pub use writer::attach_exif;
