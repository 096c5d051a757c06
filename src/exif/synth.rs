use chrono::{Duration, Local, NaiveDateTime, SubsecRound};
use rand::Rng;

/// Furthest a synthetic capture time may lie in the past.
pub const MAX_AGE_DAYS: i64 = 365 * 5;

/// EXIF `DateTime*` tag format.
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Vendor families: each manufacturer string paired with the model names it ships.
///
/// Manufacturer strings are what the vendors themselves write into `Make`.
pub const CAMERA_CATALOG: &[(&str, &[&str])] = &[
    ("Canon", &["Canon EOS 5D Mark IV", "Canon EOS R5"]),
    ("NIKON CORPORATION", &["NIKON D850", "NIKON Z 7"]),
    ("SONY", &["ILCE-7M3", "ILCE-9"]),
    ("Apple", &["iPhone 14 Pro", "iPhone 13"]),
];

/// A fabricated capture event: one camera and one moment.
///
/// The EXIF `DateTime`, `DateTimeOriginal` and `DateTimeDigitized` tags are
/// all derived from the single `captured_at` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticMetadata {
    pub make: &'static str,
    pub model: &'static str,
    pub captured_at: NaiveDateTime,
}

impl SyntheticMetadata {
    /// Capture time as written into the primary `DateTime` tag.
    pub fn timestamp(&self) -> String {
        self.captured_at.format(EXIF_DATETIME_FORMAT).to_string()
    }

    /// Value of `DateTimeOriginal`.
    pub fn date_time_original(&self) -> String {
        self.timestamp()
    }

    /// Value of `DateTimeDigitized`.
    pub fn date_time_digitized(&self) -> String {
        self.timestamp()
    }
}

/// Synthesize metadata for a JPEG wash using the thread-local RNG and the local clock.
///
/// ```rust
/// use image_washer::exif::{synthesize, CAMERA_CATALOG};
///
/// let meta = synthesize();
/// let (_, models) = CAMERA_CATALOG.iter().find(|(make, _)| *make == meta.make).unwrap();
/// assert!(models.contains(&meta.model));
/// ```
pub fn synthesize() -> SyntheticMetadata {
    synthesize_with(&mut rand::thread_rng(), Local::now().naive_local())
}

/// Synthesize metadata from an explicit random source and reference time.
///
/// The capture time is `now` minus a uniform offset in `[0, MAX_AGE_DAYS]`,
/// truncated to whole seconds.
pub fn synthesize_with<R: Rng + ?Sized>(rng: &mut R, now: NaiveDateTime) -> SyntheticMetadata {
    let (make, models) = CAMERA_CATALOG[rng.gen_range(0..CAMERA_CATALOG.len())];
    let model = models[rng.gen_range(0..models.len())];

    let max_offset_secs = Duration::days(MAX_AGE_DAYS).num_seconds();
    let offset = Duration::seconds(rng.gen_range(0..=max_offset_secs));
    let captured_at = (now - offset).trunc_subsecs(0);

    SyntheticMetadata {
        make,
        model,
        captured_at,
    }
}
