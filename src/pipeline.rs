use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, ImageFormat};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::{Config, WashConfig};
use crate::exif;
use crate::frames;
use crate::naming;

/// Everything that can stop a wash. Collapsed to `false` by [`wash`].
#[derive(Error, Debug)]
pub enum WashError {
    #[error("unsupported file type: {}", .0.display())]
    Unsupported(PathBuf),
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {} as {kind}", .path.display())]
    Decode {
        path: PathBuf,
        kind: ImageKind,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode image")]
    Encode(#[from] image::ImageError),
    #[error("failed to encode GIF")]
    Gif(#[from] gif::EncodingError),
    #[error("failed to attach EXIF: {0}")]
    Exif(String),
    #[error("GIF contains no frames")]
    EmptyAnimation,
    #[error("GIF canvas {width}x{height} exceeds 65535 pixels per side")]
    FrameTooLarge { width: u32, height: u32 },
    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("codec panicked: {0}")]
    Panicked(String),
}

/// The re-encoding strategy for a file, chosen from its extension alone.
///
/// - **Jpeg**: re-encoded lossy with a synthetic EXIF block.
/// - **Png**: re-encoded losslessly, ancillary chunks dropped.
/// - **Gif**: every frame re-encoded, looping forever, disposed to background.
///
/// # Example
///
/// ```rust
/// use image_washer::pipeline::ImageKind;
/// use std::path::Path;
///
/// assert_eq!(ImageKind::from_path(Path::new("IMG_0001.JPG")), Some(ImageKind::Jpeg));
/// assert_eq!(ImageKind::from_path(Path::new("anim.gif")), Some(ImageKind::Gif));
/// assert_eq!(ImageKind::from_path(Path::new("notes.txt")), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
}

impl ImageKind {
    /// Determine the image kind from a file path extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// The decoder format a file of this kind is forced through.
    pub fn format(&self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Gif => ImageFormat::Gif,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Gif => "GIF",
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Wash `input` into `output` with default settings.
///
/// Returns `true` when a washed file was written. Every failure, including
/// an unsupported extension, is logged and reported as `false`.
///
/// ```rust,no_run
/// use image_washer::pipeline::wash;
/// use std::path::Path;
///
/// if !wash(Path::new("uploads/temp.jpg"), Path::new("washed/washer20240601123045.jpg")) {
///     eprintln!("could not wash image");
/// }
/// ```
pub fn wash(input: &Path, output: &Path) -> bool {
    wash_with(input, output, &WashConfig::default())
}

/// [`wash`] with explicit encoder settings.
pub fn wash_with(input: &Path, output: &Path, settings: &WashConfig) -> bool {
    match try_wash(input, output, settings) {
        Ok(kind) => {
            log::info!("Washed {kind}: {} -> {}", input.display(), output.display());
            true
        }
        Err(WashError::Unsupported(path)) => {
            log::warn!("Skipping unsupported file: {}", path.display());
            false
        }
        Err(e) => {
            log::error!("Error washing image {}: {:#}", input.display(), anyhow::Error::new(e));
            false
        }
    }
}

/// Wash `input` into `output`, reporting the reason on failure.
///
/// Dispatch is by extension only; content is never sniffed, so a file whose
/// extension lies fails to decode. Codec panics are caught and returned as
/// [`WashError::Panicked`].
pub fn try_wash(input: &Path, output: &Path, settings: &WashConfig) -> Result<ImageKind, WashError> {
    let kind = ImageKind::from_path(input).ok_or_else(|| WashError::Unsupported(input.to_path_buf()))?;

    guard_panics(|| wash_kind(kind, input, output, settings)).map(|()| kind)
}

/// Run `f`, turning a panic into [`WashError::Panicked`] without printing it to stderr.
fn guard_panics<T>(f: impl FnOnce() -> Result<T, WashError>) -> Result<T, WashError> {
    let prev_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    panic::set_hook(prev_hook);

    outcome.unwrap_or_else(|payload| {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(WashError::Panicked(msg))
    })
}

fn wash_kind(kind: ImageKind, input: &Path, output: &Path, settings: &WashConfig) -> Result<(), WashError> {
    let bytes = std::fs::read(input).map_err(|source| WashError::Read {
        path: input.to_path_buf(),
        source,
    })?;
    log::debug!("Read {} bytes from {}", bytes.len(), input.display());

    let washed = match kind {
        ImageKind::Jpeg => wash_jpeg(input, &bytes, settings)?,
        ImageKind::Png => wash_png(input, &bytes)?,
        ImageKind::Gif => wash_gif(input, &bytes, settings)?,
    };

    std::fs::write(output, &washed).map_err(|source| WashError::Write {
        path: output.to_path_buf(),
        source,
    })?;
    log::debug!("Wrote {} bytes to {}", washed.len(), output.display());
    Ok(())
}

fn decode_still(input: &Path, bytes: &[u8], kind: ImageKind) -> Result<DynamicImage, WashError> {
    image::load_from_memory_with_format(bytes, kind.format()).map_err(|source| WashError::Decode {
        path: input.to_path_buf(),
        kind,
        source,
    })
}

/// Re-encode at `settings.jpeg_quality` with a freshly synthesized EXIF block.
/// The source's own EXIF is never parsed.
fn wash_jpeg(input: &Path, bytes: &[u8], settings: &WashConfig) -> Result<Vec<u8>, WashError> {
    let img = decode_still(input, bytes, ImageKind::Jpeg)?;

    // baseline JPEG carries 8-bit gray or RGB only
    let img = match img.color() {
        ColorType::L8 | ColorType::Rgb8 => img,
        _ => DynamicImage::ImageRgb8(img.to_rgb8()),
    };

    let metadata = exif::synthesize();
    log::debug!(
        "Synthetic EXIF: {} / {} @ {}",
        metadata.make,
        metadata.model,
        metadata.timestamp()
    );

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, settings.jpeg_quality).write_image(
        img.as_bytes(),
        img.width(),
        img.height(),
        img.color().into(),
    )?;

    let tiff = metadata
        .to_exif_block()
        .map_err(|e| WashError::Exif(format!("{e:#}")))?;
    exif::attach_exif(encoded, tiff).map_err(|e| WashError::Exif(format!("{e:#}")))
}

/// Lossless re-encode; text, time and EXIF chunks are not carried over.
fn wash_png(input: &Path, bytes: &[u8]) -> Result<Vec<u8>, WashError> {
    let img = decode_still(input, bytes, ImageKind::Png)?;

    let mut encoded = Vec::new();
    PngEncoder::new(&mut encoded).write_image(
        img.as_bytes(),
        img.width(),
        img.height(),
        img.color().into(),
    )?;
    Ok(encoded)
}

fn wash_gif(input: &Path, bytes: &[u8], settings: &WashConfig) -> Result<Vec<u8>, WashError> {
    let animation = frames::decode_gif(bytes).map_err(|source| WashError::Decode {
        path: input.to_path_buf(),
        kind: ImageKind::Gif,
        source,
    })?;
    log::debug!(
        "Decoded {} GIF frame(s) at {}x{}",
        animation.len(),
        animation.width,
        animation.height
    );

    frames::encode_gif(&animation, settings.default_gif_delay_ms)
}

/// Outcome of washing one file into an output directory.
#[derive(Debug)]
pub struct WashReport {
    pub input: PathBuf,
    /// Where the washed copy was written (set only on success).
    pub output: Option<PathBuf>,
    pub kind: Option<ImageKind>,
    pub error: Option<String>,
}

impl WashReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Wash one file into `out_dir` under a generated `{prefix}{timestamp}.{ext}` name.
///
/// This is the caller side of [`wash`]: allow-list check, output directory,
/// collision-free naming.
///
/// ```rust,no_run
/// use image_washer::config::Config;
/// use image_washer::pipeline::wash_to_dir;
/// use std::path::Path;
///
/// let config = Config::default();
/// let report = wash_to_dir(Path::new("photo.jpg"), Path::new("washed"), &config);
/// match (&report.output, &report.error) {
///     (Some(out), _) => println!("Washed copy: {}", out.display()),
///     (None, Some(err)) => eprintln!("Failed: {err}"),
///     _ => {}
/// }
/// ```
pub fn wash_to_dir(input: &Path, out_dir: &Path, config: &Config) -> WashReport {
    let mut report = WashReport {
        input: input.to_path_buf(),
        output: None,
        kind: ImageKind::from_path(input),
        error: None,
    };

    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !naming::is_allowed(&file_name) {
        report.error = Some(format!("Not an allowed image type: {file_name}"));
        return report;
    }

    if let Err(e) = std::fs::create_dir_all(out_dir) {
        report.error = Some(format!(
            "Failed to create output directory {}: {e}",
            out_dir.display()
        ));
        return report;
    }

    let output = naming::unique_output_path(
        out_dir,
        &config.output.filename_prefix,
        input,
        Local::now().naive_local(),
    );

    match try_wash(input, &output, &config.wash) {
        Ok(kind) => {
            log::debug!("{} -> {}", input.display(), output.display());
            report.kind = Some(kind);
            report.output = Some(output);
        }
        Err(e) => {
            report.error = Some(format!("{:#}", anyhow::Error::new(e)));
        }
    }

    report
}

/// Collect washable image files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks). Only files with a JPEG, PNG or GIF
/// extension are included.
///
/// # Example
///
/// ```rust,no_run
/// use image_washer::pipeline::collect_images;
/// use std::path::PathBuf;
///
/// let images = collect_images(&[
///     PathBuf::from("photo.jpg"),       // single file
///     PathBuf::from("./uploads/"),       // entire directory
/// ]);
/// println!("Found {} images", images.len());
/// ```
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_image(p) {
                    images.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

/// Check if a file has a washable image extension.
fn is_supported_image(path: &Path) -> bool {
    ImageKind::from_path(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    fn write_png(path: &Path) {
        let img = RgbImage::from_pixel(6, 4, Rgb([10, 20, 30]));
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    // ── ImageKind::from_path ──────────────────────────────────────────

    #[test]
    fn image_kind_jpeg() {
        assert_eq!(ImageKind::from_path(Path::new("photo.jpg")), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_path(Path::new("photo.jpeg")), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_path(Path::new("PHOTO.JPG")), Some(ImageKind::Jpeg));
    }

    #[test]
    fn image_kind_png() {
        assert_eq!(ImageKind::from_path(Path::new("image.png")), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_path(Path::new("IMAGE.PNG")), Some(ImageKind::Png));
    }

    #[test]
    fn image_kind_gif() {
        assert_eq!(ImageKind::from_path(Path::new("anim.gif")), Some(ImageKind::Gif));
        assert_eq!(ImageKind::from_path(Path::new("ANIM.GiF")), Some(ImageKind::Gif));
    }

    #[test]
    fn image_kind_unsupported() {
        assert_eq!(ImageKind::from_path(Path::new("doc.txt")), None);
        assert_eq!(ImageKind::from_path(Path::new("photo.webp")), None);
        assert_eq!(ImageKind::from_path(Path::new("photo.tiff")), None);
        assert_eq!(ImageKind::from_path(Path::new("noext")), None);
        assert_eq!(ImageKind::from_path(Path::new("photo.jpg.txt")), None);
    }

    #[test]
    fn image_kind_format_and_name() {
        assert_eq!(ImageKind::Jpeg.format(), ImageFormat::Jpeg);
        assert_eq!(ImageKind::Gif.format(), ImageFormat::Gif);
        assert_eq!(ImageKind::Png.to_string(), "PNG");
    }

    // ── try_wash error taxonomy ──────────────────────────────────────

    #[test]
    fn unsupported_extension_never_reads_input() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.txt");
        // input does not even exist: the extension check comes first
        let err = try_wash(&dir.path().join("doc.txt"), &out, &WashConfig::default()).unwrap_err();
        assert!(matches!(err, WashError::Unsupported(_)));
        assert!(!out.exists());
    }

    #[test]
    fn missing_input_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = try_wash(
            &dir.path().join("gone.png"),
            &dir.path().join("out.png"),
            &WashConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, WashError::Read { .. }));
    }

    #[test]
    fn mismatched_content_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("really_png.jpg");
        write_png(&dir.path().join("src.png"));
        fs::copy(dir.path().join("src.png"), &input).unwrap();
        let out = dir.path().join("out.jpg");

        let err = try_wash(&input, &out, &WashConfig::default()).unwrap_err();
        assert!(matches!(err, WashError::Decode { kind: ImageKind::Jpeg, .. }));
        assert!(!out.exists());
    }

    #[test]
    fn garbage_gif_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("broken.gif");
        fs::write(&input, b"GIF89a\x01\x00").unwrap();

        let err = try_wash(&input, &dir.path().join("o.gif"), &WashConfig::default()).unwrap_err();
        assert!(matches!(err, WashError::Decode { kind: ImageKind::Gif, .. }));
    }

    #[test]
    fn unwritable_output_is_write_error() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.png");
        write_png(&input);
        let output = dir.path().join("no_such_dir").join("out.png");

        let err = try_wash(&input, &output, &WashConfig::default()).unwrap_err();
        assert!(matches!(err, WashError::Write { .. }));
        assert!(!wash(&input, &output));
    }

    #[test]
    fn wash_returns_true_for_png() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.png");
        write_png(&input);
        let output = dir.path().join("out.png");

        assert!(wash(&input, &output));
        assert!(output.exists());
    }

    #[test]
    fn panic_becomes_panicked_error() {
        let err = guard_panics::<()>(|| panic!("decoder exploded")).unwrap_err();
        assert!(matches!(err, WashError::Panicked(ref msg) if msg == "decoder exploded"));

        let width = 70_000;
        let err = guard_panics::<()>(|| panic!("canvas {width} too wide")).unwrap_err();
        assert!(matches!(err, WashError::Panicked(ref msg) if msg == "canvas 70000 too wide"));
    }

    #[test]
    fn guarded_result_passes_through() {
        assert_eq!(guard_panics(|| Ok(7)).unwrap(), 7);
        let err = guard_panics::<()>(|| Err(WashError::EmptyAnimation)).unwrap_err();
        assert!(matches!(err, WashError::EmptyAnimation));
    }

    // ── wash_to_dir ──────────────────────────────────────────────────

    #[test]
    fn wash_to_dir_names_output_with_prefix_and_extension() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("upload.PNG");
        write_png(&input);
        let out_dir = dir.path().join("washed");

        let report = wash_to_dir(&input, &out_dir, &Config::default());
        assert!(report.succeeded(), "{:?}", report.error);
        assert_eq!(report.kind, Some(ImageKind::Png));

        let output = report.output.unwrap();
        assert!(output.exists());
        assert_eq!(output.parent(), Some(out_dir.as_path()));
        let name = output.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("washer"));
        assert!(name.ends_with(".PNG"));
        // washer + 14 digit timestamp + .PNG
        assert_eq!(name.len(), "washer".len() + 14 + ".PNG".len());
    }

    #[test]
    fn wash_to_dir_does_not_overwrite_within_same_second() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.png");
        write_png(&input);
        let out_dir = dir.path().join("washed");

        let first = wash_to_dir(&input, &out_dir, &Config::default());
        let second = wash_to_dir(&input, &out_dir, &Config::default());
        assert!(first.succeeded() && second.succeeded());
        assert_ne!(first.output, second.output);
    }

    #[test]
    fn wash_to_dir_rejects_disallowed_name() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("doc.txt");
        fs::write(&input, b"hello").unwrap();
        let out_dir = dir.path().join("washed");

        let report = wash_to_dir(&input, &out_dir, &Config::default());
        assert!(!report.succeeded());
        assert!(report.output.is_none());
        assert!(!out_dir.exists());
    }

    #[test]
    fn wash_to_dir_reports_decode_failure() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("fake.jpg");
        fs::write(&input, b"definitely not a jpeg").unwrap();
        let out_dir = dir.path().join("washed");

        let report = wash_to_dir(&input, &out_dir, &Config::default());
        let err = report.error.unwrap();
        assert!(err.contains("failed to decode"), "{err}");
        assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 0);
    }

    // ── collect_images ───────────────────────────────────────────────

    #[test]
    fn collect_images_single_file() {
        let dir = TempDir::new().unwrap();
        let jpg = dir.path().join("test.jpg");
        fs::write(&jpg, b"fake").unwrap();

        let images = collect_images(&[jpg.clone()]);
        assert_eq!(images, vec![jpg]);
    }

    #[test]
    fn collect_images_skips_unsupported() {
        let dir = TempDir::new().unwrap();
        let txt = dir.path().join("readme.txt");
        fs::write(&txt, b"hello").unwrap();
        let webp = dir.path().join("photo.webp");
        fs::write(&webp, b"hello").unwrap();

        assert!(collect_images(&[txt, webp]).is_empty());
    }

    #[test]
    fn collect_images_directory_recursive() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();

        fs::write(dir.path().join("a.jpg"), b"fake").unwrap();
        fs::write(sub.join("b.png"), b"fake").unwrap();
        fs::write(sub.join("c.GIF"), b"fake").unwrap();
        fs::write(sub.join("d.txt"), b"fake").unwrap();

        let images = collect_images(&[dir.path().to_path_buf()]);
        assert_eq!(images.len(), 3);
    }

    #[test]
    fn collect_images_nonexistent_path() {
        let images = collect_images(&[PathBuf::from("/nonexistent/path")]);
        assert!(images.is_empty());
    }
}
