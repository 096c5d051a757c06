//! # image-washer
//!
//! Metadata washing for uploaded images: every identifying trace an image
//! file carries about the device, software or moment that produced it is
//! stripped by decoding to pixels and re-encoding from scratch. JPEGs get a
//! fresh, randomly synthesized but internally consistent EXIF block in place of
//! the original.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use image_washer::pipeline::wash;
//! use std::path::Path;
//!
//! let ok = wash(Path::new("uploads/temp.jpg"), Path::new("washed/washer20240601123045.jpg"));
//! if !ok {
//!     eprintln!("could not wash image");
//! }
//! ```
//!
//! ## Batch Usage
//!
//! The caller side of a wash (allow-list, output directory, generated names)
//! lives in [`pipeline::wash_to_dir`]:
//!
//! ```rust,no_run
//! use image_washer::config::Config;
//! use image_washer::pipeline::{collect_images, wash_to_dir};
//! use std::path::{Path, PathBuf};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let out_dir = Path::new(&config.output.dir);
//!
//!     for path in collect_images(&[PathBuf::from("./uploads")]) {
//!         let report = wash_to_dir(&path, out_dir, &config);
//!         if let Some(ref err) = report.error {
//!             eprintln!("Error washing {}: {err}", path.display());
//!         } else if let Some(ref out) = report.output {
//!             println!("Washed: {} -> {}", path.display(), out.display());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | Wash Strategy |
//! |--------|---------------|
//! | JPEG (`.jpg`, `.jpeg`) | Lossy re-encode (quality 95) + synthetic EXIF (Make, Model, DateTime*) |
//! | PNG (`.png`) | Lossless re-encode, no ancillary chunks |
//! | GIF (`.gif`) | Every frame re-encoded, per-frame delays kept, infinite loop, background disposal |
//!
//! Dispatch is by file extension only.
//!
//! ## Modules
//!
//! - [`config`] — Configuration types and loading/saving
//! - [`exif`] — Synthetic EXIF generation, JPEG EXIF writing, EXIF inspection
//! - [`frames`] — GIF frame decoding and re-encoding
//! - [`naming`] — Upload allow-list and washed output filenames
//! - [`pipeline`] — Format dispatch, error taxonomy, batch helpers

pub mod config;
pub mod exif;
pub mod frames;
pub mod naming;
pub mod pipeline;
