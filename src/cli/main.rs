use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

use image_washer::{config, exif, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "washer-cli",
    version,
    about = "Strip identifying metadata from JPEG, PNG and GIF images by re-encoding them"
)]
struct Cli {
    /// Image files or directories to wash
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Directory for washed copies (overrides output.dir from the config)
    #[arg(short, long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Display the identifying EXIF fields of the image(s) and exit
    #[arg(long = "show-exif")]
    show_exif: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    let images = pipeline::collect_images(&cli.paths);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }

    if cli.show_exif {
        for image_path in &images {
            print_exif(image_path)?;
        }
        return Ok(());
    }

    let config = config::Config::load(cli.config.as_deref())?;
    let out_dir = cli
        .out_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.dir));

    log::info!(
        "Found {} image(s) to wash into {}",
        images.len(),
        out_dir.display()
    );

    let mut reports = Vec::new();
    let total = images.len();

    for (i, image_path) in images.iter().enumerate() {
        log::info!("[{}/{}] Washing: {}", i + 1, total, image_path.display());

        let report = pipeline::wash_to_dir(image_path, &out_dir, &config);
        match (&report.output, &report.error) {
            (_, Some(err)) => log::error!("  Error: {err}"),
            (Some(out), None) => log::info!("  Wrote: {}", out.display()),
            (None, None) => {}
        }

        reports.push(report);
    }

    if cli.json {
        let json_results: Vec<serde_json::Value> = reports
            .iter()
            .map(|r| {
                serde_json::json!({
                    "path": r.input.display().to_string(),
                    "kind": r.kind.map(|k| k.name()),
                    "output": r.output.as_ref().map(|p| p.display().to_string()),
                    "error": r.error,
                })
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&json_results)?);
    }

    let success = reports.iter().filter(|r| r.succeeded()).count();
    let failed = total - success;
    log::info!("Done: {success} succeeded, {failed} failed out of {total} images");

    Ok(())
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Print the identifying EXIF fields of a file, organized by section.
fn print_exif(path: &Path) -> Result<()> {
    let data = exif::read_exif(path)?;

    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    let camera_fields = [
        ("Make", data.make.as_deref()),
        ("Model", data.model.as_deref()),
        ("Software", data.software.as_deref()),
    ];
    print_section("Camera / Device", &camera_fields);

    let time_fields = [
        ("DateTime", data.date_time.as_deref()),
        ("DateTimeOriginal", data.date_time_original.as_deref()),
        ("DateTimeDigitized", data.date_time_digitized.as_deref()),
    ];
    print_section("Timestamps", &time_fields);

    if data.has_gps {
        println!("  {BOLD}GPS{RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        if let Some(lat) = data.gps_latitude {
            print_row("GPSLatitude", &format!("{lat:.6}"));
        }
        if let Some(lon) = data.gps_longitude {
            print_row("GPSLongitude", &format!("{lon:.6}"));
        }
        println!();
    }

    if data.is_empty() {
        println!("  {DIM}(no EXIF metadata found){RESET}");
        println!();
    }

    Ok(())
}

fn print_section(title: &str, fields: &[(&str, Option<&str>)]) {
    if fields.iter().all(|(_, v)| v.is_none()) {
        return;
    }
    println!("  {BOLD}{title}{RESET}");
    println!("  {DIM}{}{RESET}", "─".repeat(70));
    for (tag, val) in fields {
        if let Some(v) = val {
            print_row(tag, v);
        }
    }
    println!();
}

/// Print a single row in the EXIF display table.
fn print_row(tag: &str, val: &str) {
    println!("  {tag:<22} : {val}");
}
