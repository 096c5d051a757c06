use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the image-washer library.
///
/// Controls how images are re-encoded and where washed copies are written.
///
/// # Loading
///
/// ```rust,no_run
/// use image_washer::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.wash.jpeg_quality = 90;
/// config.output.dir = "out".into();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Encoder settings applied to every wash.
    pub wash: WashConfig,
    /// Where washed files go and how they are named.
    pub output: OutputConfig,
}

/// Encoder settings for the washing engine.
///
/// # Example
///
/// ```rust
/// use image_washer::config::WashConfig;
///
/// let settings = WashConfig::default();
/// assert_eq!(settings.jpeg_quality, 95);
/// assert_eq!(settings.default_gif_delay_ms, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WashConfig {
    /// JPEG re-encode quality (1-100).
    pub jpeg_quality: u8,
    /// Frame duration used when a GIF frame carries no delay of its own.
    pub default_gif_delay_ms: u32,
}

/// Output naming configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory that receives washed files.
    pub dir: String,
    /// Prefix of generated filenames, followed by a `YYYYmmddHHMMSS` timestamp.
    pub filename_prefix: String,
}

impl Default for WashConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 95,
            default_gif_delay_ms: 100,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "washed".to_string(),
            filename_prefix: "washer".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wash: WashConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Resolve the config file path: `config.json` next to the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;

        if !(1..=100).contains(&config.wash.jpeg_quality) {
            anyhow::bail!(
                "jpeg_quality must be between 1 and 100, got {}",
                config.wash.jpeg_quality
            );
        }

        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }
}
