//! Tool configuration module.
//!
//! Handles loading, validating, and merging `imgbatch.toml`. Stock defaults
//! are the base layer; a user file overrides any subset of keys; command-line
//! flags override both.
//!
//! ## Config File Location
//!
//! `imgbatch.toml` in the working directory is picked up automatically.
//! `--config PATH` points at any other file, which must then exist.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [defaults]
//! size_mode = "percent"     # "percent" or "pixels"
//! percent = 100             # 1-100
//! # target_width = 1280     # Pixel mode box; omit for no constraint
//! # target_height = 720
//! keep_aspect_ratio = true
//! quality = 80              # 1-100, ignored for PNG
//! format = "webp"           # "webp", "jpg" or "png"
//! background = "transparent"
//! remove_background = false
//! tolerance = 40            # 10-160
//!
//! [pipeline]
//! debounce_ms = 180         # Quiet period before an edit re-renders
//! max_items = 30            # Collection capacity
//!
//! [export]
//! pacing_ms = 120           # Delay between two exported files
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [defaults]
//! format = "jpg"
//! background = "white"
//! ```
//!
//! Unknown keys are rejected, so typos surface as errors instead of being
//! silently ignored.

use crate::controller::ControllerSettings;
use crate::item::ItemParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "imgbatch.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tool configuration loaded from `imgbatch.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Parameters given to every newly admitted image.
    pub defaults: ItemParams,
    /// Debounce and capacity.
    pub pipeline: PipelineConfig,
    /// Batch export pacing.
    pub export: ExportConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.defaults.percent) {
            return Err(ConfigError::Validation(
                "defaults.percent must be 1-100".into(),
            ));
        }
        if self.defaults.target_width == Some(0) || self.defaults.target_height == Some(0) {
            return Err(ConfigError::Validation(
                "defaults.target_width and target_height must be positive".into(),
            ));
        }
        if self.pipeline.max_items == 0 {
            return Err(ConfigError::Validation(
                "pipeline.max_items must be at least 1".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            debounce: Duration::from_millis(self.pipeline.debounce_ms),
            capacity: self.pipeline.max_items,
            defaults: self.defaults.clone(),
        }
    }

    pub fn export_pacing(&self) -> Duration {
        Duration::from_millis(self.export.pacing_ms)
    }
}

/// Debounce and capacity settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Quiet period after the last edit before an item re-renders.
    pub debounce_ms: u64,
    /// Maximum number of images held at once.
    pub max_items: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 180,
            max_items: crate::collection::MAX_ITEMS,
        }
    }
}

/// Batch export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Delay between two written files.
    pub pacing_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { pacing_ms: 120 }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel render workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective config.
///
/// An explicit path must exist. Without one, `imgbatch.toml` in `cwd` is
/// used when present and stock defaults otherwise.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<AppConfig, ConfigError> {
    let path: PathBuf = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("config file not found: {}", path.display()),
                )));
            }
            path.to_path_buf()
        }
        None => cwd.join(CONFIG_FILE_NAME),
    };
    let overlay = load_raw_config(&path)?;
    if overlay.is_some() {
        tracing::debug!(path = %path.display(), "loaded config");
    }
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `imgbatch.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgbatch Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# imgbatch reads ./imgbatch.toml, or the file given with --config.
# Command-line flags override anything set here.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Starting parameters for every loaded image
# ---------------------------------------------------------------------------
[defaults]
# "percent" scales both axes; "pixels" fits into target_width x target_height.
size_mode = "percent"

# Scale in percent (1-100). Images are never enlarged.
percent = 100

# Pixel-mode box. Omit an axis to leave it unconstrained.
# target_width = 1280
# target_height = 720

# In pixel mode, keep the original proportions inside the box.
keep_aspect_ratio = true

# Encoding quality (1 = smallest, 100 = best). Ignored for PNG.
quality = 80

# Output format: "webp", "jpg" or "png".
format = "webp"

# Background drawn behind transparent pixels: "transparent", a name
# ("white", "black", ...), "#rgb", "#rrggbb" or "rgb(r, g, b)".
# JPEG has no alpha; pick a solid color when exporting JPEG.
background = "transparent"

# Clear the border-connected background before compositing.
remove_background = false

# Color distance still counted as background (10-160).
tolerance = 40

# ---------------------------------------------------------------------------
# Pipeline
# ---------------------------------------------------------------------------
[pipeline]
# Quiet period after an edit before the image re-renders, in milliseconds.
debounce_ms = 180

# Maximum number of images loaded at once. Extra inputs are dropped.
max_items = 30

# ---------------------------------------------------------------------------
# Export
# ---------------------------------------------------------------------------
[export]
# Delay between two exported files, in milliseconds.
pacing_ms = 120

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel render workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::BackgroundColor;
    use crate::imaging::{OutputFormat, SizeMode};
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.defaults, ItemParams::default());
        assert_eq!(config.pipeline.debounce_ms, 180);
        assert_eq!(config.pipeline.max_items, 30);
        assert_eq!(config.export.pacing_ms, 120);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
[defaults]
format = "jpg"
background = "white"
"##;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.defaults.format, OutputFormat::Jpeg);
        assert_eq!(config.defaults.background, "#ffffff".parse::<BackgroundColor>().unwrap());
        // Defaults preserved
        assert_eq!(config.defaults.quality.value(), 80);
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn settings_derived_from_config() {
        let mut config = AppConfig::default();
        config.pipeline.debounce_ms = 50;
        config.pipeline.max_items = 5;
        config.export.pacing_ms = 0;
        let settings = config.controller_settings();
        assert_eq!(settings.debounce, Duration::from_millis(50));
        assert_eq!(settings.capacity, 5);
        assert_eq!(config.export_pacing(), Duration::ZERO);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(None, tmp.path()).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn load_config_reads_cwd_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"
[defaults]
size_mode = "pixels"
target_width = 640
remove_background = true

[export]
pacing_ms = 0
"#,
        )
        .unwrap();

        let config = load_config(None, tmp.path()).unwrap();
        assert_eq!(config.defaults.size_mode, SizeMode::Pixels);
        assert_eq!(config.defaults.target_width, Some(640));
        assert!(config.defaults.remove_background);
        assert_eq!(config.export.pacing_ms, 0);
        // Unspecified values should be defaults
        assert_eq!(config.defaults.background, BackgroundColor::Transparent);
        assert_eq!(config.pipeline.debounce_ms, 180);
    }

    #[test]
    fn load_config_explicit_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        fs::write(&path, "[pipeline]\nmax_items = 3\n").unwrap();
        let config = load_config(Some(&path), Path::new("/nonexistent")).unwrap();
        assert_eq!(config.pipeline.max_items, 3);
    }

    #[test]
    fn load_config_missing_explicit_path_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(Some(&tmp.path().join("nope.toml")), tmp.path());
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "this is not valid toml [[[").unwrap();
        let result = load_config(None, tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_rejects_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "[defaults]\nqualty = 50\n").unwrap();
        assert!(matches!(
            load_config(None, tmp.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_config_rejects_bad_color() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "[defaults]\nbackground = \"chartreuse-ish\"\n").unwrap();
        assert!(load_config(None, tmp.path()).is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_percent_range() {
        let mut config = AppConfig::default();
        config.defaults.percent = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("percent"));

        config.defaults.percent = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_capacity() {
        let mut config = AppConfig::default();
        config.pipeline.max_items = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_workers() {
        let mut config = AppConfig::default();
        config.processing.max_processes = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "[defaults]\npercent = 250\n").unwrap();
        let result = load_config(None, tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Merging
    // =========================================================================

    #[test]
    fn merge_overlay_keeps_unrelated_keys() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn stock_defaults_roundtrip() {
        let config: AppConfig = stock_defaults_value().try_into().unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config: AppConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = effective_threads(&ProcessingConfig::default());
        assert!(cores >= 1);
        let one = effective_threads(&ProcessingConfig {
            max_processes: Some(1),
        });
        assert_eq!(one, 1);
    }
}
