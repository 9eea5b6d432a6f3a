//! Configuration vault – reads/writes `~/.sweep/config.toml`.
//!
//! ```toml
//! mode = "combined"
//! tick_ms = 200
//! read_timeout_ms = 1000
//!
//! [params]
//! min_run_size = 20
//! display_radius = 80.0
//! ```
//!
//! Only the `[params]` keys that are present override the mode's defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use sweep_types::{PipelineParams, ScanMode, SweepError};

/// Persisted user configuration stored in `~/.sweep/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Scan mode to run when `--mode` is not given.
    #[serde(default)]
    pub mode: ScanMode,

    /// Report interval in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Longest wait for one input line before re-checking for shutdown.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Per-key overrides of the mode's pipeline tunables.
    #[serde(default, skip_serializing_if = "ParamOverrides::is_empty")]
    pub params: ParamOverrides,
}

fn default_tick_ms() -> u64 {
    200
}
fn default_read_timeout_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ScanMode::default(),
            tick_ms: default_tick_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            params: ParamOverrides::default(),
        }
    }
}

impl Config {
    /// The mode's default tunables with the `[params]` overrides applied.
    pub fn pipeline_params(&self) -> PipelineParams {
        self.params.apply(self.mode.params())
    }

    /// Reject tunables the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), SweepError> {
        let params = self.pipeline_params();
        if params.tolerance.is_nan() || params.tolerance < 0.0 {
            return Err(SweepError::Config(format!(
                "tolerance must be non-negative, got {}",
                params.tolerance
            )));
        }
        if params.calibration_step.is_nan() || params.calibration_step <= 0.0 {
            return Err(SweepError::Config(format!(
                "calibration_step must be positive, got {}",
                params.calibration_step
            )));
        }
        Ok(())
    }
}

/// Optional replacements for individual [`PipelineParams`] fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_run_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_gap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beam_trim_degrees: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_capacity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_merge_degrees: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration_step: Option<f64>,
}

impl ParamOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, base: PipelineParams) -> PipelineParams {
        PipelineParams {
            capacity: self.capacity.unwrap_or(base.capacity),
            tolerance: self.tolerance.unwrap_or(base.tolerance),
            min_run_size: self.min_run_size.unwrap_or(base.min_run_size),
            max_gap: self.max_gap.unwrap_or(base.max_gap),
            beam_trim_degrees: self.beam_trim_degrees.unwrap_or(base.beam_trim_degrees),
            display_radius: self.display_radius.unwrap_or(base.display_radius),
            light_capacity: self.light_capacity.unwrap_or(base.light_capacity),
            light_merge_degrees: self.light_merge_degrees.unwrap_or(base.light_merge_degrees),
            calibration_step: self.calibration_step.unwrap_or(base.calibration_step),
        }
    }
}

/// Return the path to `~/.sweep/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".sweep").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, SweepError> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, SweepError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        SweepError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| SweepError::Config(format!("failed to parse {}: {e}", path.display())))?;
    cfg.validate()?;
    Ok(Some(cfg))
}

/// Apply `SWEEP_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SWEEP_MODE` | `mode` |
/// | `SWEEP_TICK_MS` | `tick_ms` |
/// | `SWEEP_READ_TIMEOUT_MS` | `read_timeout_ms` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SWEEP_MODE")
        && let Ok(mode) = v.parse::<ScanMode>()
    {
        cfg.mode = mode;
    }
    if let Ok(v) = std::env::var("SWEEP_TICK_MS")
        && let Ok(ms) = v.trim().parse::<u64>()
        && ms > 0
    {
        cfg.tick_ms = ms;
    }
    if let Ok(v) = std::env::var("SWEEP_READ_TIMEOUT_MS")
        && let Ok(ms) = v.trim().parse::<u64>()
        && ms > 0
    {
        cfg.read_timeout_ms = ms;
    }
}

/// Save the config to disk, creating `~/.sweep/` if necessary.
pub fn save(cfg: &Config) -> Result<(), SweepError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), SweepError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            SweepError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| SweepError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| SweepError::Config(format!("failed to write {}: {e}", path.display())))
}
