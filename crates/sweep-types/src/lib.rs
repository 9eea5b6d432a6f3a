//! `sweep-types` – shared vocabulary of the sweep-scan stack.
//!
//! Every other crate in the workspace speaks in these types: the scan
//! [`ScanMode`] and its tunable [`PipelineParams`], the detection outputs
//! ([`Cluster`], [`LightSource`], [`Readout`]), the session lifecycle
//! ([`SessionState`]) and the workspace-wide [`SweepError`].

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of angular slots in one sweep (angles `0..=179`).
pub const ANGLE_COUNT: usize = 180;

/// Echo time (µs) → distance (cm) factor for the ultrasonic ranger.
pub const US_TO_CM: f64 = 1.0 / 58.0;

/// Number of calibration points collected before light distances exist.
pub const CALIBRATION_POINTS: usize = 10;

/// Returns `Some(angle)` when `angle` is a valid sweep slot.
pub fn checked_angle(angle: i64) -> Option<usize> {
    usize::try_from(angle).ok().filter(|a| *a < ANGLE_COUNT)
}

// ────────────────────────────────────────────────────────────────────────────
// Scan modes and tunables
// ────────────────────────────────────────────────────────────────────────────

/// The scanning modes a session can run in.
///
/// Every mode drives the same pipeline; only its [`PipelineParams`] and the
/// set of active sensors differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    /// Ultrasonic sweep: object arcs from time-of-flight readings.
    #[default]
    Sonar,
    /// Ultrasonic readout at a single operator-selected angle.
    #[serde(alias = "angle")]
    AngleReadout,
    /// Photoresistor sweep: light sources from calibrated light readings.
    Light,
    /// Combined sweep: `angle:tof:light` lines feed both detectors.
    #[serde(alias = "combined")]
    ObjectAndLight,
}

impl ScanMode {
    /// Whether this mode needs the 10-point light calibration phase.
    pub fn needs_calibration(self) -> bool {
        matches!(self, ScanMode::Light | ScanMode::ObjectAndLight)
    }

    /// Default tunables for this mode.
    pub fn params(self) -> PipelineParams {
        let base = PipelineParams::default();
        match self {
            ScanMode::Sonar => base,
            ScanMode::AngleReadout => PipelineParams {
                capacity: 15,
                tolerance: 4.0,
                ..base
            },
            ScanMode::Light | ScanMode::ObjectAndLight => PipelineParams {
                capacity: 7,
                ..base
            },
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Sonar => write!(f, "sonar"),
            ScanMode::AngleReadout => write!(f, "angle"),
            ScanMode::Light => write!(f, "light"),
            ScanMode::ObjectAndLight => write!(f, "combined"),
        }
    }
}

impl FromStr for ScanMode {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sonar" | "1" => Ok(ScanMode::Sonar),
            "angle" | "angle-readout" | "2" => Ok(ScanMode::AngleReadout),
            "light" | "3" => Ok(ScanMode::Light),
            "combined" | "object-and-light" | "4" => Ok(ScanMode::ObjectAndLight),
            other => Err(SweepError::Config(format!("unknown scan mode '{other}'"))),
        }
    }
}

/// Tunable constants of the aggregation and detection pipeline.
///
/// Distances are in centimetres, angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    /// Samples per angle before the ranging batch is committed.
    pub capacity: usize,
    /// Robust-mean tolerance: samples within this of each other agree.
    pub tolerance: f64,
    /// Minimum run length for an object cluster.
    pub min_run_size: usize,
    /// Largest distance jump between neighbours inside one cluster.
    pub max_gap: f64,
    /// Beam spread trimmed from a cluster, half from each end.
    pub beam_trim_degrees: usize,
    /// Readings farther than this never join a cluster.
    pub display_radius: f64,
    /// Samples per angle before the light batch is committed.
    pub light_capacity: usize,
    /// Minima closer than this (circularly) belong to one light source.
    pub light_merge_degrees: usize,
    /// Distance step between consecutive calibration points.
    pub calibration_step: f64,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            capacity: 10,
            tolerance: 2.5,
            min_run_size: 30,
            max_gap: 10.0,
            beam_trim_degrees: 30,
            display_radius: 100.0,
            light_capacity: 7,
            light_merge_degrees: 20,
            calibration_step: 3.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Detection outputs
// ────────────────────────────────────────────────────────────────────────────

/// One detected object: a trimmed, contiguous run of close-range readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Angles covered by the trimmed run.
    pub angles: RangeInclusive<usize>,
    /// Mean of the member angles (degrees).
    pub center_angle: f64,
    /// Mean of the member distances (cm).
    pub mean_distance: f64,
    /// Last angle minus first angle (degrees).
    pub angular_width: f64,
    /// Arc length subtended at `mean_distance` (cm).
    pub arc_length: f64,
}

/// A light source: the closest point of one group of light minima.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSource {
    pub angle: usize,
    pub distance: f64,
}

/// Live robust distance at a single selected angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Readout {
    pub angle: usize,
    /// `None` until at least one sample has arrived for `angle`.
    pub distance: Option<f64>,
}

/// Progress of the light calibration phase (`count/10`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalibrationProgress {
    pub count: usize,
    pub complete: bool,
}

impl fmt::Display for CalibrationProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.count, CALIBRATION_POINTS)
    }
}

/// Lifecycle of one scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Calibrating,
    Measuring,
    Stopped,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type for the fallible edges of the stack (line parsing, config,
/// I/O). The aggregation core itself never fails; it degrades to "no data".
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SweepError {
    #[error("Malformed scan line: {0}")]
    Parse(String),

    #[error("Angle {0} is outside the 0..180 sweep")]
    OutOfRange(i64),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("I/O Error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SweepError {
    fn from(e: std::io::Error) -> Self {
        SweepError::Io(e.to_string())
    }
}
