//! Per-session scan state machine.
//!
//! A [`ScanSession`] owns every piece of mutable state for one scan:
//! the calibration table, the sample batchers, the angle-indexed buffers and
//! (in angle mode) the live readout.  It moves through
//!
//! ```text
//! Idle ──start──▶ Calibrating ──10 points──▶ Measuring ──stop──▶ Stopped
//!            └──────────(no light sensor)──────▶┘
//! ```
//!
//! Transport lines enter through [`ScanSession::ingest_line`]; reports leave
//! through [`ScanSession::report`], which never mutates the session.
//!
//! # Example
//!
//! ```rust
//! use sweep_runtime::session::ScanSession;
//! use sweep_types::{PipelineParams, ScanMode, SessionState};
//!
//! let params = PipelineParams { capacity: 2, ..ScanMode::Sonar.params() };
//! let mut session = ScanSession::new(ScanMode::Sonar, params);
//! session.start();
//! assert_eq!(session.state(), SessionState::Measuring);
//!
//! // 2320 µs of echo time is 40 cm.
//! assert!(session.ingest_line("45:2320"));
//! assert!(session.ingest_line("45:2320"));
//! assert_eq!(session.report().sonar.get(45), Some(40.0));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sweep_perception::{
    batcher::{Commit, Reduction, SampleBatcher},
    calibration::CalibrationTable,
    cluster::ClusterDetector,
    light::{self, LightSourceDetector},
    readout::AngleReadout,
    scan_buffer::{ScanBuffer, ScanSnapshot},
};
use sweep_types::{
    CalibrationProgress, Cluster, LightSource, PipelineParams, Readout, ScanMode, SessionState,
    SweepError, US_TO_CM, checked_angle,
};
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::parse::{ScanLine, parse_line};

/// Angle the readout points at until one is selected.
pub const DEFAULT_READOUT_ANGLE: usize = 90;

// ────────────────────────────────────────────────────────────────────────────
// Report
// ────────────────────────────────────────────────────────────────────────────

/// Everything a renderer needs to draw one frame of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub session_id: Uuid,
    pub taken_at: DateTime<Utc>,
    pub mode: ScanMode,
    pub state: SessionState,
    /// Committed ranging distances, for the raw-point display.
    pub sonar: ScanSnapshot,
    /// Calibrated light distances with saturation flags.
    pub light: ScanSnapshot,
    pub clusters: Vec<Cluster>,
    pub light_sources: Vec<LightSource>,
    pub readout: Option<Readout>,
    pub calibration: CalibrationProgress,
}

impl ScanReport {
    /// Closest detected light source, if any.
    pub fn nearest_light(&self) -> Option<&LightSource> {
        light::nearest(&self.light_sources)
    }
}

/// Owned copy of the session state a report is built from.
///
/// Taking a view is cheap and happens under the session lock; running the
/// detectors on it does not need the lock.
#[derive(Debug, Clone)]
pub struct SessionView {
    session_id: Uuid,
    mode: ScanMode,
    state: SessionState,
    sonar: ScanSnapshot,
    light: ScanSnapshot,
    readout: Option<Readout>,
    calibration: CalibrationProgress,
    clusters: ClusterDetector,
    lights: LightSourceDetector,
}

impl SessionView {
    /// Run the detectors and assemble the report.
    pub fn into_report(self) -> ScanReport {
        let clusters = self.clusters.detect(&self.sonar);
        let light_sources = self.lights.detect(&self.light);
        ScanReport {
            session_id: self.session_id,
            taken_at: Utc::now(),
            mode: self.mode,
            state: self.state,
            sonar: self.sonar,
            light: self.light,
            clusters,
            light_sources,
            readout: self.readout,
            calibration: self.calibration,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

/// State of one scan session.
#[derive(Debug)]
pub struct ScanSession {
    id: Uuid,
    mode: ScanMode,
    params: PipelineParams,
    state: SessionState,
    calibration: CalibrationTable,
    sonar_batcher: SampleBatcher,
    light_batcher: SampleBatcher,
    sonar: ScanBuffer,
    light_raw: ScanBuffer,
    light: ScanBuffer,
    readout: Option<AngleReadout>,
    clusters: ClusterDetector,
    lights: LightSourceDetector,
}

impl ScanSession {
    /// Create an idle session for `mode` tuned by `params`.
    pub fn new(mode: ScanMode, params: PipelineParams) -> Self {
        let readout = (mode == ScanMode::AngleReadout).then(|| {
            AngleReadout::new(DEFAULT_READOUT_ANGLE, params.capacity, params.tolerance)
        });
        Self {
            id: Uuid::new_v4(),
            mode,
            params,
            state: SessionState::Idle,
            calibration: CalibrationTable::new(params.calibration_step),
            sonar_batcher: sonar_batcher(&params),
            light_batcher: light_batcher(&params),
            sonar: ScanBuffer::new(),
            light_raw: ScanBuffer::new(),
            light: ScanBuffer::new(),
            readout,
            clusters: ClusterDetector::new(params.into()),
            lights: LightSourceDetector::new(params.light_merge_degrees),
        }
    }

    /// Session with the mode's default tunables.
    pub fn with_defaults(mode: ScanMode) -> Self {
        Self::new(mode, mode.params())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    /// Raw light means committed so far, calibrated or not.
    pub fn light_raw(&self) -> ScanSnapshot {
        self.light_raw.snapshot()
    }

    /// Begin a fresh scan: clear all data, mint a new id, and enter
    /// `Calibrating` (light modes) or `Measuring`.
    pub fn start(&mut self) {
        self.id = Uuid::new_v4();
        self.calibration = CalibrationTable::new(self.params.calibration_step);
        self.sonar_batcher.discard();
        self.light_batcher.discard();
        self.sonar.reset();
        self.light_raw.reset();
        self.light.reset();
        if let Some(readout) = self.readout.as_mut() {
            readout.clear();
        }
        self.state = if self.mode.needs_calibration() {
            SessionState::Calibrating
        } else {
            SessionState::Measuring
        };
        info!(session_id = %self.id, mode = %self.mode, state = ?self.state, "scan session started");
    }

    /// End the scan.  Partially filled batches are discarded, not flushed.
    pub fn stop(&mut self) {
        self.sonar_batcher.discard();
        self.light_batcher.discard();
        self.sonar.reset();
        self.light_raw.reset();
        self.light.reset();
        if let Some(readout) = self.readout.as_mut() {
            readout.clear();
        }
        self.state = SessionState::Stopped;
        info!(session_id = %self.id, "scan session stopped");
    }

    /// Commit whatever the batchers hold, e.g. when the input stream ends
    /// cleanly.  The session stays in its current state.
    pub fn flush(&mut self) {
        if let Some(commit) = self.sonar_batcher.flush() {
            self.commit_sonar(commit);
        }
        if let Some(commit) = self.light_batcher.flush() {
            self.commit_light(commit);
        }
    }

    /// Point the angle-mode readout at `angle`.
    ///
    /// A no-op in the sweeping modes.
    pub fn select_angle(&mut self, angle: i64) -> Result<(), SweepError> {
        let angle = checked_angle(angle).ok_or(SweepError::OutOfRange(angle))?;
        match self.readout.as_mut() {
            Some(readout) => readout.select(angle),
            None => debug!(angle, mode = %self.mode, "angle selection ignored outside angle mode"),
        }
        Ok(())
    }

    /// Feed one transport line.  Returns whether it was accepted; malformed
    /// or out-of-place lines are dropped.
    pub fn ingest_line(&mut self, line: &str) -> bool {
        if matches!(self.state, SessionState::Idle | SessionState::Stopped) {
            trace!(state = ?self.state, line, "line dropped: session not running");
            return false;
        }
        let parsed = match parse_line(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                trace!(error = %e, "line dropped");
                return false;
            }
        };

        let accepted = match (self.state, self.mode, parsed) {
            (SessionState::Calibrating, _, ScanLine::Pair(index, raw)) => self.calibrate(index, raw),
            (_, ScanMode::ObjectAndLight, ScanLine::Triple(angle, tof, raw)) => {
                self.measure_combined(angle, tof, raw)
            }
            (SessionState::Measuring, ScanMode::Sonar, ScanLine::Pair(angle, tof)) => {
                self.measure_sonar(angle, tof)
            }
            (SessionState::Measuring, ScanMode::AngleReadout, ScanLine::Pair(angle, tof)) => {
                self.measure_readout(angle, tof)
            }
            (SessionState::Measuring, ScanMode::Light, ScanLine::Pair(angle, raw)) => {
                self.measure_light(angle, raw)
            }
            _ => false,
        };
        if !accepted {
            trace!(line, mode = %self.mode, state = ?self.state, "line dropped: not applicable");
        }
        accepted
    }

    /// Owned copy of the reportable state.
    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id,
            mode: self.mode,
            state: self.state,
            sonar: self.sonar.snapshot(),
            light: self.light.snapshot(),
            readout: self.readout.as_ref().map(AngleReadout::readout),
            calibration: self.calibration.progress(),
            clusters: self.clusters.clone(),
            lights: self.lights.clone(),
        }
    }

    /// Current report.  Does not mutate the session.
    pub fn report(&self) -> ScanReport {
        self.view().into_report()
    }

    // ── Ingestion paths ─────────────────────────────────────────────────────

    fn calibrate(&mut self, index: i64, raw: i64) -> bool {
        let Ok(index) = usize::try_from(index) else {
            return false;
        };
        if index >= sweep_types::CALIBRATION_POINTS {
            return false;
        }
        if self.calibration.add(index, raw as f64) {
            self.state = SessionState::Measuring;
            info!(session_id = %self.id, "calibration complete, measuring");
            self.convert_stored_light();
        }
        true
    }

    fn measure_sonar(&mut self, angle: i64, tof: i64) -> bool {
        let (Some(angle), Some(distance)) = (checked_angle(angle), tof_to_cm(tof)) else {
            return false;
        };
        for commit in self.sonar_batcher.submit(angle, distance) {
            self.commit_sonar(commit);
        }
        true
    }

    fn measure_readout(&mut self, angle: i64, tof: i64) -> bool {
        let (Some(angle), Some(distance)) = (checked_angle(angle), tof_to_cm(tof)) else {
            return false;
        };
        self.readout
            .as_mut()
            .is_some_and(|readout| readout.push(angle, distance))
    }

    fn measure_light(&mut self, angle: i64, raw: i64) -> bool {
        let Some(angle) = checked_angle(angle) else {
            return false;
        };
        if raw < 0 {
            return false;
        }
        for commit in self.light_batcher.submit(angle, raw as f64) {
            self.commit_light(commit);
        }
        true
    }

    fn measure_combined(&mut self, angle: i64, tof: i64, raw: i64) -> bool {
        if checked_angle(angle).is_none() || tof_to_cm(tof).is_none() || raw < 0 {
            return false;
        }
        self.measure_sonar(angle, tof) && self.measure_light(angle, raw)
    }

    // ── Commits ─────────────────────────────────────────────────────────────

    fn commit_sonar(&mut self, commit: Commit) {
        self.sonar.set(commit.angle, commit.value);
    }

    fn commit_light(&mut self, commit: Commit) {
        // The device reports integer counts.
        let raw = commit.value.round();
        self.light_raw.set(commit.angle, raw);
        self.convert_light(commit.angle, raw);
    }

    fn convert_light(&mut self, angle: usize, raw: f64) {
        if !self.calibration.is_complete() {
            return;
        }
        if self.calibration.is_beyond_far_endpoint(raw) {
            self.light.set(angle, self.calibration.max_distance() + 1.0);
            self.light.set_saturated(angle, true);
        } else if let Some(distance) = self.calibration.value_to_distance(raw) {
            self.light.set(angle, distance);
            self.light.set_saturated(angle, false);
        } else {
            self.light.clear(angle);
        }
    }

    fn convert_stored_light(&mut self) {
        let stored: Vec<(usize, f64)> = self.light_raw.snapshot().points().collect();
        debug!(count = stored.len(), "converting stored light readings");
        for (angle, raw) in stored {
            self.convert_light(angle, raw);
        }
    }
}

fn tof_to_cm(tof: i64) -> Option<f64> {
    let distance = tof as f64 * US_TO_CM;
    (distance > 0.0).then_some(distance)
}

fn sonar_batcher(params: &PipelineParams) -> SampleBatcher {
    SampleBatcher::new(
        params.capacity,
        Reduction::RobustMean {
            tolerance: params.tolerance,
        },
    )
}

fn light_batcher(params: &PipelineParams) -> SampleBatcher {
    SampleBatcher::new(params.light_capacity, Reduction::Mean)
}
