//! Object detection over a ranging sweep.
//!
//! An object shows up as a contiguous run of angles whose distances are
//! close to the sensor and close to each other.  [`ClusterDetector`] walks
//! the sweep once from 0° to 179°:
//!
//! 1. a reading extends the current run when it is present, within
//!    `display_radius`, and within `max_gap` of the previous member;
//! 2. runs shorter than `min_run_size` are dropped;
//! 3. `beam_trim_degrees / 2` readings are trimmed from each end of a kept
//!    run, since the ultrasonic cone smears objects sideways;
//! 4. the trimmed run is summarised as a [`Cluster`] arc.
//!
//! Clustering only labels; the raw points stay available through
//! [`ScanSnapshot::points`].
//!
//! # Example
//!
//! ```rust
//! use sweep_perception::cluster::{ClusterDetector, ClusterParams};
//! use sweep_perception::scan_buffer::ScanBuffer;
//!
//! let mut buf = ScanBuffer::new();
//! for angle in 10..70 {
//!     buf.set(angle, 40.0);
//! }
//! let detector = ClusterDetector::new(ClusterParams::default());
//! let clusters = detector.detect(&buf.snapshot());
//! assert_eq!(clusters.len(), 1);
//! assert_eq!(clusters[0].angles, 25..=54);
//! assert_eq!(clusters[0].center_angle, 39.5);
//! ```

use std::f64::consts::PI;

use sweep_types::{ANGLE_COUNT, Cluster, PipelineParams};

use crate::scan_buffer::ScanSnapshot;

/// Tunables of [`ClusterDetector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
    pub display_radius: f64,
    pub max_gap: f64,
    pub min_run_size: usize,
    pub beam_trim_degrees: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        PipelineParams::default().into()
    }
}

impl From<PipelineParams> for ClusterParams {
    fn from(p: PipelineParams) -> Self {
        Self {
            display_radius: p.display_radius,
            max_gap: p.max_gap,
            min_run_size: p.min_run_size,
            beam_trim_degrees: p.beam_trim_degrees,
        }
    }
}

/// Angles `start..=end` form a run; `last` is the distance at `end`.
#[derive(Debug, Clone, Copy)]
struct Run {
    start: usize,
    end: usize,
    last: f64,
}

/// Turns a ranging snapshot into object arcs, left to right.
#[derive(Debug, Clone)]
pub struct ClusterDetector {
    params: ClusterParams,
}

impl ClusterDetector {
    pub fn new(params: ClusterParams) -> Self {
        Self { params }
    }

    /// Detect clusters in angle order.  Pure: the same snapshot always yields
    /// the same clusters.
    pub fn detect(&self, snapshot: &ScanSnapshot) -> Vec<Cluster> {
        let mut clusters = Vec::new();
        let mut run: Option<Run> = None;

        for angle in 0..ANGLE_COUNT {
            match snapshot.get(angle) {
                Some(d) if d <= self.params.display_radius => match run {
                    Some(r) if (d - r.last).abs() <= self.params.max_gap => {
                        run = Some(Run {
                            end: angle,
                            last: d,
                            ..r
                        });
                    }
                    _ => {
                        self.close(run.take(), snapshot, &mut clusters);
                        run = Some(Run {
                            start: angle,
                            end: angle,
                            last: d,
                        });
                    }
                },
                // Missing or beyond the display radius.
                _ => self.close(run.take(), snapshot, &mut clusters),
            }
        }
        self.close(run, snapshot, &mut clusters);
        clusters
    }

    fn close(&self, run: Option<Run>, snapshot: &ScanSnapshot, out: &mut Vec<Cluster>) {
        let Some(run) = run else {
            return;
        };
        let len = run.end - run.start + 1;
        if len < self.params.min_run_size {
            return;
        }
        let trim = self.params.beam_trim_degrees / 2;
        if len <= 2 * trim {
            return;
        }
        let first = run.start + trim;
        let last = run.end - trim;
        let count = (last - first + 1) as f64;

        let angle_sum: usize = (first..=last).sum();
        let distance_sum: f64 = (first..=last).filter_map(|a| snapshot.get(a)).sum();

        let mean_distance = distance_sum / count;
        let angular_width = (last - first) as f64;
        out.push(Cluster {
            angles: first..=last,
            center_angle: angle_sum as f64 / count,
            mean_distance,
            angular_width,
            arc_length: 2.0 * PI * mean_distance * (angular_width / 360.0),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan_buffer::ScanBuffer;

    fn params(min_run_size: usize, beam_trim_degrees: usize) -> ClusterParams {
        ClusterParams {
            display_radius: 100.0,
            max_gap: 10.0,
            min_run_size,
            beam_trim_degrees,
        }
    }

    fn fill(buf: &mut ScanBuffer, angles: std::ops::Range<usize>, d: f64) {
        for a in angles {
            buf.set(a, d);
        }
    }

    #[test]
    fn trims_beam_spread_and_summarises_arc() {
        let mut buf = ScanBuffer::new();
        fill(&mut buf, 10..70, 40.0);
        let clusters = ClusterDetector::new(params(30, 30)).detect(&buf.snapshot());

        assert_eq!(clusters.len(), 1);
        let c = &clusters[0];
        assert_eq!(c.angles, 25..=54);
        assert!((c.center_angle - 39.5).abs() < 1e-9);
        assert!((c.mean_distance - 40.0).abs() < 1e-9);
        assert!((c.angular_width - 29.0).abs() < 1e-9);
        let expected = 2.0 * PI * 40.0 * 29.0 / 360.0;
        assert!((c.arc_length - expected).abs() < 1e-9);
        assert!((c.arc_length - 20.25).abs() < 0.05);
    }

    #[test]
    fn short_runs_are_not_reported() {
        let mut buf = ScanBuffer::new();
        fill(&mut buf, 0..29, 40.0);
        assert!(ClusterDetector::new(params(30, 0)).detect(&buf.snapshot()).is_empty());
    }

    #[test]
    fn missing_sample_splits_run() {
        let mut buf = ScanBuffer::new();
        fill(&mut buf, 0..40, 40.0);
        fill(&mut buf, 41..90, 40.0);
        let clusters = ClusterDetector::new(params(30, 0)).detect(&buf.snapshot());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].angles, 0..=39);
        assert_eq!(clusters[1].angles, 41..=89);
    }

    #[test]
    fn distance_jump_starts_new_run_at_breaking_sample() {
        let mut buf = ScanBuffer::new();
        fill(&mut buf, 0..35, 20.0);
        fill(&mut buf, 35..70, 60.0);
        let clusters = ClusterDetector::new(params(30, 0)).detect(&buf.snapshot());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].angles, 0..=34);
        assert_eq!(clusters[1].angles, 35..=69);
        assert!((clusters[1].mean_distance - 60.0).abs() < 1e-9);
    }

    #[test]
    fn gradual_drift_stays_in_one_run() {
        let mut buf = ScanBuffer::new();
        for a in 0..60 {
            buf.set(a, 20.0 + a as f64 * 0.5);
        }
        let clusters = ClusterDetector::new(params(30, 0)).detect(&buf.snapshot());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].angles, 0..=59);
    }

    #[test]
    fn readings_beyond_radius_close_run() {
        let mut buf = ScanBuffer::new();
        fill(&mut buf, 0..40, 95.0);
        buf.set(40, 150.0);
        fill(&mut buf, 41..80, 95.0);
        let clusters = ClusterDetector::new(params(30, 0)).detect(&buf.snapshot());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].angles, 0..=39);
        assert_eq!(clusters[1].angles, 41..=79);
    }

    #[test]
    fn trimming_to_nothing_discards_run() {
        let mut buf = ScanBuffer::new();
        fill(&mut buf, 0..30, 40.0);
        assert!(ClusterDetector::new(params(30, 30)).detect(&buf.snapshot()).is_empty());

        fill(&mut buf, 30..31, 40.0);
        let clusters = ClusterDetector::new(params(30, 30)).detect(&buf.snapshot());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].angles, 15..=15);
        assert_eq!(clusters[0].angular_width, 0.0);
        assert_eq!(clusters[0].arc_length, 0.0);
    }

    #[test]
    fn run_reaching_last_angle_is_closed() {
        let mut buf = ScanBuffer::new();
        fill(&mut buf, 140..180, 30.0);
        let clusters = ClusterDetector::new(params(30, 0)).detect(&buf.snapshot());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].angles, 140..=179);
    }

    #[test]
    fn output_is_left_to_right_and_idempotent() {
        let mut buf = ScanBuffer::new();
        fill(&mut buf, 100..140, 30.0);
        fill(&mut buf, 10..50, 70.0);
        let detector = ClusterDetector::new(params(30, 10));
        let snap = buf.snapshot();
        let first = detector.detect(&snap);
        assert_eq!(first.len(), 2);
        assert!(first[0].center_angle < first[1].center_angle);
        assert_eq!(first, detector.detect(&snap));
    }

    #[test]
    fn empty_snapshot_has_no_clusters() {
        let detector = ClusterDetector::new(ClusterParams::default());
        assert!(detector.detect(&ScanSnapshot::empty()).is_empty());
    }
}
