//! Light-sensor calibration table.
//!
//! The photoresistor reports a raw count that varies monotonically with the
//! distance to a light emitter.  During the calibration phase the device
//! reports one raw value for each of [`CALIBRATION_POINTS`] known distances
//! (`step × (index + 1)`).  Once every slot is filled the table freezes and
//! answers raw → distance queries by binary search plus linear interpolation.
//!
//! # Example
//!
//! ```rust
//! use sweep_perception::calibration::CalibrationTable;
//!
//! let mut table = CalibrationTable::new(3.0);
//! for (i, raw) in (100..=550).step_by(50).enumerate() {
//!     table.add(i, raw as f64);
//! }
//! assert!(table.is_complete());
//! assert_eq!(table.value_to_distance(175.0), Some(7.5));
//! assert_eq!(table.value_to_distance(99.0), None);
//! ```

use sweep_types::{CALIBRATION_POINTS, CalibrationProgress};
use tracing::{debug, info};

const LAST: usize = CALIBRATION_POINTS - 1;

/// Immutable view taken when the last slot is filled.
#[derive(Debug, Clone, Copy)]
struct Frozen {
    vals: [f64; CALIBRATION_POINTS],
    increasing: bool,
}

/// Ten-point raw-value → distance mapping.
///
/// Writes before completion overwrite their slot; once complete the table is
/// frozen and further writes are ignored.
#[derive(Debug, Clone)]
pub struct CalibrationTable {
    step: f64,
    slots: [Option<f64>; CALIBRATION_POINTS],
    frozen: Option<Frozen>,
}

impl CalibrationTable {
    /// Create an empty table whose slot `i` sits at `step × (i + 1)`.
    pub fn new(step: f64) -> Self {
        Self {
            step,
            slots: [None; CALIBRATION_POINTS],
            frozen: None,
        }
    }

    /// Store `raw` for calibration slot `index`.
    ///
    /// Returns `true` when this write completed the table.  Indices outside
    /// `0..10` and writes to a frozen table are ignored.
    pub fn add(&mut self, index: usize, raw: f64) -> bool {
        if self.frozen.is_some() || index >= CALIBRATION_POINTS {
            return false;
        }
        self.slots[index] = Some(raw);
        debug!(index, raw, count = self.count(), "calibration point stored");

        if self.count() < CALIBRATION_POINTS {
            return false;
        }
        let mut vals = [0.0; CALIBRATION_POINTS];
        for (dst, src) in vals.iter_mut().zip(self.slots.iter()) {
            *dst = src.unwrap_or_default();
        }
        let increasing = vals[LAST] >= vals[0];
        self.frozen = Some(Frozen { vals, increasing });
        info!(increasing, "calibration complete");
        true
    }

    /// Number of filled slots.
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.frozen.is_some()
    }

    /// Calibration direction, known only once the table is complete.
    pub fn is_increasing(&self) -> Option<bool> {
        self.frozen.map(|f| f.increasing)
    }

    pub fn progress(&self) -> CalibrationProgress {
        CalibrationProgress {
            count: self.count(),
            complete: self.is_complete(),
        }
    }

    /// Raw value currently stored in slot `index`.
    pub fn raw_value(&self, index: usize) -> Option<f64> {
        self.slots.get(index).copied().flatten()
    }

    /// Physical distance assigned to slot `index`.
    pub fn fixed_distance(&self, index: usize) -> f64 {
        self.step * (index + 1) as f64
    }

    /// Distance of the farthest calibration slot.
    pub fn max_distance(&self) -> f64 {
        self.fixed_distance(LAST)
    }

    /// `true` when `raw` sits at or past the far endpoint of a complete
    /// table, i.e. beyond the maximum measurable distance.
    pub fn is_beyond_far_endpoint(&self, raw: f64) -> bool {
        match self.frozen {
            Some(Frozen { vals, increasing: true }) => raw >= vals[LAST],
            Some(Frozen { vals, increasing: false }) => raw <= vals[LAST],
            None => false,
        }
    }

    /// Convert a raw reading into a distance.
    ///
    /// Returns `None` while the table is incomplete or when `raw` lies
    /// outside the calibrated envelope.  An exact slot match returns that
    /// slot's distance; anything else is interpolated linearly between the
    /// bracketing pair.
    pub fn value_to_distance(&self, raw: f64) -> Option<f64> {
        let Frozen { vals, increasing } = self.frozen?;

        let (low, high) = if increasing {
            (vals[0], vals[LAST])
        } else {
            (vals[LAST], vals[0])
        };
        if !(low..=high).contains(&raw) {
            return None;
        }

        // Signed bounds: `hi` drops below zero when `raw` precedes slot 0.
        let mut lo: isize = 0;
        let mut hi: isize = LAST as isize;
        while lo <= hi {
            let mid = ((lo + hi) / 2) as usize;
            let vm = vals[mid];
            if vm == raw {
                return Some(self.fixed_distance(mid));
            }
            let raw_is_after = if increasing { vm < raw } else { vm > raw };
            if raw_is_after {
                lo = mid as isize + 1;
            } else {
                hi = mid as isize - 1;
            }
        }
        if hi < 0 || lo > LAST as isize {
            return None;
        }

        let (i, j) = (hi as usize, lo as usize);
        let (v1, d1) = (vals[i], self.fixed_distance(i));
        let (v2, d2) = (vals[j], self.fixed_distance(j));
        if v1 == v2 {
            return Some(d1);
        }
        Some(d1 + (d2 - d1) * (raw - v1) / (v2 - v1))
    }
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self::new(3.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INCREASING: [f64; 10] = [
        100.0, 150.0, 200.0, 250.0, 300.0, 350.0, 400.0, 450.0, 500.0, 550.0,
    ];

    fn table_from(vals: &[f64]) -> CalibrationTable {
        let mut table = CalibrationTable::new(3.0);
        for (i, v) in vals.iter().enumerate() {
            table.add(i, *v);
        }
        table
    }

    #[test]
    fn incomplete_table_is_unavailable() {
        let mut table = CalibrationTable::new(3.0);
        for i in 0..9 {
            assert!(!table.add(i, INCREASING[i]));
        }
        assert!(!table.is_complete());
        assert_eq!(table.is_increasing(), None);
        assert_eq!(table.value_to_distance(200.0), None);
        assert_eq!(table.progress(), CalibrationProgress { count: 9, complete: false });
    }

    #[test]
    fn last_write_completes_table() {
        let mut table = CalibrationTable::new(3.0);
        for i in 0..9 {
            table.add(i, INCREASING[i]);
        }
        assert!(table.add(9, INCREASING[9]));
        assert!(table.is_complete());
        assert_eq!(table.is_increasing(), Some(true));
    }

    #[test]
    fn interpolates_between_bracketing_slots() {
        let table = table_from(&INCREASING);
        let d = table.value_to_distance(175.0).unwrap();
        assert!((d - 7.5).abs() < 1e-9);
    }

    #[test]
    fn exact_slot_values_round_trip() {
        let table = table_from(&INCREASING);
        for (i, v) in INCREASING.iter().enumerate() {
            assert_eq!(table.value_to_distance(*v), Some(table.fixed_distance(i)));
        }
    }

    #[test]
    fn outside_envelope_is_unavailable() {
        let table = table_from(&INCREASING);
        assert_eq!(table.value_to_distance(99.9), None);
        assert_eq!(table.value_to_distance(550.1), None);
        assert_eq!(table.value_to_distance(f64::NAN), None);
    }

    #[test]
    fn monotonic_in_calibration_direction() {
        let table = table_from(&INCREASING);
        let mut prev = f64::NEG_INFINITY;
        let mut raw = 100.0;
        while raw <= 550.0 {
            let d = table.value_to_distance(raw).unwrap();
            assert!(d >= prev, "distance fell at raw={raw}");
            prev = d;
            raw += 3.7;
        }
    }

    #[test]
    fn decreasing_table_interpolates_and_round_trips() {
        let mut vals = INCREASING;
        vals.reverse();
        let table = table_from(&vals);
        assert_eq!(table.is_increasing(), Some(false));
        // 525 sits halfway between slot 0 (550 → 3 cm) and slot 1 (500 → 6 cm).
        let d = table.value_to_distance(525.0).unwrap();
        assert!((d - 4.5).abs() < 1e-9);
        for (i, v) in vals.iter().enumerate() {
            assert_eq!(table.value_to_distance(*v), Some(table.fixed_distance(i)));
        }
        assert_eq!(table.value_to_distance(560.0), None);
    }

    #[test]
    fn rewrite_before_completion_overwrites_slot() {
        let mut table = CalibrationTable::new(3.0);
        table.add(0, 999.0);
        table.add(0, 100.0);
        assert_eq!(table.count(), 1);
        assert_eq!(table.raw_value(0), Some(100.0));
    }

    #[test]
    fn frozen_table_ignores_later_writes() {
        let mut table = table_from(&INCREASING);
        assert!(!table.add(0, 9999.0));
        assert_eq!(table.raw_value(0), Some(100.0));
        assert_eq!(table.is_increasing(), Some(true));
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let mut table = CalibrationTable::new(3.0);
        assert!(!table.add(10, 5.0));
        assert_eq!(table.count(), 0);
    }

    #[test]
    fn far_endpoint_follows_direction() {
        let table = table_from(&INCREASING);
        assert!(table.is_beyond_far_endpoint(550.0));
        assert!(table.is_beyond_far_endpoint(600.0));
        assert!(!table.is_beyond_far_endpoint(549.0));
        assert!((table.max_distance() - 30.0).abs() < 1e-9);

        let mut vals = INCREASING;
        vals.reverse();
        let table = table_from(&vals);
        assert!(table.is_beyond_far_endpoint(100.0));
        assert!(!table.is_beyond_far_endpoint(101.0));

        assert!(!CalibrationTable::default().is_beyond_far_endpoint(1e9));
    }

    #[test]
    fn flat_bracket_returns_lower_slot() {
        let table = table_from(&[
            100.0, 200.0, 200.0, 200.0, 300.0, 350.0, 400.0, 450.0, 500.0, 550.0,
        ]);
        let d = table.value_to_distance(250.0).unwrap();
        // Brackets slot 3 (200 → 12 cm) and slot 4 (300 → 15 cm).
        assert!((d - 13.5).abs() < 1e-9);
    }
}
