//! Live readout at a single, operator-selected angle.
//!
//! Instead of sweeping, the scanner parks at one angle and streams readings.
//! [`AngleReadout`] keeps the most recent `capacity` readings for that angle
//! and reports their robust mean.

use std::collections::VecDeque;

use sweep_types::Readout;
use tracing::debug;

use crate::batcher::robust_mean;

/// Rolling robust readout for one angle.
#[derive(Debug, Clone)]
pub struct AngleReadout {
    angle: usize,
    capacity: usize,
    tolerance: f64,
    window: VecDeque<f64>,
}

impl AngleReadout {
    pub fn new(angle: usize, capacity: usize, tolerance: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            angle,
            capacity,
            tolerance,
            window: VecDeque::with_capacity(capacity),
        }
    }

    /// Point the readout at a new angle, forgetting previous samples.
    pub fn select(&mut self, angle: usize) {
        debug!(from = self.angle, to = angle, "readout angle selected");
        self.angle = angle;
        self.window.clear();
    }

    /// Record a sample; samples for any other angle are ignored.
    ///
    /// Returns whether the sample was kept.
    pub fn push(&mut self, angle: usize, value: f64) -> bool {
        if angle != self.angle {
            return false;
        }
        self.window.push_back(value);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
        true
    }

    pub fn angle(&self) -> usize {
        self.angle
    }

    /// Robust mean of the current window.
    pub fn current(&self) -> Option<f64> {
        let (front, back) = self.window.as_slices();
        if back.is_empty() {
            robust_mean(front, self.tolerance)
        } else {
            let values: Vec<f64> = self.window.iter().copied().collect();
            robust_mean(&values, self.tolerance)
        }
    }

    pub fn readout(&self) -> Readout {
        Readout {
            angle: self.angle,
            distance: self.current(),
        }
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_readout_has_no_distance() {
        let r = AngleReadout::new(90, 15, 4.0);
        assert_eq!(r.readout(), Readout { angle: 90, distance: None });
    }

    #[test]
    fn ignores_other_angles() {
        let mut r = AngleReadout::new(90, 15, 4.0);
        assert!(!r.push(89, 10.0));
        assert!(r.push(90, 20.0));
        assert_eq!(r.current(), Some(20.0));
    }

    #[test]
    fn window_keeps_most_recent_samples() {
        let mut r = AngleReadout::new(0, 3, 4.0);
        for v in [100.0, 100.0, 100.0, 10.0, 10.0] {
            r.push(0, v);
        }
        // Window is now [100, 10, 10].
        assert_eq!(r.current(), Some(10.0));
    }

    #[test]
    fn select_clears_window() {
        let mut r = AngleReadout::new(10, 15, 4.0);
        r.push(10, 33.0);
        r.select(45);
        assert_eq!(r.angle(), 45);
        assert_eq!(r.current(), None);
    }

    #[test]
    fn outlier_does_not_move_readout() {
        let mut r = AngleReadout::new(30, 15, 4.0);
        for v in [25.0, 26.0, 24.0, 250.0, 25.0] {
            r.push(30, v);
        }
        assert_eq!(r.current(), Some(25.0));
    }
}
