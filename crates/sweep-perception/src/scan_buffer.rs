//! Angle-indexed store of committed values for one scan session.
//!
//! [`ScanBuffer`] is a plain state holder: one optional distance and one
//! optional saturation flag per angle.  Detectors never read the live buffer;
//! they work on a [`ScanSnapshot`], an owned copy taken under the session
//! lock so it can never be torn by a concurrent writer.

use serde::{Deserialize, Serialize};
use sweep_types::ANGLE_COUNT;

/// Mutable per-session store of committed values.
#[derive(Debug, Clone)]
pub struct ScanBuffer {
    distances: Vec<Option<f64>>,
    saturated: Vec<Option<bool>>,
}

impl ScanBuffer {
    pub fn new() -> Self {
        Self {
            distances: vec![None; ANGLE_COUNT],
            saturated: vec![None; ANGLE_COUNT],
        }
    }

    /// Store `value` at `angle`.  Out-of-range angles are ignored.
    pub fn set(&mut self, angle: usize, value: f64) {
        if let Some(slot) = self.distances.get_mut(angle) {
            *slot = Some(value);
        }
    }

    /// Mark whether the value at `angle` is saturated.
    pub fn set_saturated(&mut self, angle: usize, saturated: bool) {
        if let Some(slot) = self.saturated.get_mut(angle) {
            *slot = Some(saturated);
        }
    }

    /// Forget the value and saturation flag at `angle`.
    pub fn clear(&mut self, angle: usize) {
        if let (Some(d), Some(s)) = (self.distances.get_mut(angle), self.saturated.get_mut(angle)) {
            *d = None;
            *s = None;
        }
    }

    pub fn get(&self, angle: usize) -> Option<f64> {
        self.distances.get(angle).copied().flatten()
    }

    /// Owned copy of the current contents.
    pub fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            distances: self.distances.clone(),
            saturated: self.saturated.clone(),
        }
    }

    /// Forget every stored value.
    pub fn reset(&mut self) {
        self.distances.fill(None);
        self.saturated.fill(None);
    }
}

impl Default for ScanBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable copy of a [`ScanBuffer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    distances: Vec<Option<f64>>,
    saturated: Vec<Option<bool>>,
}

impl ScanSnapshot {
    /// Snapshot with no data at any angle.
    pub fn empty() -> Self {
        ScanBuffer::new().snapshot()
    }

    pub fn get(&self, angle: usize) -> Option<f64> {
        self.distances.get(angle).copied().flatten()
    }

    /// `true` only when the angle was explicitly flagged saturated.
    pub fn is_saturated(&self, angle: usize) -> bool {
        self.saturated.get(angle).copied().flatten().unwrap_or(false)
    }

    /// Every present `(angle, distance)` pair in angle order, saturated ones
    /// included.  This is the raw point set shown alongside detections.
    pub fn points(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.distances
            .iter()
            .enumerate()
            .filter_map(|(angle, d)| d.map(|d| (angle, d)))
    }

    /// Number of angles holding a value.
    pub fn len_present(&self) -> usize {
        self.distances.iter().filter(|d| d.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len_present() == 0
    }
}

impl Default for ScanSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
