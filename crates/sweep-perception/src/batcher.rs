//! Per-angle sample batching.
//!
//! The scanner dwells on each angle long enough to report several readings.
//! [`SampleBatcher`] collects the readings of the current angle and commits a
//! single value per angle, either when the scan moves on or when the batch
//! reaches its capacity.
//!
//! Ranging readings are reduced with [`robust_mean`]: every sample proposes
//! the sub-collection of samples within `tolerance` of itself, the largest
//! (then tightest) proposal wins, and its mean is committed.  A lone echo
//! glitch therefore never drags the committed distance.
//!
//! # Example
//!
//! ```rust
//! use sweep_perception::batcher::{Reduction, SampleBatcher};
//!
//! let mut batcher = SampleBatcher::new(5, Reduction::RobustMean { tolerance: 4.0 });
//! let mut commits = Vec::new();
//! for v in [50.0, 51.0, 49.0, 90.0, 50.0] {
//!     commits.extend(batcher.submit(12, v));
//! }
//! assert_eq!(commits.len(), 1);
//! assert_eq!(commits[0].angle, 12);
//! assert_eq!(commits[0].value, 50.0);
//! ```

use tracing::debug;

/// How a finished batch is reduced to one committed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reduction {
    /// Outlier-resistant mean, rounded to one decimal place.
    RobustMean { tolerance: f64 },
    /// Plain arithmetic mean.
    Mean,
}

impl Reduction {
    /// Reduce `values`; `None` for an empty slice.
    pub fn reduce(&self, values: &[f64]) -> Option<f64> {
        match *self {
            Reduction::RobustMean { tolerance } => robust_mean(values, tolerance),
            Reduction::Mean if values.is_empty() => None,
            Reduction::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
        }
    }
}

/// Robust mean of `values` with agreement `tolerance`, rounded to 0.1.
///
/// Candidates are ranked by size, then by smallest spread (`max − min`).
/// On a full tie the candidate proposed by the earliest sample wins.
pub fn robust_mean(values: &[f64], tolerance: f64) -> Option<f64> {
    // (size, spread, sum) of the best candidate so far.
    let mut best: Option<(usize, f64, f64)> = None;

    for &v in values {
        let mut size = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &x in values {
            if (x - v).abs() <= tolerance {
                size += 1;
                sum += x;
                min = min.min(x);
                max = max.max(x);
            }
        }
        if size == 0 {
            continue;
        }
        let spread = max - min;
        let better = match best {
            None => true,
            Some((best_size, best_spread, _)) => {
                size > best_size || (size == best_size && spread < best_spread)
            }
        };
        if better {
            best = Some((size, spread, sum));
        }
    }

    best.map(|(size, _, sum)| round_tenth(sum / size as f64))
}

fn round_tenth(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// A value committed for one angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Commit {
    pub angle: usize,
    pub value: f64,
}

/// The (at most two) commits produced by one [`SampleBatcher::submit`]:
/// the batch closed by an angle change, then the new batch if it is
/// already full.
#[derive(Debug, Default)]
pub struct Commits {
    slots: [Option<Commit>; 2],
    next: usize,
}

impl Commits {
    fn push(&mut self, commit: Option<Commit>) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.is_none()) {
            *slot = commit;
        }
    }
}

impl Iterator for Commits {
    type Item = Commit;

    fn next(&mut self) -> Option<Commit> {
        while self.next < self.slots.len() {
            let commit = self.slots[self.next].take();
            self.next += 1;
            if commit.is_some() {
                return commit;
            }
        }
        None
    }
}

#[derive(Debug)]
struct Batch {
    angle: usize,
    values: Vec<f64>,
}

/// Accumulates samples for the current angle and commits one value per angle.
#[derive(Debug)]
pub struct SampleBatcher {
    capacity: usize,
    reduction: Reduction,
    batch: Option<Batch>,
}

impl SampleBatcher {
    /// Create a batcher that commits after `capacity` samples (at least 1).
    pub fn new(capacity: usize, reduction: Reduction) -> Self {
        Self {
            capacity: capacity.max(1),
            reduction,
            batch: None,
        }
    }

    /// Add one sample.
    ///
    /// A sample for a different angle first commits the open batch.  The
    /// batch for `angle` is committed as soon as it holds `capacity`
    /// samples.
    pub fn submit(&mut self, angle: usize, value: f64) -> Commits {
        let mut commits = Commits::default();

        let same_angle = self.batch.as_ref().is_some_and(|b| b.angle == angle);
        if same_angle {
            if let Some(batch) = self.batch.as_mut() {
                batch.values.push(value);
            }
        } else {
            commits.push(self.finalize());
            let mut values = Vec::with_capacity(self.capacity);
            values.push(value);
            self.batch = Some(Batch { angle, values });
        }

        if self
            .batch
            .as_ref()
            .is_some_and(|b| b.values.len() >= self.capacity)
        {
            commits.push(self.finalize());
        }
        commits
    }

    /// Commit whatever the open batch holds.
    pub fn flush(&mut self) -> Option<Commit> {
        self.finalize()
    }

    /// Drop the open batch without committing it.
    pub fn discard(&mut self) {
        if let Some(batch) = self.batch.take() {
            debug!(angle = batch.angle, samples = batch.values.len(), "partial batch discarded");
        }
    }

    /// Angle of the open batch, if any.
    pub fn pending_angle(&self) -> Option<usize> {
        self.batch.as_ref().map(|b| b.angle)
    }

    /// Number of samples in the open batch.
    pub fn pending_len(&self) -> usize {
        self.batch.as_ref().map_or(0, |b| b.values.len())
    }

    fn finalize(&mut self) -> Option<Commit> {
        let batch = self.batch.take()?;
        let value = self.reduction.reduce(&batch.values)?;
        debug!(angle = batch.angle, samples = batch.values.len(), value, "batch committed");
        Some(Commit {
            angle: batch.angle,
            value,
        })
    }
}
