//! Light-source detection over a calibrated light sweep.
//!
//! A light emitter appears as a dip in light-inferred distance.  The
//! detector finds every local minimum, groups minima that lie within
//! `merge_degrees` of each other, and reports the closest point of each
//! group.
//!
//! Neighbour lookups and group merging treat the angle axis as circular
//! (`0°` neighbours `179°`), even though the sweep only covers half a turn.
//!
//! # Example
//!
//! ```rust
//! use sweep_perception::light::LightSourceDetector;
//! use sweep_perception::scan_buffer::ScanBuffer;
//!
//! let mut buf = ScanBuffer::new();
//! buf.set(80, 12.0);
//! buf.set(81, 10.0);
//! buf.set(82, 13.0);
//! let sources = LightSourceDetector::new(20).detect(&buf.snapshot());
//! assert_eq!(sources.len(), 1);
//! assert_eq!(sources[0].angle, 81);
//! assert_eq!(sources[0].distance, 10.0);
//! ```

use sweep_types::{ANGLE_COUNT, LightSource};

use crate::scan_buffer::ScanSnapshot;

/// Angular distance between two angles on the circular axis.
pub fn circular_distance(a: usize, b: usize) -> usize {
    let d = a.abs_diff(b) % ANGLE_COUNT;
    d.min(ANGLE_COUNT - d)
}

/// Closest of `sources`; the first one wins on ties.
pub fn nearest(sources: &[LightSource]) -> Option<&LightSource> {
    sources
        .iter()
        .reduce(|best, s| if s.distance < best.distance { s } else { best })
}

/// Finds light sources as grouped local minima.
#[derive(Debug, Clone)]
pub struct LightSourceDetector {
    merge_degrees: usize,
}

impl LightSourceDetector {
    pub fn new(merge_degrees: usize) -> Self {
        Self { merge_degrees }
    }

    /// Detect light sources in group order.  Pure.
    pub fn detect(&self, snapshot: &ScanSnapshot) -> Vec<LightSource> {
        let minima: Vec<usize> = (0..ANGLE_COUNT)
            .filter(|&i| is_local_minimum(snapshot, i))
            .collect();

        self.group(&minima)
            .iter()
            .filter_map(|group| representative(snapshot, group))
            .collect()
    }

    fn group(&self, minima: &[usize]) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for &angle in minima {
            let joins = groups
                .last()
                .and_then(|g| g.last())
                .is_some_and(|&prev| circular_distance(prev, angle) <= self.merge_degrees);
            match groups.last_mut() {
                Some(group) if joins => group.push(angle),
                _ => groups.push(vec![angle]),
            }
        }

        if groups.len() > 1 {
            let tail_end = groups.last().and_then(|g| g.last()).copied();
            let head_start = groups.first().and_then(|g| g.first()).copied();
            if let (Some(end), Some(start)) = (tail_end, head_start) {
                if circular_distance(end, start) <= self.merge_degrees {
                    let head = groups.remove(0);
                    if let Some(mut wrapped) = groups.pop() {
                        wrapped.extend(head);
                        groups.insert(0, wrapped);
                    }
                }
            }
        }
        groups
    }
}

impl Default for LightSourceDetector {
    fn default() -> Self {
        Self::new(20)
    }
}

/// Distance at `angle`, unless missing or saturated.
fn usable(snapshot: &ScanSnapshot, angle: usize) -> Option<f64> {
    if snapshot.is_saturated(angle) {
        return None;
    }
    snapshot.get(angle)
}

fn is_local_minimum(snapshot: &ScanSnapshot, i: usize) -> bool {
    let Some(d) = usable(snapshot, i) else {
        return false;
    };
    let left = usable(snapshot, (i + ANGLE_COUNT - 1) % ANGLE_COUNT);
    let right = usable(snapshot, (i + 1) % ANGLE_COUNT);
    match (left, right) {
        (Some(l), Some(r)) => d <= l && d <= r && (d < l || d < r),
        (Some(l), None) => d < l,
        (None, Some(r)) => d <= r,
        (None, None) => false,
    }
}

fn representative(snapshot: &ScanSnapshot, group: &[usize]) -> Option<LightSource> {
    group
        .iter()
        .filter_map(|&angle| usable(snapshot, angle).map(|distance| LightSource { angle, distance }))
        .reduce(|best, s| if s.distance < best.distance { s } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan_buffer::ScanBuffer;

    fn snapshot(points: &[(usize, f64)]) -> ScanSnapshot {
        let mut buf = ScanBuffer::new();
        for &(a, d) in points {
            buf.set(a, d);
            buf.set_saturated(a, false);
        }
        buf.snapshot()
    }

    #[test]
    fn single_dip_is_one_source() {
        let snap = snapshot(&[(80, 12.0), (81, 10.0), (82, 13.0)]);
        let sources = LightSourceDetector::default().detect(&snap);
        assert_eq!(sources, vec![LightSource { angle: 81, distance: 10.0 }]);
    }

    #[test]
    fn isolated_point_is_not_a_minimum() {
        let snap = snapshot(&[(40, 5.0)]);
        assert!(LightSourceDetector::default().detect(&snap).is_empty());
    }

    #[test]
    fn plateau_edges_follow_asymmetric_rule() {
        // Only-right-neighbour accepts equality; only-left requires strict.
        let snap = snapshot(&[(50, 10.0), (51, 10.0)]);
        let sources = LightSourceDetector::default().detect(&snap);
        assert_eq!(sources, vec![LightSource { angle: 50, distance: 10.0 }]);
    }

    #[test]
    fn saturated_points_are_unavailable() {
        let mut buf = ScanBuffer::new();
        for (a, d) in [(80, 12.0), (81, 10.0), (82, 13.0)] {
            buf.set(a, d);
        }
        buf.set_saturated(81, true);
        // With 81 unavailable, 80 and 82 have no usable neighbour.
        assert!(LightSourceDetector::default().detect(&buf.snapshot()).is_empty());
    }

    #[test]
    fn nearby_minima_merge_into_closest() {
        let snap = snapshot(&[
            (30, 9.0),
            (31, 8.0),
            (32, 9.0),
            (40, 9.0),
            (41, 6.0),
            (42, 9.0),
            (100, 9.0),
            (101, 7.0),
            (102, 9.0),
        ]);
        let sources = LightSourceDetector::new(20).detect(&snap);
        assert_eq!(
            sources,
            vec![
                LightSource { angle: 41, distance: 6.0 },
                LightSource { angle: 101, distance: 7.0 },
            ]
        );
    }

    #[test]
    fn groups_across_wrap_boundary_merge_first() {
        let snap = snapshot(&[
            (2, 9.0),
            (3, 5.0),
            (4, 9.0),
            (90, 9.0),
            (91, 4.0),
            (92, 9.0),
            (175, 9.0),
            (176, 3.0),
            (177, 9.0),
        ]);
        let sources = LightSourceDetector::new(20).detect(&snap);
        assert_eq!(
            sources,
            vec![
                LightSource { angle: 176, distance: 3.0 },
                LightSource { angle: 91, distance: 4.0 },
            ]
        );
    }

    #[test]
    fn neighbours_wrap_around_the_axis() {
        let detector = LightSourceDetector::new(20);
        let at_zero = LightSource { angle: 0, distance: 5.0 };

        let snap = snapshot(&[(179, 9.0), (0, 5.0), (1, 9.0)]);
        assert_eq!(detector.detect(&snap), vec![at_zero]);

        let snap = snapshot(&[(178, 9.0), (179, 5.0), (0, 9.0)]);
        assert_eq!(detector.detect(&snap), vec![LightSource { angle: 179, distance: 5.0 }]);

        // 179 is the only neighbour of 0.
        let snap = snapshot(&[(179, 9.0), (0, 5.0)]);
        assert_eq!(detector.detect(&snap), vec![at_zero]);
    }

    #[test]
    fn tie_in_group_keeps_first_in_order() {
        let snap = snapshot(&[
            (10, 9.0),
            (11, 5.0),
            (12, 9.0),
            (20, 9.0),
            (21, 5.0),
            (22, 9.0),
        ]);
        let sources = LightSourceDetector::new(20).detect(&snap);
        assert_eq!(sources, vec![LightSource { angle: 11, distance: 5.0 }]);
    }

    #[test]
    fn detection_is_idempotent() {
        let snap = snapshot(&[(80, 12.0), (81, 10.0), (82, 13.0), (120, 4.0), (121, 6.0)]);
        let detector = LightSourceDetector::default();
        assert_eq!(detector.detect(&snap), detector.detect(&snap));
    }

    #[test]
    fn circular_distance_wraps() {
        assert_eq!(circular_distance(0, 179), 1);
        assert_eq!(circular_distance(10, 30), 20);
        assert_eq!(circular_distance(170, 5), 15);
        assert_eq!(circular_distance(90, 0), 90);
    }

    #[test]
    fn nearest_picks_closest_then_first() {
        let sources = [
            LightSource { angle: 10, distance: 8.0 },
            LightSource { angle: 50, distance: 3.0 },
            LightSource { angle: 90, distance: 3.0 },
        ];
        assert_eq!(nearest(&sources).map(|s| s.angle), Some(50));
        assert_eq!(nearest(&[]), None);
    }
}
