//! `sweep-perception` – Aggregation and detection layer.
//!
//! Turns the noisy per-angle readings of a rotating scanner into stable
//! values, and those values into objects and light sources.
//!
//! # Modules
//!
//! - [`calibration`] – [`CalibrationTable`][calibration::CalibrationTable]:
//!   ten-point raw-count → distance mapping for the photoresistor, queried by
//!   binary search and linear interpolation.
//! - [`batcher`] – [`SampleBatcher`][batcher::SampleBatcher]: collects the
//!   readings of one angle and commits a single robust value.
//! - [`readout`] – [`AngleReadout`][readout::AngleReadout]: rolling robust
//!   readout at one selected angle.
//! - [`scan_buffer`] – [`ScanBuffer`][scan_buffer::ScanBuffer]: the
//!   angle-indexed store of committed values, and its immutable
//!   [`ScanSnapshot`][scan_buffer::ScanSnapshot].
//! - [`cluster`] – [`ClusterDetector`][cluster::ClusterDetector]: contiguous
//!   close-range runs as object arcs.
//! - [`light`] – [`LightSourceDetector`][light::LightSourceDetector]: grouped
//!   local minima of light-inferred distance.

pub mod batcher;
pub mod calibration;
pub mod cluster;
pub mod light;
pub mod readout;
pub mod scan_buffer;
