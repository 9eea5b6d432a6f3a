//! `sweep-runtime` – Session runtime.
//!
//! Wires the perception components into a running scan: transport lines in,
//! periodic reports out.
//!
//! # Modules
//!
//! - [`parse`] – [`parse_line`][parse::parse_line]: colon-separated transport
//!   lines into typed [`ScanLine`][parse::ScanLine]s.
//! - [`session`] – [`ScanSession`][session::ScanSession]: the per-session
//!   state machine (`Idle → Calibrating → Measuring → Stopped`) and the
//!   [`ScanReport`][session::ScanReport] it produces.
//! - [`bus`] – [`ReportBus`][bus::ReportBus]: broadcast fan-out of reports.
//! - [`driver`] – [`SessionDriver`][driver::SessionDriver]: the reader
//!   (producer) and ticker (consumer) tasks over one shared session.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with optional OTLP span export.

pub mod bus;
pub mod driver;
pub mod parse;
pub mod session;
pub mod telemetry;

pub use bus::{ReportBus, ReportReceiver};
pub use driver::{DriverConfig, DriverOutcome, SessionDriver, SharedSession, Shutdown};
pub use session::{ScanReport, ScanSession};
pub use telemetry::{TracerProviderGuard, init_tracing};
