//! Producer/consumer tasks around a shared [`ScanSession`].
//!
//! Two tasks share one session behind a [`std::sync::Mutex`]:
//!
//! - [`run_reader`] is the producer.  It waits (with a bounded timeout) for
//!   the next transport line and feeds it to
//!   [`ScanSession::ingest_line`].
//! - [`run_ticker`] is the consumer.  On every tick it copies the reportable
//!   state under the lock, runs the detectors outside it, and publishes the
//!   [`ScanReport`][crate::session::ScanReport] on a [`ReportBus`].
//!
//! The lock is never held across an `.await`.  Both tasks stop when the
//! [`Shutdown`] signal fires; the reader also stops at end of input.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::io::Cursor;
//! use sweep_runtime::driver::{DriverConfig, SessionDriver, shared};
//! use sweep_runtime::session::ScanSession;
//! use sweep_types::ScanMode;
//!
//! # async fn demo() -> Result<(), sweep_types::SweepError> {
//! let mut session = ScanSession::with_defaults(ScanMode::Sonar);
//! session.start();
//! let input = Cursor::new(b"10:2320\n10:2320\n".to_vec());
//! let driver = SessionDriver::spawn(input, shared(session), DriverConfig::default());
//! let mut reports = driver.subscribe();
//! let outcome = driver.join().await?;
//! assert!(outcome.reader.eof);
//! # let _ = reports.recv().await;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sweep_types::SweepError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::bus::{ReportBus, ReportReceiver};
use crate::session::ScanSession;

/// A session shared between the reader and the ticker.
pub type SharedSession = Arc<Mutex<ScanSession>>;

/// Wrap `session` for sharing between tasks.
pub fn shared(session: ScanSession) -> SharedSession {
    Arc::new(Mutex::new(session))
}

/// Lock `session`, recovering it if a previous holder panicked.
///
/// The session holds plain data, so a poisoned lock is still usable.
pub fn lock(session: &SharedSession) -> MutexGuard<'_, ScanSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// Shutdown signal
// ────────────────────────────────────────────────────────────────────────────

/// Cloneable one-way shutdown flag.
#[derive(Debug, Clone)]
pub struct Shutdown(Arc<watch::Sender<bool>>);

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self(Arc::new(sender))
    }

    /// Ask every task watching this signal to stop.
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.0.subscribe()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once `shutdown` reads `true` or its sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    // Err: every sender is gone.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

// ────────────────────────────────────────────────────────────────────────────
// Reader
// ────────────────────────────────────────────────────────────────────────────

/// What the reader saw before it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReaderStats {
    pub lines: u64,
    pub accepted: u64,
    /// `true` when the input ended, `false` when stopped by shutdown.
    pub eof: bool,
}

/// Feed lines from `reader` into `session` until end of input or shutdown.
///
/// Each read waits at most `read_timeout`; a timeout just re-arms the wait.
/// At end of input the session's partial batches are flushed.
pub async fn run_reader<R>(
    reader: R,
    session: SharedSession,
    mut shutdown: watch::Receiver<bool>,
    read_timeout: Duration,
) -> Result<ReaderStats, SweepError>
where
    R: AsyncBufRead + Unpin,
{
    let read_timeout = read_timeout.max(Duration::from_millis(1));
    let mut lines = reader.lines();
    let mut stats = ReaderStats::default();

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = stopped(&mut shutdown) => break,
            next = tokio::time::timeout(read_timeout, lines.next_line()) => match next {
                Err(_) => continue,
                Ok(Ok(Some(line))) => {
                    stats.lines += 1;
                    if lock(&session).ingest_line(&line) {
                        stats.accepted += 1;
                    }
                }
                Ok(Ok(None)) => {
                    lock(&session).flush();
                    stats.eof = true;
                    break;
                }
                Ok(Err(e)) => return Err(e.into()),
            },
        }
    }

    info!(lines = stats.lines, accepted = stats.accepted, eof = stats.eof, "reader stopped");
    Ok(stats)
}

// ────────────────────────────────────────────────────────────────────────────
// Ticker
// ────────────────────────────────────────────────────────────────────────────

/// Publish a report of `session` on `bus` every `period` until shutdown.
///
/// Returns the number of reports published.
pub async fn run_ticker(
    session: SharedSession,
    bus: ReportBus,
    mut shutdown: watch::Receiver<bool>,
    period: Duration,
) -> u64 {
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut published = 0u64;

    loop {
        tokio::select! {
            _ = stopped(&mut shutdown) => break,
            _ = interval.tick() => {
                let view = lock(&session).view();
                let report = view.into_report();
                let receivers = bus.publish(report);
                published += 1;
                debug!(receivers, "report published");
            }
        }
    }
    published
}

// ────────────────────────────────────────────────────────────────────────────
// Driver
// ────────────────────────────────────────────────────────────────────────────

/// Timing of a [`SessionDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    pub tick: Duration,
    pub read_timeout: Duration,
    pub bus_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(200),
            read_timeout: Duration::from_millis(1000),
            bus_capacity: 16,
        }
    }
}

/// Result of a finished [`SessionDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOutcome {
    pub reader: ReaderStats,
    pub reports_published: u64,
}

/// Reader and ticker tasks running over one shared session.
pub struct SessionDriver {
    session: SharedSession,
    bus: ReportBus,
    shutdown: Shutdown,
    reader: JoinHandle<Result<ReaderStats, SweepError>>,
    ticker: JoinHandle<u64>,
}

impl SessionDriver {
    /// Spawn both tasks on the current tokio runtime.
    pub fn spawn<R>(reader: R, session: SharedSession, config: DriverConfig) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let bus = ReportBus::new(config.bus_capacity);
        let shutdown = Shutdown::new();

        let reader = tokio::spawn(run_reader(
            reader,
            Arc::clone(&session),
            shutdown.subscribe(),
            config.read_timeout,
        ));
        let ticker = tokio::spawn(run_ticker(
            Arc::clone(&session),
            bus.clone(),
            shutdown.subscribe(),
            config.tick,
        ));

        Self {
            session,
            bus,
            shutdown,
            reader,
            ticker,
        }
    }

    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    pub fn subscribe(&self) -> ReportReceiver {
        self.bus.subscribe()
    }

    /// Handle that stops both tasks when triggered.
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Wait for the reader to finish, then stop the ticker.
    ///
    /// The bus closes once this returns, so subscribers see `None` after
    /// draining.
    pub async fn join(self) -> Result<DriverOutcome, SweepError> {
        let reader = self
            .reader
            .await
            .map_err(|e| SweepError::Io(format!("reader task failed: {e}")))?;
        self.shutdown.trigger();
        let reports_published = self
            .ticker
            .await
            .map_err(|e| SweepError::Io(format!("ticker task failed: {e}")))?;
        Ok(DriverOutcome {
            reader: reader?,
            reports_published,
        })
    }
}
