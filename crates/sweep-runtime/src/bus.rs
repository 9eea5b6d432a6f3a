//! Broadcast fan-out of [`ScanReport`]s.
//!
//! Uses [`tokio::sync::broadcast`] so every subscriber (a renderer, the CLI
//! printer, a recorder) receives every report without any one of them
//! holding up the ticker.  A subscriber that falls behind skips ahead to the
//! oldest retained report instead of blocking the publisher.

use tokio::sync::broadcast;
use tracing::warn;

use crate::session::ScanReport;

/// Default channel capacity (reports buffered for slow subscribers).
const DEFAULT_CAPACITY: usize = 16;

/// Shared report bus. Clones share the same channel.
#[derive(Clone, Debug)]
pub struct ReportBus {
    sender: broadcast::Sender<ScanReport>,
}

impl ReportBus {
    /// Create a bus buffering up to `capacity` reports per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish `report` to every current subscriber.
    ///
    /// Returns the number of subscribers that were handed the report; `0`
    /// when nobody is listening, which is a normal condition.
    pub fn publish(&self, report: ScanReport) -> usize {
        self.sender.send(report).unwrap_or(0)
    }

    pub fn subscribe(&self) -> ReportReceiver {
        ReportReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReportBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiving end of a [`ReportBus`].
pub struct ReportReceiver {
    receiver: broadcast::Receiver<ScanReport>,
}

impl ReportReceiver {
    /// Wait for the next report.
    ///
    /// Returns `None` once every [`ReportBus`] clone has been dropped and the
    /// backlog is drained.
    pub async fn recv(&mut self) -> Option<ScanReport> {
        loop {
            match self.receiver.recv().await {
                Ok(report) => return Some(report),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "report subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ScanSession;
    use sweep_types::ScanMode;

    fn report() -> ScanReport {
        ScanSession::with_defaults(ScanMode::Sonar).report()
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = ReportBus::default();
        assert_eq!(bus.receiver_count(), 0);
        assert_eq!(bus.publish(report()), 0);
    }

    #[tokio::test]
    async fn every_subscriber_receives_the_report() -> Result<(), Box<dyn std::error::Error>> {
        let bus = ReportBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let sent = report();
        assert_eq!(bus.publish(sent.clone()), 2);

        let got1 = rx1.recv().await.ok_or("subscriber 1 got nothing")?;
        let got2 = rx2.recv().await.ok_or("subscriber 2 got nothing")?;
        assert_eq!(got1.session_id, sent.session_id);
        assert_eq!(got2.session_id, sent.session_id);
        Ok(())
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let bus = ReportBus::new(2);
        let mut slow = bus.subscribe();

        let reports: Vec<ScanReport> = (0..5).map(|_| report()).collect();
        for r in &reports {
            bus.publish(r.clone());
        }

        // Only the last two reports are retained.
        let first = slow.recv().await.map(|r| r.session_id);
        assert_eq!(first, Some(reports[3].session_id));
        let second = slow.recv().await.map(|r| r.session_id);
        assert_eq!(second, Some(reports[4].session_id));
    }

    #[tokio::test]
    async fn receiver_closes_when_bus_dropped() {
        let bus = ReportBus::default();
        let mut rx = bus.subscribe();
        bus.publish(report());
        drop(bus);

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }
}
