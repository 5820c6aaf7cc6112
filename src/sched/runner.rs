//! The generic per-domain runner task.
//!
//! One runner is spawned per domain. Each iteration asks the driver for its
//! next milestone, sleeps until that instant (or parks indefinitely when
//! there is none), and then lets the driver act. The loop also wakes for
//! `Recheck` nudges from command handlers and for shutdown.
//!
//! The wall clock is re-read after every wake: the time the sleep was
//! computed against is stale by the time it fires, and suspend/resume can
//! stretch a sleep arbitrarily.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{DomainDriver, DomainMessage};
use crate::alert::AlertSender;

/// Runs one domain's scheduling loop until shutdown.
#[tracing::instrument(skip_all, fields(domain = %driver.domain()))]
pub async fn run_domain<D: DomainDriver>(
    driver: D,
    mut nudges: mpsc::Receiver<DomainMessage>,
    alerts: AlertSender,
    shutdown: CancellationToken,
) {
    let domain = driver.domain();
    info!(%domain, policy = ?driver.catch_up_policy(), "scheduler started");

    loop {
        let now = Utc::now();
        let sleep_for = driver.next_milestone_at(now).await.map(|at| {
            // Overdue milestones run immediately
            (at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
        });

        tokio::select! {
            _ = shutdown.cancelled() => break,
            msg = nudges.recv() => {
                match msg {
                    // Recompute the next milestone on the next iteration
                    Some(DomainMessage::Recheck) => continue,
                    // All senders dropped; nothing can wake a parked loop again
                    None => break,
                }
            }
            _ = sleep_or_park(sleep_for) => {
                let now = Utc::now();
                match driver.on_milestone(now).await {
                    Ok(batch) => {
                        for alert in batch {
                            alerts.send(alert).await;
                        }
                    }
                    Err(e) => {
                        let delay = driver.retry_delay();
                        warn!(
                            %domain,
                            error = %e,
                            retry_in_secs = delay.as_secs(),
                            "milestone failed, backing off"
                        );
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
    }

    info!(%domain, "scheduler stopped");
}

/// Sleeps for the given duration, or forever when there is no milestone.
async fn sleep_or_park(duration: Option<Duration>) {
    match duration {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

/// Runs a domain's catch-up pass and forwards any resulting alerts.
///
/// Called once at startup, before the domain's runner is spawned. A failed
/// reconcile is logged and skipped; the runner will still start and the
/// domain recovers on its next successful milestone.
#[tracing::instrument(skip_all, fields(domain = %driver.domain()))]
pub async fn reconcile_domain<D: DomainDriver>(driver: &D, alerts: &AlertSender) {
    let domain = driver.domain();
    let now = Utc::now();
    match driver.reconcile(now).await {
        Ok(batch) => {
            info!(%domain, alerts = batch.len(), "reconciled");
            for alert in batch {
                alerts.send(alert).await;
            }
        }
        Err(e) => {
            warn!(%domain, error = %e, "reconcile failed, continuing with persisted state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{Alert, alert_channel};
    use crate::sched::{CatchUpPolicy, DomainError};
    use crate::types::Domain;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Driver that fires immediately a fixed number of times, then parks.
    #[derive(Clone)]
    struct TickDriver {
        fired: Arc<AtomicU32>,
        limit: u32,
        fail_first: u32,
    }

    impl DomainDriver for TickDriver {
        fn domain(&self) -> Domain {
            Domain::Budget
        }

        fn catch_up_policy(&self) -> CatchUpPolicy {
            CatchUpPolicy::Replay
        }

        fn retry_delay(&self) -> Duration {
            Duration::from_millis(1)
        }

        async fn next_milestone_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
            if self.fired.load(Ordering::SeqCst) < self.limit {
                Some(now)
            } else {
                None
            }
        }

        async fn on_milestone(&self, _now: DateTime<Utc>) -> Result<Vec<Alert>, DomainError> {
            let n = self.fired.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(DomainError::Provider(
                    crate::provider::ProviderError::Unavailable("scripted".into()),
                ));
            }
            Ok(vec![Alert::info(Domain::Budget, format!("tick {n}"))])
        }

        async fn reconcile(&self, _now: DateTime<Utc>) -> Result<Vec<Alert>, DomainError> {
            Ok(vec![Alert::info(Domain::Budget, "caught up")])
        }
    }

    #[tokio::test]
    async fn overdue_milestones_fire_immediately() {
        let driver = TickDriver {
            fired: Arc::new(AtomicU32::new(0)),
            limit: 3,
            fail_first: 0,
        };
        let (alerts, mut rx) = alert_channel();
        let (_nudge_tx, nudge_rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_domain(
            driver.clone(),
            nudge_rx,
            alerts,
            shutdown.clone(),
        ));

        for expected in 0..3 {
            let alert = rx.recv().await.unwrap();
            assert_eq!(alert.body, format!("tick {expected}"));
        }

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(driver.fired.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_milestone_is_retried_after_backoff() {
        let driver = TickDriver {
            fired: Arc::new(AtomicU32::new(0)),
            limit: 2,
            fail_first: 1,
        };
        let (alerts, mut rx) = alert_channel();
        let (_nudge_tx, nudge_rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_domain(driver, nudge_rx, alerts, shutdown.clone()));

        // First attempt fails silently; the retry produces tick 1
        let alert = rx.recv().await.unwrap();
        assert_eq!(alert.body, "tick 1");

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn parked_driver_wakes_on_recheck() {
        let driver = TickDriver {
            fired: Arc::new(AtomicU32::new(0)),
            limit: 0, // parked from the start
            fail_first: 0,
        };
        let fired = driver.fired.clone();
        let (alerts, mut rx) = alert_channel();
        let (nudge_tx, nudge_rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_domain(driver, nudge_rx, alerts, shutdown.clone()));

        // Give the loop a moment to park, then raise the limit indirectly
        // by nudging: with limit 0 the driver stays parked, proving the
        // nudge wakes the select without firing a milestone.
        tokio::time::sleep(Duration::from_millis(10)).await;
        nudge_tx.send(DomainMessage::Recheck).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn reconcile_forwards_alerts() {
        let driver = TickDriver {
            fired: Arc::new(AtomicU32::new(0)),
            limit: 0,
            fail_first: 0,
        };
        let (alerts, mut rx) = alert_channel();

        reconcile_domain(&driver, &alerts).await;

        let alert = rx.recv().await.unwrap();
        assert_eq!(alert.body, "caught up");
    }

    #[tokio::test]
    async fn shutdown_stops_a_parked_runner() {
        let driver = TickDriver {
            fired: Arc::new(AtomicU32::new(0)),
            limit: 0,
            fail_first: 0,
        };
        let (alerts, _rx) = alert_channel();
        let (_nudge_tx, nudge_rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_domain(driver, nudge_rx, alerts, shutdown.clone()));

        shutdown.cancel();
        task.await.unwrap();
    }
}
