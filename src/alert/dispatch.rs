//! The alert dispatcher task.
//!
//! Domains send [`Alert`]s into a bounded mpsc channel via [`AlertSender`];
//! a single dispatcher task drains the channel, resolves the recipient for
//! the alert's domain, and delivers through the configured sink with
//! bounded retries. An alert that cannot be delivered is logged and
//! dropped. Nothing in this module can fail in a way that reaches the
//! schedulers.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::retry::{RetryConfig, deliver_with_retry};
use super::sink::DeliverySink;
use super::{Alert, Severity};
use crate::types::{Domain, RecipientId};

/// Default channel capacity. Alerts are small and bursts are short (a
/// reconcile pass after a long outage produces at most a handful).
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Sending half of the alert channel, cloned into every producer.
#[derive(Clone)]
pub struct AlertSender {
    tx: mpsc::Sender<Alert>,
}

impl AlertSender {
    /// Enqueues an alert for delivery.
    ///
    /// If the dispatcher has shut down the alert is logged and dropped;
    /// producers never observe an error.
    pub async fn send(&self, alert: Alert) {
        if let Err(e) = self.tx.send(alert).await {
            warn!(alert = ?e.0, "dispatcher gone, alert dropped");
        }
    }
}

/// Creates the alert channel with the default capacity.
pub fn alert_channel() -> (AlertSender, mpsc::Receiver<Alert>) {
    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    (AlertSender { tx }, rx)
}

/// Routes alerts to recipients and drives the sink.
pub struct Dispatcher<S> {
    sink: S,
    routes: HashMap<Domain, RecipientId>,
    retry: RetryConfig,
}

impl<S: DeliverySink> Dispatcher<S> {
    pub fn new(sink: S, routes: HashMap<Domain, RecipientId>) -> Self {
        Dispatcher {
            sink,
            routes,
            retry: RetryConfig::DEFAULT,
        }
    }

    /// Overrides the retry configuration (shorter delays in tests).
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Runs the dispatcher until the channel closes or shutdown is signalled.
    pub async fn run(self, mut rx: mpsc::Receiver<Alert>, shutdown: CancellationToken) {
        info!("alert dispatcher started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                alert = rx.recv() => match alert {
                    Some(alert) => self.dispatch(alert).await,
                    None => break,
                },
            }
        }
        info!("alert dispatcher stopped");
    }

    async fn dispatch(&self, alert: Alert) {
        let Some(recipient) = self.routes.get(&alert.domain) else {
            warn!(
                domain = %alert.domain,
                body = %alert.body,
                "no recipient configured for domain, alert dropped"
            );
            return;
        };

        let body = format_body(&alert);
        if let Err(e) = deliver_with_retry(&self.sink, recipient, &body, &self.retry).await {
            error!(
                domain = %alert.domain,
                %recipient,
                error = %e,
                "alert undeliverable, dropped"
            );
        }
    }
}

/// Prefixes warnings so they stand out in a chat thread.
fn format_body(alert: &Alert) -> String {
    match alert.severity {
        Severity::Info => alert.body.clone(),
        Severity::Warning => format!("⚠️ {}", alert.body),
    }
}
