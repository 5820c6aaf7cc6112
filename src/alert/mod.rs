//! Outbound alert types and delivery.
//!
//! Domains produce [`Alert`] values; a dedicated dispatcher task receives
//! them over a channel and pushes them through a [`DeliverySink`] with
//! bounded retries. Delivery failure is contained here: an undeliverable
//! alert is logged and dropped, and never propagates back into scheduling
//! or state mutation.

pub mod dispatch;
pub mod retry;
pub mod sink;

pub use dispatch::{AlertSender, Dispatcher, alert_channel};
pub use retry::{RetryConfig, deliver_with_retry};
pub use sink::{DeliverySink, LoggingSink, SinkError, SinkErrorKind};

use serde::{Deserialize, Serialize};

use crate::types::Domain;

/// How urgent an alert is. Affects formatting at the sink, not routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Routine notification (allowance credited, bins due tomorrow).
    Info,
    /// Something the household should look at now (train delayed).
    Warning,
}

/// A notification produced by a domain, awaiting delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// The domain that produced this alert; used to pick the recipient.
    pub domain: Domain,

    pub severity: Severity,

    /// The message body, already formatted for the recipient.
    pub body: String,
}

impl Alert {
    pub fn info(domain: Domain, body: impl Into<String>) -> Self {
        Alert {
            domain,
            severity: Severity::Info,
            body: body.into(),
        }
    }

    pub fn warning(domain: Domain, body: impl Into<String>) -> Self {
        Alert {
            domain,
            severity: Severity::Warning,
            body: body.into(),
        }
    }
}
